//! Design-side records, as supplied by a [`DesignSource`](crate::source::DesignSource).

use serde::{Deserialize, Serialize};

/// Rectangle bounds for a component or element.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundingBox {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(alias = "w")]
    pub width: f64,
    #[serde(alias = "h")]
    pub height: f64,
}

impl BoundingBox {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn area(&self) -> f64 {
        self.width.max(0.0) * self.height.max(0.0)
    }
}

/// A design component in canonical form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentRecord {
    pub id: String,
    pub name: String,
    /// Design-tool node type (`TEXT`, `FRAME`, `INSTANCE`, ...).
    #[serde(rename = "type")]
    pub component_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounding_box: Option<BoundingBox>,
    #[serde(default)]
    pub style_props: StyleProps,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleProps {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typography: Option<Typography>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spacing: Option<Spacing>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub border_radius: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Typography {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_family: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_weight: Option<FontWeight>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_height: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub letter_spacing: Option<f64>,
}

/// Padding per side. Sides the design tool did not report stay `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Spacing {
    #[serde(default, alias = "paddingTop", skip_serializing_if = "Option::is_none")]
    pub top: Option<f64>,
    #[serde(default, alias = "paddingRight", skip_serializing_if = "Option::is_none")]
    pub right: Option<f64>,
    #[serde(default, alias = "paddingBottom", skip_serializing_if = "Option::is_none")]
    pub bottom: Option<f64>,
    #[serde(default, alias = "paddingLeft", skip_serializing_if = "Option::is_none")]
    pub left: Option<f64>,
}

/// Font weight as either a number (`700`) or a keyword (`"Bold"`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FontWeight {
    Numeric(f64),
    Named(String),
}

impl FontWeight {
    pub fn numeric(&self) -> Option<u16> {
        match self {
            FontWeight::Numeric(n) if n.is_finite() && *n > 0.0 => Some(n.round() as u16),
            FontWeight::Numeric(_) => None,
            FontWeight::Named(name) => font_weight_value(name),
        }
    }
}

impl std::fmt::Display for FontWeight {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FontWeight::Numeric(n) => write!(f, "{n}"),
            FontWeight::Named(s) => f.write_str(s),
        }
    }
}

/// Map a CSS/design font-weight string to its numeric value.
pub fn font_weight_value(weight: &str) -> Option<u16> {
    let lower = weight.trim().to_ascii_lowercase().replace(['-', ' ', '_'], "");
    if let Ok(num) = lower.parse::<f64>() {
        return (num > 0.0).then(|| num.round() as u16);
    }
    match lower.as_str() {
        "thin" | "hairline" => Some(100),
        "extralight" | "ultralight" => Some(200),
        "light" => Some(300),
        "normal" | "regular" | "book" => Some(400),
        "medium" => Some(500),
        "semibold" | "demibold" => Some(600),
        "bold" => Some(700),
        "extrabold" | "ultrabold" => Some(800),
        "black" | "heavy" => Some(900),
        _ => None,
    }
}
