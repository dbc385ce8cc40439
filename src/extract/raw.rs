//! Raw extraction payload and conversion into [`ExtractedElement`]s.

use serde::Deserialize;

use crate::color::parse_color;
use crate::types::{
    BackgroundStyle, BoundingBox, BoxSpacing, Effects, ElementStyles, ExtractedElement,
    FlexLayout, GridLayout, LayoutStyle, Sides, TextStyle,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawExtraction {
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub total: usize,
    #[serde(default)]
    pub nodes: Vec<RawNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawNode {
    pub tag: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub classes: Vec<String>,
    #[serde(default)]
    pub text: Option<String>,
    pub rect: RawRect,
    #[serde(default)]
    pub style: RawStyle,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct RawStyle {
    pub font_family: String,
    pub font_size: f64,
    pub font_weight: String,
    pub line_height: String,
    pub letter_spacing: String,
    pub text_align: String,
    pub color: String,
    pub background_color: String,
    pub border_color: String,
    pub border_radius: f64,
    pub border_width: f64,
    pub border_style: String,
    pub margin: Sides,
    pub padding: Sides,
    pub box_shadow: String,
    pub opacity: Option<f64>,
    pub transform: String,
    pub display: String,
    pub position: String,
    pub flex: Option<FlexLayout>,
    pub grid: Option<GridLayout>,
}

/// `None` for nodes that are not rendered (zero area or `display: none`).
pub(crate) fn convert_node(raw: RawNode) -> Option<ExtractedElement> {
    let rect = BoundingBox::new(raw.rect.x, raw.rect.y, raw.rect.width, raw.rect.height);
    if rect.area() <= 0.0 || raw.style.display.trim() == "none" {
        return None;
    }

    let selector = stable_selector(&raw.tag, raw.id.as_deref(), &raw.classes);
    let s = raw.style;
    Some(ExtractedElement {
        selector,
        tag_name: raw.tag,
        text: raw.text.unwrap_or_default(),
        styles: ElementStyles {
            typography: TextStyle {
                font_family: s.font_family,
                font_size: s.font_size,
                font_weight: s.font_weight,
                line_height: s.line_height,
                letter_spacing: s.letter_spacing,
                text_align: s.text_align,
                color: s.color,
            },
            background: BackgroundStyle {
                background_color: visible_background(s.background_color),
                border_color: s.border_color,
                border_radius: s.border_radius,
                border_width: s.border_width,
                border_style: s.border_style,
            },
            spacing: BoxSpacing {
                margin: s.margin,
                padding: s.padding,
            },
            effects: Effects {
                box_shadow: unless_none(s.box_shadow),
                opacity: s.opacity.unwrap_or(1.0),
                transform: unless_none(s.transform),
            },
            layout: LayoutStyle {
                display: s.display,
                position: s.position,
                flex: s.flex,
                grid: s.grid,
            },
        },
        bounding_rect: rect,
    })
}

fn visible_background(raw: String) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    match parse_color(trimmed) {
        Ok(c) if c.is_transparent() => None,
        _ => Some(raw),
    }
}

fn unless_none(raw: String) -> Option<String> {
    let trimmed = raw.trim();
    (!trimmed.is_empty() && trimmed != "none").then_some(raw)
}

/// `#id`, else `tag.class1.class2` (two classes at most), else `tag`.
pub(crate) fn stable_selector(tag: &str, id: Option<&str>, classes: &[String]) -> String {
    if let Some(id) = id.map(str::trim).filter(|s| !s.is_empty()) {
        return format!("#{}", css_escape(id));
    }
    let mut selector = tag.to_ascii_lowercase();
    for class in classes.iter().filter(|c| !c.trim().is_empty()).take(2) {
        selector.push('.');
        selector.push_str(&css_escape(class.trim()));
    }
    selector
}

/// Escape an identifier the way `CSS.escape` does for the common cases.
fn css_escape(ident: &str) -> String {
    let mut out = String::with_capacity(ident.len());
    for (i, ch) in ident.chars().enumerate() {
        match ch {
            '0'..='9' if i == 0 => out.push_str(&format!("\\3{ch} ")),
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' => out.push(ch),
            c if !c.is_ascii() => out.push(c),
            c => {
                out.push('\\');
                out.push(c);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(json: serde_json::Value) -> RawNode {
        serde_json::from_value(json).expect("raw node")
    }

    #[test]
    fn selector_prefers_id_then_classes_then_tag() {
        assert_eq!(stable_selector("div", Some("hero"), &[]), "#hero");
        assert_eq!(
            stable_selector(
                "BUTTON",
                None,
                &["btn".to_string(), "btn-primary".to_string(), "lg".to_string()]
            ),
            "button.btn.btn-primary"
        );
        assert_eq!(stable_selector("section", Some("  "), &[]), "section");
    }

    #[test]
    fn selector_escapes_awkward_identifiers() {
        assert_eq!(stable_selector("div", Some("1col"), &[]), "#\\31 col");
        assert_eq!(
            stable_selector("div", None, &["md:flex".to_string()]),
            "div.md\\:flex"
        );
    }

    #[test]
    fn zero_area_and_hidden_nodes_are_skipped() {
        let zero = node(serde_json::json!({
            "tag": "span", "rect": {"x": 0, "y": 0, "width": 0, "height": 12}
        }));
        assert!(convert_node(zero).is_none());

        let hidden = node(serde_json::json!({
            "tag": "div", "rect": {"x": 0, "y": 0, "width": 10, "height": 10},
            "style": {"display": "none"}
        }));
        assert!(convert_node(hidden).is_none());
    }

    #[test]
    fn converts_styles_and_drops_defaults() {
        let raw = node(serde_json::json!({
            "tag": "button",
            "classes": ["cta"],
            "text": "Buy now",
            "rect": {"x": 10, "y": 20, "width": 120, "height": 40},
            "style": {
                "fontFamily": "Inter, sans-serif",
                "fontSize": 16,
                "fontWeight": "600",
                "color": "rgb(255, 255, 255)",
                "backgroundColor": "rgba(0, 0, 0, 0)",
                "borderRadius": 6,
                "padding": {"top": 8, "right": 16, "bottom": 8, "left": 16},
                "boxShadow": "none",
                "transform": "none",
                "display": "flex",
                "flex": {"direction": "row", "wrap": "nowrap", "justifyContent": "center",
                         "alignItems": "center", "gap": "8px"}
            }
        }));
        let el = convert_node(raw).expect("rendered");
        assert_eq!(el.selector, "button.cta");
        assert_eq!(el.text, "Buy now");
        assert!(el.styles.background.background_color.is_none());
        assert!(el.styles.effects.box_shadow.is_none());
        assert!(el.styles.effects.transform.is_none());
        assert_eq!(el.styles.effects.opacity, 1.0);
        assert_eq!(el.styles.spacing.padding.left, 16.0);
        assert_eq!(
            el.styles.layout.flex.as_ref().map(|f| f.justify_content.as_str()),
            Some("center")
        );
        assert!(el.styles.layout.grid.is_none());
    }
}
