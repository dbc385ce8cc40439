//! Page-side records produced by the extractor.

use serde::{Deserialize, Serialize};

use super::component::BoundingBox;

/// One rendered element with its geometry and computed style.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedElement {
    /// Stable selector: `#id`, else `tag.class1.class2`, else `tag`.
    pub selector: String,
    pub tag_name: String,
    pub text: String,
    pub styles: ElementStyles,
    pub bounding_rect: BoundingBox,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementStyles {
    pub typography: TextStyle,
    pub background: BackgroundStyle,
    pub spacing: BoxSpacing,
    pub effects: Effects,
    pub layout: LayoutStyle,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextStyle {
    pub font_family: String,
    pub font_size: f64,
    pub font_weight: String,
    pub line_height: String,
    pub letter_spacing: String,
    pub text_align: String,
    pub color: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackgroundStyle {
    /// `None` when the computed background is fully transparent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
    pub border_color: String,
    pub border_radius: f64,
    pub border_width: f64,
    pub border_style: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sides {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoxSpacing {
    pub margin: Sides,
    pub padding: Sides,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Effects {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub box_shadow: Option<String>,
    pub opacity: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutStyle {
    pub display: String,
    pub position: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flex: Option<FlexLayout>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grid: Option<GridLayout>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlexLayout {
    pub direction: String,
    pub wrap: String,
    pub justify_content: String,
    pub align_items: String,
    pub gap: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridLayout {
    pub template_columns: String,
    pub template_rows: String,
    pub gap: String,
}

/// Reported when more elements matched the scope than were processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TruncationNotice {
    pub total: usize,
    pub processed: usize,
}
