//! Property-level comparison of matched component/element pairs.
//!
//! Every property of a matched pair ends up in exactly one of the
//! result's `deviations`, `matches` or `unfetched` lists. A property group
//! that only one side carries becomes a single [`Unfetched`] record; a group
//! neither side carries is skipped.

mod severity;

pub use severity::{SeverityTable, SeverityTables, Tolerances};

use serde_json::{json, Value};

use crate::color::{parse_color, rgb_distance};
use crate::config::Config;
use crate::matching::ComponentMatch;
use crate::types::{
    font_weight_value, ComparisonResult, ComparisonStatus, ComponentRecord, Deviation,
    ExtractedElement, Match, Severity, Sides, Unfetched, UnfetchedStatus,
};

#[derive(Debug, Clone, Default)]
pub struct DeviationAnalyzer {
    tolerances: Tolerances,
    severity: SeverityTables,
}

#[derive(Debug, Default)]
struct Outcome {
    deviations: Vec<Deviation>,
    matches: Vec<Match>,
    unfetched: Vec<Unfetched>,
}

impl Outcome {
    fn deviate(
        &mut self,
        property: &str,
        source: Value,
        target: Value,
        difference: Option<f64>,
        severity: Severity,
        message: String,
    ) {
        self.deviations.push(Deviation {
            property: property.to_string(),
            source_value: source,
            target_value: target,
            difference: difference.map(round2),
            severity,
            message,
        });
    }

    fn matched(&mut self, property: &str, value: Value, message: String) {
        self.matches.push(Match {
            property: property.to_string(),
            value,
            message,
        });
    }

    fn source_only(&mut self, property: &str, source: Value) {
        self.unfetched.push(Unfetched {
            property: property.to_string(),
            status: UnfetchedStatus::Unfetched,
            source_value: Some(source),
            target_value: None,
            message: format!("{property} is defined in the design but was not found on the page"),
        });
    }

    fn target_only(&mut self, property: &str, target: Value) {
        self.unfetched.push(Unfetched {
            property: property.to_string(),
            status: UnfetchedStatus::Unfetched,
            source_value: None,
            target_value: Some(target),
            message: format!("{property} is present on the page but missing from the design"),
        });
    }
}

impl DeviationAnalyzer {
    pub fn new(tolerances: Tolerances, severity: SeverityTables) -> Self {
        Self {
            tolerances,
            severity,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.tolerances.clone(), config.severity.clone())
    }

    /// Compare a matched pair.
    pub fn analyze(
        &self,
        component: &ComponentRecord,
        element: &ExtractedElement,
        score: f64,
    ) -> ComparisonResult {
        let mut out = Outcome::default();
        self.compare_typography(component, element, &mut out);
        self.compare_colors(component, element, &mut out);
        self.compare_spacing(component, element, &mut out);
        self.compare_border_radius(component, element, &mut out);
        self.compare_dimensions(component, element, &mut out);

        let status = derive_status(&out);
        ComparisonResult {
            component_id: component.id.clone(),
            component_name: component.name.clone(),
            selector: Some(element.selector.clone()),
            status,
            deviations: out.deviations,
            matches: out.matches,
            unfetched: out.unfetched,
            match_score: round2(score),
        }
    }

    /// Result for a component left without an element.
    pub fn unmatched(
        &self,
        component: &ComponentRecord,
        candidate: &ComponentMatch,
    ) -> ComparisonResult {
        let best_score = candidate.score;
        let message = if candidate.claimed {
            format!(
                "Best page element for '{}' was already claimed by a closer component (score {:.2})",
                component.name, best_score
            )
        } else {
            format!(
                "No page element matched '{}' (best score {:.2})",
                component.name, best_score
            )
        };
        ComparisonResult {
            component_id: component.id.clone(),
            component_name: component.name.clone(),
            selector: None,
            status: ComparisonStatus::NoMatch,
            deviations: vec![Deviation {
                property: "existence".to_string(),
                source_value: json!(component.name),
                target_value: Value::Null,
                difference: None,
                severity: Severity::High,
                message,
            }],
            matches: Vec::new(),
            unfetched: Vec::new(),
            match_score: round2(best_score),
        }
    }

    fn compare_typography(
        &self,
        component: &ComponentRecord,
        element: &ExtractedElement,
        out: &mut Outcome,
    ) {
        let text = &element.styles.typography;
        let Some(typo) = &component.style_props.typography else {
            if !element.text.trim().is_empty() {
                out.target_only(
                    "typography",
                    json!({
                        "fontFamily": text.font_family,
                        "fontSize": text.font_size,
                        "fontWeight": text.font_weight,
                    }),
                );
            }
            return;
        };

        let target_family = non_empty(&text.font_family);
        match (typo.font_family.as_deref().and_then(non_empty), target_family) {
            (Some(src), Some(dst)) => {
                let (a, b) = (normalize_font_family(src), normalize_font_family(dst));
                if a == b {
                    out.matched("fontFamily", json!(a), format!("Font family matches ({a})"));
                } else {
                    out.deviate(
                        "fontFamily",
                        json!(src),
                        json!(dst),
                        None,
                        Severity::Medium,
                        format!("Font family differs: expected '{a}', found '{b}'"),
                    );
                }
            }
            (Some(src), None) => out.source_only("fontFamily", json!(src)),
            (None, Some(dst)) => out.target_only("fontFamily", json!(dst)),
            (None, None) => {}
        }

        let target_size = (text.font_size > 0.0).then_some(text.font_size);
        match (typo.font_size, target_size) {
            (Some(src), Some(dst)) => self.numeric(
                out,
                "fontSize",
                src,
                dst,
                self.tolerances.font_size,
                self.severity.font_size.classify((dst - src).abs()),
            ),
            (Some(src), None) => out.source_only("fontSize", json!(src)),
            (None, Some(dst)) => out.target_only("fontSize", json!(dst)),
            (None, None) => {}
        }

        let target_weight = non_empty(&text.font_weight);
        match (&typo.font_weight, target_weight) {
            (Some(src), Some(dst)) => match (src.numeric(), font_weight_value(dst)) {
                (Some(a), Some(b)) if a == b => {
                    out.matched("fontWeight", json!(a), format!("Font weight matches ({a})"))
                }
                (Some(a), Some(b)) => out.deviate(
                    "fontWeight",
                    json!(a),
                    json!(b),
                    Some((a as f64 - b as f64).abs()),
                    Severity::Low,
                    format!("Font weight differs: expected {a}, found {b}"),
                ),
                _ => out.deviate(
                    "fontWeight",
                    json!(src.to_string()),
                    json!(dst),
                    None,
                    Severity::Low,
                    format!("Unable to compare font weight '{src}' with '{dst}'"),
                ),
            },
            (Some(src), None) => out.source_only("fontWeight", json!(src.to_string())),
            (None, Some(dst)) => out.target_only("fontWeight", json!(dst)),
            (None, None) => {}
        }
    }

    fn compare_colors(
        &self,
        component: &ComponentRecord,
        element: &ExtractedElement,
        out: &mut Outcome,
    ) {
        let props = &component.style_props;
        let pairs = [
            (
                "color",
                props.color.as_deref(),
                non_empty(&element.styles.typography.color),
            ),
            (
                "backgroundColor",
                props.background_color.as_deref(),
                element.styles.background.background_color.as_deref(),
            ),
        ];

        for (property, source, target) in pairs {
            match (source.and_then(non_empty), target.and_then(non_empty)) {
                (Some(src), Some(dst)) => self.color(out, property, src, dst),
                (Some(src), None) => out.source_only(property, json!(src)),
                (None, Some(dst)) => out.target_only(property, json!(dst)),
                (None, None) => {}
            }
        }
    }

    fn color(&self, out: &mut Outcome, property: &str, src: &str, dst: &str) {
        let (a, b) = match (parse_color(src), parse_color(dst)) {
            (Ok(a), Ok(b)) => (a, b),
            (Err(e), _) | (_, Err(e)) => {
                out.deviate(
                    property,
                    json!(src),
                    json!(dst),
                    None,
                    Severity::Low,
                    format!("Unable to compare {property}: {e}"),
                );
                return;
            }
        };

        let distance = rgb_distance(&a, &b);
        if distance > self.tolerances.color_difference {
            out.deviate(
                property,
                json!(src),
                json!(dst),
                Some(distance),
                self.severity.color.classify(distance),
                format!(
                    "{property} differs: expected {}, found {} (distance {:.1})",
                    a.to_hex(),
                    b.to_hex(),
                    distance
                ),
            );
        } else {
            out.matched(
                property,
                json!(a.to_hex()),
                format!("{property} matches within tolerance (distance {distance:.1})"),
            );
        }
    }

    fn compare_spacing(
        &self,
        component: &ComponentRecord,
        element: &ExtractedElement,
        out: &mut Outcome,
    ) {
        let padding = element.styles.spacing.padding;
        let Some(spacing) = &component.style_props.spacing else {
            if !is_zero(&padding) {
                out.target_only("padding", json!(padding));
            }
            return;
        };

        let sides = [
            ("paddingTop", spacing.top, padding.top),
            ("paddingRight", spacing.right, padding.right),
            ("paddingBottom", spacing.bottom, padding.bottom),
            ("paddingLeft", spacing.left, padding.left),
        ];
        for (property, source, target) in sides {
            match source {
                Some(src) => self.numeric(
                    out,
                    property,
                    src,
                    target,
                    self.tolerances.spacing,
                    self.severity.spacing.classify((target - src).abs()),
                ),
                None => out.target_only(property, json!(target)),
            }
        }
    }

    fn compare_border_radius(
        &self,
        component: &ComponentRecord,
        element: &ExtractedElement,
        out: &mut Outcome,
    ) {
        let target = element.styles.background.border_radius;
        match component.style_props.border_radius {
            Some(src) => self.numeric(
                out,
                "borderRadius",
                src,
                target,
                self.tolerances.border_radius,
                self.severity.size.classify((target - src).abs()),
            ),
            None if target > 0.0 => out.target_only("borderRadius", json!(target)),
            None => {}
        }
    }

    fn compare_dimensions(
        &self,
        component: &ComponentRecord,
        element: &ExtractedElement,
        out: &mut Outcome,
    ) {
        let rect = element.bounding_rect;
        let Some(bbox) = component.bounding_box else {
            out.target_only(
                "dimensions",
                json!({ "width": rect.width, "height": rect.height }),
            );
            return;
        };

        for (property, src, dst) in [
            ("width", bbox.width, rect.width),
            ("height", bbox.height, rect.height),
        ] {
            self.numeric(
                out,
                property,
                src,
                dst,
                self.tolerances.dimensions,
                self.severity.size.classify((dst - src).abs()),
            );
        }
    }

    /// Shared tolerance check for px-valued properties.
    fn numeric(
        &self,
        out: &mut Outcome,
        property: &str,
        src: f64,
        dst: f64,
        tolerance: f64,
        severity: Severity,
    ) {
        let diff = (dst - src).abs();
        if diff > tolerance {
            out.deviate(
                property,
                json!(src),
                json!(dst),
                Some(diff),
                severity,
                format!(
                    "{property} differs by {diff:.1}px (expected {src}, found {dst}, tolerance {tolerance}px)"
                ),
            );
        } else {
            out.matched(
                property,
                json!(src),
                format!("{property} within tolerance ({diff:.1}px <= {tolerance}px)"),
            );
        }
    }
}

/// Matched-pair status; unmatched components are always `no_match`.
fn derive_status(out: &Outcome) -> ComparisonStatus {
    if !out.deviations.is_empty() {
        ComparisonStatus::HasDeviations
    } else if !out.unfetched.is_empty() && out.matches.is_empty() {
        ComparisonStatus::Unfetched
    } else if !out.unfetched.is_empty() {
        ComparisonStatus::PartialData
    } else {
        ComparisonStatus::Matches
    }
}

/// Strip quotes, keep the first family in the stack, lowercase.
pub fn normalize_font_family(family: &str) -> String {
    family
        .split(',')
        .next()
        .unwrap_or_default()
        .trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .trim()
        .to_lowercase()
}

fn non_empty(s: &str) -> Option<&str> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

fn is_zero(sides: &Sides) -> bool {
    [sides.top, sides.right, sides.bottom, sides.left]
        .iter()
        .all(|v| v.abs() < f64::EPSILON)
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
