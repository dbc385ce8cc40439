//! Component-to-element matching.
//!
//! Each (component, element) pair gets a score in `[0, 1]` from up to four
//! weighted factors. Factors that cannot be computed for a pair (no element
//! text, unknown component type, no bounding box, no comparable colors) are
//! dropped and the remaining weights renormalized.

use std::cmp::Ordering;

use crate::color::{color_similarity, parse_color, CssColor};
use crate::config::MatchingSettings;
use crate::types::{ComponentRecord, ExtractedElement, MatchPair, MatchingMode};

const NAME_WEIGHT: f64 = 0.3;
const TYPE_WEIGHT: f64 = 0.2;
const BOX_WEIGHT: f64 = 0.3;
const COLOR_WEIGHT: f64 = 0.2;

const TYPE_MATCH: f64 = 1.0;
const TYPE_MISMATCH: f64 = 0.3;

/// Longest element text considered for name similarity.
const MAX_TEXT_CHARS: usize = 200;

/// Best element for one component. `element` is `None` when nothing scored
/// above the threshold; `score` is then the best score seen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComponentMatch {
    pub element: Option<usize>,
    pub score: f64,
    /// Exclusive mode only: an element cleared the threshold but went to a
    /// higher-scoring component.
    pub claimed: bool,
}

impl ComponentMatch {
    fn unmatched(score: f64) -> Self {
        Self {
            element: None,
            score,
            claimed: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MatchingEngine {
    min_score: f64,
    exclusive: bool,
}

impl Default for MatchingEngine {
    fn default() -> Self {
        Self::from_settings(&MatchingSettings::default())
    }
}

impl MatchingEngine {
    pub fn new(min_score: f64, exclusive: bool) -> Self {
        Self {
            min_score,
            exclusive,
        }
    }

    pub fn from_settings(settings: &MatchingSettings) -> Self {
        Self::new(settings.min_score, settings.exclusive)
    }

    pub fn mode(&self) -> MatchingMode {
        if self.exclusive {
            MatchingMode::Exclusive
        } else {
            MatchingMode::Greedy
        }
    }

    /// One entry per component, in input order.
    pub fn match_components(
        &self,
        components: &[ComponentRecord],
        elements: &[ExtractedElement],
    ) -> Vec<ComponentMatch> {
        let prepared: Vec<PreparedElement<'_>> = elements.iter().map(PreparedElement::new).collect();
        let scores: Vec<Vec<f64>> = components
            .iter()
            .map(|c| {
                let pc = PreparedComponent::new(c);
                prepared.iter().map(|e| pc.score(e)).collect()
            })
            .collect();

        if self.exclusive {
            self.assign_exclusive(&scores)
        } else {
            self.assign_greedy(&scores)
        }
    }

    fn assign_greedy(&self, scores: &[Vec<f64>]) -> Vec<ComponentMatch> {
        scores
            .iter()
            .map(|row| {
                let (best_idx, best) = argmax(row);
                ComponentMatch {
                    element: best_idx.filter(|_| best > self.min_score),
                    score: best,
                    claimed: false,
                }
            })
            .collect()
    }

    fn assign_exclusive(&self, scores: &[Vec<f64>]) -> Vec<ComponentMatch> {
        let mut candidates: Vec<(usize, usize, f64)> = scores
            .iter()
            .enumerate()
            .flat_map(|(ci, row)| {
                row.iter()
                    .enumerate()
                    .filter(|(_, s)| **s > self.min_score)
                    .map(move |(ei, s)| (ci, ei, *s))
            })
            .collect();
        candidates.sort_by(|a, b| {
            b.2.partial_cmp(&a.2)
                .unwrap_or(Ordering::Equal)
                .then(a.0.cmp(&b.0))
                .then(a.1.cmp(&b.1))
        });

        let element_count = scores.first().map(Vec::len).unwrap_or(0);
        let mut taken = vec![false; element_count];
        let mut out: Vec<ComponentMatch> = scores
            .iter()
            .map(|row| ComponentMatch::unmatched(argmax(row).1))
            .collect();

        for (ci, ei, score) in candidates {
            if out[ci].element.is_some() {
                continue;
            }
            if taken[ei] {
                out[ci].claimed = true;
                continue;
            }
            taken[ei] = true;
            out[ci] = ComponentMatch {
                element: Some(ei),
                score,
                claimed: false,
            };
        }
        out
    }
}

/// Matched pairs in component order.
pub fn match_pairs(
    components: &[ComponentRecord],
    elements: &[ExtractedElement],
    matches: &[ComponentMatch],
) -> Vec<MatchPair> {
    components
        .iter()
        .zip(matches)
        .filter_map(|(c, m)| {
            let el = elements.get(m.element?)?;
            Some(MatchPair {
                component_id: c.id.clone(),
                selector: el.selector.clone(),
                score: m.score,
            })
        })
        .collect()
}

/// Score a single pair. Pure and deterministic.
pub fn match_score(component: &ComponentRecord, element: &ExtractedElement) -> f64 {
    PreparedComponent::new(component).score(&PreparedElement::new(element))
}

/// First index wins ties.
fn argmax(row: &[f64]) -> (Option<usize>, f64) {
    let mut best: (Option<usize>, f64) = (None, 0.0);
    for (i, s) in row.iter().enumerate() {
        if best.0.is_none() || *s > best.1 {
            best = (Some(i), *s);
        }
    }
    best
}

struct PreparedComponent<'a> {
    record: &'a ComponentRecord,
    label: Option<String>,
    tags: Option<&'static [&'static str]>,
    background: Option<CssColor>,
    color: Option<CssColor>,
}

impl<'a> PreparedComponent<'a> {
    fn new(record: &'a ComponentRecord) -> Self {
        let props = &record.style_props;
        Self {
            record,
            label: normalize_label(&record.name),
            tags: compatible_tags(&record.component_type),
            background: props.background_color.as_deref().and_then(visible_color),
            color: props.color.as_deref().and_then(visible_color),
        }
    }

    fn score(&self, element: &PreparedElement<'_>) -> f64 {
        let mut weighted = 0.0;
        let mut total = 0.0;
        let mut add = |weight: f64, value: Option<f64>| {
            if let Some(v) = value {
                weighted += weight * v.clamp(0.0, 1.0);
                total += weight;
            }
        };

        add(NAME_WEIGHT, self.name_similarity(element));
        add(TYPE_WEIGHT, self.type_similarity(element));
        add(BOX_WEIGHT, self.box_similarity(element));
        add(COLOR_WEIGHT, self.color_similarity(element));

        if total > 0.0 {
            weighted / total
        } else {
            0.0
        }
    }

    fn name_similarity(&self, element: &PreparedElement<'_>) -> Option<f64> {
        let (a, b) = (self.label.as_deref()?, element.label.as_deref()?);
        Some(string_similarity(a, b))
    }

    fn type_similarity(&self, element: &PreparedElement<'_>) -> Option<f64> {
        let tags = self.tags?;
        let tag = element.element.tag_name.to_ascii_lowercase();
        Some(if tags.contains(&tag.as_str()) {
            TYPE_MATCH
        } else {
            TYPE_MISMATCH
        })
    }

    fn box_similarity(&self, element: &PreparedElement<'_>) -> Option<f64> {
        let a = self.record.bounding_box?;
        let b = element.element.bounding_rect;
        let dw = relative_delta(a.width, b.width);
        let dh = relative_delta(a.height, b.height);
        Some((1.0 - (dw + dh) / 2.0).clamp(0.0, 1.0))
    }

    fn color_similarity(&self, element: &PreparedElement<'_>) -> Option<f64> {
        if let (Some(a), Some(b)) = (&self.background, &element.background) {
            return Some(color_similarity(a, b));
        }
        if let (Some(a), Some(b)) = (&self.color, &element.color) {
            return Some(color_similarity(a, b));
        }
        None
    }
}

struct PreparedElement<'a> {
    element: &'a ExtractedElement,
    label: Option<String>,
    background: Option<CssColor>,
    color: Option<CssColor>,
}

impl<'a> PreparedElement<'a> {
    fn new(element: &'a ExtractedElement) -> Self {
        let text: String = element.text.chars().take(MAX_TEXT_CHARS).collect();
        Self {
            element,
            label: normalize_label(&text),
            background: element
                .styles
                .background
                .background_color
                .as_deref()
                .and_then(visible_color),
            color: visible_color(&element.styles.typography.color),
        }
    }
}

fn visible_color(raw: &str) -> Option<CssColor> {
    parse_color(raw).ok().filter(|c| !c.is_transparent())
}

fn compatible_tags(component_type: &str) -> Option<&'static [&'static str]> {
    let tags: &'static [&'static str] = match component_type.trim().to_ascii_uppercase().as_str() {
        "TEXT" => &["p", "span", "h1", "h2", "h3", "h4", "h5", "h6", "label"],
        "FRAME" => &["div", "section", "article", "main"],
        "RECTANGLE" => &["div", "span", "hr", "img"],
        "INSTANCE" | "COMPONENT" => &["button", "a", "input", "select", "textarea", "div"],
        "VECTOR" => &["svg", "path", "img", "i"],
        "GROUP" => &["div", "g", "section"],
        _ => return None,
    };
    Some(tags)
}

/// `|a - b| / max(a, b)`; zero when both are zero.
fn relative_delta(a: f64, b: f64) -> f64 {
    let max = a.abs().max(b.abs());
    if max <= f64::EPSILON {
        0.0
    } else {
        ((a - b).abs() / max).min(1.0)
    }
}

/// Lowercase, keep alphanumerics, collapse whitespace.
fn normalize_label(input: &str) -> Option<String> {
    let cleaned: String = input
        .to_lowercase()
        .chars()
        .map(|ch| if ch.is_alphanumeric() { ch } else { ' ' })
        .collect();
    let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    (!collapsed.is_empty()).then_some(collapsed)
}

/// `1 - levenshtein / max_len`.
pub fn string_similarity(a: &str, b: &str) -> f64 {
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    1.0 - levenshtein_distance(a, b) as f64 / max_len as f64
}

fn levenshtein_distance(a: &str, b: &str) -> usize {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    if a_chars.is_empty() {
        return b_chars.len();
    }
    if b_chars.is_empty() {
        return a_chars.len();
    }

    let mut prev: Vec<usize> = (0..=b_chars.len()).collect();
    let mut curr = vec![0usize; b_chars.len() + 1];
    for (i, ca) in a_chars.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b_chars.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b_chars.len()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BackgroundStyle, BoundingBox, ElementStyles, StyleProps, TextStyle};
    use proptest::prelude::*;

    fn element(tag: &str, text: &str, w: f64, h: f64, bg: Option<&str>) -> ExtractedElement {
        ExtractedElement {
            selector: format!("{tag}.x"),
            tag_name: tag.to_string(),
            text: text.to_string(),
            styles: ElementStyles {
                typography: TextStyle {
                    color: "rgb(0, 0, 0)".to_string(),
                    ..TextStyle::default()
                },
                background: BackgroundStyle {
                    background_color: bg.map(str::to_string),
                    ..BackgroundStyle::default()
                },
                ..ElementStyles::default()
            },
            bounding_rect: BoundingBox::new(0.0, 0.0, w, h),
        }
    }

    fn component(name: &str, ty: &str, bbox: Option<(f64, f64)>, bg: Option<&str>) -> ComponentRecord {
        ComponentRecord {
            id: name.to_lowercase(),
            name: name.to_string(),
            component_type: ty.to_string(),
            bounding_box: bbox.map(|(w, h)| BoundingBox::new(0.0, 0.0, w, h)),
            style_props: StyleProps {
                background_color: bg.map(str::to_string),
                ..StyleProps::default()
            },
        }
    }

    #[test]
    fn levenshtein_basics() {
        assert_eq!(levenshtein_distance("kitten", "sitting"), 3);
        assert_eq!(levenshtein_distance("", "abc"), 3);
        assert_eq!(levenshtein_distance("same", "same"), 0);
        assert!((string_similarity("submit", "submit") - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn perfect_pair_scores_one() {
        let c = component("Sign in", "INSTANCE", Some((120.0, 40.0)), Some("#3366FF"));
        let e = element("button", "Sign in", 120.0, 40.0, Some("rgb(51, 102, 255)"));
        assert!((match_score(&c, &e) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn weights_renormalize_over_available_factors() {
        // Unknown type, no bbox, no colors: only name similarity counts.
        let c = component("Hello", "SLICE", None, None);
        let mut e = element("div", "Hello", 10.0, 10.0, None);
        e.styles.typography.color.clear();
        assert!((match_score(&c, &e) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn type_mismatch_uses_floor_value() {
        let c = component("x", "TEXT", None, None);
        let mut e = element("button", "", 10.0, 10.0, None);
        e.styles.typography.color.clear();
        assert!((match_score(&c, &e) - TYPE_MISMATCH).abs() < 1e-9);
    }

    #[test]
    fn greedy_allows_shared_elements_and_keeps_first_on_ties() {
        let comps = vec![
            component("Title", "TEXT", Some((200.0, 30.0)), None),
            component("Title", "TEXT", Some((200.0, 30.0)), None),
        ];
        let els = vec![
            element("h1", "Title", 200.0, 30.0, None),
            element("h1", "Title", 200.0, 30.0, None),
        ];
        let out = MatchingEngine::default().match_components(&comps, &els);
        assert_eq!(out[0].element, Some(0));
        assert_eq!(out[1].element, Some(0));
    }

    #[test]
    fn exclusive_assigns_each_element_once() {
        let comps = vec![
            component("Title", "TEXT", Some((200.0, 30.0)), None),
            component("Title", "TEXT", Some((200.0, 30.0)), None),
        ];
        let els = vec![
            element("h1", "Title", 200.0, 30.0, None),
            element("h1", "Title", 200.0, 30.0, None),
        ];
        let engine = MatchingEngine::new(0.3, true);
        assert_eq!(engine.mode(), MatchingMode::Exclusive);
        let out = engine.match_components(&comps, &els);
        assert_eq!(out[0].element, Some(0));
        assert_eq!(out[1].element, Some(1));
        let pairs = match_pairs(&comps, &els, &out);
        assert_eq!(pairs.len(), 2);
        assert!(out.iter().all(|m| !m.claimed));
    }

    #[test]
    fn exclusive_loser_is_marked_claimed() {
        let comps = vec![
            component("Title", "TEXT", Some((200.0, 30.0)), None),
            component("Title", "TEXT", Some((200.0, 30.0)), None),
        ];
        let els = vec![element("h1", "Title", 200.0, 30.0, None)];
        let out = MatchingEngine::new(0.3, true).match_components(&comps, &els);
        assert_eq!(out[0].element, Some(0));
        assert!(!out[0].claimed);
        assert_eq!(out[1].element, None);
        assert!(out[1].claimed);
        assert!(out[1].score > 0.3);

        let greedy = MatchingEngine::new(0.3, false).match_components(&comps, &els);
        assert!(greedy.iter().all(|m| !m.claimed));
    }

    #[test]
    fn nothing_above_threshold_is_unmatched() {
        let comps = vec![component("Checkout total", "TEXT", Some((400.0, 20.0)), Some("#000000"))];
        let els = vec![element("div", "zzzz", 10.0, 900.0, Some("#FFFFFF"))];
        let out = MatchingEngine::default().match_components(&comps, &els);
        assert_eq!(out[0].element, None);
        assert!(out[0].score <= 0.3);
    }

    #[test]
    fn empty_elements_yield_unmatched_with_zero_score() {
        let comps = vec![component("A", "TEXT", None, None)];
        let out = MatchingEngine::default().match_components(&comps, &[]);
        assert_eq!(out, vec![ComponentMatch::unmatched(0.0)]);
    }

    proptest! {
        #[test]
        fn score_is_bounded_and_deterministic(
            name in "[a-zA-Z ]{0,20}",
            text in "[a-zA-Z ]{0,20}",
            cw in 0.0f64..1000.0,
            ch in 0.0f64..1000.0,
            ew in 0.0f64..1000.0,
            eh in 0.0f64..1000.0,
        ) {
            let c = component(&name, "FRAME", Some((cw, ch)), Some("#102030"));
            let e = element("section", &text, ew, eh, Some("rgb(40, 50, 60)"));
            let s1 = match_score(&c, &e);
            let s2 = match_score(&c, &e);
            prop_assert!((0.0..=1.0).contains(&s1));
            prop_assert_eq!(s1.to_bits(), s2.to_bits());
        }
    }
}
