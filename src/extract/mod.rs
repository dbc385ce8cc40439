//! Web data extraction from a ready [`BrowserSession`].

mod raw;
mod script;

use tracing::{debug, warn};

use crate::browser::BrowserSession;
use crate::config::DEFAULT_MAX_ELEMENTS;
use crate::context::OperationContext;
use crate::error::{Result, SpcError};
use crate::types::{ExtractedElement, TruncationNotice};

use raw::{convert_node, RawExtraction};

#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub page_url: Option<String>,
    pub page_title: Option<String>,
    pub elements: Vec<ExtractedElement>,
    /// Set when the scope held more elements than were processed.
    pub truncation: Option<TruncationNotice>,
    /// Processed elements dropped for zero area or `display: none`.
    pub skipped: usize,
}

#[derive(Debug, Clone)]
pub struct WebExtractor {
    max_elements: usize,
}

impl Default for WebExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ELEMENTS)
    }
}

impl WebExtractor {
    pub fn new(max_elements: usize) -> Self {
        Self {
            max_elements: max_elements.max(1),
        }
    }

    /// Extract rendered elements inside `selector` (the whole document when
    /// `None`). A selector that matches nothing is an error.
    pub async fn extract(
        &self,
        session: &mut BrowserSession,
        selector: Option<&str>,
        ctx: &OperationContext,
    ) -> Result<Extraction> {
        let script = script::extraction_script(selector, self.max_elements)?;
        let value = session.evaluate(&script, ctx).await?;
        let raw: RawExtraction = serde_json::from_value(value)?;
        self.process(raw, selector)
    }

    fn process(&self, raw: RawExtraction, selector: Option<&str>) -> Result<Extraction> {
        match raw.status.as_str() {
            "ok" => {}
            "selector_not_found" => {
                return Err(SpcError::SelectorNotFound(
                    selector.unwrap_or_default().to_string(),
                ))
            }
            "invalid_selector" => {
                return Err(SpcError::SelectorNotFound(format!(
                    "{} ({})",
                    selector.unwrap_or_default(),
                    raw.message.as_deref().unwrap_or("invalid selector")
                )))
            }
            other => {
                return Err(SpcError::browser(format!(
                    "unexpected extraction status '{other}'"
                )))
            }
        }

        let processed = raw.nodes.len().min(self.max_elements);
        let truncation = (raw.total > processed).then_some(TruncationNotice {
            total: raw.total,
            processed,
        });
        if let Some(notice) = &truncation {
            warn!(
                total = notice.total,
                processed = notice.processed,
                "element cap reached; remaining elements dropped"
            );
        }

        let mut skipped = 0;
        let elements: Vec<ExtractedElement> = raw
            .nodes
            .into_iter()
            .take(self.max_elements)
            .filter_map(|node| {
                let converted = convert_node(node);
                if converted.is_none() {
                    skipped += 1;
                }
                converted
            })
            .collect();

        debug!(
            elements = elements.len(),
            skipped,
            url = raw.url.as_deref().unwrap_or(""),
            "extraction complete"
        );

        Ok(Extraction {
            page_url: raw.url,
            page_title: raw.title,
            elements,
            truncation,
            skipped,
        })
    }
}
