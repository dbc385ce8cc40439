use crate::config::Viewport;
use crate::error::ErrorPayload;
use crate::pipeline::BatchItem;
use crate::types::ComparisonReport;
use serde::{Deserialize, Serialize};

/// Schema version for output payloads.
pub const SPC_OUTPUT_VERSION: &str = "0.1.0";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "kebab-case")]
pub enum SpcOutput {
    Compare(CompareOutput),
    Batch(BatchOutput),
    Error(ErrorOutput),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompareOutput {
    pub version: String,
    pub viewport: Viewport,
    #[serde(flatten)]
    pub report: ComparisonReport,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchOutput {
    pub version: String,
    pub viewport: Viewport,
    pub items: Vec<BatchEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchEntry {
    pub source_ref: String,
    pub target_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<ComparisonReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorPayload>,
}

impl From<BatchItem> for BatchEntry {
    fn from(item: BatchItem) -> Self {
        let (report, error) = match item.outcome {
            Ok(report) => (Some(report), None),
            Err(err) => (None, Some(err.to_payload())),
        };
        Self {
            source_ref: item.request.source_ref,
            target_url: item.request.target_url,
            report,
            error,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorOutput {
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub error: ErrorPayload,
}

impl ErrorOutput {
    pub fn new(error: ErrorPayload) -> Self {
        Self {
            version: SPC_OUTPUT_VERSION.to_string(),
            message: Some(error.message.clone()),
            error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SpcError;
    use crate::pipeline::ComparisonRequest;
    use crate::report::build_report;
    use crate::types::{MatchingMode, ReportMetadata};

    fn metadata() -> ReportMetadata {
        ReportMetadata {
            tool_version: "0.1.0".into(),
            source_ref: "components.json".into(),
            node_ref: None,
            target_url: "https://example.com".into(),
            page_url: None,
            page_title: Some("Example".into()),
            selector: None,
            started_at_ms: 0,
            elapsed_ms: 12,
            auth_warning: None,
            truncation: None,
            matching_mode: MatchingMode::Greedy,
            component_count: 0,
            element_count: 0,
            skipped_elements: 0,
        }
    }

    #[test]
    fn compare_output_flattens_report() {
        let output = SpcOutput::Compare(CompareOutput {
            version: SPC_OUTPUT_VERSION.to_string(),
            viewport: Viewport::default(),
            report: build_report(metadata(), Vec::new()),
        });

        let json = serde_json::to_string(&output).expect("serialize compare output");
        assert!(json.contains("\"mode\":\"compare\""));
        assert!(json.contains("\"totalDeviations\":0"));
        assert!(json.contains("\"matchingMode\":\"greedy\""));
        assert!(json.contains("\"pageTitle\":\"Example\""));
    }

    #[test]
    fn failed_batch_item_carries_error_payload() {
        let entry = BatchEntry::from(BatchItem {
            request: ComparisonRequest::new("components.json", "https://example.com"),
            outcome: Err(SpcError::Navigation {
                url: "https://example.com".into(),
                attempts: 3,
                message: "net::ERR_CONNECTION_REFUSED".into(),
            }),
        });
        assert!(entry.report.is_none());
        let json = serde_json::to_string(&entry).expect("serialize entry");
        assert!(json.contains("\"category\":\"network\""));
        assert!(!json.contains("\"report\""));
    }
}
