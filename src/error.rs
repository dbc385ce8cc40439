use crate::browser::auth::AuthConfigError;
use crate::color::ColorParseError;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use url::ParseError;

#[derive(Debug, Error)]
pub enum SpcError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] ParseError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Browser initialization failed after {attempts} attempt(s): {message}")]
    Initialization { attempts: u32, message: String },

    #[error("Navigation to {url} failed after {attempts} attempt(s): {message}")]
    Navigation {
        url: String,
        attempts: u32,
        message: String,
    },

    #[error("Authentication ({strategy}) failed: {message}")]
    Authentication { strategy: String, message: String },

    #[error("Invalid auth config: {0}")]
    InvalidAuthConfig(#[from] AuthConfigError),

    #[error("Selector not found: {0}")]
    SelectorNotFound(String),

    #[error("Color parse error: {0}")]
    ColorParse(#[from] ColorParseError),

    #[error("Timeout during {operation} after {}", secs(.after))]
    Timeout {
        operation: String,
        after: Duration,
    },

    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Design source error: {0}")]
    DesignSource(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

fn secs(d: &Duration) -> String {
    format!("{:.1}s", d.as_secs_f64())
}

impl SpcError {
    pub fn browser(message: impl Into<String>) -> Self {
        SpcError::Browser(message.into())
    }

    pub fn timeout(operation: impl Into<String>, after: Duration) -> Self {
        SpcError::Timeout {
            operation: operation.into(),
            after,
        }
    }

    pub fn authentication(strategy: impl Into<String>, message: impl Into<String>) -> Self {
        SpcError::Authentication {
            strategy: strategy.into(),
            message: message.into(),
        }
    }

    pub fn design_source(message: impl Into<String>) -> Self {
        SpcError::DesignSource(message.into())
    }

    /// Whether a retry loop may try the failed operation again.
    ///
    /// Input errors and cancellation never improve on a second attempt.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            SpcError::Cancelled(_)
                | SpcError::Config(_)
                | SpcError::InvalidAuthConfig(_)
                | SpcError::InvalidUrl(_)
                | SpcError::SelectorNotFound(_)
        )
    }

    pub fn to_payload(&self) -> ErrorPayload {
        match self {
            SpcError::Io(e) => ErrorPayload::new(
                ErrorCategory::Config,
                e.to_string(),
                "Check file paths/permissions.",
            ),
            SpcError::InvalidUrl(e) => ErrorPayload::new(
                ErrorCategory::Config,
                e.to_string(),
                "Verify URL/format (e.g., https://example.com).",
            ),
            SpcError::Serialization(e) => ErrorPayload::new(
                ErrorCategory::Config,
                e.to_string(),
                "Check JSON inputs (components file, --auth); run with --verbose for details.",
            ),
            SpcError::Initialization { .. } => ErrorPayload::new(
                ErrorCategory::Browser,
                self.to_string(),
                "Ensure Chrome/Chromium is installed (or set browser.executable in the config) and can start headless.",
            ),
            SpcError::Navigation { .. } => ErrorPayload::new(
                ErrorCategory::Network,
                self.to_string(),
                "Check that the URL is reachable from this machine; try increasing --nav-timeout.",
            ),
            SpcError::Authentication { .. } => ErrorPayload::new(
                ErrorCategory::Auth,
                self.to_string(),
                "Verify credentials/selectors in the auth config; the page may require a different strategy.",
            ),
            SpcError::InvalidAuthConfig(e) => ErrorPayload::new(
                ErrorCategory::Auth,
                e.to_string(),
                "Supply every required field for the chosen auth type (see --help).",
            ),
            SpcError::SelectorNotFound(sel) => ErrorPayload::new(
                ErrorCategory::Extraction,
                format!("Selector not found: {sel}"),
                "Check --selector against the rendered page; the element may render late or behind auth.",
            ),
            SpcError::ColorParse(e) => ErrorPayload::new(
                ErrorCategory::Extraction,
                e.to_string(),
                "Use hex (#rgb, #rrggbb, #rrggbbaa) or rgb()/rgba() colors.",
            ),
            SpcError::Timeout { .. } => ErrorPayload::new(
                ErrorCategory::Timeout,
                self.to_string(),
                "Try increasing --nav-timeout or the [timeouts] section, or ensure the page loads without blocking.",
            ),
            SpcError::Cancelled(_) => ErrorPayload::new(
                ErrorCategory::Cancelled,
                self.to_string(),
                "The run was cancelled before completion; rerun to get a full report.",
            ),
            SpcError::Browser(msg) => ErrorPayload::new(
                ErrorCategory::Browser,
                msg.to_string(),
                "Re-run with --verbose; a crashed browser is restarted automatically on the next run.",
            ),
            SpcError::DesignSource(msg) => ErrorPayload::new(
                ErrorCategory::Source,
                msg.to_string(),
                "Check the components file is a JSON array or {\"components\": [...]} object.",
            ),
            SpcError::Config(msg) => {
                let lower = msg.to_ascii_lowercase();
                if lower.contains("viewport") {
                    ErrorPayload::new(
                        ErrorCategory::Config,
                        msg.to_string(),
                        "Use --viewport WIDTHxHEIGHT (e.g., 1440x900).",
                    )
                } else if lower.contains("severity") || lower.contains("tolerance") {
                    ErrorPayload::new(
                        ErrorCategory::Config,
                        msg.to_string(),
                        "Tolerances must be positive and each severity table needs medium < high.",
                    )
                } else {
                    ErrorPayload::new(
                        ErrorCategory::Config,
                        msg.to_string(),
                        "Check flags/paths and the config file (--config).",
                    )
                }
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, SpcError>;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    Config,
    Network,
    Browser,
    Auth,
    Extraction,
    Source,
    Timeout,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    pub category: ErrorCategory,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remediation: Option<String>,
}

impl ErrorPayload {
    pub fn new(category: ErrorCategory, message: String, remediation: impl Into<String>) -> Self {
        Self {
            category,
            message,
            remediation: Some(remediation.into()),
        }
    }
}
