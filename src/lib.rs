//! Style Parity Checker (SPC) Library
//!
//! Compares design components against the rendered elements of a live page
//! and reports severity-graded style deviations (typography, color, spacing,
//! geometry).
//!
//! # Module Overview
//!
//! - [`browser`] - Resilient headless browser sessions and authentication
//! - [`extract`] - Computed-style extraction from a ready page
//! - [`source`] - Design component input
//! - [`matching`] - Component-to-element matching
//! - [`analysis`] - Property comparison and severity grading
//! - [`report`] - Result aggregation
//! - [`pipeline`] - End-to-end comparison and batch runs
//! - [`config`] - Configuration file support
//! - [`types`] - Core data types and structures
//! - [`output`] - JSON output schemas
//!
//! # Example
//!
//! ```no_run
//! # #[cfg(feature = "chromium")]
//! # async fn example() -> spc_lib::Result<()> {
//! use std::sync::Arc;
//! use spc_lib::{run_comparison, ChromiumDriver, ComparisonRequest, Config};
//! use spc_lib::{JsonComponentSource, OperationContext};
//!
//! let request = ComparisonRequest::new("components.json", "https://example.com");
//! let report = run_comparison(
//!     &request,
//!     &JsonComponentSource::new(),
//!     Arc::new(ChromiumDriver::new()),
//!     &Config::default(),
//!     &OperationContext::new(),
//! )
//! .await?;
//! println!("{} deviations", report.summary.total_deviations);
//! # Ok(())
//! # }
//! ```

pub mod analysis;
pub mod browser;
pub mod color;
pub mod config;
pub mod context;
pub mod error;
pub mod extract;
pub mod matching;
pub mod output;
pub mod pipeline;
pub mod report;
pub mod retry;
pub mod source;
pub mod types;

pub use analysis::{DeviationAnalyzer, SeverityTable, SeverityTables, Tolerances};
#[cfg(feature = "chromium")]
pub use browser::ChromiumDriver;
pub use browser::{
    with_session, AuthConfig, AuthOutcome, BrowserDriver, BrowserSession, PageHandle,
    SessionOptions, SessionState,
};
pub use config::{Config, Viewport};
pub use context::OperationContext;
pub use error::{ErrorCategory, ErrorPayload, Result, SpcError};
pub use extract::{Extraction, WebExtractor};
pub use matching::{match_score, ComponentMatch, MatchingEngine};
pub use output::{CompareOutput, ErrorOutput, SpcOutput, SPC_OUTPUT_VERSION};
pub use pipeline::{compare_records, run_batch, run_comparison, BatchItem, ComparisonRequest};
pub use report::{build_report, summarize};
pub use retry::{retry_with_backoff, RetryError, RetryPolicy};
pub use source::{DesignSource, JsonComponentSource};
pub use types::{
    ComparisonReport, ComparisonResult, ComparisonStatus, ComponentRecord, Deviation,
    ExtractedElement, Severity,
};
