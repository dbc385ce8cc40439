//! Canonical data model shared by the extractor, matcher, analyzer and report.
//!
//! - [`component`] - design-side [`ComponentRecord`]s
//! - [`element`] - page-side [`ExtractedElement`]s
//! - [`report`] - deviations, per-component results and the final report

pub mod component;
pub mod element;
pub mod report;

pub use component::{
    font_weight_value, BoundingBox, ComponentRecord, FontWeight, Spacing, StyleProps, Typography,
};
pub use element::{
    BackgroundStyle, BoxSpacing, Effects, ElementStyles, ExtractedElement, FlexLayout, GridLayout,
    LayoutStyle, Sides, TextStyle, TruncationNotice,
};
pub use report::{
    ComparisonReport, ComparisonResult, ComparisonStatus, Deviation, Match, MatchPair,
    MatchingMode, ReportMetadata, ReportSummary, Severity, SeverityCounts, StatusCounts,
    Unfetched, UnfetchedStatus,
};
