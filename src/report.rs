//! Folds per-component results into a [`ComparisonReport`].

use crate::types::{
    ComparisonReport, ComparisonResult, ComparisonStatus, ReportMetadata, ReportSummary,
    Severity, SeverityCounts, StatusCounts,
};

/// Counts by severity and status plus totals. `total_deviations` always
/// equals the sum of per-result deviation counts.
pub fn summarize(results: &[ComparisonResult]) -> ReportSummary {
    let mut by_severity = SeverityCounts::default();
    let mut by_status = StatusCounts::default();
    let mut total_deviations = 0;
    let mut total_matches = 0;
    let mut total_unfetched = 0;
    let mut score_sum = 0.0;
    let mut matched = 0usize;

    for result in results {
        match result.status {
            ComparisonStatus::Matches => by_status.matches += 1,
            ComparisonStatus::HasDeviations => by_status.has_deviations += 1,
            ComparisonStatus::NoMatch => by_status.no_match += 1,
            ComparisonStatus::PartialData => by_status.partial_data += 1,
            ComparisonStatus::Unfetched => by_status.unfetched += 1,
        }
        for deviation in &result.deviations {
            match deviation.severity {
                Severity::High => by_severity.high += 1,
                Severity::Medium => by_severity.medium += 1,
                Severity::Low => by_severity.low += 1,
            }
        }
        total_deviations += result.deviations.len();
        total_matches += result.matches.len();
        total_unfetched += result.unfetched.len();

        if result.status != ComparisonStatus::NoMatch {
            score_sum += result.match_score;
            matched += 1;
        }
    }

    let average_match_score =
        (matched > 0).then(|| (score_sum / matched as f64 * 100.0).round() / 100.0);

    ReportSummary {
        by_severity,
        by_status,
        total_components: results.len(),
        total_deviations,
        total_matches,
        total_unfetched,
        average_match_score,
    }
}

pub fn build_report(metadata: ReportMetadata, results: Vec<ComparisonResult>) -> ComparisonReport {
    let summary = summarize(&results);
    ComparisonReport {
        metadata,
        results,
        summary,
    }
}
