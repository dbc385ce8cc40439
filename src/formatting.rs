use std::fmt::Write as FmtWrite;
use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use spc_lib::output::{BatchOutput, CompareOutput};
use spc_lib::types::{ComparisonReport, ComparisonStatus, Severity};
use spc_lib::{ErrorOutput, SpcError, SpcOutput};

use crate::cli::OutputFormat;

/// Results listed in the human summary before eliding the rest.
const PRETTY_RESULT_LIMIT: usize = 20;

/// Write output in the requested format.
pub fn write_output(
    body: &SpcOutput,
    format: OutputFormat,
    output: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    match format {
        OutputFormat::Json => write_json_output(body, output.as_deref())?,
        OutputFormat::Pretty => write_pretty_output(body, output.as_deref())?,
    };
    Ok(())
}

/// Render an error and return the appropriate exit code.
pub fn render_error(err: SpcError, format: OutputFormat, output: Option<PathBuf>) -> ExitCode {
    let payload = SpcOutput::Error(ErrorOutput::new(err.to_payload()));

    match format {
        OutputFormat::Json => {
            let content =
                serde_json::to_string(&payload).unwrap_or_else(|_| "{\"mode\":\"error\"}".into());
            if let Some(path) = output {
                if let Err(write_err) = std::fs::write(&path, &content) {
                    eprintln!("Failed to write error output: {}", write_err);
                    println!("{content}");
                }
            } else {
                println!("{content}");
            }
        }
        OutputFormat::Pretty => {
            if let Err(write_err) = write_pretty_output(&payload, output.as_deref()) {
                eprintln!("Failed to write error output: {}", write_err);
            }
        }
    };

    // Reserve exit code 2 for fatal/errors; high-severity failures use 1.
    ExitCode::from(2)
}

/// Write JSON output to file or stdout.
fn write_json_output(body: &SpcOutput, output: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let content = serde_json::to_string(body)?;
    if let Some(path) = output {
        std::fs::write(path, content)?;
    } else {
        println!("{content}");
    }
    Ok(())
}

/// Write pretty output to file or stdout.
fn write_pretty_output(body: &SpcOutput, output: Option<&Path>) -> io::Result<()> {
    let stdout_is_tty = std::io::stdout().is_terminal();
    let use_human = output.is_none() && stdout_is_tty;

    if use_human {
        let content = format_pretty(body, true);
        println!("{content}");
        return Ok(());
    }

    // Non-tty or file output: keep JSON shape for pipelines/files.
    let content =
        serde_json::to_string_pretty(body).unwrap_or_else(|_| "{\"mode\":\"error\"}".to_string());
    if let Some(path) = output {
        std::fs::write(path, &content)?;
    } else {
        println!("{content}");
    }
    Ok(())
}

/// Format output for human consumption in a terminal.
pub fn format_pretty(body: &SpcOutput, colorize: bool) -> String {
    match body {
        SpcOutput::Compare(out) => format_compare(out, colorize),
        SpcOutput::Batch(out) => format_batch(out, colorize),
        SpcOutput::Error(out) => {
            let mut buf = String::new();
            let header = color("[ERROR]", "31", colorize);
            let message = out
                .message
                .as_deref()
                .unwrap_or_else(|| out.error.message.as_str());
            writeln!(buf, "{} {}", header, message).ok();
            if let Some(remediation) = &out.error.remediation {
                writeln!(buf, "Hint: {}", remediation).ok();
            }
            buf
        }
    }
}

fn format_compare(out: &CompareOutput, colorize: bool) -> String {
    let mut buf = String::new();
    let report = &out.report;
    let passed = !report.has_high_severity();
    let status = if passed { "PASS" } else { "FAIL" };
    let status_colored = color(status, if passed { "32" } else { "31" }, colorize);
    writeln!(buf, "{} Style parity check", status_colored).ok();
    write_report_body(&mut buf, report, out.viewport.to_string(), colorize);
    buf
}

fn format_batch(out: &BatchOutput, colorize: bool) -> String {
    let mut buf = String::new();
    let failed = out.items.iter().filter(|i| i.error.is_some()).count();
    let header = color("[BATCH]", "36", colorize);
    writeln!(
        buf,
        "{} {} comparison(s), {} failed",
        header,
        out.items.len(),
        failed
    )
    .ok();
    for item in &out.items {
        writeln!(buf).ok();
        writeln!(buf, "== {} ({})", item.target_url, item.source_ref).ok();
        match (&item.report, &item.error) {
            (Some(report), _) => {
                write_report_body(&mut buf, report, out.viewport.to_string(), colorize)
            }
            (None, Some(err)) => {
                writeln!(buf, "{} {}", color("[ERROR]", "31", colorize), err.message).ok();
            }
            (None, None) => {}
        }
    }
    buf
}

fn write_report_body(buf: &mut String, report: &ComparisonReport, viewport: String, colorize: bool) {
    let meta = &report.metadata;
    let summary = &report.summary;
    writeln!(buf, "Target: {} (viewport {})", meta.target_url, viewport).ok();
    if let Some(title) = &meta.page_title {
        writeln!(buf, "Page: {title}").ok();
    }
    if let Some(warning) = &meta.auth_warning {
        writeln!(buf, "{} {}", color("Auth warning:", "33", colorize), warning).ok();
    }
    if let Some(notice) = &meta.truncation {
        writeln!(
            buf,
            "Note: {} of {} elements processed (raise --max-elements to include more)",
            notice.processed, notice.total
        )
        .ok();
    }
    writeln!(
        buf,
        "Components: {}  Elements: {}  Deviations: {} ({} high, {} medium, {} low)",
        summary.total_components,
        meta.element_count,
        summary.total_deviations,
        color(&summary.by_severity.high.to_string(), "31", colorize),
        color(&summary.by_severity.medium.to_string(), "33", colorize),
        summary.by_severity.low,
    )
    .ok();
    if let Some(avg) = summary.average_match_score {
        writeln!(buf, "Average match score: {:.2}", avg).ok();
    }

    if report.results.is_empty() {
        return;
    }
    writeln!(buf, "Results:").ok();
    for result in report.results.iter().take(PRETTY_RESULT_LIMIT) {
        let target = result.selector.as_deref().unwrap_or("-");
        writeln!(
            buf,
            "- {:24} {:16} {}",
            result.component_name,
            color(status_label(result.status), status_color_code(result.status), colorize),
            target
        )
        .ok();
        for deviation in &result.deviations {
            writeln!(
                buf,
                "    [{}] {}",
                color(&deviation.severity.to_string(), severity_color_code(deviation.severity), colorize),
                deviation.message
            )
            .ok();
        }
    }
    if report.results.len() > PRETTY_RESULT_LIMIT {
        writeln!(
            buf,
            "... {} more (use --format json for the full report)",
            report.results.len() - PRETTY_RESULT_LIMIT
        )
        .ok();
    }
}

fn status_label(status: ComparisonStatus) -> &'static str {
    match status {
        ComparisonStatus::Matches => "matches",
        ComparisonStatus::HasDeviations => "has_deviations",
        ComparisonStatus::NoMatch => "no_match",
        ComparisonStatus::PartialData => "partial_data",
        ComparisonStatus::Unfetched => "unfetched",
    }
}

/// Apply ANSI color codes when enabled.
fn color(text: &str, code: &str, colorize: bool) -> String {
    if colorize {
        format!("\x1b[{}m{}\x1b[0m", code, text)
    } else {
        text.to_string()
    }
}

fn status_color_code(status: ComparisonStatus) -> &'static str {
    match status {
        ComparisonStatus::Matches => "32",
        ComparisonStatus::PartialData | ComparisonStatus::Unfetched => "33",
        ComparisonStatus::HasDeviations | ComparisonStatus::NoMatch => "31",
    }
}

fn severity_color_code(severity: Severity) -> &'static str {
    match severity {
        Severity::High => "31",
        Severity::Medium => "33",
        Severity::Low => "36",
    }
}

/// Determine exit code for a finished report.
pub fn exit_code_for_report(has_high: bool, fail_on_high: bool) -> ExitCode {
    if has_high && fail_on_high {
        ExitCode::from(1)
    } else {
        ExitCode::SUCCESS
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use spc_lib::output::BatchEntry;
    use spc_lib::types::{
        ComparisonResult, Deviation, MatchingMode, ReportMetadata, TruncationNotice,
    };
    use spc_lib::{build_report, Viewport, SPC_OUTPUT_VERSION};

    fn report(with_high: bool) -> ComparisonReport {
        let deviations = if with_high {
            vec![Deviation {
                property: "color".into(),
                source_value: json!("#000000"),
                target_value: json!("#FFFFFF"),
                difference: Some(441.67),
                severity: Severity::High,
                message: "color differs by 441.67".into(),
            }]
        } else {
            Vec::new()
        };
        let status = if with_high {
            ComparisonStatus::HasDeviations
        } else {
            ComparisonStatus::Matches
        };
        build_report(
            ReportMetadata {
                tool_version: "0.1.0".into(),
                source_ref: "components.json".into(),
                node_ref: None,
                target_url: "https://example.com".into(),
                page_url: None,
                page_title: Some("Example Domain".into()),
                selector: None,
                started_at_ms: 0,
                elapsed_ms: 10,
                auth_warning: Some("Authentication (cookies) failed: boom".into()),
                truncation: Some(TruncationNotice {
                    total: 300,
                    processed: 100,
                }),
                matching_mode: MatchingMode::Greedy,
                component_count: 1,
                element_count: 100,
                skipped_elements: 0,
            },
            vec![ComparisonResult {
                component_id: "1:2".into(),
                component_name: "Heading".into(),
                selector: Some("h1".into()),
                status,
                deviations,
                matches: Vec::new(),
                unfetched: Vec::new(),
                match_score: 0.82,
            }],
        )
    }

    #[test]
    fn exit_code_for_report_maps_fail_on_high() {
        assert_eq!(exit_code_for_report(true, true), ExitCode::from(1));
        assert_eq!(exit_code_for_report(true, false), ExitCode::SUCCESS);
        assert_eq!(exit_code_for_report(false, true), ExitCode::SUCCESS);
    }

    #[test]
    fn render_error_always_returns_fatal_exit_code() {
        let code = render_error(
            SpcError::Config("boom".to_string()),
            OutputFormat::Json,
            None,
        );
        assert_eq!(code, ExitCode::from(2));
    }

    #[test]
    fn format_pretty_includes_status_summary_and_deviations() {
        let output = SpcOutput::Compare(CompareOutput {
            version: SPC_OUTPUT_VERSION.to_string(),
            viewport: Viewport::default(),
            report: report(true),
        });

        let pretty = format_pretty(&output, false);
        assert!(pretty.contains("FAIL Style parity check"));
        assert!(pretty.contains("viewport 1440x900"));
        assert!(pretty.contains("Page: Example Domain"));
        assert!(pretty.contains("Auth warning:"));
        assert!(pretty.contains("100 of 300 elements"));
        assert!(pretty.contains("1 high"));
        assert!(pretty.contains("Heading") && pretty.contains("has_deviations"));
        assert!(pretty.contains("[high] color differs"));
        assert!(pretty.contains("Average match score: 0.82"));
    }

    #[test]
    fn format_pretty_passes_clean_report() {
        let output = SpcOutput::Compare(CompareOutput {
            version: SPC_OUTPUT_VERSION.to_string(),
            viewport: Viewport::default(),
            report: report(false),
        });
        assert!(format_pretty(&output, false).contains("PASS Style parity check"));
    }

    #[test]
    fn format_pretty_lists_batch_failures() {
        let output = SpcOutput::Batch(BatchOutput {
            version: SPC_OUTPUT_VERSION.to_string(),
            viewport: Viewport::default(),
            items: vec![
                BatchEntry {
                    source_ref: "a.json".into(),
                    target_url: "https://a.example".into(),
                    report: Some(report(false)),
                    error: None,
                },
                BatchEntry {
                    source_ref: "b.json".into(),
                    target_url: "https://b.example".into(),
                    report: None,
                    error: Some(
                        SpcError::Navigation {
                            url: "https://b.example".into(),
                            attempts: 3,
                            message: "timeout".into(),
                        }
                        .to_payload(),
                    ),
                },
            ],
        });
        let pretty = format_pretty(&output, false);
        assert!(pretty.contains("2 comparison(s), 1 failed"));
        assert!(pretty.contains("== https://b.example (b.json)"));
        assert!(pretty.contains("[ERROR] Navigation to https://b.example failed"));
    }

    #[test]
    fn format_pretty_handles_errors() {
        let output = SpcOutput::Error(ErrorOutput {
            version: SPC_OUTPUT_VERSION.to_string(),
            message: Some("bad input".to_string()),
            error: spc_lib::error::ErrorPayload {
                category: spc_lib::error::ErrorCategory::Config,
                message: "bad input".to_string(),
                remediation: Some("check flags".to_string()),
            },
        });

        let pretty = format_pretty(&output, false);
        assert!(pretty.contains("[ERROR] bad input"));
        assert!(pretty.contains("Hint: check flags"));
    }
}
