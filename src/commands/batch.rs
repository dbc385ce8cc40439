use std::path::{Path, PathBuf};
use std::process::ExitCode;

use spc_lib::output::{BatchEntry, BatchOutput, SPC_OUTPUT_VERSION};
use spc_lib::{run_batch, ComparisonRequest, JsonComponentSource, SpcError, SpcOutput};
use tracing::debug;

use super::{browser_driver, interruptible_context};
use crate::cli::RunArgs;
use crate::formatting::{exit_code_for_report, render_error, write_output};
use crate::settings::{apply_run_overrides, format_effective_config, load_config, RunFlagSources};

/// Run every request in `manifest`. Exit code 2 when any item failed,
/// otherwise the `--fail-on-high` rule applied across all reports.
pub async fn run_batch_command(
    raw_args: &[String],
    config_path: Option<PathBuf>,
    manifest: PathBuf,
    run: RunArgs,
) -> ExitCode {
    let format = run.format;
    let output = run.output.clone();

    let config = match load_config(config_path.as_deref()) {
        Ok(cfg) => cfg,
        Err(err) => return render_error(err, format, output),
    };
    let config = match apply_run_overrides(config, &run, &RunFlagSources::from_args(raw_args)) {
        Ok(cfg) => cfg,
        Err(err) => return render_error(err, format, output),
    };
    debug!("{}", format_effective_config(&config, config_path.as_deref()));

    let requests = match load_manifest(&manifest) {
        Ok(requests) => requests,
        Err(err) => return render_error(err, format, output),
    };
    let driver = match browser_driver() {
        Ok(driver) => driver,
        Err(err) => return render_error(err, format, output),
    };

    // Relative component paths resolve against the manifest's directory.
    let base = manifest
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let source = JsonComponentSource::with_base_dir(base);
    let ctx = interruptible_context();
    let items = run_batch(requests, &source, driver, &config, &ctx).await;

    let any_failed = items.iter().any(|i| i.outcome.is_err());
    let any_high = items
        .iter()
        .any(|i| matches!(&i.outcome, Ok(report) if report.has_high_severity()));
    let body = SpcOutput::Batch(BatchOutput {
        version: SPC_OUTPUT_VERSION.to_string(),
        viewport: config.viewport,
        items: items.into_iter().map(BatchEntry::from).collect(),
    });
    if let Err(err) = write_output(&body, format, output.clone()) {
        return render_error(
            SpcError::Config(format!("Failed to write output: {err}")),
            format,
            output,
        );
    }
    if any_failed {
        return ExitCode::from(2);
    }
    exit_code_for_report(any_high, run.fail_on_high)
}

fn load_manifest(path: &Path) -> Result<Vec<ComparisonRequest>, SpcError> {
    let data = std::fs::read_to_string(path)
        .map_err(|e| SpcError::Config(format!("Failed to read manifest {}: {e}", path.display())))?;
    let requests: Vec<ComparisonRequest> = serde_json::from_str(&data).map_err(|e| {
        SpcError::Config(format!(
            "Invalid manifest JSON (expected array of {{sourceRef, targetUrl, nodeRef?, selector?, auth?}}): {e}"
        ))
    })?;
    if requests.is_empty() {
        return Err(SpcError::Config("manifest contained no requests".to_string()));
    }
    Ok(requests)
}
