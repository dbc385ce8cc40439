use std::path::PathBuf;
use std::process::ExitCode;

use spc_lib::output::SPC_OUTPUT_VERSION;
use spc_lib::{
    run_comparison, AuthConfig, CompareOutput, ComparisonRequest, JsonComponentSource, SpcError,
    SpcOutput,
};
use tracing::debug;

use super::{browser_driver, interruptible_context};
use crate::cli::RunArgs;
use crate::formatting::{exit_code_for_report, render_error, write_output};
use crate::settings::{apply_run_overrides, format_effective_config, load_config, RunFlagSources};

/// Run the compare command.
#[allow(clippy::too_many_arguments)]
pub async fn run_compare(
    raw_args: &[String],
    config_path: Option<PathBuf>,
    components: String,
    url: String,
    node: Option<String>,
    selector: Option<String>,
    auth: Option<String>,
    run: RunArgs,
) -> ExitCode {
    let format = run.format;
    let output = run.output.clone();

    let config = match load_config(config_path.as_deref()) {
        Ok(cfg) => cfg,
        Err(err) => return render_error(err, format, output),
    };
    let flag_sources = RunFlagSources::from_args(raw_args);
    let config = match apply_run_overrides(config, &run, &flag_sources) {
        Ok(cfg) => cfg,
        Err(err) => return render_error(err, format, output),
    };
    debug!("{}", format_effective_config(&config, config_path.as_deref()));

    let auth = match auth.as_deref().map(load_auth).transpose() {
        Ok(auth) => auth,
        Err(err) => return render_error(err, format, output),
    };
    let driver = match browser_driver() {
        Ok(driver) => driver,
        Err(err) => return render_error(err, format, output),
    };

    let request = ComparisonRequest {
        source_ref: components,
        node_ref: node,
        target_url: url,
        selector,
        auth,
    };
    let ctx = interruptible_context();
    let report = match run_comparison(
        &request,
        &JsonComponentSource::new(),
        driver,
        &config,
        &ctx,
    )
    .await
    {
        Ok(report) => report,
        Err(err) => return render_error(err, format, output),
    };

    let has_high = report.has_high_severity();
    let body = SpcOutput::Compare(CompareOutput {
        version: SPC_OUTPUT_VERSION.to_string(),
        viewport: config.viewport,
        report,
    });
    if let Err(err) = write_output(&body, format, output.clone()) {
        return render_error(
            SpcError::Config(format!("Failed to write output: {err}")),
            format,
            output,
        );
    }
    exit_code_for_report(has_high, run.fail_on_high)
}

/// `--auth` accepts inline JSON or a path to a JSON file.
pub(super) fn load_auth(value: &str) -> Result<AuthConfig, SpcError> {
    let trimmed = value.trim();
    if trimmed.starts_with('{') {
        return AuthConfig::from_json(trimmed);
    }
    let content = std::fs::read_to_string(trimmed)
        .map_err(|e| SpcError::Config(format!("Failed to read auth config {trimmed}: {e}")))?;
    AuthConfig::from_json(&content)
}
