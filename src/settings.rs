use std::path::Path;
use std::time::Duration;

use spc_lib::{Config, SpcError};

use crate::cli::RunArgs;

/// Tracks which CLI flags were explicitly provided vs. defaulted.
#[derive(Debug, Default)]
pub struct RunFlagSources {
    pub viewport: bool,
    pub nav_timeout: bool,
}

impl RunFlagSources {
    pub fn from_args(args: &[String]) -> Self {
        Self {
            viewport: flag_present(args, "--viewport"),
            nav_timeout: flag_present(args, "--nav-timeout"),
        }
    }
}

/// Checks if a flag was present in the command-line arguments.
pub fn flag_present(args: &[String], flag: &str) -> bool {
    args.iter()
        .any(|arg| arg == flag || arg.starts_with(&format!("{flag}=")))
}

/// Merge CLI arguments into the loaded config, preferring CLI when flags are
/// present. The merged config is validated again.
pub fn apply_run_overrides(
    mut config: Config,
    run: &RunArgs,
    flags: &RunFlagSources,
) -> Result<Config, SpcError> {
    if flags.viewport {
        config.viewport = run.viewport;
    }
    if flags.nav_timeout {
        config.timeouts.navigation = Duration::from_secs(run.nav_timeout);
    }
    if let Some(max) = run.max_elements {
        config.extraction.max_elements = max;
    }
    if run.exclusive {
        config.matching.exclusive = true;
    }
    if run.headed {
        config.browser.headless = false;
    }
    config.validate()?;
    Ok(config)
}

/// Load config from a TOML file, central config, or return defaults.
/// Priority: explicit path > ~/.config/spc/config.toml > defaults
pub fn load_config(path: Option<&Path>) -> Result<Config, SpcError> {
    let cfg = Config::load(path).map_err(|e| match e {
        SpcError::Config(_) => e,
        other => {
            let loc = path
                .map(|p| p.display().to_string())
                .or_else(|| Config::central_config_path().map(|p| p.display().to_string()))
                .unwrap_or_else(|| "defaults".to_string());
            SpcError::Config(format!("Failed to read config {}: {}", loc, other))
        }
    })?;

    cfg.validate().map_err(|e| {
        let detail = match e {
            SpcError::Config(msg) => msg,
            other => other.to_string(),
        };
        let prefix = path
            .map(|p| format!("Invalid config ({}): {}", p.display(), detail))
            .unwrap_or_else(|| format!("Invalid config: {}", detail));
        SpcError::Config(prefix)
    })?;
    Ok(cfg)
}

/// Format effective config as a single-line string.
pub fn format_effective_config(config: &Config, config_source: Option<&Path>) -> String {
    let source = config_source
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "defaults".to_string());
    format!(
        "Effective config [{source}]: viewport={}, headless={}, timeouts: nav={}s, network-idle={}s, manual-auth={}s, max-elements={}, min-score={:.2}, exclusive={}, tolerances: font-size={}, color={}, spacing={}, radius={}, dimensions={}",
        config.viewport,
        config.browser.headless,
        config.timeouts.navigation.as_secs(),
        config.timeouts.network_idle.as_secs(),
        config.timeouts.manual_auth.as_secs(),
        config.extraction.max_elements,
        config.matching.min_score,
        config.matching.exclusive,
        config.tolerances.font_size,
        config.tolerances.color_difference,
        config.tolerances.spacing,
        config.tolerances.border_radius,
        config.tolerances.dimensions,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::OutputFormat;
    use spc_lib::Viewport;

    fn run_args() -> RunArgs {
        RunArgs {
            viewport: Viewport {
                width: 10,
                height: 20,
            },
            nav_timeout: 50,
            max_elements: None,
            exclusive: false,
            headed: false,
            format: OutputFormat::Json,
            output: None,
            fail_on_high: false,
        }
    }

    #[test]
    fn config_wins_when_flags_absent() {
        let mut cfg = Config::default();
        cfg.viewport = Viewport {
            width: 111,
            height: 222,
        };
        cfg.timeouts.navigation = Duration::from_secs(5);

        let resolved =
            apply_run_overrides(cfg, &run_args(), &RunFlagSources::default()).expect("valid");
        assert_eq!(resolved.viewport.width, 111);
        assert_eq!(resolved.viewport.height, 222);
        assert_eq!(resolved.timeouts.navigation, Duration::from_secs(5));
        assert!(resolved.browser.headless);
        assert!(!resolved.matching.exclusive);
    }

    #[test]
    fn cli_wins_when_flags_present() {
        let mut run = run_args();
        run.max_elements = Some(40);
        run.exclusive = true;
        run.headed = true;
        let flags = RunFlagSources {
            viewport: true,
            nav_timeout: true,
        };

        let resolved = apply_run_overrides(Config::default(), &run, &flags).expect("valid");
        assert_eq!(resolved.viewport.width, 10);
        assert_eq!(resolved.timeouts.navigation, Duration::from_secs(50));
        assert_eq!(resolved.extraction.max_elements, 40);
        assert!(resolved.matching.exclusive);
        assert!(!resolved.browser.headless);
    }

    #[test]
    fn zero_max_elements_is_rejected() {
        let mut run = run_args();
        run.max_elements = Some(0);
        let err = apply_run_overrides(Config::default(), &run, &RunFlagSources::default())
            .expect_err("invalid");
        assert!(matches!(err, SpcError::Config(_)));
    }

    #[test]
    fn flag_present_handles_equals_form() {
        let args = vec!["spc".to_string(), "--viewport=800x600".to_string()];
        assert!(flag_present(&args, "--viewport"));
        assert!(!flag_present(&args, "--nav-timeout"));
    }

    #[test]
    fn format_effective_config_includes_key_fields() {
        let summary = format_effective_config(&Config::default(), Some(Path::new("spc.toml")));
        assert!(summary.contains("viewport=1440x900"));
        assert!(summary.contains("nav=30s"));
        assert!(summary.contains("max-elements=100"));
        assert!(summary.contains("spc.toml"));
    }
}
