use clap::{Parser, Subcommand, ValueEnum};
use spc_lib::Viewport;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "spc")]
#[command(
    version,
    about = "Style Parity Checker - Compare design components against a live page",
    long_about = "Style Parity Checker (SPC)\n\nModes:\n- compare: match design components (JSON) to rendered elements of a URL and report typography, color, spacing and geometry deviations.\n- batch: run several comparisons from a JSON manifest with bounded browser concurrency.\n\nUse --help on any subcommand for details."
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, global = true, help = "Enable verbose (debug) logging on stderr")]
    pub verbose: bool,

    #[arg(
        long,
        global = true,
        value_name = "PATH",
        help = "Optional config file (TOML) for viewport/timeouts/retry/tolerances/severity; CLI flags override config"
    )]
    pub config: Option<PathBuf>,
}

/// Flags shared by `compare` and `batch`.
#[derive(clap::Args, Debug, Clone)]
pub struct RunArgs {
    #[arg(
        long,
        default_value = "1440x900",
        help = "Viewport dimensions (WIDTHxHEIGHT)"
    )]
    pub viewport: Viewport,

    #[arg(
        long,
        default_value = "30",
        help = "Navigation timeout (seconds) per attempt"
    )]
    pub nav_timeout: u64,

    #[arg(long, value_name = "N", help = "Maximum page elements to extract")]
    pub max_elements: Option<usize>,

    #[arg(
        long,
        help = "Assign each page element to at most one component (default: greedy, elements may be shared)"
    )]
    pub exclusive: bool,

    #[arg(long, help = "Run the browser with a visible window (needed for manual auth)")]
    pub headed: bool,

    #[arg(long, value_enum, default_value = "json", help = "Output format")]
    pub format: OutputFormat,

    #[arg(long, short, help = "Output file path (stdout if omitted)")]
    pub output: Option<PathBuf>,

    #[arg(long, help = "Exit with code 1 when any high-severity deviation is found")]
    pub fail_on_high: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compare design components against a rendered page
    Compare {
        #[arg(
            long,
            value_name = "PATH",
            help = "Design components (JSON array or {\"components\": [...]})"
        )]
        components: String,

        #[arg(long, help = "Target page URL")]
        url: String,

        #[arg(long, help = "Only compare components under this node id")]
        node: Option<String>,

        #[arg(long, help = "CSS selector scoping the page extraction")]
        selector: Option<String>,

        #[arg(
            long,
            value_name = "JSON|PATH",
            help = "Auth config as inline JSON or a path to a JSON file ({\"type\": \"credentials\"|\"cookies\"|\"headers\"|\"manual\"|\"session\", ...})"
        )]
        auth: Option<String>,

        #[command(flatten)]
        run: RunArgs,
    },

    /// Run several comparisons from a manifest
    Batch {
        #[arg(
            long,
            value_name = "PATH",
            help = "JSON array of {sourceRef, targetUrl, nodeRef?, selector?, auth?} requests"
        )]
        manifest: PathBuf,

        #[command(flatten)]
        run: RunArgs,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Json,
    Pretty,
}

pub fn parse() -> Cli {
    Cli::parse()
}

#[cfg(test)]
mod tests {
    use super::{Cli, Commands, OutputFormat};
    use clap::Parser;

    #[test]
    fn compare_command_uses_defaults() {
        let cli = Cli::parse_from([
            "spc",
            "compare",
            "--components",
            "components.json",
            "--url",
            "https://example.com",
        ]);

        assert!(!cli.verbose);
        assert!(cli.config.is_none());

        match cli.command {
            Commands::Compare {
                components,
                url,
                node,
                selector,
                auth,
                run,
            } => {
                assert_eq!(components, "components.json");
                assert_eq!(url, "https://example.com");
                assert!(node.is_none());
                assert!(selector.is_none());
                assert!(auth.is_none());
                assert_eq!(run.viewport.width, 1440);
                assert_eq!(run.viewport.height, 900);
                assert_eq!(run.nav_timeout, 30);
                assert!(run.max_elements.is_none());
                assert!(!run.exclusive);
                assert!(!run.headed);
                assert!(!run.fail_on_high);
                assert!(matches!(run.format, OutputFormat::Json));
                assert!(run.output.is_none());
            }
            _ => panic!("expected compare command"),
        }
    }

    #[test]
    fn compare_command_respects_overrides() {
        let cli = Cli::parse_from([
            "spc",
            "compare",
            "--components",
            "design.json",
            "--url",
            "https://example.com/pricing",
            "--node",
            "12:34",
            "--selector",
            "main",
            "--viewport",
            "1280x720",
            "--nav-timeout",
            "5",
            "--max-elements",
            "250",
            "--exclusive",
            "--headed",
            "--format",
            "pretty",
            "--output",
            "report.json",
            "--fail-on-high",
            "--verbose",
        ]);

        assert!(cli.verbose);
        match cli.command {
            Commands::Compare {
                node,
                selector,
                run,
                ..
            } => {
                assert_eq!(node.as_deref(), Some("12:34"));
                assert_eq!(selector.as_deref(), Some("main"));
                assert_eq!(run.viewport.width, 1280);
                assert_eq!(run.viewport.height, 720);
                assert_eq!(run.nav_timeout, 5);
                assert_eq!(run.max_elements, Some(250));
                assert!(run.exclusive);
                assert!(run.headed);
                assert!(run.fail_on_high);
                assert!(matches!(run.format, OutputFormat::Pretty));
                assert_eq!(
                    run.output.as_deref().and_then(|p| p.to_str()),
                    Some("report.json")
                );
            }
            _ => panic!("expected compare command"),
        }
    }

    #[test]
    fn batch_command_takes_manifest() {
        let cli = Cli::parse_from([
            "spc",
            "batch",
            "--manifest",
            "runs.json",
            "--config",
            "spc.toml",
        ]);
        assert_eq!(
            cli.config.as_deref().and_then(|p| p.to_str()),
            Some("spc.toml")
        );
        match cli.command {
            Commands::Batch { manifest, run } => {
                assert_eq!(manifest.to_str(), Some("runs.json"));
                assert!(matches!(run.format, OutputFormat::Json));
            }
            _ => panic!("expected batch command"),
        }
    }

    #[test]
    fn invalid_viewport_is_rejected() {
        let result = Cli::try_parse_from([
            "spc",
            "compare",
            "--components",
            "c.json",
            "--url",
            "https://example.com",
            "--viewport",
            "wide",
        ]);
        assert!(result.is_err());
    }
}
