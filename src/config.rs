//! Run configuration.
//!
//! A [`Config`] is built once (defaults, then an optional TOML file, then CLI
//! overrides) and handed by reference to every component. Nothing mutates it
//! after a run starts.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::analysis::{SeverityTables, Tolerances};
use crate::error::{Result, SpcError};
use crate::retry::RetryPolicy;

pub const DEFAULT_MAX_ELEMENTS: usize = 100;
pub const DEFAULT_MIN_MATCH_SCORE: f64 = 0.3;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Browser window size used for every capture.
    pub viewport: Viewport,
    pub browser: BrowserSettings,
    pub timeouts: Timeouts,
    pub retry: RetrySettings,
    pub extraction: ExtractionSettings,
    pub matching: MatchingSettings,
    /// Per-property thresholds below which a difference counts as a match.
    pub tolerances: Tolerances,
    /// Difference cut-offs that grade a deviation low, medium or high.
    pub severity: SeverityTables,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1440,
            height: 900,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ViewportParseError {
    #[error("Invalid viewport format: expected WIDTHxHEIGHT (e.g., 1440x900)")]
    InvalidFormat,
    #[error("Invalid viewport width: {0}")]
    InvalidWidth(String),
    #[error("Invalid viewport height: {0}")]
    InvalidHeight(String),
    #[error("Viewport dimensions must be positive")]
    Zero,
}

impl FromStr for Viewport {
    type Err = ViewportParseError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        let (w, h) = lower
            .split_once('x')
            .ok_or(ViewportParseError::InvalidFormat)?;
        if h.contains('x') {
            return Err(ViewportParseError::InvalidFormat);
        }

        let width: u32 = w
            .trim()
            .parse()
            .map_err(|_| ViewportParseError::InvalidWidth(w.trim().to_string()))?;
        let height: u32 = h
            .trim()
            .parse()
            .map_err(|_| ViewportParseError::InvalidHeight(h.trim().to_string()))?;

        if width == 0 || height == 0 {
            return Err(ViewportParseError::Zero);
        }
        Ok(Viewport { width, height })
    }
}

impl std::fmt::Display for Viewport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserSettings {
    /// Run without a visible window. Manual auth needs `false`.
    pub headless: bool,
    /// Chrome/Chromium binary; auto-detected when unset.
    pub executable: Option<PathBuf>,
    /// Keep Chrome's sandbox on. Some containers need it off.
    pub sandbox: bool,
    /// Upper bound on sessions alive at once during a batch run.
    pub max_concurrent_sessions: usize,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            headless: true,
            executable: None,
            sandbox: true,
            max_concurrent_sessions: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    /// Limit for one page load attempt.
    #[serde(with = "humantime_serde")]
    pub navigation: Duration,
    /// Limit for a single script evaluation or auth step.
    #[serde(with = "humantime_serde")]
    pub evaluation: Duration,
    /// How long to wait for the network to settle. Expiry only warns.
    #[serde(with = "humantime_serde")]
    pub network_idle: Duration,
    /// Default wait for a human to finish logging in.
    #[serde(with = "humantime_serde")]
    pub manual_auth: Duration,
    /// Limit for one browser launch attempt.
    #[serde(with = "humantime_serde")]
    pub init_step: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            navigation: Duration::from_secs(30),
            evaluation: Duration::from_secs(30),
            network_idle: Duration::from_secs(10),
            manual_auth: Duration::from_secs(300),
            init_step: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub launch: RetryPolicy,
    pub probe: RetryPolicy,
    pub navigation: RetryPolicy,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            launch: RetryPolicy::new(3, Duration::from_millis(500)),
            probe: RetryPolicy::new(2, Duration::from_millis(200)),
            navigation: RetryPolicy::new(3, Duration::from_secs(1)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionSettings {
    /// Elements captured per page; extras are dropped and reported as truncation.
    pub max_elements: usize,
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        Self {
            max_elements: DEFAULT_MAX_ELEMENTS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingSettings {
    /// A pair must score strictly above this to match.
    pub min_score: f64,
    /// Assign each element to at most one component.
    pub exclusive: bool,
}

impl Default for MatchingSettings {
    fn default() -> Self {
        Self {
            min_score: DEFAULT_MIN_MATCH_SCORE,
            exclusive: false,
        }
    }
}

impl Config {
    /// `~/.config/spc/config.toml`, if a home directory is known.
    pub fn central_config_path() -> Option<PathBuf> {
        std::env::var_os("HOME")
            .filter(|h| !h.is_empty())
            .map(|home| PathBuf::from(home).join(".config/spc/config.toml"))
    }

    /// Load config from a TOML file, central config, or return defaults.
    /// Priority: explicit path > ~/.config/spc/config.toml > defaults.
    ///
    /// An explicit path that does not exist is an error; a missing central
    /// file silently falls back to defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::from_file(p),
            None => match Self::central_config_path() {
                Some(central) if central.exists() => Self::from_file(&central),
                _ => Ok(Self::default()),
            },
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
            .map_err(|e| SpcError::Config(format!("Failed to read config {}: {e}", path.display())))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| SpcError::Config(e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        if self.viewport.width == 0 || self.viewport.height == 0 {
            return Err(SpcError::Config(format!(
                "viewport must be positive, got {}",
                self.viewport
            )));
        }
        self.tolerances.validate()?;
        self.severity.validate()?;

        for (name, policy) in [
            ("launch", &self.retry.launch),
            ("probe", &self.retry.probe),
            ("navigation", &self.retry.navigation),
        ] {
            if policy.max_attempts == 0 {
                return Err(SpcError::Config(format!(
                    "retry.{name}.max_attempts must be at least 1"
                )));
            }
            if policy.multiplier < 1.0 {
                return Err(SpcError::Config(format!(
                    "retry.{name}.multiplier must be >= 1.0"
                )));
            }
        }

        if !(0.0..1.0).contains(&self.matching.min_score) {
            return Err(SpcError::Config(format!(
                "matching.min_score must be in [0, 1), got {}",
                self.matching.min_score
            )));
        }
        if self.extraction.max_elements == 0 {
            return Err(SpcError::Config(
                "extraction.max_elements must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_values_match_expected() {
        let cfg = Config::default();

        assert_eq!(cfg.viewport, Viewport { width: 1440, height: 900 });
        assert_eq!(cfg.timeouts.navigation, Duration::from_secs(30));
        assert_eq!(cfg.timeouts.network_idle, Duration::from_secs(10));
        assert_eq!(cfg.timeouts.manual_auth, Duration::from_secs(300));
        assert_eq!(cfg.retry.navigation.max_attempts, 3);
        assert_eq!(cfg.retry.launch.max_attempts, 3);
        assert_eq!(cfg.extraction.max_elements, 100);
        assert!(!cfg.matching.exclusive);
        assert!((cfg.matching.min_score - 0.3).abs() < f64::EPSILON);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let cfg = Config::from_toml(
            r#"
            [viewport]
            width = 1280
            height = 720

            [timeouts]
            navigation = "45s"
            manual_auth = "2m"

            [tolerances]
            font_size = 1.0

            [matching]
            exclusive = true
            "#,
        )
        .expect("valid toml");

        assert_eq!(cfg.viewport.to_string(), "1280x720");
        assert_eq!(cfg.timeouts.navigation, Duration::from_secs(45));
        assert_eq!(cfg.timeouts.manual_auth, Duration::from_secs(120));
        assert_eq!(cfg.timeouts.network_idle, Duration::from_secs(10));
        assert!((cfg.tolerances.font_size - 1.0).abs() < f64::EPSILON);
        assert!((cfg.tolerances.color_difference - 10.0).abs() < f64::EPSILON);
        assert!(cfg.matching.exclusive);
    }

    #[test]
    fn load_reads_explicit_file() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        writeln!(file, "[extraction]\nmax_elements = 25").expect("write");

        let cfg = Config::load(Some(file.path())).expect("load");
        assert_eq!(cfg.extraction.max_elements, 25);
    }

    #[test]
    fn load_missing_explicit_file_is_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = dir.path().join("nope.toml");
        assert!(Config::load(Some(&missing)).is_err());
    }

    #[test]
    fn validate_rejects_inverted_severity_table() {
        let mut cfg = Config::default();
        cfg.severity.color.medium = 60.0;
        let err = cfg.validate().expect_err("inverted table");
        assert!(err.to_string().contains("severity"));
    }

    #[test]
    fn validate_rejects_zero_attempts_and_bad_min_score() {
        let mut cfg = Config::default();
        cfg.retry.probe.max_attempts = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.matching.min_score = 1.5;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn viewport_parse_accepts_spaces_and_uppercase() {
        let vp: Viewport = " 1920 X 1080 ".parse().expect("viewport");
        assert_eq!(vp, Viewport { width: 1920, height: 1080 });
    }

    #[test]
    fn viewport_parse_rejects_bad_input() {
        assert_eq!("1440".parse::<Viewport>(), Err(ViewportParseError::InvalidFormat));
        assert_eq!(
            "1440x900x600".parse::<Viewport>(),
            Err(ViewportParseError::InvalidFormat)
        );
        assert!(matches!(
            "abcx900".parse::<Viewport>(),
            Err(ViewportParseError::InvalidWidth(_))
        ));
        assert_eq!("0x900".parse::<Viewport>(), Err(ViewportParseError::Zero));
    }
}
