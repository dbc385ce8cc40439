//! The seam between [`BrowserSession`](super::BrowserSession) and a concrete
//! headless browser.
//!
//! `chromium` provides the real implementation; tests plug in scripted
//! drivers without a browser binary.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde_json::Value;

use super::auth::CookieSpec;
use crate::config::{Config, Viewport};
use crate::Result;

/// Settings applied when a browser process is started.
#[derive(Debug, Clone, PartialEq)]
pub struct LaunchOptions {
    /// Window size of the opened page.
    pub viewport: Viewport,
    pub headless: bool,
    /// Browser binary to start instead of the auto-detected one.
    pub executable: Option<PathBuf>,
    /// When false, Chrome is started with `--no-sandbox`.
    pub sandbox: bool,
    /// Upper bound for a single protocol request.
    pub request_timeout: Duration,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl LaunchOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            viewport: config.viewport,
            headless: config.browser.headless,
            executable: config.browser.executable.clone(),
            sandbox: config.browser.sandbox,
            request_timeout: config.timeouts.navigation,
        }
    }
}

#[async_trait::async_trait]
pub trait BrowserDriver: Send + Sync {
    /// Start a browser process and open one blank page in it.
    async fn launch(&self, options: &LaunchOptions) -> Result<Box<dyn PageHandle>>;
}

/// One open page owning its browser process. Dropping the handle must
/// release the process.
#[async_trait::async_trait]
pub trait PageHandle: Send {
    async fn goto(&mut self, url: &str) -> Result<()>;

    /// Evaluate a JavaScript expression and return its JSON value.
    async fn evaluate(&mut self, expression: &str) -> Result<Value>;

    async fn set_cookies(&mut self, cookies: &[CookieSpec]) -> Result<()>;

    async fn set_extra_headers(&mut self, headers: &BTreeMap<String, String>) -> Result<()>;

    /// Focus the first element matching `selector` and type `value` into it.
    async fn fill(&mut self, selector: &str, value: &str) -> Result<()>;

    async fn click(&mut self, selector: &str) -> Result<()>;

    /// Shut the browser down. Must tolerate being called on a crashed page.
    async fn close(&mut self) -> Result<()>;
}
