//! A single browser process/page with a ready-or-error contract.
//!
//! ```text
//! Uninitialized -> Initializing -> Ready <-> Navigating
//!                                    |
//!        Error (from any active state) -> re-initialize | Closed
//! ```
//!
//! Launches, liveness probes and navigations are retried through
//! [`retry_with_backoff`]. A navigation that exhausts its retries leaves the
//! session `Closed`, never half-open; the next call re-initializes it.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};
use url::Url;

use super::auth::{AuthConfig, AuthOutcome, CookieSpec};
use super::driver::{BrowserDriver, LaunchOptions, PageHandle};
use crate::config::{Config, RetrySettings, Timeouts};
use crate::context::OperationContext;
use crate::error::{Result, SpcError};
use crate::retry::{retry_with_backoff, RetryError};

/// Expression used to check that the page still answers.
pub const READY_PROBE: &str = "1 + 1";

/// Reports load state and how many resources have been fetched so far.
pub const NETWORK_IDLE_PROBE: &str = r#"(() => ({
  readyState: document.readyState,
  resources: performance.getEntriesByType('resource').length
}))()"#;

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Consecutive polls with an unchanged resource count before the network is
/// considered idle.
const IDLE_QUIET_POLLS: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Uninitialized,
    Initializing,
    Ready,
    Navigating,
    Error,
    Closed,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SessionState::Uninitialized => "uninitialized",
            SessionState::Initializing => "initializing",
            SessionState::Ready => "ready",
            SessionState::Navigating => "navigating",
            SessionState::Error => "error",
            SessionState::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// Everything a session needs besides its driver.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Passed to the driver on every launch and relaunch.
    pub launch: LaunchOptions,
    /// Per-step limits for launch, probe, navigation, idle and auth waits.
    pub timeouts: Timeouts,
    /// Backoff policies for launch, liveness probe and navigation.
    pub retry: RetrySettings,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl SessionOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            launch: LaunchOptions::from_config(config),
            timeouts: config.timeouts.clone(),
            retry: config.retry.clone(),
        }
    }
}

/// Auth state installed on the current browser process. Cookies and headers
/// are replayed after every relaunch; login state held only in the browser's
/// cookie jar is not.
#[derive(Debug, Clone, Default)]
struct InstalledAuth {
    strategy: &'static str,
    cookies: Vec<CookieSpec>,
    headers: BTreeMap<String, String>,
    /// Set once a login flow or bootstrap visit completed in this process.
    login_state: bool,
}

/// One browser process and page behind a [`BrowserDriver`].
pub struct BrowserSession {
    driver: Arc<dyn BrowserDriver>,
    options: SessionOptions,
    /// The open page; `None` until launched and after release.
    page: Option<Box<dyn PageHandle>>,
    state: SessionState,
    /// Browser processes started so far, including relaunches.
    launches: u32,
    installed_auth: Option<InstalledAuth>,
    /// First auth degradation noticed since the last `authenticate`.
    auth_warning: Option<String>,
}

impl std::fmt::Debug for BrowserSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrowserSession")
            .field("state", &self.state)
            .field("launches", &self.launches)
            .field("page_open", &self.page.is_some())
            .field(
                "auth",
                &self.installed_auth.as_ref().map(|auth| auth.strategy),
            )
            .finish()
    }
}

impl BrowserSession {
    pub fn new(driver: Arc<dyn BrowserDriver>, options: SessionOptions) -> Self {
        Self {
            driver,
            options,
            page: None,
            state: SessionState::Uninitialized,
            launches: 0,
            installed_auth: None,
            auth_warning: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Number of browser processes this session has started.
    pub fn launches(&self) -> u32 {
        self.launches
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// Take the warning recorded when a relaunch lost or failed to restore
    /// auth state.
    pub fn take_auth_warning(&mut self) -> Option<String> {
        self.auth_warning.take()
    }

    fn set_state(&mut self, next: SessionState) {
        if self.state != next {
            debug!(from = %self.state, to = %next, "session state");
            self.state = next;
        }
    }

    /// Launch the browser and open a page, retrying process creation.
    pub async fn initialize(&mut self, ctx: &OperationContext) -> Result<()> {
        if self.state == SessionState::Ready && self.page.is_some() {
            return Ok(());
        }
        self.set_state(SessionState::Initializing);

        let policy = self.options.retry.launch.clone();
        let result = retry_with_backoff(&policy, ctx, "browser launch", self, |session, _| {
            let ctx = ctx.clone();
            Box::pin(async move { session.launch_once(&ctx).await })
        })
        .await;

        match result {
            Ok(()) => {
                self.set_state(SessionState::Ready);
                info!(launches = self.launches, "browser session ready");
                Ok(())
            }
            Err(err) => {
                self.release().await;
                self.set_state(SessionState::Error);
                Err(match err {
                    RetryError::Exhausted { attempts, last } => SpcError::Initialization {
                        attempts,
                        message: last.to_string(),
                    },
                    RetryError::Aborted(e) => e,
                })
            }
        }
    }

    async fn launch_once(&mut self, ctx: &OperationContext) -> Result<()> {
        self.release().await;
        self.launches += 1;
        let limit = self.options.timeouts.init_step;
        let page = ctx
            .run(
                "browser launch",
                limit,
                self.driver.launch(&self.options.launch),
            )
            .await?;
        self.page = Some(page);
        self.replay_auth(ctx).await
    }

    /// Restore installed cookies and headers on a freshly launched page.
    /// Failures degrade auth instead of failing the launch.
    async fn replay_auth(&mut self, ctx: &OperationContext) -> Result<()> {
        let Some(installed) = self.installed_auth.clone() else {
            return Ok(());
        };
        let strategy = installed.strategy;
        match self
            .install_auth_state(&installed.cookies, &installed.headers, ctx)
            .await
        {
            Ok(()) => debug!(strategy, "auth state replayed after relaunch"),
            Err(err @ SpcError::Cancelled(_)) => return Err(err),
            Err(err) => self.degrade_auth(format!(
                "{strategy} auth could not be restored after browser relaunch: {err}"
            )),
        }
        if installed.login_state {
            self.degrade_auth(format!(
                "{strategy} login state was lost when the browser relaunched"
            ));
            if let Some(auth) = self.installed_auth.as_mut() {
                auth.login_state = false;
            }
        }
        Ok(())
    }

    async fn install_auth_state(
        &mut self,
        cookies: &[CookieSpec],
        headers: &BTreeMap<String, String>,
        ctx: &OperationContext,
    ) -> Result<()> {
        let step = self.options.timeouts.evaluation;
        let page = self.page_mut()?;
        if !cookies.is_empty() {
            ctx.run("set cookies", step, page.set_cookies(cookies)).await?;
        }
        if !headers.is_empty() {
            ctx.run("set headers", step, page.set_extra_headers(headers))
                .await?;
        }
        Ok(())
    }

    fn degrade_auth(&mut self, warning: String) {
        warn!(warning = %warning, "auth degraded");
        self.auth_warning.get_or_insert(warning);
    }

    /// Probe liveness; tear down and re-initialize if the page stopped
    /// answering.
    pub async fn ensure_ready(&mut self, ctx: &OperationContext) -> Result<()> {
        if self.state != SessionState::Ready || self.page.is_none() {
            return self.initialize(ctx).await;
        }

        let policy = self.options.retry.probe.clone();
        let probe = retry_with_backoff(&policy, ctx, "liveness probe", self, |session, _| {
            let ctx = ctx.clone();
            Box::pin(async move { session.probe_once(&ctx).await })
        })
        .await;

        match probe {
            Ok(()) => Ok(()),
            Err(RetryError::Aborted(err @ SpcError::Cancelled(_))) => Err(err),
            Err(err) => {
                warn!(error = %err.into_inner(), "browser stopped responding; re-initializing");
                self.reinitialize(ctx).await
            }
        }
    }

    async fn probe_once(&mut self, ctx: &OperationContext) -> Result<()> {
        let limit = self.options.timeouts.evaluation;
        let page = self.page_mut()?;
        let value = ctx
            .run("liveness probe", limit, page.evaluate(READY_PROBE))
            .await?;
        if value.as_f64() == Some(2.0) {
            Ok(())
        } else {
            Err(SpcError::browser(format!(
                "liveness probe returned unexpected value {value}"
            )))
        }
    }

    async fn reinitialize(&mut self, ctx: &OperationContext) -> Result<()> {
        self.release().await;
        self.set_state(SessionState::Uninitialized);
        self.initialize(ctx).await
    }

    /// Navigate and wait for the network to settle. Every retry starts from
    /// a fresh browser process.
    pub async fn navigate(&mut self, url: &str, ctx: &OperationContext) -> Result<()> {
        Url::parse(url)?;
        self.ensure_ready(ctx).await?;

        let policy = self.options.retry.navigation.clone();
        let target = url.to_string();
        let result = retry_with_backoff(&policy, ctx, "navigation", self, |session, attempt| {
            let ctx = ctx.clone();
            let target = target.clone();
            Box::pin(async move {
                if attempt > 1 {
                    session.reinitialize(&ctx).await?;
                }
                session.navigate_once(&target, &ctx).await
            })
        })
        .await;

        match result {
            Ok(()) => {
                info!(url, "navigation complete");
                Ok(())
            }
            Err(err) => {
                self.close().await;
                Err(match err {
                    RetryError::Exhausted { attempts, last } => SpcError::Navigation {
                        url: url.to_string(),
                        attempts,
                        message: last.to_string(),
                    },
                    RetryError::Aborted(e) => e,
                })
            }
        }
    }

    async fn navigate_once(&mut self, url: &str, ctx: &OperationContext) -> Result<()> {
        self.set_state(SessionState::Navigating);
        match self.goto_and_settle(url, ctx).await {
            Ok(()) => {
                self.set_state(SessionState::Ready);
                Ok(())
            }
            Err(err) => {
                self.set_state(SessionState::Error);
                Err(err)
            }
        }
    }

    async fn goto_and_settle(&mut self, url: &str, ctx: &OperationContext) -> Result<()> {
        let limit = self.options.timeouts.navigation;
        let page = self.page_mut()?;
        ctx.run("navigation", limit, page.goto(url)).await?;
        self.wait_for_network_idle(ctx).await
    }

    /// Wait until the document is complete and no new resources arrive for
    /// a short quiet window. Hitting the idle timeout only logs a warning.
    pub async fn wait_for_network_idle(&mut self, ctx: &OperationContext) -> Result<()> {
        let limit = self.options.timeouts.network_idle;
        let page = self.page_mut()?;
        let poll = async {
            let mut last_count: Option<u64> = None;
            let mut quiet = 0;
            loop {
                let status = page.evaluate(NETWORK_IDLE_PROBE).await?;
                let complete = status.get("readyState").and_then(Value::as_str) == Some("complete");
                let count = status.get("resources").and_then(Value::as_u64);

                if complete && count.is_some() && count == last_count {
                    quiet += 1;
                    if quiet >= IDLE_QUIET_POLLS {
                        return Ok::<(), SpcError>(());
                    }
                } else {
                    quiet = 0;
                }
                last_count = count;
                tokio::time::sleep(POLL_INTERVAL).await;
            }
        };

        match ctx.run("network idle", limit, poll).await {
            Err(SpcError::Timeout { after, .. }) => {
                warn!(
                    timeout_ms = after.as_millis() as u64,
                    "network did not go idle; continuing with current page state"
                );
                Ok(())
            }
            other => other,
        }
    }

    /// Apply an auth strategy. Only cancellation is returned as an error;
    /// any other failure becomes a warning on the outcome.
    pub async fn authenticate(
        &mut self,
        auth: &AuthConfig,
        ctx: &OperationContext,
    ) -> Result<AuthOutcome> {
        let strategy = auth.strategy();
        info!(strategy, "authenticating");
        self.installed_auth = None;
        self.auth_warning = None;
        match self.apply_auth(auth, ctx).await {
            Ok(()) => {
                info!(strategy, "authentication succeeded");
                let mut outcome = AuthOutcome::success(strategy);
                outcome.warning = self.auth_warning.take();
                Ok(outcome)
            }
            Err(err @ SpcError::Cancelled(_)) => Err(err),
            Err(err) => {
                let err = match err {
                    e @ SpcError::Authentication { .. } => e,
                    other => SpcError::authentication(strategy, other.to_string()),
                };
                warn!(strategy, error = %err, "authentication failed; continuing unauthenticated");
                Ok(AuthOutcome::failed(strategy, err.to_string()))
            }
        }
    }

    async fn apply_auth(&mut self, auth: &AuthConfig, ctx: &OperationContext) -> Result<()> {
        self.ensure_ready(ctx).await?;
        let step = self.options.timeouts.evaluation;

        match auth {
            AuthConfig::Credentials {
                login_url,
                username,
                password,
                username_selector,
                password_selector,
                submit_selector,
                success_selector,
            } => {
                self.navigate(login_url, ctx).await?;
                self.wait_for_selector(username_selector, step, ctx).await?;
                let page = self.page_mut()?;
                ctx.run("fill username", step, page.fill(username_selector, username))
                    .await?;
                ctx.run("fill password", step, page.fill(password_selector, password))
                    .await?;
                ctx.run("submit login", step, page.click(submit_selector))
                    .await?;
                match success_selector {
                    Some(sel) => {
                        let limit = self.options.timeouts.navigation;
                        self.wait_for_selector(sel, limit, ctx).await?;
                    }
                    None => self.wait_for_network_idle(ctx).await?,
                }
                self.record_login(auth.strategy());
                Ok(())
            }
            AuthConfig::Cookies { cookies } => {
                self.install_auth_state(cookies, &BTreeMap::new(), ctx)
                    .await?;
                self.installed_auth = Some(InstalledAuth {
                    strategy: auth.strategy(),
                    cookies: cookies.clone(),
                    ..InstalledAuth::default()
                });
                Ok(())
            }
            AuthConfig::Headers { headers } => {
                self.install_auth_state(&[], headers, ctx).await?;
                self.installed_auth = Some(InstalledAuth {
                    strategy: auth.strategy(),
                    headers: headers.clone(),
                    ..InstalledAuth::default()
                });
                Ok(())
            }
            AuthConfig::Manual {
                login_url,
                success_selector,
                timeout,
            } => {
                if self.options.launch.headless {
                    warn!("manual auth in headless mode cannot be completed interactively; pass --headed");
                }
                if let Some(url) = login_url {
                    self.navigate(url, ctx).await?;
                }
                let limit = timeout.unwrap_or(self.options.timeouts.manual_auth);
                info!(
                    selector = %success_selector,
                    timeout_s = limit.as_secs(),
                    "waiting for manual login"
                );
                self.wait_for_selector(success_selector, limit, ctx).await?;
                self.record_login(auth.strategy());
                Ok(())
            }
            AuthConfig::Session {
                bootstrap_url,
                cookies,
                headers,
            } => {
                self.install_auth_state(cookies, headers, ctx).await?;
                self.installed_auth = Some(InstalledAuth {
                    strategy: auth.strategy(),
                    cookies: cookies.clone(),
                    headers: headers.clone(),
                    login_state: false,
                });
                self.navigate(bootstrap_url, ctx).await?;
                self.record_login(auth.strategy());
                Ok(())
            }
        }
    }

    fn record_login(&mut self, strategy: &'static str) {
        let installed = self.installed_auth.get_or_insert_with(|| InstalledAuth {
            strategy,
            ..InstalledAuth::default()
        });
        installed.login_state = true;
    }

    /// Poll until `selector` matches at least one element.
    pub async fn wait_for_selector(
        &mut self,
        selector: &str,
        limit: Duration,
        ctx: &OperationContext,
    ) -> Result<()> {
        let literal = serde_json::to_string(selector)?;
        let expression = format!("document.querySelector({literal}) !== null");
        let page = self.page_mut()?;
        let poll = async {
            loop {
                if page.evaluate(&expression).await?.as_bool() == Some(true) {
                    return Ok::<(), SpcError>(());
                }
                tokio::time::sleep(POLL_INTERVAL).await;
            }
        };
        ctx.run(&format!("wait for {selector}"), limit, poll).await
    }

    /// Evaluate an expression on a ready page.
    pub async fn evaluate(&mut self, expression: &str, ctx: &OperationContext) -> Result<Value> {
        if self.state != SessionState::Ready {
            return Err(SpcError::browser(format!(
                "cannot evaluate: session is {}",
                self.state
            )));
        }
        let limit = self.options.timeouts.evaluation;
        let page = self.page_mut()?;
        ctx.run("evaluate", limit, page.evaluate(expression)).await
    }

    /// Release the browser. Idempotent and safe after failures.
    pub async fn close(&mut self) {
        self.release().await;
        self.set_state(SessionState::Closed);
    }

    async fn release(&mut self) {
        if let Some(mut page) = self.page.take() {
            if let Err(err) = page.close().await {
                debug!(error = %err, "error while closing browser page");
            }
        }
    }

    fn page_mut(&mut self) -> Result<&mut Box<dyn PageHandle>> {
        self.page
            .as_mut()
            .ok_or_else(|| SpcError::browser(format!("no open page (session {})", self.state)))
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        if self.page.is_some() {
            debug!("browser session dropped without close; releasing process");
        }
    }
}

/// Run `f` against a fresh session and close it afterwards, whatever `f`
/// returned.
pub async fn with_session<T, F>(
    driver: Arc<dyn BrowserDriver>,
    options: SessionOptions,
    f: F,
) -> Result<T>
where
    F: for<'a> FnOnce(&'a mut BrowserSession) -> BoxFuture<'a, Result<T>>,
{
    let mut session = BrowserSession::new(driver, options);
    let result = f(&mut session).await;
    session.close().await;
    result
}
