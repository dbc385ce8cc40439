//! [`BrowserDriver`] backed by a local Chrome/Chromium over CDP.

use std::collections::BTreeMap;

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{
    CookieParam, Headers, SetExtraHttpHeadersParams,
};
use chromiumoxide::handler::viewport::Viewport as CdpViewport;
use chromiumoxide::Page;
use futures::StreamExt;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::debug;

use super::auth::CookieSpec;
use super::driver::{BrowserDriver, LaunchOptions, PageHandle};
use crate::error::{Result, SpcError};

fn cdp_err(context: &str, err: impl std::fmt::Display) -> SpcError {
    SpcError::browser(format!("{context}: {err}"))
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ChromiumDriver;

impl ChromiumDriver {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl BrowserDriver for ChromiumDriver {
    async fn launch(&self, options: &LaunchOptions) -> Result<Box<dyn PageHandle>> {
        let vp = options.viewport;
        let mut builder = BrowserConfig::builder()
            .window_size(vp.width, vp.height)
            .viewport(CdpViewport {
                width: vp.width,
                height: vp.height,
                ..CdpViewport::default()
            })
            .request_timeout(options.request_timeout);
        if !options.headless {
            builder = builder.with_head();
        }
        if !options.sandbox {
            builder = builder.no_sandbox();
        }
        if let Some(path) = &options.executable {
            builder = builder.chrome_executable(path);
        }
        let config = builder
            .build()
            .map_err(|e| SpcError::Config(format!("Invalid browser config: {e}")))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| cdp_err("failed to launch chromium executable", e))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    debug!(error = %err, "cdp handler event error");
                }
            }
        });

        let mut page = ChromiumPage {
            browser,
            page: None,
            handler,
        };
        match page.browser.new_page("about:blank").await {
            Ok(p) => {
                page.page = Some(p);
                Ok(Box::new(page))
            }
            Err(err) => {
                let _ = page.close().await;
                Err(cdp_err("failed to open page", err))
            }
        }
    }
}

/// Owns the browser process. Dropping it stops the event loop and the
/// `Browser` drop kills the child process.
pub struct ChromiumPage {
    browser: Browser,
    page: Option<Page>,
    handler: JoinHandle<()>,
}

impl ChromiumPage {
    fn page(&self) -> Result<&Page> {
        self.page
            .as_ref()
            .ok_or_else(|| SpcError::browser("page already closed"))
    }
}

impl Drop for ChromiumPage {
    fn drop(&mut self) {
        self.handler.abort();
    }
}

#[async_trait::async_trait]
impl PageHandle for ChromiumPage {
    async fn goto(&mut self, url: &str) -> Result<()> {
        self.page()?
            .goto(url)
            .await
            .map_err(|e| cdp_err(&format!("navigation to {url} failed"), e))?;
        Ok(())
    }

    async fn evaluate(&mut self, expression: &str) -> Result<Value> {
        let result = self
            .page()?
            .evaluate(expression)
            .await
            .map_err(|e| cdp_err("evaluation failed", e))?;
        Ok(result.value().cloned().unwrap_or(Value::Null))
    }

    async fn set_cookies(&mut self, cookies: &[CookieSpec]) -> Result<()> {
        let mut params = Vec::with_capacity(cookies.len());
        for c in cookies {
            let mut b = CookieParam::builder().name(&c.name).value(&c.value);
            if let Some(domain) = &c.domain {
                b = b.domain(domain);
            }
            if let Some(path) = &c.path {
                b = b.path(path);
            }
            if let Some(url) = &c.url {
                b = b.url(url);
            }
            if let Some(secure) = c.secure {
                b = b.secure(secure);
            }
            if let Some(http_only) = c.http_only {
                b = b.http_only(http_only);
            }
            params.push(b.build().map_err(|e| cdp_err("invalid cookie", e))?);
        }
        self.page()?
            .set_cookies(params)
            .await
            .map_err(|e| cdp_err("setting cookies failed", e))?;
        Ok(())
    }

    async fn set_extra_headers(&mut self, headers: &BTreeMap<String, String>) -> Result<()> {
        let json = serde_json::to_value(headers)?;
        self.page()?
            .execute(SetExtraHttpHeadersParams::new(Headers::new(json)))
            .await
            .map_err(|e| cdp_err("setting headers failed", e))?;
        Ok(())
    }

    async fn fill(&mut self, selector: &str, value: &str) -> Result<()> {
        let element = self
            .page()?
            .find_element(selector)
            .await
            .map_err(|_| SpcError::SelectorNotFound(selector.to_string()))?;
        element
            .click()
            .await
            .map_err(|e| cdp_err(&format!("focusing {selector} failed"), e))?
            .type_str(value)
            .await
            .map_err(|e| cdp_err(&format!("typing into {selector} failed"), e))?;
        Ok(())
    }

    async fn click(&mut self, selector: &str) -> Result<()> {
        let element = self
            .page()?
            .find_element(selector)
            .await
            .map_err(|_| SpcError::SelectorNotFound(selector.to_string()))?;
        element
            .click()
            .await
            .map_err(|e| cdp_err(&format!("clicking {selector} failed"), e))?;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.page = None;
        let closed = self.browser.close().await;
        match closed {
            Ok(_) => {
                if let Err(err) = self.browser.wait().await {
                    debug!(error = %err, "waiting for browser exit failed");
                }
            }
            Err(err) => {
                debug!(error = %err, "graceful browser close failed; killing process");
                if let Some(Err(kill_err)) = self.browser.kill().await {
                    self.handler.abort();
                    return Err(SpcError::browser(format!(
                        "failed to kill browser process: {kill_err}"
                    )));
                }
            }
        }
        self.handler.abort();
        Ok(())
    }
}
