//! Headless browser sessions.
//!
//! # Module Structure
//!
//! - [`driver`] - `BrowserDriver`/`PageHandle` traits the session runs on
//! - [`session`] - the session state machine (launch, probe, navigate, auth)
//! - [`auth`] - authentication strategies and their validation
//! - `chromium` - CDP implementation of the driver (feature `chromium`)
//!
//! # Example
//!
//! ```no_run
//! # #[cfg(feature = "chromium")]
//! # async fn example() -> spc_lib::Result<()> {
//! use std::sync::Arc;
//! use spc_lib::browser::{BrowserSession, ChromiumDriver, SessionOptions};
//! use spc_lib::OperationContext;
//!
//! let ctx = OperationContext::new();
//! let mut session = BrowserSession::new(Arc::new(ChromiumDriver::new()), SessionOptions::default());
//! session.navigate("https://example.com", &ctx).await?;
//! let title = session.evaluate("document.title", &ctx).await?;
//! println!("{title}");
//! session.close().await;
//! # Ok(())
//! # }
//! ```

pub mod auth;
#[cfg(feature = "chromium")]
mod chromium;
pub mod driver;
pub mod session;

pub use auth::{AuthConfig, AuthConfigError, AuthOutcome, CookieSpec};
#[cfg(feature = "chromium")]
pub use chromium::{ChromiumDriver, ChromiumPage};
pub use driver::{BrowserDriver, LaunchOptions, PageHandle};
pub use session::{with_session, BrowserSession, SessionOptions, SessionState};
