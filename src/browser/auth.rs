//! Authentication strategies applied to a session before capture.
//!
//! [`AuthConfig`] is validated while it is deserialized, so an incomplete
//! config is rejected before any browser work starts.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthConfigError {
    #[error("{strategy} auth requires a non-empty '{field}'")]
    MissingField {
        strategy: &'static str,
        field: &'static str,
    },
    #[error("{strategy} auth has an invalid URL '{url}': {reason}")]
    InvalidUrl {
        strategy: &'static str,
        url: String,
        reason: String,
    },
    #[error("cookie '{0}' needs a domain or url")]
    CookieScope(String),
}

/// A cookie to install before navigation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CookieSpec {
    pub name: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secure: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_only: Option<bool>,
}

#[derive(Clone, PartialEq, Deserialize)]
#[serde(try_from = "RawAuthConfig")]
pub enum AuthConfig {
    Credentials {
        login_url: String,
        username: String,
        password: String,
        username_selector: String,
        password_selector: String,
        submit_selector: String,
        success_selector: Option<String>,
    },
    Cookies {
        cookies: Vec<CookieSpec>,
    },
    Headers {
        headers: BTreeMap<String, String>,
    },
    Manual {
        login_url: Option<String>,
        success_selector: String,
        /// Falls back to `timeouts.manual_auth` when unset.
        timeout: Option<Duration>,
    },
    Session {
        bootstrap_url: String,
        cookies: Vec<CookieSpec>,
        headers: BTreeMap<String, String>,
    },
}

impl AuthConfig {
    pub fn strategy(&self) -> &'static str {
        match self {
            AuthConfig::Credentials { .. } => "credentials",
            AuthConfig::Cookies { .. } => "cookies",
            AuthConfig::Headers { .. } => "headers",
            AuthConfig::Manual { .. } => "manual",
            AuthConfig::Session { .. } => "session",
        }
    }

    /// Malformed JSON is a serialization error; well-formed but incomplete
    /// configs surface as [`AuthConfigError`].
    pub fn from_json(json: &str) -> crate::Result<Self> {
        let raw: RawAuthConfig = serde_json::from_str(json)?;
        Ok(Self::try_from(raw)?)
    }
}

// Secrets stay out of logs.
impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthConfig::Credentials {
                login_url,
                username,
                ..
            } => f
                .debug_struct("Credentials")
                .field("login_url", login_url)
                .field("username", username)
                .field("password", &"<redacted>")
                .finish_non_exhaustive(),
            AuthConfig::Cookies { cookies } => f
                .debug_struct("Cookies")
                .field("count", &cookies.len())
                .finish(),
            AuthConfig::Headers { headers } => f
                .debug_struct("Headers")
                .field("names", &headers.keys().collect::<Vec<_>>())
                .finish(),
            AuthConfig::Manual {
                login_url,
                success_selector,
                timeout,
            } => f
                .debug_struct("Manual")
                .field("login_url", login_url)
                .field("success_selector", success_selector)
                .field("timeout", timeout)
                .finish(),
            AuthConfig::Session { bootstrap_url, .. } => f
                .debug_struct("Session")
                .field("bootstrap_url", bootstrap_url)
                .finish_non_exhaustive(),
        }
    }
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum RawAuthConfig {
    #[serde(rename_all = "camelCase")]
    Credentials {
        #[serde(alias = "login_url")]
        login_url: Option<String>,
        username: Option<String>,
        password: Option<String>,
        #[serde(alias = "username_selector")]
        username_selector: Option<String>,
        #[serde(alias = "password_selector")]
        password_selector: Option<String>,
        #[serde(alias = "submit_selector")]
        submit_selector: Option<String>,
        #[serde(alias = "success_selector")]
        success_selector: Option<String>,
    },
    Cookies {
        #[serde(default)]
        cookies: Vec<CookieSpec>,
    },
    Headers {
        #[serde(default)]
        headers: BTreeMap<String, String>,
    },
    #[serde(rename_all = "camelCase")]
    Manual {
        #[serde(alias = "login_url")]
        login_url: Option<String>,
        #[serde(alias = "success_selector")]
        success_selector: Option<String>,
        #[serde(default, with = "humantime_serde")]
        timeout: Option<Duration>,
    },
    #[serde(rename_all = "camelCase")]
    Session {
        #[serde(alias = "bootstrap_url")]
        bootstrap_url: Option<String>,
        #[serde(default)]
        cookies: Vec<CookieSpec>,
        #[serde(default)]
        headers: BTreeMap<String, String>,
    },
}

impl TryFrom<RawAuthConfig> for AuthConfig {
    type Error = AuthConfigError;

    fn try_from(raw: RawAuthConfig) -> Result<Self, Self::Error> {
        match raw {
            RawAuthConfig::Credentials {
                login_url,
                username,
                password,
                username_selector,
                password_selector,
                submit_selector,
                success_selector,
            } => {
                const S: &str = "credentials";
                let login_url = required(S, "loginUrl", login_url)?;
                check_url(S, &login_url)?;
                Ok(AuthConfig::Credentials {
                    login_url,
                    username: required(S, "username", username)?,
                    password: required(S, "password", password)?,
                    username_selector: required(S, "usernameSelector", username_selector)?,
                    password_selector: required(S, "passwordSelector", password_selector)?,
                    submit_selector: required(S, "submitSelector", submit_selector)?,
                    success_selector: success_selector.filter(|s| !s.trim().is_empty()),
                })
            }
            RawAuthConfig::Cookies { cookies } => {
                if cookies.is_empty() {
                    return Err(AuthConfigError::MissingField {
                        strategy: "cookies",
                        field: "cookies",
                    });
                }
                check_cookies(&cookies)?;
                Ok(AuthConfig::Cookies { cookies })
            }
            RawAuthConfig::Headers { headers } => {
                if headers.is_empty() {
                    return Err(AuthConfigError::MissingField {
                        strategy: "headers",
                        field: "headers",
                    });
                }
                Ok(AuthConfig::Headers { headers })
            }
            RawAuthConfig::Manual {
                login_url,
                success_selector,
                timeout,
            } => {
                let login_url = login_url.filter(|u| !u.trim().is_empty());
                if let Some(url) = &login_url {
                    check_url("manual", url)?;
                }
                Ok(AuthConfig::Manual {
                    login_url,
                    success_selector: required("manual", "successSelector", success_selector)?,
                    timeout,
                })
            }
            RawAuthConfig::Session {
                bootstrap_url,
                cookies,
                headers,
            } => {
                let bootstrap_url = required("session", "bootstrapUrl", bootstrap_url)?;
                check_url("session", &bootstrap_url)?;
                check_cookies(&cookies)?;
                Ok(AuthConfig::Session {
                    bootstrap_url,
                    cookies,
                    headers,
                })
            }
        }
    }
}

fn required(
    strategy: &'static str,
    field: &'static str,
    value: Option<String>,
) -> Result<String, AuthConfigError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or(AuthConfigError::MissingField { strategy, field })
}

fn check_url(strategy: &'static str, url: &str) -> Result<(), AuthConfigError> {
    Url::parse(url)
        .map(|_| ())
        .map_err(|e| AuthConfigError::InvalidUrl {
            strategy,
            url: url.to_string(),
            reason: e.to_string(),
        })
}

fn check_cookies(cookies: &[CookieSpec]) -> Result<(), AuthConfigError> {
    for c in cookies {
        if c.name.trim().is_empty() {
            return Err(AuthConfigError::MissingField {
                strategy: "cookies",
                field: "name",
            });
        }
        if c.domain.is_none() && c.url.is_none() {
            return Err(AuthConfigError::CookieScope(c.name.clone()));
        }
    }
    Ok(())
}

/// Result of an authentication attempt. Failure is reported here, not as an
/// error, and the run continues unauthenticated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthOutcome {
    pub strategy: &'static str,
    pub authenticated: bool,
    pub warning: Option<String>,
}

impl AuthOutcome {
    pub fn success(strategy: &'static str) -> Self {
        Self {
            strategy,
            authenticated: true,
            warning: None,
        }
    }

    pub fn failed(strategy: &'static str, warning: impl Into<String>) -> Self {
        Self {
            strategy,
            authenticated: false,
            warning: Some(warning.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_config_parses() {
        let cfg = AuthConfig::from_json(
            r##"{
                "type": "credentials",
                "loginUrl": "https://app.example.com/login",
                "username": "qa@example.com",
                "password": "hunter2",
                "usernameSelector": "#email",
                "passwordSelector": "#password",
                "submitSelector": "button[type=submit]"
            }"##,
        )
        .expect("valid credentials");
        assert_eq!(cfg.strategy(), "credentials");
        let debug = format!("{cfg:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn credentials_missing_field_rejected() {
        let err = AuthConfig::from_json(
            r##"{"type": "credentials", "loginUrl": "https://x.test/login", "username": "u",
                "password": "", "usernameSelector": "#u", "passwordSelector": "#p",
                "submitSelector": "#s"}"##,
        )
        .expect_err("empty password");
        assert!(matches!(
            err,
            crate::SpcError::InvalidAuthConfig(AuthConfigError::MissingField {
                field: "password",
                ..
            })
        ));
    }

    #[test]
    fn manual_timeout_is_optional() {
        let cfg = AuthConfig::from_json(r##"{"type": "manual", "successSelector": "#dashboard"}"##)
            .expect("manual");
        match cfg {
            AuthConfig::Manual { timeout, login_url, .. } => {
                assert!(timeout.is_none());
                assert!(login_url.is_none());
            }
            other => panic!("unexpected {other:?}"),
        }

        let cfg = AuthConfig::from_json(
            r##"{"type": "manual", "successSelector": "#dashboard", "timeout": "90s"}"##,
        )
        .expect("manual");
        assert!(matches!(cfg, AuthConfig::Manual { timeout, .. } if timeout == Some(Duration::from_secs(90))));
    }

    #[test]
    fn cookies_need_scope() {
        let err = AuthConfig::from_json(
            r#"{"type": "cookies", "cookies": [{"name": "sid", "value": "abc"}]}"#,
        )
        .expect_err("no domain");
        assert!(err.to_string().contains("domain or url"));

        let ok = AuthConfig::from_json(
            r#"{"type": "cookies", "cookies": [{"name": "sid", "value": "abc", "domain": "example.com"}]}"#,
        );
        assert!(ok.is_ok());
    }

    #[test]
    fn session_requires_valid_bootstrap_url() {
        let err = AuthConfig::from_json(r#"{"type": "session", "bootstrapUrl": "not a url"}"#)
            .expect_err("bad url");
        assert!(err.to_string().contains("invalid URL"));

        let cfg = AuthConfig::from_json(
            r#"{"type": "session", "bootstrapUrl": "https://x.test/sso", "headers": {"X-Env": "qa"}}"#,
        )
        .expect("session");
        assert_eq!(cfg.strategy(), "session");
    }

    #[test]
    fn unknown_type_rejected() {
        assert!(AuthConfig::from_json(r#"{"type": "oauth"}"#).is_err());
        assert!(AuthConfig::from_json(r#"{"type": "headers", "headers": {}}"#).is_err());
    }
}
