//! Acquisition of authenticated session material.
//!
//! Every strategy persists a storage state to
//! `<output_dir>/.auth/storageState.json` in the `{cookies, origins}` shape
//! understood by browser drivers, so the session collaborator only ever has
//! to load one format.
//!
//! | Method         | Storage state                         | Extra headers           |
//! |----------------|---------------------------------------|-------------------------|
//! | `none`         | not written                           | none                    |
//! | `api-login`    | cookies set by the login response     | none                    |
//! | `form-login`   | requires a form-capable driver        | none                    |
//! | `cookie`       | the configured cookies                | none                    |
//! | `bearer-token` | empty                                 | `Authorization: Bearer` |

use crate::config::{AuthConfig, CookieConfig};
use crate::errors::AuthError;
use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE, SET_COOKIE};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const AUTH_DIR: &str = ".auth";
pub const STORAGE_STATE_FILE: &str = "storageState.json";

/// A cookie in storage-state form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredCookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: String,
    /// Unix seconds, `-1` for a session cookie.
    pub expires: f64,
    pub http_only: bool,
    pub secure: bool,
    pub same_site: String,
}

impl StoredCookie {
    /// Whether this cookie would be sent with a request to `url`.
    pub fn matches(&self, url: &reqwest::Url) -> bool {
        let Some(host) = url.host_str() else {
            return false;
        };
        if self.secure && url.scheme() != "https" {
            return false;
        }
        if self.is_expired(chrono::Utc::now().timestamp()) {
            return false;
        }
        let domain = self.domain.trim_start_matches('.');
        let host_matches = host == domain || host.ends_with(&format!(".{}", domain));
        host_matches && url.path().starts_with(&self.path)
    }

    /// Session cookies (`expires < 0`) never expire.
    pub fn is_expired(&self, now: i64) -> bool {
        self.expires >= 0.0 && self.expires < now as f64
    }
}

impl From<&CookieConfig> for StoredCookie {
    fn from(cookie: &CookieConfig) -> Self {
        Self {
            name: cookie.name.clone(),
            value: cookie.value.clone(),
            domain: cookie.domain.clone(),
            path: if cookie.path.is_empty() {
                "/".to_string()
            } else {
                cookie.path.clone()
            },
            expires: -1.0,
            http_only: false,
            secure: true,
            same_site: "Lax".to_string(),
        }
    }
}

/// Persisted session state shared by all strategies.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageState {
    pub cookies: Vec<StoredCookie>,
    #[serde(default)]
    pub origins: Vec<serde_json::Value>,
}

impl StorageState {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn write(&self, path: &Path) -> Result<(), AuthError> {
        let write_err = |source: std::io::Error| AuthError::StateWriteFailed {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| write_err(std::io::Error::other(e)))?;
        std::fs::write(path, json).map_err(write_err)
    }
}

/// Session material produced by a successful authentication.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthOutcome {
    pub storage_state_path: PathBuf,
    pub extra_headers: HashMap<String, String>,
}

/// Location of the storage state under an output directory.
pub fn storage_state_path(output_dir: &Path) -> PathBuf {
    output_dir.join(AUTH_DIR).join(STORAGE_STATE_FILE)
}

/// Acquires session material for a run.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// `Ok(None)` means the run is unauthenticated.
    async fn authenticate(
        &self,
        auth: &AuthConfig,
        output_dir: &Path,
    ) -> Result<Option<AuthOutcome>, AuthError>;
}

/// Provider backed by plain HTTP requests.
pub struct HttpAuthProvider {
    client: reqwest::Client,
}

impl Default for HttpAuthProvider {
    fn default() -> Self {
        Self::new(reqwest::Client::new())
    }
}

impl HttpAuthProvider {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn api_login(
        &self,
        login_url: &str,
        payload: &HashMap<String, String>,
        headers: &HashMap<String, String>,
        output_dir: &Path,
    ) -> Result<AuthOutcome, AuthError> {
        let url = reqwest::Url::parse(login_url)
            .map_err(|_| AuthError::InvalidUrl(login_url.to_string()))?;
        let host = url
            .host_str()
            .ok_or_else(|| AuthError::InvalidUrl(login_url.to_string()))?
            .to_string();

        let mut request = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .json(payload);
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request.send().await.map_err(|source| AuthError::Request {
            url: login_url.to_string(),
            source,
        })?;

        let status = response.status();
        let cookies: Vec<StoredCookie> = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .filter_map(|value| parse_set_cookie(value, &host))
            .collect();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::LoginFailed {
                status: status.as_u16(),
                body,
            });
        }

        debug!(count = cookies.len(), "Login response set cookies");
        let path = storage_state_path(output_dir);
        StorageState {
            cookies,
            origins: Vec::new(),
        }
        .write(&path)?;

        Ok(AuthOutcome {
            storage_state_path: path,
            extra_headers: HashMap::new(),
        })
    }
}

#[async_trait]
impl AuthProvider for HttpAuthProvider {
    async fn authenticate(
        &self,
        auth: &AuthConfig,
        output_dir: &Path,
    ) -> Result<Option<AuthOutcome>, AuthError> {
        if matches!(auth, AuthConfig::None) {
            return Ok(None);
        }

        info!(method = auth.method(), "Authenticating");

        let outcome = match auth {
            AuthConfig::None => return Ok(None),
            AuthConfig::ApiLogin {
                login_url,
                payload,
                headers,
            } => {
                self.api_login(login_url, payload, headers, output_dir)
                    .await?
            }
            AuthConfig::FormLogin { .. } => {
                return Err(AuthError::Unsupported(auth.method().to_string()));
            }
            AuthConfig::Cookie { cookies } => cookie_inject(cookies, output_dir)?,
            AuthConfig::BearerToken { token } => bearer_token(token, output_dir)?,
        };

        info!("Authenticated successfully");
        Ok(Some(outcome))
    }
}

/// Synthesize a storage state from literal cookie values.
pub fn cookie_inject(cookies: &[CookieConfig], output_dir: &Path) -> Result<AuthOutcome, AuthError> {
    let path = storage_state_path(output_dir);
    StorageState {
        cookies: cookies.iter().map(StoredCookie::from).collect(),
        origins: Vec::new(),
    }
    .write(&path)?;

    Ok(AuthOutcome {
        storage_state_path: path,
        extra_headers: HashMap::new(),
    })
}

/// Empty storage state plus a fixed `Authorization` header.
pub fn bearer_token(token: &str, output_dir: &Path) -> Result<AuthOutcome, AuthError> {
    let path = storage_state_path(output_dir);
    StorageState::default().write(&path)?;

    let mut extra_headers = HashMap::new();
    extra_headers.insert("Authorization".to_string(), format!("Bearer {}", token));
    Ok(AuthOutcome {
        storage_state_path: path,
        extra_headers,
    })
}

/// Parse one `Set-Cookie` header value. `default_domain` is used when the
/// header carries no `Domain` attribute.
pub fn parse_set_cookie(header: &str, default_domain: &str) -> Option<StoredCookie> {
    let mut parts = header.split(';').map(str::trim);
    let (name, value) = parts.next()?.split_once('=')?;
    if name.is_empty() {
        return None;
    }

    let mut cookie = StoredCookie {
        name: name.to_string(),
        value: value.to_string(),
        domain: default_domain.to_string(),
        path: "/".to_string(),
        expires: -1.0,
        http_only: false,
        secure: false,
        same_site: "Lax".to_string(),
    };

    let mut max_age = None;
    let mut expires = None;
    for attribute in parts {
        let (key, val) = attribute.split_once('=').unwrap_or((attribute, ""));
        match key.to_ascii_lowercase().as_str() {
            "domain" if !val.is_empty() => cookie.domain = val.to_string(),
            "path" if !val.is_empty() => cookie.path = val.to_string(),
            "httponly" => cookie.http_only = true,
            "secure" => cookie.secure = true,
            "samesite" if !val.is_empty() => cookie.same_site = val.to_string(),
            "max-age" => max_age = val.parse::<i64>().ok(),
            "expires" => {
                expires = chrono::DateTime::parse_from_rfc2822(val)
                    .ok()
                    .map(|at| at.timestamp())
            }
            _ => {}
        }
    }

    // Max-Age wins over Expires.
    if let Some(secs) = max_age {
        cookie.expires = chrono::Utc::now().timestamp().saturating_add(secs) as f64;
    } else if let Some(at) = expires {
        cookie.expires = at as f64;
    }

    Some(cookie)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_none_returns_no_outcome() {
        let dir = tempdir().unwrap();
        let provider = HttpAuthProvider::default();
        let outcome = provider
            .authenticate(&AuthConfig::None, dir.path())
            .await
            .unwrap();
        assert!(outcome.is_none());
        assert!(!storage_state_path(dir.path()).exists());
    }

    #[tokio::test]
    async fn test_cookie_strategy_persists_cookies() {
        let dir = tempdir().unwrap();
        let auth = AuthConfig::Cookie {
            cookies: vec![CookieConfig {
                name: "sid".to_string(),
                value: "abc".to_string(),
                domain: "example.com".to_string(),
                path: String::new(),
            }],
        };

        let outcome = HttpAuthProvider::default()
            .authenticate(&auth, dir.path())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(outcome.storage_state_path, storage_state_path(dir.path()));
        let state = StorageState::load(&outcome.storage_state_path).unwrap();
        assert_eq!(state.cookies.len(), 1);
        let cookie = &state.cookies[0];
        assert_eq!(cookie.path, "/");
        assert_eq!(cookie.expires, -1.0);
        assert!(cookie.secure);
        assert_eq!(cookie.same_site, "Lax");
        assert!(state.origins.is_empty());
    }

    #[tokio::test]
    async fn test_bearer_strategy_sets_header_and_empty_state() {
        let dir = tempdir().unwrap();
        let auth = AuthConfig::BearerToken {
            token: "t0k".to_string(),
        };

        let outcome = HttpAuthProvider::default()
            .authenticate(&auth, dir.path())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(
            outcome.extra_headers.get("Authorization").map(String::as_str),
            Some("Bearer t0k")
        );
        let raw = std::fs::read_to_string(&outcome.storage_state_path).unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json["cookies"], serde_json::json!([]));
        assert_eq!(json["origins"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_form_login_is_unsupported_over_http() {
        let dir = tempdir().unwrap();
        let auth = AuthConfig::FormLogin {
            login_url: "https://example.com/login".to_string(),
            fields: vec![],
            submit_selector: "button".to_string(),
            wait_after_login: None,
        };
        let err = HttpAuthProvider::default()
            .authenticate(&auth, dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Unsupported(ref m) if m == "form-login"));
    }

    #[test]
    fn test_parse_set_cookie_attributes() {
        let cookie = parse_set_cookie(
            "session=xyz; Path=/app; Domain=.example.com; HttpOnly; Secure; SameSite=Strict",
            "login.example.com",
        )
        .unwrap();
        assert_eq!(cookie.name, "session");
        assert_eq!(cookie.value, "xyz");
        assert_eq!(cookie.domain, ".example.com");
        assert_eq!(cookie.path, "/app");
        assert!(cookie.http_only);
        assert!(cookie.secure);
        assert_eq!(cookie.same_site, "Strict");

        let bare = parse_set_cookie("token=1", "example.com").unwrap();
        assert_eq!(bare.domain, "example.com");
        assert_eq!(bare.path, "/");
        assert!(parse_set_cookie("garbage", "example.com").is_none());
    }

    fn url(raw: &str) -> reqwest::Url {
        reqwest::Url::parse(raw).unwrap()
    }

    #[test]
    fn test_stored_cookie_matching() {
        let cookie = parse_set_cookie("a=1; Domain=.example.com; Path=/app", "x").unwrap();
        assert!(cookie.matches(&url("https://example.com/app/page")));
        assert!(cookie.matches(&url("http://www.example.com/app")));
        assert!(!cookie.matches(&url("https://notexample.com/app")));
        assert!(!cookie.matches(&url("https://example.com/other")));
    }

    #[test]
    fn test_secure_cookie_is_not_sent_over_http() {
        let cookie = parse_set_cookie("sid=1; Secure", "example.com").unwrap();
        assert!(cookie.matches(&url("https://example.com/")));
        assert!(!cookie.matches(&url("http://example.com/")));
    }

    #[test]
    fn test_huge_max_age_saturates() {
        let cookie = parse_set_cookie("sid=1; Max-Age=9223372036854775807", "example.com").unwrap();
        assert_eq!(cookie.expires, i64::MAX as f64);
        assert!(!cookie.is_expired(chrono::Utc::now().timestamp()));
    }

    #[test]
    fn test_expires_attribute_is_kept() {
        let cookie = parse_set_cookie(
            "sid=1; Expires=Wed, 21 Oct 2015 07:28:00 GMT",
            "example.com",
        )
        .unwrap();
        assert_eq!(cookie.expires, 1445412480.0);
        assert!(cookie.is_expired(chrono::Utc::now().timestamp()));
        assert!(!cookie.matches(&url("https://example.com/")));

        let both = parse_set_cookie(
            "sid=1; Expires=Wed, 21 Oct 2015 07:28:00 GMT; Max-Age=3600",
            "example.com",
        )
        .unwrap();
        assert!(!both.is_expired(chrono::Utc::now().timestamp()));
    }
}
