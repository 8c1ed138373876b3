//! Direct transport: authenticated calls straight to the Figma REST API.
//!
//! The client never retries on its own; retry policy belongs to callers
//! (see [`crate::thumbnails`]).

use crate::cache::QueryParams;
use crate::error::{BridgeError, Result};
use reqwest::{header::RETRY_AFTER, Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use tracing::debug;
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://api.figma.com";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Clone, PartialEq, Eq)]
pub enum FigmaAuth {
    PersonalAccessToken(String),
    OAuthToken(String),
}

impl fmt::Debug for FigmaAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FigmaAuth::PersonalAccessToken(_) => f.write_str("PersonalAccessToken(<redacted>)"),
            FigmaAuth::OAuthToken(_) => f.write_str("OAuthToken(<redacted>)"),
        }
    }
}

impl FigmaAuth {
    pub fn from_env() -> Option<Self> {
        if let Ok(token) = std::env::var("FIGMA_TOKEN") {
            if !token.is_empty() {
                return Some(Self::PersonalAccessToken(token));
            }
        }

        if let Ok(token) = std::env::var("FIGMA_OAUTH_TOKEN") {
            if !token.is_empty() {
                return Some(Self::OAuthToken(token));
            }
        }

        None
    }

    pub fn token(&self) -> &str {
        match self {
            FigmaAuth::PersonalAccessToken(token) | FigmaAuth::OAuthToken(token) => token,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            FigmaAuth::PersonalAccessToken(_) => "personal-access-token",
            FigmaAuth::OAuthToken(_) => "oauth",
        }
    }

    fn apply(&self, builder: RequestBuilder) -> RequestBuilder {
        match self {
            FigmaAuth::PersonalAccessToken(token) => builder.header("X-Figma-Token", token),
            FigmaAuth::OAuthToken(token) => builder.bearer_auth(token),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FigmaClient {
    http: Client,
    base_url: Url,
    timeout: Duration,
}

impl FigmaClient {
    pub fn new() -> Result<Self> {
        Self::with_base_url_and_timeout(DEFAULT_BASE_URL, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_base_url(base_url: impl AsRef<str>) -> Result<Self> {
        Self::with_base_url_and_timeout(base_url, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_base_url_and_timeout(base_url: impl AsRef<str>, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(base_url.as_ref())
            .map_err(|e| BridgeError::Config(format!("invalid Figma API base URL: {e}")))?;

        let http = Client::builder()
            .no_proxy()
            .build()
            .map_err(BridgeError::from_reqwest)?;

        Ok(Self {
            http,
            base_url,
            timeout,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn default_timeout(&self) -> Duration {
        self.timeout
    }

    /// GET `/v1{path}` and return the decoded JSON body.
    pub async fn request(
        &self,
        path: &str,
        params: &QueryParams,
        auth: Option<&FigmaAuth>,
        timeout: Option<Duration>,
    ) -> Result<Value> {
        self.request_json(path, params, auth, timeout).await
    }

    pub async fn request_json<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &QueryParams,
        auth: Option<&FigmaAuth>,
        timeout: Option<Duration>,
    ) -> Result<T> {
        let auth = auth.ok_or_else(BridgeError::missing_credentials)?;
        if auth.token().is_empty() {
            return Err(BridgeError::missing_credentials());
        }

        let url = self.endpoint(path, params)?;
        let timeout = timeout.unwrap_or(self.timeout);
        debug!(path, timeout_ms = timeout.as_millis() as u64, "figma request");

        let req = auth.apply(self.http.get(url)).timeout(timeout);
        self.send_json(req).await
    }

    fn endpoint(&self, path: &str, params: &QueryParams) -> Result<Url> {
        let path = path.trim_start_matches('/');
        let mut url = self
            .base_url
            .join(&format!("/v1/{path}"))
            .map_err(|e| BridgeError::validation(format!("invalid request path '{path}': {e}")))?;
        if !params.is_empty() {
            url.query_pairs_mut().extend_pairs(params.iter());
        }
        Ok(url)
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = request.send().await.map_err(BridgeError::from_reqwest)?;
        let status = response.status();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);

        let body = response.text().await.map_err(BridgeError::from_reqwest)?;

        if status.is_success() {
            return serde_json::from_str(&body).map_err(BridgeError::from);
        }

        Err(BridgeError::from_status(
            status,
            error_message(status, &body, retry_after.as_deref()),
        ))
    }
}

fn error_message(status: StatusCode, body: &str, retry_after: Option<&str>) -> String {
    let fallback = format!("Figma API returned status {}", status.as_u16());
    let parsed = serde_json::from_str::<Value>(body).ok();
    let from_body = parsed
        .as_ref()
        .and_then(|value| {
            value
                .get("err")
                .or_else(|| value.get("error"))
                .or_else(|| value.get("message"))
        })
        .and_then(Value::as_str)
        .map(str::to_owned);

    match (status, retry_after, from_body) {
        (StatusCode::TOO_MANY_REQUESTS, Some(retry), Some(msg)) => {
            format!("{msg} (rate limited, retry after {retry}s)")
        }
        (StatusCode::TOO_MANY_REQUESTS, Some(retry), None) => {
            format!("rate limited by Figma API, retry after {retry}s")
        }
        (_, _, Some(msg)) => msg,
        _ => fallback,
    }
}
