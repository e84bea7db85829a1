use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::warn;
use url::Url;

use crate::credentials::CredentialSource;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_RETRIES: u8 = 2;
const RETRY_BASE_DELAY: Duration = Duration::from_millis(250);

/// Options for one REST module: base URL, identity headers, timeout and
/// transient-retry budget. All optional knobs carry defaults; validation is
/// eager so a bad base URL fails at construction, not on the first call.
#[derive(Debug, Clone)]
pub struct RestConfig {
    pub base_url: String,
    pub client_id: String,
    pub user_agent: String,
    pub timeout: Duration,
    pub retries: u8,
}

impl RestConfig {
    pub fn new(base_url: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client_id: client_id.into(),
            user_agent: format!("castbridge/{}", env!("CARGO_PKG_VERSION")),
            timeout: DEFAULT_TIMEOUT,
            retries: DEFAULT_RETRIES,
        }
    }

    pub fn validate(&self) -> Result<(), RestError> {
        Url::parse(&self.base_url)
            .map_err(|err| RestError::InvalidConfig(format!("base_url: {err}")))?;
        if self.client_id.is_empty() {
            return Err(RestError::InvalidConfig("client_id must not be empty".into()));
        }
        if self.timeout.is_zero() {
            return Err(RestError::InvalidConfig("timeout must be non-zero".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum RestError {
    #[error("invalid rest config: {0}")]
    InvalidConfig(String),
    #[error("unauthorized")]
    Unauthorized,
    #[error("request failed with status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("network error: {0}")]
    Network(#[source] reqwest::Error),
    #[error("failed to decode response body: {0}")]
    Decode(#[source] reqwest::Error),
}

impl RestError {
    fn is_transient(&self) -> bool {
        match self {
            RestError::Network(_) => true,
            RestError::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Typed HTTP calling convention shared by the request/response modules.
/// Injects `Authorization`, `Client-Id` and `User-Agent` on every request and
/// retries transient failures with a short linear delay.
pub struct RestClient {
    http: reqwest::Client,
    config: RestConfig,
    credentials: Arc<dyn CredentialSource>,
}

impl std::fmt::Debug for RestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestClient").finish_non_exhaustive()
    }
}

impl RestClient {
    pub fn new(
        config: RestConfig,
        credentials: Arc<dyn CredentialSource>,
    ) -> Result<Self, RestError> {
        config.validate()?;
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(RestError::Network)?;
        Ok(Self {
            http,
            config,
            credentials,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, RestError> {
        self.request(reqwest::Method::GET, path, query, None::<&()>)
            .await
    }

    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, RestError> {
        self.request(reqwest::Method::POST, path, &[], Some(body))
            .await
    }

    async fn request<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        method: reqwest::Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&B>,
    ) -> Result<T, RestError> {
        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            match self.send_once(method.clone(), path, query, body).await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt <= self.config.retries => {
                    warn!(attempt, path, error = %err, "retrying transient rest failure");
                    tokio::time::sleep(RETRY_BASE_DELAY * u32::from(attempt)).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn send_once<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        method: reqwest::Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&B>,
    ) -> Result<T, RestError> {
        let token = self
            .credentials
            .token()
            .await
            .map_err(|_| RestError::Unauthorized)?;

        let url = join_url(&self.config.base_url, path);
        let mut request = self
            .http
            .request(method, url)
            .header("Authorization", token.authorization_header())
            .header("Client-Id", &self.config.client_id)
            .header("User-Agent", &self.config.user_agent);
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(RestError::Network)?;
        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(RestError::Unauthorized);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RestError::Status {
                status: status.as_u16(),
                body,
            });
        }
        response.json::<T>().await.map_err(RestError::Decode)
    }
}

pub(crate) fn join_url(base: &str, path: &str) -> String {
    if path.is_empty() {
        base.trim_end_matches('/').to_string()
    } else {
        format!(
            "{}/{}",
            base.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}
