use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;

/// Bearer token handed out by a [`CredentialSource`].
///
/// The secret is redacted from `Debug` output so tokens never end up in logs.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
    secret: String,
    login: Option<String>,
}

impl AccessToken {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            login: None,
        }
    }

    pub fn with_login(mut self, login: impl Into<String>) -> Self {
        self.login = Some(login.into());
        self
    }

    /// Login the token was issued for, when the issuer reported one.
    pub fn login(&self) -> Option<&str> {
        self.login.as_deref()
    }

    /// Value for an `Authorization` header on REST calls.
    pub fn authorization_header(&self) -> String {
        format!("Bearer {}", self.secret)
    }

    /// Value for the chat protocol `PASS` line.
    pub fn irc_pass(&self) -> String {
        format!("oauth:{}", self.secret)
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("secret", &"<redacted>")
            .field("login", &self.login)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),
    #[error(transparent)]
    Unavailable(#[from] anyhow::Error),
}

/// Source of the current auth token. Implementations may refresh or swap the
/// token at runtime; callers always ask for the latest value.
#[async_trait]
pub trait CredentialSource: Send + Sync {
    async fn token(&self) -> Result<AccessToken, CredentialError>;
}

/// Fixed token, useful for CLI usage and tests.
pub struct StaticCredentials {
    token: AccessToken,
}

impl StaticCredentials {
    pub fn new(token: AccessToken) -> Self {
        Self { token }
    }
}

#[async_trait]
impl CredentialSource for StaticCredentials {
    async fn token(&self) -> Result<AccessToken, CredentialError> {
        Ok(self.token.clone())
    }
}

/// Token holder that can be replaced at runtime, e.g. by an external OAuth
/// refresher. Readers see the swapped value on their next call.
#[derive(Clone)]
pub struct SwappableCredentials {
    inner: Arc<RwLock<AccessToken>>,
}

impl SwappableCredentials {
    pub fn new(token: AccessToken) -> Self {
        Self {
            inner: Arc::new(RwLock::new(token)),
        }
    }

    pub async fn swap(&self, token: AccessToken) {
        *self.inner.write().await = token;
    }
}

#[async_trait]
impl CredentialSource for SwappableCredentials {
    async fn token(&self) -> Result<AccessToken, CredentialError> {
        Ok(self.inner.read().await.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_redacts_the_secret() {
        let token = AccessToken::new("super-secret").with_login("bot");
        let rendered = format!("{token:?}");
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn header_and_pass_forms() {
        let token = AccessToken::new("abc123");
        assert_eq!(token.authorization_header(), "Bearer abc123");
        assert_eq!(token.irc_pass(), "oauth:abc123");
    }

    #[tokio::test]
    async fn swappable_readers_observe_new_token() {
        let creds = SwappableCredentials::new(AccessToken::new("old"));
        assert_eq!(creds.token().await.unwrap(), AccessToken::new("old"));

        creds.swap(AccessToken::new("new").with_login("bot")).await;
        let current = creds.token().await.unwrap();
        assert_eq!(current.login(), Some("bot"));
        assert_eq!(current.authorization_header(), "Bearer new");
    }
}
