use std::time::Duration;

use cb_chat::ChatConfig;

use crate::error::ClientError;

/// Construction-time options for the whole client. Every module is off by
/// default and activated explicitly; there is no ambient global state, so
/// everything a module needs arrives through this struct.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub client_id: String,
    /// Overrides the default `castbridge/<version>` user agent when set.
    pub user_agent: Option<String>,
    pub timeout: Duration,
    pub retries: u8,

    pub enable_helix: bool,
    pub enable_kraken: bool,
    pub enable_chat: bool,
    pub enable_pubsub: bool,
    pub enable_graphql: bool,

    /// Required when `enable_chat` is set.
    pub chat: Option<ChatConfig>,

    pub helix_base_url: String,
    pub kraken_base_url: String,
    pub pubsub_base_url: String,
    pub graphql_base_url: String,

    /// Cadence of the background credential check.
    pub helper_interval: Duration,
}

impl ClientConfig {
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            user_agent: None,
            timeout: Duration::from_secs(5),
            retries: 2,
            enable_helix: false,
            enable_kraken: false,
            enable_chat: false,
            enable_pubsub: false,
            enable_graphql: false,
            chat: None,
            helix_base_url: cb_helix::DEFAULT_BASE_URL.to_string(),
            kraken_base_url: cb_kraken::DEFAULT_BASE_URL.to_string(),
            pubsub_base_url: cb_pubsub::DEFAULT_BASE_URL.to_string(),
            graphql_base_url: cb_graphql::DEFAULT_BASE_URL.to_string(),
            helper_interval: Duration::from_secs(10),
        }
    }

    pub fn validate(&self) -> Result<(), ClientError> {
        if self.client_id.trim().is_empty() {
            return Err(ClientError::InvalidConfig(
                "client_id must not be empty".into(),
            ));
        }
        if self.timeout.is_zero() {
            return Err(ClientError::InvalidConfig("timeout must be non-zero".into()));
        }
        if self.helper_interval.is_zero() {
            return Err(ClientError::InvalidConfig(
                "helper_interval must be non-zero".into(),
            ));
        }
        match (&self.chat, self.enable_chat) {
            (None, true) => Err(ClientError::InvalidConfig(
                "enable_chat requires a chat config".into(),
            )),
            (Some(chat), true) => {
                chat.validate()?;
                Ok(())
            }
            _ => Ok(()),
        }
    }
}
