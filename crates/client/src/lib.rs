//! Client facade over the castbridge integration modules.
//!
//! Each module (modern REST, legacy REST, chat, push-notification topics,
//! query-language API) is constructed only when its enable flag is set;
//! accessors report a typed absence instead of handing out a null. The
//! facade owns the shared infrastructure — credential source, background
//! scheduler, and the event bus — and hands each module the slice it needs.

mod config;
mod error;
mod scheduler;

use std::sync::Arc;

use cb_bus::EventBus;
use cb_chat::ChatClient;
use cb_core::{
    CredentialSource, ModuleError, ModuleKind, RestClient, RestConfig, TcpTransport,
};
use cb_graphql::GraphQlClient;
use cb_helix::HelixClient;
use cb_kraken::KrakenClient;
use cb_pubsub::PubSubClient;
use tracing::{info, warn};

pub use cb_telemetry::install as install_telemetry;
pub use config::ClientConfig;
pub use error::ClientError;
pub use scheduler::Scheduler;

pub struct Client {
    bus: EventBus,
    credentials: Arc<dyn CredentialSource>,
    scheduler: Scheduler,
    helix: Option<Arc<HelixClient>>,
    kraken: Option<Arc<KrakenClient>>,
    chat: Option<Arc<ChatClient>>,
    pubsub: Option<Arc<PubSubClient>>,
    graphql: Option<Arc<GraphQlClient>>,
}

impl Client {
    pub fn build(
        config: ClientConfig,
        credentials: Arc<dyn CredentialSource>,
    ) -> Result<Self, ClientError> {
        Self::build_with_bus(config, credentials, EventBus::new())
    }

    /// Assembles the enabled modules around an externally owned event bus,
    /// so other parts of an application can share subscriptions.
    pub fn build_with_bus(
        config: ClientConfig,
        credentials: Arc<dyn CredentialSource>,
        bus: EventBus,
    ) -> Result<Self, ClientError> {
        config.validate()?;

        let rest_config = |base_url: &str| {
            let mut rest = RestConfig::new(base_url, &config.client_id);
            rest.timeout = config.timeout;
            rest.retries = config.retries;
            if let Some(user_agent) = &config.user_agent {
                rest.user_agent = user_agent.clone();
            }
            rest
        };

        let helix = if config.enable_helix {
            let rest = RestClient::new(rest_config(&config.helix_base_url), Arc::clone(&credentials))?;
            Some(Arc::new(HelixClient::new(rest)))
        } else {
            None
        };
        let kraken = if config.enable_kraken {
            let rest =
                RestClient::new(rest_config(&config.kraken_base_url), Arc::clone(&credentials))?;
            Some(Arc::new(KrakenClient::new(rest)))
        } else {
            None
        };
        let pubsub = if config.enable_pubsub {
            let rest =
                RestClient::new(rest_config(&config.pubsub_base_url), Arc::clone(&credentials))?;
            Some(Arc::new(PubSubClient::new(rest)))
        } else {
            None
        };
        let graphql = if config.enable_graphql {
            let rest =
                RestClient::new(rest_config(&config.graphql_base_url), Arc::clone(&credentials))?;
            Some(Arc::new(GraphQlClient::new(rest)))
        } else {
            None
        };
        let chat = if config.enable_chat {
            let chat_config = config
                .chat
                .clone()
                .ok_or_else(|| ClientError::InvalidConfig("enable_chat requires a chat config".into()))?;
            Some(Arc::new(ChatClient::new(
                chat_config,
                Arc::new(TcpTransport),
                Arc::clone(&credentials),
                bus.clone(),
            )?))
        } else {
            None
        };

        let scheduler = Scheduler::new();
        let helper_credentials = Arc::clone(&credentials);
        scheduler.schedule_repeating("credential-helper", config.helper_interval, move || {
            let credentials = Arc::clone(&helper_credentials);
            async move {
                if let Err(err) = credentials.token().await {
                    warn!(error = %err, "credential check failed");
                }
            }
        });

        let client = Self {
            bus,
            credentials,
            scheduler,
            helix,
            kraken,
            chat,
            pubsub,
            graphql,
        };
        info!(modules = ?client.enabled_modules(), "client assembled");
        Ok(client)
    }

    pub fn helix(&self) -> Result<&HelixClient, ModuleError> {
        self.helix
            .as_deref()
            .ok_or(ModuleError::Disabled(ModuleKind::Helix))
    }

    pub fn kraken(&self) -> Result<&KrakenClient, ModuleError> {
        self.kraken
            .as_deref()
            .ok_or(ModuleError::Disabled(ModuleKind::Kraken))
    }

    pub fn chat(&self) -> Result<&ChatClient, ModuleError> {
        self.chat
            .as_deref()
            .ok_or(ModuleError::Disabled(ModuleKind::Chat))
    }

    pub fn pubsub(&self) -> Result<&PubSubClient, ModuleError> {
        self.pubsub
            .as_deref()
            .ok_or(ModuleError::Disabled(ModuleKind::PubSub))
    }

    pub fn graphql(&self) -> Result<&GraphQlClient, ModuleError> {
        self.graphql
            .as_deref()
            .ok_or(ModuleError::Disabled(ModuleKind::GraphQl))
    }

    /// Module kinds that are active on this client instance.
    pub fn enabled_modules(&self) -> Vec<ModuleKind> {
        let mut kinds = Vec::new();
        if self.helix.is_some() {
            kinds.push(ModuleKind::Helix);
        }
        if self.kraken.is_some() {
            kinds.push(ModuleKind::Kraken);
        }
        if self.chat.is_some() {
            kinds.push(ModuleKind::Chat);
        }
        if self.pubsub.is_some() {
            kinds.push(ModuleKind::PubSub);
        }
        if self.graphql.is_some() {
            kinds.push(ModuleKind::GraphQl);
        }
        kinds
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn credentials(&self) -> Arc<dyn CredentialSource> {
        Arc::clone(&self.credentials)
    }

    /// Disconnects the chat session (if any) and stops background tasks.
    pub fn shutdown(&self) {
        if let Some(chat) = &self.chat {
            let _ = chat.disconnect();
        }
        self.scheduler.shutdown();
    }
}
