use std::collections::HashSet;
use std::time::Duration;

use cb_backpressure::RateLimitPolicy;

use crate::error::ChatError;

pub const DEFAULT_ENDPOINT: &str = "irc.chat.twitch.tv:6667";

/// Reconnection behavior: exponentially growing, capped backoff with a
/// finite retry budget. Values are configuration, not constants, so
/// deployments can tune them per environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_retries: u32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
        }
    }
}

/// Options for one chat session. All optional knobs carry defaults; the
/// trigger set is fixed at construction and read-only during routing.
#[derive(Debug, Clone)]
pub struct ChatConfig {
    pub endpoint: String,
    pub login: String,
    pub queue_capacity: usize,
    pub rate_limit: RateLimitPolicy,
    pub dequeue_timeout: Duration,
    pub command_triggers: Vec<String>,
    pub reconnect: ReconnectPolicy,
    /// Maximum age an outbound action may reach before it is discarded
    /// rather than delivered late.
    pub staleness_budget: Duration,
}

impl ChatConfig {
    pub fn new(login: impl Into<String>) -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            login: login.into(),
            queue_capacity: 200,
            rate_limit: RateLimitPolicy::default(),
            dequeue_timeout: Duration::from_secs(1),
            command_triggers: Vec::new(),
            reconnect: ReconnectPolicy::default(),
            staleness_budget: Duration::from_secs(10),
        }
    }

    pub fn with_trigger(mut self, trigger: impl Into<String>) -> Self {
        self.command_triggers.push(trigger.into());
        self
    }

    pub fn validate(&self) -> Result<(), ChatError> {
        if self.login.trim().is_empty() {
            return Err(ChatError::InvalidConfig("login must not be empty".into()));
        }
        if self.endpoint.trim().is_empty() {
            return Err(ChatError::InvalidConfig("endpoint must not be empty".into()));
        }
        if self.queue_capacity == 0 {
            return Err(ChatError::InvalidConfig(
                "queue_capacity must be positive".into(),
            ));
        }
        if self.staleness_budget.is_zero() {
            return Err(ChatError::InvalidConfig(
                "staleness_budget must be non-zero".into(),
            ));
        }
        self.rate_limit
            .validate()
            .map_err(|err| ChatError::InvalidConfig(err.to_string()))?;
        if self.reconnect.base_backoff.is_zero() {
            return Err(ChatError::InvalidConfig(
                "reconnect.base_backoff must be non-zero".into(),
            ));
        }
        if self.reconnect.max_backoff < self.reconnect.base_backoff {
            return Err(ChatError::InvalidConfig(
                "reconnect.max_backoff must not be below base_backoff".into(),
            ));
        }
        let mut seen = HashSet::new();
        for trigger in &self.command_triggers {
            if trigger.is_empty() {
                return Err(ChatError::InvalidConfig(
                    "command triggers must not be empty".into(),
                ));
            }
            if !seen.insert(trigger.as_str()) {
                return Err(ChatError::InvalidConfig(format!(
                    "duplicate command trigger {trigger:?}"
                )));
            }
        }
        Ok(())
    }
}
