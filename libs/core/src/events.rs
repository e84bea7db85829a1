use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// Connection lifecycle of the chat session. Transitions are owned by the
/// connection manager; other tasks observe them through
/// [`ConnectionStateEvent`]s, never by reading manager internals.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Authenticating,
    Ready,
    Reconnecting,
    Closed,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Authenticating => "authenticating",
            ConnectionState::Ready => "ready",
            ConnectionState::Reconnecting => "reconnecting",
            ConnectionState::Closed => "closed",
        }
    }
}

/// Per-channel protocol state pushed by the chat server, collapsed into one
/// tagged variant with a numeric payload instead of one event type per state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RoomStateKind {
    FollowersOnly,
    SlowMode,
    SubscribersOnly,
    EmoteOnly,
    UniqueChat,
}

impl RoomStateKind {
    /// Maps a protocol key to a state kind. Unknown keys are not an error;
    /// the router reports them as raw-line diagnostics.
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "followers-only" => Some(RoomStateKind::FollowersOnly),
            "slow" => Some(RoomStateKind::SlowMode),
            "subs-only" => Some(RoomStateKind::SubscribersOnly),
            "emote-only" => Some(RoomStateKind::EmoteOnly),
            "r9k" => Some(RoomStateKind::UniqueChat),
            _ => None,
        }
    }
}

/// Plain chat message routed from the wire.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessageEvent {
    pub channel: String,
    pub sender: String,
    pub text: String,
}

/// Chat message that matched a registered command trigger.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommandEvent {
    pub channel: String,
    pub sender: String,
    pub trigger: String,
    pub args: String,
}

/// Room-state change for a channel, e.g. followers-only mode set to 10
/// minutes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoomStateEvent {
    pub channel: String,
    pub kind: RoomStateKind,
    pub value: i64,
}

/// User-specific per-channel state pushed by the server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserStateEvent {
    pub channel: String,
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MembershipAction {
    Joined,
    Parted,
}

/// A user (possibly our own login) joined or left a channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MembershipEvent {
    pub channel: String,
    pub user: String,
    pub action: MembershipAction,
}

/// Connection state transition, published on every edge of the lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConnectionStateEvent {
    pub old: ConnectionState,
    pub new: ConnectionState,
}

/// Diagnostic for inbound lines the router could not classify. Routing
/// continues; nothing is silently swallowed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawLineEvent {
    pub line: String,
    pub reason: String,
}

/// Why an outbound action was discarded instead of delivered.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// Older than the configured staleness budget.
    Stale,
    /// The rate limiter could not grant a token within the staleness budget.
    RateLimited,
    /// The connection closed for good while the action was in flight.
    Disconnected,
}

impl DropReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DropReason::Stale => "stale",
            DropReason::RateLimited => "rate_limited",
            DropReason::Disconnected => "disconnected",
        }
    }
}

/// Diagnostic for outbound actions dropped by the send loop. Carries a
/// wall-clock stamp so operators can correlate drops with upstream incidents.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SendDroppedEvent {
    pub channel: String,
    pub reason: DropReason,
    pub ts: String,
}

impl SendDroppedEvent {
    pub fn now(channel: impl Into<String>, reason: DropReason) -> Self {
        let ts = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_else(|_| OffsetDateTime::now_utc().unix_timestamp().to_string());
        Self {
            channel: channel.into(),
            reason,
            ts,
        }
    }
}
