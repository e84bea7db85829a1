//! Chat dispatch engine for the castbridge client.
//!
//! Owns the persistent session to the chat server: outbound messages are
//! serialized through a bounded queue and a token-bucket rate limit by a
//! single send loop, inbound lines are routed into typed events (including
//! command invocations matched against configured trigger prefixes), and the
//! connection lifecycle runs as a state machine with capped, budgeted
//! reconnects. Everything observable crosses the event bus; nothing leaks
//! across the facade as a panic or an exception-like failure.

mod client;
mod config;
mod connection;
mod error;
mod proto;
mod publisher;
mod queue;
mod router;

pub use client::ChatClient;
pub use config::{ChatConfig, DEFAULT_ENDPOINT, ReconnectPolicy};
pub use error::ChatError;
pub use publisher::EventPublisher;
pub use queue::{ActionKind, OutboundAction, OutboundQueue, QueueReceiver, bounded};
pub use router::{CommandRouter, Routed};
