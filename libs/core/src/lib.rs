//! Castbridge core contracts and value types.
//!
//! This crate exposes the shared abstractions the integration modules are
//! built on: module identifiers, the credential source used for bearer-token
//! auth, the REST calling convention the request/response modules delegate
//! to, the line-oriented chat transport, and the typed events published on
//! the client's event bus.

pub mod credentials;
pub mod events;
pub mod http;
pub mod module;
pub mod transport;

pub use credentials::*;
pub use events::*;
pub use http::*;
pub use module::*;
pub use transport::*;
