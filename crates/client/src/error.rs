use cb_chat::ChatError;
use cb_core::{ModuleError, RestError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid client config: {0}")]
    InvalidConfig(String),
    #[error(transparent)]
    Module(#[from] ModuleError),
    #[error(transparent)]
    Rest(#[from] RestError),
    #[error(transparent)]
    Chat(#[from] ChatError),
}
