use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Integration modules the client facade can activate (kept small and stable).
///
/// ```
/// use cb_core::ModuleKind;
///
/// assert_eq!(ModuleKind::Helix.as_str(), "helix");
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ModuleKind {
    Helix,
    Kraken,
    Chat,
    PubSub,
    GraphQl,
}

impl ModuleKind {
    /// Returns the lowercase string identifier used in logs and metric labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            ModuleKind::Helix => "helix",
            ModuleKind::Kraken => "kraken",
            ModuleKind::Chat => "chat",
            ModuleKind::PubSub => "pubsub",
            ModuleKind::GraphQl => "graphql",
        }
    }
}

impl std::fmt::Display for ModuleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed absence result for facade accessors. A module that was not enabled
/// at construction is reported, never represented as a null value.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModuleError {
    #[error("module {0} was not enabled on this client")]
    Disabled(ModuleKind),
}
