//! Unified error type for lobbywire.

use lobbywire_adapter::AdapterError;
use lobbywire_dispatch::DispatchError;
use lobbywire_events::EventError;
use lobbywire_registry::RegistryError;

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `lobbywire` crate you deal with this single error type
/// instead of importing errors from each sub-crate. The `#[from]`
/// attributes let `?` convert sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum LobbywireError {
    /// An unknown event kind or callback id.
    #[error(transparent)]
    Event(#[from] EventError),

    /// The SDK library could not be loaded or initialised.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// A handle that does not name a live handler.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Handler creation or destruction was refused.
    #[error(transparent)]
    Adapter(#[from] AdapterError),

    /// No bridge is installed, or it was shut down.
    #[error("lobbywire is not initialised")]
    NotInitialized,

    /// A bridge is already installed.
    #[error("lobbywire is already initialised")]
    AlreadyInitialized,

    /// The configuration JSON could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
}

impl LobbywireError {
    /// Folds nested registry errors into [`LobbywireError::Registry`] so
    /// callers only have to match one place for handle problems.
    pub fn registry_error(&self) -> Option<&RegistryError> {
        match self {
            Self::Registry(e) | Self::Adapter(AdapterError::Registry(e)) => Some(e),
            _ => None,
        }
    }
}
