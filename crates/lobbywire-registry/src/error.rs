//! Error types for the registry layer.

use crate::HandlerHandle;

/// Errors returned when a handle does not name a live entry.
///
/// The three cases are kept apart so callers can tell a caller bug
/// (a zero or never-issued handle) from a use-after-destroy.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// The raw value can never have been issued: zero, or generation 0.
    #[error("invalid handle {0:#x}")]
    InvalidHandle(u64),

    /// The handle's slot was freed (and possibly reused) since it was issued.
    #[error("stale handle {0}")]
    StaleHandle(HandlerHandle),

    /// The handle's index was never allocated by this registry.
    #[error("no entry for handle {0}")]
    NotFound(HandlerHandle),

    /// Every index that fits in a handle is in use.
    #[error("registry is full")]
    Exhausted,
}
