//! Error types for the adapter layer.

use lobbywire_events::EventKind;
use lobbywire_registry::{HandlerHandle, RegistryError};

/// Errors that can occur while creating or destroying handlers.
///
/// Every variant is a caller mistake that would otherwise be undefined
/// behaviour at the native boundary. None of them touch live handlers.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    /// `create` was given a null context pointer.
    #[error("context pointer is null")]
    NullContext,

    /// The handle is live but belongs to a different event kind, e.g. a
    /// lobby-enter handle passed to the overlay-activated destructor.
    #[error("handle {handle} is a {found} handler, not {expected}")]
    KindMismatch {
        handle: HandlerHandle,
        expected: EventKind,
        found: EventKind,
    },

    /// No trampoline is installed for this kind.
    #[error("no forwarder installed for {0}")]
    MissingForwarder(EventKind),

    /// The handle does not name a live handler.
    #[error(transparent)]
    Registry(#[from] RegistryError),
}
