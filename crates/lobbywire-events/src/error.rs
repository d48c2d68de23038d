//! Error types for the event layer.
//!
//! Each crate in lobbywire defines its own error enum. An `EventError`
//! means a value coming from the SDK side did not name one of the event
//! kinds this layer knows how to relay.

/// Errors that can occur while interpreting SDK event identifiers.
#[derive(Debug, thiserror::Error)]
pub enum EventError {
    /// The SDK callback id does not belong to any supported event kind.
    #[error("unknown callback id {0}")]
    UnknownCallbackId(i32),
}
