//! Callback adapter for lobbywire.
//!
//! Turns SDK callback deliveries into calls on the extension module's
//! trampolines. One generic [`CallbackHandler<P>`] covers all eight event
//! kinds: the payload type `P` fixes the kind and callback id, and the
//! [`Forwarder<P>`] is the trampoline it relays to.
//!
//! # Key types
//!
//! - [`CallbackHandler`]: one live subscription for one context
//! - [`HandlerManager`]: owns handlers of every kind behind generation-checked handles
//! - [`TrampolineTable`]: the eight forwarders, as the extension module installs them
//!
//! # How it fits in the stack
//!
//! ```text
//! Bridge / C ABI (above)  ← create / destroy by kind and handle
//!     ↕
//! Adapter (this crate)    ← native callback objects, forwarding
//!     ↕
//! Dispatch (below)        ← register by callback id, run_callbacks
//! ```

mod error;
mod handler;
mod manager;
mod trampolines;

pub use error::AdapterError;
pub use handler::{AnyHandler, CallbackHandler, Forwarder};
pub use manager::{HandlerInfo, HandlerManager};
pub use trampolines::TrampolineTable;

pub use lobbywire_registry::HandlerHandle;
