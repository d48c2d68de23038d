//! Generation-checked handle registry for lobbywire.
//!
//! The scripting side holds on to handlers by an opaque integer. Handing
//! out raw pointers would make a double destroy or a destroy after
//! shutdown undefined behaviour; this crate hands out a
//! [`HandlerHandle`] instead, an `(index, generation)` pair that the
//! [`HandleRegistry`] validates on every lookup.
//!
//! ```text
//! insert(h) ──→ slot 3, gen 1 ──→ handle 0x0000_0001_0000_0003
//! remove    ──→ slot 3 freed, gen 2
//! get(0x0000_0001_0000_0003) ──→ Err(StaleHandle)
//! ```

mod error;
mod handle;
mod registry;

pub use error::RegistryError;
pub use handle::HandlerHandle;
pub use registry::HandleRegistry;
