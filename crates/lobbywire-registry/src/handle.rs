//! The opaque handle exchanged with the scripting side.

use std::fmt;

use crate::RegistryError;

/// Names one entry of a [`HandleRegistry`](crate::HandleRegistry).
///
/// Across the C ABI a handle travels as a `u64`: generation in the high
/// half, index in the low half. Generations start at 1, so a valid handle
/// is never `0` and callers can use `0` as "no handle".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerHandle {
    index: u32,
    generation: u32,
}

impl HandlerHandle {
    pub(crate) fn new(index: u32, generation: u32) -> Self {
        debug_assert!(generation != 0, "generation 0 is reserved");
        Self { index, generation }
    }

    /// Slot index inside the registry.
    pub fn index(self) -> u32 {
        self.index
    }

    /// Generation of the slot when this handle was issued.
    pub fn generation(self) -> u32 {
        self.generation
    }

    /// Packs the handle into its non-zero wire form.
    pub fn to_raw(self) -> u64 {
        (u64::from(self.generation) << 32) | u64::from(self.index)
    }

    /// Unpacks a wire value.
    ///
    /// # Errors
    /// [`RegistryError::InvalidHandle`] for `0` or any value whose
    /// generation half is zero.
    pub fn from_raw(raw: u64) -> Result<Self, RegistryError> {
        let generation = (raw >> 32) as u32;
        let index = raw as u32;
        if generation == 0 {
            return Err(RegistryError::InvalidHandle(raw));
        }
        Ok(Self { index, generation })
    }
}

impl fmt::Display for HandlerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

impl From<HandlerHandle> for u64 {
    fn from(handle: HandlerHandle) -> Self {
        handle.to_raw()
    }
}

impl TryFrom<u64> for HandlerHandle {
    type Error = RegistryError;

    fn try_from(raw: u64) -> Result<Self, Self::Error> {
        Self::from_raw(raw)
    }
}
