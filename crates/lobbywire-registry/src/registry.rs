//! The registry itself: a slot vector with a free list.
//!
//! Each slot remembers a generation. Freeing a slot bumps it, so any
//! handle issued for the previous occupant stops matching. Indices are
//! recycled (most recently freed first); generations are what keep a
//! recycled index from being mistaken for the old entry.
//!
//! # Concurrency note
//!
//! `HandleRegistry` is a plain single-owner structure. Whoever shares it
//! across threads wraps it in a lock at a higher level.

use crate::{HandlerHandle, RegistryError};

#[derive(Debug)]
struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Owns values of type `T`, each named by a [`HandlerHandle`].
#[derive(Debug)]
pub struct HandleRegistry<T> {
    slots: Vec<Slot<T>>,
    /// Indices of empty slots, reused last-in first-out.
    free: Vec<u32>,
    len: usize,
}

impl<T> Default for HandleRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> HandleRegistry<T> {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            len: 0,
        }
    }

    /// Stores `value` and returns its handle.
    ///
    /// # Errors
    /// [`RegistryError::Exhausted`] once `u32::MAX` slots are occupied.
    pub fn insert(&mut self, value: T) -> Result<HandlerHandle, RegistryError> {
        let handle = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.value = Some(value);
                HandlerHandle::new(index, slot.generation)
            }
            None => {
                let index =
                    u32::try_from(self.slots.len()).map_err(|_| RegistryError::Exhausted)?;
                self.slots.push(Slot {
                    generation: 1,
                    value: Some(value),
                });
                HandlerHandle::new(index, 1)
            }
        };
        self.len += 1;
        tracing::trace!(%handle, "slot allocated");
        Ok(handle)
    }

    /// Checks `handle` against its slot and returns the slot index.
    fn locate(&self, handle: HandlerHandle) -> Result<usize, RegistryError> {
        let index = handle.index() as usize;
        let slot = self
            .slots
            .get(index)
            .ok_or(RegistryError::NotFound(handle))?;
        if slot.generation != handle.generation() || slot.value.is_none() {
            return Err(RegistryError::StaleHandle(handle));
        }
        Ok(index)
    }

    /// Borrows the value behind `handle`.
    pub fn get(&self, handle: HandlerHandle) -> Result<&T, RegistryError> {
        let index = self.locate(handle)?;
        self.slots[index]
            .value
            .as_ref()
            .ok_or(RegistryError::StaleHandle(handle))
    }

    /// Mutably borrows the value behind `handle`.
    pub fn get_mut(&mut self, handle: HandlerHandle) -> Result<&mut T, RegistryError> {
        let index = self.locate(handle)?;
        self.slots[index]
            .value
            .as_mut()
            .ok_or(RegistryError::StaleHandle(handle))
    }

    /// `true` if `handle` names a live entry.
    pub fn contains(&self, handle: HandlerHandle) -> bool {
        self.locate(handle).is_ok()
    }

    /// Takes the value out and frees its slot. The handle, and every copy
    /// of it, is stale from here on.
    pub fn remove(&mut self, handle: HandlerHandle) -> Result<T, RegistryError> {
        let index = self.locate(handle)?;
        let slot = &mut self.slots[index];
        let value = slot
            .value
            .take()
            .ok_or(RegistryError::StaleHandle(handle))?;
        // Generation 0 is reserved for "never issued", so wrap to 1.
        slot.generation = slot.generation.checked_add(1).unwrap_or(1);
        self.free.push(handle.index());
        self.len -= 1;
        tracing::trace!(%handle, "slot freed");
        Ok(value)
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Live entries in index order.
    pub fn iter(&self) -> impl Iterator<Item = (HandlerHandle, &T)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.value
                .as_ref()
                .map(|value| (HandlerHandle::new(index as u32, slot.generation), value))
        })
    }

    /// Removes every live entry, invalidating all outstanding handles.
    pub fn drain(&mut self) -> Vec<(HandlerHandle, T)> {
        let live: Vec<HandlerHandle> = self.iter().map(|(handle, _)| handle).collect();
        live.into_iter()
            .filter_map(|handle| self.remove(handle).ok().map(|value| (handle, value)))
            .collect()
    }
}

// =========================================================================
// Tests
// =========================================================================
