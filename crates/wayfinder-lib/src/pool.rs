//! Object reuse: a generation-checked slab for request slots and a simple
//! free-list pool for scratch memory.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Types that can be returned to a pool and handed out again.
pub trait Reset {
    /// Clear per-use state while keeping allocations.
    fn reset(&mut self);
}

/// Free list of reusable values.
#[derive(Debug)]
pub struct Pool<T> {
    free: Vec<T>,
    created: usize,
}

impl<T: Reset + Default> Default for Pool<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Reset + Default> Pool<T> {
    pub fn new() -> Self {
        Self {
            free: Vec::new(),
            created: 0,
        }
    }

    /// Take a pooled value, or create one when the pool is empty.
    pub fn acquire(&mut self) -> T {
        self.free.pop().unwrap_or_else(|| {
            self.created += 1;
            T::default()
        })
    }

    /// Reset `value` and keep it for the next [`acquire`](Self::acquire).
    pub fn release(&mut self, mut value: T) {
        value.reset();
        self.free.push(value);
    }

    /// Values currently waiting in the pool.
    pub fn available(&self) -> usize {
        self.free.len()
    }

    /// Values ever created by this pool.
    pub fn created(&self) -> usize {
        self.created
    }
}

/// Reference to a slab slot; stale once the slot is recycled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SlabHandle {
    pub index: u32,
    pub generation: u32,
}

impl fmt::Display for SlabHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.index, self.generation)
    }
}

impl SlabHandle {
    pub(crate) fn stale(self) -> Error {
        Error::StaleHandle {
            index: self.index,
            generation: self.generation,
        }
    }
}

#[derive(Debug)]
struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Vec-backed storage whose handles detect reuse of their slot.
#[derive(Debug)]
pub struct Slab<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    len: usize,
}

impl<T> Default for Slab<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Slab<T> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Slots allocated so far, live or free.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn insert(&mut self, value: T) -> SlabHandle {
        self.len += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(value);
            return SlabHandle {
                index,
                generation: slot.generation,
            };
        }

        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            value: Some(value),
        });
        SlabHandle { index, generation: 0 }
    }

    pub fn contains(&self, handle: SlabHandle) -> bool {
        self.get(handle).is_some()
    }

    pub fn get(&self, handle: SlabHandle) -> Option<&T> {
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.value.as_ref())
    }

    pub fn get_mut(&mut self, handle: SlabHandle) -> Option<&mut T> {
        self.slots
            .get_mut(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.value.as_mut())
    }

    /// Like [`get_mut`](Self::get_mut) but reports stale handles as errors.
    pub fn try_get_mut(&mut self, handle: SlabHandle) -> Result<&mut T> {
        self.get_mut(handle).ok_or_else(|| handle.stale())
    }

    /// Remove the value and invalidate every handle to this slot.
    ///
    /// Removing through a stale handle does nothing.
    pub fn remove(&mut self, handle: SlabHandle) -> Option<T> {
        let slot = self
            .slots
            .get_mut(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)?;
        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);
        self.len -= 1;
        Some(value)
    }
}
