//! Generational slot storage backing entity handles and projectile pools.
//!
//! Removing a value bumps its slot's generation and returns the slot to a
//! free list, so handles issued before the removal fail to resolve in O(1)
//! even after the slot is reused.

use std::marker::PhantomData;

use lane_defence_core::EntityId;

/// Handle type that can address a slot of an [`Arena`].
pub(crate) trait Handle: Copy {
    /// Builds a handle from a slot index and generation.
    fn from_parts(index: u32, generation: u32) -> Self;
    /// Slot index addressed by the handle.
    fn slot(&self) -> u32;
    /// Generation the handle was issued for.
    fn issued_generation(&self) -> u32;
}

impl Handle for EntityId {
    fn from_parts(index: u32, generation: u32) -> Self {
        EntityId::new(index, generation)
    }

    fn slot(&self) -> u32 {
        self.index()
    }

    fn issued_generation(&self) -> u32 {
        self.generation()
    }
}

#[derive(Debug)]
struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Dense generational storage with a free list of vacated slots.
#[derive(Debug)]
pub(crate) struct Arena<H, T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    len: usize,
    _handle: PhantomData<H>,
}

impl<H: Handle, T> Arena<H, T> {
    pub(crate) fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            len: 0,
            _handle: PhantomData,
        }
    }

    /// Stores the value produced by `build`, reusing a vacated slot when one exists.
    ///
    /// `build` receives the handle the value will be stored under.
    pub(crate) fn insert_with(&mut self, build: impl FnOnce(H) -> T) -> H {
        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                let index = u32::try_from(self.slots.len()).unwrap_or(u32::MAX);
                self.slots.push(Slot {
                    generation: 0,
                    value: None,
                });
                index
            }
        };

        let slot = &mut self.slots[index as usize];
        let handle = H::from_parts(index, slot.generation);
        slot.value = Some(build(handle));
        self.len += 1;
        handle
    }

    pub(crate) fn get(&self, handle: H) -> Option<&T> {
        self.slots
            .get(handle.slot() as usize)
            .filter(|slot| slot.generation == handle.issued_generation())
            .and_then(|slot| slot.value.as_ref())
    }

    pub(crate) fn get_mut(&mut self, handle: H) -> Option<&mut T> {
        self.slots
            .get_mut(handle.slot() as usize)
            .filter(|slot| slot.generation == handle.issued_generation())
            .and_then(|slot| slot.value.as_mut())
    }

    /// Removes the value addressed by the handle and invalidates the handle.
    pub(crate) fn remove(&mut self, handle: H) -> Option<T> {
        let slot = self.slots.get_mut(handle.slot() as usize)?;
        if slot.generation != handle.issued_generation() {
            return None;
        }

        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.slot());
        self.len -= 1;
        Some(value)
    }

    /// Handles of every occupied slot in ascending slot order.
    pub(crate) fn handles(&self) -> Vec<H> {
        self.iter().map(|(handle, _)| handle).collect()
    }

    /// Iterates occupied slots in ascending slot order.
    pub(crate) fn iter(&self) -> impl Iterator<Item = (H, &T)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.value
                .as_ref()
                .map(|value| (H::from_parts(index as u32, slot.generation), value))
        })
    }

    /// Number of occupied slots.
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    /// Number of slots ever allocated, occupied or not.
    pub(crate) fn capacity(&self) -> usize {
        self.slots.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removal_invalidates_stale_handles() {
        let mut arena: Arena<EntityId, &str> = Arena::new();
        let first = arena.insert_with(|_| "first");
        assert_eq!(arena.remove(first), Some("first"));

        let second = arena.insert_with(|_| "second");
        assert_eq!(second.index(), first.index(), "slot should be reused");
        assert_ne!(second, first);
        assert!(arena.get(first).is_none());
        assert_eq!(arena.get(second), Some(&"second"));
        assert!(arena.remove(first).is_none());
    }

    #[test]
    fn builder_receives_the_issued_handle() {
        let mut arena: Arena<EntityId, EntityId> = Arena::new();
        let handle = arena.insert_with(|issued| issued);
        assert_eq!(arena.get(handle), Some(&handle));
    }

    #[test]
    fn capacity_only_grows_when_no_slot_is_free() {
        let mut arena: Arena<EntityId, u8> = Arena::new();
        let a = arena.insert_with(|_| 1);
        let _b = arena.insert_with(|_| 2);
        let _ = arena.remove(a);
        let _c = arena.insert_with(|_| 3);

        assert_eq!(arena.len(), 2);
        assert_eq!(arena.capacity(), 2);
        assert_eq!(arena.handles().len(), 2);
    }
}
