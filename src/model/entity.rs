//! Generational entity handles and the sparse component storage keyed by them.
//!
//! Every trackable thing (window, fork) is an [`Entity`]. Handles carry the
//! generation of the slot they were issued from, so a handle kept across a
//! deletion stops resolving instead of aliasing whatever reuses the slot.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Entity {
    index: u32,
    generation: u32,
}

static_assertions::assert_eq_size!(Entity, u64);

impl Entity {
    pub const fn new(index: u32, generation: u32) -> Self { Entity { index, generation } }

    pub fn index(self) -> u32 { self.index }

    pub fn generation(self) -> u32 { self.generation }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { fmt::Debug::fmt(self, f) }
}

/// Anything that keeps per-entity state and must forget an entity when it is
/// deleted from the [`World`].
pub trait Tracked {
    fn untrack(&mut self, entity: Entity);
}

#[derive(Debug, Default, Clone)]
struct Slot {
    generation: u32,
    alive: bool,
}

/// Registry issuing entity handles.
#[derive(Debug, Default, Clone)]
pub struct World {
    slots: Vec<Slot>,
    free: Vec<u32>,
}

impl World {
    pub fn new() -> Self { Self::default() }

    /// Returns a fresh handle, or a recycled index with its generation bumped.
    pub fn create_entity(&mut self) -> Entity {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.generation = slot.generation.wrapping_add(1);
            slot.alive = true;
            return Entity::new(index, slot.generation);
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot { generation: 0, alive: true });
        Entity::new(index, 0)
    }

    /// Invalidates `entity` and removes it from every storage passed in.
    ///
    /// Deleting a stale or already deleted handle is a no-op and returns false.
    pub fn delete_entity(&mut self, entity: Entity, storages: &mut [&mut dyn Tracked]) -> bool {
        if !self.is_alive(entity) {
            return false;
        }
        self.slots[entity.index as usize].alive = false;
        self.free.push(entity.index);
        for storage in storages.iter_mut() {
            storage.untrack(entity);
        }
        true
    }

    pub fn is_alive(&self, entity: Entity) -> bool {
        self.slots
            .get(entity.index as usize)
            .is_some_and(|slot| slot.alive && slot.generation == entity.generation)
    }

    pub fn len(&self) -> usize { self.slots.len() - self.free.len() }

    pub fn is_empty(&self) -> bool { self.len() == 0 }
}

/// Sparse map from entity to component, validated by generation.
#[derive(Debug, Clone)]
pub struct Storage<T> {
    slots: Vec<Option<(u32, T)>>,
    len: usize,
}

impl<T> Default for Storage<T> {
    fn default() -> Self { Storage { slots: Vec::new(), len: 0 } }
}

impl<T> Storage<T> {
    pub fn new() -> Self { Self::default() }

    /// Stores `value` under the entity's index, replacing whatever occupied the
    /// index before (including a component of an older generation).
    pub fn insert(&mut self, entity: Entity, value: T) -> Option<T> {
        let index = entity.index as usize;
        if index >= self.slots.len() {
            self.slots.resize_with(index + 1, || None);
        }
        let previous = self.slots[index].replace((entity.generation, value));
        match previous {
            Some((generation, old)) if generation == entity.generation => Some(old),
            Some(_) => None,
            None => {
                self.len += 1;
                None
            }
        }
    }

    pub fn get(&self, entity: Entity) -> Option<&T> {
        match self.slots.get(entity.index as usize) {
            Some(Some((generation, value))) if *generation == entity.generation => Some(value),
            _ => None,
        }
    }

    pub fn get_mut(&mut self, entity: Entity) -> Option<&mut T> {
        match self.slots.get_mut(entity.index as usize) {
            Some(Some((generation, value))) if *generation == entity.generation => Some(value),
            _ => None,
        }
    }

    pub fn remove(&mut self, entity: Entity) -> Option<T> {
        let slot = self.slots.get_mut(entity.index as usize)?;
        match slot {
            Some((generation, _)) if *generation == entity.generation => {
                self.len -= 1;
                slot.take().map(|(_, value)| value)
            }
            _ => None,
        }
    }

    /// Returns the entity's component, storing `init()` first when the slot is
    /// empty or still holds a component of an older generation. A live value is
    /// never recomputed.
    pub fn get_or(&mut self, entity: Entity, init: impl FnOnce() -> T) -> &mut T {
        let index = entity.index as usize;
        if index >= self.slots.len() {
            self.slots.resize_with(index + 1, || None);
        }
        let slot = &mut self.slots[index];
        if slot.as_ref().is_some_and(|(generation, _)| *generation != entity.generation) {
            *slot = None;
            self.len -= 1;
        }
        if slot.is_none() {
            self.len += 1;
        }
        &mut slot.get_or_insert_with(|| (entity.generation, init())).1
    }

    pub fn contains(&self, entity: Entity) -> bool { self.get(entity).is_some() }

    pub fn len(&self) -> usize { self.len }

    pub fn is_empty(&self) -> bool { self.len == 0 }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.len = 0;
    }

    pub fn iter(&self) -> impl Iterator<Item = (Entity, &T)> + '_ {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.as_ref()
                .map(|(generation, value)| (Entity::new(index as u32, *generation), value))
        })
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Entity, &mut T)> + '_ {
        self.slots.iter_mut().enumerate().filter_map(|(index, slot)| {
            slot.as_mut()
                .map(|(generation, value)| (Entity::new(index as u32, *generation), value))
        })
    }
}

impl<T> Tracked for Storage<T> {
    fn untrack(&mut self, entity: Entity) { self.remove(entity); }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recycled_index_bumps_generation() {
        let mut world = World::new();
        let a = world.create_entity();
        let b = world.create_entity();
        assert_eq!((a.index(), a.generation()), (0, 0));
        assert_eq!((b.index(), b.generation()), (1, 0));

        assert!(world.delete_entity(a, &mut []));
        let c = world.create_entity();
        assert_eq!(c.index(), 0);
        assert_eq!(c.generation(), 1);
        assert_ne!(a, c);
        assert!(!world.is_alive(a));
        assert!(world.is_alive(c));
        assert_eq!(world.len(), 2);
    }

    #[test]
    fn deleting_twice_is_a_noop() {
        let mut world = World::new();
        let a = world.create_entity();
        assert!(world.delete_entity(a, &mut []));
        assert!(!world.delete_entity(a, &mut []));
        assert!(world.is_empty());
        // The index must only be on the free list once.
        let b = world.create_entity();
        let c = world.create_entity();
        assert_ne!(b.index(), c.index());
    }

    #[test]
    fn get_or_initializes_once() {
        let mut world = World::new();
        let mut cache: Storage<Vec<u32>> = Storage::new();
        let a = world.create_entity();

        let mut calls = 0;
        cache.get_or(a, || {
            calls += 1;
            vec![1]
        })
        .push(2);
        let value = cache.get_or(a, || {
            calls += 1;
            Vec::new()
        });
        assert_eq!(value, &vec![1, 2]);
        assert_eq!(calls, 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn get_or_replaces_stale_component() {
        let mut world = World::new();
        let mut cache: Storage<&str> = Storage::new();
        let a = world.create_entity();
        cache.insert(a, "old");

        // Deleted without telling the storage, so the slot is stale.
        world.delete_entity(a, &mut []);
        let b = world.create_entity();
        assert_eq!(b.index(), a.index());

        assert_eq!(*cache.get_or(b, || "new"), "new");
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(a), None);
        assert_eq!(cache.get(b), Some(&"new"));
    }

    #[test]
    fn stale_handles_are_absent() {
        let mut world = World::new();
        let mut names: Storage<&str> = Storage::new();
        let a = world.create_entity();
        names.insert(a, "term");

        world.delete_entity(a, &mut [&mut names]);
        assert_eq!(names.get(a), None);

        let b = world.create_entity();
        assert_eq!(a.index(), b.index());
        names.insert(b, "editor");
        assert_eq!(names.get(a), None);
        assert_eq!(names.remove(a), None);
        assert_eq!(names.get(b), Some(&"editor"));
        assert_eq!(names.len(), 1);
    }

    #[test]
    fn insert_overwrites_by_index() {
        let mut storage = Storage::new();
        let old = Entity::new(3, 0);
        let new = Entity::new(3, 1);
        assert_eq!(storage.insert(old, 1), None);
        assert_eq!(storage.insert(old, 2), Some(1));
        assert_eq!(storage.insert(new, 3), None);
        assert_eq!(storage.len(), 1);
        assert_eq!(storage.get(old), None);
        assert_eq!(storage.get(new), Some(&3));
    }

    #[test]
    fn iteration_is_in_index_order() {
        let mut storage = Storage::new();
        storage.insert(Entity::new(5, 2), 'c');
        storage.insert(Entity::new(1, 0), 'a');
        storage.insert(Entity::new(2, 7), 'b');
        let values: Vec<_> = storage.iter().map(|(_, v)| *v).collect();
        assert_eq!(values, ['a', 'b', 'c']);
        for (_, value) in storage.iter_mut() {
            *value = value.to_ascii_uppercase();
        }
        assert_eq!(storage.get(Entity::new(2, 7)), Some(&'B'));
        storage.clear();
        assert!(storage.is_empty());
    }
}
