//! Sparse-set component tables.
//!
//! A [`SparseSet<T>`] keeps three parallel arrays:
//!
//! - `dense`: the packed component values, iterated directly by systems.
//! - `owners`: `owners[i]` is the entity that owns `dense[i]`.
//! - `sparse`: entity index -> dense index, `VACANT` when absent.
//!
//! For every present entity `e`, `owners[sparse[e]] == e`. Removal swaps the
//! target with the last dense slot and patches the displaced owner's sparse
//! entry, so it is O(1) but does not preserve dense order.

use std::any::Any;

use crate::entity::EntityId;

/// Sparse entry marking an entity without a value in this table.
const VACANT: u32 = u32::MAX;

/// Smallest sparse array allocated on first growth.
const MIN_SPARSE_LEN: usize = 16;

// ---------------------------------------------------------------------------
// SparseSet
// ---------------------------------------------------------------------------

/// Dense storage for one component type, keyed by [`EntityId`].
#[derive(Debug, Clone)]
pub struct SparseSet<T> {
    dense: Vec<T>,
    owners: Vec<EntityId>,
    sparse: Vec<u32>,
}

impl<T> SparseSet<T> {
    /// Create an empty table.
    pub fn new() -> Self {
        Self {
            dense: Vec::new(),
            owners: Vec::new(),
            sparse: Vec::new(),
        }
    }

    /// Insert or overwrite the value for `entity`, returning the stored slot.
    ///
    /// Overwriting keeps the entity's dense position and does not grow the
    /// table.
    pub fn insert(&mut self, entity: EntityId, value: T) -> &mut T {
        let idx = entity.index();
        if idx >= self.sparse.len() {
            let new_len = (idx + 1).next_power_of_two().max(MIN_SPARSE_LEN);
            self.sparse.resize(new_len, VACANT);
        }

        let slot = self.sparse[idx];
        if slot != VACANT {
            let stored = &mut self.dense[slot as usize];
            *stored = value;
            return stored;
        }

        self.sparse[idx] = self.dense.len() as u32;
        self.owners.push(entity);
        self.dense.push(value);
        let last = self.dense.len() - 1;
        &mut self.dense[last]
    }

    /// Remove the value for `entity` by swapping it with the last dense slot.
    ///
    /// Returns the removed value, or `None` (leaving the table untouched) if
    /// the entity had none.
    pub fn remove(&mut self, entity: EntityId) -> Option<T> {
        let removed = self.dense_index(entity)?;
        let last = self.dense.len() - 1;
        if removed != last {
            let moved = self.owners[last];
            self.sparse[moved.index()] = removed as u32;
        }
        self.owners.swap_remove(removed);
        self.sparse[entity.index()] = VACANT;
        Some(self.dense.swap_remove(removed))
    }

    /// Position of `entity`'s value in the dense array.
    #[inline]
    pub fn dense_index(&self, entity: EntityId) -> Option<usize> {
        match self.sparse.get(entity.index()) {
            Some(&slot) if slot != VACANT => Some(slot as usize),
            _ => None,
        }
    }

    #[inline]
    pub fn get(&self, entity: EntityId) -> Option<&T> {
        self.dense_index(entity).map(|i| &self.dense[i])
    }

    #[inline]
    pub fn get_mut(&mut self, entity: EntityId) -> Option<&mut T> {
        match self.dense_index(entity) {
            Some(i) => Some(&mut self.dense[i]),
            None => None,
        }
    }

    #[inline]
    pub fn contains(&self, entity: EntityId) -> bool {
        self.dense_index(entity).is_some()
    }

    /// Number of stored values.
    #[inline]
    pub fn len(&self) -> usize {
        self.dense.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.dense.is_empty()
    }

    /// The packed values in current dense order.
    #[inline]
    pub fn values(&self) -> &[T] {
        &self.dense
    }

    /// Mutable access to the packed values. The slice length is fixed, so
    /// no structural change can happen through it.
    #[inline]
    pub fn values_mut(&mut self) -> &mut [T] {
        &mut self.dense
    }

    /// The owning entity of each dense slot, parallel to [`values`](Self::values).
    #[inline]
    pub fn owners(&self) -> &[EntityId] {
        &self.owners
    }

    /// `(owner, value)` pairs in dense order.
    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &T)> {
        self.owners.iter().copied().zip(self.dense.iter())
    }

    /// `(owner, value)` pairs in dense order with mutable values.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (EntityId, &mut T)> {
        self.owners.iter().copied().zip(self.dense.iter_mut())
    }

    /// Drop every value, keeping the sparse allocation.
    pub fn clear(&mut self) {
        for owner in self.owners.drain(..) {
            self.sparse[owner.index()] = VACANT;
        }
        self.dense.clear();
    }
}

impl<T> Default for SparseSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// ComponentStorage -- type-erased view over a SparseSet
// ---------------------------------------------------------------------------

/// Operations the manager needs on a table without knowing its value type.
pub trait ComponentStorage: Any {
    /// Drop `entity`'s value if present. Returns whether one was removed.
    fn remove_entity(&mut self, entity: EntityId) -> bool;

    fn contains_entity(&self, entity: EntityId) -> bool;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every stored value.
    fn clear(&mut self);

    /// Name of the stored component type.
    fn type_name(&self) -> &'static str;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: 'static> ComponentStorage for SparseSet<T> {
    fn remove_entity(&mut self, entity: EntityId) -> bool {
        self.remove(entity).is_some()
    }

    fn contains_entity(&self, entity: EntityId) -> bool {
        self.contains(entity)
    }

    fn len(&self) -> usize {
        self.dense.len()
    }

    fn clear(&mut self) {
        SparseSet::clear(self);
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn e(raw: u32) -> EntityId {
        EntityId::from_raw(raw)
    }

    fn assert_backlinks<T>(set: &SparseSet<T>) {
        for (i, owner) in set.owners().iter().enumerate() {
            assert_eq!(set.dense_index(*owner), Some(i));
        }
    }

    #[test]
    fn add_three_remove_middle() {
        let mut set = SparseSet::new();
        set.insert(e(3), "a");
        set.insert(e(1), "b");
        set.insert(e(4), "c");

        assert_eq!(set.remove(e(1)), Some("b"));

        assert!(!set.contains(e(1)));
        assert_eq!(set.get(e(3)), Some(&"a"));
        assert_eq!(set.get(e(4)), Some(&"c"));
        assert_eq!(set.len(), 2);
        assert_backlinks(&set);
    }

    #[test]
    fn overwrite_keeps_slot_and_size() {
        let mut set = SparseSet::new();
        set.insert(e(0), 1);
        set.insert(e(1), 2);
        *set.insert(e(0), 10) += 1;

        assert_eq!(set.len(), 2);
        assert_eq!(set.get(e(0)), Some(&11));
        assert_eq!(set.dense_index(e(0)), Some(0));
    }

    #[test]
    fn remove_absent_is_noop() {
        let mut set = SparseSet::new();
        set.insert(e(2), 'x');
        assert_eq!(set.remove(e(9)), None);
        assert_eq!(set.remove(e(1_000)), None);
        assert_eq!(set.len(), 1);
        assert_eq!(set.values(), &['x']);
    }

    #[test]
    fn remove_last_slot() {
        let mut set = SparseSet::new();
        set.insert(e(0), 0);
        set.insert(e(1), 1);
        assert_eq!(set.remove(e(1)), Some(1));
        assert_eq!(set.owners(), &[e(0)]);
        assert_backlinks(&set);
    }

    #[test]
    fn remove_only_element_then_reinsert() {
        let mut set = SparseSet::new();
        set.insert(e(5), 5);
        set.remove(e(5));
        assert!(set.is_empty());
        set.insert(e(5), 6);
        assert_eq!(set.get(e(5)), Some(&6));
    }

    #[test]
    fn sparse_growth_uses_slack() {
        let mut set = SparseSet::new();
        set.insert(e(0), ());
        assert_eq!(set.sparse.len(), MIN_SPARSE_LEN);
        set.insert(e(40), ());
        assert_eq!(set.sparse.len(), 64);
    }

    #[test]
    fn iter_mut_pairs_owners_with_values() {
        let mut set = SparseSet::new();
        set.insert(e(7), 1);
        set.insert(e(2), 2);
        for (owner, value) in set.iter_mut() {
            *value += owner.to_raw() as i32;
        }
        assert_eq!(set.get(e(7)), Some(&8));
        assert_eq!(set.get(e(2)), Some(&4));
    }

    #[test]
    fn clear_resets_sparse_entries() {
        let mut set = SparseSet::new();
        set.insert(e(1), 1);
        set.insert(e(3), 3);
        set.clear();
        assert!(set.is_empty());
        assert!(!set.contains(e(1)));
        assert!(!set.contains(e(3)));
    }

    #[test]
    fn erased_storage_removes_and_downcasts() {
        let mut set = SparseSet::new();
        set.insert(e(1), 1u8);
        let storage: &mut dyn ComponentStorage = &mut set;
        assert!(storage.contains_entity(e(1)));
        assert!(storage.remove_entity(e(1)));
        assert!(!storage.remove_entity(e(1)));
        assert_eq!(storage.type_name(), "u8");
        assert!(storage.as_any().downcast_ref::<SparseSet<u8>>().is_some());
        assert!(storage.as_any().downcast_ref::<SparseSet<u16>>().is_none());
    }
}
