//! Generation-checked asset pools.
//!
//! An [`AssetPool<T>`] stores shared assets (textures, materials, ...) in a
//! slot array with a free-list. A [`Handle<T>`] pairs a slot index with the
//! slot's generation at insert time; unloading bumps the generation, so a
//! handle held across an unload never resolves to whatever asset later reuses
//! the slot. A key cache makes loading the same key twice a cache hit.
//!
//! How bytes become an asset is not this module's concern: the manager calls
//! an injected [`AssetLoader`] on cache misses.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Index + generation reference to an asset of type `T`.
pub struct Handle<T> {
    index: u32,
    generation: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Handle<T> {
    const INVALID_INDEX: u32 = u32::MAX;

    fn new(index: u32, generation: u32) -> Self {
        Self {
            index,
            generation,
            _marker: PhantomData,
        }
    }

    /// A handle that never resolves. Returned by failed loads.
    pub fn invalid() -> Self {
        Self::new(Self::INVALID_INDEX, 0)
    }

    /// Whether this is anything other than [`Handle::invalid`]. A valid
    /// handle may still be stale.
    #[inline]
    pub fn is_valid(self) -> bool {
        self.index != Self::INVALID_INDEX
    }

    #[inline]
    pub fn index(self) -> u32 {
        self.index
    }

    #[inline]
    pub fn generation(self) -> u32 {
        self.generation
    }
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.generation == other.generation
    }
}

impl<T> Eq for Handle<T> {}

impl<T> Hash for Handle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
        self.generation.hash(state);
    }
}

impl<T> Default for Handle<T> {
    fn default() -> Self {
        Self::invalid()
    }
}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "Handle({}v{})", self.index, self.generation)
        } else {
            write!(f, "Handle(invalid)")
        }
    }
}

// ---------------------------------------------------------------------------
// AssetLoader
// ---------------------------------------------------------------------------

/// Turns a load key (usually a path) into an asset.
///
/// Any `FnMut(&str) -> anyhow::Result<T>` closure is a loader.
pub trait AssetLoader<T> {
    fn load(&mut self, key: &str) -> anyhow::Result<T>;
}

impl<T, F> AssetLoader<T> for F
where
    F: FnMut(&str) -> anyhow::Result<T>,
{
    fn load(&mut self, key: &str) -> anyhow::Result<T> {
        self(key)
    }
}

// ---------------------------------------------------------------------------
// AssetPool
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct Slot<T> {
    /// `Some` while the slot is active.
    value: Option<T>,
    generation: u32,
    /// Set once the generation counter is exhausted. A retired slot is never
    /// handed out again.
    retired: bool,
}

/// Slot array of `T` with a free-list and a key -> handle cache.
#[derive(Debug)]
pub struct AssetPool<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    retired: usize,
    by_key: HashMap<String, Handle<T>>,
}

impl<T> AssetPool<T> {
    /// Create an empty pool.
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            retired: 0,
            by_key: HashMap::new(),
        }
    }

    /// Store `value`, reusing a freed slot when one exists.
    ///
    /// A non-empty `key` (re)points the cache entry for that key at the new
    /// handle. Inserting never changes a slot's generation.
    pub fn insert(&mut self, key: &str, value: T) -> Handle<T> {
        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                self.slots.push(Slot {
                    value: None,
                    generation: 0,
                    retired: false,
                });
                (self.slots.len() - 1) as u32
            }
        };

        let slot = &mut self.slots[index as usize];
        slot.value = Some(value);
        let handle = Handle::new(index, slot.generation);

        if !key.is_empty() {
            self.by_key.insert(key.to_owned(), handle);
        }
        handle
    }

    /// Resolve `handle`. `None` if it is out of range, unloaded, or from an
    /// older generation of its slot.
    pub fn get(&self, handle: Handle<T>) -> Option<&T> {
        let slot = self.slots.get(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.value.as_ref()
    }

    pub fn get_mut(&mut self, handle: Handle<T>) -> Option<&mut T> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.value.as_mut()
    }

    /// Whether `handle` currently resolves.
    pub fn contains(&self, handle: Handle<T>) -> bool {
        self.get(handle).is_some()
    }

    /// Release the asset behind `handle` and return it.
    ///
    /// The slot's generation is bumped, invalidating every outstanding handle
    /// to it, and the slot goes back on the free-list. Stale or invalid
    /// handles are ignored.
    pub fn unload(&mut self, handle: Handle<T>) -> Option<T> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        let value = slot.value.take()?;
        self.release_slot(handle.index);
        Some(value)
    }

    /// Bump the generation of a just-emptied slot and make it reusable, or
    /// retire it when the generation cannot grow any further.
    fn release_slot(&mut self, index: u32) {
        let slot = &mut self.slots[index as usize];
        match slot.generation.checked_add(1) {
            Some(next) => {
                slot.generation = next;
                self.free.push(index);
            }
            None => {
                slot.retired = true;
                self.retired += 1;
            }
        }
    }

    /// Cached handle for `key`, provided it still resolves.
    pub fn find(&self, key: &str) -> Option<Handle<T>> {
        self.by_key
            .get(key)
            .copied()
            .filter(|&handle| self.contains(handle))
    }

    /// Number of active assets.
    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len() - self.retired
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of slots ever allocated, active, free or retired.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Unload every asset and forget every key.
    ///
    /// Slots are kept (with bumped generations) so handles issued before the
    /// clear stay dead after their indices are reused.
    pub fn clear(&mut self) {
        self.free.clear();
        for index in 0..self.slots.len() as u32 {
            let slot = &mut self.slots[index as usize];
            if slot.retired {
                continue;
            }
            if slot.value.take().is_some() {
                self.release_slot(index);
            } else {
                self.free.push(index);
            }
        }
        self.by_key.clear();
    }
}

impl<T> Default for AssetPool<T> {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// AssetStore -- pool + loader, type-erased for the manager
// ---------------------------------------------------------------------------

/// A pool bundled with the loader that fills it on cache misses.
pub(crate) struct AssetStore<T> {
    pub(crate) pool: AssetPool<T>,
    loader: Box<dyn AssetLoader<T>>,
}

impl<T: 'static> AssetStore<T> {
    pub(crate) fn new(loader: Box<dyn AssetLoader<T>>) -> Self {
        Self {
            pool: AssetPool::new(),
            loader,
        }
    }

    /// Cache-or-load: a hit returns the cached handle without touching the
    /// loader; a miss calls the loader once and caches only on success.
    pub(crate) fn load(&mut self, key: &str) -> Result<Handle<T>, anyhow::Error> {
        if let Some(existing) = self.pool.find(key) {
            return Ok(existing);
        }
        let value = self.loader.load(key)?;
        Ok(self.pool.insert(key, value))
    }
}

/// Object-safe face of an [`AssetStore`], so stores of different asset types
/// can share one collection.
pub(crate) trait ErasedAssetStore {
    fn clear(&mut self);
    fn len(&self) -> usize;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: 'static> ErasedAssetStore for AssetStore<T> {
    fn clear(&mut self) {
        self.pool.clear();
    }

    fn len(&self) -> usize {
        self.pool.len()
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
