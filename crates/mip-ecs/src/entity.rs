//! Entity identifiers and the entity directory.
//!
//! An [`EntityId`] is a 32-bit identifier handed out in strictly increasing
//! order and never reused, so an identifier held past `destroy` can never
//! alias a newer entity. The [`EntityDirectory`] keeps one [`Signature`] and
//! one alive flag per issued identifier.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::component::{Signature, TypeIdentity};

// ---------------------------------------------------------------------------
// EntityId
// ---------------------------------------------------------------------------

/// Opaque identifier for one simulation object.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(u32);

impl EntityId {
    /// Reserved value that no directory ever issues.
    pub const NULL: EntityId = EntityId(u32::MAX);

    /// The identifier as a `usize` index into per-entity arrays.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Raw `u32` representation.
    #[inline]
    pub fn to_raw(self) -> u32 {
        self.0
    }

    /// Reconstruct from a raw `u32`.
    #[inline]
    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({})", self.0)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// EntityDirectory
// ---------------------------------------------------------------------------

/// Per-entity slack added when the signature array has to grow.
const SIGNATURE_SLACK: usize = 16;

/// Allocates identifiers and stores each entity's [`Signature`].
///
/// The directory only tracks bits. Removing the corresponding component
/// values on destroy is the caller's job (the [`Manager`](crate::manager::Manager)
/// walks the signature returned by [`release`](Self::release)).
#[derive(Debug, Default)]
pub struct EntityDirectory {
    /// Next identifier to hand out.
    next: u32,
    /// Indexed by `EntityId::index()`. Longer than `next` by the growth slack.
    signatures: Vec<Signature>,
    /// Whether the slot is currently alive.
    alive: Vec<bool>,
    alive_count: usize,
}

impl EntityDirectory {
    /// Create an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next identifier with an empty signature.
    ///
    /// # Panics
    ///
    /// Panics if the `u32` identifier space is exhausted.
    pub fn create(&mut self) -> EntityId {
        assert!(self.next != u32::MAX, "entity identifier space exhausted");
        let id = EntityId(self.next);
        self.next += 1;

        let idx = id.index();
        if idx >= self.signatures.len() {
            self.signatures.resize(idx + SIGNATURE_SLACK, Signature::EMPTY);
            self.alive.resize(idx + SIGNATURE_SLACK, false);
        }
        self.signatures[idx].clear();
        self.alive[idx] = true;
        self.alive_count += 1;
        id
    }

    /// Mark `entity` dead and hand back the signature it had, leaving an
    /// empty one in its place.
    ///
    /// Returns `None` if the entity was never issued or is already dead.
    pub fn release(&mut self, entity: EntityId) -> Option<Signature> {
        if !self.is_alive(entity) {
            return None;
        }
        let idx = entity.index();
        self.alive[idx] = false;
        self.alive_count -= 1;
        Some(std::mem::take(&mut self.signatures[idx]))
    }

    /// Whether `entity` was issued by this directory and not yet released.
    #[inline]
    pub fn is_alive(&self, entity: EntityId) -> bool {
        entity.0 < self.next && self.alive[entity.index()]
    }

    /// The signature of `entity`. Dead or unknown entities report an empty
    /// signature.
    #[inline]
    pub fn signature(&self, entity: EntityId) -> Signature {
        if entity.0 < self.next {
            self.signatures[entity.index()]
        } else {
            Signature::EMPTY
        }
    }

    /// Set one bit of a live entity's signature. Returns `false` for dead or
    /// unknown entities.
    pub fn set_bit(&mut self, entity: EntityId, id: TypeIdentity) -> bool {
        if !self.is_alive(entity) {
            return false;
        }
        self.signatures[entity.index()].insert(id);
        true
    }

    /// Clear one bit of an entity's signature.
    pub fn clear_bit(&mut self, entity: EntityId, id: TypeIdentity) {
        if entity.0 < self.next {
            self.signatures[entity.index()].remove(id);
        }
    }

    /// Number of currently alive entities.
    pub fn alive_count(&self) -> usize {
        self.alive_count
    }

    /// Number of identifiers issued so far, alive or not.
    pub fn issued(&self) -> u32 {
        self.next
    }

    /// Alive entities in ascending identifier order.
    pub fn iter_alive(&self) -> impl Iterator<Item = EntityId> + '_ {
        (0..self.next)
            .filter(|&raw| self.alive[raw as usize])
            .map(EntityId)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
