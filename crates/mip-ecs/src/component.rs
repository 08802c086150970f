//! Runtime type identities and entity signatures.
//!
//! Every component or asset type used by a [`Manager`](crate::manager::Manager)
//! is assigned a dense [`TypeIdentity`] by a [`TypeRegistry`] the first time it
//! is referenced. Component identities double as bit positions in an entity's
//! [`Signature`], so they must stay below [`MAX_COMPONENTS`].

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use serde::{Deserialize, Serialize};

/// Width of a [`Signature`]: the maximum number of distinct type identities
/// that can be tracked as components.
pub const MAX_COMPONENTS: usize = 64;

// ---------------------------------------------------------------------------
// TypeIdentity
// ---------------------------------------------------------------------------

/// Small dense integer identifying a component or asset type.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TypeIdentity(pub(crate) u32);

impl TypeIdentity {
    /// The identity as a `usize` index.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for TypeIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeIdentity({})", self.0)
    }
}

// ---------------------------------------------------------------------------
// TypeInfo
// ---------------------------------------------------------------------------

/// Metadata recorded when a type first receives an identity.
#[derive(Debug, Clone)]
pub struct TypeInfo {
    /// Identity assigned at first use.
    pub id: TypeIdentity,
    /// `std::any::type_name::<T>()`
    pub name: &'static str,
    /// `std::mem::size_of::<T>()`
    pub size: usize,
    /// `std::mem::align_of::<T>()`
    pub align: usize,
    /// Rust `TypeId` for runtime type checking.
    pub type_id: TypeId,
}

// ---------------------------------------------------------------------------
// TypeRegistry
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct RegistryInner {
    /// TypeId -> TypeIdentity for dedup.
    by_type: HashMap<TypeId, TypeIdentity>,
    /// Indexed by TypeIdentity.0.
    infos: Vec<TypeInfo>,
}

/// Assigns monotonically increasing [`TypeIdentity`]s to Rust types.
///
/// Identities are never reused: the first query for a type receives one past
/// the previous maximum, and every later query for the same type returns the
/// same value. The registry is internally synchronized so a single instance
/// can be shared between managers (see [`TypeRegistry::global`]).
#[derive(Debug, Default)]
pub struct TypeRegistry {
    inner: RwLock<RegistryInner>,
}

impl TypeRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry.
    ///
    /// Managers built with `Manager::with_registry(TypeRegistry::global())`
    /// agree on every type identity for the lifetime of the process.
    pub fn global() -> Arc<TypeRegistry> {
        static GLOBAL: OnceLock<Arc<TypeRegistry>> = OnceLock::new();
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(TypeRegistry::new())))
    }

    /// Identity of `T`, assigning a fresh one on first use.
    pub fn identity_of<T: 'static>(&self) -> TypeIdentity {
        let rust_type_id = TypeId::of::<T>();
        if let Some(&existing) = self.read().by_type.get(&rust_type_id) {
            return existing;
        }

        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        // Another caller may have won the race between the two locks.
        if let Some(&existing) = inner.by_type.get(&rust_type_id) {
            return existing;
        }
        let id = TypeIdentity(inner.infos.len() as u32);
        inner.infos.push(TypeInfo {
            id,
            name: std::any::type_name::<T>(),
            size: std::mem::size_of::<T>(),
            align: std::mem::align_of::<T>(),
            type_id: rust_type_id,
        });
        inner.by_type.insert(rust_type_id, id);
        id
    }

    /// Identity of `T` if it has already been assigned.
    pub fn lookup<T: 'static>(&self) -> Option<TypeIdentity> {
        self.read().by_type.get(&TypeId::of::<T>()).copied()
    }

    /// Metadata for an assigned identity.
    pub fn info(&self, id: TypeIdentity) -> Option<TypeInfo> {
        self.read().infos.get(id.index()).cloned()
    }

    /// Number of identities handed out so far.
    pub fn len(&self) -> usize {
        self.read().infos.len()
    }

    /// Whether no identity has been handed out yet.
    pub fn is_empty(&self) -> bool {
        self.read().infos.is_empty()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, RegistryInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }
}

// ---------------------------------------------------------------------------
// Signature
// ---------------------------------------------------------------------------

/// Fixed-width bitset recording which component types an entity holds.
///
/// Bit `i` is set exactly when the table for identity `i` holds an entry for
/// the entity.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Signature(u64);

impl Signature {
    /// The empty signature.
    pub const EMPTY: Signature = Signature(0);

    /// Set the bit for `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id` is outside the signature width.
    #[inline]
    pub fn insert(&mut self, id: TypeIdentity) {
        assert!(
            id.index() < MAX_COMPONENTS,
            "{id:?} does not fit in a {MAX_COMPONENTS}-bit signature"
        );
        self.0 |= 1u64 << id.0;
    }

    /// Clear the bit for `id`. Out-of-range identities are ignored.
    #[inline]
    pub fn remove(&mut self, id: TypeIdentity) {
        if id.index() < MAX_COMPONENTS {
            self.0 &= !(1u64 << id.0);
        }
    }

    /// Whether the bit for `id` is set.
    #[inline]
    pub fn contains(self, id: TypeIdentity) -> bool {
        id.index() < MAX_COMPONENTS && self.0 & (1u64 << id.0) != 0
    }

    /// Whether every bit set in `other` is also set in `self`.
    #[inline]
    pub fn contains_all(self, other: Signature) -> bool {
        self.0 & other.0 == other.0
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Number of set bits.
    #[inline]
    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    #[inline]
    pub fn clear(&mut self) {
        self.0 = 0;
    }

    /// Set identities in ascending order.
    pub fn iter(self) -> impl Iterator<Item = TypeIdentity> {
        let mut bits = self.0;
        std::iter::from_fn(move || {
            if bits == 0 {
                return None;
            }
            let next = bits.trailing_zeros();
            bits &= bits - 1;
            Some(TypeIdentity(next))
        })
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter().map(|id| id.0)).finish()
    }
}

impl FromIterator<TypeIdentity> for Signature {
    fn from_iter<I: IntoIterator<Item = TypeIdentity>>(iter: I) -> Self {
        let mut sig = Signature::EMPTY;
        for id in iter {
            sig.insert(id);
        }
        sig
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
