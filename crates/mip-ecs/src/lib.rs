//! MIP ECS -- sparse-set Entity Component System with a generational asset
//! cache and cooperative scripted tasks.
//!
//! Entities are plain integer identifiers. Each registered component type gets
//! one [`SparseSet`](storage::SparseSet) table, and each entity carries a
//! [`Signature`](component::Signature) bitset naming the tables it has a value
//! in. Assets live in per-type [`AssetPool`](asset::AssetPool)s addressed by
//! generation-checked [`Handle`](asset::Handle)s, with a key cache in front of
//! a user-supplied loader. Systems run in registration order once per
//! [`Manager::step`](manager::Manager::step).
//!
//! # Quick Start
//!
//! ```
//! use mip_ecs::prelude::*;
//!
//! #[derive(Debug, Clone, PartialEq)]
//! struct Position { x: f32, y: f32 }
//!
//! #[derive(Debug, Clone, PartialEq)]
//! struct Velocity { dx: f32, dy: f32 }
//!
//! struct Movement;
//!
//! impl System for Movement {
//!     fn update(&mut self, manager: &mut Manager, dt: f32) {
//!         let (mut positions, velocities) = manager.views_mut::<Position, Velocity>();
//!         for (entity, vel) in velocities.iter() {
//!             if let Some(pos) = positions.get_mut(entity) {
//!                 pos.x += vel.dx * dt;
//!                 pos.y += vel.dy * dt;
//!             }
//!         }
//!     }
//! }
//!
//! let mut manager = Manager::new();
//! manager.register_component::<Position>();
//! manager.register_component::<Velocity>();
//! manager.register_system(Movement);
//!
//! let entity = manager.create_entity();
//! manager.add_component(entity, Position { x: 0.0, y: 0.0 });
//! manager.add_component(entity, Velocity { dx: 2.0, dy: 0.0 });
//!
//! manager.step(0.5);
//! assert_eq!(manager.get_component::<Position>(entity), Some(&Position { x: 1.0, y: 0.0 }));
//! ```

#![deny(unsafe_code)]

pub mod asset;
pub mod component;
pub mod entity;
pub mod manager;
pub mod storage;
pub mod system;
pub mod task;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by ECS operations.
#[derive(Debug, thiserror::Error)]
pub enum EcsError {
    /// The entity does not exist (destroyed or never created).
    #[error("entity {entity:?} does not exist (destroyed or never created)")]
    StaleEntity { entity: entity::EntityId },

    /// A component type was used before `register_component`.
    #[error("component type '{name}' not registered -- call register_component::<T>() first")]
    UnregisteredComponent { name: &'static str },

    /// An asset type was used before `register_asset`.
    #[error("asset type '{name}' not registered -- call register_asset::<T>(loader) first")]
    UnregisteredAsset { name: &'static str },

    /// The type's identity is past the last signature bit.
    #[error("component type '{name}' does not fit in a {max}-bit signature")]
    SignatureFull { name: &'static str, max: usize },

    /// The registered loader failed for this key.
    #[error("failed to load asset '{key}': {details}")]
    AssetLoad { key: String, details: String },
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::asset::{AssetLoader, AssetPool, Handle};
    pub use crate::component::{Signature, TypeIdentity, TypeInfo, TypeRegistry, MAX_COMPONENTS};
    pub use crate::entity::EntityId;
    pub use crate::manager::{Manager, ValuesMut};
    pub use crate::storage::{ComponentStorage, SparseSet};
    pub use crate::system::{FnSystem, StepDiagnostics, System};
    pub use crate::task::{Poll, Sequence, Step, Task, TaskDriver, TaskState};
    pub use crate::EcsError;
}

// ---------------------------------------------------------------------------
// Integration Tests
// ---------------------------------------------------------------------------
