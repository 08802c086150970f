//! Gameplay components.

use glam::Vec2;
use mip_ecs::asset::Handle;
use mip_ecs::entity::EntityId;
use mip_ecs::manager::Manager;
use mip_ecs::task::{Task, TaskDriver};

use crate::render::Texture;

/// Position, size and draw order in world pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub pos: Vec2,
    /// Width and height in pixels.
    pub scale: Vec2,
    /// Degrees, counter-clockwise around Z.
    pub rot: f32,
    /// Draw order; higher is drawn later.
    pub z: u32,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            pos: Vec2::ZERO,
            scale: Vec2::splat(10.0),
            rot: 0.0,
            z: 0,
        }
    }
}

impl Transform {
    pub fn at(pos: Vec2, size: f32, z: u32) -> Self {
        Self {
            pos,
            scale: Vec2::splat(size),
            rot: 0.0,
            z,
        }
    }
}

/// Pixels per second.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Velocity(pub Vec2);

/// Inactive entities are skipped by every system but keep their components,
/// so they can be pooled and revived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Active(pub bool);

impl Default for Active {
    fn default() -> Self {
        Active(true)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Health {
    pub cur: f32,
    pub max: f32,
    /// Seconds of remaining invulnerability.
    pub invulnerable: f32,
}

impl Health {
    pub fn full(max: f32) -> Self {
        Self {
            cur: max,
            max,
            invulnerable: 0.0,
        }
    }

    pub fn is_depleted(&self) -> bool {
        self.cur <= 0.0
    }
}

/// Circle used for hit tests, radius in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CircleCollider {
    pub radius: f32,
}

/// Health taken from every [`Health`] entity this one touches.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DamageDealer {
    pub amount: f32,
}

/// Hits a damage dealer survives before it is destroyed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pierce {
    pub count: u32,
}

/// Seconds until the entity is destroyed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Lifetime {
    pub remaining: f32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlayerTag;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnemyTag;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sprite {
    pub texture: Handle<Texture>,
}

/// A scripted behavior resumed by
/// [`ScriptSystem`](crate::systems::ScriptSystem).
#[derive(Debug)]
pub struct Script {
    pub driver: TaskDriver<Manager>,
}

impl Script {
    pub fn new(task: Task<Manager>) -> Self {
        Self {
            driver: TaskDriver::new(task),
        }
    }
}

/// Whether `entity` takes part in simulation. Entities without an [`Active`]
/// component count as active.
pub fn is_active(manager: &Manager, entity: EntityId) -> bool {
    manager
        .get_component::<Active>(entity)
        .map_or(true, |active| active.0)
}

/// Position of the first player, or the origin when there is none.
pub fn player_position(manager: &Manager) -> Vec2 {
    let Ok(players) = manager.try_view::<PlayerTag>() else {
        return Vec2::ZERO;
    };
    players
        .owners()
        .first()
        .and_then(|&player| manager.get_component::<Transform>(player))
        .map_or(Vec2::ZERO, |t| t.pos)
}
