//! MIP Sim -- gameplay layer on top of [`mip_ecs`].
//!
//! Concrete components and systems for a top-down arena: a keyboard-driven
//! player with an auto-aimed piercing weapon, mobs walking scripted patrols,
//! and rings of enemies that spawn around the player in waves and are pooled
//! when their health runs out.
//! Rendering and input are collaborator traits ([`render::Renderer`],
//! [`input::InputSource`]) so the whole simulation runs headless.
//!
//! # Quick Start
//!
//! ```
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! use mip_sim::prelude::*;
//!
//! #[derive(Default)]
//! struct NullRenderer {
//!     next: u32,
//! }
//!
//! impl Renderer for NullRenderer {
//!     fn create_texture(&mut self, _path: &str) -> anyhow::Result<TextureId> {
//!         self.next += 1;
//!         Ok(TextureId(self.next))
//!     }
//!     fn submit(&mut self, _draw: DrawCall) {}
//! }
//!
//! let renderer = Rc::new(RefCell::new(NullRenderer::default()));
//! let keys = Rc::new(KeyState::new());
//! let mut sim = Simulation::from_config(SimConfig::default(), renderer, Rc::clone(&keys)).unwrap();
//!
//! keys.press(Key::Right);
//! sim.run_ticks(60);
//!
//! let player = sim.player();
//! let pos = sim.manager().get_component::<Transform>(player).unwrap().pos;
//! assert!(pos.x > 290.0);
//! ```

#![deny(unsafe_code)]

pub mod components;
pub mod config;
pub mod error;
pub mod input;
pub mod render;
pub mod scene;
pub mod scripts;
pub mod sim;
pub mod systems;

pub use error::SimError;

/// Re-export the ECS crate for convenience.
pub use mip_ecs;

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use mip_ecs::prelude::*;

    pub use crate::components::{
        is_active, player_position, Active, CircleCollider, DamageDealer, EnemyTag, Health,
        Lifetime, Pierce, PlayerTag, Script, Sprite, Transform, Velocity,
    };
    pub use crate::config::{
        PatrolConfig, PlayerConfig, SimConfig, TextureConfig, WaveConfig, WeaponConfig,
    };
    pub use crate::input::{InputSource, Key, KeyState};
    pub use crate::render::{DrawCall, RenderSystem, Renderer, Texture, TextureId, TextureLoader};
    pub use crate::scene::Scene;
    pub use crate::scripts::square_patrol;
    pub use crate::sim::Simulation;
    pub use crate::systems::{
        fire_script, wave_script, DamageSystem, LifetimeSystem, MovementSystem,
        PlayerControllerSystem, ScriptSystem, WaveOrder, WaveOrders, WaveSpawnerSystem,
        WeaponSystem,
    };
    pub use crate::SimError;
}
