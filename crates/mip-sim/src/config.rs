//! Simulation configuration.
//!
//! Every field has a default, so a config file only needs to name what it
//! changes:
//!
//! ```
//! use mip_sim::config::SimConfig;
//!
//! let config = SimConfig::from_json_str(r#"{ "seed": 7, "waves": { "counts": [3, 6] } }"#).unwrap();
//! assert_eq!(config.seed, 7);
//! assert_eq!(config.waves.counts, vec![3, 6]);
//! assert_eq!(config.fixed_dt, 1.0 / 60.0);
//! ```

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::error::SimError;

// ---------------------------------------------------------------------------
// SimConfig
// ---------------------------------------------------------------------------

/// Top-level simulation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Fixed time step in seconds per tick. Must be positive and finite.
    pub fixed_dt: f32,
    /// Seed for the wave spawner's jitter.
    pub seed: u64,
    pub player: PlayerConfig,
    pub patrol: PatrolConfig,
    /// Where patrolling mobs start.
    pub patrol_spawns: Vec<Vec2>,
    pub waves: WaveConfig,
    pub weapon: WeaponConfig,
    pub textures: TextureConfig,
}

impl Default for SimConfig {
    /// 60 Hz, one patrolling mob, three escalating waves.
    fn default() -> Self {
        Self {
            fixed_dt: 1.0 / 60.0,
            seed: 0,
            player: PlayerConfig::default(),
            patrol: PatrolConfig::default(),
            patrol_spawns: vec![Vec2::new(200.0, 200.0)],
            waves: WaveConfig::default(),
            weapon: WeaponConfig::default(),
            textures: TextureConfig::default(),
        }
    }
}

impl SimConfig {
    /// Parse and validate a JSON config.
    pub fn from_json_str(text: &str) -> Result<Self, SimError> {
        let config: SimConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges that serde cannot express.
    pub fn validate(&self) -> Result<(), SimError> {
        if !(self.fixed_dt > 0.0 && self.fixed_dt.is_finite()) {
            return Err(SimError::InvalidConfig(format!(
                "fixed_dt must be positive and finite, got {}",
                self.fixed_dt
            )));
        }
        if self.waves.counts.is_empty() {
            return Err(SimError::InvalidConfig(
                "waves.counts must list at least one wave".to_owned(),
            ));
        }
        if !(self.waves.interval > 0.0) {
            return Err(SimError::InvalidConfig(format!(
                "waves.interval must be positive, got {}",
                self.waves.interval
            )));
        }
        if self.waves.jitter_degrees < 0.0 {
            return Err(SimError::InvalidConfig(format!(
                "waves.jitter_degrees must not be negative, got {}",
                self.waves.jitter_degrees
            )));
        }
        if !(self.weapon.fire_interval > 0.0) {
            return Err(SimError::InvalidConfig(format!(
                "weapon.fire_interval must be positive, got {}",
                self.weapon.fire_interval
            )));
        }
        if self.weapon.pierce == 0 {
            return Err(SimError::InvalidConfig(
                "weapon.pierce must be at least 1".to_owned(),
            ));
        }
        if self.patrol.move_time < 0.0 || self.patrol.wait_time < 0.0 {
            return Err(SimError::InvalidConfig(
                "patrol times must not be negative".to_owned(),
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Pixels per second.
    pub speed: f32,
    pub spawn: Vec2,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            speed: 300.0,
            spawn: Vec2::ZERO,
        }
    }
}

/// Timing of the square patrol script.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatrolConfig {
    /// Seconds spent moving along each side.
    pub move_time: f32,
    /// Seconds spent standing at each corner.
    pub wait_time: f32,
    /// Pixels per second while moving.
    pub speed: f32,
}

impl Default for PatrolConfig {
    fn default() -> Self {
        Self {
            move_time: 2.0,
            wait_time: 3.0,
            speed: 150.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaveConfig {
    /// Distance from the player at which a wave appears.
    pub spawn_radius: f32,
    /// Enemy speed during the first wave.
    pub base_speed: f32,
    /// Added to the enemy speed for each later wave in the cycle.
    pub speed_step: f32,
    /// Number of enemies per wave; the list repeats.
    pub counts: Vec<u32>,
    /// Seconds between waves.
    pub interval: f32,
    pub enemy_health: f32,
    /// Maximum random rotation, in degrees, of each wave's ring.
    pub jitter_degrees: f32,
}

impl Default for WaveConfig {
    fn default() -> Self {
        Self {
            spawn_radius: 800.0,
            base_speed: 100.0,
            speed_step: 50.0,
            counts: vec![5, 10, 15],
            interval: 10.0,
            enemy_health: 30.0,
            jitter_degrees: 15.0,
        }
    }
}

/// The player's auto-aimed projectile weapon.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeaponConfig {
    /// Seconds between shots.
    pub fire_interval: f32,
    /// Pixels per second.
    pub projectile_speed: f32,
    pub projectile_radius: f32,
    /// Seconds before a projectile that hit nothing disappears.
    pub projectile_lifetime: f32,
    pub damage: f32,
    /// Enemies a projectile can hit before it is spent.
    pub pierce: u32,
}

impl Default for WeaponConfig {
    fn default() -> Self {
        Self {
            fire_interval: 0.5,
            projectile_speed: 500.0,
            projectile_radius: 8.0,
            projectile_lifetime: 2.0,
            damage: 10.0,
            pierce: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextureConfig {
    pub player: String,
    pub mob: String,
    pub enemy: String,
    pub projectile: String,
}

impl Default for TextureConfig {
    fn default() -> Self {
        Self {
            player: "assets/textures/player.png".to_owned(),
            mob: "assets/textures/mob.png".to_owned(),
            enemy: "assets/textures/mob1.png".to_owned(),
            projectile: "assets/textures/bullet.png".to_owned(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
