//! Scene setup: component registration, asset loader, system order and the
//! initial entities.

use std::cell::RefCell;
use std::rc::Rc;

use glam::Vec2;
use mip_ecs::entity::EntityId;
use mip_ecs::manager::Manager;
use tracing::info;

use crate::components::{
    Active, CircleCollider, DamageDealer, EnemyTag, Health, Lifetime, Pierce, PlayerTag, Script,
    Sprite, Transform, Velocity,
};
use crate::config::SimConfig;
use crate::error::SimError;
use crate::input::InputSource;
use crate::render::{RenderSystem, Renderer, Texture, TextureLoader};
use crate::scripts::square_patrol;
use crate::systems::{
    DamageSystem, LifetimeSystem, MovementSystem, PlayerControllerSystem, ScriptSystem,
    WaveSpawnerSystem, WeaponSystem,
};

const PLAYER_SIZE: f32 = 100.0;
const PLAYER_Z: u32 = 2;
const MOB_SIZE: f32 = 50.0;
const MOB_Z: u32 = 1;

/// A fully wired manager plus the entities the scene created.
#[derive(Debug)]
pub struct Scene {
    manager: Manager,
    player: EntityId,
    mobs: Vec<EntityId>,
}

impl Scene {
    /// Build the scene described by `config`.
    ///
    /// Fails if a component type cannot be registered or the player texture
    /// cannot be loaded. A missing mob, enemy or projectile texture only
    /// leaves those sprites undrawn.
    pub fn init<R, I>(
        config: &SimConfig,
        renderer: Rc<RefCell<R>>,
        input: I,
    ) -> Result<Self, SimError>
    where
        R: Renderer + 'static,
        I: InputSource + 'static,
    {
        let mut manager = Manager::new();
        register_components(&mut manager)?;
        manager.register_asset::<Texture, _>(TextureLoader::new(Rc::clone(&renderer)));

        let enemy_texture = manager.load_asset::<Texture>(&config.textures.enemy);
        let projectile_texture = manager.load_asset::<Texture>(&config.textures.projectile);
        manager.register_system(PlayerControllerSystem::new(input, config.player.speed));
        manager.register_system(ScriptSystem::new());
        manager.register_system(WaveSpawnerSystem::new(
            config.waves.clone(),
            config.seed,
            enemy_texture,
        ));
        manager.register_system(WeaponSystem::new(config.weapon, projectile_texture));
        manager.register_system(MovementSystem::new());
        manager.register_system(DamageSystem::new());
        manager.register_system(LifetimeSystem::new());
        manager.register_system(RenderSystem::new(renderer));

        let player = create_player(&mut manager, config)?;
        let mobs = config
            .patrol_spawns
            .iter()
            .map(|&pos| create_mob(&mut manager, pos, config))
            .collect::<Vec<_>>();

        info!(
            systems = manager.system_count(),
            entities = manager.entity_count(),
            "scene initialized"
        );
        Ok(Self {
            manager,
            player,
            mobs,
        })
    }

    pub fn manager(&self) -> &Manager {
        &self.manager
    }

    pub fn manager_mut(&mut self) -> &mut Manager {
        &mut self.manager
    }

    pub fn player(&self) -> EntityId {
        self.player
    }

    /// Patrolling mobs, in `config.patrol_spawns` order.
    pub fn mobs(&self) -> &[EntityId] {
        &self.mobs
    }

    pub fn into_manager(self) -> Manager {
        self.manager
    }
}

fn register_components(manager: &mut Manager) -> Result<(), SimError> {
    manager.try_register_component::<Transform>()?;
    manager.try_register_component::<Sprite>()?;
    manager.try_register_component::<Velocity>()?;
    manager.try_register_component::<Active>()?;
    manager.try_register_component::<Health>()?;
    manager.try_register_component::<Script>()?;
    manager.try_register_component::<PlayerTag>()?;
    manager.try_register_component::<EnemyTag>()?;
    manager.try_register_component::<CircleCollider>()?;
    manager.try_register_component::<DamageDealer>()?;
    manager.try_register_component::<Pierce>()?;
    manager.try_register_component::<Lifetime>()?;
    Ok(())
}

fn create_player(manager: &mut Manager, config: &SimConfig) -> Result<EntityId, SimError> {
    let texture = manager
        .try_load_asset::<Texture>(&config.textures.player)
        .map_err(|e| SimError::Setup(format!("player texture: {e}")))?;

    let player = manager.create_entity();
    manager.add_component(player, PlayerTag);
    manager.add_component(player, Active(true));
    manager.add_component(
        player,
        Transform::at(config.player.spawn, PLAYER_SIZE, PLAYER_Z),
    );
    manager.add_component(player, Velocity::default());
    manager.add_component(player, Sprite { texture });
    Ok(player)
}

fn create_mob(manager: &mut Manager, pos: Vec2, config: &SimConfig) -> EntityId {
    let texture = manager.load_asset::<Texture>(&config.textures.mob);

    let mob = manager.create_entity();
    manager.add_component(mob, Active(true));
    manager.add_component(mob, Transform::at(pos, MOB_SIZE, MOB_Z));
    manager.add_component(mob, Velocity::default());
    manager.add_component(mob, Script::new(square_patrol(mob, config.patrol)));
    manager.add_component(mob, Sprite { texture });
    mob
}
