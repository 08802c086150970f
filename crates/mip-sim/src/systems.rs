//! Gameplay systems, registered by [`Scene::init`](crate::scene::Scene::init)
//! in this order: controller, scripts, spawner, weapon, movement, damage,
//! lifetime, render.

use glam::Vec2;
use mip_ecs::asset::Handle;
use mip_ecs::entity::EntityId;
use mip_ecs::manager::Manager;
use mip_ecs::system::System;
use mip_ecs::task::{Sequence, Task, TaskDriver};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use tracing::{debug, trace, warn};

use crate::components::{
    is_active, player_position, Active, CircleCollider, DamageDealer, EnemyTag, Health, Lifetime,
    Pierce, PlayerTag, Script, Sprite, Transform, Velocity,
};
use crate::config::{WaveConfig, WeaponConfig};
use crate::input::{InputSource, Key};
use crate::render::Texture;

// ---------------------------------------------------------------------------
// PlayerControllerSystem
// ---------------------------------------------------------------------------

/// Turns held direction keys into player velocity. Diagonals are normalized
/// so every direction moves at `speed`.
pub struct PlayerControllerSystem<I> {
    input: I,
    speed: f32,
    scratch: Vec<EntityId>,
}

impl<I: InputSource> PlayerControllerSystem<I> {
    pub fn new(input: I, speed: f32) -> Self {
        Self {
            input,
            speed,
            scratch: Vec::new(),
        }
    }

    /// Unit direction of the held keys (screen space, `y` grows downward).
    pub fn direction(&self) -> Vec2 {
        let mut dir = Vec2::ZERO;
        if self.input.is_pressed(Key::Up) {
            dir.y -= 1.0;
        }
        if self.input.is_pressed(Key::Down) {
            dir.y += 1.0;
        }
        if self.input.is_pressed(Key::Left) {
            dir.x -= 1.0;
        }
        if self.input.is_pressed(Key::Right) {
            dir.x += 1.0;
        }
        dir.normalize_or_zero()
    }
}

impl<I: InputSource + 'static> System for PlayerControllerSystem<I> {
    fn update(&mut self, manager: &mut Manager, _dt: f32) {
        let velocity = self.direction() * self.speed;
        self.scratch.clear();
        self.scratch
            .extend_from_slice(manager.view::<PlayerTag>().owners());

        for &player in &self.scratch {
            if !is_active(manager, player) {
                continue;
            }
            match manager.get_component_mut::<Velocity>(player) {
                Some(v) => v.0 = velocity,
                None => warn!(entity = %player, "player without velocity skipped"),
            }
        }
    }

    fn name(&self) -> &str {
        "player_controller"
    }
}

// ---------------------------------------------------------------------------
// ScriptSystem
// ---------------------------------------------------------------------------

/// Drives every [`Script`] with the manager as the task context.
///
/// The driver is moved out of its table slot while it runs, so the script is
/// free to mutate any component, including its own entity's. It is put back
/// only if the entity still holds the idle placeholder afterwards; a script
/// that destroyed its entity or installed a new `Script` is not restored.
#[derive(Default)]
pub struct ScriptSystem {
    scratch: Vec<EntityId>,
}

impl ScriptSystem {
    pub fn new() -> Self {
        Self::default()
    }
}

impl System for ScriptSystem {
    fn update(&mut self, manager: &mut Manager, dt: f32) {
        self.scratch.clear();
        self.scratch.extend_from_slice(manager.view::<Script>().owners());

        for &entity in &self.scratch {
            if !is_active(manager, entity) {
                continue;
            }
            let Some(script) = manager.get_component_mut::<Script>(entity) else {
                continue;
            };
            if !script.driver.is_active() {
                continue;
            }

            let mut driver = std::mem::take(&mut script.driver);
            driver.tick(dt, manager);

            match manager.get_component_mut::<Script>(entity) {
                Some(script) if !script.driver.is_active() => script.driver = driver,
                Some(_) => trace!(entity = %entity, "script replaced itself"),
                None => {}
            }
        }
    }

    fn name(&self) -> &str {
        "scripts"
    }
}

// ---------------------------------------------------------------------------
// MovementSystem
// ---------------------------------------------------------------------------

/// `pos += vel * dt` for every active entity with both components.
#[derive(Default)]
pub struct MovementSystem {
    scratch: Vec<(EntityId, Vec2)>,
}

impl MovementSystem {
    pub fn new() -> Self {
        Self::default()
    }
}

impl System for MovementSystem {
    fn update(&mut self, manager: &mut Manager, dt: f32) {
        self.scratch.clear();
        for (entity, vel) in manager.view::<Velocity>().iter() {
            if is_active(manager, entity) {
                self.scratch.push((entity, vel.0));
            }
        }

        let mut transforms = manager.view_mut::<Transform>();
        for &(entity, vel) in &self.scratch {
            match transforms.get_mut(entity) {
                Some(t) => t.pos += vel * dt,
                None => warn!(entity = %entity, "moving entity without transform skipped"),
            }
        }
    }

    fn name(&self) -> &str {
        "movement"
    }
}

// ---------------------------------------------------------------------------
// WaveSpawnerSystem
// ---------------------------------------------------------------------------

/// Seconds a freshly spawned enemy cannot be damaged.
const SPAWN_INVULNERABILITY: f32 = 0.2;
/// Enemy sprite size in pixels.
const ENEMY_SIZE: f32 = 50.0;
const ENEMY_RADIUS: f32 = 27.0;
const ENEMY_Z: u32 = 9;

/// One ring of enemies requested by the wave script.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaveOrder {
    pub count: u32,
    pub speed: f32,
}

/// Context of the wave script: it queues orders, the spawner carries them out.
#[derive(Debug, Default)]
pub struct WaveOrders {
    pending: Vec<WaveOrder>,
}

impl WaveOrders {
    pub fn push(&mut self, order: WaveOrder) {
        self.pending.push(order);
    }
}

/// Script cycling through `config.counts`, one wave per `config.interval`,
/// each faster than the last by `config.speed_step`.
pub fn wave_script(config: &WaveConfig) -> Task<WaveOrders> {
    let mut script = Sequence::new();
    for (i, &count) in config.counts.iter().enumerate() {
        let order = WaveOrder {
            count,
            speed: config.base_speed + config.speed_step * i as f32,
        };
        script = script.then_wait(config.interval, move |orders: &mut WaveOrders| {
            orders.push(order);
        });
    }
    script.looping().into_task()
}

/// Spawns rings of enemies around the player, steers them at the player and
/// pools the ones whose health runs out.
pub struct WaveSpawnerSystem {
    config: WaveConfig,
    driver: TaskDriver<WaveOrders>,
    orders: WaveOrders,
    /// Deactivated enemies waiting to be revived by the next wave.
    pool: Vec<EntityId>,
    texture: Handle<Texture>,
    /// Speed of the most recent wave; every active enemy moves at it.
    speed: f32,
    rng: Pcg32,
    waves_spawned: u32,
    scratch: Vec<EntityId>,
}

impl WaveSpawnerSystem {
    pub fn new(config: WaveConfig, seed: u64, texture: Handle<Texture>) -> Self {
        let driver = TaskDriver::new(wave_script(&config));
        Self {
            speed: config.base_speed,
            config,
            driver,
            orders: WaveOrders::default(),
            pool: Vec::new(),
            texture,
            rng: Pcg32::seed_from_u64(seed),
            waves_spawned: 0,
            scratch: Vec::new(),
        }
    }

    pub fn waves_spawned(&self) -> u32 {
        self.waves_spawned
    }

    /// Number of pooled (inactive) enemies.
    pub fn pooled(&self) -> usize {
        self.pool.len()
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    fn spawn_wave(&mut self, manager: &mut Manager, order: WaveOrder) {
        self.speed = order.speed;
        self.waves_spawned += 1;
        if order.count == 0 {
            return;
        }

        let center = player_position(manager);
        let jitter = self.config.jitter_degrees;
        let offset = if jitter > 0.0 {
            self.rng.gen_range(-jitter..=jitter)
        } else {
            0.0
        };
        let step = 360.0 / order.count as f32;
        for i in 0..order.count {
            let angle = (step * i as f32 + offset).to_radians();
            let pos = center + Vec2::new(angle.cos(), angle.sin()) * self.config.spawn_radius;
            self.spawn_enemy(manager, pos);
        }
        debug!(
            wave = self.waves_spawned,
            count = order.count,
            speed = order.speed,
            pooled = self.pool.len(),
            "wave spawned"
        );
    }

    /// Revive a pooled enemy at `pos`, or create a new one.
    fn spawn_enemy(&mut self, manager: &mut Manager, pos: Vec2) -> EntityId {
        while let Some(enemy) = self.pool.pop() {
            if !manager.is_alive(enemy) {
                continue;
            }
            manager.add_component(enemy, Active(true));
            if let Some(t) = manager.get_component_mut::<Transform>(enemy) {
                t.pos = pos;
            }
            if let Some(h) = manager.get_component_mut::<Health>(enemy) {
                h.cur = h.max;
                h.invulnerable = SPAWN_INVULNERABILITY;
            }
            trace!(entity = %enemy, "enemy revived from pool");
            return enemy;
        }

        let enemy = manager.create_entity();
        manager.add_component(enemy, EnemyTag);
        manager.add_component(enemy, Active(true));
        manager.add_component(enemy, Transform::at(pos, ENEMY_SIZE, ENEMY_Z));
        manager.add_component(enemy, Velocity::default());
        manager.add_component(
            enemy,
            CircleCollider {
                radius: ENEMY_RADIUS,
            },
        );
        manager.add_component(
            enemy,
            Health {
                invulnerable: SPAWN_INVULNERABILITY,
                ..Health::full(self.config.enemy_health)
            },
        );
        manager.add_component(
            enemy,
            Sprite {
                texture: self.texture,
            },
        );
        trace!(entity = %enemy, "enemy created");
        enemy
    }
}

impl System for WaveSpawnerSystem {
    fn update(&mut self, manager: &mut Manager, dt: f32) {
        self.driver.tick(dt, &mut self.orders);
        let orders = std::mem::take(&mut self.orders.pending);
        for order in orders {
            self.spawn_wave(manager, order);
        }

        let target = player_position(manager);
        self.scratch.clear();
        self.scratch
            .extend_from_slice(manager.view::<EnemyTag>().owners());

        for &enemy in &self.scratch {
            if !is_active(manager, enemy) {
                continue;
            }

            let depleted = manager
                .get_component::<Health>(enemy)
                .is_some_and(Health::is_depleted);
            if depleted {
                manager.add_component(enemy, Active(false));
                if let Some(v) = manager.get_component_mut::<Velocity>(enemy) {
                    v.0 = Vec2::ZERO;
                }
                self.pool.push(enemy);
                trace!(entity = %enemy, "enemy pooled");
                continue;
            }

            let Some(pos) = manager.get_component::<Transform>(enemy).map(|t| t.pos) else {
                warn!(entity = %enemy, "enemy without transform skipped");
                continue;
            };
            if let Some(v) = manager.get_component_mut::<Velocity>(enemy) {
                v.0 = (target - pos).normalize_or_zero() * self.speed;
            }
        }
    }

    fn name(&self) -> &str {
        "wave_spawner"
    }
}

// ---------------------------------------------------------------------------
// WeaponSystem
// ---------------------------------------------------------------------------

/// Projectiles draw above the player and below enemies.
const PROJECTILE_Z: u32 = 5;

/// Script adding one pending shot per `interval`.
pub fn fire_script(interval: f32) -> Task<u32> {
    Sequence::new()
        .then_wait(interval, |shots: &mut u32| *shots += 1)
        .looping()
        .into_task()
}

/// Fires piercing projectiles from the player at the nearest living enemy.
/// A shot with no target is dropped.
pub struct WeaponSystem {
    config: WeaponConfig,
    driver: TaskDriver<u32>,
    pending: u32,
    texture: Handle<Texture>,
    shots_fired: u32,
}

impl WeaponSystem {
    pub fn new(config: WeaponConfig, texture: Handle<Texture>) -> Self {
        Self {
            driver: TaskDriver::new(fire_script(config.fire_interval)),
            config,
            pending: 0,
            texture,
            shots_fired: 0,
        }
    }

    pub fn shots_fired(&self) -> u32 {
        self.shots_fired
    }

    fn nearest_enemy(manager: &Manager, from: Vec2) -> Option<Vec2> {
        manager
            .view::<EnemyTag>()
            .owners()
            .iter()
            .filter(|&&e| is_active(manager, e))
            .filter(|&&e| {
                !manager
                    .get_component::<Health>(e)
                    .is_some_and(Health::is_depleted)
            })
            .filter_map(|&e| manager.get_component::<Transform>(e).map(|t| t.pos))
            .min_by(|a, b| a.distance_squared(from).total_cmp(&b.distance_squared(from)))
    }

    fn fire(&mut self, manager: &mut Manager, from: Vec2, target: Vec2) -> EntityId {
        let dir = (target - from).normalize_or_zero();
        let radius = self.config.projectile_radius;

        let shot = manager.create_entity();
        manager.add_component(shot, Active(true));
        manager.add_component(shot, Transform::at(from, radius * 2.0, PROJECTILE_Z));
        manager.add_component(shot, Velocity(dir * self.config.projectile_speed));
        manager.add_component(shot, CircleCollider { radius });
        manager.add_component(
            shot,
            DamageDealer {
                amount: self.config.damage,
            },
        );
        manager.add_component(
            shot,
            Pierce {
                count: self.config.pierce,
            },
        );
        manager.add_component(
            shot,
            Lifetime {
                remaining: self.config.projectile_lifetime,
            },
        );
        manager.add_component(
            shot,
            Sprite {
                texture: self.texture,
            },
        );
        self.shots_fired += 1;
        trace!(entity = %shot, "projectile fired");
        shot
    }
}

impl System for WeaponSystem {
    fn update(&mut self, manager: &mut Manager, dt: f32) {
        self.driver.tick(dt, &mut self.pending);
        let shots = std::mem::take(&mut self.pending);
        if shots == 0 {
            return;
        }

        let Some(&player) = manager.view::<PlayerTag>().owners().first() else {
            return;
        };
        if !is_active(manager, player) {
            return;
        }
        let Some(from) = manager.get_component::<Transform>(player).map(|t| t.pos) else {
            return;
        };

        for _ in 0..shots {
            match Self::nearest_enemy(manager, from) {
                Some(target) => {
                    self.fire(manager, from, target);
                }
                None => trace!("no target, shot dropped"),
            }
        }
    }

    fn name(&self) -> &str {
        "weapon"
    }
}

// ---------------------------------------------------------------------------
// DamageSystem
// ---------------------------------------------------------------------------

/// Seconds a hit entity cannot be hit again.
const HIT_INVULNERABILITY: f32 = 0.2;

/// Counts down invulnerability and applies [`DamageDealer`] hits to
/// overlapping [`Health`] entities.
///
/// A dealer whose [`Pierce`] runs out is destroyed through the deferred
/// queue, after this pass.
#[derive(Default)]
pub struct DamageSystem {
    living: Vec<EntityId>,
    targets: Vec<(EntityId, Vec2, f32)>,
    dealers: Vec<(EntityId, Vec2, f32, f32)>,
}

impl DamageSystem {
    pub fn new() -> Self {
        Self::default()
    }
}

impl System for DamageSystem {
    fn update(&mut self, manager: &mut Manager, dt: f32) {
        self.living.clear();
        self.targets.clear();
        self.dealers.clear();

        for &entity in manager.view::<Health>().owners() {
            if !is_active(manager, entity) {
                continue;
            }
            self.living.push(entity);
            if let (Some(c), Some(t)) = (
                manager.get_component::<CircleCollider>(entity),
                manager.get_component::<Transform>(entity),
            ) {
                self.targets.push((entity, t.pos, c.radius));
            }
        }
        for (entity, dealer) in manager.view::<DamageDealer>().iter() {
            if !is_active(manager, entity) {
                continue;
            }
            if let (Some(c), Some(t)) = (
                manager.get_component::<CircleCollider>(entity),
                manager.get_component::<Transform>(entity),
            ) {
                self.dealers.push((entity, t.pos, c.radius, dealer.amount));
            }
        }

        let mut healths = manager.view_mut::<Health>();
        for &entity in &self.living {
            if let Some(hp) = healths.get_mut(entity) {
                hp.invulnerable = (hp.invulnerable - dt).max(0.0);
            }
        }

        for &(dealer, pos, radius, amount) in &self.dealers {
            for &(target, target_pos, target_radius) in &self.targets {
                if target == dealer || pos.distance(target_pos) >= radius + target_radius {
                    continue;
                }
                let Some(hp) = manager.get_component_mut::<Health>(target) else {
                    continue;
                };
                if hp.invulnerable > 0.0 {
                    continue;
                }
                hp.cur -= amount;
                hp.invulnerable = HIT_INVULNERABILITY;
                trace!(dealer = %dealer, target = %target, hp = hp.cur, "hit");

                if let Some(pierce) = manager.get_component_mut::<Pierce>(dealer) {
                    pierce.count = pierce.count.saturating_sub(1);
                    if pierce.count == 0 {
                        manager.defer_destroy(dealer);
                        break;
                    }
                }
            }
        }
    }

    fn name(&self) -> &str {
        "damage"
    }
}

// ---------------------------------------------------------------------------
// LifetimeSystem
// ---------------------------------------------------------------------------

/// Counts down every active [`Lifetime`] and destroys what expires.
#[derive(Default)]
pub struct LifetimeSystem {
    scratch: Vec<EntityId>,
    expired: Vec<EntityId>,
}

impl LifetimeSystem {
    pub fn new() -> Self {
        Self::default()
    }
}

impl System for LifetimeSystem {
    fn update(&mut self, manager: &mut Manager, dt: f32) {
        self.scratch.clear();
        self.expired.clear();
        for &entity in manager.view::<Lifetime>().owners() {
            if is_active(manager, entity) {
                self.scratch.push(entity);
            }
        }

        let mut lifetimes = manager.view_mut::<Lifetime>();
        for &entity in &self.scratch {
            if let Some(lifetime) = lifetimes.get_mut(entity) {
                lifetime.remaining -= dt;
                if lifetime.remaining <= 0.0 {
                    self.expired.push(entity);
                }
            }
        }

        for &entity in &self.expired {
            if let Err(e) = manager.destroy_entity(entity) {
                warn!(error = %e, "expired entity already gone");
            }
        }
    }

    fn name(&self) -> &str {
        "lifetime"
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::input::KeyState;
    use crate::scripts::square_patrol;
    use crate::config::PatrolConfig;

    fn register_all(manager: &mut Manager) {
        manager.register_component::<Transform>();
        manager.register_component::<Velocity>();
        manager.register_component::<Active>();
        manager.register_component::<Health>();
        manager.register_component::<PlayerTag>();
        manager.register_component::<EnemyTag>();
        manager.register_component::<Sprite>();
        manager.register_component::<Script>();
        manager.register_component::<CircleCollider>();
        manager.register_component::<DamageDealer>();
        manager.register_component::<Pierce>();
        manager.register_component::<Lifetime>();
    }

    fn spawn_player(manager: &mut Manager, pos: Vec2) -> EntityId {
        let player = manager.create_entity();
        manager.add_component(player, PlayerTag);
        manager.add_component(player, Transform::at(pos, 100.0, 2));
        manager.add_component(player, Velocity::default());
        player
    }

    fn wave_config() -> WaveConfig {
        WaveConfig {
            spawn_radius: 100.0,
            base_speed: 10.0,
            speed_step: 5.0,
            counts: vec![4, 2],
            interval: 1.0,
            enemy_health: 30.0,
            jitter_degrees: 0.0,
        }
    }

    fn approx(a: Vec2, b: Vec2) -> bool {
        (a - b).length() < 1e-3
    }

    // -- controller ---------------------------------------------------------

    #[test]
    fn controller_normalizes_diagonals() {
        let keys = Rc::new(KeyState::new());
        let mut manager = Manager::new();
        register_all(&mut manager);
        let player = spawn_player(&mut manager, Vec2::ZERO);
        manager.register_system(PlayerControllerSystem::new(Rc::clone(&keys), 300.0));

        keys.press(Key::Up);
        keys.press(Key::Right);
        manager.step(0.016);

        let v = manager.get_component::<Velocity>(player).unwrap().0;
        assert!((v.length() - 300.0).abs() < 1e-3);
        assert!(v.x > 0.0 && v.y < 0.0);

        keys.release_all();
        manager.step(0.016);
        assert_eq!(manager.get_component::<Velocity>(player).unwrap().0, Vec2::ZERO);
    }

    #[test]
    fn opposing_keys_cancel() {
        let keys = Rc::new(KeyState::new());
        keys.press(Key::Left);
        keys.press(Key::Right);
        let controller = PlayerControllerSystem::new(keys, 1.0);
        assert_eq!(controller.direction(), Vec2::ZERO);
    }

    // -- movement -----------------------------------------------------------

    #[test]
    fn movement_integrates_active_entities_only() {
        let mut manager = Manager::new();
        register_all(&mut manager);
        manager.register_system(MovementSystem::new());

        let moving = manager.create_entity();
        manager.add_component(moving, Transform::default());
        manager.add_component(moving, Velocity(Vec2::new(10.0, -4.0)));

        let frozen = manager.create_entity();
        manager.add_component(frozen, Transform::default());
        manager.add_component(frozen, Velocity(Vec2::new(10.0, 0.0)));
        manager.add_component(frozen, Active(false));

        let no_transform = manager.create_entity();
        manager.add_component(no_transform, Velocity(Vec2::ONE));

        manager.step(0.5);

        assert_eq!(
            manager.get_component::<Transform>(moving).unwrap().pos,
            Vec2::new(5.0, -2.0)
        );
        assert_eq!(manager.get_component::<Transform>(frozen).unwrap().pos, Vec2::ZERO);
    }

    // -- scripts ------------------------------------------------------------

    #[test]
    fn script_system_drives_patrol_with_movement() {
        let mut manager = Manager::new();
        register_all(&mut manager);
        manager.register_system(ScriptSystem::new());
        manager.register_system(MovementSystem::new());

        let mob = manager.create_entity();
        manager.add_component(mob, Transform::default());
        manager.add_component(mob, Velocity::default());
        let patrol = PatrolConfig {
            move_time: 2.0,
            wait_time: 3.0,
            speed: 10.0,
        };
        manager.add_component(mob, Script::new(square_patrol(mob, patrol)));

        // Moves right for two steps, then waits three.
        for _ in 0..5 {
            manager.step(1.0);
        }
        assert_eq!(
            manager.get_component::<Transform>(mob).unwrap().pos,
            Vec2::new(20.0, 0.0)
        );

        // Then moves down.
        manager.step(1.0);
        assert_eq!(
            manager.get_component::<Transform>(mob).unwrap().pos,
            Vec2::new(20.0, 10.0)
        );
    }

    #[test]
    fn script_finished_by_lost_velocity_stops_running() {
        let mut manager = Manager::new();
        register_all(&mut manager);
        manager.register_system(ScriptSystem::new());

        let mob = manager.create_entity();
        manager.add_component(mob, Velocity::default());
        manager.add_component(
            mob,
            Script::new(square_patrol(mob, PatrolConfig::default())),
        );
        manager.step(0.1);
        manager.remove_component::<Velocity>(mob);
        for _ in 0..40 {
            manager.step(0.1);
        }

        let script = manager.get_component::<Script>(mob).unwrap();
        assert!(script.driver.task().is_finished());
        assert!(!script.driver.is_active());
    }

    #[test]
    fn script_that_destroys_its_entity_is_dropped() {
        let mut manager = Manager::new();
        register_all(&mut manager);
        manager.register_system(ScriptSystem::new());

        let e = manager.create_entity();
        let task = Task::new(move |m: &mut Manager| {
            m.destroy_entity(e).unwrap();
            mip_ecs::task::Step::Done
        });
        manager.add_component(e, Script::new(task));

        manager.step(0.1);
        assert!(!manager.is_alive(e));
        assert!(manager.view::<Script>().is_empty());
    }

    #[test]
    fn script_that_replaces_itself_keeps_the_replacement() {
        let mut manager = Manager::new();
        register_all(&mut manager);
        manager.register_system(ScriptSystem::new());

        let e = manager.create_entity();
        manager.add_component(e, Velocity::default());
        let task = Task::new(move |m: &mut Manager| {
            let next = Task::new(move |m: &mut Manager| {
                if let Some(v) = m.get_component_mut::<Velocity>(e) {
                    v.0.x += 1.0;
                }
                mip_ecs::task::Step::Wait(1.0)
            });
            m.add_component(e, Script::new(next));
            mip_ecs::task::Step::Wait(1.0)
        });
        manager.add_component(e, Script::new(task));

        manager.step(0.1);
        assert!(manager.get_component::<Script>(e).unwrap().driver.is_active());
        manager.step(0.1);
        assert_eq!(manager.get_component::<Velocity>(e).unwrap().0.x, 1.0);
    }

    #[test]
    fn inactive_script_is_not_resumed() {
        let mut manager = Manager::new();
        register_all(&mut manager);
        manager.register_system(ScriptSystem::new());

        let mob = manager.create_entity();
        manager.add_component(mob, Velocity::default());
        manager.add_component(mob, Active(false));
        manager.add_component(
            mob,
            Script::new(square_patrol(mob, PatrolConfig::default())),
        );

        manager.step(0.1);
        assert_eq!(manager.get_component::<Velocity>(mob).unwrap().0, Vec2::ZERO);
        let driver = &manager.get_component::<Script>(mob).unwrap().driver;
        assert_eq!(driver.countdown(), 0.0);
    }

    // -- wave spawner -------------------------------------------------------

    fn spawner_manager() -> (Manager, EntityId) {
        let mut manager = Manager::new();
        register_all(&mut manager);
        let player = spawn_player(&mut manager, Vec2::new(50.0, 50.0));
        manager.register_system(WaveSpawnerSystem::new(wave_config(), 1, Handle::invalid()));
        (manager, player)
    }

    fn enemies(manager: &Manager) -> Vec<EntityId> {
        manager.view::<EnemyTag>().owners().to_vec()
    }

    #[test]
    fn first_wave_rings_the_player() {
        let (mut manager, _player) = spawner_manager();
        manager.step(0.1);

        let spawned = enemies(&manager);
        assert_eq!(spawned.len(), 4);
        let center = Vec2::new(50.0, 50.0);
        let expected = [
            Vec2::new(150.0, 50.0),
            Vec2::new(50.0, 150.0),
            Vec2::new(-50.0, 50.0),
            Vec2::new(50.0, -50.0),
        ];
        for (enemy, want) in spawned.iter().zip(expected) {
            let t = manager.get_component::<Transform>(*enemy).unwrap();
            assert!(approx(t.pos, want), "{:?} != {:?}", t.pos, want);
            let v = manager.get_component::<Velocity>(*enemy).unwrap().0;
            assert!(approx(v, (center - t.pos).normalize() * 10.0));
        }
    }

    #[test]
    fn waves_cycle_and_speed_up() {
        let (mut manager, _player) = spawner_manager();
        // The countdown reloads to the full interval after each resume.
        manager.step(0.5);
        manager.step(0.5);
        assert_eq!(manager.system::<WaveSpawnerSystem>().unwrap().waves_spawned(), 1);
        manager.step(0.5);
        let spawner = manager.system::<WaveSpawnerSystem>().unwrap();
        assert_eq!(spawner.waves_spawned(), 2);
        assert_eq!(spawner.speed(), 15.0);
        assert_eq!(enemies(&manager).len(), 6);

        manager.step(1.0);
        let spawner = manager.system::<WaveSpawnerSystem>().unwrap();
        assert_eq!(spawner.waves_spawned(), 3);
        assert_eq!(spawner.speed(), 10.0);
        assert_eq!(enemies(&manager).len(), 10);
    }

    #[test]
    fn depleted_enemies_are_pooled_and_revived() {
        let (mut manager, _player) = spawner_manager();
        manager.step(0.5);
        let first_wave = enemies(&manager);
        for &e in &first_wave[..2] {
            manager.get_component_mut::<Health>(e).unwrap().cur = 0.0;
        }

        manager.step(0.25);
        assert_eq!(manager.system::<WaveSpawnerSystem>().unwrap().pooled(), 2);
        for &e in &first_wave[..2] {
            assert_eq!(manager.get_component::<Active>(e), Some(&Active(false)));
        }

        // The second wave (two enemies) reuses both pooled entities.
        manager.step(0.75);
        assert_eq!(enemies(&manager).len(), 4);
        assert_eq!(manager.system::<WaveSpawnerSystem>().unwrap().pooled(), 0);
        for &e in &first_wave[..2] {
            assert_eq!(manager.get_component::<Active>(e), Some(&Active(true)));
            let h = manager.get_component::<Health>(e).unwrap();
            assert_eq!(h.cur, h.max);
            assert_eq!(h.invulnerable, SPAWN_INVULNERABILITY);
        }
    }

    #[test]
    fn jitter_is_reproducible_per_seed() {
        let positions = |seed: u64| {
            let mut config = wave_config();
            config.jitter_degrees = 30.0;
            let mut manager = Manager::new();
            register_all(&mut manager);
            spawn_player(&mut manager, Vec2::ZERO);
            manager.register_system(WaveSpawnerSystem::new(config, seed, Handle::invalid()));
            manager.step(0.1);
            enemies(&manager)
                .iter()
                .map(|&e| manager.get_component::<Transform>(e).unwrap().pos)
                .collect::<Vec<_>>()
        };

        assert_eq!(positions(42), positions(42));
        let ring = positions(7);
        assert_eq!(ring.len(), 4);
        for pos in ring {
            assert!((pos.length() - 100.0).abs() < 1e-2);
        }
    }

    // -- weapon, damage, lifetime --------------------------------------------

    fn weapon_config() -> WeaponConfig {
        WeaponConfig {
            fire_interval: 1.0,
            projectile_speed: 100.0,
            projectile_radius: 5.0,
            projectile_lifetime: 3.0,
            damage: 10.0,
            pierce: 2,
        }
    }

    fn target(manager: &mut Manager, pos: Vec2, hp: f32) -> EntityId {
        let e = manager.create_entity();
        manager.add_component(e, EnemyTag);
        manager.add_component(e, Transform::at(pos, ENEMY_SIZE, ENEMY_Z));
        manager.add_component(e, CircleCollider { radius: 10.0 });
        manager.add_component(e, Health::full(hp));
        e
    }

    fn projectile(manager: &mut Manager, pos: Vec2, pierce: u32) -> EntityId {
        let e = manager.create_entity();
        manager.add_component(e, Transform::at(pos, 10.0, PROJECTILE_Z));
        manager.add_component(e, CircleCollider { radius: 5.0 });
        manager.add_component(e, DamageDealer { amount: 10.0 });
        manager.add_component(e, Pierce { count: pierce });
        e
    }

    #[test]
    fn weapon_aims_at_nearest_living_enemy() {
        let mut manager = Manager::new();
        register_all(&mut manager);
        spawn_player(&mut manager, Vec2::ZERO);
        let far = target(&mut manager, Vec2::new(0.0, 300.0), 30.0);
        let dead = target(&mut manager, Vec2::new(50.0, 0.0), 30.0);
        manager.get_component_mut::<Health>(dead).unwrap().cur = 0.0;
        let near = target(&mut manager, Vec2::new(-100.0, 0.0), 30.0);
        manager.register_system(WeaponSystem::new(weapon_config(), Handle::invalid()));

        manager.step(0.1);
        assert_eq!(manager.system::<WeaponSystem>().unwrap().shots_fired(), 1);
        let shot = manager.view::<DamageDealer>().owners()[0];
        assert_eq!(manager.get_component::<Velocity>(shot).unwrap().0, Vec2::new(-100.0, 0.0));
        assert_eq!(manager.get_component::<Pierce>(shot), Some(&Pierce { count: 2 }));

        // Nothing left to aim at: the next shot is dropped.
        manager.destroy_entity(near).unwrap();
        manager.destroy_entity(far).unwrap();
        manager.step(1.0);
        assert_eq!(manager.system::<WeaponSystem>().unwrap().shots_fired(), 1);
    }

    #[test]
    fn hit_costs_health_and_grants_invulnerability() {
        let mut manager = Manager::new();
        register_all(&mut manager);
        manager.register_system(DamageSystem::new());
        let enemy = target(&mut manager, Vec2::ZERO, 30.0);
        projectile(&mut manager, Vec2::new(12.0, 0.0), 5);

        manager.step(0.05);
        let hp = *manager.get_component::<Health>(enemy).unwrap();
        assert_eq!(hp.cur, 20.0);
        assert_eq!(hp.invulnerable, HIT_INVULNERABILITY);

        // Still overlapping, but invulnerable for the next few steps.
        manager.step(0.05);
        assert_eq!(manager.get_component::<Health>(enemy).unwrap().cur, 20.0);
        for _ in 0..4 {
            manager.step(0.05);
        }
        assert_eq!(manager.get_component::<Health>(enemy).unwrap().cur, 10.0);
    }

    #[test]
    fn spent_projectile_is_destroyed_after_the_pass() {
        let mut manager = Manager::new();
        register_all(&mut manager);
        manager.register_system(DamageSystem::new());
        let a = target(&mut manager, Vec2::ZERO, 30.0);
        let b = target(&mut manager, Vec2::new(5.0, 0.0), 30.0);
        let shot = projectile(&mut manager, Vec2::new(2.0, 0.0), 1);

        manager.step(0.05);
        assert!(!manager.is_alive(shot));
        assert!(manager.view::<DamageDealer>().is_empty());
        // Only the first target in table order was hit.
        assert_eq!(manager.get_component::<Health>(a).unwrap().cur, 20.0);
        assert_eq!(manager.get_component::<Health>(b).unwrap().cur, 30.0);
    }

    #[test]
    fn inactive_entities_neither_deal_nor_take_damage() {
        let mut manager = Manager::new();
        register_all(&mut manager);
        manager.register_system(DamageSystem::new());
        let pooled = target(&mut manager, Vec2::ZERO, 30.0);
        manager.add_component(pooled, Active(false));
        let live = target(&mut manager, Vec2::new(100.0, 0.0), 30.0);
        let shot = projectile(&mut manager, Vec2::ZERO, 1);
        let idle = projectile(&mut manager, Vec2::new(100.0, 0.0), 1);
        manager.add_component(idle, Active(false));

        manager.step(0.05);
        assert_eq!(manager.get_component::<Health>(pooled).unwrap().cur, 30.0);
        assert_eq!(manager.get_component::<Health>(live).unwrap().cur, 30.0);
        assert!(manager.is_alive(shot));
        assert!(manager.is_alive(idle));
    }

    #[test]
    fn lifetime_expiry_destroys_entity() {
        let mut manager = Manager::new();
        register_all(&mut manager);
        manager.register_system(LifetimeSystem::new());
        let short = manager.create_entity();
        manager.add_component(short, Lifetime { remaining: 0.15 });
        let frozen = manager.create_entity();
        manager.add_component(frozen, Lifetime { remaining: 0.05 });
        manager.add_component(frozen, Active(false));

        manager.step(0.1);
        assert!(manager.is_alive(short));
        manager.step(0.1);
        assert!(!manager.is_alive(short));
        assert!(manager.is_alive(frozen));
        assert_eq!(manager.view::<Lifetime>().len(), 1);
    }

    #[test]
    fn wave_script_queues_one_order_per_interval() {
        let config = wave_config();
        let mut driver = TaskDriver::new(wave_script(&config));
        let mut orders = WaveOrders::default();

        driver.start(&mut orders);
        assert_eq!(orders.pending, vec![WaveOrder { count: 4, speed: 10.0 }]);
        driver.tick(0.5, &mut orders);
        assert_eq!(orders.pending.len(), 1);
        driver.tick(0.5, &mut orders);
        assert_eq!(orders.pending[1], WaveOrder { count: 2, speed: 15.0 });
    }
}
