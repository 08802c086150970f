//! Fixed-timestep simulation runner.
//!
//! Each [`tick`](Simulation::tick) steps the scene's manager by exactly
//! `config.fixed_dt`. Simulation time is derived from the tick count rather
//! than accumulated, so it does not drift.

use std::cell::RefCell;
use std::rc::Rc;

use mip_ecs::entity::EntityId;
use mip_ecs::manager::Manager;

use crate::config::SimConfig;
use crate::error::SimError;
use crate::input::InputSource;
use crate::render::Renderer;
use crate::scene::Scene;

#[derive(Debug)]
pub struct Simulation {
    scene: Scene,
    config: SimConfig,
    tick_count: u64,
}

impl Simulation {
    /// Wrap an initialized scene.
    ///
    /// # Panics
    ///
    /// Panics if `config.fixed_dt` is not positive and finite.
    pub fn new(scene: Scene, config: SimConfig) -> Self {
        assert!(
            config.fixed_dt > 0.0 && config.fixed_dt.is_finite(),
            "fixed_dt must be positive and finite, got {}",
            config.fixed_dt
        );
        Self {
            scene,
            config,
            tick_count: 0,
        }
    }

    /// Validate `config`, build its scene and wrap it.
    pub fn from_config<R, I>(
        config: SimConfig,
        renderer: Rc<RefCell<R>>,
        input: I,
    ) -> Result<Self, SimError>
    where
        R: Renderer + 'static,
        I: InputSource + 'static,
    {
        config.validate()?;
        let scene = Scene::init(&config, renderer, input)?;
        Ok(Self::new(scene, config))
    }

    /// Advance one fixed step.
    pub fn tick(&mut self) {
        self.scene.manager_mut().step(self.config.fixed_dt);
        self.tick_count += 1;
    }

    pub fn run_ticks(&mut self, n: u64) {
        for _ in 0..n {
            self.tick();
        }
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Seconds of simulated time.
    pub fn sim_time(&self) -> f64 {
        self.tick_count as f64 * f64::from(self.config.fixed_dt)
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn player(&self) -> EntityId {
        self.scene.player()
    }

    pub fn manager(&self) -> &Manager {
        self.scene.manager()
    }

    pub fn manager_mut(&mut self) -> &mut Manager {
        self.scene.manager_mut()
    }
}
