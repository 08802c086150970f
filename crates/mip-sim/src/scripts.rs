//! Scripted mob behaviors, run by [`ScriptSystem`](crate::systems::ScriptSystem).

use glam::Vec2;
use mip_ecs::entity::EntityId;
use mip_ecs::manager::Manager;
use mip_ecs::task::{Sequence, Step, Task};

use crate::components::Velocity;
use crate::config::PatrolConfig;

/// Walk a square forever: right, down, left, up, pausing at each corner.
///
/// Each of the eight legs sets the entity's velocity and waits. The task
/// completes at the first leg that finds the entity without a [`Velocity`].
pub fn square_patrol(entity: EntityId, config: PatrolConfig) -> Task<Manager> {
    let s = config.speed;
    let sides = [
        Vec2::new(s, 0.0),
        Vec2::new(0.0, s),
        Vec2::new(-s, 0.0),
        Vec2::new(0.0, -s),
    ];

    let mut patrol = Sequence::new();
    for side in sides {
        patrol = patrol
            .then(set_velocity(entity, side, config.move_time))
            .then(set_velocity(entity, Vec2::ZERO, config.wait_time));
    }
    patrol.looping().into_task()
}

fn set_velocity(
    entity: EntityId,
    velocity: Vec2,
    hold: f32,
) -> impl FnMut(&mut Manager) -> Step + 'static {
    move |manager: &mut Manager| match manager.get_component_mut::<Velocity>(entity) {
        Some(v) => {
            v.0 = velocity;
            Step::Wait(hold)
        }
        None => Step::Done,
    }
}
