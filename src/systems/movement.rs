//! Movement - straight-line nav steering and knockback motion.
//!
//! This is a stand-in navigator so the core runs on its own; it moves agents
//! directly toward their destination without any pathfinding.

use crate::components::*;
use crate::navigation::NavAgent;
use bevy_ecs::prelude::*;
use glam::Vec3;

/// Resource containing the delta time for the current tick.
#[derive(Resource, Default)]
pub struct DeltaTime(pub f32);

/// Distance at which an agent counts as arrived.
const ARRIVAL_DISTANCE: f32 = 0.1;

/// Exponential damping rate for knockback velocity (per second).
const KNOCKBACK_DAMPING: f32 = 6.0;

/// System that applies pending warps and steers agents to their destination.
pub fn nav_steering_system(dt: Res<DeltaTime>, mut query: Query<(&mut Position, &mut NavAgent), Without<Inactive>>) {
    let delta = dt.0;
    for (mut pos, mut agent) in query.iter_mut() {
        if let Some(point) = agent.pending_warp.take() {
            pos.0 = point;
        }
        if !agent.steering || !agent.ready {
            continue;
        }
        let Some(destination) = agent.destination else {
            continue;
        };

        let to_goal = destination - pos.0;
        let dist = to_goal.length();
        if dist <= ARRIVAL_DISTANCE {
            continue;
        }
        let step = agent.speed * delta;
        if step >= dist {
            pos.0 = destination;
        } else {
            pos.0 += to_goal / dist * step;
        }
    }
}

/// System that moves knocked-back bodies by their velocity.
/// Bodies under steering have their velocity zeroed.
pub fn knockback_motion_system(
    dt: Res<DeltaTime>,
    mut query: Query<(&mut Position, &mut Velocity, &NavAgent), Without<Inactive>>,
) {
    let delta = dt.0;
    let damping = (-KNOCKBACK_DAMPING * delta).exp();
    for (mut pos, mut vel, agent) in query.iter_mut() {
        if agent.steering {
            if vel.0 != Vec3::ZERO {
                vel.0 = Vec3::ZERO;
            }
            continue;
        }
        pos.0 += vel.0 * delta;
        vel.0 *= damping;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_steering_moves_toward_destination() {
        let mut world = World::new();
        world.insert_resource(DeltaTime(1.0));

        let mut agent = NavAgent::new(2.0);
        agent.set_destination(Vec3::new(10.0, 0.0, 0.0));
        let e = world.spawn((Position::new(0.0, 0.0, 0.0), agent)).id();

        let mut schedule = Schedule::default();
        schedule.add_systems(nav_steering_system);
        schedule.run(&mut world);

        let pos = world.get::<Position>(e).unwrap();
        assert!((pos.0.x - 2.0).abs() < 0.001);
    }

    #[test]
    fn test_steering_does_not_overshoot() {
        let mut world = World::new();
        world.insert_resource(DeltaTime(1.0));

        let mut agent = NavAgent::new(20.0);
        agent.set_destination(Vec3::new(3.0, 0.0, 4.0));
        let e = world.spawn((Position::new(0.0, 0.0, 0.0), agent)).id();

        let mut schedule = Schedule::default();
        schedule.add_systems(nav_steering_system);
        schedule.run(&mut world);

        assert_eq!(world.get::<Position>(e).unwrap().0, Vec3::new(3.0, 0.0, 4.0));
    }

    #[test]
    fn test_warp_and_suspended_steering() {
        let mut world = World::new();
        world.insert_resource(DeltaTime(0.5));

        let mut agent = NavAgent::new(2.0);
        agent.set_destination(Vec3::new(10.0, 0.0, 0.0));
        agent.steering = false;
        agent.warp(Vec3::new(1.0, 0.0, 1.0));
        let e = world
            .spawn((Position::new(0.0, 0.0, 0.0), agent, Velocity(Vec3::new(0.0, 0.0, 4.0))))
            .id();

        let mut schedule = Schedule::default();
        schedule.add_systems((nav_steering_system, knockback_motion_system).chain());
        schedule.run(&mut world);

        let pos = world.get::<Position>(e).unwrap().0;
        assert!((pos - Vec3::new(1.0, 0.0, 3.0)).length() < 0.001);
        assert!(world.get::<Velocity>(e).unwrap().magnitude() < 4.0);
        assert!(world.get::<NavAgent>(e).unwrap().pending_warp.is_none());
    }
}
