//! Navigation capability consumed by the AI core.
//!
//! The core only asks "move toward point X"; how a path is computed belongs to
//! the navigator. `NavAgent` is the per-entity request surface and
//! `NavSampler` optionally snaps points onto navigable space.

use bevy_ecs::prelude::*;
use glam::Vec3;

/// Per-entity navigator handle.
#[derive(Component, Debug, Clone)]
pub struct NavAgent {
    /// Last requested destination.
    pub destination: Option<Vec3>,
    /// Movement speed in units per second.
    pub speed: f32,
    /// When false the navigator does not steer (e.g. during knockback).
    pub steering: bool,
    /// Teleport request applied by the steering system on the next tick.
    pub pending_warp: Option<Vec3>,
    /// False while the navigator cannot accept requests.
    pub ready: bool,
}

impl NavAgent {
    pub fn new(speed: f32) -> Self {
        Self {
            destination: None,
            speed,
            steering: true,
            pending_warp: None,
            ready: true,
        }
    }

    pub fn set_destination(&mut self, point: Vec3) {
        self.destination = Some(point);
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn warp(&mut self, point: Vec3) {
        self.pending_warp = Some(point);
    }
}

impl Default for NavAgent {
    fn default() -> Self {
        Self::new(3.5)
    }
}

/// Snaps world points onto navigable space.
pub trait NavMeshSampler: Send + Sync {
    /// Closest navigable point within `max_radius` of `point`, if any.
    fn sample_position(&self, point: Vec3, max_radius: f32) -> Option<Vec3>;
}

/// Shared navigable-space sampler. Empty means "use points directly".
#[derive(Resource, Default)]
pub struct NavSampler(pub Option<Box<dyn NavMeshSampler>>);

impl NavSampler {
    pub fn new(sampler: impl NavMeshSampler + 'static) -> Self {
        Self(Some(Box::new(sampler)))
    }

    pub fn sample(&self, point: Vec3, max_radius: f32) -> Option<Vec3> {
        self.0.as_ref().and_then(|s| s.sample_position(point, max_radius))
    }

    /// Snap if possible, otherwise fall back to the raw point.
    pub fn snap_or_raw(&self, point: Vec3, max_radius: f32) -> Vec3 {
        self.sample(point, max_radius).unwrap_or(point)
    }

    pub fn is_available(&self) -> bool {
        self.0.is_some()
    }
}

/// Axis-aligned navigable rectangle on the ground plane (y = `ground`).
#[derive(Debug, Clone, Copy)]
pub struct BoundsSampler {
    pub min_x: f32,
    pub max_x: f32,
    pub min_z: f32,
    pub max_z: f32,
    pub ground: f32,
}

impl NavMeshSampler for BoundsSampler {
    fn sample_position(&self, point: Vec3, max_radius: f32) -> Option<Vec3> {
        let snapped = Vec3::new(
            point.x.clamp(self.min_x, self.max_x),
            self.ground,
            point.z.clamp(self.min_z, self.max_z),
        );
        if snapped.distance(point) <= max_radius {
            Some(snapped)
        } else {
            None
        }
    }
}
