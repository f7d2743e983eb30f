//! Path geometry queries used by formation following.
//!
//! The core never evaluates path geometry itself; it talks to a `PathQuery`.
//! `PolylinePath` is a simple arc-length parameterised implementation so the
//! simulation can run without an external spline library.

use glam::Vec3;

/// Geometry service over a path parameterised on `[0, 1]`.
pub trait PathQuery: Send + Sync {
    /// World position at parameter `t`.
    fn position_at(&self, t: f32) -> Vec3;

    /// Normalized forward tangent at parameter `t`.
    fn tangent_at(&self, t: f32) -> Vec3;

    /// Parameter of the path point closest to `world_pos`.
    fn nearest_param(&self, world_pos: Vec3) -> f32;

    /// Total path length in world units.
    fn length(&self) -> f32;

    /// Parameter reached by travelling `world_distance` along the path from `t`.
    /// Negative distances travel backward. The result is clamped to `[0, 1]`.
    fn offset_param(&self, t: f32, world_distance: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        let length = self.length();
        if length <= 0.0 {
            return t;
        }
        (t + world_distance / length).clamp(0.0, 1.0)
    }

    /// Convert a world distance to a parameter delta.
    fn distance_to_param(&self, distance: f32) -> f32 {
        let length = self.length();
        if length <= 0.0 {
            0.0
        } else {
            distance / length
        }
    }
}

/// Piecewise-linear path with arc-length parameterisation.
#[derive(Debug, Clone)]
pub struct PolylinePath {
    points: Vec<Vec3>,
    /// Cumulative length at each point; `cumulative[0] == 0`.
    cumulative: Vec<f32>,
}

impl PolylinePath {
    pub fn new(points: Vec<Vec3>) -> Self {
        let mut cumulative = Vec::with_capacity(points.len());
        let mut total = 0.0;
        for (i, p) in points.iter().enumerate() {
            if i > 0 {
                total += p.distance(points[i - 1]);
            }
            cumulative.push(total);
        }
        Self { points, cumulative }
    }

    /// Segment index and local fraction for an arc-length distance.
    fn locate(&self, distance: f32) -> (usize, f32) {
        let last = self.points.len().saturating_sub(1);
        for i in 0..last {
            let start = self.cumulative[i];
            let end = self.cumulative[i + 1];
            if distance <= end || i + 1 == last {
                let seg = end - start;
                let frac = if seg > 0.0 { ((distance - start) / seg).clamp(0.0, 1.0) } else { 0.0 };
                return (i, frac);
            }
        }
        (0, 0.0)
    }
}

impl PathQuery for PolylinePath {
    fn position_at(&self, t: f32) -> Vec3 {
        match self.points.len() {
            0 => Vec3::ZERO,
            1 => self.points[0],
            _ => {
                let (i, frac) = self.locate(t.clamp(0.0, 1.0) * self.length());
                self.points[i].lerp(self.points[i + 1], frac)
            }
        }
    }

    fn tangent_at(&self, t: f32) -> Vec3 {
        if self.points.len() < 2 {
            return Vec3::Z;
        }
        let (i, _) = self.locate(t.clamp(0.0, 1.0) * self.length());
        let dir = self.points[i + 1] - self.points[i];
        if dir.length_squared() > 0.0001 {
            dir.normalize()
        } else {
            dir
        }
    }

    fn nearest_param(&self, world_pos: Vec3) -> f32 {
        let length = self.length();
        if self.points.len() < 2 || length <= 0.0 {
            return 0.0;
        }

        let mut best_dist_sq = f32::MAX;
        let mut best_distance = 0.0;
        for i in 0..self.points.len() - 1 {
            let a = self.points[i];
            let ab = self.points[i + 1] - a;
            let seg_len_sq = ab.length_squared();
            let frac = if seg_len_sq > 0.0 {
                ((world_pos - a).dot(ab) / seg_len_sq).clamp(0.0, 1.0)
            } else {
                0.0
            };
            let dist_sq = (a + ab * frac).distance_squared(world_pos);
            if dist_sq < best_dist_sq {
                best_dist_sq = dist_sq;
                best_distance = self.cumulative[i] + seg_len_sq.sqrt() * frac;
            }
        }
        (best_distance / length).clamp(0.0, 1.0)
    }

    fn length(&self) -> f32 {
        self.cumulative.last().copied().unwrap_or(0.0)
    }
}
