//! Spatial partitioning for efficient team queries.
//!
//! Provides O(1) cell lookup and O(k) neighbor queries where k is the number
//! of entities in nearby cells, rather than O(n) for brute force. Cells are
//! laid out on the ground plane (x/z); distance checks use full 3D distance.

use bevy_ecs::prelude::*;
use glam::Vec3;
use std::collections::HashMap;

use crate::components::{Health, Inactive, Position, Tag};
use crate::faction::Team;

/// Grid-based spatial partitioning structure.
///
/// Rebuilt every tick from all active, living, tagged entities.
#[derive(Resource, Debug)]
pub struct SpatialGrid {
    /// Cell size in world units.
    pub cell_size: f32,
    /// Map from cell coordinates to list of entities in that cell.
    cells: HashMap<(i32, i32), Vec<SpatialEntry>>,
    /// Reverse lookup: entity to cell.
    entity_cells: HashMap<Entity, (i32, i32)>,
}

/// Entry in a spatial cell.
#[derive(Debug, Clone, Copy)]
pub struct SpatialEntry {
    pub entity: Entity,
    pub position: Vec3,
    /// Team membership as seen by world queries (see `Team::query_includes`).
    pub team: Option<Team>,
}

impl Default for SpatialGrid {
    fn default() -> Self {
        Self::new(10.0)
    }
}

impl SpatialGrid {
    /// Create a new spatial grid with the given cell size.
    pub fn new(cell_size: f32) -> Self {
        Self {
            cell_size: cell_size.max(0.1),
            cells: HashMap::new(),
            entity_cells: HashMap::new(),
        }
    }

    /// Convert world coordinates to cell coordinates.
    #[inline]
    pub fn world_to_cell(&self, position: Vec3) -> (i32, i32) {
        (
            (position.x / self.cell_size).floor() as i32,
            (position.z / self.cell_size).floor() as i32,
        )
    }

    /// Clear all entries (call at start of each frame before rebuilding).
    pub fn clear(&mut self) {
        self.cells.clear();
        self.entity_cells.clear();
    }

    /// Insert an entity at a position.
    pub fn insert(&mut self, entity: Entity, position: Vec3, team: Option<Team>) {
        let cell = self.world_to_cell(position);

        if let Some(&old_cell) = self.entity_cells.get(&entity) {
            if let Some(entries) = self.cells.get_mut(&old_cell) {
                entries.retain(|e| e.entity != entity);
            }
        }

        self.cells
            .entry(cell)
            .or_default()
            .push(SpatialEntry { entity, position, team });
        self.entity_cells.insert(entity, cell);
    }

    /// Remove an entity from the grid.
    pub fn remove(&mut self, entity: Entity) {
        if let Some(cell) = self.entity_cells.remove(&entity) {
            if let Some(entries) = self.cells.get_mut(&cell) {
                entries.retain(|e| e.entity != entity);
            }
        }
    }

    /// Query all entities within a radius of a point.
    ///
    /// Results are ordered by distance (closest first), ties broken by entity
    /// id, so iteration order is deterministic for a given world state.
    pub fn query_radius(&self, center: Vec3, radius: f32) -> Vec<SpatialEntry> {
        let radius_sq = radius * radius;
        let cells_to_check = (radius / self.cell_size).ceil() as i32 + 1;
        let center_cell = self.world_to_cell(center);

        let mut results = Vec::new();

        for dx in -cells_to_check..=cells_to_check {
            for dz in -cells_to_check..=cells_to_check {
                let cell = (center_cell.0 + dx, center_cell.1 + dz);
                if let Some(entries) = self.cells.get(&cell) {
                    for entry in entries {
                        if entry.position.distance_squared(center) <= radius_sq {
                            results.push(*entry);
                        }
                    }
                }
            }
        }

        results.sort_by(|a, b| {
            let dist_a = a.position.distance_squared(center);
            let dist_b = b.position.distance_squared(center);
            dist_a
                .partial_cmp(&dist_b)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.entity.cmp(&b.entity))
        });

        results
    }

    /// Query entities of one team within radius.
    pub fn query_team(&self, center: Vec3, radius: f32, team: Team) -> Vec<SpatialEntry> {
        let mut results = self.query_radius(center, radius);
        results.retain(|e| e.team == Some(team));
        results
    }

    /// Get total entity count.
    pub fn total_count(&self) -> usize {
        self.entity_cells.len()
    }
}

/// System that rebuilds the spatial grid each frame.
pub fn spatial_grid_update_system(
    mut grid: ResMut<SpatialGrid>,
    query: Query<(Entity, &Position, &Tag, Option<&Health>), Without<Inactive>>,
) {
    grid.clear();

    for (entity, pos, tag, health) in query.iter() {
        if health.is_some_and(|h| !h.is_alive()) {
            continue;
        }

        let team = [Team::Enemy, Team::Friendly]
            .into_iter()
            .find(|t| t.query_includes(tag.as_str()));

        grid.insert(entity, pos.0, team);
    }
}
