//! Simulation configuration, loadable from JSON.
//!
//! Every field has a default, so a config file only needs to name what it
//! changes. `validate` reports configuration gaps as warnings; nothing here
//! refuses to run.

use crate::archetype::UnitArchetype;
use crate::error::SimError;
use crate::systems::formation::FormationConfig;
use crate::systems::waves::WaveSchedule;
use bevy_ecs::prelude::*;
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Top-level tuning for a simulation run.
#[derive(Resource, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Fixed timestep in seconds (e.g., 1/30 = 0.0333 for 30 Hz).
    pub fixed_timestep: f32,
    /// Spatial grid cell size in world units.
    pub spatial_cell_size: f32,
    /// Behavior controllers allowed a destination refresh per tick.
    pub updates_per_frame: usize,
    /// Seconds between alive-set reconciliations.
    pub reconcile_interval: f32,
    pub rng_seed: u64,
    pub spawn_jitter_radius: f32,
    pub formation: FormationConfig,
    pub waves: WaveSchedule,
    pub archetypes: BTreeMap<String, UnitArchetype>,
}

impl Default for SimConfig {
    fn default() -> Self {
        let mut archetypes = BTreeMap::new();
        archetypes.insert("enemy_grunt".to_string(), UnitArchetype::enemy_grunt());
        archetypes.insert("escort".to_string(), UnitArchetype::escort());

        Self {
            fixed_timestep: 1.0 / 30.0, // 30 Hz
            spatial_cell_size: 10.0,
            updates_per_frame: 30,
            reconcile_interval: 0.5,
            rng_seed: 0,
            spawn_jitter_radius: 1.5,
            formation: FormationConfig::default(),
            waves: WaveSchedule::default(),
            archetypes,
        }
    }
}

impl SimConfig {
    /// Parse a JSON config. Gaps are not rejected here; `SimWorld` runs
    /// `validate` when it is built from the config.
    pub fn from_json(json: &str) -> Result<Self, SimError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, SimError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Collect configuration gaps, logging each one.
    pub fn validate(&self) -> Vec<SimError> {
        let mut gaps = Vec::new();

        if self.waves.waves.is_empty() {
            gaps.push("wave list is empty".to_string());
        } else if self.waves.starting_wave >= self.waves.waves.len() {
            gaps.push(format!(
                "starting wave {} is out of range ({} waves)",
                self.waves.starting_wave,
                self.waves.waves.len()
            ));
        }

        for (w, wave) in self.waves.waves.iter().enumerate() {
            for (g, group) in wave.spawn_groups.iter().enumerate() {
                match &group.archetype {
                    None => gaps.push(format!("wave {} group {} has no archetype", w + 1, g)),
                    Some(name) if !self.archetypes.contains_key(name) => {
                        gaps.push(format!("wave {} group {} uses unknown archetype '{}'", w + 1, g, name))
                    }
                    Some(_) => {}
                }
                if group.spawn_point.is_none() {
                    gaps.push(format!("wave {} group {} has no spawn point", w + 1, g));
                }
            }
        }

        if self.fixed_timestep <= 0.0 {
            gaps.push(format!("fixed timestep {} is not positive", self.fixed_timestep));
        }

        gaps.into_iter()
            .map(|gap| {
                warn!("{gap}");
                SimError::ConfigurationGap(gap)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::systems::waves::{SpawnGroup, Wave};
    use glam::Vec3;

    #[test]
    fn test_defaults_match_tuning() {
        let config = SimConfig::default();
        assert!((config.fixed_timestep - 1.0 / 30.0).abs() < 1e-6);
        assert_eq!(config.formation.row_spacing, 3.0);
        assert_eq!(config.waves.time_between_waves, 5.0);
        assert!(config.waves.auto_progress);
        assert!(config.archetypes.contains_key("enemy_grunt"));
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let json = r#"{
            "rng_seed": 9,
            "waves": {
                "waves": [
                    { "name": "First", "spawn_groups": [
                        { "archetype": "enemy_grunt", "count": 3, "spawn_point": [10.0, 0.0, 0.0] }
                    ] }
                ],
                "auto_progress": false
            }
        }"#;
        let config = SimConfig::from_json(json).unwrap();
        assert_eq!(config.rng_seed, 9);
        assert_eq!(config.updates_per_frame, 30);
        assert!(!config.waves.auto_progress);

        let wave = &config.waves.waves[0];
        assert_eq!(wave.pre_wave_delay, 2.0);
        assert_eq!(wave.spawn_groups[0].spawn_interval, 0.3);
        assert_eq!(wave.spawn_groups[0].spawn_point, Some(Vec3::new(10.0, 0.0, 0.0)));
        assert!(config.validate().is_empty());
    }

    #[test]
    fn test_bad_json_is_config_error() {
        let err = SimConfig::from_json("{ not json").unwrap_err();
        assert!(matches!(err, SimError::Config(_)));
    }

    #[test]
    fn test_validate_reports_gaps() {
        let mut config = SimConfig::default();
        assert_eq!(config.validate().len(), 1);

        config.waves.waves = vec![Wave {
            spawn_groups: vec![
                SpawnGroup::new("dragon", 1, Vec3::ZERO),
                SpawnGroup {
                    archetype: None,
                    spawn_point: None,
                    ..Default::default()
                },
            ],
            ..Default::default()
        }];
        let gaps = config.validate();
        assert_eq!(gaps.len(), 3);
        assert!(gaps.iter().all(|g| matches!(g, SimError::ConfigurationGap(_))));
    }
}
