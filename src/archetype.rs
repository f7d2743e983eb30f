//! Named unit archetypes and the library that spawns them.
//!
//! An archetype is a recipe: which capabilities a unit carries and how they
//! are tuned. Spawning goes through `Commands` so it works both from systems
//! (the wave orchestrator) and from the `SimWorld` facade.

use crate::components::*;
use crate::error::SimError;
use crate::faction::ENEMY_TAG;
use crate::navigation::NavAgent;
use crate::systems::behavior::{BehaviorConfig, Brain};
use crate::systems::formation::Follower;
use crate::systems::targeting::{TagPriority, Targeting, TargetingConfig};
use bevy_ecs::prelude::*;
use glam::Vec3;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttackConfig {
    pub damage: f32,
    pub attacks_per_second: f32,
    pub range: f32,
}

impl Default for AttackConfig {
    fn default() -> Self {
        Self {
            damage: 5.0,
            attacks_per_second: 1.0,
            range: 2.0,
        }
    }
}

impl AttackConfig {
    pub fn to_component(self) -> Attack {
        Attack::new(self.damage, self.attacks_per_second, self.range)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnitArchetype {
    pub tag: String,
    pub max_health: f32,
    pub move_speed: f32,
    pub targeting: Option<TargetingConfig>,
    /// Units without a behavior config are stationary (towers, bases).
    pub behavior: Option<BehaviorConfig>,
    pub attack: Option<AttackConfig>,
    pub follows_formation: bool,
    pub follower_update_interval: f32,
}

impl Default for UnitArchetype {
    fn default() -> Self {
        Self {
            tag: ENEMY_TAG.to_string(),
            max_health: 10.0,
            move_speed: 3.5,
            targeting: None,
            behavior: None,
            attack: None,
            follows_formation: false,
            follower_update_interval: 0.25,
        }
    }
}

impl UnitArchetype {
    /// Melee enemy that pushes toward the home base.
    pub fn enemy_grunt() -> Self {
        Self {
            tag: ENEMY_TAG.to_string(),
            targeting: Some(TargetingConfig {
                tag_priorities: vec![
                    TagPriority::new("Hero", 0.6),
                    TagPriority::new("Tower", 0.5),
                    TagPriority::new("HomeBase", 0.3),
                ],
                default_target_tag: Some("HomeBase".to_string()),
                ..Default::default()
            }),
            behavior: Some(BehaviorConfig::default()),
            attack: Some(AttackConfig::default()),
            ..Default::default()
        }
    }

    /// Friendly unit that holds a formation slot along the reference path.
    pub fn escort() -> Self {
        Self {
            tag: "Hero".to_string(),
            max_health: 20.0,
            targeting: Some(TargetingConfig::default()),
            behavior: Some(BehaviorConfig::default()),
            attack: Some(AttackConfig::default()),
            follows_formation: true,
            ..Default::default()
        }
    }

    /// Insert the unit's components on a fresh entity.
    pub fn spawn(&self, commands: &mut Commands, at: Vec3) -> Entity {
        let mut entity = commands.spawn(UnitBundle::new(self.tag.clone(), at, self.max_health));

        if let Some(targeting) = &self.targeting {
            entity.insert(Targeting::new(targeting.clone()));
        }
        if let Some(attack) = self.attack {
            entity.insert(attack.to_component());
        }
        if let Some(behavior) = &self.behavior {
            entity.insert((
                Brain::new(behavior.clone()),
                NavAgent::new(self.move_speed),
                Velocity::default(),
            ));
            if self.follows_formation {
                entity.insert(Follower::new(self.follower_update_interval));
            }
        }
        entity.id()
    }
}

/// Named archetypes available to spawners.
#[derive(Resource, Debug, Clone, Default)]
pub struct ArchetypeLibrary {
    archetypes: BTreeMap<String, UnitArchetype>,
}

impl ArchetypeLibrary {
    pub fn new(archetypes: BTreeMap<String, UnitArchetype>) -> Self {
        Self { archetypes }
    }

    pub fn insert(&mut self, name: impl Into<String>, archetype: UnitArchetype) {
        self.archetypes.insert(name.into(), archetype);
    }

    pub fn get(&self, name: &str) -> Option<&UnitArchetype> {
        self.archetypes.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.archetypes.contains_key(name)
    }

    pub fn spawn(&self, commands: &mut Commands, name: &str, at: Vec3) -> Result<Entity, SimError> {
        let archetype = self
            .get(name)
            .ok_or_else(|| SimError::UnknownArchetype(name.to_string()))?;
        let entity = archetype.spawn(commands, at);
        debug!("spawned '{}' as {:?} at {:?}", name, entity, at);
        Ok(entity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy_ecs::world::CommandQueue;

    fn spawn_in(world: &mut World, library: &ArchetypeLibrary, name: &str) -> Result<Entity, SimError> {
        let mut queue = CommandQueue::default();
        let result = {
            let mut commands = Commands::new(&mut queue, world);
            library.spawn(&mut commands, name, Vec3::new(1.0, 0.0, 2.0))
        };
        queue.apply(world);
        result
    }

    #[test]
    fn test_grunt_gets_full_capability_set() {
        let mut world = World::new();
        let mut library = ArchetypeLibrary::default();
        library.insert("grunt", UnitArchetype::enemy_grunt());

        let e = spawn_in(&mut world, &library, "grunt").unwrap();
        assert_eq!(world.get::<Tag>(e).unwrap().as_str(), "Enemy");
        assert_eq!(world.get::<Position>(e).unwrap().0, Vec3::new(1.0, 0.0, 2.0));
        assert!(world.get::<Brain>(e).is_some());
        assert!(world.get::<NavAgent>(e).is_some());
        assert!(world.get::<Targeting>(e).is_some());
        assert!(world.get::<Attack>(e).is_some());
        assert!(world.get::<DamageInbox>(e).is_some());
        assert!(world.get::<Follower>(e).is_none());
    }

    #[test]
    fn test_stationary_archetype_has_no_brain() {
        let mut world = World::new();
        let mut library = ArchetypeLibrary::default();
        library.insert(
            "tower",
            UnitArchetype {
                tag: "Tower".to_string(),
                follows_formation: true,
                ..Default::default()
            },
        );

        let e = spawn_in(&mut world, &library, "tower").unwrap();
        assert!(world.get::<Brain>(e).is_none());
        assert!(world.get::<Follower>(e).is_none());
        assert_eq!(world.get::<Health>(e).unwrap().max, 10.0);
    }

    #[test]
    fn test_escort_follows_formation() {
        let mut world = World::new();
        let mut library = ArchetypeLibrary::default();
        library.insert("escort", UnitArchetype::escort());
        let e = spawn_in(&mut world, &library, "escort").unwrap();
        assert!(world.get::<Follower>(e).is_some());
    }

    #[test]
    fn test_unknown_archetype() {
        let mut world = World::new();
        let library = ArchetypeLibrary::default();
        let err = spawn_in(&mut world, &library, "dragon").unwrap_err();
        assert!(matches!(err, SimError::UnknownArchetype(name) if name == "dragon"));
    }
}
