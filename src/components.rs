//! ECS Components for the skirmish simulation.
//!
//! Components are pure data containers attached to entities.
//! All game logic lives in systems that query these components.

use bevy_ecs::prelude::*;
use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::faction::Team;

// ============================================================================
// SPATIAL COMPONENTS
// ============================================================================

/// World position (y is up).
#[derive(Component, Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position(pub Vec3);

impl Position {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self(Vec3::new(x, y, z))
    }

    pub fn distance_to(&self, other: &Position) -> f32 {
        self.0.distance(other.0)
    }
}

/// Linear velocity of a body that can be pushed around (knockback).
#[derive(Component, Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Velocity(pub Vec3);

impl Velocity {
    pub fn magnitude(&self) -> f32 {
        self.0.length()
    }
}

// ============================================================================
// IDENTITY COMPONENTS
// ============================================================================

/// Classification tag ("Enemy", "Hero", "Tower", "HomeBase", ...).
#[derive(Component, Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tag(pub String);

impl Tag {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn team(&self) -> Team {
        Team::from_tag(&self.0)
    }
}

/// Marker for entities that exist but are switched off.
/// Inactive entities are never collected as candidates and never valid targets.
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct Inactive;

// ============================================================================
// COMBAT COMPONENTS
// ============================================================================

/// Health of a unit, tower or base.
#[derive(Component, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Health {
    pub current: f32,
    pub max: f32,
}

impl Health {
    pub fn new(max: f32) -> Self {
        Self { current: max, max }
    }

    /// Current health as a fraction of max; 0 when max is not positive.
    pub fn percent(&self) -> f32 {
        if self.max <= 0.0 {
            0.0
        } else {
            self.current / self.max
        }
    }

    pub fn is_alive(&self) -> bool {
        self.current > 0.0
    }

    /// Apply damage. Returns `true` only on the hit that kills.
    pub fn take_damage(&mut self, amount: f32) -> bool {
        if !self.is_alive() {
            return false;
        }
        self.current -= amount;
        if self.current <= 0.0 {
            self.current = 0.0;
            return true;
        }
        false
    }
}

impl Default for Health {
    fn default() -> Self {
        Self::new(10.0)
    }
}

/// One damage notification: how much, and who dealt it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DamageTaken {
    pub amount: f32,
    pub source: Option<Entity>,
}

/// Per-entity damage channel.
///
/// Producers push, subscribers (aggro, knockback) read at the start of the
/// next tick, then the inbox is emptied. Despawning the entity drops the channel.
#[derive(Component, Debug, Clone, Default)]
pub struct DamageInbox {
    events: Vec<DamageTaken>,
}

impl DamageInbox {
    pub fn push(&mut self, event: DamageTaken) {
        self.events.push(event);
    }

    pub fn iter(&self) -> impl Iterator<Item = &DamageTaken> {
        self.events.iter()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Published once when an entity's health reaches zero.
#[derive(Event, Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnitDied {
    pub entity: Entity,
}

/// Timer-based melee auto-attack against the current target.
#[derive(Component, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Attack {
    pub damage: f32,
    pub attacks_per_second: f32,
    /// Max distance at which a hit lands.
    pub range: f32,
    /// Seconds until the next hit is allowed.
    pub cooldown: f32,
}

impl Attack {
    pub fn new(damage: f32, attacks_per_second: f32, range: f32) -> Self {
        Self {
            damage,
            attacks_per_second,
            range,
            cooldown: 0.0,
        }
    }

    pub fn reset_cooldown(&mut self) {
        self.cooldown = 1.0 / self.attacks_per_second.max(0.01);
    }
}

impl Default for Attack {
    fn default() -> Self {
        Self::new(5.0, 1.0, 2.0)
    }
}

// ============================================================================
// BUNDLE HELPERS
// ============================================================================

/// Components every simulated unit carries.
#[derive(Bundle)]
pub struct UnitBundle {
    pub tag: Tag,
    pub position: Position,
    pub health: Health,
    pub inbox: DamageInbox,
}

impl UnitBundle {
    pub fn new(tag: impl Into<String>, position: Vec3, max_health: f32) -> Self {
        Self {
            tag: Tag::new(tag),
            position: Position(position),
            health: Health::new(max_health),
            inbox: DamageInbox::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_reports_death_once() {
        let mut health = Health::new(10.0);
        assert!(!health.take_damage(4.0));
        assert!((health.percent() - 0.6).abs() < 0.001);
        assert!(health.take_damage(10.0));
        assert_eq!(health.current, 0.0);
        assert!(!health.take_damage(1.0));
        assert!(!health.is_alive());
    }

    #[test]
    fn test_health_percent_with_zero_max() {
        let health = Health { current: 5.0, max: 0.0 };
        assert_eq!(health.percent(), 0.0);
    }

    #[test]
    fn test_damage_inbox() {
        let mut inbox = DamageInbox::default();
        assert!(inbox.is_empty());
        inbox.push(DamageTaken { amount: 3.0, source: None });
        assert_eq!(inbox.iter().count(), 1);
        inbox.clear();
        assert!(inbox.is_empty());
    }

    #[test]
    fn test_attack_cooldown_floor() {
        let mut attack = Attack::new(1.0, 0.0, 2.0);
        attack.reset_cooldown();
        assert!((attack.cooldown - 100.0).abs() < 0.001);
    }
}
