//! Tag-based team rules.
//!
//! Teams are never stored: they are derived from an entity's classification
//! tag every time they are needed. `"Enemy"` is the Enemy team; every other
//! tag (hero, tower, home base, ...) is Friendly.

use serde::{Deserialize, Serialize};

/// Tag of every hostile-wave entity.
pub const ENEMY_TAG: &str = "Enemy";

/// Tags that make up the Friendly team for world queries.
pub const FRIENDLY_TAGS: [&str; 3] = ["Hero", "Tower", "HomeBase"];

/// Derived hostility grouping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Team {
    Enemy,
    Friendly,
}

impl Team {
    /// Team for a given tag.
    pub fn from_tag(tag: &str) -> Self {
        if tag == ENEMY_TAG {
            Team::Enemy
        } else {
            Team::Friendly
        }
    }

    /// The team hostile to this one.
    pub fn hostile(self) -> Self {
        match self {
            Team::Enemy => Team::Friendly,
            Team::Friendly => Team::Enemy,
        }
    }

    /// Whether an entity with this tag shows up in a world query for this team.
    ///
    /// Friendly membership for queries is narrower than `from_tag`: only the
    /// listed friendly tags are collected, so untagged props never become
    /// candidates.
    pub fn query_includes(self, tag: &str) -> bool {
        match self {
            Team::Enemy => tag == ENEMY_TAG,
            Team::Friendly => FRIENDLY_TAGS.contains(&tag),
        }
    }
}

/// True if the two tags belong to the same team (no friendly fire).
pub fn is_same_team(tag_a: &str, tag_b: &str) -> bool {
    Team::from_tag(tag_a) == Team::from_tag(tag_b)
}

/// Team a unit with this tag looks for when picking targets.
pub fn hostile_team(tag: &str) -> Team {
    Team::from_tag(tag).hostile()
}

/// True if the two tags are hostile (valid to target / damage).
pub fn are_hostile(tag_a: &str, tag_b: &str) -> bool {
    !is_same_team(tag_a, tag_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_team_from_tag() {
        assert_eq!(Team::from_tag("Enemy"), Team::Enemy);
        assert_eq!(Team::from_tag("Hero"), Team::Friendly);
        assert_eq!(Team::from_tag("Tower"), Team::Friendly);
        assert_eq!(Team::from_tag("Crate"), Team::Friendly);
    }

    #[test]
    fn test_hostility() {
        assert_eq!(Team::Enemy.hostile(), Team::Friendly);
        assert_eq!(Team::Friendly.hostile(), Team::Enemy);
        assert!(are_hostile("Enemy", "HomeBase"));
        assert!(!are_hostile("Hero", "Tower"));
        assert!(is_same_team("Enemy", "Enemy"));
        assert_eq!(hostile_team("Hero"), Team::Enemy);
    }

    #[test]
    fn test_query_membership() {
        assert!(Team::Friendly.query_includes("HomeBase"));
        assert!(!Team::Friendly.query_includes("Crate"));
        assert!(Team::Enemy.query_includes("Enemy"));
        assert!(!Team::Enemy.query_includes("Hero"));
    }
}
