//! Melee auto-attack - deals damage to each attacker's current target.
//!
//! ## Complexity Analysis
//!
//! Combat has two phases:
//!
//! 1. **Gather Phase** - O(n) over attackers
//!    - Tick cooldowns, snapshot attacker and target data
//!    - Decide which ready attackers land a hit (pure, parallelizable)
//!
//! 2. **Apply Phase** - O(m) over hits
//!    - Apply damage, push damage notifications, publish deaths
//!    - Must be sequential so a unit dies exactly once
//!
//! ## Parallel Feature
//!
//! When compiled with `--features parallel`, hit resolution in the gather
//! phase uses rayon across attackers.

use crate::components::*;
use crate::faction::are_hostile;
use crate::systems::movement::DeltaTime;
use crate::systems::targeting::Targeting;
use bevy_ecs::prelude::*;
use glam::Vec3;
use log::debug;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// One landed hit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitIntent {
    pub attacker: Entity,
    pub target: Entity,
    pub damage: f32,
}

/// Collected hits to apply after iteration.
#[derive(Debug, Default, Clone)]
pub struct CombatResults {
    pub hits: Vec<HitIntent>,
    /// Attackers whose swing was spent this tick (cooldown resets).
    pub swung: Vec<Entity>,
}

impl CombatResults {
    /// Merge another CombatResults into this one.
    pub fn merge(&mut self, other: CombatResults) {
        self.hits.extend(other.hits);
        self.swung.extend(other.swung);
    }
}

/// Resource to store pending combat results between gather and apply phases.
#[derive(Resource, Debug, Default)]
pub struct PendingCombatResults(pub CombatResults);

/// Attacker data extracted for the gather phase.
#[derive(Debug, Clone)]
struct AttackerData {
    entity: Entity,
    tag: String,
    position: Vec3,
    damage: f32,
    range: f32,
    target: Entity,
    target_tag: String,
    target_position: Vec3,
}

/// Resolve one ready attacker. In range spends the swing; only hostile
/// targets take damage.
fn compute_attacker_hit(attacker: &AttackerData) -> CombatResults {
    let mut result = CombatResults::default();
    if attacker.position.distance(attacker.target_position) > attacker.range {
        return result;
    }
    result.swung.push(attacker.entity);
    if are_hostile(&attacker.tag, &attacker.target_tag) {
        result.hits.push(HitIntent {
            attacker: attacker.entity,
            target: attacker.target,
            damage: attacker.damage,
        });
    }
    result
}

/// Apply one hit to a health pool and its damage channel.
/// Returns `true` if this hit killed the target.
pub fn deal_damage(health: &mut Health, inbox: Option<&mut DamageInbox>, amount: f32, source: Option<Entity>) -> bool {
    if !health.is_alive() {
        return false;
    }
    let killed = health.take_damage(amount);
    if let Some(inbox) = inbox {
        inbox.push(DamageTaken { amount, source });
    }
    killed
}

/// Combat gather system - ticks cooldowns and computes hit intents.
///
/// ## Data Access
/// - Reads: DeltaTime, Tag, Position, Targeting, Health
/// - Writes: Attack (cooldown), PendingCombatResults
pub fn combat_gather_system(
    dt: Res<DeltaTime>,
    mut pending: ResMut<PendingCombatResults>,
    mut attackers: Query<(Entity, &Tag, &Position, &mut Attack, &Targeting, Option<&Health>), Without<Inactive>>,
    targets: Query<(&Tag, &Position, Option<&Health>), Without<Inactive>>,
) {
    let delta = dt.0;
    pending.0 = CombatResults::default();

    let mut ready: Vec<AttackerData> = Vec::new();
    for (entity, tag, pos, mut attack, targeting, health) in attackers.iter_mut() {
        if health.is_some_and(|h| !h.is_alive()) {
            continue;
        }
        attack.cooldown -= delta;
        if attack.cooldown > 0.0 {
            continue;
        }
        let Some(target) = targeting.target else {
            continue;
        };
        let Ok((target_tag, target_pos, target_health)) = targets.get(target) else {
            continue;
        };
        if target_health.is_some_and(|h| !h.is_alive()) {
            continue;
        }
        ready.push(AttackerData {
            entity,
            tag: tag.0.clone(),
            position: pos.0,
            damage: attack.damage,
            range: attack.range,
            target,
            target_tag: target_tag.0.clone(),
            target_position: target_pos.0,
        });
    }

    #[cfg(feature = "parallel")]
    {
        let partial_results: Vec<CombatResults> = ready.par_iter().map(compute_attacker_hit).collect();
        for partial in partial_results {
            pending.0.merge(partial);
        }
    }

    #[cfg(not(feature = "parallel"))]
    {
        for attacker in &ready {
            pending.0.merge(compute_attacker_hit(attacker));
        }
    }

    for &entity in &pending.0.swung {
        if let Ok((_, _, _, mut attack, _, _)) = attackers.get_mut(entity) {
            attack.reset_cooldown();
        }
    }
}

/// Combat apply system - applies pending hits in gather order.
///
/// ## Data Access
/// - Reads: PendingCombatResults
/// - Writes: Health, DamageInbox, Events<UnitDied>
pub fn combat_apply_system(
    pending: Res<PendingCombatResults>,
    mut victims: Query<(&mut Health, Option<&mut DamageInbox>)>,
    mut deaths: EventWriter<UnitDied>,
) {
    for hit in &pending.0.hits {
        let Ok((mut health, inbox)) = victims.get_mut(hit.target) else {
            continue;
        };
        if deal_damage(&mut health, inbox.map(|i| i.into_inner()), hit.damage, Some(hit.attacker)) {
            debug!("{:?} killed by {:?}", hit.target, hit.attacker);
            deaths.send(UnitDied { entity: hit.target });
        }
    }
}
