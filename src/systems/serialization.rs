//! Serialization utilities for simulation state.

use crate::world::Snapshot;

/// Serialize a snapshot to JSON bytes.
pub fn snapshot_to_json(snapshot: &Snapshot) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(snapshot)
}

/// Deserialize a snapshot from JSON bytes.
pub fn snapshot_from_json(data: &[u8]) -> Result<Snapshot, serde_json::Error> {
    serde_json::from_slice(data)
}

/// Deserialize a snapshot from a JSON string.
pub fn snapshot_from_json_string(data: &str) -> Result<Snapshot, serde_json::Error> {
    serde_json::from_str(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::systems::behavior::BehaviorState;
    use crate::world::{UnitSnapshot, WaveSnapshot};

    #[test]
    fn test_snapshot_survives_json() {
        let snapshot = Snapshot {
            tick: 42,
            time: 1.4,
            units: vec![UnitSnapshot {
                id: 7,
                tag: "Enemy".to_string(),
                x: 10.0,
                y: 0.0,
                z: -3.0,
                health: 4.0,
                health_max: 10.0,
                state: Some(BehaviorState::Retreat),
                target: Some(3),
            }],
            wave: Some(WaveSnapshot {
                current_wave: 1,
                total_waves: 3,
                alive: 1,
                total_spawned: 5,
                in_progress: true,
                all_complete: false,
            }),
        };

        let bytes = snapshot_to_json(&snapshot).unwrap();
        let restored = snapshot_from_json(&bytes).unwrap();
        assert_eq!(restored, snapshot);

        let text = snapshot.to_json().unwrap();
        assert!(text.contains("\"Retreat\""));
        assert_eq!(snapshot_from_json_string(&text).unwrap().units[0].target, Some(3));
    }
}
