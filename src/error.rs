//! Error taxonomy for the simulation core.
//!
//! Nothing raised here is fatal to a running simulation. Inside the tick,
//! errors are logged and the affected entity or configuration unit is skipped;
//! only the construction-time API (`SimConfig::from_json`,
//! `SimWorld::spawn_unit`) hands them back to the caller.

use bevy_ecs::entity::Entity;

/// Errors produced by the simulation core.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    /// An entity lacks a collaborator its behavior requires (e.g. a navigator).
    #[error("entity {entity:?} is missing required capability `{capability}`")]
    MissingCapability {
        entity: Entity,
        capability: &'static str,
    },

    /// A unit of configuration is incomplete and was skipped.
    #[error("configuration gap: {0}")]
    ConfigurationGap(String),

    /// A spawn request named an archetype the library does not know.
    #[error("unknown archetype '{0}'")]
    UnknownArchetype(String),

    /// Configuration JSON could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = SimError::MissingCapability {
            entity: Entity::from_raw(7),
            capability: "NavAgent",
        };
        assert!(err.to_string().contains("NavAgent"));

        let err = SimError::UnknownArchetype("grunt".to_string());
        assert_eq!(err.to_string(), "unknown archetype 'grunt'");
    }

    #[test]
    fn test_config_error_from_json() {
        let parse: Result<u32, _> = serde_json::from_str("not json");
        let err: SimError = parse.unwrap_err().into();
        assert!(matches!(err, SimError::Config(_)));
    }
}
