//! JSON loader for definition files
//!
//! A definition file bundles feature and unit defs:
//!
//! ```json
//! {
//!   "features": [ { "name": "rock", "metal": 20.0 } ],
//!   "units": [ { "name": "tank", "build_time": 100.0 } ]
//! }
//! ```
//!
//! Loading happens once at session start; any malformed entry or dangling
//! resurrect target aborts before a single feature exists.

use serde::Deserialize;
use std::path::Path;

use super::{DefRegistry, FeatureDef, UnitDef};
use crate::core::error::DefError;

/// Root structure of a definition JSON file
#[derive(Debug, Deserialize)]
struct DefFile {
    #[serde(default)]
    features: Vec<FeatureDef>,
    #[serde(default)]
    units: Vec<UnitDef>,
}

impl DefRegistry {
    /// Build a registry from a JSON document
    pub fn load_json(json: &str) -> Result<Self, DefError> {
        let file: DefFile = serde_json::from_str(json)?;
        let mut registry = DefRegistry::new();
        for unit in file.units {
            registry.add_unit(unit)?;
        }
        for feature in file.features {
            registry.add_feature(feature)?;
        }
        registry.validate()?;
        tracing::info!(
            features = registry.feature_count(),
            "definition registry loaded"
        );
        Ok(registry)
    }

    /// Build a registry from a definition file on disk
    pub fn load_file(path: &Path) -> Result<Self, DefError> {
        let json = std::fs::read_to_string(path)?;
        Self::load_json(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_JSON: &str = r#"{
        "features": [
            {
                "name": "boulder",
                "metal": 25.0,
                "footprint_x": 2,
                "footprint_z": 2
            },
            {
                "name": "tank_wreck",
                "metal": 80.0,
                "energy": 10.0,
                "resurrect_to": "tank",
                "damage_mods": { "3": 0.5 }
            }
        ],
        "units": [
            { "name": "tank", "build_time": 100.0, "metal_cost": 80.0 }
        ]
    }"#;

    #[test]
    fn test_load_sample_file() {
        let registry = DefRegistry::load_json(SAMPLE_JSON).unwrap();
        assert_eq!(registry.feature_count(), 2);

        let boulder = registry.feature("boulder").unwrap();
        assert_eq!(boulder.metal, 25.0);
        assert!(boulder.reclaimable); // serde default
        assert!(boulder.resurrect_to.is_none());

        let wreck = registry.feature("tank_wreck").unwrap();
        assert_eq!(registry.resurrect_target(&wreck).unwrap().name, "tank");
        assert_eq!(wreck.damage_mods.get(&3), Some(&0.5));
    }

    #[test]
    fn test_dangling_resurrect_target_fails_load() {
        let json = r#"{
            "features": [ { "name": "wreck", "resurrect_to": "ghost" } ]
        }"#;
        let err = DefRegistry::load_json(json).unwrap_err();
        assert!(matches!(err, DefError::UnknownResurrectTarget { .. }));
    }

    #[test]
    fn test_malformed_json_fails_load() {
        let err = DefRegistry::load_json("{ not json").unwrap_err();
        assert!(matches!(err, DefError::Malformed(_)));
    }
}
