//! Immutable feature and unit definitions
//!
//! Definitions are loaded once at session start and shared by reference:
//! every feature holds an `Arc` to its def, the registry outlives all
//! features, and nothing mutates a def after load.

pub mod loader;

use ahash::AHashMap;
use serde::Deserialize;
use std::sync::Arc;

use crate::core::error::DefError;
use crate::core::types::WeaponId;

fn default_true() -> bool {
    true
}

fn default_one() -> u32 {
    1
}

fn default_burn_time() -> u32 {
    450
}

fn default_smoke_interval() -> u32 {
    15
}

fn default_drag() -> f32 {
    0.95
}

/// Static description of a feature type (wreckage, rock, tree, deposit)
#[derive(Debug, Clone, Deserialize)]
pub struct FeatureDef {
    pub name: String,
    /// Hit points before the feature collapses into its wreck state.
    /// Zero means the feature is placed directly as a wreck (a corpse).
    #[serde(default)]
    pub max_health: f32,
    /// Metal stored in the feature, fully recoverable by reclaim
    #[serde(default)]
    pub metal: f32,
    /// Energy stored in the feature
    #[serde(default)]
    pub energy: f32,
    #[serde(default = "default_true")]
    pub reclaimable: bool,
    /// Unit type a fully repaired wreck resurrects into
    #[serde(default)]
    pub resurrect_to: Option<String>,
    #[serde(default)]
    pub burnable: bool,
    /// How long an ignited feature burns, in ticks
    #[serde(default = "default_burn_time")]
    pub burn_time: u32,
    /// Ticks between smoke puffs while burning
    #[serde(default = "default_smoke_interval")]
    pub smoke_interval: u32,
    /// Footprint extent in occupancy cells along x
    #[serde(default = "default_one")]
    pub footprint_x: u32,
    /// Footprint extent in occupancy cells along z
    #[serde(default = "default_one")]
    pub footprint_z: u32,
    /// Whether the footprint blocks the occupancy grid at all
    #[serde(default = "default_true")]
    pub block_movement: bool,
    /// Per-tick multiplier applied to the death impulse while settling
    #[serde(default = "default_drag")]
    pub drag: f32,
    /// Damage multiplier per weapon definition id; missing weapons use 1.0
    #[serde(default)]
    pub damage_mods: AHashMap<u32, f32>,
}

impl FeatureDef {
    /// Effective damage multiplier for the given weapon
    pub fn damage_mod(&self, weapon: Option<WeaponId>) -> f32 {
        weapon
            .and_then(|w| self.damage_mods.get(&w.0).copied())
            .unwrap_or(1.0)
    }

    /// Whether positive build power can do anything with this feature
    pub fn is_resurrectable(&self) -> bool {
        self.resurrect_to.is_some()
    }
}

/// Static description of a unit type, as far as resurrection needs it
///
/// Unit simulation proper lives outside this crate; resurrection only needs
/// the build time and costs to price the conversion.
#[derive(Debug, Clone, Deserialize)]
pub struct UnitDef {
    pub name: String,
    /// Build-power units needed to construct (and thus resurrect) this unit
    pub build_time: f32,
    #[serde(default)]
    pub metal_cost: f32,
    #[serde(default)]
    pub energy_cost: f32,
}

/// Shared-ownership lookup of feature and unit definitions
#[derive(Debug, Default)]
pub struct DefRegistry {
    features: AHashMap<String, Arc<FeatureDef>>,
    units: AHashMap<String, Arc<UnitDef>>,
}

impl DefRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_feature(&mut self, def: FeatureDef) -> Result<(), DefError> {
        if self.features.contains_key(&def.name) {
            return Err(DefError::Duplicate(def.name));
        }
        self.features.insert(def.name.clone(), Arc::new(def));
        Ok(())
    }

    pub fn add_unit(&mut self, def: UnitDef) -> Result<(), DefError> {
        if self.units.contains_key(&def.name) {
            return Err(DefError::Duplicate(def.name));
        }
        self.units.insert(def.name.clone(), Arc::new(def));
        Ok(())
    }

    pub fn feature(&self, name: &str) -> Option<Arc<FeatureDef>> {
        self.features.get(name).cloned()
    }

    /// Look up a feature def, failing with a fatal load error if absent
    pub fn require_feature(&self, name: &str) -> Result<Arc<FeatureDef>, DefError> {
        self.feature(name)
            .ok_or_else(|| DefError::UnknownFeature(name.to_string()))
    }

    pub fn unit(&self, name: &str) -> Option<Arc<UnitDef>> {
        self.units.get(name).cloned()
    }

    /// Resolve the unit type a feature resurrects into, if any
    pub fn resurrect_target(&self, def: &FeatureDef) -> Option<Arc<UnitDef>> {
        def.resurrect_to.as_deref().and_then(|n| self.unit(n))
    }

    /// Verify that every resurrect target names a known unit def
    ///
    /// Called once after load; dangling references are fatal.
    pub fn validate(&self) -> Result<(), DefError> {
        for def in self.features.values() {
            if let Some(unit) = def.resurrect_to.as_deref() {
                if !self.units.contains_key(unit) {
                    return Err(DefError::UnknownResurrectTarget {
                        feature: def.name.clone(),
                        unit: unit.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn feature_count(&self) -> usize {
        self.features.len()
    }
}
