//! Session rules snapshot
//!
//! All participants load the same rules before the first tick. The snapshot
//! is immutable after session start; subsystems receive a reference instead
//! of reading ad hoc globals, so every participant computes from identical
//! configuration.

use crate::core::error::RulesError;
use serde::Deserialize;

/// Feature visibility policy selected by the session rules
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureVisibility {
    /// Features require line-of-sight like any other object
    None,
    /// Neutral (gaia) features are always visible
    GaiaOnly,
    /// Neutral and same-alliance features are always visible
    GaiaAllied,
    /// All features are always visible
    All,
}

impl TryFrom<u32> for FeatureVisibility {
    type Error = RulesError;

    fn try_from(raw: u32) -> Result<Self, RulesError> {
        match raw {
            0 => Ok(FeatureVisibility::None),
            1 => Ok(FeatureVisibility::GaiaOnly),
            2 => Ok(FeatureVisibility::GaiaAllied),
            3 => Ok(FeatureVisibility::All),
            other => Err(RulesError::FeatureVisibilityOutOfRange(other)),
        }
    }
}

/// Raw rules as read from a session file, before validation
///
/// Every field has the engine default, so a partial (or empty) rules file
/// behaves like the stock game.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RulesFile {
    pub feature_visibility: u32,
    pub reclaim_method: u32,
    pub multi_reclaim: u32,
    pub reclaim_feature_energy_cost_factor: f32,
    pub reclaim_efficiency: f32,
    pub repair_energy_cost_factor: f32,
    pub resurrect_energy_cost_factor: f32,
    pub construction_decay: bool,
    pub construction_decay_time: u32,
    pub construction_decay_speed: f32,
    pub los_mip_level: u32,
    pub air_mip_level: u32,
    pub parallel_threshold: usize,
}

impl Default for RulesFile {
    fn default() -> Self {
        Self {
            feature_visibility: 3,
            reclaim_method: 1,
            multi_reclaim: 0,
            reclaim_feature_energy_cost_factor: 0.0,
            reclaim_efficiency: 1.0,
            repair_energy_cost_factor: 0.0,
            resurrect_energy_cost_factor: 0.5,
            construction_decay: true,
            construction_decay_time: 200,
            construction_decay_speed: 0.03,
            los_mip_level: 1,
            air_mip_level: 2,
            parallel_threshold: 256,
        }
    }
}

/// Validated, immutable session rules
#[derive(Debug, Clone)]
pub struct SimRules {
    /// Which features are observable without line-of-sight
    pub feature_visibility: FeatureVisibility,
    /// 0 = reclaimed resource pays out all-or-nothing on completion,
    /// n >= 1 = payout in n equal chunks as reclaim crosses chunk boundaries
    pub reclaim_method: u32,
    /// 0 = at most one reclaim application per feature per tick,
    /// nonzero = no per-tick serialization limit
    pub multi_reclaim: u32,
    /// Energy weight when converting build power into reclaim progress
    pub reclaim_feature_energy_cost_factor: f32,
    /// Fraction of drained resource actually credited to the reclaiming team
    pub reclaim_efficiency: f32,
    /// Energy charged per unit of build power spent repairing
    pub repair_energy_cost_factor: f32,
    /// Energy charged per unit of build power spent resurrecting
    pub resurrect_energy_cost_factor: f32,
    /// Whether untouched wrecks decay away
    pub construction_decay: bool,
    /// Ticks a wreck must sit untouched before decay starts
    pub construction_decay_time: u32,
    /// Build-power-equivalent drained per tick once decay starts
    pub construction_decay_speed: f32,
    /// Mip level of the ground line-of-sight grid, bounded by the heightmap
    /// mip chain length
    pub los_mip_level: u32,
    /// Mip level of the air line-of-sight grid, used in shifts of signed ints
    pub air_mip_level: u32,
    /// Minimum active feature count before the step uses worker threads
    pub parallel_threshold: usize,
}

impl SimRules {
    /// Validate a raw rules file and freeze it into a snapshot
    ///
    /// Any violation is fatal: the session must not start.
    pub fn from_file(raw: RulesFile) -> Result<Self, RulesError> {
        let feature_visibility = FeatureVisibility::try_from(raw.feature_visibility)?;

        if raw.los_mip_level > 6 {
            return Err(RulesError::LosMipLevelOutOfRange(raw.los_mip_level));
        }
        if raw.air_mip_level > 30 {
            return Err(RulesError::AirMipLevelOutOfRange(raw.air_mip_level));
        }

        Ok(Self {
            feature_visibility,
            reclaim_method: raw.reclaim_method,
            multi_reclaim: raw.multi_reclaim,
            reclaim_feature_energy_cost_factor: raw.reclaim_feature_energy_cost_factor.max(0.0),
            reclaim_efficiency: raw.reclaim_efficiency.clamp(0.0, 1.0),
            repair_energy_cost_factor: raw.repair_energy_cost_factor.max(0.0),
            resurrect_energy_cost_factor: raw.resurrect_energy_cost_factor.max(0.0),
            construction_decay: raw.construction_decay,
            construction_decay_time: raw.construction_decay_time,
            construction_decay_speed: raw.construction_decay_speed.max(0.01),
            los_mip_level: raw.los_mip_level,
            air_mip_level: raw.air_mip_level,
            parallel_threshold: raw.parallel_threshold,
        })
    }

    /// Parse and validate rules from a JSON document
    pub fn load_json(json: &str) -> Result<Self, RulesError> {
        let raw: RulesFile = serde_json::from_str(json)?;
        Self::from_file(raw)
    }
}

impl Default for SimRules {
    fn default() -> Self {
        // Defaults are always in range.
        Self::from_file(RulesFile::default()).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_rules_validate() {
        let rules = SimRules::default();
        assert_eq!(rules.feature_visibility, FeatureVisibility::All);
        assert_eq!(rules.reclaim_method, 1);
        assert_eq!(rules.construction_decay_time, 200);
    }

    #[test]
    fn test_feature_visibility_out_of_range_fails_fast() {
        let raw = RulesFile {
            feature_visibility: 4,
            ..Default::default()
        };
        let err = SimRules::from_file(raw).unwrap_err();
        assert!(matches!(err, RulesError::FeatureVisibilityOutOfRange(4)));
    }

    #[test]
    fn test_los_mip_level_out_of_range_fails_fast() {
        let raw = RulesFile {
            los_mip_level: 7,
            ..Default::default()
        };
        let err = SimRules::from_file(raw).unwrap_err();
        assert!(matches!(err, RulesError::LosMipLevelOutOfRange(7)));
    }

    #[test]
    fn test_air_mip_level_out_of_range_fails_fast() {
        let raw = RulesFile {
            air_mip_level: 31,
            ..Default::default()
        };
        let err = SimRules::from_file(raw).unwrap_err();
        assert!(matches!(err, RulesError::AirMipLevelOutOfRange(31)));
    }

    #[test]
    fn test_decay_speed_clamped_to_minimum() {
        let raw = RulesFile {
            construction_decay_speed: 0.0,
            ..Default::default()
        };
        let rules = SimRules::from_file(raw).unwrap();
        assert_eq!(rules.construction_decay_speed, 0.01);
    }

    #[test]
    fn test_load_json_partial_file_uses_defaults() {
        let rules = SimRules::load_json(r#"{ "featureVisibility": 1 }"#).unwrap();
        assert_eq!(rules.feature_visibility, FeatureVisibility::GaiaOnly);
        assert_eq!(rules.reclaim_method, 1);
    }

    #[test]
    fn test_load_json_rejects_bad_visibility() {
        let err = SimRules::load_json(r#"{ "featureVisibility": 4 }"#).unwrap_err();
        assert!(matches!(err, RulesError::FeatureVisibilityOutOfRange(4)));
    }
}
