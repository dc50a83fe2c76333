//! Feature visibility policy
//!
//! A pure decision function: every participant evaluates it against
//! identical state and must get the identical boolean, or the lockstep
//! session desyncs. No side effects, no hidden inputs.

use glam::Vec3;

use crate::core::types::AllyTeamId;
use crate::core::FeatureVisibility;

use super::Feature;

/// Line-of-sight service, owned by the surrounding sensor simulation
pub trait LosQuery {
    /// Whether the given alliance has direct sight of the position
    fn in_los(&self, pos: Vec3, allyteam: AllyTeamId) -> bool;
}

/// Resolve whether a feature at `pos` owned by `owner` is observable by
/// `observer` under the session's visibility mode
pub fn is_visible(
    mode: FeatureVisibility,
    always_visible: bool,
    owner: AllyTeamId,
    observer: AllyTeamId,
    pos: Vec3,
    los: &dyn LosQuery,
) -> bool {
    if always_visible {
        return true;
    }
    match mode {
        FeatureVisibility::None => los.in_los(pos, observer),
        FeatureVisibility::GaiaOnly => owner.is_gaia() || los.in_los(pos, observer),
        FeatureVisibility::GaiaAllied => {
            owner.is_gaia() || owner == observer || los.in_los(pos, observer)
        }
        FeatureVisibility::All => true,
    }
}

impl Feature {
    /// Whether this feature is observable by the given alliance
    pub fn is_visible_to(
        &self,
        observer: AllyTeamId,
        mode: FeatureVisibility,
        los: &dyn LosQuery,
    ) -> bool {
        is_visible(
            mode,
            self.always_visible,
            self.allyteam,
            observer,
            self.pos(),
            los,
        )
    }
}
