//! Feature world: registry plus lifecycle controller
//!
//! Owns every feature, the shared occupancy grid and the step loop. One step:
//!
//! 1. parallel phase: each active feature updates in isolation (position
//!    settling, fire and decay timers), queuing occupancy changes and effect
//!    work into its private buffers;
//! 2. barrier: a single thread drains every feature's pending operations in
//!    ascending feature id order, executes effect work and applies removals.
//!
//! All mutating entry points (damage, build power, forced moves) are called
//! from the single-threaded part of the tick; determinism rests on that
//! single-writer discipline plus the id-ordered barrier, not on locks.

use glam::Vec3;
use rayon::prelude::*;
use std::sync::Arc;

use crate::core::error::DefError;
use crate::core::types::{AllyTeamId, FeatureId, ObjectId, ResourceKind, TeamId, Tick, WeaponId};
use crate::core::SimRules;
use crate::defs::DefRegistry;
use crate::feature::economy::{BuildPowerOutcome, TeamLedger};
use crate::feature::pending::GridAccess;
use crate::feature::visibility::LosQuery;
use crate::feature::{
    DamageOutcome, EffectRequest, Feature, FeaturePlacement, FeatureUpdate, RemovalReason,
};
use crate::spatial::OccupancyGrid;

use super::collaborators::{EffectsSink, GroundMap, UnitSpawner};

/// Events generated by feature simulation, returned by [`FeatureWorld::step`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimEvent {
    /// A feature entered the world
    Placed { feature: FeatureId },
    /// Health reached zero; the one wreck transition happened
    Wrecked {
        feature: FeatureId,
        attacker: Option<ObjectId>,
    },
    /// A registered dependent was told its feature died
    DependentDied {
        feature: FeatureId,
        object: ObjectId,
    },
    /// The feature caught fire
    Ignited { feature: FeatureId },
    /// The fire ran out on its own
    BurnedOut { feature: FeatureId },
    /// Resurrection completed and spawned this unit (always precedes the
    /// matching `Removed`)
    Resurrected {
        feature: FeatureId,
        object: ObjectId,
    },
    /// The feature left the world
    Removed {
        feature: FeatureId,
        reason: RemovalReason,
    },
}

/// All features of a session and the shared occupancy structure they mutate
pub struct FeatureWorld {
    rules: SimRules,
    defs: Arc<DefRegistry>,
    /// Slot per ever-allocated id; removal leaves a tombstone so ids are
    /// never reused within a session
    features: Vec<Option<Feature>>,
    grid: OccupancyGrid,
    tick: Tick,
    /// Features whose `needs_update` flag was set at the end of last step
    active_count: usize,
    events: Vec<SimEvent>,
}

impl FeatureWorld {
    pub fn new(rules: SimRules, defs: Arc<DefRegistry>) -> Self {
        Self {
            rules,
            defs,
            features: Vec::new(),
            grid: OccupancyGrid::new(),
            tick: 0,
            active_count: 0,
            events: Vec::new(),
        }
    }

    pub fn rules(&self) -> &SimRules {
        &self.rules
    }

    pub fn tick(&self) -> Tick {
        self.tick
    }

    pub fn grid(&self) -> &OccupancyGrid {
        &self.grid
    }

    pub fn feature(&self, id: FeatureId) -> Option<&Feature> {
        self.features.get(id.0 as usize).and_then(Option::as_ref)
    }

    pub fn feature_mut(&mut self, id: FeatureId) -> Option<&mut Feature> {
        self.features.get_mut(id.0 as usize).and_then(Option::as_mut)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Feature> {
        self.features.iter().flatten()
    }

    /// Number of live features
    pub fn len(&self) -> usize {
        self.features.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Features still in the active-update set
    pub fn active_count(&self) -> usize {
        self.active_count
    }

    /// Place a feature into the world: registers it, seeds its resources
    /// from the definition and blocks its footprint immediately
    pub fn place(
        &mut self,
        placement: &FeaturePlacement,
        ground: &dyn GroundMap,
    ) -> Result<FeatureId, DefError> {
        let def = self.defs.require_feature(&placement.def)?;
        let resurrect_to = self.defs.resurrect_target(&def);
        let id = FeatureId(self.features.len() as u32);
        let height = ground.height_at(placement.pos.x, placement.pos.z);

        let mut feature = Feature::new(id, def, resurrect_to, placement, height);
        feature.queue_block(GridAccess::Direct(&mut self.grid));

        tracing::debug!(feature = id.0, def = %placement.def, "feature placed");
        self.features.push(Some(feature));
        self.active_count += 1;
        self.events.push(SimEvent::Placed { feature: id });
        Ok(id)
    }

    /// Apply weapon damage; operations on a removed feature are no-ops
    pub fn apply_damage(
        &mut self,
        id: FeatureId,
        damage: f32,
        impulse: Vec3,
        attacker: Option<ObjectId>,
        weapon: Option<WeaponId>,
        effects: &mut dyn EffectsSink,
    ) -> DamageOutcome {
        let (outcome, wreck) = {
            let Some(feature) = self.features.get_mut(id.0 as usize).and_then(Option::as_mut)
            else {
                return DamageOutcome::Ignored;
            };
            let outcome = feature.apply_damage(damage, impulse, weapon);
            let wreck = (outcome == DamageOutcome::Wrecked).then(|| {
                feature.needs_update = true;
                (feature.pos(), feature.take_dependents_for_notification())
            });
            (outcome, wreck)
        };

        if let Some((pos, dependents)) = wreck {
            tracing::debug!(feature = id.0, "feature wrecked");
            effects.spawn_explosion(pos, impulse);
            self.events.push(SimEvent::Wrecked {
                feature: id,
                attacker,
            });
            for object in dependents {
                self.events.push(SimEvent::DependentDied {
                    feature: id,
                    object,
                });
            }
        }
        outcome
    }

    /// Apply build power from one actor (negative reclaims, positive repairs
    /// then resurrects), removing the feature when the economy says so
    pub fn apply_build_power(
        &mut self,
        id: FeatureId,
        amount: f32,
        actor: TeamId,
        ledger: &mut dyn TeamLedger,
        spawner: &mut dyn UnitSpawner,
        effects: &mut dyn EffectsSink,
    ) -> BuildPowerOutcome {
        let tick = self.tick;
        let (outcome, resurrection) = {
            let rules = &self.rules;
            let Some(feature) = self.features.get_mut(id.0 as usize).and_then(Option::as_mut)
            else {
                return BuildPowerOutcome::Unchanged;
            };
            let outcome = feature.apply_build_power(amount, actor, tick, rules, ledger);
            let resurrection = (outcome == BuildPowerOutcome::Resurrected)
                .then(|| {
                    feature
                        .resurrect_to
                        .clone()
                        .map(|unit| (unit, feature.pos(), feature.team))
                })
                .flatten();
            (outcome, resurrection)
        };

        match outcome {
            BuildPowerOutcome::Reclaimed => {
                self.remove_feature(id, RemovalReason::Reclaimed, effects);
            }
            BuildPowerOutcome::Resurrected => {
                // Spawn first, then remove: observers must never see a gap
                // where neither wreck nor unit exists.
                if let Some((unit, pos, team)) = resurrection {
                    let object = spawner.spawn(&unit, pos, team);
                    tracing::info!(feature = id.0, unit = %unit.name, "feature resurrected");
                    self.events.push(SimEvent::Resurrected {
                        feature: id,
                        object,
                    });
                }
                self.remove_feature(id, RemovalReason::Resurrected, effects);
            }
            _ => {}
        }
        outcome
    }

    /// Ignite a burnable feature; already-burning features ignore this
    pub fn start_fire(&mut self, id: FeatureId, effects: &mut dyn EffectsSink) {
        let Some(feature) = self.features.get_mut(id.0 as usize).and_then(Option::as_mut) else {
            return;
        };
        if !feature.def.burnable || feature.is_burning() {
            return;
        }
        let effect = effects.spawn_fire(feature.pos());
        feature.ignite(effect);
        self.events.push(SimEvent::Ignited { feature: id });
    }

    /// Administrative repositioning; refreshes transform and footprint
    pub fn forced_move(
        &mut self,
        id: FeatureId,
        pos: Vec3,
        snap_to_ground: bool,
        ground: &dyn GroundMap,
    ) {
        let grid = &mut self.grid;
        let Some(feature) = self.features.get_mut(id.0 as usize).and_then(Option::as_mut) else {
            return;
        };
        feature.set_position(pos, ground.height_at(pos.x, pos.z), snap_to_ground);
        feature.queue_unblock(GridAccess::Direct(grid));
        feature.queue_block(GridAccess::Direct(grid));
    }

    /// Administrative re-orientation; refreshes transform and footprint
    pub fn forced_spin(&mut self, id: FeatureId, dir: Vec3) {
        let grid = &mut self.grid;
        let Some(feature) = self.features.get_mut(id.0 as usize).and_then(Option::as_mut) else {
            return;
        };
        feature.set_direction(dir);
        feature.queue_unblock(GridAccess::Direct(grid));
        feature.queue_block(GridAccess::Direct(grid));
    }

    /// Reassign ownership attributes only; resource and resurrect state are
    /// untouched
    pub fn change_team(&mut self, id: FeatureId, team: TeamId, allyteam: AllyTeamId) {
        if let Some(feature) = self.feature_mut(id) {
            feature.team = team;
            feature.allyteam = allyteam;
        }
    }

    pub fn register_dependent(&mut self, id: FeatureId, object: ObjectId) {
        if let Some(feature) = self.feature_mut(id) {
            feature.add_dependent(object);
        }
    }

    pub fn set_solid_on_top(&mut self, id: FeatureId, object: Option<ObjectId>) {
        if let Some(feature) = self.feature_mut(id) {
            feature.set_solid_on_top(object);
        }
    }

    /// An external object died: drop every back-reference to it
    pub fn object_died(&mut self, object: ObjectId) {
        for feature in self.features.iter_mut().flatten() {
            feature.object_died(object);
        }
    }

    /// Whether the feature is observable by the given alliance; removed
    /// features are not
    pub fn is_visible(&self, id: FeatureId, observer: AllyTeamId, los: &dyn LosQuery) -> bool {
        self.feature(id)
            .map(|f| f.is_visible_to(observer, self.rules.feature_visibility, los))
            .unwrap_or(false)
    }

    /// Fraction of the given resource left in the feature, for observers
    pub fn remaining_resource(&self, id: FeatureId, kind: ResourceKind) -> Option<f32> {
        self.feature(id).map(|f| f.remaining_resource(kind))
    }

    /// Advance the simulation one step
    ///
    /// Returns every event since the last step, in deterministic order.
    pub fn step(&mut self, effects: &mut dyn EffectsSink) -> Vec<SimEvent> {
        self.tick += 1;

        // Parallel phase: one worker per feature, no shared mutation.
        let rules = &self.rules;
        let run_parallel = self.active_count >= rules.parallel_threshold;
        let updates: Vec<(FeatureId, FeatureUpdate)> = if run_parallel {
            self.features
                .par_iter_mut()
                .enumerate()
                .filter_map(|(idx, slot)| {
                    let feature = slot.as_mut()?;
                    feature
                        .needs_update
                        .then(|| (FeatureId(idx as u32), feature.update(rules)))
                })
                .collect()
        } else {
            self.features
                .iter_mut()
                .enumerate()
                .filter_map(|(idx, slot)| {
                    let feature = slot.as_mut()?;
                    feature
                        .needs_update
                        .then(|| (FeatureId(idx as u32), feature.update(rules)))
                })
                .collect()
        };

        // Barrier: ascending id order, single thread. Deferred occupancy
        // writes become visible here and only here.
        for (id, update) in updates {
            for request in &update.effects {
                match *request {
                    EffectRequest::Smoke { pos } => effects.spawn_smoke(pos),
                    EffectRequest::Extinguish { effect } => {
                        effects.extinguish(effect);
                        self.events.push(SimEvent::BurnedOut { feature: id });
                    }
                }
            }
            if let Some(feature) = self.features[id.0 as usize].as_mut() {
                feature.drain_pending(&mut self.grid);
            }
            if let Some(reason) = update.removal {
                self.remove_feature(id, reason, effects);
            }
        }

        self.active_count = self
            .features
            .iter()
            .flatten()
            .filter(|f| f.needs_update)
            .count();

        std::mem::take(&mut self.events)
    }

    /// Unregister, extinguish and notify exactly once, then tombstone
    fn remove_feature(&mut self, id: FeatureId, reason: RemovalReason, effects: &mut dyn EffectsSink) {
        let Some(mut feature) = self.features.get_mut(id.0 as usize).and_then(Option::take) else {
            return;
        };
        self.grid.unregister(feature.blocking_id());
        if let Some(effect) = feature.extinguish() {
            effects.extinguish(effect);
        }
        for object in feature.take_dependents_for_notification() {
            self.events.push(SimEvent::DependentDied {
                feature: id,
                object,
            });
        }
        tracing::debug!(feature = id.0, ?reason, "feature removed");
        self.events.push(SimEvent::Removed {
            feature: id,
            reason,
        });
    }
}
