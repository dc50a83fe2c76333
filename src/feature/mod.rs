//! Feature records: destructible, collectible, resurrectable world objects
//!
//! A feature is a non-unit object (wreckage, rock, tree stump, deposit) with
//! a resource economy attached. This module owns the per-feature state and
//! its invariants; orchestration across features lives in [`crate::simulation`].

pub mod economy;
pub mod pending;
pub mod visibility;

use glam::{Mat4, Vec3};
use std::sync::Arc;

use crate::core::types::{
    AllyTeamId, BlockingId, EffectId, Facing, FeatureId, Heading, ObjectId, TeamId, Tick,
};
use crate::defs::{FeatureDef, UnitDef};
use crate::spatial::occupancy::{footprint_cells, Cell};
use crate::spatial::OccupancyGrid;
use pending::PendingOp;

/// Feature blocking ids start past the unit id space so both kinds of
/// blockers can share the occupancy grid.
pub const UNIT_ID_SPACE: u32 = 0x4000_0000;

/// Downward acceleration applied to unsettled features, per tick
const GRAVITY: f32 = -0.08;

/// Speed below which a grounded feature counts as settled
const SETTLE_EPSILON: f32 = 1e-4;

/// Primary lifecycle state
///
/// Burning is an orthogonal overlay (`Feature::is_burning`), not a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureState {
    /// Undamaged, at full health
    Intact,
    /// Health below maximum but above zero
    Damaged,
    /// Health exhausted (or placed as a corpse); reclaim/resurrect material
    Wreck,
    /// Positive build power has begun converting the wreck back into a unit
    Resurrecting,
}

/// Why a feature left the world
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalReason {
    /// Fully reclaimed into team resources
    Reclaimed,
    /// Converted into a live unit
    Resurrected,
    /// Rotted away untouched
    Decayed,
}

/// Outcome of a damage application
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DamageOutcome {
    /// No health change (already a wreck, or indestructible)
    Ignored,
    /// Health reduced, feature still standing
    Damaged,
    /// Health reached zero this call; the one wreck transition happened
    Wrecked,
}

/// Effect work requested during a parallel update, executed at the barrier
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EffectRequest {
    Smoke { pos: Vec3 },
    Extinguish { effect: EffectId },
}

/// The one owned fire effect of a burning feature
#[derive(Debug, Clone)]
struct FireEffect {
    effect: EffectId,
    ticks_left: u32,
    smoke_countdown: u32,
}

/// Result of one per-feature update
#[derive(Debug, Default)]
pub struct FeatureUpdate {
    /// Whether the feature still needs future stepping
    pub still_active: bool,
    /// Whether the position changed (transform and footprint were refreshed)
    pub moved: bool,
    /// Set when decay finished the feature off this tick
    pub removal: Option<RemovalReason>,
    /// Effect work to run at the barrier
    pub effects: Vec<EffectRequest>,
}

/// Parameters for placing a feature into the world
#[derive(Debug, Clone)]
pub struct FeaturePlacement {
    pub def: String,
    pub pos: Vec3,
    pub heading: Heading,
    pub facing: Facing,
    pub team: TeamId,
    pub allyteam: AllyTeamId,
    /// Pre-death velocity of the object that became this feature; reused as
    /// the destruction impulse
    pub speed: Vec3,
    pub always_visible: bool,
}

impl FeaturePlacement {
    pub fn new(def: &str, pos: Vec3) -> Self {
        Self {
            def: def.to_string(),
            pos,
            heading: Heading::default(),
            facing: Facing::default(),
            team: TeamId(0),
            allyteam: AllyTeamId::GAIA,
            speed: Vec3::ZERO,
            always_visible: false,
        }
    }
}

/// One destructible world object and all of its per-instance state
#[derive(Debug, Clone)]
pub struct Feature {
    pub id: FeatureId,
    pub def: Arc<FeatureDef>,
    /// Unit type this feature resurrects into, resolved at placement
    pub resurrect_to: Option<Arc<UnitDef>>,

    pub team: TeamId,
    pub allyteam: AllyTeamId,

    pos: Vec3,
    heading: Heading,
    facing: Facing,
    transform: Mat4,

    health: f32,
    state: FeatureState,

    // Resource economy state; see `economy` for the mutation rules.
    metal: f32,
    energy: f32,
    reclaim_left: f32,
    resurrect_progress: f32,
    repairing_before_resurrect: bool,
    last_reclaim: Option<Tick>,
    decay_ticks: u32,

    fire: Option<FireEffect>,

    /// Initially the pre-death velocity; accumulates destruction impulses
    death_speed: Vec3,
    final_height: f32,
    reached_final_pos: bool,

    /// Object resting on top of this feature (e.g. a unit on a geo vent);
    /// owned by the world registry, never by us
    solid_on_top: Option<ObjectId>,
    dependents: Vec<ObjectId>,
    dependents_notified: bool,

    pending_ops: Vec<PendingOp>,

    pub always_visible: bool,
    /// Cleared once the feature has settled and has no running timers
    pub needs_update: bool,
}

impl Feature {
    pub fn new(
        id: FeatureId,
        def: Arc<FeatureDef>,
        resurrect_to: Option<Arc<UnitDef>>,
        placement: &FeaturePlacement,
        ground_height: f32,
    ) -> Self {
        let pos = placement.pos;
        let settled = placement.speed == Vec3::ZERO && pos.y <= ground_height;
        let pos = if settled {
            Vec3::new(pos.x, ground_height, pos.z)
        } else {
            pos
        };
        let health = def.max_health.max(0.0);
        let state = if health <= 0.0 {
            FeatureState::Wreck
        } else {
            FeatureState::Intact
        };

        let mut feature = Self {
            id,
            team: placement.team,
            allyteam: placement.allyteam,
            pos,
            heading: placement.heading,
            facing: placement.facing,
            transform: Mat4::IDENTITY,
            health,
            state,
            metal: def.metal,
            energy: def.energy,
            reclaim_left: 1.0,
            resurrect_progress: 0.0,
            repairing_before_resurrect: false,
            last_reclaim: None,
            decay_ticks: 0,
            fire: None,
            death_speed: placement.speed,
            final_height: ground_height,
            reached_final_pos: settled,
            solid_on_top: None,
            dependents: Vec::new(),
            dependents_notified: false,
            pending_ops: Vec::new(),
            always_visible: placement.always_visible,
            needs_update: true,
            def,
            resurrect_to,
        };
        feature.calculate_transform();
        feature
    }

    // --- spatial state ---

    pub fn pos(&self) -> Vec3 {
        self.pos
    }

    pub fn heading(&self) -> Heading {
        self.heading
    }

    pub fn facing(&self) -> Facing {
        self.facing
    }

    /// Cached world transform; consistent with position/heading/facing by
    /// construction (recomputed on every change, never lazily)
    pub fn transform(&self) -> &Mat4 {
        &self.transform
    }

    fn calculate_transform(&mut self) {
        let rotation = self.heading.radians() + self.facing.radians();
        self.transform = Mat4::from_translation(self.pos) * Mat4::from_rotation_y(rotation);
    }

    pub fn blocking_id(&self) -> BlockingId {
        BlockingId(UNIT_ID_SPACE + self.id.0)
    }

    /// Footprint cells at the current position
    pub fn footprint(&self, grid: &OccupancyGrid) -> Vec<Cell> {
        footprint_cells(
            grid.world_to_cell(self.pos),
            self.def.footprint_x,
            self.def.footprint_z,
        )
    }

    /// Administrative repositioning; always refreshes the transform.
    /// The caller re-registers the occupancy footprint.
    pub(crate) fn set_position(&mut self, pos: Vec3, ground_height: f32, snap_to_ground: bool) {
        self.final_height = ground_height;
        self.pos = if snap_to_ground {
            Vec3::new(pos.x, ground_height, pos.z)
        } else {
            pos
        };
        self.reached_final_pos = self.pos.y <= self.final_height;
        self.calculate_transform();
        self.needs_update = true;
    }

    /// Administrative re-orientation; always refreshes the transform
    pub(crate) fn set_direction(&mut self, dir: Vec3) {
        self.heading = Heading::from_dir(dir);
        self.calculate_transform();
    }

    // --- health / damage ---

    pub fn health(&self) -> f32 {
        self.health
    }

    pub fn state(&self) -> FeatureState {
        self.state
    }

    pub fn is_wreck(&self) -> bool {
        matches!(self.state, FeatureState::Wreck | FeatureState::Resurrecting)
    }

    /// Apply weapon damage and accumulate the impulse into the death velocity
    ///
    /// The wreck transition fires at most once per feature: further damage
    /// against a wreck only pushes it around.
    pub fn apply_damage(
        &mut self,
        damage: f32,
        impulse: Vec3,
        weapon: Option<crate::core::types::WeaponId>,
    ) -> DamageOutcome {
        if impulse != Vec3::ZERO {
            self.death_speed += impulse;
            self.reached_final_pos = false;
            self.needs_update = true;
        }

        if self.is_wreck() {
            return DamageOutcome::Ignored;
        }

        let effective = damage * self.def.damage_mod(weapon);
        if effective <= 0.0 {
            return DamageOutcome::Ignored;
        }

        self.health -= effective;
        if self.health <= 0.0 {
            self.health = 0.0;
            self.state = FeatureState::Wreck;
            DamageOutcome::Wrecked
        } else {
            self.state = FeatureState::Damaged;
            DamageOutcome::Damaged
        }
    }

    // --- fire overlay ---

    pub fn is_burning(&self) -> bool {
        self.fire.is_some()
    }

    /// Attach the one owned fire effect. Callers check `is_burning` first;
    /// igniting an already-burning feature is a no-op at the world level.
    pub(crate) fn ignite(&mut self, effect: EffectId) {
        debug_assert!(self.fire.is_none());
        self.fire = Some(FireEffect {
            effect,
            ticks_left: self.def.burn_time,
            smoke_countdown: self.def.smoke_interval,
        });
        self.needs_update = true;
    }

    /// Drop the fire effect, returning its handle for extinguishing
    pub(crate) fn extinguish(&mut self) -> Option<EffectId> {
        self.fire.take().map(|f| f.effect)
    }

    // --- relations ---

    pub fn solid_on_top(&self) -> Option<ObjectId> {
        self.solid_on_top
    }

    pub fn set_solid_on_top(&mut self, object: Option<ObjectId>) {
        self.solid_on_top = object;
    }

    /// Register an object to be notified when this feature dies
    pub fn add_dependent(&mut self, object: ObjectId) {
        if !self.dependents.contains(&object) {
            self.dependents.push(object);
        }
    }

    pub fn remove_dependent(&mut self, object: ObjectId) {
        self.dependents.retain(|o| *o != object);
    }

    /// Forget any back-reference to a dead external object
    pub(crate) fn object_died(&mut self, object: ObjectId) {
        if self.solid_on_top == Some(object) {
            self.solid_on_top = None;
        }
        self.remove_dependent(object);
    }

    /// Dependents to notify, handed out exactly once per feature
    pub(crate) fn take_dependents_for_notification(&mut self) -> Vec<ObjectId> {
        if self.dependents_notified {
            return Vec::new();
        }
        self.dependents_notified = true;
        std::mem::take(&mut self.dependents)
    }

    // --- per-step update ---

    /// Integrate position toward the resting height under the death impulse
    ///
    /// Returns whether the position changed, which is the caller's cue to
    /// refresh the occupancy footprint.
    pub fn update_position(&mut self) -> bool {
        if self.reached_final_pos {
            return false;
        }

        let old_pos = self.pos;
        self.death_speed.y += GRAVITY;
        self.pos += self.death_speed;
        self.death_speed.x *= self.def.drag;
        self.death_speed.z *= self.def.drag;

        if self.pos.y <= self.final_height {
            self.pos.y = self.final_height;
            self.death_speed.y = 0.0;
            if self.death_speed.length_squared() < SETTLE_EPSILON {
                self.death_speed = Vec3::ZERO;
                self.reached_final_pos = true;
            }
        }

        let moved = self.pos != old_pos;
        if moved {
            self.calculate_transform();
        }
        moved
    }

    /// Advance settle, fire and decay timers for one tick
    ///
    /// Runs inside the parallel phase: only this feature is mutated, grid
    /// changes are queued deferred and effect work is returned for the
    /// barrier to execute.
    pub fn update(&mut self, rules: &crate::core::SimRules) -> FeatureUpdate {
        let mut result = FeatureUpdate::default();

        result.moved = self.update_position();
        if result.moved {
            // Re-register the footprint at the new position once the
            // barrier drains us.
            self.queue_unblock_deferred();
            self.queue_block_deferred();
        }

        let mut burned_out = false;
        if let Some(fire) = &mut self.fire {
            fire.ticks_left = fire.ticks_left.saturating_sub(1);
            fire.smoke_countdown = fire.smoke_countdown.saturating_sub(1);
            if fire.smoke_countdown == 0 {
                fire.smoke_countdown = self.def.smoke_interval.max(1);
                result.effects.push(EffectRequest::Smoke { pos: self.pos });
            }
            burned_out = fire.ticks_left == 0;
        }
        if burned_out {
            if let Some(effect) = self.extinguish() {
                result.effects.push(EffectRequest::Extinguish { effect });
            }
        }

        let decaying = self.update_decay(rules);
        if self.reclaim_left <= 0.0 {
            result.removal = Some(RemovalReason::Decayed);
        }

        result.still_active = !self.reached_final_pos
            || self.fire.is_some()
            || decaying
            || !self.pending_ops.is_empty();
        self.needs_update = result.still_active;
        result
    }

    /// Untouched wrecks rot once the grace period expires
    ///
    /// Returns whether decay is (or may become) active, to keep the feature
    /// in the update set.
    fn update_decay(&mut self, rules: &crate::core::SimRules) -> bool {
        if !rules.construction_decay
            || self.state != FeatureState::Wreck
            || !self.def.reclaimable
        {
            return false;
        }

        self.decay_ticks = self.decay_ticks.saturating_add(1);
        if self.decay_ticks > rules.construction_decay_time {
            let step = rules.construction_decay_speed / economy::def_cost(&self.def, rules);
            self.set_reclaim_left(self.reclaim_left - step);
        }
        true
    }
}
