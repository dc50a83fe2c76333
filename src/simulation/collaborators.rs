//! External collaborator contracts and the deterministic in-crate
//! implementations used by tests and the headless demo
//!
//! The real session wires these traits to its own economy, sensor, effects
//! and unit subsystems; everything here is enough to run the feature core
//! standalone without dragging those subsystems in.

use ahash::AHashMap;
use glam::Vec3;

use crate::core::types::{AllyTeamId, EffectId, ObjectId, ResourceKind, TeamId};
use crate::defs::UnitDef;
use crate::feature::economy::TeamLedger;
use crate::feature::visibility::LosQuery;

/// Effects system: fire, smoke and destruction visuals
///
/// Effects are presentation-side and never feed back into simulation state,
/// so implementations are free to drop everything.
pub trait EffectsSink {
    fn spawn_fire(&mut self, pos: Vec3) -> EffectId;
    fn spawn_smoke(&mut self, pos: Vec3);
    fn spawn_explosion(&mut self, pos: Vec3, impulse: Vec3);
    fn extinguish(&mut self, effect: EffectId);
}

/// Unit instantiation on resurrection completion
pub trait UnitSpawner {
    fn spawn(&mut self, unit: &UnitDef, pos: Vec3, team: TeamId) -> ObjectId;
}

/// Terrain height lookup for ground-snapping placements and forced moves
pub trait GroundMap {
    fn height_at(&self, x: f32, z: f32) -> f32;
}

/// Perfectly flat terrain at a fixed height
#[derive(Debug, Clone, Copy)]
pub struct FlatGround(pub f32);

impl GroundMap for FlatGround {
    fn height_at(&self, _x: f32, _z: f32) -> f32 {
        self.0
    }
}

/// Per-team metal/energy balances
#[derive(Debug, Default)]
pub struct SharedLedger {
    balances: AHashMap<(TeamId, ResourceKind), f32>,
}

impl SharedLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn balance(&self, team: TeamId, kind: ResourceKind) -> f32 {
        self.balances.get(&(team, kind)).copied().unwrap_or(0.0)
    }

    /// Seed a team's starting balance
    pub fn fund(&mut self, team: TeamId, kind: ResourceKind, amount: f32) {
        *self.balances.entry((team, kind)).or_insert(0.0) += amount;
    }
}

impl TeamLedger for SharedLedger {
    fn credit(&mut self, team: TeamId, kind: ResourceKind, amount: f32) {
        *self.balances.entry((team, kind)).or_insert(0.0) += amount;
    }

    fn try_debit(&mut self, team: TeamId, kind: ResourceKind, amount: f32) -> bool {
        let balance = self.balances.entry((team, kind)).or_insert(0.0);
        if *balance < amount {
            return false;
        }
        *balance -= amount;
        true
    }
}

/// One sight source for [`CircleLos`]
#[derive(Debug, Clone, Copy)]
pub struct LosEmitter {
    pub pos: Vec3,
    pub radius: f32,
    pub allyteam: AllyTeamId,
}

/// Radial line-of-sight: an alliance sees whatever is within range of one
/// of its emitters (distance on the ground plane)
#[derive(Debug, Default)]
pub struct CircleLos {
    emitters: Vec<LosEmitter>,
}

impl CircleLos {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_emitter(&mut self, emitter: LosEmitter) {
        self.emitters.push(emitter);
    }
}

impl LosQuery for CircleLos {
    fn in_los(&self, pos: Vec3, allyteam: AllyTeamId) -> bool {
        self.emitters.iter().any(|e| {
            let dx = e.pos.x - pos.x;
            let dz = e.pos.z - pos.z;
            e.allyteam == allyteam && dx * dx + dz * dz <= e.radius * e.radius
        })
    }
}

/// What a [`RecordedEffects`] sink saw
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EffectEvent {
    FireSpawned { effect: EffectId, pos: Vec3 },
    Smoke { pos: Vec3 },
    Explosion { pos: Vec3, impulse: Vec3 },
    Extinguished { effect: EffectId },
}

/// Effects sink that records everything, for tests and the headless demo
#[derive(Debug, Default)]
pub struct RecordedEffects {
    next_effect: u64,
    pub events: Vec<EffectEvent>,
}

impl RecordedEffects {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count<F: Fn(&EffectEvent) -> bool>(&self, pred: F) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }
}

impl EffectsSink for RecordedEffects {
    fn spawn_fire(&mut self, pos: Vec3) -> EffectId {
        let effect = EffectId(self.next_effect);
        self.next_effect += 1;
        self.events.push(EffectEvent::FireSpawned { effect, pos });
        effect
    }

    fn spawn_smoke(&mut self, pos: Vec3) {
        self.events.push(EffectEvent::Smoke { pos });
    }

    fn spawn_explosion(&mut self, pos: Vec3, impulse: Vec3) {
        self.events.push(EffectEvent::Explosion { pos, impulse });
    }

    fn extinguish(&mut self, effect: EffectId) {
        self.events.push(EffectEvent::Extinguished { effect });
    }
}

/// A unit created by [`RecordedSpawner`]
#[derive(Debug, Clone)]
pub struct SpawnedUnit {
    pub object: ObjectId,
    pub unit: String,
    pub pos: Vec3,
    pub team: TeamId,
}

/// Unit spawner that records spawn requests, for tests and the demo
#[derive(Debug, Default)]
pub struct RecordedSpawner {
    next_object: u32,
    pub spawned: Vec<SpawnedUnit>,
}

impl RecordedSpawner {
    pub fn new() -> Self {
        Self::default()
    }
}

impl UnitSpawner for RecordedSpawner {
    fn spawn(&mut self, unit: &UnitDef, pos: Vec3, team: TeamId) -> ObjectId {
        let object = ObjectId(self.next_object);
        self.next_object += 1;
        self.spawned.push(SpawnedUnit {
            object,
            unit: unit.name.clone(),
            pos,
            team,
        });
        object
    }
}
