//! Simulation orchestration: the feature world and its collaborator contracts

pub mod collaborators;
pub mod world;

pub use collaborators::{
    CircleLos, EffectEvent, EffectsSink, FlatGround, GroundMap, LosEmitter, RecordedEffects,
    RecordedSpawner, SharedLedger, SpawnedUnit, UnitSpawner,
};
pub use world::{FeatureWorld, SimEvent};
