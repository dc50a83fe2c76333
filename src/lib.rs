//! Wreckfield - deterministic feature simulation core
//!
//! Features are the non-unit world objects of a lockstep RTS session:
//! wreckage, rocks, tree stumps, resource deposits. This crate owns their
//! lifecycle (damage, fire, decay), the reclaim/repair/resurrect economy,
//! the visibility policy and the deferred occupancy protocol that lets the
//! per-feature update phase run on worker threads without desyncing.

pub mod core;
pub mod defs;
pub mod feature;
pub mod simulation;
pub mod spatial;
