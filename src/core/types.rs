//! Core type definitions used throughout the codebase

use serde::{Deserialize, Serialize};

/// Game tick counter (simulation time unit)
pub type Tick = u64;

/// Unique identifier for features, allocated by the world registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FeatureId(pub u32);

/// Identifier for any non-feature simulation object (unit, projectile, ...)
///
/// Objects are owned by their own registries; features only ever hold these
/// ids as weak back-references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectId(pub u32);

/// Team identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TeamId(pub i32);

/// Alliance identifier; teams in the same alliance share visibility
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AllyTeamId(pub i32);

impl AllyTeamId {
    /// The neutral ("gaia") alliance that owns unaligned world objects
    pub const GAIA: AllyTeamId = AllyTeamId(-1);

    pub fn is_gaia(&self) -> bool {
        *self == Self::GAIA
    }
}

/// Weapon definition identifier, used for per-weapon damage multipliers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WeaponId(pub u32);

/// Identifier for a footprint registration in the occupancy grid
///
/// Feature blocking ids live in a range offset past the unit id space so the
/// two kinds of blockers can share one grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockingId(pub u32);

/// Handle to an effect owned by the external effects system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EffectId(pub u64);

/// Kind of stored resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Metal,
    Energy,
}

/// Rotation around the world up-axis in 1/65536ths of a turn
///
/// Integer headings keep rotation state bit-exact across participants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Heading(pub i16);

impl Heading {
    pub fn radians(&self) -> f32 {
        (self.0 as f32) * (std::f32::consts::TAU / 65536.0)
    }

    /// Heading that points along the given world-space direction
    pub fn from_dir(dir: glam::Vec3) -> Self {
        let angle = dir.x.atan2(dir.z);
        Heading((angle * (65536.0 / std::f32::consts::TAU)) as i16)
    }
}

/// Build-facing quadrant (quarter turns), always in [0, 3]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Facing(u8);

impl Facing {
    pub fn new(quadrant: u8) -> Self {
        Facing(quadrant % 4)
    }

    pub fn quadrant(&self) -> u8 {
        self.0
    }

    pub fn radians(&self) -> f32 {
        (self.0 as f32) * std::f32::consts::FRAC_PI_2
    }
}
