use thiserror::Error;

/// Fatal session-rules validation errors
///
/// Raised once at session start, before any feature is instantiated. There is
/// no recovery path: a participant with different rules would desync.
#[derive(Error, Debug)]
pub enum RulesError {
    #[error("invalid rules: featureVisibility {0}, valid range is 0..3")]
    FeatureVisibilityOutOfRange(u32),

    #[error("invalid rules: losMipLevel {0}, valid range is 0..6")]
    LosMipLevelOutOfRange(u32),

    #[error("invalid rules: airMipLevel {0}, valid range is 0..30")]
    AirMipLevelOutOfRange(u32),

    #[error("malformed rules file: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Definition registry loading errors
#[derive(Error, Debug)]
pub enum DefError {
    #[error("unknown feature definition: {0}")]
    UnknownFeature(String),

    #[error("feature '{feature}' resurrects to unknown unit definition '{unit}'")]
    UnknownResurrectTarget { feature: String, unit: String },

    #[error("duplicate definition name: {0}")]
    Duplicate(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("malformed definition file: {0}")]
    Malformed(#[from] serde_json::Error),
}

pub type Result<T, E = DefError> = std::result::Result<T, E>;
