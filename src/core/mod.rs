pub mod config;
pub mod error;
pub mod types;

pub use config::{FeatureVisibility, RulesFile, SimRules};
pub use error::{DefError, RulesError};
