//! Shared domain types, configuration, and vector math for jobsig.

mod app_config;
mod archetype;
mod config;
pub mod vectors;
pub mod version_store;

use thiserror::Error;

pub use app_config::{AppConfig, EngineConfig};
pub use archetype::{
    AlertKind, Archetype, MatchMethod, OutcomeStage, RoleType, SenderClass, Seniority,
};
pub use config::{load_app_config, load_app_config_from_env};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required env var: {0}")]
    MissingEnvVar(String),
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}
