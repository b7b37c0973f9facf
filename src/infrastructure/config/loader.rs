use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::Config;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid llm.workers: {0}. Must be at least 1")]
    InvalidWorkers(usize),

    #[error("invalid llm.high_cap/low_cap: {0}. Must be at least 1")]
    InvalidCap(usize),

    #[error("invalid threshold: disable_threshold ({0}) must be greater than enable_threshold ({1}), and both must be in [0,1]")]
    InvalidThresholds(f64, f64),

    #[error("invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("database path cannot be empty")]
    EmptyDatabasePath,

    #[error("invalid max_connections: {0}. Must be at least 1")]
    InvalidMaxConnections(u32),

    #[error("invalid workflow caps: max_ui ({0}) and max_bg ({1}) must both be at least 1")]
    InvalidWorkflowCaps(usize, usize),

    #[error("invalid hypothesis.screen_threshold: {0}. Must be in [0,1]")]
    InvalidScreenThreshold(f64),
}

/// Hierarchical configuration loader, matching the project's standard
/// defaults -> project file -> local file -> env-var precedence.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults.
    /// 2. `.cogcore/config.yaml` (project config).
    /// 3. `.cogcore/local.yaml` (project-local overrides, optional).
    /// 4. `COGCORE_*` environment variables (highest priority).
    pub fn load() -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(".cogcore/config.yaml"))
            .merge(Yaml::file(".cogcore/local.yaml"))
            .merge(Env::prefixed("COGCORE_").split("__"))
            .extract()
            .context("failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .with_context(|| format!("failed to load config from {}", path.as_ref().display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.llm.workers == 0 {
            return Err(ConfigError::InvalidWorkers(config.llm.workers));
        }
        if config.llm.high_cap == 0 || config.llm.low_cap == 0 {
            return Err(ConfigError::InvalidCap(0));
        }
        if !(0.0..=1.0).contains(&config.llm.disable_threshold)
            || !(0.0..=1.0).contains(&config.llm.enable_threshold)
            || config.llm.disable_threshold <= config.llm.enable_threshold
        {
            return Err(ConfigError::InvalidThresholds(
                config.llm.disable_threshold,
                config.llm.enable_threshold,
            ));
        }

        if config.database.path.is_empty() {
            return Err(ConfigError::EmptyDatabasePath);
        }
        if config.database.max_connections == 0 {
            return Err(ConfigError::InvalidMaxConnections(config.database.max_connections));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        if config.workflow.max_ui == 0 || config.workflow.max_bg == 0 {
            return Err(ConfigError::InvalidWorkflowCaps(
                config.workflow.max_ui,
                config.workflow.max_bg,
            ));
        }

        if !(0.0..=1.0).contains(&config.hypothesis.screen_threshold) {
            return Err(ConfigError::InvalidScreenThreshold(config.hypothesis.screen_threshold));
        }

        Ok(())
    }
}
