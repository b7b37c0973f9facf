//! Configuration surface (spec §6.6), grouped by the component it governs.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration tree, loaded via the hierarchical
/// defaults -> project file -> local file -> env-var layering described
/// in `infrastructure::config`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub goal: GoalConfig,
    #[serde(default)]
    pub workflow: WorkflowConfig,
    #[serde(default)]
    pub autonomy: AutonomyConfig,
    #[serde(default)]
    pub coherence: CoherenceConfig,
    #[serde(default)]
    pub hypothesis: HypothesisConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            llm: LlmConfig::default(),
            goal: GoalConfig::default(),
            workflow: WorkflowConfig::default(),
            autonomy: AutonomyConfig::default(),
            coherence: CoherenceConfig::default(),
            hypothesis: HypothesisConfig::default(),
            database: DatabaseConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// LLM queue + auto-throttle configuration (spec §4.3, §4.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LlmConfig {
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_high_cap")]
    pub high_cap: usize,
    #[serde(default = "default_low_cap")]
    pub low_cap: usize,
    #[serde(default = "default_disable_threshold")]
    pub disable_threshold: f64,
    #[serde(default = "default_enable_threshold")]
    pub enable_threshold: f64,
    #[serde(default = "default_throttle_interval_secs")]
    pub throttle_interval_secs: u64,
    #[serde(default = "default_response_timeout_secs")]
    pub response_timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            high_cap: default_high_cap(),
            low_cap: default_low_cap(),
            disable_threshold: default_disable_threshold(),
            enable_threshold: default_enable_threshold(),
            throttle_interval_secs: default_throttle_interval_secs(),
            response_timeout_secs: default_response_timeout_secs(),
        }
    }
}

const fn default_workers() -> usize {
    2
}
const fn default_high_cap() -> usize {
    100
}
const fn default_low_cap() -> usize {
    50
}
const fn default_disable_threshold() -> f64 {
    0.90
}
const fn default_enable_threshold() -> f64 {
    0.50
}
const fn default_throttle_interval_secs() -> u64 {
    10
}
const fn default_response_timeout_secs() -> u64 {
    120
}

/// Goal poller configuration (spec §4.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct GoalConfig {
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_poll_backoff_cap_secs")]
    pub poll_backoff_cap_secs: u64,
    #[serde(default = "default_triggered_ttl_secs")]
    pub triggered_ttl_secs: u64,
    #[serde(default = "default_fetch_batch")]
    pub fetch_batch: usize,
    /// Scoring bonus terms (spec §4.6.2 "technical-term bonus").
    #[serde(default = "default_important_terms")]
    pub important_terms: Vec<String>,
    /// Scoring penalty terms (spec §4.6.2).
    #[serde(default = "default_generic_terms")]
    pub generic_terms: Vec<String>,
}

impl Default for GoalConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            poll_backoff_cap_secs: default_poll_backoff_cap_secs(),
            triggered_ttl_secs: default_triggered_ttl_secs(),
            fetch_batch: default_fetch_batch(),
            important_terms: default_important_terms(),
            generic_terms: default_generic_terms(),
        }
    }
}

const fn default_poll_interval_secs() -> u64 {
    2
}
const fn default_poll_backoff_cap_secs() -> u64 {
    60
}
const fn default_triggered_ttl_secs() -> u64 {
    30 * 60
}
const fn default_fetch_batch() -> usize {
    50
}
fn default_important_terms() -> Vec<String> {
    ["vulnerability", "outage", "breach", "exploit", "regulatory", "earnings"]
        .into_iter()
        .map(String::from)
        .collect()
}
fn default_generic_terms() -> Vec<String> {
    ["update", "news", "report", "general"].into_iter().map(String::from).collect()
}

/// Workflow engine configuration (spec §4.7).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct WorkflowConfig {
    #[serde(default = "default_max_ui")]
    pub max_ui: usize,
    #[serde(default = "default_max_bg")]
    pub max_bg: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            max_ui: default_max_ui(),
            max_bg: default_max_bg(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

const fn default_max_ui() -> usize {
    4
}
const fn default_max_bg() -> usize {
    2
}
const fn default_timeout_secs() -> u64 {
    10 * 60
}

/// Autonomy cycle configuration (spec §4.9).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AutonomyConfig {
    #[serde(default = "default_autonomy_interval_secs")]
    pub interval_secs: u64,
}

impl Default for AutonomyConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_autonomy_interval_secs(),
        }
    }
}

const fn default_autonomy_interval_secs() -> u64 {
    300
}

/// Coherence monitor configuration (spec §4.10).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CoherenceConfig {
    #[serde(default = "default_coherence_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_beliefs_per_domain")]
    pub beliefs_per_domain: usize,
    #[serde(default = "default_drift_threshold_secs")]
    pub drift_threshold_secs: u64,
    #[serde(default = "default_loop_repeat_count")]
    pub loop_repeat_count: usize,
}

impl Default for CoherenceConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_coherence_interval_secs(),
            beliefs_per_domain: default_beliefs_per_domain(),
            drift_threshold_secs: default_drift_threshold_secs(),
            loop_repeat_count: default_loop_repeat_count(),
        }
    }
}

const fn default_coherence_interval_secs() -> u64 {
    300
}
const fn default_beliefs_per_domain() -> usize {
    10
}
const fn default_drift_threshold_secs() -> u64 {
    24 * 60 * 60
}
const fn default_loop_repeat_count() -> usize {
    5
}

/// Hypothesis screening configuration (spec §4.9 step 4).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct HypothesisConfig {
    #[serde(default = "default_screen_threshold")]
    pub screen_threshold: f64,
}

impl Default for HypothesisConfig {
    fn default() -> Self {
        Self {
            screen_threshold: default_screen_threshold(),
        }
    }
}

const fn default_screen_threshold() -> f64 {
    0.6
}

/// Durable storage configuration for the goal store and workflow engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DatabaseConfig {
    #[serde(default = "default_database_path")]
    pub path: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            max_connections: default_max_connections(),
        }
    }
}

fn default_database_path() -> String {
    ".cogcore/cogcore.db".to_string()
}
const fn default_max_connections() -> u32 {
    10
}

/// Logging configuration. Defined here (rather than in `infrastructure`)
/// so that `Config` stays a single self-contained serde root;
/// `infrastructure::logging` consumes this type rather than defining its
/// own.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
    pub log_dir: Option<PathBuf>,
    #[serde(default = "default_true")]
    pub enable_stdout: bool,
    #[serde(default)]
    pub rotation: RotationPolicy,
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            log_dir: None,
            enable_stdout: true,
            rotation: RotationPolicy::default(),
            retention_days: default_retention_days(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RotationPolicy {
    #[default]
    Daily,
    Hourly,
    Never,
}

fn default_log_level() -> String {
    "info".to_string()
}
fn default_true() -> bool {
    true
}
const fn default_retention_days() -> i64 {
    30
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_table() {
        let cfg = Config::default();
        assert_eq!(cfg.llm.workers, 2);
        assert_eq!(cfg.llm.high_cap, 100);
        assert_eq!(cfg.llm.low_cap, 50);
        assert!((cfg.llm.disable_threshold - 0.90).abs() < f64::EPSILON);
        assert!((cfg.llm.enable_threshold - 0.50).abs() < f64::EPSILON);
        assert_eq!(cfg.goal.poll_interval_secs, 2);
        assert_eq!(cfg.goal.poll_backoff_cap_secs, 60);
        assert_eq!(cfg.goal.triggered_ttl_secs, 1800);
        assert_eq!(cfg.workflow.max_ui, 4);
        assert_eq!(cfg.workflow.max_bg, 2);
        assert_eq!(cfg.workflow.timeout_secs, 600);
        assert_eq!(cfg.autonomy.interval_secs, 300);
        assert_eq!(cfg.coherence.interval_secs, 300);
        assert_eq!(cfg.coherence.beliefs_per_domain, 10);
        assert!((cfg.hypothesis.screen_threshold - 0.6).abs() < f64::EPSILON);
    }
}
