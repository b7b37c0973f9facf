//! Domain models: pure entities and value types, no infrastructure concerns.

pub mod config;
pub mod feedback;
pub mod goal;
pub mod llm_request;
pub mod queue_stats;
pub mod workflow;

pub use config::{
    AutonomyConfig, CoherenceConfig, Config, DatabaseConfig, GoalConfig, HypothesisConfig,
    LlmConfig, LogFormat, LoggingConfig, RotationPolicy, WorkflowConfig,
};
pub use feedback::{ExplorationHeuristics, FeedbackRecord, HypothesisOutcome};
pub use goal::{Goal, GoalStatus, GoalType};
pub use llm_request::{LlmOptions, LlmPriority, LlmRequest};
pub use queue_stats::QueueStats;
pub use workflow::{Artifact, Workflow, WorkflowStatus, WorkflowStep, WorkflowStepStatus};
