//! Application services implementing the cognitive orchestration
//! components (C3-C11): the priority LLM queue and its auto-throttle,
//! the goal pipeline (poller/dispatcher, workflow engine, tool
//! executor), and the autonomy/coherence/learning loop.

pub mod autonomy_cycle;
pub mod auto_throttle;
pub mod coherence_monitor;
pub mod fingerprint;
pub mod goal_poller;
pub mod learning_feedback;
pub mod llm_queue;
pub mod tool_executor;
pub mod workflow_engine;

pub use autonomy_cycle::{ActiveLearningGenerator, AutonomyCycle, CandidateGenerator, CandidateGoal, GapFillingGenerator, HypothesisGenerator};
pub use auto_throttle::AutoThrottle;
pub use coherence_monitor::{Belief, CoherenceMonitor, Inconsistency, Strategy};
pub use goal_poller::{classify, score, GoalPoller, RoutingHint, ScoringStats};
pub use learning_feedback::LearningFeedback;
pub use llm_queue::{LlmCallback, LlmQueue};
pub use tool_executor::{allow_all_gate, GatedToolExecutor, PolicyGate};
pub use workflow_engine::WorkflowEngine;
