//! Goal deduplication fingerprint (spec §9): a stable hash of the goal's
//! normalized description, type, and domain, used by the goal store to
//! reject near-duplicate goals before they enter the active set.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::domain::models::GoalType;

const STOP_PREFIXES: &[&str] = &[
    "test hypothesis:",
    "investigate:",
    "explore:",
    "follow up on:",
];

/// Lower-cases, strips a leading stop-prefix if present, collapses
/// whitespace runs, and trims trailing punctuation.
fn normalize(description: &str) -> String {
    let lower = description.trim().to_lowercase();
    let stripped = STOP_PREFIXES
        .iter()
        .find_map(|prefix| lower.strip_prefix(prefix))
        .unwrap_or(&lower)
        .trim();

    let collapsed = stripped.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed
        .trim_end_matches(|c: char| c.is_ascii_punctuation())
        .to_string()
}

fn type_key(goal_type: GoalType) -> &'static str {
    match goal_type {
        GoalType::Curiosity => "curiosity",
        GoalType::HypothesisTest => "hypothesis_test",
        GoalType::Coherence => "coherence",
        GoalType::ActiveLearning => "active_learning",
        GoalType::User => "user",
        GoalType::WorkflowDiscovery => "workflow_discovery",
    }
}

/// Computes the deduplication fingerprint for a goal. Two descriptions that
/// differ only in case, whitespace, trailing punctuation, or a stop-prefix
/// produce the same fingerprint when type and domain also match.
pub fn compute(description: &str, goal_type: GoalType, domain: &str) -> String {
    let normalized_description = normalize(description);
    let mut hasher = DefaultHasher::new();
    normalized_description.hash(&mut hasher);
    type_key(goal_type).hash(&mut hasher);
    domain.trim().to_lowercase().hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_inputs_produce_identical_fingerprints() {
        let a = compute("Investigate the anomaly.", GoalType::Curiosity, "physics");
        let b = compute("investigate the anomaly", GoalType::Curiosity, "physics");
        assert_eq!(a, b);
    }

    #[test]
    fn stop_prefix_is_stripped() {
        let a = compute("Test hypothesis: the drift correlates with load", GoalType::HypothesisTest, "infra");
        let b = compute("the drift correlates with load", GoalType::HypothesisTest, "infra");
        assert_eq!(a, b);
    }

    #[test]
    fn whitespace_runs_are_collapsed() {
        let a = compute("explore   the   gap", GoalType::Curiosity, "physics");
        let b = compute("explore the gap", GoalType::Curiosity, "physics");
        assert_eq!(a, b);
    }

    #[test]
    fn different_domain_changes_fingerprint() {
        let a = compute("investigate the anomaly", GoalType::Curiosity, "physics");
        let b = compute("investigate the anomaly", GoalType::Curiosity, "chemistry");
        assert_ne!(a, b);
    }

    #[test]
    fn different_type_changes_fingerprint() {
        let a = compute("investigate the anomaly", GoalType::Curiosity, "physics");
        let b = compute("investigate the anomaly", GoalType::Coherence, "physics");
        assert_ne!(a, b);
    }
}
