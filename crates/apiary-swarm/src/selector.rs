use std::collections::HashSet;

use apiary_core::SwarmAgent;
use tracing::{debug, info};

use crate::config::SelectionConfig;

/// Weighted whole-task suitability score for one candidate, 0–100.
///
/// Capability match carries 40 points, past performance 30, trust 20,
/// availability 10.
pub fn score_agent(required_capabilities: &[String], agent: &SwarmAgent) -> f64 {
    let capability_points = if required_capabilities.is_empty() {
        40.0
    } else {
        let matched = required_capabilities
            .iter()
            .filter(|tag| agent.has_capability(tag))
            .count();
        matched as f64 / required_capabilities.len() as f64 * 40.0
    };

    let performance_points = (0.4 * agent.completion_rate
        + 0.3 * agent.satisfaction_score
        + 0.3 * agent.collaboration_score)
        * 30.0;

    let trust_points = agent.trust_score * 20.0;
    let availability_points = agent.availability() * 10.0;

    (capability_points + performance_points + trust_points + availability_points).clamp(0.0, 100.0)
}

/// Coordinator fitness: role proficiency weighted highest, then how well the
/// agent collaborates, is trusted, and finishes what it takes on.
fn coordinator_score(agent: &SwarmAgent) -> f64 {
    0.4 * agent.coordinator_proficiency()
        + 0.3 * agent.collaboration_score
        + 0.2 * agent.trust_score
        + 0.1 * agent.completion_rate
}

/// Selects working sets of agents for decomposed tasks.
pub struct AgentSelector {
    config: SelectionConfig,
}

impl AgentSelector {
    /// Creates a selector with the given bounds.
    pub fn new(config: SelectionConfig) -> Self {
        Self { config }
    }

    /// Upper bound on swarm size for a task with `subtask_count` subtasks:
    /// `min(max_agents, max(min_agents, ceil(subtask_count / 2)))`.
    pub fn selection_limit(&self, subtask_count: usize) -> usize {
        let half = subtask_count.div_ceil(2);
        half.max(self.config.min_agents).min(self.config.max_agents)
    }

    /// Greedy diversity-seeking selection.
    ///
    /// Candidates are scored and walked in descending score order; one is
    /// accepted if it is the first, or if it covers at least one required
    /// capability tag no accepted agent covers yet. Selection stops at the
    /// limit. Zero candidates yield an empty selection — the orchestrator
    /// turns that into a fatal formation error.
    pub fn select_optimal_agents(
        &self,
        required_capabilities: &[String],
        subtask_count: usize,
        candidates: &[SwarmAgent],
    ) -> Vec<SwarmAgent> {
        let limit = self.selection_limit(subtask_count);

        let mut scored: Vec<(f64, &SwarmAgent)> = candidates
            .iter()
            .map(|agent| (score_agent(required_capabilities, agent), agent))
            .collect();
        // Stable sort keeps directory order among equal scores.
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        let mut selected: Vec<SwarmAgent> = Vec::new();
        let mut covered: HashSet<String> = HashSet::new();
        for (score, agent) in scored {
            if selected.len() >= limit {
                break;
            }
            let contributes: Vec<String> = required_capabilities
                .iter()
                .filter(|tag| agent.has_capability(tag))
                .map(|tag| tag.to_lowercase())
                .filter(|tag| !covered.contains(tag))
                .collect();

            if selected.is_empty() || !contributes.is_empty() {
                debug!(agent = %agent.id, score, new_tags = contributes.len(), "agent accepted");
                covered.extend(contributes);
                selected.push(agent.clone());
            }
        }

        info!(
            candidates = candidates.len(),
            selected = selected.len(),
            limit,
            "agent selection complete"
        );
        selected
    }

    /// Picks the coordinator among the selected agents.
    ///
    /// Returns `None` only for an empty selection.
    pub fn select_coordinator<'a>(&self, agents: &'a [SwarmAgent]) -> Option<&'a SwarmAgent> {
        agents.iter().max_by(|a, b| {
            coordinator_score(a)
                .partial_cmp(&coordinator_score(b))
                .unwrap_or(std::cmp::Ordering::Equal)
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use apiary_core::{AgentCapability, RolePreference};
    use uuid::Uuid;

    fn agent(name: &str, capabilities: &[&str]) -> SwarmAgent {
        SwarmAgent {
            id: Uuid::new_v4(),
            name: name.to_string(),
            capabilities: capabilities
                .iter()
                .map(|c| AgentCapability {
                    name: (*c).to_string(),
                    proficiency: 75,
                    domains: vec![],
                })
                .collect(),
            specializations: Vec::new(),
            trust_score: 0.8,
            collaboration_score: 0.7,
            completion_rate: 0.9,
            satisfaction_score: 0.8,
            current_load: 1,
            max_load: 4,
            preferred_roles: Vec::new(),
        }
    }

    fn selector() -> AgentSelector {
        AgentSelector::new(SelectionConfig::default())
    }

    #[test]
    fn test_score_is_clamped_and_weighted() {
        let required = vec!["research".to_string(), "analysis".to_string()];
        let full_match = agent("a", &["research", "analysis"]);
        let half_match = agent("b", &["research"]);
        let no_match = agent("c", &["juggling"]);

        let full = score_agent(&required, &full_match);
        let half = score_agent(&required, &half_match);
        let none = score_agent(&required, &no_match);
        assert!(full > half && half > none);
        assert!((full - half - 20.0).abs() < 1e-9);
        assert!((0.0..=100.0).contains(&full));
    }

    #[test]
    fn test_selection_limit_formula() {
        let s = selector();
        assert_eq!(s.selection_limit(1), 2);
        assert_eq!(s.selection_limit(4), 2);
        assert_eq!(s.selection_limit(5), 3);
        assert_eq!(s.selection_limit(7), 4);
        assert_eq!(s.selection_limit(10), 5);
        assert_eq!(s.selection_limit(30), 5);
    }

    #[test]
    fn test_capability_holders_selected_before_others() {
        // Five candidates, only two share any required capability.
        let required = vec!["research".to_string(), "summarization".to_string()];
        let matching_a = agent("researcher", &["research"]);
        let matching_b = agent("summarizer", &["summarization"]);
        let candidates = vec![
            agent("bystander-1", &["juggling"]),
            matching_a.clone(),
            agent("bystander-2", &["whittling"]),
            matching_b.clone(),
            agent("bystander-3", &["yodeling"]),
        ];

        let selected = selector().select_optimal_agents(&required, 6, &candidates);
        let names: Vec<&str> = selected.iter().map(|a| a.name.as_str()).collect();
        assert!(names.contains(&"researcher"));
        assert!(names.contains(&"summarizer"));
        // Once both tags are covered, remaining candidates add nothing new.
        assert_eq!(selected.len(), 2);
    }

    #[test]
    fn test_first_agent_accepted_even_without_match() {
        let required = vec!["translation".to_string()];
        let candidates = vec![agent("only-option", &["juggling"])];
        let selected = selector().select_optimal_agents(&required, 2, &candidates);
        assert_eq!(selected.len(), 1);
    }

    #[test]
    fn test_zero_candidates_yield_zero_agents() {
        let selected =
            selector().select_optimal_agents(&["research".to_string()], 4, &[]);
        assert!(selected.is_empty());
    }

    #[test]
    fn test_selection_respects_limit() {
        let required: Vec<String> = (0..10).map(|i| format!("cap{i}")).collect();
        let candidates: Vec<SwarmAgent> = (0..10)
            .map(|i| agent(&format!("a{i}"), &[&format!("cap{i}")]))
            .collect();
        // 10 subtasks -> limit min(5, max(2, 5)) = 5, even though every
        // candidate contributes a fresh capability.
        let selected = selector().select_optimal_agents(&required, 10, &candidates);
        assert_eq!(selected.len(), 5);
    }

    #[test]
    fn test_coordinator_prefers_declared_role() {
        let mut leader = agent("leader", &["research"]);
        leader.preferred_roles.push(RolePreference {
            role: "coordinator".to_string(),
            proficiency: 0.9,
        });
        leader.trust_score = 0.6;
        let follower = agent("follower", &["research"]);

        let agents = vec![follower, leader];
        let coordinator = selector().select_coordinator(&agents).unwrap();
        assert_eq!(coordinator.name, "leader");
    }

    #[test]
    fn test_coordinator_of_empty_selection_is_none() {
        assert!(selector().select_coordinator(&[]).is_none());
    }
}
