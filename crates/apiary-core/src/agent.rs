use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiaryResult;

/// A named capability an agent advertises.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentCapability {
    /// Capability name, e.g. `data_analysis`.
    pub name: String,
    /// Proficiency from 0 to 100.
    pub proficiency: u8,
    /// Knowledge domains this capability applies to.
    #[serde(default)]
    pub domains: Vec<String>,
}

/// Depth of an agent's expertise in one domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpecializationLevel {
    /// Just getting started.
    Novice,
    /// Solid working knowledge.
    Intermediate,
    /// Deep, reliable expertise.
    Expert,
    /// Authoritative in the domain.
    Master,
}

impl SpecializationLevel {
    /// Relevance multiplier used when matching subtasks to specializations.
    pub fn multiplier(self) -> u32 {
        match self {
            SpecializationLevel::Novice => 1,
            SpecializationLevel::Intermediate => 2,
            SpecializationLevel::Expert => 3,
            SpecializationLevel::Master => 4,
        }
    }
}

/// An agent's declared specialization in one domain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSpecialization {
    /// The domain, e.g. `financial modelling`.
    pub domain: String,
    /// How deep the expertise runs.
    pub level: SpecializationLevel,
}

/// A coordination role the agent prefers, with its proficiency in that role.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RolePreference {
    /// Role name, e.g. `coordinator`.
    pub role: String,
    /// Proficiency in the role, 0.0–1.0.
    pub proficiency: f64,
}

/// A candidate worker agent, as returned by the agent directory.
///
/// Apiary consumes these records but does not own them: the directory is the
/// source of truth for capabilities and scores.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwarmAgent {
    /// Unique agent identifier.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Advertised capabilities.
    #[serde(default)]
    pub capabilities: Vec<AgentCapability>,
    /// Declared domain specializations.
    #[serde(default)]
    pub specializations: Vec<AgentSpecialization>,
    /// How much past collaborators trust this agent, 0.0–1.0.
    pub trust_score: f64,
    /// How well the agent cooperates in groups, 0.0–1.0.
    pub collaboration_score: f64,
    /// Fraction of accepted work the agent has completed, 0.0–1.0.
    pub completion_rate: f64,
    /// Satisfaction reported by requesters, 0.0–1.0.
    pub satisfaction_score: f64,
    /// Number of swarms the agent is currently working in.
    pub current_load: u32,
    /// Maximum number of concurrent swarms the agent accepts.
    pub max_load: u32,
    /// Preferred coordination roles with per-role proficiency.
    #[serde(default)]
    pub preferred_roles: Vec<RolePreference>,
}

impl SwarmAgent {
    /// Remaining availability as a fraction: `max(0, 1 − current/max)`.
    ///
    /// An agent with `max_load == 0` is treated as fully loaded.
    pub fn availability(&self) -> f64 {
        if self.max_load == 0 {
            return 0.0;
        }
        (1.0 - f64::from(self.current_load) / f64::from(self.max_load)).max(0.0)
    }

    /// Case-insensitive fuzzy match: does any capability name contain `tag`,
    /// or `tag` contain the capability name?
    pub fn has_capability(&self, tag: &str) -> bool {
        let tag = tag.to_lowercase();
        self.capabilities.iter().any(|c| {
            let name = c.name.to_lowercase();
            name.contains(&tag) || tag.contains(&name)
        })
    }

    /// Proficiency in the coordinator role, or 0.0 if none declared.
    pub fn coordinator_proficiency(&self) -> f64 {
        self.preferred_roles
            .iter()
            .find(|r| r.role.eq_ignore_ascii_case("coordinator"))
            .map_or(0.0, |r| r.proficiency)
    }
}

/// How the directory should rank the candidates it returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortPreference {
    /// Best overall capability match first.
    BestMatch,
    /// Most available first.
    MostAvailable,
    /// Highest trust first.
    MostTrusted,
}

/// Criteria for an agent-directory candidate query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateCriteria {
    /// Capability tags the task needs.
    pub capabilities: Vec<String>,
    /// Maximum number of candidates to return.
    pub max_results: usize,
    /// Only return agents with spare load.
    pub available_only: bool,
    /// Ranking preference.
    pub sort_by: SortPreference,
}

impl CandidateCriteria {
    /// Criteria asking for available agents matching the given tags,
    /// best match first.
    pub fn for_capabilities(capabilities: Vec<String>, max_results: usize) -> Self {
        Self {
            capabilities,
            max_results,
            available_only: true,
            sort_by: SortPreference::BestMatch,
        }
    }
}

/// Boundary trait for the external agent directory.
#[async_trait]
pub trait AgentDirectory: Send + Sync {
    /// Finds candidate agents matching `criteria`, scoped to `user_id`.
    async fn find_candidates(
        &self,
        criteria: &CandidateCriteria,
        user_id: Uuid,
    ) -> ApiaryResult<Vec<SwarmAgent>>;
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn agent_with_load(current: u32, max: u32) -> SwarmAgent {
        SwarmAgent {
            id: Uuid::new_v4(),
            name: "worker".to_string(),
            capabilities: vec![AgentCapability {
                name: "data_analysis".to_string(),
                proficiency: 80,
                domains: vec![],
            }],
            specializations: Vec::new(),
            trust_score: 0.9,
            collaboration_score: 0.8,
            completion_rate: 0.95,
            satisfaction_score: 0.85,
            current_load: current,
            max_load: max,
            preferred_roles: Vec::new(),
        }
    }

    #[test]
    fn test_availability() {
        assert!((agent_with_load(1, 4).availability() - 0.75).abs() < 1e-9);
        assert_eq!(agent_with_load(4, 4).availability(), 0.0);
        // Over-committed agents clamp to zero rather than going negative.
        assert_eq!(agent_with_load(6, 4).availability(), 0.0);
        assert_eq!(agent_with_load(0, 0).availability(), 0.0);
    }

    #[test]
    fn test_fuzzy_capability_match() {
        let agent = agent_with_load(0, 2);
        assert!(agent.has_capability("analysis"));
        assert!(agent.has_capability("DATA_ANALYSIS"));
        assert!(agent.has_capability("data_analysis_advanced"));
        assert!(!agent.has_capability("translation"));
    }

    #[test]
    fn test_coordinator_proficiency_defaults_to_zero() {
        let mut agent = agent_with_load(0, 2);
        assert_eq!(agent.coordinator_proficiency(), 0.0);
        agent.preferred_roles.push(RolePreference {
            role: "Coordinator".to_string(),
            proficiency: 0.7,
        });
        assert!((agent.coordinator_proficiency() - 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_specialization_multipliers() {
        assert_eq!(SpecializationLevel::Novice.multiplier(), 1);
        assert_eq!(SpecializationLevel::Master.multiplier(), 4);
    }
}
