use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use apiary_core::{SwarmAgent, TaskDecomposition};
use apiary_transport::SwarmTransport;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Penalty subtracted from an agent's relevance per subtask already
/// assigned to it during this pass. Discourages piling work on one agent.
const LOAD_PENALTY: f64 = 10.0;

/// Lowercased words of a piece of text, punctuation and separators stripped.
fn words(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() >= 3)
        .map(ToString::to_string)
        .collect()
}

fn overlap(description_words: &HashSet<String>, text: &str) -> usize {
    words(text)
        .iter()
        .filter(|w| description_words.contains(*w))
        .count()
}

/// How well `agent` fits one subtask description.
///
/// Capability terms that overlap the description weigh in at their
/// proficiency; specialization overlaps weigh in at 10 × the level
/// multiplier (novice 1 … master 4).
pub fn relevance(description: &str, agent: &SwarmAgent) -> f64 {
    let description_words = words(description);
    let mut score = 0.0;
    for capability in &agent.capabilities {
        let shared = overlap(&description_words, &capability.name);
        score += shared as f64 * f64::from(capability.proficiency);
    }
    for specialization in &agent.specializations {
        let shared = overlap(&description_words, &specialization.domain);
        score += shared as f64 * f64::from(specialization.level.multiplier()) * 10.0;
    }
    score
}

/// Maps every subtask of a decomposition onto one of the selected agents
/// and hands the assignments to the message transport.
pub struct TaskAssigner {
    transport: Arc<dyn SwarmTransport>,
}

impl TaskAssigner {
    /// Creates an assigner sending over `transport`.
    pub fn new(transport: Arc<dyn SwarmTransport>) -> Self {
        Self { transport }
    }

    /// Assigns subtasks greedily, in decomposition order.
    ///
    /// Each subtask goes to the agent maximizing
    /// `relevance − 10 × already_assigned_count`; the running counts live
    /// only for the duration of this pass. With no agents available every
    /// subtask is left unassigned for a later retry. Transport failures are
    /// logged, never raised: delivery guarantees belong to the transport.
    ///
    /// Returns the number of subtasks assigned.
    pub async fn assign(
        &self,
        session_id: Uuid,
        decomposition: &mut TaskDecomposition,
        agents: &[SwarmAgent],
    ) -> usize {
        if agents.is_empty() {
            warn!(session = %session_id, "no agents available, leaving subtasks unassigned");
            return 0;
        }

        let mut assigned_counts: HashMap<Uuid, usize> = HashMap::new();
        let mut assigned = 0usize;

        for subtask in &mut decomposition.subtasks {
            let chosen = agents
                .iter()
                .map(|agent| {
                    let load = *assigned_counts.get(&agent.id).unwrap_or(&0);
                    let score = relevance(&subtask.description, agent) - LOAD_PENALTY * load as f64;
                    (score, agent)
                })
                .max_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

            let Some((score, agent)) = chosen else {
                continue;
            };

            subtask.assigned_agent = Some(agent.id);
            *assigned_counts.entry(agent.id).or_insert(0) += 1;
            assigned += 1;
            debug!(subtask = %subtask.id, agent = %agent.id, score, "subtask assigned");

            if let Err(e) = self
                .transport
                .send_task_assignment(session_id, agent.id, subtask)
                .await
            {
                warn!(
                    subtask = %subtask.id,
                    agent = %agent.id,
                    error = %e,
                    "assignment handoff failed, transport will not retry"
                );
            }
        }

        info!(
            session = %session_id,
            assigned,
            total = decomposition.subtasks.len(),
            "task assignment complete"
        );
        assigned
    }
}
