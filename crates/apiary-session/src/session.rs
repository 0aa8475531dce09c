use std::collections::{HashMap, HashSet};

use apiary_core::{AgentMessage, ApiaryError, ApiaryResult, ComplexTask, MessageType, SubTaskStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle state of a [`SwarmSession`].
///
/// `forming → active → completing → {completed, dissolved, error}`.
/// Dissolution and errors may also occur directly from `active`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// The swarm is being assembled.
    Forming,
    /// Agents are executing subtasks.
    Active,
    /// Work is winding down.
    Completing,
    /// All work finished.
    Completed,
    /// The swarm was dissolved.
    Dissolved,
    /// The session ended in an error; retained for inspection.
    Error,
}

impl SessionStatus {
    /// Whether the session can move from `self` to `next`.
    pub fn can_transition(self, next: SessionStatus) -> bool {
        matches!(
            (self, next),
            (SessionStatus::Forming, SessionStatus::Active)
                | (SessionStatus::Forming, SessionStatus::Error)
                | (SessionStatus::Active, SessionStatus::Completing)
                | (SessionStatus::Active, SessionStatus::Dissolved)
                | (SessionStatus::Active, SessionStatus::Error)
                | (SessionStatus::Completing, SessionStatus::Completed)
                | (SessionStatus::Completing, SessionStatus::Dissolved)
                | (SessionStatus::Completing, SessionStatus::Error)
        )
    }

    /// Whether this state is terminal (never rehydrated into memory).
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SessionStatus::Completed | SessionStatus::Dissolved | SessionStatus::Error
        )
    }
}

/// A result record produced by an agent for one subtask.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwarmResult {
    /// The subtask the result belongs to.
    pub subtask_id: Uuid,
    /// The agent that produced it.
    pub agent_id: Uuid,
    /// Result payload.
    pub payload: serde_json::Value,
    /// When the result was recorded.
    pub recorded_at: DateTime<Utc>,
}

/// Final performance metrics computed when a swarm is dissolved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwarmPerformanceMetrics {
    /// Wall-clock lifetime of the session in seconds.
    pub total_duration_secs: i64,
    /// Per-agent share of all messages sent, 0.0–1.0.
    pub agent_utilization: HashMap<Uuid, f64>,
    /// Ratio of distinct message types used to all message types.
    pub communication_efficiency: f64,
    /// Fraction of subtasks completed.
    pub task_completion_rate: f64,
    /// Ratio of coordination/data-share/handoff messages to all messages.
    pub collaboration_score: f64,
}

impl SwarmPerformanceMetrics {
    /// Computes final metrics from a session's log and decomposition.
    ///
    /// A session with zero messages yields zero communication efficiency and
    /// zero collaboration score rather than dividing by zero.
    pub fn from_session(session: &SwarmSession) -> Self {
        let total_duration_secs = (session
            .completed_at
            .unwrap_or_else(Utc::now)
            - session.created_at)
            .num_seconds();

        let total_messages = session.message_log.len();
        let mut per_agent: HashMap<Uuid, usize> = HashMap::new();
        let mut types_seen: HashSet<MessageType> = HashSet::new();
        let mut collaborative = 0usize;
        for msg in &session.message_log {
            *per_agent.entry(msg.sender).or_insert(0) += 1;
            types_seen.insert(msg.message_type);
            if msg.message_type.is_collaborative() {
                collaborative += 1;
            }
        }

        let agent_utilization = if total_messages == 0 {
            HashMap::new()
        } else {
            // Silent members still show up, at zero share.
            for &agent_id in &session.agent_ids {
                per_agent.entry(agent_id).or_insert(0);
            }
            per_agent
                .into_iter()
                .map(|(id, n)| (id, n as f64 / total_messages as f64))
                .collect()
        };

        let communication_efficiency = if total_messages == 0 {
            0.0
        } else {
            types_seen.len() as f64 / MessageType::COUNT as f64
        };

        let collaboration_score = if total_messages == 0 {
            0.0
        } else {
            collaborative as f64 / total_messages as f64
        };

        let task_completion_rate = session
            .task
            .decomposition
            .as_ref()
            .map_or(0.0, |d| {
                if d.subtasks.is_empty() {
                    0.0
                } else {
                    let completed = d
                        .subtasks
                        .iter()
                        .filter(|s| s.status == SubTaskStatus::Completed)
                        .count();
                    completed as f64 / d.subtasks.len() as f64
                }
            });

        Self {
            total_duration_secs,
            agent_utilization,
            communication_efficiency,
            task_completion_rate,
            collaboration_score,
        }
    }
}

/// The aggregate root for one swarm's mutable state.
///
/// Created by the orchestrator on formation, mutated only while holding the
/// session's lock, and terminated (dissolved or errored) by the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwarmSession {
    /// Unique session identifier.
    pub id: Uuid,
    /// The user the swarm works for.
    pub user_id: Uuid,
    /// Agents participating in the swarm.
    pub agent_ids: Vec<Uuid>,
    /// The designated coordinator agent.
    pub coordinator: Uuid,
    /// The task being executed, including its decomposition.
    pub task: ComplexTask,
    /// Lifecycle status.
    pub status: SessionStatus,
    /// Append-only message log, in causal send order.
    #[serde(default)]
    pub message_log: Vec<AgentMessage>,
    /// When the session was created.
    pub created_at: DateTime<Utc>,
    /// When the session last saw activity.
    pub last_activity: DateTime<Utc>,
    /// When the session reached a terminal state.
    pub completed_at: Option<DateTime<Utc>>,
    /// Accumulated subtask results.
    #[serde(default)]
    pub results: Vec<SwarmResult>,
    /// Final metrics, set at dissolution.
    pub performance: Option<SwarmPerformanceMetrics>,
}

impl SwarmSession {
    /// Creates a forming session for `task` with the given agents.
    pub fn new(user_id: Uuid, agent_ids: Vec<Uuid>, coordinator: Uuid, task: ComplexTask) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            agent_ids,
            coordinator,
            task,
            status: SessionStatus::Forming,
            message_log: Vec::new(),
            created_at: now,
            last_activity: now,
            completed_at: None,
            results: Vec::new(),
            performance: None,
        }
    }

    /// Appends a message to the log and bumps `last_activity`.
    pub fn append_message(&mut self, message: AgentMessage) {
        self.last_activity = Utc::now();
        self.message_log.push(message);
    }

    /// Bumps `last_activity`.
    pub fn touch(&mut self) {
        self.last_activity = Utc::now();
    }

    /// Moves the session to `next`, enforcing the lifecycle state machine
    /// and stamping `completed_at` on terminal states.
    pub fn set_status(&mut self, next: SessionStatus) -> ApiaryResult<()> {
        if !self.status.can_transition(next) {
            return Err(ApiaryError::Session(format!(
                "illegal session transition {:?} -> {:?} for {}",
                self.status, next, self.id
            )));
        }
        if next.is_terminal() {
            self.completed_at = Some(Utc::now());
        }
        self.status = next;
        self.touch();
        Ok(())
    }

    /// Number of messages in the log.
    pub fn message_count(&self) -> usize {
        self.message_log.len()
    }

    /// Records a subtask result.
    pub fn add_result(&mut self, result: SwarmResult) {
        self.last_activity = Utc::now();
        self.results.push(result);
    }

    /// Timestamp of the most recent message sent by `agent`, if any.
    pub fn last_message_from(&self, agent: Uuid) -> Option<DateTime<Utc>> {
        self.message_log
            .iter()
            .rev()
            .find(|m| m.sender == agent)
            .map(|m| m.timestamp)
    }

    /// How many subtasks are currently assigned to `agent` and not finished.
    pub fn open_assignments(&self, agent: Uuid) -> usize {
        self.task.decomposition.as_ref().map_or(0, |d| {
            d.subtasks
                .iter()
                .filter(|s| s.assigned_agent == Some(agent) && !s.status.is_terminal())
                .count()
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use apiary_core::{MessagePriority, Recipient, SubTask, TaskDecomposition, TaskPriority};

    fn test_session() -> SwarmSession {
        let a1 = Uuid::new_v4();
        let a2 = Uuid::new_v4();
        let task = ComplexTask::new("analyze logs", TaskPriority::Medium);
        SwarmSession::new(Uuid::new_v4(), vec![a1, a2], a1, task)
    }

    fn message(session: &SwarmSession, sender: Uuid, message_type: MessageType) -> AgentMessage {
        AgentMessage::new(
            sender,
            Recipient::Broadcast,
            message_type,
            serde_json::json!({}),
            session.id,
        )
    }

    #[test]
    fn test_lifecycle_happy_path() {
        let mut session = test_session();
        assert_eq!(session.status, SessionStatus::Forming);
        session.set_status(SessionStatus::Active).unwrap();
        session.set_status(SessionStatus::Completing).unwrap();
        session.set_status(SessionStatus::Completed).unwrap();
        assert!(session.completed_at.is_some());
    }

    #[test]
    fn test_no_resurrection_from_terminal() {
        let mut session = test_session();
        session.set_status(SessionStatus::Active).unwrap();
        session.set_status(SessionStatus::Dissolved).unwrap();
        assert!(session.set_status(SessionStatus::Active).is_err());
        assert_eq!(session.status, SessionStatus::Dissolved);
    }

    #[test]
    fn test_forming_cannot_skip_to_completed() {
        let mut session = test_session();
        assert!(session.set_status(SessionStatus::Completed).is_err());
    }

    #[test]
    fn test_append_bumps_activity() {
        let mut session = test_session();
        let before = session.last_activity;
        let sender = session.agent_ids[0];
        std::thread::sleep(std::time::Duration::from_millis(5));
        session.append_message(message(&session, sender, MessageType::StatusUpdate));
        assert!(session.last_activity > before);
        assert_eq!(session.message_count(), 1);
    }

    #[test]
    fn test_metrics_with_zero_messages() {
        let session = test_session();
        let metrics = SwarmPerformanceMetrics::from_session(&session);
        assert_eq!(metrics.communication_efficiency, 0.0);
        assert_eq!(metrics.collaboration_score, 0.0);
        assert!(metrics.agent_utilization.is_empty());
    }

    #[test]
    fn test_metrics_utilization_and_collaboration() {
        let mut session = test_session();
        let a1 = session.agent_ids[0];
        let a2 = session.agent_ids[1];
        session.append_message(message(&session, a1, MessageType::Coordination));
        session.append_message(message(&session, a1, MessageType::DataShare));
        session.append_message(message(&session, a2, MessageType::StatusUpdate));
        session.append_message(message(&session, a1, MessageType::StatusUpdate));

        let metrics = SwarmPerformanceMetrics::from_session(&session);
        assert!((metrics.agent_utilization[&a1] - 0.75).abs() < 1e-9);
        assert!((metrics.agent_utilization[&a2] - 0.25).abs() < 1e-9);
        // 3 distinct types out of 6, half the traffic collaborative.
        assert!((metrics.communication_efficiency - 0.5).abs() < 1e-9);
        assert!((metrics.collaboration_score - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_metrics_completion_rate() {
        let mut session = test_session();
        let parent = session.task.id;
        let mut done = SubTask::new(parent, "done");
        done.transition(apiary_core::SubTaskStatus::InProgress).unwrap();
        done.transition(apiary_core::SubTaskStatus::Completed).unwrap();
        let pending = SubTask::new(parent, "pending");
        session.task.decomposition = Some(TaskDecomposition {
            subtasks: vec![done, pending],
            dependencies: Vec::new(),
            estimated_complexity: 3,
            required_capabilities: Vec::new(),
        });

        let metrics = SwarmPerformanceMetrics::from_session(&session);
        assert!((metrics.task_completion_rate - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_open_assignments() {
        let mut session = test_session();
        let agent = session.agent_ids[0];
        let parent = session.task.id;
        let mut assigned = SubTask::new(parent, "a");
        assigned.assigned_agent = Some(agent);
        let mut finished = SubTask::new(parent, "b");
        finished.assigned_agent = Some(agent);
        finished.transition(apiary_core::SubTaskStatus::InProgress).unwrap();
        finished.transition(apiary_core::SubTaskStatus::Completed).unwrap();
        session.task.decomposition = Some(TaskDecomposition {
            subtasks: vec![assigned, finished],
            dependencies: Vec::new(),
            estimated_complexity: 2,
            required_capabilities: Vec::new(),
        });
        assert_eq!(session.open_assignments(agent), 1);
    }

    #[test]
    fn test_high_priority_handoff_shape() {
        let session = test_session();
        let msg = message(&session, session.coordinator, MessageType::ResultHandoff)
            .with_priority(MessagePriority::High)
            .require_response();
        assert!(msg.requires_response);
        assert_eq!(msg.priority, MessagePriority::High);
    }
}
