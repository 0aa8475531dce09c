use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Overall health band, derived from a deducted 0–100 score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthBand {
    /// Score ≥ 90.
    Excellent,
    /// Score ≥ 75.
    Good,
    /// Score ≥ 60.
    Fair,
    /// Score ≥ 40.
    Poor,
    /// Everything below.
    Critical,
}

impl HealthBand {
    /// Maps a deducted score into its band.
    pub fn from_score(score: f64) -> Self {
        if score >= 90.0 {
            HealthBand::Excellent
        } else if score >= 75.0 {
            HealthBand::Good
        } else if score >= 60.0 {
            HealthBand::Fair
        } else if score >= 40.0 {
            HealthBand::Poor
        } else {
            HealthBand::Critical
        }
    }
}

/// Health state of one agent, evaluated in fixed priority order:
/// unresponsive → overloaded → idle → error; default active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentHealthStatus {
    /// Messaging recently and within load limits.
    Active,
    /// No traffic for over a minute.
    Idle,
    /// Too many open assignments.
    Overloaded,
    /// Silent for over five minutes.
    Unresponsive,
    /// Error rate above threshold.
    Error,
}

/// Point-in-time health of one agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentHealth {
    /// The agent.
    pub agent_id: Uuid,
    /// Derived status.
    pub status: AgentHealthStatus,
    /// When the agent last sent a message, if ever.
    pub last_seen: Option<DateTime<Utc>>,
    /// Unfinished subtasks currently assigned to the agent.
    pub open_assignments: usize,
}

/// Communication metrics over the session's message log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommunicationHealth {
    /// Total messages in the log.
    pub message_count: usize,
    /// Mean latency of answered request/response pairs, if any exist.
    pub avg_response_latency_ms: Option<f64>,
    /// Fraction of messages that failed to deliver (telemetry probe).
    pub failed_message_rate: f64,
    /// Ratio of coordination/result-handoff/data-share messages to all.
    pub coordination_efficiency: f64,
    /// Agents responsible for an outsized share of all messages.
    pub bottleneck_agents: Vec<Uuid>,
}

/// Progress metrics over the session's subtask graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskProgressHealth {
    /// Completed subtasks.
    pub completed: usize,
    /// All subtasks.
    pub total: usize,
    /// Failed subtasks blocking downstream work.
    pub blocked: Vec<Uuid>,
    /// Estimated minutes of work remaining.
    pub estimated_minutes_remaining: f64,
    /// Completed / total.
    pub critical_path_progress: f64,
}

/// Broad classification of a detected issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueKind {
    /// Latency, low coordination, delivery problems.
    Communication,
    /// Agents not responding or the session running long.
    Performance,
    /// Load imbalance.
    Resource,
    /// Failed subtasks blocking the graph.
    Logic,
}

/// Severity of a detected issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueSeverity {
    /// Worth noting.
    Low,
    /// Should be addressed.
    Medium,
    /// Degrading the swarm.
    High,
    /// Threatening the session.
    Critical,
}

/// A detected problem with suggested corrective actions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwarmIssue {
    /// Classification.
    pub kind: IssueKind,
    /// Severity.
    pub severity: IssueSeverity,
    /// Human-readable description.
    pub description: String,
    /// Agents involved, if any.
    pub affected_agents: Vec<Uuid>,
    /// Suggested remediations, fed into the report's recommendations.
    pub suggested_actions: Vec<String>,
}

/// A point-in-time, non-persisted health snapshot of one session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwarmHealthReport {
    /// The session assessed.
    pub session_id: Uuid,
    /// When the assessment ran.
    pub generated_at: DateTime<Utc>,
    /// Deducted score, 0–100.
    pub score: f64,
    /// Band for the score.
    pub overall: HealthBand,
    /// Per-agent statuses.
    pub agents: Vec<AgentHealth>,
    /// Communication metrics.
    pub communication: CommunicationHealth,
    /// Progress metrics.
    pub progress: TaskProgressHealth,
    /// Detected issues.
    pub issues: Vec<SwarmIssue>,
    /// Deduplicated suggested actions of critical/high issues (capped),
    /// or a single all-clear message.
    pub recommendations: Vec<String>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_band_boundaries() {
        assert_eq!(HealthBand::from_score(100.0), HealthBand::Excellent);
        assert_eq!(HealthBand::from_score(90.0), HealthBand::Excellent);
        assert_eq!(HealthBand::from_score(89.9), HealthBand::Good);
        assert_eq!(HealthBand::from_score(75.0), HealthBand::Good);
        assert_eq!(HealthBand::from_score(60.0), HealthBand::Fair);
        assert_eq!(HealthBand::from_score(40.0), HealthBand::Poor);
        assert_eq!(HealthBand::from_score(39.9), HealthBand::Critical);
        assert_eq!(HealthBand::from_score(0.0), HealthBand::Critical);
    }

    #[test]
    fn test_severity_ordering() {
        assert!(IssueSeverity::Critical > IssueSeverity::High);
        assert!(IssueSeverity::High > IssueSeverity::Medium);
        assert!(IssueSeverity::Medium > IssueSeverity::Low);
    }
}
