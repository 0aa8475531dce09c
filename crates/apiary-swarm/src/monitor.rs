use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use apiary_session::SwarmSession;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::MonitorConfig;
use crate::types::{
    AgentHealth, AgentHealthStatus, CommunicationHealth, HealthBand, IssueKind, IssueSeverity,
    SwarmHealthReport, SwarmIssue, TaskProgressHealth,
};

/// Coordination-efficiency ratio below which the overall score is docked.
/// Distinct from the (lower) ratio that raises an issue.
const COORDINATION_DEDUCTION_RATIO: f64 = 0.3;
/// Maximum recommendations surfaced per report.
const MAX_RECOMMENDATIONS: usize = 5;

/// Pluggable measurement points for quantities this core cannot observe
/// directly (delivery failures, agent-internal error rates).
///
/// The default implementation reports zeros; embedders wire in real
/// measurements where they have them.
pub trait TelemetryProbe: Send + Sync {
    /// Error rate of one agent within a session, 0.0–1.0.
    fn agent_error_rate(&self, session_id: Uuid, agent_id: Uuid) -> f64;
    /// Fraction of session messages that failed to deliver, 0.0–1.0.
    fn failed_message_rate(&self, session_id: Uuid) -> f64;
}

/// Telemetry probe reporting zeros everywhere.
pub struct NullTelemetry;

impl TelemetryProbe for NullTelemetry {
    fn agent_error_rate(&self, _session_id: Uuid, _agent_id: Uuid) -> f64 {
        0.0
    }
    fn failed_message_rate(&self, _session_id: Uuid) -> f64 {
        0.0
    }
}

/// Periodic health assessment for active sessions.
///
/// The health computation itself ([`SwarmMonitor::assess`]) is a pure
/// function of a session snapshot, so it can be unit-tested without timers;
/// the interval loop is layered on top and cancelled independently per
/// session.
pub struct SwarmMonitor {
    config: MonitorConfig,
    telemetry: Arc<dyn TelemetryProbe>,
    histories: RwLock<HashMap<Uuid, VecDeque<SwarmHealthReport>>>,
    tickers: tokio::sync::Mutex<HashMap<Uuid, JoinHandle<()>>>,
}

impl SwarmMonitor {
    /// Creates a monitor with the given tuning and telemetry probe.
    pub fn new(config: MonitorConfig, telemetry: Arc<dyn TelemetryProbe>) -> Self {
        Self {
            config,
            telemetry,
            histories: RwLock::new(HashMap::new()),
            tickers: tokio::sync::Mutex::new(HashMap::new()),
        }
    }

    /// Computes a health report for a session snapshot.
    pub fn assess(&self, session: &SwarmSession) -> SwarmHealthReport {
        let now = Utc::now();
        let agents = self.agent_healths(session, now);
        let communication = self.communication_health(session);
        let progress = self.progress_health(session, now);
        let issues = self.detect_issues(session, now, &agents, &communication, &progress);
        let score = self.overall_score(&agents, &communication, &progress, &issues);
        let recommendations = recommendations(&issues);

        SwarmHealthReport {
            session_id: session.id,
            generated_at: now,
            score,
            overall: HealthBand::from_score(score),
            agents,
            communication,
            progress,
            issues,
            recommendations,
        }
    }

    /// Appends a report to the session's rolling history, dropping the
    /// oldest entry once the cap is exceeded.
    pub fn record(&self, report: SwarmHealthReport) {
        let mut histories = self.histories.write();
        let history = histories.entry(report.session_id).or_default();
        history.push_back(report);
        while history.len() > self.config.history_cap {
            history.pop_front();
        }
    }

    /// The recorded reports for a session, oldest first.
    pub fn history(&self, session_id: Uuid) -> Vec<SwarmHealthReport> {
        self.histories
            .read()
            .get(&session_id)
            .map(|h| h.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Starts the periodic monitoring loop for a session.
    ///
    /// One loop per session; starting an already-monitored session is a
    /// no-op. The loop ends on its own when the session reaches a terminal
    /// state, or when [`SwarmMonitor::stop`] cancels it.
    pub async fn start(self: &Arc<Self>, session: Arc<tokio::sync::RwLock<SwarmSession>>) {
        let session_id = session.read().await.id;
        let mut tickers = self.tickers.lock().await;
        if tickers.contains_key(&session_id) {
            return;
        }

        let monitor = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(Duration::from_secs(monitor.config.interval_secs));
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                let snapshot = { session.read().await.clone() };
                if snapshot.status.is_terminal() {
                    debug!(session = %session_id, "session terminal, monitoring loop ends");
                    break;
                }
                let report = monitor.assess(&snapshot);
                monitor.remediate(&report);
                monitor.record(report);
            }
        });
        tickers.insert(session_id, handle);
        info!(session = %session_id, interval_secs = self.config.interval_secs, "monitoring started");
    }

    /// Cancels the monitoring loop for a session. Idempotent: stopping a
    /// session that is not monitored is a no-op.
    pub async fn stop(&self, session_id: Uuid) {
        if let Some(handle) = self.tickers.lock().await.remove(&session_id) {
            handle.abort();
            info!(session = %session_id, "monitoring stopped");
        }
    }

    /// Dispatches best-effort remediation for critical issues.
    ///
    /// Attempts run detached and only log; a failed or meaningless attempt
    /// never reaches the caller and never alters session state.
    pub fn remediate(&self, report: &SwarmHealthReport) {
        for issue in report
            .issues
            .iter()
            .filter(|i| i.severity == IssueSeverity::Critical)
        {
            let session_id = report.session_id;
            let kind = issue.kind;
            let description = issue.description.clone();
            tokio::spawn(async move {
                match kind {
                    IssueKind::Communication => warn!(
                        session = %session_id,
                        issue = %description,
                        "remediation: re-initializing communication paths"
                    ),
                    IssueKind::Performance | IssueKind::Resource => warn!(
                        session = %session_id,
                        issue = %description,
                        "remediation: requesting assignment rebalance"
                    ),
                    IssueKind::Logic => warn!(
                        session = %session_id,
                        issue = %description,
                        "remediation: flagging blocked subtasks for replanning"
                    ),
                }
            });
        }
    }

    fn agent_healths(&self, session: &SwarmSession, now: DateTime<Utc>) -> Vec<AgentHealth> {
        session
            .agent_ids
            .iter()
            .map(|&agent_id| {
                let last_seen = session.last_message_from(agent_id);
                let silence_secs = (now - last_seen.unwrap_or(session.created_at)).num_seconds();
                let open_assignments = session.open_assignments(agent_id);

                // First matching condition wins, in fixed priority order.
                let status = if silence_secs > self.config.unresponsive_after_secs {
                    AgentHealthStatus::Unresponsive
                } else if open_assignments > self.config.overload_threshold {
                    AgentHealthStatus::Overloaded
                } else if silence_secs > self.config.idle_after_secs {
                    AgentHealthStatus::Idle
                } else if self.telemetry.agent_error_rate(session.id, agent_id)
                    > self.config.error_rate_threshold
                {
                    AgentHealthStatus::Error
                } else {
                    AgentHealthStatus::Active
                };

                AgentHealth {
                    agent_id,
                    status,
                    last_seen,
                    open_assignments,
                }
            })
            .collect()
    }

    fn communication_health(&self, session: &SwarmSession) -> CommunicationHealth {
        let log = &session.message_log;
        let message_count = log.len();

        let latencies: Vec<f64> = log
            .iter()
            .filter(|m| m.requires_response)
            .filter_map(|request| {
                log.iter()
                    .find(|reply| reply.response_to == Some(request.id))
                    .map(|reply| (reply.timestamp - request.timestamp).num_milliseconds() as f64)
            })
            .collect();
        let avg_response_latency_ms = if latencies.is_empty() {
            None
        } else {
            Some(latencies.iter().sum::<f64>() / latencies.len() as f64)
        };

        let coordination_efficiency = if message_count == 0 {
            0.0
        } else {
            let collaborative = log
                .iter()
                .filter(|m| m.message_type.is_collaborative())
                .count();
            collaborative as f64 / message_count as f64
        };

        let bottleneck_agents = if message_count == 0 {
            Vec::new()
        } else {
            let mut per_sender: HashMap<Uuid, usize> = HashMap::new();
            for message in log {
                *per_sender.entry(message.sender).or_insert(0) += 1;
            }
            per_sender
                .into_iter()
                .filter(|&(_, n)| n as f64 / message_count as f64 > self.config.bottleneck_share)
                .map(|(id, _)| id)
                .collect()
        };

        CommunicationHealth {
            message_count,
            avg_response_latency_ms,
            failed_message_rate: self.telemetry.failed_message_rate(session.id),
            coordination_efficiency,
            bottleneck_agents,
        }
    }

    fn progress_health(&self, session: &SwarmSession, now: DateTime<Utc>) -> TaskProgressHealth {
        let Some(decomposition) = &session.task.decomposition else {
            return TaskProgressHealth {
                completed: 0,
                total: 0,
                blocked: Vec::new(),
                estimated_minutes_remaining: 0.0,
                critical_path_progress: 0.0,
            };
        };

        let total = decomposition.subtasks.len();
        let mut completed = 0usize;
        let mut blocked = Vec::new();
        let mut estimated_minutes_remaining = 0.0;

        for subtask in &decomposition.subtasks {
            match subtask.status {
                apiary_core::SubTaskStatus::Completed => completed += 1,
                apiary_core::SubTaskStatus::Failed => blocked.push(subtask.id),
                apiary_core::SubTaskStatus::Pending => {
                    estimated_minutes_remaining +=
                        f64::from(subtask.estimated_minutes.unwrap_or(0));
                }
                apiary_core::SubTaskStatus::InProgress => {
                    let estimate = f64::from(subtask.estimated_minutes.unwrap_or(0));
                    let elapsed = subtask
                        .started_at
                        .map_or(0.0, |t| (now - t).num_seconds() as f64 / 60.0);
                    estimated_minutes_remaining += (estimate - elapsed).max(0.0);
                }
            }
        }

        let critical_path_progress = if total == 0 {
            0.0
        } else {
            completed as f64 / total as f64
        };

        TaskProgressHealth {
            completed,
            total,
            blocked,
            estimated_minutes_remaining,
            critical_path_progress,
        }
    }

    fn detect_issues(
        &self,
        session: &SwarmSession,
        now: DateTime<Utc>,
        agents: &[AgentHealth],
        communication: &CommunicationHealth,
        progress: &TaskProgressHealth,
    ) -> Vec<SwarmIssue> {
        let mut issues = Vec::new();

        for agent in agents {
            match agent.status {
                AgentHealthStatus::Unresponsive => issues.push(SwarmIssue {
                    kind: IssueKind::Performance,
                    severity: IssueSeverity::High,
                    description: format!(
                        "agent {} has been silent for over {} seconds",
                        agent.agent_id, self.config.unresponsive_after_secs
                    ),
                    affected_agents: vec![agent.agent_id],
                    suggested_actions: vec![
                        "ping the agent for a status update".to_string(),
                        "reassign its open subtasks".to_string(),
                    ],
                }),
                AgentHealthStatus::Overloaded => issues.push(SwarmIssue {
                    kind: IssueKind::Resource,
                    severity: IssueSeverity::Medium,
                    description: format!(
                        "agent {} carries {} open assignments",
                        agent.agent_id, agent.open_assignments
                    ),
                    affected_agents: vec![agent.agent_id],
                    suggested_actions: vec![
                        "rebalance open assignments across the swarm".to_string()
                    ],
                }),
                _ => {}
            }
        }

        if let Some(latency) = communication.avg_response_latency_ms {
            if latency > self.config.latency_threshold_ms {
                issues.push(SwarmIssue {
                    kind: IssueKind::Communication,
                    severity: IssueSeverity::Medium,
                    description: format!("average response latency is {latency:.0}ms"),
                    affected_agents: Vec::new(),
                    suggested_actions: vec![
                        "reduce response-required traffic".to_string(),
                        "batch status updates".to_string(),
                    ],
                });
            }
        }

        if communication.message_count > 0
            && communication.coordination_efficiency < self.config.low_coordination_ratio
        {
            issues.push(SwarmIssue {
                kind: IssueKind::Communication,
                severity: IssueSeverity::Low,
                description: format!(
                    "only {:.0}% of traffic is collaborative",
                    communication.coordination_efficiency * 100.0
                ),
                affected_agents: Vec::new(),
                suggested_actions: vec!["route more work through the coordinator".to_string()],
            });
        }

        for &subtask_id in &progress.blocked {
            issues.push(SwarmIssue {
                kind: IssueKind::Logic,
                severity: IssueSeverity::High,
                description: format!("subtask {subtask_id} failed and blocks downstream work"),
                affected_agents: Vec::new(),
                suggested_actions: vec![
                    "retry the failed subtask".to_string(),
                    "reassign it to another agent".to_string(),
                ],
            });
        }

        if let Some(decomposition) = &session.task.decomposition {
            let budget_minutes = f64::from(decomposition.total_estimated_minutes());
            if budget_minutes > 0.0 {
                let elapsed_minutes = (now - session.created_at).num_seconds() as f64 / 60.0;
                if elapsed_minutes > self.config.overrun_factor * budget_minutes {
                    issues.push(SwarmIssue {
                        kind: IssueKind::Performance,
                        severity: IssueSeverity::Medium,
                        description: format!(
                            "session has run {elapsed_minutes:.0}min against a {budget_minutes:.0}min estimate"
                        ),
                        affected_agents: Vec::new(),
                        suggested_actions: vec![
                            "revisit subtask estimates".to_string(),
                            "consider adding agents".to_string(),
                        ],
                    });
                }
            }
        }

        issues
    }

    /// Deduction-from-100 health score, clamped to [0, 100].
    fn overall_score(
        &self,
        agents: &[AgentHealth],
        communication: &CommunicationHealth,
        progress: &TaskProgressHealth,
        issues: &[SwarmIssue],
    ) -> f64 {
        let mut score = 100.0;

        for agent in agents {
            score -= match agent.status {
                AgentHealthStatus::Unresponsive | AgentHealthStatus::Error => 20.0,
                AgentHealthStatus::Overloaded | AgentHealthStatus::Idle => 10.0,
                AgentHealthStatus::Active => 0.0,
            };
        }

        if let Some(latency) = communication.avg_response_latency_ms {
            if latency > self.config.latency_threshold_ms {
                score -= 15.0;
            }
        }
        if communication.message_count > 0
            && communication.coordination_efficiency < COORDINATION_DEDUCTION_RATIO
        {
            score -= 10.0;
        }

        score -= 15.0 * progress.blocked.len() as f64;

        for issue in issues {
            score -= match issue.severity {
                IssueSeverity::Critical => 25.0,
                IssueSeverity::High => 15.0,
                _ => 0.0,
            };
        }

        score.clamp(0.0, 100.0)
    }
}

/// Deduplicated suggested actions of all critical/high issues, capped, or a
/// single all-clear message when nothing was detected.
fn recommendations(issues: &[SwarmIssue]) -> Vec<String> {
    if issues.is_empty() {
        return vec!["swarm operating optimally".to_string()];
    }
    let mut recs: Vec<String> = Vec::new();
    for issue in issues
        .iter()
        .filter(|i| i.severity >= IssueSeverity::High)
    {
        for action in &issue.suggested_actions {
            if recs.len() >= MAX_RECOMMENDATIONS {
                return recs;
            }
            if !recs.contains(action) {
                recs.push(action.clone());
            }
        }
    }
    recs
}
