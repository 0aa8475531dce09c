use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use apiary_core::{
    AgentDirectory, AgentMessage, ApiaryError, ApiaryResult, CandidateCriteria, ComplexTask,
    MessagePriority, MessageType, Recipient, SubTaskStatus,
};
use apiary_reasoning::{ReasoningBackend, ReasoningClient};
use apiary_session::{
    SessionStatus, SessionStore, SwarmPerformanceMetrics, SwarmResult, SwarmSession,
};
use apiary_transport::SwarmTransport;
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

use crate::assigner::TaskAssigner;
use crate::config::SwarmConfig;
use crate::decomposer::TaskDecomposer;
use crate::monitor::{NullTelemetry, SwarmMonitor, TelemetryProbe};
use crate::selector::AgentSelector;
use crate::types::SwarmHealthReport;

type SharedSession = Arc<RwLock<SwarmSession>>;

/// The orchestration facade: owns the session lifecycle and composes the
/// decomposer, selector, assigner, and monitor.
///
/// Sessions live in an in-memory registry of `Arc<RwLock<SwarmSession>>`;
/// the outer map lock covers membership only, while each session's own lock
/// serializes every mutation (monitor ticks, handoffs, and status updates
/// can race). No session lock is held across a boundary call.
pub struct SwarmOrchestrator {
    config: SwarmConfig,
    decomposer: TaskDecomposer,
    selector: AgentSelector,
    assigner: TaskAssigner,
    monitor: Arc<SwarmMonitor>,
    directory: Arc<dyn AgentDirectory>,
    transport: Arc<dyn SwarmTransport>,
    store: Arc<dyn SessionStore>,
    sessions: RwLock<HashMap<Uuid, SharedSession>>,
}

impl SwarmOrchestrator {
    /// Wires an orchestrator from its boundary implementations.
    pub fn new(
        config: SwarmConfig,
        reasoning: Arc<dyn ReasoningBackend>,
        directory: Arc<dyn AgentDirectory>,
        transport: Arc<dyn SwarmTransport>,
        store: Arc<dyn SessionStore>,
    ) -> Self {
        let reasoning_client = ReasoningClient::new(
            reasoning,
            Duration::from_secs(config.reasoning_timeout_secs),
        );
        Self {
            decomposer: TaskDecomposer::new(reasoning_client),
            selector: AgentSelector::new(config.selection.clone()),
            assigner: TaskAssigner::new(Arc::clone(&transport)),
            monitor: Arc::new(SwarmMonitor::new(
                config.monitor.clone(),
                Arc::new(NullTelemetry),
            )),
            config,
            directory,
            transport,
            store,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Replaces the monitor's telemetry probe.
    pub fn with_telemetry(mut self, telemetry: Arc<dyn TelemetryProbe>) -> Self {
        self.monitor = Arc::new(SwarmMonitor::new(self.config.monitor.clone(), telemetry));
        self
    }

    /// The health monitor, for direct history inspection.
    pub fn monitor(&self) -> &Arc<SwarmMonitor> {
        &self.monitor
    }

    /// Forms a swarm for `task`: decompose → query directory → select →
    /// pick coordinator → build session → initialize transport → assign →
    /// start monitoring → activate → persist.
    ///
    /// Fails fatally, retaining no partial session, when no candidate agent
    /// is usable.
    pub async fn form_swarm(
        &self,
        mut task: ComplexTask,
        user_id: Uuid,
    ) -> ApiaryResult<SwarmSession> {
        info!(task = %task.id, user = %user_id, "forming swarm");

        let decomposition = self.decomposer.decompose(&task).await;
        let capabilities = decomposition.required_capabilities.clone();
        let subtask_count = decomposition.subtasks.len();
        task.decomposition = Some(decomposition);

        let criteria = CandidateCriteria::for_capabilities(
            capabilities.clone(),
            self.config.selection.directory_max_results,
        );
        let candidates = self.directory.find_candidates(&criteria, user_id).await?;
        let selected = self
            .selector
            .select_optimal_agents(&capabilities, subtask_count, &candidates);
        if selected.is_empty() {
            warn!(task = %task.id, "no suitable agents, swarm formation rejected");
            return Err(ApiaryError::NoSuitableAgents(task.id));
        }
        let coordinator = self
            .selector
            .select_coordinator(&selected)
            .map(|agent| agent.id)
            .ok_or(ApiaryError::NoSuitableAgents(task.id))?;

        let agent_ids: Vec<Uuid> = selected.iter().map(|agent| agent.id).collect();
        let mut session = SwarmSession::new(user_id, agent_ids, coordinator, task);

        self.transport
            .initialize_swarm_communication(&session)
            .await?;
        if let Some(decomposition) = session.task.decomposition.as_mut() {
            self.assigner
                .assign(session.id, decomposition, &selected)
                .await;
        }

        let session_id = session.id;
        let shared: SharedSession = Arc::new(RwLock::new(session));
        self.sessions
            .write()
            .await
            .insert(session_id, Arc::clone(&shared));
        self.monitor.start(Arc::clone(&shared)).await;

        let snapshot = {
            let mut session = shared.write().await;
            session.set_status(SessionStatus::Active)?;
            session.clone()
        };
        if let Err(e) = self.store.save(&snapshot).await {
            warn!(session = %session_id, error = %e, "failed to persist new session");
        }

        info!(
            session = %session_id,
            agents = snapshot.agent_ids.len(),
            coordinator = %snapshot.coordinator,
            "swarm formed"
        );
        Ok(snapshot)
    }

    /// Sends a high-priority result handoff from one agent to another and
    /// appends it to the session's message log.
    pub async fn coordinate_agent_handoff(
        &self,
        from_agent: Uuid,
        to_agent: Uuid,
        context: serde_json::Value,
        session_id: Uuid,
    ) -> ApiaryResult<AgentMessage> {
        let shared = self.session_arc(session_id).await?;

        let message = AgentMessage::new(
            from_agent,
            Recipient::Agent(to_agent),
            MessageType::ResultHandoff,
            context,
            session_id,
        )
        .with_priority(MessagePriority::High)
        .require_response();

        {
            let mut session = shared.write().await;
            session.append_message(message.clone());
        }
        self.transport.send_message(message.clone()).await?;

        info!(session = %session_id, from = %from_agent, to = %to_agent, "handoff coordinated");
        Ok(message)
    }

    /// Produces (and records) a fresh health report for the session.
    pub async fn monitor_swarm_health(&self, session_id: Uuid) -> ApiaryResult<SwarmHealthReport> {
        let shared = self.session_arc(session_id).await?;
        let snapshot = shared.read().await.clone();
        let report = self.monitor.assess(&snapshot);
        self.monitor.record(report.clone());
        Ok(report)
    }

    /// Dissolves the swarm: stop monitoring, notify agents, compute final
    /// metrics, mark the session dissolved (or errored, still persisted),
    /// and evict it from the registry.
    pub async fn dissolve_swarm(&self, session_id: Uuid) -> ApiaryResult<SwarmPerformanceMetrics> {
        let shared = self.session_arc(session_id).await?;
        self.monitor.stop(session_id).await;

        let snapshot = shared.read().await.clone();
        let notify_result = self.transport.notify_swarm_dissolution(&snapshot).await;

        let (snapshot, metrics) = {
            let mut session = shared.write().await;
            match &notify_result {
                Ok(()) => session.set_status(SessionStatus::Dissolved)?,
                Err(e) => {
                    warn!(session = %session_id, error = %e, "dissolution notification failed");
                    session.set_status(SessionStatus::Error)?;
                }
            }
            let metrics = SwarmPerformanceMetrics::from_session(&session);
            session.performance = Some(metrics.clone());
            (session.clone(), metrics)
        };

        if let Err(e) = self.store.save(&snapshot).await {
            warn!(session = %session_id, error = %e, "failed to persist dissolved session");
        }
        self.sessions.write().await.remove(&session_id);

        info!(
            session = %session_id,
            status = ?snapshot.status,
            completion_rate = metrics.task_completion_rate,
            "swarm dissolved"
        );
        notify_result.map(|()| metrics)
    }

    /// Snapshots of the user's sessions currently resident in memory.
    pub async fn active_sessions_for_user(&self, user_id: Uuid) -> Vec<SwarmSession> {
        let sessions = self.sessions.read().await;
        let mut out = Vec::new();
        for shared in sessions.values() {
            let session = shared.read().await;
            if session.user_id == user_id {
                out.push(session.clone());
            }
        }
        out
    }

    /// A snapshot of one session.
    ///
    /// Misses in the in-memory registry fall through to the durable store;
    /// a non-terminal stored session is rehydrated into the registry (and
    /// its monitoring resumed if it was active), while terminal sessions are
    /// returned as-is for inspection.
    pub async fn session(&self, session_id: Uuid) -> ApiaryResult<SwarmSession> {
        if let Some(shared) = self.sessions.read().await.get(&session_id) {
            return Ok(shared.read().await.clone());
        }
        let stored = self
            .store
            .load(session_id)
            .await?
            .ok_or(ApiaryError::SessionNotFound(session_id))?;
        if stored.status.is_terminal() {
            return Ok(stored);
        }
        let shared = self.rehydrate(stored).await;
        let snapshot = shared.read().await.clone();
        Ok(snapshot)
    }

    /// Moves a session through its lifecycle; terminal states stop
    /// monitoring and evict the session.
    pub async fn update_session_status(
        &self,
        session_id: Uuid,
        status: SessionStatus,
    ) -> ApiaryResult<()> {
        let shared = self.session_arc(session_id).await?;
        let snapshot = {
            let mut session = shared.write().await;
            session.set_status(status)?;
            session.clone()
        };
        if let Err(e) = self.store.save(&snapshot).await {
            warn!(session = %session_id, error = %e, "failed to persist status change");
        }
        if status.is_terminal() {
            self.monitor.stop(session_id).await;
            self.sessions.write().await.remove(&session_id);
        }
        Ok(())
    }

    /// Records an agent's result for a subtask, driving the subtask to
    /// completed and attaching the payload when the transition is legal.
    pub async fn add_result(&self, session_id: Uuid, result: SwarmResult) -> ApiaryResult<()> {
        let shared = self.session_arc(session_id).await?;
        let mut session = shared.write().await;

        if let Some(decomposition) = session.task.decomposition.as_mut() {
            if let Some(subtask) = decomposition.subtask_mut(result.subtask_id) {
                subtask.result = Some(result.payload.clone());
                if subtask.status == SubTaskStatus::Pending {
                    subtask.transition(SubTaskStatus::InProgress)?;
                }
                if subtask.status == SubTaskStatus::InProgress {
                    subtask.transition(SubTaskStatus::Completed)?;
                }
            } else {
                warn!(
                    session = %session_id,
                    subtask = %result.subtask_id,
                    "result references an unknown subtask"
                );
            }
        }

        session.add_result(result);
        Ok(())
    }

    /// Resolves a session for mutation, rehydrating non-terminal sessions
    /// from the store on a registry miss.
    async fn session_arc(&self, session_id: Uuid) -> ApiaryResult<SharedSession> {
        if let Some(shared) = self.sessions.read().await.get(&session_id) {
            return Ok(Arc::clone(shared));
        }
        let stored = self
            .store
            .load(session_id)
            .await?
            .ok_or(ApiaryError::SessionNotFound(session_id))?;
        if stored.status.is_terminal() {
            return Err(ApiaryError::Session(format!(
                "session {session_id} already ended as {:?}",
                stored.status
            )));
        }
        Ok(self.rehydrate(stored).await)
    }

    async fn rehydrate(&self, stored: SwarmSession) -> SharedSession {
        let session_id = stored.id;
        let resume_monitoring = stored.status == SessionStatus::Active;

        let mut sessions = self.sessions.write().await;
        // Another caller may have rehydrated while we read the store.
        if let Some(existing) = sessions.get(&session_id) {
            return Arc::clone(existing);
        }
        let shared: SharedSession = Arc::new(RwLock::new(stored));
        sessions.insert(session_id, Arc::clone(&shared));
        drop(sessions);

        if resume_monitoring {
            self.monitor.start(Arc::clone(&shared)).await;
        }
        info!(session = %session_id, "session rehydrated from store");
        shared
    }
}
