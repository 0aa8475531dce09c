use apiary_core::{AgentMessage, ApiaryResult, SubTask};
use apiary_session::SwarmSession;
use async_trait::async_trait;
use uuid::Uuid;

/// Sender id used for messages originating from the orchestrator itself
/// rather than from any agent.
pub const ORCHESTRATOR_SENDER: Uuid = Uuid::nil();

/// Boundary trait for delivering messages between agents and coordinator.
///
/// All methods are fire-and-forget from the orchestration core's
/// perspective; retries and delivery guarantees are the transport's concern.
#[async_trait]
pub trait SwarmTransport: Send + Sync {
    /// Delivers a point-to-point or broadcast message.
    async fn send_message(&self, message: AgentMessage) -> ApiaryResult<()>;

    /// Sets up communication for a newly formed swarm.
    async fn initialize_swarm_communication(&self, session: &SwarmSession) -> ApiaryResult<()>;

    /// Hands a subtask assignment to the chosen agent.
    async fn send_task_assignment(
        &self,
        session_id: Uuid,
        agent_id: Uuid,
        subtask: &SubTask,
    ) -> ApiaryResult<()>;

    /// Tells every agent in the session that the swarm is dissolving.
    async fn notify_swarm_dissolution(&self, session: &SwarmSession) -> ApiaryResult<()>;
}
