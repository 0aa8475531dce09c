use std::collections::HashMap;

use apiary_core::{
    AgentMessage, ApiaryError, ApiaryResult, MessagePriority, MessageType, Recipient, SubTask,
};
use apiary_session::SwarmSession;
use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

use crate::transport::{SwarmTransport, ORCHESTRATOR_SENDER};

/// In-process transport: fan-out over unbounded mpsc channels.
///
/// Each agent registers a mailbox; deliveries to unregistered agents are
/// logged and dropped rather than failing the sender. Useful for tests and
/// for embedders that run agents in the same process.
pub struct InProcessTransport {
    mailboxes: RwLock<HashMap<Uuid, mpsc::UnboundedSender<AgentMessage>>>,
}

impl InProcessTransport {
    /// Creates an empty transport.
    pub fn new() -> Self {
        Self {
            mailboxes: RwLock::new(HashMap::new()),
        }
    }

    /// Registers a mailbox for `agent_id`, returning its receiving end.
    ///
    /// Re-registering replaces the previous mailbox.
    pub async fn register_agent(&self, agent_id: Uuid) -> mpsc::UnboundedReceiver<AgentMessage> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.mailboxes.write().await.insert(agent_id, tx);
        rx
    }

    /// Removes the mailbox for `agent_id`.
    pub async fn unregister_agent(&self, agent_id: Uuid) {
        self.mailboxes.write().await.remove(&agent_id);
    }

    /// Number of registered mailboxes.
    pub async fn mailbox_count(&self) -> usize {
        self.mailboxes.read().await.len()
    }

    async fn deliver_to(&self, agent_id: Uuid, message: AgentMessage) {
        let mailboxes = self.mailboxes.read().await;
        match mailboxes.get(&agent_id) {
            Some(tx) => {
                if tx.send(message).is_err() {
                    warn!(agent = %agent_id, "mailbox receiver dropped, message lost");
                }
            }
            None => warn!(agent = %agent_id, "no mailbox registered, message dropped"),
        }
    }
}

impl Default for InProcessTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SwarmTransport for InProcessTransport {
    async fn send_message(&self, message: AgentMessage) -> ApiaryResult<()> {
        match message.recipient {
            Recipient::Agent(agent_id) => self.deliver_to(agent_id, message).await,
            Recipient::Broadcast => {
                let targets: Vec<Uuid> = {
                    let mailboxes = self.mailboxes.read().await;
                    mailboxes.keys().copied().collect()
                };
                for target in targets {
                    // The sender does not get its own broadcast back.
                    if target != message.sender {
                        self.deliver_to(target, message.clone()).await;
                    }
                }
            }
        }
        Ok(())
    }

    async fn initialize_swarm_communication(&self, session: &SwarmSession) -> ApiaryResult<()> {
        let mailboxes = self.mailboxes.read().await;
        let missing = session
            .agent_ids
            .iter()
            .filter(|id| !mailboxes.contains_key(id))
            .count();
        info!(
            session = %session.id,
            agents = session.agent_ids.len(),
            unregistered = missing,
            "swarm communication initialized"
        );
        Ok(())
    }

    async fn send_task_assignment(
        &self,
        session_id: Uuid,
        agent_id: Uuid,
        subtask: &SubTask,
    ) -> ApiaryResult<()> {
        let payload = serde_json::to_value(subtask).map_err(ApiaryError::Json)?;
        let message = AgentMessage::new(
            ORCHESTRATOR_SENDER,
            Recipient::Agent(agent_id),
            MessageType::TaskRequest,
            payload,
            session_id,
        )
        .with_priority(MessagePriority::High);
        self.deliver_to(agent_id, message).await;
        Ok(())
    }

    async fn notify_swarm_dissolution(&self, session: &SwarmSession) -> ApiaryResult<()> {
        let payload = serde_json::json!({
            "event": "dissolution",
            "session_id": session.id,
        });
        for &agent_id in &session.agent_ids {
            let message = AgentMessage::new(
                ORCHESTRATOR_SENDER,
                Recipient::Agent(agent_id),
                MessageType::StatusUpdate,
                payload.clone(),
                session.id,
            )
            .with_priority(MessagePriority::Urgent);
            self.deliver_to(agent_id, message).await;
        }
        Ok(())
    }
}
