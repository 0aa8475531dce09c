use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The purpose of an [`AgentMessage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    /// Asks an agent to take on a subtask.
    TaskRequest,
    /// Shares intermediate data with another agent.
    DataShare,
    /// Hands a finished result to another agent.
    ResultHandoff,
    /// Asks an agent what it can do.
    CapabilityQuery,
    /// Reports progress or state.
    StatusUpdate,
    /// Coordinator traffic steering the swarm.
    Coordination,
}

impl MessageType {
    /// Number of message-type variants, used when computing the
    /// unique-message-type ratio for communication efficiency.
    pub const COUNT: usize = 6;

    /// Message types that indicate agents actively working together.
    pub fn is_collaborative(self) -> bool {
        matches!(
            self,
            MessageType::Coordination | MessageType::ResultHandoff | MessageType::DataShare
        )
    }
}

/// Delivery priority of an [`AgentMessage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessagePriority {
    /// May be delayed behind other traffic.
    Low,
    /// The default.
    Normal,
    /// Deliver ahead of normal traffic.
    High,
    /// Deliver immediately.
    Urgent,
}

/// Who a message is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recipient {
    /// A single agent.
    Agent(Uuid),
    /// Every agent in the session.
    Broadcast,
}

/// A message exchanged between agents (or coordinator) within one session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentMessage {
    /// Unique message identifier.
    pub id: Uuid,
    /// The sending agent.
    pub sender: Uuid,
    /// The receiving agent, or broadcast.
    pub recipient: Recipient,
    /// What the message is for.
    pub message_type: MessageType,
    /// Message payload.
    pub payload: serde_json::Value,
    /// When the message was created.
    pub timestamp: DateTime<Utc>,
    /// Delivery priority.
    pub priority: MessagePriority,
    /// The session the message belongs to.
    pub session_id: Uuid,
    /// Whether the sender expects a reply.
    #[serde(default)]
    pub requires_response: bool,
    /// The message this one replies to, if any.
    pub response_to: Option<Uuid>,
}

impl AgentMessage {
    /// Creates a normal-priority message.
    pub fn new(
        sender: Uuid,
        recipient: Recipient,
        message_type: MessageType,
        payload: serde_json::Value,
        session_id: Uuid,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender,
            recipient,
            message_type,
            payload,
            timestamp: Utc::now(),
            priority: MessagePriority::Normal,
            session_id,
            requires_response: false,
            response_to: None,
        }
    }

    /// Sets the priority.
    pub fn with_priority(mut self, priority: MessagePriority) -> Self {
        self.priority = priority;
        self
    }

    /// Marks the message as expecting a reply.
    pub fn require_response(mut self) -> Self {
        self.requires_response = true;
        self
    }

    /// Marks the message as a reply to `original`.
    pub fn in_reply_to(mut self, original: Uuid) -> Self {
        self.response_to = Some(original);
        self
    }
}
