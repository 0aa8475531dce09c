use thiserror::Error;
use uuid::Uuid;

/// Top-level error type for the Apiary swarm-orchestration core.
///
/// Each variant corresponds to a subsystem that can produce errors. The two
/// structured variants ([`ApiaryError::NoSuitableAgents`] and
/// [`ApiaryError::SessionNotFound`]) are the only errors that surface to
/// callers of the orchestrator facade as fatal conditions.
#[derive(Debug, Error)]
pub enum ApiaryError {
    /// No candidate agent satisfies the task's capability requirements.
    /// Fatal during swarm formation: no partial session is retained.
    #[error("no suitable agents found for task {0}")]
    NoSuitableAgents(Uuid),

    /// An operation referenced a session that is neither resident in memory
    /// nor resumable from the durable store.
    #[error("unknown session: {0}")]
    SessionNotFound(Uuid),

    /// An error from the reasoning boundary (timeout, transport, bad status).
    #[error("reasoning error: {0}")]
    Reasoning(String),

    /// An error while parsing or validating a task decomposition.
    #[error("decomposition error: {0}")]
    Decomposition(String),

    /// An error during agent scoring or selection.
    #[error("selection error: {0}")]
    Selection(String),

    /// An error while assigning subtasks to agents.
    #[error("assignment error: {0}")]
    Assignment(String),

    /// An error related to session state or lifecycle.
    #[error("session error: {0}")]
    Session(String),

    /// An error from the message transport.
    #[error("transport error: {0}")]
    Transport(String),

    /// An error from the swarm health monitor.
    #[error("monitor error: {0}")]
    Monitor(String),

    /// An error in configuration parsing or validation.
    #[error("config error: {0}")]
    Config(String),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A convenience `Result` alias using [`ApiaryError`].
pub type ApiaryResult<T> = Result<T, ApiaryError>;
