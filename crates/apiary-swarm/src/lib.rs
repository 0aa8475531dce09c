//! Swarm task-orchestration core.
//!
//! Takes one high-level task, decomposes it into a dependency graph of
//! subtasks via the reasoning boundary (with a guaranteed fallback), selects
//! a diverse, bounded working set of agents, assigns subtasks with a
//! load-aware relevance heuristic, monitors swarm health on a fixed cadence,
//! and dissolves the swarm with final performance metrics.
//!
//! # Main types
//!
//! - [`SwarmOrchestrator`] — Facade owning the session lifecycle.
//! - [`TaskDecomposer`] — Total decomposition with single-subtask fallback.
//! - [`AgentSelector`] — Weighted scoring and greedy diverse selection.
//! - [`TaskAssigner`] — Load-aware subtask-to-agent mapping.
//! - [`SwarmMonitor`] — Periodic health reports, issues, and remediation.
//! - [`DependencyGraph`] — Cycle detection and topological ordering.
//! - [`SwarmConfig`] — TOML-loadable tuning for all of the above.

/// Load-aware subtask assignment.
pub mod assigner;
/// TOML-backed configuration.
pub mod config;
/// Total task decomposition with fallback.
pub mod decomposer;
/// Dependency-graph utilities (cycles, topological order).
pub mod graph;
/// Periodic health monitoring and remediation.
pub mod monitor;
/// Session lifecycle facade.
pub mod orchestrator;
/// Agent scoring, selection, and coordinator choice.
pub mod selector;
/// Health report and issue types.
pub mod types;

pub use assigner::{relevance, TaskAssigner};
pub use config::{MonitorConfig, SelectionConfig, SwarmConfig};
pub use decomposer::{
    execution_order, fallback, required_capabilities, validate, TaskDecomposer, ValidationIssue,
};
pub use graph::DependencyGraph;
pub use monitor::{NullTelemetry, SwarmMonitor, TelemetryProbe};
pub use orchestrator::SwarmOrchestrator;
pub use selector::{score_agent, AgentSelector};
pub use types::{
    AgentHealth, AgentHealthStatus, CommunicationHealth, HealthBand, IssueKind, IssueSeverity,
    SwarmHealthReport, SwarmIssue, TaskProgressHealth,
};
