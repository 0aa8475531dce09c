use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ApiaryError, ApiaryResult};

/// Priority of a [`ComplexTask`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    /// Background work with no time pressure.
    Low,
    /// The default priority.
    Medium,
    /// Should be worked ahead of medium/low tasks.
    High,
    /// Needs immediate attention.
    Urgent,
}

/// What kind of resource a [`TaskRequirement`] asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequirementType {
    /// A named agent capability (e.g. `data_analysis`).
    Capability,
    /// Familiarity with a knowledge domain.
    DomainKnowledge,
    /// Access to a specific data source.
    DataAccess,
    /// Raw compute capacity.
    ProcessingPower,
}

/// How strongly a [`TaskRequirement`] binds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequirementImportance {
    /// The task cannot proceed without it.
    Required,
    /// Strongly desired but not blocking.
    Preferred,
    /// Nice to have.
    Optional,
}

/// A single requirement attached to a [`ComplexTask`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRequirement {
    /// The kind of resource required.
    pub requirement_type: RequirementType,
    /// The name of the capability, domain, data source, or resource.
    pub name: String,
    /// How strongly this requirement binds.
    pub importance: RequirementImportance,
}

/// A unit of work requested by a user.
///
/// Immutable once decomposition begins, except for attaching the resulting
/// [`TaskDecomposition`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplexTask {
    /// Unique task identifier.
    pub id: Uuid,
    /// Free-text description of the work.
    pub description: String,
    /// Optional short title.
    pub title: Option<String>,
    /// Optional category label.
    pub category: Option<String>,
    /// Ordered list of requirements.
    #[serde(default)]
    pub requirements: Vec<TaskRequirement>,
    /// Task priority.
    pub priority: TaskPriority,
    /// Optional deadline.
    pub deadline: Option<DateTime<Utc>>,
    /// Free-text constraints on how the work may be done.
    #[serde(default)]
    pub constraints: Vec<String>,
    /// The decomposition produced for this task, once available.
    pub decomposition: Option<TaskDecomposition>,
    /// When the task was created.
    pub created_at: DateTime<Utc>,
}

impl ComplexTask {
    /// Creates a new task with the given description and priority.
    pub fn new(description: impl Into<String>, priority: TaskPriority) -> Self {
        Self {
            id: Uuid::new_v4(),
            description: description.into(),
            title: None,
            category: None,
            requirements: Vec::new(),
            priority,
            deadline: None,
            constraints: Vec::new(),
            decomposition: None,
            created_at: Utc::now(),
        }
    }

    /// Sets the title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Sets the category.
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Appends a requirement.
    pub fn with_requirement(mut self, requirement: TaskRequirement) -> Self {
        self.requirements.push(requirement);
        self
    }

    /// Sets the deadline.
    pub fn with_deadline(mut self, deadline: DateTime<Utc>) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Appends a constraint.
    pub fn with_constraint(mut self, constraint: impl Into<String>) -> Self {
        self.constraints.push(constraint.into());
        self
    }
}

/// Status of a [`SubTask`].
///
/// Transitions are monotonic: `pending → in_progress → {completed, failed}`.
/// A subtask never regresses from a later state to an earlier one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubTaskStatus {
    /// Not yet started.
    Pending,
    /// An agent is working on it.
    InProgress,
    /// Finished successfully.
    Completed,
    /// Finished unsuccessfully.
    Failed,
}

impl SubTaskStatus {
    /// Whether `next` is a legal successor of `self`.
    pub fn can_transition(self, next: SubTaskStatus) -> bool {
        matches!(
            (self, next),
            (SubTaskStatus::Pending, SubTaskStatus::InProgress)
                | (SubTaskStatus::InProgress, SubTaskStatus::Completed)
                | (SubTaskStatus::InProgress, SubTaskStatus::Failed)
        )
    }

    /// Whether this status is terminal.
    pub fn is_terminal(self) -> bool {
        matches!(self, SubTaskStatus::Completed | SubTaskStatus::Failed)
    }
}

/// One atomic piece of a decomposed task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubTask {
    /// Unique subtask identifier.
    pub id: Uuid,
    /// The [`ComplexTask`] this subtask belongs to.
    pub parent_task: Uuid,
    /// What the subtask does.
    pub description: String,
    /// Current status.
    pub status: SubTaskStatus,
    /// The agent assigned to execute it, once assignment has run.
    pub assigned_agent: Option<Uuid>,
    /// When work started.
    pub started_at: Option<DateTime<Utc>>,
    /// When work finished (completed or failed).
    pub finished_at: Option<DateTime<Utc>>,
    /// Estimated effort in minutes of agent time.
    pub estimated_minutes: Option<u32>,
    /// Result payload reported by the executing agent.
    pub result: Option<serde_json::Value>,
}

impl SubTask {
    /// Creates a new pending subtask under the given parent task.
    pub fn new(parent_task: Uuid, description: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            parent_task,
            description: description.into(),
            status: SubTaskStatus::Pending,
            assigned_agent: None,
            started_at: None,
            finished_at: None,
            estimated_minutes: None,
            result: None,
        }
    }

    /// Sets the estimated effort in minutes.
    pub fn with_estimate(mut self, minutes: u32) -> Self {
        self.estimated_minutes = Some(minutes);
        self
    }

    /// Moves the subtask to `next`, stamping start/finish timestamps.
    ///
    /// Rejects any transition that would regress the status.
    pub fn transition(&mut self, next: SubTaskStatus) -> ApiaryResult<()> {
        if !self.status.can_transition(next) {
            return Err(ApiaryError::Session(format!(
                "illegal subtask transition {:?} -> {:?} for {}",
                self.status, next, self.id
            )));
        }
        match next {
            SubTaskStatus::InProgress => self.started_at = Some(Utc::now()),
            SubTaskStatus::Completed | SubTaskStatus::Failed => {
                self.finished_at = Some(Utc::now());
            }
            SubTaskStatus::Pending => {}
        }
        self.status = next;
        Ok(())
    }
}

/// How two subtasks relate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyKind {
    /// `to` must start strictly after `from` completes.
    Sequential,
    /// `to` may run alongside `from` but consumes its output.
    Parallel,
    /// `to` runs only if the attached condition holds.
    Conditional,
}

/// A directed dependency edge between two subtasks: `from → to`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDependency {
    /// The prerequisite subtask.
    pub from: Uuid,
    /// The dependent subtask.
    pub to: Uuid,
    /// How the two subtasks relate.
    pub kind: DependencyKind,
    /// Condition string for [`DependencyKind::Conditional`] edges.
    pub condition: Option<String>,
}

impl TaskDependency {
    /// Creates a sequential dependency `from → to`.
    pub fn sequential(from: Uuid, to: Uuid) -> Self {
        Self {
            from,
            to,
            kind: DependencyKind::Sequential,
            condition: None,
        }
    }
}

/// The subtask graph produced by decomposing one [`ComplexTask`].
///
/// Invariant: the dependency edges form a DAG and every edge endpoint
/// references an existing subtask id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDecomposition {
    /// Ordered subtasks.
    pub subtasks: Vec<SubTask>,
    /// Dependency edges over the subtasks.
    #[serde(default)]
    pub dependencies: Vec<TaskDependency>,
    /// Estimated overall complexity, 1–10.
    pub estimated_complexity: u8,
    /// Capability tags required across all subtasks.
    #[serde(default)]
    pub required_capabilities: Vec<String>,
}

impl TaskDecomposition {
    /// The ids of all subtasks, in decomposition order.
    pub fn subtask_ids(&self) -> Vec<Uuid> {
        self.subtasks.iter().map(|s| s.id).collect()
    }

    /// Looks up a subtask by id.
    pub fn subtask(&self, id: Uuid) -> Option<&SubTask> {
        self.subtasks.iter().find(|s| s.id == id)
    }

    /// Mutable lookup of a subtask by id.
    pub fn subtask_mut(&mut self, id: Uuid) -> Option<&mut SubTask> {
        self.subtasks.iter_mut().find(|s| s.id == id)
    }

    /// Sum of the estimated minutes of all subtasks.
    pub fn total_estimated_minutes(&self) -> u32 {
        self.subtasks
            .iter()
            .filter_map(|s| s.estimated_minutes)
            .sum()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_task_creation() {
        let task = ComplexTask::new("Summarize quarterly results", TaskPriority::High)
            .with_category("reporting")
            .with_constraint("use internal data only");
        assert_eq!(task.priority, TaskPriority::High);
        assert_eq!(task.category.as_deref(), Some("reporting"));
        assert_eq!(task.constraints.len(), 1);
        assert!(task.decomposition.is_none());
    }

    #[test]
    fn test_subtask_transitions_forward() {
        let mut sub = SubTask::new(Uuid::new_v4(), "collect data");
        sub.transition(SubTaskStatus::InProgress).unwrap();
        assert!(sub.started_at.is_some());
        sub.transition(SubTaskStatus::Completed).unwrap();
        assert!(sub.finished_at.is_some());
        assert!(sub.status.is_terminal());
    }

    #[test]
    fn test_subtask_never_regresses() {
        let mut sub = SubTask::new(Uuid::new_v4(), "collect data");
        sub.transition(SubTaskStatus::InProgress).unwrap();
        sub.transition(SubTaskStatus::Failed).unwrap();
        assert!(sub.transition(SubTaskStatus::Pending).is_err());
        assert!(sub.transition(SubTaskStatus::InProgress).is_err());
        assert_eq!(sub.status, SubTaskStatus::Failed);
    }

    #[test]
    fn test_pending_cannot_jump_to_terminal() {
        let mut sub = SubTask::new(Uuid::new_v4(), "write report");
        assert!(sub.transition(SubTaskStatus::Completed).is_err());
        assert_eq!(sub.status, SubTaskStatus::Pending);
    }

    #[test]
    fn test_total_estimated_minutes() {
        let parent = Uuid::new_v4();
        let decomposition = TaskDecomposition {
            subtasks: vec![
                SubTask::new(parent, "a").with_estimate(10),
                SubTask::new(parent, "b").with_estimate(25),
                SubTask::new(parent, "c"),
            ],
            dependencies: Vec::new(),
            estimated_complexity: 4,
            required_capabilities: Vec::new(),
        };
        assert_eq!(decomposition.total_estimated_minutes(), 35);
    }

    #[test]
    fn test_priority_ordering() {
        assert!(TaskPriority::Urgent > TaskPriority::High);
        assert!(TaskPriority::Medium > TaskPriority::Low);
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&SubTaskStatus::InProgress).unwrap();
        assert_eq!(json, "\"in_progress\"");
        let parsed: SubTaskStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, SubTaskStatus::InProgress);
    }
}
