use std::collections::HashMap;

use apiary_core::{
    ApiaryError, ApiaryResult, ComplexTask, DependencyKind, SubTask, TaskDecomposition,
    TaskDependency,
};
use apiary_reasoning::ReasoningClient;
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::graph::DependencyGraph;

/// Complexity assigned by the fallback decomposition.
const FALLBACK_COMPLEXITY: u8 = 5;
/// Capability tag assigned by the fallback decomposition.
const FALLBACK_CAPABILITY: &str = "general_processing";

/// Keyword families used to derive capability tags from subtask text.
const CAPABILITY_KEYWORDS: &[(&str, &[&str])] = &[
    ("analysis", &["analyz", "analys", "examine", "investigate", "assess"]),
    ("generation", &["generat", "creat", "write", "writing", "compose", "draft"]),
    ("research", &["research", "search", "gather", "collect", "explore"]),
    ("summarization", &["summar", "condense", "digest", "abstract"]),
    ("comparison", &["compar", "contrast", "versus", "benchmark"]),
    ("calculation", &["calculat", "comput", "estimat", "quantif"]),
    ("visualization", &["visualiz", "chart", "graph", "plot", "diagram"]),
    ("translation", &["translat", "convert", "transform", "localiz"]),
    ("classification", &["classif", "categoriz", "label", "tag"]),
    ("validation", &["validat", "verif", "check", "review", "audit"]),
];

/// An advisory problem found while validating a decomposition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    /// An edge references an id that is not a subtask of this decomposition.
    UnknownEndpoint(Uuid, Uuid),
    /// An edge from a subtask to itself.
    SelfLoop(Uuid),
    /// The same edge appears more than once.
    DuplicateEdge(Uuid, Uuid),
    /// The edges contain a cycle.
    Cycle,
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationIssue::UnknownEndpoint(from, to) => {
                write!(f, "dependency {from} -> {to} references an unknown subtask")
            }
            ValidationIssue::SelfLoop(id) => write!(f, "subtask {id} depends on itself"),
            ValidationIssue::DuplicateEdge(from, to) => {
                write!(f, "dependency {from} -> {to} is duplicated")
            }
            ValidationIssue::Cycle => write!(f, "dependency edges contain a cycle"),
        }
    }
}

/// Reports every structural problem in a decomposition's dependency edges.
pub fn validate(decomposition: &TaskDecomposition) -> Vec<ValidationIssue> {
    let graph = DependencyGraph::from_decomposition(decomposition);
    let mut issues = Vec::new();
    for &(from, to) in graph.unknown_endpoints() {
        issues.push(ValidationIssue::UnknownEndpoint(from, to));
    }
    for id in graph.self_loops() {
        issues.push(ValidationIssue::SelfLoop(id));
    }
    for (from, to) in graph.duplicate_edges() {
        issues.push(ValidationIssue::DuplicateEdge(from, to));
    }
    if graph.has_cycle() {
        issues.push(ValidationIssue::Cycle);
    }
    issues
}

/// Derives capability tags from subtask descriptions via keyword families,
/// unioned with `extra` (tags the reasoning boundary returned directly).
/// Deduplicated, insertion-ordered.
pub fn required_capabilities(subtasks: &[SubTask], extra: &[String]) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for subtask in subtasks {
        let text = subtask.description.to_lowercase();
        for (family, keywords) in CAPABILITY_KEYWORDS {
            if keywords.iter().any(|k| text.contains(k)) {
                let family = (*family).to_string();
                if !tags.contains(&family) {
                    tags.push(family);
                }
            }
        }
    }
    for tag in extra {
        let tag = tag.to_lowercase();
        if !tag.is_empty() && !tags.contains(&tag) {
            tags.push(tag);
        }
    }
    tags
}

/// One valid execution order over the decomposition's subtasks.
///
/// Kahn's algorithm: predecessors always appear before successors, ties
/// broken by decomposition order, so independent subtasks can be scheduled
/// in parallel as early as possible.
pub fn execution_order(decomposition: &TaskDecomposition) -> ApiaryResult<Vec<Uuid>> {
    DependencyGraph::from_decomposition(decomposition)
        .topological_order()
        .ok_or_else(|| {
            ApiaryError::Decomposition("cannot order subtasks: dependency cycle".to_string())
        })
}

// -- Wire schema expected from the reasoning boundary --

#[derive(Debug, Deserialize)]
struct RawDecomposition {
    #[serde(default)]
    subtasks: Vec<RawSubTask>,
    #[serde(default)]
    dependencies: Vec<RawDependency>,
    complexity: Option<u8>,
    #[serde(default)]
    capabilities: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawSubTask {
    id: Option<String>,
    description: String,
    estimated_minutes: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct RawDependency {
    from: String,
    to: String,
    kind: Option<DependencyKind>,
    condition: Option<String>,
}

/// Decomposes a [`ComplexTask`] into a validated subtask graph.
///
/// The contract is total: `decompose` never fails. Any problem at the
/// reasoning boundary — timeout, transport error, malformed output, an
/// empty or cyclic graph — is absorbed into the single-subtask fallback, so
/// downstream components always receive a valid, non-empty decomposition.
pub struct TaskDecomposer {
    reasoning: ReasoningClient,
}

impl TaskDecomposer {
    /// Creates a decomposer over the given reasoning client.
    pub fn new(reasoning: ReasoningClient) -> Self {
        Self { reasoning }
    }

    /// Produces a decomposition for `task`, falling back on any failure.
    pub async fn decompose(&self, task: &ComplexTask) -> TaskDecomposition {
        let prompt = build_prompt(task);
        let text = match self.reasoning.generate(&prompt).await {
            Ok(text) => text,
            Err(e) => {
                warn!(task = %task.id, error = %e, "reasoning call failed, using fallback decomposition");
                return fallback(task);
            }
        };

        match parse_decomposition(task, &text) {
            Ok(decomposition) => {
                info!(
                    task = %task.id,
                    subtasks = decomposition.subtasks.len(),
                    dependencies = decomposition.dependencies.len(),
                    complexity = decomposition.estimated_complexity,
                    "task decomposed"
                );
                decomposition
            }
            Err(e) => {
                warn!(task = %task.id, error = %e, "unusable decomposition response, using fallback");
                fallback(task)
            }
        }
    }
}

/// The guaranteed-valid decomposition: one subtask wrapping the whole task.
pub fn fallback(task: &ComplexTask) -> TaskDecomposition {
    TaskDecomposition {
        subtasks: vec![SubTask::new(task.id, task.description.clone())],
        dependencies: Vec::new(),
        estimated_complexity: FALLBACK_COMPLEXITY,
        required_capabilities: vec![FALLBACK_CAPABILITY.to_string()],
    }
}

fn build_prompt(task: &ComplexTask) -> String {
    let mut prompt = String::from(
        "Decompose the following task into 3-7 atomic subtasks, each sized \
         5-30 minutes of agent effort.\n\n",
    );
    prompt.push_str(&format!("Task: {}\n", task.description));
    if let Some(category) = &task.category {
        prompt.push_str(&format!("Category: {category}\n"));
    }
    prompt.push_str(&format!("Priority: {:?}\n", task.priority));
    if let Some(deadline) = task.deadline {
        prompt.push_str(&format!("Deadline: {}\n", deadline.to_rfc3339()));
    }
    if !task.requirements.is_empty() {
        prompt.push_str("Requirements:\n");
        for req in &task.requirements {
            prompt.push_str(&format!(
                "- {} ({:?}, {:?})\n",
                req.name, req.requirement_type, req.importance
            ));
        }
    }
    if !task.constraints.is_empty() {
        prompt.push_str("Constraints:\n");
        for constraint in &task.constraints {
            prompt.push_str(&format!("- {constraint}\n"));
        }
    }
    prompt.push_str(
        "\nRespond with a single JSON object and nothing else:\n\
         {\n\
         \x20 \"subtasks\": [{\"id\": \"s1\", \"description\": \"...\", \"estimated_minutes\": 15}],\n\
         \x20 \"dependencies\": [{\"from\": \"s1\", \"to\": \"s2\", \"kind\": \"sequential\"}],\n\
         \x20 \"complexity\": 5,\n\
         \x20 \"capabilities\": [\"research\"]\n\
         }\n",
    );
    prompt
}

/// Extracts the outermost JSON object from free text (the boundary often
/// wraps its JSON in prose or markdown fences).
fn extract_json(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, ch) in text[start..].char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=start + offset]);
                }
            }
            _ => {}
        }
    }
    None
}

fn parse_decomposition(task: &ComplexTask, text: &str) -> ApiaryResult<TaskDecomposition> {
    let json = extract_json(text)
        .ok_or_else(|| ApiaryError::Decomposition("no JSON object in response".to_string()))?;
    let raw: RawDecomposition = serde_json::from_str(json)
        .map_err(|e| ApiaryError::Decomposition(format!("schema mismatch: {e}")))?;

    if raw.subtasks.is_empty() {
        return Err(ApiaryError::Decomposition(
            "response contains no subtasks".to_string(),
        ));
    }

    // Assign stable ids; remember the response's own ids so dependencies
    // can be resolved against them.
    let mut by_raw_id: HashMap<String, Uuid> = HashMap::new();
    let mut subtasks = Vec::with_capacity(raw.subtasks.len());
    for raw_subtask in raw.subtasks {
        let mut subtask = SubTask::new(task.id, raw_subtask.description);
        if let Some(minutes) = raw_subtask.estimated_minutes {
            subtask = subtask.with_estimate(minutes);
        }
        if let Some(raw_id) = raw_subtask.id {
            by_raw_id.insert(raw_id, subtask.id);
        }
        subtasks.push(subtask);
    }

    let mut dependencies = Vec::new();
    let mut dropped = 0usize;
    for raw_dep in raw.dependencies {
        let (Some(&from), Some(&to)) = (by_raw_id.get(&raw_dep.from), by_raw_id.get(&raw_dep.to))
        else {
            dropped += 1;
            continue;
        };
        if from == to {
            dropped += 1;
            continue;
        }
        if dependencies
            .iter()
            .any(|d: &TaskDependency| d.from == from && d.to == to)
        {
            dropped += 1;
            continue;
        }
        dependencies.push(TaskDependency {
            from,
            to,
            kind: raw_dep.kind.unwrap_or(DependencyKind::Sequential),
            condition: raw_dep.condition,
        });
    }
    if dropped > 0 {
        warn!(
            task = %task.id,
            dropped,
            "pruned invalid dependency edges from decomposition response"
        );
    }

    let capabilities = required_capabilities(&subtasks, &raw.capabilities);
    let decomposition = TaskDecomposition {
        subtasks,
        dependencies,
        estimated_complexity: raw.complexity.unwrap_or(FALLBACK_COMPLEXITY).clamp(1, 10),
        required_capabilities: capabilities,
    };

    // A cycle invalidates the whole graph; the caller falls back.
    if DependencyGraph::from_decomposition(&decomposition).has_cycle() {
        return Err(ApiaryError::Decomposition(
            "dependency edges contain a cycle".to_string(),
        ));
    }

    Ok(decomposition)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use apiary_core::{RequirementImportance, RequirementType, TaskPriority, TaskRequirement};
    use apiary_reasoning::ReasoningBackend;
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::time::Duration;

    /// Backend that replays a canned response, or errors when none is set.
    struct ScriptedBackend {
        response: Option<String>,
    }

    #[async_trait]
    impl ReasoningBackend for ScriptedBackend {
        async fn generate(&self, _prompt: &str) -> ApiaryResult<String> {
            self.response
                .clone()
                .ok_or_else(|| ApiaryError::Reasoning("service unavailable".to_string()))
        }
    }

    fn decomposer_with(response: Option<&str>) -> TaskDecomposer {
        let backend = Arc::new(ScriptedBackend {
            response: response.map(ToString::to_string),
        });
        TaskDecomposer::new(ReasoningClient::new(backend, Duration::from_secs(5)))
    }

    fn task() -> ComplexTask {
        ComplexTask::new(
            "Research X, then summarize X, then write a report",
            TaskPriority::Medium,
        )
        .with_title("X report")
        .with_requirement(TaskRequirement {
            requirement_type: RequirementType::Capability,
            name: "research".to_string(),
            importance: RequirementImportance::Required,
        })
        .with_constraint("cite primary sources")
    }

    const THREE_STEP: &str = r#"Here is the breakdown:
    {
      "subtasks": [
        {"id": "s1", "description": "Research X", "estimated_minutes": 20},
        {"id": "s2", "description": "Summarize X", "estimated_minutes": 10},
        {"id": "s3", "description": "Write a report on X", "estimated_minutes": 25}
      ],
      "dependencies": [
        {"from": "s1", "to": "s2", "kind": "sequential"},
        {"from": "s2", "to": "s3", "kind": "sequential"}
      ],
      "complexity": 6,
      "capabilities": ["domain_research"]
    }"#;

    #[tokio::test]
    async fn test_three_step_decomposition_orders_sequentially() {
        let decomposition = decomposer_with(Some(THREE_STEP)).decompose(&task()).await;
        assert_eq!(decomposition.subtasks.len(), 3);
        assert_eq!(decomposition.dependencies.len(), 2);
        assert_eq!(decomposition.estimated_complexity, 6);

        let order = execution_order(&decomposition).unwrap();
        assert_eq!(order, decomposition.subtask_ids());
    }

    #[tokio::test]
    async fn test_malformed_response_falls_back() {
        let decomposition = decomposer_with(Some("the task is easy, just do it"))
            .decompose(&task())
            .await;
        assert_eq!(decomposition.subtasks.len(), 1);
        assert_eq!(decomposition.subtasks[0].description, task().description);
        assert_eq!(decomposition.estimated_complexity, 5);
        assert_eq!(
            decomposition.required_capabilities,
            vec!["general_processing".to_string()]
        );
    }

    #[tokio::test]
    async fn test_backend_error_falls_back() {
        let decomposition = decomposer_with(None).decompose(&task()).await;
        assert_eq!(decomposition.subtasks.len(), 1);
        assert!(validate(&decomposition).is_empty());
    }

    #[tokio::test]
    async fn test_empty_subtask_list_falls_back() {
        let decomposition = decomposer_with(Some(r#"{"subtasks": [], "complexity": 2}"#))
            .decompose(&task())
            .await;
        assert_eq!(decomposition.subtasks.len(), 1);
        assert_eq!(decomposition.estimated_complexity, 5);
    }

    #[tokio::test]
    async fn test_cyclic_response_falls_back() {
        let cyclic = r#"{
          "subtasks": [
            {"id": "a", "description": "first"},
            {"id": "b", "description": "second"}
          ],
          "dependencies": [
            {"from": "a", "to": "b"},
            {"from": "b", "to": "a"}
          ]
        }"#;
        let decomposition = decomposer_with(Some(cyclic)).decompose(&task()).await;
        assert_eq!(decomposition.subtasks.len(), 1);
        assert_eq!(
            decomposition.required_capabilities,
            vec!["general_processing".to_string()]
        );
    }

    #[tokio::test]
    async fn test_dangling_and_self_edges_are_pruned_not_fatal() {
        let messy = r#"{
          "subtasks": [
            {"id": "a", "description": "analyze the dataset"},
            {"id": "b", "description": "chart the findings"}
          ],
          "dependencies": [
            {"from": "a", "to": "b"},
            {"from": "a", "to": "ghost"},
            {"from": "b", "to": "b"},
            {"from": "a", "to": "b"}
          ]
        }"#;
        let decomposition = decomposer_with(Some(messy)).decompose(&task()).await;
        assert_eq!(decomposition.subtasks.len(), 2);
        assert_eq!(decomposition.dependencies.len(), 1);
        assert!(validate(&decomposition).is_empty());
    }

    #[tokio::test]
    async fn test_fallback_is_always_valid() {
        let decomposition = fallback(&task());
        assert!(validate(&decomposition).is_empty());
        assert_eq!(execution_order(&decomposition).unwrap().len(), 1);
    }

    #[test]
    fn test_capability_keyword_families() {
        let parent = Uuid::new_v4();
        let subtasks = vec![
            SubTask::new(parent, "Research the market and gather sources"),
            SubTask::new(parent, "Summarize the findings"),
            SubTask::new(parent, "Write the final report"),
        ];
        let tags = required_capabilities(&subtasks, &["Custom_Skill".to_string()]);
        assert!(tags.contains(&"research".to_string()));
        assert!(tags.contains(&"summarization".to_string()));
        assert!(tags.contains(&"generation".to_string()));
        assert!(tags.contains(&"custom_skill".to_string()));
        // Insertion-ordered and deduplicated.
        let mut deduped = tags.clone();
        deduped.dedup();
        assert_eq!(tags, deduped);
    }

    #[test]
    fn test_extract_json_from_fenced_text() {
        let text = "```json\n{\"subtasks\": [{\"description\": \"x {braces} inside\"}]}\n```";
        let json = extract_json(text).unwrap();
        assert!(serde_json::from_str::<serde_json::Value>(json).is_ok());
    }

    #[test]
    fn test_complexity_clamped_to_range() {
        let raw = r#"{"subtasks": [{"id": "a", "description": "only step"}], "complexity": 42}"#;
        let decomposition = parse_decomposition(&task(), raw).unwrap();
        assert_eq!(decomposition.estimated_complexity, 10);
    }
}
