use apiary_core::ApiaryResult;
use async_trait::async_trait;

/// Trait for the external text-generation service.
///
/// There is no guaranteed output schema: the returned text is whatever the
/// service produced, and callers must defensively parse it. Implementations
/// map transport and status failures into [`apiary_core::ApiaryError::Reasoning`].
#[async_trait]
pub trait ReasoningBackend: Send + Sync {
    /// Generates text for a structured prompt.
    async fn generate(&self, prompt: &str) -> ApiaryResult<String>;
}
