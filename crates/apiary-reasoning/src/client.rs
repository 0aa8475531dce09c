use std::sync::Arc;
use std::time::Duration;

use apiary_core::{ApiaryError, ApiaryResult};
use tracing::warn;

use crate::backend::ReasoningBackend;

/// Client wrapping any [`ReasoningBackend`] with a hard timeout.
///
/// The decomposition path must never wait unboundedly on the reasoning
/// service, so every call goes through [`ReasoningClient::generate`], which
/// converts an expired timeout into an ordinary reasoning error.
pub struct ReasoningClient {
    backend: Arc<dyn ReasoningBackend>,
    timeout: Duration,
}

impl ReasoningClient {
    /// Creates a client with the given timeout.
    pub fn new(backend: Arc<dyn ReasoningBackend>, timeout: Duration) -> Self {
        Self { backend, timeout }
    }

    /// Generates text, failing with a reasoning error once the timeout expires.
    pub async fn generate(&self, prompt: &str) -> ApiaryResult<String> {
        match tokio::time::timeout(self.timeout, self.backend.generate(prompt)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(timeout_ms = self.timeout.as_millis() as u64, "reasoning call timed out");
                Err(ApiaryError::Reasoning(format!(
                    "reasoning call exceeded {}ms",
                    self.timeout.as_millis()
                )))
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct SlowBackend;

    #[async_trait]
    impl ReasoningBackend for SlowBackend {
        async fn generate(&self, _prompt: &str) -> ApiaryResult<String> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok("too late".to_string())
        }
    }

    struct EchoBackend;

    #[async_trait]
    impl ReasoningBackend for EchoBackend {
        async fn generate(&self, prompt: &str) -> ApiaryResult<String> {
            Ok(prompt.to_string())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_becomes_reasoning_error() {
        let client = ReasoningClient::new(Arc::new(SlowBackend), Duration::from_millis(50));
        let err = client.generate("prompt").await.unwrap_err();
        assert!(matches!(err, ApiaryError::Reasoning(_)));
    }

    #[tokio::test]
    async fn test_fast_backend_passes_through() {
        let client = ReasoningClient::new(Arc::new(EchoBackend), Duration::from_secs(5));
        assert_eq!(client.generate("ping").await.unwrap(), "ping");
    }
}
