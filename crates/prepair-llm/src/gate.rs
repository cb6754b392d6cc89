//! Process-wide inference throttling and the chunk-cleaning fan-out.
//!
//! One semaphore bounds every in-flight inference call in the run —
//! cleaning, title extraction, and OCR transcription alike — so the
//! external service never sees more concurrent requests than configured,
//! regardless of how many chunks or documents are in flight.

use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::debug;

use prepair_common::chunk::TextChunk;

use crate::backend::{LlmBackend, LlmError, LlmRequest};
use crate::prompts::CLEANING_PROMPT;

pub struct InferenceGate {
    backend: Arc<dyn LlmBackend>,
    permits: Arc<Semaphore>,
}

impl InferenceGate {
    pub fn new(backend: Arc<dyn LlmBackend>, max_concurrency: usize) -> Self {
        Self {
            backend,
            permits: Arc::new(Semaphore::new(max_concurrency.max(1))),
        }
    }

    /// Single prompt/response exchange, awaiting a permit first.
    pub async fn complete_text(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, LlmError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| LlmError::Unavailable("inference gate closed".to_string()))?;
        let resp = self
            .backend
            .complete(LlmRequest::one_turn(system_prompt, user_prompt))
            .await?;
        Ok(resp.content)
    }

    /// Vision exchange for one rendered page image, awaiting a permit first.
    pub async fn transcribe_image(
        &self,
        system_prompt: &str,
        png_b64: String,
    ) -> Result<String, LlmError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| LlmError::Unavailable("inference gate closed".to_string()))?;
        let mut req = LlmRequest::one_turn(system_prompt, "");
        req.image_png_b64 = Some(png_b64);
        let resp = self.backend.complete(req).await?;
        Ok(resp.content)
    }
}

/// Clean a document's chunks concurrently (bounded by the gate) and join the
/// results in original chunk order — never completion order. Any chunk
/// failure fails the whole stage for that document.
pub async fn clean_chunks(gate: &InferenceGate, chunks: &[TextChunk]) -> Result<String, LlmError> {
    debug!(n_chunks = chunks.len(), "Cleaning chunks");
    let cleaned = join_all(
        chunks
            .iter()
            .map(|c| gate.complete_text(CLEANING_PROMPT, &c.text)),
    )
    .await
    .into_iter()
    .collect::<Result<Vec<String>, LlmError>>()?;
    Ok(cleaned.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{LlmResponse, Message};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Echoes the user prompt back and tracks peak concurrency.
    struct CountingBackend {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        fail_on: Option<String>,
    }

    impl CountingBackend {
        fn new() -> Self {
            Self {
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
                fail_on: None,
            }
        }
    }

    #[async_trait]
    impl LlmBackend for CountingBackend {
        async fn complete(&self, req: LlmRequest) -> Result<LlmResponse, LlmError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            let user = req
                .messages
                .iter()
                .rev()
                .find(|m: &&Message| m.role == "user")
                .map(|m| m.content.clone())
                .unwrap_or_default();
            if self.fail_on.as_deref() == Some(user.as_str()) {
                return Err(LlmError::Unavailable("induced failure".to_string()));
            }
            Ok(LlmResponse {
                content: format!("clean({user})"),
                model: "stub".to_string(),
                prompt_tokens: 0,
                completion_tokens: 0,
            })
        }

        fn model_id(&self) -> &str { "stub" }
    }

    fn chunks_of(texts: &[&str]) -> Vec<TextChunk> {
        texts
            .iter()
            .enumerate()
            .map(|(index, t)| TextChunk { index, text: t.to_string() })
            .collect()
    }

    #[tokio::test]
    async fn test_throttle_never_exceeds_limit() {
        let backend = Arc::new(CountingBackend::new());
        let gate = InferenceGate::new(backend.clone(), 4);
        let texts: Vec<String> = (0..20).map(|i| format!("c{i}")).collect();
        let refs: Vec<&str> = texts.iter().map(|s| s.as_str()).collect();
        clean_chunks(&gate, &chunks_of(&refs)).await.unwrap();
        assert!(backend.peak.load(Ordering::SeqCst) <= 4);
    }

    #[tokio::test]
    async fn test_results_join_in_chunk_order() {
        let backend = Arc::new(CountingBackend::new());
        let gate = InferenceGate::new(backend, 2);
        let joined = clean_chunks(&gate, &chunks_of(&["a", "b", "c"])).await.unwrap();
        assert_eq!(joined, "clean(a) clean(b) clean(c)");
    }

    #[tokio::test]
    async fn test_single_chunk_failure_fails_the_stage() {
        let mut backend = CountingBackend::new();
        backend.fail_on = Some("b".to_string());
        let gate = InferenceGate::new(Arc::new(backend), 2);
        let result = clean_chunks(&gate, &chunks_of(&["a", "b", "c"])).await;
        assert!(result.is_err());
    }
}
