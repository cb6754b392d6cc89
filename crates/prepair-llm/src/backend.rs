//! LLM backend trait and the OpenAI-compatible implementation.
//!
//! The corpus builder only needs single-turn exchanges against an
//! OpenAI-compatible `/v1/chat/completions` endpoint (vLLM, TabbyAPI,
//! LMStudio, OpenAI itself, …). No conversational state is kept between
//! calls. A request may carry one PNG attachment on the user turn, used by
//! the OCR transcription path.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ── Error ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("Backend unavailable: {0}")]
    Unavailable(String),
    #[error("API error [{status}]: {message}")]
    ApiError { status: u16, message: String },
}

impl From<LlmError> for prepair_common::PrepairError {
    fn from(e: LlmError) -> Self {
        prepair_common::PrepairError::Inference(e.to_string())
    }
}

// ── Request / Response ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String, // "system" | "user"
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: "system".to_string(), content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".to_string(), content: content.into() }
    }
}

#[derive(Debug, Clone, Default)]
pub struct LlmRequest {
    pub messages: Vec<Message>,
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    /// Base64 PNG attached to the final user turn (OCR transcription).
    pub image_png_b64: Option<String>,
}

impl LlmRequest {
    pub fn one_turn(system_prompt: impl Into<String>, user_prompt: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::system(system_prompt), Message::user(user_prompt)],
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub content: String,
    pub model: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

// ── Trait ─────────────────────────────────────────────────────────────────────

#[async_trait]
pub trait LlmBackend: Send + Sync {
    async fn complete(&self, req: LlmRequest) -> Result<LlmResponse, LlmError>;
    fn model_id(&self) -> &str;
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn parse_openai_response(json: &serde_json::Value, fallback_model: &str) -> LlmResponse {
    LlmResponse {
        content: json["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or("")
            .to_string(),
        model: json["model"]
            .as_str()
            .unwrap_or(fallback_model)
            .to_string(),
        prompt_tokens:     json["usage"]["prompt_tokens"].as_u64().unwrap_or(0) as u32,
        completion_tokens: json["usage"]["completion_tokens"].as_u64().unwrap_or(0) as u32,
    }
}

async fn check_response_status(resp: reqwest::Response) -> Result<serde_json::Value, LlmError> {
    let status = resp.status().as_u16();
    let body: serde_json::Value = resp.json().await?;
    if status >= 400 {
        let msg = body["error"]["message"]
            .as_str()
            .or_else(|| body["message"].as_str())
            .unwrap_or("unknown API error")
            .to_string();
        return Err(LlmError::ApiError { status, message: msg });
    }
    Ok(body)
}

/// Serialize the message list, expanding the final user turn into an
/// image+text content array when an attachment is present.
fn build_messages(req: &LlmRequest) -> Vec<serde_json::Value> {
    let last_user = req
        .messages
        .iter()
        .rposition(|m| m.role == "user")
        .filter(|_| req.image_png_b64.is_some());

    req.messages
        .iter()
        .enumerate()
        .map(|(i, m)| {
            if Some(i) == last_user {
                let data_url = format!(
                    "data:image/png;base64,{}",
                    req.image_png_b64.as_deref().unwrap_or("")
                );
                serde_json::json!({
                    "role": m.role,
                    "content": [
                        { "type": "text", "text": m.content },
                        { "type": "image_url", "image_url": { "url": data_url } },
                    ]
                })
            } else {
                serde_json::json!({ "role": m.role, "content": m.content })
            }
        })
        .collect()
}

// ── OpenAI-compatible backend ─────────────────────────────────────────────────

pub struct OpenAiCompatibleBackend {
    pub base_url: String,
    pub model: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl OpenAiCompatibleBackend {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            model: model.into(),
            api_key,
            client: reqwest::Client::new(),
        }
    }

    fn auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(k) => req.bearer_auth(k),
            None    => req,
        }
    }
}

#[async_trait]
impl LlmBackend for OpenAiCompatibleBackend {
    async fn complete(&self, req: LlmRequest) -> Result<LlmResponse, LlmError> {
        let url = format!("{}/v1/chat/completions", self.base_url.trim_end_matches('/'));
        let body = serde_json::json!({
            "model":       req.model.as_deref().unwrap_or(&self.model),
            "messages":    build_messages(&req),
            "max_tokens":  req.max_tokens.unwrap_or(4096),
            "temperature": req.temperature.unwrap_or(0.7),
        });
        let resp = self.auth(self.client.post(&url)).json(&body).send().await?;
        let json = check_response_status(resp).await?;
        Ok(parse_openai_response(&json, &self.model))
    }

    fn model_id(&self) -> &str { &self.model }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_with_no_key() {
        // No API key is valid for vLLM / LMStudio endpoints
        let b = OpenAiCompatibleBackend::new("http://localhost:5000", "llama-3-8b", None);
        assert_eq!(b.model_id(), "llama-3-8b");
    }

    #[test]
    fn test_plain_messages_stay_strings() {
        let req = LlmRequest::one_turn("clean this", "chunk text");
        let msgs = build_messages(&req);
        assert_eq!(msgs.len(), 2);
        assert_eq!(msgs[1]["content"].as_str(), Some("chunk text"));
    }

    #[test]
    fn test_image_attachment_expands_user_turn() {
        let mut req = LlmRequest::one_turn("transcribe", "");
        req.image_png_b64 = Some("aGVsbG8=".to_string());
        let msgs = build_messages(&req);
        let content = msgs[1]["content"].as_array().expect("array content");
        assert_eq!(content.len(), 2);
        assert!(content[1]["image_url"]["url"]
            .as_str()
            .unwrap()
            .starts_with("data:image/png;base64,"));
        // System turn is untouched
        assert_eq!(msgs[0]["content"].as_str(), Some("transcribe"));
    }

    #[test]
    fn test_parse_openai_response_shape() {
        let json = serde_json::json!({
            "model": "llama-3-8b",
            "choices": [{ "message": { "content": "cleaned text" } }],
            "usage": { "prompt_tokens": 12, "completion_tokens": 5 }
        });
        let r = parse_openai_response(&json, "fallback");
        assert_eq!(r.content, "cleaned text");
        assert_eq!(r.model, "llama-3-8b");
        assert_eq!(r.prompt_tokens, 12);
    }
}
