//! Minimal OpenAI client behind the `TextGenerator` port.
//!
//! We only call chat.completions and return the raw assistant text; shape
//! validation happens in the content generator, never here.
//! Calls are instrumented and log model names, latencies, and response sizes (not contents).
//!
//! NOTE: We never log the API key.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

/// Why an external generation attempt produced nothing usable.
#[derive(Debug, thiserror::Error)]
pub enum GenerationFailure {
  #[error("transport error: {0}")]
  Transport(String),
  #[error("upstream HTTP {status}: {message}")]
  Status { status: u16, message: String },
  #[error("timed out after {0:?}")]
  Timeout(Duration),
  #[error("malformed output: {0}")]
  Malformed(String),
}

/// External text generation: system + user prompt in, raw text out.
#[async_trait]
pub trait TextGenerator: Send + Sync {
  fn name(&self) -> &str;
  async fn generate_text(&self, system: &str, user: &str) -> Result<String, GenerationFailure>;
}

#[derive(Clone)]
pub struct OpenAI {
  pub client: reqwest::Client,
  pub api_key: String,
  pub base_url: String,
  pub model: String,
  /// Completion cap sent as `max_tokens`; `None` leaves it to the server.
  pub max_tokens: Option<u32>,
}

impl OpenAI {
  /// Construct the client if we find OPENAI_API_KEY; otherwise return None.
  pub fn from_env(request_timeout: Duration, max_tokens: Option<u32>) -> Option<Self> {
    let api_key = std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.trim().is_empty())?;
    let base_url =
      std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| "https://api.openai.com/v1".into());
    let model = std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".into());

    let client = reqwest::Client::builder()
      .timeout(request_timeout)
      .build()
      .ok()?;

    Some(Self { client, api_key, base_url, model, max_tokens })
  }

  fn chat_request(&self, system: &str, user: &str) -> ChatCompletionRequest {
    ChatCompletionRequest {
      model: self.model.clone(),
      messages: vec![
        ChatMessageReq { role: "system".into(), content: system.into() },
        ChatMessageReq { role: "user".into(), content: user.into() },
      ],
      temperature: 0.7,
      max_tokens: self.max_tokens,
    }
  }
}

#[async_trait]
impl TextGenerator for OpenAI {
  fn name(&self) -> &str {
    &self.model
  }

  /// Plain-text chat completion.
  #[instrument(level = "info", skip(self, system, user), fields(model = %self.model, user_len = user.len()))]
  async fn generate_text(&self, system: &str, user: &str) -> Result<String, GenerationFailure> {
    let url = format!("{}/chat/completions", self.base_url);
    let req = self.chat_request(system, user);

    let start = std::time::Instant::now();
    let res = self.client.post(&url)
      .header(USER_AGENT, "adventure-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
      .json(&req).send().await.map_err(|e| GenerationFailure::Transport(e.to_string()))?;

    if !res.status().is_success() {
      let status = res.status().as_u16();
      let body = res.text().await.unwrap_or_default();
      let message = extract_openai_error(&body).unwrap_or(body);
      return Err(GenerationFailure::Status { status, message });
    }

    let body: ChatCompletionResponse =
      res.json().await.map_err(|e| GenerationFailure::Malformed(e.to_string()))?;
    if let Some(usage) = &body.usage {
      info!(prompt_tokens = ?usage.prompt_tokens, completion_tokens = ?usage.completion_tokens, total_tokens = ?usage.total_tokens, "OpenAI usage");
    }
    let text = body.choices.first()
      .and_then(|c| c.message.content.clone())
      .unwrap_or_default().trim().to_string();
    info!(elapsed = ?start.elapsed(), response_len = text.len(), "Model response received");

    Ok(text)
  }
}

// --- Chat DTOs ---

#[derive(Serialize)]
struct ChatCompletionRequest {
  model: String,
  messages: Vec<ChatMessageReq>,
  temperature: f32,
  #[serde(skip_serializing_if = "Option::is_none")]
  max_tokens: Option<u32>,
}
#[derive(Serialize)]
struct ChatMessageReq { role: String, content: String }

#[derive(Deserialize)]
struct ChatCompletionResponse {
  choices: Vec<ChatChoice>,
  #[serde(default)] usage: Option<Usage>,
}
#[derive(Deserialize)]
struct ChatChoice { message: ChatMessageResp }
#[derive(Deserialize)]
struct ChatMessageResp { content: Option<String> }
#[derive(Deserialize)]
struct Usage {
  #[serde(default)] prompt_tokens: Option<u32>,
  #[serde(default)] completion_tokens: Option<u32>,
  #[serde(default)] total_tokens: Option<u32>,
}

/// Try to extract a clean error message from OpenAI error body.
fn extract_openai_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: EObj }
  #[derive(Deserialize)]
  struct EObj { message: String }
  match serde_json::from_str::<EWrap>(body) {
    Ok(w) => Some(w.error.message),
    Err(_) => None,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn extracts_error_message() {
    let body = r#"{"error":{"message":"Rate limit reached","type":"requests"}}"#;
    assert_eq!(extract_openai_error(body).as_deref(), Some("Rate limit reached"));
    assert_eq!(extract_openai_error("<html>"), None);
  }

  fn client(max_tokens: Option<u32>) -> OpenAI {
    OpenAI {
      client: reqwest::Client::new(),
      api_key: "sk-test".into(),
      base_url: "http://localhost".into(),
      model: "m".into(),
      max_tokens,
    }
  }

  #[test]
  fn request_carries_configured_max_tokens() {
    let v = serde_json::to_value(client(Some(1500)).chat_request("sys", "hi")).unwrap();
    assert_eq!(v["max_tokens"], 1500);
    assert_eq!(v["messages"][0]["role"], "system");
    assert_eq!(v["messages"][1]["content"], "hi");
  }

  #[test]
  fn request_omits_unset_max_tokens() {
    let v = serde_json::to_value(client(None).chat_request("sys", "hi")).unwrap();
    assert!(v.get("max_tokens").is_none());
  }
}
