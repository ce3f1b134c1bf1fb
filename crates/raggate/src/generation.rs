//! Answer generation providers.
//!
//! Implements the core [`Generator`] trait over OpenAI-compatible chat
//! completions APIs (Groq and OpenAI share the wire format, only the
//! base URL and API key env var differ). Uses the same retry strategy as
//! the embedding provider: 429/5xx/network errors retry with exponential
//! backoff, other 4xx fail immediately.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use raggate_core::generate::{combined_user_message, GenerationRequest, Generator};

use crate::config::GenerationConfig;

pub fn create_generator(config: &GenerationConfig) -> Result<Arc<dyn Generator>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledGenerator)),
        "groq" | "openai" => Ok(Arc::new(ChatCompletionsGenerator::new(config)?)),
        other => bail!("Unknown generation provider: {}", other),
    }
}

fn api_key_var(provider: &str) -> &'static str {
    match provider {
        "groq" => "GROQ_API_KEY",
        _ => "OPENAI_API_KEY",
    }
}

/// A no-op generator that always returns errors.
pub struct DisabledGenerator;

#[async_trait]
impl Generator for DisabledGenerator {
    async fn generate(&self, _req: &GenerationRequest) -> Result<String> {
        bail!("Generation provider is disabled")
    }
}

/// Generator backed by an OpenAI-compatible `POST /chat/completions`
/// endpoint.
pub struct ChatCompletionsGenerator {
    model: String,
    api_base: String,
    api_key_var: &'static str,
    temperature: f64,
    max_tokens: u32,
    max_retries: u32,
    client: reqwest::Client,
}

impl ChatCompletionsGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("generation.model required for '{}'", config.provider))?;

        let api_key_var = api_key_var(&config.provider);
        if std::env::var(api_key_var).is_err() {
            bail!("{} environment variable not set", api_key_var);
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            model,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key_var,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            max_retries: config.max_retries,
            client,
        })
    }
}

#[async_trait]
impl Generator for ChatCompletionsGenerator {
    async fn generate(&self, req: &GenerationRequest) -> Result<String> {
        let api_key = std::env::var(self.api_key_var)
            .map_err(|_| anyhow::anyhow!("{} not set", self.api_key_var))?;

        let body = serde_json::json!({
            "model": self.model,
            "messages": build_messages(req),
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
        });

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .client
                .post(format!("{}/chat/completions", self.api_base))
                .header("Authorization", format!("Bearer {}", api_key))
                .header("Content-Type", "application/json")
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response.json().await?;
                        return parse_completion_response(&json);
                    }

                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        last_err = Some(anyhow::anyhow!(
                            "Chat completions API error {}: {}",
                            status,
                            body_text
                        ));
                        continue;
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    bail!("Chat completions API error {}: {}", status, body_text);
                }
                Err(e) => {
                    last_err = Some(e.into());
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("Generation failed after retries")))
    }
}

/// Assemble the chat transcript: system prompt first, then prior turns
/// as alternating user/assistant messages, then the current question
/// with its retrieved context folded into one user message.
fn build_messages(req: &GenerationRequest) -> Vec<serde_json::Value> {
    let mut messages = Vec::with_capacity(2 + req.history.len() * 2);

    messages.push(serde_json::json!({
        "role": "system",
        "content": req.system_prompt,
    }));

    for turn in &req.history {
        messages.push(serde_json::json!({ "role": "user", "content": turn.input }));
        messages.push(serde_json::json!({ "role": "assistant", "content": turn.output }));
    }

    messages.push(serde_json::json!({
        "role": "user",
        "content": combined_user_message(&req.contexts, &req.question),
    }));

    messages
}

fn parse_completion_response(json: &serde_json::Value) -> Result<String> {
    json.get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| anyhow::anyhow!("Invalid chat completions response: missing content"))
}
