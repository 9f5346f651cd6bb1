// src/agent/completion.rs

//! Chat-completions client for the planning and narration model.
//!
//! Requests are bounded by a client-level timeout so a slow model can never
//! stall the pipeline; callers treat any error (timeout included) as an
//! outage and fall back.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

#[derive(Clone)]
pub struct CompletionClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

impl CompletionClient {
    pub fn new(
        base_url: String,
        api_key: String,
        model: String,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("building completion http client")?;
        Ok(Self {
            http,
            base_url,
            api_key,
            model,
        })
    }

    async fn chat(
        &self,
        system: &str,
        user: &str,
        json_mode: bool,
        max_tokens: Option<u32>,
    ) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature: 0.0,
            response_format: json_mode.then(|| serde_json::json!({ "type": "json_object" })),
            max_tokens,
        };

        let response = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("completion service returned {}: {}", status, body));
        }

        let body: ChatResponse = response.json().await?;
        body.choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| anyhow!("completion response had no choices"))
    }

    /// Strict-JSON completion. A response that fails to parse is an error,
    /// to be treated like an outage by the caller.
    pub async fn complete_json(&self, system: &str, user: &str) -> Result<Value> {
        let content = self.chat(system, user, true, None).await?;
        let trimmed = strip_json_wrapper(&content);
        serde_json::from_str(trimmed).with_context(|| {
            format!(
                "completion output was not valid JSON: {}",
                truncate(&content, 200)
            )
        })
    }

    pub async fn complete_text(&self, system: &str, user: &str, max_tokens: u32) -> Result<String> {
        let content = self.chat(system, user, false, Some(max_tokens)).await?;
        let out = content.trim().to_string();
        if out.is_empty() {
            return Err(anyhow!("completion service returned empty text"));
        }
        Ok(out)
    }
}

/// Models occasionally wrap JSON output in a markdown fence; take the
/// outermost object.
fn strip_json_wrapper(content: &str) -> &str {
    match (content.find('{'), content.rfind('}')) {
        (Some(start), Some(end)) if end >= start => &content[start..=end],
        _ => content,
    }
}

fn truncate(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
