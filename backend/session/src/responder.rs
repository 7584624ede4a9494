//! Chat responders that turn a user message into the text the avatar speaks.

use anyhow::{Context, Result};
use async_trait::async_trait;
use livetalk_core::ChatResponder;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Replies with the message behind a fixed prefix.
pub struct EchoResponder {
    prefix: String,
}

impl EchoResponder {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }
}

impl Default for EchoResponder {
    fn default() -> Self {
        Self::new("收到: ")
    }
}

#[async_trait]
impl ChatResponder for EchoResponder {
    fn name(&self) -> &str {
        "echo"
    }

    async fn respond(&self, message: &str) -> Result<String> {
        Ok(format!("{}{message}", self.prefix))
    }
}

/// OpenAI-compatible `/v1/chat/completions` client.
pub struct OpenAiResponder {
    client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    system_prompt: Option<String>,
}

impl OpenAiResponder {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key: None,
            system_prompt: None,
        }
    }

    pub fn with_api_key(mut self, key: Option<String>) -> Self {
        self.api_key = key;
        self
    }

    pub fn with_system_prompt(mut self, prompt: Option<String>) -> Self {
        self.system_prompt = prompt;
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url)
    }

    fn request_body(&self, message: &str) -> ChatRequest {
        let mut messages = Vec::new();
        if let Some(system) = &self.system_prompt {
            messages.push(ChatMessage { role: "system".into(), content: system.clone() });
        }
        messages.push(ChatMessage { role: "user".into(), content: message.to_string() });
        ChatRequest { model: self.model.clone(), messages, stream: false }
    }
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
}

#[derive(Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[async_trait]
impl ChatResponder for OpenAiResponder {
    fn name(&self) -> &str {
        "openai"
    }

    async fn respond(&self, message: &str) -> Result<String> {
        debug!(model = %self.model, "Sending chat request");
        let mut request = self.client.post(self.endpoint()).json(&self.request_body(message));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let response = request.send().await.context("Chat HTTP request failed")?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            anyhow::bail!("Chat endpoint returned {}: {}", status, error_body);
        }

        let body: ChatResponse = response.json().await.context("Failed to parse chat response")?;
        body.choices
            .into_iter()
            .next()
            .map(|c| c.message.content.trim().to_string())
            .context("Chat response had no choices")
    }
}
