//! Live adapter for the `LlmClient` port using an OpenAI-compatible
//! chat-completions endpoint.

use std::env;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::LlmSettings;
use crate::ports::{BoxError, CompletionFuture, CompletionRequest, CompletionResponse, LlmClient};

/// Live LLM client for any server speaking the chat-completions protocol.
pub struct LiveLlmClient {
    client: Client,
    base_url: String,
    api_key_env: String,
}

impl LiveLlmClient {
    /// Creates a client for `settings.base_url`, reading the key from the
    /// variable named by `settings.api_key_env` on each call.
    #[must_use]
    pub fn new(settings: &LlmSettings) -> Self {
        Self {
            client: Client::new(),
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key_env: settings.api_key_env.clone(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

/// Request body for `/chat/completions`.
#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

impl<'a> ChatRequest<'a> {
    fn from_completion(request: &'a CompletionRequest) -> Self {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = request.system.as_deref() {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: &request.prompt,
        });
        Self {
            model: &request.model,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            messages,
        }
    }
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Usage,
}

#[derive(Deserialize)]
struct Choice {
    message: AssistantMessage,
}

#[derive(Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize, Default)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

#[derive(Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
}

fn parse_response(body: &str) -> Result<CompletionResponse, BoxError> {
    let parsed: ChatResponse = serde_json::from_str(body)
        .map_err(|e| format!("Failed to parse chat completion response: {e}"))?;
    let text = parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or("chat completion response had no message content")?;
    Ok(CompletionResponse {
        text,
        prompt_tokens: parsed.usage.prompt_tokens,
        completion_tokens: parsed.usage.completion_tokens,
    })
}

impl LlmClient for LiveLlmClient {
    fn complete(&self, request: &CompletionRequest) -> CompletionFuture<'_> {
        let request = request.clone();

        Box::pin(async move {
            let api_key = env::var(&self.api_key_env)
                .map_err(|_| format!("{} environment variable not set", self.api_key_env))?;
            let body = ChatRequest::from_completion(&request);
            debug!(
                model = %request.model,
                max_tokens = request.max_tokens,
                "sending chat completion"
            );

            let response = self
                .client
                .post(self.endpoint())
                .bearer_auth(&api_key)
                .json(&body)
                .send()
                .await
                .map_err(|e| format!("Chat completion request failed: {e}"))?;

            let status = response.status();
            let text = response
                .text()
                .await
                .map_err(|e| format!("Failed to read chat completion response: {e}"))?;

            if !status.is_success() {
                let msg = serde_json::from_str::<ApiError>(&text)
                    .map(|e| e.error.message)
                    .unwrap_or(text);
                return Err(
                    format!("Chat completion API error ({}): {msg}", status.as_u16()).into(),
                );
            }

            parse_response(&text)
        })
    }
}
