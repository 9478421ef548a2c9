use crate::config::Settings;
use crate::error::ProviderError;
use crate::prompt::SYSTEM_PROMPT;
use crate::types::RawModelOutput;
use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Something that turns a prompt into raw model text. One call per extraction.
pub trait CompletionBackend {
    fn complete(&self, prompt: &str) -> Result<RawModelOutput, ProviderError>;
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f64,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

/// Blocking client for an OpenAI-compatible chat completions endpoint (Groq by default).
pub struct ExtractionClient {
    settings: Settings,
    http: Client,
}

impl ExtractionClient {
    pub fn new(settings: Settings) -> Result<Self, ProviderError> {
        let http = Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| ProviderError::Client(e.to_string()))?;
        Ok(Self { settings, http })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.settings.base_url)
    }
}

impl CompletionBackend for ExtractionClient {
    fn complete(&self, prompt: &str) -> Result<RawModelOutput, ProviderError> {
        let key = self
            .settings
            .api_key
            .as_deref()
            .ok_or(ProviderError::MissingApiKey)?;

        let body = ChatRequest {
            model: &self.settings.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
        };

        info!(model = %self.settings.model, prompt_chars = prompt.len(), "sending extraction request");
        let started = Instant::now();
        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(key)
            .json(&body)
            .send()
            .map_err(|e| {
                if e.is_connect() || e.is_timeout() {
                    ProviderError::Network(
                        "Check your internet connection and try again.".to_string(),
                    )
                } else {
                    ProviderError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        debug!(status = %status, elapsed_ms = started.elapsed().as_millis() as u64, "provider responded");
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            warn!(status = %status, "extraction request failed");
            return Err(status_error(status, body));
        }

        let parsed: ChatResponse = response
            .json()
            .map_err(|e| ProviderError::InvalidResponse(format!("Invalid JSON: {}", e)))?;
        content_of(parsed)
    }
}

/// Map a non-success status to the matching provider failure.
fn status_error(status: StatusCode, body: String) -> ProviderError {
    let detail = if body.trim().is_empty() {
        status
            .canonical_reason()
            .unwrap_or("no response body")
            .to_string()
    } else {
        body
    };
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ProviderError::Unauthorized(detail),
        StatusCode::TOO_MANY_REQUESTS => ProviderError::RateLimited(detail),
        _ => ProviderError::Status {
            status: status.as_u16(),
            body: detail,
        },
    }
}

fn content_of(response: ChatResponse) -> Result<RawModelOutput, ProviderError> {
    let content = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::InvalidResponse("No choices in response".to_string()))?
        .message
        .content
        .ok_or_else(|| ProviderError::InvalidResponse("Empty message content".to_string()))?;
    Ok(RawModelOutput(content.trim().to_string()))
}
