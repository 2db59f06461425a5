//! Chat-completion client that turns the digest into a short summary.
//!
//! Every failure maps to a fixed fallback text, so the caller always gets a string.

use crate::config::{Config, ConfigError};
use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

/// Returned when the model could not be called at all
pub const MODEL_CALL_FALLBACK: &str = "GPT 호출 실패로 오늘 뉴스 요약을 생성하지 못했습니다.";

/// Returned when the model answered without any choices
pub const MALFORMED_RESPONSE_FALLBACK: &str = "GPT 응답 오류로 요약 생성에 실패했습니다.";

#[derive(Error, Debug)]
pub enum SummarizeError {
    #[error("configuration error: {0}")]
    ConfigError(#[from] ConfigError),
    #[error("completion request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),
    #[error("completion endpoint returned HTTP {0}")]
    Status(StatusCode),
    #[error("completion response is not JSON: {0}")]
    ParseError(#[from] serde_json::Error),
    #[error("completion response has no choices: {0}")]
    MissingChoices(Value),
    #[error("completion response has no message in its first choice")]
    EmptyChoice,
}

impl SummarizeError {
    /// The fixed text that stands in for the summary
    pub fn fallback_text(&self) -> &'static str {
        match self {
            SummarizeError::MissingChoices(_) => MALFORMED_RESPONSE_FALLBACK,
            _ => MODEL_CALL_FALLBACK,
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

/// Client for the configured chat-completion endpoint
pub struct Summarizer {
    client: Client,
    config: Arc<Config>,
}

impl Summarizer {
    pub fn new(config: Arc<Config>) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(config.model.timeout()).build()?;
        Ok(Self { client, config })
    }

    /// Ask the model to summarise `text`
    pub async fn summarize(&self, text: &str) -> Result<String, SummarizeError> {
        let api_key = self.config.credentials.api_key()?;
        let model = &self.config.model;

        // Build the prompt and request body
        let request = ChatRequest {
            model: &model.name,
            messages: vec![ChatMessage {
                role: "user",
                content: render_prompt(&model.prompt, text),
            }],
            temperature: model.temperature,
        };

        let response = self
            .client
            .post(&model.endpoint)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SummarizeError::Status(status));
        }

        // Parse as untyped JSON; the shape is checked by hand
        let body = response.text().await?;
        let json: Value = serde_json::from_str(&body)?;
        extract_content(json)
    }

    /// Summarise `text`, substituting the fallback text on any failure
    pub async fn summarize_or_fallback(&self, text: &str) -> String {
        match self.summarize(text).await {
            Ok(summary) => summary,
            Err(err) => {
                match &err {
                    SummarizeError::MissingChoices(raw) => {
                        tracing::warn!(response = %raw, "unexpected completion response");
                    }
                    _ => {
                        tracing::warn!(error = %err, "completion request failed");
                    }
                }
                err.fallback_text().to_string()
            }
        }
    }
}

/// Substitute the digest into the prompt template
pub fn render_prompt(template: &str, text: &str) -> String {
    template.replace("{text}", text)
}

/// Pull `choices[0].message.content` out of a completion response
fn extract_content(json: Value) -> Result<String, SummarizeError> {
    let Some(choices) = json.get("choices") else {
        return Err(SummarizeError::MissingChoices(json));
    };

    choices
        .get(0)
        .and_then(|choice| choice.pointer("/message/content"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or(SummarizeError::EmptyChoice)
}
