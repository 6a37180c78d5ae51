//! Client for an OpenAI-compatible chat completions API.
//!
//! The chat endpoint delegates reply generation to an upstream provider.
//! Requests are non-streaming; the first choice's message content becomes
//! the assistant reply.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::AiConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: &str, content: &str) -> Self {
        Self {
            role: role.to_string(),
            content: content.to_string(),
        }
    }

    pub fn system(content: &str) -> Self {
        Self::new("system", content)
    }
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    content: Option<String>,
}

#[derive(Debug, Error)]
pub enum AiError {
    #[error("AI request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("AI request failed with status {status}: {summary}")]
    Upstream {
        status: reqwest::StatusCode,
        summary: String,
    },
    #[error("AI response contained no completion")]
    EmptyCompletion,
}

pub struct AiClient {
    client: reqwest::Client,
    config: AiConfig,
}

impl AiClient {
    pub fn new(config: AiConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    /// Request a single completion for the given message history
    pub async fn complete(&self, messages: &[ChatMessage]) -> Result<String, AiError> {
        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );

        let response = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(&CompletionRequest {
                model: &self.config.model,
                messages,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AiError::Upstream {
                status,
                summary: extract_error_summary(&body),
            });
        }

        let completion: CompletionResponse = response.json().await?;
        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.is_empty())
            .ok_or(AiError::EmptyCompletion)
    }
}

/// Pull a human-readable summary out of an upstream error body.
///
/// Providers wrap errors as `{"error": {"message": ...}}`, `{"error": "..."}`
/// or plain `{"message": ...}`; anything else is passed through truncated.
fn extract_error_summary(body: &str) -> String {
    let trimmed = body.trim();

    if let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) {
        let summary = value
            .pointer("/error/message")
            .and_then(|v| v.as_str())
            .map(str::to_owned)
            .or_else(|| {
                value.get("error").and_then(|v| match v {
                    serde_json::Value::String(s) => Some(s.to_string()),
                    _ => None,
                })
            })
            .or_else(|| {
                value
                    .get("message")
                    .and_then(|v| v.as_str().map(str::to_owned))
            });

        if let Some(summary) = summary {
            let collapsed = summary.split_whitespace().collect::<Vec<_>>().join(" ");
            if !collapsed.is_empty() {
                return collapsed;
            }
        }
    }

    if trimmed.is_empty() {
        return "Unknown error".to_string();
    }

    trimmed.chars().take(200).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completion_response_parses_openai_shape() {
        let response: CompletionResponse = serde_json::from_str(
            r#"{"id":"chatcmpl-1","choices":[{"index":0,"message":{"role":"assistant","content":"Hello there!"},"finish_reason":"stop"}]}"#,
        )
        .unwrap();

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content);
        assert_eq!(content.as_deref(), Some("Hello there!"));
    }

    #[test]
    fn test_completion_request_serializes_messages() {
        let messages = vec![
            ChatMessage::system("Be nice."),
            ChatMessage::new("user", "Hi"),
        ];
        let value = serde_json::to_value(CompletionRequest {
            model: "gpt-4o-mini",
            messages: &messages,
        })
        .unwrap();

        assert_eq!(value["model"], "gpt-4o-mini");
        assert_eq!(value["messages"][0]["role"], "system");
        assert_eq!(value["messages"][1]["content"], "Hi");
    }

    #[test]
    fn test_extract_error_summary_nested_message() {
        let summary =
            extract_error_summary(r#"{"error":{"message":"Incorrect API key provided"}}"#);
        assert_eq!(summary, "Incorrect API key provided");
    }

    #[test]
    fn test_extract_error_summary_string_error() {
        let summary = extract_error_summary(r#"{"error":"model not found"}"#);
        assert_eq!(summary, "model not found");
    }

    #[test]
    fn test_extract_error_summary_plain_text() {
        assert_eq!(extract_error_summary("Bad Gateway"), "Bad Gateway");
        assert_eq!(extract_error_summary("  "), "Unknown error");
    }

    #[test]
    fn test_extract_error_summary_collapses_whitespace() {
        let summary = extract_error_summary(r#"{"message":"rate  limit\n exceeded"}"#);
        assert_eq!(summary, "rate limit exceeded");
    }

    #[tokio::test]
    async fn test_complete_surfaces_transport_error() {
        // Port 9 (discard) is never serving HTTP locally
        let client = AiClient::new(AiConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            api_key: "test-key".to_string(),
            ..AiConfig::default()
        });

        let result = client.complete(&[ChatMessage::new("user", "Hi")]).await;
        assert!(matches!(result, Err(AiError::Transport(_))));
    }
}
