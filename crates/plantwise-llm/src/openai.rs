use futures::future::BoxFuture;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use plantwise_core::config::LlmConfig;
use plantwise_core::error::{PlantwiseError, Result};
use plantwise_core::traits::ChatClient;
use plantwise_core::types::ChatRequest;

/// OpenAI-compatible client. Works with OpenAI, Ollama, vLLM, Groq, etc.
pub struct OpenAiChat {
    http: Client,
    base_url: String,
    api_key: String,
    model_id: String,
    max_tokens_ceiling: u32,
}

impl OpenAiChat {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model_id: impl Into<String>,
        max_tokens_ceiling: u32,
    ) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            model_id: model_id.into(),
            max_tokens_ceiling,
        }
    }

    pub fn from_config(config: &LlmConfig) -> Self {
        Self::new(
            &config.base_url,
            &config.api_key,
            &config.model_id,
            config.max_tokens,
        )
    }
}

// Request types
#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

// Response types
#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl ChatClient for OpenAiChat {
    fn complete(&self, request: ChatRequest) -> BoxFuture<'_, Result<String>> {
        Box::pin(async move {
            let url = format!(
                "{}/chat/completions",
                self.base_url.trim_end_matches('/')
            );

            let body = CompletionRequest {
                model: &self.model_id,
                messages: vec![
                    WireMessage {
                        role: "system",
                        content: &request.system,
                    },
                    WireMessage {
                        role: "user",
                        content: &request.user,
                    },
                ],
                max_tokens: request.max_tokens.min(self.max_tokens_ceiling),
                temperature: request.temperature,
            };

            let response = self
                .http
                .post(&url)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .json(&body)
                .send()
                .await
                .map_err(|e| PlantwiseError::LlmRequest(e.to_string()))?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "unknown".to_string());
                return Err(PlantwiseError::LlmRequest(format!(
                    "HTTP {}: {}",
                    status, body
                )));
            }

            let parsed: CompletionResponse = response
                .json()
                .await
                .map_err(|e| PlantwiseError::LlmParse(e.to_string()))?;

            let content = parsed
                .choices
                .into_iter()
                .next()
                .and_then(|c| c.message.content)
                .unwrap_or_default();

            debug!(model = %self.model_id, chars = content.len(), "Chat completion received");
            Ok(content.trim().to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_wire_shape() {
        let body = CompletionRequest {
            model: "gpt-4o-mini",
            messages: vec![
                WireMessage {
                    role: "system",
                    content: "You are terse.",
                },
                WireMessage {
                    role: "user",
                    content: "hi",
                },
            ],
            max_tokens: 200,
            temperature: 0.1,
        };

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["model"], "gpt-4o-mini");
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "hi");
        assert_eq!(json["max_tokens"], 200);
    }

    #[test]
    fn test_response_parse() {
        let raw = r#"{"choices":[{"message":{"role":"assistant","content":"  42  "}}]}"#;
        let parsed: CompletionResponse = serde_json::from_str(raw).unwrap();
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap();
        assert_eq!(content.trim(), "42");
    }

    #[test]
    fn test_response_without_choices() {
        let raw = r#"{"id":"x"}"#;
        let parsed: CompletionResponse = serde_json::from_str(raw).unwrap();
        assert!(parsed.choices.is_empty());
    }
}
