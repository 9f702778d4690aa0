//! Anthropic Messages API client

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

use super::{
    CompletionRequest, CompletionResponse, ContentBlock, LlmClient, LlmError, Message, MessageContent, StopReason,
    TokenUsage,
};
use crate::config::LlmConfig;

/// Anthropic Claude API client
pub struct AnthropicClient {
    api_key: String,
    base_url: String,
    http: Client,
}

impl AnthropicClient {
    /// Create a new client from configuration
    ///
    /// Reads the API key from the environment variable named in the config.
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let api_key = std::env::var(&config.api_key_env)
            .map_err(|_| LlmError::InvalidResponse(format!("Environment variable {} not set", config.api_key_env)))?;

        let http = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(LlmError::Network)?;

        Ok(Self {
            api_key,
            base_url: config.base_url.clone(),
            http,
        })
    }

    fn build_request_body(&self, request: &CompletionRequest) -> Value {
        let mut body = serde_json::json!({
            "model": request.model,
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
            "messages": convert_messages(&request.messages),
        });

        if !request.tools.is_empty() {
            body["tools"] = serde_json::json!(request.tools);
        }

        body
    }

    fn parse_response(&self, api_response: ApiResponse) -> CompletionResponse {
        let content = api_response
            .content
            .into_iter()
            .map(|block| match block {
                ApiContentBlock::Text { text } => ContentBlock::Text { text },
                ApiContentBlock::ToolUse { id, name, input } => ContentBlock::ToolUse { id, name, input },
            })
            .collect();

        CompletionResponse {
            content,
            stop_reason: StopReason::parse(api_response.stop_reason.as_deref().unwrap_or("end_turn")),
            usage: TokenUsage {
                input_tokens: api_response.usage.input_tokens,
                output_tokens: api_response.usage.output_tokens,
            },
        }
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let url = format!("{}/v1/messages", self.base_url);
        let body = self.build_request_body(&request);

        let response = self
            .http
            .post(url)
            .header("x-api-key", self.api_key.clone())
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        if response.status().as_u16() == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(60);

            return Err(LlmError::RateLimited {
                retry_after: Duration::from_secs(retry_after),
            });
        }

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(LlmError::ApiError { status, message });
        }

        let api_response: ApiResponse = response.json().await?;
        Ok(self.parse_response(api_response))
    }
}

fn convert_messages(messages: &[Message]) -> Vec<Value> {
    messages
        .iter()
        .map(|msg| {
            let content = match &msg.content {
                MessageContent::Text(text) => serde_json::json!(text),
                MessageContent::Blocks(blocks) => serde_json::json!(blocks),
            };
            serde_json::json!({
                "role": msg.role,
                "content": content,
            })
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    content: Vec<ApiContentBlock>,
    stop_reason: Option<String>,
    usage: ApiUsage,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ApiContentBlock {
    #[serde(rename = "text")]
    Text { text: String },

    #[serde(rename = "tool_use")]
    ToolUse { id: String, name: String, input: Value },
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ToolDefinition;

    fn client() -> AnthropicClient {
        AnthropicClient {
            api_key: "test-key".to_string(),
            base_url: "https://api.anthropic.com".to_string(),
            http: Client::new(),
        }
    }

    #[test]
    fn test_build_request_body() {
        let request = CompletionRequest {
            model: "claude-sonnet-4-20250514".to_string(),
            max_tokens: 1000,
            temperature: 0.7,
            messages: vec![Message::user("hi")],
            tools: vec![ToolDefinition::new(
                "read_file",
                "Read a file",
                serde_json::json!({"type": "object"}),
            )],
        };

        let body = client().build_request_body(&request);
        assert_eq!(body["model"], "claude-sonnet-4-20250514");
        assert_eq!(body["max_tokens"], 1000);
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["tools"][0]["name"], "read_file");
    }

    #[test]
    fn test_body_omits_empty_tools() {
        let request = CompletionRequest {
            model: "m".to_string(),
            max_tokens: 10,
            temperature: 0.0,
            messages: vec![],
            tools: vec![],
        };

        let body = client().build_request_body(&request);
        assert!(body.get("tools").is_none());
    }

    #[test]
    fn test_parse_response_preserves_block_order() {
        let api_response: ApiResponse = serde_json::from_value(serde_json::json!({
            "content": [
                {"type": "text", "text": "first"},
                {"type": "tool_use", "id": "tu_1", "name": "write_file", "input": {"path": "a"}},
                {"type": "text", "text": "second"}
            ],
            "stop_reason": "tool_use",
            "usage": {"input_tokens": 10, "output_tokens": 20}
        }))
        .unwrap();

        let response = client().parse_response(api_response);

        assert_eq!(response.content.len(), 3);
        assert!(matches!(&response.content[0], ContentBlock::Text { text } if text == "first"));
        assert!(matches!(&response.content[1], ContentBlock::ToolUse { name, .. } if name == "write_file"));
        assert!(matches!(&response.content[2], ContentBlock::Text { text } if text == "second"));
        assert_eq!(response.stop_reason, StopReason::ToolUse);
        assert_eq!(response.usage.input_tokens, 10);
    }
}
