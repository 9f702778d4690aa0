//! LLM facade
//!
//! The loop talks to the model through the [`LlmClient`] trait; the reply is
//! an ordered list of content blocks plus a stop reason. One implementation
//! exists per vendor.

use std::sync::Arc;

mod anthropic;
pub mod client;
mod error;
mod types;

pub use anthropic::AnthropicClient;
pub use client::LlmClient;
pub use error::LlmError;
pub use types::{
    CompletionRequest, CompletionResponse, ContentBlock, Message, MessageContent, Role, StopReason, TokenUsage,
    ToolDefinition,
};

use crate::config::LlmConfig;

/// Create an LLM client for the provider named in the config
pub fn create_client(config: &LlmConfig) -> Result<Arc<dyn LlmClient>, LlmError> {
    match config.provider.as_str() {
        "anthropic" => Ok(Arc::new(AnthropicClient::from_config(config)?)),
        other => Err(LlmError::InvalidResponse(format!(
            "Unknown LLM provider: '{}'. Supported: anthropic",
            other
        ))),
    }
}
