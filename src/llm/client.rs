//! LlmClient trait definition

use async_trait::async_trait;

use super::{CompletionRequest, CompletionResponse, LlmError};

/// Stateless LLM client - each call is independent
///
/// The Ralph loop rebuilds its context every iteration, so no conversation
/// state is held between calls. One implementation exists per vendor.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Send a single completion request and wait for the full reply
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError>;
}
