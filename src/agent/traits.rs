//! Agent trait definition.
//!
//! Every model-backed role (chunk analyst, topic indexer, topic extractor,
//! focus analysts, synthesizer) implements this trait, which provides a
//! uniform way to build a request against a provider.

use async_trait::async_trait;

use super::message::{
    ChatMessage, ChatRequest, ChatResponse, TokenUsage, system_message, user_message,
    user_message_with_images,
};
use super::provider::LlmProvider;
use crate::core::ImageAttachment;
use crate::error::AgentError;

/// Response from an agent execution.
#[derive(Debug, Clone)]
pub struct AgentResponse {
    /// The agent's text output.
    pub content: String,
    /// Token usage for this call.
    pub usage: TokenUsage,
    /// Why the model stopped generating (e.g. `"stop"`, `"length"`).
    pub finish_reason: Option<String>,
}

/// Trait implemented by all agents in the system.
///
/// Agents encapsulate a specific role with a fixed system prompt and model
/// configuration. A single call to [`Agent::execute`] is one service call;
/// retries and pacing are layered on by the caller.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Agent name for logging and identification.
    fn name(&self) -> &str;

    /// Model identifier to use for this agent.
    fn model(&self) -> &str;

    /// System prompt that defines the agent's role and behavior.
    fn system_prompt(&self) -> &str;

    /// Whether to request JSON-formatted output.
    fn json_mode(&self) -> bool {
        false
    }

    /// Sampling temperature (0.0 = deterministic, higher = more creative).
    fn temperature(&self) -> f32 {
        0.0
    }

    /// Maximum tokens for the response.
    fn max_tokens(&self) -> u32 {
        2048
    }

    /// Builds the request for one user message.
    fn build_request(&self, user: ChatMessage) -> ChatRequest {
        ChatRequest {
            model: self.model().to_string(),
            messages: vec![system_message(self.system_prompt()), user],
            temperature: Some(self.temperature()),
            max_tokens: Some(self.max_tokens()),
            json_mode: self.json_mode(),
        }
    }

    /// Executes the agent with the given user message.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] on API failures or response parsing errors.
    async fn execute(
        &self,
        provider: &dyn LlmProvider,
        user_msg: &str,
    ) -> Result<AgentResponse, AgentError> {
        let request = self.build_request(user_message(user_msg));
        send(provider, &request).await
    }

    /// Executes the agent with a user message carrying image attachments.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] on API failures or response parsing errors.
    async fn execute_with_images(
        &self,
        provider: &dyn LlmProvider,
        user_msg: &str,
        images: Vec<ImageAttachment>,
    ) -> Result<AgentResponse, AgentError> {
        let request = self.build_request(user_message_with_images(user_msg, images));
        send(provider, &request).await
    }
}

async fn send(
    provider: &dyn LlmProvider,
    request: &ChatRequest,
) -> Result<AgentResponse, AgentError> {
    let response: ChatResponse = provider.chat(request).await?;
    Ok(AgentResponse {
        content: response.content,
        usage: response.usage,
        finish_reason: response.finish_reason,
    })
}
