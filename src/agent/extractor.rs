//! Stage 2: focused extraction for one topic.
//!
//! The request carries only the locations the topic index attributed to the
//! topic, and the reply is free prose.

use async_trait::async_trait;

use super::config::AgentConfig;
use super::prompt::build_topic_extraction_prompt;
use super::provider::LlmProvider;
use super::traits::Agent;
use crate::core::Location;
use crate::error::AgentError;

/// Agent that writes the section for one topic.
pub struct TargetedExtractor {
    model: String,
    max_tokens: u32,
    system_prompt: String,
}

impl TargetedExtractor {
    /// Creates a targeted extractor.
    #[must_use]
    pub fn new(config: &AgentConfig, system_prompt: String) -> Self {
        Self {
            model: config.extraction_model.clone(),
            max_tokens: config.agent_max_tokens,
            system_prompt,
        }
    }

    /// Extracts `topic` from `locations` with a single call.
    ///
    /// # Errors
    ///
    /// Returns transport errors from the provider and
    /// [`AgentError::EmptyResponse`] for a blank reply.
    pub async fn extract(
        &self,
        provider: &dyn LlmProvider,
        subject: &str,
        topic: &str,
        locations: &[&Location],
    ) -> Result<String, AgentError> {
        let user_msg = build_topic_extraction_prompt(subject, topic, locations);
        let images: Vec<_> = locations.iter().filter_map(|l| l.image.clone()).collect();
        let response = if images.is_empty() {
            self.execute(provider, &user_msg).await?
        } else {
            self.execute_with_images(provider, &user_msg, images).await?
        };

        let text = response.content.trim();
        if text.is_empty() {
            return Err(AgentError::EmptyResponse {
                operation: format!("topic_extraction({topic})"),
            });
        }
        Ok(text.to_string())
    }
}

#[async_trait]
impl Agent for TargetedExtractor {
    fn name(&self) -> &str {
        "topic_extractor"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    fn temperature(&self) -> f32 {
        0.2
    }

    fn max_tokens(&self) -> u32 {
        self.max_tokens
    }
}
