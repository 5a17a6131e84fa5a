//! Stage 1: topic index over a whole document.
//!
//! A single request carries every location (text inline, page images as
//! attachments) and asks which locations discuss which topic.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value;

use super::config::AgentConfig;
use super::parse::parse_json_object;
use super::prompt::build_topic_index_prompt;
use super::provider::LlmProvider;
use super::traits::Agent;
use crate::core::{Location, TopicIndex};
use crate::error::AgentError;

/// Agent that builds a [`TopicIndex`] for a document.
pub struct TopicIndexer {
    model: String,
    max_tokens: u32,
    system_prompt: String,
    topics: Vec<String>,
}

impl TopicIndexer {
    /// Creates a topic indexer suggesting the configured topics.
    #[must_use]
    pub fn new(config: &AgentConfig, system_prompt: String) -> Self {
        Self {
            model: config.index_model.clone(),
            max_tokens: config.index_max_tokens,
            system_prompt,
            topics: config.topics.clone(),
        }
    }

    /// Runs one indexing call over `locations`.
    ///
    /// Location numbers are returned as given; range filtering is the
    /// consumer's job.
    ///
    /// # Errors
    ///
    /// Returns transport errors from the provider, and malformed-output
    /// errors unless the reply is a JSON object of integer arrays.
    pub async fn index(
        &self,
        provider: &dyn LlmProvider,
        subject: &str,
        locations: &[Location],
    ) -> Result<TopicIndex, AgentError> {
        let user_msg = build_topic_index_prompt(subject, &self.topics, locations);
        let images: Vec<_> = locations.iter().filter_map(|l| l.image.clone()).collect();
        let response = if images.is_empty() {
            self.execute(provider, &user_msg).await?
        } else {
            self.execute_with_images(provider, &user_msg, images).await?
        };
        Self::parse_index(&response.content)
    }

    /// Parses `{"topic": [n, ...], ...}` strictly.
    fn parse_index(content: &str) -> Result<TopicIndex, AgentError> {
        let object = parse_json_object(content, "topic_index")?;
        let malformed = |message: String| AgentError::ResponseParse {
            message,
            content: content.to_string(),
        };

        let mut topics = BTreeMap::new();
        for (topic, value) in object {
            let Value::Array(items) = value else {
                return Err(malformed(format!(
                    "topic_index: topic '{topic}' must map to an array of location numbers"
                )));
            };
            let numbers = items
                .iter()
                .map(Value::as_i64)
                .collect::<Option<Vec<i64>>>()
                .ok_or_else(|| {
                    malformed(format!(
                        "topic_index: topic '{topic}' has a non-integer location"
                    ))
                })?;
            let topic = topic.trim().to_string();
            if !topic.is_empty() {
                topics.insert(topic, numbers);
            }
        }
        Ok(TopicIndex::new(topics))
    }
}

#[async_trait]
impl Agent for TopicIndexer {
    fn name(&self) -> &str {
        "topic_indexer"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    fn json_mode(&self) -> bool {
        true
    }

    fn max_tokens(&self) -> u32 {
        self.max_tokens
    }
}
