//! Per-chunk structured analysis.
//!
//! One JSON-mode call per chunk (or page). The reply is coerced into an
//! [`AnalysisRecord`] of the configured schema.

use async_trait::async_trait;

use super::config::AgentConfig;
use super::parse::parse_json;
use super::prompt::build_chunk_prompt;
use super::provider::LlmProvider;
use super::traits::Agent;
use crate::core::{AnalysisRecord, AnalysisSchema, Location};
use crate::error::AgentError;

/// Agent that turns one document location into a schema-shaped record.
pub struct ChunkAnalyst {
    model: String,
    max_tokens: u32,
    system_prompt: String,
    schema: AnalysisSchema,
    schema_description: String,
}

impl ChunkAnalyst {
    /// Creates a chunk analyst for `schema`.
    #[must_use]
    pub fn new(config: &AgentConfig, system_prompt: String, schema: AnalysisSchema) -> Self {
        let schema_description = schema.describe();
        Self {
            model: config.extraction_model.clone(),
            max_tokens: config.extraction_max_tokens,
            system_prompt,
            schema,
            schema_description,
        }
    }

    /// The schema records are shaped by.
    #[must_use]
    pub const fn schema(&self) -> &AnalysisSchema {
        &self.schema
    }

    /// Analyzes one location with a single service call.
    ///
    /// # Errors
    ///
    /// Returns transport errors from the provider, and malformed-output
    /// errors when the reply is empty, not JSON or not an object. A reply
    /// cut off by the token limit says so in the error message.
    pub async fn analyze(
        &self,
        provider: &dyn LlmProvider,
        subject: &str,
        location: &Location,
        total: usize,
    ) -> Result<AnalysisRecord, AgentError> {
        let user_msg = build_chunk_prompt(subject, location, total, &self.schema_description);
        let response = match &location.image {
            Some(image) => {
                self.execute_with_images(provider, &user_msg, vec![image.clone()])
                    .await?
            }
            None => self.execute(provider, &user_msg).await?,
        };

        let truncated = response.finish_reason.as_deref() == Some("length");
        let parsed = parse_json(&response.content, "chunk_analysis")
            .and_then(|value| self.schema.record_from_json(&value));
        match parsed {
            Err(AgentError::ResponseParse { content, .. }) if truncated => {
                Err(AgentError::ResponseParse {
                    message: format!(
                        "response truncated (finish_reason=length, max_tokens={})",
                        self.max_tokens
                    ),
                    content,
                })
            }
            other => other,
        }
    }
}

#[async_trait]
impl Agent for ChunkAnalyst {
    fn name(&self) -> &str {
        "chunk_analyst"
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::message::{ChatRequest, ChatResponse, TokenUsage};
    use crate::core::{FieldValue, ImageAttachment};
    use std::sync::Mutex;

    struct Scripted {
        content: String,
        finish_reason: Option<String>,
        last_request: Mutex<Option<ChatRequest>>,
    }

    impl Scripted {
        fn new(content: &str) -> Self {
            Self {
                content: content.to_string(),
                finish_reason: Some("stop".to_string()),
                last_request: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl LlmProvider for Scripted {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, AgentError> {
            if let Ok(mut last) = self.last_request.lock() {
                *last = Some(request.clone());
            }
            Ok(ChatResponse {
                content: self.content.clone(),
                usage: TokenUsage::default(),
                finish_reason: self.finish_reason.clone(),
            })
        }
    }

    fn analyst() -> ChunkAnalyst {
        let config = AgentConfig::builder()
            .api_key("k")
            .extraction_model("small")
            .build()
            .unwrap_or_else(|_| unreachable!());
        ChunkAnalyst::new(&config, "sys".to_string(), AnalysisSchema::company_default())
    }

    fn location(text: &str) -> Location {
        Location {
            number: 1,
            text: Some(text.to_string()),
            image: None,
        }
    }

    #[tokio::test]
    async fn test_analyze_parses_fenced_json() {
        let provider = Scripted::new("```json\n{\"risk_level\": \"low\", \"industries\": [\"ai\"]}\n```");
        let record = analyst()
            .analyze(&provider, "Acme", &location("text"), 1)
            .await
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(
            record.get("risk_level").and_then(FieldValue::as_scalar),
            Some("low")
        );

        let request = provider
            .last_request
            .lock()
            .ok()
            .and_then(|r| r.clone())
            .unwrap_or_else(|| unreachable!());
        assert!(request.json_mode);
        assert_eq!(request.model, "small");
        assert_eq!(request.image_count(), 0);
    }

    #[tokio::test]
    async fn test_analyze_rejects_non_object() {
        let provider = Scripted::new("[\"risk_level\"]");
        let result = analyst()
            .analyze(&provider, "Acme", &location("text"), 1)
            .await;
        assert!(matches!(result, Err(AgentError::ResponseParse { .. })));
    }

    #[tokio::test]
    async fn test_analyze_empty_reply() {
        let provider = Scripted::new("   ");
        let result = analyst()
            .analyze(&provider, "Acme", &location("text"), 1)
            .await;
        assert!(matches!(result, Err(AgentError::EmptyResponse { .. })));
    }

    #[tokio::test]
    async fn test_truncated_reply_is_labelled() {
        let mut provider = Scripted::new("{\"risk_level\": \"lo");
        provider.finish_reason = Some("length".to_string());
        let result = analyst()
            .analyze(&provider, "Acme", &location("text"), 1)
            .await;
        match result {
            Err(AgentError::ResponseParse { message, content }) => {
                assert!(message.contains("truncated"));
                assert!(content.starts_with("{\"risk_level\""));
            }
            _ => unreachable!(),
        }
    }

    #[tokio::test]
    async fn test_page_image_is_attached() {
        let provider = Scripted::new("{}");
        let page = Location {
            number: 2,
            text: None,
            image: Some(ImageAttachment::new("image/png", vec![1, 2])),
        };
        let record = analyst()
            .analyze(&provider, "Acme", &page, 3)
            .await
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(record, AnalysisSchema::company_default().empty_record());
        let images = provider
            .last_request
            .lock()
            .ok()
            .and_then(|r| r.as_ref().map(ChatRequest::image_count))
            .unwrap_or_default();
        assert_eq!(images, 1);
    }
}
