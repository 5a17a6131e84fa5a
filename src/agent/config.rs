//! Agent configuration with builder pattern and environment variable support.
//!
//! Configuration is resolved in order: explicit values → environment variables → defaults.
//! It is loaded once at the process boundary and passed into every component.

use std::path::PathBuf;
use std::time::Duration;

use crate::chunking::DEFAULT_MAX_SEGMENTS;
use crate::error::AgentError;

/// Default attempts per service call (first try included).
const DEFAULT_MAX_ATTEMPTS: u32 = 3;
/// Default base delay for exponential backoff.
const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 2_000;
/// Default pacing delay after every service call.
const DEFAULT_REQUEST_DELAY_MS: u64 = 1_000;
/// Default maximum in-flight service calls. One keeps every call sequential.
const DEFAULT_MAX_CONCURRENCY: usize = 1;
/// Default max tokens for per-chunk structured analysis.
const DEFAULT_EXTRACTION_MAX_TOKENS: u32 = 4096;
/// Default max tokens for the topic index.
const DEFAULT_INDEX_MAX_TOKENS: u32 = 2048;
/// Default max tokens for per-topic extraction and agent analyses.
const DEFAULT_AGENT_MAX_TOKENS: u32 = 4096;
/// Default max tokens for the weighted synthesis.
const DEFAULT_SYNTHESIZER_MAX_TOKENS: u32 = 8192;
/// Default per-agent character budget in the synthesis request.
const DEFAULT_SYNTHESIS_INPUT_BUDGET: usize = 12_000;
/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Default model for chunk analysis and topic extraction.
const DEFAULT_EXTRACTION_MODEL: &str = "gpt-4o-mini";
/// Default model for the topic index (sees every page at once).
const DEFAULT_INDEX_MODEL: &str = "gpt-4o";
/// Default model for registered analysis agents.
const DEFAULT_AGENT_MODEL: &str = "gpt-4o";
/// Default model for weighted synthesis.
const DEFAULT_SYNTHESIZER_MODEL: &str = "gpt-4o";

/// Topics suggested to the topic indexer.
pub const DEFAULT_TOPICS: &[&str] = &[
    "Team",
    "Problem",
    "Solution",
    "Product",
    "Market",
    "Business Model",
    "Traction",
    "Competition",
    "Financials",
    "Funding",
    "Risks",
];

/// Configuration for the analysis engine.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// LLM provider name (e.g., "openai").
    pub provider: String,
    /// API key for the provider.
    pub api_key: String,
    /// Optional base URL override (for proxies or compatible APIs).
    pub base_url: Option<String>,
    /// Model for per-chunk analysis and per-topic extraction.
    pub extraction_model: String,
    /// Model for the topic index.
    pub index_model: String,
    /// Model for registered analysis agents.
    pub agent_model: String,
    /// Model for weighted synthesis.
    pub synthesizer_model: String,
    /// Maximum tokens for per-chunk analysis.
    pub extraction_max_tokens: u32,
    /// Maximum tokens for the topic index.
    pub index_max_tokens: u32,
    /// Maximum tokens for topic extraction and agent analyses.
    pub agent_max_tokens: u32,
    /// Maximum tokens for synthesis.
    pub synthesizer_max_tokens: u32,
    /// Attempts per service call, first try included.
    pub max_attempts: u32,
    /// Base delay of the exponential backoff.
    pub retry_base_delay: Duration,
    /// Pause after every service call.
    ///
    /// Held while the concurrency permit is held, so it spaces out
    /// consecutive calls even when several units are in flight.
    pub request_delay: Duration,
    /// Maximum in-flight service calls.
    pub max_concurrency: usize,
    /// Upper bound on chunks per text document.
    pub max_segments: usize,
    /// Per-agent character budget in the synthesis request.
    pub synthesis_input_budget: usize,
    /// Topics suggested to the topic indexer.
    pub topics: Vec<String>,
    /// Request timeout.
    pub timeout: Duration,
    /// Directory containing prompt template files.
    ///
    /// Missing files fall back to compiled-in defaults.
    pub prompt_dir: Option<PathBuf>,
    /// Directory receiving topic indexes, analyses and reports.
    pub output_dir: Option<PathBuf>,
}

impl AgentConfig {
    /// Creates a new builder for `AgentConfig`.
    #[must_use]
    pub fn builder() -> AgentConfigBuilder {
        AgentConfigBuilder::default()
    }

    /// Creates configuration from environment variables with defaults.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::ApiKeyMissing`] if no API key is found.
    pub fn from_env() -> Result<Self, AgentError> {
        Self::builder().from_env().build()
    }
}

/// Builder for [`AgentConfig`].
#[derive(Debug, Clone, Default)]
pub struct AgentConfigBuilder {
    provider: Option<String>,
    api_key: Option<String>,
    base_url: Option<String>,
    extraction_model: Option<String>,
    index_model: Option<String>,
    agent_model: Option<String>,
    synthesizer_model: Option<String>,
    extraction_max_tokens: Option<u32>,
    index_max_tokens: Option<u32>,
    agent_max_tokens: Option<u32>,
    synthesizer_max_tokens: Option<u32>,
    max_attempts: Option<u32>,
    retry_base_delay: Option<Duration>,
    request_delay: Option<Duration>,
    max_concurrency: Option<usize>,
    max_segments: Option<usize>,
    synthesis_input_budget: Option<usize>,
    topics: Option<Vec<String>>,
    timeout: Option<Duration>,
    prompt_dir: Option<PathBuf>,
    output_dir: Option<PathBuf>,
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

impl AgentConfigBuilder {
    /// Populates unset fields from environment variables.
    #[must_use]
    pub fn from_env(mut self) -> Self {
        if self.provider.is_none() {
            self.provider = std::env::var("DEALSCOPE_PROVIDER").ok();
        }
        if self.api_key.is_none() {
            self.api_key = std::env::var("OPENAI_API_KEY")
                .or_else(|_| std::env::var("DEALSCOPE_API_KEY"))
                .ok()
                .filter(|k| !k.trim().is_empty());
        }
        if self.base_url.is_none() {
            self.base_url = std::env::var("OPENAI_BASE_URL")
                .or_else(|_| std::env::var("DEALSCOPE_BASE_URL"))
                .ok();
        }
        if self.extraction_model.is_none() {
            self.extraction_model = std::env::var("DEALSCOPE_EXTRACTION_MODEL").ok();
        }
        if self.index_model.is_none() {
            self.index_model = std::env::var("DEALSCOPE_INDEX_MODEL").ok();
        }
        if self.agent_model.is_none() {
            self.agent_model = std::env::var("DEALSCOPE_AGENT_MODEL").ok();
        }
        if self.synthesizer_model.is_none() {
            self.synthesizer_model = std::env::var("DEALSCOPE_SYNTHESIZER_MODEL").ok();
        }
        if self.max_attempts.is_none() {
            self.max_attempts = env_parse("DEALSCOPE_MAX_ATTEMPTS");
        }
        if self.retry_base_delay.is_none() {
            self.retry_base_delay =
                env_parse("DEALSCOPE_RETRY_BASE_DELAY_MS").map(Duration::from_millis);
        }
        if self.request_delay.is_none() {
            self.request_delay = env_parse("DEALSCOPE_REQUEST_DELAY_MS").map(Duration::from_millis);
        }
        if self.max_concurrency.is_none() {
            self.max_concurrency = env_parse("DEALSCOPE_MAX_CONCURRENCY");
        }
        if self.max_segments.is_none() {
            self.max_segments = env_parse("DEALSCOPE_MAX_SEGMENTS");
        }
        if self.prompt_dir.is_none() {
            self.prompt_dir = std::env::var("DEALSCOPE_PROMPT_DIR").ok().map(PathBuf::from);
        }
        if self.output_dir.is_none() {
            self.output_dir = std::env::var("DEALSCOPE_OUTPUT_DIR").ok().map(PathBuf::from);
        }
        self
    }

    /// Sets the LLM provider name.
    #[must_use]
    pub fn provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Sets the API key.
    #[must_use]
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the base URL override.
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the chunk analysis / topic extraction model.
    #[must_use]
    pub fn extraction_model(mut self, model: impl Into<String>) -> Self {
        self.extraction_model = Some(model.into());
        self
    }

    /// Sets the topic index model.
    #[must_use]
    pub fn index_model(mut self, model: impl Into<String>) -> Self {
        self.index_model = Some(model.into());
        self
    }

    /// Sets the analysis agent model.
    #[must_use]
    pub fn agent_model(mut self, model: impl Into<String>) -> Self {
        self.agent_model = Some(model.into());
        self
    }

    /// Sets the synthesizer model.
    #[must_use]
    pub fn synthesizer_model(mut self, model: impl Into<String>) -> Self {
        self.synthesizer_model = Some(model.into());
        self
    }

    /// Sets the chunk analysis max tokens.
    #[must_use]
    pub const fn extraction_max_tokens(mut self, n: u32) -> Self {
        self.extraction_max_tokens = Some(n);
        self
    }

    /// Sets the synthesizer max tokens.
    #[must_use]
    pub const fn synthesizer_max_tokens(mut self, n: u32) -> Self {
        self.synthesizer_max_tokens = Some(n);
        self
    }

    /// Sets the attempts per service call.
    #[must_use]
    pub const fn max_attempts(mut self, n: u32) -> Self {
        self.max_attempts = Some(n);
        self
    }

    /// Sets the backoff base delay.
    #[must_use]
    pub const fn retry_base_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = Some(delay);
        self
    }

    /// Sets the pacing delay after each call.
    #[must_use]
    pub const fn request_delay(mut self, delay: Duration) -> Self {
        self.request_delay = Some(delay);
        self
    }

    /// Sets the maximum in-flight calls.
    #[must_use]
    pub const fn max_concurrency(mut self, n: usize) -> Self {
        self.max_concurrency = Some(n);
        self
    }

    /// Sets the maximum segments per text document.
    #[must_use]
    pub const fn max_segments(mut self, n: usize) -> Self {
        self.max_segments = Some(n);
        self
    }

    /// Sets the per-agent character budget for synthesis.
    #[must_use]
    pub const fn synthesis_input_budget(mut self, n: usize) -> Self {
        self.synthesis_input_budget = Some(n);
        self
    }

    /// Sets the suggested topics.
    #[must_use]
    pub fn topics<I, S>(mut self, topics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.topics = Some(topics.into_iter().map(Into::into).collect());
        self
    }

    /// Sets the request timeout.
    #[must_use]
    pub const fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }

    /// Sets the prompt template directory.
    #[must_use]
    pub fn prompt_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.prompt_dir = Some(dir.into());
        self
    }

    /// Sets the artifact output directory.
    #[must_use]
    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    /// Builds the [`AgentConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::ApiKeyMissing`] if no API key was set.
    pub fn build(self) -> Result<AgentConfig, AgentError> {
        let api_key = self.api_key.ok_or(AgentError::ApiKeyMissing)?;

        Ok(AgentConfig {
            provider: self.provider.unwrap_or_else(|| "openai".to_string()),
            api_key,
            base_url: self.base_url,
            extraction_model: self
                .extraction_model
                .unwrap_or_else(|| DEFAULT_EXTRACTION_MODEL.to_string()),
            index_model: self
                .index_model
                .unwrap_or_else(|| DEFAULT_INDEX_MODEL.to_string()),
            agent_model: self
                .agent_model
                .unwrap_or_else(|| DEFAULT_AGENT_MODEL.to_string()),
            synthesizer_model: self
                .synthesizer_model
                .unwrap_or_else(|| DEFAULT_SYNTHESIZER_MODEL.to_string()),
            extraction_max_tokens: self
                .extraction_max_tokens
                .unwrap_or(DEFAULT_EXTRACTION_MAX_TOKENS),
            index_max_tokens: self.index_max_tokens.unwrap_or(DEFAULT_INDEX_MAX_TOKENS),
            agent_max_tokens: self.agent_max_tokens.unwrap_or(DEFAULT_AGENT_MAX_TOKENS),
            synthesizer_max_tokens: self
                .synthesizer_max_tokens
                .unwrap_or(DEFAULT_SYNTHESIZER_MAX_TOKENS),
            max_attempts: self.max_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS).max(1),
            retry_base_delay: self
                .retry_base_delay
                .unwrap_or(Duration::from_millis(DEFAULT_RETRY_BASE_DELAY_MS)),
            request_delay: self
                .request_delay
                .unwrap_or(Duration::from_millis(DEFAULT_REQUEST_DELAY_MS)),
            max_concurrency: self
                .max_concurrency
                .unwrap_or(DEFAULT_MAX_CONCURRENCY)
                .max(1),
            max_segments: self.max_segments.unwrap_or(DEFAULT_MAX_SEGMENTS).max(1),
            synthesis_input_budget: self
                .synthesis_input_budget
                .unwrap_or(DEFAULT_SYNTHESIS_INPUT_BUDGET),
            topics: self
                .topics
                .unwrap_or_else(|| DEFAULT_TOPICS.iter().map(|t| (*t).to_string()).collect()),
            timeout: self
                .timeout
                .unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS)),
            prompt_dir: self.prompt_dir,
            output_dir: self.output_dir,
        })
    }
}
