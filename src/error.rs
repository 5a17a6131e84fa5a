//! Error types for dealscope.
//!
//! Library code returns these typed errors and propagates them with `?`.
//! Only the binary entry point converts them into `anyhow` errors.

use std::path::PathBuf;

use thiserror::Error;

/// Crate-level result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error for dealscope operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Failure in the agent / pipeline layer.
    #[error(transparent)]
    Agent(#[from] AgentError),

    /// Failure reading inputs or writing artifacts.
    #[error(transparent)]
    Io(#[from] IoError),

    /// Failure in a CLI command.
    #[error(transparent)]
    Command(#[from] CommandError),
}

/// Coarse classification of an [`AgentError`], used for logging and for
/// deciding whether a failed call is worth retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Service unreachable, quota exceeded, timeouts.
    Transport,
    /// Unparsable, empty or wrongly shaped model output.
    MalformedOutput,
    /// Caller input rejected before any service call.
    Validation,
    /// Missing credentials, unknown provider or capability.
    Configuration,
    /// A pipeline stage failed as a whole.
    Pipeline,
}

impl ErrorKind {
    /// Returns the label used in log fields.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Transport => "transport",
            Self::MalformedOutput => "malformed-output",
            Self::Validation => "validation",
            Self::Configuration => "configuration",
            Self::Pipeline => "pipeline",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised by the generation-service layer and the pipelines built on it.
#[derive(Debug, Error)]
pub enum AgentError {
    /// No API key was configured.
    #[error("API key missing: set OPENAI_API_KEY or DEALSCOPE_API_KEY")]
    ApiKeyMissing,

    /// The provider request failed.
    #[error("API request failed: {message}")]
    ApiRequest {
        /// Provider error message.
        message: String,
        /// HTTP status, when known.
        status: Option<u16>,
    },

    /// The model output could not be parsed into the expected shape.
    #[error("failed to parse response: {message}")]
    ResponseParse {
        /// What went wrong.
        message: String,
        /// The raw response content.
        content: String,
    },

    /// The model returned no content.
    #[error("empty response from {operation}")]
    EmptyResponse {
        /// Operation that produced the empty response.
        operation: String,
    },

    /// Unknown provider name.
    #[error("unsupported provider: {name}")]
    UnsupportedProvider {
        /// The provider name requested.
        name: String,
    },

    /// Caller input failed validation.
    #[error("validation failed: {message}")]
    Validation {
        /// Description of the violation.
        message: String,
    },

    /// Synthesis weights did not sum to 100.
    #[error("weights must sum to 100 (got {actual})")]
    WeightSum {
        /// The actual sum of the weights.
        actual: u32,
    },

    /// The same agent name appeared more than once in one request.
    #[error("duplicate agent name: {name}")]
    DuplicateAgent {
        /// The duplicated name.
        name: String,
    },

    /// No factory is registered for the capability.
    #[error("unknown agent capability: {capability}")]
    UnknownCapability {
        /// The capability requested.
        capability: String,
    },

    /// A factory function name does not follow `create_<capability>_agent`.
    #[error("factory name '{name}' does not match create_<capability>_agent")]
    FactoryName {
        /// The offending factory name.
        name: String,
    },

    /// An agent factory failed to construct its agent.
    #[error("agent factory for '{capability}' failed: {message}")]
    AgentFactory {
        /// Capability whose factory failed.
        capability: String,
        /// Failure description.
        message: String,
    },

    /// The document produced nothing to analyze.
    #[error("no content to analyze: {hint}")]
    NoChunks {
        /// Hint describing why.
        hint: String,
    },

    /// A pipeline stage failed and the run cannot continue.
    #[error("{stage} failed: {message}")]
    StageFailed {
        /// Stage name.
        stage: &'static str,
        /// Failure description.
        message: String,
    },

    /// Every unit of work in a stage failed.
    #[error("{stage}: all {total} units failed")]
    AllUnitsFailed {
        /// Stage name.
        stage: &'static str,
        /// Number of units attempted.
        total: usize,
        /// One line per failed unit.
        errors: Vec<String>,
    },

    /// Internal orchestration failure.
    #[error("orchestration error: {message}")]
    Orchestration {
        /// Failure description.
        message: String,
    },
}

impl AgentError {
    /// Classifies the error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::ApiRequest { .. } => ErrorKind::Transport,
            Self::ResponseParse { .. } | Self::EmptyResponse { .. } => ErrorKind::MalformedOutput,
            Self::Validation { .. } | Self::WeightSum { .. } | Self::DuplicateAgent { .. } => {
                ErrorKind::Validation
            }
            Self::ApiKeyMissing
            | Self::UnsupportedProvider { .. }
            | Self::UnknownCapability { .. }
            | Self::FactoryName { .. }
            | Self::AgentFactory { .. } => ErrorKind::Configuration,
            Self::NoChunks { .. }
            | Self::StageFailed { .. }
            | Self::AllUnitsFailed { .. }
            | Self::Orchestration { .. } => ErrorKind::Pipeline,
        }
    }

    /// Whether another attempt of the same call could succeed.
    ///
    /// Transport and malformed-output failures are retried identically.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Transport | ErrorKind::MalformedOutput
        )
    }

    /// Returns up to `max_chars` characters of the raw model output, when
    /// the error carries any.
    #[must_use]
    pub fn raw_excerpt(&self, max_chars: usize) -> Option<String> {
        match self {
            Self::ResponseParse { content, .. } if !content.trim().is_empty() => {
                Some(content.trim().chars().take(max_chars).collect())
            }
            _ => None,
        }
    }
}

/// Errors reading documents or writing artifacts.
#[derive(Debug, Error)]
pub enum IoError {
    /// Reading a file failed.
    #[error("failed to read {}: {source}", path.display())]
    Read {
        /// Path being read.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// Writing a file failed.
    #[error("failed to write {}: {source}", path.display())]
    Write {
        /// Path being written.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// Serializing an artifact failed.
    #[error("failed to serialize {what}: {source}")]
    Serialize {
        /// Artifact description.
        what: String,
        /// Underlying error.
        source: serde_json::Error,
    },

    /// The input file type is not supported.
    #[error("unsupported input file: {}", path.display())]
    UnsupportedInput {
        /// Path of the input.
        path: PathBuf,
    },
}

/// Errors raised by CLI commands.
#[derive(Debug, Error)]
pub enum CommandError {
    /// An argument could not be interpreted.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The command failed while running.
    #[error("command failed: {0}")]
    ExecutionFailed(String),

    /// Output could not be formatted.
    #[error("output formatting failed: {0}")]
    OutputFormat(String),
}
