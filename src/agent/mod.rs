//! LLM-backed analysis pipelines.
//!
//! Every model call goes through a pluggable [`LlmProvider`] (backed by
//! OpenAI-compatible APIs) and a shared [`ServiceGate`] that retries and
//! paces it.
//!
//! # Architecture
//!
//! ```text
//! Document → Orchestrator
//!   ├── analyze_document
//!   │   ├── Chunker → N locations
//!   │   ├── Fan-out → ChunkAnalyst per location → PartialAnalysis
//!   │   └── merge → AggregatedAnalysis
//!   ├── extract_topics
//!   │   ├── TopicIndexer (one call, all locations) → TopicIndex
//!   │   ├── Fan-out → TargetedExtractor per topic (its locations only)
//!   │   └── merge → AggregatedAnalysis of topic sections
//!   └── run_weighted
//!       ├── AgentRegistry → selected AnalysisProviders
//!       ├── Fan-out → analyze_combined(primary, secondary)
//!       └── WeightedSynthesizer → FinalReport
//! ```

pub mod analyst;
pub mod analysts;
pub mod client;
pub mod config;
pub mod extractor;
pub mod indexer;
pub mod message;
pub mod orchestrator;
pub mod outcome;
pub mod pacer;
pub mod parse;
pub mod prompt;
pub mod provider;
pub mod providers;
pub mod registry;
pub mod retry;
pub mod synthesizer;
pub mod traits;

// Re-export key types
pub use analyst::ChunkAnalyst;
pub use analysts::{FocusAgent, builtin_registry};
pub use client::create_provider;
pub use config::AgentConfig;
pub use extractor::TargetedExtractor;
pub use indexer::TopicIndexer;
pub use message::{ChatMessage, ChatRequest, ChatResponse, Role, TokenUsage};
pub use orchestrator::Orchestrator;
pub use outcome::{ChunkRun, TopicRun, TopicSection, UnitFailure, WeightedRun};
pub use pacer::{Pacer, ServiceGate};
pub use prompt::PromptSet;
pub use provider::LlmProvider;
pub use registry::{AgentContext, AgentDescriptor, AgentFactory, AgentRegistry, AnalysisProvider};
pub use retry::{RetryExecutor, RetryOutcome, RetryPolicy};
pub use synthesizer::{
    WeightedInput, WeightedSynthesizer, rebalance_weights, validate_inputs, validate_weights,
};
pub use traits::{Agent, AgentResponse};
