//! # dealscope
//!
//! Document analysis for company material (scraped websites, pitch decks,
//! memos) through LLM calls.
//!
//! Three pipelines are provided:
//!
//! - **Chunked analysis**: split a long text into bounded chunks, analyze
//!   each into a schema-shaped record, and merge the records.
//! - **Topic-targeted extraction**: build a topic → location index in one
//!   call, then extract each topic from only its locations.
//! - **Weighted synthesis**: run several pluggable analysts over the same
//!   inputs and combine their analyses in proportion to user weights.
//!
//! Every service call is retried with exponential backoff and paced to
//! respect rate limits. Failed units are recorded and the run continues.

pub mod agent;
pub mod aggregation;
pub mod chunking;
pub mod cli;
pub mod core;
pub mod error;
pub mod io;

pub use agent::{AgentConfig, AgentRegistry, Orchestrator, builtin_registry};
pub use self::core::{
    AggregatedAnalysis, AnalysisSchema, Chunk, Document, FinalReport, Location, PartialAnalysis,
    TopicIndex,
};
pub use error::{AgentError, Error, Result};
