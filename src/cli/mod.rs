//! CLI layer for dealscope.
//!
//! Provides the command-line interface using clap, with commands for
//! chunking, analysis, topic extraction and weighted synthesis.

pub mod commands;
pub mod output;
pub mod parser;

pub use commands::execute;
pub use output::OutputFormat;
pub use parser::{Cli, Commands, ServiceArgs};
