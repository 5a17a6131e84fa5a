//! Command-line argument parsing.
//!
//! Defines the CLI structure using clap derive macros.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// dealscope: LLM analysis of pitch decks, websites and memos.
///
/// Chunked structured analysis, topic-targeted extraction and weighted
/// multi-agent synthesis, with retries and pacing on every service call.
#[derive(Parser, Debug)]
#[command(name = "dealscope")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output (debug logging on stderr).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, default_value = "text", global = true)]
    pub format: String,

    /// Directory receiving topic indexes, analyses and reports.
    ///
    /// Falls back to `DEALSCOPE_OUTPUT_DIR`, then `./dealscope-output`.
    #[arg(short, long, global = true)]
    pub output_dir: Option<PathBuf>,

    /// Directory containing prompt template files.
    ///
    /// Falls back to `DEALSCOPE_PROMPT_DIR`, then `~/.config/dealscope/prompts`.
    #[arg(long, global = true)]
    pub prompt_dir: Option<PathBuf>,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by commands that call the generation service.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct ServiceArgs {
    /// Maximum concurrent service calls.
    #[arg(short, long)]
    pub concurrency: Option<usize>,

    /// Model override for this command's agents.
    #[arg(short, long)]
    pub model: Option<String>,

    /// Attempts per service call, first try included.
    #[arg(long)]
    pub max_attempts: Option<u32>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show how input files are split into locations (no service calls).
    #[command(after_help = r"Examples:
  dealscope chunk site.md                  # Chunk a scraped website
  dealscope chunk site.md -n 10            # At most ~10 chunks
  dealscope chunk p1.png p2.png p3.png     # One location per page
")]
    Chunk {
        /// Input files (text/markdown, or page images).
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Upper bound on chunks for text documents.
        #[arg(short = 'n', long)]
        max_segments: Option<usize>,

        /// Preview length in characters.
        #[arg(long, default_value = "80")]
        preview_len: usize,
    },

    /// Analyze every chunk into the schema and merge the results.
    #[command(after_help = r"Examples:
  dealscope analyze site.md                      # Default company schema
  dealscope analyze site.md --schema fields.json # Custom schema
  dealscope --format json analyze deck/*.png     # Paged deck, JSON output
")]
    Analyze {
        /// Input files (text/markdown, or page images).
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Document identifier (defaults to the first file's stem).
        #[arg(long)]
        id: Option<String>,

        /// JSON schema file: `{"fields": [{"name", "kind", ...}]}`.
        #[arg(long)]
        schema: Option<PathBuf>,

        /// Upper bound on chunks for text documents.
        #[arg(short = 'n', long)]
        max_segments: Option<usize>,

        /// Service options.
        #[command(flatten)]
        service: ServiceArgs,
    },

    /// Build a topic index, then extract each topic from its locations.
    #[command(after_help = r#"Examples:
  dealscope topics deck/*.png                        # Default topics
  dealscope topics memo.md --topics "Team,Market"    # Suggested topics
"#)]
    Topics {
        /// Input files (text/markdown, or page images).
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Document identifier (defaults to the first file's stem).
        #[arg(long)]
        id: Option<String>,

        /// Comma-separated topics suggested to the indexer.
        #[arg(long)]
        topics: Option<String>,

        /// Upper bound on chunks for text documents.
        #[arg(short = 'n', long)]
        max_segments: Option<usize>,

        /// Service options.
        #[command(flatten)]
        service: ServiceArgs,
    },

    /// List the registered analysis agents.
    Agents,

    /// Run weighted agents over a primary (and optional secondary) text and
    /// synthesize one report.
    #[command(after_help = r"Examples:
  dealscope synthesize --primary deck.md --agents market=40,team=35,risk=25
  dealscope synthesize --primary deck.md --secondary site.md \
      --agents financial=60,market=40 --subject Acme
")]
    Synthesize {
        /// Primary text (e.g. extracted deck text).
        #[arg(long)]
        primary: PathBuf,

        /// Secondary text (e.g. scraped website).
        #[arg(long)]
        secondary: Option<PathBuf>,

        /// Weighted agents: `capability=weight,...`, weights summing to 100.
        #[arg(short, long)]
        agents: String,

        /// Report subject (defaults to the primary file's stem).
        #[arg(long)]
        subject: Option<String>,

        /// Service options.
        #[command(flatten)]
        service: ServiceArgs,
    },

    /// Write the default prompt templates for customization.
    ///
    /// Existing files are left untouched.
    #[command(name = "init-prompts")]
    InitPrompts {
        /// Target directory (defaults to `--prompt-dir`, then
        /// `~/.config/dealscope/prompts`).
        dir: Option<PathBuf>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_chunk() {
        let cli = Cli::parse_from(["dealscope", "chunk", "site.md", "-n", "10"]);
        match cli.command {
            Commands::Chunk {
                files,
                max_segments,
                preview_len,
            } => {
                assert_eq!(files, vec![PathBuf::from("site.md")]);
                assert_eq!(max_segments, Some(10));
                assert_eq!(preview_len, 80);
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_cli_parse_synthesize() {
        let cli = Cli::parse_from([
            "dealscope",
            "--format",
            "json",
            "synthesize",
            "--primary",
            "deck.md",
            "--agents",
            "market=60,team=40",
            "-c",
            "2",
        ]);
        assert_eq!(cli.format, "json");
        match cli.command {
            Commands::Synthesize {
                primary,
                secondary,
                agents,
                service,
                ..
            } => {
                assert_eq!(primary, PathBuf::from("deck.md"));
                assert!(secondary.is_none());
                assert_eq!(agents, "market=60,team=40");
                assert_eq!(service.concurrency, Some(2));
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_cli_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["dealscope", "agents", "--verbose", "-o", "out"]);
        assert!(cli.verbose);
        assert_eq!(cli.output_dir, Some(PathBuf::from("out")));
        assert!(matches!(cli.command, Commands::Agents));
    }

    #[test]
    fn test_cli_requires_files() {
        assert!(Cli::try_parse_from(["dealscope", "analyze"]).is_err());
    }

    #[test]
    fn test_cli_debug_assert() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
