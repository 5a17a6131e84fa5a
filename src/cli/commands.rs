//! CLI command implementations.
//!
//! Contains the business logic for each CLI command. Commands that call
//! the generation service build one [`AgentConfig`] and bridge into async
//! code through a tokio runtime.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::agent::analysts::builtin_registry;
use crate::agent::client::create_provider;
use crate::agent::config::{AgentConfig, AgentConfigBuilder};
use crate::agent::orchestrator::Orchestrator;
use crate::agent::prompt::PromptSet;
use crate::agent::synthesizer::validate_weights;
use crate::chunking::DEFAULT_MAX_SEGMENTS;
use crate::cli::output::{
    OutputFormat, format_agents, format_chunk_run, format_locations, format_topic_run,
    format_weighted_run,
};
use crate::cli::parser::{Cli, Commands, ServiceArgs};
use crate::core::{AnalysisSchema, Document};
use crate::error::{AgentError, CommandError, Result};
use crate::io::{ArtifactStore, document_id_from_path, read_document};

/// Output directory used when neither `--output-dir` nor
/// `DEALSCOPE_OUTPUT_DIR` is set.
pub const DEFAULT_OUTPUT_DIR: &str = "dealscope-output";

/// Executes the CLI command.
///
/// # Returns
///
/// Result with output string on success.
///
/// # Errors
///
/// Returns an error if the command fails to execute.
pub fn execute(cli: &Cli) -> Result<String> {
    let format = OutputFormat::parse(&cli.format);

    match &cli.command {
        Commands::Chunk {
            files,
            max_segments,
            preview_len,
        } => cmd_chunk(files, *max_segments, *preview_len, format),
        Commands::Analyze {
            files,
            id,
            schema,
            max_segments,
            service,
        } => cmd_analyze(
            cli,
            files,
            id.as_deref(),
            schema.as_deref(),
            *max_segments,
            service,
            format,
        ),
        Commands::Topics {
            files,
            id,
            topics,
            max_segments,
            service,
        } => cmd_topics(
            cli,
            files,
            id.as_deref(),
            topics.as_deref(),
            *max_segments,
            service,
            format,
        ),
        Commands::Agents => cmd_agents(format),
        Commands::Synthesize {
            primary,
            secondary,
            agents,
            subject,
            service,
        } => cmd_synthesize(
            cli,
            primary,
            secondary.as_deref(),
            agents,
            subject.as_deref(),
            service,
            format,
        ),
        Commands::InitPrompts { dir } => {
            cmd_init_prompts(dir.as_deref().or(cli.prompt_dir.as_deref()), format)
        }
    }
}

/// Parses `capability=weight,...` selections.
///
/// Capabilities are trimmed and lowercased; empty items are ignored.
///
/// # Errors
///
/// Returns [`CommandError::InvalidArgument`] for items without `=` or with a
/// weight that is not a non-negative integer.
pub fn parse_agent_weights(spec: &str) -> std::result::Result<Vec<(String, u32)>, CommandError> {
    spec.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| {
            let (capability, weight) = item.split_once('=').ok_or_else(|| {
                CommandError::InvalidArgument(format!(
                    "expected capability=weight, got '{item}'"
                ))
            })?;
            let capability = capability.trim().to_ascii_lowercase();
            if capability.is_empty() {
                return Err(CommandError::InvalidArgument(format!(
                    "missing capability in '{item}'"
                )));
            }
            let weight = weight.trim().parse::<u32>().map_err(|_| {
                CommandError::InvalidArgument(format!(
                    "weight for '{capability}' must be an integer between 0 and 100"
                ))
            })?;
            Ok((capability, weight))
        })
        .collect()
}

fn document_id(files: &[PathBuf], id: Option<&str>) -> String {
    id.map(crate::io::sanitize_id)
        .or_else(|| files.first().map(|f| document_id_from_path(f)))
        .unwrap_or_else(|| "document".to_string())
}

fn load_document(files: &[PathBuf], id: Option<&str>) -> Result<Document> {
    let id = document_id(files, id);
    Ok(read_document(files, &id)?)
}

fn read_text(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|source| {
        crate::error::IoError::Read {
            path: path.to_path_buf(),
            source,
        }
        .into()
    })
}

/// Builder with command-line values applied; environment and defaults
/// fill the rest.
fn config_builder(cli: &Cli, service: &ServiceArgs) -> AgentConfigBuilder {
    let mut builder = AgentConfig::builder();
    if let Some(dir) = &cli.prompt_dir {
        builder = builder.prompt_dir(dir);
    }
    if let Some(dir) = &cli.output_dir {
        builder = builder.output_dir(dir);
    }
    if let Some(n) = service.concurrency {
        builder = builder.max_concurrency(n);
    }
    if let Some(n) = service.max_attempts {
        builder = builder.max_attempts(n);
    }
    builder
}

fn finish_config(builder: AgentConfigBuilder) -> Result<AgentConfig> {
    let mut config = builder.from_env().build().map_err(|e| {
        CommandError::ExecutionFailed(format!("agent configuration error: {e}"))
    })?;
    if config.output_dir.is_none() {
        config.output_dir = Some(PathBuf::from(DEFAULT_OUTPUT_DIR));
    }
    debug!(
        provider = %config.provider,
        max_concurrency = config.max_concurrency,
        max_attempts = config.max_attempts,
        "resolved agent configuration"
    );
    Ok(config)
}

fn orchestrator(config: AgentConfig) -> Result<(Orchestrator, ArtifactStore)> {
    let store = ArtifactStore::new(
        config
            .output_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
    );
    let provider = create_provider(&config).map_err(|e| {
        CommandError::ExecutionFailed(format!("provider creation failed: {e}"))
    })?;
    let orchestrator = Orchestrator::new(provider, config).with_store(store.clone());
    Ok((orchestrator, store))
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new().map_err(|e| {
        CommandError::ExecutionFailed(format!("failed to create async runtime: {e}")).into()
    })
}

fn cmd_chunk(
    files: &[PathBuf],
    max_segments: Option<usize>,
    preview_len: usize,
    format: OutputFormat,
) -> Result<String> {
    let document = load_document(files, None)?;
    let locations = document.locations(max_segments.unwrap_or(DEFAULT_MAX_SEGMENTS));
    Ok(format_locations(
        &document.id,
        &locations,
        preview_len,
        format,
    ))
}

fn cmd_analyze(
    cli: &Cli,
    files: &[PathBuf],
    id: Option<&str>,
    schema_path: Option<&Path>,
    max_segments: Option<usize>,
    service: &ServiceArgs,
    format: OutputFormat,
) -> Result<String> {
    let document = load_document(files, id)?;
    let schema = match schema_path {
        Some(path) => AnalysisSchema::from_json_str(&read_text(path)?)?,
        None => AnalysisSchema::company_default(),
    };

    let mut builder = config_builder(cli, service);
    if let Some(n) = max_segments {
        builder = builder.max_segments(n);
    }
    if let Some(model) = &service.model {
        builder = builder.extraction_model(model);
    }
    let (orchestrator, store) = orchestrator(finish_config(builder)?)?;

    let run = runtime()?.block_on(orchestrator.analyze_document(&document, &schema))?;
    let written = vec![store.write_analysis(&document.id, &run.analysis)?];
    Ok(format_chunk_run(&run, &written, format))
}

fn cmd_topics(
    cli: &Cli,
    files: &[PathBuf],
    id: Option<&str>,
    topics: Option<&str>,
    max_segments: Option<usize>,
    service: &ServiceArgs,
    format: OutputFormat,
) -> Result<String> {
    let document = load_document(files, id)?;

    let mut builder = config_builder(cli, service);
    if let Some(n) = max_segments {
        builder = builder.max_segments(n);
    }
    if let Some(model) = &service.model {
        builder = builder.extraction_model(model).index_model(model);
    }
    if let Some(list) = topics {
        let topics: Vec<&str> = list
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect();
        if topics.is_empty() {
            return Err(CommandError::InvalidArgument("--topics is empty".to_string()).into());
        }
        builder = builder.topics(topics);
    }
    let (orchestrator, store) = orchestrator(finish_config(builder)?)?;

    let run = runtime()?.block_on(orchestrator.extract_topics(&document))?;
    let mut written: Vec<PathBuf> = Some(store.topic_index_path(&document.id))
        .filter(|p| p.exists())
        .into_iter()
        .collect();
    written.push(store.write_analysis(&document.id, &run.analysis)?);
    Ok(format_topic_run(&run, &written, format))
}

fn cmd_agents(format: OutputFormat) -> Result<String> {
    let registry = builtin_registry()?;
    Ok(format_agents(&registry, format))
}

fn cmd_synthesize(
    cli: &Cli,
    primary: &Path,
    secondary: Option<&Path>,
    agents: &str,
    subject: Option<&str>,
    service: &ServiceArgs,
    format: OutputFormat,
) -> Result<String> {
    // Checked before configuration: no credentials needed to reject them.
    let selections = parse_agent_weights(agents)?;
    validate_weights(&selections)?;
    let registry = builtin_registry()?;
    if let Some((capability, _)) = selections.iter().find(|(c, _)| registry.get(c).is_none()) {
        return Err(AgentError::UnknownCapability {
            capability: capability.clone(),
        }
        .into());
    }

    let primary_text = read_text(primary)?;
    let secondary_text = secondary.map(read_text).transpose()?;
    let subject = subject
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map_or_else(|| document_id_from_path(primary), ToString::to_string);

    let mut builder = config_builder(cli, service);
    if let Some(model) = &service.model {
        builder = builder.agent_model(model);
    }
    let (orchestrator, store) = orchestrator(finish_config(builder)?)?;

    let run = runtime()?.block_on(orchestrator.run_weighted(
        &registry,
        &subject,
        &primary_text,
        secondary_text.as_deref(),
        &selections,
    ))?;
    let written = vec![store.write_report(&subject, &run.report)?];
    Ok(format_weighted_run(&run, &written, format))
}

fn cmd_init_prompts(dir: Option<&Path>, format: OutputFormat) -> Result<String> {
    let target_dir = dir
        .map(PathBuf::from)
        .or_else(PromptSet::default_dir)
        .ok_or_else(|| {
            CommandError::ExecutionFailed(
                "could not determine home directory for default prompt path".to_string(),
            )
        })?;

    let written = PromptSet::write_defaults(&target_dir).map_err(|e| {
        CommandError::ExecutionFailed(format!("failed to write prompt templates: {e}"))
    })?;

    match format {
        OutputFormat::Text => {
            if written.is_empty() {
                Ok(format!(
                    "All prompt templates already exist in: {}\n",
                    target_dir.display()
                ))
            } else {
                let mut output = format!(
                    "Wrote {} prompt template(s) to: {}\n",
                    written.len(),
                    target_dir.display()
                );
                for path in &written {
                    output.push_str("  ");
                    output.push_str(
                        path.file_name()
                            .and_then(|n| n.to_str())
                            .unwrap_or("unknown"),
                    );
                    output.push('\n');
                }
                output.push_str("\nEdit these files to customize agent system prompts.\n");
                Ok(output)
            }
        }
        OutputFormat::Json => {
            let json = serde_json::json!({
                "directory": target_dir.to_string_lossy(),
                "written": written.iter().map(|p| p.to_string_lossy().into_owned()).collect::<Vec<_>>(),
                "count": written.len()
            });
            Ok(format.to_json(&json))
        }
    }
}
