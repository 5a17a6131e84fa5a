//! Output formatting for CLI commands.
//!
//! Every command renders either human-readable text or pretty JSON.

use std::fmt::Write;
use std::path::PathBuf;

use serde::Serialize;

use crate::agent::outcome::{ChunkRun, TopicRun, UnitFailure, WeightedRun};
use crate::agent::registry::AgentRegistry;
use crate::core::Location;

/// Output format for CLI commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// Pretty-printed JSON.
    Json,
}

impl OutputFormat {
    /// Parses a format name; anything but `json` is text.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("json") {
            Self::Json
        } else {
            Self::Text
        }
    }

    /// Serializes `value` as pretty JSON, or an error object if that fails.
    #[must_use]
    pub fn to_json<T: Serialize + ?Sized>(&self, value: &T) -> String {
        serde_json::to_string_pretty(value).unwrap_or_else(|e| {
            serde_json::json!({ "error": format!("JSON serialization failed: {e}") }).to_string()
        })
    }
}

fn truncate_str(s: &str, max_len: usize) -> String {
    let flat: String = s.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_len {
        return flat;
    }
    if max_len <= 3 {
        return flat.chars().take(max_len).collect();
    }
    let mut out: String = flat.chars().take(max_len - 3).collect();
    out.push_str("...");
    out
}

#[derive(Serialize)]
struct LocationSummary {
    number: usize,
    characters: usize,
    has_image: bool,
    preview: String,
}

/// Formats the locations of a document.
#[must_use]
pub fn format_locations(
    document_id: &str,
    locations: &[Location],
    preview_len: usize,
    format: OutputFormat,
) -> String {
    let summaries: Vec<LocationSummary> = locations
        .iter()
        .map(|l| LocationSummary {
            number: l.number,
            characters: l.text_len(),
            has_image: l.image.is_some(),
            preview: l
                .text
                .as_deref()
                .map(|t| truncate_str(t, preview_len))
                .unwrap_or_default(),
        })
        .collect();

    match format {
        OutputFormat::Text => {
            let mut out = format!("{document_id}: {} location(s)\n", summaries.len());
            for s in &summaries {
                let image = if s.has_image { " [image]" } else { "" };
                let _ = writeln!(
                    out,
                    "  {:>3}  {:>6} chars{image}  {}",
                    s.number, s.characters, s.preview
                );
            }
            out
        }
        OutputFormat::Json => format.to_json(&serde_json::json!({
            "document_id": document_id,
            "count": summaries.len(),
            "locations": summaries,
        })),
    }
}

fn push_failures(out: &mut String, failures: &[UnitFailure]) {
    if failures.is_empty() {
        return;
    }
    out.push_str("\nFailed units:\n");
    for f in failures {
        let _ = writeln!(out, "  {}", f.line());
        if let Some(raw) = &f.raw_excerpt {
            let _ = writeln!(out, "    raw: {}", truncate_str(raw, 120));
        }
    }
}

fn push_written(out: &mut String, written: &[PathBuf]) {
    for path in written {
        let _ = writeln!(out, "Wrote: {}", path.display());
    }
}

fn json_with_written<T: Serialize>(format: OutputFormat, run: &T, written: &[PathBuf]) -> String {
    format.to_json(&serde_json::json!({
        "run": run,
        "written": written.iter().map(|p| p.to_string_lossy().into_owned()).collect::<Vec<_>>(),
    }))
}

/// Formats a chunk analysis run.
#[must_use]
pub fn format_chunk_run(run: &ChunkRun, written: &[PathBuf], format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => {
            let mut out = format!(
                "Analysis of {}: {} ({:.1}s)\n\n",
                run.document_id,
                run.summary(),
                run.elapsed.as_secs_f64()
            );
            out.push_str(&format.to_json(&run.analysis.fields));
            out.push('\n');
            push_failures(&mut out, &run.failures);
            push_written(&mut out, written);
            out
        }
        OutputFormat::Json => json_with_written(format, run, written),
    }
}

/// Formats a topic extraction run.
#[must_use]
pub fn format_topic_run(run: &TopicRun, written: &[PathBuf], format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => {
            let mut out = format!(
                "Topics for {}: {} ({:.1}s)\n",
                run.document_id,
                run.summary(),
                run.elapsed.as_secs_f64()
            );
            if !run.topics_skipped.is_empty() {
                let _ = writeln!(
                    out,
                    "Skipped (no valid locations): {}",
                    run.topics_skipped.join(", ")
                );
            }
            out.push('\n');
            out.push_str(&run.render_sections());
            out.push('\n');
            push_failures(&mut out, &run.failures);
            push_written(&mut out, written);
            out
        }
        OutputFormat::Json => json_with_written(format, run, written),
    }
}

/// Formats a weighted run.
#[must_use]
pub fn format_weighted_run(run: &WeightedRun, written: &[PathBuf], format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => {
            let mut out = run.report.render();
            let _ = writeln!(out, "\nAgents: {}", run.summary());
            push_failures(&mut out, &run.failures);
            push_written(&mut out, written);
            out
        }
        OutputFormat::Json => json_with_written(format, run, written),
    }
}

/// Formats the registered agents.
#[must_use]
pub fn format_agents(registry: &AgentRegistry, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => {
            let mut out = String::from("Registered agents:\n");
            for (capability, descriptor) in registry.discover() {
                let _ = writeln!(out, "  {capability:<12} {}", descriptor.name);
            }
            out
        }
        OutputFormat::Json => {
            let agents: Vec<_> = registry
                .discover()
                .iter()
                .map(|(capability, d)| serde_json::json!({ "capability": capability, "name": d.name }))
                .collect();
            format.to_json(&agents)
        }
    }
}
