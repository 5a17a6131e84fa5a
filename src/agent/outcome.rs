//! Run summaries returned by the orchestrator pipelines.
//!
//! Each run carries its output plus the units that failed, so a caller can
//! report `"N failed / M total"` and list what went wrong.

use std::time::Duration;

use serde::Serialize;

use crate::core::{AggregatedAnalysis, ErrorMarker, FinalReport, TopicIndex};

/// One unit (chunk, topic, agent) that failed after retries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnitFailure {
    /// Unit label, e.g. `"chunk 3"`, `"topic Team"`, `"agent market"`.
    pub unit: String,
    /// Last error message.
    pub error: String,
    /// Start of the raw model output, for malformed-output failures.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_excerpt: Option<String>,
}

impl UnitFailure {
    /// Builds a failure record from an error marker.
    #[must_use]
    pub fn from_marker(unit: impl Into<String>, marker: &ErrorMarker) -> Self {
        Self {
            unit: unit.into(),
            error: marker.error.clone(),
            raw_excerpt: marker.raw_excerpt.clone(),
        }
    }

    /// One-line rendering for logs and text output.
    #[must_use]
    pub fn line(&self) -> String {
        format!("{}: {}", self.unit, self.error)
    }
}

fn failure_summary(failed: usize, total: usize) -> String {
    format!("{failed} failed / {total} total")
}

/// Result of the chunk analysis pipeline.
#[derive(Debug, Clone, Serialize)]
pub struct ChunkRun {
    /// Document identifier.
    pub document_id: String,
    /// Chunks (or pages) analyzed.
    pub units_total: usize,
    /// Units that failed after retries.
    pub failures: Vec<UnitFailure>,
    /// Merged analysis over the successful units.
    pub analysis: AggregatedAnalysis,
    /// Wall-clock time of the run.
    #[serde(serialize_with = "serialize_duration")]
    pub elapsed: Duration,
}

impl ChunkRun {
    /// Number of failed units.
    #[must_use]
    pub fn units_failed(&self) -> usize {
        self.failures.len()
    }

    /// `"N failed / M total"`.
    #[must_use]
    pub fn summary(&self) -> String {
        failure_summary(self.units_failed(), self.units_total)
    }
}

/// Extracted text for one topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopicSection {
    /// Topic name.
    pub topic: String,
    /// Locations the extraction was given.
    pub locations: Vec<usize>,
    /// Extracted prose.
    pub text: String,
}

impl TopicSection {
    /// Section rendered as a markdown block with a heading.
    #[must_use]
    pub fn render(&self) -> String {
        format!("## {}\n\n{}", self.topic, self.text.trim())
    }
}

/// Result of the two-stage topic extraction pipeline.
#[derive(Debug, Clone, Serialize)]
pub struct TopicRun {
    /// Document identifier.
    pub document_id: String,
    /// Stage 1 output.
    pub topic_index: TopicIndex,
    /// Topics with at least one valid location that were extracted.
    pub topics_attempted: usize,
    /// Topics skipped because no location survived range filtering.
    pub topics_skipped: Vec<String>,
    /// Successful sections, in topic order.
    pub sections: Vec<TopicSection>,
    /// Topics that failed after retries.
    pub failures: Vec<UnitFailure>,
    /// Sections merged into the topic schema.
    pub analysis: AggregatedAnalysis,
    /// Wall-clock time of the run.
    #[serde(serialize_with = "serialize_duration")]
    pub elapsed: Duration,
}

impl TopicRun {
    /// `"N failed / M total"` over attempted topics.
    #[must_use]
    pub fn summary(&self) -> String {
        failure_summary(self.failures.len(), self.topics_attempted)
    }

    /// All sections joined as one markdown document.
    #[must_use]
    pub fn render_sections(&self) -> String {
        self.sections
            .iter()
            .map(TopicSection::render)
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// Result of a weighted multi-agent run.
#[derive(Debug, Clone, Serialize)]
pub struct WeightedRun {
    /// Agents requested.
    pub agents_requested: usize,
    /// Agents that failed to instantiate or analyze.
    pub failures: Vec<UnitFailure>,
    /// The synthesized report (weights rebalanced over the survivors).
    pub report: FinalReport,
    /// Wall-clock time of the run.
    #[serde(serialize_with = "serialize_duration")]
    pub elapsed: Duration,
}

impl WeightedRun {
    /// `"N failed / M total"` over requested agents.
    #[must_use]
    pub fn summary(&self) -> String {
        failure_summary(self.failures.len(), self.agents_requested)
    }
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn serialize_duration<S>(d: &Duration, s: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    s.serialize_f64(d.as_secs_f64())
}
