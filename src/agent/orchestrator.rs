//! Orchestrator for the analysis pipelines.
//!
//! Three fan-out/collect workflows share one provider and one
//! [`ServiceGate`]:
//!
//! - chunk analysis: chunk → analyze each chunk → merge;
//! - topic extraction: topic index → extract each topic → merge;
//! - weighted run: each selected agent analyzes → rebalance → synthesize.
//!
//! Units run as futures on the calling task; the gate bounds how many
//! service calls are in flight and paces them.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;
use std::time::Instant;

use futures_util::future::join_all;
use tracing::{debug, info, warn};

use super::analyst::ChunkAnalyst;
use super::config::AgentConfig;
use super::extractor::TargetedExtractor;
use super::indexer::TopicIndexer;
use super::outcome::{ChunkRun, TopicRun, TopicSection, UnitFailure, WeightedRun};
use super::pacer::ServiceGate;
use super::prompt::PromptSet;
use super::provider::LlmProvider;
use super::registry::{AgentContext, AgentRegistry};
use super::synthesizer::{WeightedInput, WeightedSynthesizer, rebalance_weights, validate_weights};
use crate::aggregation;
use crate::core::{
    AnalysisRecord, AnalysisSchema, Document, DocumentBody, ErrorMarker, FieldValue, FinalReport,
    Location, PartialAnalysis, filter_locations,
};
use crate::error::AgentError;
use crate::io::ArtifactStore;

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}

fn failure_from_error(unit: String, error: &AgentError) -> (UnitFailure, ErrorMarker) {
    let marker = ErrorMarker::from_error(error);
    (UnitFailure::from_marker(unit, &marker), marker)
}

/// Runs the analysis pipelines against one generation service.
pub struct Orchestrator {
    provider: Arc<dyn LlmProvider>,
    config: AgentConfig,
    prompts: PromptSet,
    gate: ServiceGate,
    store: Option<ArtifactStore>,
}

impl Orchestrator {
    /// Creates an orchestrator with the given provider and configuration.
    ///
    /// Loads prompt templates from [`AgentConfig::prompt_dir`], falling back
    /// to compiled-in defaults. Topic indexes are persisted when
    /// [`AgentConfig::output_dir`] is set.
    #[must_use]
    pub fn new(provider: Arc<dyn LlmProvider>, config: AgentConfig) -> Self {
        let prompts = PromptSet::load(config.prompt_dir.as_deref());
        let gate = ServiceGate::from_config(&config);
        let store = config.output_dir.clone().map(ArtifactStore::new);
        Self {
            provider,
            config,
            prompts,
            gate,
            store,
        }
    }

    /// Replaces the prompt set.
    #[must_use]
    pub fn with_prompts(mut self, prompts: PromptSet) -> Self {
        self.prompts = prompts;
        self
    }

    /// Replaces the artifact store.
    #[must_use]
    pub fn with_store(mut self, store: ArtifactStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Replaces the service gate.
    #[must_use]
    pub fn with_gate(mut self, gate: ServiceGate) -> Self {
        self.gate = gate;
        self
    }

    /// Engine configuration.
    #[must_use]
    pub const fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Artifact store, if configured.
    #[must_use]
    pub const fn store(&self) -> Option<&ArtifactStore> {
        self.store.as_ref()
    }

    fn locations(&self, document: &Document) -> Result<Vec<Location>, AgentError> {
        if document.is_empty() {
            return Err(AgentError::NoChunks {
                hint: format!("document '{}' is empty", document.id),
            });
        }
        let locations = document.locations(self.config.max_segments);
        if locations.is_empty() {
            return Err(AgentError::NoChunks {
                hint: format!("document '{}' has no text after cleaning", document.id),
            });
        }
        Ok(locations)
    }

    /// Analyzes every chunk (or page) of `document` and merges the records.
    ///
    /// Units that exhaust their retries are recorded as failures and the run
    /// continues.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::NoChunks`] for an empty document and
    /// [`AgentError::AllUnitsFailed`] when no unit succeeded.
    pub async fn analyze_document(
        &self,
        document: &Document,
        schema: &AnalysisSchema,
    ) -> Result<ChunkRun, AgentError> {
        let start = Instant::now();
        let locations = self.locations(document)?;
        let total = locations.len();
        let unit = match document.body {
            DocumentBody::Text(_) => "chunk",
            DocumentBody::Pages(_) => "page",
        };
        info!(document = %document.id, units = total, unit, "analyzing document");

        let analyst = ChunkAnalyst::new(
            &self.config,
            self.prompts.chunk_analysis.clone(),
            schema.clone(),
        );
        let analyst = &analyst;
        let provider = &*self.provider;
        let gate = &self.gate;
        let subject = document.id.as_str();

        let outcomes = join_all(locations.iter().map(|location| async move {
            let label = format!("{unit} {}", location.number);
            let outcome = gate
                .call(&label, move |_attempt| {
                    analyst.analyze(provider, subject, location, total)
                })
                .await;
            (label, outcome)
        }))
        .await;

        let mut partials = Vec::with_capacity(total);
        let mut failures = Vec::new();
        for (label, outcome) in outcomes {
            match outcome.into_result() {
                Ok(record) => partials.push(PartialAnalysis::Record(record)),
                Err(e) => {
                    let (failure, marker) = failure_from_error(label, &e);
                    failures.push(failure);
                    partials.push(PartialAnalysis::Error(marker));
                }
            }
        }

        if failures.len() == total {
            return Err(AgentError::AllUnitsFailed {
                stage: "chunk_analysis",
                total,
                errors: failures.iter().map(UnitFailure::line).collect(),
            });
        }

        let analysis = aggregation::merge(&partials, schema);
        info!(
            document = %document.id,
            failed = failures.len(),
            total,
            elapsed_ms = elapsed_ms(start),
            "chunk analysis complete"
        );
        Ok(ChunkRun {
            document_id: document.id.clone(),
            units_total: total,
            failures,
            analysis,
            elapsed: start.elapsed(),
        })
    }

    /// Two-stage extraction: one topic index call, then one call per topic
    /// with only that topic's locations.
    ///
    /// The topic index is written to the artifact store as soon as Stage 1
    /// succeeds; a failed write is logged and the run continues.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::NoChunks`] for an empty document,
    /// [`AgentError::StageFailed`] when the index call fails, the index is
    /// empty or no topic has a valid location, and
    /// [`AgentError::AllUnitsFailed`] when every topic extraction failed.
    pub async fn extract_topics(&self, document: &Document) -> Result<TopicRun, AgentError> {
        let start = Instant::now();
        let locations = self.locations(document)?;
        let total = locations.len();
        let provider = &*self.provider;
        let gate = &self.gate;
        let subject = document.id.as_str();

        let indexer = TopicIndexer::new(&self.config, self.prompts.topic_index.clone());
        let indexer = &indexer;
        let all_locations = locations.as_slice();
        let topic_index = gate
            .call("topic_index", move |_attempt| {
                indexer.index(provider, subject, all_locations)
            })
            .await
            .into_result()
            .map_err(|e| AgentError::StageFailed {
                stage: "topic_index",
                message: e.to_string(),
            })?;
        if topic_index.is_empty() {
            return Err(AgentError::StageFailed {
                stage: "topic_index",
                message: "no topics identified".to_string(),
            });
        }
        info!(document = %document.id, topics = topic_index.len(), "topic index built");

        if let Some(store) = &self.store
            && let Err(e) = store.write_topic_index(&document.id, &topic_index)
        {
            warn!(document = %document.id, error = %e, "failed to persist topic index");
        }

        let mut planned: Vec<(&str, Vec<usize>)> = Vec::new();
        let mut topics_skipped = Vec::new();
        for (topic, raw) in topic_index.iter() {
            let valid = filter_locations(raw, total);
            if valid.is_empty() {
                warn!(topic, raw = ?raw, total, "no valid locations for topic, skipping");
                topics_skipped.push(topic.to_string());
            } else {
                debug!(topic, locations = ?valid, "planned topic extraction");
                planned.push((topic, valid));
            }
        }
        if planned.is_empty() {
            return Err(AgentError::StageFailed {
                stage: "topic_extraction",
                message: "no topic references a valid location".to_string(),
            });
        }

        let extractor = TargetedExtractor::new(&self.config, self.prompts.topic_extraction.clone());
        let extractor = &extractor;
        let locations = &locations;
        let outcomes = join_all(planned.iter().map(|(topic, numbers)| async move {
            let selected: Vec<&Location> = numbers.iter().map(|n| &locations[n - 1]).collect();
            let selected = selected.as_slice();
            let label = format!("topic {topic}");
            let outcome = gate
                .call(&label, move |_attempt| {
                    extractor.extract(provider, subject, topic, selected)
                })
                .await;
            (label, outcome)
        }))
        .await;

        let mut sections = Vec::new();
        let mut failures = Vec::new();
        let mut partials = Vec::with_capacity(planned.len());
        for ((topic, numbers), (label, outcome)) in planned.iter().zip(outcomes) {
            match outcome.into_result() {
                Ok(text) => {
                    let section = TopicSection {
                        topic: (*topic).to_string(),
                        locations: numbers.clone(),
                        text,
                    };
                    partials.push(section_partial(&section));
                    sections.push(section);
                }
                Err(e) => {
                    let (failure, marker) = failure_from_error(label, &e);
                    failures.push(failure);
                    partials.push(PartialAnalysis::Error(marker));
                }
            }
        }

        if sections.is_empty() {
            return Err(AgentError::AllUnitsFailed {
                stage: "topic_extraction",
                total: planned.len(),
                errors: failures.iter().map(UnitFailure::line).collect(),
            });
        }

        let analysis = aggregation::merge(&partials, &AnalysisSchema::topic_sections());
        info!(
            document = %document.id,
            extracted = sections.len(),
            failed = failures.len(),
            skipped = topics_skipped.len(),
            elapsed_ms = elapsed_ms(start),
            "topic extraction complete"
        );
        let topics_attempted = planned.len();
        Ok(TopicRun {
            document_id: document.id.clone(),
            topic_index,
            topics_attempted,
            topics_skipped,
            sections,
            failures,
            analysis,
            elapsed: start.elapsed(),
        })
    }

    /// Runs the selected agents over the same inputs and synthesizes their
    /// analyses.
    ///
    /// `selections` pairs capabilities with weights. They are validated
    /// before any call. Agents that cannot be built or whose analysis fails
    /// are recorded as failures, and the remaining weights are rebalanced to
    /// sum to 100.
    ///
    /// # Errors
    ///
    /// Returns validation errors, [`AgentError::UnknownCapability`], or
    /// [`AgentError::AllUnitsFailed`] when no agent produced an analysis.
    pub async fn run_weighted(
        &self,
        registry: &AgentRegistry,
        subject: &str,
        primary: &str,
        secondary: Option<&str>,
        selections: &[(String, u32)],
    ) -> Result<WeightedRun, AgentError> {
        let start = Instant::now();
        validate_weights(selections)?;
        let mut named = Vec::with_capacity(selections.len());
        for (capability, weight) in selections {
            let descriptor = registry
                .get(capability)
                .ok_or_else(|| AgentError::UnknownCapability {
                    capability: capability.clone(),
                })?;
            named.push((descriptor.name.as_str(), *weight));
        }
        validate_weights(&named)?;

        let weights: BTreeMap<&str, u32> =
            selections.iter().map(|(c, w)| (c.as_str(), *w)).collect();
        let capabilities: Vec<&str> = selections.iter().map(|(c, _)| c.as_str()).collect();
        let context = AgentContext {
            provider: Arc::clone(&self.provider),
            config: self.config.clone(),
        };
        let active = registry.instantiate_all(&capabilities, &context);
        let mut seen = HashSet::new();
        for (_, agent) in &active.agents {
            if !seen.insert(agent.name()) {
                return Err(AgentError::DuplicateAgent {
                    name: agent.name().to_string(),
                });
            }
        }
        info!(
            subject,
            requested = selections.len(),
            active = active.agents.len(),
            "running weighted analysis"
        );

        let mut failures: Vec<UnitFailure> = active
            .excluded
            .iter()
            .map(|(capability, e)| failure_from_error(format!("agent {capability}"), e).0)
            .collect();

        let gate = &self.gate;
        let outcomes = join_all(active.agents.iter().map(|(capability, agent)| async move {
            let label = format!("agent {capability}");
            let outcome = gate
                .call(&label, move |_attempt| {
                    agent.analyze_combined(subject, primary, secondary)
                })
                .await;
            (capability, agent.name().to_string(), label, outcome)
        }))
        .await;

        let mut survivors = Vec::new();
        for (capability, name, label, outcome) in outcomes {
            match outcome.into_result() {
                Ok(text) => {
                    let weight = weights.get(capability.as_str()).copied().unwrap_or(0);
                    survivors.push(WeightedInput::new(name, weight, text));
                }
                Err(e) => failures.push(failure_from_error(label, &e).0),
            }
        }

        if survivors.is_empty() {
            return Err(AgentError::AllUnitsFailed {
                stage: "agent_analysis",
                total: selections.len(),
                errors: failures.iter().map(UnitFailure::line).collect(),
            });
        }

        if !failures.is_empty() {
            let original: Vec<u32> = survivors.iter().map(|s| s.weight).collect();
            let rebalanced = rebalance_weights(&original);
            for (input, weight) in survivors.iter_mut().zip(&rebalanced) {
                input.weight = *weight;
            }
            warn!(
                subject,
                failed = failures.len(),
                original = ?original,
                rebalanced = ?rebalanced,
                "rebalanced weights over surviving agents"
            );
        }

        let report = self.synthesize(subject, &survivors).await?;
        info!(
            subject,
            agents = survivors.len(),
            success = report.is_success(),
            elapsed_ms = elapsed_ms(start),
            "weighted analysis complete"
        );
        Ok(WeightedRun {
            agents_requested: selections.len(),
            failures,
            report,
            elapsed: start.elapsed(),
        })
    }

    /// Synthesizes weighted analyses into a report.
    ///
    /// # Errors
    ///
    /// Returns only validation errors; a failed service call yields a
    /// failure-tagged report.
    pub async fn synthesize(
        &self,
        subject: &str,
        inputs: &[WeightedInput],
    ) -> Result<FinalReport, AgentError> {
        let synthesizer = WeightedSynthesizer::new(&self.config, self.prompts.synthesizer.clone());
        synthesizer
            .synthesize(&*self.provider, &self.gate, subject, inputs)
            .await
    }
}

/// Partial analysis of the topic schema for one extracted section.
fn section_partial(section: &TopicSection) -> PartialAnalysis {
    let mut fields = BTreeMap::new();
    fields.insert(
        "covered_topics".to_string(),
        FieldValue::Set(BTreeSet::from([section.topic.clone()])),
    );
    fields.insert(
        "sections".to_string(),
        FieldValue::List(vec![section.render()]),
    );
    PartialAnalysis::Record(AnalysisRecord { fields })
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("provider", &self.provider.name())
            .field("config", &self.config)
            .field("prompts", &self.prompts)
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::analysts::create_market_agent;
    use crate::agent::message::{ChatRequest, ChatResponse, TokenUsage};
    use crate::agent::pacer::Pacer;
    use crate::agent::retry::{RetryExecutor, RetryPolicy};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    /// Replies by system prompt: index JSON for the indexer, prose otherwise.
    struct Routed {
        index: String,
        calls: AtomicU32,
    }

    #[async_trait]
    impl LlmProvider for Routed {
        fn name(&self) -> &'static str {
            "routed"
        }

        async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, AgentError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let user = &request.messages[1].content;
            let content = if request.json_mode {
                self.index.clone()
            } else if user.contains("<topic>Team</topic>") {
                " ".to_string()
            } else {
                "Section text.".to_string()
            };
            Ok(ChatResponse {
                content,
                usage: TokenUsage::default(),
                finish_reason: Some("stop".to_string()),
            })
        }
    }

    fn orchestrator(index: &str) -> (Arc<Routed>, Orchestrator) {
        let provider = Arc::new(Routed {
            index: index.to_string(),
            calls: AtomicU32::new(0),
        });
        let config = AgentConfig::builder()
            .api_key("k")
            .build()
            .unwrap_or_else(|_| unreachable!());
        let gate = ServiceGate::new(
            RetryExecutor::new(RetryPolicy::new(2, Duration::ZERO)),
            Pacer::new(1, Duration::ZERO),
        );
        let orch = Orchestrator::new(provider.clone(), config)
            .with_prompts(PromptSet::defaults())
            .with_gate(gate);
        (provider, orch)
    }

    fn five_pages() -> Document {
        let pages = (1..=5)
            .map(|i| crate::core::Page {
                text: Some(format!("page {i}")),
                image: None,
            })
            .collect();
        Document::from_pages("acme", pages)
    }

    #[tokio::test]
    async fn test_empty_document_has_no_chunks() {
        let (provider, orch) = orchestrator("{}");
        let result = orch.extract_topics(&Document::from_text("empty", "  \n ")).await;
        assert!(matches!(result, Err(AgentError::NoChunks { .. })));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_empty_index_is_stage_failure() {
        let (_provider, orch) = orchestrator("{}");
        let result = orch.extract_topics(&five_pages()).await;
        assert!(matches!(
            result,
            Err(AgentError::StageFailed {
                stage: "topic_index",
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_topics_filtered_skipped_and_failed() {
        let dir = tempfile::tempdir().unwrap_or_else(|_| unreachable!());
        let (provider, orch) =
            orchestrator(r#"{"Market": [0, 3, 99], "Legal": [7], "Team": [1]}"#);
        let orch = orch.with_store(ArtifactStore::new(dir.path()));

        let run = orch
            .extract_topics(&five_pages())
            .await
            .unwrap_or_else(|_| unreachable!());

        assert_eq!(run.topics_skipped, vec!["Legal".to_string()]);
        assert_eq!(run.topics_attempted, 2);
        assert_eq!(run.sections.len(), 1);
        assert_eq!(run.sections[0].topic, "Market");
        assert_eq!(run.sections[0].locations, vec![3]);
        assert_eq!(run.summary(), "1 failed / 2 total");
        assert_eq!(
            run.analysis.get("covered_topics").map(FieldValue::items),
            Some(vec!["Market"])
        );
        assert_eq!(run.analysis.contributing, 1);
        assert_eq!(run.analysis.skipped, 1);
        // index + Market + Team twice (blank replies are retried)
        assert_eq!(provider.calls.load(Ordering::SeqCst), 4);
        assert!(dir.path().join("acme.topic_index.json").exists());
    }

    fn registry_with(entries: &[(&str, &str)]) -> AgentRegistry {
        let mut registry = AgentRegistry::new();
        for (capability, name) in entries {
            registry
                .register(capability, name, Arc::new(create_market_agent))
                .unwrap_or_else(|_| unreachable!());
        }
        registry
    }

    fn halves() -> Vec<(String, u32)> {
        vec![("a".to_string(), 50), ("b".to_string(), 50)]
    }

    #[tokio::test]
    async fn test_duplicate_display_names_rejected_before_calls() {
        let (provider, orch) = orchestrator("{}");
        let registry = registry_with(&[("a", "Analyst"), ("b", "Analyst")]);

        let result = orch
            .run_weighted(&registry, "Acme", "deck", None, &halves())
            .await;

        match result {
            Err(AgentError::DuplicateAgent { name }) => assert_eq!(name, "Analyst"),
            other => unreachable!("unexpected: {other:?}"),
        }
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_duplicate_provider_names_rejected_before_calls() {
        let (provider, orch) = orchestrator("{}");
        let registry = registry_with(&[("a", "Market One"), ("b", "Market Two")]);

        let result = orch
            .run_weighted(&registry, "Acme", "deck", None, &halves())
            .await;

        assert!(matches!(result, Err(AgentError::DuplicateAgent { .. })));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }
}
