//! Weighted synthesis of several agents' analyses into one report.
//!
//! Weights are validated before any service call. The narrative comes from
//! one retried call; the header and footer are attached from the report's
//! own fields.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::Utc;
use regex::Regex;
use tracing::{debug, error, info};

use super::config::AgentConfig;
use super::pacer::ServiceGate;
use super::prompt::{WeightedSection, build_synthesis_prompt};
use super::provider::LlmProvider;
use super::retry::RetryOutcome;
use super::traits::Agent;
use crate::core::{Contribution, FinalReport, ReportStatus};
use crate::error::AgentError;

/// Appended to an analysis cut down to the input budget.
pub const TRUNCATION_MARKER: &str = "\n\n[... analysis truncated ...]";

/// One agent's analysis with its weight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeightedInput {
    /// Agent display name.
    pub agent_name: String,
    /// Weight in percent (0–100).
    pub weight: u32,
    /// Full analysis text.
    pub analysis_text: String,
}

impl WeightedInput {
    /// Creates a weighted input.
    #[must_use]
    pub fn new(agent_name: impl Into<String>, weight: u32, analysis_text: impl Into<String>) -> Self {
        Self {
            agent_name: agent_name.into(),
            weight,
            analysis_text: analysis_text.into(),
        }
    }
}

/// Checks a set of `(name, weight)` entries.
///
/// At least one entry, unique names, each weight at most 100 and a total of
/// exactly 100.
///
/// # Errors
///
/// Returns [`AgentError::Validation`], [`AgentError::DuplicateAgent`] or
/// [`AgentError::WeightSum`].
pub fn validate_weights<S: AsRef<str>>(entries: &[(S, u32)]) -> Result<(), AgentError> {
    if entries.is_empty() {
        return Err(AgentError::Validation {
            message: "at least one weighted agent is required".to_string(),
        });
    }

    let mut seen = HashSet::new();
    for (name, weight) in entries {
        let name = name.as_ref();
        if !seen.insert(name) {
            return Err(AgentError::DuplicateAgent {
                name: name.to_string(),
            });
        }
        if *weight > 100 {
            return Err(AgentError::Validation {
                message: format!("weight for '{name}' must be between 0 and 100 (got {weight})"),
            });
        }
    }

    let actual: u32 = entries.iter().map(|(_, w)| *w).sum();
    if actual != 100 {
        return Err(AgentError::WeightSum { actual });
    }
    Ok(())
}

/// Validates synthesis inputs by name and weight.
///
/// # Errors
///
/// See [`validate_weights`].
pub fn validate_inputs(inputs: &[WeightedInput]) -> Result<(), AgentError> {
    let entries: Vec<(&str, u32)> = inputs
        .iter()
        .map(|i| (i.agent_name.as_str(), i.weight))
        .collect();
    validate_weights(&entries)
}

/// Scales weights proportionally so they sum to 100.
///
/// Uses the largest-remainder method; ties go to the earlier entry. All-zero
/// weights are split equally.
#[must_use]
pub fn rebalance_weights(weights: &[u32]) -> Vec<u32> {
    if weights.is_empty() {
        return Vec::new();
    }
    let total: u64 = weights.iter().map(|w| u64::from(*w)).sum();
    let shares: Vec<u64> = if total == 0 {
        vec![1; weights.len()]
    } else {
        weights.iter().map(|w| u64::from(*w)).collect()
    };
    let denominator: u64 = shares.iter().sum();

    let mut result: Vec<u64> = shares.iter().map(|s| s * 100 / denominator).collect();
    let assigned: u64 = result.iter().sum();
    let mut order: Vec<usize> = (0..shares.len()).collect();
    order.sort_by(|&a, &b| {
        let ra = shares[a] * 100 % denominator;
        let rb = shares[b] * 100 % denominator;
        rb.cmp(&ra).then(a.cmp(&b))
    });
    for &i in order.iter().take(usize::try_from(100 - assigned).unwrap_or(0)) {
        result[i] += 1;
    }
    result
        .into_iter()
        .map(|w| u32::try_from(w).unwrap_or(100))
        .collect()
}

/// Truncates `text` to `budget` characters, appending a marker when cut.
#[must_use]
pub fn truncate_to_budget(text: &str, budget: usize) -> String {
    if text.chars().count() <= budget {
        return text.to_string();
    }
    let mut out: String = text.chars().take(budget).collect();
    out.push_str(TRUNCATION_MARKER);
    out
}

/// Removes a leading title heading naming the subject or the report.
///
/// Models often repeat the title that the fixed header already carries.
#[must_use]
pub fn strip_leading_title(narrative: &str, subject: &str) -> String {
    let pattern = format!(
        r"(?i)\A\s*#{{1,6}}[ \t]+[^\n]*(?:{}|analysis report|investment memo)[^\n]*(?:\n+|\z)",
        regex::escape(subject.trim())
    );
    match Regex::new(&pattern) {
        Ok(re) if !subject.trim().is_empty() => re.replace(narrative, "").trim().to_string(),
        _ => narrative.trim().to_string(),
    }
}

/// Agent combining weighted analyses into one narrative.
pub struct WeightedSynthesizer {
    model: String,
    max_tokens: u32,
    input_budget: usize,
    system_prompt: String,
}

impl WeightedSynthesizer {
    /// Creates a synthesizer from the engine configuration.
    #[must_use]
    pub fn new(config: &AgentConfig, system_prompt: String) -> Self {
        Self {
            model: config.synthesizer_model.clone(),
            max_tokens: config.synthesizer_max_tokens,
            input_budget: config.synthesis_input_budget,
            system_prompt,
        }
    }

    /// Per-agent character budget in the request.
    #[must_use]
    pub const fn input_budget(&self) -> usize {
        self.input_budget
    }

    /// Synthesizes a report from weighted inputs.
    ///
    /// Inputs are validated before anything is sent. If the service call
    /// exhausts its retries the report is returned with a failure status.
    ///
    /// # Errors
    ///
    /// Returns only validation errors (see [`validate_weights`]).
    pub async fn synthesize(
        &self,
        provider: &dyn LlmProvider,
        gate: &ServiceGate,
        subject: &str,
        inputs: &[WeightedInput],
    ) -> Result<FinalReport, AgentError> {
        validate_inputs(inputs)?;

        let truncated: Vec<String> = inputs
            .iter()
            .map(|i| truncate_to_budget(&i.analysis_text, self.input_budget))
            .collect();
        let sections: Vec<WeightedSection<'_>> = inputs
            .iter()
            .zip(&truncated)
            .map(|(input, text)| WeightedSection {
                agent_name: &input.agent_name,
                weight: input.weight,
                text,
            })
            .collect();
        let prompt = build_synthesis_prompt(subject, &sections);
        let user_msg = prompt.as_str();

        let contributions: Vec<Contribution> = inputs
            .iter()
            .map(|i| Contribution {
                agent_name: i.agent_name.clone(),
                weight: i.weight,
                input_characters: i.analysis_text.chars().count(),
            })
            .collect();
        let total_input_characters = contributions.iter().map(|c| c.input_characters).sum();
        debug!(
            subject,
            agents = inputs.len(),
            total_input_characters,
            "synthesizing weighted report"
        );

        let outcome = gate
            .call("synthesis", move |_attempt| async move {
                let response = self.execute(provider, user_msg).await?;
                let narrative = strip_leading_title(&response.content, subject);
                if narrative.is_empty() {
                    return Err(AgentError::EmptyResponse {
                        operation: "synthesis".to_string(),
                    });
                }
                Ok(narrative)
            })
            .await;
        let (narrative, status) = match outcome {
            RetryOutcome::Success { value, attempts } => {
                info!(subject, attempts, "synthesis complete");
                (value, ReportStatus::Success)
            }
            RetryOutcome::Failure { error: e, attempts } => {
                error!(subject, attempts, error = %e, "synthesis failed");
                (
                    String::new(),
                    ReportStatus::Failure {
                        error: e.to_string(),
                    },
                )
            }
        };

        Ok(FinalReport {
            subject: subject.to_string(),
            narrative,
            contributions,
            generated_at: Utc::now(),
            total_input_characters,
            status,
        })
    }
}

#[async_trait]
impl Agent for WeightedSynthesizer {
    fn name(&self) -> &str {
        "synthesizer"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    fn temperature(&self) -> f32 {
        0.1
    }

    fn max_tokens(&self) -> u32 {
        self.max_tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::message::{ChatRequest, ChatResponse, TokenUsage};
    use crate::agent::pacer::Pacer;
    use crate::agent::retry::{RetryExecutor, RetryPolicy};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;
    use test_case::test_case;

    struct Counting {
        reply: Result<String, u16>,
        calls: AtomicU32,
        last_user: Mutex<String>,
    }

    impl Counting {
        fn replying(text: &str) -> Self {
            Self {
                reply: Ok(text.to_string()),
                calls: AtomicU32::new(0),
                last_user: Mutex::new(String::new()),
            }
        }

        fn failing(status: u16) -> Self {
            Self {
                reply: Err(status),
                calls: AtomicU32::new(0),
                last_user: Mutex::new(String::new()),
            }
        }
    }

    #[async_trait]
    impl LlmProvider for Counting {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, AgentError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Ok(mut last) = self.last_user.lock() {
                last.clone_from(&request.messages[1].content);
            }
            match &self.reply {
                Ok(text) => Ok(ChatResponse {
                    content: text.clone(),
                    usage: TokenUsage::default(),
                    finish_reason: Some("stop".to_string()),
                }),
                Err(status) => Err(AgentError::ApiRequest {
                    message: format!("HTTP {status}"),
                    status: Some(*status),
                }),
            }
        }
    }

    fn gate() -> ServiceGate {
        ServiceGate::new(
            RetryExecutor::new(RetryPolicy::new(3, Duration::ZERO)),
            Pacer::new(1, Duration::ZERO),
        )
    }

    fn synthesizer(budget: usize) -> WeightedSynthesizer {
        let config = AgentConfig::builder()
            .api_key("k")
            .synthesis_input_budget(budget)
            .build()
            .unwrap_or_else(|_| unreachable!());
        WeightedSynthesizer::new(&config, "sys".to_string())
    }

    fn inputs(weights: &[u32]) -> Vec<WeightedInput> {
        weights
            .iter()
            .enumerate()
            .map(|(i, w)| WeightedInput::new(format!("Agent {i}"), *w, format!("analysis {i}")))
            .collect()
    }

    #[test_case(&[40, 35, 25] ; "sums to 100")]
    #[test_case(&[100] ; "single agent")]
    #[test_case(&[0, 100] ; "zero weight allowed")]
    fn test_validate_accepts(weights: &[u32]) {
        assert!(validate_inputs(&inputs(weights)).is_ok());
    }

    #[test_case(&[60, 30, 5], 95 ; "under")]
    #[test_case(&[60, 50], 110 ; "over")]
    fn test_validate_rejects_sum(weights: &[u32], expected: u32) {
        match validate_inputs(&inputs(weights)) {
            Err(AgentError::WeightSum { actual }) => assert_eq!(actual, expected),
            other => unreachable!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_validate_rejects_empty_duplicate_and_out_of_range() {
        assert!(matches!(
            validate_weights::<&str>(&[]),
            Err(AgentError::Validation { .. })
        ));
        assert!(matches!(
            validate_weights(&[("team", 50), ("team", 50)]),
            Err(AgentError::DuplicateAgent { .. })
        ));
        assert!(matches!(
            validate_weights(&[("team", 150)]),
            Err(AgentError::Validation { .. })
        ));
    }

    #[test_case(&[40, 25], &[62, 38] ; "proportional")]
    #[test_case(&[1, 1, 1], &[34, 33, 33] ; "ties to earlier")]
    #[test_case(&[0, 0], &[50, 50] ; "all zero")]
    #[test_case(&[30, 70], &[30, 70] ; "already balanced")]
    #[test_case(&[], &[] ; "empty")]
    fn test_rebalance_weights(weights: &[u32], expected: &[u32]) {
        let rebalanced = rebalance_weights(weights);
        assert_eq!(rebalanced, expected);
        if !weights.is_empty() {
            assert_eq!(rebalanced.iter().sum::<u32>(), 100);
        }
    }

    #[test]
    fn test_truncate_to_budget() {
        assert_eq!(truncate_to_budget("short", 10), "short");
        let cut = truncate_to_budget("abcdefghij", 4);
        assert!(cut.starts_with("abcd"));
        assert!(cut.ends_with(TRUNCATION_MARKER));
    }

    #[test_case("# Acme Corp: Investment Analysis\n\nBody", "Body" ; "subject heading")]
    #[test_case("## Weighted Analysis Report\nBody", "Body" ; "report heading")]
    #[test_case("## Executive Summary\nBody", "## Executive Summary\nBody" ; "section heading kept")]
    #[test_case("Body mentioning Acme Corp", "Body mentioning Acme Corp" ; "no heading")]
    fn test_strip_leading_title(narrative: &str, expected: &str) {
        assert_eq!(strip_leading_title(narrative, "Acme Corp"), expected);
    }

    #[tokio::test]
    async fn test_invalid_weights_make_no_calls() {
        let provider = Counting::replying("narrative");
        let result = synthesizer(100)
            .synthesize(&provider, &gate(), "Acme", &inputs(&[60, 30, 5]))
            .await;
        assert!(matches!(result, Err(AgentError::WeightSum { actual: 95 })));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_synthesize_builds_report() {
        let provider = Counting::replying("# Acme\n\nStrong team, large market.");
        let mut weighted = inputs(&[40, 35, 25]);
        weighted[0].analysis_text = "x".repeat(30);

        let report = synthesizer(10)
            .synthesize(&provider, &gate(), "Acme", &weighted)
            .await
            .unwrap_or_else(|_| unreachable!());

        assert!(report.is_success());
        assert_eq!(report.narrative, "Strong team, large market.");
        assert_eq!(report.contributions[0].input_characters, 30);
        assert_eq!(report.total_input_characters, 30 + 10 + 10);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);

        let sent = provider
            .last_user
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default();
        assert!(sent.contains(r#"weight="40%""#));
        assert!(sent.contains(&format!("{}{TRUNCATION_MARKER}", "x".repeat(10))));
        assert!(!sent.contains(&"x".repeat(11)));

        let rendered = report.render();
        assert!(rendered.starts_with("# Weighted Analysis Report: Acme"));
        assert!(rendered.contains("- Agent 1 (35%)"));
        assert!(rendered.contains("Strong team, large market."));
    }

    #[tokio::test]
    async fn test_exhausted_retries_give_failure_report() {
        let provider = Counting::failing(503);
        let report = synthesizer(100)
            .synthesize(&provider, &gate(), "Acme", &inputs(&[50, 50]))
            .await
            .unwrap_or_else(|_| unreachable!());
        assert!(!report.is_success());
        assert!(report.error().is_some_and(|e| e.contains("503")));
        assert!(report.narrative.is_empty());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
    }

    #[test_case("   " ; "blank reply")]
    #[test_case("# Acme: Weighted Analysis Report\n\n" ; "title only")]
    #[tokio::test]
    async fn test_empty_narrative_is_retried_then_fails(reply: &str) {
        let provider = Counting::replying(reply);
        let report = synthesizer(100)
            .synthesize(&provider, &gate(), "Acme", &inputs(&[50, 50]))
            .await
            .unwrap_or_else(|_| unreachable!());
        assert!(!report.is_success());
        assert!(report.error().is_some_and(|e| e.contains("synthesis")));
        assert!(report.narrative.is_empty());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
    }
}
