//! End-to-end pipeline tests against a scripted provider.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use dealscope::agent::{
    AgentConfig, ChatRequest, ChatResponse, LlmProvider, Orchestrator, PromptSet, TokenUsage,
    builtin_registry,
};
use dealscope::core::{AnalysisSchema, Document, FieldValue, Page};
use dealscope::error::AgentError;
use dealscope::io::ArtifactStore;

type Handler = Box<dyn Fn(&str, &str) -> Result<String, AgentError> + Send + Sync>;

/// Provider answering from `(system, user)` and recording every user message.
struct Scripted {
    handler: Handler,
    calls: AtomicU32,
    users: Mutex<Vec<String>>,
}

impl Scripted {
    fn new(handler: impl Fn(&str, &str) -> Result<String, AgentError> + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            handler: Box::new(handler),
            calls: AtomicU32::new(0),
            users: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    fn users(&self) -> Vec<String> {
        self.users.lock().map(|u| u.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl LlmProvider for Scripted {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, AgentError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let system = request.messages[0].content.as_str();
        let user = request.messages[1].content.as_str();
        if let Ok(mut users) = self.users.lock() {
            users.push(user.to_string());
        }
        (self.handler)(system, user).map(|content| ChatResponse {
            content,
            usage: TokenUsage::default(),
            finish_reason: Some("stop".to_string()),
        })
    }
}

fn config() -> AgentConfig {
    AgentConfig::builder()
        .api_key("test-key")
        .max_attempts(3)
        .retry_base_delay(Duration::ZERO)
        .request_delay(Duration::ZERO)
        .max_segments(20)
        .build()
        .unwrap_or_else(|_| unreachable!())
}

fn orchestrator(provider: Arc<Scripted>) -> Orchestrator {
    Orchestrator::new(provider, config()).with_prompts(PromptSet::defaults())
}

fn section_number(user: &str) -> usize {
    user.split("<section number=\"")
        .nth(1)
        .and_then(|rest| rest.split('"').next())
        .and_then(|n| n.parse().ok())
        .unwrap_or(0)
}

#[tokio::test]
async fn chunked_document_with_malformed_chunks_reports_partial_failure() {
    let provider = Scripted::new(|_system, user| {
        let n = section_number(user);
        if n == 4 || n == 9 {
            Ok("not json at all".to_string())
        } else {
            Ok(format!(
                r#"{{"risk_level": "low", "industries": ["fintech"], "key_facts": ["fact {n}"]}}"#
            ))
        }
    });
    let document = Document::from_text("acme", "abcdefghij".repeat(1200));

    let run = orchestrator(provider.clone())
        .analyze_document(&document, &AnalysisSchema::company_default())
        .await
        .unwrap_or_else(|_| unreachable!());

    assert_eq!(run.units_total, 20);
    assert_eq!(run.summary(), "2 failed / 20 total");
    let failed: Vec<&str> = run.failures.iter().map(|f| f.unit.as_str()).collect();
    assert_eq!(failed, vec!["chunk 4", "chunk 9"]);
    assert_eq!(
        run.failures[0].raw_excerpt.as_deref(),
        Some("not json at all")
    );

    // 18 successes + 2 units × 3 attempts
    assert_eq!(provider.calls(), 24);

    assert_eq!(run.analysis.contributing, 18);
    assert_eq!(run.analysis.skipped, 2);
    assert_eq!(
        run.analysis.get("risk_level").and_then(FieldValue::as_scalar),
        Some("low")
    );
    let facts = run
        .analysis
        .get("key_facts")
        .map(FieldValue::items)
        .unwrap_or_default();
    assert_eq!(facts.len(), 18);
    assert_eq!(facts[..4], ["fact 1", "fact 2", "fact 3", "fact 5"]);
}

#[tokio::test]
async fn every_chunk_failing_is_a_total_failure() {
    let provider = Scripted::new(|_, _| {
        Err(AgentError::ApiRequest {
            message: "HTTP 503".to_string(),
            status: Some(503),
        })
    });
    let document = Document::from_text("acme", "x".repeat(600));

    let result = orchestrator(provider.clone())
        .analyze_document(&document, &AnalysisSchema::company_default())
        .await;

    match result {
        Err(AgentError::AllUnitsFailed { stage, total, errors }) => {
            assert_eq!(stage, "chunk_analysis");
            assert_eq!(total, 2);
            assert_eq!(errors.len(), 2);
        }
        other => unreachable!("unexpected: {other:?}"),
    }
    assert_eq!(provider.calls(), 6);
}

#[tokio::test]
async fn topic_extraction_sends_only_valid_locations() {
    let provider = Scripted::new(|system, _user| {
        if system.contains("table of contents") {
            Ok(r#"{"Team": [0, 3, 99]}"#.to_string())
        } else {
            Ok("- Jane Doe, CEO".to_string())
        }
    });
    let pages = (1..=5)
        .map(|i| Page {
            text: Some(format!("slide {i} text")),
            image: None,
        })
        .collect();
    let document = Document::from_pages("deck", pages);
    let dir = tempfile::tempdir().unwrap_or_else(|_| unreachable!());

    let run = orchestrator(provider.clone())
        .with_store(ArtifactStore::new(dir.path()))
        .extract_topics(&document)
        .await
        .unwrap_or_else(|_| unreachable!());

    assert_eq!(run.summary(), "0 failed / 1 total");
    assert_eq!(run.sections[0].locations, vec![3]);
    assert_eq!(run.sections[0].render(), "## Team\n\n- Jane Doe, CEO");
    assert_eq!(
        run.analysis.get("sections").map(FieldValue::items),
        Some(vec!["## Team\n\n- Jane Doe, CEO"])
    );

    let users = provider.users();
    assert_eq!(users.len(), 2);
    let extraction = &users[1];
    assert!(extraction.contains("slide 3 text"));
    assert!(!extraction.contains("slide 1 text"));
    assert!(!extraction.contains("slide 5 text"));

    let persisted = std::fs::read_to_string(dir.path().join("deck.topic_index.json"))
        .unwrap_or_else(|_| unreachable!());
    assert!(persisted.contains("99"));
}

#[tokio::test]
async fn topic_index_failure_aborts_before_extraction() {
    let provider = Scripted::new(|_, _| Ok("Team is on page 2".to_string()));
    let document = Document::from_text("memo", "y".repeat(800));

    let result = orchestrator(provider.clone()).extract_topics(&document).await;

    assert!(matches!(
        result,
        Err(AgentError::StageFailed {
            stage: "topic_index",
            ..
        })
    ));
    assert_eq!(provider.calls(), 3);
}

fn selections(pairs: &[(&str, u32)]) -> Vec<(String, u32)> {
    pairs.iter().map(|(c, w)| ((*c).to_string(), *w)).collect()
}

#[tokio::test]
async fn weighted_run_rejects_bad_weights_without_calls() {
    let provider = Scripted::new(|_, _| Ok("text".to_string()));
    let registry = builtin_registry().unwrap_or_else(|_| unreachable!());

    let result = orchestrator(provider.clone())
        .run_weighted(
            &registry,
            "Acme",
            "deck",
            None,
            &selections(&[("market", 60), ("team", 30), ("risk", 5)]),
        )
        .await;

    assert!(matches!(result, Err(AgentError::WeightSum { actual: 95 })));
    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn weighted_run_rebalances_over_surviving_agents() {
    let provider = Scripted::new(|system, _user| {
        if system.contains("risk analyst") {
            Err(AgentError::ApiRequest {
                message: "HTTP 500".to_string(),
                status: Some(500),
            })
        } else if system.contains("senior investment partner") {
            Ok("# Acme: Weighted Analysis Report\n\nBack the team.".to_string())
        } else {
            Ok("Solid.".to_string())
        }
    });
    let registry = builtin_registry().unwrap_or_else(|_| unreachable!());

    let run = orchestrator(provider.clone())
        .run_weighted(
            &registry,
            "Acme",
            "deck text",
            Some("site text"),
            &selections(&[("market", 40), ("team", 35), ("risk", 25)]),
        )
        .await
        .unwrap_or_else(|_| unreachable!());

    assert_eq!(run.summary(), "1 failed / 3 total");
    assert_eq!(run.failures[0].unit, "agent risk");
    assert!(run.report.is_success());
    assert_eq!(run.report.narrative, "Back the team.");

    let weights: Vec<(&str, u32)> = run
        .report
        .contributions
        .iter()
        .map(|c| (c.agent_name.as_str(), c.weight))
        .collect();
    assert_eq!(weights, vec![("Market Analyst", 53), ("Team Analyst", 47)]);

    // market + team + risk × 3 + synthesis
    assert_eq!(provider.calls(), 6);
    let synthesis = provider.users().pop().unwrap_or_default();
    assert!(synthesis.contains(r#"weight="53%""#));
    assert!(synthesis.contains(r#"weight="47%""#));
}

#[tokio::test]
async fn weighted_run_with_no_surviving_agent_fails() {
    let provider = Scripted::new(|_, _| Ok("   ".to_string()));
    let registry = builtin_registry().unwrap_or_else(|_| unreachable!());

    let result = orchestrator(provider.clone())
        .run_weighted(
            &registry,
            "Acme",
            "deck",
            None,
            &selections(&[("market", 50), ("team", 50)]),
        )
        .await;

    assert!(matches!(
        result,
        Err(AgentError::AllUnitsFailed {
            stage: "agent_analysis",
            total: 2,
            ..
        })
    ));
}
