//! Final weighted-synthesis report.
//!
//! The header and footer are rendered from the report's own fields, never
//! from model output, so the framing is reproducible for a given report.

use std::fmt::Write;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// One agent's share of a synthesized report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Contribution {
    /// Agent display name.
    pub agent_name: String,
    /// Weight (0–100) the agent carried in the synthesis.
    pub weight: u32,
    /// Characters of the agent's analysis (before truncation).
    pub input_characters: usize,
}

/// Whether synthesis produced a narrative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ReportStatus {
    /// The narrative was generated.
    Success,
    /// Generation failed after all retries.
    Failure {
        /// Last error message.
        error: String,
    },
}

/// A synthesized report. Created once per synthesis call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FinalReport {
    /// Subject of the report (e.g. company name).
    pub subject: String,
    /// Synthesized narrative (empty on failure).
    pub narrative: String,
    /// Contributing agents with weights and input sizes.
    pub contributions: Vec<Contribution>,
    /// When the report was generated.
    pub generated_at: DateTime<Utc>,
    /// Sum of all agents' input characters.
    pub total_input_characters: usize,
    /// Success / failure tag.
    #[serde(flatten)]
    pub status: ReportStatus,
}

impl FinalReport {
    /// Returns `true` if a narrative was generated.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.status, ReportStatus::Success)
    }

    /// Failure message, if synthesis failed.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        match &self.status {
            ReportStatus::Success => None,
            ReportStatus::Failure { error } => Some(error),
        }
    }

    /// Names of the contributing agents.
    #[must_use]
    pub fn contributing_agents(&self) -> Vec<&str> {
        self.contributions
            .iter()
            .map(|c| c.agent_name.as_str())
            .collect()
    }

    /// Title line used in the header.
    #[must_use]
    pub fn title(&self) -> String {
        format!("Weighted Analysis Report: {}", self.subject)
    }

    /// Timestamp as rendered in header and footer.
    #[must_use]
    pub fn timestamp(&self) -> String {
        self.generated_at.format("%Y-%m-%d %H:%M:%S UTC").to_string()
    }

    /// Fixed header: title, timestamp, agents and weights.
    #[must_use]
    pub fn render_header(&self) -> String {
        let mut out = format!("# {}\n\n", self.title());
        let _ = writeln!(out, "**Generated:** {}", self.timestamp());
        out.push_str("**Contributing agents:**\n");
        for c in &self.contributions {
            let _ = writeln!(out, "- {} ({}%)", c.agent_name, c.weight);
        }
        out.push_str("\n---\n");
        out
    }

    /// Fixed footer: per-agent input sizes and generation time.
    #[must_use]
    pub fn render_footer(&self) -> String {
        let mut out = String::from("---\n\n## Synthesis Metadata\n\n");
        for c in &self.contributions {
            let _ = writeln!(
                out,
                "- {}: {} characters (weight {}%)",
                c.agent_name, c.input_characters, c.weight
            );
        }
        let _ = writeln!(
            out,
            "- Total input characters: {}",
            self.total_input_characters
        );
        let _ = writeln!(out, "- Generated at: {}", self.timestamp());
        out
    }

    /// Full report text: header, narrative (or failure notice), footer.
    #[must_use]
    pub fn render(&self) -> String {
        let body = match &self.status {
            ReportStatus::Success => self.narrative.trim().to_string(),
            ReportStatus::Failure { error } => format!("**Synthesis failed:** {error}"),
        };
        format!(
            "{}\n{}\n\n{}",
            self.render_header(),
            body,
            self.render_footer()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn report(status: ReportStatus) -> FinalReport {
        FinalReport {
            subject: "Acme".to_string(),
            narrative: "Acme is promising.".to_string(),
            contributions: vec![
                Contribution {
                    agent_name: "Market Analyst".to_string(),
                    weight: 60,
                    input_characters: 1200,
                },
                Contribution {
                    agent_name: "Team Analyst".to_string(),
                    weight: 40,
                    input_characters: 800,
                },
            ],
            generated_at: Utc
                .with_ymd_and_hms(2026, 3, 1, 12, 0, 0)
                .single()
                .unwrap_or_else(|| unreachable!()),
            total_input_characters: 2000,
            status,
        }
    }

    #[test]
    fn test_render_is_deterministic() {
        let r = report(ReportStatus::Success);
        assert_eq!(r.render(), r.render());
        let text = r.render();
        assert!(text.starts_with("# Weighted Analysis Report: Acme\n"));
        assert!(text.contains("- Market Analyst (60%)"));
        assert!(text.contains("Acme is promising."));
        assert!(text.contains("- Team Analyst: 800 characters (weight 40%)"));
        assert!(text.contains("- Total input characters: 2000"));
        assert!(text.contains("2026-03-01 12:00:00 UTC"));
    }

    #[test]
    fn test_failure_report() {
        let r = report(ReportStatus::Failure {
            error: "quota exceeded".to_string(),
        });
        assert!(!r.is_success());
        assert_eq!(r.error(), Some("quota exceeded"));
        assert!(r.render().contains("**Synthesis failed:** quota exceeded"));
    }

    #[test]
    fn test_status_serializes_flat() {
        let json = serde_json::to_value(report(ReportStatus::Success)).unwrap_or_default();
        assert_eq!(json["status"], "success");
        assert_eq!(json["contributions"][0]["weight"], 60);
    }

    #[test]
    fn test_contributing_agents() {
        let r = report(ReportStatus::Success);
        assert_eq!(r.contributing_agents(), vec!["Market Analyst", "Team Analyst"]);
    }
}
