//! Built-in focus analysts.
//!
//! Each analyst is an LLM agent with its own system prompt, registered in
//! the [`AgentRegistry`] through a `create_<capability>_agent` factory.

use std::sync::Arc;

use async_trait::async_trait;

use super::prompt::build_focus_prompt;
use super::provider::LlmProvider;
use super::registry::{AgentContext, AgentRegistry, AnalysisProvider};
use super::traits::Agent;
use crate::error::AgentError;

const MARKET_PROMPT: &str = r"You are a market analyst at a venture fund. From the company material in <primary> (and <secondary> if present), assess the market: size and growth with any figures given, target segments, timing, competitors and the company's positioning against them. Quote figures exactly. Flag claims that are not backed by evidence. Write concise markdown.";

const TEAM_PROMPT: &str = r"You are a venture analyst assessing founding teams. From the company material in <primary> (and <secondary> if present), describe the founders and key hires, their relevant experience, gaps in the team and any signals about execution ability. Name people exactly as written. Flag missing information. Write concise markdown.";

const PRODUCT_PROMPT: &str = r"You are a product and technology analyst. From the company material in <primary> (and <secondary> if present), describe the problem, the product, how it works, the technology behind it, defensibility and product maturity. Flag claims that are not backed by evidence. Write concise markdown.";

const FINANCIAL_PROMPT: &str = r"You are a financial analyst at a venture fund. From the company material in <primary> (and <secondary> if present), extract revenue, growth, unit economics, burn, runway, funding history and the current raise. Quote every figure exactly with its period. State plainly which numbers are missing. Write concise markdown.";

const RISK_PROMPT: &str = r"You are a risk analyst at a venture fund. From the company material in <primary> (and <secondary> if present), list the main investment risks: market, execution, technology, regulatory, financial and competitive. Note inconsistencies between sources. Rank risks by severity. Write concise markdown.";

/// An LLM analyst with a fixed focus.
pub struct FocusAgent {
    display_name: String,
    model: String,
    max_tokens: u32,
    system_prompt: String,
    provider: Arc<dyn LlmProvider>,
}

impl FocusAgent {
    /// Creates a focus analyst from a factory context.
    #[must_use]
    pub fn new(context: &AgentContext, display_name: &str, system_prompt: &str) -> Self {
        Self {
            display_name: display_name.to_string(),
            model: context.config.agent_model.clone(),
            max_tokens: context.config.agent_max_tokens,
            system_prompt: system_prompt.to_string(),
            provider: Arc::clone(&context.provider),
        }
    }
}

#[async_trait]
impl Agent for FocusAgent {
    fn name(&self) -> &str {
        &self.display_name
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    fn temperature(&self) -> f32 {
        0.2
    }

    fn max_tokens(&self) -> u32 {
        self.max_tokens
    }
}

#[async_trait]
impl AnalysisProvider for FocusAgent {
    fn name(&self) -> &str {
        &self.display_name
    }

    async fn analyze_combined(
        &self,
        subject: &str,
        primary: &str,
        secondary: Option<&str>,
    ) -> Result<String, AgentError> {
        let user_msg = build_focus_prompt(subject, primary, secondary);
        let response = self.execute(&*self.provider, &user_msg).await?;
        let text = response.content.trim();
        if text.is_empty() {
            return Err(AgentError::EmptyResponse {
                operation: self.display_name.clone(),
            });
        }
        Ok(text.to_string())
    }
}

/// Factory for the `market` capability.
///
/// # Errors
///
/// Never fails; the signature matches [`AgentFactory`](super::registry::AgentFactory).
pub fn create_market_agent(context: &AgentContext) -> Result<Box<dyn AnalysisProvider>, AgentError> {
    Ok(Box::new(FocusAgent::new(context, "Market Analyst", MARKET_PROMPT)))
}

/// Factory for the `team` capability.
///
/// # Errors
///
/// Never fails.
pub fn create_team_agent(context: &AgentContext) -> Result<Box<dyn AnalysisProvider>, AgentError> {
    Ok(Box::new(FocusAgent::new(context, "Team Analyst", TEAM_PROMPT)))
}

/// Factory for the `product` capability.
///
/// # Errors
///
/// Never fails.
pub fn create_product_agent(
    context: &AgentContext,
) -> Result<Box<dyn AnalysisProvider>, AgentError> {
    Ok(Box::new(FocusAgent::new(
        context,
        "Product Analyst",
        PRODUCT_PROMPT,
    )))
}

/// Factory for the `financial` capability.
///
/// # Errors
///
/// Never fails.
pub fn create_financial_agent(
    context: &AgentContext,
) -> Result<Box<dyn AnalysisProvider>, AgentError> {
    Ok(Box::new(FocusAgent::new(
        context,
        "Financial Analyst",
        FINANCIAL_PROMPT,
    )))
}

/// Factory for the `risk` capability.
///
/// # Errors
///
/// Never fails.
pub fn create_risk_agent(context: &AgentContext) -> Result<Box<dyn AnalysisProvider>, AgentError> {
    Ok(Box::new(FocusAgent::new(context, "Risk Analyst", RISK_PROMPT)))
}

/// Registry with every built-in analyst.
///
/// # Errors
///
/// Returns an error only if two built-ins collide, which would be a
/// programming error.
pub fn builtin_registry() -> Result<AgentRegistry, AgentError> {
    let mut registry = AgentRegistry::new();
    registry.register_factory(
        "create_market_agent",
        "Market Analyst",
        Arc::new(create_market_agent),
    )?;
    registry.register_factory("create_team_agent", "Team Analyst", Arc::new(create_team_agent))?;
    registry.register_factory(
        "create_product_agent",
        "Product Analyst",
        Arc::new(create_product_agent),
    )?;
    registry.register_factory(
        "create_financial_agent",
        "Financial Analyst",
        Arc::new(create_financial_agent),
    )?;
    registry.register_factory("create_risk_agent", "Risk Analyst", Arc::new(create_risk_agent))?;
    Ok(registry)
}
