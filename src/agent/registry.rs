//! Explicit registry of pluggable analysis providers.
//!
//! Each capability (e.g. `market`) maps to a factory that builds an
//! [`AnalysisProvider`] from an [`AgentContext`]. Factories registered by
//! function name must follow the `create_<capability>_agent` convention;
//! the capability is derived from that name.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::config::AgentConfig;
use super::provider::LlmProvider;
use crate::error::AgentError;

/// An independent analysis provider.
#[async_trait]
pub trait AnalysisProvider: Send + Sync {
    /// Display name used in reports (e.g. `"Market Analyst"`).
    fn name(&self) -> &str;

    /// Analyzes a primary text (e.g. deck) with optional secondary text
    /// (e.g. website) in one service call.
    ///
    /// # Errors
    ///
    /// Returns transport or malformed-output errors from the service.
    async fn analyze_combined(
        &self,
        subject: &str,
        primary: &str,
        secondary: Option<&str>,
    ) -> Result<String, AgentError>;
}

/// Everything a factory may use to build its provider.
#[derive(Clone)]
pub struct AgentContext {
    /// Generation service.
    pub provider: Arc<dyn LlmProvider>,
    /// Engine configuration.
    pub config: AgentConfig,
}

impl fmt::Debug for AgentContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentContext")
            .field("provider", &self.provider.name())
            .finish_non_exhaustive()
    }
}

/// Factory building one provider.
pub type AgentFactory =
    Arc<dyn Fn(&AgentContext) -> Result<Box<dyn AnalysisProvider>, AgentError> + Send + Sync>;

/// A registered capability.
#[derive(Clone)]
pub struct AgentDescriptor {
    /// Display name.
    pub name: String,
    /// Capability identifier.
    pub capability_id: String,
    /// Factory building the provider.
    pub factory: AgentFactory,
}

impl fmt::Debug for AgentDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentDescriptor")
            .field("name", &self.name)
            .field("capability_id", &self.capability_id)
            .finish_non_exhaustive()
    }
}

/// Providers built by [`AgentRegistry::instantiate_all`].
pub struct ActiveAgents {
    /// Capability and provider, in request order.
    pub agents: Vec<(String, Box<dyn AnalysisProvider>)>,
    /// Capabilities whose factory failed, with the error.
    pub excluded: Vec<(String, AgentError)>,
}

impl fmt::Debug for ActiveAgents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let active: Vec<&str> = self.agents.iter().map(|(c, _)| c.as_str()).collect();
        f.debug_struct("ActiveAgents")
            .field("agents", &active)
            .field("excluded", &self.excluded)
            .finish()
    }
}

/// Derives the capability from a `create_<capability>_agent` factory name.
///
/// The capability must be non-empty lowercase ASCII letters, digits or `_`.
#[must_use]
pub fn capability_from_factory_name(factory_name: &str) -> Option<&str> {
    let capability = factory_name
        .strip_prefix("create_")?
        .strip_suffix("_agent")?;
    let valid = !capability.is_empty()
        && capability
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    valid.then_some(capability)
}

/// Capability → descriptor map.
#[derive(Debug, Clone, Default)]
pub struct AgentRegistry {
    entries: BTreeMap<String, AgentDescriptor>,
}

impl AgentRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a factory under an explicit capability.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Validation`] if the capability is blank or
    /// already registered.
    pub fn register(
        &mut self,
        capability: &str,
        name: &str,
        factory: AgentFactory,
    ) -> Result<(), AgentError> {
        let capability = capability.trim();
        if capability.is_empty() {
            return Err(AgentError::Validation {
                message: "agent capability must not be empty".to_string(),
            });
        }
        if self.entries.contains_key(capability) {
            return Err(AgentError::Validation {
                message: format!("capability '{capability}' is already registered"),
            });
        }
        debug!(capability, name, "registered agent");
        self.entries.insert(
            capability.to_string(),
            AgentDescriptor {
                name: name.to_string(),
                capability_id: capability.to_string(),
                factory,
            },
        );
        Ok(())
    }

    /// Registers a factory by its function name, deriving the capability.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::FactoryName`] if the name does not follow
    /// `create_<capability>_agent`, or the errors of [`Self::register`].
    pub fn register_factory(
        &mut self,
        factory_name: &str,
        name: &str,
        factory: AgentFactory,
    ) -> Result<String, AgentError> {
        let capability =
            capability_from_factory_name(factory_name).ok_or_else(|| AgentError::FactoryName {
                name: factory_name.to_string(),
            })?;
        self.register(capability, name, factory)?;
        Ok(capability.to_string())
    }

    /// All registered capabilities with their descriptors.
    #[must_use]
    pub const fn discover(&self) -> &BTreeMap<String, AgentDescriptor> {
        &self.entries
    }

    /// Registered capability identifiers, sorted.
    #[must_use]
    pub fn capabilities(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }

    /// Looks up a capability.
    #[must_use]
    pub fn get(&self, capability: &str) -> Option<&AgentDescriptor> {
        self.entries.get(capability)
    }

    /// Builds the provider for one capability.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::UnknownCapability`] for unregistered
    /// capabilities and [`AgentError::AgentFactory`] when the factory fails.
    pub fn instantiate(
        &self,
        capability: &str,
        context: &AgentContext,
    ) -> Result<Box<dyn AnalysisProvider>, AgentError> {
        let descriptor = self
            .get(capability)
            .ok_or_else(|| AgentError::UnknownCapability {
                capability: capability.to_string(),
            })?;
        (descriptor.factory)(context).map_err(|e| match e {
            AgentError::AgentFactory { .. } => e,
            other => AgentError::AgentFactory {
                capability: capability.to_string(),
                message: other.to_string(),
            },
        })
    }

    /// Builds providers for every requested capability.
    ///
    /// Never fails as a whole: capabilities that cannot be built are logged
    /// and returned in [`ActiveAgents::excluded`].
    #[must_use]
    pub fn instantiate_all<S: AsRef<str>>(
        &self,
        capabilities: &[S],
        context: &AgentContext,
    ) -> ActiveAgents {
        let mut agents = Vec::new();
        let mut excluded = Vec::new();
        for capability in capabilities.iter().map(AsRef::as_ref) {
            match self.instantiate(capability, context) {
                Ok(agent) => agents.push((capability.to_string(), agent)),
                Err(e) => {
                    warn!(capability, error = %e, "excluding agent");
                    excluded.push((capability.to_string(), e));
                }
            }
        }
        ActiveAgents { agents, excluded }
    }
}
