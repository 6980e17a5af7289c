//! LLM abstraction.
//!
//! The core treats any provider behind this trait as opaque: `analyze`
//! decides what to do, `synthesize` renders tool results. Concrete
//! adapters live in `providers`; tests inject stubs.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::OrchestrationError;
use crate::models::{OrchestrationPreferences, Tool};
use crate::sessions::ConversationContext;

/// Outcome of one `analyze` call.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub response: String,
    pub tokens_used: u32,
    pub provider_id: String,
}

#[async_trait]
pub trait Reasoner: Send + Sync + std::fmt::Debug {
    /// Stable provider id, used for selection and metadata.
    fn id(&self) -> &str;

    async fn analyze(
        &self,
        system_prompt: &str,
        user_message: &str,
        history: &str,
        tools: &[Tool],
        preferences: &OrchestrationPreferences,
    ) -> Result<Analysis, OrchestrationError>;

    async fn synthesize(
        &self,
        prompt: &str,
        ctx: &ConversationContext,
        preferences: &OrchestrationPreferences,
    ) -> Result<String, OrchestrationError>;
}

/// Configured reasoners keyed by provider id, with a default.
pub struct ReasonerRegistry {
    reasoners: HashMap<String, Arc<dyn Reasoner>>,
    default_id: String,
}

impl ReasonerRegistry {
    pub fn new(default_id: impl Into<String>) -> Self {
        Self {
            reasoners: HashMap::new(),
            default_id: default_id.into(),
        }
    }

    pub fn register(&mut self, reasoner: Arc<dyn Reasoner>) {
        self.reasoners.insert(reasoner.id().to_string(), reasoner);
    }

    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.reasoners.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn is_empty(&self) -> bool {
        self.reasoners.is_empty()
    }

    /// Pick the reasoner the request asked for, or the configured default.
    pub fn select(
        &self,
        preferences: &OrchestrationPreferences,
    ) -> Result<Arc<dyn Reasoner>, OrchestrationError> {
        let id = preferences
            .ai_provider
            .as_deref()
            .unwrap_or(&self.default_id);
        self.reasoners.get(id).cloned().ok_or_else(|| {
            OrchestrationError::Reasoner(format!("AI provider '{id}' is not configured"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct FixedReasoner {
        id: String,
    }

    #[async_trait]
    impl Reasoner for FixedReasoner {
        fn id(&self) -> &str {
            &self.id
        }

        async fn analyze(
            &self,
            _system_prompt: &str,
            _user_message: &str,
            _history: &str,
            _tools: &[Tool],
            _preferences: &OrchestrationPreferences,
        ) -> Result<Analysis, OrchestrationError> {
            Ok(Analysis {
                response: "ok".to_string(),
                tokens_used: 1,
                provider_id: self.id.clone(),
            })
        }

        async fn synthesize(
            &self,
            _prompt: &str,
            _ctx: &ConversationContext,
            _preferences: &OrchestrationPreferences,
        ) -> Result<String, OrchestrationError> {
            Ok("ok".to_string())
        }
    }

    #[test]
    fn select_falls_back_to_default() {
        let mut registry = ReasonerRegistry::new("alpha");
        registry.register(Arc::new(FixedReasoner { id: "alpha".to_string() }));
        registry.register(Arc::new(FixedReasoner { id: "beta".to_string() }));

        let prefs = OrchestrationPreferences::default();
        assert_eq!(registry.select(&prefs).unwrap().id(), "alpha");

        let prefs = OrchestrationPreferences {
            ai_provider: Some("beta".to_string()),
            ..OrchestrationPreferences::default()
        };
        assert_eq!(registry.select(&prefs).unwrap().id(), "beta");
    }

    #[test]
    fn select_rejects_unknown_provider() {
        let mut registry = ReasonerRegistry::new("alpha");
        registry.register(Arc::new(FixedReasoner { id: "alpha".to_string() }));

        let prefs = OrchestrationPreferences {
            ai_provider: Some("missing".to_string()),
            ..OrchestrationPreferences::default()
        };
        let err = registry.select(&prefs).unwrap_err();
        assert!(matches!(err, OrchestrationError::Reasoner(_)));
    }
}
