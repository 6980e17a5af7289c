//! In-memory session contexts.
//!
//! The manager exclusively owns all sessions. Callers work on a clone of a
//! context and store it back with `update_context`; concurrent requests for
//! the same session interleave with best-effort causal ordering — sessions
//! are advisory state, not a source of truth.

use std::collections::HashMap;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::RwLock;
use utoipa::ToSchema;

use crate::config::ContextConfig;
use crate::models::{ChatMessage, ExecutionStep, SessionInfo, Tool};

/// Per-session conversation state.
#[derive(Debug, Clone)]
pub struct ConversationContext {
    pub session_id: String,
    pub messages: Vec<ChatMessage>,
    /// Snapshot of available tools as of the last request.
    pub available_tools: Vec<Tool>,
    pub execution_history: Vec<ExecutionStep>,
    pub preferences: HashMap<String, Value>,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
}

impl ConversationContext {
    fn new(session_id: String) -> Self {
        let now = Utc::now();
        Self {
            session_id,
            messages: Vec::new(),
            available_tools: Vec::new(),
            execution_history: Vec::new(),
            preferences: HashMap::new(),
            created_at: now,
            last_activity_at: now,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ContextMetrics {
    pub total_sessions: usize,
    /// Sessions with activity within the session timeout.
    pub active_sessions: usize,
    pub average_age_seconds: u64,
}

pub struct ContextManager {
    contexts: RwLock<HashMap<String, ConversationContext>>,
    config: ContextConfig,
}

impl ContextManager {
    pub fn new(config: ContextConfig) -> Self {
        Self {
            contexts: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Look up a session, creating it when absent. Creation that would
    /// exceed `max_sessions` first evicts the least-recently-active
    /// sessions. Every call refreshes `last_activity_at` and re-applies the
    /// history cap.
    pub async fn get_or_create_context(&self, session_id: &str) -> ConversationContext {
        let mut contexts = self.contexts.write().await;

        if !contexts.contains_key(session_id) {
            let count = contexts.len();
            if count + 1 > self.config.max_sessions {
                let overflow = (count + 1).saturating_sub(self.config.max_sessions).max(1);
                Self::evict_least_active(&mut contexts, overflow);
            }
            contexts.insert(
                session_id.to_string(),
                ConversationContext::new(session_id.to_string()),
            );
            tracing::debug!(session = %session_id, "created conversation context");
        }

        let ctx = contexts
            .get_mut(session_id)
            .expect("context inserted above");
        ctx.last_activity_at = Utc::now();
        Self::trim_history(ctx, self.config.max_history_size);
        ctx.clone()
    }

    /// Store a mutated context back, refreshing its activity stamp.
    pub async fn update_context(&self, mut ctx: ConversationContext) {
        ctx.last_activity_at = Utc::now();
        Self::trim_history(&mut ctx, self.config.max_history_size);
        self.contexts
            .write()
            .await
            .insert(ctx.session_id.clone(), ctx);
    }

    /// Merge preference values into an existing or fresh session.
    pub async fn set_preferences(&self, session_id: &str, preferences: HashMap<String, Value>) {
        let mut ctx = self.get_or_create_context(session_id).await;
        ctx.preferences.extend(preferences);
        self.update_context(ctx).await;
    }

    pub async fn clear_context(&self, session_id: &str) -> bool {
        self.contexts.write().await.remove(session_id).is_some()
    }

    /// Evict every session idle longer than the session timeout. Returns
    /// the number removed.
    pub async fn cleanup_expired_contexts(&self) -> usize {
        let cutoff = Utc::now() - ChronoDuration::milliseconds(self.config.session_timeout as i64);
        let mut contexts = self.contexts.write().await;
        let before = contexts.len();
        contexts.retain(|_, ctx| ctx.last_activity_at >= cutoff);
        let evicted = before - contexts.len();
        if evicted > 0 {
            tracing::info!(evicted, remaining = contexts.len(), "expired sessions evicted");
        }
        evicted
    }

    // ── Introspection ───────────────────────────────────────────────────

    pub async fn metrics(&self) -> ContextMetrics {
        let contexts = self.contexts.read().await;
        let now = Utc::now();
        let timeout = ChronoDuration::milliseconds(self.config.session_timeout as i64);

        let active = contexts
            .values()
            .filter(|ctx| now - ctx.last_activity_at <= timeout)
            .count();
        let total_age: i64 = contexts
            .values()
            .map(|ctx| (now - ctx.created_at).num_seconds().max(0))
            .sum();
        let average = if contexts.is_empty() {
            0
        } else {
            (total_age / contexts.len() as i64) as u64
        };

        ContextMetrics {
            total_sessions: contexts.len(),
            active_sessions: active,
            average_age_seconds: average,
        }
    }

    pub async fn session_info(&self, session_id: &str) -> Option<SessionInfo> {
        let contexts = self.contexts.read().await;
        contexts
            .get(session_id)
            .map(|ctx| self.describe(ctx))
    }

    pub async fn session_infos(&self) -> Vec<SessionInfo> {
        let contexts = self.contexts.read().await;
        let mut infos: Vec<SessionInfo> = contexts.values().map(|ctx| self.describe(ctx)).collect();
        infos.sort_by(|a, b| b.last_activity_at.cmp(&a.last_activity_at));
        infos
    }

    fn describe(&self, ctx: &ConversationContext) -> SessionInfo {
        let mut tool_names: Vec<String> =
            ctx.available_tools.iter().map(|t| t.name.clone()).collect();
        tool_names.sort();
        tool_names.dedup();

        let mut server_names: Vec<String> = ctx
            .available_tools
            .iter()
            .map(|t| t.server_name.clone())
            .collect();
        server_names.sort();
        server_names.dedup();

        let timeout = ChronoDuration::milliseconds(self.config.session_timeout as i64);
        SessionInfo {
            session_id: ctx.session_id.clone(),
            message_count: ctx.messages.len(),
            tool_names,
            server_names,
            created_at: ctx.created_at,
            last_activity_at: ctx.last_activity_at,
            is_active: Utc::now() - ctx.last_activity_at <= timeout,
        }
    }

    // ── Internals ───────────────────────────────────────────────────────

    fn trim_history(ctx: &mut ConversationContext, max: usize) {
        if ctx.messages.len() > max {
            let excess = ctx.messages.len() - max;
            ctx.messages.drain(..excess);
        }
    }

    fn evict_least_active(contexts: &mut HashMap<String, ConversationContext>, count: usize) {
        let mut by_activity: Vec<(String, DateTime<Utc>)> = contexts
            .iter()
            .map(|(id, ctx)| (id.clone(), ctx.last_activity_at))
            .collect();
        by_activity.sort_by_key(|(_, at)| *at);
        for (id, _) in by_activity.into_iter().take(count) {
            contexts.remove(&id);
            tracing::debug!(session = %id, "evicted least-recently-active session");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    fn manager(max_sessions: usize, max_history: usize) -> ContextManager {
        ContextManager::new(ContextConfig {
            session_timeout: 60_000,
            max_sessions,
            cleanup_interval: 60_000,
            max_history_size: max_history,
        })
    }

    #[tokio::test]
    async fn history_cap_drops_oldest_first() {
        let manager = manager(10, 3);
        let mut ctx = manager.get_or_create_context("s1").await;
        for i in 0..5 {
            ctx.messages.push(ChatMessage::new(Role::User, format!("m{i}")));
        }
        manager.update_context(ctx).await;

        let ctx = manager.get_or_create_context("s1").await;
        let contents: Vec<&str> = ctx.messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["m2", "m3", "m4"]);
    }

    #[tokio::test]
    async fn overflow_evicts_least_recently_active() {
        let manager = manager(2, 10);
        manager.get_or_create_context("a").await;
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        manager.get_or_create_context("b").await;
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        manager.get_or_create_context("c").await;

        assert!(manager.session_info("a").await.is_none());
        assert!(manager.session_info("b").await.is_some());
        assert!(manager.session_info("c").await.is_some());
        assert_eq!(manager.metrics().await.total_sessions, 2);
    }

    #[tokio::test]
    async fn clear_context_removes_session() {
        let manager = manager(10, 10);
        manager.get_or_create_context("gone").await;
        assert!(manager.clear_context("gone").await);
        assert!(manager.session_info("gone").await.is_none());
        assert!(!manager.clear_context("gone").await);
    }

    #[tokio::test]
    async fn cleanup_evicts_only_expired_sessions() {
        let manager = ContextManager::new(ContextConfig {
            session_timeout: 50,
            max_sessions: 10,
            cleanup_interval: 60_000,
            max_history_size: 10,
        });
        manager.get_or_create_context("old").await;
        tokio::time::sleep(std::time::Duration::from_millis(80)).await;
        manager.get_or_create_context("fresh").await;

        let evicted = manager.cleanup_expired_contexts().await;
        assert_eq!(evicted, 1);
        assert!(manager.session_info("old").await.is_none());
        assert!(manager.session_info("fresh").await.is_some());
    }

    #[tokio::test]
    async fn preferences_merge_across_calls() {
        let manager = manager(10, 10);
        manager
            .set_preferences("s", HashMap::from([("responseFormat".to_string(), serde_json::json!("raw"))]))
            .await;
        manager
            .set_preferences("s", HashMap::from([("maxSteps".to_string(), serde_json::json!(3))]))
            .await;

        let ctx = manager.get_or_create_context("s").await;
        assert_eq!(ctx.preferences["responseFormat"], "raw");
        assert_eq!(ctx.preferences["maxSteps"], 3);
    }

    #[tokio::test]
    async fn session_info_reports_snapshot_names() {
        let manager = manager(10, 10);
        let mut ctx = manager.get_or_create_context("s").await;
        ctx.available_tools = vec![
            Tool {
                name: "echo".to_string(),
                description: String::new(),
                input_schema: serde_json::json!({}),
                server_name: "srvA".to_string(),
            },
            Tool {
                name: "search".to_string(),
                description: String::new(),
                input_schema: serde_json::json!({}),
                server_name: "srvA".to_string(),
            },
        ];
        manager.update_context(ctx).await;

        let info = manager.session_info("s").await.unwrap();
        assert_eq!(info.tool_names, vec!["echo", "search"]);
        assert_eq!(info.server_names, vec!["srvA"]);
        assert!(info.is_active);
    }
}
