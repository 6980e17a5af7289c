//! Configured MCP servers and their runtime health.
//!
//! Configuration (`ServerDefinition`) is immutable after startup; runtime
//! health lives in a parallel `ServerStatus` record with atomic-granularity
//! writes, so a config reload can never be coupled with health state.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use serde::{Deserialize, Serialize};

/// Upstream authentication scheme.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerAuth {
    #[default]
    None,
    Basic {
        username: String,
        password: String,
    },
    Bearer {
        token: String,
    },
    Apikey {
        #[serde(default)]
        header: Option<String>,
        key: String,
    },
}

/// One configured upstream MCP server. Created from configuration at
/// startup and never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerDefinition {
    pub name: String,
    pub base_url: String,
    pub description: Option<String>,
    /// Response and TCP connect timeout, in milliseconds. 0 defers to the
    /// global read timeout at config load.
    pub timeout_ms: u64,
    pub auth: ServerAuth,
    /// Merged into every request as additional default headers.
    pub headers: HashMap<String, String>,
    pub enabled: bool,
    pub priority: i32,
}

impl Default for ServerDefinition {
    fn default() -> Self {
        Self {
            name: String::new(),
            base_url: String::new(),
            description: None,
            timeout_ms: 0,
            auth: ServerAuth::None,
            headers: HashMap::new(),
            enabled: true,
            priority: 0,
        }
    }
}

/// Mutable runtime health for one server. Writes are atomic-granularity;
/// concurrent readers may observe either the prior or the new value.
#[derive(Debug)]
pub struct ServerStatus {
    healthy: AtomicBool,
    last_check: Mutex<Option<Instant>>,
}

impl ServerStatus {
    fn new() -> Self {
        Self {
            // Unverified servers start healthy; the first failed discovery
            // or health check flips the bit.
            healthy: AtomicBool::new(true),
            last_check: Mutex::new(None),
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Relaxed)
    }

    pub fn mark(&self, healthy: bool, when: Instant) {
        self.healthy.store(healthy, Ordering::Relaxed);
        *self.last_check.lock().expect("status lock poisoned") = Some(when);
    }

    pub fn last_check(&self) -> Option<Instant> {
        *self.last_check.lock().expect("status lock poisoned")
    }

    /// True when the last health check happened within `window`.
    pub fn checked_within(&self, window: std::time::Duration) -> bool {
        self.last_check()
            .map(|at| at.elapsed() <= window)
            .unwrap_or(false)
    }
}

pub struct ServerEntry {
    pub definition: ServerDefinition,
    pub status: ServerStatus,
}

/// Immutable map `name -> server`; health mutations go through the
/// per-entry status record.
pub struct ServerRegistry {
    servers: HashMap<String, Arc<ServerEntry>>,
}

impl ServerRegistry {
    pub fn new(definitions: impl IntoIterator<Item = ServerDefinition>) -> Self {
        let servers = definitions
            .into_iter()
            .map(|definition| {
                let name = definition.name.clone();
                let entry = Arc::new(ServerEntry {
                    definition,
                    status: ServerStatus::new(),
                });
                (name, entry)
            })
            .collect();
        Self { servers }
    }

    pub fn get(&self, name: &str) -> Option<Arc<ServerEntry>> {
        self.servers.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.servers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.servers.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<ServerEntry>> {
        self.servers.values()
    }

    /// Servers eligible for discovery fan-out.
    pub fn enabled_healthy(&self) -> Vec<Arc<ServerEntry>> {
        self.servers
            .values()
            .filter(|entry| entry.definition.enabled && entry.status.is_healthy())
            .cloned()
            .collect()
    }

    pub fn mark_healthy(&self, name: &str, when: Instant) {
        if let Some(entry) = self.servers.get(name) {
            entry.status.mark(true, when);
        }
    }

    pub fn mark_unhealthy(&self, name: &str, when: Instant) {
        if let Some(entry) = self.servers.get(name) {
            entry.status.mark(false, when);
        }
    }
}
