//! In-memory store implementations
//!
//! `MemoryCache` is the production token/flow cache (entries are ephemeral
//! and recomputable). `MemorySettingsStore` backs tests and ephemeral runs.

use std::collections::HashMap;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use crate::error::Result;
use crate::{BoxFuture, Cache, SettingsStore};

/// Settings held in a process-local map.
#[derive(Default)]
pub struct MemorySettingsStore {
    state: Mutex<HashMap<String, Value>>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SettingsStore for MemorySettingsStore {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<Value>>> {
        Box::pin(async move { Ok(self.state.lock().await.get(key).cloned()) })
    }

    fn set<'a>(&'a self, key: &'a str, value: Value) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.state.lock().await.insert(key.to_string(), value);
            Ok(())
        })
    }
}

struct Entry {
    value: Value,
    expires_at: Instant,
}

/// Expiring cache backed by a process-local map.
///
/// Expiry uses `tokio::time::Instant`, so paused-clock tests can advance
/// past a TTL. Expired entries are dropped lazily on read.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Cache for MemoryCache {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Option<Value>> {
        Box::pin(async move {
            let mut entries = self.entries.lock().await;
            match entries.get(key) {
                Some(entry) if Instant::now() < entry.expires_at => Some(entry.value.clone()),
                Some(_) => {
                    debug!(key, "cache entry expired");
                    entries.remove(key);
                    None
                }
                None => None,
            }
        })
    }

    fn set<'a>(&'a self, key: &'a str, value: Value, ttl: Duration) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            let entry = Entry {
                value,
                expires_at: Instant::now() + ttl,
            };
            self.entries.lock().await.insert(key.to_string(), entry);
            debug!(key, ttl_secs = ttl.as_secs(), "cache entry stored");
        })
    }

    fn delete<'a>(&'a self, key: &'a str) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            if self.entries.lock().await.remove(key).is_some() {
                debug!(key, "cache entry deleted");
            }
        })
    }
}
