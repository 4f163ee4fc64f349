//! Key/value ports for settings and ephemeral cache entries
//!
//! Two seams keep the API client independent of where its state lives:
//! - `SettingsStore` holds persisted settings (credentials, default workflow)
//! - `Cache` holds short-lived entries with a TTL (bearer token, flow list)
//!
//! Both are injected as `Arc<dyn ...>` so tests can swap in the in-memory
//! implementations. Values are plain `serde_json::Value`; callers own the schema.

pub mod error;
pub mod file;
pub mod memory;

pub use error::{Error, Result};
pub use file::FileSettingsStore;
pub use memory::{MemoryCache, MemorySettingsStore};

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde_json::Value;

/// Boxed future used by the store traits to stay dyn-compatible.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Persisted key/value settings.
///
/// Writes replace the whole value stored under a key. A missing key reads as
/// `None`, never as an error.
pub trait SettingsStore: Send + Sync {
    /// Read the value stored under `key`.
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<Value>>>;

    /// Store `value` under `key`, replacing any previous value.
    fn set<'a>(&'a self, key: &'a str, value: Value) -> BoxFuture<'a, Result<()>>;
}

/// Expiring key/value cache.
///
/// Entries vanish once their TTL elapses. Cache operations are infallible: a
/// cache that cannot answer behaves like a miss.
pub trait Cache: Send + Sync {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Option<Value>>;

    /// Insert or replace an entry that expires after `ttl`.
    fn set<'a>(&'a self, key: &'a str, value: Value, ttl: Duration) -> BoxFuture<'a, ()>;

    fn delete<'a>(&'a self, key: &'a str) -> BoxFuture<'a, ()>;
}
