//! Key/value store abstraction and an in-process implementation.

use crate::error::{CacheErrorKind, HistoryError, Result};
use async_trait::async_trait;
use regex::Regex;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// External key/value cache collaborator.
///
/// Values are text so that any backend can hold them. Implementations report
/// failures honestly; swallowing them is the caller's decision.
#[async_trait]
pub trait KeyValueCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store a value, expiring after `ttl` when given.
    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> Result<()>;

    /// Delete one key, returning whether it existed.
    async fn del(&self, key: &str) -> Result<bool>;

    /// Delete every key matching a glob (`*` and `?`), returning the count.
    async fn del_pattern(&self, pattern: &str) -> Result<usize>;

    /// Diagnostic text
    async fn info(&self) -> Result<String>;
}

#[derive(Debug, Clone)]
struct StoredValue {
    value: String,
    expires_at: Option<Instant>,
}

impl StoredValue {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// In-memory [`KeyValueCache`] with per-key expiry.
///
/// Expired keys are dropped lazily on read and on pattern deletes.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, StoredValue>>,
}

impl MemoryCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live keys.
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .read()
            .await
            .values()
            .filter(|v| !v.is_expired(now))
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Live keys in sorted order.
    pub async fn keys(&self) -> Vec<String> {
        let now = Instant::now();
        let mut keys: Vec<String> = self
            .entries
            .read()
            .await
            .iter()
            .filter(|(_, v)| !v.is_expired(now))
            .map(|(k, _)| k.clone())
            .collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl KeyValueCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let now = Instant::now();
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                None => return Ok(None),
                Some(stored) if !stored.is_expired(now) => return Ok(Some(stored.value.clone())),
                Some(_) => {}
            }
        }
        self.entries.write().await.remove(key);
        Ok(None)
    }

    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> Result<()> {
        let stored = StoredValue {
            value,
            expires_at: ttl.map(|ttl| Instant::now() + ttl),
        };
        self.entries.write().await.insert(key.to_string(), stored);
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<bool> {
        Ok(self.entries.write().await.remove(key).is_some())
    }

    async fn del_pattern(&self, pattern: &str) -> Result<usize> {
        let matcher = glob_to_regex(pattern)?;
        let now = Instant::now();
        let mut removed = 0;
        self.entries.write().await.retain(|key, stored| {
            if matcher.is_match(key) {
                removed += usize::from(!stored.is_expired(now));
                false
            } else {
                !stored.is_expired(now)
            }
        });
        Ok(removed)
    }

    async fn info(&self) -> Result<String> {
        let entries = self.entries.read().await;
        let bytes: usize = entries.iter().map(|(k, v)| k.len() + v.value.len()).sum();
        Ok(format!("memory cache: {} keys, {} bytes", entries.len(), bytes))
    }
}

/// Translate a glob with `*` and `?` into an anchored regex.
pub(crate) fn glob_to_regex(pattern: &str) -> Result<Regex> {
    let mut expr = String::with_capacity(pattern.len() + 8);
    expr.push('^');
    let mut literal = String::new();
    for c in pattern.chars() {
        match c {
            '*' | '?' => {
                expr.push_str(&regex::escape(&literal));
                literal.clear();
                expr.push_str(if c == '*' { ".*" } else { "." });
            }
            _ => literal.push(c),
        }
    }
    expr.push_str(&regex::escape(&literal));
    expr.push('$');
    Regex::new(&expr).map_err(|e| {
        HistoryError::cache(
            format!("compiling pattern '{pattern}'"),
            CacheErrorKind::Unavailable(e.to_string()),
        )
    })
}
