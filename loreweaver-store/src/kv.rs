//! Key-value cache contract and the in-memory implementation.

use crate::error::StoreError;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Key-value cache with TTL, hash, and list operations.
///
/// The contract mirrors what a Redis-class backend offers; the
/// shipped implementation is in-memory and the persistence target is
/// a deployment decision.
#[async_trait]
pub trait KvCache: Send + Sync {
    /// Fetch a value.
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;

    /// Store a value, with an optional TTL.
    async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> Result<(), StoreError>;

    /// Delete a key. Returns whether it existed.
    async fn delete(&self, key: &str) -> Result<bool, StoreError>;

    /// Delete every key matching a glob-style pattern (`*` wildcard).
    /// Returns the number removed.
    async fn invalidate_pattern(&self, pattern: &str) -> Result<usize, StoreError>;

    /// Fetch one field of a hash.
    async fn hash_get(&self, key: &str, field: &str) -> Result<Option<Value>, StoreError>;

    /// Replace a hash wholesale.
    async fn hash_set_all(
        &self,
        key: &str,
        fields: HashMap<String, Value>,
    ) -> Result<(), StoreError>;

    /// Push to the tail of a list.
    async fn list_push(&self, key: &str, value: Value) -> Result<(), StoreError>;

    /// Pop from the head of a list.
    async fn list_pop(&self, key: &str) -> Result<Option<Value>, StoreError>;

    /// Read a list slice (inclusive indices, -1 = end).
    async fn list_range(&self, key: &str, start: i64, stop: i64) -> Result<Vec<Value>, StoreError>;

    /// Whether a key exists (and has not expired).
    async fn exists(&self, key: &str) -> Result<bool, StoreError>;

    /// Set or replace a key's TTL. Returns whether the key existed.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StoreError>;

    /// Remaining TTL of a key, if it has one.
    async fn ttl(&self, key: &str) -> Result<Option<Duration>, StoreError>;
}

enum Stored {
    Plain(Value),
    Hash(HashMap<String, Value>),
    List(Vec<Value>),
}

struct Entry {
    stored: Stored,
    expires_at: Option<Instant>,
}

impl Entry {
    fn expired(&self) -> bool {
        self.expires_at.is_some_and(|at| at <= Instant::now())
    }
}

/// In-memory cache with lazy TTL eviction.
#[derive(Default)]
pub struct MemoryKvCache {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryKvCache {
    /// An empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    fn with_live_entry<R>(
        &self,
        key: &str,
        f: impl FnOnce(Option<&mut Entry>) -> R,
    ) -> R {
        let mut entries = self.entries.lock().expect("cache poisoned");
        if entries.get(key).is_some_and(Entry::expired) {
            entries.remove(key);
        }
        f(entries.get_mut(key))
    }
}

fn glob_matches(pattern: &str, key: &str) -> bool {
    // Only `*` is supported, matching any run of characters.
    let parts: Vec<&str> = pattern.split('*').collect();
    let mut rest = key;
    for (i, part) in parts.iter().enumerate() {
        if part.is_empty() {
            continue;
        }
        match rest.find(part) {
            Some(pos) => {
                // The first part must anchor at the start.
                if i == 0 && pos != 0 {
                    return false;
                }
                rest = &rest[pos + part.len()..];
            }
            None => return false,
        }
    }
    // The last part must anchor at the end unless the pattern ends with `*`.
    pattern.ends_with('*') || parts.last().is_none_or(|last| key.ends_with(last))
}

#[async_trait]
impl KvCache for MemoryKvCache {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.with_live_entry(key, |entry| match entry {
            Some(Entry {
                stored: Stored::Plain(value),
                ..
            }) => Some(value.clone()),
            _ => None,
        }))
    }

    async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().expect("cache poisoned");
        entries.insert(
            key.to_string(),
            Entry {
                stored: Stored::Plain(value),
                expires_at: ttl.map(|t| Instant::now() + t),
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self
            .entries
            .lock()
            .expect("cache poisoned")
            .remove(key)
            .is_some())
    }

    async fn invalidate_pattern(&self, pattern: &str) -> Result<usize, StoreError> {
        let mut entries = self.entries.lock().expect("cache poisoned");
        let before = entries.len();
        entries.retain(|key, _| !glob_matches(pattern, key));
        Ok(before - entries.len())
    }

    async fn hash_get(&self, key: &str, field: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.with_live_entry(key, |entry| match entry {
            Some(Entry {
                stored: Stored::Hash(fields),
                ..
            }) => fields.get(field).cloned(),
            _ => None,
        }))
    }

    async fn hash_set_all(
        &self,
        key: &str,
        fields: HashMap<String, Value>,
    ) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().expect("cache poisoned");
        entries.insert(
            key.to_string(),
            Entry {
                stored: Stored::Hash(fields),
                expires_at: None,
            },
        );
        Ok(())
    }

    async fn list_push(&self, key: &str, value: Value) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().expect("cache poisoned");
        match entries.get_mut(key) {
            Some(Entry {
                stored: Stored::List(list),
                ..
            }) => list.push(value),
            _ => {
                entries.insert(
                    key.to_string(),
                    Entry {
                        stored: Stored::List(vec![value]),
                        expires_at: None,
                    },
                );
            }
        }
        Ok(())
    }

    async fn list_pop(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.with_live_entry(key, |entry| match entry {
            Some(Entry {
                stored: Stored::List(list),
                ..
            }) if !list.is_empty() => Some(list.remove(0)),
            _ => None,
        }))
    }

    async fn list_range(&self, key: &str, start: i64, stop: i64) -> Result<Vec<Value>, StoreError> {
        Ok(self.with_live_entry(key, |entry| match entry {
            Some(Entry {
                stored: Stored::List(list),
                ..
            }) => {
                let len = list.len() as i64;
                let resolve = |i: i64| -> i64 {
                    if i < 0 {
                        (len + i).max(0)
                    } else {
                        i.min(len - 1)
                    }
                };
                if len == 0 {
                    return Vec::new();
                }
                let (start, stop) = (resolve(start), resolve(stop));
                if start > stop {
                    return Vec::new();
                }
                list[start as usize..=(stop as usize)].to_vec()
            }
            _ => Vec::new(),
        }))
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.with_live_entry(key, |entry| entry.is_some()))
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StoreError> {
        Ok(self.with_live_entry(key, |entry| match entry {
            Some(entry) => {
                entry.expires_at = Some(Instant::now() + ttl);
                true
            }
            None => false,
        }))
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, StoreError> {
        Ok(self.with_live_entry(key, |entry| {
            entry
                .and_then(|e| e.expires_at)
                .map(|at| at.saturating_duration_since(Instant::now()))
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn set_get_delete_round_trip() {
        let cache = MemoryKvCache::new();
        cache.set("scene", json!("tavern"), None).await.unwrap();
        assert_eq!(cache.get("scene").await.unwrap(), Some(json!("tavern")));
        assert!(cache.delete("scene").await.unwrap());
        assert_eq!(cache.get("scene").await.unwrap(), None);
    }

    #[tokio::test]
    async fn expired_keys_vanish() {
        let cache = MemoryKvCache::new();
        cache
            .set("flash", json!(1), Some(Duration::ZERO))
            .await
            .unwrap();
        assert!(!cache.exists("flash").await.unwrap());
        assert_eq!(cache.get("flash").await.unwrap(), None);
    }

    #[tokio::test]
    async fn expire_and_ttl_work_together() {
        let cache = MemoryKvCache::new();
        cache.set("k", json!(1), None).await.unwrap();
        assert_eq!(cache.ttl("k").await.unwrap(), None);
        assert!(cache.expire("k", Duration::from_secs(60)).await.unwrap());
        assert!(cache.ttl("k").await.unwrap().unwrap() <= Duration::from_secs(60));
        assert!(!cache.expire("missing", Duration::from_secs(1)).await.unwrap());
    }

    #[tokio::test]
    async fn pattern_invalidation_uses_globs() {
        let cache = MemoryKvCache::new();
        cache.set("session:1:scene", json!(1), None).await.unwrap();
        cache.set("session:1:npcs", json!(2), None).await.unwrap();
        cache.set("session:2:scene", json!(3), None).await.unwrap();

        let removed = cache.invalidate_pattern("session:1:*").await.unwrap();
        assert_eq!(removed, 2);
        assert!(cache.exists("session:2:scene").await.unwrap());
    }

    #[tokio::test]
    async fn hash_operations() {
        let cache = MemoryKvCache::new();
        let mut fields = HashMap::new();
        fields.insert("trust".to_string(), json!(0.5));
        cache.hash_set_all("npc:elara", fields).await.unwrap();
        assert_eq!(
            cache.hash_get("npc:elara", "trust").await.unwrap(),
            Some(json!(0.5))
        );
        assert_eq!(cache.hash_get("npc:elara", "fear").await.unwrap(), None);
    }

    #[tokio::test]
    async fn list_operations_preserve_order() {
        let cache = MemoryKvCache::new();
        for i in 0..4 {
            cache.list_push("log", json!(i)).await.unwrap();
        }
        assert_eq!(
            cache.list_range("log", 0, -1).await.unwrap(),
            vec![json!(0), json!(1), json!(2), json!(3)]
        );
        assert_eq!(
            cache.list_range("log", 1, 2).await.unwrap(),
            vec![json!(1), json!(2)]
        );
        assert_eq!(cache.list_pop("log").await.unwrap(), Some(json!(0)));
    }

    #[test]
    fn glob_matching_anchors_correctly() {
        assert!(glob_matches("session:*", "session:1"));
        assert!(glob_matches("*:scene", "session:1:scene"));
        assert!(glob_matches("session:*:scene", "session:1:scene"));
        assert!(!glob_matches("session:*", "other:1"));
        assert!(!glob_matches("*:scene", "session:1:npcs"));
    }
}
