//! Key/value and list backend shared by the cache, queue, and rate limiter.
//!
//! Every operation is individually atomic. No operation spans more than
//! one key, and callers never assume multi-operation transactions.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry as MapEntry;
use dashmap::DashMap;
use tokio::time::Instant;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Store backend unavailable: {0}")]
    Unavailable(String),

    #[error("Key {key} holds the wrong kind of value")]
    WrongType { key: String },
}

/// Backend for cache entries, queue lanes, and rate counters.
#[async_trait]
pub trait Store: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Set a string value that expires after `ttl`.
    async fn set_ex(&self, key: &str, value: String, ttl: Duration) -> Result<(), StoreError>;

    /// Remove a key of any kind. Returns whether it existed.
    async fn delete(&self, key: &str) -> Result<bool, StoreError>;

    /// Live keys starting with `prefix`.
    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError>;

    /// Increment an integer counter, creating it at 1.
    async fn incr(&self, key: &str) -> Result<i64, StoreError>;

    /// Set a key's expiry. Returns `false` if the key does not exist.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StoreError>;

    /// Append to a list. Returns the new length.
    async fn rpush(&self, key: &str, value: String) -> Result<usize, StoreError>;

    /// Pop the head of a list.
    async fn lpop(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn llen(&self, key: &str) -> Result<usize, StoreError>;

    /// Snapshot of a list, head first.
    async fn lrange(&self, key: &str) -> Result<Vec<String>, StoreError>;

    /// Remove the first element equal to `value`. Returns whether one was removed.
    async fn lrem_first(&self, key: &str, value: &str) -> Result<bool, StoreError>;

    /// Remove a list and return its elements, head first.
    async fn ldrain(&self, key: &str) -> Result<Vec<String>, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;

    /// Drop expired keys. Backends with native expiry have nothing to do.
    async fn purge_expired(&self) -> Result<usize, StoreError> {
        Ok(0)
    }
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum Value {
    Text(String),
    List(VecDeque<String>),
}

#[derive(Debug, Clone)]
struct Slot {
    value: Value,
    expires_at: Option<Instant>,
}

impl Slot {
    fn new(value: Value) -> Self {
        Self {
            value,
            expires_at: None,
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// In-process [`Store`] on a [`DashMap`], with lazy TTL eviction plus an
/// explicit [`purge_expired`](Store::purge_expired) sweep.
#[derive(Debug, Default)]
pub struct MemoryStore {
    slots: DashMap<String, Slot>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored keys, counting expired ones not yet evicted.
    pub fn raw_len(&self) -> usize {
        self.slots.len()
    }

    /// Run `f` on the live slot for `key`, creating it with `init` when
    /// missing or expired.
    fn with_slot<T>(
        &self,
        key: &str,
        init: impl FnOnce() -> Value,
        f: impl FnOnce(&mut Slot) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let now = Instant::now();
        match self.slots.entry(key.to_string()) {
            MapEntry::Occupied(mut occupied) => {
                if occupied.get().is_expired(now) {
                    occupied.insert(Slot::new(init()));
                }
                f(occupied.get_mut())
            }
            MapEntry::Vacant(vacant) => {
                let mut slot = vacant.insert(Slot::new(init()));
                f(slot.value_mut())
            }
        }
    }

    /// Run `f` on the live list for `key`, if one exists. Empty lists are
    /// removed afterwards.
    fn with_list<T>(
        &self,
        key: &str,
        default: T,
        f: impl FnOnce(&mut VecDeque<String>) -> T,
    ) -> Result<T, StoreError> {
        let now = Instant::now();
        let MapEntry::Occupied(mut occupied) = self.slots.entry(key.to_string()) else {
            return Ok(default);
        };
        if occupied.get().is_expired(now) {
            occupied.remove();
            return Ok(default);
        }
        let Value::List(list) = &mut occupied.get_mut().value else {
            return Err(StoreError::WrongType {
                key: key.to_string(),
            });
        };
        let result = f(list);
        if list.is_empty() {
            occupied.remove();
        }
        Ok(result)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let Some(slot) = self.slots.get(key) else {
            return Ok(None);
        };
        if slot.is_expired(Instant::now()) {
            drop(slot);
            self.slots.remove_if(key, |_, s| s.is_expired(Instant::now()));
            return Ok(None);
        }
        match &slot.value {
            Value::Text(text) => Ok(Some(text.clone())),
            Value::List(_) => Err(StoreError::WrongType {
                key: key.to_string(),
            }),
        }
    }

    async fn set_ex(&self, key: &str, value: String, ttl: Duration) -> Result<(), StoreError> {
        self.slots.insert(
            key.to_string(),
            Slot {
                value: Value::Text(value),
                expires_at: Some(Instant::now() + ttl),
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let now = Instant::now();
        Ok(self
            .slots
            .remove(key)
            .is_some_and(|(_, slot)| !slot.is_expired(now)))
    }

    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let now = Instant::now();
        Ok(self
            .slots
            .iter()
            .filter(|entry| entry.key().starts_with(prefix) && !entry.value().is_expired(now))
            .map(|entry| entry.key().clone())
            .collect())
    }

    async fn incr(&self, key: &str) -> Result<i64, StoreError> {
        self.with_slot(
            key,
            || Value::Text("0".to_string()),
            |slot| {
                let Value::Text(text) = &mut slot.value else {
                    return Err(StoreError::WrongType {
                        key: key.to_string(),
                    });
                };
                let next = text
                    .parse::<i64>()
                    .map_err(|_| StoreError::WrongType {
                        key: key.to_string(),
                    })?
                    + 1;
                *text = next.to_string();
                Ok(next)
            },
        )
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StoreError> {
        let now = Instant::now();
        let Some(mut slot) = self.slots.get_mut(key) else {
            return Ok(false);
        };
        if slot.is_expired(now) {
            return Ok(false);
        }
        slot.expires_at = Some(now + ttl);
        Ok(true)
    }

    async fn rpush(&self, key: &str, value: String) -> Result<usize, StoreError> {
        self.with_slot(
            key,
            || Value::List(VecDeque::new()),
            |slot| match &mut slot.value {
                Value::List(list) => {
                    list.push_back(value);
                    Ok(list.len())
                }
                Value::Text(_) => Err(StoreError::WrongType {
                    key: key.to_string(),
                }),
            },
        )
    }

    async fn lpop(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.with_list(key, None, VecDeque::pop_front)
    }

    async fn llen(&self, key: &str) -> Result<usize, StoreError> {
        self.with_list(key, 0, |list| list.len())
    }

    async fn lrange(&self, key: &str) -> Result<Vec<String>, StoreError> {
        self.with_list(key, Vec::new(), |list| list.iter().cloned().collect())
    }

    async fn lrem_first(&self, key: &str, value: &str) -> Result<bool, StoreError> {
        self.with_list(key, false, |list| {
            match list.iter().position(|item| item == value) {
                Some(index) => {
                    list.remove(index);
                    true
                }
                None => false,
            }
        })
    }

    async fn ldrain(&self, key: &str) -> Result<Vec<String>, StoreError> {
        self.with_list(key, Vec::new(), |list| list.drain(..).collect())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn purge_expired(&self) -> Result<usize, StoreError> {
        let now = Instant::now();
        let before = self.slots.len();
        self.slots.retain(|_, slot| !slot.is_expired(now));
        Ok(before.saturating_sub(self.slots.len()))
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn set_ex_expires() {
        let store = MemoryStore::new();
        store
            .set_ex("k", "v".into(), Duration::from_secs(10))
            .await
            .unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));

        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(store.get("k").await.unwrap(), None);
        assert!(!store.delete("k").await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn incr_restarts_after_expiry() {
        let store = MemoryStore::new();
        assert_eq!(store.incr("c").await.unwrap(), 1);
        assert!(store.expire("c", Duration::from_secs(60)).await.unwrap());
        assert_eq!(store.incr("c").await.unwrap(), 2);

        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(store.incr("c").await.unwrap(), 1);
        assert!(!store.expire("missing", Duration::from_secs(1)).await.unwrap());
    }

    #[tokio::test]
    async fn list_operations_are_fifo() {
        let store = MemoryStore::new();
        store.rpush("l", "a".into()).await.unwrap();
        store.rpush("l", "b".into()).await.unwrap();
        assert_eq!(store.rpush("l", "c".into()).await.unwrap(), 3);

        assert_eq!(store.lrange("l").await.unwrap(), vec!["a", "b", "c"]);
        assert!(store.lrem_first("l", "b").await.unwrap());
        assert!(!store.lrem_first("l", "zzz").await.unwrap());
        assert_eq!(store.lpop("l").await.unwrap().as_deref(), Some("a"));
        assert_eq!(store.ldrain("l").await.unwrap(), vec!["c"]);
        assert_eq!(store.llen("l").await.unwrap(), 0);
        assert_eq!(store.lpop("l").await.unwrap(), None);
    }

    #[tokio::test]
    async fn wrong_type_is_reported() {
        let store = MemoryStore::new();
        store.rpush("l", "a".into()).await.unwrap();
        assert_matches!(store.get("l").await, Err(StoreError::WrongType { .. }));
        assert_matches!(store.incr("l").await, Err(StoreError::WrongType { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn scan_and_purge_skip_expired() {
        let store = MemoryStore::new();
        store
            .set_ex("cache:a", "1".into(), Duration::from_secs(5))
            .await
            .unwrap();
        store
            .set_ex("cache:b", "2".into(), Duration::from_secs(50))
            .await
            .unwrap();
        store
            .set_ex("other", "3".into(), Duration::from_secs(50))
            .await
            .unwrap();

        let mut keys = store.scan_prefix("cache:").await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["cache:a", "cache:b"]);

        tokio::time::advance(Duration::from_secs(6)).await;
        assert_eq!(store.scan_prefix("cache:").await.unwrap(), vec!["cache:b"]);
        assert_eq!(store.purge_expired().await.unwrap(), 1);
    }
}
