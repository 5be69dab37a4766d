//! Content-addressed result cache.
//!
//! Keys are `cache:generation:{kind}:{sha256(kind:prompt:canonical_params)}`.
//! Parameter keys are sorted before hashing, so requests that differ only
//! in parameter insertion order share an entry. Every parameter present in
//! the request participates, including `seed`.

use std::sync::Arc;
use std::time::Duration;

use genhub_core::generation::{GenerationKind, GenerationRequest};
use genhub_core::hashing::{canonical_json, sha256_hex};
use serde_json::{Map, Value};

use crate::outcome::Outcome;
use crate::store::{Store, StoreError};

/// Namespace for every cache entry.
pub const CACHE_KEY_PREFIX: &str = "cache:generation:";

/// Default entry lifetime.
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

/// Deterministic cache key for a request.
pub fn fingerprint(kind: GenerationKind, prompt: &str, params: &Map<String, Value>) -> String {
    let canonical = canonical_json(&Value::Object(params.clone()));
    let digest = sha256_hex(format!("{kind}:{prompt}:{canonical}").as_bytes());
    format!("{CACHE_KEY_PREFIX}{kind}:{digest}")
}

pub struct ResultCache {
    store: Arc<dyn Store>,
    default_ttl: Duration,
}

impl ResultCache {
    pub fn new(store: Arc<dyn Store>, default_ttl: Duration) -> Self {
        Self { store, default_ttl }
    }

    pub fn fingerprint_request(request: &GenerationRequest) -> String {
        fingerprint(request.kind, &request.prompt, &request.parameters)
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Look up a cached result. A corrupt entry is reported as degraded.
    pub async fn get(&self, key: &str) -> Outcome<Option<Value>> {
        let raw = match Outcome::from_store("cache.get", self.store.get(key).await) {
            Outcome::Ok(Some(raw)) => raw,
            Outcome::Ok(None) => {
                tracing::debug!(key, "Cache miss");
                return Outcome::Ok(None);
            }
            Outcome::Degraded(reason) => return Outcome::Degraded(reason),
        };

        match serde_json::from_str(&raw) {
            Ok(value) => {
                tracing::debug!(key, "Cache hit");
                Outcome::Ok(Some(value))
            }
            Err(e) => {
                tracing::warn!(key, error = %e, "Discarding undecodable cache entry");
                Outcome::Degraded(format!("corrupt cache entry: {e}"))
            }
        }
    }

    /// Store `value` under `key` for `ttl` (the default TTL when `None`).
    /// Overwrites any previous entry.
    pub async fn set(&self, key: &str, value: &Value, ttl: Option<Duration>) -> Outcome<()> {
        let ttl = ttl.unwrap_or(self.default_ttl);
        let result = self.store.set_ex(key, value.to_string(), ttl).await;
        if result.is_ok() {
            tracing::debug!(key, ttl_secs = ttl.as_secs(), "Cache entry stored");
        }
        Outcome::from_store("cache.set", result)
    }

    pub async fn delete(&self, key: &str) -> Outcome<bool> {
        Outcome::from_store("cache.delete", self.store.delete(key).await)
    }

    /// Remove every entry for one generation kind.
    pub async fn delete_by_kind(&self, kind: GenerationKind) -> Outcome<usize> {
        let prefix = format!("{CACHE_KEY_PREFIX}{kind}:");
        Outcome::from_store("cache.delete_by_kind", self.sweep(&prefix).await)
    }

    /// Remove every cache entry.
    pub async fn clear_all(&self) -> Outcome<usize> {
        Outcome::from_store("cache.clear_all", self.sweep(CACHE_KEY_PREFIX).await)
    }

    /// Number of live entries, optionally for one kind.
    pub async fn entry_count(&self, kind: Option<GenerationKind>) -> Outcome<usize> {
        let prefix = match kind {
            Some(kind) => format!("{CACHE_KEY_PREFIX}{kind}:"),
            None => CACHE_KEY_PREFIX.to_string(),
        };
        Outcome::from_store(
            "cache.entry_count",
            self.store.scan_prefix(&prefix).await.map(|keys| keys.len()),
        )
    }

    /// Prefix scan then per-key delete. Not atomic with concurrent sets.
    async fn sweep(&self, prefix: &str) -> Result<usize, StoreError> {
        let keys = self.store.scan_prefix(prefix).await?;
        let mut removed = 0;
        for key in keys {
            if self.store.delete(&key).await? {
                removed += 1;
            }
        }
        tracing::info!(prefix, removed, "Cache entries cleared");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::store::MemoryStore;

    fn params(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn cache() -> ResultCache {
        ResultCache::new(Arc::new(MemoryStore::new()), DEFAULT_TTL)
    }

    #[test]
    fn fingerprint_ignores_insertion_order() {
        let p1 = params(&[("width", json!(512)), ("steps", json!(25)), ("seed", Value::Null)]);
        let p2 = params(&[("seed", Value::Null), ("width", json!(512)), ("steps", json!(25))]);
        assert_eq!(
            fingerprint(GenerationKind::TextToImage, "cat", &p1),
            fingerprint(GenerationKind::TextToImage, "cat", &p2)
        );
    }

    #[test]
    fn fingerprint_distinguishes_inputs() {
        let p = params(&[("seed", Value::Null)]);
        let seeded = params(&[("seed", json!(42))]);
        let base = fingerprint(GenerationKind::TextToImage, "cat", &p);

        assert!(base.starts_with("cache:generation:text-to-image:"));
        assert_eq!(base.len(), CACHE_KEY_PREFIX.len() + "text-to-image:".len() + 64);
        assert_ne!(base, fingerprint(GenerationKind::ImageToImage, "cat", &p));
        assert_ne!(base, fingerprint(GenerationKind::TextToImage, "dog", &p));
        assert_ne!(base, fingerprint(GenerationKind::TextToImage, "cat", &seeded));
    }

    #[tokio::test(start_paused = true)]
    async fn round_trip_within_ttl_then_expires() {
        let cache = cache();
        let value = json!([{"asset_location": "/out/1.png", "seed": 42}]);

        assert_eq!(cache.set("k", &value, Some(Duration::from_secs(30))).await, Outcome::Ok(()));
        assert_eq!(cache.get("k").await, Outcome::Ok(Some(value)));

        tokio::time::advance(Duration::from_secs(31)).await;
        assert_eq!(cache.get("k").await, Outcome::Ok(None));
    }

    #[tokio::test]
    async fn delete_by_kind_leaves_other_kinds() {
        let cache = cache();
        let p = params(&[]);
        let t2i = fingerprint(GenerationKind::TextToImage, "a", &p);
        let t2i_b = fingerprint(GenerationKind::TextToImage, "b", &p);
        let i2i = fingerprint(GenerationKind::ImageToImage, "a", &p);
        for key in [&t2i, &t2i_b, &i2i] {
            cache.set(key, &json!(1), None).await;
        }

        assert_eq!(cache.entry_count(None).await, Outcome::Ok(3));
        assert_eq!(
            cache.delete_by_kind(GenerationKind::TextToImage).await,
            Outcome::Ok(2)
        );
        assert_eq!(cache.get(&i2i).await, Outcome::Ok(Some(json!(1))));
        assert_eq!(cache.clear_all().await, Outcome::Ok(1));
        assert_eq!(cache.entry_count(None).await, Outcome::Ok(0));
    }

    #[tokio::test]
    async fn corrupt_entry_is_degraded() {
        let store = Arc::new(MemoryStore::new());
        store
            .set_ex("bad", "{not json".into(), DEFAULT_TTL)
            .await
            .unwrap();
        let cache = ResultCache::new(store, DEFAULT_TTL);
        assert!(cache.get("bad").await.is_degraded());
    }
}
