//! In-memory response cache keyed by request fingerprint.
//!
//! Entries expire lazily: a read past the TTL reports the entry as absent but
//! leaves it in place until [`ResponseCache::clear`] is called.

use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// Query parameters of a request, kept sorted by key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams(BTreeMap<String, String>);

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl ToString) {
        self.0.insert(key.into(), value.to_string());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: ToString> FromIterator<(K, V)> for QueryParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = QueryParams::new();
        for (k, v) in iter {
            params.insert(k, v);
        }
        params
    }
}

/// Deterministic cache key for a (path, params) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestFingerprint(String);

impl RequestFingerprint {
    pub fn new(path: &str, params: &QueryParams) -> Self {
        let mut key = path.to_string();
        if !params.is_empty() {
            let query: Vec<String> = params.iter().map(|(k, v)| format!("{k}={v}")).collect();
            key.push('?');
            key.push_str(&query.join("&"));
        }
        Self(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    data: Value,
    stored_at: Instant,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub size: usize,
    #[serde(with = "humantime_serde")]
    pub ttl: Duration,
}

#[derive(Debug)]
pub struct ResponseCache {
    ttl: Duration,
    entries: Mutex<HashMap<RequestFingerprint, CacheEntry>>,
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_TTL)
    }
}

impl ResponseCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, key: &RequestFingerprint) -> Option<Value> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let entry = entries.get(key)?;
        if entry.stored_at.elapsed() >= self.ttl {
            return None;
        }
        Some(entry.data.clone())
    }

    pub fn set(&self, key: RequestFingerprint, data: Value) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(
            key,
            CacheEntry {
                data,
                stored_at: Instant::now(),
            },
        );
    }

    pub fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    /// Size counts stale entries too, since expiry is lazy.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            size: self
                .entries
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .len(),
            ttl: self.ttl,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn fingerprint_ignores_insertion_order() {
        let mut a = QueryParams::new();
        a.insert("b", 2);
        a.insert("a", 1);
        let b = QueryParams::new().with("a", 1).with("b", 2);

        let fa = RequestFingerprint::new("/files/X", &a);
        let fb = RequestFingerprint::new("/files/X", &b);
        assert_eq!(fa, fb);
        assert_eq!(fa.as_str(), "/files/X?a=1&b=2");
        assert_eq!(fa, RequestFingerprint::new("/files/X", &a));
    }

    #[test]
    fn fingerprint_without_params_is_the_path() {
        let fp = RequestFingerprint::new("/me", &QueryParams::new());
        assert_eq!(fp.as_str(), "/me");
        assert_ne!(
            fp,
            RequestFingerprint::new("/me", &QueryParams::new().with("x", 1))
        );
    }

    #[test]
    fn missing_key_is_absent() {
        let cache = ResponseCache::default();
        let fp = RequestFingerprint::new("/files/X", &QueryParams::new());
        assert!(cache.get(&fp).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn entries_expire_at_ttl() {
        let cache = ResponseCache::new(Duration::from_secs(300));
        let fp = RequestFingerprint::new("/files/X", &QueryParams::new());
        cache.set(fp.clone(), json!({"name": "Design"}));

        tokio::time::advance(Duration::from_secs(299)).await;
        assert_eq!(cache.get(&fp), Some(json!({"name": "Design"})));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(cache.get(&fp).is_none());
        // lazy expiry: stale entry is still counted
        assert_eq!(cache.stats().size, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn set_refreshes_stored_at() {
        let cache = ResponseCache::new(Duration::from_secs(10));
        let fp = RequestFingerprint::new("/me", &QueryParams::new());
        cache.set(fp.clone(), json!(1));
        tokio::time::advance(Duration::from_secs(8)).await;
        cache.set(fp.clone(), json!(2));
        tokio::time::advance(Duration::from_secs(8)).await;
        assert_eq!(cache.get(&fp), Some(json!(2)));
    }

    #[test]
    fn clear_empties_cache() {
        let cache = ResponseCache::default();
        cache.set(
            RequestFingerprint::new("/a", &QueryParams::new()),
            json!(true),
        );
        cache.set(
            RequestFingerprint::new("/b", &QueryParams::new()),
            json!(false),
        );
        assert_eq!(cache.stats().size, 2);
        cache.clear();
        assert_eq!(
            cache.stats(),
            CacheStats {
                size: 0,
                ttl: DEFAULT_CACHE_TTL
            }
        );
    }
}
