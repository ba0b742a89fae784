//! Response cache keyed by request fingerprint.
//!
//! Entries live in memory and are shared as `Arc<Value>`, so every reader of
//! a live entry sees the same payload object. With persistence enabled each
//! write is mirrored to `<cache>/responses/<fingerprint>.json`.
//!
//! # Features
//! - TTL checked against an injectable [`Clock`](crate::core::clock::Clock)
//! - Atomic writes using temp file + rename (prevents corruption)
//! - Graceful degradation on missing/corrupt cache files

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::core::clock::SharedClock;

/// A cached upstream payload.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Request fingerprint.
    pub key: String,
    /// Raw JSON payload as returned upstream.
    pub value: Arc<Value>,
    pub stored_at: DateTime<Utc>,
}

impl CacheEntry {
    /// True while the entry is younger than `ttl`.
    #[must_use]
    pub fn is_live(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        let ttl = TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX);
        now.signed_duration_since(self.stored_at) < ttl
    }
}

#[derive(Serialize, Deserialize)]
struct PersistedEntry {
    key: String,
    stored_at: DateTime<Utc>,
    value: Value,
}

/// Counters for cache behaviour.
#[derive(Debug, Default)]
pub struct CacheMetrics {
    pub hits: AtomicU64,
    pub misses: AtomicU64,
    pub writes: AtomicU64,
}

impl CacheMetrics {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            writes: AtomicU64::new(0),
        }
    }

    fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::Relaxed);
    }

}

/// Shared fingerprint-keyed cache. Last write wins.
#[derive(Debug)]
pub struct ResponseCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    clock: SharedClock,
    persist_dir: Option<PathBuf>,
    metrics: CacheMetrics,
}

impl ResponseCache {
    /// In-memory cache.
    #[must_use]
    pub fn new(clock: SharedClock) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            clock,
            persist_dir: None,
            metrics: CacheMetrics::new(),
        }
    }

    /// Cache that also mirrors entries into `dir`.
    #[must_use]
    pub fn with_persistence(clock: SharedClock, dir: PathBuf) -> Self {
        Self {
            persist_dir: Some(dir),
            ..Self::new(clock)
        }
    }

    /// Live entry for `key`, if any.
    pub fn get(&self, key: &str, ttl: Duration) -> Option<CacheEntry> {
        let now = self.clock.now();

        let in_memory = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned();

        let entry = match in_memory {
            Some(entry) => Some(entry),
            None => self.load_persisted(key),
        };

        match entry {
            Some(entry) if entry.is_live(now, ttl) => {
                self.metrics.record_hit();
                tracing::debug!(key = short(key), stored_at = %entry.stored_at, "Cache hit");
                Some(entry)
            }
            Some(entry) => {
                self.metrics.record_miss();
                tracing::debug!(key = short(key), stored_at = %entry.stored_at, "Cache entry expired");
                None
            }
            None => {
                self.metrics.record_miss();
                tracing::debug!(key = short(key), "Cache miss");
                None
            }
        }
    }

    /// Store `value` under `key` stamped with the current time.
    pub fn put(&self, key: &str, value: Arc<Value>) -> CacheEntry {
        let entry = CacheEntry {
            key: key.to_string(),
            value,
            stored_at: self.clock.now(),
        };

        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), entry.clone());
        self.metrics.record_write();

        if let Some(dir) = &self.persist_dir
            && let Err(e) = persist(dir, &entry)
        {
            tracing::warn!(key = short(key), error = %e, "Failed to persist cache entry");
        }

        entry
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub const fn metrics(&self) -> &CacheMetrics {
        &self.metrics
    }

    fn load_persisted(&self, key: &str) -> Option<CacheEntry> {
        let dir = self.persist_dir.as_ref()?;
        let path = entry_path(dir, key);
        let content = std::fs::read_to_string(&path).ok()?;
        let persisted: PersistedEntry = match serde_json::from_str(&content) {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(?path, error = %e, "Ignoring corrupt cache file");
                return None;
            }
        };
        if persisted.key != key {
            return None;
        }

        let entry = CacheEntry {
            key: persisted.key,
            value: Arc::new(persisted.value),
            stored_at: persisted.stored_at,
        };
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(key.to_string())
            .or_insert_with(|| entry.clone());
        Some(entry)
    }
}

/// Fingerprint a request: SHA-256 over the service, endpoint and the
/// parameters sorted by key, with values trimmed, whitespace-collapsed and
/// lowercased.
#[must_use]
pub fn fingerprint(service: &str, endpoint: &str, params: &[(String, String)]) -> String {
    let mut normalized: Vec<(&str, String)> = params
        .iter()
        .map(|(k, v)| {
            (
                k.as_str(),
                v.split_whitespace()
                    .collect::<Vec<_>>()
                    .join(" ")
                    .to_lowercase(),
            )
        })
        .collect();
    normalized.sort();

    let mut hasher = Sha256::new();
    hasher.update(service.as_bytes());
    hasher.update(b"\n");
    hasher.update(endpoint.as_bytes());
    for (k, v) in &normalized {
        hasher.update(b"\n");
        hasher.update(k.as_bytes());
        hasher.update(b"=");
        hasher.update(v.as_bytes());
    }
    hex::encode(hasher.finalize())
}

fn short(key: &str) -> &str {
    key.get(..12).unwrap_or(key)
}

fn entry_path(dir: &Path, key: &str) -> PathBuf {
    dir.join(format!("{key}.json"))
}

fn persist(dir: &Path, entry: &CacheEntry) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)?;
    let persisted = PersistedEntry {
        key: entry.key.clone(),
        stored_at: entry.stored_at,
        value: (*entry.value).clone(),
    };
    let content = serde_json::to_vec(&persisted)?;
    write_atomic(&entry_path(dir, &entry.key), &content)
}

/// Write bytes atomically using temp file + rename.
fn write_atomic(path: &Path, content: &[u8]) -> std::io::Result<()> {
    // Temp file must share the target's directory for rename to be atomic
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    let temp_path = parent.join(format!(
        ".{}.tmp.{}",
        path.file_name().and_then(|n| n.to_str()).unwrap_or("cache"),
        std::process::id()
    ));

    {
        let mut file = std::fs::File::create(&temp_path)?;
        file.write_all(content)?;
        file.sync_all()?;
    }

    std::fs::rename(&temp_path, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::ManualClock;
    use chrono::Duration as ChronoDuration;
    use serde_json::json;
    use tempfile::TempDir;

    const TWO_HOURS: Duration = Duration::from_secs(7200);

    fn clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(
            DateTime::parse_from_rfc3339("2026-02-01T10:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
        ))
    }

    fn params(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn fingerprint_normalizes_values_and_order() {
        let a = fingerprint(
            "rentcast",
            "/properties",
            &params(&[("address", "  123 Main St,   Springfield "), ("limit", "1")]),
        );
        let b = fingerprint(
            "rentcast",
            "/properties",
            &params(&[("limit", "1"), ("address", "123 MAIN ST, springfield")]),
        );
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn fingerprint_separates_services_and_endpoints() {
        let p = params(&[("address", "1 A St, B")]);
        assert_ne!(
            fingerprint("rentcast", "/properties", &p),
            fingerprint("supabase", "/properties", &p)
        );
        assert_ne!(
            fingerprint("rentcast", "/properties", &p),
            fingerprint("rentcast", "/avm/value", &p)
        );
    }

    #[test]
    fn live_entry_is_shared() {
        let clock = clock();
        let cache = ResponseCache::new(clock.clone());
        let stored = cache.put("k", Arc::new(json!([{"id": 1}])));

        clock.advance(ChronoDuration::minutes(59));
        let hit = cache.get("k", TWO_HOURS).unwrap();
        assert!(Arc::ptr_eq(&hit.value, &stored.value));
        assert_eq!(cache.metrics().hits.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn expired_entry_is_absent_until_overwritten() {
        let clock = clock();
        let cache = ResponseCache::new(clock.clone());
        let first = cache.put("k", Arc::new(json!(1)));

        clock.advance(ChronoDuration::hours(2));
        assert!(cache.get("k", TWO_HOURS).is_none());

        let second = cache.put("k", Arc::new(json!(2)));
        assert!(second.stored_at > first.stored_at);
        assert_eq!(*cache.get("k", TWO_HOURS).unwrap().value, json!(2));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn persisted_entries_survive_a_new_instance() {
        let dir = TempDir::new().unwrap();
        let clock = clock();
        let cache = ResponseCache::with_persistence(clock.clone(), dir.path().to_path_buf());
        cache.put("abc", Arc::new(json!({"city": "Springfield"})));

        let reopened = ResponseCache::with_persistence(clock, dir.path().to_path_buf());
        let entry = reopened.get("abc", TWO_HOURS).unwrap();
        assert_eq!(entry.value["city"], "Springfield");
    }

    #[test]
    fn corrupt_persisted_file_is_a_miss() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("bad.json"), "{not json").unwrap();
        let cache = ResponseCache::with_persistence(clock(), dir.path().to_path_buf());
        assert!(cache.get("bad", TWO_HOURS).is_none());
    }

    #[test]
    fn atomic_write_leaves_no_temp_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("entry.json");
        write_atomic(&path, b"{}").unwrap();

        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names.len(), 1);
    }
}
