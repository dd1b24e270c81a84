//! Content-addressed cache of completion-call payloads
//!
//! Keys are derived from (model, temperature, prompt hash, query hash).
//! Entries carry a TTL (default 7 days) and are deleted lazily on lookup
//! once expired. Cache failures never fail a request: a failed read is a
//! miss, a failed write is dropped with a warning.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;

/// Default TTL: 7 days
pub const DEFAULT_TTL_SECONDS: i64 = 604_800;

/// Cumulative hit/miss accounting
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct CacheStats {
    pub total_requests: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        if self.total_requests == 0 {
            return 0.0;
        }
        self.cache_hits as f64 / self.total_requests as f64
    }
}

struct CacheInner {
    conn: Connection,
    stats: CacheStats,
}

/// Persistent semantic cache backed by an embedded sqlite store
///
/// A single lock guards the connection and the read-modify-write of hit
/// counts; that is sufficient for the concurrent get/set traffic of
/// in-flight requests.
pub struct SemanticCache {
    inner: Mutex<CacheInner>,
    db_path: PathBuf,
    default_ttl: i64,
}

impl SemanticCache {
    /// Open (or create) the cache under `cache_dir`
    pub fn open(cache_dir: &Path) -> rusqlite::Result<Self> {
        if let Err(e) = std::fs::create_dir_all(cache_dir) {
            warn!("failed to create cache directory: {}", e);
        }
        let db_path = cache_dir.join("semantic_cache.db");
        let conn = Connection::open(&db_path)?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS cache_entries (
                key_hash     TEXT PRIMARY KEY,
                model        TEXT NOT NULL,
                temperature  REAL NOT NULL,
                prompt_hash  TEXT NOT NULL,
                query_hash   TEXT NOT NULL,
                payload      TEXT NOT NULL,
                created_at   INTEGER NOT NULL,
                ttl_seconds  INTEGER NOT NULL,
                hit_count    INTEGER NOT NULL DEFAULT 0
            );
            CREATE INDEX IF NOT EXISTS idx_created_ttl
                ON cache_entries (created_at, ttl_seconds);",
        )?;

        Ok(Self {
            inner: Mutex::new(CacheInner {
                conn,
                stats: CacheStats::default(),
            }),
            db_path,
            default_ttl: DEFAULT_TTL_SECONDS,
        })
    }

    /// Open with a non-default TTL (mostly for tests)
    pub fn open_with_ttl(cache_dir: &Path, ttl_seconds: i64) -> rusqlite::Result<Self> {
        let mut cache = Self::open(cache_dir)?;
        cache.default_ttl = ttl_seconds;
        Ok(cache)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Look up a cached payload; expired entries are deleted and count as
    /// misses
    pub fn get(&self, model: &str, temperature: f32, prompt: &str, query: &str) -> Option<String> {
        let key_hash = derive_key(model, temperature, prompt, query);
        let mut inner = self.inner.lock().ok()?;
        inner.stats.total_requests += 1;

        let row = inner
            .conn
            .query_row(
                "SELECT payload, created_at, ttl_seconds, hit_count
                 FROM cache_entries WHERE key_hash = ?1",
                params![key_hash],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, i64>(3)?,
                    ))
                },
            )
            .optional();

        let row = match row {
            Ok(row) => row,
            Err(e) => {
                warn!("cache read failed, treating as miss: {}", e);
                inner.stats.cache_misses += 1;
                return None;
            }
        };

        let Some((payload, created_at, ttl_seconds, hit_count)) = row else {
            inner.stats.cache_misses += 1;
            return None;
        };

        let now = Utc::now().timestamp();
        if now - created_at > ttl_seconds {
            if let Err(e) = inner
                .conn
                .execute("DELETE FROM cache_entries WHERE key_hash = ?1", params![key_hash])
            {
                warn!("failed to delete expired cache entry: {}", e);
            }
            inner.stats.cache_misses += 1;
            return None;
        }

        if let Err(e) = inner.conn.execute(
            "UPDATE cache_entries SET hit_count = ?1 WHERE key_hash = ?2",
            params![hit_count + 1, key_hash],
        ) {
            warn!("failed to bump cache hit count: {}", e);
        }

        inner.stats.cache_hits += 1;
        Some(payload)
    }

    /// Store a payload, overwriting any existing entry for the same key
    pub fn set(
        &self,
        model: &str,
        temperature: f32,
        prompt: &str,
        payload: &str,
        query: &str,
        ttl_seconds: Option<i64>,
    ) -> bool {
        let key_hash = derive_key(model, temperature, prompt, query);
        let prompt_hash = short_hash(prompt);
        let query_hash = short_hash(query);
        let ttl = ttl_seconds.unwrap_or(self.default_ttl);

        let Ok(inner) = self.inner.lock() else {
            return false;
        };

        let result = inner.conn.execute(
            "INSERT OR REPLACE INTO cache_entries
             (key_hash, model, temperature, prompt_hash, query_hash,
              payload, created_at, ttl_seconds, hit_count)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 0)",
            params![
                key_hash,
                model,
                temperature as f64,
                prompt_hash,
                query_hash,
                payload,
                Utc::now().timestamp(),
                ttl
            ],
        );

        match result {
            Ok(_) => true,
            Err(e) => {
                warn!("cache write failed: {}", e);
                false
            }
        }
    }

    /// Scan all entries and delete the expired ones; returns how many were
    /// removed
    pub fn cleanup_expired(&self) -> usize {
        let Ok(inner) = self.inner.lock() else {
            return 0;
        };
        let now = Utc::now().timestamp();
        match inner.conn.execute(
            "DELETE FROM cache_entries WHERE ?1 - created_at > ttl_seconds",
            params![now],
        ) {
            Ok(count) => count,
            Err(e) => {
                warn!("cache cleanup failed: {}", e);
                0
            }
        }
    }

    /// Drop every entry and reset the counters
    pub fn clear(&self) -> bool {
        let Ok(mut inner) = self.inner.lock() else {
            return false;
        };
        match inner.conn.execute("DELETE FROM cache_entries", []) {
            Ok(_) => {
                inner.stats = CacheStats::default();
                true
            }
            Err(e) => {
                warn!("cache clear failed: {}", e);
                false
            }
        }
    }

    pub fn stats(&self) -> CacheStats {
        self.inner
            .lock()
            .map(|inner| inner.stats)
            .unwrap_or_default()
    }

    /// Number of live rows (diagnostics only)
    pub fn entry_count(&self) -> usize {
        let Ok(inner) = self.inner.lock() else {
            return 0;
        };
        inner
            .conn
            .query_row("SELECT COUNT(*) FROM cache_entries", [], |row| {
                row.get::<_, i64>(0)
            })
            .map(|n| n as usize)
            .unwrap_or(0)
    }

    /// Hit count of a specific entry (diagnostics and tests)
    pub fn hit_count(&self, model: &str, temperature: f32, prompt: &str, query: &str) -> i64 {
        let key_hash = derive_key(model, temperature, prompt, query);
        let Ok(inner) = self.inner.lock() else {
            return 0;
        };
        inner
            .conn
            .query_row(
                "SELECT hit_count FROM cache_entries WHERE key_hash = ?1",
                params![key_hash],
                |row| row.get::<_, i64>(0),
            )
            .unwrap_or(0)
    }
}

fn short_hash(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    hex::encode(&digest[..8])
}

/// Stable key over (model, temperature, prompt hash, query hash)
fn derive_key(model: &str, temperature: f32, prompt: &str, query: &str) -> String {
    let key_source = format!(
        "{}:{:.2}:{}:{}",
        model,
        temperature,
        short_hash(prompt),
        short_hash(query)
    );
    let digest = Sha256::digest(key_source.as_bytes());
    hex::encode(&digest[..16])
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_cache() -> (SemanticCache, TempDir) {
        let dir = TempDir::new().unwrap();
        let cache = SemanticCache::open(dir.path()).unwrap();
        (cache, dir)
    }

    #[test]
    fn test_set_then_get_roundtrip() {
        let (cache, _dir) = open_cache();
        assert!(cache.set("m", 0.7, "prompt", "payload", "query", None));

        let hit = cache.get("m", 0.7, "prompt", "query");
        assert_eq!(hit.as_deref(), Some("payload"));
        assert_eq!(cache.hit_count("m", 0.7, "prompt", "query"), 1);

        cache.get("m", 0.7, "prompt", "query");
        assert_eq!(cache.hit_count("m", 0.7, "prompt", "query"), 2);
    }

    #[test]
    fn test_miss_on_absent_key() {
        let (cache, _dir) = open_cache();
        assert!(cache.get("m", 0.7, "prompt", "query").is_none());

        let stats = cache.stats();
        assert_eq!(stats.total_requests, 1);
        assert_eq!(stats.cache_misses, 1);
        assert_eq!(stats.cache_hits, 0);
    }

    #[test]
    fn test_key_varies_with_temperature() {
        let (cache, _dir) = open_cache();
        cache.set("m", 0.1, "prompt", "cold", "query", None);
        cache.set("m", 0.9, "prompt", "hot", "query", None);

        assert_eq!(cache.get("m", 0.1, "prompt", "query").as_deref(), Some("cold"));
        assert_eq!(cache.get("m", 0.9, "prompt", "query").as_deref(), Some("hot"));
    }

    #[test]
    fn test_expired_entry_is_deleted_on_lookup() {
        let (cache, _dir) = open_cache();
        // ttl of -1 seconds is already expired
        cache.set("m", 0.7, "prompt", "payload", "query", Some(-1));

        assert!(cache.get("m", 0.7, "prompt", "query").is_none());
        assert_eq!(cache.entry_count(), 0);
    }

    #[test]
    fn test_unexpired_entry_survives() {
        let (cache, _dir) = open_cache();
        cache.set("m", 0.7, "prompt", "payload", "query", Some(3600));
        assert!(cache.get("m", 0.7, "prompt", "query").is_some());
    }

    #[test]
    fn test_overwrite_replaces_payload() {
        let (cache, _dir) = open_cache();
        cache.set("m", 0.7, "prompt", "first", "query", None);
        cache.set("m", 0.7, "prompt", "second", "query", None);
        assert_eq!(cache.get("m", 0.7, "prompt", "query").as_deref(), Some("second"));
    }

    #[test]
    fn test_cleanup_expired_counts() {
        let (cache, _dir) = open_cache();
        cache.set("m", 0.7, "p1", "a", "q1", Some(-1));
        cache.set("m", 0.7, "p2", "b", "q2", Some(-1));
        cache.set("m", 0.7, "p3", "c", "q3", Some(3600));

        assert_eq!(cache.cleanup_expired(), 2);
        assert_eq!(cache.entry_count(), 1);
    }

    #[test]
    fn test_clear_resets_everything() {
        let (cache, _dir) = open_cache();
        cache.set("m", 0.7, "prompt", "payload", "query", None);
        cache.get("m", 0.7, "prompt", "query");

        assert!(cache.clear());
        assert_eq!(cache.entry_count(), 0);
        assert_eq!(cache.stats().total_requests, 0);
    }

    #[test]
    fn test_hit_rate() {
        let (cache, _dir) = open_cache();
        cache.set("m", 0.7, "prompt", "payload", "query", None);
        cache.get("m", 0.7, "prompt", "query"); // hit
        cache.get("m", 0.7, "other", "query"); // miss

        let stats = cache.stats();
        assert_eq!(stats.total_requests, 2);
        assert!((stats.hit_rate() - 0.5).abs() < f64::EPSILON);
    }
}
