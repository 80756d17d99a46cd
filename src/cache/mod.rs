use crate::error::{NotesError, Result};
use crate::types::NotesPayload;
use async_trait::async_trait;

/// Content-addressed cache key for a document reference.
///
/// The raw key is hashed so cache keys stay bounded in length and charset
/// regardless of what clients put in object keys.
pub fn cache_key(file_key: &str) -> String {
    format!("notes:{:x}", md5::compute(file_key))
}

/// Decode a stored cache value. Corrupted payloads are treated as a cache
/// miss, never surfaced as errors.
pub fn decode_payload(raw: &str) -> Option<NotesPayload> {
    serde_json::from_str(raw).ok()
}

/// TTL-bounded store of previously computed notes, keyed by fingerprint.
///
/// No locking: concurrent writers for the same fingerprint may race and the
/// last write wins, which is acceptable because the value is idempotent
/// given the same input.
#[async_trait]
pub trait ResultCache: Send + Sync {
    /// Last-written value for the fingerprint, or None when absent/expired/corrupt
    async fn get(&self, key: &str) -> Result<Option<NotesPayload>>;

    /// Store a value, expiring after `ttl_secs`
    async fn set(&self, key: &str, value: &NotesPayload, ttl_secs: u64) -> Result<()>;
}

/// Redis-backed result cache (`SET key value EX ttl` / `GET key`)
pub struct RedisCache {
    conn: redis::aio::MultiplexedConnection,
}

impl RedisCache {
    /// Connect to the cache. The connection is multiplexed and long-lived;
    /// it is opened once at worker start.
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)
            .map_err(|e| NotesError::Cache(format!("Failed to create Redis client: {}", e)))?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| NotesError::Cache(format!("Failed to connect to Redis: {}", e)))?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl ResultCache for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<NotesPayload>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = redis::cmd("GET")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| NotesError::Cache(format!("GET {} failed: {}", key, e)))?;

        Ok(raw.as_deref().and_then(decode_payload))
    }

    async fn set(&self, key: &str, value: &NotesPayload, ttl_secs: u64) -> Result<()> {
        let body = serde_json::to_string(value)
            .map_err(|e| NotesError::Cache(format!("Failed to serialize cache value: {}", e)))?;

        let mut conn = self.conn.clone();
        let _: () = redis::cmd("SET")
            .arg(key)
            .arg(body)
            .arg("EX")
            .arg(ttl_secs)
            .query_async(&mut conn)
            .await
            .map_err(|e| NotesError::Cache(format!("SET {} failed: {}", key, e)))?;

        Ok(())
    }
}
