//! Redis-backed store.
//!
//! Works against a self-hosted Redis or a Redis-protocol service such as
//! Upstash (`rediss://` URLs).

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use redis::{
    aio::{ConnectionManager, ConnectionManagerConfig},
    AsyncCommands, Client,
};

use crate::config::StoreConfig;
use crate::store::{KvStore, StoreResult, StoredValue};

/// `COUNT` hint passed to each `SCAN` step.
const SCAN_BATCH: usize = 200;

#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    pub async fn connect(config: &StoreConfig) -> StoreResult<Self> {
        let manager_config = ConnectionManagerConfig::new()
            .set_number_of_retries(config.reconnect_retries)
            .set_connection_timeout(Duration::from_millis(config.connect_timeout_ms));

        let client = Client::open(config.redis_url.as_str())?;
        let conn = client
            .get_connection_manager_with_config(manager_config)
            .await?;

        tracing::info!(
            connect_timeout_ms = config.connect_timeout_ms,
            "Connected to redis"
        );
        Ok(Self { conn })
    }
}

impl KvStore for RedisStore {
    async fn fetch(&self, key: &str) -> StoreResult<StoredValue> {
        let mut conn = self.conn.clone();
        let kind: String = conn.key_type(key).await?;

        match kind.as_str() {
            "none" => Ok(StoredValue::Absent),
            "string" => {
                let text: Option<String> = conn.get(key).await?;
                Ok(text.map_or(StoredValue::Absent, StoredValue::Text))
            }
            "hash" => {
                let fields: HashMap<String, String> = conn.hgetall(key).await?;
                if fields.is_empty() {
                    Ok(StoredValue::Absent)
                } else {
                    Ok(StoredValue::Fields(fields))
                }
            }
            _ => Ok(StoredValue::Other(kind)),
        }
    }

    async fn scan(&self, pattern: &str, limit: usize) -> StoreResult<Vec<String>> {
        let mut conn = self.conn.clone();
        let mut keys = Vec::new();
        let mut seen = HashSet::new();
        let mut cursor: u64 = 0;

        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await?;

            if absorb_batch(&mut keys, &mut seen, batch, limit) {
                tracing::warn!(pattern, limit, "Scan limit reached, truncating");
                return Ok(keys);
            }

            if next == 0 {
                return Ok(keys);
            }
            cursor = next;
        }
    }

    async fn set_string(&self, key: &str, value: &str) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.set(key, value).await?;
        Ok(())
    }

    async fn set_string_if_absent(&self, key: &str, value: &str) -> StoreResult<bool> {
        let mut conn = self.conn.clone();
        let written: bool = conn.set_nx(key, value).await?;
        Ok(written)
    }

    async fn set_fields(&self, key: &str, fields: &[(String, String)]) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.hset_multiple(key, fields).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        let mut conn = self.conn.clone();
        let removed: i64 = conn.del(key).await?;
        Ok(removed > 0)
    }

    async fn ping(&self) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}

/// Append one `SCAN` batch, stopping at `limit`. Returns true once full.
///
/// Redis may return a key in more than one batch, so repeats are dropped.
fn absorb_batch(keys: &mut Vec<String>, seen: &mut HashSet<String>, batch: Vec<String>, limit: usize) -> bool {
    for key in batch {
        if keys.len() >= limit {
            return true;
        }
        if seen.insert(key.clone()) {
            keys.push(key);
        }
    }
    keys.len() >= limit
}
