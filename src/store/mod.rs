//! Key-value store subsystem.
//!
//! # Data Flow
//! ```text
//! newsletter resolver / mutations
//!     → KvStore trait (fetch, scan, writes)
//!     → Store (configured backend)
//!         → redis.rs  (ConnectionManager: TYPE + GET / HGETALL, SCAN MATCH)
//!         → memory.rs (DashMap, same semantics, glob scan)
//! ```
//!
//! A record is stored either as a string (JSON text) or as a hash (flat
//! field map). `fetch` reports which one it found so callers never issue a
//! command against the wrong Redis type.

pub mod memory;
pub mod redis;

use std::collections::HashMap;
use std::future::Future;

use thiserror::Error;

use crate::config::{StoreBackend, StoreConfig};

pub use self::memory::MemoryStore;
pub use self::redis::RedisStore;

/// Errors raised by the backing store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("redis error: {0}")]
    Redis(#[from] ::redis::RedisError),

    #[error("key {0} holds a value of the wrong type")]
    WrongType(String),

    #[error("store is offline")]
    Offline,
}

pub type StoreResult<T> = Result<T, StoreError>;

/// A value as it sits in the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoredValue {
    Absent,
    Text(String),
    Fields(HashMap<String, String>),
    /// A Redis type records are never stored as (list, set, zset, stream).
    Other(String),
}

/// Operations the newsletter layer needs from a key-value store.
pub trait KvStore: Send + Sync {
    /// Read a key in whichever representation it is stored.
    fn fetch(&self, key: &str) -> impl Future<Output = StoreResult<StoredValue>> + Send;

    /// Keys matching a Redis glob pattern, at most `limit` of them.
    fn scan(&self, pattern: &str, limit: usize) -> impl Future<Output = StoreResult<Vec<String>>> + Send;

    fn set_string(&self, key: &str, value: &str) -> impl Future<Output = StoreResult<()>> + Send;

    /// Set only when the key does not exist. Returns whether it was written.
    fn set_string_if_absent(&self, key: &str, value: &str) -> impl Future<Output = StoreResult<bool>> + Send;

    fn set_fields(&self, key: &str, fields: &[(String, String)]) -> impl Future<Output = StoreResult<()>> + Send;

    /// Returns whether a key was removed.
    fn delete(&self, key: &str) -> impl Future<Output = StoreResult<bool>> + Send;

    fn ping(&self) -> impl Future<Output = StoreResult<()>> + Send;
}

/// The store selected by configuration.
#[derive(Clone)]
pub enum Store {
    Redis(RedisStore),
    Memory(MemoryStore),
}

impl Store {
    /// Open the configured backend.
    pub async fn from_config(config: &StoreConfig) -> StoreResult<Self> {
        match config.backend {
            StoreBackend::Redis => Ok(Store::Redis(RedisStore::connect(config).await?)),
            StoreBackend::Memory => Ok(Store::Memory(MemoryStore::new())),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        match self {
            Store::Redis(_) => "redis",
            Store::Memory(_) => "memory",
        }
    }
}

impl From<MemoryStore> for Store {
    fn from(store: MemoryStore) -> Self {
        Store::Memory(store)
    }
}

impl KvStore for Store {
    async fn fetch(&self, key: &str) -> StoreResult<StoredValue> {
        match self {
            Store::Redis(s) => s.fetch(key).await,
            Store::Memory(s) => s.fetch(key).await,
        }
    }

    async fn scan(&self, pattern: &str, limit: usize) -> StoreResult<Vec<String>> {
        match self {
            Store::Redis(s) => s.scan(pattern, limit).await,
            Store::Memory(s) => s.scan(pattern, limit).await,
        }
    }

    async fn set_string(&self, key: &str, value: &str) -> StoreResult<()> {
        match self {
            Store::Redis(s) => s.set_string(key, value).await,
            Store::Memory(s) => s.set_string(key, value).await,
        }
    }

    async fn set_string_if_absent(&self, key: &str, value: &str) -> StoreResult<bool> {
        match self {
            Store::Redis(s) => s.set_string_if_absent(key, value).await,
            Store::Memory(s) => s.set_string_if_absent(key, value).await,
        }
    }

    async fn set_fields(&self, key: &str, fields: &[(String, String)]) -> StoreResult<()> {
        match self {
            Store::Redis(s) => s.set_fields(key, fields).await,
            Store::Memory(s) => s.set_fields(key, fields).await,
        }
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        match self {
            Store::Redis(s) => s.delete(key).await,
            Store::Memory(s) => s.delete(key).await,
        }
    }

    async fn ping(&self) -> StoreResult<()> {
        match self {
            Store::Redis(s) => s.ping().await,
            Store::Memory(s) => s.ping().await,
        }
    }
}
