//! In-process store with Redis-like semantics.
//!
//! Backs the `memory` backend and the test suite. Keys hold either a string
//! or a hash, exactly as in Redis, and `scan` understands Redis glob syntax.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::store::{KvStore, StoreError, StoreResult, StoredValue};

#[derive(Debug, Clone)]
enum Slot {
    Text(String),
    Fields(HashMap<String, String>),
    Other(&'static str),
}

/// A thread-safe map of key → value, cheap to clone and share.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<DashMap<String, Slot>>,
    offline: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a string value.
    pub fn insert_text(&self, key: impl Into<String>, value: impl Into<String>) {
        self.inner.insert(key.into(), Slot::Text(value.into()));
    }

    /// Seed a hash value.
    pub fn insert_fields<K, V>(&self, key: impl Into<String>, fields: impl IntoIterator<Item = (K, V)>)
    where
        K: Into<String>,
        V: Into<String>,
    {
        let fields = fields.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        self.inner.insert(key.into(), Slot::Fields(fields));
    }

    /// Seed a key of a type records are never stored as.
    pub fn insert_list(&self, key: impl Into<String>) {
        self.inner.insert(key.into(), Slot::Other("list"));
    }

    /// Make every operation fail with [`StoreError::Offline`] (fault injection).
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    fn check_online(&self) -> StoreResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            Err(StoreError::Offline)
        } else {
            Ok(())
        }
    }
}

impl KvStore for MemoryStore {
    async fn fetch(&self, key: &str) -> StoreResult<StoredValue> {
        self.check_online()?;
        let value = match self.inner.get(key).map(|e| e.value().clone()) {
            None => StoredValue::Absent,
            Some(Slot::Text(text)) => StoredValue::Text(text),
            Some(Slot::Fields(fields)) => StoredValue::Fields(fields),
            Some(Slot::Other(kind)) => StoredValue::Other(kind.to_string()),
        };
        Ok(value)
    }

    async fn scan(&self, pattern: &str, limit: usize) -> StoreResult<Vec<String>> {
        self.check_online()?;
        let pattern: Vec<char> = pattern.chars().collect();
        let keys = self
            .inner
            .iter()
            .filter(|e| {
                let key: Vec<char> = e.key().chars().collect();
                glob_match(&pattern, &key)
            })
            .map(|e| e.key().clone())
            .take(limit)
            .collect();
        Ok(keys)
    }

    async fn set_string(&self, key: &str, value: &str) -> StoreResult<()> {
        self.check_online()?;
        self.insert_text(key, value);
        Ok(())
    }

    async fn set_string_if_absent(&self, key: &str, value: &str) -> StoreResult<bool> {
        self.check_online()?;
        match self.inner.entry(key.to_string()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(Slot::Text(value.to_string()));
                Ok(true)
            }
        }
    }

    async fn set_fields(&self, key: &str, fields: &[(String, String)]) -> StoreResult<()> {
        self.check_online()?;
        let mut entry = self
            .inner
            .entry(key.to_string())
            .or_insert_with(|| Slot::Fields(HashMap::new()));
        match entry.value_mut() {
            Slot::Fields(existing) => {
                existing.extend(fields.iter().cloned());
                Ok(())
            }
            _ => Err(StoreError::WrongType(key.to_string())),
        }
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        self.check_online()?;
        Ok(self.inner.remove(key).is_some())
    }

    async fn ping(&self) -> StoreResult<()> {
        self.check_online()
    }
}

/// Redis glob matching: `*`, `?`, `[abc]`, `[a-z]`, `[^a]` and `\` escapes.
fn glob_match(pattern: &[char], text: &[char]) -> bool {
    match pattern.first() {
        None => text.is_empty(),
        Some('*') => {
            let rest = &pattern[1..];
            (0..=text.len()).any(|i| glob_match(rest, &text[i..]))
        }
        Some('?') => !text.is_empty() && glob_match(&pattern[1..], &text[1..]),
        Some('[') => {
            let Some(&c) = text.first() else {
                return false;
            };
            match match_class(&pattern[1..], c) {
                Some((matched, consumed)) => matched && glob_match(&pattern[1 + consumed..], &text[1..]),
                // Unterminated class: treat '[' literally.
                None => c == '[' && glob_match(&pattern[1..], &text[1..]),
            }
        }
        Some('\\') if pattern.len() > 1 => {
            text.first() == Some(&pattern[1]) && glob_match(&pattern[2..], &text[1..])
        }
        Some(&p) => text.first() == Some(&p) && glob_match(&pattern[1..], &text[1..]),
    }
}

/// Match `c` against a class body (after `[`). Returns the result and how
/// many pattern chars the class used, including the closing `]`.
fn match_class(class: &[char], c: char) -> Option<(bool, usize)> {
    let mut i = 0;
    let negate = class.first() == Some(&'^');
    if negate {
        i += 1;
    }
    let mut matched = false;

    while i < class.len() {
        match class[i] {
            ']' => return Some((matched != negate, i + 1)),
            '\\' if i + 1 < class.len() => {
                matched |= class[i + 1] == c;
                i += 2;
            }
            lo if i + 2 < class.len() && class[i + 1] == '-' && class[i + 2] != ']' => {
                let hi = class[i + 2];
                matched |= (lo..=hi).contains(&c);
                i += 3;
            }
            other => {
                matched |= other == c;
                i += 1;
            }
        }
    }
    None
}
