//! Persistent history over a string key-value seam.
//!
//! Loading never fails: a missing, malformed or unparsable history is
//! treated as empty and the corrupt entry is removed. Saving never fails
//! either; errors are logged and the chat keeps going.

use crate::error::{ChatError, Result};
use crate::message::Message;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

pub const HISTORY_KEY: &str = "gdchat_history";
pub const LAST_SEND_KEY: &str = "gdchat_last_send_time";

/// A durable string-keyed, string-valued store scoped to this client.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Stores `value` under `key`. Implementations may persist asynchronously.
    fn set(&self, key: &str, value: String) -> Result<()>;

    fn remove(&self, key: &str) -> Result<()>;
}

/// Volatile store, used when persistence is disabled and in tests.
#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.entries
            .lock()
            .map_err(|e| ChatError::storage(format!("memory store poisoned: {e}")))
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: String) -> Result<()> {
        self.lock()?.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.lock()?.remove(key);
        Ok(())
    }
}

/// What survived from the previous run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadedHistory {
    pub messages: Vec<Message>,
    pub last_send_ms: i64,
}

/// Reads and writes the conversation log and the last-send timestamp.
#[derive(Clone)]
pub struct HistoryStore {
    kv: Arc<dyn KeyValueStore>,
    max_messages: usize,
}

impl HistoryStore {
    pub fn new(kv: Arc<dyn KeyValueStore>, max_messages: usize) -> Self {
        Self { kv, max_messages }
    }

    pub fn load(&self) -> LoadedHistory {
        LoadedHistory {
            messages: self.load_messages(),
            last_send_ms: self.load_last_send(),
        }
    }

    fn load_messages(&self) -> Vec<Message> {
        let raw = match self.kv.get(HISTORY_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                tracing::warn!("[HistoryStore] Failed to read history: {}", e);
                return Vec::new();
            }
        };

        match serde_json::from_str::<Vec<Message>>(&raw) {
            Ok(mut messages) => {
                if messages.len() > self.max_messages {
                    messages.drain(..messages.len() - self.max_messages);
                }
                tracing::info!("[HistoryStore] Restored {} message(s)", messages.len());
                messages
            }
            Err(e) => {
                tracing::warn!("[HistoryStore] Discarding corrupt history: {}", e);
                if let Err(e) = self.kv.remove(HISTORY_KEY) {
                    tracing::warn!("[HistoryStore] Failed to remove corrupt history: {}", e);
                }
                Vec::new()
            }
        }
    }

    fn load_last_send(&self) -> i64 {
        match self.kv.get(LAST_SEND_KEY) {
            Ok(Some(raw)) => raw.trim().parse().unwrap_or(0),
            Ok(None) => 0,
            Err(e) => {
                tracing::warn!("[HistoryStore] Failed to read last send time: {}", e);
                0
            }
        }
    }

    /// Persists the newest `max_messages` entries of `messages`.
    pub fn save<'a, I>(&self, messages: I)
    where
        I: IntoIterator<Item = &'a Message>,
        I::IntoIter: ExactSizeIterator,
    {
        let iter = messages.into_iter();
        let skip = iter.len().saturating_sub(self.max_messages);
        let kept: Vec<&Message> = iter.skip(skip).collect();

        let result = serde_json::to_string(&kept)
            .map_err(ChatError::from)
            .and_then(|json| self.kv.set(HISTORY_KEY, json));
        if let Err(e) = result {
            tracing::warn!("[HistoryStore] Failed to save history: {}", e);
        }
    }

    pub fn save_last_send(&self, millis: i64) {
        if let Err(e) = self.kv.set(LAST_SEND_KEY, millis.to_string()) {
            tracing::warn!("[HistoryStore] Failed to save last send time: {}", e);
        }
    }

    /// Drops the stored conversation. The last-send timestamp is kept so a
    /// clear cannot be used to skip the rate limit.
    pub fn clear(&self) {
        if let Err(e) = self.kv.remove(HISTORY_KEY) {
            tracing::warn!("[HistoryStore] Failed to clear history: {}", e);
        }
    }
}
