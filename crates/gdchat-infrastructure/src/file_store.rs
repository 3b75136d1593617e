//! File-backed key-value store with a background writer.
//!
//! Each key lives in its own file under the store directory. Writes go
//! through a dedicated thread so callers never wait on the disk:
//!
//! - **Atomicity**: every write lands in a tmp file that is renamed over the target
//! - **Durability**: the tmp file is fsynced before the rename
//! - **Ordering**: operations are applied in submission order (last write wins)
//!
//! Reads are served from an in-memory cache that reflects every accepted
//! write immediately, whether or not the writer has caught up.

use gdchat_core::error::{ChatError, Result};
use gdchat_core::history_store::KeyValueStore;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Write as IoWrite;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::thread::JoinHandle;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

const FILE_EXTENSION: &str = "json";

enum WriteOp {
    Put { path: PathBuf, value: String },
    Remove { path: PathBuf },
}

/// [`KeyValueStore`] persisting one file per key.
pub struct FileKeyValueStore {
    dir: PathBuf,
    /// `None` marks a key known to be absent.
    cache: Mutex<HashMap<String, Option<String>>>,
    sender: Option<UnboundedSender<WriteOp>>,
    writer: Option<JoinHandle<()>>,
}

impl FileKeyValueStore {
    /// Opens (creating if needed) the store rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;

        let (sender, receiver) = mpsc::unbounded_channel();
        let writer = std::thread::Builder::new()
            .name("gdchat-store-writer".to_string())
            .spawn(move || run_writer(receiver))?;

        tracing::debug!("[FileStore] Opened {}", dir.display());
        Ok(Self {
            dir,
            cache: Mutex::new(HashMap::new()),
            sender: Some(sender),
            writer: Some(writer),
        })
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(ChatError::storage(format!("invalid key: {key:?}")));
        }
        Ok(self.dir.join(format!("{key}.{FILE_EXTENSION}")))
    }

    fn cache(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Option<String>>>> {
        self.cache
            .lock()
            .map_err(|e| ChatError::storage(format!("store cache poisoned: {e}")))
    }

    fn submit(&self, op: WriteOp) -> Result<()> {
        self.sender
            .as_ref()
            .ok_or_else(|| ChatError::storage("store writer stopped"))?
            .send(op)
            .map_err(|_| ChatError::storage("store writer stopped"))
    }
}

impl KeyValueStore for FileKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key)?;
        let mut cache = self.cache()?;
        if let Some(cached) = cache.get(key) {
            return Ok(cached.clone());
        }

        let value = match fs::read_to_string(&path) {
            Ok(content) => Some(content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };
        cache.insert(key.to_string(), value.clone());
        Ok(value)
    }

    fn set(&self, key: &str, value: String) -> Result<()> {
        let path = self.path_for(key)?;
        // Cache and queue under one lock so both see the same order.
        let mut cache = self.cache()?;
        cache.insert(key.to_string(), Some(value.clone()));
        self.submit(WriteOp::Put { path, value })
    }

    fn remove(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        let mut cache = self.cache()?;
        cache.insert(key.to_string(), None);
        self.submit(WriteOp::Remove { path })
    }
}

impl Drop for FileKeyValueStore {
    fn drop(&mut self) {
        // Closing the channel lets the writer drain what is queued and exit.
        self.sender.take();
        if let Some(writer) = self.writer.take()
            && writer.join().is_err()
        {
            tracing::error!("[FileStore] Writer thread panicked");
        }
    }
}

fn run_writer(mut receiver: UnboundedReceiver<WriteOp>) {
    while let Some(op) = receiver.blocking_recv() {
        let result = match &op {
            WriteOp::Put { path, value } => write_atomic(path, value),
            WriteOp::Remove { path } => remove_if_exists(path),
        };
        if let Err(e) = result {
            let path = match &op {
                WriteOp::Put { path, .. } | WriteOp::Remove { path } => path,
            };
            tracing::warn!("[FileStore] Write to {} failed: {}", path.display(), e);
        }
    }
    tracing::debug!("[FileStore] Writer drained");
}

fn write_atomic(path: &Path, value: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let tmp_path = path.with_extension(format!("{FILE_EXTENSION}.tmp"));
    let mut tmp_file = File::create(&tmp_path)?;
    tmp_file.write_all(value.as_bytes())?;
    tmp_file.sync_all()?;
    drop(tmp_file);

    fs::rename(&tmp_path, path)
}

fn remove_if_exists(path: &Path) -> std::io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}
