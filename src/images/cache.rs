//! Persisted image dimension cache.
//!
//! Lookups hit an in-memory map loaded once from the JSON file. New entries
//! go to memory immediately and to disk through a single writer task that
//! drains a FIFO channel, re-reading and rewriting the file per entry.

use super::Dimensions;
use crate::log;
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};
use tokio::{sync::mpsc, task::JoinHandle};

type Entry = (String, Dimensions);

pub struct ImageCache {
    entries: RwLock<FxHashMap<String, Dimensions>>,
    queue: Mutex<Option<mpsc::UnboundedSender<Entry>>>,
    writer: Mutex<Option<JoinHandle<()>>>,
}

impl ImageCache {
    /// Load the cache file and start its writer. Must run inside a runtime.
    pub fn open(path: PathBuf) -> Self {
        let entries = read_entries(&path);
        let (tx, rx) = mpsc::unbounded_channel();
        let writer = tokio::spawn(write_entries(path, rx));
        Self {
            entries: RwLock::new(entries.into_iter().collect()),
            queue: Mutex::new(Some(tx)),
            writer: Mutex::new(Some(writer)),
        }
    }

    pub fn get(&self, src: &str) -> Option<Dimensions> {
        self.entries.read().get(src).copied()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Remember dimensions and queue them for the cache file.
    pub fn record(&self, src: &str, dims: Dimensions) {
        self.entries.write().insert(src.to_owned(), dims);
        if let Some(tx) = self.queue.lock().as_ref() {
            // receiver only goes away after `close`
            let _ = tx.send((src.to_owned(), dims));
        }
    }

    /// Flush queued entries and stop the writer.
    pub async fn close(&self) {
        self.queue.lock().take();
        let writer = self.writer.lock().take();
        if let Some(writer) = writer
            && let Err(err) = writer.await
        {
            log!("error"; "image cache writer failed: {err}");
        }
    }
}

fn read_entries(path: &Path) -> BTreeMap<String, Dimensions> {
    let Ok(content) = std::fs::read_to_string(path) else {
        return BTreeMap::new();
    };
    serde_json::from_str(&content).unwrap_or_else(|err| {
        log!("warn"; "ignoring unreadable image cache `{}`: {err}", path.display());
        BTreeMap::new()
    })
}

async fn write_entries(path: PathBuf, mut rx: mpsc::UnboundedReceiver<Entry>) {
    while let Some((src, dims)) = rx.recv().await {
        let mut entries = match tokio::fs::read_to_string(&path).await {
            Ok(content) => serde_json::from_str(&content).unwrap_or_default(),
            Err(_) => BTreeMap::new(),
        };
        entries.insert(src, dims);
        if let Err(err) = flush(&path, &entries).await {
            log!("warn"; "failed to write image cache `{}`: {err:#}", path.display());
        }
    }
}

async fn flush(path: &Path, entries: &BTreeMap<String, Dimensions>) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let json = serde_json::to_string_pretty(entries)?;
    tokio::fs::write(path, json).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_entries_persist_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache").join("images.json");

        let cache = ImageCache::open(path.clone());
        assert_eq!(cache.len(), 0);
        cache.record("https://x.test/a.png", Dimensions::new(10, 20));
        cache.record("https://x.test/b.png", Dimensions::new(30, 40));
        cache.record("https://x.test/a.png", Dimensions::new(11, 21));
        assert_eq!(cache.get("https://x.test/a.png"), Some(Dimensions::new(11, 21)));
        cache.close().await;

        let reopened = ImageCache::open(path.clone());
        assert_eq!(reopened.len(), 2);
        assert_eq!(reopened.get("https://x.test/a.png"), Some(Dimensions::new(11, 21)));
        assert_eq!(reopened.get("https://x.test/b.png"), Some(Dimensions::new(30, 40)));
        reopened.close().await;

        let json = std::fs::read_to_string(&path).unwrap();
        assert!(json.contains("\"width\": 30"));
    }

    #[tokio::test]
    async fn test_unreadable_cache_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("images.json");
        std::fs::write(&path, "not json").unwrap();

        let cache = ImageCache::open(path);
        assert_eq!(cache.get("anything"), None);
        cache.close().await;
    }
}
