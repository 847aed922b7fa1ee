//! Artifact persistence with per-path change detection.
//!
//! A path is rewritten only when the blake3 hash of the new contents differs
//! from the last contents written there (or, on first sight, from the file
//! already on disk).

use crate::{error::BuildError, log};
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::task::JoinSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStatus {
    Written,
    Unchanged,
}

#[derive(Debug)]
pub struct OutputWriter {
    root: PathBuf,
    hashes: RwLock<FxHashMap<PathBuf, blake3::Hash>>,
}

impl OutputWriter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            hashes: RwLock::new(FxHashMap::default()),
        }
    }

    /// Write `contents` to `rel` under the output root, creating parents.
    pub async fn write(&self, rel: &Path, contents: &[u8]) -> Result<WriteStatus, BuildError> {
        let path = self.root.join(rel);
        let hash = blake3::hash(contents);

        let known = self.hashes.read().get(&path).copied();
        if known == Some(hash) {
            return Ok(WriteStatus::Unchanged);
        }
        if known.is_none()
            && let Ok(existing) = tokio::fs::read(&path).await
            && blake3::hash(&existing) == hash
        {
            self.hashes.write().insert(path, hash);
            return Ok(WriteStatus::Unchanged);
        }

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|err| BuildError::Write(parent.to_path_buf(), err))?;
        }
        tokio::fs::write(&path, contents)
            .await
            .map_err(|err| BuildError::Write(path.clone(), err))?;

        self.hashes.write().insert(path, hash);
        Ok(WriteStatus::Written)
    }

    /// Copy a source file into the output tree.
    pub async fn copy(&self, from: &Path, rel: &Path) -> Result<WriteStatus, BuildError> {
        let contents = tokio::fs::read(from)
            .await
            .map_err(|err| BuildError::SourceMissing(from.to_path_buf(), err))?;
        self.write(rel, &contents).await
    }
}

// ============================================================================
// Background Writes
// ============================================================================

/// Fire-and-forget writes that must still finish before the build ends.
#[derive(Debug, Default)]
pub struct PendingWrites {
    tasks: Mutex<JoinSet<()>>,
}

impl PendingWrites {
    /// Queue a write; failures are logged, never returned.
    pub fn spawn(&self, writer: Arc<OutputWriter>, rel: PathBuf, contents: String) {
        self.tasks.lock().spawn(async move {
            match writer.write(&rel, contents.as_bytes()).await {
                Ok(WriteStatus::Written) => log!("write"; "{}", rel.display()),
                Ok(WriteStatus::Unchanged) => {}
                Err(err) => log!("error"; "{:#}", anyhow::Error::from(err)),
            }
        });
    }

    /// Await every queued write.
    pub async fn drain(&self) {
        let mut tasks = std::mem::take(&mut *self.tasks.lock());
        while let Some(result) = tasks.join_next().await {
            if let Err(err) = result {
                log!("error"; "background write failed: {err}");
            }
        }
    }
}
