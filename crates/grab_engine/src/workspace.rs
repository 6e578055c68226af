//! Per-user directory layout, the dedup record, and the per-user lock.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use engine_logging::{engine_debug, engine_warn};
use grab_core::{filename_for, DownloadRecord, MediaKind, UserId};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::persist::{ensure_dir, AtomicFileWriter, PersistError};

pub const RECORD_FILENAME: &str = "downloaded.json";

/// Directories and record location for one user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    pub user_id: UserId,
    pub root: PathBuf,
    pub videos_dir: PathBuf,
    pub images_dir: PathBuf,
}

impl Workspace {
    pub fn dir_for(&self, kind: MediaKind) -> &Path {
        match kind {
            MediaKind::Video => &self.videos_dir,
            MediaKind::Image => &self.images_dir,
        }
    }

    pub fn record_path(&self) -> PathBuf {
        self.root.join(RECORD_FILENAME)
    }

    /// First `{date}_story_{n}` name at or after `index` that is not on disk
    /// yet. Returns the index used together with the full path.
    pub fn free_slot(&self, kind: MediaKind, index: usize, date: NaiveDate) -> (usize, PathBuf) {
        let dir = self.dir_for(kind);
        let mut index = index;
        loop {
            let candidate = dir.join(filename_for(kind, index, date));
            if !candidate.exists() {
                return (index, candidate);
            }
            index += 1;
        }
    }

    /// Read the dedup record. A missing or unreadable record is an empty one.
    pub fn load_record(&self) -> DownloadRecord {
        let path = self.record_path();
        let content = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return DownloadRecord::new();
            }
            Err(err) => {
                engine_warn!("Failed to read download record {:?}: {}", path, err);
                return DownloadRecord::new();
            }
        };

        match serde_json::from_str(&content) {
            Ok(record) => record,
            Err(err) => {
                engine_warn!(
                    "Download record {:?} is corrupt, starting from empty: {}",
                    path,
                    err
                );
                DownloadRecord::new()
            }
        }
    }

    /// Replace the persisted record with `record`.
    pub fn save_record(&self, record: &DownloadRecord) -> Result<(), PersistError> {
        let content = serde_json::to_vec_pretty(record)?;
        AtomicFileWriter::new(self.root.clone()).write(RECORD_FILENAME, &content)?;
        Ok(())
    }
}

/// Maps user ids to workspaces under one output root.
#[derive(Debug, Clone)]
pub struct WorkspaceManager {
    output_root: PathBuf,
}

impl WorkspaceManager {
    pub fn new(output_root: impl Into<PathBuf>) -> Self {
        Self {
            output_root: output_root.into(),
        }
    }

    /// Create (if needed) `<root>/<user>/{videos,images}`.
    pub fn open(&self, user_id: &UserId) -> Result<Workspace, PersistError> {
        let root = self.output_root.join(user_id.as_str());
        let workspace = Workspace {
            user_id: user_id.clone(),
            videos_dir: root.join(MediaKind::Video.dir_name()),
            images_dir: root.join(MediaKind::Image.dir_name()),
            root,
        };
        ensure_dir(&workspace.root)?;
        ensure_dir(&workspace.videos_dir)?;
        ensure_dir(&workspace.images_dir)?;
        engine_debug!("Workspace ready at {:?}", workspace.root);
        Ok(workspace)
    }
}

/// One async mutex per user id. Holding the guard gives exclusive use of that
/// user's workspace across workers.
#[derive(Debug, Default, Clone)]
pub struct WorkspaceLocks {
    locks: Arc<Mutex<HashMap<UserId, Arc<AsyncMutex<()>>>>>,
}

impl WorkspaceLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, user_id: &UserId) -> OwnedMutexGuard<()> {
        let slot = {
            let mut locks = self
                .locks
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            locks.entry(user_id.clone()).or_default().clone()
        };
        slot.lock_owned().await
    }
}
