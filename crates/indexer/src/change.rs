use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Created,
    Modified,
    Deleted,
}

/// One entry of a file-change feed.
///
/// When `new_content` is set on a non-delete change it is parsed as the file's
/// content instead of reading the file from disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeChange {
    pub file_path: PathBuf,
    pub kind: ChangeKind,
    pub old_content: Option<String>,
    pub new_content: Option<String>,
}

impl CodeChange {
    pub fn new(file_path: impl Into<PathBuf>, kind: ChangeKind) -> Self {
        Self {
            file_path: file_path.into(),
            kind,
            old_content: None,
            new_content: None,
        }
    }

    pub fn created(file_path: impl Into<PathBuf>) -> Self {
        Self::new(file_path, ChangeKind::Created)
    }

    pub fn modified(file_path: impl Into<PathBuf>) -> Self {
        Self::new(file_path, ChangeKind::Modified)
    }

    pub fn deleted(file_path: impl Into<PathBuf>) -> Self {
        Self::new(file_path, ChangeKind::Deleted)
    }

    #[must_use]
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.new_content = Some(content.into());
        self
    }

    #[must_use]
    pub fn with_old_content(mut self, content: impl Into<String>) -> Self {
        self.old_content = Some(content.into());
        self
    }
}

/// Outcome of one `apply_changes` batch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateReport {
    /// Changes processed
    pub applied: usize,
    /// Files parsed and stored in the cache
    pub reparsed: usize,
    /// Files that ended up absent from the cache
    pub removed: usize,
    /// Re-parses that failed
    pub failed: usize,
    /// Project roots whose context was evicted
    pub evicted_projects: Vec<PathBuf>,
    pub duration_ms: u64,
    /// The batch took longer than the update budget
    pub over_budget: bool,
}

impl UpdateReport {
    pub fn is_empty(&self) -> bool {
        self.applied == 0
    }
}

/// When `apply_changes` last touched each file, as a change epoch.
///
/// Analysis runs read the epoch before scanning and leave alone every path
/// changed after it, so a slow analysis never writes back trees that a change
/// already replaced or removed.
#[derive(Debug, Default)]
pub(crate) struct ChangeLog {
    epoch: AtomicU64,
    touched: DashMap<PathBuf, u64>,
}

impl ChangeLog {
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    /// Mark `path` as changed now. Call before touching its cache slot.
    pub fn record(&self, path: &Path) {
        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        self.touched.insert(path.to_path_buf(), epoch);
    }

    /// Whether any file under `root` changed after `since`
    pub fn changed_under(&self, root: &Path, since: u64) -> bool {
        self.touched
            .iter()
            .any(|entry| *entry.value() > since && entry.key().starts_with(root))
    }

    /// Run `write` unless `path` changed after `since`. A concurrent
    /// [`ChangeLog::record`] for the same path waits until `write` returns.
    pub fn unless_changed<R>(&self, path: &Path, since: u64, write: impl FnOnce() -> R) -> Option<R> {
        match self.touched.entry(path.to_path_buf()) {
            Entry::Occupied(entry) if *entry.get() > since => None,
            _ => Some(write()),
        }
    }
}
