use context_syntax::SyntaxNode;
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Parsed trees keyed by canonical file path.
///
/// Entries are replaced by swapping the `Arc`; a tree handed out to a reader
/// is never mutated afterwards.
#[derive(Debug, Default)]
pub struct SyntaxTreeCache {
    entries: DashMap<PathBuf, Arc<SyntaxNode>>,
}

impl SyntaxTreeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a tree, returning the one it replaced
    pub fn insert(&self, path: PathBuf, tree: Arc<SyntaxNode>) -> Option<Arc<SyntaxNode>> {
        self.entries.insert(path, tree)
    }

    pub fn get(&self, path: &Path) -> Option<Arc<SyntaxNode>> {
        self.entries.get(path).map(|entry| Arc::clone(entry.value()))
    }

    pub fn remove(&self, path: &Path) -> Option<Arc<SyntaxNode>> {
        self.entries.remove(path).map(|(_, tree)| tree)
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.entries.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries, sorted by path
    pub fn snapshot(&self) -> Vec<(PathBuf, Arc<SyntaxNode>)> {
        let mut entries: Vec<_> = self
            .entries
            .iter()
            .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    /// Cached paths under `root`, sorted
    pub fn paths_under(&self, root: &Path) -> Vec<PathBuf> {
        let mut paths: Vec<_> = self
            .entries
            .iter()
            .filter(|entry| entry.key().starts_with(root))
            .map(|entry| entry.key().clone())
            .collect();
        paths.sort();
        paths
    }

    /// Rough heap footprint of all cached trees
    pub fn estimated_size_bytes(&self) -> usize {
        self.entries
            .iter()
            .map(|entry| entry.key().as_os_str().len() + entry.value().estimated_size_bytes())
            .sum()
    }
}
