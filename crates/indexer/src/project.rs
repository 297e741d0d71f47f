use context_graph::{DependencyGraph, GraphBuilder};
use context_syntax::SyntaxNode;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

/// Files and language mix of a project
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectStructure {
    pub files: Vec<PathBuf>,
    /// Parsed file count per language name
    pub languages: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectMetrics {
    pub files_scanned: usize,
    pub files_parsed: usize,
    pub parse_failures: usize,
    pub total_lines: usize,
    pub analysis_time_ms: u64,
}

/// Per-project aggregate held by the engine.
///
/// The trees are the snapshot the project was analyzed from; the dependency
/// graph is built from them on first access and kept for the life of the
/// context.
#[derive(Debug, Serialize)]
pub struct ProjectContext {
    pub name: String,
    pub root: PathBuf,
    pub structure: ProjectStructure,
    pub metrics: ProjectMetrics,
    /// Set when analysis failed and this context is a placeholder
    pub degraded: bool,
    #[serde(skip)]
    trees: Vec<Arc<SyntaxNode>>,
    #[serde(skip)]
    graph: OnceLock<Arc<DependencyGraph>>,
}

impl ProjectContext {
    pub fn new(
        root: PathBuf,
        structure: ProjectStructure,
        metrics: ProjectMetrics,
        trees: Vec<Arc<SyntaxNode>>,
    ) -> Self {
        Self {
            name: project_name(&root),
            root,
            structure,
            metrics,
            degraded: false,
            trees,
            graph: OnceLock::new(),
        }
    }

    /// Empty stand-in returned when analysis fails
    pub fn degraded(root: PathBuf, analysis_time_ms: u64) -> Self {
        let metrics = ProjectMetrics {
            analysis_time_ms,
            ..ProjectMetrics::default()
        };
        Self {
            degraded: true,
            ..Self::new(root, ProjectStructure::default(), metrics, Vec::new())
        }
    }

    pub fn trees(&self) -> &[Arc<SyntaxNode>] {
        &self.trees
    }

    /// Dependency graph of this snapshot, built on first call
    pub fn graph(&self) -> Arc<DependencyGraph> {
        Arc::clone(self.graph.get_or_init(|| {
            let graph = GraphBuilder::new().build(&self.trees);
            log::info!(
                "Built dependency graph for {}: {} nodes",
                self.name,
                graph.node_count()
            );
            Arc::new(graph)
        }))
    }

    pub fn is_graph_built(&self) -> bool {
        self.graph.get().is_some()
    }
}

fn project_name(root: &Path) -> String {
    root.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| root.display().to_string())
}

/// Host-supplied description of what the user is working on
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkContext {
    pub current_file: Option<PathBuf>,
    pub current_method: Option<String>,
    pub current_project: Option<PathBuf>,
}

/// Project contexts keyed by canonical root
#[derive(Debug, Default)]
pub struct ProjectStore {
    projects: DashMap<PathBuf, Arc<ProjectContext>>,
}

impl ProjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, root: &Path) -> Option<Arc<ProjectContext>> {
        self.projects.get(root).map(|entry| Arc::clone(entry.value()))
    }

    /// Store `context` unless another one got there first; returns the winner
    pub fn insert_if_absent(&self, context: Arc<ProjectContext>) -> Arc<ProjectContext> {
        let entry = self
            .projects
            .entry(context.root.clone())
            .or_insert(context);
        Arc::clone(entry.value())
    }

    pub fn remove(&self, root: &Path) -> Option<Arc<ProjectContext>> {
        self.projects.remove(root).map(|(_, context)| context)
    }

    /// Evict contexts affected by a change to `file` inside the project at
    /// `marker_root`: the marker root itself, any ancestor of it, and any root
    /// between it and the file.
    pub fn evict_for(&self, marker_root: &Path, file: &Path) -> Vec<PathBuf> {
        let mut evicted = Vec::new();
        self.projects.retain(|root, _| {
            let affected = marker_root.starts_with(root)
                || (root.starts_with(marker_root) && file.starts_with(root));
            if affected {
                evicted.push(root.clone());
            }
            !affected
        });
        evicted.sort();
        evicted
    }

    /// Remove the entry for `context.root` if it is `context` itself
    pub fn remove_if_same(&self, context: &Arc<ProjectContext>) -> bool {
        self.projects
            .remove_if(&context.root, |_, stored| Arc::ptr_eq(stored, context))
            .is_some()
    }

    pub fn len(&self) -> usize {
        self.projects.len()
    }
}

/// Nearest directory at or above `path` that holds one of `markers`
pub fn find_project_root(path: &Path, markers: &[String]) -> Option<PathBuf> {
    let start = if path.is_dir() { path } else { path.parent()? };
    start
        .ancestors()
        .find(|dir| markers.iter().any(|marker| dir.join(marker).exists()))
        .map(Path::to_path_buf)
}

/// Canonical form of `path`. A path that no longer exists is resolved through
/// its parent; failing that it is returned as given.
pub fn canonical_path(path: &Path) -> PathBuf {
    if let Ok(canonical) = std::fs::canonicalize(path) {
        return canonical;
    }
    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) => std::fs::canonicalize(parent)
            .map(|parent| parent.join(name))
            .unwrap_or_else(|_| path.to_path_buf()),
        _ => path.to_path_buf(),
    }
}
