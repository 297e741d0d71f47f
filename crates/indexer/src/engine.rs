use crate::cache::SyntaxTreeCache;
use crate::change::{ChangeKind, ChangeLog, CodeChange, UpdateReport};
use crate::config::{EngineConfig, PROJECT_CONFIG_FILE};
use crate::error::{IndexerError, Result};
use crate::metrics::{EngineMetrics, MetricsSnapshot};
use crate::project::{
    canonical_path, find_project_root, ProjectContext, ProjectMetrics, ProjectStore,
    ProjectStructure, WorkContext,
};
use crate::scanner::{FileScanner, ScanOptions};
use async_trait::async_trait;
use context_graph::DependencyGraph;
use context_search::{CodeQuery, CodeReference, RelevanceSearch};
use context_syntax::{Language, ParseDispatcher, ParseError, ParseOutcome};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Query API of the engine.
///
/// None of these calls fail: analysis problems produce a degraded context,
/// and queries over an empty model return empty results.
#[async_trait]
pub trait ContextService: Send + Sync {
    /// Context for the project at `path`, analyzing it on first use
    async fn analyze_project(&self, path: &Path) -> Arc<ProjectContext>;

    /// Apply file changes in order, each independently
    async fn apply_changes(&self, changes: Vec<CodeChange>) -> UpdateReport;

    fn current_work_context(&self) -> WorkContext;

    fn find_related_code(&self, query: &CodeQuery) -> Vec<CodeReference>;

    fn metrics(&self) -> MetricsSnapshot;
}

/// Live project model: tree cache, project contexts and counters.
/// Clones share state.
#[derive(Clone)]
pub struct ContextEngine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    config: EngineConfig,
    dispatcher: ParseDispatcher,
    cache: SyntaxTreeCache,
    projects: ProjectStore,
    changes: ChangeLog,
    metrics: EngineMetrics,
    search: RelevanceSearch,
    work_context: RwLock<WorkContext>,
}

impl ContextEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self::with_dispatcher(config, ParseDispatcher::new())
    }

    pub fn with_dispatcher(config: EngineConfig, dispatcher: ParseDispatcher) -> Self {
        let search = RelevanceSearch::new(config.max_results, config.snippet_chars);
        Self {
            inner: Arc::new(EngineInner {
                config,
                dispatcher,
                cache: SyntaxTreeCache::new(),
                projects: ProjectStore::new(),
                changes: ChangeLog::default(),
                metrics: EngineMetrics::default(),
                search,
                work_context: RwLock::new(WorkContext::default()),
            }),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    pub fn cache(&self) -> &SyntaxTreeCache {
        &self.inner.cache
    }

    /// Cached context for `root`, without analyzing
    pub fn cached_project(&self, root: &Path) -> Option<Arc<ProjectContext>> {
        self.inner.projects.get(&canonical_path(root))
    }

    /// Dependency graph of the project at `root`, analyzing it if needed
    pub async fn dependency_graph(&self, root: &Path) -> Arc<DependencyGraph> {
        self.analyze_project(root).await.graph()
    }

    /// Drop the cached context for `root`. Cached trees are kept.
    pub fn invalidate_project(&self, root: &Path) -> bool {
        let root = canonical_path(root);
        let removed = self.inner.projects.remove(&root).is_some();
        if removed {
            log::debug!("Invalidated project {}", root.display());
        }
        removed
    }

    pub fn set_work_context(&self, context: WorkContext) {
        let mut guard = self
            .inner
            .work_context
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *guard = context;
    }

    fn project_config(&self, root: &Path) -> Result<EngineConfig> {
        let path = root.join(PROJECT_CONFIG_FILE);
        if path.is_file() {
            EngineConfig::load(&path)
        } else {
            Ok(self.inner.config.clone())
        }
    }

    /// Scan and parse the project at `root`. Cache slots of files changed
    /// after epoch `since` are left to `apply_changes`.
    async fn build_context(&self, root: &Path, since: u64) -> Result<ProjectContext> {
        let started = Instant::now();
        if !root.is_dir() {
            return Err(IndexerError::InvalidPath(root.to_path_buf()));
        }

        let config = self.project_config(root)?;
        let scanner = FileScanner::new(root, ScanOptions::from_config(&config)?);
        let files = tokio::task::spawn_blocking(move || scanner.scan()).await?;
        let parsed = self.parse_files(&files, config.parse_concurrency).await;

        let mut structure = ProjectStructure {
            files: files.clone(),
            languages: BTreeMap::new(),
        };
        let mut metrics = ProjectMetrics {
            files_scanned: files.len(),
            ..ProjectMetrics::default()
        };
        let mut trees = Vec::with_capacity(parsed.len());

        for (path, outcome) in parsed {
            match outcome {
                ParseOutcome::Success {
                    root: tree,
                    warnings,
                    metrics: parse_metrics,
                } => {
                    if !warnings.is_empty() {
                        log::debug!(
                            "Parsed {} with {} warning(s)",
                            path.display(),
                            warnings.len()
                        );
                    }
                    let language = Language::from_path(&path);
                    *structure
                        .languages
                        .entry(language.as_str().to_string())
                        .or_default() += 1;
                    metrics.files_parsed += 1;
                    metrics.total_lines += parse_metrics.line_count;
                    self.inner.metrics.record_parsed();

                    let tree = Arc::new(tree);
                    let stored = self.inner.changes.unless_changed(&path, since, || {
                        self.inner.cache.insert(path.clone(), Arc::clone(&tree))
                    });
                    if stored.is_none() {
                        log::debug!(
                            "{} changed during analysis; keeping its update",
                            path.display()
                        );
                    }
                    trees.push(tree);
                }
                ParseOutcome::Failure { errors } => {
                    metrics.parse_failures += 1;
                    self.inner.metrics.record_parse_failure();
                    log::warn!("Failed to parse {}: {}", path.display(), describe(&errors));
                    self.inner
                        .changes
                        .unless_changed(&path, since, || self.inner.cache.remove(&path));
                }
            }
        }

        let scanned: HashSet<&Path> = files.iter().map(PathBuf::as_path).collect();
        let mut pruned = 0;
        for path in self.inner.cache.paths_under(root) {
            if scanned.contains(path.as_path()) {
                continue;
            }
            let removed = self
                .inner
                .changes
                .unless_changed(&path, since, || self.inner.cache.remove(&path));
            if removed.flatten().is_some() {
                pruned += 1;
            }
        }
        if pruned > 0 {
            log::debug!("Dropped {pruned} stale cache entries under {}", root.display());
        }

        metrics.analysis_time_ms = millis(started.elapsed());
        Ok(ProjectContext::new(
            root.to_path_buf(),
            structure,
            metrics,
            trees,
        ))
    }

    /// Read and parse files with at most `concurrency` in flight. Results are
    /// sorted by path.
    async fn parse_files(&self, files: &[PathBuf], concurrency: usize) -> Vec<(PathBuf, ParseOutcome)> {
        let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
        let mut tasks = JoinSet::new();

        for path in files {
            let semaphore = Arc::clone(&semaphore);
            let dispatcher = self.inner.dispatcher.clone();
            let path = path.clone();
            tasks.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    let error = ParseError::infrastructure("parse semaphore closed");
                    return (path, ParseOutcome::failure(error));
                };
                log::debug!("Parsing {}", path.display());
                let outcome = dispatcher.parse_file(&path).await;
                (path, outcome)
            });
        }

        let mut parsed = Vec::with_capacity(files.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(result) => parsed.push(result),
                Err(err) => log::warn!("Parse task failed: {err}"),
            }
        }
        parsed.sort_by(|a, b| a.0.cmp(&b.0));
        parsed
    }

    async fn apply_change(&self, change: &CodeChange, report: &mut UpdateReport) {
        let path = canonical_path(&change.file_path);
        report.applied += 1;
        self.inner.changes.record(&path);

        let had_entry = self.inner.cache.remove(&path).is_some();
        let stored = match change.kind {
            ChangeKind::Deleted => false,
            ChangeKind::Created | ChangeKind::Modified => {
                self.reparse(&path, change.new_content.clone(), report).await
            }
        };
        if had_entry && !stored {
            report.removed += 1;
        }

        match find_project_root(&path, &self.inner.config.project_markers) {
            Some(marker_root) => {
                for root in self.inner.projects.evict_for(&marker_root, &path) {
                    log::debug!("Evicted project {}", root.display());
                    if !report.evicted_projects.contains(&root) {
                        report.evicted_projects.push(root);
                    }
                }
            }
            None => log::debug!("No project root above {}; nothing evicted", path.display()),
        }
    }

    /// Parse `path` into the cache. Returns whether a tree was stored.
    async fn reparse(&self, path: &Path, content: Option<String>, report: &mut UpdateReport) -> bool {
        if !Language::is_supported_path(path) {
            log::debug!("Ignoring change to unsupported file {}", path.display());
            return false;
        }
        let outcome = match content {
            Some(source) => {
                let language = Language::from_path(path);
                self.inner
                    .dispatcher
                    .parse(source, language, path.to_string_lossy().into_owned())
                    .await
            }
            None if path.is_file() => self.inner.dispatcher.parse_file(path).await,
            None => {
                log::debug!("{} no longer exists", path.display());
                return false;
            }
        };

        match outcome {
            ParseOutcome::Success { root, .. } => {
                self.inner.cache.insert(path.to_path_buf(), Arc::new(root));
                self.inner.metrics.record_parsed();
                report.reparsed += 1;
                true
            }
            ParseOutcome::Failure { errors } => {
                self.inner.metrics.record_parse_failure();
                report.failed += 1;
                log::warn!("Failed to re-parse {}: {}", path.display(), describe(&errors));
                false
            }
        }
    }
}

#[async_trait]
impl ContextService for ContextEngine {
    async fn analyze_project(&self, path: &Path) -> Arc<ProjectContext> {
        let root = canonical_path(path);
        if let Some(context) = self.inner.projects.get(&root) {
            log::debug!("Using cached context for {}", root.display());
            return context;
        }

        let started = Instant::now();
        let since = self.inner.changes.epoch();
        let result = self.build_context(&root, since).await;
        self.inner.metrics.record_analysis(started.elapsed());

        match result {
            Ok(context) => {
                log::info!(
                    "Analyzed {}: {} of {} files parsed, {} failed, {} ms",
                    context.name,
                    context.metrics.files_parsed,
                    context.metrics.files_scanned,
                    context.metrics.parse_failures,
                    context.metrics.analysis_time_ms
                );
                let context = Arc::new(context);
                if self.inner.changes.changed_under(&root, since) {
                    log::debug!("{} changed during analysis; not caching", root.display());
                    return context;
                }
                let stored = self.inner.projects.insert_if_absent(Arc::clone(&context));
                // A change recorded after the check above evicts on its own,
                // unless its eviction already ran before this insert.
                if Arc::ptr_eq(&stored, &context)
                    && self.inner.changes.changed_under(&root, since)
                {
                    self.inner.projects.remove_if_same(&stored);
                }
                stored
            }
            Err(err) => {
                log::error!("Analysis of {} failed: {err}", root.display());
                Arc::new(ProjectContext::degraded(root, millis(started.elapsed())))
            }
        }
    }

    async fn apply_changes(&self, changes: Vec<CodeChange>) -> UpdateReport {
        let started = Instant::now();
        let mut report = UpdateReport::default();
        for change in &changes {
            self.apply_change(change, &mut report).await;
        }

        let elapsed = started.elapsed();
        report.duration_ms = millis(elapsed);
        self.inner.metrics.record_update(elapsed);
        if elapsed > self.inner.config.update_budget() {
            report.over_budget = true;
            self.inner.metrics.record_slow_update();
            log::warn!(
                "Applying {} change(s) took {} ms, over the {} ms budget",
                report.applied,
                report.duration_ms,
                self.inner.config.update_budget_ms
            );
        }
        report
    }

    fn current_work_context(&self) -> WorkContext {
        self.inner
            .work_context
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn find_related_code(&self, query: &CodeQuery) -> Vec<CodeReference> {
        self.inner.metrics.record_query();
        let trees = self.inner.cache.snapshot();
        self.inner
            .search
            .search(query, trees.iter().map(|(_, tree)| &**tree))
    }

    fn metrics(&self) -> MetricsSnapshot {
        let mut snapshot = self.inner.metrics.snapshot();
        snapshot.cache_size = self.inner.cache.len();
        snapshot.project_count = self.inner.projects.len();
        snapshot.memory_usage_bytes = self.inner.cache.estimated_size_bytes();
        snapshot
    }
}

fn describe(errors: &[ParseError]) -> String {
    errors
        .iter()
        .map(|error| error.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}

#[allow(clippy::cast_possible_truncation)]
fn millis(elapsed: Duration) -> u64 {
    elapsed.as_millis().min(u128::from(u64::MAX)) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn work_context_round_trips() {
        let engine = ContextEngine::new(EngineConfig::default());
        assert_eq!(engine.current_work_context(), WorkContext::default());

        let context = WorkContext {
            current_file: Some(PathBuf::from("src/lib.rs")),
            current_method: Some("build".to_string()),
            current_project: None,
        };
        engine.set_work_context(context.clone());
        assert_eq!(engine.clone().current_work_context(), context);
    }

    #[test]
    fn empty_engine_answers_queries() {
        let engine = ContextEngine::new(EngineConfig::default());
        assert!(engine.find_related_code(&CodeQuery::from("widget")).is_empty());

        let metrics = engine.metrics();
        assert_eq!(metrics.query_count, 1);
        assert_eq!(metrics.cache_size, 0);
        assert_eq!(metrics.memory_usage_bytes, 0);
    }

    #[tokio::test]
    async fn missing_directory_yields_degraded_context() {
        let engine = ContextEngine::new(EngineConfig::default());
        let context = engine
            .analyze_project(Path::new("/definitely/not/a/project"))
            .await;
        assert!(context.degraded);
        assert!(context.structure.files.is_empty());
        // degraded contexts are not cached
        assert_eq!(engine.metrics().project_count, 0);
        assert_eq!(engine.metrics().analysis_count, 1);
    }

    #[tokio::test]
    async fn budget_overrun_is_counted() {
        let config = EngineConfig {
            update_budget_ms: 0,
            ..EngineConfig::default()
        };
        let engine = ContextEngine::new(config);
        let report = engine
            .apply_changes(vec![CodeChange::modified("/nowhere/a.py").with_content(
                "class A:\n    pass\n",
            )])
            .await;
        assert_eq!(report.applied, 1);
        assert_eq!(report.reparsed, 1);
        assert!(report.over_budget);
        assert_eq!(engine.metrics().slow_updates, 1);
    }
}
