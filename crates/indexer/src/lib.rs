//! # Context Indexer
//!
//! Live, incrementally maintained model of a source tree.
//!
//! ## Pipeline
//!
//! ```text
//! Directory
//!     │
//!     ├──> File Scanner (.gitignore aware)
//!     │      └─> Source files
//!     │
//!     ├──> Parse Dispatcher (bounded concurrency)
//!     │      └─> Syntax Tree Cache (per file)
//!     │
//!     └──> Project Store (per root)
//!            └─> Dependency graph, built on first query
//!
//! File changes ──> apply_changes ──> cache slots replaced, contexts evicted
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use context_indexer::{ContextEngine, ContextService, EngineConfig};
//! use context_search::CodeQuery;
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() {
//!     let engine = ContextEngine::new(EngineConfig::default());
//!     let project = engine.analyze_project(Path::new("/path/to/project")).await;
//!     println!("{} files parsed", project.metrics.files_parsed);
//!
//!     for hit in engine.find_related_code(&CodeQuery::from("widget")) {
//!         println!("{}:{} {:.2}", hit.file_path, hit.line, hit.score);
//!     }
//! }
//! ```

mod cache;
mod change;
mod config;
mod engine;
mod error;
mod metrics;
mod project;
mod scanner;
mod watcher;

pub use cache::SyntaxTreeCache;
pub use change::{ChangeKind, CodeChange, UpdateReport};
pub use config::{
    EngineConfig, DEFAULT_PROJECT_MARKERS, MAX_PARSE_CONCURRENCY, PARSE_CONCURRENCY_ENV,
    PROJECT_CONFIG_FILE,
};
pub use engine::{ContextEngine, ContextService};
pub use error::{IndexerError, Result};
pub use metrics::MetricsSnapshot;
pub use project::{
    canonical_path, find_project_root, ProjectContext, ProjectMetrics, ProjectStructure,
    WorkContext,
};
pub use scanner::{FileScanner, ScanOptions};
pub use watcher::ChangeWatcher;
