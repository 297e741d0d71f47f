use crate::config::EngineConfig;
use crate::error::Result;
use context_syntax::Language;
use globset::GlobSet;
use ignore::WalkBuilder;
use std::path::{Component, Path, PathBuf};

/// Scan settings derived from [`EngineConfig`]
#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub max_file_size_bytes: u64,
    pub include_hidden: bool,
    pub exclude: GlobSet,
}

impl ScanOptions {
    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        Ok(Self {
            max_file_size_bytes: config.max_file_size_bytes,
            include_hidden: config.include_hidden,
            exclude: config.exclude_set()?,
        })
    }
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            max_file_size_bytes: 1_048_576,
            include_hidden: false,
            exclude: GlobSet::empty(),
        }
    }
}

/// Scanner for finding source files in a project
pub struct FileScanner {
    root: PathBuf,
    options: ScanOptions,
}

impl FileScanner {
    pub fn new(root: impl AsRef<Path>, options: ScanOptions) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            options,
        }
    }

    /// Scan directory for source files (.gitignore aware), sorted by path
    pub fn scan(&self) -> Vec<PathBuf> {
        let mut files = Vec::new();

        let root = self.root.clone();
        let mut builder = WalkBuilder::new(&self.root);
        builder
            .hidden(!self.options.include_hidden)
            .git_ignore(true)
            .git_global(true)
            .git_exclude(true);
        builder.filter_entry(move |entry| !is_ignored_scope(entry.path(), &root));

        for result in builder.build() {
            match result {
                Ok(entry) => {
                    let Some(file_type) = entry.file_type() else {
                        continue;
                    };
                    if !file_type.is_file() {
                        continue;
                    }

                    let path = entry.path();
                    if !Language::is_supported_path(path) {
                        continue;
                    }

                    if self.is_excluded(path) {
                        log::debug!("Skipping excluded file {}", path.display());
                        continue;
                    }

                    if let Ok(meta) = entry.metadata() {
                        if meta.len() > self.options.max_file_size_bytes {
                            log::warn!(
                                "Skipping large file {} ({} bytes > {})",
                                path.display(),
                                meta.len(),
                                self.options.max_file_size_bytes
                            );
                            continue;
                        }
                    }

                    files.push(path.to_path_buf());
                }
                Err(e) => log::warn!("Failed to read entry: {e}"),
            }
        }

        files.sort();
        log::info!(
            "Found {} source files under {}",
            files.len(),
            self.root.display()
        );
        files
    }

    fn is_excluded(&self, path: &Path) -> bool {
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        self.options.exclude.is_match(relative)
    }
}

/// Whether a path lies inside a build, cache or VCS directory
pub(crate) fn is_ignored_scope(path: &Path, root: &Path) -> bool {
    let Ok(relative) = path.strip_prefix(root) else {
        return false;
    };
    relative.components().any(|component| match component {
        Component::Normal(name) => {
            let lowered = name.to_string_lossy().to_lowercase();
            IGNORED_SCOPES.iter().any(|ignored| *ignored == lowered)
        }
        _ => false,
    })
}

const IGNORED_SCOPES: &[&str] = &[
    // VCS / tooling
    ".git",
    ".hg",
    ".svn",
    ".idea",
    ".vscode",
    // caches / builds
    ".cache",
    "node_modules",
    ".next",
    ".turbo",
    ".gradle",
    "build",
    "dist",
    "out",
    "coverage",
    "target",
    ".venv",
    "venv",
    "__pycache__",
    ".mypy_cache",
    ".pytest_cache",
    // vendored code
    "vendor",
    "third_party",
    "third-party",
];
