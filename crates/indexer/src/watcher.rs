use crate::change::{ChangeKind, CodeChange, UpdateReport};
use crate::engine::{ContextEngine, ContextService};
use crate::error::{IndexerError, Result};
use crate::project::canonical_path;
use crate::scanner::is_ignored_scope;
use context_syntax::Language;
use log::{debug, info, warn};
use notify::event::{ModifyKind, RenameMode};
use notify::{Config as NotifyConfig, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{self, Instant};

/// Watches a project root and feeds debounced change batches into a
/// [`ContextEngine`]. Every applied batch is broadcast to subscribers.
///
/// Must be started inside a tokio runtime. Dropping the last clone stops the
/// background loop.
#[derive(Clone)]
pub struct ChangeWatcher {
    inner: Arc<WatcherInner>,
}

struct WatcherInner {
    root: PathBuf,
    command_tx: mpsc::Sender<WatcherCommand>,
    update_tx: broadcast::Sender<UpdateReport>,
    _watcher: Mutex<RecommendedWatcher>,
}

enum WatcherCommand {
    Flush,
    Shutdown,
}

impl ChangeWatcher {
    /// Watch `root` with the engine's configured debounce
    pub fn start(engine: ContextEngine, root: impl AsRef<Path>) -> Result<Self> {
        let debounce = engine.config().watch_debounce();
        Self::start_with_debounce(engine, root, debounce)
    }

    pub fn start_with_debounce(
        engine: ContextEngine,
        root: impl AsRef<Path>,
        debounce: Duration,
    ) -> Result<Self> {
        let root = canonical_path(root.as_ref());
        if !root.is_dir() {
            return Err(IndexerError::InvalidPath(root));
        }

        let (event_tx, event_rx) = mpsc::channel(1024);
        let (command_tx, command_rx) = mpsc::channel(16);
        let (update_tx, _) = broadcast::channel(32);

        let mut watcher = RecommendedWatcher::new(
            move |res| {
                let _ = event_tx.blocking_send(res);
            },
            NotifyConfig::default(),
        )?;
        watcher.watch(&root, RecursiveMode::Recursive)?;
        info!("Watching {} (debounce {} ms)", root.display(), debounce.as_millis());

        spawn_watch_loop(
            engine,
            root.clone(),
            debounce,
            event_rx,
            command_rx,
            update_tx.clone(),
        );

        Ok(Self {
            inner: Arc::new(WatcherInner {
                root,
                command_tx,
                update_tx,
                _watcher: Mutex::new(watcher),
            }),
        })
    }

    pub fn root(&self) -> &Path {
        &self.inner.root
    }

    #[must_use]
    pub fn subscribe_updates(&self) -> broadcast::Receiver<UpdateReport> {
        self.inner.update_tx.subscribe()
    }

    /// Apply pending changes now instead of waiting out the debounce
    pub async fn flush(&self) -> Result<()> {
        self.inner
            .command_tx
            .send(WatcherCommand::Flush)
            .await
            .map_err(|e| IndexerError::Other(format!("failed to send flush: {e}")))
    }
}

impl Drop for ChangeWatcher {
    fn drop(&mut self) {
        if Arc::strong_count(&self.inner) == 1 {
            let _ = self.inner.command_tx.try_send(WatcherCommand::Shutdown);
        }
    }
}

fn spawn_watch_loop(
    engine: ContextEngine,
    root: PathBuf,
    debounce: Duration,
    mut event_rx: mpsc::Receiver<notify::Result<Event>>,
    mut command_rx: mpsc::Receiver<WatcherCommand>,
    update_tx: broadcast::Sender<UpdateReport>,
) {
    tokio::spawn(async move {
        let mut pending = PendingChanges::default();

        loop {
            let deadline = pending.deadline(debounce);

            tokio::select! {
                Some(event) = event_rx.recv() => match event {
                    Ok(event) => {
                        pending.record(&root, &event);
                    }
                    Err(err) => warn!("File watch error under {}: {err}", root.display()),
                },
                Some(cmd) = command_rx.recv() => match cmd {
                    WatcherCommand::Flush => apply_pending(&engine, &mut pending, &update_tx).await,
                    WatcherCommand::Shutdown => break,
                },
                () = async {
                    if let Some(deadline) = deadline {
                        time::sleep_until(deadline).await;
                    }
                }, if deadline.is_some() => {
                    apply_pending(&engine, &mut pending, &update_tx).await;
                }
                else => break,
            }
        }
        debug!("Watch loop for {} stopped", root.display());
    });
}

async fn apply_pending(
    engine: &ContextEngine,
    pending: &mut PendingChanges,
    update_tx: &broadcast::Sender<UpdateReport>,
) {
    let changes = pending.take();
    if changes.is_empty() {
        return;
    }
    debug!("Applying {} watched change(s)", changes.len());
    let report = engine.apply_changes(changes).await;
    info!(
        "Applied {} change(s) in {} ms: {} re-parsed, {} removed, {} failed",
        report.applied, report.duration_ms, report.reparsed, report.removed, report.failed
    );
    let _ = update_tx.send(report);
}

/// Changes seen since the last flush, one entry per path
#[derive(Debug, Default)]
struct PendingChanges {
    paths: BTreeMap<PathBuf, ChangeKind>,
    last_event: Option<Instant>,
}

impl PendingChanges {
    /// Returns whether any path in the event was kept
    fn record(&mut self, root: &Path, event: &Event) -> bool {
        let Some(kind) = change_kind(&event.kind) else {
            return false;
        };

        let mut recorded = false;
        for path in &event.paths {
            if !is_relevant(root, path) {
                continue;
            }
            let merged = match (self.paths.get(path), kind) {
                (Some(ChangeKind::Created), ChangeKind::Modified) => ChangeKind::Created,
                (_, kind) => kind,
            };
            self.paths.insert(path.clone(), merged);
            recorded = true;
        }
        if recorded {
            self.last_event = Some(Instant::now());
        }
        recorded
    }

    fn deadline(&self, debounce: Duration) -> Option<Instant> {
        self.last_event.map(|last| last + debounce)
    }

    /// Drain into a change batch, sorted by path. The kind is corrected
    /// against what is on disk now.
    fn take(&mut self) -> Vec<CodeChange> {
        self.last_event = None;
        std::mem::take(&mut self.paths)
            .into_iter()
            .map(|(path, kind)| {
                let exists = path.exists();
                let kind = match kind {
                    ChangeKind::Deleted if exists => ChangeKind::Modified,
                    _ if !exists => ChangeKind::Deleted,
                    kind => kind,
                };
                CodeChange::new(path, kind)
            })
            .collect()
    }
}

fn change_kind(kind: &EventKind) -> Option<ChangeKind> {
    match kind {
        EventKind::Create(_) => Some(ChangeKind::Created),
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => Some(ChangeKind::Deleted),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => Some(ChangeKind::Created),
        EventKind::Modify(_) => Some(ChangeKind::Modified),
        EventKind::Remove(_) => Some(ChangeKind::Deleted),
        EventKind::Access(_) | EventKind::Any | EventKind::Other => None,
    }
}

fn is_relevant(root: &Path, path: &Path) -> bool {
    Language::is_supported_path(path) && !is_ignored_scope(path, root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, DataChange, RemoveKind};
    use pretty_assertions::assert_eq;

    fn event(kind: EventKind, path: &Path) -> Event {
        Event::new(kind).add_path(path.to_path_buf())
    }

    #[test]
    fn create_then_modify_stays_created() {
        let temp = tempfile::tempdir().unwrap();
        let file = temp.path().join("lib.rs");
        std::fs::write(&file, "fn a() {}").unwrap();

        let mut pending = PendingChanges::default();
        assert!(pending.record(temp.path(), &event(EventKind::Create(CreateKind::File), &file)));
        assert!(pending.record(
            temp.path(),
            &event(EventKind::Modify(ModifyKind::Data(DataChange::Content)), &file)
        ));
        assert!(pending.deadline(Duration::from_millis(10)).is_some());

        let changes = pending.take();
        assert_eq!(changes, vec![CodeChange::created(file)]);
        assert!(pending.deadline(Duration::from_millis(10)).is_none());
    }

    #[test]
    fn kinds_follow_the_disk() {
        let temp = tempfile::tempdir().unwrap();
        let gone = temp.path().join("gone.py");
        let back = temp.path().join("back.py");
        std::fs::write(&back, "x = 1").unwrap();

        let mut pending = PendingChanges::default();
        pending.record(
            temp.path(),
            &event(EventKind::Modify(ModifyKind::Any), &gone),
        );
        pending.record(
            temp.path(),
            &event(EventKind::Remove(RemoveKind::File), &back),
        );

        let changes = pending.take();
        assert_eq!(
            changes,
            vec![CodeChange::modified(back), CodeChange::deleted(gone)]
        );
    }

    #[test]
    fn irrelevant_paths_are_dropped() {
        let temp = tempfile::tempdir().unwrap();
        let mut pending = PendingChanges::default();

        let notes = temp.path().join("notes.md");
        let built = temp.path().join("target").join("gen.rs");
        assert!(!pending.record(temp.path(), &event(EventKind::Create(CreateKind::File), &notes)));
        assert!(!pending.record(temp.path(), &event(EventKind::Create(CreateKind::File), &built)));
        assert!(!pending.record(
            temp.path(),
            &event(EventKind::Access(notify::event::AccessKind::Any), &temp.path().join("a.rs"))
        ));
        assert!(pending.take().is_empty());
    }
}
