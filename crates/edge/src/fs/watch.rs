//! `notify` watcher over the collection directories, feeding the collection cache.
//!
//! ✦ Watches the content root, plus any collection configured outside it.
//! ✦ One Tokio task debounces bursts, classifies paths into `ChangeEvent`s
//!   and applies them to the cache. Requests never wait on it.
//! ✦ Events are keyed by collection name, so a configured collection whose
//!   directory has another name is invalidated under its own name.
//! ✦ The cache runs with its watched TTL for as long as the handle lives.
//!
//!   let roots = CollectionRoots::new(content_root).with_collections(project_root, &cols);
//!   let watched = watch_collections(roots, cache, Duration::from_millis(40))?;
//!   ...
//!   watched.stop().await;

use domain::pattern::{content_extension, CONTENT_EXTS};
use domain::{ChangeEvent, ChangeKind, Collection};
use notify::{
    event::{EventKind, ModifyKind},
    Event, RecommendedWatcher, RecursiveMode, Watcher,
};
use serve::discover::{content_id, rel_string};
use serve::CollectionCache;
use std::{
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

/// Where each collection lives, for mapping a changed path back to names.
///
/// Paths under a known collection directory belong to that collection (to
/// every collection sharing the directory). Anything else under the content
/// root belongs to the directory's own name, as discovery would call it.
#[derive(Debug, Clone)]
pub struct CollectionRoots {
    content_root: PathBuf,
    dirs: Vec<(String, PathBuf)>,
}

impl CollectionRoots {
    pub fn new(content_root: impl Into<PathBuf>) -> Self {
        Self {
            content_root: content_root.into(),
            dirs: Vec::new(),
        }
    }

    /// Register merged collections; their paths are relative to `project_root`.
    pub fn with_collections(mut self, project_root: &Path, cols: &[Collection]) -> Self {
        self.dirs = cols
            .iter()
            .map(|c| (c.name.clone(), project_root.join(&c.path)))
            .collect();
        self
    }

    pub fn content_root(&self) -> &Path {
        &self.content_root
    }

    /// The content root plus every collection directory outside it.
    pub fn watch_dirs(&self) -> Vec<PathBuf> {
        let mut out = vec![self.content_root.clone()];
        for (_, dir) in &self.dirs {
            if !out.iter().any(|d| dir.starts_with(d)) {
                out.push(dir.clone());
            }
        }
        out
    }

    /// `(collection, path relative to its directory)` for every owner of `path`.
    fn owners(&self, path: &Path) -> Vec<(String, String)> {
        let declared: Vec<(String, String)> = self
            .dirs
            .iter()
            .filter_map(|(name, dir)| {
                let rest = path.strip_prefix(dir).ok()?;
                Some((name.clone(), rel_string(rest)))
            })
            .collect();
        if !declared.is_empty() {
            return declared;
        }

        let Ok(rel) = path.strip_prefix(&self.content_root) else {
            return Vec::new();
        };
        let rel = rel_string(rel);
        let (collection, rest) = rel.split_once('/').unwrap_or((rel.as_str(), ""));
        if collection.is_empty() || hidden(collection) {
            return Vec::new();
        }
        vec![(collection.to_string(), rest.to_string())]
    }
}

/// Handle for a running watcher. Dropping it stops everything too.
pub struct WatchedCollections {
    pub root: PathBuf,
    applied: Arc<AtomicU64>,
    inner: Inner,
}

struct Inner {
    cache: Arc<CollectionCache>,
    #[allow(dead_code)] // used by test injection
    fs_tx: mpsc::UnboundedSender<Event>,
    watcher: Option<RecommendedWatcher>,
    task: Option<tokio::task::JoinHandle<()>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    attached: bool,
}

impl Inner {
    fn release(&mut self) {
        self.watcher.take();
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if self.attached {
            self.cache.detach_watcher();
            self.attached = false;
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        // Best-effort shutdown if stop() wasn't called
        self.release();
        if let Some(h) = self.task.take() {
            h.abort();
        }
    }
}

impl WatchedCollections {
    /// Change events applied to the cache so far.
    pub fn applied(&self) -> u64 {
        self.applied.load(Ordering::SeqCst)
    }

    pub async fn stop(mut self) {
        self.inner.release();
        if let Some(handle) = self.inner.task.take() {
            let _ = handle.await;
        }
    }

    /// Bypass the OS and inject a synthetic event.
    #[cfg(test)]
    fn inject_event_for_test(&self, ev: Event) {
        let _ = self.inner.fs_tx.send(ev);
    }
}

/// Watch every directory in `roots` and apply each change to `cache`.
///
/// Must be called from within a Tokio runtime.
pub fn watch_collections(
    roots: CollectionRoots,
    cache: Arc<CollectionCache>,
    debounce: Duration,
) -> notify::Result<WatchedCollections> {
    let root = roots.content_root().to_path_buf();

    let (fs_tx, mut fs_rx) = mpsc::unbounded_channel::<Event>();
    let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

    let notify_tx = fs_tx.clone();
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
        Ok(ev) => {
            let _ = notify_tx.send(ev);
        }
        Err(e) => debug!("watch error: {e}"),
    })?;
    watcher.watch(&root, RecursiveMode::Recursive)?;
    for dir in roots.watch_dirs().iter().skip(1) {
        if dir.is_dir() {
            watcher.watch(dir, RecursiveMode::Recursive)?;
            info!("watching {}", dir.display());
        } else {
            debug!("not watching {}: no such directory", dir.display());
        }
    }

    cache.attach_watcher();
    info!("watching {}", root.display());

    let applied = Arc::new(AtomicU64::new(0));
    let task = {
        let cache = Arc::clone(&cache);
        let applied = Arc::clone(&applied);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    maybe = fs_rx.recv() => {
                        let Some(first) = maybe else { break };
                        // Debounce: short sleep, then drain whatever piled up.
                        tokio::time::sleep(debounce).await;
                        let mut batch = vec![first];
                        while let Ok(ev) = fs_rx.try_recv() {
                            batch.push(ev);
                        }

                        let mut changes: Vec<ChangeEvent> = Vec::new();
                        for ev in &batch {
                            for change in classify_event(&roots, ev) {
                                if !changes.contains(&change) {
                                    changes.push(change);
                                }
                            }
                        }
                        for change in &changes {
                            cache.handle_file_change(change);
                        }
                        if !changes.is_empty() {
                            info!("{} change(s) from {} event(s)", changes.len(), batch.len());
                        }
                        applied.fetch_add(changes.len() as u64, Ordering::SeqCst);
                    }
                }
            }
        })
    };

    Ok(WatchedCollections {
        root,
        applied,
        inner: Inner {
            cache,
            fs_tx,
            watcher: Some(watcher),
            task: Some(task),
            shutdown_tx: Some(shutdown_tx),
            attached: true,
        },
    })
}

fn hidden(name: &str) -> bool {
    name.starts_with('.') || name.starts_with('_')
}

/// Turn one notify event into cache changes. Paths outside every collection,
/// or under a hidden/underscore directory, are dropped.
pub fn classify_event(roots: &CollectionRoots, ev: &Event) -> Vec<ChangeEvent> {
    ev.paths
        .iter()
        .flat_map(|p| {
            let kind = match ev.kind {
                EventKind::Create(_) => ChangeKind::Add,
                EventKind::Remove(_) => ChangeKind::Unlink,
                // Rename halves arrive separately; what is left on disk decides.
                EventKind::Modify(ModifyKind::Name(_)) if p.exists() => ChangeKind::Add,
                EventKind::Modify(ModifyKind::Name(_)) => ChangeKind::Unlink,
                EventKind::Modify(_) | EventKind::Any => ChangeKind::Change,
                EventKind::Access(_) | EventKind::Other => return Vec::new(),
            };
            roots
                .owners(p)
                .into_iter()
                .filter_map(|(collection, rest)| classify_path(&collection, &rest, p, kind))
                .collect::<Vec<ChangeEvent>>()
        })
        .collect()
}

/// `rest` is `path` relative to the collection directory.
fn classify_path(collection: &str, rest: &str, path: &Path, kind: ChangeKind) -> Option<ChangeEvent> {
    // The collection directory itself came or went.
    if rest.is_empty() {
        return Some(ChangeEvent::new(kind, collection));
    }

    let (dirs, _) = rest.rsplit_once('/').unwrap_or(("", rest));
    if !dirs.is_empty() && dirs.split('/').any(hidden) {
        return None;
    }

    if content_extension(rest).is_some() {
        return Some(ChangeEvent::new(kind, collection).with_content_id(content_id(rest)));
    }

    // A directory appearing or vanishing may carry any number of items.
    if path.is_dir() || (kind == ChangeKind::Unlink && path.extension().is_none()) {
        return Some(ChangeEvent::new(kind, collection));
    }

    // Any other file: an asset of the folder item beside it, else of the collection.
    let owner = (!dirs.is_empty())
        .then(|| path.parent())
        .flatten()
        .filter(|dir| {
            CONTENT_EXTS
                .iter()
                .any(|ext| dir.join(format!("index.{ext}")).is_file())
        });
    Some(match owner {
        Some(_) => ChangeEvent::new(ChangeKind::Change, collection).with_content_id(dirs),
        None => ChangeEvent::new(ChangeKind::Change, collection),
    })
}
