//! Per-file change watching built on OS-level filesystem notifications.
//!
//! One watch is attached per logical document name. Each watch observes
//! the parent directory non-recursively and filters to the named file:
//! a direct file watch silently dies when an editor saves by
//! rename-over, and watching a not-yet-existing file fails outright on
//! some platforms. Raw `notify` callbacks never touch shared state
//! beyond forwarding into a channel; consumers receive mapped
//! [`FileChangeEvent`]s on the subscriber side.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, warn};

/// What happened to a watched file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// Content was written, extended, or replaced in place.
    Modified,
    /// The file was removed.
    Deleted,
    /// The file was moved away under another name.
    Renamed,
}

/// A change notification for one watched document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChangeEvent {
    /// Logical document name the watch was registered under.
    pub name: String,
    pub path: PathBuf,
    pub kind: ChangeKind,
    /// When the notification was observed.
    pub timestamp: DateTime<Utc>,
}

impl FileChangeEvent {
    /// Build an event stamped with the current time. Test scaffolding
    /// and reconciliation paths construct these directly.
    pub fn now(name: impl Into<String>, path: impl Into<PathBuf>, kind: ChangeKind) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            kind,
            timestamp: Utc::now(),
        }
    }
}

type WatchMap = Arc<Mutex<HashMap<String, RecommendedWatcher>>>;

/// Attaches and detaches per-document watches, forwarding mapped events
/// to one subscriber channel.
pub struct FileWatcher {
    watches: WatchMap,
    raw_sender: Sender<FileChangeEvent>,
}

impl FileWatcher {
    /// Create a watcher forwarding events to `subscriber`. A dedicated
    /// forwarder thread relays events and detaches the watch of any file
    /// that reports deletion.
    pub fn new(subscriber: Sender<FileChangeEvent>) -> Self {
        let (raw_sender, raw_receiver) = mpsc::channel::<FileChangeEvent>();
        let watches: WatchMap = Arc::new(Mutex::new(HashMap::new()));

        let forward_watches = Arc::clone(&watches);
        std::thread::spawn(move || {
            forward_events(raw_receiver, subscriber, forward_watches);
        });

        Self {
            watches,
            raw_sender,
        }
    }

    /// Attach a watch for `path` under the logical `name`. Starting an
    /// already-watched name is a no-op.
    pub fn start_monitoring(&self, name: &str, path: &Path) -> anyhow::Result<()> {
        let mut watches = lock(&self.watches);
        if watches.contains_key(name) {
            return Ok(());
        }

        let watch_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let file_path = path.to_path_buf();
        let event_name = name.to_string();
        let sender = self.raw_sender.clone();

        let mut watcher = notify::recommended_watcher(move |result: notify::Result<Event>| {
            match result {
                Ok(event) => {
                    if let Some(mapped) = map_event(&event, &event_name, &file_path) {
                        // Receiver gone means the engine is shutting down.
                        let _ = sender.send(mapped);
                    }
                }
                Err(e) => warn!(name = %event_name, err = %e, "file watch error"),
            }
        })?;
        watcher.watch(&watch_dir, RecursiveMode::NonRecursive)?;

        debug!(name, path = %path.display(), "started watching configuration file");
        watches.insert(name.to_string(), watcher);
        Ok(())
    }

    /// Detach the watch registered under `name`, if any.
    pub fn stop_monitoring(&self, name: &str) {
        if lock(&self.watches).remove(name).is_some() {
            debug!(name, "stopped watching configuration file");
        }
    }

    pub fn is_monitoring(&self, name: &str) -> bool {
        lock(&self.watches).contains_key(name)
    }
}

impl Drop for FileWatcher {
    fn drop(&mut self) {
        // Dropping every watcher releases the callbacks' channel clones,
        // which lets the forwarder thread run to completion.
        lock(&self.watches).clear();
    }
}

fn lock(watches: &WatchMap) -> MutexGuard<'_, HashMap<String, RecommendedWatcher>> {
    watches.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn forward_events(
    raw: Receiver<FileChangeEvent>,
    subscriber: Sender<FileChangeEvent>,
    watches: WatchMap,
) {
    while let Ok(event) = raw.recv() {
        if event.kind == ChangeKind::Deleted {
            lock(&watches).remove(&event.name);
            debug!(name = %event.name, "auto-detached watch for deleted file");
        }
        if subscriber.send(event).is_err() {
            return;
        }
    }
}

/// Map a raw notify event to a change notification for the watched
/// file, or `None` when it concerns other files in the directory.
fn map_event(event: &Event, name: &str, file_path: &Path) -> Option<FileChangeEvent> {
    let ours = |p: &PathBuf| p == file_path;

    let kind = match &event.kind {
        EventKind::Create(_) => {
            event.paths.iter().any(|p| ours(p)).then_some(ChangeKind::Modified)?
        }
        EventKind::Modify(ModifyKind::Data(_)) | EventKind::Modify(ModifyKind::Any) => {
            event.paths.iter().any(|p| ours(p)).then_some(ChangeKind::Modified)?
        }
        EventKind::Modify(ModifyKind::Name(mode)) => match mode {
            // A rename landing on our path replaces its content; a
            // rename leaving our path moves the file away.
            RenameMode::To => event.paths.iter().any(|p| ours(p)).then_some(ChangeKind::Modified)?,
            RenameMode::From => event.paths.iter().any(|p| ours(p)).then_some(ChangeKind::Renamed)?,
            RenameMode::Both => {
                let to = event.paths.last().is_some_and(|p| ours(p));
                let from = event.paths.first().is_some_and(|p| ours(p));
                if to {
                    ChangeKind::Modified
                } else if from {
                    ChangeKind::Renamed
                } else {
                    return None;
                }
            }
            _ => event.paths.iter().any(|p| ours(p)).then_some(ChangeKind::Renamed)?,
        },
        EventKind::Remove(_) => {
            event.paths.iter().any(|p| ours(p)).then_some(ChangeKind::Deleted)?
        }
        _ => return None,
    };

    Some(FileChangeEvent::now(name, file_path, kind))
}
