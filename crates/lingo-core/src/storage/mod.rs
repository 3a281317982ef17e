//! Filesystem layer: directory resolution, document I/O, and watches.

pub mod files;
pub mod location;
pub mod watcher;

pub use files::{ConfigFileManager, StorageError};
pub use location::StorageLocation;
pub use watcher::{ChangeKind, FileChangeEvent, FileWatcher};
