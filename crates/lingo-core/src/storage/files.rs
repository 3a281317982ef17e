//! Load, save, list, and manage named configuration documents on disk.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::document::ConfigDocument;
use crate::model::ConfigFileInfo;

/// Typed storage failures. Callers distinguish a missing document from a
/// present-but-unreadable one.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("configuration `{name}` not found")]
    NotFound { name: String },
    #[error("configuration `{name}` is malformed")]
    Malformed {
        name: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("configuration `{name}` could not be encoded")]
    Encode {
        name: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("storage I/O failure on {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StorageError {
    fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StorageError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Manages the documents inside one active storage directory.
#[derive(Debug, Clone)]
pub struct ConfigFileManager {
    dir: PathBuf,
}

impl ConfigFileManager {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Full path of the document with the given logical name.
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.json"))
    }

    pub fn exists(&self, name: &str) -> bool {
        self.path_for(name).is_file()
    }

    /// Serialize deterministically and write atomically, overwriting any
    /// prior content. The document lands complete or not at all: bytes go
    /// to a temp sibling first, then rename into place.
    pub fn save(&self, document: &ConfigDocument, name: &str) -> Result<(), StorageError> {
        let bytes = document
            .to_pretty_bytes()
            .map_err(|source| StorageError::Encode {
                name: name.to_string(),
                source,
            })?;

        let path = self.path_for(name);
        let tmp = self.dir.join(format!(".{name}.json.tmp"));
        std::fs::write(&tmp, &bytes).map_err(|e| StorageError::io(&tmp, e))?;
        std::fs::rename(&tmp, &path).map_err(|e| StorageError::io(&path, e))?;
        debug!(name, path = %path.display(), "saved configuration");
        Ok(())
    }

    /// Load a document by logical name.
    pub fn load(&self, name: &str) -> Result<ConfigDocument, StorageError> {
        self.load_path(&self.path_for(name))
    }

    /// Load a document from an explicit path.
    pub fn load_path(&self, path: &Path) -> Result<ConfigDocument, StorageError> {
        let name = logical_name(path);
        let bytes = std::fs::read(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::NotFound { name: name.clone() }
            } else {
                StorageError::io(path, e)
            }
        })?;
        ConfigDocument::from_slice(&bytes).map_err(|source| StorageError::Malformed {
            name,
            source,
        })
    }

    /// All `*.json` documents in the active directory, newest-modified
    /// first. Entries whose metadata cannot be read are skipped.
    pub fn list(&self) -> Result<Vec<ConfigFileInfo>, StorageError> {
        let entries = std::fs::read_dir(&self.dir).map_err(|e| StorageError::io(&self.dir, e))?;

        let mut infos = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StorageError::io(&self.dir, e))?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let modified = match entry.metadata().and_then(|m| m.modified()) {
                Ok(time) => DateTime::<Utc>::from(time),
                Err(e) => {
                    warn!(path = %path.display(), err = %e, "skipping unreadable entry");
                    continue;
                }
            };
            infos.push(ConfigFileInfo {
                name: logical_name(&path),
                path,
                modified,
            });
        }
        infos.sort_by(|a, b| b.modified.cmp(&a.modified));
        Ok(infos)
    }

    pub fn delete(&self, name: &str) -> Result<(), StorageError> {
        let path = self.path_for(name);
        std::fs::remove_file(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::NotFound {
                    name: name.to_string(),
                }
            } else {
                StorageError::io(&path, e)
            }
        })
    }

    /// Copy an existing document into this directory under a
    /// collision-free name (`Name 2`, `Name 3`, ...). Returns the new
    /// logical name.
    pub fn duplicate(&self, from: &Path) -> Result<String, StorageError> {
        let base = logical_name(from);
        let name = self.free_name(&base);
        let dest = self.path_for(&name);
        std::fs::copy(from, &dest).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::NotFound { name: base.clone() }
            } else {
                StorageError::io(&dest, e)
            }
        })?;
        debug!(from = %from.display(), to = %dest.display(), "duplicated configuration");
        Ok(name)
    }

    /// Create a minimal valid document under a collision-free variant of
    /// `base`. Returns the logical name actually used.
    pub fn create_empty_template(&self, base: &str) -> Result<String, StorageError> {
        let name = self.free_name(base);
        self.save(&ConfigDocument::empty(), &name)?;
        Ok(name)
    }

    /// Copy every document into `dest_dir`, never overwriting a file that
    /// already exists there. Returns how many were copied.
    pub fn migrate_to(&self, dest_dir: &Path) -> Result<usize, StorageError> {
        std::fs::create_dir_all(dest_dir).map_err(|e| StorageError::io(dest_dir, e))?;
        let mut copied = 0;
        for info in self.list()? {
            let dest = dest_dir.join(format!("{}.json", info.name));
            if dest.exists() {
                warn!(name = %info.name, "skipping migration: destination already exists");
                continue;
            }
            std::fs::copy(&info.path, &dest).map_err(|e| StorageError::io(&dest, e))?;
            copied += 1;
        }
        debug!(copied, dest = %dest_dir.display(), "migrated configurations");
        Ok(copied)
    }

    /// First free name in the sequence `base`, `base 2`, `base 3`, ...
    fn free_name(&self, base: &str) -> String {
        if !self.exists(base) {
            return base.to_string();
        }
        let mut counter = 2;
        loop {
            let candidate = format!("{base} {counter}");
            if !self.exists(&candidate) {
                return candidate;
            }
            counter += 1;
        }
    }
}

/// The logical name of a document path: its file stem.
fn logical_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn manager() -> (TempDir, ConfigFileManager) {
        let temp = TempDir::new().unwrap();
        let manager = ConfigFileManager::new(temp.path());
        (temp, manager)
    }

    #[test]
    fn load_missing_is_not_found() {
        let (_temp, manager) = manager();
        match manager.load("nope") {
            Err(StorageError::NotFound { name }) => assert_eq!(name, "nope"),
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[test]
    fn load_garbage_is_malformed() {
        let (_temp, manager) = manager();
        std::fs::write(manager.path_for("bad"), b"{ not json").unwrap();
        match manager.load("bad") {
            Err(StorageError::Malformed { name, .. }) => assert_eq!(name, "bad"),
            other => panic!("expected Malformed, got {other:?}"),
        }
    }

    #[test]
    fn save_overwrites_and_leaves_no_temp_file() {
        let (temp, manager) = manager();
        manager.save(&ConfigDocument::empty(), "main").unwrap();
        manager.save(&ConfigDocument::empty(), "main").unwrap();

        let names: Vec<String> = std::fs::read_dir(temp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["main.json".to_string()]);
    }

    #[test]
    fn duplicate_appends_counter_suffixes() {
        let (_temp, manager) = manager();
        manager.save(&ConfigDocument::empty(), "Work").unwrap();

        let first = manager.duplicate(&manager.path_for("Work")).unwrap();
        let second = manager.duplicate(&manager.path_for("Work")).unwrap();
        assert_eq!(first, "Work 2");
        assert_eq!(second, "Work 3");
        assert!(manager.exists("Work 2") && manager.exists("Work 3"));
    }

    #[test]
    fn migrate_never_overwrites_destination() {
        let (_temp, manager) = manager();
        manager.save(&ConfigDocument::empty(), "a").unwrap();
        manager.save(&ConfigDocument::empty(), "b").unwrap();

        let dest = TempDir::new().unwrap();
        std::fs::write(dest.path().join("a.json"), b"pre-existing").unwrap();

        let copied = manager.migrate_to(dest.path()).unwrap();
        assert_eq!(copied, 1);
        assert_eq!(
            std::fs::read(dest.path().join("a.json")).unwrap(),
            b"pre-existing"
        );
        assert!(dest.path().join("b.json").is_file());
    }
}
