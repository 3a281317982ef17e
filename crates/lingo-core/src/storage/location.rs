//! Active storage directory resolution.
//!
//! Exactly one directory holds configuration documents at any time,
//! chosen by priority: explicit user-chosen folder > cloud-synced folder
//! (when enabled and present) > shared app-data container > local
//! application-data fallback.

use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::debug;

/// Which source the active directory was resolved from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageLocation {
    /// A folder the user chose explicitly.
    Custom(PathBuf),
    /// The platform's cloud-synced documents folder.
    CloudSynced(PathBuf),
    /// The app's shared data container.
    SharedContainer(PathBuf),
    /// Last-resort local application-data folder.
    LocalData(PathBuf),
}

impl StorageLocation {
    pub fn path(&self) -> &Path {
        match self {
            StorageLocation::Custom(p)
            | StorageLocation::CloudSynced(p)
            | StorageLocation::SharedContainer(p)
            | StorageLocation::LocalData(p) => p,
        }
    }
}

/// Resolve the active storage location and create its directory if
/// absent. Resolution is idempotent: the same inputs yield the same
/// directory.
pub fn resolve(
    custom_dir: Option<&Path>,
    cloud_enabled: bool,
) -> anyhow::Result<StorageLocation> {
    let location = select(custom_dir, cloud_enabled);
    std::fs::create_dir_all(location.path()).with_context(|| {
        format!(
            "Failed to create storage directory: {}",
            location.path().display()
        )
    })?;
    debug!(path = %location.path().display(), "resolved active storage directory");
    Ok(location)
}

fn select(custom_dir: Option<&Path>, cloud_enabled: bool) -> StorageLocation {
    if let Some(dir) = custom_dir {
        return StorageLocation::Custom(dir.to_path_buf());
    }
    if cloud_enabled && let Some(dir) = cloud_container() {
        return StorageLocation::CloudSynced(dir);
    }
    if let Some(dir) = dirs::data_dir() {
        return StorageLocation::SharedContainer(dir.join("lingo").join("configurations"));
    }
    StorageLocation::LocalData(local_fallback())
}

/// The platform cloud-synced folder, when one exists for this platform.
fn cloud_container() -> Option<PathBuf> {
    #[cfg(target_os = "macos")]
    if let Some(home) = dirs::home_dir() {
        return Some(
            home.join("Library")
                .join("Mobile Documents")
                .join("iCloud~app~lingo")
                .join("Documents"),
        );
    }
    None
}

fn local_fallback() -> PathBuf {
    if let Some(dir) = dirs::data_local_dir() {
        return dir.join("lingo").join("configurations");
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".lingo").join("configurations");
    }
    PathBuf::from(".lingo")
}
