//! Lingo Core Library
//!
//! Configuration store and synchronization engine for the Lingo
//! AI-translation client: a versioned JSON document format for
//! user-defined prompt actions and AI-provider credentials, with
//! validation, multi-generation read compatibility, and reconciliation
//! of external edits via filesystem watches.

pub mod document;
pub mod model;
pub mod prefs;
pub mod service;
pub mod storage;
pub mod store;
pub mod validate;

/// Re-exports of commonly used types
pub mod prelude {
    // Model
    pub use crate::model::{
        Action, ConfigFileInfo, Hotkey, OutputType, Provider, ProviderCategory,
        ProviderDeployment, TtsConfig, UsageScene, UsageScenes,
    };

    // Documents
    pub use crate::document::{ConfigDocument, CURRENT_VERSION};

    // Validation
    pub use crate::validate::{Severity, ValidationIssue, ValidationResult};

    // Storage
    pub use crate::storage::{
        ChangeKind, ConfigFileManager, FileChangeEvent, FileWatcher, StorageError,
        StorageLocation,
    };

    // Preferences
    pub use crate::prefs::{FilePreferences, MemoryPreferences, Preferences};

    // Store
    pub use crate::store::{
        ConfigStore, EventPump, StoreEvent, DEBOUNCE_WINDOW, DEFAULT_CONFIG_NAME,
    };
}
