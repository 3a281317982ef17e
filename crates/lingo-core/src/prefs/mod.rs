//! Preference state the engine reads at startup and writes as it runs.
//!
//! Kept behind a trait so hosts can supply their own backing store; the
//! file-backed implementation persists a small TOML document next to the
//! configuration documents.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::model::{Hotkey, TtsConfig};

/// Get/set access to user preference state.
pub trait Preferences: Send {
    fn target_language(&self) -> Option<String>;
    fn set_target_language(&mut self, language: &str) -> anyhow::Result<()>;

    /// Logical name of the configuration that was active last.
    fn active_configuration(&self) -> Option<String>;
    fn set_active_configuration(&mut self, name: &str) -> anyhow::Result<()>;

    fn custom_storage_dir(&self) -> Option<PathBuf>;
    fn set_custom_storage_dir(&mut self, dir: Option<&Path>) -> anyhow::Result<()>;

    fn cloud_sync_enabled(&self) -> bool;
    fn set_cloud_sync_enabled(&mut self, enabled: bool) -> anyhow::Result<()>;

    fn tts(&self) -> TtsConfig;
    fn set_tts(&mut self, tts: &TtsConfig) -> anyhow::Result<()>;

    fn hotkey(&self) -> Option<Hotkey>;
    fn set_hotkey(&mut self, hotkey: Option<&Hotkey>) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct PrefsData {
    #[serde(default)]
    target_language: Option<String>,
    #[serde(default)]
    active_configuration: Option<String>,
    #[serde(default)]
    custom_storage_dir: Option<PathBuf>,
    #[serde(default)]
    cloud_sync_enabled: bool,
    #[serde(default)]
    tts: Option<TtsConfig>,
    #[serde(default)]
    hotkey: Option<Hotkey>,
}

/// TOML-file-backed preferences. Every setter persists immediately.
#[derive(Debug)]
pub struct FilePreferences {
    path: PathBuf,
    data: PrefsData,
}

impl FilePreferences {
    /// Load preferences from `path`, falling back to defaults when the
    /// file is absent or unparseable (a broken preferences file must not
    /// keep the app from starting).
    pub fn load_or_default(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let data = match std::fs::read_to_string(&path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(data) => data,
                Err(e) => {
                    warn!(path = %path.display(), err = %e, "failed to parse preferences — using defaults");
                    PrefsData::default()
                }
            },
            Err(_) => PrefsData::default(),
        };
        Self { path, data }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn save(&self) -> anyhow::Result<()> {
        let contents =
            toml::to_string_pretty(&self.data).context("Failed to serialize preferences")?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create preferences directory: {}", parent.display())
            })?;
        }
        std::fs::write(&self.path, contents).with_context(|| {
            format!("Failed to write preferences file: {}", self.path.display())
        })?;
        Ok(())
    }
}

impl Preferences for FilePreferences {
    fn target_language(&self) -> Option<String> {
        self.data.target_language.clone()
    }

    fn set_target_language(&mut self, language: &str) -> anyhow::Result<()> {
        self.data.target_language = Some(language.to_string());
        self.save()
    }

    fn active_configuration(&self) -> Option<String> {
        self.data.active_configuration.clone()
    }

    fn set_active_configuration(&mut self, name: &str) -> anyhow::Result<()> {
        self.data.active_configuration = Some(name.to_string());
        self.save()
    }

    fn custom_storage_dir(&self) -> Option<PathBuf> {
        self.data.custom_storage_dir.clone()
    }

    fn set_custom_storage_dir(&mut self, dir: Option<&Path>) -> anyhow::Result<()> {
        self.data.custom_storage_dir = dir.map(Path::to_path_buf);
        self.save()
    }

    fn cloud_sync_enabled(&self) -> bool {
        self.data.cloud_sync_enabled
    }

    fn set_cloud_sync_enabled(&mut self, enabled: bool) -> anyhow::Result<()> {
        self.data.cloud_sync_enabled = enabled;
        self.save()
    }

    fn tts(&self) -> TtsConfig {
        self.data.tts.clone().unwrap_or_default()
    }

    fn set_tts(&mut self, tts: &TtsConfig) -> anyhow::Result<()> {
        self.data.tts = Some(tts.clone());
        self.save()
    }

    fn hotkey(&self) -> Option<Hotkey> {
        self.data.hotkey.clone()
    }

    fn set_hotkey(&mut self, hotkey: Option<&Hotkey>) -> anyhow::Result<()> {
        self.data.hotkey = hotkey.cloned();
        self.save()
    }
}

/// In-memory preferences for tests and embedding hosts that manage
/// persistence themselves.
#[derive(Debug, Default)]
pub struct MemoryPreferences {
    data: PrefsData,
}

impl MemoryPreferences {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Preferences for MemoryPreferences {
    fn target_language(&self) -> Option<String> {
        self.data.target_language.clone()
    }

    fn set_target_language(&mut self, language: &str) -> anyhow::Result<()> {
        self.data.target_language = Some(language.to_string());
        Ok(())
    }

    fn active_configuration(&self) -> Option<String> {
        self.data.active_configuration.clone()
    }

    fn set_active_configuration(&mut self, name: &str) -> anyhow::Result<()> {
        self.data.active_configuration = Some(name.to_string());
        Ok(())
    }

    fn custom_storage_dir(&self) -> Option<PathBuf> {
        self.data.custom_storage_dir.clone()
    }

    fn set_custom_storage_dir(&mut self, dir: Option<&Path>) -> anyhow::Result<()> {
        self.data.custom_storage_dir = dir.map(Path::to_path_buf);
        Ok(())
    }

    fn cloud_sync_enabled(&self) -> bool {
        self.data.cloud_sync_enabled
    }

    fn set_cloud_sync_enabled(&mut self, enabled: bool) -> anyhow::Result<()> {
        self.data.cloud_sync_enabled = enabled;
        Ok(())
    }

    fn tts(&self) -> TtsConfig {
        self.data.tts.clone().unwrap_or_default()
    }

    fn set_tts(&mut self, tts: &TtsConfig) -> anyhow::Result<()> {
        self.data.tts = Some(tts.clone());
        Ok(())
    }

    fn hotkey(&self) -> Option<Hotkey> {
        self.data.hotkey.clone()
    }

    fn set_hotkey(&mut self, hotkey: Option<&Hotkey>) -> anyhow::Result<()> {
        self.data.hotkey = hotkey.cloned();
        Ok(())
    }
}
