//! The configuration store: single source of truth for the current
//! actions and providers.
//!
//! The store owns startup (including legacy-version fallback to the
//! bundled default), the mutation API with validation gating, and
//! reconciliation with external edits to the backing file. All methods
//! take `&mut self`; the owning context is whoever holds the store.
//! Filesystem watch callbacks never reach it directly; they arrive
//! through a channel and are delivered by [`EventPump`] on the owner's
//! terms.

pub mod templates;

use std::path::Path;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tracing::{debug, error, info, warn};

use crate::document::{self, ConfigDocument};
use crate::model::{Action, Hotkey, Provider, ProviderDeployment, TtsConfig};
use crate::prefs::Preferences;
use crate::service;
use crate::storage::files::{ConfigFileManager, StorageError};
use crate::storage::location;
use crate::storage::watcher::{ChangeKind, FileChangeEvent, FileWatcher};
use crate::validate::{self, ValidationResult};

/// Name of the seed configuration created on first launch and promoted
/// to on forced migration.
pub const DEFAULT_CONFIG_NAME: &str = "Default";

/// How long after a self-initiated save a change event for the same file
/// is treated as an echo of that save, and how long [`EventPump`] waits
/// to coalesce a burst of events into one delivery.
pub const DEBOUNCE_WINDOW: Duration = Duration::from_millis(500);

/// The read-only configuration document shipped with the application.
const BUNDLED_DEFAULT: &str = include_str!("../assets/default.json");

/// Notifications pushed to subscribers on every state change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    /// In-memory collections were replaced by a local mutation.
    Updated,
    /// State was re-read from disk after an external edit.
    Reloaded,
    /// The active configuration changed to another document.
    Switched { name: String },
}

/// The configuration store and synchronization engine.
pub struct ConfigStore {
    files: ConfigFileManager,
    watcher: FileWatcher,
    prefs: Box<dyn Preferences>,
    actions: Vec<Action>,
    providers: Vec<Provider>,
    deployments: Vec<ProviderDeployment>,
    tts: TtsConfig,
    hotkey: Option<Hotkey>,
    current_name: String,
    last_validation: ValidationResult,
    last_self_save: Option<DateTime<Utc>>,
    auto_save: bool,
    debounce: TimeDelta,
    observers: Vec<Sender<StoreEvent>>,
}

impl ConfigStore {
    /// Resolve the active storage directory from preferences, perform
    /// the startup load (seeding or migrating as needed), and begin
    /// watching the active file. Watch events are sent to `events`;
    /// deliver them back via [`EventPump`] or `handle_file_event`.
    pub fn start(
        prefs: Box<dyn Preferences>,
        events: Sender<FileChangeEvent>,
    ) -> anyhow::Result<Self> {
        let storage = location::resolve(
            prefs.custom_storage_dir().as_deref(),
            prefs.cloud_sync_enabled(),
        )?;
        let mut store = Self {
            files: ConfigFileManager::new(storage.path()),
            watcher: FileWatcher::new(events),
            prefs,
            actions: Vec::new(),
            providers: Vec::new(),
            deployments: Vec::new(),
            tts: TtsConfig::default(),
            hotkey: None,
            current_name: DEFAULT_CONFIG_NAME.to_string(),
            last_validation: ValidationResult::default(),
            last_self_save: None,
            auto_save: true,
            debounce: TimeDelta::milliseconds(DEBOUNCE_WINDOW.as_millis() as i64),
            observers: Vec::new(),
        };
        store.initialize()?;
        Ok(store)
    }

    fn initialize(&mut self) -> anyhow::Result<()> {
        let mut name = self
            .prefs
            .active_configuration()
            .unwrap_or_else(|| DEFAULT_CONFIG_NAME.to_string());

        let mut doc = match self.files.load(&name) {
            Ok(doc) => Some(doc),
            Err(StorageError::NotFound { .. }) => {
                info!(name = %name, "no configuration on disk — seeding from bundled default");
                match bundled_default() {
                    Some(seed) => {
                        self.save_as(&seed, &name)?;
                        Some(seed)
                    }
                    None => None,
                }
            }
            Err(e) => {
                warn!(name = %name, err = %e, "failed to load configuration — substituting bundled default");
                bundled_default()
            }
        };

        // Forced migration: a document outside the supported version
        // window is replaced by the bundled default under the default
        // name slot. Explicitly logged, never silent.
        if let Some(loaded) = &doc
            && !version_is_supported(&loaded.version)
        {
            warn!(
                name = %name,
                version = %loaded.version,
                "configuration version unsupported — promoting bundled default"
            );
            match bundled_default() {
                Some(seed) => {
                    name = DEFAULT_CONFIG_NAME.to_string();
                    self.save_as(&seed, &name)?;
                    doc = Some(seed);
                }
                None => doc = None,
            }
        }

        if let Some(loaded) = &doc {
            let result = validate::validate_document(loaded);
            if result.has_errors() {
                for issue in result.errors() {
                    warn!(name = %name, %issue, "startup validation error");
                }
                doc = bundled_default();
            }
        }

        // Packaging defect: no loadable document and no usable bundled
        // default. Degrade to an empty configuration and persist it so
        // the next launch has something to load.
        let doc = match doc {
            Some(doc) => doc,
            None => {
                error!("bundled default unavailable — falling back to an empty configuration");
                let empty = ConfigDocument::empty();
                self.save_as(&empty, &name)?;
                empty
            }
        };

        self.last_validation = validate::validate_document(&doc);
        self.install_document(&doc);
        self.set_current(&name);
        Ok(())
    }

    // ── accessors ─────────────────────────────────────────────────────

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn providers(&self) -> &[Provider] {
        &self.providers
    }

    /// The currently resolved (provider, deployment) backend pairs.
    pub fn deployments(&self) -> &[ProviderDeployment] {
        &self.deployments
    }

    pub fn tts(&self) -> &TtsConfig {
        &self.tts
    }

    pub fn hotkey(&self) -> Option<&Hotkey> {
        self.hotkey.as_ref()
    }

    pub fn current_name(&self) -> &str {
        &self.current_name
    }

    /// Findings from the most recent validation pass.
    pub fn validation(&self) -> &ValidationResult {
        &self.last_validation
    }

    pub fn target_language(&self) -> String {
        self.prefs
            .target_language()
            .unwrap_or_else(|| templates::DEFAULT_TARGET_LANGUAGE.to_string())
    }

    /// File-level operations on the active storage directory.
    pub fn files(&self) -> &ConfigFileManager {
        &self.files
    }

    /// Register an observer; every state change is pushed to the
    /// returned channel.
    pub fn subscribe(&mut self) -> Receiver<StoreEvent> {
        let (sender, receiver) = mpsc::channel();
        self.observers.push(sender);
        receiver
    }

    // ── mutation API ──────────────────────────────────────────────────

    /// Replace the action list. The proposed state is validated first;
    /// warnings are logged and returned but never block, while blocking
    /// findings leave both memory and disk untouched.
    pub fn update_actions(&mut self, actions: Vec<Action>) -> ValidationResult {
        let result = validate::validate_in_memory(&actions, &self.providers);
        if result.has_errors() {
            warn!("rejected action update with blocking validation issues");
            return result;
        }
        for issue in result.warnings() {
            warn!(%issue, "action update warning");
        }
        self.actions = actions;
        self.after_mutation(&result);
        result
    }

    /// Replace the provider list. Same gating as [`Self::update_actions`].
    pub fn update_providers(&mut self, providers: Vec<Provider>) -> ValidationResult {
        let result = validate::validate_in_memory(&self.actions, &providers);
        if result.has_errors() {
            warn!("rejected provider update with blocking validation issues");
            return result;
        }
        for issue in result.warnings() {
            warn!(%issue, "provider update warning");
        }
        self.providers = providers;
        self.refresh_deployments();
        self.after_mutation(&result);
        result
    }

    fn after_mutation(&mut self, result: &ValidationResult) {
        self.last_validation = result.clone();
        if self.auto_save {
            self.persist();
        }
        self.notify(StoreEvent::Updated);
    }

    /// Update the preferred target language and regenerate every
    /// un-customized managed prompt for it.
    pub fn set_target_language(&mut self, language: &str) -> anyhow::Result<()> {
        self.prefs.set_target_language(language)?;
        let changed = templates::retemplate(&mut self.actions, language);
        if changed > 0 {
            info!(language, changed, "regenerated managed prompts for new target language");
            if self.auto_save {
                self.persist();
            }
            self.notify(StoreEvent::Updated);
        }
        Ok(())
    }

    // ── document-level operations ─────────────────────────────────────

    /// Serialize the current state to document bytes.
    pub fn export_current(&self) -> anyhow::Result<Vec<u8>> {
        service::export(
            &self.actions,
            &self.providers,
            Some(&self.tts),
            self.prefs.target_language().as_deref(),
            self.hotkey.as_ref(),
        )
    }

    /// Import document bytes, persist them under `name`, and make that
    /// the active configuration. A document with blocking issues is
    /// rejected and nothing changes; warnings are returned on success.
    pub fn import_document(
        &mut self,
        bytes: &[u8],
        name: &str,
    ) -> anyhow::Result<ValidationResult> {
        let import = service::import(bytes)?;
        let mut result = ValidationResult::default();
        result.issues.extend(import.warnings.clone());

        self.save_as(&import.document, name)?;
        self.watcher.stop_monitoring(&self.current_name);
        self.last_validation = result.clone();
        self.install_document(&import.document);
        self.set_current(name);
        self.notify(StoreEvent::Switched {
            name: name.to_string(),
        });
        Ok(result)
    }

    /// Re-read the active document from disk and reapply it.
    pub fn reload(&mut self) -> anyhow::Result<()> {
        let doc = self.files.load(&self.current_name)?;
        let result = validate::validate_document(&doc);
        if result.has_errors() {
            anyhow::bail!(
                "configuration `{}` has {} blocking validation issue(s)",
                self.current_name,
                result.errors().count()
            );
        }
        self.last_validation = result;
        self.install_document(&doc);
        self.notify(StoreEvent::Reloaded);
        Ok(())
    }

    /// Load another named document and make it the active configuration.
    pub fn switch_configuration(&mut self, name: &str) -> anyhow::Result<()> {
        let doc = self.files.load(name)?;
        let result = validate::validate_document(&doc);
        if result.has_errors() {
            anyhow::bail!(
                "configuration `{name}` has {} blocking validation issue(s)",
                result.errors().count()
            );
        }
        self.watcher.stop_monitoring(&self.current_name);
        self.last_validation = result;
        self.install_document(&doc);
        self.set_current(name);
        info!(name, "switched active configuration");
        self.notify(StoreEvent::Switched {
            name: name.to_string(),
        });
        Ok(())
    }

    /// Re-resolve the active storage directory (e.g. after the user
    /// picks a custom folder), optionally copying existing documents
    /// over. Existing destination files are never overwritten.
    pub fn change_storage_location(
        &mut self,
        custom_dir: Option<&Path>,
        migrate: bool,
    ) -> anyhow::Result<()> {
        let storage = location::resolve(custom_dir, self.prefs.cloud_sync_enabled())?;
        if migrate {
            let copied = self.files.migrate_to(storage.path())?;
            info!(copied, dest = %storage.path().display(), "migrated configurations");
        }
        self.prefs.set_custom_storage_dir(custom_dir)?;
        self.watcher.stop_monitoring(&self.current_name);
        self.files = ConfigFileManager::new(storage.path());
        self.initialize()
    }

    // ── external change reconciliation ────────────────────────────────

    /// Handle one (already coalesced) file-change event. Must be called
    /// from the owning context; watch callbacks reach this only through
    /// the event channel.
    pub fn handle_file_event(&mut self, event: FileChangeEvent) {
        if event.name != self.current_name {
            debug!(name = %event.name, "ignoring event for inactive configuration");
            return;
        }
        match event.kind {
            ChangeKind::Modified => {
                if self.is_own_echo(event.timestamp) {
                    debug!(name = %event.name, "suppressed echo of our own save");
                    return;
                }
                info!(name = %event.name, "external modification detected");
                self.reload_external();
            }
            ChangeKind::Renamed => {
                if self.files.exists(&self.current_name) {
                    self.reload_external();
                } else {
                    self.handle_active_file_deleted();
                }
            }
            ChangeKind::Deleted => self.handle_active_file_deleted(),
        }
    }

    /// An event within the debounce window after our own save is that
    /// save coming back through the watcher.
    fn is_own_echo(&self, observed: DateTime<Utc>) -> bool {
        self.last_self_save.is_some_and(|saved| {
            let delta = observed.signed_duration_since(saved);
            delta >= TimeDelta::zero() && delta <= self.debounce
        })
    }

    fn reload_external(&mut self) {
        // Auto-save stays off while disk is the source of truth.
        self.auto_save = false;
        match self.files.load(&self.current_name) {
            Ok(doc) => {
                let result = validate::validate_document(&doc);
                if result.has_errors() {
                    for issue in result.errors() {
                        warn!(name = %self.current_name, %issue, "external edit failed validation");
                    }
                    warn!(name = %self.current_name, "keeping in-memory state");
                } else {
                    self.last_validation = result;
                    self.install_document(&doc);
                    info!(name = %self.current_name, "reloaded externally modified configuration");
                    self.notify(StoreEvent::Reloaded);
                }
            }
            Err(e) => {
                warn!(name = %self.current_name, err = %e, "failed to reload after external change");
            }
        }
        self.auto_save = true;
    }

    fn handle_active_file_deleted(&mut self) {
        warn!(name = %self.current_name, "active configuration deleted externally");
        self.watcher.stop_monitoring(&self.current_name);

        let survivor = self
            .files
            .list()
            .unwrap_or_default()
            .into_iter()
            .find(|info| info.name != self.current_name);

        if let Some(info) = survivor {
            if let Err(e) = self.switch_configuration(&info.name) {
                warn!(name = %info.name, err = %e, "failed to switch after deletion");
                self.recreate_default();
            }
        } else {
            self.recreate_default();
        }
    }

    fn recreate_default(&mut self) {
        match self.files.create_empty_template(DEFAULT_CONFIG_NAME) {
            Ok(name) => {
                if let Err(e) = self.switch_configuration(&name) {
                    error!(err = %e, "failed to load freshly created configuration");
                }
            }
            Err(e) => {
                // Disk is unusable; keep running on memory alone.
                error!(err = %e, "failed to recreate a configuration — continuing in memory");
                let empty = ConfigDocument::empty();
                self.install_document(&empty);
                self.current_name = DEFAULT_CONFIG_NAME.to_string();
                self.notify(StoreEvent::Reloaded);
            }
        }
    }

    // ── internals ─────────────────────────────────────────────────────

    /// Install a validated document as the in-memory state and forward
    /// its preference blocks.
    fn install_document(&mut self, doc: &ConfigDocument) {
        let applied = service::apply(doc);
        for issue in &applied.warnings {
            warn!(%issue, "conversion warning");
        }
        self.actions = applied.actions;
        self.providers = applied.providers;
        self.deployments = applied.deployments;
        if let Some(tts) = applied.tts {
            if let Err(e) = self.prefs.set_tts(&tts) {
                warn!(err = %e, "failed to persist TTS preference");
            }
            self.tts = tts;
        }
        if let Some(language) = &applied.target_language
            && let Err(e) = self.prefs.set_target_language(language)
        {
            warn!(err = %e, "failed to persist target language preference");
        }
        if let Some(hotkey) = &applied.hotkey
            && let Err(e) = self.prefs.set_hotkey(Some(hotkey))
        {
            warn!(err = %e, "failed to persist hotkey preference");
        }
        if applied.hotkey.is_some() {
            self.hotkey = applied.hotkey;
        }
        self.last_validation
            .issues
            .extend(applied.warnings);
    }

    fn refresh_deployments(&mut self) {
        self.deployments = self
            .providers
            .iter()
            .flat_map(Provider::enabled_pairs)
            .collect();
    }

    fn set_current(&mut self, name: &str) {
        self.current_name = name.to_string();
        if let Err(e) = self.prefs.set_active_configuration(name) {
            warn!(err = %e, "failed to record active configuration name");
        }
        if let Err(e) = self
            .watcher
            .start_monitoring(name, &self.files.path_for(name))
        {
            warn!(name, err = %e, "failed to watch configuration file");
        }
    }

    /// Persist the current in-memory state to the active document. A
    /// failure leaves memory as the unpersisted source of truth; there
    /// is no retry.
    fn persist(&mut self) {
        let doc = service::build_document(
            &self.actions,
            &self.providers,
            Some(&self.tts),
            self.prefs.target_language().as_deref(),
            self.hotkey.as_ref(),
        );
        let name = self.current_name.clone();
        if let Err(e) = self.save_as(&doc, &name) {
            warn!(name = %self.current_name, err = %e, "save failed — in-memory state is unpersisted");
        }
    }

    /// Write a document and record the self-save timestamp used for
    /// echo suppression.
    fn save_as(&mut self, doc: &ConfigDocument, name: &str) -> Result<(), StorageError> {
        self.files.save(doc, name)?;
        self.last_self_save = Some(Utc::now());
        Ok(())
    }

    fn notify(&mut self, event: StoreEvent) {
        self.observers.retain(|observer| observer.send(event.clone()).is_ok());
    }
}

fn version_is_supported(version: &str) -> bool {
    document::parse_version(version).is_some_and(|v| document::version_supported(&v))
}

fn bundled_default() -> Option<ConfigDocument> {
    match ConfigDocument::from_slice(BUNDLED_DEFAULT.as_bytes()) {
        Ok(doc) => Some(doc),
        Err(e) => {
            error!(err = %e, "bundled default configuration is unreadable");
            None
        }
    }
}

/// Delivers watch events into the store, coalescing bursts.
///
/// One blocking receive is followed by a drain window; multiple events
/// for the same file inside the window collapse to the latest one, so a
/// flurry of write notifications becomes a single reconciliation.
pub struct EventPump {
    receiver: Receiver<FileChangeEvent>,
    window: Duration,
}

impl EventPump {
    pub fn new(receiver: Receiver<FileChangeEvent>) -> Self {
        Self {
            receiver,
            window: DEBOUNCE_WINDOW,
        }
    }

    /// Use a custom coalescing window (tests shrink it).
    pub fn with_window(receiver: Receiver<FileChangeEvent>, window: Duration) -> Self {
        Self { receiver, window }
    }

    /// Wait for the next event, coalesce its burst, and deliver the
    /// result. Returns `false` once the channel is closed.
    pub fn run_once(&self, store: &mut ConfigStore) -> bool {
        let Ok(first) = self.receiver.recv() else {
            return false;
        };
        let mut coalesced: Vec<FileChangeEvent> = vec![first];
        loop {
            match self.receiver.recv_timeout(self.window) {
                Ok(event) => {
                    match coalesced.iter_mut().find(|e| e.name == event.name) {
                        Some(slot) => *slot = event,
                        None => coalesced.push(event),
                    }
                }
                Err(RecvTimeoutError::Timeout) => break,
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        for event in coalesced {
            store.handle_file_event(event);
        }
        true
    }

    /// Pump until the sending side goes away.
    pub fn run(&self, store: &mut ConfigStore) {
        while self.run_once(store) {}
    }
}
