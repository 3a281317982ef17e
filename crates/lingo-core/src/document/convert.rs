//! Converters between wire records and the internal model.
//!
//! `to_internal` never errors: a record that cannot be normalized (bad
//! URL, unknown category or output type) converts to `None` and the
//! caller records a validation issue for it. `from_internal` always
//! produces the canonical generation-3 shape.

use url::Url;
use uuid::Uuid;

use crate::model::{
    Action, Hotkey, OutputType, Provider, ProviderCategory, TtsConfig, UsageScene, UsageScenes,
};

use super::{ActionEntry, HotkeyEntry, PreferencesEntry, ProviderEntry, TtsEntry};

/// Split a legacy action-side provider reference into its name and
/// optional deployment suffix (`"Azure:gpt-4"` → `("Azure", Some("gpt-4"))`).
pub fn parse_provider_ref(reference: &str) -> (&str, Option<&str>) {
    match reference.split_once(':') {
        Some((name, deployment)) if !deployment.is_empty() => (name, Some(deployment)),
        Some((name, _)) => (name, None),
        None => (reference, None),
    }
}

fn scenes_from_wire(scenes: Option<&[String]>) -> UsageScenes {
    let Some(list) = scenes else {
        return UsageScenes::all();
    };
    let mut out = UsageScenes {
        app: false,
        context_read: false,
        context_edit: false,
    };
    for raw in list {
        if let Some(scene) = UsageScene::parse(raw) {
            out.insert(scene);
        }
    }
    // Absent, empty, or entirely unrecognized lists all mean "all scenes";
    // an action must stay reachable from at least one scene.
    if out.is_empty() { UsageScenes::all() } else { out }
}

fn scenes_to_wire(scenes: &UsageScenes) -> Option<Vec<String>> {
    if scenes.is_all() {
        return None;
    }
    Some(scenes.iter().map(|s| s.as_str().to_string()).collect())
}

impl ActionEntry {
    /// Normalize this record into the typed model.
    ///
    /// Returns `None` when the output-type tag is unrecognized. Unknown
    /// scene names are dropped (the validator reports them); a missing
    /// identifier gets a fresh one.
    pub fn to_internal(&self) -> Option<Action> {
        let output_type = match self.output_type.as_deref() {
            None => OutputType::Plain,
            Some(raw) => OutputType::parse(raw)?,
        };
        Some(Action {
            id: self.id.unwrap_or_else(Uuid::new_v4),
            name: self.name.clone(),
            prompt: self.prompt.clone(),
            scenes: scenes_from_wire(self.scenes.as_deref()),
            output_type,
        })
    }

    /// Build the canonical wire record for an action. Legacy provider
    /// references are never written.
    pub fn from_internal(action: &Action) -> Self {
        Self {
            id: Some(action.id),
            name: action.name.clone(),
            prompt: action.prompt.clone(),
            scenes: scenes_to_wire(&action.scenes),
            output_type: (action.output_type != OutputType::Plain)
                .then(|| action.output_type.as_str().to_string()),
            providers: None,
        }
    }
}

/// Split a generation-1 full endpoint URL into a base endpoint and the
/// deployment name embedded in its path, when present.
fn split_deployment_url(raw: &str) -> Option<(Url, Option<String>)> {
    let url = Url::parse(raw).ok()?;
    let segments: Vec<String> = url.path_segments()?.map(str::to_string).collect();
    if let Some(pos) = segments.iter().position(|s| s == "deployments")
        && let Some(deployment) = segments.get(pos + 1).filter(|s| !s.is_empty())
    {
        let mut base = url.clone();
        {
            let mut path = base.path_segments_mut().ok()?;
            path.clear();
            path.extend(&segments[..pos]);
        }
        return Some((base, Some(deployment.clone())));
    }
    Some((url, None))
}

impl ProviderEntry {
    /// Normalize this record into the typed model.
    ///
    /// Accepts both historical endpoint shapes: a base endpoint plus a
    /// deployment list (generation 2+), or one full URL with an embedded
    /// deployment segment and a single `model` name (generation 1).
    /// Returns `None` for an unrecognized category or an unparseable URL.
    pub fn to_internal(&self, name: &str) -> Option<Provider> {
        let category = ProviderCategory::parse(&self.category)?;

        let (endpoint, embedded) = match (&self.base_endpoint, &self.endpoint) {
            (Some(base), _) => (Some(Url::parse(base).ok()?), None),
            (None, Some(full)) => {
                let (base, deployment) = split_deployment_url(full)?;
                (Some(base), deployment)
            }
            (None, None) => (None, None),
        };

        let mut deployments = self.deployments.clone().unwrap_or_default();
        for extra in [embedded, self.model.clone()].into_iter().flatten() {
            if !deployments.contains(&extra) {
                deployments.push(extra);
            }
        }

        // Absent means "everything declared"; anything not declared is
        // dropped so `enabled ⊆ deployments` holds by construction.
        let enabled_deployments = match &self.enabled_deployments {
            None => deployments.clone(),
            Some(list) => list
                .iter()
                .filter(|d| deployments.contains(*d))
                .cloned()
                .collect(),
        };

        Some(Provider {
            id: self.id.unwrap_or_else(Uuid::new_v4),
            name: name.to_string(),
            category,
            endpoint,
            api_version: self.api_version.clone(),
            auth_header: self.auth_header.clone(),
            token: self.token.clone(),
            deployments,
            enabled_deployments,
        })
    }

    /// Build the canonical wire record and its map key for a provider.
    /// Generation-1 fields are never written.
    pub fn from_internal(provider: &Provider) -> (String, Self) {
        let entry = Self {
            id: Some(provider.id),
            category: provider.category.as_str().to_string(),
            base_endpoint: provider.endpoint.as_ref().map(Url::to_string),
            api_version: provider.api_version.clone(),
            deployments: Some(provider.deployments.clone()),
            enabled_deployments: Some(provider.enabled_deployments.clone()),
            endpoint: None,
            model: None,
            auth_header: provider.auth_header.clone(),
            token: provider.token.clone(),
        };
        (provider.name.clone(), entry)
    }
}

impl TtsEntry {
    /// Normalize text-to-speech settings. An unparseable endpoint is
    /// dropped rather than failing the record; TTS is auxiliary.
    pub fn to_internal(&self) -> TtsConfig {
        TtsConfig {
            use_default: self.use_default.unwrap_or(true),
            endpoint: self
                .endpoint
                .as_deref()
                .and_then(|raw| Url::parse(raw).ok()),
            api_key: self.api_key.clone(),
            model: self.model.clone(),
            voice: self.voice.clone(),
        }
    }

    pub fn from_internal(tts: &TtsConfig) -> Self {
        Self {
            use_default: Some(tts.use_default),
            endpoint: tts.endpoint.as_ref().map(Url::to_string),
            api_key: tts.api_key.clone(),
            model: tts.model.clone(),
            voice: tts.voice.clone(),
        }
    }
}

impl HotkeyEntry {
    pub fn to_internal(&self) -> Hotkey {
        Hotkey {
            key: self.key.clone(),
            modifiers: self.modifiers.clone(),
        }
    }

    pub fn from_internal(hotkey: &Hotkey) -> Self {
        Self {
            key: hotkey.key.clone(),
            modifiers: hotkey.modifiers.clone(),
        }
    }
}

impl PreferencesEntry {
    pub fn from_parts(target_language: Option<&str>, hotkey: Option<&Hotkey>) -> Option<Self> {
        if target_language.is_none() && hotkey.is_none() {
            return None;
        }
        Some(Self {
            target_language: target_language.map(str::to_string),
            hotkey: hotkey.map(HotkeyEntry::from_internal),
        })
    }
}
