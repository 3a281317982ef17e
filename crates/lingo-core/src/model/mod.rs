//! Internal data model for actions, providers, and playback settings.
//!
//! These are the typed, in-memory shapes the store works with. The wire
//! format lives in [`crate::document`] and converts to/from this model.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

/// A single usage context in which an action may be surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UsageScene {
    /// Inside the app's own translation window.
    App,
    /// Invoked on read-only external context (e.g. selected text).
    ContextRead,
    /// Invoked on editable external context (result replaces the selection).
    ContextEdit,
}

impl UsageScene {
    /// The wire-format name for this scene.
    pub fn as_str(self) -> &'static str {
        match self {
            UsageScene::App => "app",
            UsageScene::ContextRead => "contextRead",
            UsageScene::ContextEdit => "contextEdit",
        }
    }

    /// Parse a wire-format scene name. Matching is case-sensitive.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "app" => Some(UsageScene::App),
            "contextRead" => Some(UsageScene::ContextRead),
            "contextEdit" => Some(UsageScene::ContextEdit),
            _ => None,
        }
    }
}

/// The set of usage scenes an action is enabled for.
///
/// An empty set never reaches the model: the wire boundary normalizes
/// absent or empty scene lists to "all scenes".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageScenes {
    pub app: bool,
    pub context_read: bool,
    pub context_edit: bool,
}

impl UsageScenes {
    /// All three scenes enabled.
    pub fn all() -> Self {
        Self {
            app: true,
            context_read: true,
            context_edit: true,
        }
    }

    pub fn is_empty(&self) -> bool {
        !self.app && !self.context_read && !self.context_edit
    }

    /// True when every scene is enabled.
    pub fn is_all(&self) -> bool {
        self.app && self.context_read && self.context_edit
    }

    pub fn contains(&self, scene: UsageScene) -> bool {
        match scene {
            UsageScene::App => self.app,
            UsageScene::ContextRead => self.context_read,
            UsageScene::ContextEdit => self.context_edit,
        }
    }

    pub fn insert(&mut self, scene: UsageScene) {
        match scene {
            UsageScene::App => self.app = true,
            UsageScene::ContextRead => self.context_read = true,
            UsageScene::ContextEdit => self.context_edit = true,
        }
    }

    /// The enabled scenes in wire order.
    pub fn iter(&self) -> impl Iterator<Item = UsageScene> + '_ {
        [UsageScene::App, UsageScene::ContextRead, UsageScene::ContextEdit]
            .into_iter()
            .filter(|s| self.contains(*s))
    }
}

impl Default for UsageScenes {
    fn default() -> Self {
        Self::all()
    }
}

/// How a provider's response should be parsed and rendered.
///
/// Non-plain types also request a structured-output schema from the
/// provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OutputType {
    /// Render the response verbatim.
    #[default]
    Plain,
    /// Render a word-level diff against the input.
    Diff,
    /// Render aligned source/translation sentence pairs.
    SentencePairs,
    /// Render corrections with per-correction explanations.
    GrammarCheck,
}

impl OutputType {
    pub fn as_str(self) -> &'static str {
        match self {
            OutputType::Plain => "plain",
            OutputType::Diff => "diff",
            OutputType::SentencePairs => "sentencePairs",
            OutputType::GrammarCheck => "grammarCheck",
        }
    }

    /// Parse a wire-format output type. Matching is case-sensitive.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "plain" => Some(OutputType::Plain),
            "diff" => Some(OutputType::Diff),
            "sentencePairs" => Some(OutputType::SentencePairs),
            "grammarCheck" => Some(OutputType::GrammarCheck),
            _ => None,
        }
    }
}

/// A named, user-editable prompt template.
///
/// The prompt may embed `{text}`, `{targetLanguage}`, and
/// `{sourceLanguage}` placeholders, filled in at request-building time.
/// Actions are fully decoupled from providers; backend selection goes
/// through [`ProviderDeployment`] pairs derived from the provider list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    /// Stable identifier, preserved across save/load round-trips.
    pub id: Uuid,
    pub name: String,
    pub prompt: String,
    pub scenes: UsageScenes,
    pub output_type: OutputType,
}

impl Action {
    /// Create a new action with a fresh identifier, enabled everywhere.
    pub fn new(name: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            prompt: prompt.into(),
            scenes: UsageScenes::all(),
            output_type: OutputType::Plain,
        }
    }
}

/// Provider backend categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderCategory {
    /// The app-operated cloud backend; needs no user credentials.
    BuiltInCloud,
    /// Azure OpenAI resource (base endpoint + deployment names).
    AzureOpenAi,
    /// Any OpenAI-compatible endpoint the user points us at.
    Custom,
    /// A locally hosted model server.
    Local,
}

impl ProviderCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            ProviderCategory::BuiltInCloud => "builtInCloud",
            ProviderCategory::AzureOpenAi => "azureOpenAI",
            ProviderCategory::Custom => "custom",
            ProviderCategory::Local => "local",
        }
    }

    /// Parse a wire-format category. Matching is case-sensitive; an
    /// unrecognized string is a conversion failure, never a default.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "builtInCloud" => Some(ProviderCategory::BuiltInCloud),
            "azureOpenAI" => Some(ProviderCategory::AzureOpenAi),
            "custom" => Some(ProviderCategory::Custom),
            "local" => Some(ProviderCategory::Local),
            _ => None,
        }
    }
}

/// Fixed identifier of the built-in cloud provider, stable across
/// installs so documents can refer to it without credentials.
pub const BUILTIN_CLOUD_PROVIDER_ID: Uuid =
    Uuid::from_u128(0x6c696e_676f_4000_8000_000000000001);

/// Display name of the built-in cloud provider.
pub const BUILTIN_CLOUD_PROVIDER_NAME: &str = "Lingo Cloud";

/// A configured AI backend: endpoint, credentials, and the model
/// deployments it offers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provider {
    /// Stable identifier, preserved across save/load round-trips.
    pub id: Uuid,
    pub name: String,
    pub category: ProviderCategory,
    /// Base endpoint; the deployment segment is appended per request.
    pub endpoint: Option<Url>,
    pub api_version: Option<String>,
    /// Header carrying the token, e.g. `api-key` or `Authorization`.
    pub auth_header: Option<String>,
    pub token: String,
    /// Every deployment/model name the backend offers.
    pub deployments: Vec<String>,
    /// The subset of `deployments` currently enabled for use.
    pub enabled_deployments: Vec<String>,
}

impl Provider {
    /// Create a new empty provider of the given category.
    pub fn new(name: impl Into<String>, category: ProviderCategory) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            category,
            endpoint: None,
            api_version: None,
            auth_header: None,
            token: String::new(),
            deployments: Vec::new(),
            enabled_deployments: Vec::new(),
        }
    }

    /// The well-known built-in cloud provider. Requires no credentials
    /// and always exposes the standard deployment.
    pub fn builtin_cloud() -> Self {
        Self {
            id: BUILTIN_CLOUD_PROVIDER_ID,
            name: BUILTIN_CLOUD_PROVIDER_NAME.to_string(),
            category: ProviderCategory::BuiltInCloud,
            endpoint: None,
            api_version: None,
            auth_header: None,
            token: String::new(),
            deployments: vec!["standard".to_string()],
            enabled_deployments: vec!["standard".to_string()],
        }
    }

    /// The (provider, deployment) pairs currently enabled on this backend.
    pub fn enabled_pairs(&self) -> Vec<ProviderDeployment> {
        self.enabled_deployments
            .iter()
            .map(|d| ProviderDeployment {
                provider_id: self.id,
                deployment: d.clone(),
            })
            .collect()
    }
}

/// A precise reference to one deployment of one provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProviderDeployment {
    pub provider_id: Uuid,
    pub deployment: String,
}

/// Text-to-speech settings carried alongside the configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TtsConfig {
    /// Use the built-in voice service instead of a custom endpoint.
    pub use_default: bool,
    pub endpoint: Option<Url>,
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub voice: Option<String>,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            use_default: true,
            endpoint: None,
            api_key: None,
            model: None,
            voice: None,
        }
    }
}

/// A global hotkey binding, stored as key + modifier names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hotkey {
    pub key: String,
    pub modifiers: Vec<String>,
}

/// Metadata about a configuration document on disk. Listing/UI only,
/// never authoritative state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigFileInfo {
    /// Logical name: the file stem without the `.json` extension.
    pub name: String,
    pub path: PathBuf,
    pub modified: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scene_names_round_trip() {
        for scene in [UsageScene::App, UsageScene::ContextRead, UsageScene::ContextEdit] {
            assert_eq!(UsageScene::parse(scene.as_str()), Some(scene));
        }
        assert_eq!(UsageScene::parse("App"), None);
        assert_eq!(UsageScene::parse("contextwrite"), None);
    }

    #[test]
    fn output_type_parse_is_case_sensitive() {
        assert_eq!(OutputType::parse("sentencePairs"), Some(OutputType::SentencePairs));
        assert_eq!(OutputType::parse("SentencePairs"), None);
        assert_eq!(OutputType::parse("plain"), Some(OutputType::Plain));
        assert_eq!(OutputType::parse(""), None);
    }

    #[test]
    fn category_parse_is_case_sensitive() {
        assert_eq!(ProviderCategory::parse("azureOpenAI"), Some(ProviderCategory::AzureOpenAi));
        assert_eq!(ProviderCategory::parse("azureopenai"), None);
        assert_eq!(ProviderCategory::parse("builtInCloud"), Some(ProviderCategory::BuiltInCloud));
    }

    #[test]
    fn default_scenes_are_all() {
        let scenes = UsageScenes::default();
        assert!(scenes.is_all());
        assert!(!scenes.is_empty());
        assert_eq!(scenes.iter().count(), 3);
    }

    #[test]
    fn builtin_cloud_has_stable_identity() {
        let a = Provider::builtin_cloud();
        let b = Provider::builtin_cloud();
        assert_eq!(a.id, b.id);
        assert_eq!(a.id, BUILTIN_CLOUD_PROVIDER_ID);
        assert!(!a.enabled_deployments.is_empty());
    }

    #[test]
    fn enabled_pairs_reference_the_provider() {
        let mut provider = Provider::new("Azure", ProviderCategory::AzureOpenAi);
        provider.deployments = vec!["gpt-4".to_string(), "gpt-4o".to_string()];
        provider.enabled_deployments = vec!["gpt-4".to_string()];

        let pairs = provider.enabled_pairs();
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].provider_id, provider.id);
        assert_eq!(pairs[0].deployment, "gpt-4");
    }
}
