//! Versioned wire format for configuration documents.
//!
//! A document is the JSON shape persisted on disk and exchanged through
//! import/export. Wire records (`*Entry`) deliberately keep loose string
//! fields so that documents from older schema generations still decode;
//! [`convert`] normalizes them into the typed model and signals
//! per-record failure instead of erroring the whole document.

pub mod convert;

use std::collections::BTreeMap;

use semver::Version;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Version written into every exported document.
pub const CURRENT_VERSION: &str = "3.0.0";

/// Oldest major version the decoder accepts directly. Anything below
/// falls back to the bundled default at load time.
pub const MIN_SUPPORTED_MAJOR: u64 = 1;

/// Newest major version the decoder accepts.
pub const MAX_SUPPORTED_MAJOR: u64 = 3;

/// Parse a document version string.
///
/// Accepts `major.minor` or `major.minor.patch`; a missing patch
/// component is treated as `0`. Returns `None` when any component is not
/// an unsigned integer.
pub fn parse_version(version: &str) -> Option<Version> {
    let parts: Vec<&str> = version.split('.').collect();
    if parts.len() < 2 || parts.len() > 3 {
        return None;
    }
    let mut numbers = [0u64; 3];
    for (i, part) in parts.iter().enumerate() {
        numbers[i] = part.parse().ok()?;
    }
    Some(Version::new(numbers[0], numbers[1], numbers[2]))
}

/// True when the parsed version is directly loadable.
pub fn version_supported(version: &Version) -> bool {
    (MIN_SUPPORTED_MAJOR..=MAX_SUPPORTED_MAJOR).contains(&version.major)
}

/// The serializable root of a configuration document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigDocument {
    pub version: String,
    /// Ordered action list; order is user-controlled and preserved.
    #[serde(default)]
    pub actions: Vec<ActionEntry>,
    /// Providers keyed by display name. A `BTreeMap` keeps key order
    /// deterministic for reproducible diffs.
    #[serde(default)]
    pub providers: BTreeMap<String, ProviderEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tts: Option<TtsEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferences: Option<PreferencesEntry>,
}

impl ConfigDocument {
    /// A minimal valid document: current version, no actions, and only
    /// the built-in cloud provider so the app remains usable.
    pub fn empty() -> Self {
        let builtin = crate::model::Provider::builtin_cloud();
        let (name, entry) = ProviderEntry::from_internal(&builtin);
        Self {
            version: CURRENT_VERSION.to_string(),
            actions: Vec::new(),
            providers: BTreeMap::from([(name, entry)]),
            tts: None,
            preferences: None,
        }
    }

    /// Decode a document from JSON bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    /// Encode as pretty-printed JSON with fully sorted object keys.
    ///
    /// Serializing through `serde_json::Value` (whose object map is a
    /// `BTreeMap`) sorts keys at every nesting level, which keeps saved
    /// files byte-stable under re-export.
    pub fn to_pretty_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        let value = serde_json::to_value(self)?;
        serde_json::to_vec_pretty(&value)
    }
}

/// Wire record for one action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionEntry {
    /// Stable identifier. Written by the exporter; absent in documents
    /// from generations that predate it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    pub name: String,
    #[serde(default)]
    pub prompt: String,
    /// Scene names; absent or empty means "all scenes".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scenes: Option<Vec<String>>,
    /// Output type tag; absent means `plain`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_type: Option<String>,
    /// Generation 1-2 action-side provider references (`"Name"` or
    /// `"Name:deployment"`). Accepted on read, never written back.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub providers: Option<Vec<String>>,
}

/// Wire record for one provider, keyed by display name in the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderEntry {
    /// Stable identifier. Written by the exporter; absent in documents
    /// from generations that predate it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    pub category: String,
    /// Generation 2+ shape: base endpoint plus a deployment list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployments: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled_deployments: Option<Vec<String>>,
    /// Generation 1 shape: one full URL with an embedded deployment
    /// segment. Accepted on read, never written back.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// Generation 1 shape: single model name. Accepted on read, never
    /// written back.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_header: Option<String>,
    #[serde(default)]
    pub token: String,
}

/// Wire record for text-to-speech settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TtsEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_default: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,
}

/// Wire record for the preference block riding along the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferencesEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hotkey: Option<HotkeyEntry>,
}

/// Wire record for a global hotkey binding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HotkeyEntry {
    pub key: String,
    #[serde(default)]
    pub modifiers: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_version_accepts_two_and_three_components() {
        assert_eq!(parse_version("3.0.0"), Some(Version::new(3, 0, 0)));
        assert_eq!(parse_version("2.1"), Some(Version::new(2, 1, 0)));
        assert_eq!(parse_version("0.9.0"), Some(Version::new(0, 9, 0)));
    }

    #[test]
    fn parse_version_rejects_garbage() {
        assert_eq!(parse_version(""), None);
        assert_eq!(parse_version("3"), None);
        assert_eq!(parse_version("three.zero"), None);
        assert_eq!(parse_version("1.2.3.4"), None);
        assert_eq!(parse_version("1.-2"), None);
    }

    #[test]
    fn version_support_window() {
        assert!(version_supported(&Version::new(1, 0, 0)));
        assert!(version_supported(&Version::new(3, 4, 1)));
        assert!(!version_supported(&Version::new(0, 9, 0)));
        assert!(!version_supported(&Version::new(4, 0, 0)));
    }

    #[test]
    fn empty_document_carries_builtin_provider() {
        let doc = ConfigDocument::empty();
        assert_eq!(doc.version, CURRENT_VERSION);
        assert!(doc.actions.is_empty());
        assert!(doc.providers.contains_key(crate::model::BUILTIN_CLOUD_PROVIDER_NAME));
    }

    #[test]
    fn decode_tolerates_missing_optional_blocks() {
        let json = r#"{ "version": "3.0.0" }"#;
        let doc = ConfigDocument::from_slice(json.as_bytes()).unwrap();
        assert!(doc.actions.is_empty());
        assert!(doc.providers.is_empty());
        assert!(doc.tts.is_none());
        assert!(doc.preferences.is_none());
    }

    #[test]
    fn legacy_generation_one_document_decodes() {
        let json = r#"{
            "version": "1.2.0",
            "actions": [
                { "name": "Translate", "prompt": "t", "providers": ["Azure:gpt-4"] }
            ],
            "providers": {
                "Azure": {
                    "category": "azureOpenAI",
                    "endpoint": "https://res.openai.azure.com/openai/deployments/gpt-4/chat/completions",
                    "model": "gpt-4",
                    "token": "abc"
                }
            }
        }"#;
        let doc = ConfigDocument::from_slice(json.as_bytes()).unwrap();
        assert_eq!(doc.actions.len(), 1);
        assert_eq!(doc.actions[0].providers.as_deref(), Some(&["Azure:gpt-4".to_string()][..]));
        assert!(doc.providers["Azure"].endpoint.is_some());
        assert!(doc.providers["Azure"].base_endpoint.is_none());
    }

    #[test]
    fn pretty_bytes_are_sorted_and_stable() {
        let doc = ConfigDocument::empty();
        let a = doc.to_pretty_bytes().unwrap();
        let b = doc.to_pretty_bytes().unwrap();
        assert_eq!(a, b);
        let text = String::from_utf8(a).unwrap();
        // `actions` sorts before `providers` before `version` at the root.
        let actions_at = text.find("\"actions\"").unwrap();
        let providers_at = text.find("\"providers\"").unwrap();
        let version_at = text.find("\"version\"").unwrap();
        assert!(actions_at < providers_at && providers_at < version_at);
    }
}
