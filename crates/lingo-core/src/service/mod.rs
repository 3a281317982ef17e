//! Stateless import/export orchestration over the validator and the
//! wire-format converters.
//!
//! [`import`] is the strict path: a document with blocking issues is
//! rejected outright and nothing is applied. [`apply`] is the tolerant
//! path for documents that already passed the gate: every record that
//! converts is applied, anything that does not is dropped with a
//! warning.

use anyhow::Context;

use crate::document::convert::parse_provider_ref;
use crate::document::{
    ActionEntry, ConfigDocument, PreferencesEntry, ProviderEntry, TtsEntry, CURRENT_VERSION,
};
use crate::model::{
    Action, Hotkey, Provider, ProviderCategory, ProviderDeployment, TtsConfig,
};
use crate::validate::{self, ValidationIssue};

/// A successfully imported document plus its non-blocking findings.
#[derive(Debug, Clone)]
pub struct Import {
    pub document: ConfigDocument,
    pub warnings: Vec<ValidationIssue>,
}

/// Why an import was rejected.
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("document failed to decode")]
    Decode(#[from] serde_json::Error),
    #[error("document failed validation with {} blocking issue(s)", .errors.len())]
    Invalid { errors: Vec<ValidationIssue> },
}

/// The in-memory state produced by applying a document.
#[derive(Debug, Clone, Default)]
pub struct Applied {
    pub actions: Vec<Action>,
    pub providers: Vec<Provider>,
    /// Resolved backend pairs: decoded legacy action-side references, or
    /// every enabled (provider, deployment) pair for modern documents.
    pub deployments: Vec<ProviderDeployment>,
    pub tts: Option<TtsConfig>,
    pub target_language: Option<String>,
    pub hotkey: Option<Hotkey>,
    /// Conversion findings: dropped references and unconvertible records.
    pub warnings: Vec<ValidationIssue>,
}

/// Build a canonical generation-3 document from in-memory state.
pub fn build_document(
    actions: &[Action],
    providers: &[Provider],
    tts: Option<&TtsConfig>,
    target_language: Option<&str>,
    hotkey: Option<&Hotkey>,
) -> ConfigDocument {
    ConfigDocument {
        version: CURRENT_VERSION.to_string(),
        actions: actions.iter().map(ActionEntry::from_internal).collect(),
        providers: providers
            .iter()
            .map(ProviderEntry::from_internal)
            .collect(),
        tts: tts.map(TtsEntry::from_internal),
        preferences: PreferencesEntry::from_parts(target_language, hotkey),
    }
}

/// Serialize in-memory state to document bytes. Fails only on a
/// catastrophic encode error.
pub fn export(
    actions: &[Action],
    providers: &[Provider],
    tts: Option<&TtsConfig>,
    target_language: Option<&str>,
    hotkey: Option<&Hotkey>,
) -> anyhow::Result<Vec<u8>> {
    build_document(actions, providers, tts, target_language, hotkey)
        .to_pretty_bytes()
        .context("Failed to encode configuration document")
}

/// Decode and validate document bytes. A document with blocking issues
/// is rejected and must not be applied; warnings ride along on success.
pub fn import(bytes: &[u8]) -> Result<Import, ImportError> {
    let document = ConfigDocument::from_slice(bytes)?;
    let result = validate::validate_document(&document);
    if result.has_errors() {
        return Err(ImportError::Invalid {
            errors: result.errors().cloned().collect(),
        });
    }
    Ok(Import {
        warnings: result.warnings().cloned().collect(),
        document,
    })
}

/// Convert every entry of a validated document to internal form.
///
/// This is the only path by which a document becomes live in-memory
/// state. Records that fail conversion and references that do not
/// resolve are dropped with a warning, never a crash.
pub fn apply(document: &ConfigDocument) -> Applied {
    let mut providers = Vec::new();
    let mut actions = Vec::new();
    let mut deployments = Vec::new();
    let mut warnings = Vec::new();

    for (name, entry) in &document.providers {
        match entry.to_internal(name) {
            Some(provider) => providers.push(provider),
            None => warnings.push(provider_conversion_issue(name, entry)),
        }
    }

    let mut any_legacy_refs = false;
    for (index, entry) in document.actions.iter().enumerate() {
        match entry.to_internal() {
            Some(action) => actions.push(action),
            None => {
                warnings.push(ValidationIssue::UnknownOutputType {
                    action: if entry.name.is_empty() {
                        format!("#{index}")
                    } else {
                        entry.name.clone()
                    },
                    value: entry.output_type.clone().unwrap_or_default(),
                });
                continue;
            }
        }

        for reference in entry.providers.as_deref().unwrap_or_default() {
            any_legacy_refs = true;
            resolve_reference(&entry.name, reference, &providers, &mut deployments, &mut warnings);
        }
    }

    // Modern documents carry no action-side references; backend
    // selection derives from whatever deployments are enabled.
    if !any_legacy_refs {
        for provider in &providers {
            for pair in provider.enabled_pairs() {
                push_unique(&mut deployments, pair);
            }
        }
    }

    let mut applied = Applied {
        actions,
        providers,
        deployments,
        warnings,
        ..Applied::default()
    };
    applied.tts = document.tts.as_ref().map(TtsEntry::to_internal);
    if let Some(prefs) = &document.preferences {
        applied.target_language = prefs.target_language.clone();
        applied.hotkey = prefs.hotkey.as_ref().map(|h| h.to_internal());
    }

    applied
}

fn resolve_reference(
    action: &str,
    reference: &str,
    providers: &[Provider],
    deployments: &mut Vec<ProviderDeployment>,
    warnings: &mut Vec<ValidationIssue>,
) {
    let (provider_name, deployment) = parse_provider_ref(reference);
    let Some(provider) = providers.iter().find(|p| p.name == provider_name) else {
        warnings.push(ValidationIssue::UnknownProviderReference {
            action: action.to_string(),
            provider: provider_name.to_string(),
        });
        return;
    };

    match deployment {
        Some(deployment) if provider.deployments.iter().any(|d| d == deployment) => {
            push_unique(
                deployments,
                ProviderDeployment {
                    provider_id: provider.id,
                    deployment: deployment.to_string(),
                },
            );
        }
        Some(deployment) => {
            warnings.push(ValidationIssue::UnknownDeploymentReference {
                action: action.to_string(),
                provider: provider_name.to_string(),
                deployment: deployment.to_string(),
            });
        }
        // A bare provider reference means "any enabled deployment".
        None => {
            for pair in provider.enabled_pairs() {
                push_unique(deployments, pair);
            }
        }
    }
}

fn push_unique(pairs: &mut Vec<ProviderDeployment>, pair: ProviderDeployment) {
    if !pairs.contains(&pair) {
        pairs.push(pair);
    }
}

fn provider_conversion_issue(name: &str, entry: &ProviderEntry) -> ValidationIssue {
    if ProviderCategory::parse(&entry.category).is_none() {
        return ValidationIssue::UnknownProviderCategory {
            provider: name.to_string(),
            category: entry.category.clone(),
        };
    }
    ValidationIssue::InvalidEndpointUrl {
        provider: name.to_string(),
        url: entry
            .base_endpoint
            .clone()
            .or_else(|| entry.endpoint.clone())
            .unwrap_or_default(),
    }
}
