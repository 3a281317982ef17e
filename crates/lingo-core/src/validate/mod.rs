//! Structural and referential validation for configuration state.
//!
//! Both entry points are pure: no I/O, no short-circuiting, every issue
//! collected. Severity is a fixed property of the issue variant, never
//! contextual. Errors gate persistence and import application; warnings
//! are surfaced to the caller and logged, never blocking.

use std::collections::{BTreeSet, HashMap};

use url::Url;

use crate::document::{self, ConfigDocument};
use crate::document::convert::parse_provider_ref;
use crate::model::{Action, Provider, ProviderCategory, OutputType, UsageScene};

/// Issue severity. `Error` blocks save/load; `Warning` is informational.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

/// One classified validation finding, carrying the offending identifiers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationIssue {
    #[error("version `{version}` does not parse as dot-separated integers")]
    InvalidVersionFormat { version: String },
    #[error("document major version {major} is outside the supported range {min}..={max}")]
    UnsupportedVersion { major: u64, min: u64, max: u64 },
    #[error("provider `{provider}` has unrecognized category `{category}`")]
    UnknownProviderCategory { provider: String, category: String },
    #[error("provider `{provider}` has no endpoint")]
    MissingEndpoint { provider: String },
    #[error("provider `{provider}` endpoint `{url}` does not parse as a URL")]
    InvalidEndpointUrl { provider: String, url: String },
    #[error("action `{action}` references unknown provider `{provider}`")]
    UnknownProviderReference { action: String, provider: String },
    #[error("action `{action}` references deployment `{deployment}` not declared by provider `{provider}`")]
    UnknownDeploymentReference {
        action: String,
        provider: String,
        deployment: String,
    },
    #[error("action `{action}` has unrecognized output type `{value}`")]
    UnknownOutputType { action: String, value: String },
    #[error("provider `{provider}` has an empty token")]
    EmptyToken { provider: String },
    #[error("provider `{provider}` declares no deployments")]
    NoDeployments { provider: String },
    #[error("provider `{provider}` enables undeclared deployment `{deployment}`")]
    EnabledDeploymentNotDeclared { provider: String, deployment: String },
    #[error("action at position {index} has an empty name")]
    EmptyActionName { index: usize },
    #[error("action `{action}` has an empty prompt")]
    EmptyPrompt { action: String },
    #[error("action `{action}` lists unrecognized usage scene `{scene}`")]
    UnknownUsageScene { action: String, scene: String },
    #[error("duplicate action name `{name}`")]
    DuplicateActionName { name: String },
    #[error("provider `{provider}` is referenced by no action")]
    UnusedProvider { provider: String },
    #[error("no provider has an enabled deployment")]
    NoEnabledDeployments,
}

impl ValidationIssue {
    /// Fixed severity of this issue variant.
    pub fn severity(&self) -> Severity {
        match self {
            ValidationIssue::InvalidVersionFormat { .. }
            | ValidationIssue::UnsupportedVersion { .. }
            | ValidationIssue::UnknownProviderCategory { .. }
            | ValidationIssue::MissingEndpoint { .. }
            | ValidationIssue::InvalidEndpointUrl { .. }
            | ValidationIssue::UnknownProviderReference { .. }
            | ValidationIssue::UnknownDeploymentReference { .. }
            | ValidationIssue::UnknownOutputType { .. } => Severity::Error,
            ValidationIssue::EmptyToken { .. }
            | ValidationIssue::NoDeployments { .. }
            | ValidationIssue::EnabledDeploymentNotDeclared { .. }
            | ValidationIssue::EmptyActionName { .. }
            | ValidationIssue::EmptyPrompt { .. }
            | ValidationIssue::UnknownUsageScene { .. }
            | ValidationIssue::DuplicateActionName { .. }
            | ValidationIssue::UnusedProvider { .. }
            | ValidationIssue::NoEnabledDeployments => Severity::Warning,
        }
    }
}

/// The flat, ordered outcome of a validation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationResult {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationResult {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    /// True when any collected issue is blocking.
    pub fn has_errors(&self) -> bool {
        self.issues
            .iter()
            .any(|i| i.severity() == Severity::Error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues
            .iter()
            .filter(|i| i.severity() == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues
            .iter()
            .filter(|i| i.severity() == Severity::Warning)
    }

    fn push(&mut self, issue: ValidationIssue) {
        self.issues.push(issue);
    }
}

/// Validate a decoded document before it is applied or persisted.
pub fn validate_document(doc: &ConfigDocument) -> ValidationResult {
    let mut result = ValidationResult::default();

    match document::parse_version(&doc.version) {
        None => result.push(ValidationIssue::InvalidVersionFormat {
            version: doc.version.clone(),
        }),
        Some(version) => {
            if !document::version_supported(&version) {
                result.push(ValidationIssue::UnsupportedVersion {
                    major: version.major,
                    min: document::MIN_SUPPORTED_MAJOR,
                    max: document::MAX_SUPPORTED_MAJOR,
                });
            }
        }
    }

    // Normalized deployment lists per provider, for reference checks below.
    // Providers that fail normalization validate what they can and are
    // absent from the map.
    let mut declared: HashMap<&str, Vec<String>> = HashMap::new();
    let mut any_enabled = false;

    for (name, entry) in &doc.providers {
        if ProviderCategory::parse(&entry.category).is_none() {
            result.push(ValidationIssue::UnknownProviderCategory {
                provider: name.clone(),
                category: entry.category.clone(),
            });
        }
        let exempt_from_credentials =
            ProviderCategory::parse(&entry.category) == Some(ProviderCategory::BuiltInCloud);

        match (&entry.base_endpoint, &entry.endpoint) {
            (Some(raw), _) | (None, Some(raw)) => {
                if Url::parse(raw).is_err() {
                    result.push(ValidationIssue::InvalidEndpointUrl {
                        provider: name.clone(),
                        url: raw.clone(),
                    });
                }
            }
            (None, None) => {
                if !exempt_from_credentials {
                    result.push(ValidationIssue::MissingEndpoint {
                        provider: name.clone(),
                    });
                }
            }
        }

        if entry.token.is_empty() && !exempt_from_credentials {
            result.push(ValidationIssue::EmptyToken {
                provider: name.clone(),
            });
        }

        if let Some(provider) = entry.to_internal(name) {
            if provider.deployments.is_empty() {
                result.push(ValidationIssue::NoDeployments {
                    provider: name.clone(),
                });
            }
            if let Some(enabled) = &entry.enabled_deployments {
                for deployment in enabled {
                    if !provider.deployments.contains(deployment) {
                        result.push(ValidationIssue::EnabledDeploymentNotDeclared {
                            provider: name.clone(),
                            deployment: deployment.clone(),
                        });
                    }
                }
            }
            any_enabled |= !provider.enabled_deployments.is_empty();
            declared.insert(name.as_str(), provider.deployments);
        }
    }

    let mut any_legacy_refs = false;
    let mut referenced: BTreeSet<String> = BTreeSet::new();

    for (index, entry) in doc.actions.iter().enumerate() {
        let label = display_name(&entry.name, index);

        if entry.name.is_empty() {
            result.push(ValidationIssue::EmptyActionName { index });
        }
        if entry.prompt.is_empty() {
            result.push(ValidationIssue::EmptyPrompt {
                action: label.clone(),
            });
        }
        if let Some(raw) = &entry.output_type
            && OutputType::parse(raw).is_none()
        {
            result.push(ValidationIssue::UnknownOutputType {
                action: label.clone(),
                value: raw.clone(),
            });
        }
        for scene in entry.scenes.as_deref().unwrap_or_default() {
            if UsageScene::parse(scene).is_none() {
                result.push(ValidationIssue::UnknownUsageScene {
                    action: label.clone(),
                    scene: scene.clone(),
                });
            }
        }

        for reference in entry.providers.as_deref().unwrap_or_default() {
            any_legacy_refs = true;
            let (provider, deployment) = parse_provider_ref(reference);
            referenced.insert(provider.to_string());
            if !doc.providers.contains_key(provider) {
                result.push(ValidationIssue::UnknownProviderReference {
                    action: label.clone(),
                    provider: provider.to_string(),
                });
                continue;
            }
            if let Some(deployment) = deployment
                && let Some(deployments) = declared.get(provider)
                && !deployments.iter().any(|d| d == deployment)
            {
                result.push(ValidationIssue::UnknownDeploymentReference {
                    action: label.clone(),
                    provider: provider.to_string(),
                    deployment: deployment.to_string(),
                });
            }
        }
    }

    push_duplicate_names(
        doc.actions.iter().map(|a| a.name.as_str()),
        &mut result,
    );

    // "Unused" is only meaningful for documents that still carry
    // action-side references; the current generation has none.
    if any_legacy_refs {
        for name in doc.providers.keys() {
            if !referenced.contains(name) {
                result.push(ValidationIssue::UnusedProvider {
                    provider: name.clone(),
                });
            }
        }
    }

    if !doc.providers.is_empty() && !any_enabled {
        result.push(ValidationIssue::NoEnabledDeployments);
    }

    result
}

/// Validate the typed in-memory state the user is editing.
///
/// The typed model cannot express an invalid category, URL, or output
/// type, so this pass reports mostly warnings; the one blocking check is
/// a credentialed provider without any endpoint.
pub fn validate_in_memory(actions: &[Action], providers: &[Provider]) -> ValidationResult {
    let mut result = ValidationResult::default();
    let mut any_enabled = false;

    for provider in providers {
        let exempt = provider.category == ProviderCategory::BuiltInCloud;
        if provider.endpoint.is_none() && !exempt {
            result.push(ValidationIssue::MissingEndpoint {
                provider: provider.name.clone(),
            });
        }
        if provider.token.is_empty() && !exempt {
            result.push(ValidationIssue::EmptyToken {
                provider: provider.name.clone(),
            });
        }
        if provider.deployments.is_empty() {
            result.push(ValidationIssue::NoDeployments {
                provider: provider.name.clone(),
            });
        }
        for deployment in &provider.enabled_deployments {
            if !provider.deployments.contains(deployment) {
                result.push(ValidationIssue::EnabledDeploymentNotDeclared {
                    provider: provider.name.clone(),
                    deployment: deployment.clone(),
                });
            }
        }
        any_enabled |= !provider.enabled_deployments.is_empty();
    }

    for (index, action) in actions.iter().enumerate() {
        if action.name.is_empty() {
            result.push(ValidationIssue::EmptyActionName { index });
        }
        if action.prompt.is_empty() {
            result.push(ValidationIssue::EmptyPrompt {
                action: display_name(&action.name, index),
            });
        }
    }

    push_duplicate_names(actions.iter().map(|a| a.name.as_str()), &mut result);

    if !providers.is_empty() && !any_enabled {
        result.push(ValidationIssue::NoEnabledDeployments);
    }

    result
}

fn display_name(name: &str, index: usize) -> String {
    if name.is_empty() {
        format!("#{index}")
    } else {
        name.to_string()
    }
}

fn push_duplicate_names<'a>(
    names: impl Iterator<Item = &'a str>,
    result: &mut ValidationResult,
) {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut order: Vec<&str> = Vec::new();
    for name in names {
        if name.is_empty() {
            continue;
        }
        let count = counts.entry(name).or_insert(0);
        if *count == 0 {
            order.push(name);
        }
        *count += 1;
    }
    for name in order {
        if counts[name] > 1 {
            result.push(ValidationIssue::DuplicateActionName {
                name: name.to_string(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{ActionEntry, ProviderEntry};

    fn provider_entry(category: &str, base: Option<&str>, token: &str) -> ProviderEntry {
        ProviderEntry {
            id: None,
            category: category.to_string(),
            base_endpoint: base.map(str::to_string),
            api_version: None,
            deployments: Some(vec!["gpt-4".to_string()]),
            enabled_deployments: Some(vec!["gpt-4".to_string()]),
            endpoint: None,
            model: None,
            auth_header: None,
            token: token.to_string(),
        }
    }

    fn action_entry(name: &str, prompt: &str) -> ActionEntry {
        ActionEntry {
            id: None,
            name: name.to_string(),
            prompt: prompt.to_string(),
            scenes: None,
            output_type: None,
            providers: None,
        }
    }

    fn doc_with(
        actions: Vec<ActionEntry>,
        providers: Vec<(&str, ProviderEntry)>,
    ) -> ConfigDocument {
        ConfigDocument {
            version: document::CURRENT_VERSION.to_string(),
            actions,
            providers: providers
                .into_iter()
                .map(|(n, e)| (n.to_string(), e))
                .collect(),
            tts: None,
            preferences: None,
        }
    }

    #[test]
    fn clean_document_validates_clean() {
        let doc = doc_with(
            vec![action_entry("Translate", "Translate {text}")],
            vec![("Azure", provider_entry("azureOpenAI", Some("https://x.example.com"), "abc"))],
        );
        let result = validate_document(&doc);
        assert!(result.is_clean(), "unexpected issues: {:?}", result.issues);
    }

    #[test]
    fn bad_version_is_an_error() {
        let mut doc = doc_with(vec![], vec![]);
        doc.version = "three".to_string();
        let result = validate_document(&doc);
        assert!(result.has_errors());
        assert!(matches!(
            result.issues[0],
            ValidationIssue::InvalidVersionFormat { .. }
        ));
    }

    #[test]
    fn out_of_range_version_is_an_error() {
        let mut doc = doc_with(vec![], vec![]);
        doc.version = "0.9.0".to_string();
        assert!(validate_document(&doc).has_errors());

        doc.version = "4.0.0".to_string();
        assert!(validate_document(&doc).has_errors());
    }

    #[test]
    fn unknown_category_and_bad_url_are_errors() {
        let doc = doc_with(
            vec![],
            vec![
                ("A", provider_entry("openAI", Some("https://x.example.com"), "t")),
                ("B", provider_entry("custom", Some("no spaces allowed"), "t")),
            ],
        );
        let result = validate_document(&doc);
        let errors: Vec<_> = result.errors().collect();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn missing_endpoint_is_an_error_except_builtin() {
        let doc = doc_with(
            vec![],
            vec![
                ("Cloud", provider_entry("builtInCloud", None, "")),
                ("Own", provider_entry("custom", None, "t")),
            ],
        );
        let result = validate_document(&doc);
        let errors: Vec<_> = result.errors().collect();
        assert_eq!(errors.len(), 1);
        assert!(matches!(
            errors[0],
            ValidationIssue::MissingEndpoint { provider } if provider == "Own"
        ));
    }

    #[test]
    fn empty_fields_are_warnings_not_errors() {
        let doc = doc_with(
            vec![action_entry("", ""), action_entry("Translate", "p"), action_entry("Translate", "p")],
            vec![("Azure", provider_entry("azureOpenAI", Some("https://x.example.com"), ""))],
        );
        let result = validate_document(&doc);
        assert!(!result.has_errors());
        assert!(result.issues.contains(&ValidationIssue::EmptyActionName { index: 0 }));
        assert!(result.issues.contains(&ValidationIssue::EmptyPrompt { action: "#0".to_string() }));
        assert!(result.issues.contains(&ValidationIssue::EmptyToken { provider: "Azure".to_string() }));
        assert!(result.issues.contains(&ValidationIssue::DuplicateActionName { name: "Translate".to_string() }));
    }

    #[test]
    fn ghost_provider_reference_is_an_error_naming_the_provider() {
        let mut action = action_entry("Translate", "p");
        action.providers = Some(vec!["Ghost".to_string()]);
        let doc = doc_with(vec![action], vec![]);
        let result = validate_document(&doc);
        assert!(result.has_errors());
        assert!(result.issues.contains(&ValidationIssue::UnknownProviderReference {
            action: "Translate".to_string(),
            provider: "Ghost".to_string(),
        }));
    }

    #[test]
    fn unknown_deployment_reference_is_an_error() {
        let mut action = action_entry("Translate", "p");
        action.providers = Some(vec!["Azure:gpt-5".to_string()]);
        let doc = doc_with(
            vec![action],
            vec![("Azure", provider_entry("azureOpenAI", Some("https://x.example.com"), "t"))],
        );
        let result = validate_document(&doc);
        assert!(result.issues.contains(&ValidationIssue::UnknownDeploymentReference {
            action: "Translate".to_string(),
            provider: "Azure".to_string(),
            deployment: "gpt-5".to_string(),
        }));
    }

    #[test]
    fn unused_provider_only_reported_for_legacy_documents() {
        // Modern document: no action-side references, no "unused" concept.
        let modern = doc_with(
            vec![action_entry("Translate", "p")],
            vec![("Azure", provider_entry("azureOpenAI", Some("https://x.example.com"), "t"))],
        );
        assert!(!validate_document(&modern)
            .issues
            .iter()
            .any(|i| matches!(i, ValidationIssue::UnusedProvider { .. })));

        // Legacy document referencing only one of two providers.
        let mut action = action_entry("Translate", "p");
        action.providers = Some(vec!["Azure".to_string()]);
        let legacy = doc_with(
            vec![action],
            vec![
                ("Azure", provider_entry("azureOpenAI", Some("https://x.example.com"), "t")),
                ("Spare", provider_entry("custom", Some("https://y.example.com"), "t")),
            ],
        );
        assert!(validate_document(&legacy)
            .issues
            .contains(&ValidationIssue::UnusedProvider { provider: "Spare".to_string() }));
    }

    #[test]
    fn no_enabled_deployments_is_a_warning() {
        let mut entry = provider_entry("azureOpenAI", Some("https://x.example.com"), "t");
        entry.enabled_deployments = Some(vec![]);
        let doc = doc_with(vec![], vec![("Azure", entry)]);
        let result = validate_document(&doc);
        assert!(!result.has_errors());
        assert!(result.issues.contains(&ValidationIssue::NoEnabledDeployments));
    }

    #[test]
    fn in_memory_validation_never_blocks_reference_style_issues() {
        use crate::model::Provider;

        let mut provider = Provider::new("Azure", crate::model::ProviderCategory::AzureOpenAi);
        provider.endpoint = Some(Url::parse("https://x.example.com").unwrap());
        provider.deployments = vec!["gpt-4".to_string()];
        provider.enabled_deployments = vec!["gpt-4".to_string(), "gpt-5".to_string()];

        let result = validate_in_memory(&[], &[provider]);
        assert!(!result.has_errors());
        assert!(result.issues.contains(&ValidationIssue::EnabledDeploymentNotDeclared {
            provider: "Azure".to_string(),
            deployment: "gpt-5".to_string(),
        }));
    }

    #[test]
    fn in_memory_missing_endpoint_blocks_for_credentialed_providers() {
        use crate::model::Provider;

        let provider = Provider::new("Own", crate::model::ProviderCategory::Custom);
        let result = validate_in_memory(&[], &[provider]);
        assert!(result.has_errors());

        let builtin = Provider::builtin_cloud();
        let result = validate_in_memory(&[], &[builtin]);
        assert!(!result.has_errors());
    }
}
