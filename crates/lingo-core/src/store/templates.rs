//! Built-in action templates whose prompts track the target language.
//!
//! Each managed template can regenerate its prompt for any supported
//! target language. Regeneration only touches an action whose current
//! prompt textually matches a known generated variant (the current
//! wording or a legacy one, for any supported language). A prompt the
//! user has edited matches nothing and is left alone.
//!
//! Matching is keyed by the action's display name. Renaming a built-in
//! action therefore opts it out of re-templating; that mirrors how
//! customization is detected and is kept deliberately.

use tracing::debug;

use crate::model::{Action, OutputType};

/// Target languages the app can generate prompts for.
pub const SUPPORTED_TARGET_LANGUAGES: &[&str] = &[
    "English",
    "Simplified Chinese",
    "Traditional Chinese",
    "Japanese",
    "Korean",
    "Spanish",
    "French",
    "German",
    "Portuguese",
    "Russian",
    "Italian",
    "Vietnamese",
];

/// Target language assumed until the user picks one.
pub const DEFAULT_TARGET_LANGUAGE: &str = "English";

type PromptFn = fn(&str) -> String;

/// One managed built-in action template.
pub struct ManagedTemplate {
    pub name: &'static str,
    pub output_type: OutputType,
    current: PromptFn,
    legacy: &'static [PromptFn],
}

impl ManagedTemplate {
    /// The current-wording prompt for `language`.
    pub fn prompt_for(&self, language: &str) -> String {
        (self.current)(language)
    }

    /// True when `prompt` equals a generated variant (current or legacy
    /// wording) for any supported target language.
    pub fn matches_generated(&self, prompt: &str) -> bool {
        SUPPORTED_TARGET_LANGUAGES.iter().any(|language| {
            self.prompt_for(language) == prompt
                || self.legacy.iter().any(|wording| wording(language) == prompt)
        })
    }
}

fn translate_prompt(language: &str) -> String {
    format!(
        "Translate the following text into {language}. Output only the translation, without any explanation.\n\n{{text}}"
    )
}

fn translate_prompt_legacy(language: &str) -> String {
    format!("Please translate the text into {language}: {{text}}")
}

fn summarize_prompt(language: &str) -> String {
    format!("Summarize the following text in {language}, keeping the key points concise.\n\n{{text}}")
}

fn summarize_prompt_legacy(language: &str) -> String {
    format!("Please summarize the text in {language}: {{text}}")
}

fn grammar_check_prompt(language: &str) -> String {
    format!(
        "Check the grammar of the following text. Explain each correction in {language}.\n\n{{text}}"
    )
}

fn grammar_check_prompt_legacy(language: &str) -> String {
    format!("Fix the grammar and explain the fixes in {language}: {{text}}")
}

fn sentence_analysis_prompt(language: &str) -> String {
    format!(
        "Split the following text into sentences and explain the structure of each one in {language}.\n\n{{text}}"
    )
}

fn sentence_translate_prompt(language: &str) -> String {
    format!(
        "Translate the following text into {language} sentence by sentence, pairing every source sentence with its translation.\n\n{{text}}"
    )
}

/// The managed template catalog.
pub const MANAGED_TEMPLATES: &[ManagedTemplate] = &[
    ManagedTemplate {
        name: "Translate",
        output_type: OutputType::Plain,
        current: translate_prompt,
        legacy: &[translate_prompt_legacy],
    },
    ManagedTemplate {
        name: "Summarize",
        output_type: OutputType::Plain,
        current: summarize_prompt,
        legacy: &[summarize_prompt_legacy],
    },
    ManagedTemplate {
        name: "Grammar Check",
        output_type: OutputType::GrammarCheck,
        current: grammar_check_prompt,
        legacy: &[grammar_check_prompt_legacy],
    },
    ManagedTemplate {
        name: "Sentence Analysis",
        output_type: OutputType::SentencePairs,
        current: sentence_analysis_prompt,
        legacy: &[],
    },
    ManagedTemplate {
        name: "Sentence Translate",
        output_type: OutputType::SentencePairs,
        current: sentence_translate_prompt,
        legacy: &[],
    },
];

/// Look up a managed template by action display name.
pub fn managed_template(name: &str) -> Option<&'static ManagedTemplate> {
    MANAGED_TEMPLATES.iter().find(|t| t.name == name)
}

/// Regenerate the prompt of every un-customized managed action for
/// `language`. Returns how many prompts changed.
pub fn retemplate(actions: &mut [Action], language: &str) -> usize {
    let mut changed = 0;
    for action in actions.iter_mut() {
        let Some(template) = managed_template(&action.name) else {
            continue;
        };
        if !template.matches_generated(&action.prompt) {
            continue;
        }
        let fresh = template.prompt_for(language);
        if action.prompt != fresh {
            debug!(action = %action.name, language, "regenerated managed prompt");
            action.prompt = fresh;
            changed += 1;
        }
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_prompts_match_their_template() {
        for template in MANAGED_TEMPLATES {
            for language in SUPPORTED_TARGET_LANGUAGES {
                assert!(template.matches_generated(&template.prompt_for(language)));
            }
        }
    }

    #[test]
    fn legacy_wordings_still_match() {
        let template = managed_template("Translate").unwrap();
        assert!(template.matches_generated("Please translate the text into Japanese: {text}"));
    }

    #[test]
    fn customized_prompt_is_left_untouched() {
        let template = managed_template("Translate").unwrap();
        let mut actions = vec![Action::new(
            "Translate",
            "Translate {text} into {targetLanguage} and keep the tone playful",
        )];
        assert!(!template.matches_generated(&actions[0].prompt));
        assert_eq!(retemplate(&mut actions, "French"), 0);
        assert!(actions[0].prompt.contains("playful"));
    }

    #[test]
    fn unedited_prompt_follows_the_language_change() {
        let template = managed_template("Translate").unwrap();
        let mut actions = vec![Action::new("Translate", template.prompt_for("English"))];

        assert_eq!(retemplate(&mut actions, "Japanese"), 1);
        assert_eq!(actions[0].prompt, template.prompt_for("Japanese"));

        // Idempotent for the same language.
        assert_eq!(retemplate(&mut actions, "Japanese"), 0);
    }

    #[test]
    fn legacy_wording_upgrades_to_the_current_wording() {
        let mut actions = vec![Action::new(
            "Summarize",
            "Please summarize the text in German: {text}",
        )];
        assert_eq!(retemplate(&mut actions, "Spanish"), 1);
        assert_eq!(
            actions[0].prompt,
            managed_template("Summarize").unwrap().prompt_for("Spanish")
        );
    }

    #[test]
    fn renamed_action_is_not_retemplated() {
        let template = managed_template("Translate").unwrap();
        let mut actions = vec![Action::new("My Translate", template.prompt_for("English"))];
        assert_eq!(retemplate(&mut actions, "Korean"), 0);
        assert_eq!(actions[0].prompt, template.prompt_for("English"));
    }
}
