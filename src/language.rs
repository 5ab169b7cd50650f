//! Language code handling.
//!
//! Codes are BCP-47-ish primary tags with an optional region/script subtag
//! (`en`, `fr`, `pt-BR`, `zh-Hant`). `auto` is only meaningful as a source.

use crate::error::TranslationError;
use regex::Regex;
use std::sync::OnceLock;

/// Source language value that asks the provider to detect the language.
pub const AUTO: &str = "auto";

static CODE_PATTERN: OnceLock<Regex> = OnceLock::new();

fn code_pattern() -> &'static Regex {
    CODE_PATTERN.get_or_init(|| {
        Regex::new(r"^[a-z]{2,3}(-[A-Za-z]{2,4})?$").expect("language code regex is valid")
    })
}

/// Normalize a target language code.
///
/// The primary subtag is lowercased; the subtag after `-` keeps its case.
pub fn normalize_target(code: &str) -> Result<String, TranslationError> {
    let code = code.trim();
    if code.is_empty() {
        return Err(TranslationError::validation("targetLang is required"));
    }
    let normalized = lowercase_primary(code);
    if normalized == AUTO {
        return Err(TranslationError::validation(
            "targetLang cannot be 'auto'",
        ));
    }
    if !code_pattern().is_match(&normalized) {
        return Err(TranslationError::validation(format!(
            "Invalid language code: '{}'",
            code
        )));
    }
    Ok(normalized)
}

/// Normalize a source language code; empty or missing means `auto`.
pub fn normalize_source(code: Option<&str>) -> Result<String, TranslationError> {
    match code.map(str::trim) {
        None | Some("") => Ok(AUTO.to_string()),
        Some(code) => {
            let normalized = lowercase_primary(code);
            if normalized == AUTO || code_pattern().is_match(&normalized) {
                Ok(normalized)
            } else {
                Err(TranslationError::validation(format!(
                    "Invalid language code: '{}'",
                    code
                )))
            }
        }
    }
}

/// Language of a column named with a `_xx` suffix (`title_fr` -> `fr`).
///
/// Returns `None` when the suffix is not a language code.
pub fn field_language(field: &str) -> Option<String> {
    let (_, suffix) = field.rsplit_once('_')?;
    let candidate = lowercase_primary(suffix);
    if code_pattern().is_match(&candidate) {
        Some(candidate)
    } else {
        None
    }
}

fn lowercase_primary(code: &str) -> String {
    match code.split_once('-') {
        Some((primary, rest)) => format!("{}-{}", primary.to_ascii_lowercase(), rest),
        None => code.to_ascii_lowercase(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_normalize_target_simple() {
        assert_eq!(normalize_target("en").unwrap(), "en");
        assert_eq!(normalize_target(" FR ").unwrap(), "fr");
        assert_eq!(normalize_target("pt-BR").unwrap(), "pt-BR");
    }

    #[test]
    fn test_normalize_target_rejects_empty_and_auto() {
        assert!(matches!(
            normalize_target(""),
            Err(TranslationError::Validation(_))
        ));
        assert!(matches!(
            normalize_target("auto"),
            Err(TranslationError::Validation(_))
        ));
    }

    #[test]
    fn test_normalize_target_rejects_garbage() {
        assert!(normalize_target("english").is_err());
        assert!(normalize_target("e").is_err());
        assert!(normalize_target("en_US").is_err());
    }

    #[test]
    fn test_normalize_source_defaults_to_auto() {
        assert_eq!(normalize_source(None).unwrap(), "auto");
        assert_eq!(normalize_source(Some("  ")).unwrap(), "auto");
        assert_eq!(normalize_source(Some("AUTO")).unwrap(), "auto");
        assert_eq!(normalize_source(Some("ar")).unwrap(), "ar");
    }

    #[test]
    fn test_field_language() {
        assert_eq!(field_language("title_fr").as_deref(), Some("fr"));
        assert_eq!(field_language("long_description_ar").as_deref(), Some("ar"));
        assert_eq!(field_language("title").as_deref(), None);
        assert_eq!(field_language("created_at").as_deref(), Some("at"));
        assert_eq!(field_language("body_html1"), None);
    }

    proptest! {
        #[test]
        fn prop_two_letter_codes_always_accepted(code in "[a-zA-Z]{2}") {
            let normalized = normalize_target(&code).unwrap();
            prop_assert_eq!(normalized, code.to_ascii_lowercase());
        }

        #[test]
        fn prop_normalize_is_idempotent(code in "[a-z]{2,3}(-[A-Z]{2})?") {
            let once = normalize_target(&code).unwrap();
            let twice = normalize_target(&once).unwrap();
            prop_assert_eq!(once, twice);
        }
    }
}
