//! Request/response types shared by the service, queue and HTTP layer.

use serde::{Deserialize, Serialize};

/// One text to translate
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TranslationRequest {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub source_lang: Option<String>,
    #[serde(default)]
    pub target_lang: String,
}

impl TranslationRequest {
    pub fn new(text: impl Into<String>, source_lang: &str, target_lang: &str) -> Self {
        Self {
            text: text.into(),
            source_lang: Some(source_lang.to_string()),
            target_lang: target_lang.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TranslationResult {
    pub translated_text: String,
    pub detected_source_language: String,
    /// Adapter that produced the translation
    pub provider: String,
    /// True iff served from the cache without a provider call
    pub cached: bool,
}

/// Per-call knobs for `translate` / `translate_batch`
#[derive(Debug, Clone, Default)]
pub struct TranslateOptions {
    /// Pin to one adapter, skipping fallback
    pub provider: Option<String>,
    /// Rate limiter bucket; `None` shares the anonymous bucket
    pub caller: Option<String>,
}

impl TranslateOptions {
    pub fn with_provider(provider: impl Into<String>) -> Self {
        Self {
            provider: Some(provider.into()),
            caller: None,
        }
    }
}
