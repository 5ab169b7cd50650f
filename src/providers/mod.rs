//! Translation provider adapters.
//!
//! Each adapter wraps one external backend behind [`TranslationProvider`].
//! Adapters never retry on their own; fallback across adapters happens in
//! [`crate::service::TranslationService`].

mod libre;
mod openai;

pub use libre::LibreTranslateProvider;
pub use openai::OpenAiProvider;

use crate::config::{Config, ProviderKind};
use crate::error::ProviderError;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;

/// Successful output of a single adapter call
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderTranslation {
    pub translated_text: String,
    pub detected_source_language: String,
}

/// Reachability check result
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProviderHealth {
    pub reachable: bool,
    pub latency_ms: u64,
}

#[async_trait]
pub trait TranslationProvider: Send + Sync {
    /// Stable identifier used in cache keys, analytics and `provider` pins
    fn name(&self) -> &str;

    async fn translate(
        &self,
        text: &str,
        source_lang: &str,
        target_lang: &str,
    ) -> Result<ProviderTranslation, ProviderError>;

    async fn health_check(&self) -> ProviderHealth;
}

/// Build the adapters listed in the config, preserving priority order
pub fn build_providers(config: &Config) -> Result<Vec<Arc<dyn TranslationProvider>>> {
    let client = reqwest::Client::builder()
        .timeout(config.provider_timeout)
        .build()
        .context("Failed to create HTTP client")?;

    config
        .providers
        .iter()
        .map(|kind| -> Result<Arc<dyn TranslationProvider>> {
            Ok(match kind {
                ProviderKind::LibreTranslate => Arc::new(LibreTranslateProvider::new(
                    client.clone(),
                    config.libretranslate_url.clone(),
                    config.libretranslate_api_key.clone(),
                )),
                ProviderKind::OpenAi => Arc::new(OpenAiProvider::new(
                    client.clone(),
                    config.openai_api_url.clone(),
                    config
                        .openai_api_key
                        .clone()
                        .context("OPENAI_API_KEY not set")?,
                    config.openai_model.clone(),
                )),
            })
        })
        .collect()
}

/// Read an error body without letting a second failure mask the status
pub(crate) async fn error_body(response: reqwest::Response) -> String {
    response
        .text()
        .await
        .unwrap_or_else(|e| format!("<failed to read body: {}>", e))
}

pub(crate) fn network_error(provider: &str, err: reqwest::Error) -> ProviderError {
    ProviderError::Network {
        provider: provider.to_string(),
        message: err.to_string(),
    }
}
