//! Shared fixtures for unit tests.

use crate::config::Config;
use crate::error::ProviderError;
use crate::providers::{ProviderHealth, ProviderTranslation, TranslationProvider};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// In-process provider that "translates" by tagging the text with the
/// target language: `Bonjour` -> `[en] Bonjour`.
pub struct MockProvider {
    name: String,
    calls: AtomicU32,
    delay: Duration,
    reachable: bool,
    fail_all: bool,
    failing_texts: Mutex<HashSet<String>>,
}

impl MockProvider {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            calls: AtomicU32::new(0),
            delay: Duration::ZERO,
            reachable: true,
            fail_all: false,
            failing_texts: Mutex::new(HashSet::new()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail_all = true;
        self.reachable = false;
        self
    }

    pub fn unreachable(mut self) -> Self {
        self.reachable = false;
        self
    }

    /// Fail only for this exact input
    pub fn fail_on(self, text: &str) -> Self {
        self.failing_texts.lock().unwrap().insert(text.to_string());
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TranslationProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn translate(
        &self,
        text: &str,
        source_lang: &str,
        target_lang: &str,
    ) -> Result<ProviderTranslation, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        if self.fail_all || self.failing_texts.lock().unwrap().contains(text) {
            return Err(ProviderError::Status {
                provider: self.name.clone(),
                status: 503,
                body: "unavailable".to_string(),
            });
        }

        Ok(ProviderTranslation {
            translated_text: format!("[{}] {}", target_lang, text),
            detected_source_language: if source_lang == "auto" {
                "fr".to_string()
            } else {
                source_lang.to_string()
            },
        })
    }

    async fn health_check(&self) -> ProviderHealth {
        ProviderHealth {
            reachable: self.reachable,
            latency_ms: 1,
        }
    }
}

pub fn test_config() -> Config {
    Config {
        provider_timeout: Duration::from_secs(2),
        max_text_length: 100,
        max_batch_size: 10,
        batch_concurrency: 2,
        rate_limit_requests: 0,
        ..Config::default()
    }
}

pub fn providers(list: Vec<Arc<MockProvider>>) -> Vec<Arc<dyn TranslationProvider>> {
    list.into_iter()
        .map(|p| p as Arc<dyn TranslationProvider>)
        .collect()
}
