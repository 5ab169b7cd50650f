use super::{error_body, network_error, ProviderHealth, ProviderTranslation, TranslationProvider};
use crate::error::ProviderError;
use crate::language::AUTO;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Instant;

const NAME: &str = "openai";

/// Adapter for the OpenAI chat completions API
pub struct OpenAiProvider {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
}

/// OpenAI Chat Completion request for translation
#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    max_completion_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reasoning_effort: Option<String>,
}

/// Check if a model is a reasoning model that doesn't support temperature
fn is_reasoning_model(model: &str) -> bool {
    model.starts_with("gpt-5")
        || model.starts_with("o1")
        || model.starts_with("o3")
        || model.starts_with("o4")
}

#[derive(Debug, Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

/// Build the system prompt for translation
fn build_system_prompt(source_lang: &str, target_lang: &str) -> String {
    let source = if source_lang == AUTO {
        "the source language (detect it)".to_string()
    } else {
        format!("language code '{}'", source_lang)
    };

    format!(
        r#"You are a professional translator for a content-management system. Translate the user's text from {} to language code '{}'.

## Translation Rules

### DO NOT translate:
- URLs, email addresses and file paths
- HTML tags, attributes and entities
- Placeholders such as {{name}}, %s or :id
- Proper names of people, companies, and products

### Formatting:
- Preserve all markdown and HTML formatting
- Preserve line breaks and surrounding whitespace
- Maintain the same structure and layout as the original

### Output:
- Reply with the translation only, no notes or quotation marks
- If a term has no good translation, keep the original term"#,
        source, target_lang
    )
}

impl OpenAiProvider {
    pub fn new(client: reqwest::Client, api_url: String, api_key: String, model: String) -> Self {
        Self {
            client,
            api_url,
            api_key,
            model,
        }
    }

    fn build_request(&self, text: &str, source_lang: &str, target_lang: &str) -> ChatRequest {
        // Reasoning models need higher token limits and don't support temperature
        let is_reasoning = is_reasoning_model(&self.model);
        // Rough upper bound: translations rarely exceed 2x the source length in tokens
        let max_completion_tokens = if is_reasoning {
            16000
        } else {
            (text.chars().count() as u32 * 2).clamp(256, 8000)
        };

        ChatRequest {
            model: self.model.clone(),
            messages: vec![
                Message {
                    role: "system".to_string(),
                    content: build_system_prompt(source_lang, target_lang),
                },
                Message {
                    role: "user".to_string(),
                    content: text.to_string(),
                },
            ],
            max_completion_tokens,
            temperature: if is_reasoning { None } else { Some(0.3) },
            reasoning_effort: if is_reasoning {
                Some("low".to_string())
            } else {
                None
            },
        }
    }

    /// `.../v1/chat/completions` -> `.../v1/models`
    fn models_url(&self) -> String {
        match self.api_url.rsplit_once("/chat/completions") {
            Some((base, _)) => format!("{}/models", base),
            None => self.api_url.clone(),
        }
    }
}

#[async_trait]
impl TranslationProvider for OpenAiProvider {
    fn name(&self) -> &str {
        NAME
    }

    async fn translate(
        &self,
        text: &str,
        source_lang: &str,
        target_lang: &str,
    ) -> Result<ProviderTranslation, ProviderError> {
        let request = self.build_request(text, source_lang, target_lang);

        let response = self
            .client
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| network_error(NAME, e))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            return Err(ProviderError::Status {
                provider: NAME.to_string(),
                status,
                body: error_body(response).await,
            });
        }

        let chat_response: ChatResponse =
            response.json().await.map_err(|e| ProviderError::Malformed {
                provider: NAME.to_string(),
                message: e.to_string(),
            })?;

        let translated = chat_response
            .choices
            .into_iter()
            .next()
            // Only the line breaks models wrap replies in; inner spacing is content
            .map(|c| c.message.content.trim_matches(['\r', '\n']).to_string())
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| ProviderError::Malformed {
                provider: NAME.to_string(),
                message: "response contained no choices".to_string(),
            })?;

        Ok(ProviderTranslation {
            translated_text: translated,
            // Chat completions don't report detection; echo what was asked for
            detected_source_language: source_lang.to_string(),
        })
    }

    async fn health_check(&self) -> ProviderHealth {
        let start = Instant::now();
        let reachable = match self
            .client
            .get(self.models_url())
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::debug!("OpenAI health check failed: {}", e);
                false
            }
        };

        ProviderHealth {
            reachable,
            latency_ms: start.elapsed().as_millis() as u64,
        }
    }
}
