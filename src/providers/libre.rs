use super::{error_body, network_error, ProviderHealth, ProviderTranslation, TranslationProvider};
use crate::error::ProviderError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Instant;

const NAME: &str = "libretranslate";

/// Adapter for a self-hosted LibreTranslate server
pub struct LibreTranslateProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

#[derive(Debug, Serialize)]
struct LibreRequest<'a> {
    q: &'a str,
    source: &'a str,
    target: &'a str,
    format: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    api_key: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LibreResponse {
    translated_text: String,
    detected_language: Option<DetectedLanguage>,
}

#[derive(Debug, Deserialize)]
struct DetectedLanguage {
    language: String,
}

impl LibreTranslateProvider {
    pub fn new(client: reqwest::Client, base_url: String, api_key: Option<String>) -> Self {
        Self {
            client,
            base_url,
            api_key,
        }
    }
}

#[async_trait]
impl TranslationProvider for LibreTranslateProvider {
    fn name(&self) -> &str {
        NAME
    }

    async fn translate(
        &self,
        text: &str,
        source_lang: &str,
        target_lang: &str,
    ) -> Result<ProviderTranslation, ProviderError> {
        let request = LibreRequest {
            q: text,
            source: source_lang,
            target: target_lang,
            format: "text",
            api_key: self.api_key.as_deref(),
        };

        let response = self
            .client
            .post(format!("{}/translate", self.base_url))
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

        let body: LibreResponse = response.json().await.map_err(|e| ProviderError::Malformed {
            provider: NAME.to_string(),
            message: e.to_string(),
        })?;

        Ok(ProviderTranslation {
            translated_text: body.translated_text,
            detected_source_language: body
                .detected_language
                .map_or_else(|| source_lang.to_string(), |d| d.language),
        })
    }

    async fn health_check(&self) -> ProviderHealth {
        let start = Instant::now();
        let reachable = match self
            .client
            .get(format!("{}/languages", self.base_url))
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::debug!("LibreTranslate health check failed: {}", e);
                false
            }
        };

        ProviderHealth {
            reachable,
            latency_ms: start.elapsed().as_millis() as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::{
        matchers::{body_partial_json, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    fn provider(server: &MockServer, api_key: Option<&str>) -> LibreTranslateProvider {
        LibreTranslateProvider::new(
            reqwest::Client::new(),
            server.uri(),
            api_key.map(str::to_string),
        )
    }

    #[tokio::test]
    async fn test_translate_success_with_detection() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/translate"))
            .and(body_partial_json(serde_json::json!({
                "q": "Bonjour",
                "source": "auto",
                "target": "en",
                "format": "text"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "translatedText": "Hello",
                "detectedLanguage": { "confidence": 92.0, "language": "fr" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let result = provider(&server, None)
            .translate("Bonjour", "auto", "en")
            .await
            .expect("should translate");

        assert_eq!(result.translated_text, "Hello");
        assert_eq!(result.detected_source_language, "fr");
    }

    #[tokio::test]
    async fn test_translate_without_detection_echoes_source() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/translate"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "translatedText": "Hola" })),
            )
            .mount(&server)
            .await;

        let result = provider(&server, None)
            .translate("Hello", "en", "es")
            .await
            .unwrap();

        assert_eq!(result.detected_source_language, "en");
    }

    #[tokio::test]
    async fn test_translate_sends_api_key() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/translate"))
            .and(body_partial_json(serde_json::json!({ "api_key": "secret" })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "translatedText": "ok" })),
            )
            .expect(1)
            .mount(&server)
            .await;

        provider(&server, Some("secret"))
            .translate("x", "en", "fr")
            .await
            .expect("key should be accepted");
    }

    #[tokio::test]
    async fn test_translate_status_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/translate"))
            .respond_with(ResponseTemplate::new(400).set_body_string("unsupported language"))
            .mount(&server)
            .await;

        let err = provider(&server, None)
            .translate("x", "en", "xx")
            .await
            .unwrap_err();

        match err {
            ProviderError::Status { status, body, .. } => {
                assert_eq!(status, 400);
                assert!(body.contains("unsupported"));
            }
            other => panic!("expected status error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_translate_malformed_payload() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/translate"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>proxy</html>"))
            .mount(&server)
            .await;

        let err = provider(&server, None)
            .translate("x", "en", "fr")
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "malformed_response");
    }

    #[tokio::test]
    async fn test_translate_unreachable_server() {
        let provider = LibreTranslateProvider::new(
            reqwest::Client::new(),
            "http://127.0.0.1:1".to_string(),
            None,
        );

        let err = provider.translate("x", "en", "fr").await.unwrap_err();
        assert_eq!(err.kind(), "network");
    }

    #[tokio::test]
    async fn test_health_check() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/languages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(&server)
            .await;

        assert!(provider(&server, None).health_check().await.reachable);

        let down = LibreTranslateProvider::new(
            reqwest::Client::new(),
            "http://127.0.0.1:1".to_string(),
            None,
        );
        assert!(!down.health_check().await.reachable);
    }
}
