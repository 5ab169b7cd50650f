//! Integration tests for the translation orchestrator
//!
//! These tests drive the HTTP router end to end against in-process providers
//! and the in-memory row store, plus the LibreTranslate and OpenAI adapters
//! against mocked servers. No database or real provider is required.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

use translation_orchestrator::{
    api::{self, ApiState},
    config::Config,
    error::ProviderError,
    field_mapping::FieldMappingService,
    models::{TranslateOptions, TranslationRequest},
    providers::{
        LibreTranslateProvider, OpenAiProvider, ProviderHealth, ProviderTranslation,
        TranslationProvider,
    },
    service::TranslationService,
    storage::MemoryRowStore,
};

// ==================== Test Helpers ====================

/// Provider that prefixes the target language: `Bonjour` -> `[en] Bonjour`
struct EchoProvider {
    name: &'static str,
    calls: AtomicU32,
    failing_texts: Mutex<HashSet<String>>,
}

impl EchoProvider {
    fn new(name: &'static str) -> Arc<Self> {
        Arc::new(Self {
            name,
            calls: AtomicU32::new(0),
            failing_texts: Mutex::new(HashSet::new()),
        })
    }

    fn fail_on(&self, text: &str) {
        self.failing_texts.lock().unwrap().insert(text.to_string());
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TranslationProvider for EchoProvider {
    fn name(&self) -> &str {
        self.name
    }

    async fn translate(
        &self,
        text: &str,
        source_lang: &str,
        target_lang: &str,
    ) -> Result<ProviderTranslation, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        // Give concurrent callers a chance to pile up behind the leader
        tokio::time::sleep(Duration::from_millis(20)).await;

        if self.failing_texts.lock().unwrap().contains(text) {
            return Err(ProviderError::Status {
                provider: self.name.to_string(),
                status: 502,
                body: "bad gateway".to_string(),
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
            reachable: true,
            latency_ms: 0,
        }
    }
}

fn create_test_config() -> Config {
    Config {
        provider_timeout: Duration::from_secs(2),
        max_text_length: 50,
        max_batch_size: 5,
        batch_concurrency: 2,
        rate_limit_requests: 0,
        queue_workers: 1,
        ..Config::default()
    }
}

struct TestApp {
    router: Router,
    translator: Arc<TranslationService>,
    store: Arc<MemoryRowStore>,
    _shutdown: tokio_util::sync::DropGuard,
}

async fn create_test_app(config: Config, providers: Vec<Arc<dyn TranslationProvider>>) -> TestApp {
    let translator = Arc::new(TranslationService::new(&config, providers));
    let store = Arc::new(MemoryRowStore::new());
    let field_mappings = Arc::new(FieldMappingService::new(
        Arc::clone(&translator),
        store.clone(),
    ));

    let shutdown = CancellationToken::new();
    translator
        .queue()
        .start(config.queue_workers, translator.clone(), shutdown.clone())
        .await
        .expect("queue should start");

    let router = api::router(ApiState {
        translator: Arc::clone(&translator),
        field_mappings,
        debug_errors: false,
    });

    TestApp {
        router,
        translator,
        store,
        _shutdown: shutdown.drop_guard(),
    }
}

async fn echo_app() -> (TestApp, Arc<EchoProvider>) {
    let provider = EchoProvider::new("echo");
    let app = create_test_app(create_test_config(), vec![provider.clone()]).await;
    (app, provider)
}

async fn send(router: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("valid request");

    let response = router.clone().oneshot(request).await.expect("router responds");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("readable body");
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("JSON body")
    };
    (status, value)
}

async fn wait_for_job(router: &Router, job_id: &str, status: &str) -> Value {
    for _ in 0..200 {
        let (_, body) = send(router, "GET", &format!("/translate/jobs/{}", job_id), None).await;
        if body["status"] == status {
            return body;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {} never reached {}", job_id, status);
}

// ==================== Translate Endpoint Tests ====================

#[tokio::test]
async fn test_translate_then_cached() {
    let (app, provider) = echo_app().await;
    let request = json!({"text": "Bonjour", "sourceLang": "fr", "targetLang": "en"});

    let (status, first) = send(&app.router, "POST", "/translate", Some(request.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["translatedText"], "[en] Bonjour");
    assert_eq!(first["provider"], "echo");
    assert_eq!(first["cached"], false);

    let (status, second) = send(&app.router, "POST", "/translate", Some(request)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["translatedText"], first["translatedText"]);
    assert_eq!(second["cached"], true);
    assert_eq!(provider.calls(), 1);
}

#[tokio::test]
async fn test_translate_validation_errors() {
    let (app, provider) = echo_app().await;

    let (status, body) = send(
        &app.router,
        "POST",
        "/translate",
        Some(json!({"text": "", "sourceLang": "fr", "targetLang": "en"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");

    let (status, body) = send(
        &app.router,
        "POST",
        "/translate",
        Some(json!({"text": "x".repeat(51), "sourceLang": "fr", "targetLang": "en"})),
    )
    .await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["error"], "text_too_long");

    let (status, _) = send(&app.router, "POST", "/translate", Some(json!({"text": "Bonjour"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn test_malformed_body_is_bad_request() {
    let (app, _) = echo_app().await;

    let request = Request::builder()
        .method("POST")
        .uri("/translate")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_provider_pin_rejected() {
    let (app, _) = echo_app().await;

    let (status, body) = send(
        &app.router,
        "POST",
        "/translate",
        Some(json!({"text": "Bonjour", "targetLang": "en", "provider": "babelfish"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");
}

#[tokio::test]
async fn test_batch_partial_failure_keeps_order() {
    let (app, provider) = echo_app().await;
    provider.fail_on("deux");

    let (status, body) = send(
        &app.router,
        "POST",
        "/translate",
        Some(json!({"items": [
            {"text": "un", "sourceLang": "fr", "targetLang": "en"},
            {"text": "deux", "sourceLang": "fr", "targetLang": "en"},
            {"text": "trois", "sourceLang": "fr", "targetLang": "en"}
        ]})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let results = body["results"].as_array().expect("results array");
    assert_eq!(results.len(), 3);
    assert_eq!(results[0]["translatedText"], "[en] un");
    assert_eq!(results[1]["error"], "provider_error");
    assert_eq!(results[2]["translatedText"], "[en] trois");
}

#[tokio::test]
async fn test_batch_and_bulk_serve_from_spawned_tasks() {
    let (app, _) = echo_app().await;
    app.store
        .insert_row("articles", "1", &[("title_fr", Some("Bonjour")), ("title_en", None)])
        .await;
    send(
        &app.router,
        "POST",
        "/translate/field-mappings",
        Some(json!({
            "tableName": "articles",
            "fieldName": "title_fr",
            "config": {"targetFields": ["title_en"]}
        })),
    )
    .await;

    let batch = tokio::spawn({
        let router = app.router.clone();
        async move {
            send(
                &router,
                "POST",
                "/translate",
                Some(json!({"items": [
                    {"text": "un", "sourceLang": "fr", "targetLang": "en"},
                    {"text": "deux", "sourceLang": "fr", "targetLang": "en"}
                ]})),
            )
            .await
        }
    });
    let bulk = tokio::spawn({
        let router = app.router.clone();
        async move {
            send(
                &router,
                "POST",
                "/translate/bulk",
                Some(json!({"tableName": "articles", "sourceLanguage": "fr"})),
            )
            .await
        }
    });

    let (status, body) = batch.await.unwrap();
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["results"][1]["translatedText"], "[en] deux");

    let (status, report) = bulk.await.unwrap();
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["translated"], 1);
}

#[tokio::test]
async fn test_batch_over_limit_rejected() {
    let (app, provider) = echo_app().await;
    let items: Vec<Value> = (0..6)
        .map(|i| json!({"text": format!("t{}", i), "targetLang": "en"}))
        .collect();

    let (status, _) = send(&app.router, "POST", "/translate", Some(json!({ "items": items }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn test_rate_limit_per_client() {
    let config = Config {
        rate_limit_requests: 2,
        rate_limit_window: Duration::from_secs(60),
        ..create_test_config()
    };
    let app = create_test_app(config, vec![EchoProvider::new("echo")]).await;

    let request = |client: &str, text: &str| {
        Request::builder()
            .method("POST")
            .uri("/translate")
            .header("content-type", "application/json")
            .header("x-client-id", client)
            .body(Body::from(
                json!({"text": text, "targetLang": "en"}).to_string(),
            ))
            .unwrap()
    };

    for text in ["a", "b"] {
        let response = app.router.clone().oneshot(request("alice", text)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
    let response = app.router.clone().oneshot(request("alice", "c")).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

    let response = app.router.clone().oneshot(request("bob", "c")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_health_endpoint() {
    let (app, _) = echo_app().await;

    let (status, body) = send(&app.router, "GET", "/translate", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["providers"][0]["name"], "echo");
    assert_eq!(body["providers"][0]["reachable"], true);
}

// ==================== Job Endpoint Tests ====================

#[tokio::test]
async fn test_job_lifecycle_over_http() {
    let (app, _) = echo_app().await;

    let (status, created) = send(
        &app.router,
        "POST",
        "/translate/jobs",
        Some(json!({
            "data": {"title": "Bonjour", "tags": ["un", "deux"], "views": 3},
            "targetLang": "en"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let job_id = created["jobId"].as_str().expect("jobId").to_string();

    let job = wait_for_job(&app.router, &job_id, "completed").await;
    assert_eq!(job["result"]["title"], "[en] Bonjour");
    assert_eq!(job["result"]["tags"][1], "[en] deux");
    assert_eq!(job["result"]["views"], 3);
    assert!(job.get("error").is_none());

    // Completed jobs cannot be cancelled
    let (status, _) = send(&app.router, "DELETE", &format!("/translate/jobs/{}", job_id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let job = wait_for_job(&app.router, &job_id, "completed").await;
    assert_eq!(job["status"], "completed");

    let (status, stats) = send(&app.router, "GET", "/translate/jobs", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["completed"], 1);
}

#[tokio::test]
async fn test_job_requires_data() {
    let (app, _) = echo_app().await;

    let (status, body) = send(
        &app.router,
        "POST",
        "/translate/jobs",
        Some(json!({"targetLang": "en"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");
}

#[tokio::test]
async fn test_unknown_job_not_found() {
    let (app, _) = echo_app().await;

    let (status, body) = send(&app.router, "GET", "/translate/jobs/nope", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({"jobId": "nope", "status": "not_found"}));

    let (status, body) = send(&app.router, "DELETE", "/translate/jobs/nope", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
}

// ==================== Cache & Analytics Endpoint Tests ====================

#[tokio::test]
async fn test_cache_invalidation_by_target_language() {
    let (app, provider) = echo_app().await;
    let service = &app.translator;
    let options = TranslateOptions::default();

    for target in ["en", "de"] {
        service
            .translate(&TranslationRequest::new("Bonjour", "fr", target), &options)
            .await
            .unwrap();
    }
    assert_eq!(provider.calls(), 2);

    let (status, body) = send(&app.router, "DELETE", "/translate/cache?targetLang=en", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["removed"], 1);

    let en = service
        .translate(&TranslationRequest::new("Bonjour", "fr", "en"), &options)
        .await
        .unwrap();
    let de = service
        .translate(&TranslationRequest::new("Bonjour", "fr", "de"), &options)
        .await
        .unwrap();
    assert!(!en.cached);
    assert!(de.cached);
    assert_eq!(provider.calls(), 3);

    let (_, body) = send(&app.router, "DELETE", "/translate/cache", None).await;
    assert_eq!(body["removed"], 2);
}

#[tokio::test]
async fn test_cache_invalidation_ignores_code_case() {
    let (app, _) = echo_app().await;

    for target in ["EN", "de"] {
        let (status, _) = send(
            &app.router,
            "POST",
            "/translate",
            Some(json!({"text": "Bonjour", "sourceLang": "FR", "targetLang": target})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, body) = send(
        &app.router,
        "DELETE",
        "/translate/cache?targetLang=EN&sourceLang=Fr&provider=ECHO",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["removed"], 1);
    assert_eq!(app.translator.cache().stats().await.entries, 1);
}

#[tokio::test]
async fn test_cache_invalidation_blank_params_are_wildcards() {
    let (app, _) = echo_app().await;
    let options = TranslateOptions::default();

    for target in ["en", "de", "es"] {
        app.translator
            .translate(&TranslationRequest::new("Bonjour", "fr", target), &options)
            .await
            .unwrap();
    }

    let (status, body) = send(
        &app.router,
        "DELETE",
        "/translate/cache?provider=&sourceLang=&targetLang=en&text=",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["removed"], 1);

    let (status, body) = send(
        &app.router,
        "DELETE",
        "/translate/cache?provider=&sourceLang=&targetLang=&text=",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["removed"], 2);
}

#[tokio::test]
async fn test_cache_invalidation_rejects_bad_code() {
    let (app, _) = echo_app().await;
    app.translator
        .translate(
            &TranslationRequest::new("Bonjour", "fr", "en"),
            &TranslateOptions::default(),
        )
        .await
        .unwrap();

    let (status, body) = send(&app.router, "DELETE", "/translate/cache?targetLang=english", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");
    assert_eq!(app.translator.cache().stats().await.entries, 1);
}

#[tokio::test]
async fn test_analytics_endpoints() {
    let (app, provider) = echo_app().await;
    provider.fail_on("boom");

    for text in ["Bonjour", "Bonjour", "boom"] {
        let _ = send(
            &app.router,
            "POST",
            "/translate",
            Some(json!({"text": text, "sourceLang": "fr", "targetLang": "en"})),
        )
        .await;
    }

    let (status, stats) = send(&app.router, "GET", "/translate/analytics?period=1h", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["totalRequests"], 3);
    assert_eq!(stats["cacheHits"], 1);
    assert_eq!(stats["failureCount"], 1);

    let (status, errors) = send(&app.router, "GET", "/translate/errors", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(errors["totalErrors"], 1);
    assert_eq!(errors["byProvider"]["echo"], 1);
}

// ==================== Field Mapping Endpoint Tests ====================

#[tokio::test]
async fn test_field_mapping_crud_over_http() {
    let (app, _) = echo_app().await;

    let (status, _) = send(
        &app.router,
        "POST",
        "/translate/field-mappings",
        Some(json!({
            "tableName": "articles",
            "fieldName": "title_fr",
            "config": {"targetFields": ["title_en", "title_de"]}
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, all) = send(&app.router, "GET", "/translate/field-mappings", None).await;
    assert_eq!(
        all["articles"]["title_fr"]["targetFields"],
        json!(["title_en", "title_de"])
    );
    assert_eq!(all["articles"]["title_fr"]["autoTranslate"], true);

    let (status, body) = send(
        &app.router,
        "DELETE",
        "/translate/field-mappings?table=articles&field=title_fr",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["removed"], true);

    let (_, all) = send(&app.router, "GET", "/translate/field-mappings", None).await;
    assert!(all.get("articles").is_none());

    let (status, _) = send(&app.router, "DELETE", "/translate/field-mappings?table=articles", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_field_mapping_requires_config() {
    let (app, _) = echo_app().await;

    let (status, _) = send(
        &app.router,
        "POST",
        "/translate/field-mappings",
        Some(json!({"tableName": "articles", "fieldName": "title_fr"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_bulk_translate_is_idempotent() {
    let (app, _) = echo_app().await;
    app.store
        .insert_row("articles", "1", &[("title_fr", Some("Bonjour")), ("title_en", None)])
        .await;
    app.store
        .insert_row("articles", "2", &[("title_fr", Some("Salut")), ("title_en", Some("Hi"))])
        .await;

    send(
        &app.router,
        "POST",
        "/translate/field-mappings",
        Some(json!({
            "tableName": "articles",
            "fieldName": "title_fr",
            "config": {"targetFields": ["title_en"]}
        })),
    )
    .await;

    let bulk = json!({"tableName": "articles", "sourceLanguage": "fr"});
    let (status, first) = send(&app.router, "POST", "/translate/bulk", Some(bulk.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["success"], true);
    assert_eq!(first["translated"], 1);
    assert_eq!(first["skipped"], 1);
    assert_eq!(
        app.store.value("articles", "1", "title_en").await.as_deref(),
        Some("[en] Bonjour")
    );
    assert_eq!(
        app.store.value("articles", "2", "title_en").await.as_deref(),
        Some("Hi")
    );

    let writes = app.store.write_count();
    let (_, second) = send(&app.router, "POST", "/translate/bulk", Some(bulk)).await;
    assert_eq!(second["translated"], 0);
    assert_eq!(second["skipped"], 2);
    assert_eq!(app.store.write_count(), writes);
}

#[tokio::test]
async fn test_bulk_requires_source_language() {
    let (app, _) = echo_app().await;

    let (status, body) = send(
        &app.router,
        "POST",
        "/translate/bulk",
        Some(json!({"tableName": "articles"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");
}

// ==================== Single-Flight Tests ====================

#[tokio::test]
async fn test_concurrent_requests_share_one_provider_call() {
    let (app, provider) = echo_app().await;

    let requests = (0..10).map(|_| {
        send(
            &app.router,
            "POST",
            "/translate",
            Some(json!({"text": "Bonjour", "sourceLang": "fr", "targetLang": "en"})),
        )
    });
    let responses = futures::future::join_all(requests).await;

    assert_eq!(provider.calls(), 1);
    for (status, body) in responses {
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["translatedText"], "[en] Bonjour");
    }
}

// ==================== Provider Mock Server Tests ====================

#[tokio::test]
async fn test_fallback_from_libretranslate_to_openai() {
    let libre_server = MockServer::start().await;
    let openai_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/translate"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .expect(1)
        .mount(&libre_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "Hello"}}]
        })))
        .expect(1)
        .mount(&openai_server)
        .await;

    let client = reqwest::Client::new();
    let providers: Vec<Arc<dyn TranslationProvider>> = vec![
        Arc::new(LibreTranslateProvider::new(
            client.clone(),
            libre_server.uri(),
            None,
        )),
        Arc::new(OpenAiProvider::new(
            client,
            format!("{}/v1/chat/completions", openai_server.uri()),
            "sk-test".to_string(),
            "gpt-4o-mini".to_string(),
        )),
    ];
    let app = create_test_app(create_test_config(), providers).await;

    let (status, body) = send(
        &app.router,
        "POST",
        "/translate",
        Some(json!({"text": "Bonjour", "sourceLang": "fr", "targetLang": "en"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["translatedText"], "Hello");
    assert_eq!(body["provider"], "openai");

    let (_, errors) = send(&app.router, "GET", "/translate/errors", None).await;
    assert_eq!(errors["byProvider"]["libretranslate"], 1);

    let (_, usage) = send(&app.router, "GET", "/translate/analytics", None).await;
    assert_eq!(usage["totalRequests"], 1);
    assert_eq!(usage["failureCount"], 1);
}

#[tokio::test]
async fn test_all_providers_down_is_server_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/translate"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/languages"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let providers: Vec<Arc<dyn TranslationProvider>> = vec![Arc::new(
        LibreTranslateProvider::new(reqwest::Client::new(), server.uri(), None),
    )];
    let app = create_test_app(create_test_config(), providers).await;

    let (status, body) = send(
        &app.router,
        "POST",
        "/translate",
        Some(json!({"text": "Bonjour", "targetLang": "en"})),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "provider_error");
    assert!(body.get("debug").is_none());

    let (status, health) = send(&app.router, "GET", "/translate", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(health["status"], "degraded");
}
