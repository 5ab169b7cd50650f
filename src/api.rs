//! HTTP surface under `/translate`.
//!
//! Handlers are thin: they decode the request, call the service and map
//! [`TranslationError`] onto a status code and `{"error", "message"}` body.

use crate::analytics::StatsPeriod;
use crate::cache::InvalidationPattern;
use crate::error::{ErrorBody, TranslationError};
use crate::field_mapping::{BulkTranslateOptions, FieldMappingConfig, FieldMappingService};
use crate::models::{TranslateOptions, TranslationRequest, TranslationResult};
use crate::queue::{JobLookup, JobRequest};
use crate::service::{HealthStatus, TranslationService};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct ApiState {
    pub translator: Arc<TranslationService>,
    pub field_mappings: Arc<FieldMappingService>,
    /// Attach `Debug` detail to error bodies
    pub debug_errors: bool,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/translate", post(translate).get(health))
        .route("/translate/jobs", post(create_job).get(queue_stats))
        .route("/translate/jobs/:id", get(job_status).delete(cancel_job))
        .route("/translate/analytics", get(usage_stats))
        .route("/translate/errors", get(error_stats))
        .route("/translate/cache", delete(invalidate_cache))
        .route(
            "/translate/field-mappings",
            get(list_mappings).post(set_mapping).delete(remove_mapping),
        )
        .route("/translate/bulk", post(bulk_translate))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ==================== Errors ====================

pub struct ApiError {
    error: TranslationError,
    debug: bool,
}

impl ApiError {
    fn new(error: TranslationError, state: &ApiState) -> Self {
        Self {
            error,
            debug: state.debug_errors,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.error.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self.error);
        }

        let mut body = json!(ErrorBody::from(&self.error));
        if self.debug {
            body["debug"] = Value::String(format!("{:?}", self.error));
        }
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

/// Decode a JSON body, reporting malformed input as a validation error
fn body<T>(payload: Result<Json<T>, JsonRejection>, state: &ApiState) -> ApiResult<T> {
    payload.map(|Json(v)| v).map_err(|rejection| {
        ApiError::new(
            TranslationError::validation(format!("Invalid request body: {}", rejection.body_text())),
            state,
        )
    })
}

/// Rate limiter bucket: `x-client-id`, else the first `x-forwarded-for` hop
fn caller_id(headers: &HeaderMap) -> Option<String> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    header("x-client-id")
        .or_else(|| header("x-forwarded-for").and_then(|v| v.split(',').next()).map(str::trim))
        .map(str::to_string)
}

// ==================== Translation ====================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TranslateBody {
    #[serde(default)]
    text: String,
    #[serde(default)]
    source_lang: Option<String>,
    #[serde(default)]
    target_lang: String,
    #[serde(default)]
    provider: Option<String>,
    #[serde(default)]
    items: Option<Vec<TranslationRequest>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum BatchItem {
    Translated(TranslationResult),
    Failed(ErrorBody),
}

async fn translate(
    State(state): State<ApiState>,
    headers: HeaderMap,
    payload: Result<Json<TranslateBody>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let request = body(payload, &state)?;
    let options = TranslateOptions {
        provider: request.provider,
        caller: caller_id(&headers),
    };

    if let Some(items) = request.items {
        let results = state
            .translator
            .translate_batch(&items, &options)
            .await
            .map_err(|e| ApiError::new(e, &state))?;

        let results: Vec<BatchItem> = results
            .into_iter()
            .map(|outcome| match outcome {
                Ok(result) => BatchItem::Translated(result),
                Err(e) => BatchItem::Failed(ErrorBody::from(&e)),
            })
            .collect();
        return Ok(Json(json!({ "results": results })));
    }

    let single = TranslationRequest {
        text: request.text,
        source_lang: request.source_lang,
        target_lang: request.target_lang,
    };
    let result = state
        .translator
        .translate(&single, &options)
        .await
        .map_err(|e| ApiError::new(e, &state))?;
    Ok(Json(json!(result)))
}

async fn health(State(state): State<ApiState>) -> Response {
    let report = state.translator.health_check().await;
    let status = match report.status {
        HealthStatus::Healthy => StatusCode::OK,
        HealthStatus::Degraded | HealthStatus::Error => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status, Json(report)).into_response()
}

// ==================== Jobs ====================

async fn create_job(
    State(state): State<ApiState>,
    payload: Result<Json<JobRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let request = body(payload, &state)?;
    let job_id = state
        .translator
        .queue_translation(request)
        .await
        .map_err(|e| ApiError::new(e, &state))?;
    Ok((StatusCode::CREATED, Json(json!({ "jobId": job_id }))))
}

async fn queue_stats(State(state): State<ApiState>) -> Json<Value> {
    Json(json!(state.translator.get_queue_stats().await))
}

async fn job_status(State(state): State<ApiState>, Path(id): Path<String>) -> Response {
    let lookup = state.translator.get_job_status(&id).await;
    let status = if lookup.is_not_found() {
        StatusCode::NOT_FOUND
    } else {
        StatusCode::OK
    };
    (status, Json(lookup)).into_response()
}

async fn cancel_job(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    if state.translator.cancel_job(&id).await {
        return Ok(Json(json!({ "success": true, "jobId": id })));
    }

    let reason = match state.translator.get_job_status(&id).await {
        JobLookup::Found(_) => format!("Cancellable job {}", id),
        JobLookup::NotFound { .. } => format!("Job {}", id),
    };
    Err(ApiError::new(TranslationError::NotFound(reason), &state))
}

// ==================== Analytics ====================

#[derive(Debug, Deserialize)]
struct PeriodQuery {
    period: Option<String>,
}

async fn usage_stats(State(state): State<ApiState>, Query(query): Query<PeriodQuery>) -> Json<Value> {
    let period = StatsPeriod::parse(query.period.as_deref());
    Json(json!(state.translator.get_stats(period).await))
}

async fn error_stats(State(state): State<ApiState>, Query(query): Query<PeriodQuery>) -> Json<Value> {
    let period = StatsPeriod::parse(query.period.as_deref());
    Json(json!(state.translator.get_error_stats(period).await))
}

async fn invalidate_cache(
    State(state): State<ApiState>,
    Query(pattern): Query<InvalidationPattern>,
) -> ApiResult<Json<Value>> {
    let removed = state
        .translator
        .invalidate_cache(&pattern)
        .await
        .map_err(|e| ApiError::new(e, &state))?;
    Ok(Json(json!({ "success": true, "removed": removed })))
}

// ==================== Field mappings ====================

async fn list_mappings(State(state): State<ApiState>) -> Json<Value> {
    Json(json!(state.field_mappings.get_all_mappings().await))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SetMappingBody {
    #[serde(default)]
    table_name: String,
    #[serde(default)]
    field_name: String,
    config: Option<FieldMappingConfig>,
}

async fn set_mapping(
    State(state): State<ApiState>,
    payload: Result<Json<SetMappingBody>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let request = body(payload, &state)?;
    let Some(config) = request.config else {
        return Err(ApiError::new(
            TranslationError::validation("config is required"),
            &state,
        ));
    };

    state
        .field_mappings
        .set_field_mapping(&request.table_name, &request.field_name, config)
        .await
        .map_err(|e| ApiError::new(e, &state))?;
    Ok(Json(json!({ "success": true })))
}

#[derive(Debug, Deserialize)]
struct RemoveMappingQuery {
    table: Option<String>,
    field: Option<String>,
}

async fn remove_mapping(
    State(state): State<ApiState>,
    Query(query): Query<RemoveMappingQuery>,
) -> ApiResult<Json<Value>> {
    let (Some(table), Some(field)) = (query.table, query.field) else {
        return Err(ApiError::new(
            TranslationError::validation("table and field query parameters are required"),
            &state,
        ));
    };

    let removed = state
        .field_mappings
        .remove_field_mapping(&table, &field)
        .await
        .map_err(|e| ApiError::new(e, &state))?;
    Ok(Json(json!({ "success": true, "removed": removed })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BulkBody {
    #[serde(default)]
    table_name: String,
    #[serde(default)]
    source_language: String,
    #[serde(default)]
    options: BulkTranslateOptions,
}

async fn bulk_translate(
    State(state): State<ApiState>,
    payload: Result<Json<BulkBody>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let request = body(payload, &state)?;
    if request.source_language.trim().is_empty() {
        return Err(ApiError::new(
            TranslationError::validation("sourceLanguage is required"),
            &state,
        ));
    }

    let report = state
        .field_mappings
        .bulk_translate_table(&request.table_name, &request.source_language, &request.options)
        .await
        .map_err(|e| ApiError::new(e, &state))?;
    Ok(Json(json!(report)))
}
