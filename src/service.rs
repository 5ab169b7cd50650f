//! Translation orchestrator.
//!
//! `TranslationService` composes the provider fallback chain, the cache (with
//! single-flight coalescing of concurrent misses), analytics recording, rate
//! limiting and the job queue. It is built once at startup and shared behind
//! an `Arc`.

use crate::analytics::{
    Analytics, AnalyticsEvent, ErrorStats, LifetimeCounters, StatsPeriod, UsageStats,
};
use crate::cache::{CacheKey, InvalidationPattern, TranslationCache, ANY_PROVIDER};
use crate::config::Config;
use crate::error::{ProviderError, TranslationError};
use crate::language;
use crate::models::{TranslateOptions, TranslationRequest, TranslationResult};
use crate::providers::{ProviderHealth, TranslationProvider};
use crate::queue::{Job, JobExecutor, JobLookup, JobQueue, JobRequest, QueueStats};
use crate::rate_limit::RateLimiter;
use crate::single_flight::SingleFlight;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

type Outcome = Result<TranslationResult, TranslationError>;

/// A request that passed validation, with codes normalized
#[derive(Debug, Clone)]
struct Prepared {
    text: String,
    source_lang: String,
    target_lang: String,
    provider: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Error,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProviderStatus {
    pub name: String,
    #[serde(flatten)]
    pub health: ProviderHealth,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CacheHealth {
    pub operative: bool,
    pub entries: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AnalyticsHealth {
    pub operative: bool,
    pub events: usize,
    pub lifetime: LifetimeCounters,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: HealthStatus,
    pub providers: Vec<ProviderStatus>,
    pub cache: CacheHealth,
    pub analytics: AnalyticsHealth,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue: Option<QueueStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl HealthReport {
    fn error(message: String) -> Self {
        Self {
            status: HealthStatus::Error,
            providers: Vec::new(),
            cache: CacheHealth {
                operative: false,
                entries: 0,
            },
            analytics: AnalyticsHealth {
                operative: false,
                events: 0,
                lifetime: LifetimeCounters::default(),
            },
            queue: None,
            message: Some(message),
        }
    }
}

pub struct TranslationService {
    providers: Vec<Arc<dyn TranslationProvider>>,
    cache: Arc<TranslationCache>,
    analytics: Arc<Analytics>,
    queue: Arc<JobQueue>,
    rate_limiter: RateLimiter,
    flights: SingleFlight<Outcome>,
    max_text_length: usize,
    max_batch_size: usize,
    batch_concurrency: usize,
    provider_timeout: Duration,
}

impl TranslationService {
    /// `providers` are tried in the given order.
    pub fn new(config: &Config, providers: Vec<Arc<dyn TranslationProvider>>) -> Self {
        Self {
            providers,
            cache: Arc::new(TranslationCache::new(
                config.cache_ttl,
                config.cache_max_entries,
            )),
            analytics: Arc::new(Analytics::new(config.analytics_max_events)),
            queue: Arc::new(JobQueue::new()),
            rate_limiter: RateLimiter::new(config.rate_limit_requests, config.rate_limit_window),
            flights: SingleFlight::new(),
            max_text_length: config.max_text_length,
            max_batch_size: config.max_batch_size.max(1),
            batch_concurrency: config.batch_concurrency.max(1),
            provider_timeout: config.provider_timeout,
        }
    }

    pub fn cache(&self) -> &Arc<TranslationCache> {
        &self.cache
    }

    pub fn analytics(&self) -> &Arc<Analytics> {
        &self.analytics
    }

    pub fn queue(&self) -> &Arc<JobQueue> {
        &self.queue
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    // ==================== Synchronous translation ====================

    pub async fn translate(
        &self,
        request: &TranslationRequest,
        options: &TranslateOptions,
    ) -> Outcome {
        let prepared = self.prepare(request, options.provider.as_deref())?;
        self.rate_limiter.check(options.caller.as_deref(), 1)?;
        self.translate_prepared(prepared).await
    }

    /// Translate each item independently; one failure never aborts the rest.
    /// Results are in input order.
    pub async fn translate_batch(
        &self,
        items: &[TranslationRequest],
        options: &TranslateOptions,
    ) -> Result<Vec<Outcome>, TranslationError> {
        if items.is_empty() {
            return Err(TranslationError::validation(
                "items must contain at least one entry",
            ));
        }
        if items.len() > self.max_batch_size {
            return Err(TranslationError::validation(format!(
                "Batch of {} items exceeds maximum of {}",
                items.len(),
                self.max_batch_size
            )));
        }
        if let Some(provider) = options.provider.as_deref() {
            self.resolve_provider(provider)?;
        }

        let units = u32::try_from(items.len()).unwrap_or(u32::MAX);
        self.rate_limiter.check(options.caller.as_deref(), units)?;

        Ok(self.run_batch(items, options.provider.as_deref()).await)
    }

    /// Batch translation for in-process callers; not rate limited.
    pub(crate) async fn translate_batch_internal(
        &self,
        items: &[TranslationRequest],
        provider: Option<&str>,
    ) -> Vec<Outcome> {
        self.run_batch(items, provider).await
    }

    async fn run_batch(&self, items: &[TranslationRequest], provider: Option<&str>) -> Vec<Outcome> {
        // Owned items keep the stream's futures free of caller lifetimes
        let mut indexed: Vec<(usize, Outcome)> =
            stream::iter(items.to_vec().into_iter().enumerate())
                .map(|(index, item)| async move {
                    let outcome = match self.prepare(&item, provider) {
                        Ok(prepared) => self.translate_prepared(prepared).await,
                        Err(e) => Err(e),
                    };
                    (index, outcome)
                })
                .buffer_unordered(self.batch_concurrency)
                .collect()
                .await;

        indexed.sort_by_key(|(index, _)| *index);

        let failed = indexed.iter().filter(|(_, r)| r.is_err()).count();
        if failed > 0 {
            warn!("Batch finished with {}/{} failed items", failed, indexed.len());
        }

        indexed.into_iter().map(|(_, outcome)| outcome).collect()
    }

    fn prepare(&self, request: &TranslationRequest, provider: Option<&str>) -> Result<Prepared, TranslationError> {
        if request.text.trim().is_empty() {
            return Err(TranslationError::validation("text is required"));
        }
        let length = request.text.chars().count();
        if length > self.max_text_length {
            return Err(TranslationError::TextTooLong {
                length,
                max: self.max_text_length,
            });
        }

        Ok(Prepared {
            text: request.text.clone(),
            source_lang: language::normalize_source(request.source_lang.as_deref())?,
            target_lang: language::normalize_target(&request.target_lang)?,
            provider: provider.map(|p| self.resolve_provider(p)).transpose()?,
        })
    }

    /// Canonical name of a configured adapter
    pub(crate) fn resolve_provider(&self, name: &str) -> Result<String, TranslationError> {
        self.providers
            .iter()
            .find(|p| p.name().eq_ignore_ascii_case(name.trim()))
            .map(|p| p.name().to_string())
            .ok_or_else(|| TranslationError::validation(format!("Unknown provider '{}'", name)))
    }

    async fn translate_prepared(&self, prepared: Prepared) -> Outcome {
        let selector = prepared.provider.as_deref().unwrap_or(ANY_PROVIDER);
        let key = CacheKey::new(
            selector,
            &prepared.source_lang,
            &prepared.target_lang,
            &prepared.text,
        );

        if let Some(hit) = self.cached(&key).await {
            return Ok(hit);
        }

        let flight = self
            .flights
            .run(&key.digest(), || async {
                // The previous flight for this key may have landed since our miss
                if let Some(hit) = self.cached(&key).await {
                    return Ok(hit);
                }
                let result = self.call_providers(&prepared).await?;
                self.cache.set(key.clone(), result.clone()).await;
                Ok(result)
            })
            .await;

        if flight.shared {
            debug!("Coalesced translation into in-flight request");
        }
        flight.value
    }

    async fn cached(&self, key: &CacheKey) -> Option<TranslationResult> {
        let hit = self.cache.get(key).await?;
        self.analytics
            .record(AnalyticsEvent::cache_hit(
                &hit.provider,
                &key.source_lang,
                &key.target_lang,
                key.text.chars().count(),
            ))
            .await;
        Some(hit)
    }

    /// Walk the fallback chain (or the single pinned adapter)
    async fn call_providers(&self, prepared: &Prepared) -> Outcome {
        let candidates: Vec<&Arc<dyn TranslationProvider>> = match &prepared.provider {
            Some(name) => self.providers.iter().filter(|p| p.name() == name).collect(),
            None => self.providers.iter().collect(),
        };
        if candidates.is_empty() {
            return Err(TranslationError::Provider(
                "no translation providers configured".to_string(),
            ));
        }

        let char_count = prepared.text.chars().count();
        let last = candidates.len() - 1;
        let mut failures = Vec::with_capacity(candidates.len());

        for (index, provider) in candidates.into_iter().enumerate() {
            let started = Instant::now();
            let outcome = tokio::time::timeout(
                self.provider_timeout,
                provider.translate(
                    &prepared.text,
                    &prepared.source_lang,
                    &prepared.target_lang,
                ),
            )
            .await
            .unwrap_or_else(|_| {
                Err(ProviderError::Timeout {
                    provider: provider.name().to_string(),
                    secs: self.provider_timeout.as_secs(),
                })
            });
            let latency = started.elapsed();

            match outcome {
                Ok(translation) => {
                    self.analytics
                        .record(AnalyticsEvent::attempt(
                            provider.name(),
                            &prepared.source_lang,
                            &prepared.target_lang,
                            char_count,
                            latency,
                            None,
                        ))
                        .await;
                    debug!(
                        "{} translated {} chars {} -> {} in {:?}",
                        provider.name(),
                        char_count,
                        prepared.source_lang,
                        prepared.target_lang,
                        latency
                    );
                    return Ok(TranslationResult {
                        translated_text: translation.translated_text,
                        detected_source_language: translation.detected_source_language,
                        provider: provider.name().to_string(),
                        cached: false,
                    });
                }
                Err(e) => {
                    warn!("Provider attempt failed: {}", e);
                    let event = AnalyticsEvent::attempt(
                        provider.name(),
                        &prepared.source_lang,
                        &prepared.target_lang,
                        char_count,
                        latency,
                        Some(e.kind()),
                    );
                    self.analytics
                        .record(if index == last { event.final_attempt() } else { event })
                        .await;
                    failures.push(e.to_string());
                }
            }
        }

        Err(TranslationError::Provider(failures.join("; ")))
    }

    // ==================== Jobs ====================

    /// Validate and enqueue; returns the job id without waiting.
    pub async fn queue_translation(&self, request: JobRequest) -> Result<String, TranslationError> {
        let data = match request.data {
            Some(serde_json::Value::Null) | None => {
                return Err(TranslationError::validation("data is required"))
            }
            Some(data) => data,
        };
        let target_lang = language::normalize_target(&request.target_lang)?;
        let source_lang = language::normalize_source(request.source_lang.as_deref())?;
        let provider = request
            .provider
            .as_deref()
            .map(|p| self.resolve_provider(p))
            .transpose()?;

        let id = self
            .queue
            .enqueue(data, source_lang, target_lang, provider)
            .await?;
        info!("Queued translation job {}", id);
        Ok(id)
    }

    pub async fn get_job_status(&self, job_id: &str) -> JobLookup {
        self.queue.get(job_id).await
    }

    pub async fn cancel_job(&self, job_id: &str) -> bool {
        self.queue.cancel(job_id).await
    }

    pub async fn get_queue_stats(&self) -> QueueStats {
        self.queue.stats().await
    }

    // ==================== Cache & analytics ====================

    /// Remove matching cache entries; an empty pattern clears everything.
    /// Blank fields are wildcards and codes match however they were cased.
    pub async fn invalidate_cache(
        &self,
        pattern: &InvalidationPattern,
    ) -> Result<usize, TranslationError> {
        let mut pattern = pattern.normalized()?;
        // Configured adapters match by name case-insensitively, like pins do
        pattern.provider = pattern.provider.take().map(|name| {
            if name.eq_ignore_ascii_case(ANY_PROVIDER) {
                ANY_PROVIDER.to_string()
            } else {
                self.resolve_provider(&name).unwrap_or(name)
            }
        });

        let removed = if pattern.is_empty() {
            self.cache.clear().await
        } else {
            self.cache.invalidate(&pattern).await
        };
        info!("Invalidated {} cache entries", removed);
        Ok(removed)
    }

    pub async fn get_stats(&self, period: StatsPeriod) -> UsageStats {
        self.analytics.get_stats(period).await
    }

    pub async fn get_error_stats(&self, period: StatsPeriod) -> ErrorStats {
        self.analytics.get_error_stats(period).await
    }

    // ==================== Health ====================

    /// `healthy` iff some provider is reachable and cache and analytics are
    /// operative; `error` if the evaluation itself doesn't finish.
    pub async fn health_check(&self) -> HealthReport {
        let deadline = self.provider_timeout + Duration::from_secs(2);
        match tokio::time::timeout(deadline, self.evaluate_health()).await {
            Ok(report) => report,
            Err(_) => {
                warn!("Health evaluation exceeded {:?}", deadline);
                HealthReport::error(format!("health evaluation exceeded {:?}", deadline))
            }
        }
    }

    async fn evaluate_health(&self) -> HealthReport {
        let checks = self.providers.iter().map(|provider| async move {
            let health = tokio::time::timeout(self.provider_timeout, provider.health_check())
                .await
                .unwrap_or(ProviderHealth {
                    reachable: false,
                    latency_ms: self.provider_timeout.as_millis() as u64,
                });
            ProviderStatus {
                name: provider.name().to_string(),
                health,
            }
        });

        let (providers, cache_operative, analytics_operative) = tokio::join!(
            futures::future::join_all(checks),
            self.cache.is_operative(),
            self.analytics.is_operative()
        );

        let cache = CacheHealth {
            operative: cache_operative,
            entries: if cache_operative {
                self.cache.stats().await.entries
            } else {
                0
            },
        };
        let analytics = AnalyticsHealth {
            operative: analytics_operative,
            events: if analytics_operative {
                self.analytics.event_count().await
            } else {
                0
            },
            lifetime: self.analytics.lifetime(),
        };
        let queue = if self.queue.is_operative().await {
            Some(self.queue.stats().await)
        } else {
            None
        };

        let any_reachable = providers.iter().any(|p| p.health.reachable);
        let status = if any_reachable && cache_operative && analytics_operative {
            HealthStatus::Healthy
        } else {
            HealthStatus::Degraded
        };

        HealthReport {
            status,
            providers,
            cache,
            analytics,
            queue,
            message: None,
        }
    }
}

/// Collect every non-blank string leaf, depth first, keys untouched
fn string_leaves<'a>(value: &'a mut serde_json::Value, out: &mut Vec<&'a mut String>) {
    match value {
        serde_json::Value::String(text) if !text.trim().is_empty() => out.push(text),
        serde_json::Value::Array(items) => {
            for item in items {
                string_leaves(item, out);
            }
        }
        serde_json::Value::Object(fields) => {
            for field in fields.values_mut() {
                string_leaves(field, out);
            }
        }
        _ => {}
    }
}

#[async_trait]
impl JobExecutor for TranslationService {
    async fn execute(
        &self,
        job: &Job,
        cancel: &CancellationToken,
    ) -> Result<serde_json::Value, TranslationError> {
        let mut payload = job.payload.clone();
        let mut leaves = Vec::new();
        string_leaves(&mut payload, &mut leaves);
        debug!("Job {} has {} text leaves", job.id, leaves.len());

        for leaf in leaves {
            if cancel.is_cancelled() {
                return Err(TranslationError::Internal(format!(
                    "job {} cancelled",
                    job.id
                )));
            }
            let request = TranslationRequest {
                text: leaf.clone(),
                source_lang: Some(job.source_lang.clone()),
                target_lang: job.target_lang.clone(),
            };
            let prepared = self.prepare(&request, job.provider.as_deref())?;
            *leaf = self.translate_prepared(prepared).await?.translated_text;
        }

        Ok(payload)
    }
}
