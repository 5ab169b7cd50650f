//! Translation analytics and observability.
//!
//! Keeps an append-only, bounded log of [`AnalyticsEvent`]s (one per provider
//! attempt or cache hit) and aggregates it over fixed time windows on read.
//! A request walking the fallback chain leaves one event per attempt but only
//! its last one carries `ends_request`, so usage counts requests once.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;

/// Aggregation window accepted by the stats endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StatsPeriod {
    #[serde(rename = "1h")]
    Hour,
    #[serde(rename = "24h")]
    Day,
    #[serde(rename = "7d")]
    Week,
    #[serde(rename = "30d")]
    Month,
}

impl StatsPeriod {
    /// Parse a period string; anything unrecognized falls back to `24h`.
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some("1h") => Self::Hour,
            Some("7d") => Self::Week,
            Some("30d") => Self::Month,
            _ => Self::Day,
        }
    }

    pub fn duration(&self) -> ChronoDuration {
        match self {
            Self::Hour => ChronoDuration::hours(1),
            Self::Day => ChronoDuration::hours(24),
            Self::Week => ChronoDuration::days(7),
            Self::Month => ChronoDuration::days(30),
        }
    }

    /// The longest window; events older than this are never reported
    pub fn longest() -> Self {
        Self::Month
    }
}

/// A single recorded attempt or cache hit. Never mutated after recording.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsEvent {
    pub timestamp: DateTime<Utc>,
    pub provider: String,
    pub source_lang: String,
    pub target_lang: String,
    pub char_count: usize,
    pub success: bool,
    pub cached: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
    pub latency_ms: u64,
    /// Last event of a request: a cache hit, a success or the final failure
    pub ends_request: bool,
}

impl AnalyticsEvent {
    pub fn attempt(
        provider: &str,
        source_lang: &str,
        target_lang: &str,
        char_count: usize,
        latency: Duration,
        error_kind: Option<&str>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            provider: provider.to_string(),
            source_lang: source_lang.to_string(),
            target_lang: target_lang.to_string(),
            char_count,
            success: error_kind.is_none(),
            cached: false,
            error_kind: error_kind.map(str::to_string),
            latency_ms: latency.as_millis() as u64,
            ends_request: error_kind.is_none(),
        }
    }

    /// Mark a failed attempt as the one that exhausted the chain
    pub fn final_attempt(self) -> Self {
        Self {
            ends_request: true,
            ..self
        }
    }

    pub fn cache_hit(provider: &str, source_lang: &str, target_lang: &str, char_count: usize) -> Self {
        Self {
            timestamp: Utc::now(),
            provider: provider.to_string(),
            source_lang: source_lang.to_string(),
            target_lang: target_lang.to_string(),
            char_count,
            success: true,
            cached: true,
            error_kind: None,
            latency_ms: 0,
            ends_request: true,
        }
    }
}

/// Usage report for one window.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UsageStats {
    pub period: StatsPeriod,
    /// Cache hits plus provider-served requests; fallbacks count once
    pub total_requests: usize,
    pub cache_hits: usize,
    /// Cache hit rate as a percentage (0-100)
    pub cache_hit_rate: f64,
    /// Attempt outcomes, so a fallback shows up as one failure and one success
    pub success_count: usize,
    pub failure_count: usize,
    pub total_characters: usize,
    pub average_latency_ms: f64,
    pub by_provider: BTreeMap<String, usize>,
    pub by_target_language: BTreeMap<String, usize>,
}

/// Error report for one window.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ErrorStats {
    pub period: StatsPeriod,
    pub total_errors: usize,
    pub by_kind: BTreeMap<String, usize>,
    pub by_provider: BTreeMap<String, usize>,
}

impl ErrorStats {
    pub fn empty(period: StatsPeriod) -> Self {
        Self {
            period,
            total_errors: 0,
            by_kind: BTreeMap::new(),
            by_provider: BTreeMap::new(),
        }
    }
}

/// Counters since process start, independent of the event window.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LifetimeCounters {
    pub events_recorded: u64,
    pub provider_calls: u64,
    pub provider_failures: u64,
    pub cache_hits: u64,
}

pub struct Analytics {
    events: RwLock<VecDeque<AnalyticsEvent>>,
    max_events: usize,

    /// Number of events ever recorded
    events_recorded: AtomicU64,

    /// Number of provider attempts
    provider_calls: AtomicU64,

    /// Number of provider attempts that failed
    provider_failures: AtomicU64,

    /// Number of requests served from cache
    cache_hits: AtomicU64,
}

impl Analytics {
    pub fn new(max_events: usize) -> Self {
        Self {
            events: RwLock::new(VecDeque::new()),
            max_events: max_events.max(1),
            events_recorded: AtomicU64::new(0),
            provider_calls: AtomicU64::new(0),
            provider_failures: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
        }
    }

    pub async fn record(&self, event: AnalyticsEvent) {
        self.events_recorded.fetch_add(1, Ordering::Relaxed);
        if event.cached {
            self.cache_hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.provider_calls.fetch_add(1, Ordering::Relaxed);
            if !event.success {
                self.provider_failures.fetch_add(1, Ordering::Relaxed);
            }
        }

        let mut events = self.events.write().await;
        if events.len() >= self.max_events {
            events.pop_front();
        }
        events.push_back(event);
    }

    pub async fn get_stats(&self, period: StatsPeriod) -> UsageStats {
        let since = Utc::now() - period.duration();
        let events = self.events.read().await;

        let mut stats = UsageStats {
            period,
            total_requests: 0,
            cache_hits: 0,
            cache_hit_rate: 0.0,
            success_count: 0,
            failure_count: 0,
            total_characters: 0,
            average_latency_ms: 0.0,
            by_provider: BTreeMap::new(),
            by_target_language: BTreeMap::new(),
        };
        let mut latency_total = 0u64;
        let mut latency_samples = 0u64;

        for event in events.iter().filter(|e| e.timestamp >= since) {
            if event.ends_request {
                stats.total_requests += 1;
            }
            *stats.by_provider.entry(event.provider.clone()).or_default() += 1;
            *stats
                .by_target_language
                .entry(event.target_lang.clone())
                .or_default() += 1;

            if event.cached {
                stats.cache_hits += 1;
            } else {
                latency_total += event.latency_ms;
                latency_samples += 1;
            }

            if event.success {
                stats.success_count += 1;
                stats.total_characters += event.char_count;
            } else {
                stats.failure_count += 1;
            }
        }

        if stats.total_requests > 0 {
            stats.cache_hit_rate =
                (stats.cache_hits as f64 / stats.total_requests as f64) * 100.0;
        }
        if latency_samples > 0 {
            stats.average_latency_ms = latency_total as f64 / latency_samples as f64;
        }

        stats
    }

    pub async fn get_error_stats(&self, period: StatsPeriod) -> ErrorStats {
        let since = Utc::now() - period.duration();
        let events = self.events.read().await;
        let mut stats = ErrorStats::empty(period);

        for event in events
            .iter()
            .filter(|e| !e.success && e.timestamp >= since)
        {
            stats.total_errors += 1;
            let kind = event.error_kind.clone().unwrap_or_else(|| "unknown".to_string());
            *stats.by_kind.entry(kind).or_default() += 1;
            *stats.by_provider.entry(event.provider.clone()).or_default() += 1;
        }

        stats
    }

    /// Drop events older than `max_age`. Returns how many were removed.
    pub async fn prune_older_than(&self, max_age: ChronoDuration) -> usize {
        let cutoff = Utc::now() - max_age;
        let mut events = self.events.write().await;
        let before = events.len();
        // Events are appended in time order
        while events.front().is_some_and(|e| e.timestamp < cutoff) {
            events.pop_front();
        }
        before - events.len()
    }

    pub fn lifetime(&self) -> LifetimeCounters {
        LifetimeCounters {
            events_recorded: self.events_recorded.load(Ordering::Relaxed),
            provider_calls: self.provider_calls.load(Ordering::Relaxed),
            provider_failures: self.provider_failures.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
        }
    }

    pub async fn event_count(&self) -> usize {
        self.events.read().await.len()
    }

    pub async fn is_operative(&self) -> bool {
        tokio::time::timeout(Duration::from_millis(500), self.events.read())
            .await
            .is_ok()
    }

    #[cfg(test)]
    async fn record_at(&self, mut event: AnalyticsEvent, timestamp: DateTime<Utc>) {
        event.timestamp = timestamp;
        self.record(event).await;
    }
}
