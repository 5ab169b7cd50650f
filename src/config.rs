use anyhow::{bail, Context, Result};
use std::time::Duration;

/// Translation backends that can appear in the provider priority list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    LibreTranslate,
    OpenAi,
}

impl ProviderKind {
    pub fn parse(name: &str) -> Result<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "libretranslate" | "libre" => Ok(Self::LibreTranslate),
            "openai" => Ok(Self::OpenAi),
            other => bail!("Unknown translation provider: '{}'", other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    // Server
    pub port: u16,
    pub debug_errors: bool,

    // Providers (in priority order)
    pub providers: Vec<ProviderKind>,
    pub provider_timeout: Duration,
    pub libretranslate_url: String,
    pub libretranslate_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub openai_api_url: String,

    // Request limits
    pub max_text_length: usize,
    pub max_batch_size: usize,
    pub batch_concurrency: usize,
    pub rate_limit_requests: u32,
    pub rate_limit_window: Duration,

    // Cache
    pub cache_ttl: Duration,
    pub cache_max_entries: usize,

    // Queue
    pub queue_workers: usize,
    pub job_retention: Duration,

    // Analytics
    pub analytics_max_events: usize,

    // Maintenance
    pub maintenance_cron: String,

    // Storage
    pub database_url: Option<String>,
    pub field_mappings_file: Option<String>,
}

impl Default for Config {
    /// Documented defaults: a local LibreTranslate, in-memory storage
    fn default() -> Self {
        Self {
            port: 8080,
            debug_errors: false,

            providers: vec![ProviderKind::LibreTranslate],
            provider_timeout: Duration::from_secs(15),
            libretranslate_url: "http://localhost:5000".to_string(),
            libretranslate_api_key: None,
            openai_api_key: None,
            openai_model: "gpt-4o-mini".to_string(),
            openai_api_url: "https://api.openai.com/v1/chat/completions".to_string(),

            max_text_length: 5000,
            max_batch_size: 100,
            batch_concurrency: 4,
            rate_limit_requests: 100,
            rate_limit_window: Duration::from_secs(60),

            cache_ttl: Duration::from_secs(86_400),
            cache_max_entries: 10_000,

            queue_workers: 2,
            job_retention: Duration::from_secs(24 * 3600),

            analytics_max_events: 100_000,

            // 6-field cron: sec min hour dom month dow
            maintenance_cron: "0 */10 * * * *".to_string(),

            database_url: None,
            field_mappings_file: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let mut providers = match optional_var("TRANSLATION_PROVIDERS") {
            Some(list) => list
                .split(',')
                .filter(|s| !s.trim().is_empty())
                .map(ProviderKind::parse)
                .collect::<Result<Vec<_>>>()
                .context("Invalid TRANSLATION_PROVIDERS")?,
            None => defaults.providers.clone(),
        };
        // Aliases name the same adapter; first mention keeps its priority
        let mut seen = Vec::with_capacity(providers.len());
        providers.retain(|kind| {
            let first = !seen.contains(kind);
            seen.push(*kind);
            first
        });

        if providers.is_empty() {
            bail!("TRANSLATION_PROVIDERS must list at least one provider");
        }

        let openai_api_key = optional_var("OPENAI_API_KEY");
        if providers.contains(&ProviderKind::OpenAi) && openai_api_key.is_none() {
            bail!("OPENAI_API_KEY not set but 'openai' is listed in TRANSLATION_PROVIDERS");
        }

        Ok(Self {
            // Server
            port: parsed_var("PORT", defaults.port),
            debug_errors: parsed_var("DEBUG_ERRORS", defaults.debug_errors),

            // Providers
            providers,
            provider_timeout: secs_var("PROVIDER_TIMEOUT_SECS", defaults.provider_timeout),
            libretranslate_url: optional_var("LIBRETRANSLATE_URL")
                .unwrap_or(defaults.libretranslate_url)
                .trim_end_matches('/')
                .to_string(),
            libretranslate_api_key: optional_var("LIBRETRANSLATE_API_KEY"),
            openai_api_key,
            openai_model: optional_var("OPENAI_MODEL").unwrap_or(defaults.openai_model),
            openai_api_url: optional_var("OPENAI_API_URL").unwrap_or(defaults.openai_api_url),

            // Request limits
            max_text_length: parsed_var("MAX_TEXT_LENGTH", defaults.max_text_length),
            max_batch_size: parsed_var("MAX_BATCH_SIZE", defaults.max_batch_size).max(1),
            batch_concurrency: parsed_var("BATCH_CONCURRENCY", defaults.batch_concurrency).max(1),
            rate_limit_requests: parsed_var("RATE_LIMIT_REQUESTS", defaults.rate_limit_requests),
            rate_limit_window: secs_var("RATE_LIMIT_WINDOW_SECS", defaults.rate_limit_window),

            // Cache
            cache_ttl: secs_var("CACHE_TTL_SECS", defaults.cache_ttl),
            cache_max_entries: parsed_var("CACHE_MAX_ENTRIES", defaults.cache_max_entries),

            // Queue
            queue_workers: parsed_var("QUEUE_WORKERS", defaults.queue_workers).max(1),
            job_retention: Duration::from_secs(
                parsed_var("JOB_RETENTION_HOURS", defaults.job_retention.as_secs() / 3600)
                    .saturating_mul(3600),
            ),

            // Analytics
            analytics_max_events: parsed_var("ANALYTICS_MAX_EVENTS", defaults.analytics_max_events),

            // Maintenance
            maintenance_cron: optional_var("MAINTENANCE_CRON").unwrap_or(defaults.maintenance_cron),

            // Storage
            database_url: optional_var("DATABASE_URL"),
            field_mappings_file: optional_var("FIELD_MAPPINGS_FILE"),
        })
    }
}

/// Read an env var, treating unset and blank the same way
fn optional_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn secs_var(name: &str, default: Duration) -> Duration {
    Duration::from_secs(parsed_var(name, default.as_secs()))
}

/// Parse an env var, falling back to `default` when unset or unparseable
fn parsed_var<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
