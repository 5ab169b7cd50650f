//! Content-addressed translation cache.
//!
//! Entries are keyed by a SHA-256 digest of `(provider, sourceLang,
//! targetLang, text)` and keep the plain key fields alongside so that
//! pattern invalidation can match on any subset of them.

use crate::error::TranslationError;
use crate::language;
use crate::models::TranslationResult;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;

/// Provider selector used in keys when no adapter was pinned
pub const ANY_PROVIDER: &str = "auto";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub provider: String,
    pub source_lang: String,
    pub target_lang: String,
    pub text: String,
}

impl CacheKey {
    pub fn new(provider: &str, source_lang: &str, target_lang: &str, text: &str) -> Self {
        Self {
            provider: provider.to_string(),
            source_lang: source_lang.to_string(),
            target_lang: target_lang.to_string(),
            text: text.to_string(),
        }
    }

    /// Hex digest; fields are length-prefixed so `("a:b", "c")` and
    /// `("a", "b:c")` can't collide
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        for part in [
            &self.provider,
            &self.source_lang,
            &self.target_lang,
            &self.text,
        ] {
            hasher.update((part.len() as u64).to_le_bytes());
            hasher.update(part.as_bytes());
        }
        hasher
            .finalize()
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect()
    }
}

/// Conjunctive filter for [`TranslationCache::invalidate`]; `None` fields
/// are wildcards.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InvalidationPattern {
    pub provider: Option<String>,
    pub source_lang: Option<String>,
    pub target_lang: Option<String>,
    pub text: Option<String>,
}

impl InvalidationPattern {
    pub fn is_empty(&self) -> bool {
        self.provider.is_none()
            && self.source_lang.is_none()
            && self.target_lang.is_none()
            && self.text.is_none()
    }

    /// Canonical form of a filter as it arrives from a query string: blank
    /// fields become wildcards and language codes take the form keys are
    /// stored under. Invalid codes are a validation error.
    pub fn normalized(&self) -> Result<Self, TranslationError> {
        let present = |field: &Option<String>| {
            field
                .as_deref()
                .filter(|v| !v.trim().is_empty())
                .map(str::to_string)
        };

        Ok(Self {
            provider: present(&self.provider).map(|p| p.trim().to_string()),
            source_lang: present(&self.source_lang)
                .map(|code| language::normalize_source(Some(&code)))
                .transpose()?,
            target_lang: present(&self.target_lang)
                .map(|code| language::normalize_target(&code))
                .transpose()?,
            text: present(&self.text),
        })
    }

    fn matches(&self, entry: &CacheEntry) -> bool {
        let field = |want: &Option<String>, have: &str| want.as_deref().map_or(true, |w| w == have);

        // A provider filter hits both the key selector and the adapter that
        // actually served the entry
        let provider_ok = self.provider.as_deref().map_or(true, |p| {
            p == entry.key.provider || p == entry.result.provider
        });

        provider_ok
            && field(&self.source_lang, &entry.key.source_lang)
            && field(&self.target_lang, &entry.key.target_lang)
            && field(&self.text, &entry.key.text)
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    key: CacheKey,
    result: TranslationResult,
    created_at: Instant,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

pub struct TranslationCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    ttl: Duration,
    max_entries: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl TranslationCache {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
            max_entries: max_entries.max(1),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Look up a live entry; the returned result is flagged `cached`.
    pub async fn get(&self, key: &CacheKey) -> Option<TranslationResult> {
        let digest = key.digest();
        let expired = {
            let entries = self.entries.read().await;
            match entries.get(&digest) {
                Some(entry) if entry.created_at.elapsed() <= self.ttl => {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    let mut result = entry.result.clone();
                    result.cached = true;
                    return Some(result);
                }
                Some(_) => true,
                None => false,
            }
        };

        if expired {
            let mut entries = self.entries.write().await;
            // Re-check under the write lock; a fresh set may have raced us
            if entries
                .get(&digest)
                .is_some_and(|e| e.created_at.elapsed() > self.ttl)
            {
                entries.remove(&digest);
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Store (or overwrite) the result for `key`.
    pub async fn set(&self, key: CacheKey, mut result: TranslationResult) {
        result.cached = false;
        let digest = key.digest();
        let mut entries = self.entries.write().await;

        if entries.len() >= self.max_entries && !entries.contains_key(&digest) {
            let ttl = self.ttl;
            entries.retain(|_, e| e.created_at.elapsed() <= ttl);

            if entries.len() >= self.max_entries {
                if let Some(oldest) = entries
                    .iter()
                    .min_by_key(|(_, e)| e.created_at)
                    .map(|(k, _)| k.clone())
                {
                    entries.remove(&oldest);
                }
            }
        }

        entries.insert(
            digest,
            CacheEntry {
                key,
                result,
                created_at: Instant::now(),
            },
        );
    }

    /// Remove every entry matching all supplied fields. Returns the count.
    pub async fn invalidate(&self, pattern: &InvalidationPattern) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, e| !pattern.matches(e));
        let removed = before - entries.len();
        debug!("Cache invalidation {:?} removed {} entries", pattern, removed);
        removed
    }

    pub async fn clear(&self) -> usize {
        let mut entries = self.entries.write().await;
        let removed = entries.len();
        entries.clear();
        removed
    }

    pub async fn purge_expired(&self) -> usize {
        let ttl = self.ttl;
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, e| e.created_at.elapsed() <= ttl);
        before - entries.len()
    }

    pub async fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.read().await.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    /// The store is operative when its lock can be taken promptly.
    pub async fn is_operative(&self) -> bool {
        tokio::time::timeout(Duration::from_millis(500), self.entries.read())
            .await
            .is_ok()
    }
}
