//! Fixed-window request ceiling per caller.

use crate::error::TranslationError;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Bucket shared by callers that don't identify themselves
pub const ANONYMOUS: &str = "anonymous";

pub struct RateLimiter {
    limit: u32,
    window: Duration,
    windows: Mutex<HashMap<String, Window>>,
}

struct Window {
    started: Instant,
    used: u32,
}

impl RateLimiter {
    /// A `limit` of 0 disables limiting.
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Consume `units` from the caller's window, or fail without consuming.
    pub fn check(&self, caller: Option<&str>, units: u32) -> Result<(), TranslationError> {
        if self.limit == 0 {
            return Ok(());
        }

        let caller = caller.unwrap_or(ANONYMOUS);
        let mut windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();

        // Keep the map from growing with one-off callers
        if windows.len() > 10_000 {
            let window = self.window;
            windows.retain(|_, w| now.duration_since(w.started) < window);
        }

        let entry = windows.entry(caller.to_string()).or_insert(Window {
            started: now,
            used: 0,
        });
        if now.duration_since(entry.started) >= self.window {
            entry.started = now;
            entry.used = 0;
        }

        if entry.used.saturating_add(units) > self.limit {
            tracing::warn!("Rate limit exceeded for caller '{}'", caller);
            return Err(TranslationError::RateLimited {
                limit: self.limit,
                window_secs: self.window.as_secs(),
            });
        }

        entry.used += units;
        Ok(())
    }
}
