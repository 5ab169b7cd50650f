//! Coalescing of concurrent identical work.
//!
//! The first caller for a key runs the work; callers arriving while it is in
//! flight wait for its result instead of starting their own.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;

pub struct SingleFlight<T> {
    in_flight: Mutex<HashMap<String, watch::Receiver<Option<T>>>>,
}

/// Outcome of [`SingleFlight::run`]
#[derive(Debug)]
pub struct Flight<T> {
    pub value: T,
    /// True when the value came from another caller's in-flight work
    pub shared: bool,
}

/// Removes the leader's entry even if its future is dropped mid-flight
struct LeaderGuard<'a, T> {
    in_flight: &'a Mutex<HashMap<String, watch::Receiver<Option<T>>>>,
    key: &'a str,
}

impl<T> Drop for LeaderGuard<'_, T> {
    fn drop(&mut self) {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(self.key);
    }
}

impl<T: Clone> SingleFlight<T> {
    pub fn new() -> Self {
        Self {
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, watch::Receiver<Option<T>>>> {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub async fn run<F, Fut>(&self, key: &str, work: F) -> Flight<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let sender = loop {
            let mut receiver = {
                let mut in_flight = self.lock();
                match in_flight.get(key) {
                    Some(receiver) => receiver.clone(),
                    None => {
                        let (sender, receiver) = watch::channel(None);
                        in_flight.insert(key.to_string(), receiver);
                        break sender;
                    }
                }
            };

            // Err means the leader was dropped before publishing; its guard
            // has cleared the entry, so go round and possibly lead ourselves
            let published = receiver
                .wait_for(Option::is_some)
                .await
                .ok()
                .and_then(|value| (*value).clone());
            if let Some(value) = published {
                return Flight {
                    value,
                    shared: true,
                };
            }
        };

        let _guard = LeaderGuard {
            in_flight: &self.in_flight,
            key,
        };
        let value = work().await;
        // Nobody listening is fine
        let _ = sender.send(Some(value.clone()));

        Flight {
            value,
            shared: false,
        }
    }

    #[cfg(test)]
    fn in_flight(&self) -> usize {
        self.lock().len()
    }
}

impl<T: Clone> Default for SingleFlight<T> {
    fn default() -> Self {
        Self::new()
    }
}
