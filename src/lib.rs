pub mod analytics;
pub mod api;
pub mod app;
pub mod cache;
pub mod config;
pub mod error;
pub mod field_mapping;
pub mod language;
pub mod models;
pub mod providers;
pub mod queue;
pub mod rate_limit;
pub mod retry;
pub mod scheduler;
pub mod service;
pub mod single_flight;
pub mod storage;

#[cfg(test)]
mod test_support;
