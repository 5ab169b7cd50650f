//! In-process asynchronous job queue.
//!
//! Jobs move `queued -> running -> completed | failed | cancelled`. Workers
//! pull job ids from a channel; cancellation is a token the executor checks
//! between units of work, so a running job may still finish its current
//! provider call after being cancelled.

use crate::error::TranslationError;
use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// What a caller submits
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRequest {
    #[serde(default)]
    pub data: Option<serde_json::Value>,
    #[serde(default)]
    pub target_lang: String,
    #[serde(default)]
    pub source_lang: Option<String>,
    #[serde(default)]
    pub provider: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: String,
    pub payload: serde_json::Value,
    pub target_lang: String,
    pub source_lang: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of a status lookup; unknown ids are a status, not an error.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum JobLookup {
    Found(Job),
    #[serde(rename_all = "camelCase")]
    NotFound { job_id: String, status: &'static str },
}

impl JobLookup {
    pub fn not_found(job_id: &str) -> Self {
        Self::NotFound {
            job_id: job_id.to_string(),
            status: "not_found",
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QueueStats {
    pub queued: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub total: usize,
}

/// Performs the work of a job. Implementations should poll `cancel`
/// between units of work and return early once it fires.
#[async_trait]
pub trait JobExecutor: Send + Sync {
    async fn execute(
        &self,
        job: &Job,
        cancel: &CancellationToken,
    ) -> Result<serde_json::Value, TranslationError>;
}

struct JobEntry {
    job: Job,
    cancel: CancellationToken,
}

pub struct JobQueue {
    jobs: RwLock<HashMap<String, JobEntry>>,
    sender: mpsc::UnboundedSender<String>,
    receiver: Mutex<Option<mpsc::UnboundedReceiver<String>>>,
}

impl JobQueue {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            jobs: RwLock::new(HashMap::new()),
            sender,
            receiver: Mutex::new(Some(receiver)),
        }
    }

    /// Spawn `workers` tasks that run jobs until `shutdown` fires.
    pub async fn start(
        self: &Arc<Self>,
        workers: usize,
        executor: Arc<dyn JobExecutor>,
        shutdown: CancellationToken,
    ) -> Result<Vec<JoinHandle<()>>> {
        let Some(receiver) = self.receiver.lock().await.take() else {
            bail!("Job queue workers already started");
        };
        let receiver = Arc::new(Mutex::new(receiver));

        info!("Starting {} job queue worker(s)", workers);
        Ok((0..workers.max(1))
            .map(|worker| {
                tokio::spawn(Arc::clone(self).worker_loop(
                    worker,
                    Arc::clone(&receiver),
                    Arc::clone(&executor),
                    shutdown.clone(),
                ))
            })
            .collect())
    }

    /// Record a new job and hand it to the workers. Never waits on execution.
    pub async fn enqueue(
        &self,
        payload: serde_json::Value,
        source_lang: String,
        target_lang: String,
        provider: Option<String>,
    ) -> Result<String, TranslationError> {
        let id = Uuid::new_v4().to_string();
        let job = Job {
            id: id.clone(),
            payload,
            target_lang,
            source_lang,
            provider,
            status: JobStatus::Queued,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            result: None,
            error: None,
        };

        self.jobs.write().await.insert(
            id.clone(),
            JobEntry {
                job,
                cancel: CancellationToken::new(),
            },
        );

        if self.sender.send(id.clone()).is_err() {
            self.jobs.write().await.remove(&id);
            return Err(TranslationError::Internal(
                "job queue is not accepting work".to_string(),
            ));
        }

        debug!("Queued job {}", id);
        Ok(id)
    }

    pub async fn get(&self, id: &str) -> JobLookup {
        match self.jobs.read().await.get(id) {
            Some(entry) => JobLookup::Found(entry.job.clone()),
            None => JobLookup::not_found(id),
        }
    }

    /// Cancel a queued or running job. `false` for unknown or finished jobs.
    pub async fn cancel(&self, id: &str) -> bool {
        let mut jobs = self.jobs.write().await;
        let Some(entry) = jobs.get_mut(id) else {
            return false;
        };
        if entry.job.status.is_terminal() {
            return false;
        }

        if entry.job.status == JobStatus::Running {
            warn!(
                "Cancelling running job {}; work already committed is kept",
                id
            );
        }
        entry.job.status = JobStatus::Cancelled;
        entry.job.completed_at = Some(Utc::now());
        entry.cancel.cancel();
        info!("Job {} cancelled", id);
        true
    }

    pub async fn stats(&self) -> QueueStats {
        let jobs = self.jobs.read().await;
        let mut stats = QueueStats {
            total: jobs.len(),
            ..Default::default()
        };
        for entry in jobs.values() {
            match entry.job.status {
                JobStatus::Queued => stats.queued += 1,
                JobStatus::Running => stats.running += 1,
                JobStatus::Completed => stats.completed += 1,
                JobStatus::Failed => stats.failed += 1,
                JobStatus::Cancelled => stats.cancelled += 1,
            }
        }
        stats
    }

    /// Forget terminal jobs that finished more than `older_than` ago.
    pub async fn purge_finished(&self, older_than: ChronoDuration) -> usize {
        let cutoff = Utc::now() - older_than;
        let mut jobs = self.jobs.write().await;
        let before = jobs.len();
        jobs.retain(|_, entry| {
            !(entry.job.status.is_terminal()
                && entry.job.completed_at.is_some_and(|done| done < cutoff))
        });
        before - jobs.len()
    }

    pub async fn is_operative(&self) -> bool {
        tokio::time::timeout(std::time::Duration::from_millis(500), self.jobs.read())
            .await
            .is_ok()
    }

    async fn worker_loop(
        self: Arc<Self>,
        worker: usize,
        receiver: Arc<Mutex<mpsc::UnboundedReceiver<String>>>,
        executor: Arc<dyn JobExecutor>,
        shutdown: CancellationToken,
    ) {
        loop {
            let next = tokio::select! {
                _ = shutdown.cancelled() => break,
                id = async { receiver.lock().await.recv().await } => id,
            };
            let Some(id) = next else { break };

            // Cancelled (or purged) before pickup
            let Some((job, cancel)) = self.mark_running(&id).await else {
                debug!("Worker {} skipping job {}", worker, id);
                continue;
            };

            debug!("Worker {} running job {}", worker, id);
            let outcome = executor.execute(&job, &cancel).await;
            self.finish(&id, outcome).await;
        }
        debug!("Job worker {} stopped", worker);
    }

    async fn mark_running(&self, id: &str) -> Option<(Job, CancellationToken)> {
        let mut jobs = self.jobs.write().await;
        let entry = jobs.get_mut(id)?;
        if entry.job.status != JobStatus::Queued {
            return None;
        }
        entry.job.status = JobStatus::Running;
        entry.job.started_at = Some(Utc::now());
        Some((entry.job.clone(), entry.cancel.clone()))
    }

    async fn finish(&self, id: &str, outcome: Result<serde_json::Value, TranslationError>) {
        let mut jobs = self.jobs.write().await;
        let Some(entry) = jobs.get_mut(id) else {
            return;
        };
        // Cancelled while running: the cancellation stands
        if entry.job.status != JobStatus::Running {
            debug!("Job {} finished after leaving running state; outcome dropped", id);
            return;
        }

        entry.job.completed_at = Some(Utc::now());
        match outcome {
            Ok(result) => {
                entry.job.status = JobStatus::Completed;
                entry.job.result = Some(result);
                info!("Job {} completed", id);
            }
            Err(e) => {
                entry.job.status = JobStatus::Failed;
                entry.job.error = Some(e.to_string());
                warn!("Job {} failed: {}", id, e);
            }
        }
    }
}

impl Default for JobQueue {
    fn default() -> Self {
        Self::new()
    }
}
