use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::client::JobApi;
use crate::client::schemas::{GenerationParams, HistorySnapshot, JobSnapshot, QueueSnapshot, STATUS_FINISHED};
use crate::error::AppError;

/// Scripted [`JobApi`] that records every call.
#[derive(Default)]
pub struct MockApi {
    pub unreachable: AtomicBool,
    pub submit_fails: AtomicBool,
    pub stop_fails: AtomicBool,
    pub fetch_fails: AtomicBool,
    /// Served front to back; the last one repeats.
    pub queries: Mutex<VecDeque<Result<JobSnapshot, String>>>,
    /// How long each query takes to answer.
    pub query_delay: Mutex<Duration>,
    pub queue: Mutex<Option<QueueSnapshot>>,
    pub history: Mutex<Option<HistorySnapshot>>,
    calls: Mutex<Vec<&'static str>>,
}

impl MockApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_queries(queries: Vec<Result<JobSnapshot, String>>) -> Self {
        let api = Self::new();
        *api.queries.lock().unwrap() = queries.into();
        api
    }

    pub fn count(&self, name: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| **c == name).count()
    }

    /// Calls other than `ping`.
    pub fn network_calls(&self) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| **c != "ping").count()
    }

    fn record(&self, name: &'static str) {
        self.calls.lock().unwrap().push(name);
    }
}

pub fn running(progress: f32) -> JobSnapshot {
    JobSnapshot {
        status: None,
        stage: Some("RUNNING".into()),
        progress,
        result_ref: None,
    }
}

pub fn finished(url: &str) -> JobSnapshot {
    JobSnapshot {
        status: Some(STATUS_FINISHED.into()),
        stage: Some("SUCCESS".into()),
        progress: 100.0,
        result_ref: Some(url.into()),
    }
}

#[async_trait]
impl JobApi for MockApi {
    async fn ping(&self) -> bool {
        self.record("ping");
        !self.unreachable.load(Ordering::SeqCst)
    }

    async fn submit(
        &self,
        _image: &str,
        _mask: &str,
        _prompt: &str,
        _negative_prompt: &str,
        _params: &GenerationParams,
    ) -> Result<String, AppError> {
        self.record("submit");
        if self.submit_fails.load(Ordering::SeqCst) {
            return Err(AppError::SubmissionFailed("HTTP 500".into()));
        }
        Ok("job-1".into())
    }

    async fn query(&self, _job_id: &str) -> Result<JobSnapshot, AppError> {
        self.record("query");
        let delay = *self.query_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let mut queries = self.queries.lock().unwrap();
        let next = if queries.len() > 1 {
            queries.pop_front()
        } else {
            queries.front().cloned()
        };
        match next {
            Some(Ok(snapshot)) => Ok(snapshot),
            Some(Err(e)) => Err(AppError::QueryFailed(e)),
            None => Ok(running(0.0)),
        }
    }

    async fn stop(&self, _job_id: &str) -> Result<(), AppError> {
        self.record("stop");
        if self.stop_fails.load(Ordering::SeqCst) {
            return Err(AppError::CancellationFailed("connection reset".into()));
        }
        Ok(())
    }

    async fn queue_snapshot(&self) -> Option<QueueSnapshot> {
        self.record("queue_snapshot");
        self.queue.lock().unwrap().clone()
    }

    async fn history_snapshot(&self) -> Option<HistorySnapshot> {
        self.record("history_snapshot");
        self.history.lock().unwrap().clone()
    }

    async fn fetch_artifact(&self, _reference: &str) -> Result<Vec<u8>, AppError> {
        self.record("fetch_artifact");
        if self.fetch_fails.load(Ordering::SeqCst) {
            return Err(AppError::ArtifactFetchFailed("HTTP 404".into()));
        }
        Ok(b"\x89PNG fake".to_vec())
    }
}
