mod estimate;
mod ticker;

use std::time::Duration;

use log::{debug, info, warn};

pub use estimate::{MINUTES_PER_UNIT, QueueEstimate, estimate_queue_position};
pub use ticker::PollTicker;

use crate::client::schemas::{HistorySnapshot, JobSnapshot, QueueSnapshot};
use crate::client::{JobApi, SubmitRequest};
use crate::error::AppError;
use crate::events::JobEvent;
use crate::gallery::Gallery;
use crate::job::{Job, JobState};
use crate::materializer::materialize;

/// Liveness of the generation service as of the last probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ServiceStatus {
    Online,
    #[default]
    Offline,
    Checking,
}

/// Drives one job at a time through submit, poll and the terminal states.
///
/// Polling is fenced by an epoch: each submission gets a fresh one and ticks
/// carrying any other epoch are dropped. Cancellation is applied locally before
/// the service is told, so a job the service finishes afterwards is never
/// picked up.
pub struct JobOrchestrator<A: JobApi> {
    api: A,
    poll_interval: Duration,
    status: ServiceStatus,
    state: JobState,
    job: Option<Job>,
    epoch: u64,
    ticker: Option<PollTicker>,
    queue: Option<QueueSnapshot>,
    history: Option<HistorySnapshot>,
}

impl<A: JobApi> JobOrchestrator<A> {
    pub fn new(api: A, poll_interval: Duration) -> Self {
        Self {
            api,
            poll_interval,
            status: ServiceStatus::default(),
            state: JobState::Idle,
            job: None,
            epoch: 0,
            ticker: None,
            queue: None,
            history: None,
        }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn job(&self) -> Option<&Job> {
        self.job.as_ref()
    }

    pub fn active_job_id(&self) -> Option<&str> {
        self.job.as_ref().and_then(|j| j.id.as_deref())
    }

    pub fn status(&self) -> ServiceStatus {
        self.status
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn is_polling(&self) -> bool {
        self.ticker.is_some()
    }

    pub fn queue_snapshot(&self) -> Option<&QueueSnapshot> {
        self.queue.as_ref()
    }

    pub fn history_snapshot(&self) -> Option<&HistorySnapshot> {
        self.history.as_ref()
    }

    pub fn queue_estimate(&self) -> QueueEstimate {
        match self.active_job_id() {
            Some(id) => estimate_queue_position(id, self.history.as_ref(), self.queue.as_ref()),
            None => QueueEstimate::default(),
        }
    }

    /// Pings the service and refreshes the queue view when it answers.
    pub async fn probe(&mut self) -> Result<(), AppError> {
        self.status = ServiceStatus::Checking;
        if self.api.ping().await {
            self.status = ServiceStatus::Online;
            self.refresh_snapshots().await;
            Ok(())
        } else {
            self.status = ServiceStatus::Offline;
            Err(AppError::Unreachable("the generation service did not answer /ping".into()))
        }
    }

    /// Forgets the last probe result, e.g. after the base URL changed.
    pub fn mark_unchecked(&mut self) {
        self.status = ServiceStatus::Offline;
    }

    pub async fn refresh_snapshots(&mut self) {
        if let Some(queue) = self.api.queue_snapshot().await {
            self.queue = Some(queue);
        }
        if let Some(history) = self.api.history_snapshot().await {
            self.history = Some(history);
        }
    }

    /// Submits a job and starts polling it. Preconditions are checked before any
    /// network call.
    pub async fn submit(&mut self, req: SubmitRequest) -> Result<String, AppError> {
        if !self.state.is_idle_equivalent() {
            return Err(AppError::PreconditionNotMet("a job is already in progress".into()));
        }
        if req.image.is_empty() {
            return Err(AppError::PreconditionNotMet("no source image loaded".into()));
        }
        let Some(mask) = req.mask.as_deref() else {
            return Err(AppError::PreconditionNotMet("paint a mask first".into()));
        };
        if req.prompt.trim().is_empty() {
            return Err(AppError::PreconditionNotMet("the prompt is empty".into()));
        }
        if self.status != ServiceStatus::Online {
            return Err(AppError::PreconditionNotMet(
                "the service is offline, check the API connection".into(),
            ));
        }

        self.job = Some(Job::new(req.prompt.clone(), req.negative_prompt.clone()));
        self.set_state(JobState::Submitting);

        let submitted = self
            .api
            .submit(&req.image, mask, &req.prompt, &req.negative_prompt, &req.params)
            .await;

        match submitted {
            Ok(job_id) => {
                self.epoch += 1;
                if let Some(job) = self.job.as_mut() {
                    job.id = Some(job_id.clone());
                }
                self.set_state(JobState::Polling);
                self.ticker = Some(PollTicker::start(self.poll_interval, self.epoch));
                info!("Job {} submitted (epoch {})", job_id, self.epoch);
                Ok(job_id)
            }
            Err(e) => {
                self.set_state(JobState::Failed);
                warn!("Submission failed: {}", e);
                Err(match e {
                    AppError::SubmissionFailed(_) => e,
                    other => AppError::SubmissionFailed(other.to_string()),
                })
            }
        }
    }

    /// Waits for the next poll tick. `None` when nothing is being polled.
    pub async fn next_tick(&mut self) -> Option<u64> {
        match self.ticker.as_mut() {
            Some(ticker) => ticker.tick().await,
            None => None,
        }
    }

    /// One poll step: query the job, refresh the queue view, then reconcile.
    pub async fn on_tick(&mut self, epoch: u64, gallery: &mut Gallery) -> JobEvent {
        if epoch != self.epoch || self.state != JobState::Polling {
            debug!("Dropping stale tick for epoch {} (current {})", epoch, self.epoch);
            return JobEvent::Stale;
        }
        let Some(job_id) = self.active_job_id().map(str::to_string) else {
            return JobEvent::Stale;
        };

        let queried = self.api.query(&job_id).await;
        self.refresh_snapshots().await;

        let snapshot = match queried {
            Ok(snapshot) => snapshot,
            Err(error) => {
                warn!("Query for job {} failed, retrying next tick: {}", job_id, error);
                return JobEvent::QueryFailed { job_id, error };
            }
        };

        let failed = snapshot.is_error();
        let finished = snapshot.is_finished();
        let JobSnapshot {
            status,
            stage,
            progress,
            result_ref,
        } = snapshot;
        let finished_ref = result_ref.filter(|_| finished);

        let (prompt, negative_prompt) = match self.job.as_mut() {
            Some(job) => {
                job.progress = progress;
                job.stage = stage.clone();
                job.result_ref = finished_ref.clone();
                (job.prompt.clone(), job.negative_prompt.clone())
            }
            None => Default::default(),
        };

        if failed {
            self.settle(JobState::Failed);
            let error = status.unwrap_or_else(|| "the service reported an error".to_string());
            warn!("Job {} failed remotely: {}", job_id, error);
            return JobEvent::Failed { job_id, error };
        }

        let Some(result_ref) = finished_ref else {
            return JobEvent::Progress {
                job_id,
                progress,
                stage,
            };
        };
        self.settle(JobState::Finished);

        let materialized = materialize(&self.api, &prompt, &negative_prompt, &job_id, &result_ref).await;
        let image_id = materialized.image.id.clone();
        let inserted = gallery.insert(materialized.image);
        info!("Job {} finished", job_id);

        JobEvent::Finished {
            job_id,
            image_id,
            inserted,
            warning: materialized.warning,
        }
    }

    /// Ticks until the job settles or polling is torn down.
    pub async fn poll_until_settled(&mut self, gallery: &mut Gallery) -> Option<JobEvent> {
        while let Some(epoch) = self.next_tick().await {
            let event = self.on_tick(epoch, gallery).await;
            if event.is_terminal() {
                return Some(event);
            }
        }
        None
    }

    /// Stops the active job. Local state becomes `Stopped` before the service is
    /// asked, and stays so even when that request fails.
    pub async fn cancel(&mut self) -> Result<JobEvent, AppError> {
        if self.state != JobState::Polling {
            return Err(AppError::PreconditionNotMet("no job is being generated".into()));
        }
        let job_id = self.active_job_id().map(str::to_string).unwrap_or_default();
        self.settle(JobState::Stopped);
        info!("Job {} stopped locally", job_id);

        self.api.stop(&job_id).await.map_err(|e| match e {
            AppError::CancellationFailed(_) => e,
            other => AppError::CancellationFailed(other.to_string()),
        })?;
        Ok(JobEvent::Stopped { job_id })
    }

    /// Tears down polling without touching the service.
    pub fn shutdown(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.stop();
        }
    }

    fn settle(&mut self, state: JobState) {
        self.shutdown();
        if let Some(job) = self.job.as_mut() {
            job.id = None;
        }
        self.set_state(state);
    }

    fn set_state(&mut self, state: JobState) {
        debug!("Job state {:?} -> {:?}", self.state, state);
        self.state = state;
        if let Some(job) = self.job.as_mut() {
            job.state = state;
        }
    }
}
