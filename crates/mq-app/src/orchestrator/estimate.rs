use std::time::Duration;

use crate::client::schemas::{HistorySnapshot, QueueSnapshot};

/// Minutes of wait attributed to each job ahead of ours.
pub const MINUTES_PER_UNIT: u32 = 2;

/// Display-only guess of where the active job sits in the remote queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueEstimate {
    /// 1-based; 0 when the job is not in the pending list (or nothing is known).
    pub position: usize,
    /// Jobs pending ahead of ours plus those currently running.
    pub jobs_ahead: u32,
}

impl QueueEstimate {
    pub fn wait_minutes(&self) -> u32 {
        self.jobs_ahead * MINUTES_PER_UNIT
    }

    pub fn wait(&self) -> Duration {
        Duration::from_secs(self.wait_minutes() as u64 * 60)
    }
}

/// `position = index + 1`, `jobs_ahead = index + running_size`. Returns the
/// zero estimate when the job id is absent from the snapshot.
pub fn estimate_queue_position(
    job_id: &str,
    history: Option<&HistorySnapshot>,
    queue: Option<&QueueSnapshot>,
) -> QueueEstimate {
    let Some(index) = history.and_then(|h| h.queue.iter().position(|j| j.job_id == job_id)) else {
        return QueueEstimate::default();
    };
    let running = queue.map(|q| q.running_size).unwrap_or(0);

    QueueEstimate {
        position: index + 1,
        jobs_ahead: index as u32 + running,
    }
}
