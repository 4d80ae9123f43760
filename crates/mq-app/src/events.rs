use crate::error::AppError;

/// What happened as a result of one orchestrator step.
#[derive(Debug)]
pub enum JobEvent {
    Progress {
        job_id: String,
        progress: f32,
        stage: Option<String>,
    },
    /// Transient; the next tick retries.
    QueryFailed {
        job_id: String,
        error: AppError,
    },
    Finished {
        job_id: String,
        image_id: String,
        inserted: bool,
        warning: Option<AppError>,
    },
    Failed {
        job_id: String,
        error: String,
    },
    Stopped {
        job_id: String,
    },
    /// The tick belonged to a job that is no longer polled.
    Stale,
}

impl JobEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished { .. } | Self::Failed { .. } | Self::Stopped { .. })
    }
}
