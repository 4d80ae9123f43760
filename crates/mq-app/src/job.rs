use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    #[default]
    Idle,
    Submitting,
    Polling,
    Finished,
    Failed,
    Stopped,
}

impl JobState {
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Submitting | Self::Polling)
    }

    /// States from which a new submission may start.
    pub fn is_idle_equivalent(&self) -> bool {
        matches!(self, Self::Idle | Self::Finished | Self::Failed | Self::Stopped)
    }

    pub fn label(&self) -> &str {
        match self {
            Self::Idle => "idle",
            Self::Submitting => "submitting",
            Self::Polling => "generating",
            Self::Finished => "finished",
            Self::Failed => "failed",
            Self::Stopped => "stopped",
        }
    }
}

/// The single active unit of work.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    /// Assigned by the service; cleared once the job leaves `Polling`.
    pub id: Option<String>,
    pub state: JobState,
    pub progress: f32,
    pub stage: Option<String>,
    pub result_ref: Option<String>,
    pub prompt: String,
    pub negative_prompt: String,
    pub created_at: DateTime<Utc>,
}

impl Job {
    pub fn new(prompt: String, negative_prompt: String) -> Self {
        Self {
            id: None,
            state: JobState::Submitting,
            progress: 0.0,
            stage: None,
            result_ref: None,
            prompt,
            negative_prompt,
            created_at: Utc::now(),
        }
    }
}
