use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Cannot start generation: {0}")]
    PreconditionNotMet(String),

    #[error("Service unreachable: {0}")]
    Unreachable(String),

    #[error("Submission failed: {0}")]
    SubmissionFailed(String),

    #[error("Job query failed: {0}")]
    QueryFailed(String),

    #[error("Could not fetch result image: {0}")]
    ArtifactFetchFailed(String),

    #[error("Stop request failed: {0}")]
    CancellationFailed(String),

    #[error("Mask error: {0}")]
    Mask(#[from] mq_core::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),
}
