pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod gallery;
pub mod job;
pub mod materializer;
pub mod orchestrator;
pub mod session;

#[cfg(test)]
mod testing;

pub use client::{JobApi, RemoteJobClient, SubmitRequest};
pub use config::AppConfig;
pub use error::AppError;
pub use events::JobEvent;
pub use gallery::{Gallery, GeneratedImage};
pub use job::{Job, JobState};
pub use orchestrator::{JobOrchestrator, ServiceStatus};
pub use session::{SessionState, SessionStore, SessionUpdate};
