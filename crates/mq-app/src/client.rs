pub mod schemas;

use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};

use crate::config::{AppConfig, DEFAULT_API_URL};
use crate::error::AppError;
use schemas::{
    GenerationParams, HistorySnapshot, InpaintRequest, JobSnapshot, QueryJobResponse, QueueSnapshot,
    SubmitResponse,
};

/// Header that makes tunneling proxies skip their browser interstitial.
pub const PROXY_BYPASS_HEADER: &str = "ngrok-skip-browser-warning";

/// Inputs for one submission, already encoded for transport.
#[derive(Debug, Clone)]
pub struct SubmitRequest {
    pub image: String,
    /// `None` when no mask has been painted yet.
    pub mask: Option<String>,
    pub prompt: String,
    pub negative_prompt: String,
    pub params: GenerationParams,
}

/// Request/response calls against the generation service.
///
/// Every call is independently fallible and none of them hold state between
/// calls. The snapshot calls swallow their own failures.
#[async_trait]
pub trait JobApi: Send + Sync {
    async fn ping(&self) -> bool;

    async fn submit(
        &self,
        image: &str,
        mask: &str,
        prompt: &str,
        negative_prompt: &str,
        params: &GenerationParams,
    ) -> Result<String, AppError>;

    async fn query(&self, job_id: &str) -> Result<JobSnapshot, AppError>;

    async fn stop(&self, job_id: &str) -> Result<(), AppError>;

    async fn queue_snapshot(&self) -> Option<QueueSnapshot>;

    async fn history_snapshot(&self) -> Option<HistorySnapshot>;

    /// Downloads the binary behind a result reference.
    async fn fetch_artifact(&self, reference: &str) -> Result<Vec<u8>, AppError>;

    /// The form of `reference` a viewer should load.
    fn resolve_reference(&self, reference: &str) -> String {
        reference.to_string()
    }
}

pub struct RemoteJobClient {
    http: reqwest::Client,
    base_url: String,
}

impl RemoteJobClient {
    pub fn new(conf: &AppConfig) -> Result<Self, AppError> {
        Self::with_base_url(conf, &conf.api_url)
    }

    pub fn with_base_url(conf: &AppConfig, base_url: &str) -> Result<Self, AppError> {
        let mut headers = HeaderMap::new();
        headers.insert(PROXY_BYPASS_HEADER, HeaderValue::from_static("true"));
        let agent = HeaderValue::from_str(&conf.client_id)
            .map_err(|e| AppError::Config(format!("invalid client id: {}", e)))?;
        headers.insert(USER_AGENT, agent);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(conf.request_timeout)
            .connect_timeout(Duration::from_secs(5).min(conf.request_timeout))
            .build()
            .map_err(|e| AppError::Config(e.to_string()))?;

        Ok(Self {
            http,
            base_url: normalize_base_url(base_url),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn set_base_url(&mut self, base_url: &str) {
        self.base_url = normalize_base_url(base_url);
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Fetches and decodes JSON, mapping any failure to a plain message.
    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, String> {
        let response = self.http.get(self.url(path)).send().await.map_err(|e| e.to_string())?;
        if !response.status().is_success() {
            return Err(format!("HTTP {}", response.status()));
        }
        response.json().await.map_err(|e| e.to_string())
    }
}

fn normalize_base_url(base_url: &str) -> String {
    base_url.trim().trim_end_matches('/').to_string()
}

/// Result URLs name the service's own loopback origin; point them at the
/// configured base URL instead.
pub fn rewrite_result_url(reference: &str, base_url: &str) -> String {
    match reference.strip_prefix(DEFAULT_API_URL) {
        Some(rest) => format!("{}{}", normalize_base_url(base_url), rest),
        None => reference.to_string(),
    }
}

#[async_trait]
impl JobApi for RemoteJobClient {
    async fn ping(&self) -> bool {
        match self.http.get(self.url("/ping")).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                debug!("Ping to {} failed: {}", self.base_url, e);
                false
            }
        }
    }

    async fn submit(
        &self,
        image: &str,
        mask: &str,
        prompt: &str,
        negative_prompt: &str,
        params: &GenerationParams,
    ) -> Result<String, AppError> {
        let body = InpaintRequest::new(
            prompt.to_string(),
            negative_prompt.to_string(),
            image.to_string(),
            mask.to_string(),
            params,
        );

        let response = self
            .http
            .post(self.url("/v2/generation/image-inpaint-outpaint"))
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::SubmissionFailed(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::SubmissionFailed(format!("HTTP {}: {}", status, text)));
        }

        let parsed: SubmitResponse = response
            .json()
            .await
            .map_err(|e| AppError::SubmissionFailed(format!("bad response: {}", e)))?;

        parsed
            .job_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| AppError::SubmissionFailed("response carried no job_id".into()))
    }

    async fn query(&self, job_id: &str) -> Result<JobSnapshot, AppError> {
        let response = self
            .http
            .get(self.url("/v1/generation/query-job"))
            .query(&[("job_id", job_id), ("require_step_preview", "false")])
            .send()
            .await
            .map_err(|e| AppError::QueryFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AppError::QueryFailed(format!("HTTP {}", response.status())));
        }

        let parsed: QueryJobResponse = response
            .json()
            .await
            .map_err(|e| AppError::QueryFailed(e.to_string()))?;
        Ok(parsed.into())
    }

    async fn stop(&self, job_id: &str) -> Result<(), AppError> {
        debug!("Requesting stop for job {}", job_id);
        let response = self
            .http
            .post(self.url("/v1/generation/stop"))
            .send()
            .await
            .map_err(|e| AppError::CancellationFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AppError::CancellationFailed(format!("HTTP {}", response.status())));
        }
        Ok(())
    }

    async fn queue_snapshot(&self) -> Option<QueueSnapshot> {
        match self.get_json("/v1/generation/job-queue").await {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                debug!("Queue status unavailable: {}", e);
                None
            }
        }
    }

    async fn history_snapshot(&self) -> Option<HistorySnapshot> {
        match self.get_json("/v1/generation/job-history").await {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                debug!("Job history unavailable: {}", e);
                None
            }
        }
    }

    async fn fetch_artifact(&self, reference: &str) -> Result<Vec<u8>, AppError> {
        let url = self.resolve_reference(reference);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| AppError::ArtifactFetchFailed(e.to_string()))?;

        if !response.status().is_success() {
            warn!("Fetching {} returned {}", url, response.status());
            return Err(AppError::ArtifactFetchFailed(format!("HTTP {}", response.status())));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| AppError::ArtifactFetchFailed(e.to_string()))?;
        Ok(bytes.to_vec())
    }

    fn resolve_reference(&self, reference: &str) -> String {
        rewrite_result_url(reference, &self.base_url)
    }
}
