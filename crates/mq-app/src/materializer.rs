use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::Utc;
use log::{info, warn};

use crate::client::JobApi;
use crate::error::AppError;
use crate::gallery::GeneratedImage;

/// A finished job's result turned into a gallery record.
#[derive(Debug)]
pub struct Materialized {
    pub image: GeneratedImage,
    /// Set when the download failed and the record only carries the remote URL.
    pub warning: Option<AppError>,
}

/// Downloads the result behind `result_ref` and builds the record for it.
///
/// A failed download still yields a record pointing at the remote URL, so a
/// finished job never gets stuck here.
pub async fn materialize<A: JobApi + ?Sized>(
    api: &A,
    prompt: &str,
    negative_prompt: &str,
    job_id: &str,
    result_ref: &str,
) -> Materialized {
    let url = api.resolve_reference(result_ref);

    let (blob, base64_data, warning) = match api.fetch_artifact(result_ref).await {
        Ok(bytes) => {
            info!("Fetched {} bytes for job {}", bytes.len(), job_id);
            let encoded = STANDARD.encode(&bytes);
            (Some(Arc::<[u8]>::from(bytes)), Some(encoded), None)
        }
        Err(e) => {
            warn!("Falling back to remote URL for job {}: {}", job_id, e);
            (None, None, Some(e))
        }
    };

    let image = GeneratedImage {
        id: uuid::Uuid::new_v4().to_string(),
        url,
        blob,
        base64_data,
        prompt: prompt.to_string(),
        negative_prompt: negative_prompt.to_string(),
        timestamp: Utc::now(),
        job_id: job_id.to_string(),
        name: None,
    };

    Materialized { image, warning }
}

/// Bytes of a stored image, fetched from its remote URL when no local copy
/// survived.
pub async fn image_bytes<A: JobApi + ?Sized>(api: &A, image: &GeneratedImage) -> Result<Vec<u8>, AppError> {
    if let Some(bytes) = image.bytes() {
        return Ok(bytes);
    }
    info!("No local copy of {}, fetching {}", image.id, image.url);
    api.fetch_artifact(&image.url).await
}
