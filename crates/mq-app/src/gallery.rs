use std::path::{Path, PathBuf};
use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Duration, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Two records with the same prompt closer together than this are one result.
pub const DUPLICATE_WINDOW: Duration = Duration::seconds(5);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedImage {
    pub id: String,
    /// Remote reference, already rewritten to the configured service URL.
    pub url: String,
    /// Transient bytes for immediate display; never persisted.
    #[serde(skip)]
    pub blob: Option<Arc<[u8]>>,
    /// Durable base64 PNG that survives restarts.
    pub base64_data: Option<String>,
    pub prompt: String,
    #[serde(default)]
    pub negative_prompt: String,
    pub timestamp: DateTime<Utc>,
    pub job_id: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// What a viewer should load for a record, best first.
#[derive(Debug, Clone, PartialEq)]
pub enum Viewable<'a> {
    Bytes(&'a [u8]),
    DataUrl(String),
    Remote(&'a str),
}

impl GeneratedImage {
    pub fn viewable(&self) -> Viewable<'_> {
        if let Some(blob) = &self.blob {
            return Viewable::Bytes(blob);
        }
        if let Some(data) = &self.base64_data {
            return Viewable::DataUrl(format!("data:image/png;base64,{}", data));
        }
        Viewable::Remote(&self.url)
    }

    /// Raw image bytes, from the transient handle or the durable copy.
    pub fn bytes(&self) -> Option<Vec<u8>> {
        if let Some(blob) = &self.blob {
            return Some(blob.to_vec());
        }
        self.base64_data.as_deref().and_then(|d| STANDARD.decode(d).ok())
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.prompt)
    }

    /// Default file name for saving this image.
    pub fn download_name(&self) -> String {
        let stem = match &self.name {
            Some(name) => name.replace(['/', '\\'], "_"),
            None => self.timestamp.timestamp_millis().to_string(),
        };
        format!("inpainted_image_{}.png", stem)
    }

    fn duplicates(&self, other: &GeneratedImage) -> bool {
        if self.job_id == other.job_id {
            return true;
        }
        self.prompt == other.prompt && (self.timestamp - other.timestamp).abs() < DUPLICATE_WINDOW
    }
}

/// Partial edit of a record; `None` fields are left alone.
#[derive(Debug, Clone, Default)]
pub struct GalleryUpdate {
    pub name: Option<String>,
    pub prompt: Option<String>,
    pub negative_prompt: Option<String>,
}

/// Generated images, newest first.
#[derive(Debug, Default)]
pub struct Gallery {
    path: Option<PathBuf>,
    images: Vec<GeneratedImage>,
}

impl Gallery {
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Loads the gallery file. A missing or unreadable file yields an empty
    /// gallery bound to `path`.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let images = match std::fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str(&text).unwrap_or_else(|e| {
                warn!("Ignoring unreadable gallery at {}: {}", path.display(), e);
                Vec::new()
            }),
            Err(_) => Vec::new(),
        };
        info!("Loaded {} gallery images", images.len());

        Self { path: Some(path), images }
    }

    pub fn save(&self) -> Result<(), AppError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).map_err(|e| AppError::Storage(e.to_string()))?;
        }
        let text = serde_json::to_string_pretty(&self.images).map_err(|e| AppError::Storage(e.to_string()))?;
        std::fs::write(path, text).map_err(|e| AppError::Storage(e.to_string()))
    }

    /// Adds `image` unless it duplicates an existing record. Returns whether it
    /// was added.
    pub fn insert(&mut self, image: GeneratedImage) -> bool {
        if self.images.iter().any(|existing| existing.duplicates(&image)) {
            info!("Skipping duplicate gallery entry for job {}", image.job_id);
            return false;
        }
        self.images.insert(0, image);
        true
    }

    pub fn delete(&mut self, id: &str) -> bool {
        let before = self.images.len();
        self.images.retain(|i| i.id != id);
        self.images.len() != before
    }

    pub fn rename(&mut self, id: &str, name: &str) -> bool {
        self.update(
            id,
            GalleryUpdate {
                name: Some(name.to_string()),
                ..Default::default()
            },
        )
    }

    pub fn update(&mut self, id: &str, update: GalleryUpdate) -> bool {
        let Some(image) = self.images.iter_mut().find(|i| i.id == id) else {
            return false;
        };
        if let Some(name) = update.name {
            image.name = Some(name);
        }
        if let Some(prompt) = update.prompt {
            image.prompt = prompt;
        }
        if let Some(negative_prompt) = update.negative_prompt {
            image.negative_prompt = negative_prompt;
        }
        true
    }

    pub fn get(&self, id: &str) -> Option<&GeneratedImage> {
        self.images.iter().find(|i| i.id == id)
    }

    pub fn list(&self) -> &[GeneratedImage] {
        &self.images
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}
