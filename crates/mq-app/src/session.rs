use std::path::{Path, PathBuf};

use log::{info, warn};
use mq_core::MaskSnapshot;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Everything that should survive a restart of the editor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionState {
    /// Source image as a base64 PNG; empty when none is loaded.
    pub input_image: String,
    pub prompt: String,
    pub negative_prompt: String,
    /// Service base URL chosen by the user; empty means the configured default.
    pub api_url: String,
    pub mask_history: Vec<MaskSnapshot>,
}

#[derive(Debug, Clone, Default)]
pub struct SessionUpdate {
    pub input_image: Option<String>,
    pub prompt: Option<String>,
    pub negative_prompt: Option<String>,
    pub api_url: Option<String>,
    pub mask_history: Option<Vec<MaskSnapshot>>,
}

impl SessionState {
    pub fn effective_api_url<'a>(&'a self, fallback: &'a str) -> &'a str {
        if self.api_url.trim().is_empty() {
            fallback
        } else {
            &self.api_url
        }
    }

    /// Merges the fields present in `update`. A new input image invalidates the
    /// mask history unless the update carries one too.
    pub fn apply(&mut self, update: SessionUpdate) {
        if let Some(image) = update.input_image {
            if image != self.input_image {
                self.mask_history.clear();
            }
            self.input_image = image;
        }
        if let Some(prompt) = update.prompt {
            self.prompt = prompt;
        }
        if let Some(negative_prompt) = update.negative_prompt {
            self.negative_prompt = negative_prompt;
        }
        if let Some(api_url) = update.api_url {
            self.api_url = api_url;
        }
        if let Some(history) = update.mask_history {
            self.mask_history = history;
        }
    }
}

/// A [`SessionState`] bound to its JSON file.
#[derive(Debug)]
pub struct SessionStore {
    path: PathBuf,
    state: SessionState,
}

impl SessionStore {
    /// Missing or corrupt files start a fresh session.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let state = match std::fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str(&text).unwrap_or_else(|e| {
                warn!("Ignoring unreadable session at {}: {}", path.display(), e);
                SessionState::default()
            }),
            Err(_) => SessionState::default(),
        };
        info!("Session loaded from {}", path.display());

        Self { path, state }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Applies `update` and writes the result to disk.
    pub fn update(&mut self, update: SessionUpdate) -> Result<(), AppError> {
        self.state.apply(update);
        self.save()
    }

    pub fn save(&self) -> Result<(), AppError> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir).map_err(|e| AppError::Storage(e.to_string()))?;
        }
        let text = serde_json::to_string(&self.state).map_err(|e| AppError::Storage(e.to_string()))?;
        std::fs::write(&self.path, text).map_err(|e| AppError::Storage(e.to_string()))
    }
}
