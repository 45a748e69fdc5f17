//! Engine configuration, loaded from a JSON file.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::Minutes;
use crate::model::LengthCategory;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },
}

/// Standard lesson minutes per length category, below which a lesson is
/// flagged as too short. Uncategorised lessons have no standard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LengthStandards {
    #[serde(rename = "60")]
    pub min60: Minutes,
    #[serde(rename = "90")]
    pub min90: Minutes,
    #[serde(rename = "120")]
    pub min120: Minutes,
}

impl Default for LengthStandards {
    fn default() -> Self {
        Self {
            min60: Minutes::new(60),
            min90: Minutes::new(90),
            min120: Minutes::new(120),
        }
    }
}

impl LengthStandards {
    pub fn standard_for(&self, length: Option<LengthCategory>) -> Option<Minutes> {
        match length? {
            LengthCategory::Min60 => Some(self.min60),
            LengthCategory::Min90 => Some(self.min90),
            LengthCategory::Min120 => Some(self.min120),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub length_standards: LengthStandards,
}

impl Config {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let display = path.display().to_string();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: display.clone(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: display,
            source,
        })
    }
}
