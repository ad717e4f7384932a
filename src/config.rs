//! Tunables for a `read_surf` call.

use crate::error::SurfError;
use crate::section::CHUNK;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// How point-wise transforms are applied to a batch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecMode {
    /// Single-threaded, in order.
    #[default]
    Sequential,
    /// Multi-threaded with Rayon once the batch reaches `parallel_threshold`
    /// points. Falls back to sequential without the `parallel` feature.
    Parallel,
}

/// Configuration shared by every rank. All ranks must use the same values.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadSurfConfig {
    /// Records gathered into one broadcast.
    pub chunk_size: usize,
    pub exec_mode: ExecMode,
    /// Minimum number of new points before parallel transforms kick in.
    pub parallel_threshold: usize,
}

impl Default for ReadSurfConfig {
    fn default() -> Self {
        Self {
            chunk_size: CHUNK,
            exec_mode: ExecMode::Sequential,
            parallel_threshold: 4096,
        }
    }
}

impl ReadSurfConfig {
    /// Parse a JSON document; missing fields take their defaults.
    pub fn from_json_str(s: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(s).context("parse read_surf config")?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load a JSON config file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        Self::from_json_str(&text).with_context(|| format!("in {}", path.display()))
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(SurfError::Config {
                detail: "chunk_size must be at least 1".to_string(),
            }
            .into());
        }
        Ok(())
    }
}
