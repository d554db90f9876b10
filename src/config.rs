use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result};

use crate::pipeline::PipelineSettings;

/// Which embedding backend to use.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EmbedderBackend {
    /// Local ONNX all-MiniLM-L6-v2 (default), needs `download-model` once
    Onnx,
    /// Feature hashing, needs no model files (offline fallback and tests)
    Hashing,
}

impl FromStr for EmbedderBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "onnx" => Ok(Self::Onnx),
            "hashing" => Ok(Self::Hashing),
            other => anyhow::bail!("Unknown embedder '{}' (expected onnx or hashing)", other),
        }
    }
}

/// Central configuration loaded from environment variables.
///
/// The .env file is loaded automatically at startup via dotenvy.
pub struct Config {
    pub db_path: String,
    /// Directory containing the ONNX model files
    pub model_dir: PathBuf,
    /// Which embedder to use (default: Onnx)
    pub embedder: EmbedderBackend,
    pub reduce_dims: usize,
    pub min_cluster_size: usize,
    pub min_samples: usize,
    pub seed: u64,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Everything has a default; a value that is set but malformed is an
    /// error rather than silently ignored.
    pub fn load() -> Result<Self> {
        let defaults = PipelineSettings::default();

        let embedder = match env::var("TOPICPULSE_EMBEDDER") {
            Ok(value) => value.parse().context("Invalid TOPICPULSE_EMBEDDER")?,
            Err(_) => EmbedderBackend::Onnx,
        };

        let model_dir = env::var("TOPICPULSE_MODEL_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| crate::topics::download::default_model_dir());

        let config = Self {
            db_path: env::var("TOPICPULSE_DB_PATH").unwrap_or_else(|_| "./topicpulse.db".to_string()),
            model_dir,
            embedder,
            reduce_dims: env_number("TOPICPULSE_REDUCE_DIMS", defaults.reduce_dims)?,
            min_cluster_size: env_number("TOPICPULSE_MIN_CLUSTER_SIZE", defaults.min_cluster_size)?,
            min_samples: env_number("TOPICPULSE_MIN_SAMPLES", defaults.min_samples)?,
            seed: env_number("TOPICPULSE_SEED", defaults.seed)?,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.reduce_dims < 1 {
            anyhow::bail!("TOPICPULSE_REDUCE_DIMS must be at least 1");
        }
        if self.min_cluster_size < 2 {
            anyhow::bail!("TOPICPULSE_MIN_CLUSTER_SIZE must be at least 2");
        }
        if self.min_samples < 1 {
            anyhow::bail!("TOPICPULSE_MIN_SAMPLES must be at least 1");
        }
        Ok(())
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            reduce_dims: self.reduce_dims,
            min_cluster_size: self.min_cluster_size,
            min_samples: self.min_samples,
            seed: self.seed,
        }
    }

    /// Check that the ONNX model is on disk when the ONNX backend is chosen.
    pub fn require_embedder(&self) -> Result<()> {
        if self.embedder == EmbedderBackend::Onnx
            && !crate::topics::download::embedding_files_present(&self.model_dir)
        {
            anyhow::bail!(
                "Embedding model files not found in {}\n\
                 Run `topicpulse download-model` to download them.\n\
                 Or set TOPICPULSE_EMBEDDER=hashing to run without a model.",
                self.model_dir.display()
            );
        }
        Ok(())
    }
}

fn env_number<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} must be a non-negative integer, got '{}'", key, raw)),
        Err(_) => Ok(default),
    }
}
