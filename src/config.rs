//! Runtime configuration
//!
//! Defaults match the gate's reference behaviour; every knob can be
//! overridden through `IDEA_GATE_*` environment variables.

use crate::embeddings::get_model_dir;
use crate::enrich::LlmConfig;
use crate::similarity::DEFAULT_DUPLICATE_THRESHOLD;
use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Which embedder backs the gate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedderKind {
    /// all-MiniLM-L6-v2 via ONNX Runtime
    Onnx,
    /// Feature hashing, no model download
    Hashing,
}

impl FromStr for EmbedderKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "onnx" | "minilm" => Ok(EmbedderKind::Onnx),
            "hashing" | "hash" => Ok(EmbedderKind::Hashing),
            other => bail!("Unknown embedder '{}': expected 'onnx' or 'hashing'", other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GateConfig {
    /// Cosine score at or above which a submission is a duplicate
    pub threshold: f32,

    /// Upper bound on a single embedding attempt
    pub embed_timeout: Duration,

    /// Embedding attempts before giving up (at least 1)
    pub embed_attempts: u32,

    /// Base delay between attempts; doubled per retry and jittered
    pub retry_backoff: Duration,

    pub embedder: EmbedderKind,

    /// Where the ONNX model and tokenizer are cached
    pub model_dir: PathBuf,

    /// Enrichment LLM settings (enrichment is templated when no key is set)
    pub llm: LlmConfig,

    /// Origins allowed by the HTTP listener
    pub cors_origins: Vec<String>,

    pub port: u16,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_DUPLICATE_THRESHOLD,
            embed_timeout: Duration::from_millis(10_000),
            embed_attempts: 3,
            retry_backoff: Duration::from_millis(200),
            embedder: EmbedderKind::Onnx,
            model_dir: get_model_dir(),
            llm: LlmConfig::default(),
            cors_origins: vec!["http://localhost:5173".to_string()],
            port: 8000,
        }
    }
}

impl GateConfig {
    /// Defaults overridden by the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(v) = lookup("IDEA_GATE_THRESHOLD") {
            config.threshold = v.trim().parse()
                .with_context(|| format!("IDEA_GATE_THRESHOLD is not a number: {:?}", v))?;
        }
        if let Some(v) = lookup("IDEA_GATE_EMBED_TIMEOUT_MS") {
            let ms: u64 = v.trim().parse()
                .with_context(|| format!("IDEA_GATE_EMBED_TIMEOUT_MS is not an integer: {:?}", v))?;
            config.embed_timeout = Duration::from_millis(ms);
        }
        if let Some(v) = lookup("IDEA_GATE_EMBED_ATTEMPTS") {
            config.embed_attempts = v.trim().parse()
                .with_context(|| format!("IDEA_GATE_EMBED_ATTEMPTS is not an integer: {:?}", v))?;
        }
        if let Some(v) = lookup("IDEA_GATE_RETRY_BACKOFF_MS") {
            let ms: u64 = v.trim().parse()
                .with_context(|| format!("IDEA_GATE_RETRY_BACKOFF_MS is not an integer: {:?}", v))?;
            config.retry_backoff = Duration::from_millis(ms);
        }
        if let Some(v) = lookup("IDEA_GATE_EMBEDDER") {
            config.embedder = v.parse()?;
        }
        if let Some(v) = lookup("IDEA_GATE_MODEL_DIR") {
            config.model_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("ANTHROPIC_API_KEY") {
            config.llm.api_key = v;
        }
        if let Some(v) = lookup("IDEA_GATE_LLM_MODEL") {
            config.llm.model = v;
        }
        if let Some(v) = lookup("IDEA_GATE_LLM_URL") {
            config.llm.api_url = v;
        }
        if let Some(v) = lookup("CORS_ORIGINS") {
            config.cors_origins = v
                .split(',')
                .map(|origin| origin.trim().to_string())
                .filter(|origin| !origin.is_empty())
                .collect();
        }
        if let Some(v) = lookup("IDEA_GATE_PORT") {
            config.port = v.trim().parse()
                .with_context(|| format!("IDEA_GATE_PORT is not a port number: {:?}", v))?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(-1.0..=1.0).contains(&self.threshold) {
            bail!("Duplicate threshold must be within [-1, 1], got {}", self.threshold);
        }
        if self.embed_attempts == 0 {
            bail!("Embedding attempts must be at least 1");
        }
        if self.embed_timeout.is_zero() {
            bail!("Embedding timeout must be positive");
        }
        Ok(())
    }
}
