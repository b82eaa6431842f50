//! Embedders for idea fingerprints
//!
//! The gate only needs "text in, fixed-length vector out". Two backends:
//! 1. `OnnxEmbedder` - all-MiniLM-L6-v2 via ONNX Runtime (384 dims, CPU)
//! 2. `HashingEmbedder` - feature-hashed bag of words, no model files needed
//!
//! Both are deterministic for identical input and return L2-normalised vectors.

use anyhow::{anyhow, Context, Result};
use ndarray::Array2;
use ort::{inputs, session::{Session, builder::GraphOptimizationLevel}, value::Tensor};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokenizers::Tokenizer;

/// Embedding dimensions for all-MiniLM-L6-v2
pub const EMBEDDING_DIM: usize = 384;

/// Maximum sequence length for the model
const MAX_SEQ_LEN: usize = 256;

/// Maps canonical idea text to a fingerprint vector
///
/// Implementations must be deterministic within a process so that similarity
/// scores stay stable across submissions.
pub trait Embedder: Send + Sync {
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Length of every vector this embedder returns
    fn dimension(&self) -> usize;
}

/// Sentence embeddings from a local ONNX model
pub struct OnnxEmbedder {
    session: Mutex<Session>,
    tokenizer: Tokenizer,
}

impl OnnxEmbedder {
    /// Load the model from `model_dir`, downloading it first if missing
    pub fn new(model_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(model_dir)
            .with_context(|| format!("Failed to create model dir {:?}", model_dir))?;

        let model_path = model_dir.join("model.onnx");
        let tokenizer_path = model_dir.join("tokenizer.json");

        if !model_path.exists() || !tokenizer_path.exists() {
            Self::download_model(model_dir)?;
        }

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3).map_err(ort::Error::<()>::from)?
            .with_intra_threads(4).map_err(ort::Error::<()>::from)?
            .commit_from_file(&model_path)
            .context("Failed to load ONNX model")?;

        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow!("Failed to load tokenizer: {}", e))?;

        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
        })
    }

    /// Download the embedding model from HuggingFace
    fn download_model(model_dir: &Path) -> Result<()> {
        use hf_hub::api::sync::Api;

        tracing::info!("Downloading embedding model (all-MiniLM-L6-v2) into {:?}", model_dir);
        let api = Api::new()?;
        let repo = api.model("sentence-transformers/all-MiniLM-L6-v2".to_string());

        let model_path = repo.get("onnx/model.onnx")?;
        std::fs::copy(&model_path, model_dir.join("model.onnx"))?;

        let tokenizer_path = repo.get("tokenizer.json")?;
        std::fs::copy(&tokenizer_path, model_dir.join("tokenizer.json"))?;

        tracing::info!("Embedding model downloaded");
        Ok(())
    }

    /// Mean pooling over the sequence dimension
    /// tensor shape: [1, seq_len, embedding_dim]
    fn mean_pool_flat(data: &[f32], seq_len: usize, shape: &[i64]) -> Vec<f32> {
        let mut result = vec![0.0f32; EMBEDDING_DIM];
        if seq_len == 0 {
            return result;
        }

        let embed_dim = if shape.len() >= 3 { shape[2] as usize } else { EMBEDDING_DIM };

        for i in 0..seq_len {
            for j in 0..embed_dim.min(EMBEDDING_DIM) {
                let idx = i * embed_dim + j;
                if idx < data.len() {
                    result[j] += data[idx];
                }
            }
        }

        for v in result.iter_mut() {
            *v /= seq_len as f32;
        }

        result
    }
}

impl Embedder for OnnxEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let encoding = self.tokenizer
            .encode(text, true)
            .map_err(|e| anyhow!("Tokenization failed: {}", e))?;

        let ids: Vec<i64> = encoding.get_ids().iter().map(|&id| id as i64).collect();
        let attention_mask: Vec<i64> = encoding.get_attention_mask().iter().map(|&m| m as i64).collect();

        let len = ids.len().min(MAX_SEQ_LEN);
        let input_ids = Array2::from_shape_vec((1, len), ids[..len].to_vec())?;
        let attention = Array2::from_shape_vec((1, len), attention_mask[..len].to_vec())?;
        let token_types = Array2::from_shape_vec((1, len), vec![0i64; len])?;

        let mut session = self.session
            .lock()
            .map_err(|_| anyhow!("ONNX session lock poisoned"))?;

        let outputs = session.run(inputs![
            "input_ids" => Tensor::from_array(input_ids)?,
            "attention_mask" => Tensor::from_array(attention)?,
            "token_type_ids" => Tensor::from_array(token_types)?,
        ])?;

        let output = outputs.get("last_hidden_state")
            .or_else(|| outputs.get("token_embeddings"))
            .ok_or_else(|| anyhow!("No embedding output found"))?;

        let (shape, data) = output.try_extract_tensor::<f32>()?;
        let shape_vec: Vec<i64> = shape.iter().copied().collect();

        // Copy out before the outputs borrow ends
        let data_vec: Vec<f32> = data.to_vec();
        drop(outputs);

        let embedding = Self::mean_pool_flat(&data_vec, len, &shape_vec);
        Ok(l2_normalize(&embedding))
    }

    fn dimension(&self) -> usize {
        EMBEDDING_DIM
    }
}

/// Signed feature hashing over lowercase word tokens
///
/// Identical text always maps to the same vector. Texts sharing most of their
/// words land close together; unrelated texts are near orthogonal.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dim: usize,
}

impl HashingEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim: dim.max(1) }
    }

    fn bucket(&self, token: &str) -> (usize, f32) {
        let digest = Sha256::digest(token.as_bytes());
        let mut head = [0u8; 8];
        head.copy_from_slice(&digest[..8]);
        let index = (u64::from_le_bytes(head) % self.dim as u64) as usize;
        let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
        (index, sign)
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(EMBEDDING_DIM)
    }
}

impl Embedder for HashingEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0.0f32; self.dim];

        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let (index, sign) = self.bucket(&token.to_lowercase());
            vector[index] += sign;
        }

        Ok(l2_normalize(&vector))
    }

    fn dimension(&self) -> usize {
        self.dim
    }
}

/// L2 normalize a vector; zero vectors are returned unchanged
pub fn l2_normalize(vec: &[f32]) -> Vec<f32> {
    let norm: f32 = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        vec.iter().map(|x| x / norm).collect()
    } else {
        vec.to_vec()
    }
}

/// Get model directory path
pub fn get_model_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("idea-gate")
        .join("models")
        .join("minilm")
}
