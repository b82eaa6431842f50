//! idea-gate - Submission gate for business ideas
//!
//! Decides whether a submitted idea is well-formed prose, a near-duplicate of
//! an idea already accepted, or a new idea worth enriching.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use idea_gate::{GateConfig, IdeaService, SubmissionResponse};
//!
//! let config = GateConfig::from_env()?;
//! let service = IdeaService::from_config(&config)?;
//!
//! let response = service.submit_idea(submission).await?;
//! if let SubmissionResponse::Rejected { nearest_match, similarity_score, .. } = response {
//!     println!("too close to {} ({:.2})", nearest_match, similarity_score);
//! }
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │           HTTP layer (GET/POST /ideas)               │
//! └─────────────────────┬───────────────────────────────┘
//!                       ▼
//! ┌─────────────────────────────────────────────────────┐
//! │  IdeaService                                         │
//! │   SubmissionGate                                     │
//! │     1. quality::check_submission  (cheap)            │
//! │     2. Embedder::embed            (timeout + retry)  │
//! │     3. SimilarityEngine::verdict  (under writer)     │
//! │   Corpus   (append-only, process lifetime)           │
//! │   Enricher (summary, canvas, improvement tips)       │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod corpus;
pub mod embeddings;
pub mod enrich;
pub mod error;
pub mod gate;
pub mod http;
pub mod quality;
pub mod service;
pub mod similarity;
pub mod types;

// Core types
pub use config::{EmbedderKind, GateConfig};
pub use corpus::Corpus;
pub use error::GateError;
pub use gate::SubmissionGate;
pub use service::IdeaService;
pub use types::*;

// Text quality
pub use quality::{check_submission, is_low_quality, QualityCheck};

// Similarity
pub use similarity::{canonical_text, cosine_similarity, find_nearest, SimilarityEngine, DEFAULT_DUPLICATE_THRESHOLD};

// Embedders
pub use embeddings::{Embedder, HashingEmbedder, OnnxEmbedder, get_model_dir, EMBEDDING_DIM};

// Enrichment
pub use enrich::{AnyEnricher, Enricher, LlmConfig, LlmEnricher, TemplateEnricher};
