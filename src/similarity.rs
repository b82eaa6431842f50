//! Duplicate detection by cosine similarity
//!
//! Every idea is embedded from one canonical string, then compared against
//! every stored fingerprint with a linear scan. The best score wins; ties keep
//! the earlier-inserted idea. A fixed threshold splits duplicate from novel.

use crate::error::GateError;
use crate::types::{IdeaSubmission, SimilarityVerdict, StoredIdea};
use sha2::{Digest, Sha256};
use std::sync::Arc;

/// Default cosine cutoff at or above which a submission is a duplicate
pub const DEFAULT_DUPLICATE_THRESHOLD: f32 = 0.82;

/// The only text that is ever embedded for an idea
///
/// Field order and labels are fixed: changing them changes every fingerprint.
pub fn canonical_text(submission: &IdeaSubmission) -> String {
    format!(
        "Problem: {} | Solution: {} | fields: {} | Advantage: {}",
        submission.problem.as_deref().unwrap_or(""),
        submission.solution.as_deref().unwrap_or(""),
        submission.fields.join(", "),
        submission.advantages.as_deref().unwrap_or(""),
    )
}

/// Hex SHA-256 of the canonical text
pub fn content_hash(canonical: &str) -> String {
    hex::encode(Sha256::digest(canonical.as_bytes()))
}

#[inline]
fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

#[inline]
fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Cosine similarity in [-1, 1]; 0.0 when either vector has zero norm
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let norm_a = l2_norm(a);
    let norm_b = l2_norm(b);

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product(a, b) / (norm_a * norm_b)
}

/// Best match over `ideas` in insertion order
///
/// Returns `(0.0, None)` for an empty corpus. A later idea only replaces the
/// current best on a strictly greater score.
pub fn find_nearest(vector: &[f32], ideas: &[Arc<StoredIdea>]) -> (f32, Option<Arc<StoredIdea>>) {
    let mut best_score = 0.0f32;
    let mut best_match: Option<&Arc<StoredIdea>> = None;

    for idea in ideas {
        let score = cosine_similarity(vector, &idea.fingerprint);
        if best_match.is_none() || score > best_score {
            best_score = score;
            best_match = Some(idea);
        }
    }

    (best_score, best_match.cloned())
}

/// Threshold decision on top of the nearest-neighbour scan
#[derive(Debug, Clone, Copy)]
pub struct SimilarityEngine {
    threshold: f32,
}

impl SimilarityEngine {
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Compare a new fingerprint against every stored idea
    ///
    /// Fails with `InternalInconsistency` if any stored fingerprint has a
    /// different dimension than `vector`; nothing is scored in that case.
    pub fn verdict(
        &self,
        vector: &[f32],
        ideas: &[Arc<StoredIdea>],
    ) -> Result<SimilarityVerdict, GateError> {
        if let Some(bad) = ideas.iter().find(|idea| idea.fingerprint.len() != vector.len()) {
            return Err(GateError::InternalInconsistency(format!(
                "stored idea {} has a {}-dim fingerprint, expected {}",
                bad.id,
                bad.fingerprint.len(),
                vector.len()
            )));
        }

        let (score, nearest_match) = find_nearest(vector, ideas);
        let is_duplicate = nearest_match.is_some() && score >= self.threshold;

        Ok(SimilarityVerdict {
            is_duplicate,
            score,
            nearest_match,
        })
    }
}

impl Default for SimilarityEngine {
    fn default() -> Self {
        Self::new(DEFAULT_DUPLICATE_THRESHOLD)
    }
}
