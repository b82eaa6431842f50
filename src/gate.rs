//! Submission Gate
//!
//! Two gates in strict sequence:
//! 1. Quality gate - cheap text heuristics, no embedding on failure
//! 2. Similarity gate - embed the canonical text, scan the corpus, decide
//!
//! Embedding happens before the corpus writer slot is taken, so a slow model
//! never blocks other requests' quality checks. The scan and the append share
//! one critical section, so two identical submissions can't both get in.

use crate::config::GateConfig;
use crate::corpus::Corpus;
use crate::embeddings::Embedder;
use crate::error::GateError;
use crate::quality;
use crate::similarity::{canonical_text, content_hash, SimilarityEngine};
use crate::types::{GateResult, IdeaSubmission, StoredIdea};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

pub struct SubmissionGate {
    embedder: Arc<dyn Embedder>,
    engine: SimilarityEngine,
    embed_timeout: Duration,
    embed_attempts: u32,
    retry_backoff: Duration,
}

impl SubmissionGate {
    pub fn new(embedder: Arc<dyn Embedder>, config: &GateConfig) -> Self {
        Self {
            embedder,
            engine: SimilarityEngine::new(config.threshold),
            embed_timeout: config.embed_timeout,
            embed_attempts: config.embed_attempts.max(1),
            retry_backoff: config.retry_backoff,
        }
    }

    pub fn threshold(&self) -> f32 {
        self.engine.threshold()
    }

    /// Decide on a submission and, if it is novel, append it to `corpus`
    ///
    /// `Invalid` and `Rejected` are returned as values. Errors are reserved
    /// for infrastructure failures and never mean "not a duplicate".
    pub async fn evaluate(
        &self,
        submission: &IdeaSubmission,
        corpus: &Corpus,
    ) -> Result<GateResult, GateError> {
        // 1. Quality gate
        if let Some(field_errors) = quality::check_submission(submission) {
            let fields: Vec<String> = field_errors.keys().cloned().collect();
            let result = GateResult::Invalid { field_errors };
            tracing::info!(
                idea = %submission.name,
                reason = result.reason(),
                confidence = result.confidence(),
                ?fields,
                "Submission failed quality gate"
            );
            return Ok(result);
        }

        // 2. Embed outside the writer slot
        let canonical = canonical_text(submission);
        let fingerprint = self.embed_with_retry(&canonical).await?;

        // 3. Scan and append under the writer slot
        let writer = corpus.writer().await;
        let ideas = writer.snapshot()?;
        let verdict = self.engine.verdict(&fingerprint, &ideas).inspect_err(|e| {
            tracing::error!(idea = %submission.name, error = %e, "Corpus scan failed");
        })?;

        if verdict.is_duplicate {
            let nearest = verdict.nearest_match.ok_or_else(|| {
                GateError::InternalInconsistency("duplicate verdict without a match".to_string())
            })?;
            let result = GateResult::Rejected {
                score: verdict.score,
                nearest_match_name: nearest.name().to_string(),
                nearest_match_id: nearest.id.clone(),
            };
            tracing::info!(
                idea = %submission.name,
                nearest = %nearest.name(),
                score = verdict.score,
                threshold = self.threshold(),
                reason = result.reason(),
                confidence = result.confidence(),
                "Submission rejected as duplicate"
            );
            return Ok(result);
        }

        let idea = writer.append(StoredIdea::new(
            Uuid::new_v4().to_string(),
            submission.clone(),
            fingerprint,
            content_hash(&canonical),
        ))?;
        let result = GateResult::Accepted {
            idea: Arc::clone(&idea),
            best_score: verdict.score,
        };
        tracing::info!(
            idea = %idea.name(),
            id = %idea.id,
            best_score = verdict.score,
            threshold = self.threshold(),
            reason = result.reason(),
            confidence = result.confidence(),
            corpus_size = ideas.len() + 1,
            "Submission accepted"
        );

        Ok(result)
    }

    /// Embed on the blocking pool with a per-attempt timeout
    async fn embed_with_retry(&self, text: &str) -> Result<Vec<f32>, GateError> {
        let mut last_error = String::new();

        for attempt in 1..=self.embed_attempts {
            let embedder = Arc::clone(&self.embedder);
            let owned = text.to_string();
            let task = tokio::task::spawn_blocking(move || embedder.embed(&owned));

            match tokio::time::timeout(self.embed_timeout, task).await {
                Ok(Ok(Ok(vector))) => return Ok(vector),
                Ok(Ok(Err(e))) => last_error = format!("{:#}", e),
                Ok(Err(join_error)) => last_error = format!("embedding task failed: {}", join_error),
                Err(_) => last_error = format!("timed out after {:?}", self.embed_timeout),
            }

            tracing::warn!(
                attempt,
                max_attempts = self.embed_attempts,
                error = %last_error,
                "Embedding attempt failed"
            );

            if attempt < self.embed_attempts {
                tokio::time::sleep(self.backoff(attempt)).await;
            }
        }

        Err(GateError::EmbeddingUnavailable {
            attempts: self.embed_attempts,
            reason: last_error,
        })
    }

    /// Exponential backoff with up to 50% jitter
    fn backoff(&self, attempt: u32) -> Duration {
        let base = self.retry_backoff.as_millis() as u64;
        if base == 0 {
            return Duration::ZERO;
        }
        let exp = base.saturating_mul(1u64 << (attempt - 1).min(10));
        let jitter = rand::thread_rng().gen_range(0..=exp / 2);
        Duration::from_millis(exp + jitter)
    }
}
