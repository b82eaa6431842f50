//! Process-level idea service
//!
//! Owns the corpus, the gate and the enricher. Initialize once at start-up
//! and share behind an `Arc`:
//!
//! ```rust,ignore
//! let config = GateConfig::from_env()?;
//! let service = Arc::new(IdeaService::from_config(&config)?);
//!
//! match service.submit_idea(submission).await? {
//!     SubmissionResponse::Accepted { idea_id, .. } => { /* ... */ }
//!     SubmissionResponse::Rejected { nearest_match, .. } => { /* ... */ }
//!     SubmissionResponse::Invalid { errors } => { /* ... */ }
//! }
//! ```

use crate::config::{EmbedderKind, GateConfig};
use crate::corpus::Corpus;
use crate::embeddings::{Embedder, HashingEmbedder, OnnxEmbedder};
use crate::enrich::{AnyEnricher, Enricher};
use crate::error::GateError;
use crate::gate::SubmissionGate;
use crate::types::{GateResult, IdeaRecord, IdeaSubmission, SubmissionResponse};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;

pub struct IdeaService<N> {
    gate: SubmissionGate,
    corpus: Corpus,
    enricher: N,
}

impl IdeaService<AnyEnricher> {
    /// Build embedder, enricher and an empty corpus from configuration
    pub fn from_config(config: &GateConfig) -> Result<Self> {
        let embedder = build_embedder(config)?;
        let gate = SubmissionGate::new(embedder, config);
        Ok(Self::new(gate, AnyEnricher::from_config(&config.llm)))
    }
}

impl<N: Enricher> IdeaService<N> {
    pub fn new(gate: SubmissionGate, enricher: N) -> Self {
        Self {
            gate,
            corpus: Corpus::new(),
            enricher,
        }
    }

    pub fn corpus(&self) -> &Corpus {
        &self.corpus
    }

    /// Duplicate threshold the gate was built with
    pub fn threshold(&self) -> f32 {
        self.gate.threshold()
    }

    /// Run a submission through the gate and enrich the outcome
    ///
    /// Enrichment failures are logged and reported as absent enrichment; they
    /// never turn an acceptance into anything else.
    pub async fn submit_idea(
        &self,
        submission: IdeaSubmission,
    ) -> Result<SubmissionResponse, GateError> {
        let result = self.gate.evaluate(&submission, &self.corpus).await?;

        let response = match result {
            GateResult::Invalid { field_errors } => SubmissionResponse::Invalid {
                errors: field_errors,
            },
            GateResult::Rejected {
                score,
                nearest_match_name,
                nearest_match_id,
            } => {
                let improvement_tips = match self.corpus.get(&nearest_match_id) {
                    Some(nearest) => self
                        .enricher
                        .improvement_tips(&submission, &nearest.to_record())
                        .await
                        .inspect_err(|e| {
                            tracing::warn!(idea = %submission.name, error = %e, "Improvement tips unavailable");
                        })
                        .ok(),
                    None => None,
                };

                SubmissionResponse::Rejected {
                    similarity_score: score,
                    nearest_match: nearest_match_name,
                    improvement_tips,
                }
            }
            GateResult::Accepted { idea, .. } => {
                match self.enricher.enrich(&idea.to_record()).await {
                    Ok(enrichment) => {
                        idea.attach_enrichment(enrichment);
                    }
                    Err(e) => {
                        tracing::warn!(idea = %idea.name(), error = %e, "Enrichment failed, idea stays accepted");
                    }
                }

                SubmissionResponse::Accepted {
                    idea_name: idea.name().to_string(),
                    idea_id: idea.id.clone(),
                    summary: idea.enrichment().map(|e| e.summary.clone()),
                    business_model: idea.enrichment().map(|e| e.business_model.clone()),
                }
            }
        };

        Ok(response)
    }

    /// Accepted ideas in insertion order
    pub fn list_ideas(&self) -> Result<Vec<IdeaRecord>, GateError> {
        self.corpus.records()
    }
}

/// Embedder selected by configuration
pub fn build_embedder(config: &GateConfig) -> Result<Arc<dyn Embedder>> {
    let embedder: Arc<dyn Embedder> = match config.embedder {
        EmbedderKind::Onnx => Arc::new(
            OnnxEmbedder::new(&config.model_dir).context("Failed to initialize ONNX embedder")?,
        ),
        EmbedderKind::Hashing => Arc::new(HashingEmbedder::default()),
    };
    tracing::info!(kind = ?config.embedder, dim = embedder.dimension(), "Embedder ready");
    Ok(embedder)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SubmissionFile {
    Many(Vec<IdeaSubmission>),
    One(IdeaSubmission),
}

/// Read one submission or an array of submissions from a JSON file
pub fn read_submissions(path: &Path) -> Result<Vec<IdeaSubmission>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read submissions from {:?}", path))?;
    let parsed: SubmissionFile = serde_json::from_str(&content)
        .with_context(|| format!("Invalid submission JSON in {:?}", path))?;

    Ok(match parsed {
        SubmissionFile::Many(submissions) => submissions,
        SubmissionFile::One(submission) => vec![submission],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrich::TemplateEnricher;
    use crate::types::{Enrichment, ImprovementTips};
    use anyhow::anyhow;
    use std::io::Write;
    use std::time::Duration;

    struct BrokenEnricher;

    impl Enricher for BrokenEnricher {
        async fn enrich(&self, _idea: &IdeaRecord) -> Result<Enrichment> {
            Err(anyhow!("LLM quota exceeded"))
        }

        async fn improvement_tips(
            &self,
            _submission: &IdeaSubmission,
            _nearest: &IdeaRecord,
        ) -> Result<ImprovementTips> {
            Err(anyhow!("LLM quota exceeded"))
        }
    }

    fn gate() -> SubmissionGate {
        let config = GateConfig {
            retry_backoff: Duration::ZERO,
            ..GateConfig::default()
        };
        SubmissionGate::new(Arc::new(HashingEmbedder::default()), &config)
    }

    fn food_waste(name: &str) -> IdeaSubmission {
        IdeaSubmission {
            name: name.to_string(),
            problem: Some("Too many restaurants waste unsold food daily".to_string()),
            solution: Some("An app connecting restaurants with surplus food to nearby shelters".to_string()),
            advantages: Some("Real-time matching reduces waste and feeds people faster".to_string()),
            readiness_level: None,
            fields: vec!["foodtech".to_string()],
        }
    }

    #[test]
    fn test_submit_accept_then_reject_with_tips() {
        let service = IdeaService::new(gate(), TemplateEnricher);

        let first = tokio_test::block_on(service.submit_idea(food_waste("Food Bridge"))).unwrap();
        match &first {
            SubmissionResponse::Accepted { idea_name, summary, business_model, .. } => {
                assert_eq!(idea_name, "Food Bridge");
                assert!(summary.is_some());
                assert_eq!(business_model.as_ref().unwrap().len(), 9);
            }
            other => panic!("expected Accepted, got {:?}", other),
        }

        let second = tokio_test::block_on(service.submit_idea(food_waste("Food Bridge 2"))).unwrap();
        match second {
            SubmissionResponse::Rejected { similarity_score, nearest_match, improvement_tips } => {
                assert!(similarity_score >= 0.82);
                assert_eq!(nearest_match, "Food Bridge");
                let tips = improvement_tips.unwrap();
                assert!(tips.why_similar.iter().any(|t| t == "Both target foodtech"));
            }
            other => panic!("expected Rejected, got {:?}", other),
        }

        let ideas = service.list_ideas().unwrap();
        assert_eq!(ideas.len(), 1);
        assert!(ideas[0].summary.is_some());
    }

    #[test]
    fn test_enrichment_failure_keeps_idea() {
        let service = IdeaService::new(gate(), BrokenEnricher);

        let response = tokio_test::block_on(service.submit_idea(food_waste("Food Bridge"))).unwrap();
        match response {
            SubmissionResponse::Accepted { summary, business_model, .. } => {
                assert!(summary.is_none());
                assert!(business_model.is_none());
            }
            other => panic!("expected Accepted, got {:?}", other),
        }
        assert_eq!(service.corpus().len(), 1);

        let rejected = tokio_test::block_on(service.submit_idea(food_waste("Copy"))).unwrap();
        assert!(matches!(
            rejected,
            SubmissionResponse::Rejected { improvement_tips: None, .. }
        ));
    }

    #[test]
    fn test_invalid_response_errors() {
        let service = IdeaService::new(gate(), TemplateEnricher);
        let mut bad = food_waste("Bad");
        bad.solution = Some("short".to_string());

        let response = tokio_test::block_on(service.submit_idea(bad)).unwrap();
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["status"], "invalid");
        assert_eq!(value["errors"]["solution"], "Please provide a clear Solution.");
        assert!(service.list_ideas().unwrap().is_empty());
    }

    #[test]
    fn test_read_submissions_one_or_many() {
        let mut single = tempfile::NamedTempFile::new().unwrap();
        write!(single, r#"{{"ideaName": "Solo", "fields": ["x"]}}"#).unwrap();
        let parsed = read_submissions(single.path()).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].name, "Solo");

        let mut many = tempfile::NamedTempFile::new().unwrap();
        write!(many, r#"[{{"ideaName": "A"}}, {{"ideaName": "B"}}]"#).unwrap();
        let parsed = read_submissions(many.path()).unwrap();
        assert_eq!(parsed.iter().map(|s| s.name.as_str()).collect::<Vec<_>>(), vec!["A", "B"]);
    }

    #[test]
    fn test_build_hashing_embedder() {
        let config = GateConfig {
            embedder: EmbedderKind::Hashing,
            ..GateConfig::default()
        };
        let embedder = build_embedder(&config).unwrap();
        assert_eq!(embedder.dimension(), crate::embeddings::EMBEDDING_DIM);
    }
}
