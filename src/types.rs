//! Core types for the idea submission gate
//!
//! Wire names follow the public ideas API (`ideaName`, `readinessLevel`, ...),
//! so submissions posted by existing clients deserialize unchanged.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

/// A free-text business idea as submitted by its owner
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IdeaSubmission {
    #[serde(rename = "ideaName")]
    pub name: String,
    #[serde(default)]
    pub problem: Option<String>,
    #[serde(default)]
    pub solution: Option<String>,
    #[serde(default)]
    pub advantages: Option<String>,
    #[serde(default)]
    pub readiness_level: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub fields: Vec<String>,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Narrative fields checked by the quality filter, in reporting order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum NarrativeField {
    Problem,
    Solution,
    Advantages,
}

impl NarrativeField {
    pub const ALL: [NarrativeField; 3] = [
        NarrativeField::Problem,
        NarrativeField::Solution,
        NarrativeField::Advantages,
    ];

    /// Key used in the `errors` map returned to clients
    pub fn key(&self) -> &'static str {
        match self {
            NarrativeField::Problem => "problem",
            NarrativeField::Solution => "solution",
            NarrativeField::Advantages => "advantages",
        }
    }

    /// Message shown to the submitter when the field is rejected
    pub fn message(&self) -> &'static str {
        match self {
            NarrativeField::Problem => "Please provide a clear Problem.",
            NarrativeField::Solution => "Please provide a clear Solution.",
            NarrativeField::Advantages => "Please provide a clear Advantage.",
        }
    }

    /// Field text from a submission; a missing field reads as empty
    pub fn text<'a>(&self, submission: &'a IdeaSubmission) -> &'a str {
        let value = match self {
            NarrativeField::Problem => &submission.problem,
            NarrativeField::Solution => &submission.solution,
            NarrativeField::Advantages => &submission.advantages,
        };
        value.as_deref().unwrap_or("")
    }
}

/// Per-field error messages, keyed by field name
pub type FieldErrors = BTreeMap<String, String>;

/// The nine sections of a business model canvas, in canvas layout order
pub const CANVAS_SECTIONS: [&str; 9] = [
    "key_partners",
    "key_activities",
    "key_resources",
    "value_propositions",
    "customer_relationships",
    "channels",
    "customer_segments",
    "cost_structure",
    "revenue_streams",
];

/// Business model canvas: section name -> bullet points
pub type BusinessModel = BTreeMap<String, Vec<String>>;

/// AI-generated artifacts attached to an accepted idea
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Enrichment {
    pub summary: String,
    pub business_model: BusinessModel,
}

/// Suggestions returned alongside a duplicate rejection
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ImprovementTips {
    #[serde(default)]
    pub why_similar: Vec<String>,
    #[serde(default)]
    pub niche_pivots: Vec<String>,
    #[serde(default)]
    pub feature_differentiators: Vec<String>,
    #[serde(default)]
    pub gtm_strategies: Vec<String>,
    #[serde(default)]
    pub risks_and_mitigations: Vec<String>,
}

/// An accepted idea owned by the corpus
///
/// Everything except the enrichment slot is fixed at insertion. The slot is
/// filled at most once, after the gate has accepted the idea.
#[derive(Debug)]
pub struct StoredIdea {
    pub id: String,
    pub submission: IdeaSubmission,
    /// Embedding of the canonical text
    pub fingerprint: Vec<f32>,
    /// Hex SHA-256 of the canonical text
    pub content_hash: String,
    pub accepted_at: DateTime<Utc>,
    enrichment: OnceLock<Enrichment>,
}

impl StoredIdea {
    pub fn new(
        id: String,
        submission: IdeaSubmission,
        fingerprint: Vec<f32>,
        content_hash: String,
    ) -> Self {
        Self {
            id,
            submission,
            fingerprint,
            content_hash,
            accepted_at: Utc::now(),
            enrichment: OnceLock::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.submission.name
    }

    pub fn enrichment(&self) -> Option<&Enrichment> {
        self.enrichment.get()
    }

    /// Attach enrichment; returns false if it was already attached
    pub fn attach_enrichment(&self, enrichment: Enrichment) -> bool {
        self.enrichment.set(enrichment).is_ok()
    }

    /// Client-facing view of this idea
    pub fn to_record(&self) -> IdeaRecord {
        IdeaRecord {
            id: self.id.clone(),
            idea: self.submission.clone(),
            content_hash: self.content_hash.clone(),
            accepted_at: self.accepted_at,
            summary: self.enrichment().map(|e| e.summary.clone()),
            business_model: self.enrichment().map(|e| e.business_model.clone()),
        }
    }
}

/// Serializable view of a stored idea (fingerprint omitted)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IdeaRecord {
    #[serde(rename = "ideaId")]
    pub id: String,
    #[serde(flatten)]
    pub idea: IdeaSubmission,
    pub content_hash: String,
    pub accepted_at: DateTime<Utc>,
    pub summary: Option<String>,
    #[serde(rename = "bmc")]
    pub business_model: Option<BusinessModel>,
}

/// Nearest-neighbour outcome for one submission
#[derive(Debug, Clone)]
pub struct SimilarityVerdict {
    pub is_duplicate: bool,
    pub score: f32,
    pub nearest_match: Option<Arc<StoredIdea>>,
}

/// Decision of the submission gate
#[derive(Debug, Clone)]
pub enum GateResult {
    /// One or more narrative fields failed the quality filter
    Invalid { field_errors: FieldErrors },
    /// Too close to an idea already in the corpus
    Rejected {
        score: f32,
        nearest_match_name: String,
        nearest_match_id: String,
    },
    /// Novel idea, already appended to the corpus
    Accepted { idea: Arc<StoredIdea>, best_score: f32 },
}

impl GateResult {
    /// Canonical reason string
    pub fn reason(&self) -> &'static str {
        match self {
            GateResult::Invalid { .. } => "invalid",
            GateResult::Rejected { .. } => "duplicate",
            GateResult::Accepted { .. } => "accepted",
        }
    }

    /// How sure the gate is of its decision, in [0, 1]
    pub fn confidence(&self) -> f32 {
        match self {
            GateResult::Invalid { .. } => 1.0,
            GateResult::Rejected { score, .. } => score.clamp(0.0, 1.0),
            GateResult::Accepted { best_score, .. } => 1.0 - best_score.clamp(0.0, 1.0),
        }
    }
}

/// Response body for `POST /ideas`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum SubmissionResponse {
    Invalid {
        errors: FieldErrors,
    },
    Rejected {
        similarity_score: f32,
        nearest_match: String,
        improvement_tips: Option<ImprovementTips>,
    },
    Accepted {
        #[serde(rename = "ideaName")]
        idea_name: String,
        #[serde(rename = "ideaId")]
        idea_id: String,
        summary: Option<String>,
        #[serde(rename = "businessModel")]
        business_model: Option<BusinessModel>,
    },
}
