//! Enrichment of gate decisions
//!
//! Accepted ideas get a short summary and a business model canvas; rejected
//! ideas get improvement tips relative to their nearest match. Both are
//! best-effort: a failure here never changes the gate's decision.
//!
//! `LlmEnricher` asks Claude for JSON; `TemplateEnricher` fills the same
//! shapes from the submission itself and is used when no API key is set.

use crate::types::{
    BusinessModel, Enrichment, IdeaRecord, IdeaSubmission, ImprovementTips, CANVAS_SECTIONS,
};
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::future::Future;

/// Configuration for the enrichment LLM
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// API base URL
    pub api_url: String,

    /// API key (from environment)
    pub api_key: String,

    /// Model to use (default: claude-3-haiku-20240307)
    pub model: String,

    pub max_tokens: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.anthropic.com/v1/messages".to_string(),
            api_key: std::env::var("ANTHROPIC_API_KEY").unwrap_or_default(),
            model: "claude-3-haiku-20240307".to_string(),
            max_tokens: 1024,
        }
    }
}

/// Produces enrichment for gate decisions
pub trait Enricher: Send + Sync {
    /// Summary and canvas for a freshly accepted idea
    fn enrich(&self, idea: &IdeaRecord) -> impl Future<Output = Result<Enrichment>> + Send;

    /// Ways to set a rejected submission apart from its nearest match
    fn improvement_tips(
        &self,
        submission: &IdeaSubmission,
        nearest: &IdeaRecord,
    ) -> impl Future<Output = Result<ImprovementTips>> + Send;
}

/// Canvas with every section present and empty
pub fn empty_canvas() -> BusinessModel {
    CANVAS_SECTIONS
        .iter()
        .map(|section| (section.to_string(), Vec::new()))
        .collect()
}

/// Keep the nine canonical sections, drop anything else, fill the gaps
fn normalize_canvas(raw: BusinessModel) -> BusinessModel {
    let mut canvas = empty_canvas();
    for (section, items) in raw {
        if let Some(slot) = canvas.get_mut(section.as_str()) {
            *slot = items
                .into_iter()
                .map(|item| item.trim().to_string())
                .filter(|item| !item.is_empty())
                .collect();
        }
    }
    canvas
}

// ============================================================================
// LLM ENRICHER
// ============================================================================

pub struct LlmEnricher {
    client: reqwest::Client,
    config: LlmConfig,
}

#[derive(Debug, Deserialize)]
struct LlmEnrichment {
    summary: String,
    #[serde(default, alias = "businessModel", alias = "bmc")]
    business_model: BusinessModel,
}

impl LlmEnricher {
    pub fn new(config: LlmConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(anyhow!("ANTHROPIC_API_KEY not set. LLM enrichment requires API access."));
        }
        Ok(Self {
            client: reqwest::Client::new(),
            config,
        })
    }

    /// Send one user message and return the first text block
    async fn complete(&self, prompt: String) -> Result<String> {
        let request_body = serde_json::json!({
            "model": self.config.model,
            "max_tokens": self.config.max_tokens,
            "messages": [
                {
                    "role": "user",
                    "content": prompt
                }
            ]
        });

        let api_response = self.client
            .post(&self.config.api_url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&request_body)
            .send()
            .await
            .context("Enrichment request failed")?;

        if !api_response.status().is_success() {
            let error_text = api_response.text().await?;
            return Err(anyhow!("API error: {}", error_text));
        }

        let response_json: serde_json::Value = api_response.json().await?;
        response_json["content"][0]["text"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| anyhow!("API response has no text content"))
    }
}

impl Enricher for LlmEnricher {
    async fn enrich(&self, idea: &IdeaRecord) -> Result<Enrichment> {
        let content = self.complete(build_enrichment_prompt(&idea.idea)).await?;
        parse_enrichment(&content)
    }

    async fn improvement_tips(
        &self,
        submission: &IdeaSubmission,
        nearest: &IdeaRecord,
    ) -> Result<ImprovementTips> {
        let content = self.complete(build_tips_prompt(submission, &nearest.idea)).await?;
        parse_tips(&content)
    }
}

fn describe(idea: &IdeaSubmission) -> String {
    format!(
        "Name: {}\nProblem: {}\nSolution: {}\nAdvantages: {}\nReadiness: {}\nFields: {}",
        idea.name,
        idea.problem.as_deref().unwrap_or(""),
        idea.solution.as_deref().unwrap_or(""),
        idea.advantages.as_deref().unwrap_or(""),
        idea.readiness_level.as_deref().unwrap_or("unspecified"),
        idea.fields.join(", "),
    )
}

fn build_enrichment_prompt(idea: &IdeaSubmission) -> String {
    format!(
        r#"You are helping a founder present a new business idea.

## Idea
{idea}

## Instructions

1. Write a summary of the idea in at most 60 words.
2. Fill a business model canvas with 2-4 short bullet points per section.

Respond with JSON only, in this exact shape:

{{
  "summary": "...",
  "business_model": {{
{sections}
  }}
}}
"#,
        idea = describe(idea),
        sections = CANVAS_SECTIONS
            .iter()
            .map(|s| format!("    \"{}\": [\"...\"]", s))
            .collect::<Vec<_>>()
            .join(",\n"),
    )
}

fn build_tips_prompt(submission: &IdeaSubmission, nearest: &IdeaSubmission) -> String {
    format!(
        r#"A business idea was rejected because it is too similar to an existing one.

## Submitted Idea
{submitted}

## Existing Idea
{existing}

## Instructions

Explain the overlap and suggest how the submitter could differentiate.
Give 2-3 short items per list. Respond with JSON only:

{{
  "why_similar": ["..."],
  "niche_pivots": ["..."],
  "feature_differentiators": ["..."],
  "gtm_strategies": ["..."],
  "risks_and_mitigations": ["..."]
}}
"#,
        submitted = describe(submission),
        existing = describe(nearest),
    )
}

/// Slice from the first `{` to the last `}`; models like to wrap JSON in prose
fn extract_json(content: &str) -> Result<&str> {
    let start = content.find('{').ok_or_else(|| anyhow!("No JSON object in model output"))?;
    let end = content.rfind('}').ok_or_else(|| anyhow!("No JSON object in model output"))?;
    if end < start {
        return Err(anyhow!("Malformed JSON object in model output"));
    }
    Ok(&content[start..=end])
}

fn parse_enrichment(content: &str) -> Result<Enrichment> {
    let parsed: LlmEnrichment = serde_json::from_str(extract_json(content)?)
        .context("Enrichment output is not the expected JSON")?;

    if parsed.summary.trim().is_empty() {
        return Err(anyhow!("Enrichment output has an empty summary"));
    }

    Ok(Enrichment {
        summary: parsed.summary.trim().to_string(),
        business_model: normalize_canvas(parsed.business_model),
    })
}

fn parse_tips(content: &str) -> Result<ImprovementTips> {
    serde_json::from_str(extract_json(content)?)
        .context("Improvement tips output is not the expected JSON")
}

// ============================================================================
// TEMPLATE ENRICHER
// ============================================================================

/// Builds enrichment from the submission's own fields, no network
#[derive(Debug, Clone, Default)]
pub struct TemplateEnricher;

impl Enricher for TemplateEnricher {
    async fn enrich(&self, idea: &IdeaRecord) -> Result<Enrichment> {
        let idea = &idea.idea;
        let problem = idea.problem.as_deref().unwrap_or("").trim();
        let solution = idea.solution.as_deref().unwrap_or("").trim();
        let advantages = idea.advantages.as_deref().unwrap_or("").trim();

        let summary = format!(
            "{} tackles a clear problem: {}. The proposed solution: {}.",
            idea.name,
            problem.trim_end_matches('.'),
            solution.trim_end_matches('.'),
        );

        let mut canvas = empty_canvas();
        let mut put = |section: &str, items: Vec<String>| {
            if let Some(slot) = canvas.get_mut(section) {
                *slot = items.into_iter().filter(|i| !i.is_empty()).collect();
            }
        };
        put("value_propositions", vec![advantages.to_string()]);
        put("key_activities", vec![solution.to_string()]);
        put(
            "customer_segments",
            idea.fields.iter().map(|f| format!("{} market", f.trim())).collect(),
        );

        Ok(Enrichment {
            summary,
            business_model: canvas,
        })
    }

    async fn improvement_tips(
        &self,
        submission: &IdeaSubmission,
        nearest: &IdeaRecord,
    ) -> Result<ImprovementTips> {
        let shared: Vec<&String> = submission
            .fields
            .iter()
            .filter(|f| {
                nearest
                    .idea
                    .fields
                    .iter()
                    .any(|g| g.trim().eq_ignore_ascii_case(f.trim()))
            })
            .collect();

        let mut why_similar = vec![format!(
            "Problem and solution closely match \"{}\"",
            nearest.idea.name
        )];
        why_similar.extend(shared.iter().map(|f| format!("Both target {}", f.trim())));

        Ok(ImprovementTips {
            why_similar,
            niche_pivots: vec![
                "Focus on one underserved customer segment the existing idea ignores".to_string(),
            ],
            feature_differentiators: vec![
                "Name the one capability the existing idea cannot offer".to_string(),
            ],
            gtm_strategies: vec!["Partner with a channel the existing idea does not use".to_string()],
            risks_and_mitigations: vec![
                "Head-on competition; validate demand for the differentiated angle first"
                    .to_string(),
            ],
        })
    }
}

/// Runtime choice between the two enrichers
pub enum AnyEnricher {
    Llm(LlmEnricher),
    Template(TemplateEnricher),
}

impl AnyEnricher {
    /// LLM when an API key is configured, templates otherwise
    pub fn from_config(config: &LlmConfig) -> Self {
        match LlmEnricher::new(config.clone()) {
            Ok(llm) => AnyEnricher::Llm(llm),
            Err(_) => {
                tracing::info!("No LLM API key configured, using template enrichment");
                AnyEnricher::Template(TemplateEnricher)
            }
        }
    }
}

impl Enricher for AnyEnricher {
    async fn enrich(&self, idea: &IdeaRecord) -> Result<Enrichment> {
        match self {
            AnyEnricher::Llm(e) => e.enrich(idea).await,
            AnyEnricher::Template(e) => e.enrich(idea).await,
        }
    }

    async fn improvement_tips(
        &self,
        submission: &IdeaSubmission,
        nearest: &IdeaRecord,
    ) -> Result<ImprovementTips> {
        match self {
            AnyEnricher::Llm(e) => e.improvement_tips(submission, nearest).await,
            AnyEnricher::Template(e) => e.improvement_tips(submission, nearest).await,
        }
    }
}
