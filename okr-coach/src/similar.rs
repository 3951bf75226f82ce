//! Duplicate detection for measurement indicators.
//!
//! Before a new indicator is created, its description is compared against
//! the company's existing catalog through one model call. The model only
//! scores; filtering, ordering and capping happen here.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::OkrError;
use crate::llm::LlmProvider;
use crate::prompts;

/// Scores below this are noise, not candidates.
const SIMILARITY_THRESHOLD: f64 = 0.3;
const MAX_RESULTS: usize = 5;

/// A measurement indicator already registered for a company.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Indicator {
    pub id: String,
    pub description: String,
    /// Unit symbol ("min", "€", "%").
    pub symbol: String,
    /// Sampling cadence ("weekly", "monthly").
    pub periodicity: String,
    /// True when lower readings are better.
    #[serde(default)]
    pub is_reverse: bool,
}

/// Catalog of existing indicators, keyed by company.
#[async_trait]
pub trait IndicatorStore: Send + Sync {
    async fn list_indicators(&self, company_id: &str) -> Result<Vec<Indicator>, OkrError>;
}

/// Map-backed store for tests and single-process deployments.
#[derive(Debug, Default)]
pub struct InMemoryIndicatorStore {
    by_company: HashMap<String, Vec<Indicator>>,
}

impl InMemoryIndicatorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, company_id: impl Into<String>, indicator: Indicator) {
        self.by_company
            .entry(company_id.into())
            .or_default()
            .push(indicator);
    }
}

#[async_trait]
impl IndicatorStore for InMemoryIndicatorStore {
    async fn list_indicators(&self, company_id: &str) -> Result<Vec<Indicator>, OkrError> {
        Ok(self.by_company.get(company_id).cloned().unwrap_or_default())
    }
}

/// One catalog indicator judged similar to the new description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarIndicator {
    pub indicator: Indicator,
    pub score: f64,
    pub reason: String,
}

#[derive(Deserialize)]
struct RawSimilarity {
    id: String,
    score: f64,
    #[serde(default)]
    reason: String,
}

/// Ranks catalog indicators against a new description.
pub struct SimilarityAnalyzer {
    provider: Arc<dyn LlmProvider>,
    store: Arc<dyn IndicatorStore>,
}

impl SimilarityAnalyzer {
    pub fn new(provider: Arc<dyn LlmProvider>, store: Arc<dyn IndicatorStore>) -> Self {
        Self { provider, store }
    }

    /// At most [`MAX_RESULTS`] candidates above [`SIMILARITY_THRESHOLD`],
    /// highest score first. An empty catalog short-circuits without a
    /// model call.
    pub async fn find_similar(
        &self,
        description: &str,
        company_id: &str,
    ) -> Result<Vec<SimilarIndicator>, OkrError> {
        let indicators = self.store.list_indicators(company_id).await?;
        if indicators.is_empty() {
            return Ok(Vec::new());
        }

        let prompt = prompts::build_similar_indicators_prompt(description, &indicators);
        let raw = self.provider.complete(&prompt).await?;
        let scores = parse_similarity_scores(&raw)?;

        let by_id: HashMap<&str, &Indicator> = indicators
            .iter()
            .map(|indicator| (indicator.id.as_str(), indicator))
            .collect();

        let mut matches: Vec<SimilarIndicator> = scores
            .into_iter()
            .filter(|raw| raw.score >= SIMILARITY_THRESHOLD)
            .filter_map(|raw| {
                by_id.get(raw.id.as_str()).map(|indicator| SimilarIndicator {
                    indicator: (*indicator).clone(),
                    score: raw.score,
                    reason: raw.reason,
                })
            })
            .collect();

        matches.sort_by(|a, b| b.score.total_cmp(&a.score));
        matches.truncate(MAX_RESULTS);
        Ok(matches)
    }
}

/// Pull the outermost JSON array out of possibly prose-wrapped output.
fn parse_similarity_scores(raw: &str) -> Result<Vec<RawSimilarity>, OkrError> {
    let start = raw
        .find('[')
        .ok_or_else(|| OkrError::Generic("similarity answer contains no json array".to_string()))?;
    let end = raw
        .rfind(']')
        .ok_or_else(|| OkrError::Generic("similarity answer contains no json array".to_string()))?;
    serde_json::from_str(&raw[start..=end])
        .map_err(|e| OkrError::Generic(format!("malformed similarity answer: {}", e)))
}
