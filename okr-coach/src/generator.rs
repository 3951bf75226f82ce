//! Generation orchestrator: prompt, call, parse, validate, repair.
//!
//! One `generate` call owns a bounded iteration budget. Structural
//! failures (no fenced block, missing fields, dangling references) and
//! rule violations both feed a correction prompt back to the model;
//! transport failures abort immediately without consuming the budget.

use std::sync::Arc;

use crate::codec;
use crate::config::RetryConfig;
use crate::error::OkrError;
use crate::llm::{LlmProvider, RetryMetrics, RetryMetricsSummary};
use crate::prompts;
use crate::rules::RuleEngine;
use crate::types::{Category, CategoryAnalysis, GenerationContext, PartialOkrSet, ValidationResult};

/// Result of one `generate` call. `validation` may carry errors when the
/// iteration budget ran out; the caller decides what to do with a
/// best-effort draft.
#[derive(Debug, Clone)]
pub struct GenerationOutcome {
    pub okr_set: PartialOkrSet,
    pub validation: ValidationResult,
    /// Model round-trips actually spent, starting at 1.
    pub iterations: u32,
}

/// Result of one single-shot `iterate` call.
#[derive(Debug, Clone)]
pub struct IterationOutcome {
    pub okr_set: PartialOkrSet,
    pub validation: ValidationResult,
}

#[derive(serde::Deserialize)]
struct RawCategoryAnalysis {
    #[serde(default)]
    categories: Vec<String>,
    #[serde(default)]
    reasoning: std::collections::HashMap<String, String>,
    #[serde(default)]
    confidence: std::collections::HashMap<String, f64>,
}

/// Drives the generation-validation-repair loop against one provider.
pub struct OkrGenerator {
    provider: Arc<dyn LlmProvider>,
    rules: RuleEngine,
    retry: RetryConfig,
    metrics: RetryMetrics,
}

impl OkrGenerator {
    pub fn new(provider: Arc<dyn LlmProvider>, rules: RuleEngine, retry: RetryConfig) -> Self {
        Self {
            provider,
            rules,
            retry,
            metrics: RetryMetrics::default(),
        }
    }

    pub fn metrics(&self) -> RetryMetricsSummary {
        self.metrics.summary()
    }

    /// Generate a draft for `context`, retrying with corrective feedback
    /// until the structure validates or the budget is spent. Returns the
    /// last draft with its validation result even when still invalid;
    /// errors only for transport failures, category misuse, or a
    /// structure that never parsed.
    pub async fn generate(
        &self,
        user_request: &str,
        context: &GenerationContext,
    ) -> Result<GenerationOutcome, OkrError> {
        validate_categories(&context.categories)?;

        let max_iterations = self.retry.max_iterations.max(1);
        let mut prompt = prompts::build_initial_prompt(user_request, context);
        let mut last_error: Option<OkrError> = None;

        for iteration in 1..=max_iterations {
            self.metrics.record_attempt();
            if iteration > 1 {
                self.metrics.record_retry();
            }

            let raw = match self.provider.complete(&prompt).await {
                Ok(raw) => raw,
                Err(e) => {
                    self.metrics.record_failure();
                    return Err(e);
                }
            };

            let block = match codec::extract_yaml_block(&raw) {
                Ok(block) => block.to_string(),
                Err(e) => {
                    log::warn!(
                        "iteration {}/{}: structural failure: {}",
                        iteration,
                        max_iterations,
                        e
                    );
                    last_error = Some(e);
                    if self.retry.send_error_feedback {
                        prompt = self.correction_prompt(&raw, &last_error, context);
                    }
                    continue;
                }
            };

            let set = match codec::parse_partial_okr_set(&block, &context.team, &context.categories)
                .and_then(|set| {
                    codec::validate_cross_references(&set, &context.categories)?;
                    Ok(set)
                }) {
                Ok(set) => set,
                Err(e) => {
                    log::warn!(
                        "iteration {}/{}: structural failure: {}",
                        iteration,
                        max_iterations,
                        e
                    );
                    last_error = Some(e);
                    if self.retry.send_error_feedback {
                        prompt = self.correction_prompt(&block, &last_error, context);
                    }
                    continue;
                }
            };

            let validation = self.rules.validate_okr_set(&set);
            if validation.is_valid {
                self.metrics.record_success();
                return Ok(GenerationOutcome {
                    okr_set: set,
                    validation,
                    iterations: iteration,
                });
            }

            if iteration == max_iterations {
                self.metrics.record_failure();
                log::warn!(
                    "iteration budget spent with {} rule violations remaining",
                    validation.errors.len()
                );
                return Ok(GenerationOutcome {
                    okr_set: set,
                    validation,
                    iterations: iteration,
                });
            }

            log::warn!(
                "iteration {}/{}: {} rule violations, retrying",
                iteration,
                max_iterations,
                validation.errors.len()
            );
            if self.retry.send_error_feedback {
                prompt =
                    prompts::build_correction_prompt(&block, &validation.errors, &context.categories);
            }
        }

        // Reachable only when every iteration failed structurally.
        self.metrics.record_failure();
        Err(last_error.unwrap_or_else(|| {
            OkrError::Generic("generation produced no parseable structure".to_string())
        }))
    }

    fn correction_prompt(
        &self,
        previous_output: &str,
        last_error: &Option<OkrError>,
        context: &GenerationContext,
    ) -> String {
        let errors: Vec<String> = last_error.iter().map(|e| e.to_string()).collect();
        prompts::build_correction_prompt(previous_output, &errors, &context.categories)
    }

    /// Apply a free-form change request to an existing structure. Single
    /// model round-trip: the caller inspects the returned validation and
    /// may call again.
    pub async fn iterate(
        &self,
        current: &PartialOkrSet,
        change_request: &str,
        categories: &[Category],
    ) -> Result<IterationOutcome, OkrError> {
        validate_categories(categories)?;

        let current_yaml = codec::serialize_to_yaml(current)?;
        let prompt = prompts::build_iteration_prompt(&current_yaml, change_request, categories);

        let raw = self.provider.complete(&prompt).await?;
        let block = codec::extract_yaml_block(&raw)?;
        let set = codec::parse_partial_okr_set(block, &current.team, categories)?;
        codec::validate_cross_references(&set, categories)?;

        let validation = self.rules.validate_okr_set(&set);
        Ok(IterationOutcome {
            okr_set: set,
            validation,
        })
    }

    /// Classify which categories a free-form request implies. Never
    /// fails: any provider or parse problem degrades to the all-category
    /// fallback so a generation run can still proceed. A well-formed
    /// answer naming no categories is a real (empty) classification,
    /// not a fallback case.
    pub async fn analyze_categories(&self, user_text: &str) -> CategoryAnalysis {
        let prompt = prompts::build_category_analysis_prompt(user_text);

        let raw = match self.provider.complete(&prompt).await {
            Ok(raw) => raw,
            Err(e) => {
                log::warn!("category analysis unavailable, using fallback: {}", e);
                return CategoryAnalysis::fallback();
            }
        };

        match parse_category_analysis(&raw) {
            Some(analysis) => analysis,
            None => {
                log::warn!("category analysis produced no usable answer, using fallback");
                CategoryAnalysis::fallback()
            }
        }
    }
}

fn validate_categories(categories: &[Category]) -> Result<(), OkrError> {
    if categories.is_empty() {
        return Err(OkrError::InvalidCategoryRequest(
            "at least one category is required".to_string(),
        ));
    }
    for (index, category) in categories.iter().enumerate() {
        if categories[..index].contains(category) {
            return Err(OkrError::InvalidCategoryRequest(format!(
                "duplicate category `{}`",
                category
            )));
        }
    }
    Ok(())
}

/// Pull the outermost JSON object out of possibly prose-wrapped model
/// output and project it onto [`CategoryAnalysis`]. An answer listing
/// only unknown category names is unusable; an explicitly empty list is
/// a valid answer meaning "none apply".
fn parse_category_analysis(raw: &str) -> Option<CategoryAnalysis> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    let parsed: RawCategoryAnalysis = serde_json::from_str(&raw[start..=end]).ok()?;

    let categories: Vec<Category> = parsed
        .categories
        .iter()
        .filter_map(|name| name.parse::<Category>().ok())
        .collect();
    if categories.is_empty() && !parsed.categories.is_empty() {
        return None;
    }

    Some(CategoryAnalysis {
        categories,
        reasoning: parsed.reasoning,
        confidence: parsed.confidence,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuleConfig;
    use crate::error::OkrError;
    use crate::llm::LlmProviderInfo;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct ScriptedProvider {
        responses: Mutex<VecDeque<Result<String, OkrError>>>,
        calls: AtomicUsize,
    }

    impl ScriptedProvider {
        fn new(responses: Vec<Result<String, OkrError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        async fn complete(&self, _prompt: &str) -> Result<String, OkrError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(OkrError::Generic("script exhausted".to_string())))
        }

        fn info(&self) -> LlmProviderInfo {
            LlmProviderInfo {
                name: "scripted".to_string(),
                model: "test".to_string(),
            }
        }
    }

    const VALID_RESPONSE: &str = r#"```yaml
objectives:
  - id: "obj_1"
    title: "Migliorare la soddisfazione dei clienti"
    description: "Offrire un supporto rapido e di qualità"

key_results:
  - id: "kr_1"
    objective_id: "obj_1"
    title: "Tempo medio di risposta sotto i 30 minuti"
    unit: "minuti"
```"#;

    const INVALID_RESPONSE: &str = r#"```yaml
objectives:
  - id: "obj_1"
    title: "Corto"
    description: "Troppo breve per passare"
```"#;

    fn generator(provider: Arc<dyn LlmProvider>) -> OkrGenerator {
        OkrGenerator::new(
            provider,
            RuleEngine::new(RuleConfig::default()),
            RetryConfig::default(),
        )
    }

    fn two_category_context() -> GenerationContext {
        GenerationContext::new("Support")
            .with_categories(vec![Category::Objectives, Category::KeyResults])
    }

    #[tokio::test]
    async fn valid_first_answer_finishes_in_one_iteration() {
        let provider = Arc::new(ScriptedProvider::new(vec![Ok(VALID_RESPONSE.to_string())]));
        let generator = generator(provider.clone());

        let outcome = generator
            .generate("OKR per il supporto clienti", &two_category_context())
            .await
            .unwrap();

        assert_eq!(outcome.iterations, 1);
        assert!(outcome.validation.is_valid);
        assert_eq!(provider.calls(), 1);
        assert_eq!(outcome.okr_set.objectives.as_ref().unwrap().len(), 1);
        assert_eq!(generator.metrics().total_successes, 1);
    }

    #[tokio::test]
    async fn missing_fence_is_repaired_on_the_second_attempt() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Ok("Ecco i tuoi OKR, senza blocco strutturato.".to_string()),
            Ok(VALID_RESPONSE.to_string()),
        ]));
        let generator = generator(provider.clone());

        let outcome = generator
            .generate("OKR per il supporto clienti", &two_category_context())
            .await
            .unwrap();

        assert_eq!(outcome.iterations, 2);
        assert!(outcome.validation.is_valid);
        assert_eq!(provider.calls(), 2);
        assert_eq!(generator.metrics().total_retries, 1);
    }

    #[tokio::test]
    async fn persistent_violations_return_the_last_draft_after_the_budget() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Ok(INVALID_RESPONSE.to_string()),
            Ok(INVALID_RESPONSE.to_string()),
            Ok(INVALID_RESPONSE.to_string()),
        ]));
        let generator = generator(provider.clone());
        let context = GenerationContext::new("Support").with_categories(vec![Category::Objectives]);

        let outcome = generator.generate("OKR", &context).await.unwrap();

        assert_eq!(provider.calls(), 3);
        assert_eq!(outcome.iterations, 3);
        assert!(!outcome.validation.is_valid);
        assert!(!outcome.validation.errors.is_empty());
        assert_eq!(generator.metrics().total_failures, 1);
    }

    #[tokio::test]
    async fn persistent_structural_failures_surface_the_last_error() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Ok("niente yaml".to_string()),
            Ok("ancora niente yaml".to_string()),
            Ok("sempre niente yaml".to_string()),
        ]));
        let generator = generator(provider.clone());
        let context = GenerationContext::new("Support").with_categories(vec![Category::Objectives]);

        let err = generator.generate("OKR", &context).await.unwrap_err();
        assert!(matches!(err, OkrError::NoStructuredBlockFound));
        assert_eq!(provider.calls(), 3);
    }

    #[tokio::test]
    async fn empty_categories_fail_before_any_model_call() {
        let provider = Arc::new(ScriptedProvider::new(vec![Ok(VALID_RESPONSE.to_string())]));
        let generator = generator(provider.clone());
        let context = GenerationContext::new("Support").with_categories(vec![]);

        let err = generator.generate("OKR", &context).await.unwrap_err();
        assert!(matches!(err, OkrError::InvalidCategoryRequest(_)));
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn duplicate_categories_are_rejected() {
        let provider = Arc::new(ScriptedProvider::new(vec![]));
        let generator = generator(provider.clone());
        let context = GenerationContext::new("Support")
            .with_categories(vec![Category::Risks, Category::Risks]);

        let err = generator.generate("OKR", &context).await.unwrap_err();
        assert!(matches!(err, OkrError::InvalidCategoryRequest(_)));
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn transport_failure_aborts_without_retrying() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Err(OkrError::ModelUnavailable("connection refused".to_string())),
            Ok(VALID_RESPONSE.to_string()),
        ]));
        let generator = generator(provider.clone());

        let err = generator
            .generate("OKR", &two_category_context())
            .await
            .unwrap_err();
        assert!(matches!(err, OkrError::ModelUnavailable(_)));
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn iterate_applies_a_change_in_one_round_trip() {
        let provider = Arc::new(ScriptedProvider::new(vec![Ok(VALID_RESPONSE.to_string())]));
        let generator = generator(provider.clone());

        let mut current = PartialOkrSet::empty("Support");
        current.objectives = Some(vec![crate::types::Objective {
            id: "obj_1".to_string(),
            title: "Migliorare la qualità del servizio".to_string(),
            description: "Descrizione".to_string(),
        }]);
        current.key_results = Some(vec![crate::types::KeyResult {
            id: "kr_1".to_string(),
            objective_id: "obj_1".to_string(),
            title: "Tempo di attesa sotto i 5 minuti".to_string(),
            unit: "minuti".to_string(),
            forecast: None,
            moon: None,
        }]);

        let outcome = generator
            .iterate(
                &current,
                "Rendi l'obiettivo più ambizioso",
                &[Category::Objectives, Category::KeyResults],
            )
            .await
            .unwrap();

        assert!(outcome.validation.is_valid);
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn category_analysis_parses_prose_wrapped_json() {
        let provider = Arc::new(ScriptedProvider::new(vec![Ok(
            "Ecco l'analisi richiesta:\n{\"categories\": [\"risks\", \"initiatives\"], \"confidence\": {\"risks\": 0.9}}\nSpero sia utile."
                .to_string(),
        )]));
        let generator = generator(provider);

        let analysis = generator.analyze_categories("Quali rischi corriamo?").await;
        assert_eq!(
            analysis.categories,
            vec![Category::Risks, Category::Initiatives]
        );
        assert_eq!(analysis.confidence.get("risks"), Some(&0.9));
    }

    #[tokio::test]
    async fn category_analysis_falls_back_when_the_model_is_down() {
        let provider = Arc::new(ScriptedProvider::new(vec![Err(
            OkrError::ModelUnavailable("down".to_string()),
        )]));
        let generator = generator(provider);

        let analysis = generator.analyze_categories("Quali rischi corriamo?").await;
        assert_eq!(analysis.categories, Category::all().to_vec());
        assert_eq!(analysis.confidence.get("objectives"), Some(&0.5));
    }

    #[tokio::test]
    async fn category_analysis_preserves_an_explicitly_empty_answer() {
        let provider = Arc::new(ScriptedProvider::new(vec![Ok(
            "{\"categories\": [], \"reasoning\": {}, \"confidence\": {}}".to_string(),
        )]));
        let generator = generator(provider);

        let analysis = generator.analyze_categories("Buongiorno").await;
        assert!(analysis.categories.is_empty());
        assert!(analysis.confidence.is_empty());
    }

    #[tokio::test]
    async fn category_analysis_with_only_unknown_names_falls_back() {
        let provider = Arc::new(ScriptedProvider::new(vec![Ok(
            "{\"categories\": [\"milestones\", \"epics\"]}".to_string(),
        )]));
        let generator = generator(provider);

        let analysis = generator.analyze_categories("Pianifica le milestone").await;
        assert_eq!(analysis.categories, Category::all().to_vec());
    }

    #[tokio::test]
    async fn category_analysis_falls_back_on_garbage_output() {
        let provider = Arc::new(ScriptedProvider::new(vec![Ok(
            "nessun json qui".to_string()
        )]));
        let generator = generator(provider);

        let analysis = generator.analyze_categories("Quali rischi corriamo?").await;
        assert_eq!(analysis.categories, Category::all().to_vec());
    }
}
