//! Configuration for the engine.
//!
//! The cardinality bounds live here rather than in the rule engine because
//! the business rule has changed across product revisions; deployments pin
//! the table they want through config.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::OkrError;

/// Supported LLM provider types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProviderType {
    /// Deterministic canned responses, for tests and offline runs.
    Stub,
    /// OpenAI-compatible chat-completions API (OpenAI, OpenRouter).
    OpenAi,
    /// Local OpenAI-compatible endpoint (Ollama and friends).
    Local,
}

/// LLM provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub provider_type: LlmProviderType,
    /// Model name/identifier.
    pub model: String,
    /// API key (can be loaded from env).
    #[serde(default)]
    pub api_key: Option<String>,
    /// Base URL for custom endpoints.
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    /// 0.0 = deterministic, 1.0 = creative.
    #[serde(default)]
    pub temperature: Option<f64>,
    /// Request timeout in seconds.
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider_type: LlmProviderType::Stub,
            model: "stub-model".to_string(),
            api_key: None,
            base_url: None,
            max_tokens: Some(4096),
            temperature: Some(0.7),
            timeout_seconds: None,
        }
    }
}

impl LlmConfig {
    /// Build a config from environment variables. Tries `OPENAI_API_KEY`,
    /// then `OPENROUTER_API_KEY`; falls back to the stub provider when no
    /// key is configured.
    pub fn from_env() -> Self {
        if let Ok(api_key) = std::env::var("OPENAI_API_KEY") {
            return Self {
                provider_type: LlmProviderType::OpenAi,
                model: std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string()),
                api_key: Some(api_key),
                base_url: std::env::var("OPENAI_BASE_URL").ok(),
                ..Self::default()
            };
        }

        if let Ok(api_key) = std::env::var("OPENROUTER_API_KEY") {
            return Self {
                provider_type: LlmProviderType::OpenAi,
                model: std::env::var("OPENROUTER_MODEL")
                    .unwrap_or_else(|_| "anthropic/claude-3-haiku".to_string()),
                api_key: Some(api_key),
                base_url: Some("https://openrouter.ai/api/v1".to_string()),
                ..Self::default()
            };
        }

        Self::default()
    }
}

/// Generation retry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total iteration budget for one `generate` call, first attempt
    /// included.
    pub max_iterations: u32,
    /// Whether correction prompts carry the previous output and the
    /// validation errors back to the model.
    pub send_error_feedback: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_iterations: 3,
            send_error_feedback: true,
        }
    }
}

/// Inclusive child-count bounds for one parent entity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: usize,
    pub max: usize,
}

/// Parent-to-child cardinality table. Below `min` is a blocking error;
/// above `max` is an advisory warning (over-generation is recoverable).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardinalityTable {
    pub key_results_per_objective: Bounds,
    pub risks_per_key_result: Bounds,
    pub initiatives_per_risk: Bounds,
}

impl Default for CardinalityTable {
    fn default() -> Self {
        Self {
            key_results_per_objective: Bounds { min: 1, max: 1 },
            risks_per_key_result: Bounds { min: 1, max: 3 },
            initiatives_per_risk: Bounds { min: 1, max: 3 },
        }
    }
}

/// Lexical and structural rule parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleConfig {
    pub objective_min_length: usize,
    pub objective_max_length: usize,
    /// Quantity tokens forbidden in objective titles.
    pub forbidden_quantity_words: Vec<String>,
    /// Action verbs: expected in objectives (warning when absent),
    /// forbidden in key results (metric names, not action phrases).
    pub action_verbs: Vec<String>,
    /// Infinitive verbs an initiative description may start with.
    pub initiative_verbs: Vec<String>,
    pub min_risk_description_length: usize,
    pub min_initiative_description_length: usize,
    pub cardinality: CardinalityTable,
}

impl Default for RuleConfig {
    fn default() -> Self {
        Self {
            objective_min_length: 10,
            objective_max_length: 100,
            forbidden_quantity_words: [
                "numero",
                "percentuale",
                "%",
                "€",
                "$",
                "quantità",
                "totale",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            action_verbs: [
                "aumentare",
                "migliorare",
                "ridurre",
                "ottimizzare",
                "espandere",
                "consolidare",
                "innovare",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            initiative_verbs: [
                "implementare",
                "creare",
                "sviluppare",
                "definire",
                "stabilire",
                "organizzare",
                "pianificare",
                "avviare",
                "introdurre",
                "migliorare",
                "ottimizzare",
                "automatizzare",
                "monitorare",
                "documentare",
                "formare",
                "addestrare",
                "configurare",
                "installare",
                "aggiornare",
                "verificare",
                "testare",
                "validare",
                "analizzare",
                "chiamare",
                "contattare",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            min_risk_description_length: 10,
            min_initiative_description_length: 15,
            cardinality: CardinalityTable::default(),
        }
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoachConfig {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub rules: RuleConfig,
}

impl CoachConfig {
    /// Load from a TOML file. Missing sections fall back to defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, OkrError> {
        let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            OkrError::Generic(format!(
                "failed to read config {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        toml::from_str(&contents)
            .map_err(|e| OkrError::Generic(format!("failed to parse config: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_retry_budget_is_three() {
        let config = RetryConfig::default();
        assert_eq!(config.max_iterations, 3);
        assert!(config.send_error_feedback);
    }

    #[test]
    fn default_cardinality_matches_latest_rule_table() {
        let table = CardinalityTable::default();
        assert_eq!(table.key_results_per_objective, Bounds { min: 1, max: 1 });
        assert_eq!(table.risks_per_key_result, Bounds { min: 1, max: 3 });
        assert_eq!(table.initiatives_per_risk, Bounds { min: 1, max: 3 });
    }

    #[test]
    fn config_parses_partial_toml() {
        let config: CoachConfig = toml::from_str(
            r#"
            [llm]
            provider_type = "openai"
            model = "gpt-4o-mini"
            api_key = "sk-test"

            [retry]
            max_iterations = 5
            send_error_feedback = false
            "#,
        )
        .unwrap();

        assert_eq!(config.llm.provider_type, LlmProviderType::OpenAi);
        assert_eq!(config.retry.max_iterations, 5);
        // untouched section keeps defaults
        assert_eq!(config.rules.objective_max_length, 100);
    }

    #[test]
    fn config_loads_from_a_toml_file() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "[retry]\nmax_iterations = 2\n\n[rules]\nobjective_max_length = 80\n"
        )
        .unwrap();

        let config = CoachConfig::from_file(file.path()).unwrap();
        assert_eq!(config.retry.max_iterations, 2);
        assert_eq!(config.rules.objective_max_length, 80);
        assert_eq!(config.llm.provider_type, LlmProviderType::Stub);
    }

    #[test]
    fn missing_config_file_is_an_error() {
        let err = CoachConfig::from_file("/nonexistent/coach.toml").unwrap_err();
        assert!(err.to_string().contains("failed to read config"));
    }

    #[test]
    fn cardinality_bounds_are_overridable() {
        let config: CoachConfig = toml::from_str(
            r#"
            [rules.cardinality]
            key_results_per_objective = { min = 3, max = 5 }
            risks_per_key_result = { min = 1, max = 3 }
            initiatives_per_risk = { min = 1, max = 3 }
            "#,
        )
        .unwrap();

        assert_eq!(
            config.rules.cardinality.key_results_per_objective,
            Bounds { min: 3, max: 5 }
        );
    }
}
