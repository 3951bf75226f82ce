use async_trait::async_trait;

use crate::error::OkrError;

use super::provider::{LlmProvider, LlmProviderInfo};

/// Deterministic provider for tests and offline runs. Inspects the prompt
/// to decide which kind of answer is expected and returns canned content
/// that satisfies every rule.
pub struct StubLlmProvider {
    model: String,
}

const OBJECTIVES_SECTION: &str = r#"objectives:
  - id: "obj_1"
    title: "Migliorare la soddisfazione dei clienti"
    description: "Offrire un supporto rapido e di qualità che fidelizzi i clienti""#;

const KEY_RESULTS_SECTION: &str = r#"key_results:
  - id: "kr_1"
    objective_id: "obj_1"
    title: "Tempo medio di risposta sotto i 30 minuti"
    unit: "minuti""#;

const RISKS_SECTION: &str = r#"risks:
  - id: "risk_1"
    key_result_id: "kr_1"
    title: "Carenza di personale"
    description: "Se il team resta sotto organico, allora i tempi di risposta crescono"
    is_external: false"#;

const KPIS_SECTION: &str = r#"kpis:
  - id: "kpi_1"
    risk_id: "risk_1"
    title: "Numero di ticket in attesa"
    unit: "ticket""#;

const INITIATIVES_SECTION: &str = r#"initiatives:
  - id: "init_1"
    risk_id: "risk_1"
    title: "Piano di assunzioni"
    description: "Implementare un piano di assunzioni per il team di supporto""#;

impl StubLlmProvider {
    pub fn new(model: String) -> Self {
        Self { model }
    }

    fn category_analysis_response() -> String {
        r#"{
  "categories": ["objectives", "key_results", "risks", "kpis", "initiatives"],
  "reasoning": {
    "objectives": "the request describes a goal to pursue"
  },
  "confidence": {
    "objectives": 0.9,
    "key_results": 0.8,
    "risks": 0.7,
    "kpis": 0.6,
    "initiatives": 0.7
  }
}"#
        .to_string()
    }

    /// Score the first cataloged indicator high and the rest low, echoing
    /// the ids listed in the prompt.
    fn similarity_response(prompt: &str) -> String {
        let ids: Vec<&str> = prompt
            .lines()
            .filter_map(|line| line.strip_prefix("- id: "))
            .filter_map(|rest| rest.split(" |").next())
            .collect();

        let entries: Vec<String> = ids
            .iter()
            .enumerate()
            .map(|(index, id)| {
                let score = if index == 0 { 0.9 } else { 0.1 };
                format!(
                    "  {{ \"id\": \"{}\", \"score\": {}, \"reason\": \"stub comparison\" }}",
                    id, score
                )
            })
            .collect();

        format!("[\n{}\n]", entries.join(",\n"))
    }

    fn generation_response(prompt: &str) -> String {
        let mut sections = Vec::new();
        if prompt.contains("objectives:") {
            sections.push(OBJECTIVES_SECTION);
        }
        if prompt.contains("key_results:") {
            sections.push(KEY_RESULTS_SECTION);
        }
        if prompt.contains("risks:") {
            sections.push(RISKS_SECTION);
        }
        if prompt.contains("kpis:") {
            sections.push(KPIS_SECTION);
        }
        if prompt.contains("initiatives:") {
            sections.push(INITIATIVES_SECTION);
        }

        format!("```yaml\n{}\n```", sections.join("\n\n"))
    }
}

#[async_trait]
impl LlmProvider for StubLlmProvider {
    async fn complete(&self, prompt: &str) -> Result<String, OkrError> {
        if prompt.contains("expert OKR framework analyst") {
            return Ok(Self::category_analysis_response());
        }
        if prompt.contains("expert metrics analyst") {
            return Ok(Self::similarity_response(prompt));
        }
        Ok(Self::generation_response(prompt))
    }

    fn info(&self) -> LlmProviderInfo {
        LlmProviderInfo {
            name: "stub".to_string(),
            model: self.model.clone(),
        }
    }
}
