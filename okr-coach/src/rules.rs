//! Pure structural and lexical validation of candidate OKR structures.
//!
//! No I/O, no model calls, no hidden state: the same input always yields
//! the same [`ValidationResult`]. Blocking defects go to `errors`,
//! advisory ones to `warnings`.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::{Bounds, RuleConfig};
use crate::types::{Initiative, KeyResult, Objective, PartialOkrSet, Risk, ValidationResult};

static DIGIT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d").unwrap());
static QUANTITATIVE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(\d|percentuale|%|€|\$|numero|totale|quantità)").unwrap());
static CAUSE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bse\b").unwrap());
static EFFECT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\b(allora|rischio)\b").unwrap());

pub struct RuleEngine {
    config: RuleConfig,
}

impl RuleEngine {
    pub fn new(config: RuleConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RuleConfig {
        &self.config
    }

    /// Objectives are qualitative: bounded length, no quantity tokens,
    /// ideally carrying an action verb.
    pub fn validate_objective(&self, objective: &Objective) -> ValidationResult {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        let length = objective.title.chars().count();
        if length > self.config.objective_max_length {
            errors.push(format!(
                "Objective \"{}\" is too long (max {} characters)",
                objective.title, self.config.objective_max_length
            ));
        }
        if length < self.config.objective_min_length {
            errors.push(format!(
                "Objective \"{}\" is too short (min {} characters)",
                objective.title, self.config.objective_min_length
            ));
        }

        let lower = objective.title.to_lowercase();
        let has_forbidden_word = self
            .config
            .forbidden_quantity_words
            .iter()
            .any(|word| lower.contains(&word.to_lowercase()));
        if has_forbidden_word || DIGIT_RE.is_match(&objective.title) {
            errors.push(format!(
                "Objective \"{}\" must not contain numbers or quantities (those belong to Key Results)",
                objective.title
            ));
        }

        let has_action_verb = self
            .config
            .action_verbs
            .iter()
            .any(|verb| lower.contains(verb.as_str()));
        if !has_action_verb {
            warnings.push(format!(
                "Objective \"{}\" should contain an action verb",
                objective.title
            ));
        }

        ValidationResult::from_parts(errors, warnings)
    }

    /// Key results are metric names, quantified and measurable.
    pub fn validate_key_result(&self, key_result: &KeyResult) -> ValidationResult {
        let mut errors = Vec::new();

        if !DIGIT_RE.is_match(&key_result.title) {
            errors.push(format!(
                "Key Result \"{}\" must be quantitative and contain numbers",
                key_result.title
            ));
        }

        if !QUANTITATIVE_RE.is_match(&key_result.title) {
            errors.push(format!(
                "Key Result \"{}\" must be measurable and specific",
                key_result.title
            ));
        }

        let lower = key_result.title.to_lowercase();
        let has_action_verb = self
            .config
            .action_verbs
            .iter()
            .any(|verb| lower.contains(verb.as_str()));
        if has_action_verb {
            errors.push(format!(
                "Key Result \"{}\" must be expressed as a metric name (e.g. \"Produzione giornaliera\", NOT \"Aumentare la produzione giornaliera\")",
                key_result.title
            ));
        }

        ValidationResult::from_parts(errors, Vec::new())
    }

    /// Risks want a detailed description, ideally "se ... allora ...".
    pub fn validate_risk(&self, risk: &Risk) -> ValidationResult {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        if risk.description.trim().chars().count() < self.config.min_risk_description_length {
            errors.push(format!(
                "Risk \"{}\" needs a detailed description",
                risk.title
            ));
        }

        let has_causal_shape =
            CAUSE_RE.is_match(&risk.description) && EFFECT_RE.is_match(&risk.description);
        if !has_causal_shape {
            warnings.push(format!(
                "Risk \"{}\" should be phrased as \"se...allora...\"",
                risk.title
            ));
        }

        ValidationResult::from_parts(errors, warnings)
    }

    /// Initiatives must start with an allow-listed infinitive verb.
    pub fn validate_initiative(&self, initiative: &Initiative) -> ValidationResult {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        let lower = initiative.description.to_lowercase();
        let starts_with_verb = self
            .config
            .initiative_verbs
            .iter()
            .any(|verb| lower.starts_with(&verb.to_lowercase()));
        if !starts_with_verb {
            errors.push(format!(
                "Initiative \"{}\" must start with an infinitive verb (e.g. \"Implementare...\", \"Creare...\")",
                initiative.title
            ));
        }

        if initiative.description.chars().count() < self.config.min_initiative_description_length {
            warnings.push(format!(
                "Initiative \"{}\" should be more specific",
                initiative.title
            ));
        }

        ValidationResult::from_parts(errors, warnings)
    }

    /// Validate a (possibly partial) structure: every present entity is
    /// checked individually, then child counts are checked against the
    /// cardinality table. A collection absent from the set was out of
    /// scope for the run and is skipped entirely - absence is not a
    /// violation. Below-min counts are errors, above-max are warnings.
    pub fn validate_okr_set(&self, set: &PartialOkrSet) -> ValidationResult {
        let mut result = ValidationResult::ok();

        if let Some(objectives) = &set.objectives {
            for objective in objectives {
                result.merge(self.validate_objective(objective));
            }
        }
        if let Some(key_results) = &set.key_results {
            for key_result in key_results {
                result.merge(self.validate_key_result(key_result));
            }
        }
        if let Some(risks) = &set.risks {
            for risk in risks {
                result.merge(self.validate_risk(risk));
            }
        }
        if let Some(initiatives) = &set.initiatives {
            for initiative in initiatives {
                result.merge(self.validate_initiative(initiative));
            }
        }

        if let (Some(objectives), Some(key_results)) = (&set.objectives, &set.key_results) {
            let bounds = self.config.cardinality.key_results_per_objective;
            for objective in objectives {
                let count = key_results
                    .iter()
                    .filter(|kr| kr.objective_id == objective.id)
                    .count();
                Self::check_bounds(
                    &mut result,
                    count,
                    bounds,
                    &format!("Objective \"{}\"", objective.title),
                    "Key Result",
                );
            }
        }

        if let (Some(key_results), Some(risks)) = (&set.key_results, &set.risks) {
            let bounds = self.config.cardinality.risks_per_key_result;
            for key_result in key_results {
                let count = risks
                    .iter()
                    .filter(|risk| risk.key_result_id == key_result.id)
                    .count();
                Self::check_bounds(
                    &mut result,
                    count,
                    bounds,
                    &format!("Key Result \"{}\"", key_result.title),
                    "Risk",
                );
            }
        }

        if let (Some(risks), Some(initiatives)) = (&set.risks, &set.initiatives) {
            let bounds = self.config.cardinality.initiatives_per_risk;
            for risk in risks {
                let count = initiatives
                    .iter()
                    .filter(|init| init.risk_id == risk.id)
                    .count();
                Self::check_bounds(
                    &mut result,
                    count,
                    bounds,
                    &format!("Risk \"{}\"", risk.title),
                    "mitigating Initiative",
                );
            }
        }

        result
    }

    fn check_bounds(
        result: &mut ValidationResult,
        count: usize,
        bounds: Bounds,
        parent: &str,
        child: &str,
    ) {
        if count < bounds.min {
            result.merge(ValidationResult::from_parts(
                vec![format!(
                    "{} must have at least {} {}(s), found {}",
                    parent, bounds.min, child, count
                )],
                Vec::new(),
            ));
        } else if count > bounds.max {
            result.merge(ValidationResult::from_parts(
                Vec::new(),
                vec![format!(
                    "{} has too many {}s (max {}, found {})",
                    parent, child, bounds.max, count
                )],
            ));
        }
    }
}

impl Default for RuleEngine {
    fn default() -> Self {
        Self::new(RuleConfig::default())
    }
}
