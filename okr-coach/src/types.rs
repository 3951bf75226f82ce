//! Core data model for generated OKR structures.
//!
//! Every record here is an immutable value produced by a generation run:
//! an "edit" is a full regeneration that yields a new aggregate. Identity
//! is a string key unique within one run (`obj_1`, `kr_1`, ...).

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::OkrError;

/// Qualitative goal statement. Never quantified, never deadline-bound.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Objective {
    pub id: String,
    pub title: String,
    pub description: String,
}

/// Quantitative metric tied to one [`Objective`]. The title is a metric
/// name ("Produzione giornaliera"), not an action phrase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyResult {
    pub id: String,
    pub objective_id: String,
    pub title: String,
    pub unit: String,
    /// Expected end-of-period value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forecast: Option<String>,
    /// Stretch ("moonshot") value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub moon: Option<String>,
}

/// Three-level rating, used for risk probability/impact and initiative
/// priority. Defaults to `Medium` when the model leaves it out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    #[default]
    Medium,
    High,
}

/// Lifecycle state of a mitigating [`Initiative`]. Freshly generated
/// initiatives start at `NotStarted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitiativeStatus {
    #[default]
    NotStarted,
    InProgress,
    Completed,
}

/// A threat to a [`KeyResult`]'s achievement, ideally phrased as
/// "se ... allora ...".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Risk {
    pub id: String,
    pub key_result_id: String,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub probability: Severity,
    #[serde(default)]
    pub impact: Severity,
    #[serde(default)]
    pub is_external: bool,
}

impl Risk {
    /// The two flags are mutually exclusive, so only one is stored.
    pub fn is_internal(&self) -> bool {
        !self.is_external
    }
}

/// Early-warning threshold metric attached to a [`Risk`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Kpi {
    pub id: String,
    pub risk_id: String,
    pub title: String,
    pub unit: String,
}

/// Concrete mitigating action for a [`Risk`]. The description starts with
/// an infinitive-form verb ("Implementare...", "Creare...").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Initiative {
    pub id: String,
    pub risk_id: String,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub status: InitiativeStatus,
    #[serde(default)]
    pub priority: Severity,
}

/// Generation scope selector. Canonical order is the declaration order
/// below; prompt rule blocks and payload sections always follow it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Objectives,
    KeyResults,
    Risks,
    Kpis,
    Initiatives,
}

impl Category {
    pub fn all() -> &'static [Category] {
        &[
            Category::Objectives,
            Category::KeyResults,
            Category::Risks,
            Category::Kpis,
            Category::Initiatives,
        ]
    }

    /// Top-level key of this category's section in the yaml payload.
    pub fn wire_name(&self) -> &'static str {
        match self {
            Category::Objectives => "objectives",
            Category::KeyResults => "key_results",
            Category::Risks => "risks",
            Category::Kpis => "kpis",
            Category::Initiatives => "initiatives",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

impl FromStr for Category {
    type Err = OkrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "objectives" => Ok(Category::Objectives),
            "key_results" => Ok(Category::KeyResults),
            "risks" => Ok(Category::Risks),
            "kpis" => Ok(Category::Kpis),
            "initiatives" => Ok(Category::Initiatives),
            other => Err(OkrError::InvalidCategoryRequest(format!(
                "unknown category `{}`",
                other
            ))),
        }
    }
}

/// Caller-supplied context for a generation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationContext {
    pub team: String,
    /// Seed objective text the model must honor when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub objective: Option<String>,
    pub categories: Vec<Category>,
}

impl GenerationContext {
    /// Context scoped to all five categories.
    pub fn new(team: impl Into<String>) -> Self {
        Self {
            team: team.into(),
            objective: None,
            categories: Category::all().to_vec(),
        }
    }

    pub fn with_categories(mut self, categories: Vec<Category>) -> Self {
        self.categories = categories;
        self
    }

    pub fn with_objective(mut self, objective: impl Into<String>) -> Self {
        self.objective = Some(objective.into());
        self
    }
}

/// Aggregate root owning all generated entities. No child is shared
/// across sets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OkrSet {
    pub id: String,
    pub team: String,
    pub objectives: Vec<Objective>,
    pub key_results: Vec<KeyResult>,
    pub risks: Vec<Risk>,
    pub kpis: Vec<Kpi>,
    pub initiatives: Vec<Initiative>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OkrSet {
    pub fn to_partial(&self) -> PartialOkrSet {
        PartialOkrSet {
            id: self.id.clone(),
            team: self.team.clone(),
            objectives: Some(self.objectives.clone()),
            key_results: Some(self.key_results.clone()),
            risks: Some(self.risks.clone()),
            kpis: Some(self.kpis.clone()),
            initiatives: Some(self.initiatives.clone()),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Category-scoped aggregate. An absent collection means the category was
/// not in scope for the run - distinct from present-but-empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartialOkrSet {
    pub id: String,
    pub team: String,
    pub objectives: Option<Vec<Objective>>,
    pub key_results: Option<Vec<KeyResult>>,
    pub risks: Option<Vec<Risk>>,
    pub kpis: Option<Vec<Kpi>>,
    pub initiatives: Option<Vec<Initiative>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PartialOkrSet {
    /// Fresh partial set with every collection absent.
    pub fn empty(team: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: format!("okr_{}", uuid::Uuid::new_v4()),
            team: team.into(),
            objectives: None,
            key_results: None,
            risks: None,
            kpis: None,
            initiatives: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Promote to a full set; absent collections become empty ones.
    pub fn into_okr_set(self) -> OkrSet {
        OkrSet {
            id: self.id,
            team: self.team,
            objectives: self.objectives.unwrap_or_default(),
            key_results: self.key_results.unwrap_or_default(),
            risks: self.risks.unwrap_or_default(),
            kpis: self.kpis.unwrap_or_default(),
            initiatives: self.initiatives.unwrap_or_default(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Outcome of rule validation. `is_valid` tracks errors only; warnings
/// are advisory and never block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn ok() -> Self {
        Self {
            is_valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn from_parts(errors: Vec<String>, warnings: Vec<String>) -> Self {
        Self {
            is_valid: errors.is_empty(),
            errors,
            warnings,
        }
    }

    pub fn merge(&mut self, other: ValidationResult) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
        self.is_valid = self.errors.is_empty();
    }
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self::ok()
    }
}

/// Best-effort classification of which categories a free-form request
/// implies, with per-category confidence in [0, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryAnalysis {
    pub categories: Vec<Category>,
    #[serde(default)]
    pub reasoning: HashMap<String, String>,
    #[serde(default)]
    pub confidence: HashMap<String, f64>,
}

impl CategoryAnalysis {
    /// Conservative fallback when the classifier is unavailable: every
    /// category at confidence 0.5.
    pub fn fallback() -> Self {
        let mut confidence = HashMap::new();
        for category in Category::all() {
            confidence.insert(category.wire_name().to_string(), 0.5);
        }
        Self {
            categories: Category::all().to_vec(),
            reasoning: HashMap::new(),
            confidence,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_round_trips_through_wire_name() {
        for category in Category::all() {
            assert_eq!(category.wire_name().parse::<Category>().unwrap(), *category);
        }
    }

    #[test]
    fn unknown_category_is_rejected() {
        let err = "milestones".parse::<Category>().unwrap_err();
        assert!(matches!(err, OkrError::InvalidCategoryRequest(_)));
    }

    #[test]
    fn validation_result_tracks_errors_only() {
        let result = ValidationResult::from_parts(vec![], vec!["advisory".to_string()]);
        assert!(result.is_valid);

        let result = ValidationResult::from_parts(vec!["blocking".to_string()], vec![]);
        assert!(!result.is_valid);
    }

    #[test]
    fn merge_recomputes_validity() {
        let mut result = ValidationResult::ok();
        result.merge(ValidationResult::from_parts(
            vec!["broken".to_string()],
            vec![],
        ));
        assert!(!result.is_valid);
        assert_eq!(result.errors.len(), 1);
    }

    #[test]
    fn partial_set_promotes_absent_collections_to_empty() {
        let set = PartialOkrSet::empty("Support").into_okr_set();
        assert!(set.objectives.is_empty());
        assert!(set.kpis.is_empty());
    }

    #[test]
    fn internal_flag_is_negation_of_external() {
        let risk = Risk {
            id: "risk_1".to_string(),
            key_result_id: "kr_1".to_string(),
            title: "Carenza di personale".to_string(),
            description: "Se il team resta sotto organico, allora i tempi crescono".to_string(),
            probability: Severity::default(),
            impact: Severity::default(),
            is_external: false,
        };
        assert!(risk.is_internal());
    }

    #[test]
    fn severity_and_status_default_to_medium_and_not_started() {
        assert_eq!(Severity::default(), Severity::Medium);
        assert_eq!(InitiativeStatus::default(), InitiativeStatus::NotStarted);
    }
}
