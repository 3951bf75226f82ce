//! Bridge between raw model text and typed [`PartialOkrSet`] structures.
//!
//! Parsing is two-phase: the fenced block goes through `serde_yaml` into a
//! generic value tree first, then an explicit validating projection builds
//! the typed entities, rejecting (never coercing) on a missing or
//! ill-typed field. Any failure here aborts the current generation
//! attempt; the orchestrator decides whether to retry.

use serde::Serialize;
use serde_yaml::Value;

use crate::error::OkrError;
use crate::types::{Category, Initiative, KeyResult, Kpi, Objective, PartialOkrSet, Risk};

const FENCE_OPEN: &str = "```yaml";
const FENCE_CLOSE: &str = "```";

/// Locate the fenced ```yaml block in raw model output.
///
/// Missing fences are the dominant real-world failure mode (prose
/// wrapping, truncated output), reported as
/// [`OkrError::NoStructuredBlockFound`].
pub fn extract_yaml_block(raw: &str) -> Result<&str, OkrError> {
    let start = raw.find(FENCE_OPEN).ok_or(OkrError::NoStructuredBlockFound)?;
    let body = &raw[start + FENCE_OPEN.len()..];
    let body = body.strip_prefix('\n').unwrap_or(body);
    let end = body.find(FENCE_CLOSE).ok_or(OkrError::NoStructuredBlockFound)?;
    Ok(body[..end].trim_end_matches(['\n', ' ']))
}

/// Parse a yaml block into a [`PartialOkrSet`] scoped to the requested
/// categories. A requested category that is missing, not a sequence, or
/// empty is an error; sections for unrequested categories are ignored.
pub fn parse_partial_okr_set(
    block: &str,
    team: &str,
    categories: &[Category],
) -> Result<PartialOkrSet, OkrError> {
    let tree: Value = serde_yaml::from_str(block)
        .map_err(|e| OkrError::Generic(format!("malformed yaml block: {}", e)))?;

    let mapping = tree
        .as_mapping()
        .ok_or_else(|| OkrError::Generic("yaml block is not a mapping".to_string()))?;

    let mut set = PartialOkrSet::empty(team);

    for category in categories {
        let items = section_items(mapping, *category)?;
        match category {
            Category::Objectives => {
                set.objectives = Some(
                    items
                        .iter()
                        .map(project_objective)
                        .collect::<Result<Vec<_>, _>>()?,
                );
            }
            Category::KeyResults => {
                set.key_results = Some(
                    items
                        .iter()
                        .map(project_key_result)
                        .collect::<Result<Vec<_>, _>>()?,
                );
            }
            Category::Risks => {
                set.risks = Some(
                    items
                        .iter()
                        .map(project_risk)
                        .collect::<Result<Vec<_>, _>>()?,
                );
            }
            Category::Kpis => {
                set.kpis = Some(
                    items
                        .iter()
                        .map(project_kpi)
                        .collect::<Result<Vec<_>, _>>()?,
                );
            }
            Category::Initiatives => {
                set.initiatives = Some(
                    items
                        .iter()
                        .map(project_initiative)
                        .collect::<Result<Vec<_>, _>>()?,
                );
            }
        }
    }

    Ok(set)
}

fn section_items(mapping: &serde_yaml::Mapping, category: Category) -> Result<Vec<Value>, OkrError> {
    let key = Value::String(category.wire_name().to_string());
    let section = mapping.get(&key).ok_or(OkrError::MissingRequiredField {
        entity: "payload",
        field: category.wire_name().to_string(),
    })?;
    let items = section
        .as_sequence()
        .ok_or_else(|| OkrError::MissingRequiredField {
            entity: "payload",
            field: category.wire_name().to_string(),
        })?;
    if items.is_empty() {
        return Err(OkrError::Generic(format!(
            "requested category `{}` is present but empty",
            category.wire_name()
        )));
    }
    Ok(items.clone())
}

fn str_field(item: &Value, entity: &'static str, field: &str) -> Result<String, OkrError> {
    item.get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| OkrError::MissingRequiredField {
            entity,
            field: field.to_string(),
        })
}

fn opt_str_field(item: &Value, field: &str) -> Option<String> {
    item.get(field).and_then(Value::as_str).map(str::to_string)
}

/// Enum-valued field with a domain default when absent; a present but
/// unrecognized value is rejected, not coerced.
fn enum_field<T>(item: &Value, entity: &'static str, field: &str) -> Result<T, OkrError>
where
    T: serde::de::DeserializeOwned + Default,
{
    match item.get(field) {
        None => Ok(T::default()),
        Some(value) => {
            serde_yaml::from_value(value.clone()).map_err(|_| OkrError::MissingRequiredField {
                entity,
                field: field.to_string(),
            })
        }
    }
}

fn project_objective(item: &Value) -> Result<Objective, OkrError> {
    Ok(Objective {
        id: str_field(item, "objective", "id")?,
        title: str_field(item, "objective", "title")?,
        description: str_field(item, "objective", "description")?,
    })
}

fn project_key_result(item: &Value) -> Result<KeyResult, OkrError> {
    Ok(KeyResult {
        id: str_field(item, "key_result", "id")?,
        objective_id: str_field(item, "key_result", "objective_id")?,
        title: str_field(item, "key_result", "title")?,
        unit: str_field(item, "key_result", "unit")?,
        forecast: opt_str_field(item, "forecast"),
        moon: opt_str_field(item, "moon"),
    })
}

fn project_risk(item: &Value) -> Result<Risk, OkrError> {
    Ok(Risk {
        id: str_field(item, "risk", "id")?,
        key_result_id: str_field(item, "risk", "key_result_id")?,
        title: str_field(item, "risk", "title")?,
        description: str_field(item, "risk", "description")?,
        probability: enum_field(item, "risk", "probability")?,
        impact: enum_field(item, "risk", "impact")?,
        is_external: item
            .get("is_external")
            .and_then(Value::as_bool)
            .unwrap_or(false),
    })
}

fn project_kpi(item: &Value) -> Result<Kpi, OkrError> {
    Ok(Kpi {
        id: str_field(item, "kpi", "id")?,
        risk_id: str_field(item, "kpi", "risk_id")?,
        title: str_field(item, "kpi", "title")?,
        unit: str_field(item, "kpi", "unit")?,
    })
}

fn project_initiative(item: &Value) -> Result<Initiative, OkrError> {
    Ok(Initiative {
        id: str_field(item, "initiative", "id")?,
        risk_id: str_field(item, "initiative", "risk_id")?,
        title: str_field(item, "initiative", "title")?,
        description: str_field(item, "initiative", "description")?,
        status: enum_field(item, "initiative", "status")?,
        priority: enum_field(item, "initiative", "priority")?,
    })
}

/// Verify foreign keys for every parent/child pair where both categories
/// were requested. Pairs with an out-of-scope side are skipped.
pub fn validate_cross_references(
    set: &PartialOkrSet,
    categories: &[Category],
) -> Result<(), OkrError> {
    let requested = |category: Category| categories.contains(&category);

    if requested(Category::Objectives) && requested(Category::KeyResults) {
        let objective_ids: Vec<&str> = set
            .objectives
            .iter()
            .flatten()
            .map(|o| o.id.as_str())
            .collect();
        for key_result in set.key_results.iter().flatten() {
            if !objective_ids.contains(&key_result.objective_id.as_str()) {
                return Err(OkrError::DanglingReference {
                    child_id: key_result.id.clone(),
                    parent_kind: "objective",
                    parent_id: key_result.objective_id.clone(),
                });
            }
        }
    }

    if requested(Category::KeyResults) && requested(Category::Risks) {
        let key_result_ids: Vec<&str> = set
            .key_results
            .iter()
            .flatten()
            .map(|kr| kr.id.as_str())
            .collect();
        for risk in set.risks.iter().flatten() {
            if !key_result_ids.contains(&risk.key_result_id.as_str()) {
                return Err(OkrError::DanglingReference {
                    child_id: risk.id.clone(),
                    parent_kind: "key result",
                    parent_id: risk.key_result_id.clone(),
                });
            }
        }
    }

    if requested(Category::Risks) {
        let risk_ids: Vec<&str> = set.risks.iter().flatten().map(|r| r.id.as_str()).collect();
        if requested(Category::Kpis) {
            for kpi in set.kpis.iter().flatten() {
                if !risk_ids.contains(&kpi.risk_id.as_str()) {
                    return Err(OkrError::DanglingReference {
                        child_id: kpi.id.clone(),
                        parent_kind: "risk",
                        parent_id: kpi.risk_id.clone(),
                    });
                }
            }
        }
        if requested(Category::Initiatives) {
            for initiative in set.initiatives.iter().flatten() {
                if !risk_ids.contains(&initiative.risk_id.as_str()) {
                    return Err(OkrError::DanglingReference {
                        child_id: initiative.id.clone(),
                        parent_kind: "risk",
                        parent_id: initiative.risk_id.clone(),
                    });
                }
            }
        }
    }

    Ok(())
}

#[derive(Serialize)]
struct YamlDocument<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    objectives: Option<&'a [Objective]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    key_results: Option<&'a [KeyResult]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    risks: Option<&'a [Risk]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    kpis: Option<&'a [Kpi]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    initiatives: Option<&'a [Initiative]>,
}

/// Render a set back into the wire convention, emitting only the
/// collections that are in scope. Inverse of [`parse_partial_okr_set`]
/// for embedding into iteration prompts.
pub fn serialize_to_yaml(set: &PartialOkrSet) -> Result<String, OkrError> {
    let document = YamlDocument {
        objectives: set.objectives.as_deref(),
        key_results: set.key_results.as_deref(),
        risks: set.risks.as_deref(),
        kpis: set.kpis.as_deref(),
        initiatives: set.initiatives.as_deref(),
    };
    serde_yaml::to_string(&document)
        .map_err(|e| OkrError::Generic(format!("yaml serialization failed: {}", e)))
}
