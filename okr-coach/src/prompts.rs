//! Deterministic prompt rendering for the text-completion dependency.
//!
//! Pure string assembly: no I/O and no provider awareness. Each category
//! owns a fixed rule-text block; builders concatenate only the blocks for
//! the requested categories, always in canonical order. The yaml skeleton
//! emitted here is the wire contract the codec parses - the two must stay
//! in lockstep.

use crate::similar::Indicator;
use crate::types::{Category, GenerationContext};

pub const SYSTEM_PROMPT: &str = "You are a blunt, rigorous OKR coach.\n\
Your job is to help teams define Objectives, Key Results, Risks, KPIs and Initiatives, following the OKR method and the rules below to the letter.\n\
Never produce output that breaks the rules. You are a strict coach and do not compromise on OKR quality.";

const OBJECTIVES_RULES: &str = "\
OBJECTIVES RULES:
1. Objectives must be qualitative, inspirational and carry no deadline (not time-bound).
2. Objectives must NOT contain numbers or quantities (those belong to the Key Results).
3. Briefly justify every element.";

const KEY_RESULTS_RULES: &str = "\
KEY RESULTS RULES:
1. Key Results must be quantitative, measurable and specific (SMART).
2. Exactly 1 Key Result per Objective.
3. Key Results are metric names (e.g. \"Produzione giornaliera\", NOT \"Aumentare la produzione giornaliera\").
4. Briefly justify every element.";

const RISKS_RULES: &str = "\
RISKS RULES:
1. Every Key Result must have 1 to 3 specific Risks threatening its achievement.
2. Phrase each Risk as \"se...allora...\" (if...then...).
3. Briefly justify every element.";

const KPIS_RULES: &str = "\
KPIS RULES:
1. A KPI is an early-warning metric attached to a Risk, signalling that the Risk is materialising.
2. Each KPI names the metric and its unit of measure.
3. Briefly justify every element.";

const INITIATIVES_RULES: &str = "\
INITIATIVES RULES:
1. Initiatives are concrete mitigating actions for the identified Risks.
2. Each Initiative derives directly from a Risk and describes how the action mitigates it.
3. The description of every Initiative MUST start with an infinitive verb (e.g. \"Implementare...\", \"Chiamare...\", \"Creare...\").
4. Briefly justify every element.";

/// Rule blocks for the requested categories, canonical order.
pub fn rules_for_categories(categories: &[Category]) -> String {
    Category::all()
        .iter()
        .filter(|category| categories.contains(category))
        .map(|category| match category {
            Category::Objectives => OBJECTIVES_RULES,
            Category::KeyResults => KEY_RESULTS_RULES,
            Category::Risks => RISKS_RULES,
            Category::Kpis => KPIS_RULES,
            Category::Initiatives => INITIATIVES_RULES,
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// The exact fenced yaml skeleton for the requested categories, with the
/// id naming convention (`obj_N`, `kr_N`, `risk_N`, `kpi_N`, `init_N`).
pub fn yaml_skeleton(categories: &[Category]) -> String {
    let mut sections = Vec::new();

    if categories.contains(&Category::Objectives) {
        sections.push(
            "objectives:\n  - id: \"obj_1\"\n    title: \"Objective title\"\n    description: \"Qualitative, inspirational description\"",
        );
    }
    if categories.contains(&Category::KeyResults) {
        sections.push(
            "key_results:\n  - id: \"kr_1\"\n    objective_id: \"obj_1\"\n    title: \"Key Result title\"\n    unit: \"unit of measure\"",
        );
    }
    if categories.contains(&Category::Risks) {
        sections.push(
            "risks:\n  - id: \"risk_1\"\n    key_result_id: \"kr_1\"\n    title: \"Risk title\"\n    description: \"Risk description\"\n    is_external: false",
        );
    }
    if categories.contains(&Category::Kpis) {
        sections.push(
            "kpis:\n  - id: \"kpi_1\"\n    risk_id: \"risk_1\"\n    title: \"KPI title\"\n    unit: \"unit of measure\"",
        );
    }
    if categories.contains(&Category::Initiatives) {
        sections.push(
            "initiatives:\n  - id: \"init_1\"\n    risk_id: \"risk_1\"\n    title: \"Initiative title\"\n    description: \"Initiative description\"",
        );
    }

    format!("```yaml\n{}\n```", sections.join("\n\n"))
}

fn category_list(categories: &[Category]) -> String {
    Category::all()
        .iter()
        .filter(|category| categories.contains(category))
        .map(|category| category.wire_name())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Prompt for the first generation attempt.
pub fn build_initial_prompt(user_request: &str, context: &GenerationContext) -> String {
    let categories = &context.categories;
    let objective_line = context
        .objective
        .as_deref()
        .map(|objective| format!("- Objective provided by the user: \"{}\"\n", objective))
        .unwrap_or_default();

    format!(
        "{system}\n\n{rules}\n\nContext:\n- Team: {team}\n- Requested categories: {list}\n{objective_line}\nUser request: {request}\n\nIMPORTANT:\n1. If an objective was provided in the context, you MUST use it as the basis for the main Objective, or adapt it while preserving its essence.\n2. Generate ONLY the sections for the requested categories.\n3. For EVERY Key Result you MUST generate at least one associated Risk (when the categories require it).\n4. For EVERY Risk you MUST generate at least one mitigating Initiative (when the categories require it).\n5. NEVER omit Risks or Initiatives when they are among the requested categories.\n6. You MUST use EXACTLY this yaml structure, including ONLY the requested sections:\n\n{skeleton}\n\nATTENTION:\n- Field names MUST be EXACTLY as shown above\n- ALL fields of the included sections are REQUIRED\n- Ids must follow the shown format (obj_X, kr_X, risk_X, kpi_X, init_X)\n- Relationships between elements must use the correct ids\n- Do NOT add extra fields, rename fields, or drop fields\n\nNow generate the OKRs, following the structure and the rules for the requested categories STRICTLY.",
        system = SYSTEM_PROMPT,
        rules = rules_for_categories(categories),
        team = context.team,
        list = category_list(categories),
        objective_line = objective_line,
        request = user_request,
        skeleton = yaml_skeleton(categories),
    )
}

/// Prompt asking the model to revise its previous output in place, given
/// the validation errors it produced.
pub fn build_correction_prompt(
    previous_output: &str,
    errors: &[String],
    categories: &[Category],
) -> String {
    let error_list = errors
        .iter()
        .map(|error| format!("- {}", error))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "{system}\n\n{rules}\n\nThe previous output broke the following rules:\n{error_list}\n\nPrevious output to correct:\n```yaml\n{previous_output}\n```\n\nCorrect the previous output so it strictly satisfies the rules listed above.\nKeep the yaml format and the same structure.\nMake sure every validation error is resolved.\nGenerate ONLY the sections for the requested categories: {list}.",
        system = SYSTEM_PROMPT,
        rules = rules_for_categories(categories),
        error_list = error_list,
        previous_output = previous_output,
        list = category_list(categories),
    )
}

/// Prompt applying a change request to an existing structure while
/// preserving unrelated fields, ids and relationships.
pub fn build_iteration_prompt(
    current_yaml: &str,
    change_request: &str,
    categories: &[Category],
) -> String {
    format!(
        "{system}\n\n{rules}\n\nThe user wants to iterate on these OKRs:\n```yaml\n{current_yaml}\n```\n\nChange request: {change_request}\n\nIMPORTANT:\n1. You MUST keep the same yaml structure and the same field names as the input\n2. You MUST include ALL fields of the requested sections, even the ones you do not modify\n3. Preserve the ids and relationships of elements the change does not touch\n4. For EVERY Key Result there MUST be at least one associated Risk (when the categories require it)\n5. For EVERY Risk there MUST be at least one mitigating Initiative (when the categories require it)\n6. Ids must follow the shown format (obj_X, kr_X, risk_X, kpi_X, init_X)\n7. Generate ONLY the sections for the requested categories: {list}\n\nThe yaml structure MUST be EXACTLY this (requested sections only):\n\n{skeleton}\n\nApply the requested change to the existing OKRs, keeping the rules satisfied and the yaml structure exact.\nNEVER omit a section or field of the requested categories.",
        system = SYSTEM_PROMPT,
        rules = rules_for_categories(categories),
        current_yaml = current_yaml,
        change_request = change_request,
        list = category_list(categories),
        skeleton = yaml_skeleton(categories),
    )
}

/// Prompt classifying which categories a free-form request implies.
/// The model answers with a JSON object carrying per-category confidence.
pub fn build_category_analysis_prompt(user_text: &str) -> String {
    format!(
        "You are an expert OKR framework analyst. Analyze the user's request and decide which elements of the OKR structure are relevant to it.\n\nAVAILABLE OKR CATEGORIES:\n1. OBJECTIVES: qualitative, inspirational goals with no deadline\n2. KEY_RESULTS: quantitative, measurable success metrics\n3. RISKS: obstacles and threats that could prevent reaching the Key Results\n4. KPIS: early-warning metrics signalling that a Risk is materialising\n5. INITIATIVES: concrete mitigating actions for the identified risks\n\nANALYZE THIS USER REQUEST:\n\"{user_text}\"\n\nINSTRUCTIONS:\n1. Analyze the semantic content of the request, not just keywords\n2. Consider the user's context and intent\n3. Decide which OKR categories are relevant to satisfy the request\n4. Give a short explanation for every selected category\n\nRespond ONLY with a JSON object in this exact format:\n\n{{\n  \"categories\": [\"objectives\", \"key_results\", \"risks\", \"kpis\", \"initiatives\"],\n  \"reasoning\": {{\n    \"objectives\": \"short explanation of why they are relevant\"\n  }},\n  \"confidence\": {{\n    \"objectives\": 0.9\n  }}\n}}\n\nNOTES:\n- Include only the categories you consider relevant (empty array if none)\n- Confidence values range from 0.0 to 1.0\n- Leave out categories that are not relevant\n- Keep every explanation concise but clear",
        user_text = user_text,
    )
}

/// Prompt ranking existing indicators by semantic similarity to a new
/// description, for duplicate detection.
pub fn build_similar_indicators_prompt(description: &str, indicators: &[Indicator]) -> String {
    let catalog = indicators
        .iter()
        .map(|indicator| {
            format!(
                "- id: {} | description: {} | symbol: {} | periodicity: {}",
                indicator.id, indicator.description, indicator.symbol, indicator.periodicity
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "You are an expert metrics analyst. Compare a new indicator description against a catalog of existing indicators and score how similar each existing indicator is to the new one.\n\nNEW INDICATOR DESCRIPTION:\n\"{description}\"\n\nEXISTING INDICATORS:\n{catalog}\n\nRespond ONLY with a JSON array, one entry per existing indicator that is at least somewhat similar:\n\n[\n  {{ \"id\": \"indicator id\", \"score\": 0.8, \"reason\": \"short explanation\" }}\n]\n\nNOTES:\n- score ranges from 0.0 (unrelated) to 1.0 (duplicate)\n- Leave out indicators with no meaningful similarity\n- Judge semantic similarity, not word overlap",
        description = description,
        catalog = catalog,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rules_follow_canonical_order_regardless_of_request_order() {
        let rules = rules_for_categories(&[Category::Initiatives, Category::Objectives]);
        let objectives_at = rules.find("OBJECTIVES RULES").unwrap();
        let initiatives_at = rules.find("INITIATIVES RULES").unwrap();
        assert!(objectives_at < initiatives_at);
        assert!(!rules.contains("KEY RESULTS RULES"));
    }

    #[test]
    fn skeleton_contains_only_requested_sections() {
        let skeleton = yaml_skeleton(&[Category::Risks, Category::Initiatives]);
        assert!(skeleton.contains("risks:"));
        assert!(skeleton.contains("initiatives:"));
        assert!(!skeleton.contains("objectives:"));
        assert!(!skeleton.contains("key_results:"));
        assert!(!skeleton.contains("kpis:"));
        assert!(skeleton.starts_with("```yaml\n"));
        assert!(skeleton.ends_with("```"));
    }

    #[test]
    fn initial_prompt_embeds_context_and_seed_objective() {
        let context = GenerationContext::new("Marketing")
            .with_objective("Migliorare la brand awareness")
            .with_categories(vec![Category::Objectives, Category::KeyResults]);
        let prompt = build_initial_prompt("Vogliamo crescere sui social", &context);

        assert!(prompt.contains("Team: Marketing"));
        assert!(prompt.contains("Migliorare la brand awareness"));
        assert!(prompt.contains("Vogliamo crescere sui social"));
        assert!(prompt.contains("objectives, key_results"));
        assert!(prompt.contains("obj_1"));
        assert!(!prompt.contains("risk_1"));
    }

    #[test]
    fn correction_prompt_lists_errors_verbatim() {
        let errors = vec![
            "Objective \"X\" is too short (min 10 characters)".to_string(),
            "Key Result \"Y\" must be quantitative and contain numbers".to_string(),
        ];
        let prompt = build_correction_prompt(
            "objectives: []",
            &errors,
            &[Category::Objectives, Category::KeyResults],
        );
        for error in &errors {
            assert!(prompt.contains(error));
        }
        assert!(prompt.contains("objectives: []"));
    }

    #[test]
    fn iteration_prompt_embeds_current_structure_and_change() {
        let prompt = build_iteration_prompt(
            "risks:\n  - id: \"risk_1\"",
            "Aggiungi un rischio esterno",
            &[Category::Risks],
        );
        assert!(prompt.contains("risk_1"));
        assert!(prompt.contains("Aggiungi un rischio esterno"));
        assert!(prompt.contains("RISKS RULES"));
        assert!(!prompt.contains("OBJECTIVES RULES"));
    }

    #[test]
    fn category_analysis_prompt_requests_json_confidence() {
        let prompt = build_category_analysis_prompt("Voglio capire i rischi del progetto");
        assert!(prompt.contains("Voglio capire i rischi del progetto"));
        assert!(prompt.contains("\"confidence\""));
    }
}
