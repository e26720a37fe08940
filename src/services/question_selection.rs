use crate::models::configuration::{ConfigContent, JdtContent, SjtContent, SjtScenario};
use crate::models::test_assignment::AssignmentRestriction;
use serde_json::{json, Value as JsonValue};
use std::collections::HashSet;

/// Sentinel appended for each configured AI question. Generation happens in
/// a downstream analysis pipeline, never here.
pub const AI_PLACEHOLDER: &str = "AI generated question placeholder";

fn scenario_value(scenario: &SjtScenario) -> JsonValue {
    let mut map = scenario.rest.clone();
    map.insert("id".to_string(), scenario.id.clone());
    JsonValue::Object(map)
}

/// Select the SJT question set served by a new attempt.
///
/// An assignment restriction filters the pool to the named scenario ids,
/// preserving the configuration's ordering, never the restriction list's.
/// Without one, a declared question count below the pool size truncates a
/// copy of the pool sorted by scenario id string, so repeated starts serve
/// the same set.
pub fn select_sjt_questions(
    content: &SjtContent,
    restriction: Option<&AssignmentRestriction>,
) -> Vec<JsonValue> {
    let restricted_ids = restriction
        .and_then(|r| r.sjt_scenario_ids.as_deref())
        .filter(|ids| !ids.is_empty());

    if let Some(ids) = restricted_ids {
        let wanted: HashSet<&str> = ids.iter().map(String::as_str).collect();
        return content
            .scenarios
            .iter()
            .filter(|s| wanted.contains(s.id_string().as_str()))
            .map(scenario_value)
            .collect();
    }

    let mut pool: Vec<&SjtScenario> = content.scenarios.iter().collect();
    let num = content
        .settings
        .declared_question_count()
        .unwrap_or(pool.len());
    if num < pool.len() {
        pool.sort_by_key(|s| s.id_string());
    }
    pool.into_iter().take(num).map(scenario_value).collect()
}

/// Select the JDT question set: the requested role bucket (case-sensitive
/// exact match, first configured role as fallback), manual questions up to
/// the declared count, then the configured number of AI placeholders.
pub fn select_jdt_questions(content: &JdtContent, role_category: Option<&str>) -> Vec<JsonValue> {
    let selected_role = role_category
        .and_then(|rc| {
            content
                .roles
                .iter()
                .find(|r| r.role_name.as_deref() == Some(rc))
        })
        .or_else(|| content.roles.first());

    let manual = selected_role.map(|r| r.questions.as_slice()).unwrap_or(&[]);
    let num = content
        .settings
        .declared_question_count()
        .unwrap_or(manual.len());

    let mut questions: Vec<JsonValue> = manual
        .iter()
        .take(num)
        .map(|q| {
            json!({
                "question": q.text,
                "preferredAnswer": q.preferred_answer,
                "competency": q.competency,
            })
        })
        .collect();

    for _ in 0..content.settings.ai_question_count() {
        questions.push(json!({
            "question": AI_PLACEHOLDER,
            "preferredAnswer": "Evaluate for clarity/relevance",
            "competency": "AI-Assessed",
        }));
    }

    questions
}

/// Number of questions an attempt started right now would serve. Used by
/// the availability check so candidates see the count before starting.
pub fn expected_question_count(
    content: &ConfigContent,
    restriction: Option<&AssignmentRestriction>,
    role_category: Option<&str>,
) -> usize {
    match content {
        ConfigContent::Sjt(sjt) => select_sjt_questions(sjt, restriction).len(),
        ConfigContent::Jdt(jdt) => select_jdt_questions(jdt, role_category).len(),
    }
}
