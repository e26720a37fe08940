use crate::error::{Error, Result};
use crate::models::test_type::TestType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::FromRow;
use uuid::Uuid;

/// Versioned test configuration row. At most one active row exists per
/// (tenant, config_type); publishing a new one supersedes the prior row.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Configuration {
    pub id: Uuid,
    pub tenant_id: Option<Uuid>,
    pub config_type: String,
    pub scope: String,
    pub config_data: JsonValue,
    pub version: i32,
    pub is_active: bool,
    pub created_by: Option<Uuid>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Settings block shared by both test kinds. Unknown keys are preserved so
/// administrator payloads round-trip untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TestSettings {
    #[serde(rename = "numberOfQuestions", skip_serializing_if = "Option::is_none")]
    pub number_of_questions: Option<usize>,
    #[serde(rename = "followUpCount", skip_serializing_if = "Option::is_none")]
    pub follow_up_count: Option<i64>,
    #[serde(rename = "aiGeneratedQuestions", skip_serializing_if = "Option::is_none")]
    pub ai_generated_questions: Option<i64>,
    #[serde(rename = "aiQuestions", skip_serializing_if = "Option::is_none")]
    pub ai_questions: Option<i64>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, JsonValue>,
}

impl TestSettings {
    /// Declared question count; zero counts as unset, matching how admin
    /// payloads use it.
    pub fn declared_question_count(&self) -> Option<usize> {
        self.number_of_questions.filter(|&n| n > 0)
    }

    /// Per-base-question follow-up budget for SJT attempts. `followUpCount`
    /// wins; the AI question counts are legacy fallbacks. A present zero
    /// means "no follow-ups", only a fully absent chain defaults to 1.
    pub fn follow_up_quota(&self) -> i32 {
        self.follow_up_count
            .or(self.ai_generated_questions)
            .or(self.ai_questions)
            .unwrap_or(1)
            .clamp(0, 5) as i32
    }

    /// Number of AI placeholder questions to append to a JDT set.
    pub fn ai_question_count(&self) -> usize {
        self.ai_generated_questions
            .filter(|&n| n > 0)
            .or(self.ai_questions.filter(|&n| n > 0))
            .unwrap_or(0)
            .max(0) as usize
    }
}

/// A single SJT scenario. Only the identifier is interpreted here; the rest
/// of the payload is carried through to the question snapshot verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SjtScenario {
    pub id: JsonValue,
    #[serde(flatten)]
    pub rest: serde_json::Map<String, JsonValue>,
}

impl SjtScenario {
    /// String form of the identifier, used for restriction matching and
    /// deterministic ordering.
    pub fn id_string(&self) -> String {
        match self.id.as_str() {
            Some(s) => s.to_string(),
            None => self.id.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SjtContent {
    #[serde(default)]
    pub scenarios: Vec<SjtScenario>,
    #[serde(default)]
    pub settings: TestSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JdtQuestion {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(rename = "preferredAnswer", default)]
    pub preferred_answer: Option<String>,
    #[serde(default)]
    pub competency: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JdtRole {
    #[serde(rename = "roleName", default)]
    pub role_name: Option<String>,
    #[serde(default)]
    pub questions: Vec<JdtQuestion>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JdtContent {
    #[serde(default)]
    pub roles: Vec<JdtRole>,
    #[serde(default)]
    pub settings: TestSettings,
}

/// Typed view of the free-form `config_data` payload, keyed by test type.
#[derive(Debug, Clone)]
pub enum ConfigContent {
    Sjt(SjtContent),
    Jdt(JdtContent),
}

impl ConfigContent {
    pub fn parse(test_type: TestType, data: &JsonValue) -> Result<Self> {
        match test_type {
            TestType::Sjt => {
                let content: SjtContent = serde_json::from_value(data.clone())
                    .map_err(|e| Error::Internal(format!("Malformed SJT configuration: {}", e)))?;
                Ok(ConfigContent::Sjt(content))
            }
            TestType::Jdt => {
                let content: JdtContent = serde_json::from_value(data.clone())
                    .map_err(|e| Error::Internal(format!("Malformed JDT configuration: {}", e)))?;
                Ok(ConfigContent::Jdt(content))
            }
        }
    }

    pub fn settings(&self) -> &TestSettings {
        match self {
            ConfigContent::Sjt(c) => &c.settings,
            ConfigContent::Jdt(c) => &c.settings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_sjt_content_and_keeps_scenario_payload() {
        let data = json!({
            "scenarios": [
                {"id": "s1", "prompt": "A teammate misses a deadline", "options": ["a", "b"]},
                {"id": "s2", "prompt": "A client escalates"}
            ],
            "settings": {"numberOfQuestions": 5, "followUpCount": 2}
        });
        let content = ConfigContent::parse(TestType::Sjt, &data).unwrap();
        let ConfigContent::Sjt(sjt) = content else {
            panic!("expected SJT content");
        };
        assert_eq!(sjt.scenarios.len(), 2);
        assert_eq!(sjt.scenarios[0].id_string(), "s1");
        assert_eq!(
            sjt.scenarios[0].rest.get("prompt").and_then(|v| v.as_str()),
            Some("A teammate misses a deadline")
        );
        assert_eq!(sjt.settings.declared_question_count(), Some(5));
        assert_eq!(sjt.settings.follow_up_count, Some(2));
    }

    #[test]
    fn numeric_scenario_ids_stringify() {
        let data = json!({"scenarios": [{"id": 7}], "settings": {}});
        let ConfigContent::Sjt(sjt) = ConfigContent::parse(TestType::Sjt, &data).unwrap() else {
            panic!("expected SJT content");
        };
        assert_eq!(sjt.scenarios[0].id_string(), "7");
    }

    #[test]
    fn parses_jdt_roles_and_ai_fallbacks() {
        let data = json!({
            "roles": [
                {"roleName": "Sales Manager", "questions": [
                    {"text": "Describe a tough negotiation", "preferredAnswer": "Structured", "competency": "Negotiation"}
                ]}
            ],
            "settings": {"aiQuestions": 3}
        });
        let ConfigContent::Jdt(jdt) = ConfigContent::parse(TestType::Jdt, &data).unwrap() else {
            panic!("expected JDT content");
        };
        assert_eq!(jdt.roles[0].role_name.as_deref(), Some("Sales Manager"));
        assert_eq!(jdt.settings.ai_question_count(), 3);

        let data = json!({"roles": [], "settings": {"aiGeneratedQuestions": 2, "aiQuestions": 9}});
        let ConfigContent::Jdt(jdt) = ConfigContent::parse(TestType::Jdt, &data).unwrap() else {
            panic!("expected JDT content");
        };
        // aiGeneratedQuestions wins over aiQuestions
        assert_eq!(jdt.settings.ai_question_count(), 2);
    }

    #[test]
    fn follow_up_quota_chain_and_clamp() {
        let q = |v: JsonValue| -> i32 {
            let s: TestSettings = serde_json::from_value(v).unwrap();
            s.follow_up_quota()
        };
        assert_eq!(q(json!({"followUpCount": 2})), 2);
        assert_eq!(q(json!({"aiGeneratedQuestions": 4})), 4);
        assert_eq!(q(json!({"aiQuestions": 3})), 3);
        // absent everywhere defaults to 1
        assert_eq!(q(json!({})), 1);
        // explicit zero means no follow-ups
        assert_eq!(q(json!({"followUpCount": 0})), 0);
        // clamped to [0, 5]
        assert_eq!(q(json!({"followUpCount": 99})), 5);
        assert_eq!(q(json!({"followUpCount": -3})), 0);
    }

    #[test]
    fn zero_question_count_is_unset() {
        let settings: TestSettings =
            serde_json::from_value(json!({"numberOfQuestions": 0})).unwrap();
        assert_eq!(settings.declared_question_count(), None);
    }

    #[test]
    fn empty_payload_parses_with_defaults() {
        let content = ConfigContent::parse(TestType::Jdt, &json!({})).unwrap();
        let ConfigContent::Jdt(jdt) = content else {
            panic!("expected JDT content");
        };
        assert!(jdt.roles.is_empty());
        assert_eq!(jdt.settings.ai_question_count(), 0);
    }

    #[test]
    fn malformed_payload_is_internal_error() {
        let data = json!({"scenarios": "not-a-list"});
        assert!(ConfigContent::parse(TestType::Sjt, &data).is_err());
    }
}
