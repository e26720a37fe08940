use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::FromRow;
use uuid::Uuid;

/// Default attempt budget applied when an admin creates an assignment.
pub const ASSIGNMENT_MAX_ATTEMPTS_DEFAULT: i32 = 3;

/// Fallback used by the eligibility check when no assignment row exists
/// (admin preview) or the row carries no budget.
pub const MAX_ATTEMPTS_FALLBACK: i32 = 1;

/// An administrator-granted authorization for one candidate to take one
/// test type. Unique per (user_id, test_type).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TestAssignment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub admin_id: Option<Uuid>,
    pub tenant_id: Option<Uuid>,
    pub test_type: String,
    pub due_date: Option<DateTime<Utc>>,
    pub max_attempts: Option<i32>,
    pub status: String,
    pub assigned_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub custom_config: Option<JsonValue>,
    pub notes: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Assignment-level content restriction, stored in `custom_config`.
/// Currently SJT only: pin the attempt to a fixed subset of scenarios.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssignmentRestriction {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sjt_scenario_ids: Option<Vec<String>>,
}

impl TestAssignment {
    pub fn restriction(&self) -> AssignmentRestriction {
        self.custom_config
            .as_ref()
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default()
    }

    pub fn max_attempts_or_default(&self) -> i32 {
        self.max_attempts.unwrap_or(MAX_ATTEMPTS_FALLBACK)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn assignment(custom_config: Option<JsonValue>) -> TestAssignment {
        TestAssignment {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            admin_id: None,
            tenant_id: None,
            test_type: "SJT".into(),
            due_date: None,
            max_attempts: None,
            status: "assigned".into(),
            assigned_at: None,
            started_at: None,
            completed_at: None,
            custom_config,
            notes: None,
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn restriction_reads_scenario_ids() {
        let a = assignment(Some(json!({"sjt_scenario_ids": ["s2", "s1"]})));
        assert_eq!(
            a.restriction().sjt_scenario_ids,
            Some(vec!["s2".to_string(), "s1".to_string()])
        );
    }

    #[test]
    fn missing_or_malformed_custom_config_is_no_restriction() {
        assert!(assignment(None).restriction().sjt_scenario_ids.is_none());
        assert!(assignment(Some(json!("garbage")))
            .restriction()
            .sjt_scenario_ids
            .is_none());
    }

    #[test]
    fn max_attempts_fallback() {
        assert_eq!(assignment(None).max_attempts_or_default(), 1);
        let mut a = assignment(None);
        a.max_attempts = Some(3);
        assert_eq!(a.max_attempts_or_default(), 3);
    }
}
