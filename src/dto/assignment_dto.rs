use crate::models::test_assignment::TestAssignment;
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct BulkAssignRequest {
    #[validate(length(min = 1))]
    pub user_ids: Vec<uuid::Uuid>,
    #[validate(length(min = 1))]
    pub test_types: Vec<String>,
    pub due_date: Option<chrono::DateTime<chrono::Utc>>,
    #[validate(range(min = 1, max = 10))]
    pub max_attempts: Option<i32>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
    pub sjt_scenario_ids: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BulkAssignResponse {
    pub created: Vec<AssignmentResponse>,
    pub created_count: usize,
    pub skipped_count: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListAssignmentsQuery {
    pub user_id: Option<uuid::Uuid>,
    pub test_type: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateAssignmentRequest {
    pub status: Option<String>,
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AssignmentResponse {
    pub id: uuid::Uuid,
    pub user_id: uuid::Uuid,
    pub admin_id: Option<uuid::Uuid>,
    pub test_type: String,
    pub status: String,
    pub due_date: Option<chrono::DateTime<chrono::Utc>>,
    pub max_attempts: Option<i32>,
    pub assigned_at: Option<chrono::DateTime<chrono::Utc>>,
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
    pub custom_config: Option<serde_json::Value>,
    pub notes: Option<String>,
}

impl From<TestAssignment> for AssignmentResponse {
    fn from(a: TestAssignment) -> Self {
        Self {
            id: a.id,
            user_id: a.user_id,
            admin_id: a.admin_id,
            test_type: a.test_type,
            status: a.status,
            due_date: a.due_date,
            max_attempts: a.max_attempts,
            assigned_at: a.assigned_at,
            started_at: a.started_at,
            completed_at: a.completed_at,
            custom_config: a.custom_config,
            notes: a.notes,
        }
    }
}
