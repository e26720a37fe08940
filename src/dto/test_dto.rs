use crate::models::test_attempt::TestAttempt;
use crate::services::test_service::{AnswerOutcome, Availability};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Deserialize)]
pub struct AvailabilityQuery {
    pub test_type: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AvailabilityResponse {
    pub test_type: String,
    pub assigned: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignment_status: Option<String>,
    pub can_start: bool,
    pub max_attempts: i32,
    pub attempts_used: i64,
    pub attempts_remaining: i32,
    pub has_in_progress: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_progress_attempt_id: Option<uuid::Uuid>,
    pub configured: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_question_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<chrono::DateTime<chrono::Utc>>,
}

impl From<Availability> for AvailabilityResponse {
    fn from(a: Availability) -> Self {
        Self {
            test_type: a.test_type.as_str().to_string(),
            assigned: a.eligibility.assigned,
            assignment_status: a.eligibility.assignment_status.clone(),
            can_start: a.eligibility.can_start,
            max_attempts: a.eligibility.max_attempts,
            attempts_used: a.eligibility.attempts_used,
            attempts_remaining: a.eligibility.attempts_remaining,
            has_in_progress: a.eligibility.has_in_progress,
            in_progress_attempt_id: a.in_progress_attempt_id,
            configured: a.eligibility.configured,
            expected_question_count: a.expected_question_count,
            due_date: a.due_date,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct StartAttemptRequest {
    pub test_type: String,
    #[validate(length(max = 200))]
    pub role_category: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StartAttemptResponse {
    pub attempt_id: uuid::Uuid,
    pub test_type: String,
    pub attempt_number: i32,
    pub remaining_attempts: i32,
    pub status: String,
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    pub max_questions: Option<i32>,
    pub questions: serde_json::Value,
}

impl StartAttemptResponse {
    pub fn from_attempt(attempt: TestAttempt, remaining_attempts: i32) -> Self {
        Self {
            attempt_id: attempt.id,
            test_type: attempt.test_type,
            attempt_number: attempt.attempt_number,
            remaining_attempts,
            status: attempt.status,
            started_at: attempt.started_at,
            max_questions: attempt.max_questions,
            questions: attempt.questions_snapshot,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SubmitAnswerRequest {
    #[validate(range(min = 0))]
    pub question_index: i32,
    #[serde(default)]
    pub is_follow_up: bool,
    #[validate(range(min = 0))]
    pub base_question_index: Option<i32>,
    #[validate(range(min = 1))]
    pub follow_up_sequence: Option<i32>,
    #[validate(length(min = 1))]
    pub answer_text: String,
    #[validate(range(min = 0))]
    pub duration_seconds: Option<i32>,
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmitAnswerResponse {
    pub stored: bool,
    pub attempt_id: uuid::Uuid,
    pub answer_id: uuid::Uuid,
    pub question_index: i32,
    pub is_follow_up: bool,
    pub base_question_index: i32,
    pub follow_up_sequence: i32,
    pub follow_ups_used: i32,
    pub follow_ups_remaining: i32,
    pub max_follow_ups: i32,
    pub can_generate_follow_up: bool,
    pub submitted_at: chrono::DateTime<chrono::Utc>,
}

impl From<AnswerOutcome> for SubmitAnswerResponse {
    fn from(result: AnswerOutcome) -> Self {
        let o = result.outcome;
        Self {
            stored: true,
            attempt_id: result.attempt_id,
            answer_id: o.record.id,
            question_index: o.record.question_index,
            is_follow_up: o.record.is_follow_up,
            base_question_index: o.record.base_question_index,
            follow_up_sequence: o.record.follow_up_sequence,
            follow_ups_used: o.total_follow_ups_for_base,
            follow_ups_remaining: o.remaining_follow_ups,
            max_follow_ups: o.max_follow_ups,
            can_generate_follow_up: o.can_generate_follow_up,
            submitted_at: o.record.submitted_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CompleteAttemptRequest {
    /// Only "completed" is accepted; cancellation is an administrative
    /// action, not part of this flow.
    pub status: Option<String>,
    pub score: Option<serde_json::Value>,
    pub answers: Option<Vec<serde_json::Value>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AttemptResponse {
    pub id: uuid::Uuid,
    pub user_id: uuid::Uuid,
    pub test_type: String,
    pub assignment_id: Option<uuid::Uuid>,
    pub attempt_number: i32,
    pub status: String,
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
    pub max_questions: Option<i32>,
    pub questions: serde_json::Value,
    pub metadata: serde_json::Value,
}

impl From<TestAttempt> for AttemptResponse {
    fn from(attempt: TestAttempt) -> Self {
        Self {
            id: attempt.id,
            user_id: attempt.user_id,
            test_type: attempt.test_type,
            assignment_id: attempt.assignment_id,
            attempt_number: attempt.attempt_number,
            status: attempt.status,
            started_at: attempt.started_at,
            completed_at: attempt.completed_at,
            max_questions: attempt.max_questions,
            questions: attempt.questions_snapshot,
            metadata: attempt.attempt_metadata,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListAttemptsQuery {
    pub test_type: Option<String>,
    pub status: Option<String>,
}
