use crate::error::{is_unique_violation, Error, Result};
use crate::middleware::auth::CurrentUser;
use crate::models::configuration::{ConfigContent, Configuration};
use crate::models::test_assignment::{TestAssignment, MAX_ATTEMPTS_FALLBACK};
use crate::models::test_attempt::{status, AttemptMetadata, LedgerOutcome, NewAnswer, TestAttempt};
use crate::models::test_type::TestType;
use crate::services::assignment_service::AssignmentService;
use crate::services::configuration_service::ConfigurationService;
use crate::services::question_selection;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Clone)]
pub struct TestService {
    pool: PgPool,
    configurations: ConfigurationService,
    assignments: AssignmentService,
}

/// Sentinel status reported to admin callers, who bypass assignment gating
/// to try configurations out.
pub const PREVIEW_STATUS: &str = "admin_preview";

/// Eligibility verdict for one (user, test type), computed from the
/// assignment row, the active configuration and the attempt history. Pure so
/// the gating rules are testable without a database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Eligibility {
    pub assigned: bool,
    pub assignment_status: Option<String>,
    pub configured: bool,
    pub max_attempts: i32,
    pub attempts_used: i64,
    pub attempts_remaining: i32,
    pub has_in_progress: bool,
    pub can_start: bool,
}

/// Admin callers always preview as assigned with the sentinel status and the
/// fallback attempt budget, even when an assignment row happens to exist for
/// them. Candidates without a row are not eligible.
pub fn compute_eligibility(
    assignment: Option<&TestAssignment>,
    admin_preview: bool,
    configured: bool,
    completed_attempts: i64,
    has_in_progress: bool,
) -> Eligibility {
    let (assigned, assignment_status, max_attempts) = if admin_preview {
        (
            true,
            Some(PREVIEW_STATUS.to_string()),
            MAX_ATTEMPTS_FALLBACK,
        )
    } else {
        match assignment {
            Some(a) => (true, Some(a.status.clone()), a.max_attempts_or_default()),
            None => (false, None, MAX_ATTEMPTS_FALLBACK),
        }
    };
    let attempts_remaining = (max_attempts as i64 - completed_attempts).max(0) as i32;
    let can_start = assigned && configured && attempts_remaining > 0 && !has_in_progress;
    Eligibility {
        assigned,
        assignment_status,
        configured,
        max_attempts,
        attempts_used: completed_attempts,
        attempts_remaining,
        has_in_progress,
        can_start,
    }
}

#[derive(Debug, Clone)]
pub struct Availability {
    pub test_type: TestType,
    pub eligibility: Eligibility,
    pub expected_question_count: Option<usize>,
    pub in_progress_attempt_id: Option<Uuid>,
    pub due_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
pub struct AttemptFilter {
    pub test_type: Option<String>,
    pub status: Option<String>,
}

pub struct AnswerOutcome {
    pub attempt_id: Uuid,
    pub outcome: LedgerOutcome,
}

impl TestService {
    pub fn new(
        pool: PgPool,
        configurations: ConfigurationService,
        assignments: AssignmentService,
    ) -> Self {
        Self {
            pool,
            configurations,
            assignments,
        }
    }

    async fn completed_attempt_count(&self, user_id: Uuid, test_type: TestType) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"SELECT COUNT(*) FROM test_attempts
               WHERE user_id = $1 AND test_type = $2 AND status = $3"#,
        )
        .bind(user_id)
        .bind(test_type.as_str())
        .bind(status::COMPLETED)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn in_progress_attempt(
        &self,
        user_id: Uuid,
        test_type: TestType,
    ) -> Result<Option<TestAttempt>> {
        let attempt = sqlx::query_as::<_, TestAttempt>(
            r#"SELECT * FROM test_attempts
               WHERE user_id = $1 AND test_type = $2 AND status = $3
               ORDER BY started_at DESC LIMIT 1"#,
        )
        .bind(user_id)
        .bind(test_type.as_str())
        .bind(status::IN_PROGRESS)
        .fetch_optional(&self.pool)
        .await?;
        Ok(attempt)
    }

    async fn evaluate_eligibility(
        &self,
        current_user: &CurrentUser,
        test_type: TestType,
    ) -> Result<(
        Eligibility,
        Option<TestAssignment>,
        Option<TestAttempt>,
        Option<Configuration>,
    )> {
        let config = self
            .configurations
            .resolve_active(current_user.tenant_id, test_type)
            .await?;

        // admins preview without assignment gating, so their rows (if any)
        // are never consulted
        let mut assignment = None;
        if !current_user.is_admin() {
            assignment = self
                .assignments
                .find_for_user(current_user.id, test_type)
                .await?;

            // opt-in convenience: a configured test checked by an unassigned
            // candidate gets its assignment created on the spot
            if assignment.is_none()
                && config.is_some()
                && crate::config::get_config().auto_assign_on_availability
            {
                assignment = self.assignments.auto_assign(current_user, test_type).await?;
            }
        }

        let completed = self
            .completed_attempt_count(current_user.id, test_type)
            .await?;
        let in_progress = self.in_progress_attempt(current_user.id, test_type).await?;

        let eligibility = compute_eligibility(
            assignment.as_ref(),
            current_user.is_admin(),
            config.is_some(),
            completed,
            in_progress.is_some(),
        );
        Ok((eligibility, assignment, in_progress, config))
    }

    /// Read-only availability check: the eligibility verdict plus a preview
    /// of the question count an attempt started now would serve.
    pub async fn get_availability(
        &self,
        current_user: &CurrentUser,
        test_type: TestType,
    ) -> Result<Availability> {
        let (eligibility, assignment, in_progress, config) =
            self.evaluate_eligibility(current_user, test_type).await?;

        let expected_question_count = match &config {
            Some(cfg) => {
                let content = ConfigContent::parse(test_type, &cfg.config_data)?;
                let restriction = assignment.as_ref().map(|a| a.restriction());
                Some(question_selection::expected_question_count(
                    &content,
                    restriction.as_ref(),
                    None,
                ))
            }
            None => None,
        };

        tracing::info!(
            user_id = %current_user.id,
            test_type = %test_type,
            can_start = eligibility.can_start,
            attempts_used = eligibility.attempts_used,
            "availability checked"
        );

        Ok(Availability {
            test_type,
            eligibility,
            expected_question_count,
            in_progress_attempt_id: in_progress.map(|a| a.id),
            due_date: assignment.and_then(|a| a.due_date),
        })
    }

    /// Start a new attempt: re-check eligibility, snapshot the question set
    /// and the configuration provenance, and claim the next attempt number.
    /// The unique (user, type, number) index is the backstop against two
    /// concurrent starts claiming the same slot.
    pub async fn start_attempt(
        &self,
        current_user: &CurrentUser,
        test_type: TestType,
        role_category: Option<String>,
    ) -> Result<(TestAttempt, i32)> {
        let (eligibility, assignment, _, config) =
            self.evaluate_eligibility(current_user, test_type).await?;
        if !eligibility.can_start {
            return Err(Error::Forbidden("Cannot start this test".to_string()));
        }

        // can_start implies a configuration existed a moment ago; treat the
        // race window as exceptional rather than defaulting
        let config =
            config.ok_or_else(|| Error::Internal("Configuration missing".to_string()))?;
        let content = ConfigContent::parse(test_type, &config.config_data)?;

        let restriction = assignment.as_ref().map(|a| a.restriction());
        let questions = match &content {
            ConfigContent::Sjt(sjt) => {
                question_selection::select_sjt_questions(sjt, restriction.as_ref())
            }
            ConfigContent::Jdt(jdt) => {
                question_selection::select_jdt_questions(jdt, role_category.as_deref())
            }
        };

        let attempt_number = self.next_attempt_number(current_user.id, test_type).await?;
        let metadata = initial_metadata(&config, role_category);

        let attempt = sqlx::query_as::<_, TestAttempt>(
            r#"INSERT INTO test_attempts
                   (user_id, test_type, assignment_id, attempt_number, status,
                    started_at, max_questions, questions_snapshot, attempt_metadata)
               VALUES ($1, $2, $3, $4, $5, NOW(), $6, $7, $8)
               RETURNING *"#,
        )
        .bind(current_user.id)
        .bind(test_type.as_str())
        .bind(assignment.as_ref().map(|a| a.id))
        .bind(attempt_number)
        .bind(status::IN_PROGRESS)
        .bind(questions.len() as i32)
        .bind(JsonValue::Array(questions))
        .bind(serde_json::to_value(&metadata)?)
        .fetch_one(&self.pool)
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                Error::Conflict("An attempt is already being started".to_string())
            } else {
                err.into()
            }
        })?;

        if let Some(a) = &assignment {
            if a.status == "assigned" {
                sqlx::query(
                    r#"UPDATE test_assignments
                       SET status = 'started', started_at = NOW(), updated_at = NOW()
                       WHERE id = $1 AND status = 'assigned'"#,
                )
                .bind(a.id)
                .execute(&self.pool)
                .await?;
            }
        }

        let remaining = (eligibility.max_attempts - attempt_number).max(0);
        tracing::info!(
            attempt_id = %attempt.id,
            user_id = %current_user.id,
            test_type = %test_type,
            attempt_number,
            "attempt started"
        );
        Ok((attempt, remaining))
    }

    async fn next_attempt_number(&self, user_id: Uuid, test_type: TestType) -> Result<i32> {
        let total: i64 = sqlx::query_scalar(
            r#"SELECT COUNT(*) FROM test_attempts WHERE user_id = $1 AND test_type = $2"#,
        )
        .bind(user_id)
        .bind(test_type.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(total as i32 + 1)
    }

    async fn load_owned_attempt(
        &self,
        current_user: &CurrentUser,
        attempt_id: Uuid,
    ) -> Result<TestAttempt> {
        let attempt =
            sqlx::query_as::<_, TestAttempt>(r#"SELECT * FROM test_attempts WHERE id = $1"#)
                .bind(attempt_id)
                .fetch_optional(&self.pool)
                .await?
                .ok_or_else(|| Error::NotFound("Test attempt not found".to_string()))?;

        authorize_attempt_access(&attempt, current_user)?;
        Ok(attempt)
    }

    /// Record one answer against an in-progress attempt and settle the
    /// follow-up ledger. The whole metadata document is rewritten in a single
    /// update, so a read never observes a half-applied submission.
    pub async fn submit_answer(
        &self,
        current_user: &CurrentUser,
        attempt_id: Uuid,
        answer: NewAnswer,
    ) -> Result<AnswerOutcome> {
        let attempt = self.load_owned_attempt(current_user, attempt_id).await?;
        if !attempt.is_in_progress() {
            return Err(Error::Conflict(
                "Attempt is not accepting answers".to_string(),
            ));
        }

        let test_type = TestType::parse(&attempt.test_type)?;
        let quota = self.follow_up_quota(current_user, test_type).await?;

        let mut metadata = attempt.metadata();
        let outcome = metadata.record_answer(answer, quota, Utc::now());

        sqlx::query(
            r#"UPDATE test_attempts SET attempt_metadata = $1, updated_at = NOW() WHERE id = $2"#,
        )
        .bind(serde_json::to_value(&metadata)?)
        .bind(attempt.id)
        .execute(&self.pool)
        .await?;

        Ok(AnswerOutcome {
            attempt_id: attempt.id,
            outcome,
        })
    }

    /// Follow-up budget per base question, driven by the currently active
    /// configuration. A republish mid-attempt changes the budget for
    /// subsequent submissions. Interview-style follow-ups exist for SJT only.
    async fn follow_up_quota(
        &self,
        current_user: &CurrentUser,
        test_type: TestType,
    ) -> Result<i32> {
        if test_type == TestType::Jdt {
            return Ok(0);
        }
        let config = self
            .configurations
            .resolve_active(current_user.tenant_id, test_type)
            .await?;
        let quota = match config {
            Some(cfg) => ConfigContent::parse(test_type, &cfg.config_data)?
                .settings()
                .follow_up_quota(),
            None => 0,
        };
        Ok(quota)
    }

    /// Finalize an attempt. A second call conflicts instead of silently
    /// rescoring.
    pub async fn complete_attempt(
        &self,
        current_user: &CurrentUser,
        attempt_id: Uuid,
        score: Option<JsonValue>,
        answers: Option<Vec<JsonValue>>,
    ) -> Result<TestAttempt> {
        let attempt = self.load_owned_attempt(current_user, attempt_id).await?;
        if !attempt.is_in_progress() {
            return Err(Error::Conflict("Attempt already finalized".to_string()));
        }

        let mut metadata = attempt.metadata();
        metadata.apply_completion(score, answers.as_deref());

        // status guard in the WHERE clause settles the race between two
        // concurrent completion calls
        let updated = sqlx::query_as::<_, TestAttempt>(
            r#"UPDATE test_attempts
               SET status = $1, completed_at = NOW(), attempt_metadata = $2, updated_at = NOW()
               WHERE id = $3 AND status = $4
               RETURNING *"#,
        )
        .bind(status::COMPLETED)
        .bind(serde_json::to_value(&metadata)?)
        .bind(attempt.id)
        .bind(status::IN_PROGRESS)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::Conflict("Attempt already finalized".to_string()))?;

        if let Some(assignment_id) = updated.assignment_id {
            sqlx::query(
                r#"UPDATE test_assignments
                   SET status = 'completed', completed_at = NOW(), updated_at = NOW()
                   WHERE id = $1"#,
            )
            .bind(assignment_id)
            .execute(&self.pool)
            .await?;
        }

        tracing::info!(
            attempt_id = %updated.id,
            user_id = %current_user.id,
            attempt_number = updated.attempt_number,
            "attempt completed"
        );
        Ok(updated)
    }

    pub async fn get_attempt(
        &self,
        current_user: &CurrentUser,
        attempt_id: Uuid,
    ) -> Result<TestAttempt> {
        self.load_owned_attempt(current_user, attempt_id).await
    }

    pub async fn list_attempts(
        &self,
        current_user: &CurrentUser,
        filter: AttemptFilter,
    ) -> Result<Vec<TestAttempt>> {
        let test_type = match filter.test_type {
            Some(raw) => Some(TestType::parse(&raw)?.as_str().to_string()),
            None => None,
        };
        let rows = sqlx::query_as::<_, TestAttempt>(
            r#"SELECT * FROM test_attempts
               WHERE user_id = $1
                 AND ($2::text IS NULL OR test_type = $2)
                 AND ($3::text IS NULL OR status = $3)
               ORDER BY started_at DESC
               LIMIT 100"#,
        )
        .bind(current_user.id)
        .bind(test_type)
        .bind(filter.status)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

fn initial_metadata(config: &Configuration, role_category: Option<String>) -> AttemptMetadata {
    AttemptMetadata {
        config_id: Some(config.id),
        config_version: Some(config.version),
        role_category,
        ..Default::default()
    }
}

/// Candidates may only touch their own attempts; admin roles may operate on
/// any attempt (the scoring pipeline completes candidate attempts with an
/// admin principal).
fn authorize_attempt_access(attempt: &TestAttempt, user: &CurrentUser) -> Result<()> {
    if attempt.user_id != user.id && !user.is_admin() {
        return Err(Error::Forbidden("Access denied".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::auth::roles;
    use serde_json::json;

    fn user(role: &str) -> CurrentUser {
        CurrentUser {
            id: Uuid::new_v4(),
            role: role.to_string(),
            tenant_id: None,
        }
    }

    fn attempt_owned_by(user_id: Uuid) -> TestAttempt {
        TestAttempt {
            id: Uuid::new_v4(),
            user_id,
            test_type: "SJT".into(),
            assignment_id: None,
            attempt_number: 1,
            status: status::IN_PROGRESS.into(),
            started_at: None,
            completed_at: None,
            max_questions: Some(3),
            questions_snapshot: json!([]),
            attempt_metadata: json!({}),
            created_at: None,
            updated_at: None,
        }
    }

    fn assignment(max_attempts: Option<i32>) -> TestAssignment {
        TestAssignment {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            admin_id: None,
            tenant_id: None,
            test_type: "SJT".into(),
            due_date: None,
            max_attempts,
            status: "assigned".into(),
            assigned_at: None,
            started_at: None,
            completed_at: None,
            custom_config: None,
            notes: None,
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn unassigned_candidate_cannot_start() {
        let e = compute_eligibility(None, false, true, 0, false);
        assert!(!e.assigned);
        assert!(e.assignment_status.is_none());
        assert!(!e.can_start);
        assert_eq!(e.max_attempts, MAX_ATTEMPTS_FALLBACK);
    }

    #[test]
    fn admin_preview_counts_as_assigned() {
        let e = compute_eligibility(None, true, true, 0, false);
        assert!(e.assigned);
        assert_eq!(e.assignment_status.as_deref(), Some(PREVIEW_STATUS));
        assert!(e.can_start);
        assert_eq!(e.max_attempts, MAX_ATTEMPTS_FALLBACK);
    }

    #[test]
    fn unconfigured_test_cannot_start_even_when_assigned() {
        let a = assignment(Some(3));
        let e = compute_eligibility(Some(&a), false, false, 0, false);
        assert!(e.assigned);
        assert!(!e.configured);
        assert!(!e.can_start);
    }

    #[test]
    fn attempts_gate_monotonically() {
        let a = assignment(Some(3));
        for used in 0..3 {
            let e = compute_eligibility(Some(&a), false, true, used, false);
            assert_eq!(e.attempts_remaining, 3 - used as i32);
            assert!(e.can_start, "should start with {used} used");
        }
        let exhausted = compute_eligibility(Some(&a), false, true, 3, false);
        assert_eq!(exhausted.attempts_remaining, 0);
        assert!(!exhausted.can_start);

        // over-count never goes negative
        let over = compute_eligibility(Some(&a), false, true, 5, false);
        assert_eq!(over.attempts_remaining, 0);
    }

    #[test]
    fn in_progress_attempt_blocks_start() {
        let a = assignment(Some(3));
        let e = compute_eligibility(Some(&a), false, true, 0, true);
        assert!(e.assigned);
        assert!(e.has_in_progress);
        assert!(!e.can_start);
    }

    #[test]
    fn admin_with_assignment_row_still_gets_preview_sentinel() {
        let a = assignment(Some(3));
        let e = compute_eligibility(Some(&a), true, true, 0, false);
        assert!(e.assigned);
        assert_eq!(e.assignment_status.as_deref(), Some(PREVIEW_STATUS));
        assert_eq!(e.max_attempts, MAX_ATTEMPTS_FALLBACK);
    }

    #[test]
    fn owner_and_admin_may_access_an_attempt() {
        let candidate = user(roles::CANDIDATE);
        let own = attempt_owned_by(candidate.id);
        assert!(authorize_attempt_access(&own, &candidate).is_ok());

        let someone_elses = attempt_owned_by(Uuid::new_v4());
        assert!(authorize_attempt_access(&someone_elses, &user(roles::ADMIN)).is_ok());
        assert!(authorize_attempt_access(&someone_elses, &user(roles::SUPERADMIN)).is_ok());
    }

    #[test]
    fn candidate_cannot_access_anothers_attempt() {
        let someone_elses = attempt_owned_by(Uuid::new_v4());
        let result = authorize_attempt_access(&someone_elses, &user(roles::CANDIDATE));
        assert!(matches!(result, Err(Error::Forbidden(_))));
    }

    #[test]
    fn missing_budget_falls_back_to_one() {
        let a = assignment(None);
        let e = compute_eligibility(Some(&a), false, true, 0, false);
        assert_eq!(e.max_attempts, 1);
        assert_eq!(e.assignment_status.as_deref(), Some("assigned"));
        assert!(e.can_start);
        assert!(!compute_eligibility(Some(&a), false, true, 1, false).can_start);
    }
}
