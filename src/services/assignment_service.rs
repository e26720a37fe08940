use crate::error::{Error, Result};
use crate::middleware::auth::CurrentUser;
use crate::models::test_assignment::{TestAssignment, ASSIGNMENT_MAX_ATTEMPTS_DEFAULT};
use crate::models::test_type::TestType;
use chrono::{DateTime, Utc};
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

pub const ASSIGNMENT_STATUSES: &[&str] =
    &["assigned", "started", "completed", "overdue", "cancelled"];

#[derive(Clone)]
pub struct AssignmentService {
    pool: PgPool,
}

#[derive(Debug, Default)]
pub struct AssignmentFilter {
    pub user_id: Option<Uuid>,
    pub test_type: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Default)]
pub struct AssignmentUpdate {
    pub status: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

impl AssignmentService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_for_user(
        &self,
        user_id: Uuid,
        test_type: TestType,
    ) -> Result<Option<TestAssignment>> {
        let assignment = sqlx::query_as::<_, TestAssignment>(
            r#"SELECT * FROM test_assignments WHERE user_id = $1 AND test_type = $2"#,
        )
        .bind(user_id)
        .bind(test_type.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(assignment)
    }

    /// Flag-gated side effect of the availability check: create the missing
    /// assignment for a candidate. Idempotent; a concurrent check loses the
    /// insert race and finds the row on re-read.
    pub async fn auto_assign(
        &self,
        current_user: &CurrentUser,
        test_type: TestType,
    ) -> Result<Option<TestAssignment>> {
        sqlx::query(
            r#"INSERT INTO test_assignments (user_id, admin_id, tenant_id, test_type, status, max_attempts)
               VALUES ($1, NULL, $2, $3, 'assigned', $4)
               ON CONFLICT (user_id, test_type) DO NOTHING"#,
        )
        .bind(current_user.id)
        .bind(current_user.tenant_id)
        .bind(test_type.as_str())
        .bind(ASSIGNMENT_MAX_ATTEMPTS_DEFAULT)
        .execute(&self.pool)
        .await?;

        tracing::info!(user_id = %current_user.id, test_type = %test_type, "auto-assigned test");
        self.find_for_user(current_user.id, test_type).await
    }

    /// Assign one or more test types to one or more candidates. Existing
    /// (user, type) assignments are skipped, never duplicated.
    #[allow(clippy::too_many_arguments)]
    pub async fn bulk_assign(
        &self,
        current_user: &CurrentUser,
        user_ids: &[Uuid],
        test_types: &[String],
        due_date: Option<DateTime<Utc>>,
        max_attempts: Option<i32>,
        notes: Option<String>,
        sjt_scenario_ids: Option<Vec<String>>,
    ) -> Result<Vec<TestAssignment>> {
        let max_attempts = max_attempts.unwrap_or(ASSIGNMENT_MAX_ATTEMPTS_DEFAULT);
        let mut created = Vec::new();

        for user_id in user_ids {
            for raw_type in test_types {
                let test_type = TestType::parse(raw_type)?;
                let custom_config = match (&sjt_scenario_ids, test_type) {
                    (Some(ids), TestType::Sjt) if !ids.is_empty() => {
                        Some(json!({ "sjt_scenario_ids": ids }))
                    }
                    _ => None,
                };

                let inserted = sqlx::query_as::<_, TestAssignment>(
                    r#"INSERT INTO test_assignments
                           (user_id, admin_id, tenant_id, test_type, status, due_date, max_attempts, custom_config, notes)
                       VALUES ($1, $2, $3, $4, 'assigned', $5, $6, $7, $8)
                       ON CONFLICT (user_id, test_type) DO NOTHING
                       RETURNING *"#,
                )
                .bind(user_id)
                .bind(current_user.id)
                .bind(current_user.tenant_id)
                .bind(test_type.as_str())
                .bind(due_date)
                .bind(max_attempts)
                .bind(&custom_config)
                .bind(&notes)
                .fetch_optional(&self.pool)
                .await?;

                if let Some(assignment) = inserted {
                    created.push(assignment);
                }
            }
        }

        Ok(created)
    }

    pub async fn list_assignments(&self, filter: AssignmentFilter) -> Result<Vec<TestAssignment>> {
        let rows = sqlx::query_as::<_, TestAssignment>(
            r#"SELECT * FROM test_assignments
               WHERE ($1::uuid IS NULL OR user_id = $1)
                 AND ($2::text IS NULL OR test_type = $2)
                 AND ($3::text IS NULL OR status = $3)
               ORDER BY created_at DESC"#,
        )
        .bind(filter.user_id)
        .bind(filter.test_type)
        .bind(filter.status)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn update_assignment(
        &self,
        assignment_id: Uuid,
        update: AssignmentUpdate,
    ) -> Result<TestAssignment> {
        if let Some(status) = &update.status {
            if !ASSIGNMENT_STATUSES.contains(&status.as_str()) {
                return Err(Error::BadRequest(format!(
                    "Invalid assignment status '{}'",
                    status
                )));
            }
        }

        let assignment = sqlx::query_as::<_, TestAssignment>(
            r#"UPDATE test_assignments
               SET status = COALESCE($1, status),
                   started_at = COALESCE($2, started_at),
                   completed_at = COALESCE($3, completed_at),
                   notes = COALESCE($4, notes),
                   updated_at = NOW()
               WHERE id = $5
               RETURNING *"#,
        )
        .bind(update.status)
        .bind(update.started_at)
        .bind(update.completed_at)
        .bind(update.notes)
        .bind(assignment_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::NotFound("Test assignment not found".to_string()))?;

        Ok(assignment)
    }

    pub async fn delete_assignment(&self, assignment_id: Uuid) -> Result<()> {
        let result = sqlx::query(r#"DELETE FROM test_assignments WHERE id = $1"#)
            .bind(assignment_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound("Test assignment not found".to_string()));
        }
        Ok(())
    }

    pub async fn my_assignments(&self, current_user: &CurrentUser) -> Result<Vec<TestAssignment>> {
        let rows = sqlx::query_as::<_, TestAssignment>(
            r#"SELECT * FROM test_assignments WHERE user_id = $1 ORDER BY created_at DESC"#,
        )
        .bind(current_user.id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Candidate marks an assigned test as started. Advisory progress
    /// tracking; attempt gating lives in the eligibility check.
    pub async fn start_my_assignment(
        &self,
        current_user: &CurrentUser,
        assignment_id: Uuid,
    ) -> Result<TestAssignment> {
        let assignment = sqlx::query_as::<_, TestAssignment>(
            r#"UPDATE test_assignments
               SET status = 'started', started_at = NOW(), updated_at = NOW()
               WHERE id = $1 AND user_id = $2 AND status = 'assigned'
               RETURNING *"#,
        )
        .bind(assignment_id)
        .bind(current_user.id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| {
            Error::NotFound("Test assignment not found or already started".to_string())
        })?;

        Ok(assignment)
    }
}
