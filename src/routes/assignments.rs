use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::assignment_dto::{
        AssignmentResponse, BulkAssignRequest, BulkAssignResponse, ListAssignmentsQuery,
        UpdateAssignmentRequest,
    },
    error::Result,
    middleware::auth::{Claims, CurrentUser},
    services::assignment_service::{AssignmentFilter, AssignmentUpdate},
    AppState,
};

#[axum::debug_handler]
pub async fn bulk_assign(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<BulkAssignRequest>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let current_user = CurrentUser::from_claims(&claims)?;
    let requested = payload.user_ids.len() * payload.test_types.len();
    let created = state
        .assignment_service
        .bulk_assign(
            &current_user,
            &payload.user_ids,
            &payload.test_types,
            payload.due_date,
            payload.max_attempts,
            payload.notes,
            payload.sjt_scenario_ids,
        )
        .await?;
    let created: Vec<AssignmentResponse> =
        created.into_iter().map(AssignmentResponse::from).collect();
    let body = BulkAssignResponse {
        skipped_count: requested - created.len(),
        created_count: created.len(),
        created,
    };
    Ok((StatusCode::CREATED, Json(body)))
}

#[axum::debug_handler]
pub async fn list_assignments(
    State(state): State<AppState>,
    Query(query): Query<ListAssignmentsQuery>,
) -> Result<impl IntoResponse> {
    let assignments = state
        .assignment_service
        .list_assignments(AssignmentFilter {
            user_id: query.user_id,
            test_type: query.test_type,
            status: query.status,
        })
        .await?;
    let body: Vec<AssignmentResponse> = assignments
        .into_iter()
        .map(AssignmentResponse::from)
        .collect();
    Ok(Json(body))
}

#[axum::debug_handler]
pub async fn update_assignment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateAssignmentRequest>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let assignment = state
        .assignment_service
        .update_assignment(
            id,
            AssignmentUpdate {
                status: payload.status,
                started_at: payload.started_at,
                completed_at: payload.completed_at,
                notes: payload.notes,
            },
        )
        .await?;
    Ok(Json(AssignmentResponse::from(assignment)))
}

#[axum::debug_handler]
pub async fn delete_assignment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    state.assignment_service.delete_assignment(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[axum::debug_handler]
pub async fn my_assignments(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse> {
    let current_user = CurrentUser::from_claims(&claims)?;
    let assignments = state.assignment_service.my_assignments(&current_user).await?;
    let body: Vec<AssignmentResponse> = assignments
        .into_iter()
        .map(AssignmentResponse::from)
        .collect();
    Ok(Json(body))
}

#[axum::debug_handler]
pub async fn start_my_assignment(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let current_user = CurrentUser::from_claims(&claims)?;
    let assignment = state
        .assignment_service
        .start_my_assignment(&current_user, id)
        .await?;
    Ok(Json(AssignmentResponse::from(assignment)))
}
