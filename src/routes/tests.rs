use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::test_dto::{
        AttemptResponse, AvailabilityQuery, AvailabilityResponse, CompleteAttemptRequest,
        ListAttemptsQuery, StartAttemptRequest, StartAttemptResponse, SubmitAnswerRequest,
        SubmitAnswerResponse,
    },
    error::Result,
    middleware::auth::{Claims, CurrentUser},
    models::test_attempt::NewAnswer,
    models::test_type::TestType,
    services::test_service::AttemptFilter,
    AppState,
};

#[axum::debug_handler]
pub async fn get_availability(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<impl IntoResponse> {
    let current_user = CurrentUser::from_claims(&claims)?;
    // reject unknown types before touching the database
    let test_type = TestType::parse(&query.test_type)?;
    let availability = state
        .test_service
        .get_availability(&current_user, test_type)
        .await?;
    Ok(Json(AvailabilityResponse::from(availability)))
}

#[axum::debug_handler]
pub async fn start_attempt(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<StartAttemptRequest>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let current_user = CurrentUser::from_claims(&claims)?;
    let test_type = TestType::parse(&payload.test_type)?;
    let (attempt, remaining) = state
        .test_service
        .start_attempt(&current_user, test_type, payload.role_category)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(StartAttemptResponse::from_attempt(attempt, remaining)),
    ))
}

#[axum::debug_handler]
pub async fn submit_answer(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(attempt_id): Path<Uuid>,
    Json(payload): Json<SubmitAnswerRequest>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let current_user = CurrentUser::from_claims(&claims)?;
    let answer = NewAnswer {
        question_index: payload.question_index,
        is_follow_up: payload.is_follow_up,
        base_question_index: payload.base_question_index,
        follow_up_sequence: payload.follow_up_sequence,
        answer_text: payload.answer_text,
        duration_seconds: payload.duration_seconds,
        metadata: payload.metadata,
    };
    let outcome = state
        .test_service
        .submit_answer(&current_user, attempt_id, answer)
        .await?;
    Ok((StatusCode::CREATED, Json(SubmitAnswerResponse::from(outcome))))
}

#[axum::debug_handler]
pub async fn complete_attempt(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(attempt_id): Path<Uuid>,
    Json(payload): Json<CompleteAttemptRequest>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    if let Some(status) = payload.status.as_deref() {
        if status != "completed" {
            return Err(crate::error::Error::BadRequest(format!(
                "Unsupported target status '{}'",
                status
            )));
        }
    }
    let current_user = CurrentUser::from_claims(&claims)?;
    let attempt = state
        .test_service
        .complete_attempt(&current_user, attempt_id, payload.score, payload.answers)
        .await?;
    Ok(Json(AttemptResponse::from(attempt)))
}

#[axum::debug_handler]
pub async fn get_attempt(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(attempt_id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let current_user = CurrentUser::from_claims(&claims)?;
    let attempt = state
        .test_service
        .get_attempt(&current_user, attempt_id)
        .await?;
    Ok(Json(AttemptResponse::from(attempt)))
}

#[axum::debug_handler]
pub async fn list_attempts(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<ListAttemptsQuery>,
) -> Result<impl IntoResponse> {
    let current_user = CurrentUser::from_claims(&claims)?;
    let attempts = state
        .test_service
        .list_attempts(
            &current_user,
            AttemptFilter {
                test_type: query.test_type,
                status: query.status,
            },
        )
        .await?;
    let body: Vec<AttemptResponse> = attempts.into_iter().map(AttemptResponse::from).collect();
    Ok(Json(body))
}
