use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::configuration_dto::{
        ConfigurationResponse, CreateConfigurationRequest, ListConfigurationsQuery,
    },
    error::Result,
    middleware::auth::{Claims, CurrentUser},
    models::test_type::TestType,
    services::configuration_service::ConfigurationFilter,
    AppState,
};

#[axum::debug_handler]
pub async fn create_configuration(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateConfigurationRequest>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let current_user = CurrentUser::from_claims(&claims)?;
    let test_type = TestType::parse(&payload.test_type)?;
    let config = state
        .configuration_service
        .create_configuration(
            &current_user,
            payload.tenant_id,
            test_type,
            &payload.scope,
            payload.config_data,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(ConfigurationResponse::from(config))))
}

#[axum::debug_handler]
pub async fn list_configurations(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<ListConfigurationsQuery>,
) -> Result<impl IntoResponse> {
    let current_user = CurrentUser::from_claims(&claims)?;
    let configs = state
        .configuration_service
        .list_configurations(
            &current_user,
            ConfigurationFilter {
                config_type: query.config_type,
                scope: query.scope,
                active_only: query.active_only,
            },
        )
        .await?;
    let body: Vec<ConfigurationResponse> =
        configs.into_iter().map(ConfigurationResponse::from).collect();
    Ok(Json(body))
}

#[axum::debug_handler]
pub async fn get_configuration(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let current_user = CurrentUser::from_claims(&claims)?;
    let config = state
        .configuration_service
        .get_configuration(&current_user, id)
        .await?;
    Ok(Json(ConfigurationResponse::from(config)))
}
