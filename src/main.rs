use assessment_backend::{
    config::{get_config, init_config},
    database::pool::create_pool,
    middleware::auth,
    routes, AppState,
};
use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    init_config()?;
    let config = get_config();

    let pool = create_pool().await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let app_state = AppState::new(pool);

    let base_routes = Router::new().route("/health", get(routes::health::health));

    let candidate_api = Router::new()
        .route("/api/tests/availability", get(routes::tests::get_availability))
        .route("/api/tests/attempts", get(routes::tests::list_attempts))
        .route("/api/tests/attempts/start", post(routes::tests::start_attempt))
        .route("/api/tests/attempts/:id", get(routes::tests::get_attempt))
        .route(
            "/api/tests/attempts/:id/answers",
            post(routes::tests::submit_answer),
        )
        .route(
            "/api/tests/attempts/:id/complete",
            post(routes::tests::complete_attempt),
        )
        .route("/api/my-tests", get(routes::assignments::my_assignments))
        .route(
            "/api/my-tests/:id/start",
            post(routes::assignments::start_my_assignment),
        )
        .layer(axum::middleware::from_fn(auth::require_bearer_auth));

    let admin_api = Router::new()
        .route(
            "/api/admin/assignments",
            get(routes::assignments::list_assignments).post(routes::assignments::bulk_assign),
        )
        .route(
            "/api/admin/assignments/:id",
            axum::routing::patch(routes::assignments::update_assignment)
                .delete(routes::assignments::delete_assignment),
        )
        .route(
            "/api/admin/configurations",
            get(routes::configurations::list_configurations)
                .post(routes::configurations::create_configuration),
        )
        .route(
            "/api/admin/configurations/:id",
            get(routes::configurations::get_configuration),
        )
        .layer(axum::middleware::from_fn(auth::require_admin));

    let app = base_routes
        .merge(candidate_api)
        .merge(admin_api)
        .with_state(app_state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = config.server_address.parse()?;
    info!("Server listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
