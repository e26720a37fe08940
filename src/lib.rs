pub mod config;
pub mod database;
pub mod dto;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use crate::services::{
    assignment_service::AssignmentService,
    configuration_service::{ConfigCache, ConfigurationService},
    test_service::TestService,
};
use sqlx::PgPool;
use std::time::Duration;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub configuration_service: ConfigurationService,
    pub assignment_service: AssignmentService,
    pub test_service: TestService,
}

impl AppState {
    pub fn new(pool: PgPool) -> Self {
        let config = crate::config::get_config();
        let cache = ConfigCache::new(Duration::from_secs(config.config_cache_ttl_seconds));

        let configuration_service = ConfigurationService::new(pool.clone(), cache);
        let assignment_service = AssignmentService::new(pool.clone());
        let test_service = TestService::new(
            pool.clone(),
            configuration_service.clone(),
            assignment_service.clone(),
        );

        Self {
            pool,
            configuration_service,
            assignment_service,
            test_service,
        }
    }
}
