use crate::models::configuration::Configuration;
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateConfigurationRequest {
    pub test_type: String,
    #[validate(custom(function = "validate_scope"))]
    pub scope: String,
    pub tenant_id: Option<uuid::Uuid>,
    pub config_data: serde_json::Value,
}

fn validate_scope(scope: &str) -> Result<(), validator::ValidationError> {
    if scope == "system" || scope == "tenant" {
        Ok(())
    } else {
        Err(validator::ValidationError::new("invalid_scope"))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListConfigurationsQuery {
    pub config_type: Option<String>,
    pub scope: Option<String>,
    #[serde(default)]
    pub active_only: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfigurationResponse {
    pub id: uuid::Uuid,
    pub tenant_id: Option<uuid::Uuid>,
    pub config_type: String,
    pub scope: String,
    pub version: i32,
    pub is_active: bool,
    pub config_data: serde_json::Value,
    pub created_by: Option<uuid::Uuid>,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl From<Configuration> for ConfigurationResponse {
    fn from(c: Configuration) -> Self {
        Self {
            id: c.id,
            tenant_id: c.tenant_id,
            config_type: c.config_type,
            scope: c.scope,
            version: c.version,
            is_active: c.is_active,
            config_data: c.config_data,
            created_by: c.created_by,
            created_at: c.created_at,
        }
    }
}
