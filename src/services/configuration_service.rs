use crate::error::{Error, Result};
use crate::middleware::auth::CurrentUser;
use crate::models::configuration::{ConfigContent, Configuration};
use crate::models::test_type::TestType;
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use uuid::Uuid;

struct CacheEntry {
    config: Configuration,
    expires_at: Instant,
}

/// Short-lived cache for active-configuration lookups, bounding database
/// load from polling clients. Entries expire by TTL only; a just-published
/// configuration becomes visible within one window. Constructed once per
/// process and injected, so tests can use a zero TTL.
#[derive(Clone)]
pub struct ConfigCache {
    ttl: Duration,
    entries: Arc<RwLock<HashMap<String, CacheEntry>>>,
}

impl ConfigCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn key(tenant_id: Option<Uuid>, test_type: TestType) -> String {
        match tenant_id {
            Some(id) => format!("{}:{}", id, test_type.as_str()),
            None => format!("system:{}", test_type.as_str()),
        }
    }

    fn get(&self, key: &str) -> Option<Configuration> {
        let entries = self.entries.read().expect("config cache lock poisoned");
        entries
            .get(key)
            .filter(|e| e.expires_at > Instant::now())
            .map(|e| e.config.clone())
    }

    fn put(&self, key: String, config: Configuration) {
        let mut entries = self.entries.write().expect("config cache lock poisoned");
        entries.insert(
            key,
            CacheEntry {
                config,
                expires_at: Instant::now() + self.ttl,
            },
        );
    }
}

#[derive(Clone)]
pub struct ConfigurationService {
    pool: PgPool,
    cache: ConfigCache,
}

#[derive(Debug, Default)]
pub struct ConfigurationFilter {
    pub config_type: Option<String>,
    pub scope: Option<String>,
    pub active_only: bool,
}

impl ConfigurationService {
    pub fn new(pool: PgPool, cache: ConfigCache) -> Self {
        Self { pool, cache }
    }

    /// Resolve the single active configuration for (tenant, test type).
    /// Tenant scope wins over system scope. When neither exists the test is
    /// simply not configured, which is a valid outcome, not an error.
    pub async fn resolve_active(
        &self,
        tenant_id: Option<Uuid>,
        test_type: TestType,
    ) -> Result<Option<Configuration>> {
        let key = ConfigCache::key(tenant_id, test_type);
        if let Some(config) = self.cache.get(&key) {
            return Ok(Some(config));
        }

        let mut config: Option<Configuration> = None;
        if let Some(tid) = tenant_id {
            config = sqlx::query_as::<_, Configuration>(
                r#"SELECT * FROM configurations
                   WHERE config_type = $1 AND is_active = TRUE AND tenant_id = $2
                   ORDER BY created_at DESC LIMIT 1"#,
            )
            .bind(test_type.config_type())
            .bind(tid)
            .fetch_optional(&self.pool)
            .await?;
        }
        if config.is_none() {
            config = sqlx::query_as::<_, Configuration>(
                r#"SELECT * FROM configurations
                   WHERE config_type = $1 AND is_active = TRUE AND scope = 'system'
                   ORDER BY created_at DESC LIMIT 1"#,
            )
            .bind(test_type.config_type())
            .fetch_optional(&self.pool)
            .await?;
        }

        if let Some(cfg) = &config {
            self.cache.put(key, cfg.clone());
        }
        Ok(config)
    }

    /// Publish a configuration, superseding the active (tenant, type) row:
    /// the prior row is deactivated and the new one takes version + 1.
    pub async fn create_configuration(
        &self,
        current_user: &CurrentUser,
        tenant_id: Option<Uuid>,
        test_type: TestType,
        scope: &str,
        config_data: serde_json::Value,
    ) -> Result<Configuration> {
        if scope == "system" && !current_user.is_superadmin() {
            return Err(Error::Forbidden(
                "Only superadmin can create system-wide configurations".to_string(),
            ));
        }
        // reject malformed payloads at the boundary, not at attempt start
        ConfigContent::parse(test_type, &config_data)
            .map_err(|_| Error::BadRequest("Malformed configuration payload".to_string()))?;

        let tenant_id = tenant_id.or(current_user.tenant_id);

        let mut tx = self.pool.begin().await?;

        let existing: Option<Configuration> = sqlx::query_as::<_, Configuration>(
            r#"SELECT * FROM configurations
               WHERE config_type = $1 AND is_active = TRUE AND tenant_id IS NOT DISTINCT FROM $2
               ORDER BY created_at DESC LIMIT 1"#,
        )
        .bind(test_type.config_type())
        .bind(tenant_id)
        .fetch_optional(&mut *tx)
        .await?;

        let version = match &existing {
            Some(prior) => {
                sqlx::query("UPDATE configurations SET is_active = FALSE, updated_at = NOW() WHERE id = $1")
                    .bind(prior.id)
                    .execute(&mut *tx)
                    .await?;
                prior.version + 1
            }
            None => 1,
        };

        let created = sqlx::query_as::<_, Configuration>(
            r#"INSERT INTO configurations (tenant_id, config_type, scope, config_data, version, is_active, created_by)
               VALUES ($1, $2, $3, $4, $5, TRUE, $6)
               RETURNING *"#,
        )
        .bind(tenant_id)
        .bind(test_type.config_type())
        .bind(scope)
        .bind(config_data)
        .bind(version)
        .bind(current_user.id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            config_id = %created.id,
            config_type = %created.config_type,
            version = created.version,
            "configuration published"
        );
        Ok(created)
    }

    pub async fn list_configurations(
        &self,
        current_user: &CurrentUser,
        filter: ConfigurationFilter,
    ) -> Result<Vec<Configuration>> {
        let visible_tenant = if current_user.is_superadmin() {
            None
        } else {
            Some(current_user.tenant_id)
        };

        let rows = sqlx::query_as::<_, Configuration>(
            r#"SELECT * FROM configurations
               WHERE ($1::bool IS FALSE OR tenant_id IS NOT DISTINCT FROM $2 OR scope = 'system')
                 AND ($3::text IS NULL OR config_type = $3)
                 AND ($4::text IS NULL OR scope = $4)
                 AND ($5::bool IS FALSE OR is_active = TRUE)
               ORDER BY created_at DESC"#,
        )
        .bind(visible_tenant.is_some())
        .bind(visible_tenant.flatten())
        .bind(filter.config_type)
        .bind(filter.scope)
        .bind(filter.active_only)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn get_configuration(
        &self,
        current_user: &CurrentUser,
        config_id: Uuid,
    ) -> Result<Configuration> {
        let config = sqlx::query_as::<_, Configuration>(
            r#"SELECT * FROM configurations WHERE id = $1"#,
        )
        .bind(config_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::NotFound("Configuration not found".to_string()))?;

        if !current_user.is_superadmin()
            && config.scope != "system"
            && config.tenant_id != current_user.tenant_id
        {
            return Err(Error::Forbidden("Access denied".to_string()));
        }
        Ok(config)
    }
}
