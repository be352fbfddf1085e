use sqlx::{PgPool, Postgres};
use std::collections::HashMap;
use uuid::Uuid;

use zapship_core::defaults;
use zapship_core::models::{AutomationConfig, AutomationSettings, AutomationStep};
use zapship_core::AppError;

use super::store::AutomationStore;
use async_trait::async_trait;

/// Repository for tenant automation settings.
#[derive(Clone)]
pub struct AutomationRepository {
    pool: PgPool,
}

impl AutomationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[tracing::instrument(skip(self), fields(db.table = "automations", db.operation = "select"))]
    async fn configs_for_tenant(
        &self,
        tenant_id: Uuid,
    ) -> Result<Vec<AutomationConfig>, AppError> {
        let configs = sqlx::query_as::<Postgres, AutomationConfig>(
            "SELECT id, tenant_id, trigger, active, message, created_at \
             FROM automations WHERE tenant_id = $1",
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(configs)
    }

    #[tracing::instrument(skip(self), fields(db.table = "automation_steps", db.operation = "select"))]
    async fn steps_for_config(&self, config_id: Uuid) -> Result<Vec<AutomationStep>, AppError> {
        let steps = sqlx::query_as::<Postgres, AutomationStep>(
            "SELECT id, config_id, position, kind, content, media_url \
             FROM automation_steps WHERE config_id = $1 ORDER BY position ASC",
        )
        .bind(config_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(steps)
    }
}

#[async_trait]
impl AutomationStore for AutomationRepository {
    /// Tenant rows overlaid on the compiled-in defaults. A tenant row for a
    /// known trigger replaces its default entirely, including `active`.
    async fn settings_for_tenant(
        &self,
        tenant_id: Uuid,
    ) -> Result<HashMap<String, AutomationSettings>, AppError> {
        let mut settings = defaults::default_settings();

        for config in self.configs_for_tenant(tenant_id).await? {
            let steps = self.steps_for_config(config.id).await?;
            settings.insert(
                config.trigger,
                AutomationSettings {
                    active: config.active,
                    message: config.message,
                    steps,
                },
            );
        }

        Ok(settings)
    }
}
