use async_trait::async_trait;
use sqlx::{postgres::PgRow, types::Json, FromRow, PgPool, Row};
use std::sync::Arc;

use crate::{
    models::{TargetProvider, TargetProviderConfig},
    persistence::Persistence,
};

#[derive(Debug)]
pub struct TargetProviderRelationalPersistence {
    pub db: Arc<PgPool>,
}

impl<'r> FromRow<'r, PgRow> for TargetProvider {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let config: Json<TargetProviderConfig> = row.try_get("config")?;

        Ok(Self {
            id: row.try_get("id")?,
            workspace_id: row.try_get("workspace_id")?,
            name: row.try_get("name")?,
            config: config.0,
        })
    }
}

#[async_trait]
impl Persistence<TargetProvider> for TargetProviderRelationalPersistence {
    #[tracing::instrument(name = "relational::target_provider::upsert", skip(self))]
    async fn upsert(&self, provider: &TargetProvider) -> anyhow::Result<u64> {
        let result = sqlx::query(
            r#"
            INSERT INTO target_providers (id, workspace_id, name, config)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE SET
                workspace_id = EXCLUDED.workspace_id,
                name = EXCLUDED.name,
                config = EXCLUDED.config
            "#,
        )
        .bind(&provider.id)
        .bind(&provider.workspace_id)
        .bind(&provider.name)
        .bind(Json(&provider.config))
        .execute(&*self.db)
        .await?;

        Ok(result.rows_affected())
    }

    #[tracing::instrument(name = "relational::target_provider::delete", skip(self))]
    async fn delete(&self, provider_id: &str) -> anyhow::Result<u64> {
        let result = sqlx::query("DELETE FROM target_providers WHERE id = $1")
            .bind(provider_id)
            .execute(&*self.db)
            .await?;

        Ok(result.rows_affected())
    }

    #[tracing::instrument(name = "relational::target_provider::get_by_id", skip(self))]
    async fn get_by_id(&self, provider_id: &str) -> anyhow::Result<Option<TargetProvider>> {
        let provider = sqlx::query_as("SELECT * FROM target_providers WHERE id = $1")
            .bind(provider_id)
            .fetch_optional(&*self.db)
            .await?;

        Ok(provider)
    }

    #[tracing::instrument(name = "relational::target_provider::list", skip(self))]
    async fn list(&self) -> anyhow::Result<Vec<TargetProvider>> {
        let providers = sqlx::query_as("SELECT * FROM target_providers")
            .fetch_all(&*self.db)
            .await?;

        Ok(providers)
    }
}
