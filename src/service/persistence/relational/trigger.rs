use async_trait::async_trait;
use sqlx::{postgres::PgRow, FromRow, PgPool, Row};
use std::sync::Arc;

use super::decode_error;
use crate::{
    models::ReleaseJobTrigger,
    persistence::{Persistence, TriggerPersistence},
};

#[derive(Debug)]
pub struct TriggerRelationalPersistence {
    pub db: Arc<PgPool>,
}

impl<'r> FromRow<'r, PgRow> for ReleaseJobTrigger {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let trigger_type: String = row.try_get("trigger_type")?;

        Ok(Self {
            id: row.try_get("id")?,
            trigger_type: trigger_type.parse().map_err(decode_error)?,
            release_id: row.try_get("release_id")?,
            environment_id: row.try_get("environment_id")?,
            target_id: row.try_get("target_id")?,
            caused_by_id: row.try_get("caused_by_id")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[async_trait]
impl Persistence<ReleaseJobTrigger> for TriggerRelationalPersistence {
    #[tracing::instrument(name = "relational::trigger::upsert", skip(self))]
    async fn upsert(&self, trigger: &ReleaseJobTrigger) -> anyhow::Result<u64> {
        let result = sqlx::query(
            r#"
            INSERT INTO release_job_triggers
                (id, trigger_type, release_id, environment_id, target_id, caused_by_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO UPDATE SET
                trigger_type = EXCLUDED.trigger_type,
                release_id = EXCLUDED.release_id,
                environment_id = EXCLUDED.environment_id,
                target_id = EXCLUDED.target_id,
                caused_by_id = EXCLUDED.caused_by_id
            "#,
        )
        .bind(&trigger.id)
        .bind(trigger.trigger_type.as_str())
        .bind(&trigger.release_id)
        .bind(&trigger.environment_id)
        .bind(&trigger.target_id)
        .bind(&trigger.caused_by_id)
        .bind(trigger.created_at)
        .execute(&*self.db)
        .await?;

        Ok(result.rows_affected())
    }

    #[tracing::instrument(name = "relational::trigger::delete", skip(self))]
    async fn delete(&self, trigger_id: &str) -> anyhow::Result<u64> {
        let result = sqlx::query("DELETE FROM release_job_triggers WHERE id = $1")
            .bind(trigger_id)
            .execute(&*self.db)
            .await?;

        Ok(result.rows_affected())
    }

    #[tracing::instrument(name = "relational::trigger::get_by_id", skip(self))]
    async fn get_by_id(&self, trigger_id: &str) -> anyhow::Result<Option<ReleaseJobTrigger>> {
        let trigger = sqlx::query_as("SELECT * FROM release_job_triggers WHERE id = $1")
            .bind(trigger_id)
            .fetch_optional(&*self.db)
            .await?;

        Ok(trigger)
    }

    #[tracing::instrument(name = "relational::trigger::list", skip(self))]
    async fn list(&self) -> anyhow::Result<Vec<ReleaseJobTrigger>> {
        let triggers = sqlx::query_as("SELECT * FROM release_job_triggers ORDER BY created_at")
            .fetch_all(&*self.db)
            .await?;

        Ok(triggers)
    }
}

#[async_trait]
impl TriggerPersistence for TriggerRelationalPersistence {
    #[tracing::instrument(name = "relational::trigger::get_by_release_id", skip(self))]
    async fn get_by_release_id(
        &self,
        release_id: &str,
    ) -> anyhow::Result<Vec<ReleaseJobTrigger>> {
        let triggers = sqlx::query_as(
            "SELECT * FROM release_job_triggers WHERE release_id = $1 ORDER BY created_at",
        )
        .bind(release_id)
        .fetch_all(&*self.db)
        .await?;

        Ok(triggers)
    }
}
