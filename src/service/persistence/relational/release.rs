use async_trait::async_trait;
use sqlx::{postgres::PgRow, FromRow, PgPool, Row};
use std::sync::Arc;

use crate::{models::Release, persistence::Persistence};

#[derive(Debug)]
pub struct ReleaseRelationalPersistence {
    pub db: Arc<PgPool>,
}

impl<'r> FromRow<'r, PgRow> for Release {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            deployment_id: row.try_get("deployment_id")?,
            version: row.try_get("version")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[async_trait]
impl Persistence<Release> for ReleaseRelationalPersistence {
    // releases are immutable once written
    #[tracing::instrument(name = "relational::release::upsert", skip(self))]
    async fn upsert(&self, release: &Release) -> anyhow::Result<u64> {
        let result = sqlx::query(
            r#"
            INSERT INTO releases (id, deployment_id, version, created_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(&release.id)
        .bind(&release.deployment_id)
        .bind(&release.version)
        .bind(release.created_at)
        .execute(&*self.db)
        .await?;

        Ok(result.rows_affected())
    }

    #[tracing::instrument(name = "relational::release::delete", skip(self))]
    async fn delete(&self, release_id: &str) -> anyhow::Result<u64> {
        let result = sqlx::query("DELETE FROM releases WHERE id = $1")
            .bind(release_id)
            .execute(&*self.db)
            .await?;

        Ok(result.rows_affected())
    }

    #[tracing::instrument(name = "relational::release::get_by_id", skip(self))]
    async fn get_by_id(&self, release_id: &str) -> anyhow::Result<Option<Release>> {
        let release = sqlx::query_as("SELECT * FROM releases WHERE id = $1")
            .bind(release_id)
            .fetch_optional(&*self.db)
            .await?;

        Ok(release)
    }

    #[tracing::instrument(name = "relational::release::list", skip(self))]
    async fn list(&self) -> anyhow::Result<Vec<Release>> {
        let releases = sqlx::query_as("SELECT * FROM releases ORDER BY created_at")
            .fetch_all(&*self.db)
            .await?;

        Ok(releases)
    }
}
