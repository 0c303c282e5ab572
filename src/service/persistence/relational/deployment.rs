use async_trait::async_trait;
use sqlx::{postgres::PgRow, FromRow, PgPool, Row};
use std::sync::Arc;

use crate::{models::Deployment, persistence::Persistence};

#[derive(Debug)]
pub struct DeploymentRelationalPersistence {
    pub db: Arc<PgPool>,
}

impl<'r> FromRow<'r, PgRow> for Deployment {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            job_agent_id: row.try_get("job_agent_id")?,
        })
    }
}

#[async_trait]
impl Persistence<Deployment> for DeploymentRelationalPersistence {
    #[tracing::instrument(name = "relational::deployment::upsert", skip(self))]
    async fn upsert(&self, deployment: &Deployment) -> anyhow::Result<u64> {
        let result = sqlx::query(
            r#"
            INSERT INTO deployments (id, name, job_agent_id)
            VALUES ($1, $2, $3)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                job_agent_id = EXCLUDED.job_agent_id
            "#,
        )
        .bind(&deployment.id)
        .bind(&deployment.name)
        .bind(&deployment.job_agent_id)
        .execute(&*self.db)
        .await?;

        Ok(result.rows_affected())
    }

    #[tracing::instrument(name = "relational::deployment::delete", skip(self))]
    async fn delete(&self, deployment_id: &str) -> anyhow::Result<u64> {
        let result = sqlx::query("DELETE FROM deployments WHERE id = $1")
            .bind(deployment_id)
            .execute(&*self.db)
            .await?;

        Ok(result.rows_affected())
    }

    #[tracing::instrument(name = "relational::deployment::get_by_id", skip(self))]
    async fn get_by_id(&self, deployment_id: &str) -> anyhow::Result<Option<Deployment>> {
        let deployment = sqlx::query_as("SELECT * FROM deployments WHERE id = $1")
            .bind(deployment_id)
            .fetch_optional(&*self.db)
            .await?;

        Ok(deployment)
    }

    #[tracing::instrument(name = "relational::deployment::list", skip(self))]
    async fn list(&self) -> anyhow::Result<Vec<Deployment>> {
        let deployments = sqlx::query_as("SELECT * FROM deployments")
            .fetch_all(&*self.db)
            .await?;

        Ok(deployments)
    }
}
