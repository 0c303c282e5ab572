use async_trait::async_trait;
use sqlx::{postgres::PgRow, FromRow, PgPool, Row};
use std::sync::Arc;

use crate::{models::Environment, persistence::Persistence};

#[derive(Debug)]
pub struct EnvironmentRelationalPersistence {
    pub db: Arc<PgPool>,
}

impl<'r> FromRow<'r, PgRow> for Environment {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            policy_id: row.try_get("policy_id")?,
            deleted_at: row.try_get("deleted_at")?,
        })
    }
}

#[async_trait]
impl Persistence<Environment> for EnvironmentRelationalPersistence {
    #[tracing::instrument(name = "relational::environment::upsert", skip(self))]
    async fn upsert(&self, environment: &Environment) -> anyhow::Result<u64> {
        let result = sqlx::query(
            r#"
            INSERT INTO environments (id, name, policy_id, deleted_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                policy_id = EXCLUDED.policy_id,
                deleted_at = EXCLUDED.deleted_at
            "#,
        )
        .bind(&environment.id)
        .bind(&environment.name)
        .bind(&environment.policy_id)
        .bind(environment.deleted_at)
        .execute(&*self.db)
        .await?;

        Ok(result.rows_affected())
    }

    #[tracing::instrument(name = "relational::environment::delete", skip(self))]
    async fn delete(&self, environment_id: &str) -> anyhow::Result<u64> {
        let result = sqlx::query("DELETE FROM environments WHERE id = $1")
            .bind(environment_id)
            .execute(&*self.db)
            .await?;

        Ok(result.rows_affected())
    }

    #[tracing::instrument(name = "relational::environment::get_by_id", skip(self))]
    async fn get_by_id(&self, environment_id: &str) -> anyhow::Result<Option<Environment>> {
        let environment = sqlx::query_as("SELECT * FROM environments WHERE id = $1")
            .bind(environment_id)
            .fetch_optional(&*self.db)
            .await?;

        Ok(environment)
    }

    #[tracing::instrument(name = "relational::environment::list", skip(self))]
    async fn list(&self) -> anyhow::Result<Vec<Environment>> {
        let environments = sqlx::query_as("SELECT * FROM environments")
            .fetch_all(&*self.db)
            .await?;

        Ok(environments)
    }
}
