use async_trait::async_trait;
use sqlx::{postgres::PgRow, FromRow, PgPool, Row};
use std::sync::Arc;

use super::decode_error;
use crate::{models::EnvironmentPolicy, persistence::Persistence};

#[derive(Debug)]
pub struct PolicyRelationalPersistence {
    pub db: Arc<PgPool>,
}

impl<'r> FromRow<'r, PgRow> for EnvironmentPolicy {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let approval_requirement: String = row.try_get("approval_requirement")?;

        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            approval_requirement: approval_requirement.parse().map_err(decode_error)?,
        })
    }
}

#[async_trait]
impl Persistence<EnvironmentPolicy> for PolicyRelationalPersistence {
    #[tracing::instrument(name = "relational::policy::upsert", skip(self))]
    async fn upsert(&self, policy: &EnvironmentPolicy) -> anyhow::Result<u64> {
        let result = sqlx::query(
            r#"
            INSERT INTO environment_policies (id, name, approval_requirement)
            VALUES ($1, $2, $3)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                approval_requirement = EXCLUDED.approval_requirement
            "#,
        )
        .bind(&policy.id)
        .bind(&policy.name)
        .bind(policy.approval_requirement.as_str())
        .execute(&*self.db)
        .await?;

        Ok(result.rows_affected())
    }

    #[tracing::instrument(name = "relational::policy::delete", skip(self))]
    async fn delete(&self, policy_id: &str) -> anyhow::Result<u64> {
        let result = sqlx::query("DELETE FROM environment_policies WHERE id = $1")
            .bind(policy_id)
            .execute(&*self.db)
            .await?;

        Ok(result.rows_affected())
    }

    #[tracing::instrument(name = "relational::policy::get_by_id", skip(self))]
    async fn get_by_id(&self, policy_id: &str) -> anyhow::Result<Option<EnvironmentPolicy>> {
        let policy = sqlx::query_as("SELECT * FROM environment_policies WHERE id = $1")
            .bind(policy_id)
            .fetch_optional(&*self.db)
            .await?;

        Ok(policy)
    }

    #[tracing::instrument(name = "relational::policy::list", skip(self))]
    async fn list(&self) -> anyhow::Result<Vec<EnvironmentPolicy>> {
        let policies = sqlx::query_as("SELECT * FROM environment_policies")
            .fetch_all(&*self.db)
            .await?;

        Ok(policies)
    }
}
