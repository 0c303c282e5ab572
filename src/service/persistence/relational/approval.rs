use async_trait::async_trait;
use sqlx::{postgres::PgRow, FromRow, PgPool, Row};
use std::sync::Arc;

use super::decode_error;
use crate::{
    models::EnvironmentPolicyApproval,
    persistence::{ApprovalPersistence, Persistence},
};

#[derive(Debug)]
pub struct ApprovalRelationalPersistence {
    pub db: Arc<PgPool>,
}

impl<'r> FromRow<'r, PgRow> for EnvironmentPolicyApproval {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let status: String = row.try_get("status")?;

        Ok(Self {
            id: row.try_get("id")?,
            policy_id: row.try_get("policy_id")?,
            release_id: row.try_get("release_id")?,
            status: status.parse().map_err(decode_error)?,
            resolved_at: row.try_get("resolved_at")?,
        })
    }
}

#[async_trait]
impl Persistence<EnvironmentPolicyApproval> for ApprovalRelationalPersistence {
    #[tracing::instrument(name = "relational::approval::upsert", skip(self))]
    async fn upsert(&self, approval: &EnvironmentPolicyApproval) -> anyhow::Result<u64> {
        let result = sqlx::query(
            r#"
            INSERT INTO environment_policy_approvals (id, policy_id, release_id, status, resolved_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE SET
                status = EXCLUDED.status,
                resolved_at = EXCLUDED.resolved_at
            "#,
        )
        .bind(&approval.id)
        .bind(&approval.policy_id)
        .bind(&approval.release_id)
        .bind(approval.status.as_str())
        .bind(approval.resolved_at)
        .execute(&*self.db)
        .await?;

        Ok(result.rows_affected())
    }

    #[tracing::instrument(name = "relational::approval::delete", skip(self))]
    async fn delete(&self, approval_id: &str) -> anyhow::Result<u64> {
        let result = sqlx::query("DELETE FROM environment_policy_approvals WHERE id = $1")
            .bind(approval_id)
            .execute(&*self.db)
            .await?;

        Ok(result.rows_affected())
    }

    #[tracing::instrument(name = "relational::approval::get_by_id", skip(self))]
    async fn get_by_id(
        &self,
        approval_id: &str,
    ) -> anyhow::Result<Option<EnvironmentPolicyApproval>> {
        let approval = sqlx::query_as("SELECT * FROM environment_policy_approvals WHERE id = $1")
            .bind(approval_id)
            .fetch_optional(&*self.db)
            .await?;

        Ok(approval)
    }

    #[tracing::instrument(name = "relational::approval::list", skip(self))]
    async fn list(&self) -> anyhow::Result<Vec<EnvironmentPolicyApproval>> {
        let approvals = sqlx::query_as("SELECT * FROM environment_policy_approvals")
            .fetch_all(&*self.db)
            .await?;

        Ok(approvals)
    }
}

#[async_trait]
impl ApprovalPersistence for ApprovalRelationalPersistence {
    #[tracing::instrument(name = "relational::approval::insert_if_absent", skip(self))]
    async fn insert_if_absent(
        &self,
        approval: &EnvironmentPolicyApproval,
    ) -> anyhow::Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO environment_policy_approvals (id, policy_id, release_id, status, resolved_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (policy_id, release_id) DO NOTHING
            "#,
        )
        .bind(&approval.id)
        .bind(&approval.policy_id)
        .bind(&approval.release_id)
        .bind(approval.status.as_str())
        .bind(approval.resolved_at)
        .execute(&*self.db)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    #[tracing::instrument(name = "relational::approval::get_by_policy_and_release", skip(self))]
    async fn get_by_policy_and_release(
        &self,
        policy_id: &str,
        release_id: &str,
    ) -> anyhow::Result<Option<EnvironmentPolicyApproval>> {
        let approval = sqlx::query_as(
            "SELECT * FROM environment_policy_approvals WHERE policy_id = $1 AND release_id = $2",
        )
        .bind(policy_id)
        .bind(release_id)
        .fetch_optional(&*self.db)
        .await?;

        Ok(approval)
    }
}
