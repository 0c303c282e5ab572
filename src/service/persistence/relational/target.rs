use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgRow, types::Json, FromRow, PgPool, Row};
use std::sync::Arc;

use crate::{
    models::{Labels, Target, TargetKind},
    persistence::{Persistence, TargetPersistence},
};

const TARGET_COLUMNS: &str =
    "id, workspace_id, provider_id, identifier, name, kind, version, config, labels, locked_at";

#[derive(Debug)]
pub struct TargetRelationalPersistence {
    pub db: Arc<PgPool>,
}

impl<'r> FromRow<'r, PgRow> for Target {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let kind: String = row.try_get("kind")?;
        let labels: Json<Labels> = row.try_get("labels")?;

        Ok(Self {
            id: row.try_get("id")?,
            workspace_id: row.try_get("workspace_id")?,
            provider_id: row.try_get("provider_id")?,
            identifier: row.try_get("identifier")?,
            name: row.try_get("name")?,
            kind: TargetKind::from(kind),
            version: row.try_get("version")?,
            config: row.try_get("config")?,
            labels: labels.0,
            locked_at: row.try_get("locked_at")?,
        })
    }
}

#[async_trait]
impl Persistence<Target> for TargetRelationalPersistence {
    #[tracing::instrument(name = "relational::target::upsert", skip(self))]
    async fn upsert(&self, target: &Target) -> anyhow::Result<u64> {
        let result = sqlx::query(
            r#"
            INSERT INTO targets
                (id, workspace_id, provider_id, identifier, name, kind, version, config, labels, locked_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (id) DO UPDATE SET
                workspace_id = EXCLUDED.workspace_id,
                provider_id = EXCLUDED.provider_id,
                identifier = EXCLUDED.identifier,
                name = EXCLUDED.name,
                kind = EXCLUDED.kind,
                version = EXCLUDED.version,
                config = EXCLUDED.config,
                labels = EXCLUDED.labels,
                locked_at = EXCLUDED.locked_at
            "#,
        )
        .bind(&target.id)
        .bind(&target.workspace_id)
        .bind(&target.provider_id)
        .bind(&target.identifier)
        .bind(&target.name)
        .bind(target.kind.as_str())
        .bind(&target.version)
        .bind(&target.config)
        .bind(Json(&target.labels))
        .bind(target.locked_at)
        .execute(&*self.db)
        .await?;

        Ok(result.rows_affected())
    }

    #[tracing::instrument(name = "relational::target::delete", skip(self))]
    async fn delete(&self, target_id: &str) -> anyhow::Result<u64> {
        let result = sqlx::query("DELETE FROM targets WHERE id = $1")
            .bind(target_id)
            .execute(&*self.db)
            .await?;

        Ok(result.rows_affected())
    }

    #[tracing::instrument(name = "relational::target::get_by_id", skip(self))]
    async fn get_by_id(&self, target_id: &str) -> anyhow::Result<Option<Target>> {
        let target = sqlx::query_as(&format!(
            "SELECT {TARGET_COLUMNS} FROM targets WHERE id = $1"
        ))
        .bind(target_id)
        .fetch_optional(&*self.db)
        .await?;

        Ok(target)
    }

    #[tracing::instrument(name = "relational::target::list", skip(self))]
    async fn list(&self) -> anyhow::Result<Vec<Target>> {
        let targets = sqlx::query_as(&format!("SELECT {TARGET_COLUMNS} FROM targets"))
            .fetch_all(&*self.db)
            .await?;

        Ok(targets)
    }
}

#[async_trait]
impl TargetPersistence for TargetRelationalPersistence {
    #[tracing::instrument(name = "relational::target::upsert_by_identifier", skip(self, target), fields(identifier = %target.identifier))]
    async fn upsert_by_identifier(&self, target: &Target) -> anyhow::Result<Target> {
        let stored = sqlx::query_as(&format!(
            r#"
            INSERT INTO targets
                (id, workspace_id, provider_id, identifier, name, kind, version, config, labels, locked_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (workspace_id, identifier) DO UPDATE SET
                provider_id = EXCLUDED.provider_id,
                name = EXCLUDED.name,
                kind = EXCLUDED.kind,
                version = EXCLUDED.version,
                config = EXCLUDED.config,
                labels = EXCLUDED.labels
            RETURNING {TARGET_COLUMNS}
            "#
        ))
        .bind(&target.id)
        .bind(&target.workspace_id)
        .bind(&target.provider_id)
        .bind(&target.identifier)
        .bind(&target.name)
        .bind(target.kind.as_str())
        .bind(&target.version)
        .bind(&target.config)
        .bind(Json(&target.labels))
        .bind(target.locked_at)
        .fetch_one(&*self.db)
        .await?;

        Ok(stored)
    }

    #[tracing::instrument(name = "relational::target::get_by_identifier", skip(self))]
    async fn get_by_identifier(
        &self,
        workspace_id: &str,
        identifier: &str,
    ) -> anyhow::Result<Option<Target>> {
        let target = sqlx::query_as(&format!(
            "SELECT {TARGET_COLUMNS} FROM targets WHERE workspace_id = $1 AND identifier = $2"
        ))
        .bind(workspace_id)
        .bind(identifier)
        .fetch_optional(&*self.db)
        .await?;

        Ok(target)
    }

    #[tracing::instrument(name = "relational::target::get_by_provider_id", skip(self))]
    async fn get_by_provider_id(&self, provider_id: &str) -> anyhow::Result<Vec<Target>> {
        let targets = sqlx::query_as(&format!(
            "SELECT {TARGET_COLUMNS} FROM targets WHERE provider_id = $1"
        ))
        .bind(provider_id)
        .fetch_all(&*self.db)
        .await?;

        Ok(targets)
    }

    #[tracing::instrument(name = "relational::target::set_locked_at", skip(self))]
    async fn set_locked_at(
        &self,
        target_id: &str,
        locked_at: Option<DateTime<Utc>>,
    ) -> anyhow::Result<u64> {
        let result = sqlx::query("UPDATE targets SET locked_at = $2 WHERE id = $1")
            .bind(target_id)
            .bind(locked_at)
            .execute(&*self.db)
            .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        persistence::{relational::TargetProviderRelationalPersistence, Persistence},
        test::{get_target_fixture, get_target_provider_fixture},
    };

    #[tokio::test]
    #[ignore = "requires DATABASE_URL"]
    async fn test_upsert_by_identifier_preserves_lock() {
        let db = super::super::connect_test_db().await;

        let provider_persistence = TargetProviderRelationalPersistence {
            db: Arc::clone(&db),
        };
        provider_persistence
            .upsert(&get_target_provider_fixture(None))
            .await
            .unwrap();

        let target_persistence = TargetRelationalPersistence { db };
        let target = get_target_fixture(Some("relational-project/locked-cluster"));

        target_persistence.delete(&target.id).await.unwrap();
        target_persistence.upsert_by_identifier(&target).await.unwrap();

        let locked_at = Utc::now();
        target_persistence
            .set_locked_at(&target.id, Some(locked_at))
            .await
            .unwrap();

        let mut rescanned = target.clone();
        rescanned.id = "another-scan-id".to_owned();
        let stored = target_persistence
            .upsert_by_identifier(&rescanned)
            .await
            .unwrap();

        assert_eq!(stored.id, target.id);
        assert!(stored.locked_at.is_some());

        let deleted = target_persistence.delete(&target.id).await.unwrap();
        assert_eq!(deleted, 1);
    }
}
