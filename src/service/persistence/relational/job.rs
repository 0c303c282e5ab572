use async_trait::async_trait;
use sqlx::{postgres::PgRow, FromRow, PgPool, Row};
use std::sync::Arc;

use super::decode_error;
use crate::{
    models::{Job, JobStatus},
    persistence::{JobPersistence, Persistence},
};

#[derive(Debug)]
pub struct JobRelationalPersistence {
    pub db: Arc<PgPool>,
}

impl<'r> FromRow<'r, PgRow> for Job {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let status: String = row.try_get("status")?;

        Ok(Self {
            id: row.try_get("id")?,
            trigger_id: row.try_get("trigger_id")?,
            job_agent_id: row.try_get("job_agent_id")?,
            release_id: row.try_get("release_id")?,
            environment_id: row.try_get("environment_id")?,
            target_id: row.try_get("target_id")?,
            status: status.parse().map_err(decode_error)?,
            is_forced_release: row.try_get("is_forced_release")?,
            message: row.try_get("message")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[async_trait]
impl Persistence<Job> for JobRelationalPersistence {
    #[tracing::instrument(name = "relational::job::upsert", skip(self))]
    async fn upsert(&self, job: &Job) -> anyhow::Result<u64> {
        let result = sqlx::query(
            r#"
            INSERT INTO jobs
                (id, trigger_id, job_agent_id, release_id, environment_id, target_id,
                 status, is_forced_release, message, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (id) DO UPDATE SET
                job_agent_id = EXCLUDED.job_agent_id,
                status = EXCLUDED.status,
                is_forced_release = EXCLUDED.is_forced_release,
                message = EXCLUDED.message,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(&job.id)
        .bind(&job.trigger_id)
        .bind(&job.job_agent_id)
        .bind(&job.release_id)
        .bind(&job.environment_id)
        .bind(&job.target_id)
        .bind(job.status.as_str())
        .bind(job.is_forced_release)
        .bind(&job.message)
        .bind(job.created_at)
        .bind(job.updated_at)
        .execute(&*self.db)
        .await?;

        Ok(result.rows_affected())
    }

    #[tracing::instrument(name = "relational::job::delete", skip(self))]
    async fn delete(&self, job_id: &str) -> anyhow::Result<u64> {
        let result = sqlx::query("DELETE FROM jobs WHERE id = $1")
            .bind(job_id)
            .execute(&*self.db)
            .await?;

        Ok(result.rows_affected())
    }

    #[tracing::instrument(name = "relational::job::get_by_id", skip(self))]
    async fn get_by_id(&self, job_id: &str) -> anyhow::Result<Option<Job>> {
        let job = sqlx::query_as("SELECT * FROM jobs WHERE id = $1")
            .bind(job_id)
            .fetch_optional(&*self.db)
            .await?;

        Ok(job)
    }

    #[tracing::instrument(name = "relational::job::list", skip(self))]
    async fn list(&self) -> anyhow::Result<Vec<Job>> {
        let jobs = sqlx::query_as("SELECT * FROM jobs ORDER BY created_at")
            .fetch_all(&*self.db)
            .await?;

        Ok(jobs)
    }
}

#[async_trait]
impl JobPersistence for JobRelationalPersistence {
    #[tracing::instrument(name = "relational::job::create_if_absent", skip(self))]
    async fn create_if_absent(&self, job: &Job) -> anyhow::Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO jobs
                (id, trigger_id, job_agent_id, release_id, environment_id, target_id,
                 status, is_forced_release, message, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (trigger_id) DO NOTHING
            "#,
        )
        .bind(&job.id)
        .bind(&job.trigger_id)
        .bind(&job.job_agent_id)
        .bind(&job.release_id)
        .bind(&job.environment_id)
        .bind(&job.target_id)
        .bind(job.status.as_str())
        .bind(job.is_forced_release)
        .bind(&job.message)
        .bind(job.created_at)
        .bind(job.updated_at)
        .execute(&*self.db)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    #[tracing::instrument(name = "relational::job::update_if_status", skip(self))]
    async fn update_if_status(&self, job: &Job, expected: JobStatus) -> anyhow::Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE jobs SET
                status = $2,
                message = $3,
                updated_at = $4
            WHERE id = $1 AND status = $5
            "#,
        )
        .bind(&job.id)
        .bind(job.status.as_str())
        .bind(&job.message)
        .bind(job.updated_at)
        .bind(expected.as_str())
        .execute(&*self.db)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    #[tracing::instrument(name = "relational::job::get_active_by_job_agent_id", skip(self))]
    async fn get_active_by_job_agent_id(&self, job_agent_id: &str) -> anyhow::Result<Vec<Job>> {
        let terminal: Vec<String> = JobStatus::TERMINAL
            .iter()
            .map(|status| status.to_string())
            .collect();

        let jobs = sqlx::query_as(
            r#"
            SELECT * FROM jobs
            WHERE job_agent_id = $1 AND NOT (status = ANY($2))
            ORDER BY created_at
            "#,
        )
        .bind(job_agent_id)
        .bind(terminal)
        .fetch_all(&*self.db)
        .await?;

        Ok(jobs)
    }

    #[tracing::instrument(name = "relational::job::get_by_trigger_id", skip(self))]
    async fn get_by_trigger_id(&self, trigger_id: &str) -> anyhow::Result<Vec<Job>> {
        let jobs = sqlx::query_as("SELECT * FROM jobs WHERE trigger_id = $1")
            .bind(trigger_id)
            .fetch_all(&*self.db)
            .await?;

        Ok(jobs)
    }

    #[tracing::instrument(name = "relational::job::get_by_release_and_target", skip(self))]
    async fn get_by_release_and_target(
        &self,
        release_id: &str,
        target_id: &str,
    ) -> anyhow::Result<Vec<Job>> {
        let jobs = sqlx::query_as(
            "SELECT * FROM jobs WHERE release_id = $1 AND target_id = $2 ORDER BY created_at DESC",
        )
        .bind(release_id)
        .bind(target_id)
        .fetch_all(&*self.db)
        .await?;

        Ok(jobs)
    }
}
