use async_trait::async_trait;

use super::MemoryPersistence;
use crate::{
    models::{Job, JobStatus},
    persistence::{JobPersistence, Persistence},
};

#[derive(Debug, Default)]
pub struct JobMemoryPersistence {
    models: MemoryPersistence<Job>,
}

#[async_trait]
impl Persistence<Job> for JobMemoryPersistence {
    async fn upsert(&self, job: &Job) -> anyhow::Result<u64> {
        self.models.upsert(job).await
    }

    async fn delete(&self, job_id: &str) -> anyhow::Result<u64> {
        self.models.delete(job_id).await
    }

    async fn get_by_id(&self, job_id: &str) -> anyhow::Result<Option<Job>> {
        self.models.get_by_id(job_id).await
    }

    async fn list(&self) -> anyhow::Result<Vec<Job>> {
        self.models.list().await
    }
}

#[async_trait]
impl JobPersistence for JobMemoryPersistence {
    async fn create_if_absent(&self, job: &Job) -> anyhow::Result<bool> {
        let mut locked_jobs = self.models.get_models_locked()?;

        let exists = locked_jobs
            .values()
            .any(|existing| existing.trigger_id == job.trigger_id);

        if exists {
            return Ok(false);
        }

        locked_jobs.insert(job.id.clone(), job.clone());

        Ok(true)
    }

    async fn update_if_status(&self, job: &Job, expected: JobStatus) -> anyhow::Result<bool> {
        let mut locked_jobs = self.models.get_models_locked()?;

        match locked_jobs.get_mut(&job.id) {
            Some(stored) if stored.status == expected => {
                *stored = job.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn get_active_by_job_agent_id(&self, job_agent_id: &str) -> anyhow::Result<Vec<Job>> {
        let mut jobs = self.models.filter(|job| {
            job.job_agent_id.as_deref() == Some(job_agent_id) && !job.status.is_terminal()
        })?;

        jobs.sort_by_key(|job| job.created_at);

        Ok(jobs)
    }

    async fn get_by_trigger_id(&self, trigger_id: &str) -> anyhow::Result<Vec<Job>> {
        self.models.filter(|job| job.trigger_id == trigger_id)
    }

    async fn get_by_release_and_target(
        &self,
        release_id: &str,
        target_id: &str,
    ) -> anyhow::Result<Vec<Job>> {
        let mut jobs = self.models.filter(|job| {
            job.release_id == release_id && job.target_id.as_deref() == Some(target_id)
        })?;

        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(jobs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{models::JobStatus, test::get_job_fixture};

    #[tokio::test]
    async fn test_active_jobs_exclude_terminal() {
        let job_persistence = JobMemoryPersistence::default();

        let scheduled = get_job_fixture(Some("scheduled-job"), JobStatus::Scheduled);
        let completed = get_job_fixture(Some("completed-job"), JobStatus::Completed);

        job_persistence.upsert(&scheduled).await.unwrap();
        job_persistence.upsert(&completed).await.unwrap();

        let active = job_persistence
            .get_active_by_job_agent_id(scheduled.job_agent_id.as_deref().unwrap())
            .await
            .unwrap();

        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, "scheduled-job");
    }

    #[tokio::test]
    async fn test_one_job_per_trigger() {
        let job_persistence = JobMemoryPersistence::default();

        let first = get_job_fixture(Some("first-job"), JobStatus::Scheduled);
        let second = Job {
            id: "second-job".to_string(),
            ..first.clone()
        };

        assert!(job_persistence.create_if_absent(&first).await.unwrap());
        assert!(!job_persistence.create_if_absent(&second).await.unwrap());

        let jobs = job_persistence
            .get_by_trigger_id(&first.trigger_id)
            .await
            .unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].id, "first-job");
    }

    #[tokio::test]
    async fn test_update_if_status_checks_stored_status() {
        let job_persistence = JobMemoryPersistence::default();

        let scheduled = get_job_fixture(Some("job"), JobStatus::Scheduled);
        job_persistence.upsert(&scheduled).await.unwrap();

        let running = Job {
            status: JobStatus::Running,
            ..scheduled.clone()
        };
        assert!(job_persistence
            .update_if_status(&running, JobStatus::Scheduled)
            .await
            .unwrap());

        let cancelled = Job {
            status: JobStatus::Cancelled,
            ..scheduled.clone()
        };
        assert!(!job_persistence
            .update_if_status(&cancelled, JobStatus::Scheduled)
            .await
            .unwrap());

        let stored = job_persistence.get_by_id("job").await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Running);

        let missing = get_job_fixture(Some("missing"), JobStatus::Cancelled);
        assert!(!job_persistence
            .update_if_status(&missing, JobStatus::Scheduled)
            .await
            .unwrap());
    }
}
