use chrono::Utc;
use std::{collections::HashMap, sync::Arc};
use trellis_core::{create_event, EventStream, EventType, ModelType, OperationId};

use super::EnvironmentService;
use crate::{
    error::{DispatchError, PolicyViolation},
    models::{Job, JobStatus},
    persistence::{JobPersistence, Persistence},
};

#[derive(Debug)]
pub struct JobService {
    pub persistence: Box<dyn JobPersistence>,
    pub event_stream: Arc<dyn EventStream>,

    pub environment_service: Arc<EnvironmentService>,
}

/// Attempts at superseding a job whose status keeps changing underneath.
const SUPERSEDE_ATTEMPTS: usize = 3;

impl JobService {
    /// Records `job` unless its trigger already has one. Returns `None` when
    /// the trigger was already dispatched.
    #[tracing::instrument(name = "service::job::create", skip(self))]
    pub async fn create(
        &self,
        job: &Job,
        operation_id: &Option<OperationId>,
    ) -> anyhow::Result<Option<Job>> {
        if !self.persistence.create_if_absent(job).await? {
            tracing::debug!("trigger {} already has a job", job.trigger_id);
            return Ok(None);
        }

        let operation_id = OperationId::unwrap_or_create(operation_id);
        let create_event = create_event(
            &None,
            &Some(job.clone()),
            EventType::Created,
            ModelType::Job,
            &operation_id,
        )?;

        self.event_stream.send(&create_event).await?;

        tracing::info!("job {} created with status {}", job.id, job.status);

        Ok(Some(job.clone()))
    }

    #[tracing::instrument(name = "service::job::get_by_id", skip(self))]
    pub async fn get_by_id(&self, job_id: &str) -> anyhow::Result<Option<Job>> {
        self.persistence.get_by_id(job_id).await
    }

    #[tracing::instrument(name = "service::job::get_by_trigger_id", skip(self))]
    pub async fn get_by_trigger_id(&self, trigger_id: &str) -> anyhow::Result<Vec<Job>> {
        self.persistence.get_by_trigger_id(trigger_id).await
    }

    /// Most recent job deploying `release_id` onto `target_id`.
    #[tracing::instrument(name = "service::job::get_latest", skip(self))]
    pub async fn get_latest(&self, release_id: &str, target_id: &str) -> anyhow::Result<Option<Job>> {
        let jobs = self
            .persistence
            .get_by_release_and_target(release_id, target_id)
            .await?;

        Ok(jobs.into_iter().next())
    }

    /// Non-terminal jobs an agent should pick up, excluding those whose
    /// environment has been soft-deleted. Jobs whose environment row is
    /// missing are kept.
    #[tracing::instrument(name = "service::job::get_active_for_agent", skip(self))]
    pub async fn get_active_for_agent(&self, job_agent_id: &str) -> anyhow::Result<Vec<Job>> {
        let jobs = self
            .persistence
            .get_active_by_job_agent_id(job_agent_id)
            .await?;

        let mut live_environments: HashMap<String, bool> = HashMap::new();
        let mut active_jobs = Vec::with_capacity(jobs.len());

        for job in jobs {
            let live = match live_environments.get(&job.environment_id) {
                Some(live) => *live,
                None => {
                    let live = self
                        .environment_service
                        .get_by_id(&job.environment_id)
                        .await?
                        .map(|environment| !environment.is_deleted())
                        .unwrap_or(true);
                    live_environments.insert(job.environment_id.clone(), live);
                    live
                }
            };

            if live && !job.status.is_terminal() {
                active_jobs.push(job);
            }
        }

        Ok(active_jobs)
    }

    /// Moves a job along its execution state machine.
    #[tracing::instrument(name = "service::job::update_status", skip(self))]
    pub async fn update_status(
        &self,
        job_id: &str,
        status: JobStatus,
        message: Option<&str>,
        operation_id: &Option<OperationId>,
    ) -> Result<Job, DispatchError> {
        let previous = self
            .get_by_id(job_id)
            .await?
            .ok_or_else(|| DispatchError::not_found("job", job_id))?;

        if !previous.status.can_transition_to(status) {
            return Err(DispatchError::InvalidTransition {
                job_id: job_id.to_string(),
                from: previous.status,
                to: status,
            });
        }

        let current = Job {
            status,
            message: message.map(str::to_string).or_else(|| previous.message.clone()),
            updated_at: Utc::now(),
            ..previous.clone()
        };

        if !self
            .persistence
            .update_if_status(&current, previous.status)
            .await?
        {
            return Err(DispatchError::ConcurrentUpdate {
                job_id: job_id.to_string(),
            });
        }

        self.send_updated(&previous, &current, operation_id).await?;

        tracing::info!("job {} moved from {} to {}", job_id, previous.status, status);

        Ok(current)
    }

    /// Cancels the latest job of `release_id` on `target_id` so a forced
    /// release can replace it. The cancel only lands while the job still has
    /// the status that was checked. Returns the superseded job, if any.
    #[tracing::instrument(name = "service::job::supersede_latest", skip(self))]
    pub async fn supersede_latest(
        &self,
        release_id: &str,
        target_id: &str,
        message: &str,
        operation_id: &Option<OperationId>,
    ) -> Result<Option<Job>, DispatchError> {
        let mut last_job_id = String::new();

        for _ in 0..SUPERSEDE_ATTEMPTS {
            let latest = match self.get_latest(release_id, target_id).await? {
                Some(latest) => latest,
                None => return Ok(None),
            };

            if !latest.status.is_supersedable() {
                return Err(PolicyViolation::JobNotSupersedable {
                    job_id: latest.id,
                    status: latest.status,
                }
                .into());
            }

            if latest.status.is_terminal() {
                return Ok(Some(latest));
            }

            let cancelled = Job {
                status: JobStatus::Cancelled,
                message: Some(message.to_string()),
                updated_at: Utc::now(),
                ..latest.clone()
            };

            if self
                .persistence
                .update_if_status(&cancelled, latest.status)
                .await?
            {
                self.send_updated(&latest, &cancelled, operation_id).await?;

                tracing::info!("job {} superseded while {}", latest.id, latest.status);

                return Ok(Some(cancelled));
            }

            tracing::debug!("job {} changed before it could be superseded", latest.id);
            last_job_id = latest.id;
        }

        Err(DispatchError::ConcurrentUpdate {
            job_id: last_job_id,
        })
    }

    async fn send_updated(
        &self,
        previous: &Job,
        current: &Job,
        operation_id: &Option<OperationId>,
    ) -> anyhow::Result<()> {
        let operation_id = OperationId::unwrap_or_create(operation_id);
        let update_event = create_event(
            &Some(previous.clone()),
            &Some(current.clone()),
            EventType::Updated,
            ModelType::Job,
            &operation_id,
        )?;

        self.event_stream.send(&update_event).await
    }
}

#[cfg(test)]
mod tests {
    use trellis_memory_stream::MemoryEventStream;

    use super::*;
    use crate::{
        models::{Environment, EnvironmentPolicy},
        persistence::memory::{JobMemoryPersistence, MemoryPersistence},
        test::{get_environment_fixture, get_job_fixture, JOB_AGENT_FIXTURE_ID},
    };

    async fn job_service() -> JobService {
        let environment_service = EnvironmentService {
            environment_persistence: Box::<MemoryPersistence<Environment>>::default(),
            policy_persistence: Box::<MemoryPersistence<EnvironmentPolicy>>::default(),
        };
        environment_service
            .upsert(&get_environment_fixture(None))
            .await
            .unwrap();

        JobService {
            persistence: Box::<JobMemoryPersistence>::default(),
            event_stream: Arc::new(MemoryEventStream::new().unwrap()),
            environment_service: Arc::new(environment_service),
        }
    }

    #[tokio::test]
    async fn test_active_jobs_never_terminal() {
        dotenvy::from_filename(".env.test").ok();

        let job_service = job_service().await;

        let statuses = [
            JobStatus::Scheduled,
            JobStatus::ActionRequired,
            JobStatus::Running,
            JobStatus::Completed,
            JobStatus::Failure,
            JobStatus::Cancelled,
            JobStatus::Skipped,
            JobStatus::InvalidJobAgent,
        ];
        for status in statuses {
            let job = get_job_fixture(Some(status.as_str()), status);
            job_service.create(&job, &None).await.unwrap();
        }

        let active = job_service
            .get_active_for_agent(JOB_AGENT_FIXTURE_ID)
            .await
            .unwrap();

        let mut active_statuses: Vec<&str> = active.iter().map(|job| job.status.as_str()).collect();
        active_statuses.sort();
        assert_eq!(
            active_statuses,
            vec!["action_required", "running", "scheduled"]
        );

        assert!(job_service
            .get_active_for_agent("some-other-agent")
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_active_jobs_skip_deleted_environments() {
        dotenvy::from_filename(".env.test").ok();

        let job_service = job_service().await;
        job_service
            .create(&get_job_fixture(Some("scheduled"), JobStatus::Scheduled), &None)
            .await
            .unwrap();

        let mut environment = get_environment_fixture(None);
        environment.deleted_at = Some(Utc::now());
        job_service
            .environment_service
            .upsert(&environment)
            .await
            .unwrap();

        let active = job_service
            .get_active_for_agent(JOB_AGENT_FIXTURE_ID)
            .await
            .unwrap();
        assert!(active.is_empty());
    }

    #[tokio::test]
    async fn test_active_jobs_keep_missing_environments() {
        dotenvy::from_filename(".env.test").ok();

        let job_service = job_service().await;

        let mut orphaned = get_job_fixture(Some("orphaned"), JobStatus::Scheduled);
        orphaned.environment_id = "environment-never-stored".to_string();
        job_service.create(&orphaned, &None).await.unwrap();

        let active = job_service
            .get_active_for_agent(JOB_AGENT_FIXTURE_ID)
            .await
            .unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, "orphaned");
    }

    #[tokio::test]
    async fn test_create_skips_dispatched_trigger() {
        dotenvy::from_filename(".env.test").ok();

        let job_service = job_service().await;
        let job = get_job_fixture(Some("job"), JobStatus::Scheduled);

        let created = job_service.create(&job, &None).await.unwrap();
        assert_eq!(created.map(|job| job.id).as_deref(), Some("job"));

        let duplicate = Job {
            id: "duplicate".to_string(),
            ..job.clone()
        };
        assert!(job_service.create(&duplicate, &None).await.unwrap().is_none());
        assert!(job_service.get_by_id("duplicate").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_supersede_latest_cancels_scheduled_job() {
        dotenvy::from_filename(".env.test").ok();

        let job_service = job_service().await;
        let job = get_job_fixture(Some("job"), JobStatus::Scheduled);
        job_service.create(&job, &None).await.unwrap();

        let superseded = job_service
            .supersede_latest(
                &job.release_id,
                job.target_id.as_deref().unwrap(),
                "superseded",
                &None,
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(superseded.status, JobStatus::Cancelled);

        let stored = job_service.get_by_id("job").await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Cancelled);
        assert_eq!(stored.message.as_deref(), Some("superseded"));

        let result = job_service
            .supersede_latest(&job.release_id, "target-without-jobs", "superseded", &None)
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_update_status_follows_state_machine() {
        dotenvy::from_filename(".env.test").ok();

        let job_service = job_service().await;
        let job = get_job_fixture(Some("job"), JobStatus::Scheduled);
        job_service.create(&job, &None).await.unwrap();

        let running = job_service
            .update_status(&job.id, JobStatus::Running, None, &None)
            .await
            .unwrap();
        assert_eq!(running.status, JobStatus::Running);

        let completed = job_service
            .update_status(&job.id, JobStatus::Completed, Some("deployed"), &None)
            .await
            .unwrap();
        assert_eq!(completed.message.as_deref(), Some("deployed"));

        let result = job_service
            .update_status(&job.id, JobStatus::Running, None, &None)
            .await;
        assert!(matches!(
            result,
            Err(DispatchError::InvalidTransition {
                from: JobStatus::Completed,
                to: JobStatus::Running,
                ..
            })
        ));

        let result = job_service
            .update_status("missing", JobStatus::Running, None, &None)
            .await;
        assert!(matches!(result, Err(DispatchError::NotFound { .. })));
    }
}
