use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt::Debug;

use crate::models::{EnvironmentPolicyApproval, Job, JobStatus, ReleaseJobTrigger, Target};

pub mod memory;
pub mod relational;

#[async_trait]
pub trait Persistence<Model>: Debug + Send + Sync {
    async fn upsert(&self, model: &Model) -> anyhow::Result<u64>;
    async fn delete(&self, model_id: &str) -> anyhow::Result<u64>;
    async fn get_by_id(&self, model_id: &str) -> anyhow::Result<Option<Model>>;
    async fn list(&self) -> anyhow::Result<Vec<Model>>;
}

pub trait Persistable<Model> {
    fn get_id(&self) -> String;
}

#[async_trait]
pub trait TargetPersistence: Persistence<Target> {
    /// Writes `target` to the row keyed by `(workspace_id, identifier)`. An
    /// existing row keeps its id and `locked_at`; everything else is
    /// replaced. Returns the stored row.
    async fn upsert_by_identifier(&self, target: &Target) -> anyhow::Result<Target>;
    async fn get_by_identifier(
        &self,
        workspace_id: &str,
        identifier: &str,
    ) -> anyhow::Result<Option<Target>>;
    async fn get_by_provider_id(&self, provider_id: &str) -> anyhow::Result<Vec<Target>>;
    async fn set_locked_at(
        &self,
        target_id: &str,
        locked_at: Option<DateTime<Utc>>,
    ) -> anyhow::Result<u64>;
}

#[async_trait]
pub trait TriggerPersistence: Persistence<ReleaseJobTrigger> {
    async fn get_by_release_id(&self, release_id: &str)
        -> anyhow::Result<Vec<ReleaseJobTrigger>>;
}

#[async_trait]
pub trait ApprovalPersistence: Persistence<EnvironmentPolicyApproval> {
    /// Inserts unless a row for the same (policy, release) pair exists.
    /// Returns whether a row was written.
    async fn insert_if_absent(&self, approval: &EnvironmentPolicyApproval)
        -> anyhow::Result<bool>;
    async fn get_by_policy_and_release(
        &self,
        policy_id: &str,
        release_id: &str,
    ) -> anyhow::Result<Option<EnvironmentPolicyApproval>>;
}

#[async_trait]
pub trait JobPersistence: Persistence<Job> {
    /// Inserts `job` unless a job already exists for its trigger. Returns
    /// whether it was inserted.
    async fn create_if_absent(&self, job: &Job) -> anyhow::Result<bool>;
    /// Writes `job` only while the stored job still has status `expected`.
    /// Returns whether the write happened.
    async fn update_if_status(&self, job: &Job, expected: JobStatus) -> anyhow::Result<bool>;
    /// Jobs for the agent whose status is not terminal.
    async fn get_active_by_job_agent_id(&self, job_agent_id: &str) -> anyhow::Result<Vec<Job>>;
    async fn get_by_trigger_id(&self, trigger_id: &str) -> anyhow::Result<Vec<Job>>;
    /// Newest first.
    async fn get_by_release_and_target(
        &self,
        release_id: &str,
        target_id: &str,
    ) -> anyhow::Result<Vec<Job>>;
}
