use std::sync::Arc;
use trellis_core::OperationId;

use super::{
    ApprovalService, EnvironmentService, GateDecision, JobService, ReleaseService, TargetService,
    TriggerService,
};
use crate::{
    error::{DispatchError, PolicyViolation},
    models::{Job, ReleaseJobTrigger, TriggerType},
};

pub const SUPERSEDED_MESSAGE: &str = "superseded by forced release";

/// Why a trigger produced no job in this pass.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SkipReason {
    AlreadyDispatched,
    AwaitingApproval { policy_id: String },
    ApprovalRejected { policy_id: String },
    EnvironmentDeleted,
    TargetLocked,
    TargetMissing,
    ForcedRelease,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SkippedTrigger {
    pub trigger_id: String,
    pub reason: SkipReason,
}

#[derive(Clone, Debug, Default)]
pub struct DispatchReport {
    pub jobs: Vec<Job>,
    pub skipped: Vec<SkippedTrigger>,
}

impl DispatchReport {
    fn skip(&mut self, trigger: &ReleaseJobTrigger, reason: SkipReason) {
        tracing::debug!("trigger {} not dispatched: {:?}", trigger.id, reason);

        self.skipped.push(SkippedTrigger {
            trigger_id: trigger.id.clone(),
            reason,
        });
    }
}

/// Turns triggers into jobs once the policy gate allows it, and implements
/// the forced release override.
#[derive(Debug)]
pub struct Dispatcher {
    pub approval_service: Arc<ApprovalService>,
    pub environment_service: Arc<EnvironmentService>,
    pub job_service: Arc<JobService>,
    pub release_service: Arc<ReleaseService>,
    pub target_service: Arc<TargetService>,
    pub trigger_service: Arc<TriggerService>,
}

impl Dispatcher {
    /// Records a batch of new triggers and dispatches what the gate allows.
    #[tracing::instrument(name = "service::dispatch::dispatch", skip(self, triggers))]
    pub async fn dispatch(
        &self,
        triggers: &[ReleaseJobTrigger],
        operation_id: &Option<OperationId>,
    ) -> Result<DispatchReport, DispatchError> {
        let operation_id = Some(OperationId::unwrap_or_create(operation_id));

        self.trigger_service
            .create_many(triggers, &operation_id)
            .await?;

        self.dispatch_existing(triggers, &operation_id).await
    }

    /// Dispatches triggers that are already stored, creating approvals for
    /// any that need sign-off first.
    #[tracing::instrument(name = "service::dispatch::dispatch_existing", skip(self, triggers))]
    pub async fn dispatch_existing(
        &self,
        triggers: &[ReleaseJobTrigger],
        operation_id: &Option<OperationId>,
    ) -> Result<DispatchReport, DispatchError> {
        let operation_id = Some(OperationId::unwrap_or_create(operation_id));

        self.approval_service
            .require_approvals(triggers, &operation_id)
            .await?;

        self.dispatch_each(triggers, &operation_id).await
    }

    /// Re-evaluates every trigger of a release, typically after its approval
    /// was granted.
    #[tracing::instrument(name = "service::dispatch::resume_release", skip(self))]
    pub async fn resume_release(
        &self,
        release_id: &str,
        operation_id: &Option<OperationId>,
    ) -> Result<DispatchReport, DispatchError> {
        let triggers = self.trigger_service.get_by_release_id(release_id).await?;

        let report = self.dispatch_each(&triggers, operation_id).await?;

        tracing::info!(
            "resumed release {}: {} jobs created, {} triggers skipped",
            release_id,
            report.jobs.len(),
            report.skipped.len()
        );

        Ok(report)
    }

    async fn dispatch_each(
        &self,
        triggers: &[ReleaseJobTrigger],
        operation_id: &Option<OperationId>,
    ) -> Result<DispatchReport, DispatchError> {
        let mut report = DispatchReport::default();

        for trigger in triggers {
            match self.dispatch_trigger(trigger, operation_id).await? {
                Ok(job) => report.jobs.push(job),
                Err(reason) => report.skip(trigger, reason),
            }
        }

        Ok(report)
    }

    async fn dispatch_trigger(
        &self,
        trigger: &ReleaseJobTrigger,
        operation_id: &Option<OperationId>,
    ) -> Result<Result<Job, SkipReason>, DispatchError> {
        // forced releases create their own job
        if trigger.trigger_type == TriggerType::ForceDeploy {
            return Ok(Err(SkipReason::ForcedRelease));
        }

        if !self
            .job_service
            .get_by_trigger_id(&trigger.id)
            .await?
            .is_empty()
        {
            return Ok(Err(SkipReason::AlreadyDispatched));
        }

        match self.approval_service.evaluate(trigger).await? {
            GateDecision::Dispatchable => {}
            GateDecision::AwaitingApproval { policy_id } => {
                return Ok(Err(SkipReason::AwaitingApproval { policy_id }))
            }
            GateDecision::Rejected { policy_id } => {
                return Ok(Err(SkipReason::ApprovalRejected { policy_id }))
            }
            GateDecision::EnvironmentDeleted => return Ok(Err(SkipReason::EnvironmentDeleted)),
        }

        if let Some(target_id) = &trigger.target_id {
            match self.target_service.get_by_id(target_id).await? {
                Some(target) if target.is_locked() => return Ok(Err(SkipReason::TargetLocked)),
                Some(_) => {}
                None => return Ok(Err(SkipReason::TargetMissing)),
            }
        }

        let job_agent_id = self.get_job_agent_id(&trigger.release_id).await?;
        let job = Job::for_trigger(trigger, job_agent_id.as_deref(), false);

        let created = self.job_service.create(&job, operation_id).await?;

        Ok(created.ok_or(SkipReason::AlreadyDispatched))
    }

    async fn get_job_agent_id(&self, release_id: &str) -> Result<Option<String>, DispatchError> {
        let release = self
            .release_service
            .get_by_id(release_id)
            .await?
            .ok_or_else(|| DispatchError::not_found("release", release_id))?;

        Ok(self.release_service.get_job_agent_id(&release).await?)
    }

    /// Dispatches `release_id` onto one target without consulting the
    /// approval policy. Refused without side effects when the target is
    /// locked or its latest job for the release is still executing. The
    /// latest job is superseded before the forced trigger is recorded.
    #[tracing::instrument(name = "service::dispatch::force_release", skip(self))]
    pub async fn force_release(
        &self,
        release_id: &str,
        target_id: &str,
        environment_id: &str,
        operation_id: &Option<OperationId>,
    ) -> Result<Job, DispatchError> {
        let target = self
            .target_service
            .get_by_id(target_id)
            .await?
            .ok_or_else(|| DispatchError::not_found("target", target_id))?;

        if let Some(locked_at) = target.locked_at {
            return Err(rejected(PolicyViolation::TargetLocked {
                target_id: target.id,
                locked_at,
            }));
        }

        let environment = self
            .environment_service
            .get_by_id(environment_id)
            .await?
            .ok_or_else(|| DispatchError::not_found("environment", environment_id))?;

        if environment.is_deleted() {
            return Err(rejected(PolicyViolation::EnvironmentDeleted {
                environment_id: environment.id,
            }));
        }

        let job_agent_id = self.get_job_agent_id(release_id).await?;

        let operation_id = Some(OperationId::unwrap_or_create(operation_id));

        let superseded = self
            .job_service
            .supersede_latest(release_id, target_id, SUPERSEDED_MESSAGE, &operation_id)
            .await
            .map_err(|err| match err {
                DispatchError::PolicyViolation(violation) => rejected(violation),
                err => err,
            })?;

        let mut trigger = ReleaseJobTrigger::new(
            TriggerType::ForceDeploy,
            release_id,
            environment_id,
            Some(target_id),
        );
        trigger.caused_by_id = superseded.map(|job| job.id);

        self.trigger_service
            .create_many(&[trigger.clone()], &operation_id)
            .await?;

        let job = Job::for_trigger(&trigger, job_agent_id.as_deref(), true);
        let job = self
            .job_service
            .create(&job, &operation_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("trigger {} already has a job", trigger.id))?;

        tracing::info!(
            "forced release {} onto target {} as job {}",
            release_id,
            target.identifier,
            job.id
        );

        Ok(job)
    }
}

fn rejected(violation: PolicyViolation) -> DispatchError {
    tracing::warn!("force release rejected: {}", violation);

    DispatchError::PolicyViolation(violation)
}
