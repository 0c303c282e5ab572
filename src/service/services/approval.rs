use chrono::Utc;
use std::{
    collections::{BTreeSet, HashMap},
    sync::Arc,
};
use trellis_core::{create_event, EventStream, EventType, ModelType, OperationId};

use super::EnvironmentService;
use crate::{
    error::DispatchError,
    models::{ApprovalStatus, EnvironmentPolicyApproval, ReleaseJobTrigger},
    persistence::{ApprovalPersistence, Persistence},
};

/// Outcome of gating one trigger.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum GateDecision {
    Dispatchable,
    AwaitingApproval { policy_id: String },
    Rejected { policy_id: String },
    EnvironmentDeleted,
}

impl GateDecision {
    pub fn is_dispatchable(&self) -> bool {
        *self == GateDecision::Dispatchable
    }
}

/// Creates and resolves manual approvals for (policy, release) pairs.
#[derive(Debug)]
pub struct ApprovalService {
    pub persistence: Box<dyn ApprovalPersistence>,
    pub event_stream: Arc<dyn EventStream>,

    pub environment_service: Arc<EnvironmentService>,
}

impl ApprovalService {
    /// Id of the manual policy governing the environment, if the environment
    /// exists, is not deleted, and requires approval.
    async fn manual_policy_id(&self, environment_id: &str) -> anyhow::Result<Option<String>> {
        let environment = match self.environment_service.get_by_id(environment_id).await? {
            Some(environment) if !environment.is_deleted() => environment,
            _ => return Ok(None),
        };

        let policy = self.environment_service.get_policy(&environment).await?;

        Ok(policy
            .filter(|policy| policy.requires_approval())
            .map(|policy| policy.id))
    }

    /// Ensures a pending approval exists for every distinct (release, policy)
    /// pair the triggers reach through a live, manually approved environment.
    /// Returns the number of approvals created.
    #[tracing::instrument(name = "service::approval::require_approvals", skip(self, triggers))]
    pub async fn require_approvals(
        &self,
        triggers: &[ReleaseJobTrigger],
        operation_id: &Option<OperationId>,
    ) -> anyhow::Result<usize> {
        let environment_ids: BTreeSet<&str> = triggers
            .iter()
            .map(|trigger| trigger.environment_id.as_str())
            .collect();

        let mut manual_policies = HashMap::new();
        for environment_id in environment_ids {
            if let Some(policy_id) = self.manual_policy_id(environment_id).await? {
                manual_policies.insert(environment_id, policy_id);
            }
        }

        let pairs: BTreeSet<(&str, &str)> = triggers
            .iter()
            .filter_map(|trigger| {
                manual_policies
                    .get(trigger.environment_id.as_str())
                    .map(|policy_id| (trigger.release_id.as_str(), policy_id.as_str()))
            })
            .collect();

        if pairs.is_empty() {
            return Ok(0);
        }

        let operation_id = OperationId::unwrap_or_create(operation_id);
        let mut events = Vec::new();

        for (release_id, policy_id) in pairs {
            let approval = EnvironmentPolicyApproval::pending(policy_id, release_id);

            if !self.persistence.insert_if_absent(&approval).await? {
                continue;
            }

            tracing::info!(
                "release {} awaiting approval under policy {}",
                release_id,
                policy_id
            );

            events.push(create_event(
                &None,
                &Some(approval),
                EventType::Created,
                ModelType::Approval,
                &operation_id,
            )?);
        }

        self.event_stream.send_many(&events).await?;

        Ok(events.len())
    }

    #[tracing::instrument(name = "service::approval::get", skip(self))]
    pub async fn get(
        &self,
        policy_id: &str,
        release_id: &str,
    ) -> anyhow::Result<Option<EnvironmentPolicyApproval>> {
        self.persistence
            .get_by_policy_and_release(policy_id, release_id)
            .await
    }

    #[tracing::instrument(name = "service::approval::approve", skip(self))]
    pub async fn approve(
        &self,
        policy_id: &str,
        release_id: &str,
        operation_id: &Option<OperationId>,
    ) -> Result<EnvironmentPolicyApproval, DispatchError> {
        self.resolve(policy_id, release_id, ApprovalStatus::Approved, operation_id)
            .await
    }

    #[tracing::instrument(name = "service::approval::reject", skip(self))]
    pub async fn reject(
        &self,
        policy_id: &str,
        release_id: &str,
        operation_id: &Option<OperationId>,
    ) -> Result<EnvironmentPolicyApproval, DispatchError> {
        self.resolve(policy_id, release_id, ApprovalStatus::Rejected, operation_id)
            .await
    }

    async fn resolve(
        &self,
        policy_id: &str,
        release_id: &str,
        status: ApprovalStatus,
        operation_id: &Option<OperationId>,
    ) -> Result<EnvironmentPolicyApproval, DispatchError> {
        let previous = self
            .get(policy_id, release_id)
            .await?
            .ok_or_else(|| DispatchError::not_found("approval", &format!("{policy_id}/{release_id}")))?;

        if previous.status == status {
            return Ok(previous);
        }

        let current = EnvironmentPolicyApproval {
            status,
            resolved_at: Some(Utc::now()),
            ..previous.clone()
        };

        self.persistence.upsert(&current).await?;

        let operation_id = OperationId::unwrap_or_create(operation_id);
        let update_event = create_event(
            &Some(previous),
            &Some(current.clone()),
            EventType::Updated,
            ModelType::Approval,
            &operation_id,
        )?;

        self.event_stream.send(&update_event).await?;

        tracing::info!(
            "approval for release {} under policy {} {}",
            release_id,
            policy_id,
            status
        );

        Ok(current)
    }

    /// Whether a job may be created for `trigger` without further sign-off.
    #[tracing::instrument(name = "service::approval::evaluate", skip(self))]
    pub async fn evaluate(&self, trigger: &ReleaseJobTrigger) -> Result<GateDecision, DispatchError> {
        let environment = self
            .environment_service
            .get_by_id(&trigger.environment_id)
            .await?
            .ok_or_else(|| DispatchError::not_found("environment", &trigger.environment_id))?;

        if environment.is_deleted() {
            return Ok(GateDecision::EnvironmentDeleted);
        }

        let policy = match self.environment_service.get_policy(&environment).await? {
            Some(policy) if policy.requires_approval() => policy,
            _ => return Ok(GateDecision::Dispatchable),
        };

        let approval = self.get(&policy.id, &trigger.release_id).await?;

        Ok(match approval.map(|approval| approval.status) {
            Some(ApprovalStatus::Approved) => GateDecision::Dispatchable,
            Some(ApprovalStatus::Rejected) => GateDecision::Rejected {
                policy_id: policy.id,
            },
            Some(ApprovalStatus::Pending) | None => GateDecision::AwaitingApproval {
                policy_id: policy.id,
            },
        })
    }
}
