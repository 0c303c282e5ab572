use async_trait::async_trait;

use super::MemoryPersistence;
use crate::{
    models::EnvironmentPolicyApproval,
    persistence::{ApprovalPersistence, Persistence},
};

#[derive(Debug, Default)]
pub struct ApprovalMemoryPersistence {
    models: MemoryPersistence<EnvironmentPolicyApproval>,
}

#[async_trait]
impl Persistence<EnvironmentPolicyApproval> for ApprovalMemoryPersistence {
    async fn upsert(&self, approval: &EnvironmentPolicyApproval) -> anyhow::Result<u64> {
        self.models.upsert(approval).await
    }

    async fn delete(&self, approval_id: &str) -> anyhow::Result<u64> {
        self.models.delete(approval_id).await
    }

    async fn get_by_id(
        &self,
        approval_id: &str,
    ) -> anyhow::Result<Option<EnvironmentPolicyApproval>> {
        self.models.get_by_id(approval_id).await
    }

    async fn list(&self) -> anyhow::Result<Vec<EnvironmentPolicyApproval>> {
        self.models.list().await
    }
}

#[async_trait]
impl ApprovalPersistence for ApprovalMemoryPersistence {
    async fn insert_if_absent(
        &self,
        approval: &EnvironmentPolicyApproval,
    ) -> anyhow::Result<bool> {
        // check and insert under one lock
        let mut locked_approvals = self.models.get_models_locked()?;

        let exists = locked_approvals.values().any(|existing| {
            existing.policy_id == approval.policy_id && existing.release_id == approval.release_id
        });

        if exists {
            return Ok(false);
        }

        locked_approvals.insert(approval.id.clone(), approval.clone());

        Ok(true)
    }

    async fn get_by_policy_and_release(
        &self,
        policy_id: &str,
        release_id: &str,
    ) -> anyhow::Result<Option<EnvironmentPolicyApproval>> {
        let matching = self.models.filter(|approval| {
            approval.policy_id == policy_id && approval.release_id == release_id
        })?;

        Ok(matching.into_iter().next())
    }
}
