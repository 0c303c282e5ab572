use crate::{
    models::{Environment, EnvironmentPolicy},
    persistence::Persistence,
};

/// Read side of environments and the policies governing them.
#[derive(Debug)]
pub struct EnvironmentService {
    pub environment_persistence: Box<dyn Persistence<Environment>>,
    pub policy_persistence: Box<dyn Persistence<EnvironmentPolicy>>,
}

impl EnvironmentService {
    #[tracing::instrument(name = "service::environment::get_by_id", skip(self))]
    pub async fn get_by_id(&self, environment_id: &str) -> anyhow::Result<Option<Environment>> {
        self.environment_persistence.get_by_id(environment_id).await
    }

    #[tracing::instrument(name = "service::environment::get_policy_by_id", skip(self))]
    pub async fn get_policy_by_id(
        &self,
        policy_id: &str,
    ) -> anyhow::Result<Option<EnvironmentPolicy>> {
        self.policy_persistence.get_by_id(policy_id).await
    }

    /// Policy governing `environment`, if it names one that exists.
    pub async fn get_policy(
        &self,
        environment: &Environment,
    ) -> anyhow::Result<Option<EnvironmentPolicy>> {
        match &environment.policy_id {
            Some(policy_id) => self.get_policy_by_id(policy_id).await,
            None => Ok(None),
        }
    }

    pub async fn upsert(&self, environment: &Environment) -> anyhow::Result<u64> {
        self.environment_persistence.upsert(environment).await
    }

    pub async fn upsert_policy(&self, policy: &EnvironmentPolicy) -> anyhow::Result<u64> {
        self.policy_persistence.upsert(policy).await
    }
}
