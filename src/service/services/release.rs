use crate::{
    models::{Deployment, Release},
    persistence::Persistence,
};

#[derive(Debug)]
pub struct ReleaseService {
    pub release_persistence: Box<dyn Persistence<Release>>,
    pub deployment_persistence: Box<dyn Persistence<Deployment>>,
}

impl ReleaseService {
    #[tracing::instrument(name = "service::release::get_by_id", skip(self))]
    pub async fn get_by_id(&self, release_id: &str) -> anyhow::Result<Option<Release>> {
        self.release_persistence.get_by_id(release_id).await
    }

    #[tracing::instrument(name = "service::release::get_deployment", skip(self))]
    pub async fn get_deployment(&self, release: &Release) -> anyhow::Result<Option<Deployment>> {
        self.deployment_persistence
            .get_by_id(&release.deployment_id)
            .await
    }

    /// Job agent jobs for `release` are handed to, taken from its deployment.
    pub async fn get_job_agent_id(&self, release: &Release) -> anyhow::Result<Option<String>> {
        let deployment = self.get_deployment(release).await?;

        Ok(deployment.and_then(|deployment| deployment.job_agent_id))
    }

    pub async fn upsert(&self, release: &Release) -> anyhow::Result<u64> {
        self.release_persistence.upsert(release).await
    }

    pub async fn upsert_deployment(&self, deployment: &Deployment) -> anyhow::Result<u64> {
        self.deployment_persistence.upsert(deployment).await
    }
}
