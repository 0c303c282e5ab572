use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::Arc,
};
use trellis_core::EventStream;

use crate::{
    credentials::{Credential, CredentialProvider, StaticCredentialProvider},
    error::ProviderError,
    models::{
        ApprovalRequirement, Deployment, Environment, EnvironmentPolicy, GoogleProviderConfig,
        Job, JobStatus, Labels, Release, ReleaseJobTrigger, Target, TargetKind, TargetProvider,
        TargetProviderConfig, TriggerType,
    },
    providers::{
        Autopilot, ClusterApi, ClusterConnection, ClusterDescriptor, MasterAuth,
        NamespaceDescriptor, NamespaceMetadata, ScanContext,
    },
    services::{Persistences, Services},
};

pub const WORKSPACE_FIXTURE_ID: &str = "workspace-fixture";
pub const JOB_AGENT_FIXTURE_ID: &str = "job-agent-fixture";
pub const MANUAL_POLICY_FIXTURE_ID: &str = "manual-policy";
pub const AUTOMATIC_POLICY_FIXTURE_ID: &str = "automatic-policy";

pub fn get_target_provider_fixture(id: Option<&str>) -> TargetProvider {
    TargetProvider {
        id: id.unwrap_or("target-provider-fixture").to_string(),
        workspace_id: WORKSPACE_FIXTURE_ID.to_string(),
        name: "gke".to_string(),
        config: TargetProviderConfig::Google(GoogleProviderConfig {
            project_ids: vec!["my-project".to_string()],
            impersonate_service_account: None,
        }),
    }
}

pub fn get_target_fixture(identifier: Option<&str>) -> Target {
    let identifier = identifier.unwrap_or("my-project/prod-cluster");
    let labels = Labels::from([
        ("google/project".to_string(), "my-project".to_string()),
        ("kubernetes/distribution".to_string(), "gke".to_string()),
    ]);

    Target {
        id: format!("target:{identifier}"),
        workspace_id: WORKSPACE_FIXTURE_ID.to_string(),
        provider_id: Some(get_target_provider_fixture(None).id),
        identifier: identifier.to_string(),
        name: identifier.rsplit('/').next().unwrap_or(identifier).to_string(),
        kind: TargetKind::KubernetesApi,
        version: "kubernetes/v1".to_string(),
        config: json!({ "cluster": { "endpoint": "https://10.0.0.1" } }),
        labels,
        locked_at: None,
    }
}

pub fn get_deployment_fixture(job_agent_id: Option<&str>) -> Deployment {
    Deployment {
        id: "deployment-fixture".to_string(),
        name: "api".to_string(),
        job_agent_id: job_agent_id.map(str::to_string),
    }
}

pub fn get_release_fixture(id: Option<&str>) -> Release {
    Release {
        id: id.unwrap_or("release-fixture").to_string(),
        deployment_id: get_deployment_fixture(None).id,
        version: "1.0.0".to_string(),
        created_at: Utc::now(),
    }
}

pub fn get_policy_fixture(id: Option<&str>, requirement: ApprovalRequirement) -> EnvironmentPolicy {
    EnvironmentPolicy {
        id: id.unwrap_or("policy-fixture").to_string(),
        name: format!("{requirement} approvals"),
        approval_requirement: requirement,
    }
}

pub fn get_environment_fixture(policy_id: Option<&str>) -> Environment {
    let id = match policy_id {
        Some(policy_id) => format!("environment:{policy_id}"),
        None => "environment-fixture".to_string(),
    };

    Environment {
        id,
        name: "production".to_string(),
        policy_id: policy_id.map(str::to_string),
        deleted_at: None,
    }
}

pub fn get_trigger_fixture(
    release_id: &str,
    environment_id: &str,
    target_id: Option<&str>,
) -> ReleaseJobTrigger {
    ReleaseJobTrigger::new(TriggerType::NewRelease, release_id, environment_id, target_id)
}

pub fn get_job_fixture(id: Option<&str>, status: JobStatus) -> Job {
    let release = get_release_fixture(None);
    let environment = get_environment_fixture(None);
    let target = get_target_fixture(None);
    let trigger = get_trigger_fixture(&release.id, &environment.id, Some(&target.id));

    let mut job = Job::for_trigger(&trigger, Some(JOB_AGENT_FIXTURE_ID), false);
    if let Some(id) = id {
        job.id = id.to_string();
    }
    job.status = status;

    job
}

pub fn get_cluster_descriptor_fixture(name: &str, location: &str) -> ClusterDescriptor {
    ClusterDescriptor {
        name: Some(name.to_string()),
        id: Some(format!("{name}-id")),
        location: Some(location.to_string()),
        self_link: Some(format!(
            "https://container.googleapis.com/v1/projects/my-project/locations/{location}/clusters/{name}"
        )),
        status: Some("RUNNING".to_string()),
        endpoint: Some("10.0.0.1".to_string()),
        current_master_version: Some("1.29.4-gke.1043002".to_string()),
        current_node_version: Some("1.29.3-gke.1".to_string()),
        current_node_count: Some(3),
        resource_labels: BTreeMap::from([("team".to_string(), "platform".to_string())]),
        master_auth: Some(MasterAuth {
            cluster_ca_certificate: Some("Y2EtZGF0YQ==".to_string()),
        }),
        autopilot: Some(Autopilot { enabled: None }),
        autoscaling: None,
    }
}

pub fn get_scan_context_fixture() -> ScanContext {
    ScanContext {
        credential: Credential {
            access_token: "test-token".to_string(),
            principal: None,
            expires_at: None,
        },
        credentials: Arc::new(StaticCredentialProvider::new("test-token")),
    }
}

/// Credential exchange that always fails.
#[derive(Debug, Default)]
pub struct UnavailableCredentialProvider;

#[async_trait]
impl CredentialProvider for UnavailableCredentialProvider {
    async fn get_credential(&self, _: Option<&str>) -> Result<Credential, ProviderError> {
        Err(ProviderError::CredentialUnavailable(
            "no credentials configured".to_string(),
        ))
    }

    async fn get_access_token(&self) -> Result<String, ProviderError> {
        Err(ProviderError::CredentialUnavailable(
            "no credentials configured".to_string(),
        ))
    }
}

/// In-memory provider inventory. Clusters are keyed by project, namespaces
/// by cluster name.
#[derive(Debug, Default)]
pub struct FakeClusterApi {
    clusters: HashMap<String, Vec<ClusterDescriptor>>,
    namespaces: HashMap<String, Vec<NamespaceDescriptor>>,
    failing_projects: HashSet<String>,
    hanging_projects: HashSet<String>,
    unreachable_clusters: HashSet<String>,
    hanging_clusters: HashSet<String>,
}

impl FakeClusterApi {
    pub fn with_cluster(mut self, project_id: &str, cluster: ClusterDescriptor) -> Self {
        self.clusters
            .entry(project_id.to_string())
            .or_default()
            .push(cluster);
        self
    }

    pub fn with_namespace(mut self, cluster_name: &str, name: &str, labels: &[(&str, &str)]) -> Self {
        let labels = labels
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();

        self.namespaces
            .entry(cluster_name.to_string())
            .or_default()
            .push(NamespaceDescriptor {
                metadata: Some(NamespaceMetadata {
                    name: Some(name.to_string()),
                    labels,
                }),
            });
        self
    }

    pub fn failing_project(mut self, project_id: &str) -> Self {
        self.failing_projects.insert(project_id.to_string());
        self
    }

    pub fn hanging_project(mut self, project_id: &str) -> Self {
        self.hanging_projects.insert(project_id.to_string());
        self
    }

    pub fn unreachable_cluster(mut self, cluster_name: &str) -> Self {
        self.unreachable_clusters.insert(cluster_name.to_string());
        self
    }

    pub fn hanging_cluster(mut self, cluster_name: &str) -> Self {
        self.hanging_clusters.insert(cluster_name.to_string());
        self
    }
}

#[async_trait]
impl ClusterApi for FakeClusterApi {
    async fn list_clusters(
        &self,
        project_id: &str,
        _: &Credential,
    ) -> Result<Vec<ClusterDescriptor>, ProviderError> {
        if self.hanging_projects.contains(project_id) {
            std::future::pending::<()>().await;
        }

        if self.failing_projects.contains(project_id) {
            return Err(ProviderError::Api(format!("project {project_id} is unavailable")));
        }

        Ok(self.clusters.get(project_id).cloned().unwrap_or_default())
    }

    async fn get_cluster(
        &self,
        project_id: &str,
        _: &str,
        cluster_name: &str,
        _: &Credential,
    ) -> Result<ClusterDescriptor, ProviderError> {
        if self.hanging_clusters.contains(cluster_name) {
            std::future::pending::<()>().await;
        }

        if self.unreachable_clusters.contains(cluster_name) {
            return Err(ProviderError::ClusterConnectionFailed {
                cluster: cluster_name.to_string(),
                reason: "connection refused".to_string(),
            });
        }

        self.clusters
            .get(project_id)
            .and_then(|clusters| {
                clusters
                    .iter()
                    .find(|cluster| cluster.name.as_deref() == Some(cluster_name))
            })
            .cloned()
            .ok_or_else(|| ProviderError::Api(format!("cluster {cluster_name} not found")))
    }

    async fn list_namespaces(
        &self,
        connection: &ClusterConnection,
    ) -> Result<Vec<NamespaceDescriptor>, ProviderError> {
        Ok(self
            .namespaces
            .get(&connection.cluster_name)
            .cloned()
            .unwrap_or_default())
    }
}

/// Services over memory persistences seeded with a deployment handled by
/// `JOB_AGENT_FIXTURE_ID`, the release fixture, one manual and one automatic
/// environment, and the target fixture.
pub async fn get_services_fixture(event_stream: Arc<dyn EventStream>) -> anyhow::Result<Services> {
    get_seeded_services_fixture(Persistences::memory(), event_stream).await
}

pub async fn get_seeded_services_fixture(
    persistences: Persistences,
    event_stream: Arc<dyn EventStream>,
) -> anyhow::Result<Services> {
    let services = Services::new(persistences, event_stream);

    services
        .release
        .upsert_deployment(&get_deployment_fixture(Some(JOB_AGENT_FIXTURE_ID)))
        .await?;
    services.release.upsert(&get_release_fixture(None)).await?;

    for (policy_id, requirement) in [
        (MANUAL_POLICY_FIXTURE_ID, ApprovalRequirement::Manual),
        (AUTOMATIC_POLICY_FIXTURE_ID, ApprovalRequirement::Automatic),
    ] {
        services
            .environment
            .upsert_policy(&get_policy_fixture(Some(policy_id), requirement))
            .await?;
        services
            .environment
            .upsert(&get_environment_fixture(Some(policy_id)))
            .await?;
    }

    services
        .target
        .upsert_many(&[get_target_fixture(None)], &None)
        .await?;

    Ok(services)
}
