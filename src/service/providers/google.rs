use async_trait::async_trait;
use futures::future::join_all;
use serde_json::json;
use std::{sync::Arc, time::Duration};
use uuid::Uuid;

use super::{
    labels::{
        insert_present, insert_version_labels, merge_config, merge_labels, parse_version_or_default,
    },
    ClusterApi, ClusterConnection, ClusterDescriptor, NamespaceDescriptor, ProviderAdapter,
    ScanContext,
};
use crate::{
    error::ProviderError,
    models::{Labels, Target, TargetKind, TargetProvider, TargetProviderConfig},
};

pub const KUBERNETES_TARGET_VERSION: &str = "kubernetes/v1";
pub const NAMESPACE_LABEL: &str = "kubernetes/namespace";

const CONSOLE_URL: &str = "https://console.cloud.google.com/kubernetes/clusters/details";

/// Scans GKE: one unit per project, one cluster target per cluster and one
/// namespace target per namespace of each reachable cluster.
#[derive(Debug)]
pub struct GoogleProviderAdapter {
    cluster_api: Arc<dyn ClusterApi>,
    cluster_timeout: Duration,
}

impl GoogleProviderAdapter {
    pub fn new(cluster_api: Arc<dyn ClusterApi>, cluster_timeout: Duration) -> Self {
        Self {
            cluster_api,
            cluster_timeout,
        }
    }

    fn cluster_labels(project_id: &str, cluster: &ClusterDescriptor) -> Labels {
        let mut labels = Labels::new();

        if let (Some(location), Some(name)) = (&cluster.location, &cluster.name) {
            labels.insert(
                "ctrlplane/url".to_string(),
                format!("{CONSOLE_URL}/{location}/{name}/details?project={project_id}"),
            );
        }

        insert_present(&mut labels, "google/self-link", cluster.self_link.as_ref());
        labels.insert("google/project".to_string(), project_id.to_string());
        insert_present(&mut labels, "google/location", cluster.location.as_ref());
        insert_present(&mut labels, "google/autopilot", cluster.autopilot_enabled());

        insert_present(&mut labels, "kubernetes/cluster-name", cluster.name.as_ref());
        insert_present(&mut labels, "kubernetes/cluster-id", cluster.id.as_ref());
        labels.insert("kubernetes/distribution".to_string(), "gke".to_string());
        insert_present(&mut labels, "kubernetes/status", cluster.status.as_ref());
        labels.insert(
            "kubernetes/node-count".to_string(),
            cluster
                .current_node_count
                .map(|count| count.to_string())
                .unwrap_or_else(|| "unknown".to_string()),
        );

        let master_version =
            parse_version_or_default(cluster.current_master_version.as_deref());
        insert_version_labels(&mut labels, "kubernetes/master-version", &master_version);

        let node_version =
            parse_version_or_default(cluster.current_node_version.as_deref());
        insert_version_labels(&mut labels, "kubernetes/node-version", &node_version);

        labels.insert(
            "kubernetes/autoscaling-enabled".to_string(),
            cluster.autoprovisioning_enabled().unwrap_or(false).to_string(),
        );

        merge_labels(&labels, &cluster.resource_labels)
    }

    /// `None` when the cluster has neither a name nor an id to key it by.
    pub fn cluster_target(
        provider: &TargetProvider,
        project_id: &str,
        cluster: &ClusterDescriptor,
    ) -> Option<Target> {
        let cluster_key = cluster.name.as_ref().or(cluster.id.as_ref())?;

        let config = json!({
            "name": cluster.name,
            "status": cluster.status,
            "cluster": {
                "certificateAuthorityData": cluster.ca_certificate(),
                "endpoint": cluster.endpoint.as_ref().map(|endpoint| format!("https://{endpoint}")),
            },
        });

        Some(Target {
            id: Uuid::new_v4().to_string(),
            workspace_id: provider.workspace_id.clone(),
            provider_id: Some(provider.id.clone()),
            identifier: Target::make_identifier(&[project_id, cluster_key]),
            name: cluster_key.clone(),
            kind: TargetKind::KubernetesApi,
            version: KUBERNETES_TARGET_VERSION.to_string(),
            config,
            labels: Self::cluster_labels(project_id, cluster),
            locked_at: None,
        })
    }

    fn namespace_target(
        project_id: &str,
        cluster_name: &str,
        cluster_target: &Target,
        namespace: &NamespaceDescriptor,
    ) -> Option<Target> {
        let metadata = namespace.metadata.as_ref()?;
        let namespace_name = metadata.name.as_deref()?;

        let mut labels = merge_labels(&cluster_target.labels, &metadata.labels);
        labels.insert(NAMESPACE_LABEL.to_string(), namespace_name.to_string());

        Some(Target {
            id: Uuid::new_v4().to_string(),
            identifier: Target::make_identifier(&[project_id, cluster_name, namespace_name]),
            name: format!("{}/{namespace_name}", cluster_target.name),
            kind: TargetKind::KubernetesNamespace,
            config: merge_config(&cluster_target.config, &json!({ "namespace": namespace_name })),
            labels,
            ..cluster_target.clone()
        })
    }

    async fn connect(
        &self,
        project_id: &str,
        location: &str,
        cluster_name: &str,
        context: &ScanContext,
    ) -> Result<ClusterConnection, ProviderError> {
        let cluster = self
            .cluster_api
            .get_cluster(project_id, location, cluster_name, &context.credential)
            .await
            .map_err(|err| connection_failed(cluster_name, err))?;

        let endpoint = cluster
            .endpoint
            .as_ref()
            .ok_or_else(|| ProviderError::ClusterConnectionFailed {
                cluster: cluster_name.to_string(),
                reason: "cluster reports no endpoint".to_string(),
            })?;

        let token = context.credentials.get_access_token().await?;

        Ok(ClusterConnection {
            cluster_name: cluster_name.to_string(),
            endpoint: format!("https://{endpoint}"),
            ca_data: cluster.ca_certificate().map(str::to_string),
            token,
        })
    }

    async fn list_namespaces(
        &self,
        project_id: &str,
        location: &str,
        cluster_name: &str,
        context: &ScanContext,
    ) -> Result<Vec<NamespaceDescriptor>, ProviderError> {
        let connection = self
            .connect(project_id, location, cluster_name, context)
            .await?;

        self.cluster_api
            .list_namespaces(&connection)
            .await
            .map_err(|err| connection_failed(cluster_name, err))
    }

    /// Namespace targets of one cluster. Any failure to reach the cluster is
    /// logged and yields no namespace targets.
    async fn scan_namespaces(
        &self,
        project_id: &str,
        cluster: &ClusterDescriptor,
        cluster_target: &Target,
        context: &ScanContext,
    ) -> Vec<Target> {
        let (cluster_name, location) = match (&cluster.name, &cluster.location) {
            (Some(cluster_name), Some(location)) => (cluster_name, location),
            _ => return vec![],
        };

        let listed = tokio::time::timeout(
            self.cluster_timeout,
            self.list_namespaces(project_id, location, cluster_name, context),
        )
        .await;

        let namespaces = match listed {
            Ok(Ok(namespaces)) => namespaces,
            Ok(Err(err)) => {
                tracing::warn!(
                    "unable to list namespaces of cluster {}: {}",
                    cluster_target.identifier,
                    err
                );
                return vec![];
            }
            Err(_) => {
                tracing::warn!(
                    "listing namespaces of cluster {} timed out after {:?}",
                    cluster_target.identifier,
                    self.cluster_timeout
                );
                return vec![];
            }
        };

        namespaces
            .iter()
            .filter_map(|namespace| {
                Self::namespace_target(project_id, cluster_name, cluster_target, namespace)
            })
            .collect()
    }
}

fn connection_failed(cluster_name: &str, err: ProviderError) -> ProviderError {
    match err {
        ProviderError::ClusterConnectionFailed { .. } => err,
        err => ProviderError::ClusterConnectionFailed {
            cluster: cluster_name.to_string(),
            reason: err.to_string(),
        },
    }
}

#[async_trait]
impl ProviderAdapter for GoogleProviderAdapter {
    fn supports(&self, config: &TargetProviderConfig) -> bool {
        matches!(config, TargetProviderConfig::Google(_))
    }

    fn scan_units(&self, provider: &TargetProvider) -> Vec<String> {
        match &provider.config {
            TargetProviderConfig::Google(config) => config.project_ids.clone(),
        }
    }

    #[tracing::instrument(name = "provider::google::scan_unit", skip(self, provider, context))]
    async fn scan_unit(
        &self,
        provider: &TargetProvider,
        unit: &str,
        context: &ScanContext,
    ) -> Result<Vec<Target>, ProviderError> {
        let clusters = self
            .cluster_api
            .list_clusters(unit, &context.credential)
            .await?;

        let mut scanned_clusters = Vec::with_capacity(clusters.len());
        for cluster in &clusters {
            match Self::cluster_target(provider, unit, cluster) {
                Some(cluster_target) => scanned_clusters.push((cluster, cluster_target)),
                None => tracing::warn!("skipping unnamed cluster in project {}", unit),
            }
        }

        let namespace_scans = scanned_clusters
            .iter()
            .map(|(cluster, cluster_target)| {
                self.scan_namespaces(unit, cluster, cluster_target, context)
            });
        let namespace_targets = join_all(namespace_scans).await;

        let mut targets: Vec<Target> = scanned_clusters
            .into_iter()
            .map(|(_, cluster_target)| cluster_target)
            .collect();
        targets.extend(namespace_targets.into_iter().flatten());

        tracing::info!("scanned {} targets from project {}", targets.len(), unit);

        Ok(targets)
    }
}
