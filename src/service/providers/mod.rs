use async_trait::async_trait;
use serde::Deserialize;
use std::{collections::BTreeMap, fmt::Debug, sync::Arc};

use crate::{
    credentials::{Credential, CredentialProvider},
    error::ProviderError,
    models::{Target, TargetProvider, TargetProviderConfig},
};

mod gke;
mod google;
pub mod labels;

pub use gke::GkeClusterApi;
pub use google::GoogleProviderAdapter;

/// Credentials shared by every unit of one reconciliation run.
#[derive(Clone, Debug)]
pub struct ScanContext {
    pub credential: Credential,
    pub credentials: Arc<dyn CredentialProvider>,
}

/// One implementation per external infrastructure type. A scan is split into
/// independent units (projects, accounts) that the reconciler runs
/// concurrently.
#[async_trait]
pub trait ProviderAdapter: Debug + Send + Sync {
    fn supports(&self, config: &TargetProviderConfig) -> bool;

    fn scan_units(&self, provider: &TargetProvider) -> Vec<String>;

    /// Targets for one unit. Failures of children below the unit are
    /// absorbed; an error here means the whole unit produced nothing.
    async fn scan_unit(
        &self,
        provider: &TargetProvider,
        unit: &str,
        context: &ScanContext,
    ) -> Result<Vec<Target>, ProviderError>;
}

/// Managed Kubernetes inventory API plus the cluster API servers behind it.
#[async_trait]
pub trait ClusterApi: Debug + Send + Sync {
    async fn list_clusters(
        &self,
        project_id: &str,
        credential: &Credential,
    ) -> Result<Vec<ClusterDescriptor>, ProviderError>;

    async fn get_cluster(
        &self,
        project_id: &str,
        location: &str,
        cluster_name: &str,
        credential: &Credential,
    ) -> Result<ClusterDescriptor, ProviderError>;

    async fn list_namespaces(
        &self,
        connection: &ClusterConnection,
    ) -> Result<Vec<NamespaceDescriptor>, ProviderError>;
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MasterAuth {
    pub cluster_ca_certificate: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct Autopilot {
    pub enabled: Option<bool>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterAutoscaling {
    pub enable_node_autoprovisioning: Option<bool>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterDescriptor {
    pub name: Option<String>,
    pub id: Option<String>,
    pub location: Option<String>,
    pub self_link: Option<String>,
    pub status: Option<String>,
    pub endpoint: Option<String>,
    pub current_master_version: Option<String>,
    pub current_node_version: Option<String>,
    pub current_node_count: Option<u32>,
    #[serde(default)]
    pub resource_labels: BTreeMap<String, String>,
    pub master_auth: Option<MasterAuth>,
    pub autopilot: Option<Autopilot>,
    pub autoscaling: Option<ClusterAutoscaling>,
}

impl ClusterDescriptor {
    pub fn ca_certificate(&self) -> Option<&str> {
        self.master_auth
            .as_ref()
            .and_then(|auth| auth.cluster_ca_certificate.as_deref())
    }

    pub fn autopilot_enabled(&self) -> Option<bool> {
        self.autopilot.as_ref().and_then(|autopilot| autopilot.enabled)
    }

    pub fn autoprovisioning_enabled(&self) -> Option<bool> {
        self.autoscaling
            .as_ref()
            .and_then(|autoscaling| autoscaling.enable_node_autoprovisioning)
    }
}

/// Reachable API server for one cluster.
#[derive(Clone)]
pub struct ClusterConnection {
    pub cluster_name: String,
    pub endpoint: String,
    /// Base64 encoded PEM bundle.
    pub ca_data: Option<String>,
    pub token: String,
}

impl Debug for ClusterConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterConnection")
            .field("cluster_name", &self.cluster_name)
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct NamespaceMetadata {
    pub name: Option<String>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct NamespaceDescriptor {
    pub metadata: Option<NamespaceMetadata>,
}
