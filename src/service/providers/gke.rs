use async_trait::async_trait;
use reqwest::{Certificate, Client};
use serde::{de::DeserializeOwned, Deserialize};
use std::time::Duration;

use super::{ClusterApi, ClusterConnection, ClusterDescriptor, NamespaceDescriptor};
use crate::{credentials::Credential, error::ProviderError};

const CONTAINER_API_URL: &str = "https://container.googleapis.com/v1";

#[derive(Deserialize)]
struct ListClustersResponse {
    #[serde(default)]
    clusters: Vec<ClusterDescriptor>,
}

#[derive(Deserialize)]
struct NamespaceList {
    #[serde(default)]
    items: Vec<NamespaceDescriptor>,
}

/// GKE container API for inventory, Kubernetes core API for namespaces.
#[derive(Debug)]
pub struct GkeClusterApi {
    client: Client,
    request_timeout: Duration,
}

impl GkeClusterApi {
    pub fn new(client: Client, request_timeout: Duration) -> Self {
        Self {
            client,
            request_timeout,
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        client: &Client,
        url: &str,
        token: &str,
    ) -> Result<T, ProviderError> {
        let response = client
            .get(url)
            .bearer_auth(token)
            .timeout(self.request_timeout)
            .send()
            .await?
            .error_for_status()?;

        Ok(response.json().await?)
    }

    /// Client trusting the cluster's own CA in addition to the system roots.
    fn cluster_client(&self, connection: &ClusterConnection) -> Result<Client, ProviderError> {
        let mut builder = Client::builder();

        if let Some(ca_data) = &connection.ca_data {
            let pem = base64::decode(ca_data).map_err(|err| {
                ProviderError::ClusterConnectionFailed {
                    cluster: connection.cluster_name.clone(),
                    reason: format!("invalid CA data: {err}"),
                }
            })?;
            let certificate = Certificate::from_pem(&pem)?;
            builder = builder.add_root_certificate(certificate);
        }

        Ok(builder.build()?)
    }
}

#[async_trait]
impl ClusterApi for GkeClusterApi {
    #[tracing::instrument(name = "provider::gke::list_clusters", skip(self, credential))]
    async fn list_clusters(
        &self,
        project_id: &str,
        credential: &Credential,
    ) -> Result<Vec<ClusterDescriptor>, ProviderError> {
        let url = format!("{CONTAINER_API_URL}/projects/{project_id}/locations/-/clusters");

        let response: ListClustersResponse = self
            .get_json(&self.client, &url, &credential.access_token)
            .await?;

        Ok(response.clusters)
    }

    #[tracing::instrument(name = "provider::gke::get_cluster", skip(self, credential))]
    async fn get_cluster(
        &self,
        project_id: &str,
        location: &str,
        cluster_name: &str,
        credential: &Credential,
    ) -> Result<ClusterDescriptor, ProviderError> {
        let url = format!(
            "{CONTAINER_API_URL}/projects/{project_id}/locations/{location}/clusters/{cluster_name}"
        );

        self.get_json(&self.client, &url, &credential.access_token)
            .await
    }

    #[tracing::instrument(name = "provider::gke::list_namespaces", skip(self))]
    async fn list_namespaces(
        &self,
        connection: &ClusterConnection,
    ) -> Result<Vec<NamespaceDescriptor>, ProviderError> {
        let client = self.cluster_client(connection)?;
        let url = format!("{}/api/v1/namespaces", connection.endpoint);

        let namespaces: NamespaceList = self
            .get_json(&client, &url, &connection.token)
            .await
            .map_err(|err| ProviderError::ClusterConnectionFailed {
                cluster: connection.cluster_name.clone(),
                reason: err.to_string(),
            })?;

        Ok(namespaces.items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_cluster_list() {
        let body = r#"{
            "clusters": [{
                "name": "prod",
                "id": "abc123",
                "location": "us-central1",
                "selfLink": "https://container.googleapis.com/v1/projects/my-project/locations/us-central1/clusters/prod",
                "status": "RUNNING",
                "endpoint": "10.0.0.1",
                "currentMasterVersion": "1.29.4-gke.1043002",
                "currentNodeVersion": "1.29.3-gke.1",
                "currentNodeCount": 3,
                "resourceLabels": { "team": "platform" },
                "masterAuth": { "clusterCaCertificate": "Y2EtZGF0YQ==" },
                "autopilot": { "enabled": true }
            }]
        }"#;

        let response: ListClustersResponse = serde_json::from_str(body).unwrap();
        let cluster = &response.clusters[0];

        assert_eq!(cluster.name.as_deref(), Some("prod"));
        assert_eq!(cluster.current_node_count, Some(3));
        assert_eq!(cluster.ca_certificate(), Some("Y2EtZGF0YQ=="));
        assert_eq!(cluster.autopilot_enabled(), Some(true));
        assert_eq!(cluster.autoprovisioning_enabled(), None);
        assert_eq!(cluster.resource_labels["team"], "platform");

        let empty: ListClustersResponse = serde_json::from_str("{}").unwrap();
        assert!(empty.clusters.is_empty());
    }

    #[test]
    fn test_decode_namespace_list() {
        let body = r#"{
            "kind": "NamespaceList",
            "items": [
                { "metadata": { "name": "default" } },
                { "metadata": { "name": "payments", "labels": { "team": "payments" } } },
                {}
            ]
        }"#;

        let namespaces: NamespaceList = serde_json::from_str(body).unwrap();

        assert_eq!(namespaces.items.len(), 3);
        assert!(namespaces.items[2].metadata.is_none());
        assert_eq!(
            namespaces.items[1].metadata.as_ref().unwrap().labels["team"],
            "payments"
        );
    }
}
