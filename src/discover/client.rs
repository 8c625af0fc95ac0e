use k8s_openapi::apimachinery::pkg::apis::meta::v1::{APIGroup, APIResourceList};
use kube::{Client, Error as KubeError};
use tracing::debug;

use super::DiscoverySource;

/// [`DiscoverySource`] backed by a [`kube::Client`].
#[derive(Clone)]
pub struct DiscoverClient {
    client: Client,
}

impl DiscoverClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a client from the local kubeconfig or in-cluster environment.
    pub async fn try_default() -> Result<Self, KubeError> {
        Ok(Self::new(Client::try_default().await?))
    }

    pub fn client(&self) -> &Client {
        &self.client
    }
}

impl DiscoverySource for DiscoverClient {
    async fn server_version(&self) -> Result<String, KubeError> {
        let info = self.client.apiserver_version().await?;
        debug!(git_version = info.git_version.as_str(), "Fetched apiserver version");
        Ok(info.git_version)
    }

    async fn core_versions(&self) -> Result<Vec<String>, KubeError> {
        Ok(self.client.list_core_api_versions().await?.versions)
    }

    async fn core_resources(&self, version: &str) -> Result<APIResourceList, KubeError> {
        debug!(version, "Listing core resources");
        self.client.list_core_api_resources(version).await
    }

    async fn api_groups(&self) -> Result<Vec<APIGroup>, KubeError> {
        Ok(self.client.list_api_groups().await?.groups)
    }

    async fn group_resources(&self, group_version: &str) -> Result<APIResourceList, KubeError> {
        debug!(group_version, "Listing group resources");
        self.client.list_api_group_resources(group_version).await
    }
}
