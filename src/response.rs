use k8s_openapi::apimachinery::pkg::apis::meta::v1::{APIResource, APIResourceList};
use serde::{Deserialize, Serialize};

use crate::{error::ParseError, version::ApiVersion};

/// A single resource entry of a discovery document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    /// Plural resource name, e.g. `pods`, or `pods/log` for a sub-resource.
    pub name: String,
    #[serde(default)]
    pub namespaced: bool,
}

impl ResourceDescriptor {
    pub fn new(name: impl Into<String>, namespaced: bool) -> Self {
        Self {
            name: name.into(),
            namespaced,
        }
    }

    /// Sub-resources such as `pods/log` are addressed through their parent.
    pub fn is_subresource(&self) -> bool {
        self.name.contains('/')
    }
}

impl From<&APIResource> for ResourceDescriptor {
    fn from(resource: &APIResource) -> Self {
        Self::new(resource.name.clone(), resource.namespaced)
    }
}

/// The resources served at one group-version, plus the preferred group-version
/// of the owning group.
///
/// Deserializes from the discovery document shape
/// (`{"groupVersion": "apps/v1", "resources": [{"name": "deployments", "namespaced": true}]}`);
/// unknown fields are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryResponse {
    /// e.g. `apps/v1`, or bare `v1` for the core group.
    pub group_version: String,
    /// Preferred group-version of the owning group, absent for the core group.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_version: Option<String>,
    #[serde(default)]
    pub resources: Vec<ResourceDescriptor>,
}

impl DiscoveryResponse {
    pub fn new(group_version: impl Into<String>, resources: Vec<ResourceDescriptor>) -> Self {
        Self {
            group_version: group_version.into(),
            preferred_version: None,
            resources,
        }
    }

    #[must_use]
    pub fn with_preferred(mut self, preferred_version: impl Into<String>) -> Self {
        self.preferred_version = Some(preferred_version.into());
        self
    }

    /// Build from an `APIResourceList` fetched from the apiserver.
    pub fn from_resource_list(list: &APIResourceList, preferred_version: Option<String>) -> Self {
        Self {
            group_version: list.group_version.clone(),
            preferred_version,
            resources: list.resources.iter().map(ResourceDescriptor::from).collect(),
        }
    }

    /// The parsed version token of [`DiscoveryResponse::group_version`].
    pub fn api_version(&self) -> Result<ApiVersion, ParseError> {
        ApiVersion::from_group_version(&self.group_version)
    }
}

#[cfg(test)]
mod tests {
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::{APIResource, APIResourceList};

    use super::{DiscoveryResponse, ResourceDescriptor};

    #[test]
    fn deserializes_discovery_document() {
        let json = r#"{
            "kind": "APIResourceList",
            "groupVersion": "apps/v1",
            "resources": [
                {"name": "deployments", "singularName": "deployment", "namespaced": true, "kind": "Deployment", "verbs": ["get"]},
                {"name": "deployments/scale", "namespaced": true, "kind": "Scale", "verbs": ["get"]}
            ]
        }"#;
        let response: DiscoveryResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.group_version, "apps/v1");
        assert_eq!(response.preferred_version, None);
        assert_eq!(response.resources, vec![
            ResourceDescriptor::new("deployments", true),
            ResourceDescriptor::new("deployments/scale", true),
        ]);
        assert!(response.resources[1].is_subresource());
        assert_eq!(response.api_version().unwrap().to_string(), "v1");
    }

    #[test]
    fn converts_resource_list() {
        let list = APIResourceList {
            group_version: "rbac.authorization.k8s.io/v1".into(),
            resources: vec![APIResource {
                name: "clusterroles".into(),
                namespaced: false,
                kind: "ClusterRole".into(),
                ..Default::default()
            }],
        };
        let response = DiscoveryResponse::from_resource_list(
            &list,
            Some("rbac.authorization.k8s.io/v1".into()),
        );
        assert_eq!(
            response,
            DiscoveryResponse::new("rbac.authorization.k8s.io/v1", vec![ResourceDescriptor::new(
                "clusterroles",
                false
            )])
            .with_preferred("rbac.authorization.k8s.io/v1")
        );
    }
}
