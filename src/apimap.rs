//! Per-cluster mapping from resource name to the group-version that serves it.
use std::{
    cmp::Ordering,
    collections::{BTreeMap, btree_map::Entry},
};

use serde::Serialize;

use crate::{error::ParseError, response::DiscoveryResponse, version::ApiVersion};

mod cache;
pub use cache::ApiMapCache;

/// Where a resource is served.
///
/// Equality only looks at where the resource is addressed, not at whether the
/// mapping is pinned.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceMapping {
    group_version: String,
    namespaced: bool,
    /// Installed from a group's preferred version; later folds never replace it.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pinned: bool,
    #[serde(skip)]
    version: ApiVersion,
}

impl ResourceMapping {
    /// Fails when the version segment of `group_version` is not a valid version token.
    pub fn new(group_version: impl Into<String>, namespaced: bool) -> Result<Self, ParseError> {
        let group_version = group_version.into();
        let version = ApiVersion::from_group_version(&group_version)?;
        Ok(Self {
            group_version,
            namespaced,
            pinned: false,
            version,
        })
    }

    /// The path segment to address the resource with, e.g. `apps/v1` or `v1`.
    pub fn group_version(&self) -> &str {
        &self.group_version
    }

    /// Whether requests need a namespace segment.
    pub fn namespaced(&self) -> bool {
        self.namespaced
    }

    pub fn version(&self) -> &ApiVersion {
        &self.version
    }

    /// Whether the mapping sits on its group's preferred version.
    pub fn is_pinned(&self) -> bool {
        self.pinned
    }
}

impl PartialEq for ResourceMapping {
    fn eq(&self, other: &Self) -> bool {
        self.group_version == other.group_version && self.namespaced == other.namespaced
    }
}

impl Eq for ResourceMapping {}

/// Counters of a single fold, used for logging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FoldSummary {
    pub inserted: usize,
    pub replaced: usize,
    pub retained: usize,
    pub pinned: usize,
    pub subresources: usize,
}

/// Resource name to [`ResourceMapping`] for one cluster version.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ApiMap {
    resources: BTreeMap<String, ResourceMapping>,
}

impl ApiMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one discovery response into the map.
    ///
    /// For every non sub-resource entry the mapping is inserted when missing.
    /// A mapping installed from its group's preferred version is pinned and
    /// never displaced, whichever group later responses come from; otherwise
    /// it is replaced only by a strictly greater version token.
    ///
    /// Nothing is modified when the response's group-version does not parse.
    pub fn fold(&mut self, response: &DiscoveryResponse) -> Result<FoldSummary, ParseError> {
        let incoming = response.api_version()?;
        let preferred = response.preferred_version.as_deref();
        let pinned = preferred == Some(response.group_version.as_str());
        let mut summary = FoldSummary::default();

        for resource in &response.resources {
            if resource.is_subresource() {
                summary.subresources += 1;
                continue;
            }
            let mapping = ResourceMapping {
                group_version: response.group_version.clone(),
                namespaced: resource.namespaced,
                pinned,
                version: incoming.clone(),
            };
            match self.resources.entry(resource.name.clone()) {
                Entry::Vacant(entry) => {
                    entry.insert(mapping);
                    summary.inserted += 1;
                }
                Entry::Occupied(mut entry) => {
                    let existing = entry.get_mut();
                    if existing.pinned || preferred == Some(existing.group_version.as_str()) {
                        existing.pinned = true;
                        summary.pinned += 1;
                    } else if incoming.compare(&existing.version) == Ordering::Greater {
                        entry.insert(mapping);
                        summary.replaced += 1;
                    } else {
                        summary.retained += 1;
                    }
                }
            }
        }
        Ok(summary)
    }

    /// Exact lookup.
    pub fn get(&self, resource: &str) -> Option<&ResourceMapping> {
        self.resources.get(resource)
    }

    /// Lookup by lower-cased name, then once more with a trailing `s`.
    pub fn resolve(&self, resource: &str) -> Option<&ResourceMapping> {
        let resource = resource.to_ascii_lowercase();
        self.get(&resource)
            .or_else(|| self.get(&format!("{resource}s")))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ResourceMapping)> {
        self.resources.iter().map(|(name, mapping)| (name.as_str(), mapping))
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

/// Result of [`ApiMapCache::lookup`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// The resource, or its naive plural, is mapped.
    Found(ResourceMapping),
    /// The cluster version is known but the resource is not; the whole map is
    /// handed back for the caller to search.
    FallbackAll(ApiMap),
    /// Nothing was ever folded for the cluster version.
    UnknownCluster,
}

impl Lookup {
    pub fn found(self) -> Option<ResourceMapping> {
        match self {
            Lookup::Found(mapping) => Some(mapping),
            _ => None,
        }
    }

    pub fn is_unknown_cluster(&self) -> bool {
        matches!(self, Lookup::UnknownCluster)
    }
}

#[cfg(test)]
mod tests {
    use super::{ApiMap, FoldSummary, ResourceMapping};
    use crate::{
        error::ParseError,
        response::{DiscoveryResponse, ResourceDescriptor},
    };

    fn response(group_version: &str, resources: &[(&str, bool)]) -> DiscoveryResponse {
        DiscoveryResponse::new(
            group_version,
            resources
                .iter()
                .map(|(name, namespaced)| ResourceDescriptor::new(*name, *namespaced))
                .collect(),
        )
    }

    fn mapping(group_version: &str, namespaced: bool) -> ResourceMapping {
        ResourceMapping::new(group_version, namespaced).unwrap()
    }

    #[test]
    fn inserts_and_skips_subresources() {
        let mut map = ApiMap::new();
        let summary = map
            .fold(&response("v1", &[("pods", true), ("pods/log", true), ("nodes", false)]))
            .unwrap();
        assert_eq!(summary, FoldSummary {
            inserted: 2,
            subresources: 1,
            ..Default::default()
        });
        assert_eq!(map.get("pods"), Some(&mapping("v1", true)));
        assert_eq!(map.get("nodes"), Some(&mapping("v1", false)));
        assert_eq!(map.get("pods/log"), None);
        assert_eq!(map.get("log"), None);
    }

    #[test]
    fn subresource_never_overwrites() {
        let mut map = ApiMap::new();
        map.fold(&response("v1", &[("log", true)])).unwrap();
        map.fold(&response("v2", &[("pods/log", false)])).unwrap();
        assert_eq!(map.get("log"), Some(&mapping("v1", true)));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn fold_is_idempotent() {
        let apps = response("apps/v1beta1", &[("deployments", true)]).with_preferred("apps/v1");
        let mut once = ApiMap::new();
        once.fold(&apps).unwrap();
        let mut twice = once.clone();
        let summary = twice.fold(&apps).unwrap();
        assert_eq!(once, twice);
        assert_eq!(summary.retained, 1);
    }

    #[test]
    fn greater_version_replaces() {
        let mut map = ApiMap::new();
        map.fold(&response("extensions/v1beta1", &[("deployments", true)]))
            .unwrap();
        map.fold(&response("apps/v1beta2", &[("deployments", true)]))
            .unwrap();
        assert_eq!(map.get("deployments"), Some(&mapping("apps/v1beta2", true)));

        map.fold(&response("apps/v1alpha1", &[("deployments", true)]))
            .unwrap();
        assert_eq!(map.get("deployments"), Some(&mapping("apps/v1beta2", true)));
    }

    #[test]
    fn preferred_version_is_sticky() {
        let mut map = ApiMap::new();
        map.fold(&response("apps/v1", &[("deployments", true)]).with_preferred("apps/v1"))
            .unwrap();
        let summary = map
            .fold(&response("apps/v2", &[("deployments", false)]).with_preferred("apps/v1"))
            .unwrap();
        assert_eq!(summary.pinned, 1);
        assert_eq!(map.get("deployments"), Some(&mapping("apps/v1", true)));
    }

    #[test]
    fn preferred_version_survives_other_groups() {
        let mut map = ApiMap::new();
        map.fold(&response("apps/v1", &[("deployments", true)]).with_preferred("apps/v1"))
            .unwrap();
        assert!(map.get("deployments").unwrap().is_pinned());

        let summary = map
            .fold(
                &response("example.io/v2", &[("deployments", true)])
                    .with_preferred("example.io/v2"),
            )
            .unwrap();
        assert_eq!(summary.pinned, 1);
        assert_eq!(map.get("deployments"), Some(&mapping("apps/v1", true)));

        map.fold(&response("example.io/v3", &[("deployments", true)]))
            .unwrap();
        assert_eq!(map.get("deployments"), Some(&mapping("apps/v1", true)));
    }

    #[test]
    fn preferred_replacement_pins() {
        let mut map = ApiMap::new();
        map.fold(&response("apps/v1beta1", &[("deployments", true)]).with_preferred("apps/v1"))
            .unwrap();
        assert!(!map.get("deployments").unwrap().is_pinned());
        map.fold(&response("apps/v1", &[("deployments", true)]).with_preferred("apps/v1"))
            .unwrap();
        let deployments = map.get("deployments").unwrap();
        assert_eq!(deployments.group_version(), "apps/v1");
        assert!(deployments.is_pinned());
    }

    #[test]
    fn preferred_that_was_never_folded_does_not_pin() {
        let mut map = ApiMap::new();
        map.fold(&response("apps/v1beta2", &[("deployments", true)]).with_preferred("apps/v1"))
            .unwrap();
        map.fold(&response("apps/v1beta1", &[("deployments", true)]).with_preferred("apps/v1"))
            .unwrap();
        assert_eq!(map.get("deployments"), Some(&mapping("apps/v1beta2", true)));
    }

    #[test]
    fn malformed_group_version_changes_nothing() {
        let mut map = ApiMap::new();
        map.fold(&response("v1", &[("pods", true)])).unwrap();
        let before = map.clone();
        assert_eq!(
            map.fold(&response("example.com/stable", &[("widgets", true)])),
            Err(ParseError::InvalidVersion("stable".into()))
        );
        assert_eq!(map, before);
    }

    #[test]
    fn resolve_falls_back_to_plural() {
        let mut map = ApiMap::new();
        map.fold(&response("v1", &[("pods", true)])).unwrap();
        assert_eq!(map.resolve("pod"), map.get("pods"));
        assert_eq!(map.resolve("Pods"), map.get("pods"));
        assert_eq!(map.resolve("po"), None);
    }

    #[test]
    fn serializes_as_json_object() {
        let mut map = ApiMap::new();
        map.fold(&response("v1", &[("pods", true)])).unwrap();
        assert_eq!(
            serde_json::to_value(&map).unwrap(),
            serde_json::json!({"pods": {"groupVersion": "v1", "namespaced": true}})
        );

        map.fold(&response("apps/v1", &[("deployments", true)]).with_preferred("apps/v1"))
            .unwrap();
        assert_eq!(
            serde_json::to_value(map.get("deployments")).unwrap(),
            serde_json::json!({"groupVersion": "apps/v1", "namespaced": true, "pinned": true})
        );
    }
}
