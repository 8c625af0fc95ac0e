use std::{collections::HashMap, sync::Arc};

use parking_lot::{Mutex, RwLock};
use tracing::debug;

use super::{ApiMap, FoldSummary, Lookup};
use crate::{cluster::ClusterVersionKey, error::ParseError, response::DiscoveryResponse};

/// Process-wide store of [`ApiMap`]s keyed by cluster version.
///
/// Create one and share it (e.g. behind an `Arc`) with everything that
/// discovers or resolves resources. Folds into the same cluster version are
/// serialized by a per-version lock; different cluster versions do not contend
/// beyond the short lookup of their entry. Entries are never evicted.
#[derive(Debug, Default)]
pub struct ApiMapCache {
    clusters: RwLock<HashMap<ClusterVersionKey, Arc<Mutex<ApiMap>>>>,
}

impl ApiMapCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, cluster: &ClusterVersionKey) -> Option<Arc<Mutex<ApiMap>>> {
        self.clusters.read().get(cluster).cloned()
    }

    fn entry_or_default(&self, cluster: &ClusterVersionKey) -> Arc<Mutex<ApiMap>> {
        if let Some(entry) = self.entry(cluster) {
            return entry;
        }
        self.clusters
            .write()
            .entry(cluster.clone())
            .or_default()
            .clone()
    }

    /// Fold a discovery response into the map of `cluster` and return the updated map.
    ///
    /// The cluster entry is only created once a response folds successfully.
    pub fn fold(
        &self,
        cluster: &ClusterVersionKey,
        response: &DiscoveryResponse,
    ) -> Result<ApiMap, ParseError> {
        self.fold_with(cluster, response, |map, _| map.clone())
    }

    /// Like [`fold`](Self::fold), without copying the map out.
    pub fn apply(
        &self,
        cluster: &ClusterVersionKey,
        response: &DiscoveryResponse,
    ) -> Result<FoldSummary, ParseError> {
        self.fold_with(cluster, response, |_, summary| summary)
    }

    fn fold_with<T>(
        &self,
        cluster: &ClusterVersionKey,
        response: &DiscoveryResponse,
        folded: impl FnOnce(&ApiMap, FoldSummary) -> T,
    ) -> Result<T, ParseError> {
        response.api_version()?;
        let entry = self.entry_or_default(cluster);
        let mut map = entry.lock();
        let summary = map.fold(response)?;
        debug!(
            cluster = %cluster,
            group_version = response.group_version.as_str(),
            inserted = summary.inserted,
            replaced = summary.replaced,
            retained = summary.retained,
            pinned = summary.pinned,
            "Folded group version"
        );
        Ok(folded(&map, summary))
    }

    /// Resolve `resource` for `cluster`.
    ///
    /// See [`ApiMap::resolve`] for the name matching rules.
    pub fn lookup(&self, cluster: &ClusterVersionKey, resource: &str) -> Lookup {
        let Some(entry) = self.entry(cluster) else {
            return Lookup::UnknownCluster;
        };
        let map = entry.lock();
        match map.resolve(resource) {
            Some(mapping) => Lookup::Found(mapping.clone()),
            None => {
                debug!(cluster = %cluster, resource, "Resource not mapped, returning whole map");
                Lookup::FallbackAll(map.clone())
            }
        }
    }

    /// A copy of the current map for `cluster`, if any response was folded for it.
    pub fn snapshot(&self, cluster: &ClusterVersionKey) -> Option<ApiMap> {
        self.entry(cluster).map(|entry| entry.lock().clone())
    }

    pub fn contains(&self, cluster: &ClusterVersionKey) -> bool {
        self.clusters.read().contains_key(cluster)
    }

    /// Cluster versions with a map, sorted.
    pub fn cluster_versions(&self) -> Vec<ClusterVersionKey> {
        let mut keys: Vec<_> = self.clusters.read().keys().cloned().collect();
        keys.sort();
        keys
    }
}
