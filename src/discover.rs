//! Building API maps from live discovery.
//!
//! [`discover`] walks the core group and every extension group of a cluster,
//! folding each group-version into a shared [`ApiMapCache`]. Requests run
//! concurrently on the calling task; a failed request is recorded and the
//! remaining ones still complete.
use std::{future::Future, sync::Arc};

use futures::{StreamExt, stream};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{APIGroup, APIResourceList};
use kube::Error as KubeError;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info, warn};

use crate::{
    apimap::{ApiMap, ApiMapCache, Lookup},
    cluster::ClusterVersionKey,
    config::DiscoveryConfig,
    error::{DiscoveryFailure, Error, FailureTarget},
    response::DiscoveryResponse,
    retry::{RetryPolicy, retry_with_policy},
};

pub mod client;
pub use client::DiscoverClient;

/// Name of the core API group.
pub const CORE_GROUP: &str = "";

/// The discovery endpoints of an apiserver.
pub trait DiscoverySource {
    /// The `gitVersion` reported by `/version`, e.g. `v1.8.3-gke.2`.
    fn server_version(&self) -> impl Future<Output = Result<String, KubeError>>;

    /// Versions served under `/api`, normally just `v1`.
    fn core_versions(&self) -> impl Future<Output = Result<Vec<String>, KubeError>>;

    fn core_resources(
        &self,
        version: &str,
    ) -> impl Future<Output = Result<APIResourceList, KubeError>>;

    /// Groups served under `/apis`.
    fn api_groups(&self) -> impl Future<Output = Result<Vec<APIGroup>, KubeError>>;

    fn group_resources(
        &self,
        group_version: &str,
    ) -> impl Future<Output = Result<APIResourceList, KubeError>>;
}

/// A single group-version to fetch and fold.
#[derive(Debug, Clone)]
struct FetchTarget {
    group_version: String,
    preferred: Option<String>,
    core: bool,
}

impl FetchTarget {
    fn core(version: String) -> Self {
        Self {
            group_version: version,
            preferred: None,
            core: true,
        }
    }

    fn group(group: APIGroup) -> Vec<Self> {
        if group.versions.is_empty() {
            debug!(name = group.name.as_str(), "Skipping group without versions");
        }
        let preferred = group.preferred_version.map(|p| p.group_version);
        group
            .versions
            .into_iter()
            .map(|v| Self {
                group_version: v.group_version,
                preferred: preferred.clone(),
                core: false,
            })
            .collect()
    }

    async fn fetch<S: DiscoverySource>(
        &self,
        source: &S,
        retry: &RetryPolicy,
    ) -> Result<APIResourceList, KubeError> {
        let group_version = self.group_version.as_str();
        if self.core {
            retry_with_policy(retry, move || source.core_resources(group_version)).await
        } else {
            retry_with_policy(retry, move || source.group_resources(group_version)).await
        }
    }
}

/// Result of a map build.
///
/// A partial outcome still carries everything that could be folded.
#[derive(Debug)]
pub enum DiscoveryOutcome {
    Complete {
        cluster: ClusterVersionKey,
        map: ApiMap,
    },
    Partial {
        cluster: ClusterVersionKey,
        map: ApiMap,
        failures: Vec<DiscoveryFailure>,
    },
}

impl DiscoveryOutcome {
    pub fn cluster(&self) -> &ClusterVersionKey {
        match self {
            DiscoveryOutcome::Complete { cluster, .. } | DiscoveryOutcome::Partial { cluster, .. } => {
                cluster
            }
        }
    }

    pub fn map(&self) -> &ApiMap {
        match self {
            DiscoveryOutcome::Complete { map, .. } | DiscoveryOutcome::Partial { map, .. } => map,
        }
    }

    pub fn failures(&self) -> &[DiscoveryFailure] {
        match self {
            DiscoveryOutcome::Complete { .. } => &[],
            DiscoveryOutcome::Partial { failures, .. } => failures,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, DiscoveryOutcome::Complete { .. })
    }

    pub fn into_map(self) -> ApiMap {
        match self {
            DiscoveryOutcome::Complete { map, .. } | DiscoveryOutcome::Partial { map, .. } => map,
        }
    }

    /// The map if every step succeeded, an error listing the failures otherwise.
    pub fn into_result(self) -> anyhow::Result<ApiMap> {
        match self {
            DiscoveryOutcome::Complete { map, .. } => Ok(map),
            DiscoveryOutcome::Partial {
                cluster, failures, ..
            } => Err(anyhow::anyhow!(
                "discovery for cluster version {cluster} was incomplete: {}",
                failures
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", ")
            )),
        }
    }
}

/// Detect and normalize the cluster version.
///
/// # Errors
/// Returns an error if the version cannot be fetched or normalized.
pub async fn detect_cluster_version<S: DiscoverySource>(
    source: &S,
    config: &DiscoveryConfig,
) -> Result<ClusterVersionKey, Error> {
    let git_version = retry_with_policy(&config.retry, move || source.server_version())
        .await
        .map_err(Error::ClusterVersion)?;
    ClusterVersionKey::from_git_version(&git_version, config.precision)
}

/// Detect the cluster version, then fold every queryable group-version into `cache`.
///
/// # Errors
/// Only a failure to detect the cluster version is fatal; everything else is
/// collected into [`DiscoveryOutcome::Partial`].
pub async fn discover<S: DiscoverySource>(
    source: &S,
    cache: &ApiMapCache,
    config: &DiscoveryConfig,
) -> Result<DiscoveryOutcome, Error> {
    let cluster = detect_cluster_version(source, config).await?;
    Ok(discover_cluster(source, cache, config, cluster).await)
}

/// Fold every queryable group-version into the map of an already detected `cluster`.
pub async fn discover_cluster<S: DiscoverySource>(
    source: &S,
    cache: &ApiMapCache,
    config: &DiscoveryConfig,
    cluster: ClusterVersionKey,
) -> DiscoveryOutcome {
    info!(cluster = %cluster, "Discovering api resources");
    let mut failures = Vec::new();

    let (core_versions, api_groups) = futures::join!(
        retry_with_policy(&config.retry, move || source.core_versions()),
        retry_with_policy(&config.retry, move || source.api_groups()),
    );

    let core_targets: Vec<_> = match core_versions {
        Ok(versions) if config.groups.is_queryable(CORE_GROUP) => {
            versions.into_iter().map(FetchTarget::core).collect()
        }
        Ok(_) => Vec::new(),
        Err(error) => {
            failures.push(DiscoveryFailure::fetch(FailureTarget::CoreVersions, error));
            Vec::new()
        }
    };
    let group_targets: Vec<_> = match api_groups {
        Ok(groups) => groups
            .into_iter()
            .filter(|group| config.groups.is_queryable(&group.name))
            .flat_map(FetchTarget::group)
            .collect(),
        Err(error) => {
            failures.push(DiscoveryFailure::fetch(FailureTarget::ApiGroups, error));
            Vec::new()
        }
    };

    // core resources go in first so extension groups are ranked against them
    fold_targets(source, cache, &cluster, config, core_targets, &mut failures).await;
    fold_targets(source, cache, &cluster, config, group_targets, &mut failures).await;

    let map = cache.snapshot(&cluster).unwrap_or_default();
    if failures.is_empty() {
        info!(cluster = %cluster, resources = map.len(), "Discovery complete");
        DiscoveryOutcome::Complete { cluster, map }
    } else {
        warn!(
            cluster = %cluster,
            resources = map.len(),
            failures = failures.len(),
            "Discovery incomplete"
        );
        DiscoveryOutcome::Partial {
            cluster,
            map,
            failures,
        }
    }
}

async fn fold_targets<S: DiscoverySource>(
    source: &S,
    cache: &ApiMapCache,
    cluster: &ClusterVersionKey,
    config: &DiscoveryConfig,
    targets: Vec<FetchTarget>,
    failures: &mut Vec<DiscoveryFailure>,
) {
    let retry = &config.retry;
    let mut fetches = stream::iter(targets)
        .map(move |target| async move {
            let result = target.fetch(source, retry).await;
            (target, result)
        })
        .buffer_unordered(config.concurrency.max(1));

    while let Some((target, result)) = fetches.next().await {
        let failed = FailureTarget::GroupVersion(target.group_version.clone());
        let folded = match result {
            Ok(list) => {
                let response = DiscoveryResponse::from_resource_list(&list, target.preferred);
                cache
                    .apply(cluster, &response)
                    .map(|_| ())
                    .map_err(|error| DiscoveryFailure::parse(failed, error))
            }
            Err(error) => Err(DiscoveryFailure::fetch(failed, error)),
        };
        if let Err(failure) = folded {
            warn!(cluster = %cluster, %failure, "Discovery step failed");
            failures.push(failure);
        }
    }
}

/// Resolves resources for one cluster, building its map on first use.
///
/// The cache is shared, so resolvers for different clusters of the same
/// version reuse each other's maps. The cluster version is detected once per
/// resolver, and concurrent first lookups share a single discovery.
pub struct Resolver<S> {
    source: S,
    cache: Arc<ApiMapCache>,
    config: DiscoveryConfig,
    cluster: OnceCell<ClusterVersionKey>,
    building: Mutex<()>,
}

impl<S: DiscoverySource> Resolver<S> {
    pub fn new(source: S, cache: Arc<ApiMapCache>) -> Self {
        Self {
            source,
            cache,
            config: DiscoveryConfig::default(),
            cluster: OnceCell::new(),
            building: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: DiscoveryConfig) -> Self {
        self.config = config;
        self.cluster = OnceCell::new();
        self
    }

    pub fn cache(&self) -> &Arc<ApiMapCache> {
        &self.cache
    }

    /// The cluster version, detected on first call.
    ///
    /// A failed detection is not remembered.
    pub async fn cluster_version(&self) -> Result<ClusterVersionKey, Error> {
        self.cluster
            .get_or_try_init(|| detect_cluster_version(&self.source, &self.config))
            .await
            .cloned()
    }

    /// Run discovery again and fold the results over the existing map.
    pub async fn discover(&self) -> Result<DiscoveryOutcome, Error> {
        let cluster = self.cluster_version().await?;
        Ok(discover_cluster(&self.source, &self.cache, &self.config, cluster).await)
    }

    /// Look `resource` up, running discovery first if the cluster version has no map yet.
    ///
    /// Failures of that discovery are logged; the lookup uses whatever was folded.
    pub async fn resolve(&self, resource: &str) -> Result<Lookup, Error> {
        let cluster = self.cluster_version().await?;
        if !self.cache.contains(&cluster) {
            let _building = self.building.lock().await;
            if !self.cache.contains(&cluster) {
                let outcome =
                    discover_cluster(&self.source, &self.cache, &self.config, cluster.clone())
                        .await;
                for failure in outcome.failures() {
                    warn!(cluster = %cluster, %failure, "Resolving with partial api map");
                }
            }
        }
        Ok(self.cache.lookup(&cluster, resource))
    }
}
