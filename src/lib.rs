#![cfg_attr(not(doctest), doc = include_str!("../README.md"))]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub use k8s_openapi;
pub use kube;

pub mod apimap;
pub mod cluster;
pub mod config;
pub mod discover;
pub mod error;
pub mod response;
pub mod retry;
pub mod version;

pub use apimap::{ApiMap, ApiMapCache, Lookup, ResourceMapping};
pub use cluster::ClusterVersionKey;
pub use config::DiscoveryConfig;
pub use discover::{DiscoverClient, DiscoveryOutcome, DiscoverySource, Resolver, discover};
pub use error::{DiscoveryFailure, Error, ParseError};
pub use response::{DiscoveryResponse, ResourceDescriptor};

/// Fold a discovery response into `cache` for `cluster`.
///
/// Shorthand for [`ApiMapCache::fold`].
pub fn fold_group_resources(
    cache: &ApiMapCache,
    cluster: &ClusterVersionKey,
    response: &DiscoveryResponse,
) -> Result<ApiMap, ParseError> {
    cache.fold(cluster, response)
}

/// Resolve `resource` in the map of `cluster`.
///
/// The name is lower-cased, then retried once with a trailing `s`. A known
/// cluster version without a match yields [`Lookup::FallbackAll`]; a cluster
/// version that was never folded yields [`Lookup::UnknownCluster`].
pub fn lookup(cache: &ApiMapCache, cluster: &ClusterVersionKey, resource: &str) -> Lookup {
    cache.lookup(cluster, resource)
}
