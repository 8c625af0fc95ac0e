use serde::Deserialize;

use crate::{cluster::DEFAULT_PRECISION, retry::RetryPolicy};

/// Default number of group-version requests in flight at once.
pub const DEFAULT_CONCURRENCY: usize = 16;

/// Which API groups discovery queries.
///
/// The core group is named `""`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GroupFilter {
    /// Only the listed groups.
    Allow(Vec<String>),
    /// Every group except the listed ones.
    Block(Vec<String>),
}

impl GroupFilter {
    pub fn is_queryable(&self, group: &str) -> bool {
        match self {
            GroupFilter::Allow(allowed) => allowed.iter().any(|g| g == group),
            GroupFilter::Block(blocked) => !blocked.iter().any(|g| g == group),
        }
    }
}

impl Default for GroupFilter {
    fn default() -> Self {
        GroupFilter::Block(Vec::new())
    }
}

/// Settings for building API maps.
///
/// ```
/// use kube_apimap::config::DiscoveryConfig;
///
/// let config: DiscoveryConfig = serde_json::from_str(r#"{"precision": 3}"#).unwrap();
/// assert_eq!(config.precision, 3);
/// assert_eq!(config.concurrency, kube_apimap::config::DEFAULT_CONCURRENCY);
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DiscoveryConfig {
    /// Number of version components kept in the cluster version key.
    pub precision: usize,
    /// Maximum number of concurrent group-version requests.
    pub concurrency: usize,
    pub groups: GroupFilter,
    #[serde(skip)]
    pub retry: RetryPolicy,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            precision: DEFAULT_PRECISION,
            concurrency: DEFAULT_CONCURRENCY,
            groups: GroupFilter::default(),
            retry: RetryPolicy::default(),
        }
    }
}

impl DiscoveryConfig {
    #[must_use]
    pub fn with_precision(mut self, precision: usize) -> Self {
        self.precision = precision;
        self
    }

    /// Values below one are raised to one.
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Only query the listed groups.
    #[must_use]
    pub fn filter(mut self, allow: &[&str]) -> Self {
        self.groups = GroupFilter::Allow(allow.iter().map(ToString::to_string).collect());
        self
    }

    /// Query every group except the listed ones.
    #[must_use]
    pub fn exclude(mut self, deny: &[&str]) -> Self {
        self.groups = GroupFilter::Block(deny.iter().map(ToString::to_string).collect());
        self
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}
