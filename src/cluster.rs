use std::fmt;

use k8s_openapi::apimachinery::pkg::version::Info;

use crate::error::Error;

/// Default number of version components kept in a [`ClusterVersionKey`] (major.minor).
pub const DEFAULT_PRECISION: usize = 2;

/// Normalized cluster version used as the top-level key of the API map cache.
///
/// Clusters reporting the same normalized version share their discovered map,
/// e.g. `v1.8.3-gke.2` and `v1.8.11` both become `1.8`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClusterVersionKey(String);

impl ClusterVersionKey {
    /// Use an already normalized key as-is.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Normalize a git version such as `v1.8.3-gke.2` to `precision` numeric components.
    pub fn from_git_version(git_version: &str, precision: usize) -> Result<Self, Error> {
        let invalid = || Error::InvalidClusterVersion(git_version.to_string());
        if precision == 0 {
            return Err(invalid());
        }

        let trimmed = git_version.trim();
        let trimmed = trimmed.strip_prefix('v').unwrap_or(trimmed);

        let mut components = Vec::new();
        for component in trimmed.split('.') {
            let end = component
                .find(|ch: char| !ch.is_ascii_digit())
                .unwrap_or(component.len());
            if end == 0 {
                break;
            }
            components.push(&component[..end]);
            if components.len() == precision || end < component.len() {
                break;
            }
        }

        if components.len() < precision {
            return Err(invalid());
        }
        Ok(Self(components.join(".")))
    }

    /// Normalize the `gitVersion` of an apiserver version response.
    pub fn from_info(info: &Info, precision: usize) -> Result<Self, Error> {
        Self::from_git_version(&info.git_version, precision)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClusterVersionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ClusterVersionKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}
