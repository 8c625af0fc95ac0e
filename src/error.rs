//! Error types for version parsing, cluster detection and discovery.
use std::fmt;

use kube::Error as KubeError;
use thiserror::Error;

/// Failure to parse a version token or a group-version string.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The version token does not match `<letters><digits>[<letters>[<digits>]]`.
    #[error("invalid version token: {0:?}")]
    InvalidVersion(String),

    /// The group-version string has no version segment.
    #[error("invalid group version: {0:?}")]
    InvalidGroupVersion(String),
}

/// Fatal errors of the map build and resolve operations.
#[derive(Error, Debug)]
pub enum Error {
    /// The apiserver version could not be fetched.
    #[error("failed to detect cluster version: {0}")]
    ClusterVersion(#[source] KubeError),

    /// The reported git version cannot be normalized into a cache key.
    #[error("invalid cluster version: {0:?}")]
    InvalidClusterVersion(String),
}

/// What a failed discovery step was trying to fetch.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FailureTarget {
    /// Listing the versions of the core group (`/api`).
    CoreVersions,
    /// Listing the extension API groups (`/apis`).
    ApiGroups,
    /// Fetching or folding the resources of a single group-version.
    GroupVersion(String),
}

impl fmt::Display for FailureTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureTarget::CoreVersions => f.write_str("core api versions"),
            FailureTarget::ApiGroups => f.write_str("api groups"),
            FailureTarget::GroupVersion(gv) => write!(f, "group version {gv}"),
        }
    }
}

/// Underlying cause of a [`DiscoveryFailure`].
#[derive(Error, Debug)]
pub enum FailureCause {
    #[error("fetch failed: {0}")]
    Fetch(#[source] KubeError),

    #[error("fold failed: {0}")]
    Parse(#[source] ParseError),
}

/// A single non-fatal failure collected while building a map.
#[derive(Error, Debug)]
#[error("{target}: {cause}")]
pub struct DiscoveryFailure {
    pub target: FailureTarget,
    #[source]
    pub cause: FailureCause,
}

impl DiscoveryFailure {
    pub(crate) fn fetch(target: FailureTarget, error: KubeError) -> Self {
        Self {
            target,
            cause: FailureCause::Fetch(error),
        }
    }

    pub(crate) fn parse(target: FailureTarget, error: ParseError) -> Self {
        Self {
            target,
            cause: FailureCause::Parse(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{DiscoveryFailure, FailureCause, FailureTarget, ParseError};

    #[test]
    fn fold_parse_errors_surface_as_failures() {
        let failure = DiscoveryFailure::parse(
            FailureTarget::GroupVersion("example.com/stable".into()),
            ParseError::InvalidVersion("stable".into()),
        );
        assert!(matches!(failure.cause, FailureCause::Parse(ParseError::InvalidVersion(_))));
        assert_eq!(
            failure.to_string(),
            "group version example.com/stable: fold failed: invalid version token: \"stable\""
        );
    }
}
