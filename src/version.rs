use std::{cmp::Ordering, fmt, str::FromStr};

use crate::error::ParseError;

/// Stability label found between the major and minor numerals of a version token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Label {
    Alpha,
    Beta,
    /// Any other letter run, e.g. `gamma` in `v1gamma2`.
    Other(String),
}

impl Label {
    fn new(label: &str) -> Self {
        match label {
            "alpha" => Label::Alpha,
            "beta" => Label::Beta,
            other => Label::Other(other.to_string()),
        }
    }

    fn as_str(&self) -> &str {
        match self {
            Label::Alpha => "alpha",
            Label::Beta => "beta",
            Label::Other(other) => other,
        }
    }
}

/// A parsed Kubernetes version token such as `v1`, `v1beta1` or `v2alpha10`.
///
/// Tokens are ordered with [`ApiVersion::compare`]:
///
/// 1. the higher major numeral wins,
/// 2. a token without a label (GA) wins over a labelled one,
/// 3. `beta` wins over `alpha`,
/// 4. the higher minor numeral wins, an absent numeral being the lowest.
///
/// Unknown labels only take part through their numerals, so the relation is
/// not transitive across mixed labels and `Ord` is deliberately not implemented.
///
/// ```
/// use kube_apimap::version::ApiVersion;
/// use std::cmp::Ordering;
///
/// let beta: ApiVersion = "v1beta1".parse().unwrap();
/// let alpha: ApiVersion = "v1alpha3".parse().unwrap();
/// assert_eq!(beta.compare(&alpha), Ordering::Greater);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiVersion {
    prefix: String,
    major: u32,
    label: Option<Label>,
    minor: Option<u32>,
}

impl ApiVersion {
    /// Parse the version segment of a group-version, e.g. `v1beta1` of `apps/v1beta1`.
    pub fn from_group_version(group_version: &str) -> Result<Self, ParseError> {
        let version = group_version
            .rsplit('/')
            .next()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ParseError::InvalidGroupVersion(group_version.to_string()))?;
        version.parse()
    }

    pub fn major(&self) -> u32 {
        self.major
    }

    pub fn label(&self) -> Option<&Label> {
        self.label.as_ref()
    }

    pub fn minor(&self) -> Option<u32> {
        self.minor
    }

    /// Whether the token carries no stability label.
    pub fn is_stable(&self) -> bool {
        self.label.is_none()
    }

    /// Order `self` against `other`.
    pub fn compare(&self, other: &Self) -> Ordering {
        self.major
            .cmp(&other.major)
            .then_with(|| match (&self.label, &other.label) {
                (None, Some(_)) => Ordering::Greater,
                (Some(_), None) => Ordering::Less,
                (Some(Label::Beta), Some(Label::Alpha)) => Ordering::Greater,
                (Some(Label::Alpha), Some(Label::Beta)) => Ordering::Less,
                _ => Ordering::Equal,
            })
            .then_with(|| self.minor.cmp(&other.minor))
    }
}

fn split_letters(s: &str) -> (&str, &str) {
    let end = s
        .find(|ch: char| !ch.is_ascii_alphabetic())
        .unwrap_or(s.len());
    s.split_at(end)
}

fn split_digits(s: &str) -> (&str, &str) {
    let end = s.find(|ch: char| !ch.is_ascii_digit()).unwrap_or(s.len());
    s.split_at(end)
}

impl FromStr for ApiVersion {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseError::InvalidVersion(s.to_string());

        let (prefix, rest) = split_letters(s);
        let (major, rest) = split_digits(rest);
        if prefix.is_empty() || major.is_empty() {
            return Err(invalid());
        }
        let major = major.parse().map_err(|_| invalid())?;

        let (label, rest) = split_letters(rest);
        let (minor, rest) = split_digits(rest);
        if !rest.is_empty() {
            return Err(invalid());
        }
        let minor = if minor.is_empty() {
            None
        } else {
            Some(minor.parse().map_err(|_| invalid())?)
        };

        Ok(ApiVersion {
            prefix: prefix.to_string(),
            major,
            label: (!label.is_empty()).then(|| Label::new(label)),
            minor,
        })
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.prefix, self.major)?;
        if let Some(label) = &self.label {
            f.write_str(label.as_str())?;
        }
        if let Some(minor) = self.minor {
            write!(f, "{minor}")?;
        }
        Ok(())
    }
}

/// Compare two version tokens.
pub fn compare(a: &str, b: &str) -> Result<Ordering, ParseError> {
    let a: ApiVersion = a.parse()?;
    let b: ApiVersion = b.parse()?;
    Ok(a.compare(&b))
}

#[cfg(test)]
mod tests {
    use std::cmp::Ordering;

    use super::{ApiVersion, Label, compare};
    use crate::error::ParseError;

    fn parse(s: &str) -> ApiVersion {
        s.parse().expect("valid version token")
    }

    #[test]
    fn parses_tokens() {
        let v = parse("v2alpha10");
        assert_eq!(v.major(), 2);
        assert_eq!(v.label(), Some(&Label::Alpha));
        assert_eq!(v.minor(), Some(10));

        let v = parse("v1");
        assert!(v.is_stable());
        assert_eq!(v.minor(), None);

        assert_eq!(parse("v1beta").minor(), None);
        assert_eq!(parse("v1gamma3").label(), Some(&Label::Other("gamma".into())));
        assert_eq!(parse("v10beta12").to_string(), "v10beta12");
    }

    #[test]
    fn rejects_malformed_tokens() {
        for token in ["", "v", "1", "v-1", "v1beta1x", "v1.2", "v1beta1.1", "v99999999999"] {
            assert_eq!(
                token.parse::<ApiVersion>(),
                Err(ParseError::InvalidVersion(token.to_string())),
                "{token}"
            );
        }
        assert!(compare("v1", "nope").is_err());
    }

    #[test]
    fn beta_outranks_alpha_regardless_of_minor() {
        assert_eq!(compare("v1beta1", "v1alpha9"), Ok(Ordering::Greater));
        assert_eq!(compare("v2alpha10", "v2beta1"), Ok(Ordering::Less));
        assert_eq!(compare("v3beta", "v3alpha1"), Ok(Ordering::Greater));
    }

    #[test]
    fn major_decides_first() {
        for (a, b) in [("v2alpha1", "v1"), ("v10", "v9beta9"), ("v3beta1", "v2")] {
            assert_eq!(compare(a, b), Ok(Ordering::Greater), "{a} > {b}");
            assert_eq!(compare(b, a), Ok(Ordering::Less), "{b} < {a}");
        }
    }

    #[test]
    fn stable_outranks_prerelease_of_same_major() {
        assert_eq!(compare("v1", "v1beta1"), Ok(Ordering::Greater));
        assert_eq!(compare("v1alpha2", "v1"), Ok(Ordering::Less));
    }

    #[test]
    fn minor_numerals_break_ties() {
        assert_eq!(compare("v1beta2", "v1beta1"), Ok(Ordering::Greater));
        assert_eq!(compare("v1beta", "v1beta1"), Ok(Ordering::Less));
        assert_eq!(compare("v1gamma2", "v1beta1"), Ok(Ordering::Greater));
        assert_eq!(compare("v1beta1", "v1beta1"), Ok(Ordering::Equal));
        assert_eq!(compare("v1", "v1"), Ok(Ordering::Equal));
    }

    #[test]
    fn group_version_token() {
        assert_eq!(ApiVersion::from_group_version("apps/v1beta2"), Ok(parse("v1beta2")));
        assert_eq!(ApiVersion::from_group_version("v1"), Ok(parse("v1")));
        assert_eq!(
            ApiVersion::from_group_version("apps/"),
            Err(ParseError::InvalidGroupVersion("apps/".into()))
        );
    }
}
