//! Package version value type.
//!
//! Feed versions are up to four dot-separated components:
//! `major.minor[.build[.revision]]`. The revision component is either a plain
//! number or a free-form pre-release label (`1.2.3.RC1`). Ordering compares
//! the numeric tuple first and the label lexically after it; a release and a
//! labelled build with the same numeric tuple are distinct versions.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::NufeedError;

/// Version grammar, shared with the package filename pattern.
pub(crate) const VERSION_GRAMMAR: &str = r"\d+\.\d+(?:\.\d+(?:\.[0-9A-Za-z-]+)?)?";

/// The fourth version component: a number or a pre-release label.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Revision {
    Number(u32),
    Label(String),
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Revision::Number(n) => write!(f, "{n}"),
            Revision::Label(s) => write!(f, "{s}"),
        }
    }
}

/// A parsed package version.
///
/// `Display` reproduces the components the version was constructed with,
/// while comparison and hashing normalize absent numeric components to zero:
/// `1.2` and `1.2.0.0` are the same version, `1.2.3` and `1.2.3.RC1` are not.
#[derive(Debug, Clone)]
pub struct Version {
    major: u32,
    minor: u32,
    build: Option<u32>,
    revision: Option<Revision>,
}

impl Version {
    pub fn new(major: u32, minor: u32, build: Option<u32>, revision: Option<Revision>) -> Self {
        // A revision without a build would not survive a format/parse
        // round-trip, so the build slot is pinned to zero.
        let build = match (&revision, build) {
            (Some(_), None) => Some(0),
            (_, build) => build,
        };
        Self {
            major,
            minor,
            build,
            revision,
        }
    }

    pub fn parse(value: &str) -> Result<Self, NufeedError> {
        value.parse()
    }

    pub fn major(&self) -> u32 {
        self.major
    }

    pub fn minor(&self) -> u32 {
        self.minor
    }

    pub fn build(&self) -> Option<u32> {
        self.build
    }

    pub fn revision(&self) -> Option<&Revision> {
        self.revision.as_ref()
    }

    /// Normalized comparison key: numeric tuple, then the optional label.
    /// An absent label sorts before any label, so a release precedes its
    /// pre-releases with the same numeric tuple.
    fn key(&self) -> (u32, u32, u32, u32, Option<&str>) {
        let (rev_num, label) = match &self.revision {
            Some(Revision::Number(n)) => (*n, None),
            Some(Revision::Label(s)) => (0, Some(s.as_str())),
            None => (0, None),
        };
        (
            self.major,
            self.minor,
            self.build.unwrap_or(0),
            rev_num,
            label,
        )
    }
}

impl FromStr for Version {
    type Err = NufeedError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        static VERSION_RE: OnceLock<Regex> = OnceLock::new();
        let re = VERSION_RE.get_or_init(|| {
            Regex::new(
                r"(?x)
            ^(?P<major>\d+)
            \.(?P<minor>\d+)
            (?:\.(?P<build>\d+)
                (?:\.(?P<revision>[0-9A-Za-z-]+))?
            )?$
            ",
            )
            .unwrap()
        });

        let caps = re
            .captures(value)
            .ok_or_else(|| NufeedError::InvalidVersion(value.to_string()))?;

        let number = |name: &str| -> Result<Option<u32>, NufeedError> {
            caps.name(name)
                .map(|m| {
                    m.as_str()
                        .parse::<u32>()
                        .map_err(|_| NufeedError::InvalidVersion(value.to_string()))
                })
                .transpose()
        };

        let major = number("major")?.unwrap_or(0);
        let minor = number("minor")?.unwrap_or(0);
        let build = number("build")?;
        let revision = caps.name("revision").map(|m| {
            let raw = m.as_str();
            match raw.parse::<u32>() {
                Ok(n) => Revision::Number(n),
                Err(_) => Revision::Label(raw.to_string()),
            }
        });

        Ok(Version {
            major,
            minor,
            build,
            revision,
        })
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)?;
        if let Some(build) = self.build {
            write!(f, ".{build}")?;
        }
        if let Some(revision) = &self.revision {
            write!(f, ".{revision}")?;
        }
        Ok(())
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Version {}

impl std::hash::Hash for Version {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        value.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    #[test]
    fn parses_two_to_four_components() {
        let version = v("1.2");
        assert_eq!(version.major(), 1);
        assert_eq!(version.minor(), 2);
        assert_eq!(version.build(), None);
        assert_eq!(version.revision(), None);

        assert_eq!(v("1.2.3").build(), Some(3));
        assert_eq!(v("2.5.9.10348").revision(), Some(&Revision::Number(10348)));
        assert_eq!(
            v("1.2.3.RC-1").revision(),
            Some(&Revision::Label("RC-1".to_string()))
        );
    }

    #[test]
    fn rejects_malformed_strings() {
        for raw in ["", "1", "1.", "1.2.3.4.5", "a.b", "1.2.beta", "1..2", " 1.2", "1.2 "] {
            assert!(
                Version::parse(raw).is_err(),
                "'{raw}' should not parse as a version"
            );
        }
    }

    #[test]
    fn display_round_trips() {
        for raw in ["1.2", "1.2.3", "1.2.3.0", "2.5.9.10348", "1.2.3.RC-1"] {
            assert_eq!(v(raw).to_string(), raw);
        }
    }

    #[test]
    fn numeric_components_compare_numerically() {
        assert!(v("1.2") < v("1.10"));
        assert!(v("1.2.3") < v("1.2.4"));
        assert!(v("2.0") > v("1.9.9"));
        assert!(v("1.2.3.9") < v("1.2.3.10"));
    }

    #[test]
    fn absent_numeric_components_normalize_to_zero() {
        assert_eq!(v("1.2"), v("1.2.0"));
        assert_eq!(v("1.2"), v("1.2.0.0"));
        assert_eq!(v("1.2").cmp(&v("1.2.0.0")), Ordering::Equal);
    }

    #[test]
    fn labels_are_distinct_and_ordered_lexically() {
        assert_ne!(v("1.0.0"), v("1.0.0.alpha"));
        assert_ne!(v("1.0.0.alpha"), v("1.0.0.beta"));
        assert!(v("1.0.0") < v("1.0.0.alpha"));
        assert!(v("1.0.0.alpha") < v("1.0.0.beta"));
    }

    #[test]
    fn numeric_revision_outranks_label() {
        assert!(v("1.2.3.5") > v("1.2.3.beta"));
    }

    #[test]
    fn revision_without_build_pins_build_to_zero() {
        let version = Version::new(1, 2, None, Some(Revision::Label("RC1".to_string())));
        assert_eq!(version.to_string(), "1.2.0.RC1");
        assert_eq!(version, v("1.2.0.RC1"));
    }

    #[test]
    fn serde_round_trips_as_string() {
        let version = v("1.2.3.RC1");
        let json = serde_json::to_string(&version).unwrap();
        assert_eq!(json, "\"1.2.3.RC1\"");
        let back: Version = serde_json::from_str(&json).unwrap();
        assert_eq!(back, version);
    }
}
