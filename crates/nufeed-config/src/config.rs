//! Configuration model.
//!
//! A configuration is one TOML document: optional defaults plus one
//! `[[source]]` table per configured source. Optional fields are `Option`s
//! with accessor methods applying the default, so serialization round-trips
//! only what the user wrote.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// The kind of a configured source. A fixed enumeration; an unknown tag is
/// rejected when the document is deserialized, not resolved at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Filesystem-backed store, locally writable.
    Hosted,
    /// Read-only client of an upstream feed.
    Remote,
    /// Hosted cache composed with a remote upstream.
    Proxy,
}

/// One `[[source]]` table.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceEntry {
    pub name: String,
    pub kind: SourceKind,

    /// Store directory for hosted sources and the proxy's local cache.
    pub path: Option<String>,

    /// Upstream feed base URL for remote sources and the proxy.
    pub url: Option<String>,

    /// Wrap this source in the in-memory index.
    /// Default: false
    pub indexed: Option<bool>,

    /// Seconds between periodic index rebuilds. Unset means build once.
    pub refresh_interval_secs: Option<u64>,

    /// Accept pushes without an API key.
    /// Default: false
    pub allow_push: Option<bool>,

    /// API key required for pushes. Takes precedence over `allow_push`.
    pub api_key: Option<String>,
}

impl SourceEntry {
    pub fn indexed(&self) -> bool {
        self.indexed.unwrap_or(false)
    }

    pub fn refresh_interval(&self) -> Option<Duration> {
        self.refresh_interval_secs.map(Duration::from_secs)
    }

    pub fn allow_push(&self) -> bool {
        self.allow_push.unwrap_or(false)
    }

    pub(crate) fn require<'a>(
        &self,
        field: &'static str,
        value: &'a Option<String>,
    ) -> Result<&'a str> {
        value.as_deref().ok_or_else(|| ConfigError::MissingField {
            name: self.name.clone(),
            field,
        })
    }
}

/// The whole configuration document.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// Name of the source commands use when none is given on the command
    /// line. Default: the first configured source.
    pub default_source: Option<String>,

    #[serde(default, rename = "source")]
    pub sources: Vec<SourceEntry>,
}

impl Config {
    pub fn parse(document: &str) -> Result<Self> {
        Ok(toml::from_str(document)?)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let document = fs::read_to_string(path).map_err(|err| ConfigError::IoError {
            action: format!("reading configuration from '{}'", path.display()),
            source: err,
        })?;
        Self::parse(&document)
    }

    /// Resolves a source by name, falling back to the configured default and
    /// then to the first entry.
    pub fn select(&self, name: Option<&str>) -> Result<&SourceEntry> {
        let wanted = name.or(self.default_source.as_deref());
        match wanted {
            Some(wanted) => self
                .sources
                .iter()
                .find(|entry| entry.name == wanted)
                .ok_or_else(|| ConfigError::UnknownSource(wanted.to_string())),
            None => self.sources.first().ok_or(ConfigError::NoSources),
        }
    }
}
