//! Remote feed client source.
//!
//! A read-only view of an upstream registry speaking a small JSON feed
//! protocol: `GET {base}/packages` lists everything, `{base}/packages/{id}`
//! lists one id, `{base}/packages/{id}/{version}` resolves one entry and
//! `{base}/packages/{id}/{version}/content` serves the archive bytes.
//! Entries carry enough declared metadata that listing never downloads an
//! archive.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::error::NufeedError;
use crate::hash::PackageHash;
use crate::http::SHARED_AGENT;
use crate::package::{Manifest, Package, RemoteBacking};
use crate::source::push::PushStrategy;
use crate::source::{keep_latest, PackageSource};
use crate::version::Version;

/// Characters escaped when an id or version becomes a URL path segment.
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}')
    .add(b'/')
    .add(b'%');

/// One package entry as the feed serves it.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedEntry {
    pub id: String,
    pub version: Version,
    #[serde(default)]
    pub hash: Option<PackageHash>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub updated: Option<DateTime<Utc>>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub authors: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Option<String>,
}

impl FeedEntry {
    fn into_package(self, base: &str) -> Package {
        let url = content_url(base, &self.id, &self.version);
        let manifest = self.manifest();
        Package::from_remote(
            self.id,
            self.version,
            RemoteBacking {
                url,
                hash: self.hash,
                size: self.size,
                updated: self.updated,
            },
            manifest,
        )
    }

    /// Declared metadata as a manifest, so display paths never download the
    /// archive. An entry with no declared fields seeds nothing.
    fn manifest(&self) -> Option<Manifest> {
        if self.title.is_none()
            && self.authors.is_none()
            && self.description.is_none()
            && self.tags.is_none()
        {
            return None;
        }
        let mut manifest = Manifest {
            id: self.id.clone(),
            version: Some(self.version.clone()),
            title: self.title.clone(),
            authors: self.authors.clone(),
            description: self.description.clone(),
            ..Manifest::default()
        };
        manifest.set_tags(self.tags.clone());
        Some(manifest)
    }
}

fn content_url(base: &str, id: &str, version: &Version) -> String {
    format!(
        "{base}/packages/{}/{}/content",
        utf8_percent_encode(id, SEGMENT),
        utf8_percent_encode(&version.to_string(), SEGMENT)
    )
}

/// Read-only client of an upstream registry feed.
pub struct RemoteSource {
    base: String,
}

impl RemoteSource {
    /// Validates and normalizes the feed base URL.
    pub fn new(base_url: &str) -> Result<Self, NufeedError> {
        let url = Url::parse(base_url)?;
        match url.scheme() {
            "http" | "https" => {}
            other => {
                return Err(NufeedError::Custom(format!(
                    "unsupported feed URL scheme '{other}'"
                )));
            }
        }
        Ok(Self {
            base: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base
    }

    /// One GET returning JSON; a 404 reads as `None`, any other non-success
    /// status is an error.
    fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<Option<T>, NufeedError> {
        debug!("GET {url}");
        let mut response = SHARED_AGENT.get(url).call()?;
        if response.status() == ureq::http::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(NufeedError::Custom(format!(
                "{url} [{}]",
                response.status()
            )));
        }
        Ok(Some(response.body_mut().read_json::<T>()?))
    }

    fn fetch_entries(&self, url: &str) -> Result<Vec<Package>, NufeedError> {
        let entries: Vec<FeedEntry> = self.get_json(url)?.unwrap_or_default();
        Ok(entries
            .into_iter()
            .map(|entry| entry.into_package(&self.base))
            .collect())
    }
}

impl PackageSource for RemoteSource {
    fn list_all(&self) -> Result<Vec<Package>, NufeedError> {
        self.fetch_entries(&format!("{}/packages", self.base))
    }

    fn list_by_id(&self, id: &str) -> Result<Vec<Package>, NufeedError> {
        self.fetch_entries(&format!(
            "{}/packages/{}",
            self.base,
            utf8_percent_encode(id, SEGMENT)
        ))
    }

    fn list_latest_all(&self) -> Result<Vec<Package>, NufeedError> {
        Ok(keep_latest(self.list_all()?))
    }

    fn get_latest(&self, id: &str) -> Result<Option<Package>, NufeedError> {
        Ok(self
            .list_by_id(id)?
            .into_iter()
            .max_by(|a, b| a.version().cmp(b.version())))
    }

    fn get_exact(&self, id: &str, version: &Version) -> Result<Option<Package>, NufeedError> {
        let url = format!(
            "{}/packages/{}/{}",
            self.base,
            utf8_percent_encode(id, SEGMENT),
            utf8_percent_encode(&version.to_string(), SEGMENT)
        );
        let entry: Option<FeedEntry> = self.get_json(&url)?;
        Ok(entry.map(|entry| entry.into_package(&self.base)))
    }

    /// The upstream feed is read-only from here; pushes are always refused.
    fn push(&self, package: &Package, _api_key: Option<&str>) -> Result<bool, NufeedError> {
        debug!("Refusing push of {package}: remote feeds are read-only");
        Ok(false)
    }

    fn remove(&self, _id: &str, _version: &Version) -> Result<(), NufeedError> {
        Err(NufeedError::UnsupportedOperation("remove on a remote source"))
    }

    fn push_strategy(&self) -> Result<Arc<dyn PushStrategy>, NufeedError> {
        Err(NufeedError::UnsupportedOperation(
            "push strategy on a remote source",
        ))
    }

    fn set_push_strategy(&self, _strategy: Arc<dyn PushStrategy>) -> Result<(), NufeedError> {
        Err(NufeedError::UnsupportedOperation(
            "push strategy on a remote source",
        ))
    }
}

impl std::fmt::Debug for RemoteSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteSource")
            .field("base", &self.base)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED_JSON: &str = r#"[
        {
            "id": "NUnit",
            "version": "2.5.9.10348",
            "hash": "z4PhNX7vuL3xVChQ1m2AB9Yg5AULVxXcg/SpIdNs6c5H0NE8XYXysP+DGNKHfuwvY7kxvUdBeoGlODJ6+SfaPg==",
            "size": 12345,
            "updated": "2011-04-02T12:30:00Z",
            "authors": "NUnit developers",
            "description": "Unit-testing framework",
            "tags": "test, unit"
        },
        { "id": "Bare", "version": "1.0" }
    ]"#;

    #[test]
    fn new_rejects_bad_urls() {
        assert!(RemoteSource::new("ftp://feed.example").is_err());
        assert!(RemoteSource::new("not a url").is_err());
        let source = RemoteSource::new("https://feed.example/api/").unwrap();
        assert_eq!(source.base_url(), "https://feed.example/api");
    }

    #[test]
    fn entries_deserialize_with_and_without_optional_fields() {
        let entries: Vec<FeedEntry> = serde_json::from_str(FEED_JSON).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id, "NUnit");
        assert_eq!(entries[0].size, Some(12345));
        assert!(entries[1].hash.is_none());
        assert!(entries[1].updated.is_none());
    }

    #[test]
    fn entry_becomes_a_package_with_seeded_metadata() {
        let entries: Vec<FeedEntry> = serde_json::from_str(FEED_JSON).unwrap();
        let declared_hash = entries[0].hash.clone().unwrap();
        let package = entries[0].clone().into_package("https://feed.example/api");

        assert_eq!(package.id(), "NUnit");
        assert_eq!(package.version(), &"2.5.9.10348".parse().unwrap());
        // The declared digest is served without touching the network.
        assert_eq!(package.hash().unwrap(), &declared_hash);
        assert_eq!(package.size().unwrap(), 12345);

        let manifest = package.manifest().unwrap().unwrap();
        assert_eq!(manifest.authors.as_deref(), Some("NUnit developers"));
        assert_eq!(manifest.tags(), ["test", "unit"]);
    }

    #[test]
    fn entry_without_declared_fields_seeds_no_manifest() {
        let entries: Vec<FeedEntry> = serde_json::from_str(FEED_JSON).unwrap();
        assert!(entries[1].manifest().is_none());
    }

    #[test]
    fn content_urls_escape_path_segments() {
        let url = content_url(
            "https://feed.example/api",
            "Odd Id",
            &"1.0".parse().unwrap(),
        );
        assert_eq!(url, "https://feed.example/api/packages/Odd%20Id/1.0/content");
    }
}
