//! The package entity.
//!
//! A [`Package`] is one immutable artifact identified by `(id, version)`.
//! Its backing bytes live in a store file, a temporary upload file, or behind
//! a remote feed URL. Content hash, manifest and target frameworks are
//! derived from the backing archive on first access and memoized.

pub mod framework;
pub mod manifest;

use std::collections::BTreeSet;
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use chrono::{DateTime, Utc};
use regex::Regex;
use tempfile::NamedTempFile;
use tracing::warn;
use zip::ZipArchive;

use crate::error::{ErrorContext, NufeedError};
use crate::hash::PackageHash;
use crate::http::SHARED_AGENT;
use crate::version::{Version, VERSION_GRAMMAR};

pub use framework::TargetFramework;
pub use manifest::{Dependency, Manifest, Reference, NUSPEC_EXTENSION, NUSPEC_XML_NAMESPACE};

/// File extension of package archives.
pub const PACKAGE_EXTENSION: &str = ".nupkg";

/// Location of a package's bytes.
#[derive(Debug)]
enum Backing {
    /// A file owned by a hosted store.
    File(PathBuf),
    /// A temporary file holding uploaded bytes.
    Temp(NamedTempFile),
    /// A remote feed entry; bytes are downloaded on demand.
    Remote(RemoteBacking),
}

#[derive(Debug)]
pub(crate) struct RemoteBacking {
    pub url: String,
    pub hash: Option<PackageHash>,
    pub size: Option<u64>,
    pub updated: Option<DateTime<Utc>>,
}

#[derive(Debug)]
struct Inner {
    id: String,
    version: Version,
    backing: Backing,
    hash: OnceLock<PackageHash>,
    manifest: OnceLock<Option<Manifest>>,
    frameworks: OnceLock<BTreeSet<TargetFramework>>,
}

/// One immutable package artifact. Cloning is cheap and shares the memoized
/// derived state.
#[derive(Debug, Clone)]
pub struct Package {
    inner: Arc<Inner>,
}

fn filename_re() -> &'static Regex {
    static FILENAME_RE: OnceLock<Regex> = OnceLock::new();
    FILENAME_RE.get_or_init(|| {
        Regex::new(&format!(r"^(.+?)\.({VERSION_GRAMMAR})(?i:\.nupkg)$")).unwrap()
    })
}

impl Package {
    /// Creates a package backed by a store file named `<id>.<version>.nupkg`.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, NufeedError> {
        let path = path.as_ref();
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| NufeedError::InvalidFileName(path.display().to_string()))?;
        let (id, version) = Self::parse_file_name(file_name)?;
        Ok(Self::with_backing(id, version, Backing::File(path.to_path_buf())))
    }

    /// Creates a package from uploaded bytes, held in a temporary file.
    ///
    /// Identity comes from the embedded manifest, so an archive without one
    /// (or without id/version fields) is rejected.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, NufeedError> {
        let mut file = NamedTempFile::new()
            .with_context(|| "creating a temporary package file".to_string())?;
        file.write_all(bytes)
            .and_then(|()| file.flush())
            .with_context(|| "writing a temporary package file".to_string())?;

        let manifest = read_archive_manifest(std::io::Cursor::new(bytes))?.ok_or_else(|| {
            NufeedError::InvalidManifest("package archive has no manifest entry".to_string())
        })?;
        if manifest.id.is_empty() {
            return Err(NufeedError::InvalidManifest(
                "manifest is missing the package id".to_string(),
            ));
        }
        let version = manifest.version.clone().ok_or_else(|| {
            NufeedError::InvalidManifest("manifest is missing the package version".to_string())
        })?;

        let package = Self::with_backing(manifest.id.clone(), version, Backing::Temp(file));
        let _ = package.inner.manifest.set(Some(manifest));
        Ok(package)
    }

    /// Creates a package referencing a remote feed entry. Declared metadata
    /// seeds the manifest so readers never download just to display it.
    pub(crate) fn from_remote(
        id: String,
        version: Version,
        backing: RemoteBacking,
        manifest: Option<Manifest>,
    ) -> Self {
        let package = Self::with_backing(id, version, Backing::Remote(backing));
        if let Some(manifest) = manifest {
            let _ = package.inner.manifest.set(Some(manifest));
        }
        package
    }

    fn with_backing(id: String, version: Version, backing: Backing) -> Self {
        Self {
            inner: Arc::new(Inner {
                id,
                version,
                backing,
                hash: OnceLock::new(),
                manifest: OnceLock::new(),
                frameworks: OnceLock::new(),
            }),
        }
    }

    /// Splits `<id>.<version>.nupkg`. The version segment is the longest
    /// valid version suffix, so dotted ids parse correctly.
    pub fn parse_file_name(file_name: &str) -> Result<(String, Version), NufeedError> {
        let caps = filename_re()
            .captures(file_name)
            .ok_or_else(|| NufeedError::InvalidFileName(file_name.to_string()))?;
        let version = caps[2].parse()?;
        Ok((caps[1].to_string(), version))
    }

    pub fn is_valid_file_name(file_name: &str) -> bool {
        filename_re().is_match(file_name)
    }

    /// Canonical store filename for an id and version.
    pub fn make_file_name(id: &str, version: &Version) -> String {
        format!("{id}.{version}{PACKAGE_EXTENSION}")
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn version(&self) -> &Version {
        &self.inner.version
    }

    /// Canonical filename of this package.
    pub fn file_name(&self) -> String {
        Self::make_file_name(&self.inner.id, &self.inner.version)
    }

    /// The content digest, computed once and cached. Remote entries use the
    /// digest declared by the feed when present.
    pub fn hash(&self) -> Result<&PackageHash, NufeedError> {
        if let Some(hash) = self.inner.hash.get() {
            return Ok(hash);
        }
        let computed = self.compute_hash()?;
        Ok(self.inner.hash.get_or_init(|| computed))
    }

    fn compute_hash(&self) -> Result<PackageHash, NufeedError> {
        match &self.inner.backing {
            Backing::File(path) => PackageHash::digest_file(path),
            Backing::Temp(file) => PackageHash::digest_file(file.path()),
            Backing::Remote(remote) => match &remote.hash {
                Some(declared) => Ok(declared.clone()),
                None => {
                    let reader = self.open()?;
                    PackageHash::digest(reader)
                        .with_context(|| format!("hashing remote package from {}", remote.url))
                }
            },
        }
    }

    /// Forces the content digest, so corrupt archives fail before indexing.
    pub fn load(&self) -> Result<(), NufeedError> {
        self.hash().map(|_| ())
    }

    /// The declared metadata, if the archive carries a manifest entry.
    ///
    /// A missing manifest is `None`, and an unreadable archive degrades to
    /// `None` with a warning; only a malformed document is an error.
    pub fn manifest(&self) -> Result<Option<&Manifest>, NufeedError> {
        if let Some(cached) = self.inner.manifest.get() {
            return Ok(cached.as_ref());
        }
        match self.read_backing_manifest() {
            Ok(loaded) => Ok(self.inner.manifest.get_or_init(|| loaded).as_ref()),
            Err(NufeedError::IoError { action, source }) => {
                warn!("Could not read manifest of {self} while {action}: {source}");
                Ok(None)
            }
            Err(NufeedError::ZipError(err)) => {
                warn!("Unreadable archive for {self}: {err}");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    fn read_backing_manifest(&self) -> Result<Option<Manifest>, NufeedError> {
        match &self.inner.backing {
            Backing::File(path) => {
                let file = File::open(path)
                    .with_context(|| format!("opening '{}'", path.display()))?;
                read_archive_manifest(BufReader::new(file))
            }
            Backing::Temp(temp) => {
                let file = File::open(temp.path())
                    .with_context(|| "opening temporary package file".to_string())?;
                read_archive_manifest(BufReader::new(file))
            }
            // Remote manifests are seeded from the feed entry at construction.
            Backing::Remote(_) => Ok(None),
        }
    }

    /// Frameworks supported by this package, derived from `lib/` entries.
    /// An unreadable archive and a remote-only entry both fall back to the
    /// full framework set.
    pub fn frameworks(&self) -> &BTreeSet<TargetFramework> {
        self.inner.frameworks.get_or_init(|| match &self.inner.backing {
            Backing::Remote(_) => TargetFramework::all(),
            _ => match self.entry_paths() {
                Ok(paths) => framework::from_entry_paths(paths.iter().map(String::as_str)),
                Err(err) => {
                    warn!("Could not scan archive of {self}: {err}; assuming all frameworks");
                    TargetFramework::all()
                }
            },
        })
    }

    fn entry_paths(&self) -> Result<Vec<String>, NufeedError> {
        let path = match &self.inner.backing {
            Backing::File(path) => path.as_path(),
            Backing::Temp(temp) => temp.path(),
            Backing::Remote(_) => return Ok(Vec::new()),
        };
        let file =
            File::open(path).with_context(|| format!("opening '{}'", path.display()))?;
        let archive = ZipArchive::new(BufReader::new(file))?;
        Ok(archive.file_names().map(String::from).collect())
    }

    /// The backing byte length; remote entries report the declared size.
    pub fn size(&self) -> Result<u64, NufeedError> {
        match &self.inner.backing {
            Backing::File(path) => Ok(std::fs::metadata(path)
                .with_context(|| format!("reading size of '{}'", path.display()))?
                .len()),
            Backing::Temp(temp) => Ok(std::fs::metadata(temp.path())
                .with_context(|| "reading size of temporary package file".to_string())?
                .len()),
            Backing::Remote(remote) => Ok(remote.size.unwrap_or(0)),
        }
    }

    /// Last-updated timestamp: file modification time for local backings,
    /// the declared feed timestamp for remote ones.
    pub fn updated(&self) -> Result<DateTime<Utc>, NufeedError> {
        let path = match &self.inner.backing {
            Backing::File(path) => path.as_path(),
            Backing::Temp(temp) => temp.path(),
            Backing::Remote(remote) => {
                return Ok(remote.updated.unwrap_or(DateTime::UNIX_EPOCH));
            }
        };
        let modified = std::fs::metadata(path)
            .and_then(|meta| meta.modified())
            .with_context(|| format!("reading mtime of '{}'", path.display()))?;
        Ok(DateTime::from(modified))
    }

    /// Opens the package bytes for reading. Remote entries download through
    /// the shared agent.
    pub fn open(&self) -> Result<Box<dyn Read>, NufeedError> {
        match &self.inner.backing {
            Backing::File(path) => {
                let file = File::open(path)
                    .with_context(|| format!("opening '{}'", path.display()))?;
                Ok(Box::new(file))
            }
            Backing::Temp(temp) => {
                let file = File::open(temp.path())
                    .with_context(|| "opening temporary package file".to_string())?;
                Ok(Box::new(file))
            }
            Backing::Remote(remote) => {
                let response = SHARED_AGENT.get(&remote.url).call()?;
                if !response.status().is_success() {
                    return Err(NufeedError::Custom(format!(
                        "{} [{}]",
                        remote.url,
                        response.status()
                    )));
                }
                Ok(Box::new(response.into_body().into_reader()))
            }
        }
    }
}

impl fmt::Display for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.inner.id, self.inner.version)
    }
}

/// Packages are equal when their content digests match; if either digest is
/// unavailable, identity falls back to id plus version.
impl PartialEq for Package {
    fn eq(&self, other: &Self) -> bool {
        match (self.hash(), other.hash()) {
            (Ok(a), Ok(b)) => a == b,
            _ => self.inner.id == other.inner.id && self.inner.version == other.inner.version,
        }
    }
}

impl Eq for Package {}

impl std::hash::Hash for Package {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        match self.hash() {
            Ok(content) => content.hash(state),
            Err(_) => {
                self.inner.id.hash(state);
                self.inner.version.hash(state);
            }
        }
    }
}

fn read_archive_manifest<R: Read + std::io::Seek>(
    reader: R,
) -> Result<Option<Manifest>, NufeedError> {
    let mut archive = ZipArchive::new(reader)?;
    let entry_name = archive
        .file_names()
        .find(|name| name.to_ascii_lowercase().ends_with(NUSPEC_EXTENSION))
        .map(String::from);
    let Some(entry_name) = entry_name else {
        return Ok(None);
    };
    let mut entry = archive.by_name(&entry_name)?;
    let mut bytes = Vec::new();
    entry
        .read_to_end(&mut bytes)
        .with_context(|| format!("reading manifest entry '{entry_name}'"))?;
    Manifest::parse(&bytes[..]).map(Some)
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;
    use crate::test_utils::FixtureNupkg;

    #[test]
    fn filename_round_trips_for_plain_and_dotted_ids() {
        for (id, version) in [
            ("NUnit", "2.5.9.10348"),
            ("NUnit", "1.0"),
            ("Package.Core", "1.2.3"),
            ("Package.2.Core", "1.0"),
            ("Prerelease", "1.2.3.RC-1"),
        ] {
            let version: Version = version.parse().unwrap();
            let file_name = Package::make_file_name(id, &version);
            let (parsed_id, parsed_version) = Package::parse_file_name(&file_name).unwrap();
            assert_eq!(parsed_id, id, "id from {file_name}");
            assert_eq!(parsed_version, version, "version from {file_name}");
        }
    }

    #[test]
    fn filename_extension_is_case_insensitive() {
        assert!(Package::is_valid_file_name("NUnit.2.5.9.10348.NUPKG"));
        let (id, _) = Package::parse_file_name("NUnit.2.5.9.10348.NUPKG").unwrap();
        assert_eq!(id, "NUnit");
    }

    #[test]
    fn invalid_filenames_are_rejected() {
        for name in [
            "NUnit.nupkg",
            "NUnit.2.5.9.10348",
            "NUnit-2.5.9.nupkg",
            ".1.0.nupkg",
            "NUnit.1.nupkg",
        ] {
            assert!(
                Package::parse_file_name(name).is_err(),
                "'{name}' should be rejected"
            );
        }
    }

    #[test]
    fn from_file_takes_identity_from_the_filename() {
        let dir = tempdir().unwrap();
        let path = FixtureNupkg::new("NUnit", "2.5.9.10348").write_to(dir.path());
        let package = Package::from_file(&path).unwrap();
        assert_eq!(package.id(), "NUnit");
        assert_eq!(package.version(), &"2.5.9.10348".parse().unwrap());
        assert!(package.size().unwrap() > 0);
    }

    #[test]
    fn from_bytes_takes_identity_from_the_manifest() {
        let bytes = FixtureNupkg::new("Uploaded", "1.2.0").bytes();
        let package = Package::from_bytes(&bytes).unwrap();
        assert_eq!(package.id(), "Uploaded");
        assert_eq!(package.version(), &"1.2.0".parse().unwrap());
        let manifest = package.manifest().unwrap().unwrap();
        assert_eq!(manifest.id, "Uploaded");
    }

    #[test]
    fn from_bytes_rejects_archives_without_a_manifest() {
        let bytes = FixtureNupkg::new("X", "1.0").without_manifest().bytes();
        assert!(matches!(
            Package::from_bytes(&bytes),
            Err(NufeedError::InvalidManifest(_))
        ));
    }

    #[test]
    fn hash_is_computed_once_and_matches_content() {
        let dir = tempdir().unwrap();
        let path = FixtureNupkg::new("Hashed", "1.0").write_to(dir.path());
        let package = Package::from_file(&path).unwrap();

        let expected = PackageHash::digest_file(&path).unwrap();
        assert_eq!(package.hash().unwrap(), &expected);

        // The memoized digest survives the backing file going away.
        std::fs::remove_file(&path).unwrap();
        assert_eq!(package.hash().unwrap(), &expected);
    }

    #[test]
    fn load_fails_on_a_missing_backing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("Ghost.1.0.nupkg");
        std::fs::write(&path, b"whatever").unwrap();
        let package = Package::from_file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert!(package.load().is_err());
    }

    #[test]
    fn frameworks_come_from_lib_entries() {
        let bytes = FixtureNupkg::new("Lib", "1.0")
            .with_lib_paths(&["lib/net20/lib.dll"])
            .bytes();
        let package = Package::from_bytes(&bytes).unwrap();
        let expected: BTreeSet<_> = [TargetFramework::Net20].into_iter().collect();
        assert_eq!(package.frameworks(), &expected);
    }

    #[test]
    fn unreadable_archive_defaults_to_all_frameworks() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("Broken.1.0.nupkg");
        std::fs::write(&path, b"this is not a zip archive").unwrap();
        let package = Package::from_file(&path).unwrap();
        assert_eq!(package.frameworks(), &TargetFramework::all());
    }

    #[test]
    fn missing_manifest_reads_as_none() {
        let dir = tempdir().unwrap();
        let path = FixtureNupkg::new("NoSpec", "1.0")
            .without_manifest()
            .write_to(dir.path());
        let package = Package::from_file(&path).unwrap();
        assert!(package.manifest().unwrap().is_none());
    }

    #[test]
    fn packages_with_identical_content_are_equal() {
        let fixture = FixtureNupkg::new("Same", "1.0");
        let a = Package::from_bytes(&fixture.bytes()).unwrap();
        let b = Package::from_bytes(&fixture.bytes()).unwrap();
        assert_eq!(a, b);

        let other = Package::from_bytes(&FixtureNupkg::new("Same", "2.0").bytes()).unwrap();
        assert_ne!(a, other);
    }

    #[test]
    fn equality_falls_back_to_identity_when_hashing_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("Gone.1.0.nupkg");
        std::fs::write(&path, b"bytes").unwrap();
        let a = Package::from_file(&path).unwrap();
        let b = Package::from_file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(a, b);
    }
}
