//! In-memory package index.

use std::collections::BTreeMap;

use crate::package::Package;
use crate::version::Version;

/// A query-optimized projection of a package collection: id to ordered
/// versions to package.
///
/// The index is a derived view. It is rebuilt from a full source scan and
/// swapped in wholesale; the underlying source stays authoritative. Ids are
/// stored case-sensitively, with case-insensitive lookups as a separate path
/// for the source surface.
#[derive(Debug, Clone, Default)]
pub struct Index {
    packages: BTreeMap<String, BTreeMap<Version, Package>>,
}

impl Index {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the package stored under its id and version.
    pub fn put(&mut self, package: Package) {
        self.packages
            .entry(package.id().to_string())
            .or_default()
            .insert(package.version().clone(), package);
    }

    /// Every package, in id order then ascending version order.
    pub fn all_packages(&self) -> impl Iterator<Item = &Package> {
        self.packages
            .values()
            .flat_map(|versions| versions.values())
    }

    /// The highest version per id, in id order.
    ///
    /// Each item is an `Option`: an id whose version set is inconsistent
    /// surfaces as `None`, and callers filter those with a warning instead of
    /// dropping them silently.
    pub fn last_versions(&self) -> impl Iterator<Item = Option<&Package>> {
        self.packages
            .values()
            .map(|versions| versions.values().next_back())
    }

    /// All versions stored under an exact id.
    pub fn packages_by_id(&self, id: &str) -> impl Iterator<Item = &Package> {
        self.packages
            .get(id)
            .into_iter()
            .flat_map(|versions| versions.values())
    }

    /// All versions stored under an id, compared case-insensitively.
    pub fn packages_by_id_ignore_case(&self, id: &str) -> Vec<&Package> {
        self.packages
            .iter()
            .filter(|(key, _)| key.eq_ignore_ascii_case(id))
            .flat_map(|(_, versions)| versions.values())
            .collect()
    }

    /// Exact (id, version) lookup, id compared case-insensitively.
    pub fn package(&self, id: &str, version: &Version) -> Option<&Package> {
        self.packages
            .iter()
            .filter(|(key, _)| key.eq_ignore_ascii_case(id))
            .find_map(|(_, versions)| versions.get(version))
    }

    /// The highest version under an id, compared case-insensitively.
    pub fn last_version(&self, id: &str) -> Option<&Package> {
        self.packages
            .iter()
            .filter(|(key, _)| key.eq_ignore_ascii_case(id))
            .filter_map(|(_, versions)| versions.values().next_back())
            .max_by(|a, b| a.version().cmp(b.version()))
    }

    /// Total package count across all ids.
    pub fn size(&self) -> usize {
        self.packages.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}
