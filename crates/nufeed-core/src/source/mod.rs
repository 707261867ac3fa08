//! Package sources.
//!
//! A [`PackageSource`] is the polymorphic storage surface every variant
//! implements: the filesystem-backed [`HostedSource`], the feed-client
//! [`RemoteSource`], the index-accelerated [`IndexedSource`] decorator and
//! the fetch-through [`ProxySource`] composer.

pub mod hosted;
pub mod indexed;
pub mod proxy;
pub mod push;
pub mod remote;

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::NufeedError;
use crate::package::Package;
use crate::version::Version;

pub use hosted::HostedSource;
pub use indexed::{IndexedSource, RebuildHandle};
pub use proxy::ProxySource;
pub use push::{ApiKeyPushStrategy, PushStrategy, SimplePushStrategy};
pub use remote::{FeedEntry, RemoteSource};

/// Storage capability surface shared by every source variant.
///
/// Id arguments are matched case-insensitively. Listing methods return
/// best-effort results; pushes report refusal as `Ok(false)` and hard
/// failures as errors, so a write acknowledgment is always truthful.
pub trait PackageSource: Send + Sync + std::fmt::Debug {
    /// Every package this source can serve.
    fn list_all(&self) -> Result<Vec<Package>, NufeedError>;

    /// Every version stored under an id.
    fn list_by_id(&self, id: &str) -> Result<Vec<Package>, NufeedError>;

    /// The highest version of every id.
    fn list_latest_all(&self) -> Result<Vec<Package>, NufeedError>;

    /// The highest version stored under an id.
    fn get_latest(&self, id: &str) -> Result<Option<Package>, NufeedError>;

    /// The exact (id, version) package.
    fn get_exact(&self, id: &str, version: &Version) -> Result<Option<Package>, NufeedError>;

    /// Stores a package. `Ok(false)` means the push was refused.
    fn push(&self, package: &Package, api_key: Option<&str>) -> Result<bool, NufeedError>;

    /// Deletes a package from sources that support deletion.
    fn remove(&self, id: &str, version: &Version) -> Result<(), NufeedError>;

    fn push_strategy(&self) -> Result<Arc<dyn PushStrategy>, NufeedError>;

    fn set_push_strategy(&self, strategy: Arc<dyn PushStrategy>) -> Result<(), NufeedError>;
}

/// Reduces a package collection to the highest version per id, ids compared
/// case-insensitively. The result is ordered by id for stable output.
pub fn keep_latest(packages: Vec<Package>) -> Vec<Package> {
    let mut latest: HashMap<String, Package> = HashMap::new();
    for package in packages {
        let key = package.id().to_ascii_lowercase();
        match latest.get(&key) {
            Some(current) if current.version() >= package.version() => {}
            _ => {
                latest.insert(key, package);
            }
        }
    }
    let mut result: Vec<Package> = latest.into_values().collect();
    result.sort_by(|a, b| {
        a.id()
            .to_ascii_lowercase()
            .cmp(&b.id().to_ascii_lowercase())
    });
    result
}
