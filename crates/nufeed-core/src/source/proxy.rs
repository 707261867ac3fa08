//! Fetch-through proxy source.
//!
//! Composes a hosted source and a remote source into one logical view.
//! Listings are the union of both sides with hosted entries overriding
//! remote entries of the same version; a dead remote degrades a listing to
//! hosted-only results instead of failing it. Exact lookups are cache-aside:
//! a hosted miss is fetched from the remote, persisted into the hosted
//! source and served from there.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::NufeedError;
use crate::package::Package;
use crate::source::push::PushStrategy;
use crate::source::{keep_latest, PackageSource};
use crate::version::Version;

/// One logical source over a hosted cache and a remote upstream.
pub struct ProxySource {
    hosted: Arc<dyn PackageSource>,
    remote: Arc<dyn PackageSource>,
}

impl ProxySource {
    pub fn new(hosted: Arc<dyn PackageSource>, remote: Arc<dyn PackageSource>) -> Self {
        Self { hosted, remote }
    }

    /// Remote results, degraded to nothing when the remote fails.
    fn remote_or_empty(
        &self,
        what: &str,
        result: Result<Vec<Package>, NufeedError>,
    ) -> Vec<Package> {
        match result {
            Ok(packages) => packages,
            Err(err) => {
                warn!("Remote source failed while {what}: {err}; serving hosted results only");
                Vec::new()
            }
        }
    }

    /// Union keyed by (id, version), hosted entries overriding remote ones.
    /// Hosted is authoritative once a package has been cached.
    fn merge(&self, remote: Vec<Package>, hosted: Vec<Package>) -> Vec<Package> {
        let mut merged: HashMap<(String, Version), Package> = HashMap::new();
        for package in remote.into_iter().chain(hosted) {
            let key = (package.id().to_ascii_lowercase(), package.version().clone());
            merged.insert(key, package);
        }
        let mut result: Vec<Package> = merged.into_values().collect();
        result.sort_by(|a, b| {
            a.id()
                .to_ascii_lowercase()
                .cmp(&b.id().to_ascii_lowercase())
                .then_with(|| a.version().cmp(b.version()))
        });
        result
    }
}

impl PackageSource for ProxySource {
    fn list_all(&self) -> Result<Vec<Package>, NufeedError> {
        let remote = self.remote_or_empty("listing all packages", self.remote.list_all());
        Ok(self.merge(remote, self.hosted.list_all()?))
    }

    fn list_by_id(&self, id: &str) -> Result<Vec<Package>, NufeedError> {
        let remote =
            self.remote_or_empty("listing packages by id", self.remote.list_by_id(id));
        Ok(self.merge(remote, self.hosted.list_by_id(id)?))
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

    /// Cache-aside read-through. A hosted hit is served as-is; a miss is
    /// fetched from the remote and pushed into the hosted source before the
    /// now-hosted copy is returned. Fetch-through is best-effort: a remote
    /// failure or a refused cache write logs and reads as "not found".
    fn get_exact(&self, id: &str, version: &Version) -> Result<Option<Package>, NufeedError> {
        if let Some(cached) = self.hosted.get_exact(id, version)? {
            return Ok(Some(cached));
        }

        let fetched = match self.remote.get_exact(id, version) {
            Ok(found) => found,
            Err(err) => {
                warn!("Remote source failed while fetching {id}:{version}: {err}");
                return Ok(None);
            }
        };
        let Some(fetched) = fetched else {
            return Ok(None);
        };

        debug!("Caching {fetched} into the hosted source");
        match self.hosted.push(&fetched, None) {
            Ok(true) => {}
            Ok(false) => {
                warn!("Hosted source refused to cache {fetched}");
                return Ok(None);
            }
            Err(err) => {
                warn!("Caching {fetched} failed: {err}");
                return Ok(None);
            }
        }
        self.hosted.get_exact(id, version)
    }

    /// The proxy is never a write target; writes land in the hosted source
    /// through the read-through path or direct administration.
    fn push(&self, package: &Package, _api_key: Option<&str>) -> Result<bool, NufeedError> {
        debug!("Refusing push of {package}: the proxy is not a write target");
        Ok(false)
    }

    fn remove(&self, _id: &str, _version: &Version) -> Result<(), NufeedError> {
        Err(NufeedError::UnsupportedOperation("remove on a proxy source"))
    }

    fn push_strategy(&self) -> Result<Arc<dyn PushStrategy>, NufeedError> {
        self.hosted.push_strategy()
    }

    fn set_push_strategy(&self, strategy: Arc<dyn PushStrategy>) -> Result<(), NufeedError> {
        self.hosted.set_push_strategy(strategy)
    }
}

impl std::fmt::Debug for ProxySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxySource")
            .field("hosted", &self.hosted)
            .field("remote", &self.remote)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;
    use crate::source::push::SimplePushStrategy;
    use crate::source::HostedSource;
    use crate::test_utils::{FailingSource, FixtureNupkg, StaticSource};

    fn writable_hosted(dir: &std::path::Path) -> Arc<HostedSource> {
        let hosted = HostedSource::open(dir).unwrap();
        hosted
            .set_push_strategy(Arc::new(SimplePushStrategy::allow()))
            .unwrap();
        Arc::new(hosted)
    }

    fn package(id: &str, version: &str) -> Package {
        Package::from_bytes(&FixtureNupkg::new(id, version).bytes()).unwrap()
    }

    #[test]
    fn listings_union_remote_and_hosted() {
        let dir = tempdir().unwrap();
        FixtureNupkg::new("C", "1.0").write_to(dir.path());
        let hosted = writable_hosted(dir.path());
        let remote = Arc::new(StaticSource::new(vec![
            package("A", "1.0"),
            package("B", "1.0"),
        ]));

        let proxy = ProxySource::new(hosted, remote);
        let all: Vec<_> = proxy
            .list_all()
            .unwrap()
            .iter()
            .map(|p| format!("{p}"))
            .collect();
        assert_eq!(all, ["A:1.0", "B:1.0", "C:1.0"]);
    }

    #[test]
    fn hosted_overrides_remote_for_the_same_version() {
        let dir = tempdir().unwrap();
        let hosted_copy = Package::from_file(
            FixtureNupkg::new("Shared", "1.0")
                .with_description("hosted copy")
                .write_to(dir.path()),
        )
        .unwrap();
        let hosted = writable_hosted(dir.path());
        let remote_copy =
            Package::from_bytes(&FixtureNupkg::new("Shared", "1.0").bytes()).unwrap();
        let remote = Arc::new(StaticSource::new(vec![remote_copy]));

        let proxy = ProxySource::new(hosted, remote);
        let merged = proxy.list_by_id("shared").unwrap();
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].hash().unwrap(), hosted_copy.hash().unwrap());
    }

    #[test]
    fn dead_remote_degrades_to_hosted_results() {
        let dir = tempdir().unwrap();
        FixtureNupkg::new("Local", "1.0").write_to(dir.path());
        let proxy = ProxySource::new(writable_hosted(dir.path()), Arc::new(FailingSource));

        let all = proxy.list_all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id(), "Local");
        assert!(proxy
            .get_exact("Missing", &"1.0".parse().unwrap())
            .unwrap()
            .is_none());
    }

    #[test]
    fn get_exact_caches_remote_hits_into_the_hosted_source() {
        let dir = tempdir().unwrap();
        let hosted = writable_hosted(dir.path());
        let upstream = package("Cached", "1.2");
        let remote = Arc::new(StaticSource::new(vec![upstream.clone()]));
        let proxy = ProxySource::new(hosted.clone(), remote);

        let version: Version = "1.2".parse().unwrap();
        let served = proxy.get_exact("cached", &version).unwrap().unwrap();
        assert_eq!(served, upstream);

        // The remote goes away; the cached copy keeps serving.
        let offline = ProxySource::new(hosted, Arc::new(FailingSource));
        let still_served = offline.get_exact("cached", &version).unwrap().unwrap();
        assert_eq!(still_served, upstream);
    }

    #[test]
    fn refused_cache_write_reads_as_not_found() {
        let dir = tempdir().unwrap();
        // Default hosted strategy denies, so the cache write is refused.
        let hosted = Arc::new(HostedSource::open(dir.path()).unwrap());
        let remote = Arc::new(StaticSource::new(vec![package("Denied", "1.0")]));
        let proxy = ProxySource::new(hosted, remote);

        assert!(proxy
            .get_exact("Denied", &"1.0".parse().unwrap())
            .unwrap()
            .is_none());
    }

    #[test]
    fn get_latest_scans_the_merged_versions() {
        let dir = tempdir().unwrap();
        FixtureNupkg::new("Pkg", "1.0").write_to(dir.path());
        let remote = Arc::new(StaticSource::new(vec![package("Pkg", "2.0")]));
        let proxy = ProxySource::new(writable_hosted(dir.path()), remote);

        let latest = proxy.get_latest("pkg").unwrap().unwrap();
        assert_eq!(latest.version(), &"2.0".parse().unwrap());
        assert!(proxy.get_latest("absent").unwrap().is_none());
    }

    #[test]
    fn pushes_to_the_proxy_are_refused() {
        let dir = tempdir().unwrap();
        let proxy = ProxySource::new(writable_hosted(dir.path()), Arc::new(FailingSource));
        let pkg = package("Direct", "1.0");
        assert!(!proxy.push(&pkg, None).unwrap());
        assert!(matches!(
            proxy.remove("Direct", &"1.0".parse().unwrap()),
            Err(NufeedError::UnsupportedOperation(_))
        ));
    }
}
