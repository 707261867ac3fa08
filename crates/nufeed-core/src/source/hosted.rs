//! Filesystem-backed hosted source.
//!
//! Packages live as `<id>.<version>.nupkg` files in one flat store
//! directory. The directory is authoritative; every listing is a fresh scan.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::error::{ErrorContext, NufeedError};
use crate::package::Package;
use crate::source::push::{PushStrategy, SimplePushStrategy};
use crate::source::{keep_latest, PackageSource};
use crate::version::Version;

/// The locally-writable backing store of packages.
pub struct HostedSource {
    root: PathBuf,
    strategy: RwLock<Arc<dyn PushStrategy>>,
}

impl HostedSource {
    /// Opens a store directory, creating it if absent. Pushes are denied
    /// until a permitting strategy is set.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self, NufeedError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)
            .with_context(|| format!("creating store directory '{}'", root.display()))?;
        Ok(Self {
            root,
            strategy: RwLock::new(Arc::new(SimplePushStrategy::deny())),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Scans the store directory. Files that are not valid package names are
    /// skipped with a warning; a package whose name no longer parses must not
    /// take the whole listing down.
    fn scan(&self) -> Result<Vec<Package>, NufeedError> {
        let entries = fs::read_dir(&self.root)
            .with_context(|| format!("reading store directory '{}'", self.root.display()))?;

        let mut packages = Vec::new();
        for entry in entries {
            let entry = entry
                .with_context(|| format!("reading store directory '{}'", self.root.display()))?;
            let path = entry.path();
            if path.is_dir() {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !Package::is_valid_file_name(name) {
                warn!("Skipping foreign file '{name}' in '{}'", self.root.display());
                continue;
            }
            packages.push(Package::from_file(&path)?);
        }
        packages.sort_by(|a, b| {
            a.id()
                .to_ascii_lowercase()
                .cmp(&b.id().to_ascii_lowercase())
                .then_with(|| a.version().cmp(b.version()))
        });
        Ok(packages)
    }

    fn store_path(&self, package: &Package) -> PathBuf {
        self.root.join(package.file_name())
    }
}

impl PackageSource for HostedSource {
    fn list_all(&self) -> Result<Vec<Package>, NufeedError> {
        self.scan()
    }

    fn list_by_id(&self, id: &str) -> Result<Vec<Package>, NufeedError> {
        let mut packages = self.scan()?;
        packages.retain(|p| p.id().eq_ignore_ascii_case(id));
        Ok(packages)
    }

    fn list_latest_all(&self) -> Result<Vec<Package>, NufeedError> {
        Ok(keep_latest(self.scan()?))
    }

    fn get_latest(&self, id: &str) -> Result<Option<Package>, NufeedError> {
        Ok(self
            .list_by_id(id)?
            .into_iter()
            .max_by(|a, b| a.version().cmp(b.version())))
    }

    fn get_exact(&self, id: &str, version: &Version) -> Result<Option<Package>, NufeedError> {
        Ok(self
            .list_by_id(id)?
            .into_iter()
            .find(|p| p.version() == version))
    }

    /// Persists the package's bytes under its canonical filename. The write
    /// is atomic: bytes land in a temp file in the store directory first,
    /// then a rename publishes them.
    fn push(&self, package: &Package, api_key: Option<&str>) -> Result<bool, NufeedError> {
        let strategy = self.push_strategy()?;
        if !strategy.can_push(package, api_key) {
            debug!("Push of {package} refused by strategy");
            return Ok(false);
        }
        strategy.before_push(package);

        let target = self.store_path(package);
        let mut temp = NamedTempFile::new_in(&self.root)
            .with_context(|| format!("creating a temp file in '{}'", self.root.display()))?;
        let mut reader = package.open()?;
        std::io::copy(&mut reader, &mut temp)
            .with_context(|| format!("writing {package} into the store"))?;
        temp.persist(&target).map_err(|err| NufeedError::IoError {
            action: format!("publishing '{}'", target.display()),
            source: err.error,
        })?;

        debug!("Stored {package} at '{}'", target.display());
        strategy.after_push(package);
        Ok(true)
    }

    fn remove(&self, id: &str, version: &Version) -> Result<(), NufeedError> {
        let Some(package) = self.get_exact(id, version)? else {
            return Err(NufeedError::PackageNotFound(format!("{id}:{version}")));
        };
        let path = self.store_path(&package);
        fs::remove_file(&path).with_context(|| format!("removing '{}'", path.display()))
    }

    fn push_strategy(&self) -> Result<Arc<dyn PushStrategy>, NufeedError> {
        Ok(self.strategy.read()?.clone())
    }

    fn set_push_strategy(&self, strategy: Arc<dyn PushStrategy>) -> Result<(), NufeedError> {
        *self.strategy.write()? = strategy;
        Ok(())
    }
}

impl std::fmt::Debug for HostedSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostedSource")
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}
