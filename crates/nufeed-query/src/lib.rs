//! Query-expression engine for nufeed.
//!
//! A predicate is a small tree of [`Expression`] nodes evaluated against a
//! [`PackageSource`](nufeed_core::PackageSource). Each node advertises
//! whether it is cheaper to filter an existing candidate set than to scan
//! the source itself, and [`And`] uses that signal to pick an execution
//! strategy that avoids full scans where a narrow predicate can prune a
//! broad one.

pub mod error;
pub mod expr;
pub mod terms;

pub use error::QueryError;
pub use expr::{And, Expression};
pub use terms::{CmpOp, IdIs, Latest, VersionMatches};

#[cfg(test)]
mod test_support {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use nufeed_core::source::PushStrategy;
    use nufeed_core::test_utils::{FixtureNupkg, StaticSource};
    use nufeed_core::{NufeedError, Package, PackageSource, Version};

    pub fn packages(specs: &[(&str, &str)]) -> Vec<Package> {
        specs
            .iter()
            .map(|(id, version)| {
                Package::from_bytes(&FixtureNupkg::new(id, version).bytes()).unwrap()
            })
            .collect()
    }

    /// Static source that counts scans, so tests can assert which execution
    /// strategy ran.
    #[derive(Debug)]
    pub struct RecordingSource {
        inner: StaticSource,
        list_all: AtomicUsize,
        list_by_id: AtomicUsize,
    }

    impl RecordingSource {
        pub fn new(packages: Vec<Package>) -> Self {
            Self {
                inner: StaticSource::new(packages),
                list_all: AtomicUsize::new(0),
                list_by_id: AtomicUsize::new(0),
            }
        }

        pub fn list_all_calls(&self) -> usize {
            self.list_all.load(Ordering::SeqCst)
        }

        pub fn list_by_id_calls(&self) -> usize {
            self.list_by_id.load(Ordering::SeqCst)
        }
    }

    impl PackageSource for RecordingSource {
        fn list_all(&self) -> Result<Vec<Package>, NufeedError> {
            self.list_all.fetch_add(1, Ordering::SeqCst);
            self.inner.list_all()
        }

        fn list_by_id(&self, id: &str) -> Result<Vec<Package>, NufeedError> {
            self.list_by_id.fetch_add(1, Ordering::SeqCst);
            self.inner.list_by_id(id)
        }

        fn list_latest_all(&self) -> Result<Vec<Package>, NufeedError> {
            self.inner.list_latest_all()
        }

        fn get_latest(&self, id: &str) -> Result<Option<Package>, NufeedError> {
            self.inner.get_latest(id)
        }

        fn get_exact(&self, id: &str, version: &Version) -> Result<Option<Package>, NufeedError> {
            self.inner.get_exact(id, version)
        }

        fn push(&self, package: &Package, api_key: Option<&str>) -> Result<bool, NufeedError> {
            self.inner.push(package, api_key)
        }

        fn remove(&self, id: &str, version: &Version) -> Result<(), NufeedError> {
            self.inner.remove(id, version)
        }

        fn push_strategy(&self) -> Result<Arc<dyn PushStrategy>, NufeedError> {
            self.inner.push_strategy()
        }

        fn set_push_strategy(&self, strategy: Arc<dyn PushStrategy>) -> Result<(), NufeedError> {
            self.inner.set_push_strategy(strategy)
        }
    }
}
