//! Compile-time source factory.
//!
//! Maps a configuration entry to a concrete source stack. The mapping is a
//! fixed enumeration over [`SourceKind`]; there is no name-based class
//! loading.

use std::sync::Arc;

use nufeed_core::source::{ApiKeyPushStrategy, SimplePushStrategy};
use nufeed_core::{HostedSource, IndexedSource, PackageSource, ProxySource, RebuildHandle, RemoteSource};

use crate::config::{SourceEntry, SourceKind};
use crate::error::Result;

/// A constructed source plus the rebuild task keeping its index fresh.
/// Dropping the handle stops the task.
pub struct BuiltSource {
    source: Arc<dyn PackageSource>,
    rebuild: Option<RebuildHandle>,
}

impl BuiltSource {
    pub fn source(&self) -> &Arc<dyn PackageSource> {
        &self.source
    }

    /// Stops the rebuild task, if one is running, and releases the source.
    pub fn stop(self) {
        if let Some(handle) = self.rebuild {
            handle.stop();
        }
    }
}

impl std::fmt::Debug for BuiltSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuiltSource")
            .field("source", &self.source)
            .field("indexed", &self.rebuild.is_some())
            .finish()
    }
}

/// Builds the source stack a configuration entry describes, starting the
/// index rebuild task when the entry asks for one.
pub fn build_source(entry: &SourceEntry) -> Result<BuiltSource> {
    let base: Arc<dyn PackageSource> = match entry.kind {
        SourceKind::Hosted => Arc::new(hosted_store(entry)?),
        SourceKind::Remote => {
            Arc::new(RemoteSource::new(entry.require("url", &entry.url)?)?)
        }
        SourceKind::Proxy => {
            let cache = HostedSource::open(entry.require("path", &entry.path)?)?;
            // The cache is an internal write target of the fetch-through
            // path, so it always admits the proxy's own writes.
            cache.set_push_strategy(Arc::new(SimplePushStrategy::allow()))?;
            let remote = RemoteSource::new(entry.require("url", &entry.url)?)?;
            Arc::new(ProxySource::new(Arc::new(cache), Arc::new(remote)))
        }
    };

    if !entry.indexed() {
        return Ok(BuiltSource {
            source: base,
            rebuild: None,
        });
    }

    let indexed = match entry.refresh_interval() {
        Some(interval) => IndexedSource::with_refresh(base, interval),
        None => IndexedSource::new(base),
    };
    let handle = indexed.start()?;
    Ok(BuiltSource {
        source: Arc::new(indexed),
        rebuild: Some(handle),
    })
}

/// A hosted store with the entry's push policy applied.
fn hosted_store(entry: &SourceEntry) -> Result<HostedSource> {
    let hosted = HostedSource::open(entry.require("path", &entry.path)?)?;
    if let Some(key) = &entry.api_key {
        hosted.set_push_strategy(Arc::new(ApiKeyPushStrategy::new(key.clone())))?;
    } else if entry.allow_push() {
        hosted.set_push_strategy(Arc::new(SimplePushStrategy::allow()))?;
    }
    Ok(hosted)
}
