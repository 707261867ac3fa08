//! Push admission strategies.
//!
//! A [`PushStrategy`] decides whether a source accepts a pushed package and
//! gets trigger hooks around a successful write. Sources hold the strategy
//! behind a swappable slot, so policy can change at runtime without touching
//! the source itself.

use std::fmt;

use crate::package::Package;

/// Pluggable admission policy for `push`.
///
/// `can_push` runs before anything is written; the trigger hooks run around a
/// write the strategy admitted. Hooks default to no-ops.
pub trait PushStrategy: Send + Sync + fmt::Debug {
    /// Whether this push may proceed.
    fn can_push(&self, package: &Package, api_key: Option<&str>) -> bool;

    /// Runs just before an admitted package is written.
    fn before_push(&self, _package: &Package) {}

    /// Runs after an admitted package was written successfully.
    fn after_push(&self, _package: &Package) {}
}

/// Unconditional allow or deny. Deny is the default policy of a freshly
/// constructed hosted source.
#[derive(Debug, Clone, Copy)]
pub struct SimplePushStrategy {
    allow: bool,
}

impl SimplePushStrategy {
    pub fn new(allow: bool) -> Self {
        Self { allow }
    }

    pub fn allow() -> Self {
        Self::new(true)
    }

    pub fn deny() -> Self {
        Self::new(false)
    }
}

impl PushStrategy for SimplePushStrategy {
    fn can_push(&self, _package: &Package, _api_key: Option<&str>) -> bool {
        self.allow
    }
}

/// Admits a push when the presented API key matches the configured one.
/// The key is opaque to the engine; no hashing or policy beyond equality.
#[derive(Debug, Clone)]
pub struct ApiKeyPushStrategy {
    key: String,
}

impl ApiKeyPushStrategy {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

impl PushStrategy for ApiKeyPushStrategy {
    fn can_push(&self, _package: &Package, api_key: Option<&str>) -> bool {
        api_key == Some(self.key.as_str())
    }
}
