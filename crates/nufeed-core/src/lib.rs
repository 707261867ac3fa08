//! Package-repository engine for nufeed.
//!
//! This crate holds everything with algorithmic or concurrency weight in a
//! NuGet-style feed server:
//!
//! - the [`Package`](package::Package) entity and its
//!   [`Version`](version::Version) value type,
//! - the in-memory [`Index`](index::Index),
//! - the [`PackageSource`](source::PackageSource) capability surface with
//!   hosted, remote, indexed and proxy variants.
//!
//! Feed serialization, the admin surface and configuration live in sibling
//! crates; this one exposes plain package values and collections.

pub mod error;
pub mod hash;
mod http;
pub mod index;
pub mod package;
pub mod source;
pub mod test_utils;
pub mod version;

pub use error::{ErrorContext, NufeedError};
pub use hash::PackageHash;
pub use index::Index;
pub use package::{Manifest, Package};
pub use source::{
    HostedSource, IndexedSource, PackageSource, ProxySource, PushStrategy, RebuildHandle,
    RemoteSource,
};
pub use version::Version;

pub type NufeedResult<T> = std::result::Result<T, NufeedError>;
