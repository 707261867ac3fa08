//! Error types for nufeed-core.

use miette::Diagnostic;
use thiserror::Error;

/// Engine error type for package, index and source operations.
#[derive(Error, Diagnostic, Debug)]
pub enum NufeedError {
    #[error("Invalid package filename '{0}'")]
    #[diagnostic(
        code(nufeed::format::filename),
        help("Package files must be named <id>.<version>.nupkg")
    )]
    InvalidFileName(String),

    #[error("Invalid version string '{0}'")]
    #[diagnostic(
        code(nufeed::format::version),
        help("Versions must match major.minor[.build[.revision]]")
    )]
    InvalidVersion(String),

    #[error("Malformed package manifest: {0}")]
    #[diagnostic(code(nufeed::format::manifest))]
    InvalidManifest(String),

    #[error(transparent)]
    #[diagnostic(code(nufeed::format::xml))]
    XmlError(#[from] quick_xml::Error),

    #[error("Invalid package hash: {0}")]
    #[diagnostic(code(nufeed::format::hash))]
    InvalidHash(#[from] base64::DecodeError),

    #[error("Error while {action}")]
    #[diagnostic(code(nufeed::io), help("Check file permissions and disk space"))]
    IoError {
        action: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Unreadable package archive: {0}")]
    #[diagnostic(code(nufeed::archive))]
    ZipError(#[from] zip::result::ZipError),

    #[error(transparent)]
    #[diagnostic(
        code(nufeed::network),
        help("Check your internet connection and the feed URL")
    )]
    UreqError(#[from] ureq::Error),

    #[error("Invalid feed URL: {0}")]
    #[diagnostic(code(nufeed::url), help("Provide an absolute http(s) URL"))]
    InvalidUrl(#[from] url::ParseError),

    #[error("Package '{0}' not found")]
    #[diagnostic(code(nufeed::package_not_found))]
    PackageNotFound(String),

    #[error("Operation '{0}' is not supported by this package source")]
    #[diagnostic(
        code(nufeed::unsupported),
        help("This is a fixed limitation of the source variant, not a transient failure")
    )]
    UnsupportedOperation(&'static str),

    #[error("Thread lock poison error")]
    #[diagnostic(
        code(nufeed::poison),
        help("This is an internal error, please report it")
    )]
    PoisonError,

    #[error("{0}")]
    #[diagnostic(code(nufeed::error))]
    Custom(String),
}

impl<T> From<std::sync::PoisonError<T>> for NufeedError {
    fn from(_: std::sync::PoisonError<T>) -> Self {
        Self::PoisonError
    }
}

/// Trait for adding context to IO errors.
pub trait ErrorContext<T> {
    fn with_context<C>(self, context: C) -> std::result::Result<T, NufeedError>
    where
        C: FnOnce() -> String;
}

impl<T> ErrorContext<T> for std::io::Result<T> {
    fn with_context<C>(self, context: C) -> std::result::Result<T, NufeedError>
    where
        C: FnOnce() -> String,
    {
        self.map_err(|err| NufeedError::IoError {
            action: context(),
            source: err,
        })
    }
}
