use miette::Diagnostic;
use thiserror::Error;

use nufeed_core::NufeedError;

#[derive(Error, Diagnostic, Debug)]
pub enum QueryError {
    #[error("Expression '{0}' cannot run in filter position")]
    #[diagnostic(
        code(nufeed_query::unsupported_filter),
        help("AND composes its children's results; evaluate it with execute")
    )]
    UnsupportedFilter(&'static str),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Source(#[from] NufeedError),
}
