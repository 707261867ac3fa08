use miette::Diagnostic;
use thiserror::Error;

use nufeed_core::NufeedError;

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Error, Diagnostic, Debug)]
pub enum ConfigError {
    #[error("TOML deserialization error: {0}")]
    #[diagnostic(
        code(nufeed_config::toml_deserialize),
        help("Check your configuration syntax and structure")
    )]
    TomlDeError(#[from] toml::de::Error),

    #[error("Error while {action}")]
    #[diagnostic(code(nufeed_config::io))]
    IoError {
        action: String,
        #[source]
        source: std::io::Error,
    },

    #[error("The configuration defines no sources")]
    #[diagnostic(
        code(nufeed_config::no_sources),
        help("Add at least one [[source]] table to the configuration")
    )]
    NoSources,

    #[error("No source named '{0}' in the configuration")]
    #[diagnostic(
        code(nufeed_config::unknown_source),
        help("Check the [[source]] names in your configuration")
    )]
    UnknownSource(String),

    #[error("Source '{name}' is missing required field '{field}'")]
    #[diagnostic(code(nufeed_config::missing_field))]
    MissingField { name: String, field: &'static str },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Core(#[from] NufeedError),
}
