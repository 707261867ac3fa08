use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

#[derive(Parser)]
#[command(
    author,
    version,
    about,
    help_template = "{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}",
    arg_required_else_help = true
)]
pub struct Args {
    /// Set output verbosity
    #[arg(short = 'v', long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress outputs
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output as json
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Disable colors in output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Provide custom config file
    #[arg(short, long, global = true, default_value = "nufeed.toml")]
    pub config: PathBuf,

    /// Operate on a named source instead of the configured default
    #[arg(short, long, global = true)]
    pub source: Option<String>,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List packages in the source
    #[clap(name = "list", visible_alias = "ls")]
    List {
        /// Only list versions of this package id
        id: Option<String>,

        /// Only list the highest version per id
        #[arg(short, long)]
        latest: bool,
    },

    /// Show one package's metadata, hash and frameworks
    Show {
        id: String,
        version: String,
    },

    /// Copy a package's bytes out of the source
    Fetch {
        id: String,
        version: String,

        /// Destination file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Push a package archive into the source
    Push {
        /// Package archive file
        file: PathBuf,

        /// API key presented to the push strategy
        #[arg(long)]
        api_key: Option<String>,
    },

    /// Remove a package from sources that support deletion
    #[clap(name = "remove", visible_alias = "rm")]
    Remove {
        id: String,
        version: String,
    },
}
