use clap::Parser;
use nufeed_config::{build_source, Config};

use crate::cli::{Args, Commands};
use crate::logging::setup_logging;

mod cli;
mod commands;
mod logging;

fn handle_cli() -> miette::Result<()> {
    let args = Args::parse();

    setup_logging(&args);

    let config = Config::load(&args.config)?;
    let entry = config.select(args.source.as_deref())?;
    let built = build_source(entry)?;
    let source = built.source().as_ref();

    let result = match &args.command {
        Commands::List { id, latest } => {
            commands::list(source, id.as_deref(), *latest, args.json)
        }
        Commands::Show { id, version } => commands::show(source, id, version, args.json),
        Commands::Fetch {
            id,
            version,
            output,
        } => commands::fetch(source, id, version, output),
        Commands::Push { file, api_key } => commands::push(source, file, api_key.as_deref()),
        Commands::Remove { id, version } => commands::remove(source, id, version),
    };

    built.stop();
    result
}

fn main() {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(2)
                .build(),
        )
    }))
    .ok();

    if let Err(err) = handle_cli() {
        eprintln!("{err:?}");
        std::process::exit(1);
    }
}
