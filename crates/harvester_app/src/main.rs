//! `harvester`: one bounded, resumable harvest per invocation.
mod cli;
mod commands;
mod lock;

use std::process::ExitCode;

use clap::Parser;

use cli::Cli;

fn main() -> ExitCode {
    let cli = Cli::parse();
    engine_logging::initialize(cli.log_destination(), cli.log_level());

    if let Err(err) = commands::dispatch(cli) {
        eprintln!("Error: {err:#}");
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}
