#![deny(missing_docs)]

//! # APIProbe CLI
//!
//! Command Line Interface over the apiprobe parameter model and rule engine.
//!
//! Supported Commands:
//! - `render`: Fills an operation and prints its parameters as sent on the wire.
//! - `paths`: Lists the structural and REST path of every node.
//! - `rules`: Prints declared and extracted rules, optionally applying them.

use clap::{Parser, Subcommand};

use crate::error::CliResult;
use crate::settings::{init_tracing, GlobalArgs};

mod error;
#[cfg(feature = "client")]
mod extractor;
mod paths;
mod render;
mod rules;
mod settings;

#[derive(Parser, Debug)]
#[clap(author, version, about = "REST API parameter modeling and rule inference")]
struct Cli {
    #[clap(flatten)]
    global: GlobalArgs,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Render every root parameter with its declared style.
    Render(render::RenderArgs),
    /// List node paths of an operation.
    Paths(paths::PathsArgs),
    /// Print the rules of an operation.
    Rules(rules::RulesArgs),
}

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {}", err);
        std::process::exit(1);
    }
}

fn run() -> CliResult<()> {
    // A missing .env file is fine.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    let config = cli.global.engine_config()?;
    init_tracing(&config.log_level);
    tracing::debug!(?config, "engine configuration loaded");

    let output = match &cli.command {
        Commands::Render(args) => render::execute(args, config)?,
        Commands::Paths(args) => paths::execute(args)?,
        Commands::Rules(args) => rules::execute(args, config)?,
    };
    print!("{}", output);
    Ok(())
}
