mod catalog;
mod cli;
mod commands;
mod composition;
mod paths;
mod progress;
mod provisioner;
mod state;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use std::io;
use std::path::PathBuf;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
    /// Composition file, if one was given
    pub file: Option<PathBuf>,
    /// `--set` overrides in command-line order
    pub overrides: Vec<(String, String)>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    let ctx = Context {
        verbose: cli.verbose,
        quiet: cli.quiet,
        file: cli.file,
        overrides: cli.overrides,
    };

    match cli.command {
        Command::Settings(args) => commands::settings::run(&ctx, args.format),
        Command::Validate => commands::validate::run(&ctx),
        Command::Graph(args) => commands::graph::run(&ctx, args.format),
        Command::Plan(args) => commands::plan::run(&ctx, &args),
        Command::Diff(args) => commands::diff::run(&ctx, &args),
        Command::Apply(args) => commands::apply::run(&ctx, &args),
        Command::Templates => commands::templates::run(&ctx),
        Command::Completions { shell } => {
            generate(shell, &mut Cli::command(), "stackplan", &mut io::stdout());
            Ok(())
        }
    }
}
