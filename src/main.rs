//! aimeta CLI entry point.

use aimeta::cli::{Cli, Commands};
use aimeta::commands::{self, Context};
use aimeta::config::Config;
use aimeta::logging;
use aimeta::prefs::Session;
use anyhow::Result;
use clap::Parser;
use std::io::{self, Write};
use std::process;

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    // Logs sit next to an explicit config file, otherwise in the config dir
    let log_dir = cli
        .config
        .as_ref()
        .and_then(|p| p.parent())
        .filter(|p| !p.as_os_str().is_empty())
        .map(|p| p.join("logs"));
    if let Err(e) = logging::init(log_dir) {
        eprintln!("Warning: logging disabled: {:#}", e);
    }

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    let mut ctx = Context::new(config, cli.preferences_db);
    let mut session = Session::new();

    let stdout = io::stdout();
    let mut out = stdout.lock();
    match cli.command {
        Commands::Shell => {
            let stdin = io::stdin();
            commands::run_shell(&mut ctx, &mut session, stdin.lock(), &mut out)?;
        }
        command => commands::run(command, &ctx, &mut session, &mut out)?,
    }
    out.flush()?;
    Ok(())
}
