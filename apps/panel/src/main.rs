use std::{
    io::{self, BufRead},
    path::PathBuf,
};

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use crossbeam_channel::bounded;
use tracing_subscriber::EnvFilter;

mod backend_bridge;
mod config;
mod controller;
mod ui;

use backend_bridge::commands::BackendCommand;
use controller::{
    events::UiEvent,
    line::{parse_line, LineAction, HELP},
    orchestration::dispatch_backend_command,
};

#[derive(Parser, Debug)]
#[command(name = "divisor-panel", about = "Operator panel for a networked divisor head")]
struct Args {
    /// Device address, overriding the settings file and environment.
    #[arg(long)]
    base_url: Option<String>,
    #[arg(long, default_value = "panel.toml")]
    config: PathBuf,
    /// Log filter directive, e.g. `info` or `client_core=debug`.
    #[arg(long)]
    log_level: Option<String>,
}

fn init_tracing(log_level: Option<&str>) {
    let filter = match log_level {
        Some(directive) => EnvFilter::new(directive),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.log_level.as_deref());

    let mut settings = config::load_settings(&args.config)?;
    if let Some(base_url) = args.base_url {
        settings.base_url = base_url;
        config::validate(&settings)?;
    }
    tracing::info!(base_url = %settings.base_url, "starting divisor panel");

    let (cmd_tx, cmd_rx) = bounded::<BackendCommand>(256);
    let (ui_tx, ui_rx) = bounded::<UiEvent>(2048);
    let backend = backend_bridge::runtime::launch(settings, cmd_rx, ui_tx);
    let printer = ui::spawn_printer(ui_rx);

    println!("{HELP}");
    for line in io::stdin().lock().lines() {
        let line = line.context("failed to read operator input")?;
        match parse_line(&line) {
            LineAction::Send(cmd) => {
                if let Some(status) = dispatch_backend_command(&cmd_tx, cmd) {
                    println!("{status}");
                }
            }
            LineAction::Help => println!("{HELP}"),
            LineAction::Quit => break,
            LineAction::Empty => {}
            LineAction::Usage(usage) => println!("usage: {usage}"),
            LineAction::Unknown(verb) => println!("unknown command '{verb}'; type `help`"),
        }
    }

    // The worker may already be gone after a startup failure.
    let _ = cmd_tx.send(BackendCommand::Shutdown);
    drop(cmd_tx);
    backend
        .join()
        .map_err(|_| anyhow!("backend worker panicked"))?;
    printer
        .join()
        .map_err(|_| anyhow!("panel printer panicked"))?;
    Ok(())
}
