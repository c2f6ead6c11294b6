use std::{io::Write, sync::Arc};

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use client_core::{AddOutcome, ClientSettings, HttpSquareBackend, SessionHandle, SyncEvent};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::broadcast::error::RecvError,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod render;

#[derive(Parser, Debug)]
struct Cli {
    /// Overrides `server_url` from client.toml / APP__SERVER_URL.
    #[arg(long)]
    server_url: Option<String>,
    #[arg(long, default_value = client_core::config::DEFAULT_CONFIG_PATH)]
    config: String,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the grid once and exit.
    Show,
    Add {
        #[arg(long, default_value_t = 1)]
        count: usize,
    },
    /// Delete every square on the server.
    Reset {
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Input {
    Add,
    Reset,
    Quit,
}

fn parse_input(line: &str) -> Option<Input> {
    match line.trim().to_ascii_lowercase().as_str() {
        "a" | "add" => Some(Input::Add),
        "r" | "reset" => Some(Input::Reset),
        "q" | "quit" | "exit" => Some(Input::Quit),
        _ => None,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();

    let mut settings = ClientSettings::load_from(&cli.config);
    if let Some(server_url) = cli.server_url {
        settings.server_url = server_url;
    }
    let url = settings.validate()?;
    info!(%url, "starting square session");

    let backend = Arc::new(HttpSquareBackend::new(url.as_str())?);
    let handle = SessionHandle::spawn(backend, &settings);

    match cli.command {
        None => run_interactive(&handle).await?,
        Some(Command::Show) => print_grid(&handle).await?,
        Some(Command::Add { count }) => {
            for _ in 0..count {
                report_add(handle.add_square().await?);
            }
            print_grid(&handle).await?;
        }
        Some(Command::Reset { yes }) => {
            if !yes {
                bail!("refusing to delete all squares without --yes");
            }
            if !handle.reset().await? {
                bail!("the server did not accept the reset");
            }
            print_grid(&handle).await?;
        }
    }

    handle.shutdown().await
}

async fn print_grid(handle: &SessionHandle) -> Result<()> {
    let snapshot = handle.snapshot().await?;
    print!("{}", render::render(&snapshot));
    std::io::stdout().flush()?;
    Ok(())
}

fn report_add(outcome: AddOutcome) {
    match outcome {
        AddOutcome::Skipped => println!("{}", render::SYNCING_LABEL),
        AddOutcome::Persisted(square) => println!("added square {} ({})", square.id, square.color),
        AddOutcome::Queued(square) => {
            println!("queued square {} ({}) until the server is back", square.id, square.color)
        }
        AddOutcome::Conflict(square) => println!("square {} already exists on the server", square.id),
        AddOutcome::Unpersisted(square) => {
            println!("square {} could not be saved", square.id)
        }
    }
}

async fn run_interactive(handle: &SessionHandle) -> Result<()> {
    let mut events = handle.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut confirming_reset = false;
    print_grid(handle).await?;
    print_help();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if confirming_reset {
                    confirming_reset = false;
                    if line.trim().eq_ignore_ascii_case("y") {
                        if !handle.reset().await? {
                            println!("{}", render::DISCONNECTED_LABEL);
                        }
                    } else {
                        println!("reset cancelled");
                    }
                    print_grid(handle).await?;
                    continue;
                }
                match parse_input(&line) {
                    Some(Input::Add) => {
                        report_add(handle.add_square().await?);
                        print_grid(handle).await?;
                    }
                    Some(Input::Reset) => {
                        print!("Delete all squares? [y/N] ");
                        std::io::stdout().flush()?;
                        confirming_reset = true;
                    }
                    Some(Input::Quit) => break,
                    None => print_help(),
                }
            }
            event = events.recv() => match event {
                Ok(SyncEvent::ConnectivityChanged { .. } | SyncEvent::SyncFinished(_))
                    if !confirming_reset =>
                {
                    print_grid(handle).await?;
                }
                Ok(SyncEvent::Warning(message)) => warn!(%message, "sync warning"),
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "missed sync events"),
                Err(RecvError::Closed) => break,
            },
        }
    }
    Ok(())
}

fn print_help() {
    println!("commands: a(dd), r(eset), q(uit)");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_interactive_commands() {
        assert_eq!(parse_input("a"), Some(Input::Add));
        assert_eq!(parse_input(" ADD \n"), Some(Input::Add));
        assert_eq!(parse_input("r"), Some(Input::Reset));
        assert_eq!(parse_input("quit"), Some(Input::Quit));
        assert_eq!(parse_input("x"), None);
    }

    #[test]
    fn reset_subcommand_takes_confirmation_flag() {
        let cli = Cli::try_parse_from(["desktop", "reset", "--yes"]).expect("parse");
        assert!(matches!(cli.command, Some(Command::Reset { yes: true })));

        let cli = Cli::try_parse_from(["desktop", "add", "--count", "3"]).expect("parse");
        assert!(matches!(cli.command, Some(Command::Add { count: 3 })));
        assert_eq!(cli.config, "client.toml");
    }
}
