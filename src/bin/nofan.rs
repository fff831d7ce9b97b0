// Copyright (c) 2026 Pegasus Heavy Industries LLC
// Licensed under the MIT License

//! nofan: `nofan run` starts the fan control daemon; any other command name
//! is sent to the running daemon and its answer printed.

use anyhow::Context;
use clap::{Parser, Subcommand};
use nofan::config::{self, Config};
use nofan::{client, daemon, logging};
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "nofan",
    about = "Laptop fan control daemon",
    disable_help_subcommand = true
)]
struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, global = true, default_value = config::DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Run the daemon in the foreground.
    Run,

    /// Send a command (status, pause, resume) to the running daemon.
    #[command(external_subcommand)]
    Client(Vec<String>),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Cmd::Run => run_daemon(&cli.config).await,
        Cmd::Client(args) => {
            let cmd = args.first().map(String::as_str).unwrap_or_default();
            run_client(&cli.config, cmd)
        }
    }
}

async fn run_daemon(config_path: &Path) -> anyhow::Result<()> {
    // Config errors are reported before logging exists.
    let cfg = config::resolve(config_path)
        .with_context(|| format!("Could not load config {}", config_path.display()))?;

    logging::init_daemon(&cfg.daemon.log_path, cfg.log_console);
    log::info!("nofan {} starting", env!("CARGO_PKG_VERSION"));

    daemon::run(cfg).await.inspect_err(|e| log::error!("{e:#}"))
}

fn run_client(config_path: &Path, cmd: &str) -> anyhow::Result<()> {
    logging::init_client();

    let cfg = config::resolve(config_path).unwrap_or_else(|e| {
        log::warn!("Could not load config: {e}, using defaults");
        let mut cfg = Config::default();
        cfg.apply_env(|key| std::env::var(key).ok());
        cfg
    });

    let socket_path = cfg.socket_path();
    let raw = client::send_command(&socket_path, cmd)
        .with_context(|| format!("Failed to talk to daemon at {}", socket_path.display()))?;

    println!("{}", client::render(&raw));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_is_the_daemon() {
        let cli = Cli::try_parse_from(["nofan", "run"]).unwrap();
        assert!(matches!(cli.command, Cmd::Run));
        assert_eq!(cli.config, PathBuf::from(config::DEFAULT_CONFIG_PATH));
    }

    #[test]
    fn test_other_names_go_to_the_daemon() {
        for name in ["status", "pause", "resume", "help"] {
            let cli = Cli::try_parse_from(["nofan", name]).unwrap();
            match cli.command {
                Cmd::Client(args) => assert_eq!(args, vec![name.to_string()]),
                Cmd::Run => panic!("{name} parsed as run"),
            }
        }
    }

    #[test]
    fn test_config_flag_before_command() {
        let cli = Cli::try_parse_from(["nofan", "-c", "/tmp/n.toml", "status"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("/tmp/n.toml"));
    }
}
