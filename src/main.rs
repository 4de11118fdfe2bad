// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! photopull - Photo vault sync daemon.
//!
//! Starts the background worker and the local web front end together. The
//! worker authenticates each configured account and pulls its library; when
//! the vault wants a password or a one-time code, the browser page served by
//! the front end is where the user types it in.

use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use photopull::colors::*;
use photopull::config::{self, Config, UserConfig};
use photopull::exchange::StatusExchange;
use photopull::server::Server;
use photopull::worker;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// photopull - Photo vault sync daemon.
#[derive(Parser)]
#[command(name = "photopull")]
#[command(version = VERSION)]
#[command(about = "Photo vault sync daemon. Pulls your library in the background, asks for codes in the browser.")]
#[command(long_about = "photopull - Photo vault sync daemon\n\n\
    Sync once:           photopull run\n\
    Keep watching:       photopull (or: photopull watch)\n\
    Check the daemon:    photopull status (or: photopull s)\n\
    Configure:           photopull config show\n\n\
    Credential prompts appear in the browser while the daemon runs.")]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Verbose mode: debug-level logging for photopull itself
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    /// Quiet mode: no progress bars, warnings and errors only
    #[arg(short = 'q', long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Sync every configured account once, then exit
    ///
    /// Examples:
    ///   photopull run
    ///   photopull run --quiet
    Run,

    /// Sync, then keep re-syncing on the configured interval
    ///
    /// This is also what plain `photopull` does.
    ///
    /// Examples:
    ///   photopull watch
    #[command(alias = "w")]
    Watch,

    /// Show what the running daemon is doing
    ///
    /// Examples:
    ///   photopull status
    ///   photopull s
    #[command(alias = "s")]
    Status,

    /// Configure settings
    ///
    /// Examples:
    ///   photopull config show
    ///   photopull config set-port 8484
    ///   photopull config set-directory ~/Photos/photopull
    ///   photopull config add-user ansel@example.com --album "Camera Roll"
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show current configuration
    ///
    /// Example:
    ///   photopull config show
    Show,

    /// Change the web front end port
    ///
    /// Example:
    ///   photopull config set-port 8080
    SetPort {
        /// Port number
        port: u16,
    },

    /// Change the destination root for downloaded assets
    ///
    /// Example:
    ///   photopull config set-directory ~/Photos/photopull
    SetDirectory {
        /// Destination directory
        directory: PathBuf,
    },

    /// Change the seconds between watch-mode sync passes
    ///
    /// Example:
    ///   photopull config set-interval 1800
    SetInterval {
        /// Interval in seconds
        seconds: u64,
    },

    /// Add a vault account to sync
    ///
    /// The password is never stored by this command; the daemon asks for it
    /// in the browser on the next run.
    ///
    /// Example:
    ///   photopull config add-user ansel@example.com --folder "Camera Roll"
    AddUser {
        /// Vault account username
        username: String,
        /// Library to sync from (defaults to primary)
        #[arg(long)]
        library: Option<String>,
        /// Folder to sync on each pass (repeatable)
        #[arg(long = "folder")]
        folders: Vec<String>,
        /// Album to sync on each pass (repeatable)
        #[arg(long = "album")]
        albums: Vec<String>,
    },

    /// Remove a configured account
    ///
    /// Example:
    ///   photopull config remove-user ansel@example.com
    RemoveUser {
        /// Vault account username
        username: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Scope debug to the app crate so dependency crates stay quieter; the
    // RUST_LOG env var still overrides everything.
    let filter = if cli.verbose {
        "photopull=debug,info"
    } else if cli.quiet {
        "warn"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .init();

    let show_progress = !cli.quiet && std::io::stdout().is_terminal();

    match cli.command {
        None | Some(Commands::Watch) => run_daemon(config::load()?, true, show_progress).await,
        Some(Commands::Run) => run_daemon(config::load()?, false, show_progress).await,
        Some(Commands::Status) => show_status(&config::load()?).await,
        Some(Commands::Config { command }) => handle_config(command),
    }
}

/// Start the worker and the web front end against one shared exchange.
async fn run_daemon(config: Config, watch: bool, show_progress: bool) -> Result<()> {
    if config.users.is_empty() {
        println!("{YELLOW}[!]{RESET} No accounts configured yet.");
        println!("    Add one with: {CYAN}photopull config add-user <USERNAME>{RESET}");
        return Ok(());
    }

    let exchange = Arc::new(StatusExchange::new());
    exchange.set_global_config(config.global.clone());
    exchange.set_user_configs(config.users.clone());

    let server =
        Server::new(config.global.server_port).with_bind_address(&config.global.bind_address);

    println!("{CYAN}{BOLD}photopull{RESET} v{VERSION}");
    println!(
        "{GREEN}[i]{RESET} {} account(s), syncing into {}",
        config.users.len(),
        config.global.directory.display()
    );
    println!(
        "{GREEN}[i]{RESET} Prompts and controls: {BOLD}http://{}:{}{RESET}",
        config.global.bind_address, config.global.server_port
    );
    if watch {
        println!(
            "{DIM}    Watch mode: re-syncing every {}s. Ctrl-C to stop.{RESET}",
            config.global.watch_interval_secs
        );
    }
    println!();

    let worker_handle = {
        let exchange = Arc::clone(&exchange);
        tokio::spawn(worker::run(exchange, config, watch, show_progress))
    };

    // In run mode the worker finishing ends the process; in watch mode the
    // server's graceful shutdown raises the cancel flag and ends it.
    tokio::select! {
        result = server.start(exchange) => result?,
        result = worker_handle => result.context("worker task panicked")??,
    }

    Ok(())
}

/// Query the running daemon's /status endpoint and print it.
async fn show_status(config: &Config) -> Result<()> {
    let url = format!("http://127.0.0.1:{}/status", config.global.server_port);
    let response = match reqwest::get(&url).await {
        Ok(response) => response,
        Err(_) => {
            println!(
                "{YELLOW}[!]{RESET} No daemon answering on port {}.",
                config.global.server_port
            );
            println!("    Start one with: {CYAN}photopull watch{RESET}");
            return Ok(());
        }
    };
    let status: serde_json::Value = response
        .json()
        .await
        .context("Malformed status response from the daemon")?;

    println!();
    println!("{CYAN}{BOLD}=== photopull status ==={RESET}");
    println!();

    let handshake = status["status"].as_str().unwrap_or("unknown");
    match handshake {
        "no_input_needed" => println!("  Handshake:  {GREEN}idle{RESET}"),
        "need_mfa" | "need_password" => println!(
            "  Handshake:  {YELLOW}{}{RESET}  {DIM}(answer in the browser){RESET}",
            handshake
        ),
        other => println!("  Handshake:  {}", other),
    }
    if let Some(user) = status["current_user"].as_str() {
        println!("  Signing in: {}", user);
    }
    if let Some(error) = status["error"].as_str() {
        println!("  Last error: {RED}{}{RESET}", error);
    }
    if status["progress"]["cancel"].as_bool() == Some(true) {
        println!("  {YELLOW}Cancel requested{RESET}");
    } else if status["progress"]["resume"].as_bool() == Some(true) {
        println!("  {YELLOW}Sync requested{RESET}");
    }
    if let Some(accounts) = status["user_configs"].as_array() {
        println!("  Accounts:   {}", accounts.len());
    }
    if let Some(directory) = status["global_config"]["directory"].as_str() {
        println!("  Directory:  {}", directory);
    }
    println!();

    Ok(())
}

fn handle_config(command: Option<ConfigCommands>) -> Result<()> {
    let mut config = config::load()?;

    match command.unwrap_or(ConfigCommands::Show) {
        ConfigCommands::Show => {
            println!();
            println!("{CYAN}{BOLD}=== photopull configuration ==={RESET}");
            println!();
            println!("  Directory:      {}", config.global.directory.display());
            println!("  Watch interval: {}s", config.global.watch_interval_secs);
            println!(
                "  Front end:      http://{}:{}",
                config.global.bind_address, config.global.server_port
            );
            println!("  Vault:          {}", config.global.vault_url);
            println!();
            if config.users.is_empty() {
                println!("  {DIM}No accounts configured.{RESET}");
            } else {
                println!("  Accounts:");
                for user in &config.users {
                    let password = if user.password.is_some() {
                        "stored password"
                    } else {
                        "asks in browser"
                    };
                    println!(
                        "    {} ({}, {} folder(s), {} album(s), {})",
                        user.username,
                        user.library,
                        user.folders.len(),
                        user.albums.len(),
                        password
                    );
                }
            }
            println!();
        }
        ConfigCommands::SetPort { port } => {
            config.global.server_port = port;
            config::save(&config)?;
            println!("{GREEN}[ok]{RESET} Port set to: {}", port);
        }
        ConfigCommands::SetDirectory { directory } => {
            config.global.directory = directory;
            config::save(&config)?;
            println!(
                "{GREEN}[ok]{RESET} Directory set to: {}",
                config.global.directory.display()
            );
        }
        ConfigCommands::SetInterval { seconds } => {
            config.global.watch_interval_secs = seconds;
            config::save(&config)?;
            println!("{GREEN}[ok]{RESET} Watch interval set to: {}s", seconds);
        }
        ConfigCommands::AddUser {
            username,
            library,
            folders,
            albums,
        } => {
            if config.users.iter().any(|u| u.username == username) {
                anyhow::bail!("Account {} is already configured", username);
            }
            config.users.push(UserConfig {
                username: username.clone(),
                password: None,
                library: library.unwrap_or_else(|| "primary".to_string()),
                folders,
                albums,
            });
            config::save(&config)?;
            println!("{GREEN}[ok]{RESET} Added account: {}", username);
            println!("    The password will be asked for in the browser on the next run.");
        }
        ConfigCommands::RemoveUser { username } => {
            let before = config.users.len();
            config.users.retain(|u| u.username != username);
            if config.users.len() == before {
                anyhow::bail!("No configured account named {}", username);
            }
            config::save(&config)?;
            println!("{GREEN}[ok]{RESET} Removed account: {}", username);
        }
    }

    Ok(())
}
