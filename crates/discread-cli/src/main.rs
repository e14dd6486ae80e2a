//! Discread - capability-probing sector reader for ATA and SCSI devices
//!
//! # Usage
//!
//! ```bash
//! # Negotiate with a device profile and show what works
//! discread probe profiles/usb-stick.toml
//!
//! # Same, including the raw sector path, as JSON
//! discread probe profiles/plextor-dvd.toml --raw --json
//!
//! # Hex dump blocks 16..20
//! discread read profiles/usb-stick.toml 16 4
//!
//! # Copy the first 1000 blocks to a file
//! discread read profiles/usb-stick.toml 0 1000 --output head.bin
//! ```

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use console::style;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

/// Discread - capability-probing sector reader for ATA and SCSI devices
#[derive(Parser)]
#[command(name = "discread")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Use this settings file instead of the default one
    #[arg(long, global = true, value_name = "FILE", env = "DISCREAD_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Negotiate with a device and show its capabilities
    Probe {
        /// Device profile (TOML)
        profile: PathBuf,

        /// Also look for a raw (long) sector path
        #[arg(long)]
        raw: bool,

        /// Blocks per transfer to start negotiating from
        #[arg(short, long, value_name = "N")]
        blocks: Option<u32>,

        /// Per-command timeout in seconds
        #[arg(short, long, value_name = "SECS")]
        timeout: Option<u64>,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Read a range of blocks
    Read {
        /// Device profile (TOML)
        profile: PathBuf,

        /// First block to read
        start: u64,

        /// Number of blocks (defaults to the rest of the medium)
        count: Option<u64>,

        /// Read raw (long) sectors
        #[arg(long)]
        raw: bool,

        /// Write raw bytes to this file instead of a hex dump to stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Per-command timeout in seconds
        #[arg(short, long, value_name = "SECS")]
        timeout: Option<u64>,
    },

    /// Show or create the settings file
    Config {
        /// Initialize a new configuration file with defaults
        #[arg(long)]
        init: bool,

        /// Show the path to the configuration file
        #[arg(long)]
        path: bool,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn main() {
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("{} {}", style("Error:").red().bold(), panic_info);
    }));

    if let Err(e) = run() {
        eprintln!("{} {:#}", style("Error:").red().bold(), e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else if cli.quiet {
        EnvFilter::new("off")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    let quiet = cli.quiet;
    let settings = commands::load_settings(cli.config.clone());

    match cli.command {
        Commands::Probe {
            profile,
            raw,
            blocks,
            timeout,
            json,
        } => commands::probe::execute(commands::probe::ProbeArgs {
            profile,
            overrides: commands::Overrides {
                raw,
                start_blocks: blocks,
                timeout_secs: timeout,
            },
            json: json || settings.output.json,
            settings,
            quiet,
        }),
        Commands::Read {
            profile,
            start,
            count,
            raw,
            output,
            timeout,
        } => {
            let running = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(true));
            let r = running.clone();
            ctrlc::set_handler(move || {
                if !r.load(std::sync::atomic::Ordering::SeqCst) {
                    eprintln!("\n{}", style("Forced exit").red().bold());
                    std::process::exit(130);
                }
                r.store(false, std::sync::atomic::Ordering::SeqCst);
                eprintln!(
                    "\n{}",
                    style("Cancelling... Press Ctrl+C again to force exit").yellow()
                );
            })?;

            commands::read::execute(commands::read::ReadArgs {
                profile,
                start,
                count,
                output,
                overrides: commands::Overrides {
                    raw,
                    start_blocks: None,
                    timeout_secs: timeout,
                },
                settings,
                cancel_flag: running,
                quiet,
            })
        }
        Commands::Config { init, path, json } => {
            commands::config::execute(commands::config::ConfigArgs {
                init,
                path,
                json,
                quiet,
                config_file: cli.config,
            })
        }
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            generate(shell, &mut cmd, name, &mut std::io::stdout());
            Ok(())
        }
    }
}
