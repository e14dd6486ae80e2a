//! Configuration file management command

use anyhow::{Context, Result};
use console::style;
use discread_core::Settings;
use std::path::PathBuf;

/// Arguments for the config command
pub struct ConfigArgs {
    /// Initialize a new configuration file with defaults
    pub init: bool,
    /// Show the path to the configuration file
    pub path: bool,
    /// Show configuration in JSON format
    pub json: bool,
    /// Suppress output
    pub quiet: bool,
    /// Custom configuration file path (overrides default)
    pub config_file: Option<PathBuf>,
}

/// Execute the config command
pub fn execute(args: ConfigArgs) -> Result<()> {
    let config_path = args.config_file.clone().or_else(Settings::config_path);

    if args.path {
        if let Some(path) = &config_path {
            if !args.quiet {
                println!("{}", path.display());
            }
        } else if !args.quiet {
            eprintln!("{}", style("Could not determine config path").yellow());
        }
        return Ok(());
    }

    if args.init {
        return init_config(config_path, args.quiet);
    }

    show_config(config_path, args.json, args.quiet)
}

/// Write a configuration file with default values
fn init_config(config_path: Option<PathBuf>, quiet: bool) -> Result<()> {
    let path = config_path.context("Could not determine configuration directory")?;

    if path.exists() {
        if !quiet {
            eprintln!(
                "{} Configuration file already exists at: {}",
                style("Warning:").yellow(),
                path.display()
            );
            eprintln!("Use a text editor to modify it, or delete it to re-initialize.");
        }
        return Ok(());
    }

    let saved_path = Settings::default()
        .save_to_path(Some(path))
        .context("Failed to save configuration file")?;

    if !quiet {
        println!(
            "{} Created configuration file at: {}",
            style("Success:").green(),
            saved_path.display()
        );
        println!();
        println!("Example settings:");
        println!();
        println!("  [reader]");
        println!("  timeout_secs = 30    # Per-command timeout");
        println!("  start_blocks = 32    # First transfer length to try");
        println!("  raw = true           # Look for raw sector reads");
        println!();
        println!("  [output]");
        println!("  hex_width = 32       # Bytes per hex dump line");
    }

    Ok(())
}

/// Show the effective configuration
fn show_config(config_path: Option<PathBuf>, json: bool, quiet: bool) -> Result<()> {
    if quiet {
        return Ok(());
    }

    let config_exists = config_path.as_ref().is_some_and(|p| p.exists());
    let settings = Settings::load_from_path(config_path.clone());

    if json {
        let json_output = serde_json::to_string_pretty(&settings)
            .context("Failed to serialize settings to JSON")?;
        println!("{}", json_output);
        return Ok(());
    }

    println!("{}", style("Discread Configuration").bold());
    println!();

    if let Some(path) = &config_path {
        if config_exists {
            println!("  {} {}", style("Config file:").dim(), path.display());
        } else {
            println!(
                "  {} {} {}",
                style("Config file:").dim(),
                path.display(),
                style("(not found, using defaults)").yellow()
            );
        }
    }
    println!();

    println!("{}", style("[reader]").cyan());
    println!("  timeout_secs = {}", settings.reader.timeout_secs);
    println!("  start_blocks = {}", settings.reader.start_blocks);
    println!("  raw = {}", settings.reader.raw);
    println!();

    println!("{}", style("[output]").cyan());
    println!("  json = {}", settings.output.json);
    println!("  hex_width = {}", settings.output.hex_width);

    if !config_exists {
        println!();
        println!(
            "{}",
            style("Run 'discread config --init' to create a configuration file.").dim()
        );
    }

    Ok(())
}
