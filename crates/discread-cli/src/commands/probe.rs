//! Probe command - negotiates with a device and shows what works

use anyhow::{Context, Result};
use console::style;
use discread_core::{Reader, ReaderSummary, Settings};
use std::path::PathBuf;

use super::{format_size, open_device, Overrides};

/// Arguments for the probe command
pub struct ProbeArgs {
    /// Device profile to simulate
    pub profile: PathBuf,
    /// Command line reader options
    pub overrides: Overrides,
    /// Print JSON
    pub json: bool,
    /// Loaded settings
    pub settings: Settings,
    /// Suppress human-readable output
    pub quiet: bool,
}

/// Execute the probe command
pub fn execute(args: ProbeArgs) -> Result<()> {
    let mut device = open_device(&args.profile)?;
    let identify = device.identify();
    let config = args.overrides.apply(&args.settings);

    let reader = Reader::open(&mut device, config, identify.as_deref())
        .with_context(|| format!("Negotiation failed for {}", args.profile.display()))?;
    let summary = reader.summary();

    // JSON is machine-readable, so it is printed even when quiet
    if args.json {
        let output =
            serde_json::to_string_pretty(&summary).context("Failed to serialize summary")?;
        println!("{}", output);
        return Ok(());
    }

    if !args.quiet {
        print_summary(&summary);
    }
    Ok(())
}

/// Print a negotiated session in human-readable form
fn print_summary(summary: &ReaderSummary) {
    let geometry = &summary.geometry;
    let name = format!("{} {}", summary.manufacturer.trim(), summary.model.trim());

    println!(
        "{} {} ({})",
        style("Device:").bold(),
        style(name.trim()).white().bold(),
        summary.transport
    );

    let bytes = geometry
        .blocks
        .saturating_mul(u64::from(geometry.logical_block_size));
    println!(
        "  {} {} blocks of {} bytes ({})",
        style("Capacity:").dim(),
        geometry.blocks,
        geometry.logical_block_size,
        format_size(bytes)
    );
    if geometry.physical_block_size != geometry.logical_block_size {
        println!(
            "  {} {} bytes",
            style("Physical block:").dim(),
            geometry.physical_block_size
        );
    }
    if geometry.has_chs() {
        println!(
            "  {} {}/{}/{}{}",
            style("CHS:").dim(),
            geometry.cylinders,
            geometry.heads,
            geometry.sectors_per_track,
            if geometry.lba_mode { "" } else { " (CHS mode)" }
        );
    }
    println!();

    println!("{}", style("Working commands:").bold());
    for command in summary.capabilities.reads() {
        let marker = if Some(command) == summary.read_command {
            style("→").green().bold()
        } else {
            style("✓").green()
        };
        println!("  {} {}", marker, command);
    }
    for command in summary.capabilities.seeks() {
        println!("  {} {}", style("✓").green(), command);
    }
    println!();

    if let Some(command) = summary.read_command {
        println!("{} {}", style("Read command:").bold(), style(command).cyan());
    }
    match summary.raw {
        Some(raw) => println!(
            "{} {} ({} bytes per sector)",
            style("Raw reads:").bold(),
            style(raw.command).cyan(),
            raw.long_block_size
        ),
        None => println!("{} {}", style("Raw reads:").bold(), style("none").dim()),
    }
    println!(
        "{} {} blocks per command",
        style("Transfer:").bold(),
        summary.blocks_to_read
    );
    println!(
        "{} {}",
        style("Seeking:").bold(),
        match (summary.can_seek, summary.can_seek_lba) {
            (true, true) => style("LBA").green(),
            (true, false) => style("CHS only").yellow(),
            _ => style("unavailable").dim(),
        }
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn args(profile: PathBuf) -> ProbeArgs {
        ProbeArgs {
            profile,
            overrides: Overrides::default(),
            json: false,
            settings: Settings::default(),
            quiet: true,
        }
    }

    #[test]
    fn test_probe_quiet() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("disk.toml");
        std::fs::write(&path, "blocks = 128\n").unwrap();
        assert!(execute(args(path)).is_ok());
    }

    #[test]
    fn test_probe_negotiation_failure() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("broken.toml");
        std::fs::write(&path, "blocks = 128\nreads = []\n").unwrap();

        let err = execute(args(path)).unwrap_err();
        assert!(err.to_string().contains("Negotiation failed"));
        assert!(format!("{:#}", err).contains("Cannot read medium"));
    }
}
