//! Read command - reads a block range through the negotiated command

use anyhow::{bail, Context, Result};
use console::style;
use discread_core::{Reader, Settings};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::{format_size, open_device, Overrides};

/// Arguments for the read command
pub struct ReadArgs {
    /// Device profile to simulate
    pub profile: PathBuf,
    /// First block
    pub start: u64,
    /// Blocks to read, rest of the medium when unset
    pub count: Option<u64>,
    /// Destination file, hex dump to stdout when unset
    pub output: Option<PathBuf>,
    /// Command line reader options
    pub overrides: Overrides,
    /// Loaded settings
    pub settings: Settings,
    /// Cleared on Ctrl+C
    pub cancel_flag: Arc<AtomicBool>,
    /// Suppress progress and summary output
    pub quiet: bool,
}

/// Execute the read command
pub fn execute(args: ReadArgs) -> Result<()> {
    let mut device = open_device(&args.profile)?;
    let identify = device.identify();
    let config = args.overrides.apply(&args.settings);
    let raw_requested = config.raw;

    let mut reader = Reader::open(&mut device, config, identify.as_deref())
        .with_context(|| format!("Negotiation failed for {}", args.profile.display()))?;
    if raw_requested && !reader.can_read_raw() {
        bail!("Device has no raw sector read path");
    }

    let (start, count) = resolve_range(args.start, args.count, reader.blocks())?;
    let block_size = u64::from(reader.effective_block_size());
    let total_bytes = count.saturating_mul(block_size);

    let (mut out, to_file): (Box<dyn Write>, bool) = match &args.output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create output file: {}", path.display()))?;
            (Box::new(BufWriter::new(file)), true)
        }
        None => (Box::new(std::io::stdout().lock()), false),
    };
    let hex_width = args.settings.output.hex_width.max(1);

    let pb = if args.quiet || !to_file {
        ProgressBar::hidden()
    } else {
        ProgressBar::new(total_bytes)
    };
    if !pb.is_hidden() {
        pb.set_style(
            ProgressStyle::default_bar()
                .template(
                    "  {spinner:.green} Reading [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})",
                )
                .context("Invalid progress template")?
                .progress_chars("█▓░"),
        );
    }

    let end = start + count;
    let mut block = start;
    let mut device_time = Duration::ZERO;
    let mut recovered = 0u64;

    while block < end {
        if !args.cancel_flag.load(Ordering::SeqCst) {
            pb.abandon();
            bail!("Read cancelled at block {}", block);
        }

        let chunk = u32::try_from(end - block)
            .unwrap_or(u32::MAX)
            .min(reader.blocks_to_read().max(1));
        let sectors = match reader.read_blocks(block, chunk) {
            Ok(sectors) => sectors,
            Err(e) => {
                pb.abandon();
                return Err(e).context(format!("Failed reading {} blocks at {}", chunk, block));
            }
        };

        if to_file {
            out.write_all(&sectors.data)
                .context("Failed to write output file")?;
        } else {
            let offset = (block - start) * block_size;
            hex_dump(&mut out, offset, &sectors.data, hex_width)
                .context("Failed to write hex dump")?;
        }

        device_time += sectors.duration;
        if sectors.recovered {
            recovered += 1;
        }
        block += u64::from(chunk);
        pb.set_position((block - start) * block_size);
    }
    out.flush().context("Failed to flush output")?;
    pb.finish_and_clear();

    if to_file && !args.quiet {
        eprintln!(
            "{} Read {} blocks ({}) in {:.2?} of device time",
            style("✓").green().bold(),
            count,
            format_size(total_bytes),
            device_time
        );
    }
    if recovered > 0 && !args.quiet {
        eprintln!(
            "{} {} command(s) returned recovered data",
            style("Warning:").yellow(),
            recovered
        );
    }
    Ok(())
}

/// Clamp the requested range to the medium
fn resolve_range(start: u64, count: Option<u64>, blocks: u64) -> Result<(u64, u64)> {
    if start >= blocks {
        bail!(
            "Start block {} is past the end of the medium ({} blocks)",
            start,
            blocks
        );
    }
    let available = blocks - start;
    let count = count.unwrap_or(available);
    if count == 0 {
        bail!("Nothing to read, count is 0");
    }
    if count > available {
        bail!(
            "Range {}+{} runs past the end of the medium ({} blocks)",
            start,
            count,
            blocks
        );
    }
    Ok((start, count))
}

/// Write `data` as a hex dump, `width` bytes per line
fn hex_dump(out: &mut impl Write, offset: u64, data: &[u8], width: usize) -> std::io::Result<()> {
    for (i, line) in data.chunks(width).enumerate() {
        write!(out, "{:08x} ", offset + (i * width) as u64)?;
        for byte in line {
            write!(out, " {:02x}", byte)?;
        }
        for _ in line.len()..width {
            write!(out, "   ")?;
        }
        let text: String = line
            .iter()
            .map(|&b| if b.is_ascii_graphic() || b == b' ' { b as char } else { '.' })
            .collect();
        writeln!(out, "  |{}|", text)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    // ========================================================================
    // resolve_range tests
    // ========================================================================

    #[test]
    fn test_resolve_range_defaults_to_rest() {
        assert_eq!(resolve_range(10, None, 100).unwrap(), (10, 90));
        assert_eq!(resolve_range(0, Some(5), 100).unwrap(), (0, 5));
        assert_eq!(resolve_range(99, Some(1), 100).unwrap(), (99, 1));
    }

    #[test]
    fn test_resolve_range_rejects_bad_ranges() {
        assert!(resolve_range(100, None, 100).is_err());
        assert!(resolve_range(0, Some(0), 100).is_err());
        let err = resolve_range(90, Some(20), 100).unwrap_err();
        assert!(err.to_string().contains("past the end"));
    }

    // ========================================================================
    // hex_dump tests
    // ========================================================================

    #[test]
    fn test_hex_dump_full_line() {
        let mut out = Vec::new();
        hex_dump(&mut out, 0x200, b"ABCD", 4).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "00000200  41 42 43 44  |ABCD|\n"
        );
    }

    #[test]
    fn test_hex_dump_short_line_and_unprintable() {
        let mut out = Vec::new();
        hex_dump(&mut out, 0, &[0x00, 0x41, 0xFF, 0x42, 0x0A], 4).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "00000000  00 41 ff 42  |.A.B|");
        assert_eq!(lines[1], "00000004  0a           |.|");
    }

    #[test]
    fn test_hex_dump_empty() {
        let mut out = Vec::new();
        hex_dump(&mut out, 0, &[], 16).unwrap();
        assert!(out.is_empty());
    }
}
