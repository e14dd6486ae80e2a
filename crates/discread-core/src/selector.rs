//! Bulk read command selection
//!
//! Picks the single command used for every steady-state read from the probe
//! results, fastest and most capable first, and refuses media the working
//! commands cannot fully address.

use crate::block_size::Geometry;
use crate::capabilities::DeviceCapabilities;
use crate::command::{ReadCommand, LBA28_LIMIT, READ10_LIMIT, READ6_LIMIT};
use crate::diagnostics::{Diagnostic, DiagnosticSink};
use crate::error::{Error, Result};

/// Preference order for ATA devices in LBA mode
pub const LBA_PRIORITY: [ReadCommand; 6] = [
    ReadCommand::AtaReadDmaLba48,
    ReadCommand::AtaReadLba48,
    ReadCommand::AtaReadDmaRetryLba,
    ReadCommand::AtaReadDmaLba,
    ReadCommand::AtaReadRetryLba,
    ReadCommand::AtaReadLba,
];

/// Preference order for CHS-only ATA devices
pub const CHS_PRIORITY: [ReadCommand; 4] = [
    ReadCommand::AtaReadDmaRetry,
    ReadCommand::AtaReadDma,
    ReadCommand::AtaReadRetry,
    ReadCommand::AtaRead,
];

/// Preference order for SCSI and ATAPI devices
pub const SCSI_PRIORITY: [ReadCommand; 4] = [
    ReadCommand::Read16,
    ReadCommand::Read12,
    ReadCommand::Read10,
    ReadCommand::Read6,
];

/// Choose the bulk read command
///
/// # Errors
///
/// - [`Error::CannotReadMedium`] when no read variant passed probing
/// - [`Error::Needs48BitLba`] for LBA devices beyond 28 bits without a 48-bit read
/// - [`Error::Read6RangeExceeded`] when only READ (6) works on a large medium
/// - [`Error::Read16Required`] beyond 32 bits without READ (16)
pub fn select(
    capabilities: &DeviceCapabilities,
    geometry: &Geometry,
    sink: &mut dyn DiagnosticSink,
) -> Result<ReadCommand> {
    if capabilities.is_empty() {
        return Err(Error::CannotReadMedium);
    }

    let scsi = capabilities.reads().any(|c| !c.is_ata());
    let command = if scsi {
        select_scsi(capabilities, geometry.blocks)?
    } else {
        select_ata(capabilities, geometry)?
    };

    sink.record(Diagnostic::CommandSelected(command));
    Ok(command)
}

fn select_ata(capabilities: &DeviceCapabilities, geometry: &Geometry) -> Result<ReadCommand> {
    let blocks = geometry.blocks;
    if geometry.lba_mode
        && blocks > LBA28_LIMIT
        && !capabilities.reads().any(ReadCommand::is_lba48)
    {
        return Err(Error::Needs48BitLba { blocks });
    }

    let (primary, fallback): (&[ReadCommand], &[ReadCommand]) = if geometry.lba_mode {
        (&LBA_PRIORITY[..], &CHS_PRIORITY[..])
    } else {
        (&CHS_PRIORITY[..], &LBA_PRIORITY[..])
    };

    capabilities
        .first_of(primary)
        .or_else(|| {
            tracing::debug!("No preferred addressing mode works, trying the other one");
            capabilities.first_of(fallback)
        })
        .ok_or(Error::CannotReadMedium)
}

fn select_scsi(capabilities: &DeviceCapabilities, blocks: u64) -> Result<ReadCommand> {
    let only_read6 = capabilities.reads().all(|c| c == ReadCommand::Read6);
    if blocks > READ6_LIMIT && only_read6 {
        return Err(Error::Read6RangeExceeded {
            blocks,
            limit: READ6_LIMIT,
        });
    }
    if blocks > READ10_LIMIT && !capabilities.supports(ReadCommand::Read16) {
        return Err(Error::Read16Required {
            blocks,
            limit: READ10_LIMIT,
        });
    }

    capabilities
        .first_of(&SCSI_PRIORITY)
        .ok_or(Error::CannotReadMedium)
}
