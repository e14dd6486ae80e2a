//! Geometry and block size negotiation
//!
//! ATA devices describe themselves through IDENTIFY DEVICE. SCSI devices are
//! asked with READ CAPACITY (10), escalating to READ CAPACITY (16) when the
//! short form saturates or is rejected.

use crate::ata::{Chs, Identify};
use crate::device::Device;
use crate::error::{Error, Result};
use crate::scsi::{Capacity, ScsiCommand, ScsiRequest, ScsiResponse};
use serde::Serialize;
use std::time::Duration;

/// Logical block size assumed for optical media that report no capacity
pub const MMC_BLOCK_SIZE: u32 = 2048;

/// Addressable layout of the medium
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Geometry {
    /// Cylinders, 0 when unknown
    pub cylinders: u16,
    /// Heads, 0 when unknown
    pub heads: u8,
    /// Sectors per track, 0 when unknown
    pub sectors_per_track: u8,
    /// Total addressable blocks
    pub blocks: u64,
    /// Bytes per logical block
    pub logical_block_size: u32,
    /// Bytes per physical block
    pub physical_block_size: u32,
    /// Bytes per raw sector, equal to the logical size unless a raw path is found
    pub long_block_size: u32,
    /// ATA device addressed by LBA rather than CHS
    pub lba_mode: bool,
}

impl Geometry {
    /// Geometry of an ATA device from its IDENTIFY data
    ///
    /// Blocks come from the CHS product, then the 28-bit LBA count when LBA
    /// is supported, then the 48-bit count when that feature set is present.
    pub fn from_identify(identify: &Identify) -> Self {
        let (cylinders, heads, sectors_per_track) = identify.chs().unwrap_or((0, 0, 0));
        let mut blocks =
            u64::from(cylinders) * u64::from(heads) * u64::from(sectors_per_track);
        let mut lba_mode = false;

        if identify.supports_lba() && identify.lba_sectors > 0 {
            blocks = u64::from(identify.lba_sectors);
            lba_mode = true;
        }
        if identify.supports_lba48() && identify.lba48_sectors > 0 {
            blocks = identify.lba48_sectors;
            lba_mode = true;
        }

        let logical = identify.logical_block_size();
        Self {
            cylinders,
            heads,
            sectors_per_track,
            blocks,
            logical_block_size: logical,
            physical_block_size: identify.physical_block_size(),
            long_block_size: logical,
            lba_mode,
        }
    }

    /// Geometry of a SCSI device from READ CAPACITY data
    pub fn from_capacity(capacity: &Capacity) -> Self {
        Self {
            blocks: capacity.blocks(),
            logical_block_size: capacity.block_size,
            physical_block_size: capacity.physical_block_size(),
            long_block_size: capacity.block_size,
            ..Self::default()
        }
    }

    /// Whether a CHS geometry is known
    pub fn has_chs(&self) -> bool {
        self.heads > 0 && self.sectors_per_track > 0
    }

    /// Translate a linear block to CHS
    ///
    /// Block 0 maps to the first sector even when no geometry is known.
    pub fn chs(&self, block: u64) -> Option<Chs> {
        if !self.has_chs() {
            return (block == 0).then_some(Chs::ORIGIN);
        }
        let per_cylinder = u64::from(self.heads) * u64::from(self.sectors_per_track);
        let cylinder = block / per_cylinder;
        if self.cylinders > 0 && cylinder >= u64::from(self.cylinders) {
            return None;
        }
        let rest = block % per_cylinder;
        let spt = u64::from(self.sectors_per_track);
        Some(Chs::new(
            u16::try_from(cylinder).ok()?,
            (rest / spt) as u8,
            (rest % spt) as u8 + 1,
        ))
    }
}

/// Ask a SCSI device for its capacity
///
/// A saturated or failed READ CAPACITY (10) escalates to (16). When both
/// fail, optical drives get an empty geometry (no medium is a normal state
/// for them); anything else is an error.
pub fn read_capacity<D: Device + ?Sized>(device: &mut D, timeout: Duration) -> Result<Geometry> {
    let short = device.send_scsi(
        &ScsiRequest::read_capacity(ScsiCommand::ReadCapacity10),
        timeout,
    );
    let mut capacity = parse(&short, Capacity::parse10);
    let mut last = short;

    if capacity.is_none_or(|c| c.is_saturated()) {
        tracing::debug!("READ CAPACITY (10) insufficient, trying READ CAPACITY (16)");
        let long = device.send_scsi(
            &ScsiRequest::read_capacity(ScsiCommand::ReadCapacity16),
            timeout,
        );
        if let Some(c) = parse(&long, Capacity::parse16) {
            capacity = Some(c);
        }
        last = long;
    }

    if let Some(capacity) = capacity {
        tracing::debug!(
            "Capacity: {} blocks of {} bytes",
            capacity.blocks(),
            capacity.block_size
        );
        return Ok(Geometry::from_capacity(&capacity));
    }

    if device.info().peripheral.is_multimedia() {
        tracing::debug!("No capacity reported by optical drive, assuming no medium");
        return Ok(Geometry {
            logical_block_size: MMC_BLOCK_SIZE,
            physical_block_size: MMC_BLOCK_SIZE,
            long_block_size: MMC_BLOCK_SIZE,
            ..Geometry::default()
        });
    }

    let detail = match last.decoded_sense() {
        Some(sense) => sense.to_string(),
        None => match last.os_error {
            Some(errno) => format!("OS error {}", errno),
            None => "no capacity data returned".to_string(),
        },
    };
    Err(Error::CapacityUnavailable(detail))
}

fn parse(response: &ScsiResponse, parser: fn(&[u8]) -> Option<Capacity>) -> Option<Capacity> {
    if response.is_error() {
        return None;
    }
    parser(&response.data)
}
