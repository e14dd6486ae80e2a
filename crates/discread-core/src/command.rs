//! Read, seek and raw command variants
//!
//! Every way the reader can move data is one variant of a closed enum. Each
//! variant knows how to address a block, what its transfer ceiling is and how
//! to turn itself into a transport request. Probing, selection and the steady
//! state read path all go through [`ReadCommand::execute`] and friends, so the
//! dispatch lives in one place.

use crate::ata::{AtaAddress, AtaCommand, AtaRequest, AtaResponse, Chs};
use crate::block_size::Geometry;
use crate::device::Device;
use crate::error::{Failure, ReadError, ReadResult};
use crate::scsi::{ScsiCommand, ScsiRequest, ScsiResponse, RAW_DVD_SECTOR_SIZE};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Blocks addressable with 28-bit LBA
pub const LBA28_LIMIT: u64 = 1 << 28;

/// Blocks addressable with 48-bit LBA
pub const LBA48_LIMIT: u64 = 1 << 48;

/// Blocks addressable with READ (6)
pub const READ6_LIMIT: u64 = 0x001F_FFFF + 1;

/// Blocks addressable with READ (10) and READ (12)
pub const READ10_LIMIT: u64 = 0xFFFF_FFFF + 1;

/// How a command addresses the medium
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Addressing {
    /// ATA cylinder/head/sector
    Chs,
    /// ATA 28-bit LBA
    Lba28,
    /// ATA 48-bit LBA
    Lba48,
    /// SCSI logical block address
    Scsi,
}

/// Bulk read command variants
///
/// Ordering follows declaration order, which is also the probe order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum ReadCommand {
    /// READ SECTORS (no retry), CHS
    AtaRead,
    /// READ SECTORS with retry, CHS
    AtaReadRetry,
    /// READ DMA (no retry), CHS
    AtaReadDma,
    /// READ DMA with retry, CHS
    AtaReadDmaRetry,
    /// READ SECTORS (no retry), LBA28
    AtaReadLba,
    /// READ SECTORS with retry, LBA28
    AtaReadRetryLba,
    /// READ DMA (no retry), LBA28
    AtaReadDmaLba,
    /// READ DMA with retry, LBA28
    AtaReadDmaRetryLba,
    /// READ SECTORS EXT
    AtaReadLba48,
    /// READ DMA EXT
    AtaReadDmaLba48,
    /// SCSI READ (6)
    Read6,
    /// SCSI READ (10)
    Read10,
    /// SCSI READ (12)
    Read12,
    /// SCSI READ (16)
    Read16,
}

impl ReadCommand {
    /// ATA variants in probe order
    pub const ATA: [ReadCommand; 10] = [
        ReadCommand::AtaRead,
        ReadCommand::AtaReadRetry,
        ReadCommand::AtaReadDma,
        ReadCommand::AtaReadDmaRetry,
        ReadCommand::AtaReadLba,
        ReadCommand::AtaReadRetryLba,
        ReadCommand::AtaReadDmaLba,
        ReadCommand::AtaReadDmaRetryLba,
        ReadCommand::AtaReadLba48,
        ReadCommand::AtaReadDmaLba48,
    ];

    /// SCSI variants in probe order
    pub const SCSI: [ReadCommand; 4] = [
        ReadCommand::Read6,
        ReadCommand::Read10,
        ReadCommand::Read12,
        ReadCommand::Read16,
    ];

    /// How the command addresses blocks
    pub fn addressing(self) -> Addressing {
        match self {
            ReadCommand::AtaRead
            | ReadCommand::AtaReadRetry
            | ReadCommand::AtaReadDma
            | ReadCommand::AtaReadDmaRetry => Addressing::Chs,
            ReadCommand::AtaReadLba
            | ReadCommand::AtaReadRetryLba
            | ReadCommand::AtaReadDmaLba
            | ReadCommand::AtaReadDmaRetryLba => Addressing::Lba28,
            ReadCommand::AtaReadLba48 | ReadCommand::AtaReadDmaLba48 => Addressing::Lba48,
            ReadCommand::Read6 | ReadCommand::Read10 | ReadCommand::Read12 | ReadCommand::Read16 => {
                Addressing::Scsi
            }
        }
    }

    /// Whether this is an ATA command
    pub fn is_ata(self) -> bool {
        self.addressing() != Addressing::Scsi
    }

    /// Whether this reads with 48-bit addresses
    pub fn is_lba48(self) -> bool {
        self.addressing() == Addressing::Lba48
    }

    /// Largest block count a single command can carry
    pub fn max_transfer(self) -> u32 {
        match self {
            ReadCommand::AtaReadLba48 | ReadCommand::AtaReadDmaLba48 => 65536,
            ReadCommand::Read10 => 0xFFFF,
            ReadCommand::Read12 | ReadCommand::Read16 => u32::MAX,
            _ => 256,
        }
    }

    /// Number of blocks the command can address from block 0
    pub fn address_limit(self) -> u64 {
        match self {
            ReadCommand::Read6 => READ6_LIMIT,
            ReadCommand::Read10 | ReadCommand::Read12 => READ10_LIMIT,
            ReadCommand::Read16 => u64::MAX,
            _ => match self.addressing() {
                Addressing::Lba28 => LBA28_LIMIT,
                Addressing::Lba48 => LBA48_LIMIT,
                _ => u64::MAX,
            },
        }
    }

    /// Underlying ATA command, for ATA variants
    pub fn ata_command(self) -> Option<AtaCommand> {
        let command = match self {
            ReadCommand::AtaRead | ReadCommand::AtaReadLba => AtaCommand::Read { retry: false },
            ReadCommand::AtaReadRetry | ReadCommand::AtaReadRetryLba => {
                AtaCommand::Read { retry: true }
            }
            ReadCommand::AtaReadDma | ReadCommand::AtaReadDmaLba => {
                AtaCommand::ReadDma { retry: false }
            }
            ReadCommand::AtaReadDmaRetry | ReadCommand::AtaReadDmaRetryLba => {
                AtaCommand::ReadDma { retry: true }
            }
            ReadCommand::AtaReadLba48 => AtaCommand::ReadExt,
            ReadCommand::AtaReadDmaLba48 => AtaCommand::ReadDmaExt,
            _ => return None,
        };
        Some(command)
    }

    /// Underlying SCSI command, for SCSI variants
    pub fn scsi_command(self) -> Option<ScsiCommand> {
        match self {
            ReadCommand::Read6 => Some(ScsiCommand::Read6),
            ReadCommand::Read10 => Some(ScsiCommand::Read10),
            ReadCommand::Read12 => Some(ScsiCommand::Read12),
            ReadCommand::Read16 => Some(ScsiCommand::Read16),
            _ => None,
        }
    }

    /// Human readable name
    pub fn name(self) -> &'static str {
        match self {
            ReadCommand::AtaRead => "ATA READ",
            ReadCommand::AtaReadRetry => "ATA READ with retries",
            ReadCommand::AtaReadDma => "ATA READ DMA",
            ReadCommand::AtaReadDmaRetry => "ATA READ DMA with retries",
            ReadCommand::AtaReadLba => "ATA READ in LBA mode",
            ReadCommand::AtaReadRetryLba => "ATA READ with retries in LBA mode",
            ReadCommand::AtaReadDmaLba => "ATA READ DMA in LBA mode",
            ReadCommand::AtaReadDmaRetryLba => "ATA READ DMA with retries in LBA mode",
            ReadCommand::AtaReadLba48 => "ATA READ EXT",
            ReadCommand::AtaReadDmaLba48 => "ATA READ DMA EXT",
            ReadCommand::Read6 => "SCSI READ (6)",
            ReadCommand::Read10 => "SCSI READ (10)",
            ReadCommand::Read12 => "SCSI READ (12)",
            ReadCommand::Read16 => "SCSI READ (16)",
        }
    }

    /// Build the ATA request for an explicit address
    pub(crate) fn ata_request(self, address: AtaAddress, count: u32) -> Option<AtaRequest> {
        self.ata_command()
            .map(|command| AtaRequest::new(command, address, count))
    }

    /// Issue the command for `count` blocks starting at `block`
    ///
    /// CHS variants translate `block` through the geometry. A block the
    /// variant cannot address never reaches the device.
    pub fn execute<D: Device + ?Sized>(
        self,
        device: &mut D,
        block: u64,
        geometry: &Geometry,
        count: u32,
        timeout: Duration,
    ) -> Reply {
        if let Some(command) = self.scsi_command() {
            let end = block.saturating_add(u64::from(count));
            if end > self.address_limit() {
                return Reply::Unaddressable(self.name());
            }
            let request = ScsiRequest::read(command, block, geometry.logical_block_size, count);
            return Reply::Scsi(device.send_scsi(&request, timeout));
        }

        let address = match self.addressing() {
            Addressing::Chs => match geometry.chs(block) {
                Some(chs) => AtaAddress::Chs(chs),
                None => return Reply::Unaddressable(self.name()),
            },
            Addressing::Lba28 => match u32::try_from(block) {
                Ok(lba) if block.saturating_add(u64::from(count)) <= LBA28_LIMIT => {
                    AtaAddress::Lba28(lba)
                }
                _ => return Reply::Unaddressable(self.name()),
            },
            _ => {
                if block.saturating_add(u64::from(count)) > LBA48_LIMIT {
                    return Reply::Unaddressable(self.name());
                }
                AtaAddress::Lba48(block)
            }
        };

        match self.ata_request(address, count) {
            Some(request) => Reply::Ata(device.send_ata(&request, timeout)),
            None => Reply::Unaddressable(self.name()),
        }
    }

    /// Issue a single-sector CHS read at an explicit address
    pub fn execute_chs<D: Device + ?Sized>(
        self,
        device: &mut D,
        chs: Chs,
        timeout: Duration,
    ) -> Reply {
        if self.addressing() != Addressing::Chs {
            return Reply::Unaddressable(self.name());
        }
        match self.ata_request(AtaAddress::Chs(chs), 1) {
            Some(request) => Reply::Ata(device.send_ata(&request, timeout)),
            None => Reply::Unaddressable(self.name()),
        }
    }
}

impl fmt::Display for ReadCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Seek command variants
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum SeekCommand {
    /// ATA SEEK, CHS
    AtaChs,
    /// ATA SEEK, LBA28
    AtaLba,
    /// SCSI SEEK (6)
    Seek6,
    /// SCSI SEEK (10)
    Seek10,
}

impl SeekCommand {
    /// ATA variants in probe order
    pub const ATA: [SeekCommand; 2] = [SeekCommand::AtaChs, SeekCommand::AtaLba];

    /// SCSI variants in probe order
    pub const SCSI: [SeekCommand; 2] = [SeekCommand::Seek6, SeekCommand::Seek10];

    /// Human readable name
    pub fn name(self) -> &'static str {
        match self {
            SeekCommand::AtaChs => "ATA SEEK",
            SeekCommand::AtaLba => "ATA SEEK in LBA mode",
            SeekCommand::Seek6 => "SCSI SEEK (6)",
            SeekCommand::Seek10 => "SCSI SEEK (10)",
        }
    }

    /// Seek to `block`
    pub fn execute<D: Device + ?Sized>(
        self,
        device: &mut D,
        block: u64,
        geometry: &Geometry,
        timeout: Duration,
    ) -> Reply {
        match self {
            SeekCommand::AtaChs => match geometry.chs(block) {
                Some(chs) => self.execute_chs(device, chs, timeout),
                None => Reply::Unaddressable(self.name()),
            },
            SeekCommand::AtaLba => match u32::try_from(block) {
                Ok(lba) if block < LBA28_LIMIT => Reply::Ata(
                    device.send_ata(&AtaRequest::seek(AtaAddress::Lba28(lba)), timeout),
                ),
                _ => Reply::Unaddressable(self.name()),
            },
            SeekCommand::Seek6 if block >= READ6_LIMIT => Reply::Unaddressable(self.name()),
            SeekCommand::Seek10 if block >= READ10_LIMIT => Reply::Unaddressable(self.name()),
            SeekCommand::Seek6 => Reply::Scsi(
                device.send_scsi(&ScsiRequest::seek(ScsiCommand::Seek6, block), timeout),
            ),
            SeekCommand::Seek10 => Reply::Scsi(
                device.send_scsi(&ScsiRequest::seek(ScsiCommand::Seek10, block), timeout),
            ),
        }
    }

    /// CHS seek at an explicit address
    pub fn execute_chs<D: Device + ?Sized>(
        self,
        device: &mut D,
        chs: Chs,
        timeout: Duration,
    ) -> Reply {
        if self != SeekCommand::AtaChs {
            return Reply::Unaddressable(self.name());
        }
        Reply::Ata(device.send_ata(&AtaRequest::seek(AtaAddress::Chs(chs)), timeout))
    }
}

impl fmt::Display for SeekCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Raw (long) sector read variants, SCSI only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RawCommand {
    /// READ LONG (10)
    ReadLong10,
    /// READ LONG (16)
    ReadLong16,
    /// SyQuest READ LONG (6)
    #[serde(rename = "syquest-read-long6")]
    SyQuestReadLong6,
    /// SyQuest READ LONG (10)
    #[serde(rename = "syquest-read-long10")]
    SyQuestReadLong10,
    /// HL-DT-ST raw DVD read
    #[serde(rename = "hldtst-read-raw-dvd")]
    HlDtStReadRawDvd,
    /// Plextor raw DVD read
    PlextorReadRawDvd,
}

impl RawCommand {
    /// Every raw variant
    pub const ALL: [RawCommand; 6] = [
        RawCommand::ReadLong10,
        RawCommand::ReadLong16,
        RawCommand::SyQuestReadLong6,
        RawCommand::SyQuestReadLong10,
        RawCommand::HlDtStReadRawDvd,
        RawCommand::PlextorReadRawDvd,
    ];

    /// Underlying SCSI command
    pub fn scsi_command(self) -> ScsiCommand {
        match self {
            RawCommand::ReadLong10 => ScsiCommand::ReadLong10,
            RawCommand::ReadLong16 => ScsiCommand::ReadLong16,
            RawCommand::SyQuestReadLong6 => ScsiCommand::SyQuestReadLong6,
            RawCommand::SyQuestReadLong10 => ScsiCommand::SyQuestReadLong10,
            RawCommand::HlDtStReadRawDvd => ScsiCommand::HlDtStReadRawDvd,
            RawCommand::PlextorReadRawDvd => ScsiCommand::PlextorReadRawDvd,
        }
    }

    /// Human readable name
    pub fn name(self) -> &'static str {
        self.scsi_command().name()
    }

    /// READ LONG variants move one sector per command
    pub fn is_single_sector(self) -> bool {
        self.scsi_command().is_long()
    }

    /// Largest block count a single command can carry
    pub fn max_transfer(self) -> u32 {
        match self {
            RawCommand::HlDtStReadRawDvd => 0xFFFF,
            RawCommand::PlextorReadRawDvd => 0x00FF_FFFF / RAW_DVD_SECTOR_SIZE,
            _ => 1,
        }
    }

    /// Largest address the command can carry
    fn address_limit(self) -> u64 {
        match self {
            RawCommand::SyQuestReadLong6 => READ6_LIMIT,
            RawCommand::PlextorReadRawDvd => 0x0100_0000,
            RawCommand::ReadLong16 => u64::MAX,
            _ => READ10_LIMIT,
        }
    }

    /// Read `count` raw sectors of `sector_size` bytes starting at `block`
    pub fn execute<D: Device + ?Sized>(
        self,
        device: &mut D,
        block: u64,
        sector_size: u32,
        count: u32,
        timeout: Duration,
    ) -> Reply {
        if block.saturating_add(u64::from(count)) > self.address_limit() {
            return Reply::Unaddressable(self.name());
        }
        let command = self.scsi_command();
        let request = if self.is_single_sector() {
            ScsiRequest::read_long(command, block, sector_size)
        } else {
            ScsiRequest::read(command, block, sector_size, count)
        };
        Reply::Scsi(device.send_scsi(&request, timeout))
    }
}

impl fmt::Display for RawCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Data returned by a successful read
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SectorData {
    /// Raw bytes, `count` sectors back to back
    pub data: Vec<u8>,
    /// Wall time spent in the transport
    pub duration: Duration,
    /// The device had to recover the data
    pub recovered: bool,
}

impl SectorData {
    /// Append another chunk
    pub(crate) fn append(&mut self, other: SectorData) {
        self.data.extend_from_slice(&other.data);
        self.duration += other.duration;
        self.recovered |= other.recovered;
    }
}

/// Raw transport answer to one issued command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// ATA completion
    Ata(AtaResponse),
    /// SCSI completion
    Scsi(ScsiResponse),
    /// The block could not be encoded for the named command; nothing was sent
    Unaddressable(&'static str),
}

impl Reply {
    /// Time the transport spent on the command
    pub fn duration(&self) -> Duration {
        match self {
            Reply::Ata(r) => r.duration,
            Reply::Scsi(r) => r.duration,
            Reply::Unaddressable(_) => Duration::ZERO,
        }
    }

    /// Strict trial check: clean completion, and data when the command moves any
    pub fn probe_passed(&self, expect_data: bool) -> bool {
        match self {
            Reply::Ata(r) => r.passed_probe() && (!expect_data || !r.data.is_empty()),
            Reply::Scsi(r) => !r.is_error() && (!expect_data || !r.data.is_empty()),
            Reply::Unaddressable(_) => false,
        }
    }

    /// Convert a read reply into data or a described failure
    pub fn into_result(self, block: u64) -> ReadResult<SectorData> {
        let duration = self.duration();
        let failure = match self {
            Reply::Ata(r) => {
                if let Some(errno) = r.os_error {
                    Failure::Os(errno)
                } else if r.is_error() {
                    Failure::Ata {
                        status: r.status,
                        error: r.error,
                    }
                } else if r.data.is_empty() {
                    Failure::NoData
                } else {
                    let recovered = r.is_recovered();
                    return Ok(SectorData {
                        data: r.data,
                        duration,
                        recovered,
                    });
                }
            }
            Reply::Scsi(r) => {
                let recovered = r.decoded_sense().is_some_and(|s| s.is_recovered());
                if let Some(errno) = r.os_error {
                    Failure::Os(errno)
                } else if r.check_condition && !(recovered && !r.data.is_empty()) {
                    Failure::Scsi { sense: r.sense }
                } else if r.data.is_empty() {
                    Failure::NoData
                } else {
                    return Ok(SectorData {
                        data: r.data,
                        duration,
                        recovered,
                    });
                }
            }
            Reply::Unaddressable(name) => Failure::OutOfRange(name),
        };
        Err(ReadError::new(block, duration, failure))
    }

    /// Convert a seek reply into its duration or a described failure
    pub fn into_seek_result(self, block: u64) -> ReadResult<Duration> {
        let duration = self.duration();
        let failure = match self {
            Reply::Ata(r) => match r.os_error {
                Some(errno) => Failure::Os(errno),
                None if r.is_error() => Failure::Ata {
                    status: r.status,
                    error: r.error,
                },
                None => return Ok(duration),
            },
            Reply::Scsi(r) => match r.os_error {
                Some(errno) => Failure::Os(errno),
                None if r.check_condition => Failure::Scsi { sense: r.sense },
                None => return Ok(duration),
            },
            Reply::Unaddressable(name) => Failure::OutOfRange(name),
        };
        Err(ReadError::new(block, duration, failure))
    }
}
