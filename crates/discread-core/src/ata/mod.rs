//! ATA command vocabulary
//!
//! Requests and responses exchanged with [`Device::send_ata`](crate::Device::send_ata),
//! plus the register bit definitions the reader inspects.

pub mod identify;

pub use identify::{Identify, IDENTIFY_LEN};

use std::time::Duration;

/// Status register bits
pub mod status {
    /// An error occurred, see the error register
    pub const ERR: u8 = 0x01;
    /// Index mark (obsolete)
    pub const IDX: u8 = 0x02;
    /// Data was corrected (obsolete, still set by some drives)
    pub const CORR: u8 = 0x04;
    /// Data request
    pub const DRQ: u8 = 0x08;
    /// Seek complete
    pub const DSC: u8 = 0x10;
    /// Device fault
    pub const DF: u8 = 0x20;
    /// Device ready
    pub const DRDY: u8 = 0x40;
    /// Busy
    pub const BSY: u8 = 0x80;

    /// Bits that make a trial command count as failed
    pub const PROBE_MASK: u8 = ERR | IDX | CORR | DF;
}

/// Error register bits
pub mod error {
    /// Command aborted (unsupported or bad parameter)
    pub const ABRT: u8 = 0x04;
    /// ID not found (address out of range)
    pub const IDNF: u8 = 0x10;
    /// Uncorrectable data error
    pub const UNC: u8 = 0x40;
    /// Interface CRC error
    pub const ICRC: u8 = 0x80;
}

/// ATA commands the reader knows how to issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AtaCommand {
    /// READ SECTORS, PIO
    Read {
        /// Let the drive retry internally
        retry: bool,
    },
    /// READ DMA
    ReadDma {
        /// Let the drive retry internally
        retry: bool,
    },
    /// READ SECTORS EXT (48-bit)
    ReadExt,
    /// READ DMA EXT (48-bit)
    ReadDmaExt,
    /// SEEK
    Seek,
}

impl AtaCommand {
    /// Command register value
    pub fn opcode(self) -> u8 {
        match self {
            AtaCommand::Read { retry: true } => 0x20,
            AtaCommand::Read { retry: false } => 0x21,
            AtaCommand::ReadExt => 0x24,
            AtaCommand::ReadDmaExt => 0x25,
            AtaCommand::Seek => 0x70,
            AtaCommand::ReadDma { retry: true } => 0xC8,
            AtaCommand::ReadDma { retry: false } => 0xC9,
        }
    }

    /// Whether the command moves data into the host
    pub fn transfers_data(self) -> bool {
        self != AtaCommand::Seek
    }

    /// Whether the command uses DMA rather than PIO
    pub fn is_dma(self) -> bool {
        matches!(self, AtaCommand::ReadDma { .. } | AtaCommand::ReadDmaExt)
    }
}

/// Cylinder/head/sector triple; sectors count from 1
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Chs {
    /// Cylinder
    pub cylinder: u16,
    /// Head
    pub head: u8,
    /// Sector, 1-based
    pub sector: u8,
}

impl Chs {
    /// First sector of the disk
    pub const ORIGIN: Chs = Chs {
        cylinder: 0,
        head: 0,
        sector: 1,
    };

    /// Create a new address
    pub fn new(cylinder: u16, head: u8, sector: u8) -> Self {
        Self {
            cylinder,
            head,
            sector,
        }
    }

    /// Linear block number under the given geometry
    pub fn to_lba(self, heads: u8, sectors_per_track: u8) -> u64 {
        (u64::from(self.cylinder) * u64::from(heads) + u64::from(self.head))
            * u64::from(sectors_per_track)
            + u64::from(self.sector.saturating_sub(1))
    }
}

/// How the request addresses the medium
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AtaAddress {
    /// Geometry based address
    Chs(Chs),
    /// 28-bit logical block address
    Lba28(u32),
    /// 48-bit logical block address
    Lba48(u64),
}

/// A single ATA command to send
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AtaRequest {
    /// Command to issue
    pub command: AtaCommand,
    /// Where on the medium
    pub address: AtaAddress,
    /// Sectors to transfer (ignored for SEEK)
    pub count: u32,
}

impl AtaRequest {
    /// Create a new request
    pub fn new(command: AtaCommand, address: AtaAddress, count: u32) -> Self {
        Self {
            command,
            address,
            count,
        }
    }

    /// Create a SEEK request
    pub fn seek(address: AtaAddress) -> Self {
        Self::new(AtaCommand::Seek, address, 0)
    }
}

/// What came back from an ATA command
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AtaResponse {
    /// Data read from the device
    pub data: Vec<u8>,
    /// Status register after completion
    pub status: u8,
    /// Error register after completion
    pub error: u8,
    /// Time the command took
    pub duration: Duration,
    /// Set when the OS failed to deliver the command at all
    pub os_error: Option<i32>,
}

impl AtaResponse {
    /// Clean completion with data
    pub fn ok(data: Vec<u8>, duration: Duration) -> Self {
        Self {
            data,
            status: status::DRDY | status::DSC,
            error: 0,
            duration,
            os_error: None,
        }
    }

    /// Completion with error bits set
    pub fn failed(error: u8, duration: Duration) -> Self {
        Self {
            data: Vec::new(),
            status: status::DRDY | status::ERR,
            error,
            duration,
            os_error: None,
        }
    }

    /// Command never reached the device
    pub fn os_failure(errno: i32) -> Self {
        Self {
            os_error: Some(errno),
            ..Self::default()
        }
    }

    /// Strict check used while probing: no error, fault, index or correction bits
    pub fn passed_probe(&self) -> bool {
        self.os_error.is_none() && self.status & status::PROBE_MASK == 0 && self.error == 0
    }

    /// Whether the command failed in steady state
    pub fn is_error(&self) -> bool {
        self.os_error.is_some()
            || self.status & (status::ERR | status::DF) != 0
            || self.error != 0
    }

    /// Drive reported that it corrected the data
    pub fn is_recovered(&self) -> bool {
        self.status & status::CORR != 0
    }
}
