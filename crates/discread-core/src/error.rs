//! Error types for the discread core library
//!
//! Two families live here. [`Error`] covers construction and negotiation
//! failures: once one of these is returned the reader cannot be used for bulk
//! reads. [`ReadError`] covers a single steady-state read or seek and carries
//! the transport detail the caller needs to decide on its own retry policy.

use crate::device::TransportKind;
use crate::scsi::sense::Sense;
use std::time::Duration;
use thiserror::Error;

/// Fatal errors raised while constructing a reader or negotiating its parameters
#[derive(Error, Debug)]
pub enum Error {
    /// The device speaks a transport the reader has no command set for
    #[error("Unsupported transport: {0}")]
    UnsupportedTransport(TransportKind),

    /// ATA device without usable IDENTIFY DEVICE data
    #[error("Invalid IDENTIFY data: {0}")]
    InvalidIdentify(String),

    /// No read command variant succeeded during probing
    #[error("Cannot read medium, no read command succeeded")]
    CannotReadMedium,

    /// Device is larger than 28-bit LBA can address and no 48-bit read works
    #[error("Device needs 48-bit LBA commands but none succeeded ({blocks} blocks total)")]
    Needs48BitLba {
        /// Total blocks reported by the device
        blocks: u64,
    },

    /// Only READ(6) works but the medium is larger than it can address
    #[error("Device only supports SCSI READ (6) but has more than {limit} blocks ({blocks} blocks total)")]
    Read6RangeExceeded {
        /// Total blocks reported by the device
        blocks: u64,
        /// Blocks addressable by READ(6)
        limit: u64,
    },

    /// Medium is larger than 32-bit LBA and READ(16) is not available
    #[error("Device needs SCSI READ (16) for more than {limit} blocks ({blocks} blocks total)")]
    Read16Required {
        /// Total blocks reported by the device
        blocks: u64,
        /// Blocks addressable by READ(10)/READ(12)
        limit: u64,
    },

    /// READ CAPACITY failed on a device that must report one
    #[error("Unable to get media capacity: {0}")]
    CapacityUnavailable(String),

    /// Even a single-block read failed while sizing transfers
    #[error("Device error {last_error} trying to guess ideal transfer length")]
    TransferNegotiation {
        /// Last error reported by the transport
        last_error: i32,
    },

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Invalid simulated device profile
    #[error("Invalid device profile: {0}")]
    InvalidProfile(String),

    /// IO error while loading profiles or backing images
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using the discread error type
pub type Result<T> = std::result::Result<T, Error>;

/// Why a single read or seek did not produce data
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Failure {
    /// ATA command completed with error bits set
    #[error("ATA status 0x{status:02X}, error 0x{error:02X}")]
    Ata {
        /// Status register
        status: u8,
        /// Error register
        error: u8,
    },

    /// SCSI command ended in CHECK CONDITION
    #[error("SCSI {}", sense_summary(.sense))]
    Scsi {
        /// Raw sense buffer as returned by the device
        sense: Vec<u8>,
    },

    /// The operating system rejected the command
    #[error("OS error {0}")]
    Os(i32),

    /// Command completed without error but returned no data
    #[error("Device returned no data")]
    NoData,

    /// Operation has no working command on this device
    #[error("{0} is not available on this device")]
    Unavailable(&'static str),

    /// Block cannot be expressed in the selected command's address space
    #[error("Block is outside the address range of {0}")]
    OutOfRange(&'static str),

    /// Transfer length above what the selected command can carry
    #[error("Transfer of {requested} blocks exceeds the {limit} block limit")]
    TransferTooLarge {
        /// Requested block count
        requested: u32,
        /// Command ceiling
        limit: u64,
    },

    /// Zero-length transfer
    #[error("Transfer length must be at least one block")]
    EmptyTransfer,
}

impl Failure {
    /// Decoded sense data, for SCSI failures
    pub fn sense(&self) -> Option<Sense> {
        match self {
            Failure::Scsi { sense } => Sense::decode(sense),
            _ => None,
        }
    }

    /// Whether the device reported BLANK CHECK (unwritten area)
    pub fn is_blank_check(&self) -> bool {
        self.sense().is_some_and(|s| s.is_blank_check())
    }
}

fn sense_summary(sense: &[u8]) -> String {
    match Sense::decode(sense) {
        Some(decoded) => decoded.to_string(),
        None => "check condition without sense data".to_string(),
    }
}

/// A failed steady-state read or seek
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Read at block {block} failed: {failure}")]
pub struct ReadError {
    /// First block of the failed command
    pub block: u64,
    /// Time the failed command took
    pub duration: Duration,
    /// What went wrong
    pub failure: Failure,
}

impl ReadError {
    pub(crate) fn new(block: u64, duration: Duration, failure: Failure) -> Self {
        Self {
            block,
            duration,
            failure,
        }
    }

    pub(crate) fn immediate(block: u64, failure: Failure) -> Self {
        Self::new(block, Duration::ZERO, failure)
    }
}

/// Result type for steady-state reads and seeks
pub type ReadResult<T> = std::result::Result<T, ReadError>;
