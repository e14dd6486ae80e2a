//! # Discread Core
//!
//! Uniform sector reading over ATA and SCSI devices.
//!
//! A [`Reader`] takes a borrowed [`Device`], works out what it can do and
//! then reads blocks through whichever command the device turned out to
//! support. Callers never pick commands themselves.
//!
//! ## Modules
//!
//! - `device`: The transport trait and device identity
//! - `ata`, `scsi`: Command vocabularies, IDENTIFY and sense decoding
//! - `command`: Read, seek and raw command variants
//! - `probe`: Trial commands that discover working variants
//! - `selector`: Picks the bulk read command from the probe results
//! - `block_size`: Geometry and READ CAPACITY negotiation
//! - `raw`: Long sector size negotiation
//! - `transfer`: Blocks-per-command negotiation
//! - `reader`: The session tying everything together
//! - `sim`: Profile driven simulated devices
//! - `settings`: Persistent user settings from configuration file
//!
//! ## Example
//!
//! ```
//! use discread_core::{DeviceProfile, Reader, ReaderConfig, SimulatedDevice};
//!
//! let mut device = SimulatedDevice::from_profile(&DeviceProfile::scsi(4096, 512))?;
//! let mut reader = Reader::open(&mut device, ReaderConfig::default(), None)?;
//!
//! assert_eq!(reader.blocks(), 4096);
//! let chunk = reader.read_chunk(0)?;
//! assert_eq!(chunk.data.len(), 64 * 512);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod ata;
pub mod block_size;
pub mod capabilities;
pub mod command;
pub mod config;
pub mod device;
pub mod diagnostics;
pub mod error;
pub mod probe;
pub mod raw;
pub mod reader;
pub mod scsi;
pub mod selector;
pub mod settings;
pub mod sim;
pub mod transfer;

pub use block_size::{Geometry, MMC_BLOCK_SIZE};
pub use capabilities::{DeviceCapabilities, RawCapability};
pub use command::{
    Addressing, RawCommand, ReadCommand, SectorData, SeekCommand, LBA28_LIMIT, LBA48_LIMIT,
    READ10_LIMIT, READ6_LIMIT,
};
pub use config::{ReaderConfig, DEFAULT_TIMEOUT};
pub use device::{Device, DeviceInfo, PeripheralType, TransportKind};
pub use diagnostics::{Diagnostic, DiagnosticSink, RecordingSink, TracingSink};
pub use error::{Error, Failure, ReadError, ReadResult, Result};
pub use reader::{Reader, ReaderSummary};
pub use scsi::{VendorMethod, VendorRegistry};
pub use settings::{OutputSettings, ReaderSettings, Settings, SettingsError};
pub use sim::{CapacityMode, DeviceProfile, Issued, SimulatedDevice};
pub use transfer::DEFAULT_START_BLOCKS;
