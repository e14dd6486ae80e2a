//! Vendor specific raw read methods
//!
//! A handful of drive families expose raw sectors through commands outside
//! the standard set. The registry maps the INQUIRY vendor identification to
//! the method to try, so the negotiation code never compares strings itself.

use crate::command::RawCommand;
use crate::scsi::RAW_DVD_SECTOR_SIZE;

/// READ LONG length that returns a full Matshita DVD sector cluster
pub const MATSHITA_LONG_SIZE: u32 = 37856;

/// How a vendor exposes raw sectors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VendorMethod {
    /// SyQuest READ LONG (vendor bit in the control byte), for removable
    /// magnetic media
    SyQuestLong,
    /// Dedicated raw DVD command with a fixed sector size
    RawDvd {
        /// Command to issue
        command: RawCommand,
        /// Bytes per raw sector
        sector_size: u32,
    },
    /// Standard READ LONG (10) at a fixed vendor length
    ReadLongFixed {
        /// Bytes returned per command
        length: u32,
    },
}

impl VendorMethod {
    /// Whether the method applies to optical (MMC) drives rather than block devices
    pub fn is_optical(&self) -> bool {
        !matches!(self, VendorMethod::SyQuestLong)
    }
}

/// One registered vendor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VendorEntry {
    /// Vendor identification, uppercase and trimmed
    pub vendor: String,
    /// Method to use
    pub method: VendorMethod,
}

/// Vendor identification to raw read method
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VendorRegistry {
    entries: Vec<VendorEntry>,
}

impl VendorRegistry {
    /// Registry with no vendors
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Add or replace a vendor
    pub fn register(mut self, vendor: &str, method: VendorMethod) -> Self {
        let vendor = normalize(vendor);
        self.entries.retain(|e| e.vendor != vendor);
        self.entries.push(VendorEntry { vendor, method });
        self
    }

    /// Method for a manufacturer string as reported by INQUIRY
    ///
    /// INQUIRY pads the field with spaces, so surrounding whitespace and case
    /// are ignored.
    pub fn lookup(&self, manufacturer: &str) -> Option<VendorMethod> {
        let wanted = normalize(manufacturer);
        self.entries
            .iter()
            .find(|e| e.vendor == wanted)
            .map(|e| e.method)
    }

    /// Registered vendors
    pub fn entries(&self) -> &[VendorEntry] {
        &self.entries
    }
}

impl Default for VendorRegistry {
    fn default() -> Self {
        Self::empty()
            .register("SYQUEST", VendorMethod::SyQuestLong)
            .register(
                "HL-DT-ST",
                VendorMethod::RawDvd {
                    command: RawCommand::HlDtStReadRawDvd,
                    sector_size: RAW_DVD_SECTOR_SIZE,
                },
            )
            .register(
                "PLEXTOR",
                VendorMethod::RawDvd {
                    command: RawCommand::PlextorReadRawDvd,
                    sector_size: RAW_DVD_SECTOR_SIZE,
                },
            )
            .register(
                "MATSHITA",
                VendorMethod::ReadLongFixed {
                    length: MATSHITA_LONG_SIZE,
                },
            )
    }
}

fn normalize(vendor: &str) -> String {
    vendor.trim().to_ascii_uppercase()
}
