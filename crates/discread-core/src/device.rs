//! Transport boundary
//!
//! The reader never opens, closes or owns a device. It borrows something that
//! implements [`Device`] and pushes ATA or SCSI requests through it, one at a
//! time. Actually executing a command (ioctl, pass-through, emulation) is the
//! implementor's business.

use crate::ata::{AtaRequest, AtaResponse};
use crate::scsi::{ScsiRequest, ScsiResponse};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Command set family spoken by a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Parallel/serial ATA disk
    Ata,
    /// ATA packet interface (SCSI commands over ATA)
    Atapi,
    /// SCSI, SAS, USB mass storage and friends
    Scsi,
    /// NVM Express
    Nvme,
    /// Anything else
    #[default]
    Unknown,
}

impl TransportKind {
    /// Whether reads go through SCSI command descriptor blocks
    pub fn speaks_scsi(self) -> bool {
        matches!(self, TransportKind::Atapi | TransportKind::Scsi)
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransportKind::Ata => "ATA",
            TransportKind::Atapi => "ATAPI",
            TransportKind::Scsi => "SCSI",
            TransportKind::Nvme => "NVMe",
            TransportKind::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// SCSI peripheral device type, as reported by INQUIRY
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum PeripheralType {
    /// Block device (SBC)
    #[default]
    DirectAccess,
    /// Tape
    SequentialAccess,
    /// Write-once optical
    WriteOnce,
    /// CD/DVD/BD drive (MMC)
    MultiMedia,
    /// Magneto-optical
    OpticalMemory,
    /// Reduced block command set (RBC)
    SimplifiedDirectAccess,
    /// Any other code
    Other(u8),
}

impl PeripheralType {
    /// Decode the low five bits of INQUIRY byte 0
    pub fn from_inquiry(byte: u8) -> Self {
        match byte & 0x1F {
            0x00 => PeripheralType::DirectAccess,
            0x01 => PeripheralType::SequentialAccess,
            0x04 => PeripheralType::WriteOnce,
            0x05 => PeripheralType::MultiMedia,
            0x07 => PeripheralType::OpticalMemory,
            0x0E => PeripheralType::SimplifiedDirectAccess,
            other => PeripheralType::Other(other),
        }
    }

    /// MMC devices may legitimately have no readable capacity
    pub fn is_multimedia(self) -> bool {
        self == PeripheralType::MultiMedia
    }
}

/// Static identity of an attached device
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DeviceInfo {
    /// Transport family
    pub kind: TransportKind,

    /// SCSI peripheral type (ignored for ATA)
    pub peripheral: PeripheralType,

    /// Vendor identification, e.g. `"PLEXTOR "` from INQUIRY
    pub manufacturer: String,

    /// Product identification
    pub model: String,
}

impl DeviceInfo {
    /// Create an info block for the given transport
    pub fn new(kind: TransportKind) -> Self {
        Self {
            kind,
            ..Self::default()
        }
    }

    /// Set peripheral type
    pub fn with_peripheral(mut self, peripheral: PeripheralType) -> Self {
        self.peripheral = peripheral;
        self
    }

    /// Set manufacturer
    pub fn with_manufacturer(mut self, manufacturer: impl Into<String>) -> Self {
        self.manufacturer = manufacturer.into();
        self
    }

    /// Set model
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

/// The transport primitive every reader component is built on
///
/// Each call sends exactly one command and blocks until the device answers
/// or `timeout` expires. Implementations serialize their own command queue.
#[cfg_attr(test, mockall::automock)]
pub trait Device {
    /// Identity of the device
    fn info(&self) -> &DeviceInfo;

    /// Send one ATA command
    fn send_ata(&mut self, request: &AtaRequest, timeout: Duration) -> AtaResponse;

    /// Send one SCSI command
    fn send_scsi(&mut self, request: &ScsiRequest, timeout: Duration) -> ScsiResponse;

    /// Last OS-level error code seen by the transport, 0 if none
    fn last_error(&self) -> i32;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_speaks_scsi() {
        assert!(TransportKind::Scsi.speaks_scsi());
        assert!(TransportKind::Atapi.speaks_scsi());
        assert!(!TransportKind::Ata.speaks_scsi());
        assert!(!TransportKind::Nvme.speaks_scsi());
    }

    #[test]
    fn test_transport_display() {
        assert_eq!(TransportKind::Ata.to_string(), "ATA");
        assert_eq!(TransportKind::Nvme.to_string(), "NVMe");
    }

    #[test]
    fn test_peripheral_from_inquiry() {
        assert_eq!(PeripheralType::from_inquiry(0x00), PeripheralType::DirectAccess);
        assert_eq!(PeripheralType::from_inquiry(0x05), PeripheralType::MultiMedia);
        // qualifier bits are ignored
        assert_eq!(PeripheralType::from_inquiry(0x27), PeripheralType::OpticalMemory);
        assert_eq!(PeripheralType::from_inquiry(0x1F), PeripheralType::Other(0x1F));
        assert!(PeripheralType::MultiMedia.is_multimedia());
    }

    #[test]
    fn test_device_info_builder() {
        let info = DeviceInfo::new(TransportKind::Scsi)
            .with_peripheral(PeripheralType::MultiMedia)
            .with_manufacturer("PLEXTOR")
            .with_model("DVDR PX-716A");
        assert_eq!(info.kind, TransportKind::Scsi);
        assert!(info.peripheral.is_multimedia());
        assert_eq!(info.manufacturer, "PLEXTOR");
        assert_eq!(info.model, "DVDR PX-716A");
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&PeripheralType::MultiMedia).unwrap();
        assert_eq!(json, "\"multi-media\"");
        let kind: TransportKind = serde_json::from_str("\"atapi\"").unwrap();
        assert_eq!(kind, TransportKind::Atapi);
    }
}
