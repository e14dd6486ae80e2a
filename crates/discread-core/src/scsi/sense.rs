//! SCSI sense data decoding
//!
//! Handles both fixed (0x70/0x71) and descriptor (0x72/0x73) formats. Only the
//! fields the reader acts on are kept: key, ASC/ASCQ, VALID, ILI and the
//! INFORMATION field.

use std::fmt;

/// Sense keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SenseKey {
    /// No specific sense key
    NoSense,
    /// Command succeeded after recovery
    RecoveredError,
    /// Unit not ready (e.g. no medium)
    NotReady,
    /// Unrecovered medium error
    MediumError,
    /// Hardware failure
    HardwareError,
    /// Bad CDB or parameter
    IllegalRequest,
    /// Unit attention
    UnitAttention,
    /// Write protected / access denied
    DataProtect,
    /// Unwritten area encountered
    BlankCheck,
    /// Vendor specific
    VendorSpecific,
    /// Copy aborted
    CopyAborted,
    /// Command aborted by the target
    AbortedCommand,
    /// Obsolete EQUAL key
    Equal,
    /// Volume overflow
    VolumeOverflow,
    /// Miscompare
    Miscompare,
    /// Completed
    Completed,
}

impl SenseKey {
    /// Decode the low nibble of a sense key byte
    pub fn from_u8(value: u8) -> Self {
        match value & 0x0F {
            0x0 => SenseKey::NoSense,
            0x1 => SenseKey::RecoveredError,
            0x2 => SenseKey::NotReady,
            0x3 => SenseKey::MediumError,
            0x4 => SenseKey::HardwareError,
            0x5 => SenseKey::IllegalRequest,
            0x6 => SenseKey::UnitAttention,
            0x7 => SenseKey::DataProtect,
            0x8 => SenseKey::BlankCheck,
            0x9 => SenseKey::VendorSpecific,
            0xA => SenseKey::CopyAborted,
            0xB => SenseKey::AbortedCommand,
            0xC => SenseKey::Equal,
            0xD => SenseKey::VolumeOverflow,
            0xE => SenseKey::Miscompare,
            _ => SenseKey::Completed,
        }
    }

    /// Numeric value
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Name as printed in SPC
    pub fn name(self) -> &'static str {
        match self {
            SenseKey::NoSense => "NO SENSE",
            SenseKey::RecoveredError => "RECOVERED ERROR",
            SenseKey::NotReady => "NOT READY",
            SenseKey::MediumError => "MEDIUM ERROR",
            SenseKey::HardwareError => "HARDWARE ERROR",
            SenseKey::IllegalRequest => "ILLEGAL REQUEST",
            SenseKey::UnitAttention => "UNIT ATTENTION",
            SenseKey::DataProtect => "DATA PROTECT",
            SenseKey::BlankCheck => "BLANK CHECK",
            SenseKey::VendorSpecific => "VENDOR SPECIFIC",
            SenseKey::CopyAborted => "COPY ABORTED",
            SenseKey::AbortedCommand => "ABORTED COMMAND",
            SenseKey::Equal => "EQUAL",
            SenseKey::VolumeOverflow => "VOLUME OVERFLOW",
            SenseKey::Miscompare => "MISCOMPARE",
            SenseKey::Completed => "COMPLETED",
        }
    }
}

/// Additional sense codes the reader cares about
pub mod asc {
    /// Unrecovered read error
    pub const UNRECOVERED_READ_ERROR: u8 = 0x11;
    /// Invalid command operation code
    pub const INVALID_COMMAND: u8 = 0x20;
    /// Logical block address out of range
    pub const LBA_OUT_OF_RANGE: u8 = 0x21;
    /// Invalid field in CDB
    pub const INVALID_FIELD_IN_CDB: u8 = 0x24;
    /// Medium not present
    pub const MEDIUM_NOT_PRESENT: u8 = 0x3A;
}

/// Decoded sense data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sense {
    /// Sense key
    pub key: SenseKey,
    /// Additional sense code
    pub asc: u8,
    /// Additional sense code qualifier
    pub ascq: u8,
    /// INFORMATION field is meaningful
    pub valid: bool,
    /// Incorrect length indicator
    pub ili: bool,
    /// INFORMATION field
    pub information: u64,
    /// Decoded from descriptor format
    pub descriptor: bool,
}

impl Sense {
    /// Decode a raw sense buffer, `None` if it is empty or of unknown format
    pub fn decode(buf: &[u8]) -> Option<Self> {
        let response_code = buf.first()? & 0x7F;
        match response_code {
            0x70 | 0x71 => Self::decode_fixed(buf),
            0x72 | 0x73 => Self::decode_descriptor(buf),
            _ => None,
        }
    }

    fn decode_fixed(buf: &[u8]) -> Option<Self> {
        let flags = *buf.get(2)?;
        let information = buf
            .get(3..7)
            .map(|b| u64::from(u32::from_be_bytes([b[0], b[1], b[2], b[3]])))
            .unwrap_or(0);

        Some(Self {
            key: SenseKey::from_u8(flags),
            asc: buf.get(12).copied().unwrap_or(0),
            ascq: buf.get(13).copied().unwrap_or(0),
            valid: buf[0] & 0x80 != 0,
            ili: flags & 0x20 != 0,
            information,
            descriptor: false,
        })
    }

    fn decode_descriptor(buf: &[u8]) -> Option<Self> {
        let mut sense = Self {
            key: SenseKey::from_u8(*buf.get(1)?),
            asc: buf.get(2).copied().unwrap_or(0),
            ascq: buf.get(3).copied().unwrap_or(0),
            valid: false,
            ili: false,
            information: 0,
            descriptor: true,
        };

        let additional = buf.get(7).copied().unwrap_or(0) as usize;
        let end = buf.len().min(8 + additional);
        let mut offset = 8;
        while offset + 2 <= end {
            let kind = buf[offset];
            let len = buf[offset + 1] as usize;
            let body = &buf[offset..end.min(offset + 2 + len)];
            match kind {
                // information
                0x00 if body.len() >= 12 => {
                    sense.valid = body[2] & 0x80 != 0;
                    let mut raw = [0u8; 8];
                    raw.copy_from_slice(&body[4..12]);
                    sense.information = u64::from_be_bytes(raw);
                }
                // stream commands / block commands
                0x04 | 0x05 if body.len() >= 4 => {
                    sense.ili |= body[3] & 0x20 != 0;
                }
                _ => {}
            }
            offset += 2 + len;
        }

        Some(sense)
    }

    /// Build a minimal fixed-format buffer
    pub fn fixed(key: SenseKey, asc: u8, ascq: u8) -> Vec<u8> {
        let mut buf = vec![0u8; 18];
        buf[0] = 0x70;
        buf[2] = key.code();
        buf[7] = 10;
        buf[12] = asc;
        buf[13] = ascq;
        buf
    }

    /// Build a fixed-format buffer with a valid INFORMATION field and optional ILI
    pub fn fixed_with_information(
        key: SenseKey,
        asc: u8,
        ascq: u8,
        information: u32,
        ili: bool,
    ) -> Vec<u8> {
        let mut buf = Self::fixed(key, asc, ascq);
        buf[0] |= 0x80;
        if ili {
            buf[2] |= 0x20;
        }
        buf[3..7].copy_from_slice(&information.to_be_bytes());
        buf
    }

    /// ILLEGAL REQUEST / INVALID FIELD IN CDB, the answer to a wrong READ LONG length
    pub fn is_invalid_field_in_cdb(&self) -> bool {
        self.key == SenseKey::IllegalRequest
            && self.asc == asc::INVALID_FIELD_IN_CDB
            && self.ascq == 0x00
    }

    /// Unwritten area
    pub fn is_blank_check(&self) -> bool {
        self.key == SenseKey::BlankCheck
    }

    /// Data came back after the drive recovered it
    pub fn is_recovered(&self) -> bool {
        self.key == SenseKey::RecoveredError
    }

    fn description(&self) -> Option<&'static str> {
        let text = match (self.asc, self.ascq) {
            (0x00, 0x00) => "NO ADDITIONAL SENSE INFORMATION",
            (0x04, 0x00) => "LOGICAL UNIT NOT READY, CAUSE NOT REPORTABLE",
            (0x11, 0x00) => "UNRECOVERED READ ERROR",
            (0x20, 0x00) => "INVALID COMMAND OPERATION CODE",
            (0x21, 0x00) => "LOGICAL BLOCK ADDRESS OUT OF RANGE",
            (0x24, 0x00) => "INVALID FIELD IN CDB",
            (0x3A, 0x00) => "MEDIUM NOT PRESENT",
            (0x64, 0x00) => "ILLEGAL MODE FOR THIS TRACK",
            _ => return None,
        };
        Some(text)
    }
}

impl fmt::Display for Sense {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: ASC 0x{:02X} ASCQ 0x{:02X}",
            self.key.name(),
            self.asc,
            self.ascq
        )?;
        if let Some(text) = self.description() {
            write!(f, " ({})", text)?;
        }
        if self.valid {
            write!(f, ", information 0x{:X}", self.information)?;
        }
        if self.ili {
            f.write_str(", ILI")?;
        }
        Ok(())
    }
}
