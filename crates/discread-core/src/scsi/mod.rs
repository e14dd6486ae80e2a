//! SCSI command vocabulary
//!
//! Requests carry enough information for a pass-through transport to build
//! the command descriptor block ([`ScsiRequest::cdb`]); responses carry the
//! data, sense buffer and completion detail.

pub mod capacity;
pub mod sense;
pub mod vendor;

pub use capacity::Capacity;
pub use sense::{asc, Sense, SenseKey};
pub use vendor::{VendorEntry, VendorMethod, VendorRegistry};

use std::fmt;
use std::time::Duration;

/// Sector size of raw DVD reads (2048 user bytes plus ID, IED, CPR_MAI and EDC)
pub const RAW_DVD_SECTOR_SIZE: u32 = 2064;

/// Allocation length used for READ CAPACITY (16)
pub const CAPACITY16_ALLOCATION: u32 = 32;

const SYQUEST_LONG: u8 = 0x40;

/// SCSI commands the reader knows how to issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScsiCommand {
    /// READ (6)
    Read6,
    /// READ (10)
    Read10,
    /// READ (12)
    Read12,
    /// READ (16)
    Read16,
    /// SEEK (6)
    Seek6,
    /// SEEK (10)
    Seek10,
    /// READ LONG (10)
    ReadLong10,
    /// READ LONG (16)
    ReadLong16,
    /// READ CAPACITY (10)
    ReadCapacity10,
    /// READ CAPACITY (16)
    ReadCapacity16,
    /// SyQuest vendor READ LONG (6)
    SyQuestReadLong6,
    /// SyQuest vendor READ LONG (10)
    SyQuestReadLong10,
    /// HL-DT-ST vendor raw DVD read
    HlDtStReadRawDvd,
    /// Plextor vendor raw DVD read
    PlextorReadRawDvd,
}

impl ScsiCommand {
    /// Operation code in CDB byte 0
    pub fn opcode(self) -> u8 {
        match self {
            ScsiCommand::Read6 | ScsiCommand::SyQuestReadLong6 => 0x08,
            ScsiCommand::Seek6 => 0x0B,
            ScsiCommand::ReadCapacity10 => 0x25,
            ScsiCommand::Read10 | ScsiCommand::SyQuestReadLong10 => 0x28,
            ScsiCommand::Seek10 => 0x2B,
            ScsiCommand::PlextorReadRawDvd => 0x3C,
            ScsiCommand::ReadLong10 => 0x3E,
            ScsiCommand::Read16 => 0x88,
            ScsiCommand::ReadLong16 | ScsiCommand::ReadCapacity16 => 0x9E,
            ScsiCommand::Read12 => 0xA8,
            ScsiCommand::HlDtStReadRawDvd => 0xE7,
        }
    }

    /// Human readable name
    pub fn name(self) -> &'static str {
        match self {
            ScsiCommand::Read6 => "SCSI READ (6)",
            ScsiCommand::Read10 => "SCSI READ (10)",
            ScsiCommand::Read12 => "SCSI READ (12)",
            ScsiCommand::Read16 => "SCSI READ (16)",
            ScsiCommand::Seek6 => "SCSI SEEK (6)",
            ScsiCommand::Seek10 => "SCSI SEEK (10)",
            ScsiCommand::ReadLong10 => "SCSI READ LONG (10)",
            ScsiCommand::ReadLong16 => "SCSI READ LONG (16)",
            ScsiCommand::ReadCapacity10 => "SCSI READ CAPACITY (10)",
            ScsiCommand::ReadCapacity16 => "SCSI READ CAPACITY (16)",
            ScsiCommand::SyQuestReadLong6 => "SyQuest READ LONG (6)",
            ScsiCommand::SyQuestReadLong10 => "SyQuest READ LONG (10)",
            ScsiCommand::HlDtStReadRawDvd => "HL-DT-ST raw DVD read",
            ScsiCommand::PlextorReadRawDvd => "Plextor raw DVD read",
        }
    }

    /// Commands whose length field counts bytes of one sector, not blocks
    pub fn is_long(self) -> bool {
        matches!(
            self,
            ScsiCommand::ReadLong10
                | ScsiCommand::ReadLong16
                | ScsiCommand::SyQuestReadLong6
                | ScsiCommand::SyQuestReadLong10
        )
    }
}

impl fmt::Display for ScsiCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single SCSI command to send
///
/// For block reads `block_size` is the logical block length and `count` the
/// number of blocks. For READ LONG style commands `block_size` is the byte
/// length of the one sector requested and `count` is 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScsiRequest {
    /// Command to issue
    pub command: ScsiCommand,
    /// Logical block address
    pub lba: u64,
    /// Bytes per block expected back
    pub block_size: u32,
    /// Blocks to transfer
    pub count: u32,
}

impl ScsiRequest {
    /// Block read
    pub fn read(command: ScsiCommand, lba: u64, block_size: u32, count: u32) -> Self {
        Self {
            command,
            lba,
            block_size,
            count,
        }
    }

    /// Seek, no data phase
    pub fn seek(command: ScsiCommand, lba: u64) -> Self {
        Self::read(command, lba, 0, 0)
    }

    /// Single sector long read of `length` bytes
    pub fn read_long(command: ScsiCommand, lba: u64, length: u32) -> Self {
        Self::read(command, lba, length, 1)
    }

    /// READ CAPACITY (10) or (16)
    pub fn read_capacity(command: ScsiCommand) -> Self {
        let length = if command == ScsiCommand::ReadCapacity16 {
            CAPACITY16_ALLOCATION
        } else {
            8
        };
        Self::read(command, 0, length, 1)
    }

    /// Bytes the host expects in the data-in phase
    pub fn expected_length(&self) -> usize {
        self.block_size as usize * self.count as usize
    }

    /// Build the command descriptor block
    pub fn cdb(&self) -> Vec<u8> {
        let lba32 = (self.lba as u32).to_be_bytes();
        match self.command {
            ScsiCommand::Read6 | ScsiCommand::SyQuestReadLong6 => {
                let control = if self.command == ScsiCommand::SyQuestReadLong6 {
                    SYQUEST_LONG
                } else {
                    0
                };
                // a transfer length of 0 means 256 blocks
                vec![
                    self.command.opcode(),
                    lba32[1] & 0x1F,
                    lba32[2],
                    lba32[3],
                    self.count as u8,
                    control,
                ]
            }
            ScsiCommand::Seek6 => vec![0x0B, lba32[1] & 0x1F, lba32[2], lba32[3], 0, 0],
            ScsiCommand::Read10 | ScsiCommand::SyQuestReadLong10 => {
                let control = if self.command == ScsiCommand::SyQuestReadLong10 {
                    SYQUEST_LONG
                } else {
                    0
                };
                let len = (self.count as u16).to_be_bytes();
                let mut cdb = vec![0x28, 0, 0, 0, 0, 0, 0, len[0], len[1], control];
                cdb[2..6].copy_from_slice(&lba32);
                cdb
            }
            ScsiCommand::Seek10 => {
                let mut cdb = vec![0x2B, 0, 0, 0, 0, 0, 0, 0, 0, 0];
                cdb[2..6].copy_from_slice(&lba32);
                cdb
            }
            ScsiCommand::Read12 => {
                let mut cdb = vec![0u8; 12];
                cdb[0] = 0xA8;
                cdb[2..6].copy_from_slice(&lba32);
                cdb[6..10].copy_from_slice(&self.count.to_be_bytes());
                cdb
            }
            ScsiCommand::Read16 => {
                let mut cdb = vec![0u8; 16];
                cdb[0] = 0x88;
                cdb[2..10].copy_from_slice(&self.lba.to_be_bytes());
                cdb[10..14].copy_from_slice(&self.count.to_be_bytes());
                cdb
            }
            ScsiCommand::ReadLong10 => {
                let len = (self.block_size as u16).to_be_bytes();
                let mut cdb = vec![0x3E, 0, 0, 0, 0, 0, 0, len[0], len[1], 0];
                cdb[2..6].copy_from_slice(&lba32);
                cdb
            }
            ScsiCommand::ReadLong16 => {
                let mut cdb = vec![0u8; 16];
                cdb[0] = 0x9E;
                cdb[1] = 0x11;
                cdb[2..10].copy_from_slice(&self.lba.to_be_bytes());
                cdb[12..14].copy_from_slice(&(self.block_size as u16).to_be_bytes());
                cdb
            }
            ScsiCommand::ReadCapacity10 => vec![0x25, 0, 0, 0, 0, 0, 0, 0, 0, 0],
            ScsiCommand::ReadCapacity16 => {
                let mut cdb = vec![0u8; 16];
                cdb[0] = 0x9E;
                cdb[1] = 0x10;
                cdb[10..14].copy_from_slice(&CAPACITY16_ALLOCATION.to_be_bytes());
                cdb
            }
            ScsiCommand::HlDtStReadRawDvd => {
                // "HIT" signature, subcommand 1
                let mut cdb = vec![0xE7, 0x48, 0x49, 0x54, 0x01, 0, 0, 0, 0, 0, 0, 0];
                cdb[6..10].copy_from_slice(&lba32);
                cdb[10..12].copy_from_slice(&(self.count as u16).to_be_bytes());
                cdb
            }
            ScsiCommand::PlextorReadRawDvd => {
                // READ BUFFER, mode 2, 24-bit address and length
                let len = (self.expected_length() as u32).to_be_bytes();
                vec![
                    0x3C, 0x02, lba32[1], lba32[2], lba32[3], 0, len[1], len[2], len[3], 0,
                ]
            }
        }
    }
}

/// What came back from a SCSI command
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ScsiResponse {
    /// Data-in buffer
    pub data: Vec<u8>,
    /// Sense buffer, empty when the device returned none
    pub sense: Vec<u8>,
    /// Device answered CHECK CONDITION
    pub check_condition: bool,
    /// Time the command took
    pub duration: Duration,
    /// Set when the OS failed to deliver the command at all
    pub os_error: Option<i32>,
}

impl ScsiResponse {
    /// Good status with data
    pub fn ok(data: Vec<u8>, duration: Duration) -> Self {
        Self {
            data,
            duration,
            ..Self::default()
        }
    }

    /// CHECK CONDITION with the given sense buffer
    pub fn check_condition(sense: Vec<u8>, duration: Duration) -> Self {
        Self {
            sense,
            check_condition: true,
            duration,
            ..Self::default()
        }
    }

    /// Command never reached the device
    pub fn os_failure(errno: i32) -> Self {
        Self {
            os_error: Some(errno),
            ..Self::default()
        }
    }

    /// Whether the command failed
    pub fn is_error(&self) -> bool {
        self.check_condition || self.os_error.is_some()
    }

    /// Decoded sense, if any
    pub fn decoded_sense(&self) -> Option<Sense> {
        Sense::decode(&self.sense)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read6_cdb() {
        let req = ScsiRequest::read(ScsiCommand::Read6, 0x0012_3456, 512, 256);
        assert_eq!(req.cdb(), vec![0x08, 0x12, 0x34, 0x56, 0x00, 0x00]);
        assert_eq!(req.expected_length(), 512 * 256);
    }

    #[test]
    fn test_read10_cdb() {
        let req = ScsiRequest::read(ScsiCommand::Read10, 0x0102_0304, 2048, 16);
        assert_eq!(
            req.cdb(),
            vec![0x28, 0, 0x01, 0x02, 0x03, 0x04, 0, 0x00, 0x10, 0]
        );
    }

    #[test]
    fn test_read16_cdb() {
        let req = ScsiRequest::read(ScsiCommand::Read16, 0x0000_0001_0000_0000, 512, 0x0001_0000);
        let cdb = req.cdb();
        assert_eq!(cdb.len(), 16);
        assert_eq!(cdb[0], 0x88);
        assert_eq!(&cdb[2..10], &[0, 0, 0, 1, 0, 0, 0, 0]);
        assert_eq!(&cdb[10..14], &[0, 1, 0, 0]);
    }

    #[test]
    fn test_read_long_cdbs() {
        let req = ScsiRequest::read_long(ScsiCommand::ReadLong10, 7, 0xFFFF);
        assert_eq!(req.cdb(), vec![0x3E, 0, 0, 0, 0, 7, 0, 0xFF, 0xFF, 0]);

        let req = ScsiRequest::read_long(ScsiCommand::ReadLong16, 7, 2380);
        let cdb = req.cdb();
        assert_eq!(&cdb[..2], &[0x9E, 0x11]);
        assert_eq!(cdb[9], 7);
        assert_eq!(&cdb[12..14], &2380u16.to_be_bytes());
    }

    #[test]
    fn test_syquest_cdbs_set_vendor_bit() {
        let req = ScsiRequest::read_long(ScsiCommand::SyQuestReadLong6, 0, 262);
        assert_eq!(req.cdb(), vec![0x08, 0, 0, 0, 1, 0x40]);
        let req = ScsiRequest::read_long(ScsiCommand::SyQuestReadLong10, 0, 604);
        assert_eq!(req.cdb()[9], 0x40);
        assert_eq!(&req.cdb()[7..9], &[0, 1]);
    }

    #[test]
    fn test_capacity_cdbs() {
        let req = ScsiRequest::read_capacity(ScsiCommand::ReadCapacity16);
        let cdb = req.cdb();
        assert_eq!(&cdb[..2], &[0x9E, 0x10]);
        assert_eq!(&cdb[10..14], &[0, 0, 0, 32]);
        assert_eq!(req.expected_length(), 32);
        assert_eq!(
            ScsiRequest::read_capacity(ScsiCommand::ReadCapacity10).expected_length(),
            8
        );
    }

    #[test]
    fn test_vendor_raw_dvd_cdbs() {
        let req = ScsiRequest::read(ScsiCommand::HlDtStReadRawDvd, 0x10, RAW_DVD_SECTOR_SIZE, 2);
        let cdb = req.cdb();
        assert_eq!(&cdb[..5], &[0xE7, b'H', b'I', b'T', 0x01]);
        assert_eq!(&cdb[6..10], &[0, 0, 0, 0x10]);
        assert_eq!(&cdb[10..12], &[0, 2]);

        let req = ScsiRequest::read(ScsiCommand::PlextorReadRawDvd, 0x10, RAW_DVD_SECTOR_SIZE, 1);
        let cdb = req.cdb();
        assert_eq!(&cdb[..2], &[0x3C, 0x02]);
        assert_eq!(&cdb[6..9], &[0x00, 0x08, 0x10]);
    }

    #[test]
    fn test_seek_cdbs() {
        assert_eq!(
            ScsiRequest::seek(ScsiCommand::Seek6, 0x1F_FFFF).cdb(),
            vec![0x0B, 0x1F, 0xFF, 0xFF, 0, 0]
        );
        assert_eq!(ScsiRequest::seek(ScsiCommand::Seek10, 1).cdb()[5], 1);
    }

    #[test]
    fn test_response_helpers() {
        let ok = ScsiResponse::ok(vec![0; 512], Duration::ZERO);
        assert!(!ok.is_error());
        assert!(ok.decoded_sense().is_none());

        let check = ScsiResponse::check_condition(
            Sense::fixed(SenseKey::IllegalRequest, 0x20, 0x00),
            Duration::ZERO,
        );
        assert!(check.is_error());
        assert_eq!(check.decoded_sense().unwrap().key, SenseKey::IllegalRequest);

        assert!(ScsiResponse::os_failure(5).is_error());
    }

    #[test]
    fn test_long_commands() {
        assert!(ScsiCommand::ReadLong10.is_long());
        assert!(ScsiCommand::SyQuestReadLong6.is_long());
        assert!(!ScsiCommand::HlDtStReadRawDvd.is_long());
        assert_eq!(ScsiCommand::Read12.to_string(), "SCSI READ (12)");
    }
}
