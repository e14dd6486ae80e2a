//! IDENTIFY DEVICE decoding
//!
//! Only the words the reader needs for geometry and sector size are decoded.
//! The block is 256 little-endian words; strings are stored with the two
//! bytes of every word swapped.

use crate::error::{Error, Result};

/// Length of an IDENTIFY DEVICE response
pub const IDENTIFY_LEN: usize = 512;

const WORD_CYLINDERS: usize = 1;
const WORD_HEADS: usize = 3;
const WORD_SECTORS_PER_TRACK: usize = 6;
const WORD_SERIAL: usize = 10;
const WORD_FIRMWARE: usize = 23;
const WORD_MODEL: usize = 27;
const WORD_CAPABILITIES: usize = 49;
const WORD_CURRENT_CYLINDERS: usize = 54;
const WORD_CURRENT_HEADS: usize = 55;
const WORD_CURRENT_SECTORS: usize = 56;
const WORD_LBA_SECTORS: usize = 60;
const WORD_COMMAND_SET2: usize = 83;
const WORD_LBA48_SECTORS: usize = 100;
const WORD_PHYS_LOG_SIZE: usize = 106;
const WORD_LOGICAL_SECTOR_WORDS: usize = 117;
const WORD_LOGICAL_ALIGNMENT: usize = 209;

const CAP_LBA: u16 = 0x0200;
const CMDSET2_LBA48: u16 = 0x0400;

const SERIAL_LEN: usize = 20;
const FIRMWARE_LEN: usize = 8;
const MODEL_LEN: usize = 40;

/// Default sector size when the drive reports nothing else
pub const DEFAULT_SECTOR_SIZE: u32 = 512;

/// Largest logical sector, in words, taken from words 117..118
pub const MAX_LOGICAL_SECTOR_WORDS: u32 = 0xFFFF;

/// Decoded IDENTIFY DEVICE data
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Identify {
    /// Default cylinders (word 1)
    pub cylinders: u16,
    /// Default heads (word 3)
    pub heads: u16,
    /// Default sectors per track (word 6)
    pub sectors_per_track: u16,
    /// Current cylinders (word 54)
    pub current_cylinders: u16,
    /// Current heads (word 55)
    pub current_heads: u16,
    /// Current sectors per track (word 56)
    pub current_sectors_per_track: u16,
    /// Capabilities (word 49)
    pub capabilities: u16,
    /// User addressable sectors for 28-bit commands (words 60-61)
    pub lba_sectors: u32,
    /// Command set support (word 83)
    pub command_set2: u16,
    /// User addressable sectors for 48-bit commands (words 100-103)
    pub lba48_sectors: u64,
    /// Physical/logical sector size report (word 106)
    pub phys_log_sector_size: u16,
    /// Logical sector size in words (words 117-118)
    pub logical_sector_words: u32,
    /// Logical sector alignment (word 209)
    pub logical_alignment: u16,
    /// Model number
    pub model: String,
    /// Serial number
    pub serial: String,
    /// Firmware revision
    pub firmware: String,
}

impl Identify {
    /// Decode a raw IDENTIFY DEVICE block
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < IDENTIFY_LEN {
            return Err(Error::InvalidIdentify(format!(
                "expected {} bytes, got {}",
                IDENTIFY_LEN,
                data.len()
            )));
        }

        let word = |index: usize| u16::from_le_bytes([data[index * 2], data[index * 2 + 1]]);
        let dword = |index: usize| u32::from(word(index)) | (u32::from(word(index + 1)) << 16);
        let qword = |index: usize| u64::from(dword(index)) | (u64::from(dword(index + 2)) << 32);

        Ok(Self {
            cylinders: word(WORD_CYLINDERS),
            heads: word(WORD_HEADS),
            sectors_per_track: word(WORD_SECTORS_PER_TRACK),
            current_cylinders: word(WORD_CURRENT_CYLINDERS),
            current_heads: word(WORD_CURRENT_HEADS),
            current_sectors_per_track: word(WORD_CURRENT_SECTORS),
            capabilities: word(WORD_CAPABILITIES),
            lba_sectors: dword(WORD_LBA_SECTORS),
            command_set2: word(WORD_COMMAND_SET2),
            lba48_sectors: qword(WORD_LBA48_SECTORS),
            phys_log_sector_size: word(WORD_PHYS_LOG_SIZE),
            logical_sector_words: dword(WORD_LOGICAL_SECTOR_WORDS),
            logical_alignment: word(WORD_LOGICAL_ALIGNMENT),
            model: ata_string(&data[WORD_MODEL * 2..WORD_MODEL * 2 + MODEL_LEN]),
            serial: ata_string(&data[WORD_SERIAL * 2..WORD_SERIAL * 2 + SERIAL_LEN]),
            firmware: ata_string(&data[WORD_FIRMWARE * 2..WORD_FIRMWARE * 2 + FIRMWARE_LEN]),
        })
    }

    /// Encode back into a 512-byte block
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut data = vec![0u8; IDENTIFY_LEN];
        let mut put = |index: usize, value: u16| {
            data[index * 2..index * 2 + 2].copy_from_slice(&value.to_le_bytes());
        };

        put(WORD_CYLINDERS, self.cylinders);
        put(WORD_HEADS, self.heads);
        put(WORD_SECTORS_PER_TRACK, self.sectors_per_track);
        put(WORD_CURRENT_CYLINDERS, self.current_cylinders);
        put(WORD_CURRENT_HEADS, self.current_heads);
        put(WORD_CURRENT_SECTORS, self.current_sectors_per_track);
        put(WORD_CAPABILITIES, self.capabilities);
        put(WORD_LBA_SECTORS, self.lba_sectors as u16);
        put(WORD_LBA_SECTORS + 1, (self.lba_sectors >> 16) as u16);
        put(WORD_COMMAND_SET2, self.command_set2);
        for i in 0..4 {
            put(WORD_LBA48_SECTORS + i, (self.lba48_sectors >> (16 * i)) as u16);
        }
        put(WORD_PHYS_LOG_SIZE, self.phys_log_sector_size);
        put(WORD_LOGICAL_SECTOR_WORDS, self.logical_sector_words as u16);
        put(
            WORD_LOGICAL_SECTOR_WORDS + 1,
            (self.logical_sector_words >> 16) as u16,
        );
        put(WORD_LOGICAL_ALIGNMENT, self.logical_alignment);

        put_ata_string(&mut data[WORD_MODEL * 2..], &self.model, MODEL_LEN);
        put_ata_string(&mut data[WORD_SERIAL * 2..], &self.serial, SERIAL_LEN);
        put_ata_string(&mut data[WORD_FIRMWARE * 2..], &self.firmware, FIRMWARE_LEN);
        data
    }

    /// Device accepts LBA addressing
    pub fn supports_lba(&self) -> bool {
        self.capabilities & CAP_LBA != 0
    }

    /// Device implements the 48-bit address feature set
    pub fn supports_lba48(&self) -> bool {
        self.command_set2 != 0xFFFF && self.command_set2 & CMDSET2_LBA48 != 0
    }

    /// Current translation geometry, falling back to the default one
    ///
    /// A geometry whose heads or sectors per track do not fit a task file
    /// register is treated as absent.
    pub fn chs(&self) -> Option<(u16, u8, u8)> {
        let valid = |c: u16, h: u16, s: u16| {
            let heads = u8::try_from(h).ok()?;
            let sectors = u8::try_from(s).ok()?;
            (c > 0 && heads > 0 && sectors > 0).then_some((c, heads, sectors))
        };
        valid(
            self.current_cylinders,
            self.current_heads,
            self.current_sectors_per_track,
        )
        .or_else(|| valid(self.cylinders, self.heads, self.sectors_per_track))
    }

    fn reports_sector_size(&self) -> bool {
        self.phys_log_sector_size & 0x8000 == 0 && self.phys_log_sector_size & 0x4000 != 0
    }

    /// Logical sector size in bytes
    pub fn logical_block_size(&self) -> u32 {
        if !self.reports_sector_size() || self.phys_log_sector_size & 0x1000 == 0 {
            return DEFAULT_SECTOR_SIZE;
        }
        if self.logical_sector_words <= 255
            || self.logical_sector_words > MAX_LOGICAL_SECTOR_WORDS
            || self.logical_alignment == 0xFFFF
        {
            return DEFAULT_SECTOR_SIZE;
        }
        self.logical_sector_words
            .checked_mul(2)
            .unwrap_or(DEFAULT_SECTOR_SIZE)
    }

    /// Physical sector size in bytes
    pub fn physical_block_size(&self) -> u32 {
        let logical = self.logical_block_size();
        if !self.reports_sector_size() || self.phys_log_sector_size & 0x2000 == 0 {
            return logical;
        }
        let exponent = u32::from(self.phys_log_sector_size & 0xF);
        1u32.checked_shl(exponent)
            .and_then(|per_physical| logical.checked_mul(per_physical))
            .unwrap_or(logical)
    }
}

fn ata_string(raw: &[u8]) -> String {
    let swapped: Vec<u8> = raw.chunks_exact(2).flat_map(|pair| [pair[1], pair[0]]).collect();
    String::from_utf8_lossy(&swapped)
        .trim_matches(|c: char| c == ' ' || c == '\0')
        .to_string()
}

fn put_ata_string(out: &mut [u8], value: &str, len: usize) {
    let mut padded = vec![b' '; len];
    for (slot, byte) in padded.iter_mut().zip(value.bytes()) {
        *slot = byte;
    }
    for (i, pair) in padded.chunks_exact(2).enumerate() {
        out[i * 2] = pair[1];
        out[i * 2 + 1] = pair[0];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block_with(words: &[(usize, u16)]) -> Vec<u8> {
        let mut data = vec![0u8; IDENTIFY_LEN];
        for &(index, value) in words {
            data[index * 2..index * 2 + 2].copy_from_slice(&value.to_le_bytes());
        }
        data
    }

    #[test]
    fn test_decode_rejects_short_block() {
        let result = Identify::decode(&[0u8; 100]);
        assert!(matches!(result, Err(Error::InvalidIdentify(_))));
    }

    #[test]
    fn test_decode_geometry_and_lba() {
        let data = block_with(&[
            (1, 16383),
            (3, 16),
            (6, 63),
            (49, 0x0200),
            (60, 0x5000),
            (61, 0x0098),
            (83, 0x4400),
            (100, 0x2000),
            (101, 0x1DCF),
        ]);
        let id = Identify::decode(&data).unwrap();

        assert_eq!(id.chs(), Some((16383, 16, 63)));
        assert!(id.supports_lba());
        assert!(id.supports_lba48());
        assert_eq!(id.lba_sectors, 0x0098_5000);
        assert_eq!(id.lba48_sectors, 0x1DCF_2000);
    }

    #[test]
    fn test_current_geometry_preferred() {
        let data = block_with(&[(1, 1024), (3, 16), (6, 63), (54, 4092), (55, 16), (56, 63)]);
        let id = Identify::decode(&data).unwrap();
        assert_eq!(id.chs(), Some((4092, 16, 63)));
    }

    #[test]
    fn test_no_geometry() {
        let id = Identify::decode(&[0u8; IDENTIFY_LEN]).unwrap();
        assert_eq!(id.chs(), None);
        assert!(!id.supports_lba());
        assert!(!id.supports_lba48());
    }

    #[test]
    fn test_default_sector_sizes() {
        let id = Identify::default();
        assert_eq!(id.logical_block_size(), 512);
        assert_eq!(id.physical_block_size(), 512);
    }

    #[test]
    fn test_advanced_format_physical_size() {
        // 512e: eight logical sectors per physical sector
        let id = Identify {
            phys_log_sector_size: 0x6003,
            ..Identify::default()
        };
        assert_eq!(id.logical_block_size(), 512);
        assert_eq!(id.physical_block_size(), 4096);
    }

    #[test]
    fn test_native_4k_logical_size() {
        let id = Identify {
            phys_log_sector_size: 0x5000,
            logical_sector_words: 2048,
            ..Identify::default()
        };
        assert_eq!(id.logical_block_size(), 4096);
        assert_eq!(id.physical_block_size(), 4096);
    }

    #[test]
    fn test_invalid_size_report_ignored() {
        // bit 15 set means the word is not valid
        let id = Identify {
            phys_log_sector_size: 0xD003,
            logical_sector_words: 2048,
            ..Identify::default()
        };
        assert_eq!(id.logical_block_size(), 512);
        assert_eq!(id.physical_block_size(), 512);
    }

    #[test]
    fn test_small_logical_words_fall_back() {
        let id = Identify {
            phys_log_sector_size: 0x5000,
            logical_sector_words: 200,
            ..Identify::default()
        };
        assert_eq!(id.logical_block_size(), 512);
    }

    #[test]
    fn test_oversized_logical_words_fall_back() {
        let id = Identify {
            phys_log_sector_size: 0x5000,
            logical_sector_words: 0x8000_0000,
            ..Identify::default()
        };
        assert_eq!(id.logical_block_size(), 512);
        assert_eq!(id.physical_block_size(), 512);

        let id = Identify {
            logical_sector_words: MAX_LOGICAL_SECTOR_WORDS,
            ..id
        };
        assert_eq!(id.logical_block_size(), 0x1FFFE);
    }

    #[test]
    fn test_largest_reported_sizes_fit() {
        // largest logical sector with 2^15 logical sectors per physical one
        let id = Identify {
            phys_log_sector_size: 0x700F,
            logical_sector_words: MAX_LOGICAL_SECTOR_WORDS,
            ..Identify::default()
        };
        assert_eq!(id.logical_block_size(), 0x1FFFE);
        assert_eq!(id.physical_block_size(), 0xFFFF_0000);
    }

    #[test]
    fn test_chs_rejects_values_wider_than_registers() {
        let id = Identify {
            cylinders: 100,
            heads: 256,
            sectors_per_track: 63,
            ..Identify::default()
        };
        assert_eq!(id.chs(), None);

        // current geometry out of range falls back to the default one
        let id = Identify {
            cylinders: 100,
            heads: 16,
            sectors_per_track: 63,
            current_cylinders: 100,
            current_heads: 16,
            current_sectors_per_track: 300,
            ..Identify::default()
        };
        assert_eq!(id.chs(), Some((100, 16, 63)));
    }

    #[test]
    fn test_strings_are_byte_swapped() {
        let mut data = vec![0u8; IDENTIFY_LEN];
        // "QEMU HARDDISK" stored as swapped pairs
        let model = b"EQUMH RADDSI K";
        data[WORD_MODEL * 2..WORD_MODEL * 2 + model.len()].copy_from_slice(model);
        let id = Identify::decode(&data).unwrap();
        assert_eq!(id.model, "QEMU HARDDISK");
    }

    #[test]
    fn test_encode_decode() {
        let id = Identify {
            cylinders: 1024,
            heads: 16,
            sectors_per_track: 63,
            capabilities: 0x0200,
            lba_sectors: 1_032_192,
            command_set2: 0x4400,
            lba48_sectors: 500_000_000,
            phys_log_sector_size: 0x6003,
            model: "SIM DISK".to_string(),
            serial: "0001".to_string(),
            firmware: "1.0".to_string(),
            ..Identify::default()
        };
        let decoded = Identify::decode(&id.to_bytes()).unwrap();
        assert_eq!(decoded, id);
    }
}
