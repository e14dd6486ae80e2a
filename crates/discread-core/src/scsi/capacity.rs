//! READ CAPACITY parameter data

/// Capacity reported by READ CAPACITY (10) or (16)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capacity {
    /// Address of the last logical block
    pub last_lba: u64,
    /// Logical block length in bytes
    pub block_size: u32,
    /// Logical blocks per physical block, as a power of two
    pub physical_exponent: u8,
}

impl Capacity {
    /// Parse READ CAPACITY (10) data (8 bytes, big-endian)
    pub fn parse10(buf: &[u8]) -> Option<Self> {
        let raw = buf.get(..8)?;
        Some(Self {
            last_lba: u64::from(u32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]])),
            block_size: u32::from_be_bytes([raw[4], raw[5], raw[6], raw[7]]),
            physical_exponent: 0,
        })
    }

    /// Parse READ CAPACITY (16) data
    ///
    /// Bytes 0-7 hold the last LBA and bytes 8-11 the block length. Byte 13
    /// carries the physical block exponent when the device returned it.
    pub fn parse16(buf: &[u8]) -> Option<Self> {
        let raw = buf.get(..12)?;
        let mut lba = [0u8; 8];
        lba.copy_from_slice(&raw[..8]);
        Some(Self {
            last_lba: u64::from_be_bytes(lba),
            block_size: u32::from_be_bytes([raw[8], raw[9], raw[10], raw[11]]),
            physical_exponent: buf.get(13).map_or(0, |b| b & 0x0F),
        })
    }

    /// READ CAPACITY (10) answer that means "ask again with (16)"
    pub fn is_saturated(&self) -> bool {
        self.last_lba == u64::from(u32::MAX)
    }

    /// Number of addressable blocks
    pub fn blocks(&self) -> u64 {
        self.last_lba.saturating_add(1)
    }

    /// Physical block length in bytes
    pub fn physical_block_size(&self) -> u32 {
        self.block_size
            .checked_shl(u32::from(self.physical_exponent))
            .unwrap_or(self.block_size)
    }

    /// Encode as READ CAPACITY (10) data, saturating large devices
    pub fn to_bytes10(&self) -> Vec<u8> {
        let last = u32::try_from(self.last_lba).unwrap_or(u32::MAX);
        let mut buf = Vec::with_capacity(8);
        buf.extend_from_slice(&last.to_be_bytes());
        buf.extend_from_slice(&self.block_size.to_be_bytes());
        buf
    }

    /// Encode as 32 bytes of READ CAPACITY (16) data
    pub fn to_bytes16(&self) -> Vec<u8> {
        let mut buf = vec![0u8; 32];
        buf[..8].copy_from_slice(&self.last_lba.to_be_bytes());
        buf[8..12].copy_from_slice(&self.block_size.to_be_bytes());
        buf[13] = self.physical_exponent & 0x0F;
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse10() {
        // 1.44 MB: last LBA 2879, 512-byte blocks
        let buf = [0x00, 0x00, 0x0B, 0x3F, 0x00, 0x00, 0x02, 0x00];
        let cap = Capacity::parse10(&buf).unwrap();
        assert_eq!(cap.last_lba, 2879);
        assert_eq!(cap.blocks(), 2880);
        assert_eq!(cap.block_size, 512);
        assert!(!cap.is_saturated());
        assert_eq!(cap.physical_block_size(), 512);
    }

    #[test]
    fn test_parse10_saturated() {
        let buf = [0xFF, 0xFF, 0xFF, 0xFF, 0x00, 0x00, 0x02, 0x00];
        let cap = Capacity::parse10(&buf).unwrap();
        assert!(cap.is_saturated());
    }

    #[test]
    fn test_parse10_short() {
        assert_eq!(Capacity::parse10(&[0u8; 7]), None);
    }

    #[test]
    fn test_parse16_block_length_from_bytes_8_to_11() {
        // 4 TB drive, 512e: last LBA 0x1D1C0BEAF, 512-byte logical, 8 per physical
        let mut buf = [0u8; 32];
        buf[..8].copy_from_slice(&0x0000_0001_D1C0_BEAFu64.to_be_bytes());
        buf[8..12].copy_from_slice(&512u32.to_be_bytes());
        buf[13] = 0x03;

        let cap = Capacity::parse16(&buf).unwrap();
        assert_eq!(cap.last_lba, 0x1_D1C0_BEAF);
        assert_eq!(cap.blocks(), 0x1_D1C0_BEB0);
        assert_eq!(cap.block_size, 512);
        assert_eq!(cap.physical_block_size(), 4096);
    }

    #[test]
    fn test_parse16_without_exponent_byte() {
        let mut buf = [0u8; 12];
        buf[7] = 0x10;
        buf[8..12].copy_from_slice(&4096u32.to_be_bytes());
        let cap = Capacity::parse16(&buf).unwrap();
        assert_eq!(cap.blocks(), 0x11);
        assert_eq!(cap.block_size, 4096);
        assert_eq!(cap.physical_exponent, 0);
    }

    #[test]
    fn test_to_bytes10_saturates() {
        let cap = Capacity {
            last_lba: 0x1_0000_0000,
            block_size: 512,
            physical_exponent: 0,
        };
        let parsed = Capacity::parse10(&cap.to_bytes10()).unwrap();
        assert!(parsed.is_saturated());
        let parsed = Capacity::parse16(&cap.to_bytes16()).unwrap();
        assert_eq!(parsed, cap);
    }
}
