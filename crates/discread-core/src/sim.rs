//! Simulated devices
//!
//! [`SimulatedDevice`] implements [`Device`] entirely in memory from a
//! [`DeviceProfile`]. It answers the way real drives do: ATA commands fail
//! with ABRT, IDNF or UNC in the error register, SCSI commands end in CHECK
//! CONDITION with fixed-format sense. Profiles are plain TOML, so the CLI can
//! exercise every negotiation path without hardware.
//!
//! ```toml
//! transport = "scsi"
//! manufacturer = "SYQUEST"
//! model = "EZ135"
//! blocks = 262144
//! block_size = 512
//! long_block_size = 520
//! reads = ["read6", "read10"]
//! bad_blocks = [1000]
//! ```
//!
//! Blocks without backing data hold a pattern: the block number as 8
//! little-endian bytes followed by `offset ^ block`.

use crate::ata::{error, AtaAddress, AtaCommand, AtaRequest, AtaResponse, Identify};
use crate::command::{Addressing, RawCommand, ReadCommand, SeekCommand};
use crate::device::{Device, DeviceInfo, PeripheralType, TransportKind};
use crate::error::{Error, Result};
use crate::scsi::{asc, Capacity, ScsiCommand, ScsiRequest, ScsiResponse, Sense, SenseKey};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// errno reported after a failed command
pub const EIO: i32 = 5;

/// errno reported for commands of the wrong transport
pub const EINVAL: i32 = 22;

const LBA28_MAX_SECTORS: u64 = 0x0FFF_FFFF;
const ECC_FILL: u8 = 0xA5;

/// Which READ CAPACITY variants the simulated drive answers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CapacityMode {
    /// Both (10) and (16)
    #[default]
    Both,
    /// Only READ CAPACITY (10)
    Rc10Only,
    /// Only READ CAPACITY (16)
    Rc16Only,
    /// Neither
    None,
}

/// Description of a simulated device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DeviceProfile {
    /// Transport family
    pub transport: TransportKind,
    /// SCSI peripheral type
    pub peripheral: PeripheralType,
    /// Vendor identification
    pub manufacturer: String,
    /// Product identification
    pub model: String,
    /// Addressable blocks (LBA devices)
    pub blocks: u64,
    /// Logical block size in bytes
    pub block_size: u32,
    /// Logical blocks per physical block, as a power of two
    pub physical_exponent: u8,
    /// Raw sector size, if the drive has one
    pub long_block_size: Option<u32>,
    /// Report the length difference when READ LONG asks for the wrong size
    pub long_info: bool,
    /// READ CAPACITY variants answered
    pub capacity: CapacityMode,
    /// A medium is loaded
    pub medium: bool,
    /// Working read commands, every one the transport has when unset
    pub reads: Option<Vec<ReadCommand>>,
    /// Working seek commands, every one the transport has when unset
    pub seeks: Option<Vec<SeekCommand>>,
    /// Working raw commands, READ LONG (10) and (16) when unset and a long size is set
    pub raw: Option<Vec<RawCommand>>,
    /// Largest transfer the drive accepts, in blocks
    pub max_transfer: Option<u32>,
    /// Blocks that fail with an unrecoverable read error
    pub bad_blocks: Vec<u64>,
    /// Image file backing the medium, relative to the profile file
    pub image: Option<PathBuf>,
    /// ATA cylinders
    pub cylinders: u16,
    /// ATA heads
    pub heads: u8,
    /// ATA sectors per track
    pub sectors_per_track: u8,
    /// ATA LBA support
    pub lba: bool,
    /// ATA 48-bit address support
    pub lba48: bool,
    /// Time every command takes, in microseconds
    pub latency_us: u64,
}

impl Default for DeviceProfile {
    fn default() -> Self {
        Self {
            transport: TransportKind::Scsi,
            peripheral: PeripheralType::DirectAccess,
            manufacturer: "DISCREAD".to_string(),
            model: "SIMULATED DISK".to_string(),
            blocks: 2048,
            block_size: 512,
            physical_exponent: 0,
            long_block_size: None,
            long_info: true,
            capacity: CapacityMode::Both,
            medium: true,
            reads: None,
            seeks: None,
            raw: None,
            max_transfer: None,
            bad_blocks: Vec::new(),
            image: None,
            cylinders: 0,
            heads: 0,
            sectors_per_track: 0,
            lba: true,
            lba48: false,
            latency_us: 0,
        }
    }
}

impl DeviceProfile {
    /// SCSI direct-access disk
    pub fn scsi(blocks: u64, block_size: u32) -> Self {
        Self {
            blocks,
            block_size,
            ..Self::default()
        }
    }

    /// ATA disk with 512-byte sectors in LBA mode
    pub fn ata(blocks: u64) -> Self {
        Self {
            transport: TransportKind::Ata,
            model: "SIMULATED ATA DISK".to_string(),
            blocks,
            lba48: blocks > LBA28_MAX_SECTORS,
            ..Self::default()
        }
    }

    /// ATA disk that only understands CHS addressing
    pub fn ata_chs(cylinders: u16, heads: u8, sectors_per_track: u8) -> Self {
        Self {
            transport: TransportKind::Ata,
            model: "SIMULATED CHS DISK".to_string(),
            blocks: u64::from(cylinders) * u64::from(heads) * u64::from(sectors_per_track),
            cylinders,
            heads,
            sectors_per_track,
            lba: false,
            ..Self::default()
        }
    }

    /// CD/DVD drive from the given vendor with a 2048-byte medium loaded
    pub fn optical(manufacturer: &str, blocks: u64) -> Self {
        Self {
            transport: TransportKind::Atapi,
            peripheral: PeripheralType::MultiMedia,
            manufacturer: manufacturer.to_string(),
            model: "SIMULATED DVD".to_string(),
            blocks,
            block_size: 2048,
            ..Self::default()
        }
    }

    /// Parse a profile from TOML
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let profile: Self =
            toml::from_str(contents).map_err(|e| Error::InvalidProfile(e.to_string()))?;
        profile.validate()?;
        Ok(profile)
    }

    /// Load a profile file; a relative `image` is resolved against its directory
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let mut profile = Self::from_toml_str(&contents).map_err(|e| match e {
            Error::InvalidProfile(msg) => {
                Error::InvalidProfile(format!("{}: {}", path.display(), msg))
            }
            other => other,
        })?;

        if let (Some(image), Some(dir)) = (&profile.image, path.parent()) {
            if image.is_relative() {
                profile.image = Some(dir.join(image));
            }
        }
        tracing::debug!("Loaded device profile from {:?}", path);
        Ok(profile)
    }

    /// Reject profiles no drive could have
    pub fn validate(&self) -> Result<()> {
        if self.block_size == 0 {
            return Err(Error::InvalidProfile("block_size must be non-zero".to_string()));
        }
        if self.long_block_size == Some(0) {
            return Err(Error::InvalidProfile(
                "long_block_size must be non-zero".to_string(),
            ));
        }
        if self.transport == TransportKind::Ata {
            if !self.lba && !self.lba48 && self.chs_blocks() == 0 {
                return Err(Error::InvalidProfile(
                    "ATA profile needs LBA support or a CHS geometry".to_string(),
                ));
            }
        } else if self.transport.speaks_scsi() && self.medium && self.blocks == 0 {
            return Err(Error::InvalidProfile(
                "a loaded medium needs at least one block".to_string(),
            ));
        }
        Ok(())
    }

    fn chs_blocks(&self) -> u64 {
        u64::from(self.cylinders) * u64::from(self.heads) * u64::from(self.sectors_per_track)
    }

    /// Blocks the drive actually holds
    pub fn total_blocks(&self) -> u64 {
        if self.transport == TransportKind::Ata && !self.lba && !self.lba48 {
            self.chs_blocks()
        } else {
            self.blocks
        }
    }

    /// IDENTIFY DEVICE data for ATA profiles
    pub fn identify(&self) -> Option<Identify> {
        if self.transport != TransportKind::Ata {
            return None;
        }
        let mut identify = Identify {
            cylinders: self.cylinders,
            heads: u16::from(self.heads),
            sectors_per_track: u16::from(self.sectors_per_track),
            current_cylinders: self.cylinders,
            current_heads: u16::from(self.heads),
            current_sectors_per_track: u16::from(self.sectors_per_track),
            model: self.model.clone(),
            serial: "SIM0001".to_string(),
            firmware: "1.0".to_string(),
            ..Identify::default()
        };

        if self.lba || self.lba48 {
            identify.capabilities |= 0x0200;
            identify.lba_sectors = self.blocks.min(LBA28_MAX_SECTORS) as u32;
        }
        if self.lba48 {
            identify.command_set2 = 0x4000 | 0x0400;
            identify.lba48_sectors = self.blocks;
        }

        let mut sector_size = 0;
        if self.block_size != 512 {
            sector_size |= 0x1000;
            identify.logical_sector_words = self.block_size / 2;
        }
        if self.physical_exponent > 0 {
            sector_size |= 0x2000 | u16::from(self.physical_exponent & 0x0F);
        }
        if sector_size != 0 {
            identify.phys_log_sector_size = 0x4000 | sector_size;
        }
        Some(identify)
    }

    fn read_commands(&self) -> Vec<ReadCommand> {
        if let Some(reads) = &self.reads {
            return reads.clone();
        }
        match self.transport {
            TransportKind::Ata => ReadCommand::ATA
                .into_iter()
                .filter(|command| match command.addressing() {
                    Addressing::Chs => self.chs_blocks() > 0,
                    Addressing::Lba28 => self.lba,
                    Addressing::Lba48 => self.lba48,
                    Addressing::Scsi => false,
                })
                .collect(),
            kind if kind.speaks_scsi() => ReadCommand::SCSI.to_vec(),
            _ => Vec::new(),
        }
    }

    fn seek_commands(&self) -> Vec<SeekCommand> {
        if let Some(seeks) = &self.seeks {
            return seeks.clone();
        }
        match self.transport {
            TransportKind::Ata => SeekCommand::ATA
                .into_iter()
                .filter(|command| match command {
                    SeekCommand::AtaChs => self.chs_blocks() > 0,
                    _ => self.lba,
                })
                .collect(),
            kind if kind.speaks_scsi() => SeekCommand::SCSI.to_vec(),
            _ => Vec::new(),
        }
    }

    fn raw_commands(&self) -> Vec<RawCommand> {
        match (&self.raw, self.long_block_size) {
            (Some(raw), _) => raw.clone(),
            (None, Some(_)) => vec![RawCommand::ReadLong10, RawCommand::ReadLong16],
            (None, None) => Vec::new(),
        }
    }
}

/// A request the simulated device received
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Issued {
    /// ATA command
    Ata(AtaRequest),
    /// SCSI command
    Scsi(ScsiRequest),
}

/// In-memory [`Device`] driven by a [`DeviceProfile`]
#[derive(Debug, Clone)]
pub struct SimulatedDevice {
    profile: DeviceProfile,
    info: DeviceInfo,
    reads: Vec<ReadCommand>,
    seeks: Vec<SeekCommand>,
    raw: Vec<RawCommand>,
    data: Option<Vec<u8>>,
    issued: Vec<Issued>,
    record: bool,
    last_error: i32,
}

impl SimulatedDevice {
    /// Build a device, loading the backing image if the profile names one
    pub fn from_profile(profile: &DeviceProfile) -> Result<Self> {
        profile.validate()?;
        let data = match &profile.image {
            Some(path) => Some(std::fs::read(path)?),
            None => None,
        };

        let info = DeviceInfo::new(profile.transport)
            .with_peripheral(profile.peripheral)
            .with_manufacturer(profile.manufacturer.as_str())
            .with_model(profile.model.as_str());

        Ok(Self {
            info,
            reads: profile.read_commands(),
            seeks: profile.seek_commands(),
            raw: profile.raw_commands(),
            profile: profile.clone(),
            data,
            issued: Vec::new(),
            record: true,
            last_error: 0,
        })
    }

    /// Replace the medium contents
    pub fn with_data(mut self, data: Vec<u8>) -> Self {
        self.data = Some(data);
        self
    }

    /// Profile the device was built from
    pub fn profile(&self) -> &DeviceProfile {
        &self.profile
    }

    /// Raw IDENTIFY DEVICE block, for ATA devices
    pub fn identify(&self) -> Option<Vec<u8>> {
        self.profile.identify().map(|identify| identify.to_bytes())
    }

    /// Stop keeping the request log, for long running loops
    pub fn without_history(mut self) -> Self {
        self.record = false;
        self.issued.clear();
        self
    }

    /// Every request received so far, oldest first
    pub fn issued(&self) -> &[Issued] {
        &self.issued
    }

    /// Forget the request log
    pub fn clear_issued(&mut self) {
        self.issued.clear();
    }

    /// Contents of one logical block
    pub fn block_contents(&self, block: u64) -> Vec<u8> {
        let size = self.profile.block_size as usize;
        let Some(data) = &self.data else {
            return pattern_block(block, size);
        };

        let mut out = vec![0u8; size];
        let start = usize::try_from(block)
            .ok()
            .and_then(|b| b.checked_mul(size));
        if let Some(chunk) = start.and_then(|s| data.get(s..)) {
            let n = chunk.len().min(size);
            out[..n].copy_from_slice(&chunk[..n]);
        }
        out
    }

    /// Contents of one raw sector: the logical data followed by check bytes
    pub fn long_contents(&self, block: u64, long_size: u32) -> Vec<u8> {
        let logical = self.profile.block_size as usize;
        let mut out = self.block_contents(block);
        out.resize(long_size as usize, 0);
        for (i, byte) in out.iter_mut().enumerate().skip(logical) {
            *byte = ECC_FILL ^ (i as u8);
        }
        out
    }

    fn latency(&self) -> Duration {
        Duration::from_micros(self.profile.latency_us)
    }

    fn first_bad(&self, block: u64, count: u64) -> Option<u64> {
        let end = block.saturating_add(count);
        self.profile
            .bad_blocks
            .iter()
            .copied()
            .filter(|b| (block..end).contains(b))
            .min()
    }

    fn exceeds_max_transfer(&self, count: u32) -> bool {
        self.profile.max_transfer.is_some_and(|max| count > max)
    }

    fn gather(&self, block: u64, count: u32, sector: impl Fn(&Self, u64) -> Vec<u8>) -> Vec<u8> {
        (block..block + u64::from(count))
            .flat_map(|b| sector(self, b))
            .collect()
    }

    // ==================== ATA ====================

    fn ata_ok(&mut self, data: Vec<u8>) -> AtaResponse {
        self.last_error = 0;
        AtaResponse::ok(data, self.latency())
    }

    fn ata_fail(&mut self, error: u8) -> AtaResponse {
        self.last_error = EIO;
        AtaResponse::failed(error, self.latency())
    }

    fn ata_block(&self, address: AtaAddress) -> Option<u64> {
        match address {
            AtaAddress::Chs(chs) => {
                let p = &self.profile;
                let valid = chs.sector >= 1
                    && chs.sector <= p.sectors_per_track
                    && chs.head < p.heads
                    && chs.cylinder < p.cylinders;
                valid.then(|| chs.to_lba(p.heads, p.sectors_per_track))
            }
            AtaAddress::Lba28(lba) => Some(u64::from(lba)),
            AtaAddress::Lba48(lba) => Some(lba),
        }
    }

    fn ata_seek(&mut self, request: &AtaRequest) -> AtaResponse {
        let variant = match request.address {
            AtaAddress::Chs(_) => Some(SeekCommand::AtaChs),
            AtaAddress::Lba28(_) => Some(SeekCommand::AtaLba),
            AtaAddress::Lba48(_) => None,
        };
        if !variant.is_some_and(|v| self.seeks.contains(&v)) {
            return self.ata_fail(error::ABRT);
        }
        match self.ata_block(request.address) {
            Some(block) if block < self.profile.total_blocks() => self.ata_ok(Vec::new()),
            _ => self.ata_fail(error::IDNF),
        }
    }

    fn ata_read(&mut self, request: &AtaRequest) -> AtaResponse {
        let addressing = match request.address {
            AtaAddress::Chs(_) => Addressing::Chs,
            AtaAddress::Lba28(_) => Addressing::Lba28,
            AtaAddress::Lba48(_) => Addressing::Lba48,
        };
        let variant = ReadCommand::ATA.into_iter().find(|c| {
            c.ata_command() == Some(request.command) && c.addressing() == addressing
        });
        let Some(variant) = variant.filter(|v| self.reads.contains(v)) else {
            return self.ata_fail(error::ABRT);
        };
        if request.count == 0
            || request.count > variant.max_transfer()
            || self.exceeds_max_transfer(request.count)
        {
            return self.ata_fail(error::ABRT);
        }

        let count = u64::from(request.count);
        let block = match self.ata_block(request.address) {
            Some(block) if block.saturating_add(count) <= self.profile.total_blocks() => block,
            _ => return self.ata_fail(error::IDNF),
        };
        if self.first_bad(block, count).is_some() {
            return self.ata_fail(error::UNC);
        }

        let data = self.gather(block, request.count, Self::block_contents);
        self.ata_ok(data)
    }

    // ==================== SCSI ====================

    fn scsi_ok(&mut self, data: Vec<u8>) -> ScsiResponse {
        self.last_error = 0;
        ScsiResponse::ok(data, self.latency())
    }

    fn scsi_fail(&mut self, sense: Vec<u8>) -> ScsiResponse {
        self.last_error = EIO;
        ScsiResponse::check_condition(sense, self.latency())
    }

    fn illegal(&mut self, code: u8) -> ScsiResponse {
        self.scsi_fail(Sense::fixed(SenseKey::IllegalRequest, code, 0x00))
    }

    fn not_ready(&mut self) -> ScsiResponse {
        self.scsi_fail(Sense::fixed(
            SenseKey::NotReady,
            asc::MEDIUM_NOT_PRESENT,
            0x00,
        ))
    }

    fn medium_error(&mut self, block: u64) -> ScsiResponse {
        let information = u32::try_from(block).unwrap_or(u32::MAX);
        self.scsi_fail(Sense::fixed_with_information(
            SenseKey::MediumError,
            asc::UNRECOVERED_READ_ERROR,
            0x00,
            information,
            false,
        ))
    }

    fn read_capacity(&mut self, command: ScsiCommand) -> ScsiResponse {
        if !self.profile.medium {
            return self.not_ready();
        }
        let answers = match self.profile.capacity {
            CapacityMode::Both => true,
            CapacityMode::Rc10Only => command == ScsiCommand::ReadCapacity10,
            CapacityMode::Rc16Only => command == ScsiCommand::ReadCapacity16,
            CapacityMode::None => false,
        };
        if !answers {
            return self.illegal(asc::INVALID_COMMAND);
        }

        let capacity = Capacity {
            last_lba: self.profile.blocks.saturating_sub(1),
            block_size: self.profile.block_size,
            physical_exponent: self.profile.physical_exponent,
        };
        let data = if command == ScsiCommand::ReadCapacity16 {
            capacity.to_bytes16()
        } else {
            capacity.to_bytes10()
        };
        self.scsi_ok(data)
    }

    fn scsi_seek(&mut self, request: &ScsiRequest) -> ScsiResponse {
        let variant = if request.command == ScsiCommand::Seek6 {
            SeekCommand::Seek6
        } else {
            SeekCommand::Seek10
        };
        if !self.seeks.contains(&variant) {
            return self.illegal(asc::INVALID_COMMAND);
        }
        if !self.profile.medium {
            return self.not_ready();
        }
        if request.lba >= self.profile.blocks {
            return self.illegal(asc::LBA_OUT_OF_RANGE);
        }
        self.scsi_ok(Vec::new())
    }

    fn scsi_read(&mut self, request: &ScsiRequest) -> ScsiResponse {
        let supported = ReadCommand::SCSI
            .into_iter()
            .find(|c| c.scsi_command() == Some(request.command))
            .is_some_and(|c| self.reads.contains(&c));
        if !supported {
            return self.illegal(asc::INVALID_COMMAND);
        }
        if !self.profile.medium {
            return self.not_ready();
        }
        if self.exceeds_max_transfer(request.count) {
            return self.illegal(asc::INVALID_FIELD_IN_CDB);
        }

        let count = u64::from(request.count);
        if request.lba.saturating_add(count) > self.profile.blocks {
            return self.illegal(asc::LBA_OUT_OF_RANGE);
        }
        if let Some(bad) = self.first_bad(request.lba, count) {
            return self.medium_error(bad);
        }

        let data = self.gather(request.lba, request.count, Self::block_contents);
        self.scsi_ok(data)
    }

    fn scsi_raw(&mut self, request: &ScsiRequest) -> ScsiResponse {
        let command = RawCommand::ALL
            .into_iter()
            .find(|c| c.scsi_command() == request.command)
            .filter(|c| self.raw.contains(c));
        let (Some(command), Some(long)) = (command, self.profile.long_block_size) else {
            return self.illegal(asc::INVALID_COMMAND);
        };
        if !self.profile.medium {
            return self.not_ready();
        }

        if request.block_size != long {
            if command.is_single_sector() && self.profile.long_info {
                let difference = request.block_size.wrapping_sub(long);
                return self.scsi_fail(Sense::fixed_with_information(
                    SenseKey::IllegalRequest,
                    asc::INVALID_FIELD_IN_CDB,
                    0x00,
                    difference,
                    true,
                ));
            }
            return self.illegal(asc::INVALID_FIELD_IN_CDB);
        }

        let count = if command.is_single_sector() {
            1
        } else {
            request.count
        };
        if count == 0 || count > command.max_transfer() || self.exceeds_max_transfer(count) {
            return self.illegal(asc::INVALID_FIELD_IN_CDB);
        }
        if request.lba.saturating_add(u64::from(count)) > self.profile.blocks {
            return self.illegal(asc::LBA_OUT_OF_RANGE);
        }
        if let Some(bad) = self.first_bad(request.lba, u64::from(count)) {
            return self.medium_error(bad);
        }

        let data = self.gather(request.lba, count, |dev, b| dev.long_contents(b, long));
        self.scsi_ok(data)
    }
}

impl Device for SimulatedDevice {
    fn info(&self) -> &DeviceInfo {
        &self.info
    }

    fn send_ata(&mut self, request: &AtaRequest, _timeout: Duration) -> AtaResponse {
        if self.record {
            self.issued.push(Issued::Ata(*request));
        }
        if self.profile.transport != TransportKind::Ata {
            self.last_error = EINVAL;
            return AtaResponse::os_failure(EINVAL);
        }
        match request.command {
            AtaCommand::Seek => self.ata_seek(request),
            _ => self.ata_read(request),
        }
    }

    fn send_scsi(&mut self, request: &ScsiRequest, _timeout: Duration) -> ScsiResponse {
        if self.record {
            self.issued.push(Issued::Scsi(*request));
        }
        if !self.profile.transport.speaks_scsi() {
            self.last_error = EINVAL;
            return ScsiResponse::os_failure(EINVAL);
        }
        match request.command {
            ScsiCommand::ReadCapacity10 | ScsiCommand::ReadCapacity16 => {
                self.read_capacity(request.command)
            }
            ScsiCommand::Seek6 | ScsiCommand::Seek10 => self.scsi_seek(request),
            ScsiCommand::Read6 | ScsiCommand::Read10 | ScsiCommand::Read12 | ScsiCommand::Read16 => {
                self.scsi_read(request)
            }
            _ => self.scsi_raw(request),
        }
    }

    fn last_error(&self) -> i32 {
        self.last_error
    }
}

/// Pattern stored in a block with no backing data
pub fn pattern_block(block: u64, size: usize) -> Vec<u8> {
    let mut out: Vec<u8> = (0..size).map(|i| (i as u8) ^ (block as u8)).collect();
    let header = block.to_le_bytes();
    let n = header.len().min(size);
    out[..n].copy_from_slice(&header[..n]);
    out
}
