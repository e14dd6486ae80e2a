//! The uniform sector reader
//!
//! A [`Reader`] borrows a [`Device`] and walks it through negotiation:
//! geometry and block size, command probing and selection, the optional raw
//! path and finally the transfer length. After that every read goes through
//! the one selected command, whatever the transport.
//!
//! ```no_run
//! use discread_core::{Reader, ReaderConfig, SimulatedDevice, DeviceProfile};
//!
//! let profile = DeviceProfile::load("profiles/usb-stick.toml")?;
//! let mut device = SimulatedDevice::from_profile(&profile)?;
//! let identify = device.identify();
//!
//! let mut reader = Reader::open(&mut device, ReaderConfig::default(), identify.as_deref())?;
//! let sectors = reader.read_blocks(0, reader.blocks_to_read())?;
//! println!("{} bytes in {:?}", sectors.data.len(), sectors.duration);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use crate::ata::{Chs, Identify};
use crate::block_size::{self, Geometry};
use crate::capabilities::{DeviceCapabilities, RawCapability};
use crate::command::{Addressing, RawCommand, ReadCommand, SectorData, SeekCommand};
use crate::config::ReaderConfig;
use crate::device::{Device, DeviceInfo, TransportKind};
use crate::diagnostics::{Diagnostic, DiagnosticSink, TracingSink};
use crate::error::{Error, Failure, ReadError, ReadResult, Result};
use crate::scsi::VendorRegistry;
use crate::selector::CHS_PRIORITY;
use crate::{probe, raw, selector, transfer};
use serde::Serialize;
use std::time::Duration;

/// Seek variants in order of preference
const SEEK_PRIORITY: [SeekCommand; 4] = [
    SeekCommand::AtaLba,
    SeekCommand::AtaChs,
    SeekCommand::Seek10,
    SeekCommand::Seek6,
];

/// Sector reader over a borrowed device
pub struct Reader<'a, D: Device + ?Sized> {
    device: &'a mut D,
    config: ReaderConfig,
    identify: Option<Identify>,
    registry: VendorRegistry,
    sink: Box<dyn DiagnosticSink + 'a>,
    geometry: Option<Geometry>,
    capabilities: DeviceCapabilities,
    command: Option<ReadCommand>,
    raw: Option<RawCapability>,
    blocks_to_read: u32,
}

impl<'a, D: Device + ?Sized> Reader<'a, D> {
    /// Create a reader without negotiating anything yet
    ///
    /// ATA devices need their IDENTIFY DEVICE block; SCSI devices ignore it.
    ///
    /// # Errors
    ///
    /// Invalid configuration, an unsupported transport, or missing or short
    /// IDENTIFY data for an ATA device.
    pub fn new(
        device: &'a mut D,
        config: ReaderConfig,
        identification: Option<&[u8]>,
    ) -> Result<Self> {
        config.validate()?;

        let kind = device.info().kind;
        let identify = match kind {
            TransportKind::Ata => {
                let data = identification.ok_or_else(|| {
                    Error::InvalidIdentify("ATA device without IDENTIFY data".to_string())
                })?;
                Some(Identify::decode(data)?)
            }
            kind if kind.speaks_scsi() => None,
            kind => return Err(Error::UnsupportedTransport(kind)),
        };

        Ok(Self {
            device,
            config,
            identify,
            registry: VendorRegistry::default(),
            sink: Box::new(TracingSink),
            geometry: None,
            capabilities: DeviceCapabilities::default(),
            command: None,
            raw: None,
            blocks_to_read: 1,
        })
    }

    /// Create a reader and run the full negotiation
    pub fn open(
        device: &'a mut D,
        config: ReaderConfig,
        identification: Option<&[u8]>,
    ) -> Result<Self> {
        let mut reader = Self::new(device, config, identification)?;
        reader.negotiate()?;
        Ok(reader)
    }

    /// Send diagnostics to `sink` instead of `tracing`
    pub fn with_sink(mut self, sink: impl DiagnosticSink + 'a) -> Self {
        self.sink = Box::new(sink);
        self
    }

    /// Use a different vendor registry for raw reads
    pub fn with_vendor_registry(mut self, registry: VendorRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Run every negotiation step in order
    pub fn negotiate(&mut self) -> Result<()> {
        self.device_blocks()?;
        self.negotiate_block_size()?;
        self.find_read_command()?;
        self.negotiate_blocks_to_read(self.config.start_blocks)?;
        Ok(())
    }

    fn ensure_geometry(&mut self) -> Result<Geometry> {
        if let Some(geometry) = self.geometry {
            return Ok(geometry);
        }
        let geometry = match &self.identify {
            Some(identify) => Geometry::from_identify(identify),
            None => block_size::read_capacity(&mut *self.device, self.config.timeout)?,
        };
        tracing::debug!(
            "Device has {} blocks of {} bytes ({} physical)",
            geometry.blocks,
            geometry.logical_block_size,
            geometry.physical_block_size
        );
        self.geometry = Some(geometry);
        Ok(geometry)
    }

    /// Total addressable blocks
    ///
    /// Optical drives without a medium report 0.
    pub fn device_blocks(&mut self) -> Result<u64> {
        Ok(self.ensure_geometry()?.blocks)
    }

    /// Logical block size in bytes
    pub fn negotiate_block_size(&mut self) -> Result<u32> {
        Ok(self.ensure_geometry()?.logical_block_size)
    }

    /// Probe the device and select the bulk read command
    ///
    /// With raw reads requested, also looks for a raw path.
    pub fn find_read_command(&mut self) -> Result<ReadCommand> {
        let mut geometry = self.ensure_geometry()?;
        let timeout = self.config.timeout;

        self.capabilities = probe::probe(&mut *self.device, &geometry, timeout);
        let command = selector::select(&self.capabilities, &geometry, self.sink.as_mut())?;
        self.command = Some(command);

        if self.config.raw {
            self.raw = raw::negotiate(&mut *self.device, &geometry, &self.registry, timeout);
            match self.raw {
                Some(found) => {
                    geometry.long_block_size = found.long_block_size;
                    self.geometry = Some(geometry);
                    self.sink.record(Diagnostic::RawReadSelected(found));
                }
                None => tracing::debug!("No raw read path found"),
            }
        }

        Ok(command)
    }

    /// Negotiate blocks per transfer, starting from `start`
    pub fn negotiate_blocks_to_read(&mut self, start: u32) -> Result<u32> {
        let command = match self.command {
            Some(command) => command,
            None => self.find_read_command()?,
        };
        let geometry = self.ensure_geometry()?;
        let blocks = transfer::negotiate(
            &mut *self.device,
            command,
            &geometry,
            start,
            self.config.timeout,
        )?;
        self.blocks_to_read = blocks;
        self.sink
            .record(Diagnostic::TransferNegotiated { blocks });
        Ok(blocks)
    }

    // ==================== Queries ====================

    /// Identity of the device
    pub fn info(&self) -> &DeviceInfo {
        self.device.info()
    }

    /// Decoded IDENTIFY data, for ATA devices
    pub fn identify(&self) -> Option<&Identify> {
        self.identify.as_ref()
    }

    /// Negotiated geometry, once known
    pub fn geometry(&self) -> Option<Geometry> {
        self.geometry
    }

    /// Probe results
    pub fn capabilities(&self) -> &DeviceCapabilities {
        &self.capabilities
    }

    /// Selected bulk read command
    pub fn read_command(&self) -> Option<ReadCommand> {
        self.command
    }

    /// Selected raw read path
    pub fn raw_capability(&self) -> Option<RawCapability> {
        self.raw
    }

    /// Any seek command works
    pub fn can_seek(&self) -> bool {
        self.capabilities.can_seek()
    }

    /// An LBA addressed seek works
    pub fn can_seek_lba(&self) -> bool {
        self.capabilities.can_seek_lba()
    }

    /// A raw read path was found
    pub fn can_read_raw(&self) -> bool {
        self.raw.is_some()
    }

    /// Total addressable blocks, 0 before negotiation
    pub fn blocks(&self) -> u64 {
        self.geometry.map_or(0, |g| g.blocks)
    }

    /// Bytes per logical block
    pub fn logical_block_size(&self) -> u32 {
        self.geometry.map_or(0, |g| g.logical_block_size)
    }

    /// Bytes per physical block
    pub fn physical_block_size(&self) -> u32 {
        self.geometry.map_or(0, |g| g.physical_block_size)
    }

    /// Bytes per raw sector
    pub fn long_block_size(&self) -> u32 {
        self.geometry.map_or(0, |g| g.long_block_size)
    }

    /// Negotiated blocks per transfer
    pub fn blocks_to_read(&self) -> u32 {
        self.blocks_to_read
    }

    /// Bytes each block occupies in read results
    pub fn effective_block_size(&self) -> u32 {
        match self.active_raw() {
            Some(raw) => raw.long_block_size,
            None => self.logical_block_size(),
        }
    }

    /// Serializable view of the negotiated state
    pub fn summary(&self) -> ReaderSummary {
        let info = self.device.info();
        ReaderSummary {
            transport: info.kind,
            manufacturer: info.manufacturer.clone(),
            model: info.model.clone(),
            geometry: self.geometry.unwrap_or_default(),
            capabilities: self.capabilities.clone(),
            read_command: self.command,
            raw: self.raw,
            blocks_to_read: self.blocks_to_read,
            can_seek: self.can_seek(),
            can_seek_lba: self.can_seek_lba(),
        }
    }

    fn active_raw(&self) -> Option<RawCapability> {
        if self.config.raw {
            self.raw
        } else {
            None
        }
    }

    // ==================== Reads ====================

    /// Read one block
    pub fn read_block(&mut self, block: u64) -> ReadResult<SectorData> {
        self.read_blocks(block, 1)
    }

    /// Read `count` blocks starting at `block`
    ///
    /// Uses the raw path when raw reads were requested and found, otherwise
    /// the selected bulk command. Nothing is retried.
    pub fn read_blocks(&mut self, block: u64, count: u32) -> ReadResult<SectorData> {
        let result = self.dispatch_read(block, count);
        self.report(result)
    }

    /// Read the next chunk of [`blocks_to_read`](Self::blocks_to_read) blocks,
    /// shortened at the end of the medium
    pub fn read_chunk(&mut self, block: u64) -> ReadResult<SectorData> {
        let mut count = self.blocks_to_read.max(1);
        let blocks = self.blocks();
        if blocks > block {
            count = count.min(u32::try_from(blocks - block).unwrap_or(u32::MAX));
        }
        self.read_blocks(block, count)
    }

    fn dispatch_read(&mut self, block: u64, count: u32) -> ReadResult<SectorData> {
        if count == 0 {
            return Err(ReadError::immediate(block, Failure::EmptyTransfer));
        }
        if let Some(raw) = self.active_raw() {
            return self.read_raw(raw, block, count);
        }
        let command = self
            .command
            .ok_or_else(|| ReadError::immediate(block, Failure::Unavailable("Reading")))?;
        if count > command.max_transfer() {
            return Err(ReadError::immediate(
                block,
                Failure::TransferTooLarge {
                    requested: count,
                    limit: u64::from(command.max_transfer()),
                },
            ));
        }

        let geometry = self.geometry.unwrap_or_default();
        let timeout = self.config.timeout;
        if command.addressing() != Addressing::Chs {
            return command
                .execute(&mut *self.device, block, &geometry, count, timeout)
                .into_result(block);
        }

        let mut total = SectorData::default();
        for offset in 0..u64::from(count) {
            let current = block + offset;
            let sector = command
                .execute(&mut *self.device, current, &geometry, 1, timeout)
                .into_result(current)?;
            total.append(sector);
        }
        Ok(total)
    }

    fn read_raw(&mut self, raw: RawCapability, block: u64, count: u32) -> ReadResult<SectorData> {
        let timeout = self.config.timeout;
        let command: RawCommand = raw.command;
        if command.is_single_sector() {
            let mut total = SectorData::default();
            for offset in 0..u64::from(count) {
                let current = block + offset;
                let sector = command
                    .execute(&mut *self.device, current, raw.long_block_size, 1, timeout)
                    .into_result(current)?;
                total.append(sector);
            }
            return Ok(total);
        }

        if count > command.max_transfer() {
            return Err(ReadError::immediate(
                block,
                Failure::TransferTooLarge {
                    requested: count,
                    limit: u64::from(command.max_transfer()),
                },
            ));
        }
        command
            .execute(&mut *self.device, block, raw.long_block_size, count, timeout)
            .into_result(block)
    }

    /// Read one sector by cylinder, head and sector (sectors count from 1)
    pub fn read_chs(&mut self, cylinder: u16, head: u8, sector: u8) -> ReadResult<SectorData> {
        let chs = Chs::new(cylinder, head, sector);
        let block = self.chs_block(chs);
        let result = match self.capabilities.first_of(&CHS_PRIORITY) {
            Some(command) => command
                .execute_chs(&mut *self.device, chs, self.config.timeout)
                .into_result(block),
            None => Err(ReadError::immediate(block, Failure::Unavailable("CHS reading"))),
        };
        self.report(result)
    }

    /// Seek to `block`
    pub fn seek(&mut self, block: u64) -> ReadResult<Duration> {
        let geometry = self.geometry.unwrap_or_default();
        let result = match SEEK_PRIORITY
            .into_iter()
            .find(|c| self.capabilities.supports_seek(*c))
        {
            Some(command) => command
                .execute(&mut *self.device, block, &geometry, self.config.timeout)
                .into_seek_result(block),
            None => Err(ReadError::immediate(block, Failure::Unavailable("Seeking"))),
        };
        self.report(result)
    }

    /// Seek by cylinder, head and sector
    pub fn seek_chs(&mut self, cylinder: u16, head: u8, sector: u8) -> ReadResult<Duration> {
        let chs = Chs::new(cylinder, head, sector);
        let block = self.chs_block(chs);
        let result = if self.capabilities.supports_seek(SeekCommand::AtaChs) {
            SeekCommand::AtaChs
                .execute_chs(&mut *self.device, chs, self.config.timeout)
                .into_seek_result(block)
        } else {
            Err(ReadError::immediate(block, Failure::Unavailable("CHS seeking")))
        };
        self.report(result)
    }

    fn chs_block(&self, chs: Chs) -> u64 {
        let geometry = self.geometry.unwrap_or_default();
        chs.to_lba(geometry.heads, geometry.sectors_per_track)
    }

    fn report<T>(&mut self, result: ReadResult<T>) -> ReadResult<T> {
        if let Err(err) = &result {
            self.sink.record(Diagnostic::ReadFailed(err));
        }
        result
    }
}

/// Negotiated reader state, for display and JSON output
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReaderSummary {
    /// Transport family
    pub transport: TransportKind,
    /// Vendor identification
    pub manufacturer: String,
    /// Product identification
    pub model: String,
    /// Geometry and block sizes
    pub geometry: Geometry,
    /// Probe results
    pub capabilities: DeviceCapabilities,
    /// Selected bulk read command
    pub read_command: Option<ReadCommand>,
    /// Selected raw path
    pub raw: Option<RawCapability>,
    /// Blocks per transfer
    pub blocks_to_read: u32,
    /// Any seek works
    pub can_seek: bool,
    /// LBA seek works
    pub can_seek_lba: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ata::{AtaResponse, IDENTIFY_LEN};
    use crate::device::MockDevice;
    use crate::diagnostics::RecordingSink;
    use crate::ata::{error, AtaCommand};
    use crate::scsi::{Capacity, ScsiCommand, ScsiResponse, Sense, SenseKey};

    fn mock(kind: TransportKind) -> MockDevice {
        let mut device = MockDevice::new();
        device.expect_info().return_const(DeviceInfo::new(kind));
        device
    }

    #[test]
    fn test_unsupported_transports() {
        let mut device = mock(TransportKind::Nvme);
        let err = Reader::new(&mut device, ReaderConfig::default(), None).err().unwrap();
        assert!(matches!(err, Error::UnsupportedTransport(TransportKind::Nvme)));

        let mut device = mock(TransportKind::Unknown);
        assert!(Reader::new(&mut device, ReaderConfig::default(), None).is_err());
    }

    #[test]
    fn test_ata_needs_identify() {
        let mut device = mock(TransportKind::Ata);
        let err = Reader::new(&mut device, ReaderConfig::default(), None).err().unwrap();
        assert!(matches!(err, Error::InvalidIdentify(_)));

        let err = Reader::new(&mut device, ReaderConfig::default(), Some(&[0u8; 100]))
            .err()
            .unwrap();
        assert!(matches!(err, Error::InvalidIdentify(_)));

        let identify = vec![0u8; IDENTIFY_LEN];
        assert!(Reader::new(&mut device, ReaderConfig::default(), Some(&identify)).is_ok());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut device = mock(TransportKind::Scsi);
        let config = ReaderConfig::default().start_blocks(0);
        let err = Reader::new(&mut device, config, None).err().unwrap();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn test_empty_transfer_never_reaches_device() {
        let mut device = mock(TransportKind::Scsi);
        device.expect_send_scsi().never();
        let recorder = RecordingSink::new();
        let mut reader = Reader::new(&mut device, ReaderConfig::default(), None)
            .unwrap()
            .with_sink(recorder.clone());

        let err = reader.read_blocks(0, 0).unwrap_err();
        assert_eq!(err.failure, Failure::EmptyTransfer);
        assert_eq!(recorder.events().len(), 1);
    }

    #[test]
    fn test_reads_before_negotiation_are_unavailable() {
        let mut device = mock(TransportKind::Scsi);
        device.expect_send_scsi().never();
        let mut reader = Reader::new(&mut device, ReaderConfig::default(), None).unwrap();

        assert_eq!(
            reader.read_block(0).unwrap_err().failure,
            Failure::Unavailable("Reading")
        );
        assert_eq!(
            reader.seek(0).unwrap_err().failure,
            Failure::Unavailable("Seeking")
        );
        assert_eq!(
            reader.read_chs(0, 0, 1).unwrap_err().failure,
            Failure::Unavailable("CHS reading")
        );
        assert!(!reader.can_seek());
        assert!(!reader.can_read_raw());
        assert_eq!(reader.blocks(), 0);
    }

    #[test]
    fn test_failed_read_is_reported_without_retry() {
        let mut device = mock(TransportKind::Scsi);
        device.expect_send_scsi().returning(|req, _| match req.command {
            ScsiCommand::ReadCapacity10 => {
                let cap = Capacity {
                    last_lba: 99,
                    block_size: 512,
                    physical_exponent: 0,
                };
                ScsiResponse::ok(cap.to_bytes10(), Duration::ZERO)
            }
            ScsiCommand::Read10 if req.lba == 50 => ScsiResponse::check_condition(
                Sense::fixed(SenseKey::MediumError, 0x11, 0x00),
                Duration::ZERO,
            ),
            ScsiCommand::Read10 => {
                ScsiResponse::ok(vec![0; req.expected_length()], Duration::ZERO)
            }
            _ => ScsiResponse::check_condition(
                Sense::fixed(SenseKey::IllegalRequest, 0x20, 0x00),
                Duration::ZERO,
            ),
        });

        let recorder = RecordingSink::new();
        let mut reader = Reader::new(&mut device, ReaderConfig::default(), None)
            .unwrap()
            .with_sink(recorder.clone());
        reader.negotiate().unwrap();
        assert_eq!(reader.read_command(), Some(ReadCommand::Read10));
        assert_eq!(reader.blocks_to_read(), 64);

        let err = reader.read_blocks(50, 1).unwrap_err();
        assert_eq!(err.block, 50);
        assert_eq!(err.failure.sense().unwrap().key, SenseKey::MediumError);

        let events = recorder.events();
        assert_eq!(events[0], "Using SCSI READ (10) command.");
        assert_eq!(events[1], "Reading 64 blocks per command.");
        assert!(events[2].contains("MEDIUM ERROR"));
    }

    #[test]
    fn test_transfer_too_large() {
        let mut device = mock(TransportKind::Ata);
        device.expect_send_ata().returning(|req, _| match req.command {
            AtaCommand::ReadExt | AtaCommand::ReadDmaExt => {
                AtaResponse::failed(error::ABRT, Duration::ZERO)
            }
            _ => AtaResponse::ok(vec![0; req.count as usize * 512], Duration::ZERO),
        });
        let identify = Identify {
            capabilities: 0x0200,
            lba_sectors: 10_000,
            ..Identify::default()
        }
        .to_bytes();

        let mut reader = Reader::open(&mut device, ReaderConfig::default(), Some(&identify)).unwrap();
        assert_eq!(reader.read_command(), Some(ReadCommand::AtaReadDmaRetryLba));
        let err = reader.read_blocks(0, 257).unwrap_err();
        assert_eq!(
            err.failure,
            Failure::TransferTooLarge {
                requested: 257,
                limit: 256
            }
        );
    }
}
