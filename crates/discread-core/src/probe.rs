//! Trial commands
//!
//! Every read and seek variant of the device's transport is tried once at
//! block 0. Failures are expected here and only recorded; nothing in this
//! module returns an error.

use crate::block_size::Geometry;
use crate::capabilities::DeviceCapabilities;
use crate::command::{ReadCommand, SeekCommand};
use crate::device::{Device, TransportKind};
use std::time::Duration;

/// Try every command variant the device's transport defines
///
/// ATA devices get the ten read variants plus CHS and LBA seeks, SCSI and
/// ATAPI devices get READ (6/10/12/16) and SEEK (6/10). Anything else has no
/// command set and yields empty capabilities.
pub fn probe<D: Device + ?Sized>(
    device: &mut D,
    geometry: &Geometry,
    timeout: Duration,
) -> DeviceCapabilities {
    let kind = device.info().kind;
    let (reads, seeks): (&[ReadCommand], &[SeekCommand]) = if kind.speaks_scsi() {
        (&ReadCommand::SCSI[..], &SeekCommand::SCSI[..])
    } else if kind == TransportKind::Ata {
        (&ReadCommand::ATA[..], &SeekCommand::ATA[..])
    } else {
        tracing::debug!("No command set to probe for {} devices", kind);
        (&[], &[])
    };

    let mut working_reads = Vec::new();
    for &command in reads {
        let passed = command
            .execute(device, 0, geometry, 1, timeout)
            .probe_passed(true);
        tracing::debug!("Trying {}: {}", command, outcome(passed));
        if passed {
            working_reads.push(command);
        }
    }

    let mut working_seeks = Vec::new();
    for &command in seeks {
        let passed = command
            .execute(device, 0, geometry, timeout)
            .probe_passed(false);
        tracing::debug!("Trying {}: {}", command, outcome(passed));
        if passed {
            working_seeks.push(command);
        }
    }

    DeviceCapabilities::new(working_reads, working_seeks)
}

fn outcome(passed: bool) -> &'static str {
    if passed {
        "success"
    } else {
        "failed"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ata::{error, AtaCommand, AtaResponse};
    use crate::device::{DeviceInfo, MockDevice};
    use crate::scsi::{ScsiCommand, ScsiResponse, Sense, SenseKey};

    fn geometry() -> Geometry {
        Geometry {
            blocks: 1000,
            logical_block_size: 512,
            physical_block_size: 512,
            long_block_size: 512,
            ..Geometry::default()
        }
    }

    #[test]
    fn test_ata_probe_covers_every_variant() {
        let mut device = MockDevice::new();
        device
            .expect_info()
            .return_const(DeviceInfo::new(TransportKind::Ata));
        // every variant once: ten reads and two seeks
        device.expect_send_ata().times(12).returning(|req, _| {
            assert!(req.count <= 1);
            match req.command {
                AtaCommand::ReadDmaExt => AtaResponse::ok(vec![0; 512], Duration::ZERO),
                AtaCommand::Seek => AtaResponse::ok(Vec::new(), Duration::ZERO),
                _ => AtaResponse::failed(error::ABRT, Duration::ZERO),
            }
        });

        let caps = probe(&mut device, &geometry(), Duration::from_secs(1));
        assert_eq!(caps.reads().collect::<Vec<_>>(), vec![ReadCommand::AtaReadDmaLba48]);
        assert!(caps.supports_seek(SeekCommand::AtaChs));
        assert!(caps.supports_seek(SeekCommand::AtaLba));
    }

    #[test]
    fn test_scsi_probe() {
        let mut device = MockDevice::new();
        device
            .expect_info()
            .return_const(DeviceInfo::new(TransportKind::Atapi));
        device.expect_send_scsi().times(6).returning(|req, _| {
            assert_eq!(req.lba, 0);
            match req.command {
                ScsiCommand::Read10 | ScsiCommand::Read12 => {
                    ScsiResponse::ok(vec![0; 512], Duration::ZERO)
                }
                ScsiCommand::Seek10 => ScsiResponse::ok(Vec::new(), Duration::ZERO),
                _ => ScsiResponse::check_condition(
                    Sense::fixed(SenseKey::IllegalRequest, 0x20, 0x00),
                    Duration::ZERO,
                ),
            }
        });

        let caps = probe(&mut device, &geometry(), Duration::from_secs(1));
        assert_eq!(
            caps.reads().collect::<Vec<_>>(),
            vec![ReadCommand::Read10, ReadCommand::Read12]
        );
        assert_eq!(caps.seeks().collect::<Vec<_>>(), vec![SeekCommand::Seek10]);
    }

    #[test]
    fn test_empty_data_is_a_failed_trial() {
        let mut device = MockDevice::new();
        device
            .expect_info()
            .return_const(DeviceInfo::new(TransportKind::Scsi));
        device
            .expect_send_scsi()
            .returning(|_, _| ScsiResponse::ok(Vec::new(), Duration::ZERO));

        let caps = probe(&mut device, &geometry(), Duration::from_secs(1));
        assert!(caps.is_empty());
        assert!(caps.can_seek());
    }

    #[test]
    fn test_nvme_probes_nothing() {
        let mut device = MockDevice::new();
        device
            .expect_info()
            .return_const(DeviceInfo::new(TransportKind::Nvme));
        device.expect_send_ata().never();
        device.expect_send_scsi().never();

        let caps = probe(&mut device, &geometry(), Duration::from_secs(1));
        assert!(caps.is_empty());
        assert!(!caps.can_seek());
    }
}
