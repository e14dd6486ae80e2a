//! Raw (long) sector negotiation for SCSI devices
//!
//! Block devices are asked with READ LONG at an impossible length first. A
//! drive that answers ILLEGAL REQUEST / INVALID FIELD IN CDB with ILI and a
//! valid INFORMATION field tells us the real length: the field holds the
//! difference between what was asked for and what the sector has. Drives
//! that do not report it are tried against a table of lengths known from
//! floppies and magneto-optical media. Optical drives go straight to their
//! vendor's method.
//!
//! Every candidate is confirmed with a real read before it is kept, and the
//! first one that works wins.

use crate::block_size::Geometry;
use crate::capabilities::RawCapability;
use crate::command::RawCommand;
use crate::device::Device;
use crate::scsi::{ScsiRequest, VendorMethod, VendorRegistry};
use std::time::Duration;

/// Length requested when asking the drive to report the real one
pub const PROBE_LENGTH: u32 = 0xFFFF;

/// Long sector sizes seen in the wild, by logical block size
pub const KNOWN_LONG_SIZES: &[(u32, &[u32])] = &[
    (512, &[514, 536, 558, 600, 610, 630]),
    (1024, &[1026, 1200]),
    (2048, &[2380]),
    (4096, &[4760]),
    (8192, &[9424]),
];

/// SyQuest media with 256-byte sectors use 262-byte long sectors
pub const SYQUEST_SHORT_SIZE: u32 = 256;

/// Long sector size matching [`SYQUEST_SHORT_SIZE`]
pub const SYQUEST_LONG_SIZE: u32 = 262;

const STANDARD_LONG: [RawCommand; 2] = [RawCommand::ReadLong16, RawCommand::ReadLong10];
const SYQUEST_LONG: [RawCommand; 2] = [RawCommand::SyQuestReadLong10, RawCommand::SyQuestReadLong6];

/// Known long sizes for a logical block size
pub fn known_long_sizes(logical_block_size: u32) -> &'static [u32] {
    KNOWN_LONG_SIZES
        .iter()
        .find(|(logical, _)| *logical == logical_block_size)
        .map(|(_, sizes)| *sizes)
        .unwrap_or(&[])
}

/// Find a working raw read path
///
/// Returns `None` when the device has none; that is not an error.
pub fn negotiate<D: Device + ?Sized>(
    device: &mut D,
    geometry: &Geometry,
    registry: &VendorRegistry,
    timeout: Duration,
) -> Option<RawCapability> {
    let info = device.info();
    if !info.kind.speaks_scsi() {
        return None;
    }
    let optical = info.peripheral.is_multimedia();
    let vendor = registry.lookup(&info.manufacturer);

    if optical {
        return match vendor {
            Some(method) if method.is_optical() => try_vendor(device, method, timeout),
            _ => None,
        };
    }

    for command in STANDARD_LONG {
        if let Some(found) = derive_and_validate(device, command, timeout) {
            return Some(found);
        }
    }

    for &size in known_long_sizes(geometry.logical_block_size) {
        for command in STANDARD_LONG {
            if validate(device, command, size, timeout) {
                return Some(RawCapability {
                    command,
                    long_block_size: size,
                });
            }
        }
    }

    match vendor {
        Some(VendorMethod::SyQuestLong) => try_syquest(device, geometry, timeout),
        _ => None,
    }
}

/// Ask the drive for its long sector length
///
/// Sends a long read of [`PROBE_LENGTH`] bytes and decodes the answer. A
/// length of zero is rejected.
pub fn derive_long_size<D: Device + ?Sized>(
    device: &mut D,
    command: RawCommand,
    timeout: Duration,
) -> Option<u32> {
    let request = ScsiRequest::read_long(command.scsi_command(), 0, PROBE_LENGTH);
    let response = device.send_scsi(&request, timeout);
    if !response.check_condition {
        return None;
    }
    let sense = response.decoded_sense()?;
    if !(sense.is_invalid_field_in_cdb() && sense.valid && sense.ili) {
        return None;
    }

    let size = PROBE_LENGTH - (sense.information & 0xFFFF) as u32;
    tracing::debug!("{} reports {} byte long sectors", command, size);
    (size > 0).then_some(size)
}

fn derive_and_validate<D: Device + ?Sized>(
    device: &mut D,
    command: RawCommand,
    timeout: Duration,
) -> Option<RawCapability> {
    let size = derive_long_size(device, command, timeout)?;
    validate(device, command, size, timeout).then_some(RawCapability {
        command,
        long_block_size: size,
    })
}

fn validate<D: Device + ?Sized>(
    device: &mut D,
    command: RawCommand,
    size: u32,
    timeout: Duration,
) -> bool {
    let passed = command
        .execute(device, 0, size, 1, timeout)
        .probe_passed(true);
    tracing::debug!(
        "Trying {} with {} bytes: {}",
        command,
        size,
        if passed { "success" } else { "failed" }
    );
    passed
}

fn try_vendor<D: Device + ?Sized>(
    device: &mut D,
    method: VendorMethod,
    timeout: Duration,
) -> Option<RawCapability> {
    let (command, size) = match method {
        VendorMethod::RawDvd {
            command,
            sector_size,
        } => (command, sector_size),
        VendorMethod::ReadLongFixed { length } => (RawCommand::ReadLong10, length),
        VendorMethod::SyQuestLong => return None,
    };
    validate(device, command, size, timeout).then_some(RawCapability {
        command,
        long_block_size: size,
    })
}

fn try_syquest<D: Device + ?Sized>(
    device: &mut D,
    geometry: &Geometry,
    timeout: Duration,
) -> Option<RawCapability> {
    for command in SYQUEST_LONG {
        if let Some(found) = derive_and_validate(device, command, timeout) {
            return Some(found);
        }
    }
    if geometry.logical_block_size != SYQUEST_SHORT_SIZE {
        return None;
    }
    SYQUEST_LONG
        .into_iter()
        .find(|&command| validate(device, command, SYQUEST_LONG_SIZE, timeout))
        .map(|command| RawCapability {
            command,
            long_block_size: SYQUEST_LONG_SIZE,
        })
}
