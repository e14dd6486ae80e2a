//! Transfer length negotiation
//!
//! Finds the largest block count per command the device and transport
//! accept. The candidate starts at the caller's hint, clamped to what the
//! selected command can carry and to the medium size, and is halved after
//! every failed trial. It never grows, so the loop ends after at most
//! 32 trials: either a trial succeeds or a single-block read fails.

use crate::block_size::Geometry;
use crate::command::{Addressing, ReadCommand};
use crate::device::Device;
use crate::error::{Error, Result};
use std::time::Duration;

/// Default starting candidate
pub const DEFAULT_START_BLOCKS: u32 = 64;

/// Starting candidate for a command and geometry
pub fn initial_candidate(command: ReadCommand, geometry: &Geometry, start: u32) -> u32 {
    let mut candidate = start.clamp(1, command.max_transfer());
    if geometry.blocks > 0 {
        candidate = candidate.min(u32::try_from(geometry.blocks).unwrap_or(u32::MAX));
    }
    candidate
}

/// Negotiate blocks per transfer with trial reads at block 0
///
/// The first trial uses [`initial_candidate`], so on media smaller than
/// `start` the halving sequence begins at the medium's block count rather
/// than at `start`. CHS commands move one sector per command and are not
/// negotiated.
///
/// # Errors
///
/// [`Error::TransferNegotiation`] with the transport's last error when even a
/// single-block read fails.
pub fn negotiate<D: Device + ?Sized>(
    device: &mut D,
    command: ReadCommand,
    geometry: &Geometry,
    start: u32,
    timeout: Duration,
) -> Result<u32> {
    if command.addressing() == Addressing::Chs {
        tracing::debug!("CHS reads move one sector per command");
        return Ok(1);
    }

    let mut candidate = initial_candidate(command, geometry, start);
    loop {
        let passed = command
            .execute(device, 0, geometry, candidate, timeout)
            .probe_passed(true);
        tracing::debug!(
            "Trying to read {} blocks: {}",
            candidate,
            if passed { "success" } else { "failed" }
        );
        if passed {
            return Ok(candidate);
        }
        if candidate <= 1 {
            return Err(Error::TransferNegotiation {
                last_error: device.last_error(),
            });
        }
        candidate /= 2;
    }
}
