//! Probe results

use crate::command::{RawCommand, ReadCommand, SeekCommand};
use serde::Serialize;
use std::collections::BTreeSet;

/// Commands that passed probing
///
/// Built once by [`probe`](crate::probe::probe) and never changed afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct DeviceCapabilities {
    reads: BTreeSet<ReadCommand>,
    seeks: BTreeSet<SeekCommand>,
}

impl DeviceCapabilities {
    /// Capabilities from the commands that worked
    pub fn new(
        reads: impl IntoIterator<Item = ReadCommand>,
        seeks: impl IntoIterator<Item = SeekCommand>,
    ) -> Self {
        Self {
            reads: reads.into_iter().collect(),
            seeks: seeks.into_iter().collect(),
        }
    }

    /// Whether a read variant works
    pub fn supports(&self, command: ReadCommand) -> bool {
        self.reads.contains(&command)
    }

    /// Whether a seek variant works
    pub fn supports_seek(&self, command: SeekCommand) -> bool {
        self.seeks.contains(&command)
    }

    /// Any seek works
    pub fn can_seek(&self) -> bool {
        !self.seeks.is_empty()
    }

    /// An LBA addressed seek works
    pub fn can_seek_lba(&self) -> bool {
        self.seeks.iter().any(|s| *s != SeekCommand::AtaChs)
    }

    /// No read variant worked
    pub fn is_empty(&self) -> bool {
        self.reads.is_empty()
    }

    /// Working read variants, in probe order
    pub fn reads(&self) -> impl Iterator<Item = ReadCommand> + '_ {
        self.reads.iter().copied()
    }

    /// Working seek variants, in probe order
    pub fn seeks(&self) -> impl Iterator<Item = SeekCommand> + '_ {
        self.seeks.iter().copied()
    }

    /// First supported command of a preference list
    pub fn first_of(&self, preference: &[ReadCommand]) -> Option<ReadCommand> {
        preference.iter().copied().find(|c| self.supports(*c))
    }
}

/// Raw read path kept after negotiation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RawCapability {
    /// Command used for raw reads
    pub command: RawCommand,
    /// Bytes per raw sector
    pub long_block_size: u32,
}
