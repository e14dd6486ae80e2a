//! Diagnostic events raised while negotiating and reading
//!
//! The reader reports its decisions and failures to a [`DiagnosticSink`]. The
//! default sink forwards to `tracing`; hosts that keep their own logs install
//! a sink of their own.

use crate::capabilities::RawCapability;
use crate::command::ReadCommand;
use crate::error::ReadError;
use std::fmt;
use std::sync::{Arc, Mutex};

/// Something worth telling the host about
#[derive(Debug, Clone, Copy)]
pub enum Diagnostic<'a> {
    /// Bulk read command chosen
    CommandSelected(ReadCommand),
    /// Raw read path chosen
    RawReadSelected(RawCapability),
    /// Blocks per transfer settled
    TransferNegotiated {
        /// Blocks per command
        blocks: u32,
    },
    /// A steady-state read or seek failed
    ReadFailed(&'a ReadError),
}

impl fmt::Display for Diagnostic<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::CommandSelected(command) => write!(f, "Using {} command.", command),
            Diagnostic::RawReadSelected(raw) => write!(
                f,
                "Using {} to read raw sectors of {} bytes.",
                raw.command, raw.long_block_size
            ),
            Diagnostic::TransferNegotiated { blocks } => {
                write!(f, "Reading {} blocks per command.", blocks)
            }
            Diagnostic::ReadFailed(err) => write!(f, "{}", err),
        }
    }
}

/// Receiver for diagnostic events
pub trait DiagnosticSink {
    /// Handle one event
    fn record(&mut self, event: Diagnostic<'_>);
}

/// Forwards events to `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn record(&mut self, event: Diagnostic<'_>) {
        match event {
            Diagnostic::ReadFailed(err) => tracing::warn!("{}", err),
            other => tracing::info!("{}", other),
        }
    }
}

/// Keeps rendered events in memory, shared between clones
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<String>>>,
}

impl RecordingSink {
    /// Create an empty recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// Rendered events so far
    pub fn events(&self) -> Vec<String> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl DiagnosticSink for RecordingSink {
    fn record(&mut self, event: Diagnostic<'_>) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.to_string());
        }
    }
}
