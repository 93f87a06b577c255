//! Per-reader state that outlives a single exchange.

/// The currently inlisted peer.
///
/// Written by a successful inlist, cleared by a release, read by every data
/// exchange. A failed inlist leaves it alone.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Session {
    target: Option<u8>,
}

impl Session {
    pub fn target(&self) -> Option<u8> {
        self.target
    }

    pub(crate) fn inlist(&mut self, target: u8) {
        self.target = Some(target);
    }

    pub(crate) fn clear(&mut self) {
        self.target = None;
    }
}

/// A response that did not fit and was cut short.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Truncation {
    /// Bytes the frame claimed to carry
    pub declared: usize,
    /// Bytes handed to the caller
    pub kept: usize,
}

/// Counters for conditions the protocol engine absorbs instead of failing on.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Diagnostics {
    pub truncated_responses: u32,
    pub last_truncation: Option<Truncation>,
    pub ack_failures: u32,
    pub timeouts: u32,
    pub bus_faults: u32,
}

impl Diagnostics {
    pub(crate) fn record_truncation(&mut self, declared: usize, kept: usize) {
        self.truncated_responses = self.truncated_responses.wrapping_add(1);
        self.last_truncation = Some(Truncation { declared, kept });
    }

    pub fn truncated(&self) -> bool {
        self.truncated_responses > 0
    }
}
