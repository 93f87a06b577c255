use thiserror::Error;

use super::exchange::Stage;

/// PN532 errors
///
/// None of these is fatal: the caller decides whether to retry, drop the
/// session or re-initialise the reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Error {
    /// The chip never reported ready within the stage's budget
    #[error("PN532 not ready during {0:?}")]
    Timeout(Stage),
    /// The six bytes after a command were not the ACK frame
    #[error("no ACK frame received")]
    NoAck,
    /// Missing start code, bad length checksum or a frame shorter than declared
    #[error("malformed response frame")]
    BadFrame,
    #[error("unexpected response byte {found:#04x}, expected {expected:#04x}")]
    UnexpectedResponse { expected: u8, found: u8 },
    /// Error code from the low six bits of the response status byte
    #[error("PN532 reported error status {0:#04x}")]
    Status(u8),
    /// A chip answered, but not with the PN532 firmware signature
    #[error("firmware signature mismatch")]
    UnexpectedFirmware,
    /// Anything but exactly one target in the field
    #[error("expected one target, found {0}")]
    NoTarget(u8),
    #[error("no target inlisted")]
    NotInlisted,
    #[error("payload of {len} bytes exceeds {max}")]
    PayloadTooLong { len: usize, max: usize },
    #[error("buffer of {capacity} bytes cannot hold {needed}")]
    BufferTooSmall { needed: usize, capacity: usize },
}
