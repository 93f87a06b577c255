//! NFC module for the PN532 reader.
//!
//! The PN532 is an NFC controller supporting:
//! - ISO14443A/B (MIFARE, DESFire, NTAG)
//! - FeliCa
//!
//! Interface: SPI (mode 0, LSB first, up to 5 MHz) + SS chip select
//!
//! Hardware connection:
//! - SCK / MISO / MOSI -> SPI bus
//! - SS  -> chip select, driven by this driver (active low)
//! - IRQ -> unused, readiness is polled over SPI
//!
//! Every transaction is framed by chip select and starts with an operation
//! byte (data write, status read, data read). Commands are sent as
//! `00 00 FF LEN LCS D4 <payload> DCS 00`, acknowledged with a fixed ACK frame
//! and answered with a `D5` response frame.

pub mod card;
pub mod commands;
mod device;
pub mod error;
pub mod exchange;
pub mod frame;
pub mod handshake;
pub mod session;
pub mod sink;
pub mod transport;

pub use card::{Iso14443aCard, NfcTagType, MAX_UID_LEN};
pub use commands::{BaudRate, FirmwareVersion};
pub use device::{Pn532, MIN_PACKET_BUFFER, PACKET_BUFFER_SIZE};
pub use error::Error;
pub use exchange::Stage;
pub use session::{Diagnostics, Session, Truncation};
pub use sink::{DebugSink, Direction, LogSink, NoopSink};
