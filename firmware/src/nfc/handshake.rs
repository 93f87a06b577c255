//! Readiness polling, raw reads and ACK detection.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use embedded_hal::spi::SpiBus;

use super::transport::{op, Transport};

/// What the PN532 sends to acknowledge a well formed command
pub const ACK_FRAME: [u8; 6] = [0x00, 0x00, 0xFF, 0x00, 0xFF, 0x00];

/// Status byte of a chip with a response pending
pub const READY: u8 = 0x01;

/// One status poll.
pub fn is_ready<SPI, CS, D>(t: &mut Transport<SPI, CS, D>) -> bool
where
    SPI: SpiBus<u8>,
    CS: OutputPin,
    D: DelayNs,
{
    let settle = t.timing().select_settle_ms;
    t.select();
    t.delay_ms(settle);
    t.write_byte(op::STATUS_READ);
    let status = t.read_byte();
    t.deselect();
    status == READY
}

/// Polls until ready or until at least `timeout_ms` of delay has elapsed.
///
/// A timeout of `0` waits forever.
pub fn wait_ready<SPI, CS, D>(t: &mut Transport<SPI, CS, D>, timeout_ms: u32) -> bool
where
    SPI: SpiBus<u8>,
    CS: OutputPin,
    D: DelayNs,
{
    let step = t.timing().poll_interval_ms.max(1);
    let mut waited: u32 = 0;
    while !is_ready(t) {
        if timeout_ms != 0 && waited >= timeout_ms {
            return false;
        }
        t.delay_ms(step);
        waited = waited.saturating_add(step);
    }
    true
}

/// Clocks `buf.len()` bytes out of the chip, no validation.
pub fn read_data<SPI, CS, D>(t: &mut Transport<SPI, CS, D>, buf: &mut [u8])
where
    SPI: SpiBus<u8>,
    CS: OutputPin,
    D: DelayNs,
{
    let settle = t.timing().select_settle_ms;
    let byte_delay = t.timing().byte_delay_ms;
    t.select();
    t.delay_ms(settle);
    t.write_byte(op::DATA_READ);
    for slot in buf.iter_mut() {
        t.delay_ms(byte_delay);
        *slot = t.read_byte();
    }
    t.deselect();
}

/// Reads six bytes and compares them with [`ACK_FRAME`].
pub fn read_ack<SPI, CS, D>(t: &mut Transport<SPI, CS, D>) -> bool
where
    SPI: SpiBus<u8>,
    CS: OutputPin,
    D: DelayNs,
{
    let mut ack = [0u8; ACK_FRAME.len()];
    read_data(t, &mut ack);
    ack == ACK_FRAME
}
