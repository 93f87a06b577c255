//! Byte level SPI access.
//!
//! No framing knowledge lives here. Bus failures are counted and logged but
//! never returned: a lost write simply does not reach the chip and a failed
//! read looks like silence (`0x00`), which the handshake layer then reports
//! as a missing ACK or a timeout.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use embedded_hal::spi::SpiBus;
use log::warn;

use crate::config::Timing;

/// Operation byte sent right after chip select
pub mod op {
    pub const DATA_WRITE: u8 = 0x01;
    pub const STATUS_READ: u8 = 0x02;
    pub const DATA_READ: u8 = 0x03;
}

/// SPI bus, chip select pin and delay source of one reader.
pub struct Transport<SPI, CS, D> {
    spi: SPI,
    cs: CS,
    delay: D,
    timing: Timing,
    bus_faults: u32,
}

impl<SPI, CS, D> Transport<SPI, CS, D>
where
    SPI: SpiBus<u8>,
    CS: OutputPin,
    D: DelayNs,
{
    pub fn new(spi: SPI, cs: CS, delay: D, timing: Timing) -> Self {
        Self {
            spi,
            cs,
            delay,
            timing,
            bus_faults: 0,
        }
    }

    pub fn timing(&self) -> &Timing {
        &self.timing
    }

    /// Number of SPI or pin operations that failed so far
    pub fn bus_faults(&self) -> u32 {
        self.bus_faults
    }

    /// Pull chip select low
    pub fn select(&mut self) {
        if let Err(err) = self.cs.set_low() {
            self.fault("chip select", &err);
        }
    }

    /// Finish pending transfers and release chip select
    pub fn deselect(&mut self) {
        if let Err(err) = self.spi.flush() {
            self.fault("flush", &err);
        }
        if let Err(err) = self.cs.set_high() {
            self.fault("chip deselect", &err);
        }
    }

    pub fn delay_ms(&mut self, ms: u32) {
        self.delay.delay_ms(ms);
    }

    pub fn write_byte(&mut self, byte: u8) {
        if let Err(err) = self.spi.write(&[byte]) {
            self.fault("write", &err);
        }
    }

    pub fn read_byte(&mut self) -> u8 {
        let mut word = [0x00];
        match self.spi.transfer_in_place(&mut word) {
            Ok(()) => word[0],
            Err(err) => {
                self.fault("read", &err);
                0x00
            }
        }
    }

    /// Give the peripherals back
    pub fn release(self) -> (SPI, CS, D) {
        (self.spi, self.cs, self.delay)
    }

    fn fault(&mut self, what: &str, err: &impl core::fmt::Debug) {
        self.bus_faults = self.bus_faults.wrapping_add(1);
        warn!("SPI {what} failed: {err:?}");
    }
}


#[cfg(test)]
mod tests {
    use super::mock::{Clock, Pin, ScriptedSpi};
    use super::*;

    fn transport(spi: ScriptedSpi) -> Transport<ScriptedSpi, Pin, Clock> {
        Transport::new(spi, Pin::default(), Clock::default(), Timing::default())
    }

    #[test]
    fn bytes_pass_through_untouched() {
        let mut transport = transport(ScriptedSpi {
            replies: std::vec![0xA5],
            ..Default::default()
        });

        transport.select();
        transport.write_byte(op::DATA_WRITE);
        assert_eq!(transport.read_byte(), 0xA5);
        transport.deselect();

        let (spi, cs, _) = transport.release();
        assert_eq!(spi.written, [op::DATA_WRITE]);
        assert!(!cs.low);
        assert_eq!(cs.toggles, 2);
    }

    #[test]
    fn bus_failures_read_as_silence_and_are_counted() {
        let mut transport = transport(ScriptedSpi {
            failing: true,
            ..Default::default()
        });

        transport.write_byte(0x42);
        assert_eq!(transport.read_byte(), 0x00);
        assert_eq!(transport.bus_faults(), 2);
    }
}
