use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use embedded_hal::spi::SpiBus;
use log::debug;

use super::session::{Diagnostics, Session};
use super::sink::{DebugSink, NoopSink};
use super::transport::Transport;
use crate::config::Config;

/// Default packet buffer capacity
pub const PACKET_BUFFER_SIZE: usize = 64;
/// Smallest packet buffer that still holds a passive target answer
pub const MIN_PACKET_BUFFER: usize = 64;

/// PN532 reader on an SPI bus.
///
/// Owns the bus, the chip select pin, the packet buffer and the inlisted
/// target. Every operation takes `&mut self`, so only one exchange can be in
/// flight.
pub struct Pn532<SPI, CS, D, S = NoopSink, const N: usize = PACKET_BUFFER_SIZE> {
    pub(super) transport: Transport<SPI, CS, D>,
    pub(super) config: Config,
    pub(super) sink: S,
    pub(super) buffer: [u8; N],
    pub(super) session: Session,
    pub(super) diagnostics: Diagnostics,
}

impl<SPI, CS, D> Pn532<SPI, CS, D>
where
    SPI: SpiBus<u8>,
    CS: OutputPin,
    D: DelayNs,
{
    pub fn new(spi: SPI, cs: CS, delay: D, config: Config) -> Self {
        Self::build(spi, cs, delay, config, NoopSink)
    }
}

impl<SPI, CS, D, S> Pn532<SPI, CS, D, S>
where
    SPI: SpiBus<u8>,
    CS: OutputPin,
    D: DelayNs,
    S: DebugSink,
{
    /// Like [`Pn532::new`], tracing every frame through `sink`
    pub fn with_sink(spi: SPI, cs: CS, delay: D, config: Config, sink: S) -> Self {
        Self::build(spi, cs, delay, config, sink)
    }
}

impl<SPI, CS, D, S, const N: usize> Pn532<SPI, CS, D, S, N>
where
    SPI: SpiBus<u8>,
    CS: OutputPin,
    D: DelayNs,
    S: DebugSink,
{
    const CAPACITY_CHECK: () = assert!(
        N >= MIN_PACKET_BUFFER,
        "PN532 packet buffer must hold at least 64 bytes"
    );

    /// Full constructor, also picks the packet buffer capacity.
    pub fn build(spi: SPI, cs: CS, delay: D, config: Config, sink: S) -> Self {
        let () = Self::CAPACITY_CHECK;
        Self {
            transport: Transport::new(spi, cs, delay, config.timing),
            config,
            sink,
            buffer: [0; N],
            session: Session::default(),
            diagnostics: Diagnostics::default(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn diagnostics(&self) -> Diagnostics {
        Diagnostics {
            bus_faults: self.transport.bus_faults(),
            ..self.diagnostics
        }
    }

    pub fn capacity(&self) -> usize {
        N
    }

    /// Wake the chip and resynchronise its SPI state machine.
    ///
    /// Holds chip select for the wake-up delay, then sends a throwaway
    /// firmware query whose outcome is ignored.
    pub fn begin(&mut self) {
        let wakeup = self.config.timing.wakeup_ms;
        self.transport.select();
        self.transport.delay_ms(wakeup);
        self.transport.deselect();

        if let Err(err) = self.probe() {
            debug!("Wake-up probe ignored: {err}");
        }
    }

    /// Give the peripherals back
    pub fn release(self) -> (SPI, CS, D) {
        self.transport.release()
    }
}
