//! Command/response exchange engine.
//!
//! One exchange walks four stages in order:
//!
//! 1. [`Stage::Send`]: frame and write the command
//! 2. [`Stage::AwaitReady`]: poll until the chip has the ACK
//! 3. [`Stage::ReadAck`]: read and compare the six ACK bytes
//! 4. [`Stage::AwaitResponse`]: poll until the response is pending
//!
//! Each wait gets a full timeout of its own: the ACK wait uses the command's
//! ACK budget, the response wait whatever the command allows its peer. The
//! response itself is left in the packet buffer for the command layer to read
//! and parse.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use embedded_hal::spi::SpiBus;
use log::{debug, warn};

use super::device::Pn532;
use super::error::Error;
use super::frame::{self, Header, PN532_TO_HOST};
use super::handshake;
use super::sink::{DebugSink, Direction};
use super::transport::op;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Send,
    AwaitReady,
    ReadAck,
    AwaitResponse,
}

impl<SPI, CS, D, S, const N: usize> Pn532<SPI, CS, D, S, N>
where
    SPI: SpiBus<u8>,
    CS: OutputPin,
    D: DelayNs,
    S: DebugSink,
{
    /// Poll the status byte until the chip is ready or `timeout_ms` ran out
    pub fn wait_ready(&mut self, timeout_ms: u32) -> bool {
        handshake::wait_ready(&mut self.transport, timeout_ms)
    }

    /// Read six bytes and check them against the ACK frame
    pub fn read_ack(&mut self) -> bool {
        handshake::read_ack(&mut self.transport)
    }

    /// Send the first `len` bytes of the packet buffer, wait up to
    /// `ack_timeout_ms` for the ACK and then up to `response_timeout_ms` for
    /// the response to become available.
    pub(super) fn send_command_check_ack(
        &mut self,
        len: usize,
        ack_timeout_ms: u32,
        response_timeout_ms: u32,
    ) -> Result<(), Error> {
        self.write_command(len)?;
        self.await_ready(Stage::AwaitReady, ack_timeout_ms)?;

        self.sink.note(format_args!("{:?}", Stage::ReadAck));
        if !self.read_ack() {
            self.diagnostics.ack_failures = self.diagnostics.ack_failures.wrapping_add(1);
            warn!("No ACK frame for command {:#04x}", self.buffer[0]);
            return Err(Error::NoAck);
        }

        self.await_ready(Stage::AwaitResponse, response_timeout_ms)
    }

    pub(super) fn write_command(&mut self, len: usize) -> Result<(), Error> {
        if len > frame::MAX_PAYLOAD || len > N {
            return Err(Error::PayloadTooLong {
                len,
                max: frame::MAX_PAYLOAD.min(N),
            });
        }
        self.sink.note(format_args!("{:?}", Stage::Send));
        self.sink.frame(Direction::Command, &self.buffer[..len]);

        let settle = self.transport.timing().select_settle_ms;
        self.transport.select();
        self.transport.delay_ms(settle);
        self.transport.write_byte(op::DATA_WRITE);
        for byte in frame::command_bytes(&self.buffer[..len]) {
            self.transport.write_byte(byte);
        }
        self.transport.deselect();
        Ok(())
    }

    pub(super) fn await_ready(&mut self, stage: Stage, timeout_ms: u32) -> Result<(), Error> {
        self.sink.note(format_args!("{stage:?}"));
        if handshake::wait_ready(&mut self.transport, timeout_ms) {
            return Ok(());
        }
        self.diagnostics.timeouts = self.diagnostics.timeouts.wrapping_add(1);
        debug!("PN532 not ready after {timeout_ms} ms ({stage:?})");
        Err(Error::Timeout(stage))
    }

    /// Read up to `len` bytes of the pending response into the packet buffer,
    /// returns how many were read
    pub(super) fn read_response(&mut self, len: usize) -> usize {
        let len = len.min(N);
        handshake::read_data(&mut self.transport, &mut self.buffer[..len]);
        self.sink.frame(Direction::Response, &self.buffer[..len]);
        len
    }
}

/// A read buffer holding a PN532 to host frame answering one command.
///
/// Only the header is verified. The data checksum is not, since fixed size
/// reads routinely stop short of it.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Response<'a> {
    buf: &'a [u8],
    header: Header,
}

impl<'a> Response<'a> {
    pub(crate) fn parse(buf: &'a [u8], command: u8) -> Result<Self, Error> {
        let header = frame::parse_header(buf).ok_or(Error::BadFrame)?;
        let body = header.body();

        let tfi = *buf.get(body).ok_or(Error::BadFrame)?;
        if tfi != PN532_TO_HOST {
            return Err(Error::UnexpectedResponse {
                expected: PN532_TO_HOST,
                found: tfi,
            });
        }
        let code = *buf.get(body + 1).ok_or(Error::BadFrame)?;
        let expected = command.wrapping_add(1);
        if code != expected {
            return Err(Error::UnexpectedResponse { expected, found: code });
        }

        Ok(Self { buf, header })
    }

    /// `LEN` as declared by the frame
    pub(crate) fn declared_len(&self) -> usize {
        usize::from(self.header.len)
    }

    /// Index into the read buffer of the byte `offset` places past the code
    pub(crate) fn position(&self, offset: usize) -> usize {
        self.header.body() + 2 + offset
    }

    pub(crate) fn byte(&self, offset: usize) -> Result<u8, Error> {
        self.buf.get(self.position(offset)).copied().ok_or(Error::BadFrame)
    }

    pub(crate) fn bytes(&self, offset: usize, len: usize) -> Result<&'a [u8], Error> {
        let start = self.position(offset);
        self.buf.get(start..start + len).ok_or(Error::BadFrame)
    }

    /// Whatever the read captured from `offset` on
    pub(crate) fn rest(&self, offset: usize) -> &'a [u8] {
        self.buf.get(self.position(offset)..).unwrap_or(&[])
    }

    /// Status byte right after the code, low six bits are the error
    pub(crate) fn status(&self) -> Result<(), Error> {
        match self.byte(0)? & 0x3F {
            0 => Ok(()),
            code => Err(Error::Status(code)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_checks_direction_and_code() {
        let sam = [0x00, 0x00, 0xFF, 0x02, 0xFE, 0xD5, 0x15, 0x16, 0x00];
        assert!(Response::parse(&sam, 0x14).is_ok());
        assert_eq!(
            Response::parse(&sam, 0x02).unwrap_err(),
            Error::UnexpectedResponse {
                expected: 0x03,
                found: 0x15
            }
        );

        let error_frame = [0x00, 0x00, 0xFF, 0x01, 0xFF, 0x7F, 0x81, 0x00];
        assert_eq!(
            Response::parse(&error_frame, 0x14).unwrap_err(),
            Error::UnexpectedResponse {
                expected: 0xD5,
                found: 0x7F
            }
        );
    }

    #[test]
    fn status_uses_low_six_bits() {
        let ok_with_more = [0x00, 0x00, 0xFF, 0x03, 0xFD, 0xD5, 0x41, 0x40, 0xAA];
        let failed = [0x00, 0x00, 0xFF, 0x03, 0xFD, 0xD5, 0x41, 0x41, 0xA9];

        assert_eq!(Response::parse(&ok_with_more, 0x40).unwrap().status(), Ok(()));
        assert_eq!(
            Response::parse(&failed, 0x40).unwrap().status(),
            Err(Error::Status(0x01))
        );
    }

    #[test]
    fn offsets_follow_the_start_code() {
        let with = [0x00, 0x00, 0xFF, 0x03, 0xFD, 0xD5, 0x41, 0x00, 0xEA, 0x00];
        let response = Response::parse(&with[1..], 0x40).unwrap();

        assert_eq!(response.declared_len(), 3);
        assert_eq!(response.byte(0), Ok(0x00));
        assert_eq!(response.bytes(0, 2), Ok(&[0x00, 0xEA][..]));
        assert_eq!(response.byte(5), Err(Error::BadFrame));
        assert_eq!(response.rest(3), &[] as &[u8]);
    }
}
