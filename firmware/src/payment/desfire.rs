//! Minimal DESFire native command client.
//!
//! Commands go out as `CMD <params>`, answers come back as `STATUS <data>`.
//! Only plain communication mode is spoken here. The authentication
//! cryptography lives behind [`Authenticator`].

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use embedded_hal::spi::SpiBus;
use heapless::Vec;
use log::debug;

use super::error::Error;
use crate::nfc::{self, DebugSink, Pn532};

pub mod cmd {
    pub const SELECT_APPLICATION: u8 = 0x5A;
    pub const AUTHENTICATE_AES: u8 = 0xAA;
    pub const ADDITIONAL_FRAME: u8 = 0xAF;
    pub const GET_VALUE: u8 = 0x6C;
    pub const DEBIT: u8 = 0xDC;
    pub const COMMIT_TRANSACTION: u8 = 0xC7;
    pub const ABORT_TRANSACTION: u8 = 0xA7;
}

pub mod status {
    pub const OPERATION_OK: u8 = 0x00;
    pub const ILLEGAL_COMMAND: u8 = 0x1C;
    pub const PERMISSION_DENIED: u8 = 0x9D;
    pub const APPLICATION_NOT_FOUND: u8 = 0xA0;
    pub const AUTHENTICATION_ERROR: u8 = 0xAE;
    pub const ADDITIONAL_FRAME: u8 = 0xAF;
    pub const BOUNDARY_ERROR: u8 = 0xBE;
    pub const FILE_NOT_FOUND: u8 = 0xF0;
}

/// Largest card answer the client accepts
pub const MAX_RESPONSE: usize = 64;

/// Largest authenticator reply
pub const MAX_AUTH_REPLY: usize = 32;

/// Raw APDU transport to the selected card.
pub trait PeerLink {
    /// Send `command`, copy the answer into `response`, return its length
    fn exchange(&mut self, command: &[u8], response: &mut [u8]) -> Result<usize, nfc::Error>;
}

impl<SPI, CS, D, S, const N: usize> PeerLink for Pn532<SPI, CS, D, S, N>
where
    SPI: SpiBus<u8>,
    CS: OutputPin,
    D: DelayNs,
    S: DebugSink,
{
    fn exchange(&mut self, command: &[u8], response: &mut [u8]) -> Result<usize, nfc::Error> {
        self.in_data_exchange(command, response)
    }
}

/// Three pass mutual authentication, seen from the terminal.
pub trait Authenticator {
    /// Turn the card's encrypted challenge into the terminal's answer.
    /// `None` aborts the authentication.
    fn respond(&mut self, key_no: u8, challenge: &[u8]) -> Option<Vec<u8, MAX_AUTH_REPLY>>;

    /// Verify the card's final proof.
    fn confirm(&mut self, proof: &[u8]) -> bool;
}

pub struct Desfire<'a, L> {
    link: &'a mut L,
    response: [u8; MAX_RESPONSE],
}

impl<'a, L: PeerLink> Desfire<'a, L> {
    pub fn new(link: &'a mut L) -> Self {
        Self {
            link,
            response: [0; MAX_RESPONSE],
        }
    }

    /// Send one native command, return the status byte and the data after it.
    pub fn transceive(&mut self, command: &[u8]) -> Result<(u8, &[u8]), Error> {
        let n = self.link.exchange(command, &mut self.response)?;
        let (&code, data) = self.response[..n]
            .split_first()
            .ok_or(Error::ShortResponse)?;
        debug!("DESFire {:02X?} -> {code:#04x} ({} bytes)", command.first(), data.len());
        Ok((code, data))
    }

    fn expect(&mut self, command: &[u8], expected: u8) -> Result<&[u8], Error> {
        match self.transceive(command)? {
            (code, data) if code == expected => Ok(data),
            (status::AUTHENTICATION_ERROR, _) => Err(Error::Authentication),
            (code, _) => Err(Error::Card(code)),
        }
    }

    /// Select a 24 bit application id, sent least significant byte first
    pub fn select_application(&mut self, aid: u32) -> Result<(), Error> {
        let [a0, a1, a2, _] = aid.to_le_bytes();
        self.expect(&[cmd::SELECT_APPLICATION, a0, a1, a2], status::OPERATION_OK)?;
        Ok(())
    }

    pub fn authenticate<A: Authenticator>(
        &mut self,
        key_no: u8,
        auth: &mut A,
    ) -> Result<(), Error> {
        let challenge =
            self.expect(&[cmd::AUTHENTICATE_AES, key_no], status::ADDITIONAL_FRAME)?;
        let reply = auth.respond(key_no, challenge).ok_or(Error::Authentication)?;

        let mut frame: Vec<u8, { MAX_AUTH_REPLY + 1 }> = Vec::new();
        frame.push(cmd::ADDITIONAL_FRAME).map_err(|_| Error::Authentication)?;
        frame.extend_from_slice(&reply).map_err(|_| Error::Authentication)?;

        let proof = self.expect(&frame, status::OPERATION_OK)?;
        if auth.confirm(proof) {
            Ok(())
        } else {
            Err(Error::Authentication)
        }
    }

    /// Current balance of a value file
    pub fn get_value(&mut self, file_no: u8) -> Result<i32, Error> {
        let data = self.expect(&[cmd::GET_VALUE, file_no], status::OPERATION_OK)?;
        let value: [u8; 4] = data
            .get(..4)
            .and_then(|bytes| bytes.try_into().ok())
            .ok_or(Error::ShortResponse)?;
        Ok(i32::from_le_bytes(value))
    }

    /// Stage a debit, takes effect on [`Desfire::commit`]
    pub fn debit(&mut self, file_no: u8, amount: i32) -> Result<(), Error> {
        let [v0, v1, v2, v3] = amount.to_le_bytes();
        self.expect(&[cmd::DEBIT, file_no, v0, v1, v2, v3], status::OPERATION_OK)?;
        Ok(())
    }

    pub fn commit(&mut self) -> Result<(), Error> {
        self.expect(&[cmd::COMMIT_TRANSACTION], status::OPERATION_OK)?;
        Ok(())
    }

    pub fn abort(&mut self) -> Result<(), Error> {
        self.expect(&[cmd::ABORT_TRANSACTION], status::OPERATION_OK)?;
        Ok(())
    }
}
