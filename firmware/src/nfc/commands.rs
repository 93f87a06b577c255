use core::fmt;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use embedded_hal::spi::SpiBus;
use heapless::Vec;
use log::{debug, info, warn};

use super::card::{Iso14443aCard, MAX_UID_LEN};
use super::device::Pn532;
use super::error::Error;
use super::exchange::Response;
use super::frame::{self, FRAME_OVERHEAD};
use super::sink::DebugSink;
use crate::config::Config;

pub const GET_FIRMWARE_VERSION: u8 = 0x02;
pub const SAM_CONFIGURATION: u8 = 0x14;
pub const RF_CONFIGURATION: u8 = 0x32;
pub const IN_DATA_EXCHANGE: u8 = 0x40;
pub const IN_LIST_PASSIVE_TARGET: u8 = 0x4A;
pub const IN_RELEASE: u8 = 0x52;

/// First six bytes of a firmware version answer, counted from the start code
pub const FIRMWARE_SIGNATURE: [u8; 6] = [0x00, 0xFF, 0x06, 0xFA, 0xD5, 0x03];

/// SAM configuration answer code
const SAM_CONFIGURATION_OK: u8 = SAM_CONFIGURATION + 1;

/// RFConfiguration item 5: MxRtyATR, MxRtyPSL, MxRtyPassiveActivation
const CFG_MAX_RETRIES: u8 = 0x05;

/// Bytes counted by `LEN` of an InDataExchange answer ahead of the data:
/// frame identifier, answer code and status
const EXCHANGE_HEADER: usize = 3;

/// Modulation for passive target discovery
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaudRate {
    /// 106 kbps type A (ISO/IEC14443 Type A)
    Iso14443a = 0x00,
    /// 212 kbps (FeliCa polling)
    Felica212 = 0x01,
    /// 424 kbps (FeliCa polling)
    Felica424 = 0x02,
    /// 106 kbps type B (ISO/IEC14443-3B)
    Iso14443b = 0x03,
    /// 106 kbps Innovision Jewel tag
    Jewel = 0x04,
}

/// Decoded GetFirmwareVersion answer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FirmwareVersion {
    /// 0x32 for a PN532
    pub ic: u8,
    pub version: u8,
    pub revision: u8,
    /// Bit field: ISO18092, ISO/IEC14443 type B, ISO/IEC14443 type A
    pub support: u8,
}

impl From<u32> for FirmwareVersion {
    fn from(raw: u32) -> Self {
        let [ic, version, revision, support] = raw.to_be_bytes();
        Self {
            ic,
            version,
            revision,
            support,
        }
    }
}

impl fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PN5{:02X} firmware {}.{} (support {:#04x})",
            self.ic, self.version, self.revision, self.support
        )
    }
}

impl<SPI, CS, D, S, const N: usize> Pn532<SPI, CS, D, S, N>
where
    SPI: SpiBus<u8>,
    CS: OutputPin,
    D: DelayNs,
    S: DebugSink,
{
    /// Firmware query whose answer is never read
    pub(super) fn probe(&mut self) -> Result<(), Error> {
        self.buffer[0] = GET_FIRMWARE_VERSION;
        let timeout = self.config.ack_timeout_ms;
        self.send_command_check_ack(1, timeout, timeout)
    }

    /// IC, version, revision and support bytes as one big-endian word.
    ///
    /// A chip that answers without the PN532 signature yields
    /// [`Error::UnexpectedFirmware`], distinct from the timeout of an absent
    /// chip.
    pub fn firmware_version(&mut self) -> Result<u32, Error> {
        self.probe()?;
        let n = self.read_response(FRAME_OVERHEAD + 5);

        let buf = &self.buffer[..n];
        let version = frame::align(buf)
            .and_then(|start| buf.get(start..start + FIRMWARE_SIGNATURE.len() + 4))
            .filter(|answer| answer.starts_with(&FIRMWARE_SIGNATURE))
            .map(|answer| &answer[FIRMWARE_SIGNATURE.len()..])
            .ok_or(Error::UnexpectedFirmware)?;

        Ok(u32::from_be_bytes([version[0], version[1], version[2], version[3]]))
    }

    pub fn firmware_info(&mut self) -> Result<FirmwareVersion, Error> {
        self.firmware_version().map(FirmwareVersion::from)
    }

    /// Normal mode, virtual card timeout 20 x 50 ms, IRQ pin driven.
    pub fn sam_config(&mut self) -> Result<(), Error> {
        self.buffer[..4].copy_from_slice(&[SAM_CONFIGURATION, 0x01, 0x14, 0x01]);
        let timeout = self.config.ack_timeout_ms;
        self.send_command_check_ack(4, timeout, timeout)?;
        let n = self.read_response(FRAME_OVERHEAD + 1);

        let buf = &self.buffer[..n];
        let start = frame::align(buf).ok_or(Error::BadFrame)?;
        match buf.get(start + 5) {
            Some(&SAM_CONFIGURATION_OK) => Ok(()),
            Some(&found) => Err(Error::UnexpectedResponse {
                expected: SAM_CONFIGURATION_OK,
                found,
            }),
            None => Err(Error::BadFrame),
        }
    }

    /// Number of passive activation attempts before InListPassiveTarget
    /// gives up, `0xFF` retries forever.
    pub fn set_passive_activation_retries(&mut self, max_retries: u8) -> Result<(), Error> {
        self.buffer[..5].copy_from_slice(&[
            RF_CONFIGURATION,
            CFG_MAX_RETRIES,
            0xFF,
            0x01,
            max_retries,
        ]);
        let timeout = self.config.ack_timeout_ms;
        self.send_command_check_ack(5, timeout, timeout)
    }

    /// Discover one passive target and report its identity.
    ///
    /// Discovery only: the session is not touched, use
    /// [`Pn532::in_list_passive_target`] to pick a peer for data exchange.
    pub fn read_passive_target_id(
        &mut self,
        baud: BaudRate,
        timeout_ms: u32,
    ) -> Result<Iso14443aCard, Error> {
        self.buffer[..3].copy_from_slice(&[IN_LIST_PASSIVE_TARGET, 0x01, baud as u8]);
        self.send_command_check_ack(3, timeout_ms, timeout_ms)?;
        let n = self.read_response(FRAME_OVERHEAD + 7 + MAX_UID_LEN);

        let response = Response::parse(&self.buffer[..n], IN_LIST_PASSIVE_TARGET)?;
        let count = response.byte(0)?;
        if count != 1 {
            debug!("Found {count} tags");
            return Err(Error::NoTarget(count));
        }

        let target = response.byte(1)?;
        let atqa = [response.byte(2)?, response.byte(3)?];
        let sak = response.byte(4)?;
        let uid_len = usize::from(response.byte(5)?);
        let uid = Vec::from_slice(response.bytes(6, uid_len)?).map_err(|_| Error::BadFrame)?;

        let card = Iso14443aCard {
            target,
            uid,
            atqa,
            sak,
        };
        debug!(
            "Found card: UID={:02X?}, ATQA={:04X}, SAK={:02X}",
            card.uid.as_slice(),
            card.sens_res(),
            card.sak
        );
        Ok(card)
    }

    /// Exchange an APDU with the inlisted target.
    ///
    /// Waits up to `response_timeout_ms` for the peer's answer once the ACK is
    /// in.
    /// Returns how many answer bytes were copied into `response`. An answer
    /// longer than `response` (or than the packet buffer) is cut short; the
    /// cut is logged and counted in [`Pn532::diagnostics`].
    pub fn in_data_exchange(&mut self, send: &[u8], response: &mut [u8]) -> Result<usize, Error> {
        let max = N - 2;
        if send.len() > max {
            return Err(Error::PayloadTooLong {
                len: send.len(),
                max,
            });
        }
        let target = self.session.target().ok_or(Error::NotInlisted)?;

        self.buffer[0] = IN_DATA_EXCHANGE;
        self.buffer[1] = target;
        self.buffer[2..2 + send.len()].copy_from_slice(send);
        let Config {
            ack_timeout_ms,
            response_timeout_ms,
            ..
        } = self.config;
        self.send_command_check_ack(send.len() + 2, ack_timeout_ms, response_timeout_ms)?;
        let n = self.read_response(N);

        let answer = Response::parse(&self.buffer[..n], IN_DATA_EXCHANGE)?;
        answer.status()?;
        let declared = answer
            .declared_len()
            .checked_sub(EXCHANGE_HEADER)
            .ok_or(Error::BadFrame)?;
        let data = answer.rest(1);
        let kept = declared.min(response.len()).min(data.len());
        response[..kept].copy_from_slice(&data[..kept]);

        if kept < declared {
            warn!("Response of {declared} bytes truncated to {kept}");
            self.diagnostics.record_truncation(declared, kept);
        }
        Ok(kept)
    }

    /// Select exactly one ISO14443A target as the data exchange peer.
    ///
    /// Waits up to `inlist_timeout_ms` for a card to enter the field. Only a
    /// well formed single target answer updates the session.
    pub fn in_list_passive_target(&mut self) -> Result<u8, Error> {
        let request = [IN_LIST_PASSIVE_TARGET, 0x01, BaudRate::Iso14443a as u8];
        self.buffer[..3].copy_from_slice(&request);
        let Config {
            ack_timeout_ms,
            inlist_timeout_ms,
            ..
        } = self.config;
        self.send_command_check_ack(3, ack_timeout_ms, inlist_timeout_ms)?;
        let n = self.read_response(N);

        let response = Response::parse(&self.buffer[..n], IN_LIST_PASSIVE_TARGET)?;
        let count = response.byte(0)?;
        if count != 1 {
            warn!("Unhandled number of targets inlisted: {count}");
            return Err(Error::NoTarget(count));
        }
        let target = response.byte(1)?;

        self.session.inlist(target);
        info!("Inlisted target {target}");
        Ok(target)
    }

    /// Deselect and forget the inlisted target.
    pub fn release_target(&mut self) -> Result<(), Error> {
        let target = self.session.target().ok_or(Error::NotInlisted)?;
        self.buffer[..2].copy_from_slice(&[IN_RELEASE, target]);
        let timeout = self.config.ack_timeout_ms;
        self.send_command_check_ack(2, timeout, timeout)?;
        let n = self.read_response(FRAME_OVERHEAD + 2);

        Response::parse(&self.buffer[..n], IN_RELEASE)?.status()?;
        self.session.clear();
        debug!("Released target {target}");
        Ok(())
    }
}
