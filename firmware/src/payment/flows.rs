//! Terminal flows over one [`Pn532`].

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use embedded_hal::spi::SpiBus;
use log::{info, warn};

use super::desfire::{Authenticator, Desfire};
use super::error::Error;
use crate::config::PaymentConfig;
use crate::nfc::{self, BaudRate, DebugSink, FirmwareVersion, Iso14443aCard, Pn532};

/// Outcome of a committed debit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Receipt {
    pub target: u8,
    pub amount: i32,
    pub balance_before: i32,
    pub balance_after: i32,
}

/// Wake the reader, check it is a PN532 and put it into initiator mode.
pub fn start_reader<SPI, CS, D, S, const N: usize>(
    reader: &mut Pn532<SPI, CS, D, S, N>,
) -> Result<FirmwareVersion, nfc::Error>
where
    SPI: SpiBus<u8>,
    CS: OutputPin,
    D: DelayNs,
    S: DebugSink,
{
    reader.begin();
    let firmware = reader.firmware_info()?;
    info!("Found {firmware}");

    reader.sam_config()?;
    reader.set_passive_activation_retries(reader.config().passive_activation_retries)?;
    Ok(firmware)
}

/// Identify whatever ISO14443A tag is in the field.
pub fn dump_tag<SPI, CS, D, S, const N: usize>(
    reader: &mut Pn532<SPI, CS, D, S, N>,
) -> Result<Iso14443aCard, nfc::Error>
where
    SPI: SpiBus<u8>,
    CS: OutputPin,
    D: DelayNs,
    S: DebugSink,
{
    let timeout = reader.config().passive_timeout_ms;
    let card = reader.read_passive_target_id(BaudRate::Iso14443a, timeout)?;
    info!(
        "Tag {:?}: UID {:02X?}, SENS_RES {:04X}, SAK {:02X}",
        card.tag_type(),
        card.uid.as_slice(),
        card.sens_res(),
        card.sak
    );
    Ok(card)
}

/// Inlist the card in the field and debit `payment.amount` from its value
/// file. The target is released again whatever the outcome.
pub fn debit<SPI, CS, D, S, A, const N: usize>(
    reader: &mut Pn532<SPI, CS, D, S, N>,
    auth: &mut A,
    payment: &PaymentConfig,
) -> Result<Receipt, Error>
where
    SPI: SpiBus<u8>,
    CS: OutputPin,
    D: DelayNs,
    S: DebugSink,
    A: Authenticator,
{
    let target = reader.in_list_passive_target()?;
    let outcome = run_debit(reader, auth, payment, target);

    if let Err(err) = reader.release_target() {
        warn!("Failed to release target {target}: {err}");
    }
    outcome
}

fn run_debit<SPI, CS, D, S, A, const N: usize>(
    reader: &mut Pn532<SPI, CS, D, S, N>,
    auth: &mut A,
    payment: &PaymentConfig,
    target: u8,
) -> Result<Receipt, Error>
where
    SPI: SpiBus<u8>,
    CS: OutputPin,
    D: DelayNs,
    S: DebugSink,
    A: Authenticator,
{
    let mut card = Desfire::new(reader);
    card.select_application(payment.application_id)?;
    card.authenticate(payment.key_no, auth)?;

    let balance_before = card.get_value(payment.value_file)?;
    if let Err(err) = card
        .debit(payment.value_file, payment.amount)
        .and_then(|()| card.commit())
    {
        warn!("Debit of {} failed: {err}", payment.amount);
        if let Err(abort) = card.abort() {
            warn!("Abort failed: {abort}");
        }
        return Err(err);
    }
    let balance_after = card.get_value(payment.value_file)?;

    info!(
        "Debited {} from target {target}: {balance_before} -> {balance_after}",
        payment.amount
    );
    Ok(Receipt {
        target,
        amount: payment.amount,
        balance_before,
        balance_after,
    })
}
