//! Debit terminal
//!
//! Charges the configured amount to the simulated DESFire card, once per
//! round, and prints a receipt for each.
//!
//! # Usage
//! ```bash
//! PAYSTATION_DEBIT_AMOUNT=250 PAYSTATION_ROUNDS=5 cargo run --bin debit
//! ```

use std::cell::RefCell;
use std::rc::Rc;

use anyhow::{Context, Result};
use log::{info, warn};
use paystation_firmware::nfc::{LogSink, Pn532};
use paystation_firmware::payment::{self, start_reader};
use paystation_simulator::{demo_card, SimAuthenticator, Simulator, TerminalConfig, DEMO_KEY};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = TerminalConfig::from_env()?;
    let simulator = Simulator::new();
    let card = Rc::new(RefCell::new(demo_card(&config)));
    simulator.present_card(Rc::clone(&card));

    let (spi, cs, delay) = simulator.parts();
    let mut reader = Pn532::with_sink(spi, cs, delay, config.reader, LogSink::default());
    start_reader(&mut reader).context("reader bring-up")?;

    let mut auth = SimAuthenticator::new(DEMO_KEY);
    for round in 0..config.rounds {
        match payment::debit(&mut reader, &mut auth, &config.payment) {
            Ok(receipt) => println!(
                "#{round} target {} charged {}: {} -> {}",
                receipt.target, receipt.amount, receipt.balance_before, receipt.balance_after
            ),
            Err(err) => {
                warn!("Round {round} declined: {err}");
                break;
            }
        }
    }

    let diagnostics = reader.diagnostics();
    info!(
        "Balance left: {:?}, truncated responses: {}, timeouts: {}",
        card.borrow()
            .balance(config.payment.application_id, config.payment.value_file),
        diagnostics.truncated_responses,
        diagnostics.timeouts
    );
    Ok(())
}
