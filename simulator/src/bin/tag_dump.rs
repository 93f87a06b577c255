//! Tag dump
//!
//! Brings up the simulated reader and reports every tag placed in its field.
//!
//! # Usage
//! ```bash
//! PAYSTATION_ROUNDS=3 cargo run --bin tag-dump
//! ```

use anyhow::Result;
use log::info;
use paystation_firmware::nfc::{LogSink, Pn532};
use paystation_firmware::payment::{dump_tag, start_reader};
use paystation_simulator::{demo_card, Simulator, Tag, TerminalConfig};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = TerminalConfig::from_env()?;
    let simulator = Simulator::new();
    let (spi, cs, delay) = simulator.parts();
    let mut reader = Pn532::with_sink(spi, cs, delay, config.reader, LogSink::default());

    let firmware = start_reader(&mut reader)?;
    info!("Reader ready: {firmware}");

    for round in 0..config.rounds {
        if round % 2 == 0 {
            simulator.present_card(demo_card(&config));
        } else {
            let ntag = Tag::new(&[0x04, 0xA1, 0x3C, 0x52, 0x71, 0x2F, 0x80], [0x00, 0x44], 0x00);
            simulator.present_card(ntag);
        }

        let card = dump_tag(&mut reader)?;
        println!(
            "#{round} target {} {:?} UID {:02X?}",
            card.target,
            card.tag_type(),
            card.uid.as_slice()
        );
    }

    info!("Done after {} ms of reader time", simulator.elapsed_ms());
    Ok(())
}
