//! PayStation host simulator.
//!
//! Runs the terminal firmware natively against a PN532 model that sits
//! behind the same `embedded-hal` traits as the real SPI bus, with a
//! simulated DESFire card in its field.

pub mod card;
pub mod chip;
pub mod config;

pub use card::{DesfireCard, Key, SimAuthenticator, Tag};
pub use chip::{Fault, Peer, SimDelay, SimSelect, SimSpi, Simulator};
pub use config::TerminalConfig;

/// Key of the demo card's payment application
pub const DEMO_KEY: Key = [
    0xF9, 0x28, 0x7D, 0x1F, 0xE8, 0xB0, 0xF2, 0xF2, 0x70, 0xF0, 0xE1, 0x9F, 0x05, 0x8A, 0xE0, 0x51,
];

/// UID of the demo card
pub const DEMO_UID: [u8; 7] = [0x04, 0x52, 0x1C, 0x6A, 0x3B, 0x5E, 0x80];

/// A DESFire card holding the payment application described by `config`
pub fn demo_card(config: &TerminalConfig) -> DesfireCard {
    let payment = &config.payment;
    DesfireCard::new(&DEMO_UID)
        .with_application(payment.application_id, payment.key_no, DEMO_KEY)
        .with_value_file(payment.application_id, payment.value_file, config.card_balance)
}
