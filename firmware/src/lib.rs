//! PayStation terminal firmware core.
//!
//! PN532 (SPI) command/response engine plus the thin DESFire debit layer that
//! runs on top of it. All hardware access goes through the `embedded-hal` 1.0
//! traits, so the same code drives the terminal and the host simulator.

#![no_std]

#[cfg(test)]
extern crate std;

pub mod config;
pub mod nfc;
pub mod payment;

pub use config::{Config, PaymentConfig, Timing};
pub use nfc::Pn532;
