//! Reader and payment settings.
//!
//! Everything is plain data with serde defaults, so a partial settings blob
//! only has to name the values it changes.

use serde::{Deserialize, Serialize};

/// Bus level delays, all in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timing {
    /// Pause between two ready polls
    pub poll_interval_ms: u32,
    /// Settle time after asserting chip select
    pub select_settle_ms: u32,
    /// Gap before each byte of a data read
    pub byte_delay_ms: u32,
    /// How long `begin` holds chip select to wake the chip
    pub wakeup_ms: u32,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            poll_interval_ms: 10,
            select_settle_ms: 2,
            byte_delay_ms: 1,
            wakeup_ms: 1000,
        }
    }
}

/// PN532 driver settings.
///
/// Every timeout bounds a single ready wait. `0` removes the bound and the
/// wait only ends once the chip reports ready; [`Config::unbounded_wait`]
/// tells whether any timeout is set that way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub timing: Timing,
    /// Wait for the ACK, and for the answer of commands answered by the chip
    /// itself. `0` waits forever.
    pub ack_timeout_ms: u32,
    /// Wait for a data exchange answer from the peer. `0` waits forever.
    pub response_timeout_ms: u32,
    /// Wait for a card to enter the field during inlist. `0` waits forever.
    pub inlist_timeout_ms: u32,
    /// Budget for each wait of passive target discovery. `0` waits forever.
    pub passive_timeout_ms: u32,
    /// MxRtyPassiveActivation, 0xFF retries forever
    pub passive_activation_retries: u8,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timing: Timing::default(),
            ack_timeout_ms: 1000,
            response_timeout_ms: 1000,
            inlist_timeout_ms: 30_000,
            passive_timeout_ms: 1000,
            passive_activation_retries: 0xFF,
        }
    }
}

impl Config {
    /// Name of the first timeout set to `0`, if any
    pub fn unbounded_wait(&self) -> Option<&'static str> {
        [
            ("ack_timeout_ms", self.ack_timeout_ms),
            ("response_timeout_ms", self.response_timeout_ms),
            ("inlist_timeout_ms", self.inlist_timeout_ms),
            ("passive_timeout_ms", self.passive_timeout_ms),
        ]
        .into_iter()
        .find(|(_, timeout)| *timeout == 0)
        .map(|(name, _)| name)
    }
}

/// What a debit transaction touches on the card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaymentConfig {
    /// DESFire application id (24 bit)
    pub application_id: u32,
    /// Key used to authenticate inside the application
    pub key_no: u8,
    /// Value file holding the balance
    pub value_file: u8,
    /// Amount debited per transaction
    pub amount: i32,
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            application_id: 0xF8,
            key_no: 1,
            value_file: 1,
            amount: 100,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_settings_keep_defaults() {
        let config: Config = serde_json::from_str(
            r#"{ "ack_timeout_ms": 250, "timing": { "poll_interval_ms": 5 } }"#,
        )
        .unwrap();

        assert_eq!(config.ack_timeout_ms, 250);
        assert_eq!(config.timing.poll_interval_ms, 5);
        assert_eq!(config.timing.select_settle_ms, 2);
        assert_eq!(config.inlist_timeout_ms, 30_000);
        assert_eq!(config.passive_activation_retries, 0xFF);
    }

    #[test]
    fn zero_timeouts_are_reported() {
        assert_eq!(Config::default().unbounded_wait(), None);

        let config: Config = serde_json::from_str(r#"{ "inlist_timeout_ms": 0 }"#).unwrap();
        assert_eq!(config.unbounded_wait(), Some("inlist_timeout_ms"));
    }

    #[test]
    fn payment_defaults_match_terminal_application() {
        let payment: PaymentConfig = serde_json::from_str(r#"{ "amount": 250 }"#).unwrap();

        assert_eq!(payment.application_id, 0xF8);
        assert_eq!(payment.key_no, 1);
        assert_eq!(payment.amount, 250);
    }
}
