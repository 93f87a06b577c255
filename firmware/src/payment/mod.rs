//! DESFire debit layer.
//!
//! Native DESFire commands framed over the PN532 data exchange, and the two
//! terminal flows built from them: identifying a tag and debiting a stored
//! value file.

pub mod desfire;
mod error;
pub mod flows;

pub use crate::config::PaymentConfig;
pub use desfire::{Authenticator, Desfire, PeerLink};
pub use error::Error;
pub use flows::{debit, dump_tag, start_reader, Receipt};
