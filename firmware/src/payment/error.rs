use thiserror::Error;

use crate::nfc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Error {
    #[error(transparent)]
    Nfc(#[from] nfc::Error),
    /// Status byte other than OK from the card
    #[error("card returned status {0:#04x}")]
    Card(u8),
    #[error("card authentication failed")]
    Authentication,
    #[error("card response too short")]
    ShortResponse,
}
