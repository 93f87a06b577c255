use heapless::Vec;

/// Longest ISO14443A UID (triple size)
pub const MAX_UID_LEN: usize = 10;

/// ISO 14443A card info
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Iso14443aCard {
    /// Target number the PN532 assigned to the card
    pub target: u8,
    /// UID (4, 7, or 10 bytes)
    pub uid: Vec<u8, MAX_UID_LEN>,
    /// ATQA / SENS_RES (2 bytes, as sent by the PN532)
    pub atqa: [u8; 2],
    /// SAK / SEL_RES byte
    pub sak: u8,
}

impl Iso14443aCard {
    /// ATQA as the big-endian SENS_RES word
    pub fn sens_res(&self) -> u16 {
        u16::from_be_bytes(self.atqa)
    }

    pub fn tag_type(&self) -> NfcTagType {
        NfcTagType::classify(self.atqa[1], self.sak)
    }

    /// Check if this is a DESFire (ISO14443-4 compliant, based on SAK)
    pub fn is_desfire(&self) -> bool {
        self.tag_type() == NfcTagType::Desfire
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NfcTagType {
    MifareClassic1K,
    MifareClassic4K,
    Ntag,
    Desfire,
    Unknown,
}

impl NfcTagType {
    /// Classify from the low SENS_RES byte and SAK.
    pub fn classify(sens_res: u8, sak: u8) -> Self {
        match (sens_res, sak) {
            (0x44, 0x00) => NfcTagType::Ntag,
            (0x04, 0x08) | (0x44, 0x08) => NfcTagType::MifareClassic1K,
            (0x04, 0x18) | (0x02, 0x18) => NfcTagType::MifareClassic4K,
            (0x44, 0x20) | (0x04, 0x20) => NfcTagType::Desfire,
            _ => NfcTagType::Unknown,
        }
    }
}
