//! PN532 normal information frames.
//!
//! ```text
//! 00 00 FF LEN LCS TFI PD0 .. PDn DCS 00
//! ```
//!
//! `LEN` counts `TFI` and the payload, `LEN + LCS == 0` and
//! `TFI + PD0 + .. + PDn + DCS == 0` (all mod 256). The leading preamble byte
//! is optional on the wire, so readers locate the `00 FF` start code instead
//! of assuming a fixed offset.

use super::error::Error;

pub const PREAMBLE: u8 = 0x00;
pub const START_CODE_1: u8 = 0x00;
pub const START_CODE_2: u8 = 0xFF;
pub const POSTAMBLE: u8 = 0x00;

/// Frame identifier of host to PN532 frames
pub const HOST_TO_PN532: u8 = 0xD4;
/// Frame identifier of PN532 to host frames
pub const PN532_TO_HOST: u8 = 0xD5;

/// `LEN` is one byte and includes the frame identifier
pub const MAX_PAYLOAD: usize = 254;
/// Bytes around the payload: preamble, start code, LEN, LCS, TFI, DCS, postamble
pub const FRAME_OVERHEAD: usize = 8;

pub fn length_checksum(len: u8) -> u8 {
    (!len).wrapping_add(1)
}

/// Complement of the running sum over start bytes, frame identifier and payload.
///
/// The start bytes add up to `0xFF`, so this equals the two's complement of
/// `tfi + sum(payload)`.
pub fn data_checksum(tfi: u8, payload: &[u8]) -> u8 {
    let start = PREAMBLE
        .wrapping_add(START_CODE_1)
        .wrapping_add(START_CODE_2)
        .wrapping_add(tfi);
    !payload.iter().fold(start, |sum, byte| sum.wrapping_add(*byte))
}

/// Byte stream of a host command frame.
///
/// `payload` must not exceed [`MAX_PAYLOAD`].
pub fn command_bytes(payload: &[u8]) -> impl Iterator<Item = u8> + '_ {
    debug_assert!(payload.len() <= MAX_PAYLOAD);
    let len = (payload.len() + 1) as u8;
    let header = [
        PREAMBLE,
        START_CODE_1,
        START_CODE_2,
        len,
        length_checksum(len),
        HOST_TO_PN532,
    ];
    let trailer = [data_checksum(HOST_TO_PN532, payload), POSTAMBLE];

    header
        .into_iter()
        .chain(payload.iter().copied())
        .chain(trailer)
}

/// Writes the command frame for `payload` into `out`, returns the frame length.
pub fn encode_command(payload: &[u8], out: &mut [u8]) -> Result<usize, Error> {
    if payload.len() > MAX_PAYLOAD {
        return Err(Error::PayloadTooLong {
            len: payload.len(),
            max: MAX_PAYLOAD,
        });
    }
    let needed = payload.len() + FRAME_OVERHEAD;
    if out.len() < needed {
        return Err(Error::BufferTooSmall {
            needed,
            capacity: out.len(),
        });
    }
    for (slot, byte) in out.iter_mut().zip(command_bytes(payload)) {
        *slot = byte;
    }
    Ok(needed)
}

/// Offset of the `00 FF` start code, skipping the optional preamble byte.
pub fn align(buf: &[u8]) -> Option<usize> {
    if buf.starts_with(&[PREAMBLE, START_CODE_1, START_CODE_2]) {
        Some(1)
    } else if buf.starts_with(&[START_CODE_1, START_CODE_2]) {
        Some(0)
    } else {
        None
    }
}

/// Start code position and declared length of a frame in a read buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Index of the `00 FF` start code
    pub start: usize,
    /// `LEN`, frame identifier included
    pub len: u8,
}

impl Header {
    /// Index of the frame identifier
    pub fn body(&self) -> usize {
        self.start + 4
    }

    /// Index one past the last byte covered by `LEN`
    pub fn end(&self) -> usize {
        self.body() + usize::from(self.len)
    }
}

pub fn parse_header(buf: &[u8]) -> Option<Header> {
    let start = align(buf)?;
    let len = *buf.get(start + 2)?;
    let lcs = *buf.get(start + 3)?;
    (len.wrapping_add(lcs) == 0).then_some(Header { start, len })
}

/// Start code present and length checksum consistent.
pub fn verify_frame_header(buf: &[u8]) -> bool {
    parse_header(buf).is_some()
}

/// A fully checked frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame<'a> {
    pub tfi: u8,
    pub payload: &'a [u8],
}

pub fn decode_frame(buf: &[u8]) -> Result<Frame<'_>, Error> {
    let header = parse_header(buf).ok_or(Error::BadFrame)?;
    if header.len == 0 {
        return Err(Error::BadFrame);
    }
    let body = buf.get(header.body()..header.end()).ok_or(Error::BadFrame)?;
    let dcs = *buf.get(header.end()).ok_or(Error::BadFrame)?;
    let (tfi, payload) = (body[0], &body[1..]);
    if data_checksum(tfi, payload) != dcs {
        return Err(Error::BadFrame);
    }
    Ok(Frame { tfi, payload })
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn firmware_query_is_byte_exact() {
        let mut out = [0u8; 16];
        let n = encode_command(&[0x02], &mut out).unwrap();

        assert_eq!(
            &out[..n],
            &[0x00, 0x00, 0xFF, 0x02, 0xFE, 0xD4, 0x02, 0x2A, 0x00]
        );
    }

    #[test]
    fn sam_configuration_is_byte_exact() {
        let mut out = [0u8; 16];
        let n = encode_command(&[0x14, 0x01, 0x14, 0x01], &mut out).unwrap();

        assert_eq!(
            &out[..n],
            &[0x00, 0x00, 0xFF, 0x05, 0xFB, 0xD4, 0x14, 0x01, 0x14, 0x01, 0x02, 0x00]
        );
    }

    #[test]
    fn frame_without_preamble_is_aligned() {
        let with = [0x00, 0x00, 0xFF, 0x02, 0xFE, 0xD5, 0x15, 0x16, 0x00];
        let without = &with[1..];

        assert_eq!(align(&with), Some(1));
        assert_eq!(align(without), Some(0));
        assert_eq!(decode_frame(&with), decode_frame(without));
        assert_eq!(decode_frame(without).unwrap().payload, &[0x15]);
    }

    #[test]
    fn header_rejects_bad_length_checksum() {
        assert!(verify_frame_header(&[0x00, 0x00, 0xFF, 0x03, 0xFD]));
        assert!(!verify_frame_header(&[0x00, 0x00, 0xFF, 0x03, 0xFC]));
        assert!(!verify_frame_header(&[0x00, 0x01, 0xFF, 0x03, 0xFD]));
        assert!(!verify_frame_header(&[0x00, 0x00, 0xFF]));
    }

    #[test]
    fn decode_rejects_bad_data_checksum() {
        let mut out = [0u8; 16];
        let n = encode_command(&[0x4A, 0x01, 0x00], &mut out).unwrap();
        out[n - 2] ^= 0x01;

        assert_eq!(decode_frame(&out[..n]), Err(Error::BadFrame));
    }

    #[test]
    fn encode_reports_small_buffer() {
        let mut out = [0u8; 8];

        assert_eq!(
            encode_command(&[0x02], &mut out),
            Err(Error::BufferTooSmall {
                needed: 9,
                capacity: 8
            })
        );
    }

    proptest! {
        #[test]
        fn command_round_trip(payload in prop::collection::vec(any::<u8>(), 0..=62)) {
            let mut out = [0u8; 64 + FRAME_OVERHEAD];
            let n = encode_command(&payload, &mut out).unwrap();
            let frame = &out[..n];

            let len = frame[3];
            prop_assert_eq!(usize::from(len), payload.len() + 1);
            prop_assert_eq!(len.wrapping_add(frame[4]), 0);
            let sum = payload.iter().fold(HOST_TO_PN532, |acc, b| acc.wrapping_add(*b));
            prop_assert_eq!(sum.wrapping_add(frame[n - 2]), 0);
            prop_assert_eq!(frame[n - 1], POSTAMBLE);

            let decoded = decode_frame(frame).unwrap();
            prop_assert_eq!(decoded.tfi, HOST_TO_PN532);
            prop_assert_eq!(decoded.payload, &payload[..]);
        }
    }
}
