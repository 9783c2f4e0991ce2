//! unsigned LEB128 variable length integers
//!
//! each byte carries 7 bits of the value, least significant group first.
//! The high bit of a byte is set when more bytes follow.

use bytes::BufMut;

/// the longest encoding of a `u64`
pub const MAX_LENGTH: usize = 10;

const CONTINUATION: u8 = 0x80;
const GROUP: u8 = 0x7F;

/// number of bytes the minimal encoding of `value` takes
pub const fn encoded_len(value: u64) -> usize {
    let mut value = value >> 7;
    let mut len = 1;
    while value != 0 {
        value >>= 7;
        len += 1;
    }
    len
}

/// write the minimal encoding of `value` into `dst`
pub fn encode<B>(mut value: u64, dst: &mut B)
where
    B: BufMut,
{
    while value >= CONTINUATION as u64 {
        dst.put_u8((value as u8 & GROUP) | CONTINUATION);
        value >>= 7;
    }
    dst.put_u8(value as u8);
}

/// tells if `byte` terminates a varint
#[inline]
pub const fn is_last(byte: u8) -> bool {
    byte & CONTINUATION == 0
}

/// decode the varint at the start of `src`
///
/// returns the value and the number of bytes it was encoded on. `None` if
/// `src` ends before the last byte of the varint, if the varint is longer
/// than [`MAX_LENGTH`] or if it overflows a `u64`.
pub fn decode(src: &[u8]) -> Option<(u64, usize)> {
    let mut value: u64 = 0;

    for (index, byte) in src.iter().copied().enumerate().take(MAX_LENGTH) {
        let group = (byte & GROUP) as u64;

        // the 10th byte only has room for the last bit of a u64
        if index == MAX_LENGTH - 1 && byte > 1 {
            return None;
        }

        value |= group << (7 * index);

        if is_last(byte) {
            return Some((value, index + 1));
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[quickcheck]
    fn encode_decode(value: u64) -> bool {
        let mut bytes = Vec::new();
        encode(value, &mut bytes);

        bytes.len() == encoded_len(value) && decode(&bytes) == Some((value, bytes.len()))
    }

    #[test]
    fn known_encodings() {
        let mut bytes = Vec::new();

        encode(0, &mut bytes);
        assert_eq!(bytes, [0x00]);

        bytes.clear();
        encode(127, &mut bytes);
        assert_eq!(bytes, [0x7F]);

        bytes.clear();
        encode(300, &mut bytes);
        assert_eq!(bytes, [0xAC, 0x02]);

        bytes.clear();
        encode(u64::MAX, &mut bytes);
        assert_eq!(bytes.len(), MAX_LENGTH);
        assert_eq!(bytes[MAX_LENGTH - 1], 0x01);
    }

    #[test]
    fn decode_stops_at_the_last_byte() {
        assert_eq!(decode(&[0xAC, 0x02, 0xFF, 0xFF]), Some((300, 2)));
    }

    #[test]
    fn unterminated() {
        assert_eq!(decode(&[]), None);
        assert_eq!(decode(&[0x80]), None);
        assert_eq!(decode(&[0xFF; MAX_LENGTH + 2]), None);
    }

    #[test]
    fn overflow() {
        let mut bytes = [0xFF; MAX_LENGTH];
        bytes[MAX_LENGTH - 1] = 0x02;

        assert_eq!(decode(&bytes), None);
    }

    #[test]
    fn non_minimal_encoding_accepted() {
        assert_eq!(decode(&[0x81, 0x80, 0x00]), Some((1, 3)));
    }
}
