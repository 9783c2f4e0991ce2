use super::varint;
use bytes::{BufMut as _, Bytes, BytesMut};
use thiserror::Error;

/// upper bound of the length a frame may declare
///
/// a peer sending bigger messages needs to partition them into chunks
/// of at most this size.
pub const MAX_FRAME_LENGTH: usize = 4_000_000;

/// number of bytes to probe in order to read the frame's length prefix
///
/// large enough to hold the longest length prefix (any `u64`) so a
/// prefix which does not terminate within the probe is malformed rather
/// than read from garbage.
pub const PREFIX_PROBE_LENGTH: usize = varint::MAX_LENGTH;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum FramingError {
    #[error("frame length prefix is malformed")]
    Malformed,

    #[error("frame declares {declared} bytes, over the frame length limit")]
    TooLarge { declared: u64 },
}

/// prefix `bytes` with its length
///
/// There is no bound checked on the length of `bytes`, the bound is
/// enforced by the receiving end.
pub fn encode_frame(bytes: &[u8]) -> Bytes {
    let len = bytes.len() as u64;
    let mut frame = BytesMut::with_capacity(varint::encoded_len(len) + bytes.len());

    varint::encode(len, &mut frame);
    frame.put_slice(bytes);

    frame.freeze()
}

/// decode the length prefix at the beginning of a frame
///
/// `probe` is the beginning of the frame, only the first
/// [`PREFIX_PROBE_LENGTH`] bytes are considered. Returns the declared length
/// of the frame's body and the number of bytes of the prefix.
pub fn decode_frame_prefix(probe: &[u8]) -> Result<(usize, usize), FramingError> {
    let probe = &probe[..probe.len().min(PREFIX_PROBE_LENGTH)];

    let (declared, consumed) = varint::decode(probe).ok_or(FramingError::Malformed)?;

    if declared > MAX_FRAME_LENGTH as u64 {
        return Err(FramingError::TooLarge { declared });
    }

    Ok((declared as usize, consumed))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prefix(declared: u64) -> Vec<u8> {
        let mut bytes = Vec::new();
        varint::encode(declared, &mut bytes);
        bytes
    }

    #[quickcheck]
    fn frame_round_trip(body: Vec<u8>) -> bool {
        let frame = encode_frame(&body);

        match decode_frame_prefix(&frame) {
            Ok((declared, consumed)) => {
                declared == body.len()
                    && consumed + declared == frame.len()
                    && frame[consumed..] == body[..]
            }
            Err(_) => false,
        }
    }

    #[test]
    fn largest_frame_accepted() {
        let body = vec![0xAB; MAX_FRAME_LENGTH];
        let frame = encode_frame(&body);

        let (declared, consumed) = decode_frame_prefix(&frame).unwrap();

        assert_eq!(declared, MAX_FRAME_LENGTH);
        assert_eq!(&frame[consumed..], &body[..]);
    }

    #[test]
    fn too_large() {
        for declared in &[MAX_FRAME_LENGTH as u64 + 1, 1 << 32, u64::MAX] {
            assert_eq!(
                decode_frame_prefix(&prefix(*declared)),
                Err(FramingError::TooLarge {
                    declared: *declared
                })
            );
        }
    }

    #[test]
    fn empty_body() {
        assert_eq!(decode_frame_prefix(&encode_frame(&[])), Ok((0, 1)));
    }

    #[test]
    fn malformed() {
        assert_eq!(decode_frame_prefix(&[]), Err(FramingError::Malformed));
        assert_eq!(
            decode_frame_prefix(&[0xFF; PREFIX_PROBE_LENGTH]),
            Err(FramingError::Malformed)
        );
    }

    #[test]
    fn prefix_beyond_the_probe_is_malformed() {
        // a non minimal prefix of a small length that only terminates
        // after the probe
        let mut bytes = vec![0x80; PREFIX_PROBE_LENGTH];
        bytes.push(0x00);

        assert_eq!(decode_frame_prefix(&bytes), Err(FramingError::Malformed));
    }
}
