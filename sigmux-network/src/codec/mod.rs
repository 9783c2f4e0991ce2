/*!
# SIGMUX wire codec

every message is sent as a frame: the length of the message's bytes,
encoded as an unsigned varint, followed by the bytes themselves.

```text
[length: uvarint][length bytes]
```

The length is bounded to [`MAX_FRAME_LENGTH`] on the receiving end.
*/

mod frame;
pub(crate) mod varint;

pub use self::frame::{
    decode_frame_prefix, encode_frame, FramingError, MAX_FRAME_LENGTH, PREFIX_PROBE_LENGTH,
};
