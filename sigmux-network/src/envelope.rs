use crate::codec::varint;
use bytes::{Buf as _, BufMut as _, Bytes, BytesMut};
use sigmux_lib::{Sign, Verify};
use std::str;
use thiserror::Error;

#[derive(PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Debug, Hash)]
#[repr(u8)]
enum FieldTag {
    Payload = 1,
    PublicKey = 2,
    Address = 3,
    Signature = 4,
}

/// the identity of the node who sent an [`Envelope`]
#[derive(PartialEq, Eq, Hash, Clone, Debug)]
pub struct Sender {
    public_key: Bytes,
    address: String,
}

/// an authenticated message
///
/// an `Envelope` always has all of its fields. The only ways to obtain one
/// are to sign a payload ([`Envelope::sign`]) or to check the fields of an
/// [`UncheckedEnvelope`] with [`validate_fields`].
///
/// The signature of an `Envelope` returned by the transport has been
/// verified.
#[derive(PartialEq, Eq, Hash, Clone, Debug)]
pub struct Envelope {
    payload: Bytes,
    sender: Sender,
    signature: Bytes,
}

#[derive(PartialEq, Eq, Clone, Debug, Default)]
pub struct UncheckedSender {
    pub public_key: Option<Bytes>,
    pub address: String,
}

/// an envelope as it was read from the wire, any of its fields may be missing
#[derive(PartialEq, Eq, Clone, Debug, Default)]
pub struct UncheckedEnvelope {
    pub payload: Option<Bytes>,
    pub sender: Option<UncheckedSender>,
    pub signature: Option<Bytes>,
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum FieldError {
    #[error("envelope has no payload")]
    MissingPayload,

    #[error("envelope has no sender")]
    MissingSender,

    #[error("envelope's sender has no public key")]
    MissingPublicKey,

    #[error("envelope's sender has an empty address")]
    EmptyAddress,

    #[error("envelope has no signature")]
    MissingSignature,
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SignatureError {
    #[error("envelope's signature does not match the payload and the sender")]
    Invalid,
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    #[error("unknown envelope field (tag {0})")]
    UnknownField(u8),

    #[error("envelope field (tag {0}) appears more than once")]
    DuplicateField(u8),

    #[error("envelope field length is malformed")]
    MalformedLength,

    #[error("envelope field is truncated")]
    Truncated,

    #[error("sender address is not valid UTF-8")]
    InvalidAddress,
}

impl FieldTag {
    #[inline]
    fn to_u8(self) -> u8 {
        self as u8
    }

    #[inline]
    fn try_from_u8(t: u8) -> Option<Self> {
        match t {
            1 => Some(Self::Payload),
            2 => Some(Self::PublicKey),
            3 => Some(Self::Address),
            4 => Some(Self::Signature),
            _ => None,
        }
    }
}

impl Sender {
    pub fn public_key(&self) -> &Bytes {
        &self.public_key
    }

    /// the address the sender claims to be reachable at
    pub fn address(&self) -> &str {
        &self.address
    }
}

impl Envelope {
    /// create a new envelope of `payload`, signed by `signer`
    ///
    /// `address` is where the remote peers can reach the signer.
    pub fn sign<S>(payload: impl Into<Bytes>, signer: &S, address: impl Into<String>) -> Self
    where
        S: Sign + ?Sized,
    {
        let payload = payload.into();
        let signature = signer.sign(&payload);

        Self {
            sender: Sender {
                public_key: Bytes::copy_from_slice(signer.public_key().as_ref()),
                address: address.into(),
            },
            signature: Bytes::copy_from_slice(signature.as_ref()),
            payload,
        }
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    pub fn sender(&self) -> &Sender {
        &self.sender
    }

    pub fn signature(&self) -> &Bytes {
        &self.signature
    }

    pub fn to_bytes(&self) -> Bytes {
        encode_fields(
            Some(&self.payload[..]),
            Some((
                Some(&self.sender.public_key[..]),
                self.sender.address.as_str(),
            )),
            Some(&self.signature[..]),
        )
    }

    pub fn into_unchecked(self) -> UncheckedEnvelope {
        let Self {
            payload,
            sender: Sender {
                public_key,
                address,
            },
            signature,
        } = self;

        UncheckedEnvelope {
            payload: Some(payload),
            sender: Some(UncheckedSender {
                public_key: Some(public_key),
                address,
            }),
            signature: Some(signature),
        }
    }
}

impl UncheckedEnvelope {
    /// deserialize the envelope's fields
    ///
    /// this does not check that the required fields are present, see
    /// [`validate_fields`] for that.
    pub fn decode(mut bytes: Bytes) -> Result<Self, DecodeError> {
        let mut envelope = Self::default();
        let mut seen = 0u8;

        while bytes.has_remaining() {
            let tag = bytes.get_u8();
            let field = FieldTag::try_from_u8(tag).ok_or(DecodeError::UnknownField(tag))?;

            if seen & (1 << tag) != 0 {
                return Err(DecodeError::DuplicateField(tag));
            }
            seen |= 1 << tag;

            let (len, consumed) = varint::decode(&bytes).ok_or(DecodeError::MalformedLength)?;
            bytes.advance(consumed);

            if len > bytes.len() as u64 {
                return Err(DecodeError::Truncated);
            }
            let value = bytes.split_to(len as usize);

            match field {
                FieldTag::Payload => envelope.payload = Some(value),
                FieldTag::Signature => envelope.signature = Some(value),
                FieldTag::PublicKey => {
                    envelope
                        .sender
                        .get_or_insert_with(UncheckedSender::default)
                        .public_key = Some(value)
                }
                FieldTag::Address => {
                    let address =
                        str::from_utf8(&value).map_err(|_| DecodeError::InvalidAddress)?;
                    envelope
                        .sender
                        .get_or_insert_with(UncheckedSender::default)
                        .address = address.to_owned();
                }
            }
        }

        Ok(envelope)
    }

    pub fn to_bytes(&self) -> Bytes {
        encode_fields(
            self.payload.as_deref(),
            self.sender
                .as_ref()
                .map(|sender| (sender.public_key.as_deref(), sender.address.as_str())),
            self.signature.as_deref(),
        )
    }
}

impl From<Envelope> for UncheckedEnvelope {
    fn from(envelope: Envelope) -> Self {
        envelope.into_unchecked()
    }
}

fn encode_fields(
    payload: Option<&[u8]>,
    sender: Option<(Option<&[u8]>, &str)>,
    signature: Option<&[u8]>,
) -> Bytes {
    let (public_key, address) = match sender {
        Some((public_key, address)) => (public_key, Some(address.as_bytes())),
        None => (None, None),
    };

    let fields = [
        (FieldTag::Payload, payload),
        (FieldTag::PublicKey, public_key),
        (FieldTag::Address, address),
        (FieldTag::Signature, signature),
    ];

    let capacity = fields
        .iter()
        .filter_map(|(_, value)| *value)
        .map(|value| 1 + varint::encoded_len(value.len() as u64) + value.len())
        .sum();
    let mut bytes = BytesMut::with_capacity(capacity);

    for (tag, value) in fields.iter() {
        if let Some(value) = value {
            bytes.put_u8(tag.to_u8());
            varint::encode(value.len() as u64, &mut bytes);
            bytes.put_slice(value);
        }
    }

    bytes.freeze()
}

/// check all the required fields of the envelope are present
///
/// This is cheap and needs to be done before checking the signature
/// with [`verify_signature`].
pub fn validate_fields(envelope: UncheckedEnvelope) -> Result<Envelope, FieldError> {
    let UncheckedEnvelope {
        payload,
        sender,
        signature,
    } = envelope;

    let payload = payload.ok_or(FieldError::MissingPayload)?;
    let sender = sender.ok_or(FieldError::MissingSender)?;
    let public_key = sender.public_key.ok_or(FieldError::MissingPublicKey)?;
    if sender.address.is_empty() {
        return Err(FieldError::EmptyAddress);
    }
    let signature = signature.ok_or(FieldError::MissingSignature)?;

    Ok(Envelope {
        payload,
        sender: Sender {
            public_key,
            address: sender.address,
        },
        signature,
    })
}

/// check the signature of the payload matches the sender's public key
pub fn verify_signature<V>(envelope: &Envelope, verifier: &V) -> Result<(), SignatureError>
where
    V: Verify + ?Sized,
{
    if verifier.verify(
        &envelope.sender.public_key,
        &envelope.payload,
        &envelope.signature,
    ) {
        Ok(())
    } else {
        Err(SignatureError::Invalid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_chacha::{rand_core::SeedableRng as _, ChaChaRng};
    use sigmux_lib::{Ed25519, Identity};

    fn identity(seed: u64) -> Identity {
        Identity::generate(ChaChaRng::seed_from_u64(seed))
    }

    fn ping() -> Envelope {
        Envelope::sign(&b"ping"[..], &identity(1), "127.0.0.1:9000")
    }

    #[test]
    fn signed_envelope_is_valid() {
        let envelope = ping();

        let envelope = validate_fields(envelope.into_unchecked()).unwrap();
        verify_signature(&envelope, &Ed25519).unwrap();

        assert_eq!(envelope.payload().as_ref(), b"ping");
        assert_eq!(envelope.sender().address(), "127.0.0.1:9000");
        assert_eq!(
            envelope.sender().public_key().as_ref(),
            identity(1).public_key().as_ref()
        );
    }

    #[test]
    fn encoding_keeps_every_field() {
        let envelope = ping();

        let decoded = UncheckedEnvelope::decode(envelope.to_bytes()).unwrap();

        assert_eq!(decoded, envelope.clone().into_unchecked());
        assert_eq!(validate_fields(decoded).unwrap(), envelope);
    }

    #[test]
    fn encoding_keeps_missing_fields_missing() {
        let envelope = UncheckedEnvelope {
            payload: Some(Bytes::new()),
            sender: Some(UncheckedSender::default()),
            signature: None,
        };

        let decoded = UncheckedEnvelope::decode(envelope.to_bytes()).unwrap();

        assert_eq!(decoded, envelope);
        assert_eq!(
            UncheckedEnvelope::decode(Bytes::new()).unwrap(),
            UncheckedEnvelope::default()
        );
    }

    #[test]
    fn missing_fields() {
        let valid = ping().into_unchecked();

        let mut envelope = valid.clone();
        envelope.payload = None;
        assert_eq!(validate_fields(envelope), Err(FieldError::MissingPayload));

        let mut envelope = valid.clone();
        envelope.sender = None;
        assert_eq!(validate_fields(envelope), Err(FieldError::MissingSender));

        let mut envelope = valid.clone();
        envelope.sender.as_mut().unwrap().public_key = None;
        assert_eq!(validate_fields(envelope), Err(FieldError::MissingPublicKey));

        let mut envelope = valid.clone();
        envelope.sender.as_mut().unwrap().address.clear();
        assert_eq!(validate_fields(envelope), Err(FieldError::EmptyAddress));

        let mut envelope = valid;
        envelope.signature = None;
        assert_eq!(validate_fields(envelope), Err(FieldError::MissingSignature));
    }

    #[test]
    fn empty_payload_is_present() {
        let envelope = Envelope::sign(Bytes::new(), &identity(1), "127.0.0.1:9000");

        let envelope = validate_fields(envelope.into_unchecked()).unwrap();
        verify_signature(&envelope, &Ed25519).unwrap();
    }

    #[test]
    fn signature_of_another_key() {
        let mut envelope = ping().into_unchecked();
        envelope.sender.as_mut().unwrap().public_key = Some(Bytes::copy_from_slice(
            identity(2).public_key().as_ref(),
        ));

        let envelope = validate_fields(envelope).unwrap();
        assert_eq!(
            verify_signature(&envelope, &Ed25519),
            Err(SignatureError::Invalid)
        );
    }

    #[test]
    fn signature_of_another_payload() {
        let mut envelope = ping().into_unchecked();
        envelope.payload = Some(Bytes::from_static(b"pong"));

        let envelope = validate_fields(envelope).unwrap();
        assert_eq!(
            verify_signature(&envelope, &Ed25519),
            Err(SignatureError::Invalid)
        );
    }

    #[test]
    fn garbage_key_and_signature() {
        let mut envelope = ping().into_unchecked();
        envelope.sender.as_mut().unwrap().public_key = Some(Bytes::from_static(b"key"));
        envelope.signature = Some(Bytes::from_static(b"signature"));

        let envelope = validate_fields(envelope).unwrap();
        assert_eq!(
            verify_signature(&envelope, &Ed25519),
            Err(SignatureError::Invalid)
        );
    }

    #[test]
    fn decode_errors() {
        assert_eq!(
            UncheckedEnvelope::decode(Bytes::from_static(&[9, 0])),
            Err(DecodeError::UnknownField(9))
        );
        assert_eq!(
            UncheckedEnvelope::decode(Bytes::from_static(&[1, 1, 0xAA, 1, 0])),
            Err(DecodeError::DuplicateField(1))
        );
        assert_eq!(
            UncheckedEnvelope::decode(Bytes::from_static(&[3, 1, b'a', 3, 1, b'b'])),
            Err(DecodeError::DuplicateField(3))
        );
        assert_eq!(
            UncheckedEnvelope::decode(Bytes::from_static(&[1])),
            Err(DecodeError::MalformedLength)
        );
        assert_eq!(
            UncheckedEnvelope::decode(Bytes::from_static(&[1, 5, 0xAA])),
            Err(DecodeError::Truncated)
        );
        assert_eq!(
            UncheckedEnvelope::decode(Bytes::from_static(&[3, 2, 0xC3, 0x28])),
            Err(DecodeError::InvalidAddress)
        );
    }
}
