pub use keynesis::key::ed25519::{PublicKey, Signature};
use keynesis::key::ed25519::SecretKey;
use rand_core::{CryptoRng, RngCore};
use std::{
    convert::TryFrom,
    fmt::{self, Formatter},
    sync::Arc,
};

/// capability to sign messages on behalf of a node
///
/// the signature is expected to be verifiable by a [`Verify`] implementation
/// with the [`Sign::public_key`].
pub trait Sign {
    fn public_key(&self) -> PublicKey;

    fn sign(&self, message: &[u8]) -> Signature;
}

/// capability to check a signature over a message
///
/// The inputs are raw bytes as they were received from the network. Any
/// malformed input (wrong key length, invalid curve point...) is simply
/// a failed verification.
pub trait Verify {
    fn verify(&self, public_key: &[u8], message: &[u8], signature: &[u8]) -> bool;
}

/// the ed25519 secret key of a node
pub struct Identity {
    secret: SecretKey,
}

/// default [`Verify`] implementation, checks ed25519 signatures
#[derive(Debug, Clone, Copy, Default)]
pub struct Ed25519;

impl Identity {
    pub fn generate<RNG>(rng: RNG) -> Self
    where
        RNG: RngCore + CryptoRng,
    {
        Self {
            secret: SecretKey::new(rng),
        }
    }
}

impl Sign for Identity {
    fn public_key(&self) -> PublicKey {
        self.secret.public_key()
    }

    fn sign(&self, message: &[u8]) -> Signature {
        self.secret.sign(message)
    }
}

impl<S: Sign + ?Sized> Sign for Arc<S> {
    fn public_key(&self) -> PublicKey {
        self.as_ref().public_key()
    }

    fn sign(&self, message: &[u8]) -> Signature {
        self.as_ref().sign(message)
    }
}

impl Verify for Ed25519 {
    fn verify(&self, public_key: &[u8], message: &[u8], signature: &[u8]) -> bool {
        match (PublicKey::try_from(public_key), Signature::try_from(signature)) {
            (Ok(public_key), Ok(signature)) => public_key.verify(message, &signature),
            _ => false,
        }
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("public", &self.public_key())
            .finish()
    }
}
