use crate::Identity;
use keynesis::{memsec::Scrubbed as _, Seed};
use rand_core::{CryptoRng, RngCore};
use std::{
    convert::TryFrom,
    fmt::{self, Formatter},
    str::FromStr,
};

/// 64 random bytes from which the node's [`Identity`] is derived
///
/// the entropy alone is not enough to recover the identity, a password
/// is mixed in (see [`Entropy::derive_identity`]). This way the entropy
/// can be kept in a file next to the node's configuration.
#[derive(Clone, PartialEq, Eq)]
pub struct Entropy([u8; Self::SIZE]);

impl Entropy {
    pub const SIZE: usize = 64;

    pub fn generate<RNG>(mut rng: RNG) -> Self
    where
        RNG: RngCore + CryptoRng,
    {
        let mut entropy = Self([0; Self::SIZE]);

        rng.fill_bytes(&mut entropy.0);

        entropy
    }

    /// derive the node's [`Identity`] from the entropy and the given password
    ///
    /// The same entropy and password always give the same identity.
    pub fn derive_identity<P>(&self, password: P) -> Identity
    where
        P: AsRef<[u8]>,
    {
        let seed = Seed::derive_from_key(self, password);

        Identity::generate(seed.into_rand_chacha())
    }
}

impl Drop for Entropy {
    fn drop(&mut self) {
        self.0.scrub()
    }
}

impl AsRef<[u8]> for Entropy {
    fn as_ref(&self) -> &[u8] {
        self.0.as_ref()
    }
}

impl fmt::Display for Entropy {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(&self.0))
    }
}

impl fmt::Debug for Entropy {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Entropy").field(&"...").finish()
    }
}

impl FromStr for Entropy {
    type Err = hex::FromHexError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut entropy = Entropy([0; Self::SIZE]);

        hex::decode_to_slice(s.trim(), &mut entropy.0)?;

        Ok(entropy)
    }
}

impl<'a> TryFrom<&'a str> for Entropy {
    type Error = hex::FromHexError;
    fn try_from(value: &'a str) -> Result<Self, Self::Error> {
        value.parse()
    }
}
