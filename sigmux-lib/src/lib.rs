/*!
# SIGMUX identities

the keys and signature capabilities used by the SIGMUX transport to
authenticate every message exchanged between two nodes.

The transport itself only consumes the [`Sign`] and [`Verify`] capabilities,
the [`Identity`] and [`Ed25519`] types are the default ed25519 implementation
of these capabilities.
*/

#[cfg(test)]
#[macro_use(quickcheck)]
extern crate quickcheck_macros;

mod entropy;
mod identity;

pub use self::{
    entropy::Entropy,
    identity::{Ed25519, Identity, PublicKey, Sign, Signature, Verify},
};
