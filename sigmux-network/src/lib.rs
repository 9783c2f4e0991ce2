/*!
# SIGMUX network protocol

this crate implements the transport of authenticated messages between
peers connected with a [`Session`]: a connection able to open and accept
independent byte streams (typically a stream multiplexer).

1. every message is an [`Envelope`]: a payload, the identity of its
   sender (public key and address) and the signature of the payload;
2. every envelope is sent on a stream of its own, length prefixed (see
   [`codec`]), and the stream is closed right after;
3. the receiving end checks every field of the envelope is present and
   the signature is valid before handing the envelope over (see
   [`receive`]).

Sending is done through the [`dispatch`] queue: any number of tasks may
[`write`](dispatch::Writer::write) envelopes, each call waiting at most
a few seconds for the outcome.

[`net`] provides TCP based sessions.
*/

#[cfg(test)]
#[macro_use(quickcheck)]
extern crate quickcheck_macros;

pub mod codec;
pub mod dispatch;
mod envelope;
pub mod net;
mod session;
mod stream;
#[cfg(test)]
mod testing;
mod transport;

pub use self::{
    dispatch::{queue, Connect, DispatchError, Dispatcher, Packet, Packets, Writer},
    envelope::{
        validate_fields, verify_signature, DecodeError, Envelope, FieldError, Sender,
        SignatureError, UncheckedEnvelope, UncheckedSender,
    },
    session::Session,
    stream::Deadline,
    transport::{receive, receive_within, send, TransportError, SEND_DEADLINE},
};
