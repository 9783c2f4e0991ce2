/*!
sending and receiving one [`Envelope`] per stream

every envelope travels on its own stream: the sender opens a stream,
writes the frame and closes the stream. The receiver accepts the stream,
reads exactly one frame, checks the envelope and closes the stream.

Whatever the outcome, the stream's deadline is cleared and the stream
is closed before [`send`] or [`receive`] returns.
*/

use crate::{
    codec::{decode_frame_prefix, encode_frame, varint, FramingError, PREFIX_PROBE_LENGTH},
    envelope::{
        validate_fields, verify_signature, DecodeError, Envelope, FieldError, SignatureError,
        UncheckedEnvelope,
    },
    stream::Deadline,
    Session,
};
use bytes::Bytes;
use sigmux_lib::Verify;
use std::{io, time::Duration};
use thiserror::Error;
use tokio::{
    io::{AsyncRead, AsyncReadExt as _, AsyncWrite, AsyncWriteExt as _},
    time::Instant,
};

/// time allowed to write an envelope on a stream
pub const SEND_DEADLINE: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("cannot open a new stream")]
    OpenFailed(#[source] io::Error),

    #[error("cannot accept a new stream")]
    AcceptFailed(#[source] io::Error),

    #[error("stream I/O failed")]
    Io(#[from] io::Error),

    #[error("invalid frame")]
    Framing(#[from] FramingError),

    #[error("only wrote {written} / {expected} bytes to stream")]
    ShortWrite { written: usize, expected: usize },

    #[error("stream ended before the {expected} bytes of the frame were received")]
    TruncatedBody { expected: usize },

    #[error("cannot decode the envelope")]
    DecodeFailed(#[from] DecodeError),

    #[error("received an invalid envelope")]
    InvalidEnvelope(#[from] FieldError),

    #[error("received an envelope with a bad signature")]
    BadSignature(#[from] SignatureError),
}

/// send the envelope on a new stream of the `session`
///
/// the whole operation, opening the stream included, has [`SEND_DEADLINE`]
/// to complete. The function returns once all the bytes have been written
/// and flushed, it does not wait for the remote peer to acknowledge them.
#[tracing::instrument(skip(session, envelope), level = "debug")]
pub async fn send<S>(session: &S, envelope: &Envelope) -> Result<(), TransportError>
where
    S: Session + ?Sized,
{
    let deadline = Instant::now() + SEND_DEADLINE;

    let stream = tokio::time::timeout_at(deadline, session.open_stream())
        .await
        .unwrap_or_else(|_| {
            Err(io::Error::new(
                io::ErrorKind::TimedOut,
                "no stream opened before the deadline",
            ))
        })
        .map_err(TransportError::OpenFailed)?;
    let mut stream = Deadline::new(stream);
    stream.set_deadline(Some(deadline));

    let result = write_frame(&mut stream, &envelope.to_bytes()).await;

    teardown(&mut stream).await;

    if result.is_ok() {
        tracing::debug!("envelope sent");
    }
    result
}

/// accept the next stream of the `session` and read one envelope from it
///
/// blocks until the remote peer opens a stream, then reading the
/// envelope has until `deadline` to complete.
///
/// The returned envelope has all its fields and its signature has been
/// checked with `verifier`.
#[tracing::instrument(skip(session, verifier), level = "debug")]
pub async fn receive<S, V>(
    session: &S,
    deadline: Instant,
    verifier: &V,
) -> Result<Envelope, TransportError>
where
    S: Session + ?Sized,
    V: Verify + ?Sized,
{
    let stream = session
        .accept_stream()
        .await
        .map_err(TransportError::AcceptFailed)?;

    receive_on(stream, deadline, verifier).await
}

/// like [`receive`] but the deadline is set to `timeout` after the stream
/// was accepted
#[tracing::instrument(skip(session, verifier), level = "debug")]
pub async fn receive_within<S, V>(
    session: &S,
    timeout: Duration,
    verifier: &V,
) -> Result<Envelope, TransportError>
where
    S: Session + ?Sized,
    V: Verify + ?Sized,
{
    let stream = session
        .accept_stream()
        .await
        .map_err(TransportError::AcceptFailed)?;

    receive_on(stream, Instant::now() + timeout, verifier).await
}

async fn receive_on<S, V>(
    stream: S,
    deadline: Instant,
    verifier: &V,
) -> Result<Envelope, TransportError>
where
    S: AsyncRead + AsyncWrite + Unpin,
    V: Verify + ?Sized,
{
    let mut stream = Deadline::new(stream);
    stream.set_deadline(Some(deadline));

    let result = read_envelope(&mut stream, verifier).await;

    teardown(&mut stream).await;

    match &result {
        Ok(envelope) => {
            tracing::debug!(sender = %envelope.sender().address(), "envelope received")
        }
        Err(error @ TransportError::BadSignature(_)) => {
            tracing::warn!(reason = %error, "peer misbehaved")
        }
        Err(error @ TransportError::TruncatedBody { .. }) => {
            tracing::warn!(reason = %error, "peer misbehaved")
        }
        Err(error) => tracing::debug!(reason = %error, "cannot receive envelope"),
    }
    result
}

async fn write_frame<W>(writer: &mut W, body: &[u8]) -> Result<(), TransportError>
where
    W: AsyncWrite + Unpin,
{
    let frame = encode_frame(body);

    let mut written = 0;
    while written < frame.len() {
        match writer.write(&frame[written..]).await? {
            0 => break,
            n => written += n,
        }
    }

    writer.flush().await?;

    if written != frame.len() {
        return Err(TransportError::ShortWrite {
            written,
            expected: frame.len(),
        });
    }

    Ok(())
}

async fn read_envelope<S, V>(
    stream: &mut Deadline<S>,
    verifier: &V,
) -> Result<Envelope, TransportError>
where
    S: AsyncRead + AsyncWrite + Unpin,
    V: Verify + ?Sized,
{
    let declared = read_frame_prefix(stream).await?;

    let mut body = vec![0; declared];
    if let Err(error) = stream.read_exact(&mut body).await {
        if error.kind() == io::ErrorKind::UnexpectedEof {
            // potentially malicious or dead peer, kill the stream now
            if let Err(error) = stream.shutdown().await {
                tracing::debug!(reason = %error, "cannot force the stream closed");
            }
            return Err(TransportError::TruncatedBody { expected: declared });
        }
        return Err(error.into());
    }

    let envelope = UncheckedEnvelope::decode(Bytes::from(body))?;
    let envelope = validate_fields(envelope)?;
    verify_signature(&envelope, verifier)?;

    Ok(envelope)
}

/// read the length prefix of the frame, one byte at a time so nothing
/// passed the prefix is consumed from the stream.
async fn read_frame_prefix<R>(reader: &mut R) -> Result<usize, TransportError>
where
    R: AsyncRead + Unpin,
{
    let mut probe = [0; PREFIX_PROBE_LENGTH];

    for len in 1..=PREFIX_PROBE_LENGTH {
        let byte = reader.read_u8().await?;
        probe[len - 1] = byte;

        if varint::is_last(byte) {
            let (declared, _) = decode_frame_prefix(&probe[..len])?;
            return Ok(declared);
        }
    }

    Err(FramingError::Malformed.into())
}

async fn teardown<S>(stream: &mut Deadline<S>)
where
    S: AsyncWrite + Unpin,
{
    stream.set_deadline(None);

    if let Err(error) = stream.shutdown().await {
        tracing::debug!(reason = %error, "cannot close the stream");
    }
}
