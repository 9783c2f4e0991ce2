use async_trait::async_trait;
use std::{io, sync::Arc};
use tokio::io::{AsyncRead, AsyncWrite};

/// a connection with a remote peer yielding independent bidirectional streams
///
/// this is typically a stream multiplexer running on top of a single
/// connection, though anything able to open and accept byte streams will do
/// (see [`net`](crate::net) for a TCP based one).
///
/// Streams may be opened and accepted concurrently, hence `&self`.
/// Closing a stream is done with [`shutdown`].
///
/// [`shutdown`]: tokio::io::AsyncWriteExt::shutdown
#[async_trait]
pub trait Session: Send + Sync {
    type Stream: AsyncRead + AsyncWrite + Unpin + Send;

    /// open a new outbound stream with the remote peer
    async fn open_stream(&self) -> io::Result<Self::Stream>;

    /// wait for the remote peer to open a new stream
    ///
    /// this returns an error if the session failed and no more streams
    /// can be accepted.
    async fn accept_stream(&self) -> io::Result<Self::Stream>;
}

#[async_trait]
impl<S> Session for Arc<S>
where
    S: Session + ?Sized,
{
    type Stream = S::Stream;

    async fn open_stream(&self) -> io::Result<Self::Stream> {
        self.as_ref().open_stream().await
    }

    async fn accept_stream(&self) -> io::Result<Self::Stream> {
        self.as_ref().accept_stream().await
    }
}
