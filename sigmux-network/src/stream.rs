use std::{
    future::Future as _,
    io,
    pin::Pin,
    task::{Context, Poll},
};
use tokio::{
    io::{AsyncRead, AsyncWrite, ReadBuf},
    time::{sleep_until, Instant, Sleep},
};

/// a stream with an optional deadline
///
/// once the deadline has elapsed every read, write or flush of the stream
/// fails with [`io::ErrorKind::TimedOut`]. Closing the stream is not
/// affected by the deadline.
///
/// The deadline is absolute and stays until it is changed with
/// [`Deadline::set_deadline`].
pub struct Deadline<S> {
    inner: S,
    sleep: Option<Pin<Box<Sleep>>>,
}

impl<S> Deadline<S> {
    pub fn new(inner: S) -> Self {
        Self { inner, sleep: None }
    }

    /// set the deadline of the stream, `None` removes the deadline
    pub fn set_deadline(&mut self, deadline: Option<Instant>) {
        match deadline {
            None => self.sleep = None,
            Some(deadline) => match self.sleep.as_mut() {
                Some(sleep) => sleep.as_mut().reset(deadline),
                None => self.sleep = Some(Box::pin(sleep_until(deadline))),
            },
        }
    }

    fn poll_elapsed(&mut self, cx: &mut Context<'_>) -> io::Result<()> {
        if let Some(sleep) = self.sleep.as_mut() {
            if sleep.as_mut().poll(cx).is_ready() {
                return Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    "stream deadline exceeded",
                ));
            }
        }

        Ok(())
    }
}

impl<S> AsyncRead for Deadline<S>
where
    S: AsyncRead + Unpin,
{
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let stream = self.get_mut();
        if let Err(error) = stream.poll_elapsed(cx) {
            return Poll::Ready(Err(error));
        }
        Pin::new(&mut stream.inner).poll_read(cx, buf)
    }
}

impl<S> AsyncWrite for Deadline<S>
where
    S: AsyncWrite + Unpin,
{
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let stream = self.get_mut();
        if let Err(error) = stream.poll_elapsed(cx) {
            return Poll::Ready(Err(error));
        }
        Pin::new(&mut stream.inner).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let stream = self.get_mut();
        if let Err(error) = stream.poll_elapsed(cx) {
            return Poll::Ready(Err(error));
        }
        Pin::new(&mut stream.inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let stream = self.get_mut();
        Pin::new(&mut stream.inner).poll_shutdown(cx)
    }
}
