//! in memory sessions for the tests

use crate::{dispatch::Connect, Session};
use async_trait::async_trait;
use rand_chacha::{rand_core::SeedableRng as _, ChaChaRng};
use sigmux_lib::Identity;
use std::{
    collections::HashMap,
    io,
    pin::Pin,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    task::{Context, Poll},
};
use tokio::{
    io::{duplex, AsyncRead, AsyncWrite, DuplexStream, ReadBuf},
    sync::{mpsc, Mutex},
};

pub fn identity(seed: u64) -> Identity {
    Identity::generate(ChaChaRng::seed_from_u64(seed))
}

/// one end of an in memory session, see [`MemorySession::pair`]
pub struct MemorySession {
    outbound: mpsc::UnboundedSender<DuplexStream>,
    inbound: Mutex<mpsc::UnboundedReceiver<DuplexStream>>,
    capacity: usize,
    shutdowns: Arc<AtomicUsize>,
}

/// a stream counting how many times it was shut down
pub struct Tracked {
    inner: DuplexStream,
    shutdowns: Arc<AtomicUsize>,
}

/// connects to the registered sessions
#[derive(Default)]
pub struct MemoryConnector {
    sessions: HashMap<String, Arc<MemorySession>>,
}

impl MemorySession {
    /// two connected sessions, the streams opened on one are accepted by
    /// the other
    pub fn pair() -> (Self, Self) {
        Self::pair_with_capacity(64 * 1024)
    }

    /// like [`pair`](Self::pair), the streams buffer at most `capacity`
    /// bytes in each direction
    pub fn pair_with_capacity(capacity: usize) -> (Self, Self) {
        let (to_right, from_left) = mpsc::unbounded_channel();
        let (to_left, from_right) = mpsc::unbounded_channel();

        let left = Self {
            outbound: to_right,
            inbound: Mutex::new(from_right),
            capacity,
            shutdowns: Arc::new(AtomicUsize::new(0)),
        };
        let right = Self {
            outbound: to_left,
            inbound: Mutex::new(from_left),
            capacity,
            shutdowns: Arc::new(AtomicUsize::new(0)),
        };

        (left, right)
    }

    /// number of times the streams of this end were shut down
    pub fn shutdowns(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }

    fn track(&self, inner: DuplexStream) -> Tracked {
        Tracked {
            inner,
            shutdowns: Arc::clone(&self.shutdowns),
        }
    }
}

impl MemoryConnector {
    pub fn register(&mut self, address: impl Into<String>, session: Arc<MemorySession>) {
        self.sessions.insert(address.into(), session);
    }
}

#[async_trait]
impl Session for MemorySession {
    type Stream = Tracked;

    async fn open_stream(&self) -> io::Result<Self::Stream> {
        let (local, remote) = duplex(self.capacity);

        self.outbound
            .send(remote)
            .map_err(|_| io::Error::new(io::ErrorKind::NotConnected, "remote session closed"))?;

        Ok(self.track(local))
    }

    async fn accept_stream(&self) -> io::Result<Self::Stream> {
        let stream = self.inbound.lock().await.recv().await.ok_or_else(|| {
            io::Error::new(io::ErrorKind::ConnectionAborted, "remote session closed")
        })?;

        Ok(self.track(stream))
    }
}

#[async_trait]
impl Connect for MemoryConnector {
    type Session = Arc<MemorySession>;

    async fn connect(&self, address: &str) -> io::Result<Self::Session> {
        self.sessions.get(address).cloned().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::ConnectionRefused,
                format!("no session at {}", address),
            )
        })
    }
}

impl AsyncRead for Tracked {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_read(cx, buf)
    }
}

impl AsyncWrite for Tracked {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().inner).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let stream = self.get_mut();
        let poll = Pin::new(&mut stream.inner).poll_shutdown(cx);
        if poll.is_ready() {
            stream.shutdowns.fetch_add(1, Ordering::SeqCst);
        }
        poll
    }
}
