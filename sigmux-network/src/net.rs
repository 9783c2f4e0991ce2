/*!
[`Session`]s on top of TCP

there is no multiplexing here: every stream is its own TCP connection.
The [`Listener`] accepts the streams opened by the remote peers and the
[`Dialer`] opens streams toward one remote peer.
*/

use crate::{dispatch::Connect, Session};
use async_trait::async_trait;
use std::{
    fmt::{self, Display},
    io,
    net::SocketAddr,
};
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};

/// accept the streams opened by the remote peers
///
/// each inbound TCP connection is one stream.
pub struct Listener {
    listener: TcpListener,
}

/// open streams toward a remote peer
///
/// each stream is a new TCP connection to the peer's address.
#[derive(Debug, Clone)]
pub struct Dialer {
    address: String,
}

/// [`Connect`] to remote peers with a [`Dialer`]
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

fn unsupported(operation: &str) -> io::Error {
    io::Error::new(
        io::ErrorKind::Unsupported,
        format!("cannot {} streams with this session", operation),
    )
}

impl Listener {
    /// listen for inbound connections at the given address
    pub async fn new<A>(address: A) -> io::Result<Self>
    where
        A: ToSocketAddrs + Display,
    {
        let listener = TcpListener::bind(&address).await.map_err(|error| {
            io::Error::new(
                error.kind(),
                format!("cannot listen to {}: {}", address, error),
            )
        })?;

        Ok(Self { listener })
    }

    pub fn local_address(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

impl Dialer {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
        }
    }
}

#[async_trait]
impl Session for Listener {
    type Stream = TcpStream;

    async fn open_stream(&self) -> io::Result<Self::Stream> {
        Err(unsupported("open"))
    }

    async fn accept_stream(&self) -> io::Result<Self::Stream> {
        let (stream, peer_addr) = self.listener.accept().await?;

        tracing::debug!(peer_addr = %peer_addr, "inbound stream");

        Ok(stream)
    }
}

#[async_trait]
impl Session for Dialer {
    type Stream = TcpStream;

    async fn open_stream(&self) -> io::Result<Self::Stream> {
        TcpStream::connect(self.address.as_str()).await
    }

    async fn accept_stream(&self) -> io::Result<Self::Stream> {
        Err(unsupported("accept"))
    }
}

#[async_trait]
impl Connect for TcpConnector {
    type Session = Dialer;

    async fn connect(&self, address: &str) -> io::Result<Self::Session> {
        Ok(Dialer::new(address))
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("local_address", &self.listener.local_addr().ok())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dispatch::queue, receive, send, testing::identity, DispatchError, Dispatcher, Envelope,
        TransportError,
    };
    use sigmux_lib::Ed25519;
    use std::time::Duration;
    use tokio::time::Instant;

    fn deadline() -> Instant {
        Instant::now() + Duration::from_secs(5)
    }

    #[tokio::test]
    async fn envelope_over_tcp() {
        let listener = Listener::new("127.0.0.1:0").await.unwrap();
        let address = listener.local_address().unwrap().to_string();

        let envelope = Envelope::sign("ping", &identity(1), address.as_str());
        send(&Dialer::new(address.as_str()), &envelope).await.unwrap();

        let received = receive(&listener, deadline(), &Ed25519).await.unwrap();
        assert_eq!(received, envelope);
    }

    #[tokio::test]
    async fn dispatch_over_tcp() {
        let listener = Listener::new("127.0.0.1:0").await.unwrap();
        let address = listener.local_address().unwrap().to_string();

        let (writer, packets) = queue(4);
        tokio::spawn(Dispatcher::new(TcpConnector).run(packets));

        let envelope = Envelope::sign("ping", &identity(1), address.as_str());
        writer.write(address.as_str(), envelope.clone()).await.unwrap();

        let received = receive(&listener, deadline(), &Ed25519).await.unwrap();
        assert_eq!(received, envelope);
    }

    #[tokio::test]
    async fn connection_refused() {
        // bind then drop to get an address nobody listens to
        let address = {
            let listener = Listener::new("127.0.0.1:0").await.unwrap();
            listener.local_address().unwrap().to_string()
        };

        let (writer, packets) = queue(4);
        tokio::spawn(Dispatcher::new(TcpConnector).run(packets));

        let envelope = Envelope::sign("ping", &identity(1), "127.0.0.1:1");
        assert!(matches!(
            writer.write(address, envelope).await,
            Err(DispatchError::Delivery(TransportError::OpenFailed(_)))
        ));
    }

    #[tokio::test]
    async fn unsupported_directions() {
        let listener = Listener::new("127.0.0.1:0").await.unwrap();
        let dialer = Dialer::new("127.0.0.1:1");

        let error = listener.open_stream().await.unwrap_err();
        assert_eq!(error.kind(), io::ErrorKind::Unsupported);

        let error = dialer.accept_stream().await.unwrap_err();
        assert_eq!(error.kind(), io::ErrorKind::Unsupported);
    }

    #[tokio::test]
    async fn listen_on_a_used_address() {
        let listener = Listener::new("127.0.0.1:0").await.unwrap();
        let address = listener.local_address().unwrap();

        assert!(Listener::new(address).await.is_err());
    }
}
