/*!
queue of outbound envelopes

the [`Writer`] turns the sending of an envelope into a call bounded in
time: the envelope is queued as a [`Packet`] and whoever consumes the
[`Packets`] (typically the [`Dispatcher`]) sends it and completes the
packet with the outcome.

A [`Writer::write`] that timed out abandons its packet, the packet is
not cancelled and may still be sent.
*/

use crate::{transport, Envelope, Session, TransportError};
use async_trait::async_trait;
use std::{fmt, io, sync::Arc, time::Duration};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::Instrument as _;

/// default time a [`Writer::write`] waits for the outcome of the send
pub const WRITE_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("cannot deliver the envelope")]
    Delivery(#[source] TransportError),

    #[error("no outcome after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("the dispatch queue is closed")]
    QueueClosed,

    #[error("the envelope was dropped before being sent")]
    Dropped,
}

/// an envelope to send to `target`, with the slot to write the outcome in
pub struct Packet {
    target: String,
    envelope: Envelope,
    completion: oneshot::Sender<Result<(), TransportError>>,
}

/// producing end of the dispatch queue
#[derive(Clone)]
pub struct Writer {
    queue: mpsc::Sender<Packet>,
    timeout: Duration,
}

/// consuming end of the dispatch queue
pub struct Packets {
    queue: mpsc::Receiver<Packet>,
}

/// create a new dispatch queue holding up to `capacity` packets
///
/// # panics
///
/// this function panics if `capacity` is `0`.
pub fn queue(capacity: usize) -> (Writer, Packets) {
    let (sender, receiver) = mpsc::channel(capacity);

    let writer = Writer {
        queue: sender,
        timeout: WRITE_TIMEOUT,
    };
    let packets = Packets { queue: receiver };

    (writer, packets)
}

impl Packet {
    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    /// write the outcome of sending the envelope
    ///
    /// this never blocks. If the writer already gave up on the packet the
    /// outcome is only logged.
    pub fn complete(self, result: Result<(), TransportError>) {
        if let Err(result) = self.completion.send(result) {
            match result {
                Ok(()) => tracing::debug!(address = %self.target, "late delivery"),
                Err(error) => {
                    tracing::debug!(address = %self.target, reason = %error, "late delivery failure")
                }
            }
        }
    }
}

impl Writer {
    /// set how long [`write`](Self::write) waits before giving up
    pub fn with_timeout(self, timeout: Duration) -> Self {
        Self { timeout, ..self }
    }

    /// queue the `envelope` to be sent to `address` and wait for the
    /// outcome
    ///
    /// waiting for room in the queue counts toward the timeout.
    pub async fn write(
        &self,
        address: impl Into<String>,
        envelope: Envelope,
    ) -> Result<(), DispatchError> {
        let (completion, outcome) = oneshot::channel();
        let packet = Packet {
            target: address.into(),
            envelope,
            completion,
        };

        let dispatch = async {
            self.queue
                .send(packet)
                .await
                .map_err(|_| DispatchError::QueueClosed)?;

            outcome.await.map_err(|_| DispatchError::Dropped)
        };

        match tokio::time::timeout(self.timeout, dispatch).await {
            Err(_) => Err(DispatchError::Timeout(self.timeout)),
            Ok(Err(error)) => Err(error),
            Ok(Ok(result)) => result.map_err(DispatchError::Delivery),
        }
    }
}

impl Packets {
    /// wait for the next packet, `None` once every [`Writer`] is dropped
    pub async fn next(&mut self) -> Option<Packet> {
        self.queue.recv().await
    }
}

/// establish [`Session`]s with remote peers
#[async_trait]
pub trait Connect: Send + Sync + 'static {
    type Session: Session + 'static;

    async fn connect(&self, address: &str) -> io::Result<Self::Session>;
}

/// sends every packet of the queue on its own task
pub struct Dispatcher<C> {
    connector: Arc<C>,
}

impl<C> Dispatcher<C>
where
    C: Connect,
{
    pub fn new(connector: C) -> Self {
        Self {
            connector: Arc::new(connector),
        }
    }

    /// consume the packets until the queue is closed
    pub async fn run(self, mut packets: Packets) {
        while let Some(packet) = packets.next().await {
            let connector = Arc::clone(&self.connector);
            let span = tracing::debug_span!("dispatch", address = %packet.target());

            tokio::spawn(dispatch(connector, packet).instrument(span));
        }

        tracing::debug!("dispatch queue closed");
    }
}

async fn dispatch<C>(connector: Arc<C>, packet: Packet)
where
    C: Connect,
{
    let result = match connector.connect(packet.target()).await {
        Ok(session) => transport::send(&session, packet.envelope()).await,
        Err(error) => Err(TransportError::OpenFailed(error)),
    };

    if let Err(error) = &result {
        tracing::debug!(reason = %error, "cannot send envelope");
    }

    packet.complete(result);
}

impl fmt::Debug for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Packet")
            .field("target", &self.target)
            .field("envelope", &self.envelope)
            .finish()
    }
}

impl fmt::Debug for Writer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Writer")
            .field("timeout", &self.timeout)
            .finish()
    }
}
