pub mod config;

pub use self::config::Config;
use crate::secret::Secret;
use anyhow::{anyhow, bail, Result};
use bytes::Bytes;
use sigmux_lib::{Ed25519, Sign as _};
use sigmux_network::{
    net::{Listener, TcpConnector},
    queue, receive_within, DispatchError, Dispatcher, Envelope, TransportError, Writer,
};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::{sync::mpsc, task::JoinHandle, time::Instant};

const PING: &[u8] = b"ping";
const PONG: &[u8] = b"pong";

pub struct Network {
    command: mpsc::Sender<Command>,
    local_address: SocketAddr,
    outbound: Outbound,
    handle: JoinHandle<Result<()>>,
}

/// signs and queues the node's outbound envelopes
#[derive(Clone)]
struct Outbound {
    writer: Writer,
    secret: Secret,
    public_address: String,
}

struct Runner {
    outbound: Outbound,
    command: mpsc::Receiver<Command>,
    inbound: mpsc::Receiver<Envelope>,
    tasks: Vec<JoinHandle<()>>,
    config: Config,
    /// pongs sent since the last heart beat
    pongs: usize,
}

enum Command {
    Shutdown,
}

impl Outbound {
    async fn write(&self, address: String, payload: Bytes) -> Result<(), DispatchError> {
        let envelope = Envelope::sign(payload, &self.secret, self.public_address.as_str());

        self.writer.write(address, envelope).await
    }

    /// write on a separate task so the caller is not held for the
    /// duration of the write
    fn spawn_write(&self, address: String, payload: &'static [u8]) {
        let outbound = self.clone();

        tokio::spawn(async move {
            match outbound.write(address.clone(), Bytes::from_static(payload)).await {
                Ok(()) => tracing::debug!(address = %address, "envelope delivered"),
                Err(error) => {
                    tracing::warn!(address = %address, reason = %error, "cannot deliver envelope")
                }
            }
        });
    }
}

impl Network {
    pub async fn new(secret: Secret, config: Config) -> Result<Self> {
        config.validate()?;

        let (command_sender, command_receiver) = mpsc::channel(8);
        let (inbound_sender, inbound_receiver) = mpsc::channel(config.queue_size);

        let listen_address = config.listen_address;
        let public_address = config.public_address;
        tracing::info!(
            listen_address = %listen_address,
            public_address = %public_address,
            id = %secret.public_key(),
            "listening for inbound streams"
        );
        let listener = Arc::new(Listener::new(listen_address).await?);
        let local_address = listener.local_address()?;

        let (writer, packets) = queue(config.queue_size);
        let writer = writer.with_timeout(config.write_timeout);

        let mut tasks = Vec::with_capacity(config.receivers + 1);
        tasks.push(tokio::spawn(Dispatcher::new(TcpConnector).run(packets)));
        for _ in 0..config.receivers {
            tasks.push(tokio::spawn(receive_loop(
                Arc::clone(&listener),
                config.receive_timeout,
                inbound_sender.clone(),
            )));
        }

        let outbound = Outbound {
            writer,
            secret,
            public_address: public_address.to_string(),
        };

        let runner = Runner {
            outbound: outbound.clone(),
            command: command_receiver,
            inbound: inbound_receiver,
            tasks,
            config,
            pongs: 0,
        };

        let handle = tokio::spawn(async move {
            let mut runner = runner;
            let result = runner.run().await;
            runner.stop();
            result
        });

        Ok(Self {
            command: command_sender,
            local_address,
            outbound,
            handle,
        })
    }

    /// the address the node is listening to
    pub fn local_address(&self) -> SocketAddr {
        self.local_address
    }

    /// sign `payload` and send it to the peer at `address`
    pub async fn write(
        &self,
        address: impl Into<String>,
        payload: impl Into<Bytes>,
    ) -> Result<(), DispatchError> {
        self.outbound.write(address.into(), payload.into()).await
    }

    pub async fn shutdown(self) -> Result<()> {
        self.command
            .send(Command::Shutdown)
            .await
            .map_err(|_| anyhow!("Cannot send shutdown command to the network"))?;

        let mut handle = self.handle;

        tokio::select! {
            result = &mut handle => {
                match result {
                    Ok(result) => result,
                    Err(error) => bail!("error while waiting for network to shutdown: {}", error)
                }
            }
            _ = tokio::time::sleep(Duration::from_millis(200)) => {
                handle.abort();
                bail!("shutdown timedout, aborting instead...")
            }
        }
    }
}

/// receive the envelopes of the inbound streams, one stream at a time
async fn receive_loop(
    listener: Arc<Listener>,
    timeout: Duration,
    inbound: mpsc::Sender<Envelope>,
) {
    loop {
        match receive_within(listener.as_ref(), timeout, &Ed25519).await {
            Ok(envelope) => {
                if inbound.send(envelope).await.is_err() {
                    break;
                }
            }
            Err(TransportError::AcceptFailed(error)) => {
                tracing::warn!(reason = %error, "cannot accept inbound stream");
                // the listener may be out of resources, give it some time
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
            Err(error) => tracing::debug!(reason = %error, "invalid inbound stream"),
        }
    }
}

impl Runner {
    #[tracing::instrument(
        skip(self),
        fields(
            listen_address = %self.config.listen_address,
            public_address = %self.config.public_address,
        ),
        level = "info"
    )]
    async fn run(&mut self) -> Result<()> {
        let period = self.config.heart_beat;
        let mut heart_beat = tokio::time::interval_at(Instant::now() + period, period);

        loop {
            tokio::select! {
                _ = heart_beat.tick() => {
                    self.beat()
                }
                // handle receiving commands
                command = self.command.recv() => {
                    let stop = self.handle_command(command)?;
                    if stop { break; }
                }
                // envelopes verified by the receive loops
                envelope = self.inbound.recv() => {
                    match envelope {
                        Some(envelope) => self.handle_envelope(envelope),
                        None => bail!("all the receive loops stopped"),
                    }
                }
            }
        }

        Ok(())
    }

    fn beat(&mut self) {
        self.pongs = 0;

        for peer in self.config.ping_peers.iter() {
            self.outbound.spawn_write(peer.clone(), PING);
        }

        tracing::debug!(ping_peers = self.config.ping_peers.len(), "beat");
    }

    fn handle_command(&mut self, command: Option<Command>) -> Result<bool> {
        match command {
            None => bail!("failed to receive anymore commands"),
            Some(Command::Shutdown) => Ok(true),
        }
    }

    /// a `ping` is answered with a `pong` to the address the sender wrote
    /// in the envelope
    ///
    /// only the payload is signed: anyone replaying a captured `ping` can
    /// set any address. At most `queue_size` pongs are sent per heart beat.
    fn handle_envelope(&mut self, envelope: Envelope) {
        let sender = envelope.sender();

        tracing::info!(
            address = %sender.address(),
            id = %hex::encode(sender.public_key()),
            size = envelope.payload().len(),
            "envelope received"
        );

        if envelope.payload().as_ref() == PING {
            if self.pongs < self.config.queue_size {
                self.pongs += 1;
                self.outbound.spawn_write(sender.address().to_owned(), PONG);
            } else {
                tracing::debug!(address = %sender.address(), "too many pings, not answering");
            }
        }
    }

    fn stop(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}
