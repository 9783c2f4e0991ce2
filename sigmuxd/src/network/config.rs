use anyhow::{ensure, Context as _, Result};
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, time::Duration};
use structopt::StructOpt;

/// network configuration of the node
///
/// set the different values that controls the nodes behavior
#[derive(StructOpt, Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// this is the address the network will listen for incoming
    /// streams
    #[structopt(long = "listen-address", default_value = "[::1]:9876")]
    pub listen_address: SocketAddr,

    /// the address that can be used to reach to us
    ///
    /// This is the address set in the envelopes we send so the remote
    /// peers know where to reply. It may differ from the `listen_address`
    /// if there is port forwarding in place.
    #[structopt(long = "public-address", default_value = "[::1]:9876")]
    pub public_address: SocketAddr,

    /// the number of envelopes that can wait in the dispatch queue
    #[structopt(long = "queue-size", default_value = "64")]
    #[serde(default = "default_queue_size")]
    pub queue_size: usize,

    /// the number of inbound streams processed concurrently
    #[structopt(long = "receivers", default_value = "4")]
    #[serde(default = "default_receivers")]
    pub receivers: usize,

    /// the time an inbound stream has to deliver its envelope (in seconds)
    #[structopt(long = "receive-timeout", default_value = "5", parse(try_from_str = duration))]
    #[serde(default = "default_receive_timeout", with = "seconds")]
    pub receive_timeout: Duration,

    /// the time to wait for an outbound envelope to be sent (in seconds)
    #[structopt(long = "write-timeout", default_value = "3", parse(try_from_str = duration))]
    #[serde(default = "default_write_timeout", with = "seconds")]
    pub write_timeout: Duration,

    /// the heart beat of the network (in seconds).
    ///
    /// make sure to wake up the network every `heart_beat`
    /// so we can perform some _sanity_ operations
    #[structopt(long = "heart-beat", default_value = "1", parse(try_from_str = duration))]
    #[serde(default = "default_heart_beat", with = "seconds")]
    pub heart_beat: Duration,

    /// the peers to send a `ping` to at every heart beat
    #[structopt(long = "ping-peer")]
    #[serde(default)]
    pub ping_peers: Vec<String>,
}

impl Config {
    /// check the values the network cannot run with
    pub fn validate(&self) -> Result<()> {
        ensure!(self.queue_size > 0, "the queue size must be at least 1");
        ensure!(
            self.heart_beat >= Duration::from_secs(1),
            "the heart beat must be at least 1 second"
        );
        Ok(())
    }
}

fn default_queue_size() -> usize {
    64
}

fn default_receivers() -> usize {
    4
}

fn default_receive_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_write_timeout() -> Duration {
    sigmux_network::dispatch::WRITE_TIMEOUT
}

fn default_heart_beat() -> Duration {
    Duration::from_secs(1)
}

fn duration(s: &str) -> Result<Duration> {
    let i = s
        .parse()
        .context("expecting to parse a duration in seconds")?;
    Ok(Duration::from_secs(i))
}

/// durations are written as a number of seconds in the configuration file
mod seconds {
    use serde::{Deserialize as _, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        let localhost = SocketAddr::from(([0, 0, 0, 0, 0, 0, 0, 1], 9876));

        Self {
            listen_address: localhost,
            public_address: localhost,
            queue_size: default_queue_size(),
            receivers: default_receivers(),
            receive_timeout: default_receive_timeout(),
            write_timeout: default_write_timeout(),
            heart_beat: default_heart_beat(),
            ping_peers: Vec::new(),
        }
    }
}
