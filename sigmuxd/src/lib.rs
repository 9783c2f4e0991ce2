/*!
# SIGMUX node

a node listening for signed envelopes from its peers and sending its own
through the dispatch queue of [`sigmux_network`].
*/

mod config;
pub mod network;
pub mod secret;

pub use self::config::Config;
