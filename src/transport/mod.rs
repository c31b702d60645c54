// MIT License - Copyright (c) 2026 Peter Wright
// Door link transports

pub mod net;
pub mod stream;

use std::io;
use std::time::Duration;

use crate::config::PeerAddress;

pub use net::NetConnector;
pub use stream::StreamTransport;

/// Result of a bounded receive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Received {
    /// Between one and `max_len` bytes.
    Data(Vec<u8>),
    /// Nothing arrived before the timeout.
    TimedOut,
    /// The peer closed the stream.
    Closed,
}

/// Byte-stream connection to the peer.
///
/// Owned by exactly one session; every operation is bounded.
#[allow(async_fn_in_trait)]
pub trait Transport {
    /// Write the whole buffer.
    async fn send(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Wait up to `timeout` for data. May return fewer than `max_len` bytes.
    async fn receive(&mut self, max_len: usize, timeout: Duration) -> io::Result<Received>;

    /// Release the connection. Calling it again is a no-op.
    async fn close(&mut self);
}

/// Opens transports to a peer.
///
/// The caller bounds the attempt with its own connect timeout.
#[allow(async_fn_in_trait)]
pub trait Connector {
    type Transport: Transport;

    async fn connect(&self, address: &PeerAddress) -> io::Result<Self::Transport>;
}
