// MIT License - Copyright (c) 2026 Peter Wright
// Byte-stream transport over any tokio stream

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::{Duration, timeout};
use tracing::{debug, trace};

use crate::protocol::printable;
use crate::transport::{Received, Transport};

/// [`Transport`] over an async stream (TCP socket, RFCOMM socket, in-memory pipe).
pub struct StreamTransport<S> {
    stream: Option<S>,
    write_timeout: Duration,
}

impl<S> StreamTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, write_timeout: Duration) -> Self {
        Self {
            stream: Some(stream),
            write_timeout,
        }
    }

    /// Whether `close` has not been called yet.
    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    fn stream_mut(&mut self) -> io::Result<&mut S> {
        self.stream
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "transport closed"))
    }
}

impl<S> Transport for StreamTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    async fn send(&mut self, bytes: &[u8]) -> io::Result<()> {
        let write_timeout = self.write_timeout;
        let stream = self.stream_mut()?;
        trace!("Writing {}", printable(bytes));

        let write = async {
            stream.write_all(bytes).await?;
            stream.flush().await
        };
        match timeout(write_timeout, write).await {
            Ok(result) => result,
            Err(_) => Err(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("write timed out after {} ms", write_timeout.as_millis()),
            )),
        }
    }

    async fn receive(&mut self, max_len: usize, wait: Duration) -> io::Result<Received> {
        let stream = self.stream_mut()?;
        let mut buf = vec![0u8; max_len.max(1)];

        match timeout(wait, stream.read(&mut buf)).await {
            Err(_) => Ok(Received::TimedOut),
            Ok(Ok(0)) => Ok(Received::Closed),
            Ok(Ok(n)) => {
                buf.truncate(n);
                Ok(Received::Data(buf))
            }
            Ok(Err(e)) => Err(e),
        }
    }

    async fn close(&mut self) {
        let write_timeout = self.write_timeout;
        if let Some(mut stream) = self.stream.take() {
            match timeout(write_timeout, stream.shutdown()).await {
                Ok(Ok(())) => debug!("Transport closed"),
                Ok(Err(e)) => debug!("Transport shutdown error (ignored): {}", e),
                Err(_) => debug!("Transport shutdown timed out, dropping stream"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_send_and_receive() {
        let (client, mut peer) = tokio::io::duplex(64);
        let mut transport = StreamTransport::new(client, Duration::from_secs(1));

        transport.send(b"0x1").await.unwrap();
        let mut buf = [0u8; 3];
        peer.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"0x1");

        peer.write_all(b"OK\r\n").await.unwrap();
        let got = transport.receive(4, Duration::from_secs(1)).await.unwrap();
        assert_eq!(got, Received::Data(b"OK\r\n".to_vec()));
    }

    #[tokio::test]
    async fn test_receive_respects_max_len() {
        let (client, mut peer) = tokio::io::duplex(64);
        let mut transport = StreamTransport::new(client, Duration::from_secs(1));

        peer.write_all(b"0x40x2").await.unwrap();
        let first = transport.receive(3, Duration::from_secs(1)).await.unwrap();
        let second = transport.receive(3, Duration::from_secs(1)).await.unwrap();
        assert_eq!(first, Received::Data(b"0x4".to_vec()));
        assert_eq!(second, Received::Data(b"0x2".to_vec()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_receive_times_out() {
        let (client, _peer) = tokio::io::duplex(64);
        let mut transport = StreamTransport::new(client, Duration::from_secs(1));

        let got = transport.receive(3, Duration::from_secs(5)).await.unwrap();
        assert_eq!(got, Received::TimedOut);
    }

    #[tokio::test]
    async fn test_receive_reports_peer_close() {
        let (client, peer) = tokio::io::duplex(64);
        let mut transport = StreamTransport::new(client, Duration::from_secs(1));
        drop(peer);

        let got = transport.receive(3, Duration::from_secs(1)).await.unwrap();
        assert_eq!(got, Received::Closed);
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let (client, mut peer) = tokio::io::duplex(64);
        let mut transport = StreamTransport::new(client, Duration::from_secs(1));

        transport.close().await;
        assert!(!transport.is_open());
        transport.close().await;

        // peer sees end of stream
        let mut buf = [0u8; 1];
        assert_eq!(peer.read(&mut buf).await.unwrap(), 0);

        let err = transport.send(b"OK\r\n").await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotConnected);
    }
}
