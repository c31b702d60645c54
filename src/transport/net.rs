// MIT License - Copyright (c) 2026 Peter Wright
// Network connector: Bluetooth RFCOMM or a serial-over-TCP gateway

use std::io;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::time::Duration;
use tracing::{debug, info};

use crate::config::PeerAddress;
use crate::constants::DEFAULT_WRITE_TIMEOUT;
use crate::transport::stream::StreamTransport;
use crate::transport::Connector;

/// Any stream a peer can be reached over.
pub trait PeerStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> PeerStream for T {}

pub type BoxedStream = Box<dyn PeerStream>;

/// Connects to a [`PeerAddress`] with the platform networking stack.
#[derive(Debug, Clone)]
pub struct NetConnector {
    write_timeout: Duration,
}

impl Default for NetConnector {
    fn default() -> Self {
        Self::new(DEFAULT_WRITE_TIMEOUT)
    }
}

impl NetConnector {
    pub fn new(write_timeout: Duration) -> Self {
        Self { write_timeout }
    }
}

impl Connector for NetConnector {
    type Transport = StreamTransport<BoxedStream>;

    async fn connect(&self, address: &PeerAddress) -> io::Result<Self::Transport> {
        let stream: BoxedStream = match address {
            PeerAddress::Tcp { host, port } => {
                debug!("Opening TCP connection to {}:{}", host, port);
                let stream = TcpStream::connect((host.as_str(), *port)).await?;
                stream.set_nodelay(true)?;
                Box::new(stream)
            }
            PeerAddress::Rfcomm { addr, channel } => {
                debug!("Opening RFCOMM connection to {}", address);
                connect_rfcomm(*addr, *channel).await?
            }
        };

        info!("Link to {} is up", address);
        Ok(StreamTransport::new(stream, self.write_timeout))
    }
}

#[cfg(feature = "rfcomm")]
async fn connect_rfcomm(addr: [u8; 6], channel: u8) -> io::Result<BoxedStream> {
    let target = bluer::rfcomm::SocketAddr::new(bluer::Address::new(addr), channel);
    let stream = bluer::rfcomm::Stream::connect(target).await?;
    Ok(Box::new(stream))
}

#[cfg(not(feature = "rfcomm"))]
async fn connect_rfcomm(_addr: [u8; 6], _channel: u8) -> io::Result<BoxedStream> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "RFCOMM support not compiled in (enable the `rfcomm` feature or use a tcp:// gateway)",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{Received, Transport};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_tcp_connect_and_exchange() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let peer = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 3];
            sock.read_exact(&mut buf).await.unwrap();
            sock.write_all(b"OK").await.unwrap();
            buf
        });

        let address = PeerAddress::Tcp {
            host: "127.0.0.1".to_string(),
            port,
        };
        let mut transport = NetConnector::default().connect(&address).await.unwrap();
        transport.send(b"0x1").await.unwrap();
        let reply = transport.receive(4, Duration::from_secs(5)).await.unwrap();

        assert_eq!(reply, Received::Data(b"OK".to_vec()));
        assert_eq!(&peer.await.unwrap(), b"0x1");
        transport.close().await;
    }

    #[tokio::test]
    async fn test_tcp_connect_refused() {
        // bind then drop to get a port nobody listens on
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let address = PeerAddress::Tcp {
            host: "127.0.0.1".to_string(),
            port,
        };
        assert!(NetConnector::default().connect(&address).await.is_err());
    }

    #[cfg(not(feature = "rfcomm"))]
    #[tokio::test]
    async fn test_rfcomm_unsupported_without_feature() {
        let address: PeerAddress = "14:41:05:05:88:77".parse().unwrap();
        let err = NetConnector::default().connect(&address).await.err().unwrap();
        assert_eq!(err.kind(), io::ErrorKind::Unsupported);
    }
}
