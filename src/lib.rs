// MIT License - Copyright (c) 2026 Peter Wright
// Door link
//
//! # door-link
//!
//! Client-side session controller for a door-status peer (a small
//! microcontroller behind an HC-05 style serial-over-radio module).
//!
//! A session runs three phases on a single task: connect to the peer,
//! exchange the `0x1` / `OK` handshake, then acknowledge every door event
//! until the peer stops sending keepalives, the link fails, or the host
//! cancels. Retry policy lives outside the session, in [`supervise`].
//!
//! ## Quick Start
//!
//! ```no_run
//! use door_link::{LinkConfig, NetConnector, SessionController};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = LinkConfig::builder()
//!         .peer("tcp://door-gateway.local:4000".parse()?)
//!         .build();
//!
//!     let mut session = SessionController::new(
//!         config.peer.clone(),
//!         NetConnector::new(config.write_timeout),
//!     );
//!
//!     let cancel = CancellationToken::new();
//!     let stop = cancel.clone();
//!     tokio::spawn(async move {
//!         let _ = tokio::signal::ctrl_c().await;
//!         stop.cancel();
//!     });
//!
//!     if let Err(e) = session.run(&config, &cancel).await {
//!         eprintln!("session ended: {e}");
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod constants;
pub mod error;
pub mod event;
pub mod protocol;
pub mod session;
pub mod supervisor;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

// Re-exports for convenience
pub use config::{AddressParseError, LinkConfig, LinkConfigBuilder, PeerAddress};
pub use error::{ConnectError, HandshakeError, HandshakeFailure, LinkError, Result, SessionError};
pub use event::{EventReceiver, SessionEvent};
pub use protocol::{Decoded, EventCode, FrameAssembler, decode_events};
pub use session::{Liveness, SessionController, SessionState};
pub use supervisor::supervise;
pub use transport::{Connector, NetConnector, Received, StreamTransport, Transport};
