// MIT License - Copyright (c) 2026 Peter Wright
// Door link session controller

use std::fmt;
use std::io;

use tokio::time::{Duration, Instant, sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::config::{LinkConfig, PeerAddress};
use crate::constants::{
    CONNECT_TOKEN, EVENT_ACK, EVENT_CHANNEL_CAPACITY, EVENT_FRAME_LEN, HANDSHAKE_READ_LEN,
};
use crate::error::{ConnectError, HandshakeError, LinkError, SessionError};
use crate::event::{EventReceiver, EventSender, SessionEvent, event_channel};
use crate::protocol::{
    Decoded, EventCode, FrameAssembler, HandshakeReply, classify_handshake_reply, printable,
};
use crate::transport::{Connector, Received, Transport};

/// Lifecycle of one session.
///
/// ```text
/// Disconnected --connect--> Connected --handshake--> Listening --run_event_loop--> Active
///                               |                                                    |
///                               +---- handshake failure ----> Terminated <-----------+
/// ```
///
/// `close()` moves any state to `Terminated`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Disconnected,
    Connected,
    Listening,
    Active,
    Terminated,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "Disconnected",
            Self::Connected => "Connected",
            Self::Listening => "Listening",
            Self::Active => "Active",
            Self::Terminated => "Terminated",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The liveness deadline of an active session.
///
/// Only a keepalive moves the deadline; every other event leaves it alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Liveness {
    deadline: Instant,
    idle_timeout: Duration,
}

impl Liveness {
    pub fn start(now: Instant, idle_timeout: Duration) -> Self {
        Self {
            deadline: now + idle_timeout,
            idle_timeout,
        }
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    pub fn reset(&mut self, now: Instant) {
        self.deadline = now + self.idle_timeout;
    }

    /// Account for a recognized event. Returns true if the deadline moved.
    pub fn observe(&mut self, code: EventCode, now: Instant) -> bool {
        if code.is_keepalive() {
            self.reset(now);
            true
        } else {
            false
        }
    }

    pub fn remaining(&self, now: Instant) -> Duration {
        self.deadline.saturating_duration_since(now)
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.deadline
    }
}

/// Drives one session with the door peer: connect, handshake, event loop.
///
/// # Example
///
/// ```no_run
/// use door_link::{LinkConfig, NetConnector, SessionController};
/// use tokio_util::sync::CancellationToken;
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let config = LinkConfig::builder()
///         .peer("14:41:05:05:88:77/1".parse()?)
///         .build();
///
///     let mut session = SessionController::new(
///         config.peer.clone(),
///         NetConnector::new(config.write_timeout),
///     );
///
///     let mut events = session.subscribe();
///     tokio::spawn(async move {
///         while let Ok(event) = events.recv().await {
///             println!("Event: {:?}", event);
///         }
///     });
///
///     let cancel = CancellationToken::new();
///     session.run(&config, &cancel).await?;
///     Ok(())
/// }
/// ```
pub struct SessionController<C: Connector> {
    address: PeerAddress,
    connector: C,
    transport: Option<C::Transport>,
    state: SessionState,
    liveness: Option<Liveness>,
    assembler: FrameAssembler,
    event_tx: EventSender,
}

impl<C: Connector> SessionController<C> {
    pub fn new(address: PeerAddress, connector: C) -> Self {
        let (event_tx, _event_rx) = event_channel(EVENT_CHANNEL_CAPACITY);
        Self {
            address,
            connector,
            transport: None,
            state: SessionState::Disconnected,
            liveness: None,
            assembler: FrameAssembler::new(),
            event_tx,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn address(&self) -> &PeerAddress {
        &self.address
    }

    /// Current liveness deadline; only set while `Active`.
    pub fn deadline(&self) -> Option<Instant> {
        self.liveness.map(|l| l.deadline())
    }

    /// Subscribe to session events.
    pub fn subscribe(&self) -> EventReceiver {
        self.event_tx.subscribe()
    }

    fn emit(&self, event: SessionEvent) {
        // no subscribers is fine
        let _ = self.event_tx.send(event);
    }

    /// Open the link to the peer.
    ///
    /// On failure the controller stays `Disconnected` and holds nothing, so
    /// the call can simply be repeated.
    pub async fn connect(&mut self, connect_timeout: Duration) -> Result<(), ConnectError> {
        if self.state != SessionState::Disconnected {
            return Err(ConnectError {
                address: self.address.to_string(),
                reason: format!("session is {}", self.state),
            });
        }

        info!("Connecting to {}", self.address);
        match timeout(connect_timeout, self.connector.connect(&self.address)).await {
            Ok(Ok(transport)) => {
                self.transport = Some(transport);
                self.state = SessionState::Connected;
                info!("Connected to {}", self.address);
                self.emit(SessionEvent::Connected);
                Ok(())
            }
            Ok(Err(e)) => {
                error!("Could not connect to {}: {}", self.address, e);
                Err(ConnectError {
                    address: self.address.to_string(),
                    reason: e.to_string(),
                })
            }
            Err(_) => {
                error!(
                    "Connect to {} timed out after {} ms",
                    self.address,
                    connect_timeout.as_millis()
                );
                Err(ConnectError {
                    address: self.address.to_string(),
                    reason: format!("timed out after {} ms", connect_timeout.as_millis()),
                })
            }
        }
    }

    /// Send the connection request and wait for the peer's acknowledgment.
    ///
    /// Any failure terminates the session.
    pub async fn handshake(&mut self, response_timeout: Duration) -> Result<(), HandshakeError> {
        if self.state != SessionState::Connected {
            return Err(HandshakeError::InvalidState {
                state: self.state.as_str(),
            });
        }

        match self.exchange_handshake(response_timeout).await {
            Ok(()) => {
                self.state = SessionState::Listening;
                info!("Handshake acknowledged by {}", self.address);
                self.emit(SessionEvent::Listening);
                Ok(())
            }
            Err(e) => {
                warn!("Handshake with {} failed ({}): {}", self.address, e.failure(), e);
                self.terminate(&e.to_string()).await;
                Err(e)
            }
        }
    }

    async fn exchange_handshake(
        &mut self,
        response_timeout: Duration,
    ) -> Result<(), HandshakeError> {
        let transport = self
            .transport
            .as_mut()
            .ok_or_else(|| HandshakeError::TransportClosed {
                reason: "no transport".to_string(),
            })?;

        transport
            .send(CONNECT_TOKEN)
            .await
            .map_err(|e| HandshakeError::TransportClosed {
                reason: e.to_string(),
            })?;
        debug!("Outgoing: {}", printable(CONNECT_TOKEN));

        let deadline = Instant::now() + response_timeout;
        let mut reply = Vec::with_capacity(HANDSHAKE_READ_LEN);

        loop {
            match classify_handshake_reply(&reply) {
                HandshakeReply::Accepted => {
                    debug!("Incoming: {}", printable(&reply));
                    return Ok(());
                }
                HandshakeReply::Rejected => {
                    return Err(HandshakeError::Unacknowledged {
                        reply: printable(&reply),
                    });
                }
                HandshakeReply::Incomplete => {}
            }

            let wait = deadline.saturating_duration_since(Instant::now());
            match transport.receive(HANDSHAKE_READ_LEN - reply.len(), wait).await {
                Ok(Received::Data(bytes)) => reply.extend_from_slice(&bytes),
                Ok(Received::TimedOut) => {
                    return Err(HandshakeError::Timeout {
                        waited_ms: response_timeout.as_millis() as u64,
                    });
                }
                Ok(Received::Closed) => {
                    return Err(HandshakeError::TransportClosed {
                        reason: "peer closed the connection".to_string(),
                    });
                }
                Err(e) => {
                    return Err(HandshakeError::TransportClosed {
                        reason: e.to_string(),
                    });
                }
            }
        }
    }

    /// Service inbound events until the peer goes quiet, the link fails, or
    /// `cancel` fires.
    ///
    /// Every recognized event is acknowledged before the next read. Only a
    /// keepalive pushes the deadline out by `idle_timeout`. This never
    /// returns `Ok`; the session always ends with the reason it stopped.
    pub async fn run_event_loop(
        &mut self,
        idle_timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<(), SessionError> {
        if self.state != SessionState::Listening {
            return Err(SessionError::InvalidState {
                state: self.state.as_str(),
            });
        }

        self.state = SessionState::Active;
        self.liveness = Some(Liveness::start(Instant::now(), idle_timeout));
        self.assembler.clear();
        info!(
            "Listening for events from {} (idle timeout {} ms)",
            self.address,
            idle_timeout.as_millis()
        );

        let err = loop {
            if let Err(e) = self.step(cancel).await {
                break e;
            }
        };

        match &err {
            SessionError::IdleTimeout { idle_timeout_ms } => {
                warn!("No keepalive for {} ms, ending session", idle_timeout_ms)
            }
            SessionError::Cancelled => info!("Session cancelled"),
            other => error!("Session failed: {}", other),
        }
        self.terminate(&err.to_string()).await;
        Err(err)
    }

    /// One read, its acknowledgments, and the deadline check.
    async fn step(&mut self, cancel: &CancellationToken) -> Result<(), SessionError> {
        let transport = self
            .transport
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "transport closed"))?;
        let liveness = self
            .liveness
            .as_mut()
            .ok_or(SessionError::InvalidState { state: "Active" })?;

        let wait = liveness.remaining(Instant::now());
        let received = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(SessionError::Cancelled),
            received = transport.receive(EVENT_FRAME_LEN, wait) => received?,
        };

        match received {
            Received::Data(bytes) => {
                debug!("Incoming: {}", printable(&bytes));
                for decoded in self.assembler.push(&bytes) {
                    match decoded {
                        Decoded::Recognized(code) => {
                            transport.send(EVENT_ACK).await?;
                            debug!("Outgoing: {}", printable(EVENT_ACK));
                            if liveness.observe(code, Instant::now()) {
                                trace!("Keepalive, deadline reset");
                            }
                            info!("Event {} acknowledged", code);
                            let _ = self.event_tx.send(SessionEvent::Event(code));
                        }
                        Decoded::Unrecognized(noise) => {
                            warn!("Ignoring unrecognized data: {}", printable(&noise));
                            let _ = self.event_tx.send(SessionEvent::Unrecognized(noise));
                        }
                    }
                }
            }
            Received::TimedOut => trace!("No data within {} ms", wait.as_millis()),
            Received::Closed => {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "peer closed the connection",
                )
                .into());
            }
        }

        if liveness.is_expired(Instant::now()) {
            return Err(SessionError::IdleTimeout {
                idle_timeout_ms: liveness.idle_timeout().as_millis() as u64,
            });
        }
        Ok(())
    }

    /// Close the transport if open and move to `Terminated`.
    ///
    /// Safe from any state and safe to repeat; the transport is closed at most once.
    pub async fn close(&mut self) {
        self.terminate("closed").await;
    }

    async fn terminate(&mut self, reason: &str) {
        if let Some(mut transport) = self.transport.take() {
            transport.close().await;
        }
        self.liveness = None;
        if self.state != SessionState::Terminated {
            self.state = SessionState::Terminated;
            info!("Session with {} terminated: {}", self.address, reason);
            self.emit(SessionEvent::Terminated(reason.to_string()));
        }
    }

    /// Connect, handshake and service events with the settings in `config`.
    ///
    /// `cancel` is honoured in every phase: while connecting, during the
    /// settle delay, while waiting for the handshake reply and in the event
    /// loop.
    pub async fn run(
        &mut self,
        config: &LinkConfig,
        cancel: &CancellationToken,
    ) -> crate::Result<()> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(self.cancelled().await),
            result = self.connect(config.connect_timeout) => result?,
        }

        if !config.connect_delay.is_zero() {
            debug!(
                "Waiting {} ms before handshake",
                config.connect_delay.as_millis()
            );
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(self.cancelled().await),
                _ = sleep(config.connect_delay) => {}
            }
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(self.cancelled().await),
            result = self.handshake(config.handshake_timeout) => result?,
        }

        self.run_event_loop(config.idle_timeout, cancel).await?;
        Ok(())
    }

    async fn cancelled(&mut self) -> LinkError {
        info!("Session with {} cancelled before the event loop", self.address);
        self.terminate("cancelled").await;
        SessionError::Cancelled.into()
    }
}
