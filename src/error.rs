// MIT License - Copyright (c) 2026 Peter Wright
// Door link errors

use std::fmt;

/// Why a handshake was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandshakeFailure {
    /// The peer answered, but not with the acknowledgment token.
    Unacknowledged,
    /// No complete answer arrived within the response timeout.
    Timeout,
    /// The stream was closed or failed during the exchange.
    TransportClosed,
}

impl HandshakeFailure {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unacknowledged => "unacknowledged",
            Self::Timeout => "timeout",
            Self::TransportClosed => "transport closed",
        }
    }
}

impl fmt::Display for HandshakeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The peer could not be reached. Safe to retry with a fresh attempt.
#[derive(Debug, thiserror::Error)]
#[error("Connect to {address} failed: {reason}")]
pub struct ConnectError {
    pub address: String,
    pub reason: String,
}

/// The peer was reached but did not complete the handshake.
#[derive(Debug, thiserror::Error)]
pub enum HandshakeError {
    #[error("Handshake unacknowledged: peer replied {reply:?}")]
    Unacknowledged { reply: String },

    #[error("Handshake timed out after {waited_ms} ms")]
    Timeout { waited_ms: u64 },

    #[error("Transport closed during handshake: {reason}")]
    TransportClosed { reason: String },

    #[error("Handshake attempted in state {state}")]
    InvalidState { state: &'static str },
}

impl HandshakeError {
    /// Classify this error into the three protocol outcomes.
    ///
    /// Calling in the wrong state is reported as `TransportClosed`, since no
    /// usable transport exists outside `Connected`.
    pub fn failure(&self) -> HandshakeFailure {
        match self {
            Self::Unacknowledged { .. } => HandshakeFailure::Unacknowledged,
            Self::Timeout { .. } => HandshakeFailure::Timeout,
            Self::TransportClosed { .. } | Self::InvalidState { .. } => {
                HandshakeFailure::TransportClosed
            }
        }
    }
}

/// Fatal end of an active session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("No keepalive received within {idle_timeout_ms} ms")]
    IdleTimeout { idle_timeout_ms: u64 },

    #[error("Transport failure: {0}")]
    TransportFailure(#[from] std::io::Error),

    #[error("Session cancelled")]
    Cancelled,

    #[error("Event loop started in state {state}")]
    InvalidState { state: &'static str },
}

/// Any error produced while driving a session from connect to termination.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error(transparent)]
    Handshake(#[from] HandshakeError),

    #[error(transparent)]
    Session(#[from] SessionError),
}

impl LinkError {
    /// Whether a fresh connection attempt is worthwhile.
    ///
    /// Only connect failures qualify; a peer that refuses the handshake or
    /// stops sending keepalives is left to operator policy.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LinkError::Connect(_))
    }

    /// Process exit code distinguishing the failure class.
    pub fn exit_code(&self) -> i32 {
        match self {
            LinkError::Connect(_) => 2,
            LinkError::Handshake(_) => 3,
            LinkError::Session(SessionError::IdleTimeout { .. }) => 4,
            LinkError::Session(SessionError::Cancelled) => 0,
            LinkError::Session(_) => 5,
        }
    }
}

pub type Result<T> = std::result::Result<T, LinkError>;
