// MIT License - Copyright (c) 2026 Peter Wright
// Door link session events

use crate::protocol::EventCode;

/// Everything observable about a session, in the order it happens.
///
/// Users subscribe via `controller.subscribe()` to receive a
/// `tokio::sync::broadcast::Receiver<SessionEvent>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Link to the peer established
    Connected,
    /// Handshake acknowledged, waiting for events
    Listening,
    /// A recognized event was received and acknowledged
    Event(EventCode),
    /// Inbound bytes that matched no event code
    Unrecognized(Vec<u8>),
    /// Session ended; carries the reason
    Terminated(String),
}

/// Type alias for the broadcast sender.
pub type EventSender = tokio::sync::broadcast::Sender<SessionEvent>;

/// Type alias for the broadcast receiver.
pub type EventReceiver = tokio::sync::broadcast::Receiver<SessionEvent>;

/// Create a new event channel with the given capacity.
pub fn event_channel(capacity: usize) -> (EventSender, EventReceiver) {
    tokio::sync::broadcast::channel(capacity)
}
