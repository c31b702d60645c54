// MIT License - Copyright (c) 2026 Peter Wright
// Door link wire protocol

use std::fmt;

use crate::constants::{
    CONNECT_TOKEN, EVENT_A_TOKEN, EVENT_B_TOKEN, EVENT_FRAME_LEN, HANDSHAKE_ACK, KEEPALIVE_TOKEN,
};

/// Wire tokens exchanged with the door peer.
///
/// # Exchange
///
/// ```text
/// client                 peer
///   | ---- "0x1" ---------> |   handshake request
///   | <--- "OK" ----------- |   handshake acknowledgment
///   | <--- "0x2"/"0x3" ---- |   door events
///   | ---- "OK\r\n" ------> |
///   | <--- "0x4" ---------- |   keepalive
///   | ---- "OK\r\n" ------> |
/// ```
///
/// Every token is three bytes. `Connect` only travels client → peer; the
/// remaining codes only travel peer → client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventCode {
    /// `0x1` — connection/handshake request.
    Connect,
    /// `0x2` — door event A.
    EventA,
    /// `0x3` — door event B.
    EventB,
    /// `0x4` — keepalive; resets the liveness deadline.
    Keepalive,
}

impl EventCode {
    /// Codes the peer may send.
    pub const INBOUND: [EventCode; 3] =
        [EventCode::EventA, EventCode::EventB, EventCode::Keepalive];

    /// The wire representation.
    pub fn wire(&self) -> &'static [u8] {
        match self {
            EventCode::Connect => CONNECT_TOKEN,
            EventCode::EventA => EVENT_A_TOKEN,
            EventCode::EventB => EVENT_B_TOKEN,
            EventCode::Keepalive => KEEPALIVE_TOKEN,
        }
    }

    /// Exact-match lookup of any code from its wire bytes.
    pub fn from_wire(bytes: &[u8]) -> Option<Self> {
        match bytes {
            b"0x1" => Some(EventCode::Connect),
            b"0x2" => Some(EventCode::EventA),
            b"0x3" => Some(EventCode::EventB),
            b"0x4" => Some(EventCode::Keepalive),
            _ => None,
        }
    }

    pub fn is_keepalive(&self) -> bool {
        matches!(self, EventCode::Keepalive)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EventCode::Connect => "CONNECT",
            EventCode::EventA => "EVENT_A",
            EventCode::EventB => "EVENT_B",
            EventCode::Keepalive => "EVENT_KEEPALIVE",
        }
    }
}

impl fmt::Display for EventCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of classifying inbound bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    Recognized(EventCode),
    Unrecognized(Vec<u8>),
}

/// Inbound code whose token starts at the beginning of `data`.
fn inbound_token_at(data: &[u8]) -> Option<EventCode> {
    data.get(..EVENT_FRAME_LEN)
        .and_then(EventCode::from_wire)
        .filter(|code| *code != EventCode::Connect)
}

/// Classify a complete run of inbound bytes.
///
/// Every inbound token is recognized wherever it appears, in arrival order.
/// Bytes between tokens come back as one `Unrecognized` run each. The input
/// is taken as final: a trailing partial token is noise here, whereas
/// [`FrameAssembler`] holds it back for the next read.
pub fn decode_events(bytes: &[u8]) -> Vec<Decoded> {
    let mut out = Vec::new();
    let mut noise_start = 0;
    let mut i = 0;

    while i < bytes.len() {
        match inbound_token_at(&bytes[i..]) {
            Some(code) => {
                if noise_start < i {
                    out.push(Decoded::Unrecognized(bytes[noise_start..i].to_vec()));
                }
                out.push(Decoded::Recognized(code));
                i += code.wire().len();
                noise_start = i;
            }
            None => i += 1,
        }
    }

    if noise_start < bytes.len() {
        out.push(Decoded::Unrecognized(bytes[noise_start..].to_vec()));
    }
    out
}

/// Length of the longest suffix of `tail` that is a proper prefix of an inbound token.
fn partial_token_len(tail: &[u8]) -> usize {
    let max = EventCode::INBOUND
        .iter()
        .map(|code| code.wire().len() - 1)
        .max()
        .unwrap_or(0)
        .min(tail.len());
    (1..=max)
        .rev()
        .find(|&k| {
            let suffix = &tail[tail.len() - k..];
            EventCode::INBOUND
                .iter()
                .any(|code| code.wire().starts_with(suffix))
        })
        .unwrap_or(0)
}

/// Reassembles inbound events across short reads.
///
/// The peer's frames can be split or merged by the link. Each call to
/// [`push`](Self::push) joins the carried tail with the new bytes, holds
/// back a trailing partial token (`0` or `0x`) and decodes the rest with
/// [`decode_events`].
#[derive(Debug, Default)]
pub struct FrameAssembler {
    pending: Vec<u8>,
}

impl FrameAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, data: &[u8]) -> Vec<Decoded> {
        let mut buf = std::mem::take(&mut self.pending);
        buf.extend_from_slice(data);

        // No token ends with a prefix of another token, so the held tail
        // never cuts into a complete token.
        let complete = buf.len() - partial_token_len(&buf);
        self.pending = buf.split_off(complete);
        decode_events(&buf)
    }

    /// Bytes held back as a possible token prefix.
    pub fn pending(&self) -> &[u8] {
        &self.pending
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

/// Classification of the bytes received so far in reply to the handshake request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeReply {
    /// `OK`, optionally followed by CR/LF line terminators.
    Accepted,
    /// A proper prefix of `OK` (including nothing at all); keep reading.
    Incomplete,
    /// Anything else.
    Rejected,
}

/// Apply the handshake acknowledgment policy.
///
/// The peer terminates its reply with CRLF, which is why the reply read
/// allows four bytes. Trailing line terminators are stripped; what remains
/// must be exactly `OK`.
pub fn classify_handshake_reply(reply: &[u8]) -> HandshakeReply {
    let body_len = reply
        .iter()
        .rposition(|b| *b != b'\r' && *b != b'\n')
        .map_or(0, |pos| pos + 1);

    if &reply[..body_len] == HANDSHAKE_ACK {
        HandshakeReply::Accepted
    } else if reply.len() < HANDSHAKE_ACK.len() && HANDSHAKE_ACK.starts_with(reply) {
        HandshakeReply::Incomplete
    } else {
        HandshakeReply::Rejected
    }
}

/// Render wire bytes for logs, escaping control characters.
pub fn printable(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).escape_debug().to_string()
}
