// MIT License - Copyright (c) 2026 Peter Wright
// Door link wire constants

use std::time::Duration;

/// Client → peer: connection/handshake request.
pub const CONNECT_TOKEN: &[u8] = b"0x1";
/// Peer → client: door event A.
pub const EVENT_A_TOKEN: &[u8] = b"0x2";
/// Peer → client: door event B.
pub const EVENT_B_TOKEN: &[u8] = b"0x3";
/// Peer → client: keepalive, the only event that resets the liveness deadline.
pub const KEEPALIVE_TOKEN: &[u8] = b"0x4";

/// Peer → client: handshake acknowledgment.
pub const HANDSHAKE_ACK: &[u8] = b"OK";
/// Client → peer: acknowledgment of every recognized event.
pub const EVENT_ACK: &[u8] = b"OK\r\n";

/// Upper bound of the handshake reply read (the peer terminates `OK` with CRLF).
pub const HANDSHAKE_READ_LEN: usize = 4;
/// Fixed width of one inbound event frame.
pub const EVENT_FRAME_LEN: usize = 3;

/// Default Bluetooth RFCOMM channel of the HC-05 style serial module.
pub const DEFAULT_RFCOMM_CHANNEL: u8 = 1;
/// Highest valid RFCOMM server channel.
pub const MAX_RFCOMM_CHANNEL: u8 = 30;

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(15);
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(20);
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// Capacity of the session event broadcast channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 64;
