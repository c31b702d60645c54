// MIT License - Copyright (c) 2026 Peter Wright
// Door link configuration

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::constants::{
    DEFAULT_CONNECT_TIMEOUT, DEFAULT_HANDSHAKE_TIMEOUT, DEFAULT_IDLE_TIMEOUT,
    DEFAULT_RFCOMM_CHANNEL, DEFAULT_WRITE_TIMEOUT, MAX_RFCOMM_CHANNEL,
};

/// Identifier of the remote peer.
///
/// Parsed from one of:
/// - `14:41:05:05:88:77` — Bluetooth RFCOMM on channel 1
/// - `14:41:05:05:88:77/3` — Bluetooth RFCOMM on channel 3
/// - `tcp://host:port` — a serial-over-TCP gateway in front of the peer
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PeerAddress {
    Rfcomm { addr: [u8; 6], channel: u8 },
    Tcp { host: String, port: u16 },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid peer address {input:?}: {reason}")]
pub struct AddressParseError {
    pub input: String,
    pub reason: &'static str,
}

impl PeerAddress {
    fn parse_error(input: &str, reason: &'static str) -> AddressParseError {
        AddressParseError {
            input: input.to_string(),
            reason,
        }
    }

    fn parse_hw_addr(input: &str, text: &str) -> Result<[u8; 6], AddressParseError> {
        let mut addr = [0u8; 6];
        let mut parts = text.split(':');
        for byte in addr.iter_mut() {
            let part = parts
                .next()
                .ok_or_else(|| Self::parse_error(input, "expected six hex octets"))?;
            if part.len() != 2 {
                return Err(Self::parse_error(input, "octets must be two hex digits"));
            }
            *byte = u8::from_str_radix(part, 16)
                .map_err(|_| Self::parse_error(input, "octets must be two hex digits"))?;
        }
        if parts.next().is_some() {
            return Err(Self::parse_error(input, "expected six hex octets"));
        }
        Ok(addr)
    }
}

impl FromStr for PeerAddress {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let input = s.trim();

        if let Some(rest) = input.strip_prefix("tcp://") {
            let (host, port_str) = rest
                .rsplit_once(':')
                .ok_or_else(|| Self::parse_error(input, "TCP address must be tcp://host:port"))?;
            if host.is_empty() {
                return Err(Self::parse_error(input, "missing host"));
            }
            let port: u16 = port_str
                .parse()
                .map_err(|_| Self::parse_error(input, "invalid port number"))?;
            return Ok(PeerAddress::Tcp {
                host: host.to_string(),
                port,
            });
        }

        let (hw, channel) = match input.split_once('/') {
            Some((hw, ch)) => {
                let channel: u8 = ch
                    .parse()
                    .map_err(|_| Self::parse_error(input, "invalid RFCOMM channel"))?;
                (hw, channel)
            }
            None => (input, DEFAULT_RFCOMM_CHANNEL),
        };
        if !(1..=MAX_RFCOMM_CHANNEL).contains(&channel) {
            return Err(Self::parse_error(input, "RFCOMM channel must be 1-30"));
        }

        Ok(PeerAddress::Rfcomm {
            addr: Self::parse_hw_addr(input, hw)?,
            channel,
        })
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeerAddress::Rfcomm { addr, channel } => write!(
                f,
                "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}/{}",
                addr[0], addr[1], addr[2], addr[3], addr[4], addr[5], channel
            ),
            PeerAddress::Tcp { host, port } => write!(f, "tcp://{}:{}", host, port),
        }
    }
}

/// Configuration for one door link session.
#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// Remote peer
    pub peer: PeerAddress,
    /// Bound on a single connect attempt
    pub connect_timeout: Duration,
    /// Bound on waiting for the handshake acknowledgment
    pub handshake_timeout: Duration,
    /// Maximum time between keepalive events
    pub idle_timeout: Duration,
    /// Bound on each outbound write
    pub write_timeout: Duration,
    /// Pause between link-up and the handshake request (zero disables)
    pub connect_delay: Duration,
    /// Base delay for reconnect backoff in milliseconds
    pub reconnect_delay_ms: u64,
    /// Reconnect attempts after a failed connect (0 = no retries)
    pub max_reconnect_attempts: u32,
    /// Whether to start a fresh session after a handshake or session failure
    pub reconnect_after_session: bool,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            peer: PeerAddress::Rfcomm {
                addr: [0x14, 0x41, 0x05, 0x05, 0x88, 0x77],
                channel: DEFAULT_RFCOMM_CHANNEL,
            },
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            connect_delay: Duration::ZERO,
            reconnect_delay_ms: 10000,
            max_reconnect_attempts: 0,
            reconnect_after_session: false,
        }
    }
}

impl LinkConfig {
    /// Create a new config builder starting from defaults.
    pub fn builder() -> LinkConfigBuilder {
        LinkConfigBuilder::default()
    }

    /// Backoff before reconnect attempt `attempt` (1-based), capped at 16x the base.
    pub fn reconnect_backoff(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(4);
        Duration::from_millis(self.reconnect_delay_ms.saturating_mul(1 << shift))
    }
}

/// Builder for LinkConfig.
#[derive(Debug, Clone, Default)]
pub struct LinkConfigBuilder {
    config: LinkConfig,
}

impl LinkConfigBuilder {
    pub fn peer(mut self, peer: PeerAddress) -> Self {
        self.config.peer = peer;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.config.handshake_timeout = timeout;
        self
    }

    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.config.idle_timeout = timeout;
        self
    }

    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.config.write_timeout = timeout;
        self
    }

    pub fn connect_delay(mut self, delay: Duration) -> Self {
        self.config.connect_delay = delay;
        self
    }

    pub fn reconnect_delay_ms(mut self, ms: u64) -> Self {
        self.config.reconnect_delay_ms = ms;
        self
    }

    pub fn max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.config.max_reconnect_attempts = attempts;
        self
    }

    pub fn reconnect_after_session(mut self, reconnect: bool) -> Self {
        self.config.reconnect_after_session = reconnect;
        self
    }

    pub fn build(self) -> LinkConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rfcomm_default_channel() {
        let addr: PeerAddress = "14:41:05:05:88:77".parse().unwrap();
        assert_eq!(
            addr,
            PeerAddress::Rfcomm {
                addr: [0x14, 0x41, 0x05, 0x05, 0x88, 0x77],
                channel: 1
            }
        );
    }

    #[test]
    fn test_parse_rfcomm_explicit_channel() {
        let addr: PeerAddress = "aa:bb:cc:dd:ee:ff/3".parse().unwrap();
        assert_eq!(
            addr,
            PeerAddress::Rfcomm {
                addr: [0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF],
                channel: 3
            }
        );
        assert_eq!(addr.to_string(), "AA:BB:CC:DD:EE:FF/3");
    }

    #[test]
    fn test_parse_tcp() {
        let addr: PeerAddress = "tcp://door-gw.local:4000".parse().unwrap();
        assert_eq!(
            addr,
            PeerAddress::Tcp {
                host: "door-gw.local".to_string(),
                port: 4000
            }
        );
        assert_eq!(addr.to_string(), "tcp://door-gw.local:4000");
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!("14:41:05:05:88".parse::<PeerAddress>().is_err());
        assert!("14:41:05:05:88:77:99".parse::<PeerAddress>().is_err());
        assert!("14:41:05:05:88:zz".parse::<PeerAddress>().is_err());
        assert!("14:41:05:05:88:7".parse::<PeerAddress>().is_err());
        assert!("14:41:05:05:88:77/0".parse::<PeerAddress>().is_err());
        assert!("14:41:05:05:88:77/31".parse::<PeerAddress>().is_err());
        assert!("tcp://host".parse::<PeerAddress>().is_err());
        assert!("tcp://:4000".parse::<PeerAddress>().is_err());
        assert!("tcp://host:99999".parse::<PeerAddress>().is_err());

        let err = "nonsense".parse::<PeerAddress>().unwrap_err();
        assert_eq!(err.input, "nonsense");
    }

    #[test]
    fn test_config_defaults() {
        let config = LinkConfig::builder().build();
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.handshake_timeout, Duration::from_secs(15));
        assert_eq!(config.idle_timeout, Duration::from_secs(20));
        assert_eq!(config.connect_delay, Duration::ZERO);
        assert_eq!(config.max_reconnect_attempts, 0);
        assert!(!config.reconnect_after_session);
    }

    #[test]
    fn test_config_builder() {
        let config = LinkConfig::builder()
            .peer("tcp://127.0.0.1:7000".parse().unwrap())
            .idle_timeout(Duration::from_secs(30))
            .handshake_timeout(Duration::from_secs(5))
            .max_reconnect_attempts(3)
            .build();

        assert_eq!(config.peer.to_string(), "tcp://127.0.0.1:7000");
        assert_eq!(config.idle_timeout, Duration::from_secs(30));
        assert_eq!(config.handshake_timeout, Duration::from_secs(5));
        assert_eq!(config.max_reconnect_attempts, 3);
    }

    #[test]
    fn test_reconnect_backoff() {
        let config = LinkConfig::builder().reconnect_delay_ms(1000).build();
        assert_eq!(config.reconnect_backoff(1), Duration::from_millis(1000));
        assert_eq!(config.reconnect_backoff(2), Duration::from_millis(2000));
        assert_eq!(config.reconnect_backoff(5), Duration::from_millis(16000));
        assert_eq!(config.reconnect_backoff(9), Duration::from_millis(16000));
    }
}
