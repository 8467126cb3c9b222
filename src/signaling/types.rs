use std::fmt;
use std::sync::Arc;

use rand::Rng;
use serde::{Serialize, Serializer};
use thiserror::Error;
use tokio_tungstenite::tungstenite::{self, Utf8Bytes};

/// Relay errors
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    #[error("failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("websocket handshake timed out")]
    HandshakeTimeout,

    #[error("room manager unavailable")]
    ActorClosed,
}

const CONNECTION_ID_PREFIX: &[u8] = b"conn_";
const CONNECTION_ID_LEN: usize = 21;
const HEX_CHARS: &[u8] = b"0123456789abcdef";

/// Connection ID: 21-byte fixed array ("conn_" + 16 hex)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId {
    bytes: [u8; CONNECTION_ID_LEN],
    len: u8,
}

impl ConnectionId {
    pub fn generate() -> Self {
        let mut bytes = [0u8; CONNECTION_ID_LEN];
        let prefix_len = CONNECTION_ID_PREFIX.len();
        bytes[..prefix_len].copy_from_slice(CONNECTION_ID_PREFIX);

        let value: u64 = rand::rng().random();
        for i in 0..16 {
            let nibble = ((value >> (60 - i * 4)) & 0xF) as usize;
            bytes[prefix_len + i] = HEX_CHARS[nibble];
        }
        Self {
            bytes,
            len: CONNECTION_ID_LEN as u8,
        }
    }

    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.bytes[..self.len as usize]).unwrap_or("")
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for ConnectionId {
    fn from(s: &str) -> Self {
        let mut bytes = [0u8; CONNECTION_ID_LEN];
        let src = s.as_bytes();
        let mut len = src.len().min(CONNECTION_ID_LEN);
        while !s.is_char_boundary(len) {
            len -= 1;
        }
        bytes[..len].copy_from_slice(&src[..len]);
        Self {
            bytes,
            len: len as u8,
        }
    }
}

impl Serialize for ConnectionId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Room identifier, supplied by clients and matched exactly.
///
/// Room names have no length limit, so unlike [`ConnectionId`] this is a
/// shared string rather than a fixed array. Cloning is a refcount bump.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoomId(Arc<str>);

impl RoomId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parses a client-supplied room name. Empty names are rejected.
    pub fn parse(s: &str) -> Option<Self> {
        if s.is_empty() {
            None
        } else {
            Some(Self(Arc::from(s)))
        }
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for RoomId {
    fn from(s: &str) -> Self {
        Self(Arc::from(s))
    }
}

impl Serialize for RoomId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Wrapper for outbound WebSocket messages using tungstenite's Utf8Bytes.
#[derive(Debug, Clone)]
pub struct OutboundMessage(Utf8Bytes);

impl OutboundMessage {
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Get the inner Utf8Bytes for tungstenite Message::Text
    pub fn into_inner(self) -> Utf8Bytes {
        self.0
    }
}

impl From<String> for OutboundMessage {
    fn from(s: String) -> Self {
        Self(Utf8Bytes::from(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_id_generate_has_correct_format() {
        let id = ConnectionId::generate();
        assert!(id.as_str().starts_with("conn_"));
        assert_eq!(id.as_str().len(), 21);
        assert!(id.as_str()[5..].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn connection_ids_differ() {
        let a = ConnectionId::generate();
        let b = ConnectionId::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn connection_id_from_str() {
        let id = ConnectionId::from("conn_0123456789abcdef");
        assert_eq!(id.as_str(), "conn_0123456789abcdef");
    }

    #[test]
    fn connection_id_from_long_str_truncates() {
        let id = ConnectionId::from("conn_0123456789abcdef_extra");
        assert_eq!(id.as_str(), "conn_0123456789abcdef");
    }

    #[test]
    fn connection_id_display() {
        let id = ConnectionId::from("conn_a");
        assert_eq!(format!("{}", id), "conn_a");
    }

    #[test]
    fn connection_id_serialization() {
        let id = ConnectionId::from("conn_test");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"conn_test\"");
    }

    #[test]
    fn room_id_parse_rejects_empty() {
        assert!(RoomId::parse("").is_none());
        assert_eq!(RoomId::parse("test_room").unwrap().as_str(), "test_room");
    }

    #[test]
    fn room_id_matches_exactly() {
        assert_ne!(RoomId::from("Room"), RoomId::from("room"));
        assert_ne!(RoomId::from("room "), RoomId::from("room"));
        assert_eq!(RoomId::from("room"), RoomId::from("room"));
    }

    #[test]
    fn room_id_serialization() {
        let room = RoomId::from("test_room");
        assert_eq!(serde_json::to_string(&room).unwrap(), "\"test_room\"");
    }

    #[test]
    fn outbound_message_clone_shares_text() {
        let msg = OutboundMessage::from("{\"type\":\"offer\"}".to_string());
        let copy = msg.clone();
        assert_eq!(msg.as_str(), copy.as_str());
    }
}
