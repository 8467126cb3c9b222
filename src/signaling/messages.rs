use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::types::{ConnectionId, RoomId};

/// Messages sent from client to server
///
/// Payloads (`sdp`, `candidate`) are opaque to the relay and forwarded as-is.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    Join {
        #[serde(default)]
        room: Option<String>,
    },

    Offer {
        sdp: Value,
        #[serde(default)]
        room: Option<String>,
    },

    Answer {
        sdp: Value,
        #[serde(default)]
        room: Option<String>,
    },

    Candidate {
        candidate: Value,
        #[serde(default)]
        room: Option<String>,
    },
}

impl ClientMessage {
    /// Target room, if present and non-empty.
    pub fn room(&self) -> Option<RoomId> {
        let room = match self {
            ClientMessage::Join { room }
            | ClientMessage::Offer { room, .. }
            | ClientMessage::Answer { room, .. }
            | ClientMessage::Candidate { room, .. } => room.as_deref()?,
        };
        RoomId::parse(room)
    }

    /// The event forwarded to the other members of the room, or `None` for `join`.
    pub fn into_forward(self, sender: ConnectionId) -> Option<ServerMessage> {
        match self {
            ClientMessage::Join { .. } => None,
            ClientMessage::Offer { sdp, .. } => Some(ServerMessage::Offer { sdp, sender }),
            ClientMessage::Answer { sdp, .. } => Some(ServerMessage::Answer { sdp, sender }),
            ClientMessage::Candidate { candidate, .. } => {
                Some(ServerMessage::Candidate { candidate, sender })
            }
        }
    }
}

/// Messages sent from server to client
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerMessage {
    /// Sent once after the handshake so the client learns its own identity
    Connected { id: ConnectionId },

    Offer { sdp: Value, sender: ConnectionId },

    Answer { sdp: Value, sender: ConnectionId },

    Candidate { candidate: Value, sender: ConnectionId },
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn parse_join() {
        let json = r#"{"type": "join", "room": "test_room"}"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        assert_eq!(msg.room(), Some(RoomId::from("test_room")));
        assert!(matches!(msg, ClientMessage::Join { .. }));
    }

    #[test]
    fn join_without_room_has_no_target() {
        let msg: ClientMessage = serde_json::from_str(r#"{"type": "join"}"#).unwrap();
        assert_eq!(msg.room(), None);

        let msg: ClientMessage = serde_json::from_str(r#"{"type": "join", "room": ""}"#).unwrap();
        assert_eq!(msg.room(), None);

        let msg: ClientMessage =
            serde_json::from_str(r#"{"type": "join", "room": null}"#).unwrap();
        assert_eq!(msg.room(), None);
    }

    #[test]
    fn parse_offer_with_object_payload() {
        let json = r#"{"type": "offer", "sdp": {"type": "offer", "sdp": "v=0"}, "room": "r"}"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        match msg {
            ClientMessage::Offer { sdp, room } => {
                assert_eq!(sdp, json!({"type": "offer", "sdp": "v=0"}));
                assert_eq!(room.as_deref(), Some("r"));
            }
            other => panic!("Expected Offer, got {:?}", other),
        }
    }

    #[test]
    fn parse_candidate() {
        let json = r#"{"type": "candidate", "candidate": {"candidate": "candidate:1 1 udp"}, "room": "r"}"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        assert!(matches!(msg, ClientMessage::Candidate { .. }));
    }

    #[test]
    fn offer_without_room_parses_but_has_no_target() {
        let msg: ClientMessage = serde_json::from_str(r#"{"type": "offer", "sdp": "x"}"#).unwrap();
        assert_eq!(msg.room(), None);
    }

    #[test]
    fn offer_without_payload_is_rejected() {
        let result = serde_json::from_str::<ClientMessage>(r#"{"type": "offer", "room": "r"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn unknown_type_is_rejected() {
        let result = serde_json::from_str::<ClientMessage>(r#"{"type": "hangup", "room": "r"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn join_is_not_forwarded() {
        let msg = ClientMessage::Join {
            room: Some("r".to_string()),
        };
        assert!(msg.into_forward(ConnectionId::from("conn_a")).is_none());
    }

    #[test]
    fn answer_forward_carries_sender() {
        let msg = ClientMessage::Answer {
            sdp: json!("P2"),
            room: Some("r".to_string()),
        };
        let forwarded = msg.into_forward(ConnectionId::from("conn_b")).unwrap();
        let value = serde_json::to_value(&forwarded).unwrap();
        assert_eq!(value, json!({"type": "answer", "sdp": "P2", "sender": "conn_b"}));
    }

    #[test]
    fn serialize_candidate_event() {
        let msg = ServerMessage::Candidate {
            candidate: json!({"candidate": "C1"}),
            sender: ConnectionId::from("conn_a"),
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            value,
            json!({"type": "candidate", "candidate": {"candidate": "C1"}, "sender": "conn_a"})
        );
    }

    #[test]
    fn serialize_connected() {
        let msg = ServerMessage::Connected {
            id: ConnectionId::from("conn_a"),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"type":"connected","id":"conn_a"}"#);
    }
}
