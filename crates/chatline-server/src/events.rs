//! Event payloads published by request handlers.
//!
//! The hub never looks inside a payload. These types exist so that handlers
//! and clients agree on one JSON shape for what they fan out:
//!
//! ```text
//! {"type":"new_message","chat_id":"c1","message":{...stored message...}}
//! {"type":"typing","chat_id":"c1","user_id":"u1","kind":"recording_voice"}
//! ```
//!
//! Stored messages travel as the JSON document the storage layer returned;
//! only envelope fields are typed here.

use bytes::Bytes;
use chatline_core::{Identity, RoomId};
use serde::{Deserialize, Serialize};

/// What a user in a chat is doing right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypingKind {
    /// Typing text
    Typing,
    /// Recording a voice message
    RecordingVoice,
    /// Recording a video message
    RecordingVideo,
}

/// Real-time event envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    /// A message was persisted
    NewMessage {
        /// Conversation
        chat_id: RoomId,
        /// Stored message document
        message: serde_json::Value,
    },
    /// A message was edited
    MessageEdited {
        /// Conversation
        chat_id: RoomId,
        /// Updated message document
        message: serde_json::Value,
    },
    /// A message was deleted
    MessageDeleted {
        /// Conversation
        chat_id: RoomId,
        /// Deleted message
        message_id: String,
        /// Deleted for every participant rather than only the requester
        #[serde(default)]
        for_everyone: bool,
    },
    /// A participant read a message
    MessageRead {
        /// Conversation
        chat_id: RoomId,
        /// Message read
        message_id: String,
        /// Reader
        reader_id: Identity,
    },
    /// Ephemeral typing / recording indicator
    Typing {
        /// Conversation
        chat_id: RoomId,
        /// Who is typing
        user_id: Identity,
        /// What they are doing
        kind: TypingKind,
    },
    /// A user came online or went offline
    Presence {
        /// User
        user_id: Identity,
        /// Whether at least one connection is live
        online: bool,
    },
    /// Call state change (ringing, active, ended, ...)
    CallSignal {
        /// Conversation the call belongs to
        chat_id: RoomId,
        /// Call
        call_id: String,
        /// Who started the call
        caller_id: Identity,
        /// New call status
        status: String,
    },
    /// Operator notice, usually sent with `broadcast_global`
    SystemNotice {
        /// Human-readable text
        text: String,
    },
}

impl ChatEvent {
    /// Serialize to the wire payload.
    ///
    /// # Errors
    ///
    /// Only if an embedded message document cannot be serialized.
    pub fn encode(&self) -> Result<Bytes, serde_json::Error> {
        serde_json::to_vec(self).map(Bytes::from)
    }

    /// Parse a wire payload.
    ///
    /// # Errors
    ///
    /// If the bytes are not a known event.
    pub fn decode(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    /// Conversation the event belongs to. `None` for user- or server-wide
    /// events.
    pub fn chat_id(&self) -> Option<&RoomId> {
        match self {
            Self::NewMessage { chat_id, .. }
            | Self::MessageEdited { chat_id, .. }
            | Self::MessageDeleted { chat_id, .. }
            | Self::MessageRead { chat_id, .. }
            | Self::Typing { chat_id, .. }
            | Self::CallSignal { chat_id, .. } => Some(chat_id),
            Self::Presence { .. } | Self::SystemNotice { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn typing_wire_shape() {
        let event = ChatEvent::Typing {
            chat_id: RoomId::new("c1"),
            user_id: Identity::new("u1"),
            kind: TypingKind::RecordingVoice,
        };

        let value: serde_json::Value = serde_json::from_slice(&event.encode().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({"type": "typing", "chat_id": "c1", "user_id": "u1", "kind": "recording_voice"})
        );
    }

    #[test]
    fn new_message_embeds_document() {
        let event = ChatEvent::NewMessage {
            chat_id: RoomId::new("c1"),
            message: json!({"id": "m1", "content": "hello", "message_type": "text"}),
        };

        let decoded = ChatEvent::decode(&event.encode().unwrap()).unwrap();
        assert_eq!(decoded, event);
        assert_eq!(decoded.chat_id(), Some(&RoomId::new("c1")));
    }

    #[test]
    fn deleted_defaults_to_requester_only() {
        let event =
            ChatEvent::decode(br#"{"type":"message_deleted","chat_id":"c1","message_id":"m1"}"#)
                .unwrap();

        assert!(matches!(event, ChatEvent::MessageDeleted { for_everyone: false, .. }));
    }

    #[test]
    fn server_wide_events_have_no_chat() {
        let event = ChatEvent::SystemNotice { text: "maintenance at 02:00".into() };
        assert_eq!(event.chat_id(), None);
    }
}
