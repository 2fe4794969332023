//! Inbound control frames.
//!
//! Clients steer their room subscriptions with small JSON objects:
//!
//! ```text
//! {"type":"join_chat","chat_id":"<id>"}
//! {"type":"leave_chat","chat_id":"<id>"}
//! ```
//!
//! Any other `type` decodes to [`ControlFrame::Unknown`] so that newer
//! clients can talk to older servers without being disconnected.

use serde::Deserialize;

use crate::{error::ControlFrameError, ids::RoomId};

/// Decoded inbound control frame.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlFrame {
    /// Subscribe to a conversation's updates
    JoinChat {
        /// Conversation to join
        chat_id: RoomId,
    },
    /// Stop receiving a conversation's updates
    LeaveChat {
        /// Conversation to leave
        chat_id: RoomId,
    },
    /// Any frame type this server does not understand
    #[serde(other)]
    Unknown,
}

impl ControlFrame {
    /// Decode a control frame from raw JSON bytes.
    ///
    /// # Errors
    ///
    /// - `ControlFrameError::Malformed` if the bytes are not a JSON object
    ///   with a string `type`, or a known type lacks its `chat_id`
    /// - `ControlFrameError::EmptyRoomId` if `chat_id` is the empty string
    pub fn decode(bytes: &[u8]) -> Result<Self, ControlFrameError> {
        let frame: Self = serde_json::from_slice(bytes)?;

        match &frame {
            Self::JoinChat { chat_id } | Self::LeaveChat { chat_id } if chat_id.is_empty() => {
                Err(ControlFrameError::EmptyRoomId)
            },
            _ => Ok(frame),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_join_and_leave() {
        let join = ControlFrame::decode(br#"{"type":"join_chat","chat_id":"abc"}"#).unwrap();
        assert_eq!(join, ControlFrame::JoinChat { chat_id: RoomId::new("abc") });

        let leave = ControlFrame::decode(br#"{"type":"leave_chat","chat_id":"abc"}"#).unwrap();
        assert_eq!(leave, ControlFrame::LeaveChat { chat_id: RoomId::new("abc") });
    }

    #[test]
    fn unknown_type_is_forward_compatible() {
        let frame = ControlFrame::decode(br#"{"type":"typing","chat_id":"abc"}"#).unwrap();
        assert_eq!(frame, ControlFrame::Unknown);

        let frame = ControlFrame::decode(br#"{"type":"ping"}"#).unwrap();
        assert_eq!(frame, ControlFrame::Unknown);
    }

    #[test]
    fn extra_fields_are_ignored() {
        let frame =
            ControlFrame::decode(br#"{"type":"join_chat","chat_id":"x","client":"ios"}"#).unwrap();
        assert_eq!(frame, ControlFrame::JoinChat { chat_id: RoomId::new("x") });
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(matches!(ControlFrame::decode(b"not json"), Err(ControlFrameError::Malformed(_))));
        assert!(matches!(
            ControlFrame::decode(br#"{"chat_id":"abc"}"#),
            Err(ControlFrameError::Malformed(_))
        ));
        assert!(matches!(
            ControlFrame::decode(br#"{"type":"join_chat"}"#),
            Err(ControlFrameError::Malformed(_))
        ));
        assert!(matches!(
            ControlFrame::decode(br#"{"type":"join_chat","chat_id":42}"#),
            Err(ControlFrameError::Malformed(_))
        ));
    }

    #[test]
    fn rejects_empty_chat_id() {
        assert_eq!(
            ControlFrame::decode(br#"{"type":"leave_chat","chat_id":""}"#),
            Err(ControlFrameError::EmptyRoomId)
        );
    }
}
