use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Type discriminant of a live-update notification, as sent on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationKind {
    Join,
    Left,
    Chat,
    CorrectGuess,
    TurnEnded,
}

impl NotificationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Join => "join",
            Self::Left => "left",
            Self::Chat => "chat",
            Self::CorrectGuess => "guessed",
            Self::TurnEnded => "turn_ended",
        }
    }

    pub fn parse(tag: &str) -> Result<Self, CodecError> {
        match tag {
            "join" => Ok(Self::Join),
            "left" => Ok(Self::Left),
            "chat" => Ok(Self::Chat),
            "guessed" => Ok(Self::CorrectGuess),
            "turn_ended" => Ok(Self::TurnEnded),
            other => Err(CodecError::UnknownKind(other.to_string())),
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinPayload {
    pub player_id: String,
    pub nickname: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeftPayload {
    pub player_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatPayload {
    pub player_id: String,
    pub nickname: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrectGuessPayload {
    pub player_id: String,
    pub nickname: String,
}

/// Transient game event pushed to connected players. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// A player joined (or rejoined) the room
    Join(JoinPayload),

    /// A player was marked inactive after dropping their live stream
    Left(LeftPayload),

    /// Chat line or wrong guess; a correct guess is sent redacted
    Chat(ChatPayload),

    /// A player found the current word
    CorrectGuess(CorrectGuessPayload),

    /// Every active player found the word; a new turn follows shortly
    TurnEnded,
}

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("unknown notification type '{0}'")]
    UnknownKind(String),

    #[error("malformed {kind} payload: {source}")]
    Malformed {
        kind: NotificationKind,
        #[source]
        source: serde_json::Error,
    },

    #[error("{0} notifications carry no payload")]
    UnexpectedPayload(NotificationKind),
}

impl Notification {
    pub fn kind(&self) -> NotificationKind {
        match self {
            Self::Join(_) => NotificationKind::Join,
            Self::Left(_) => NotificationKind::Left,
            Self::Chat(_) => NotificationKind::Chat,
            Self::CorrectGuess(_) => NotificationKind::CorrectGuess,
            Self::TurnEnded => NotificationKind::TurnEnded,
        }
    }

    /// Serialize the payload. `TurnEnded` encodes to the empty string,
    /// every other variant to a JSON object of its fields.
    pub fn encode(&self) -> Result<(NotificationKind, String), CodecError> {
        let kind = self.kind();
        let payload = match self {
            Self::Join(p) => to_json(kind, p)?,
            Self::Left(p) => to_json(kind, p)?,
            Self::Chat(p) => to_json(kind, p)?,
            Self::CorrectGuess(p) => to_json(kind, p)?,
            Self::TurnEnded => String::new(),
        };
        Ok((kind, payload))
    }

    pub fn decode(tag: &str, payload: &str) -> Result<Self, CodecError> {
        let kind = NotificationKind::parse(tag)?;
        let notification = match kind {
            NotificationKind::Join => Self::Join(from_json(kind, payload)?),
            NotificationKind::Left => Self::Left(from_json(kind, payload)?),
            NotificationKind::Chat => Self::Chat(from_json(kind, payload)?),
            NotificationKind::CorrectGuess => Self::CorrectGuess(from_json(kind, payload)?),
            NotificationKind::TurnEnded => {
                if !payload.is_empty() {
                    return Err(CodecError::UnexpectedPayload(kind));
                }
                Self::TurnEnded
            }
        };
        Ok(notification)
    }
}

fn to_json<T: Serialize>(kind: NotificationKind, payload: &T) -> Result<String, CodecError> {
    serde_json::to_string(payload).map_err(|source| CodecError::Malformed { kind, source })
}

fn from_json<T: for<'de> Deserialize<'de>>(kind: NotificationKind, payload: &str) -> Result<T, CodecError> {
    serde_json::from_str(payload).map_err(|source| CodecError::Malformed { kind, source })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_with_commas_survives_the_wire() {
        let chat = Notification::Chat(ChatPayload {
            player_id: "p1".into(),
            nickname: "Silly, Cat".into(),
            content: "a,b,,c \"quoted\"\nnext line".into(),
        });

        let (kind, payload) = chat.encode().unwrap();
        assert_eq!(kind.as_str(), "chat");

        let decoded = Notification::decode(kind.as_str(), &payload).unwrap();
        assert_eq!(decoded, chat);
    }

    #[test]
    fn turn_ended_has_empty_payload() {
        let (kind, payload) = Notification::TurnEnded.encode().unwrap();
        assert_eq!(kind, NotificationKind::TurnEnded);
        assert!(payload.is_empty());
        assert_eq!(Notification::decode("turn_ended", "").unwrap(), Notification::TurnEnded);
    }

    #[test]
    fn turn_ended_rejects_payload() {
        let err = Notification::decode("turn_ended", "{}").unwrap_err();
        assert!(matches!(err, CodecError::UnexpectedPayload(NotificationKind::TurnEnded)));
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let err = Notification::decode("msg", "{}").unwrap_err();
        assert!(matches!(err, CodecError::UnknownKind(tag) if tag == "msg"));
    }

    #[test]
    fn malformed_payload_is_rejected() {
        let err = Notification::decode("guessed", "p1,SillyCat").unwrap_err();
        assert!(matches!(err, CodecError::Malformed { kind: NotificationKind::CorrectGuess, .. }));

        // missing field
        let err = Notification::decode("join", r#"{"player_id":"p1"}"#).unwrap_err();
        assert!(matches!(err, CodecError::Malformed { kind: NotificationKind::Join, .. }));
    }

    #[test]
    fn wire_tags_parse_back() {
        for kind in [
            NotificationKind::Join,
            NotificationKind::Left,
            NotificationKind::Chat,
            NotificationKind::CorrectGuess,
            NotificationKind::TurnEnded,
        ] {
            assert_eq!(NotificationKind::parse(kind.as_str()).unwrap(), kind);
        }
    }

    #[test]
    fn join_payload_is_json_object() {
        let join = Notification::Join(JoinPayload {
            player_id: "p2".into(),
            nickname: "AngryDog".into(),
        });
        let (_, payload) = join.encode().unwrap();
        let value: serde_json::Value = serde_json::from_str(&payload).unwrap();
        assert_eq!(value["player_id"], "p2");
        assert_eq!(value["nickname"], "AngryDog");
    }
}
