//! Client↔relay JSON message codec (NIP-01).
//!
//! Incoming frames are parsed into [`IncomingMessage`]; anything that is not
//! a well-formed array with a known type yields an error so the caller can
//! log and drop it without tearing down the connection.

use nostr::{Event, Filter};
use serde_json::{json, Value};

#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Malformed {kind} message: {reason}")]
    Malformed {
        kind: &'static str,
        reason: &'static str,
    },

    #[error("Unknown message type {0:?}")]
    UnknownType(String),

    #[error("Event {0} failed verification")]
    InvalidEvent(String),
}

/// Message received from a relay.
#[derive(Debug, Clone)]
pub enum IncomingMessage {
    Event {
        subscription_id: String,
        event: Box<Event>,
    },
    Eose {
        subscription_id: String,
    },
    Closed {
        subscription_id: String,
        message: String,
    },
    Ok {
        event_id: String,
        accepted: bool,
        message: String,
    },
    Notice {
        message: String,
    },
    Auth {
        challenge: String,
    },
}

impl IncomingMessage {
    pub fn from_json(text: &str) -> Result<Self, MessageError> {
        let value: Value = serde_json::from_str(text)?;
        let Value::Array(items) = value else {
            return Err(MessageError::Malformed {
                kind: "relay",
                reason: "not an array",
            });
        };

        let kind = items.first().and_then(Value::as_str).unwrap_or_default();
        match kind {
            "EVENT" => {
                let subscription_id = str_at(&items, 1, "EVENT")?;
                let raw = items.get(2).cloned().ok_or(MessageError::Malformed {
                    kind: "EVENT",
                    reason: "missing event",
                })?;
                let event: Event = serde_json::from_value(raw)?;
                if event.verify().is_err() {
                    return Err(MessageError::InvalidEvent(event.id.to_hex()));
                }
                Ok(Self::Event {
                    subscription_id,
                    event: Box::new(event),
                })
            }
            "EOSE" => Ok(Self::Eose {
                subscription_id: str_at(&items, 1, "EOSE")?,
            }),
            "CLOSED" => Ok(Self::Closed {
                subscription_id: str_at(&items, 1, "CLOSED")?,
                message: optional_str_at(&items, 2),
            }),
            "OK" => {
                let event_id = str_at(&items, 1, "OK")?;
                let accepted = items.get(2).and_then(Value::as_bool).ok_or(
                    MessageError::Malformed {
                        kind: "OK",
                        reason: "missing status",
                    },
                )?;
                Ok(Self::Ok {
                    event_id,
                    accepted,
                    message: optional_str_at(&items, 3),
                })
            }
            "NOTICE" => Ok(Self::Notice {
                message: optional_str_at(&items, 1),
            }),
            "AUTH" => Ok(Self::Auth {
                challenge: str_at(&items, 1, "AUTH")?,
            }),
            other => Err(MessageError::UnknownType(other.to_string())),
        }
    }

    /// Subscription id this message is addressed to, if any.
    pub fn subscription_id(&self) -> Option<&str> {
        match self {
            Self::Event {
                subscription_id, ..
            }
            | Self::Eose { subscription_id }
            | Self::Closed {
                subscription_id, ..
            } => Some(subscription_id),
            _ => None,
        }
    }
}

fn str_at(items: &[Value], index: usize, kind: &'static str) -> Result<String, MessageError> {
    items
        .get(index)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or(MessageError::Malformed {
            kind,
            reason: "missing string field",
        })
}

fn optional_str_at(items: &[Value], index: usize) -> String {
    items
        .get(index)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Message sent to a relay.
#[derive(Debug, Clone)]
pub enum OutgoingMessage {
    Req {
        subscription_id: String,
        filter: Filter,
    },
    Event(Box<Event>),
    Close {
        subscription_id: String,
    },
}

impl OutgoingMessage {
    pub fn to_json(&self) -> String {
        let value = match self {
            Self::Req {
                subscription_id,
                filter,
            } => json!(["REQ", subscription_id, filter]),
            Self::Event(event) => json!(["EVENT", event]),
            Self::Close { subscription_id } => json!(["CLOSE", subscription_id]),
        };
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nostr::{EventBuilder, Keys, Kind};

    fn signed_note(keys: &Keys) -> Event {
        EventBuilder::new(Kind::from(1u16), "hello")
            .sign_with_keys(keys)
            .expect("Failed to sign event")
    }

    #[test]
    fn test_parse_event_message() {
        let keys = Keys::generate();
        let event = signed_note(&keys);
        let frame = json!(["EVENT", "sub1", event]).to_string();

        match IncomingMessage::from_json(&frame).unwrap() {
            IncomingMessage::Event {
                subscription_id,
                event: parsed,
            } => {
                assert_eq!(subscription_id, "sub1");
                assert_eq!(parsed.id, event.id);
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_tampered_event_is_rejected() {
        let keys = Keys::generate();
        let event = signed_note(&keys);
        let mut raw = serde_json::to_value(&event).unwrap();
        raw["content"] = json!("tampered");
        let frame = json!(["EVENT", "sub1", raw]).to_string();

        assert!(matches!(
            IncomingMessage::from_json(&frame),
            Err(MessageError::InvalidEvent(_))
        ));
    }

    #[test]
    fn test_parse_control_messages() {
        assert!(matches!(
            IncomingMessage::from_json(r#"["EOSE","sub1"]"#).unwrap(),
            IncomingMessage::Eose { subscription_id } if subscription_id == "sub1"
        ));
        assert!(matches!(
            IncomingMessage::from_json(r#"["CLOSED","sub1","error: shutting down"]"#).unwrap(),
            IncomingMessage::Closed { subscription_id, message }
                if subscription_id == "sub1" && message == "error: shutting down"
        ));
        assert!(matches!(
            IncomingMessage::from_json(r#"["OK","abcd",false,"blocked: spam"]"#).unwrap(),
            IncomingMessage::Ok { event_id, accepted: false, message }
                if event_id == "abcd" && message == "blocked: spam"
        ));
        assert!(matches!(
            IncomingMessage::from_json(r#"["NOTICE","slow down"]"#).unwrap(),
            IncomingMessage::Notice { message } if message == "slow down"
        ));
        assert!(matches!(
            IncomingMessage::from_json(r#"["AUTH","challenge"]"#).unwrap(),
            IncomingMessage::Auth { challenge } if challenge == "challenge"
        ));
    }

    #[test]
    fn test_malformed_frames() {
        assert!(matches!(
            IncomingMessage::from_json("{}"),
            Err(MessageError::Malformed { .. })
        ));
        assert!(matches!(
            IncomingMessage::from_json(r#"["EOSE"]"#),
            Err(MessageError::Malformed { kind: "EOSE", .. })
        ));
        assert!(matches!(
            IncomingMessage::from_json(r#"["OK","abcd"]"#),
            Err(MessageError::Malformed { kind: "OK", .. })
        ));
        assert!(matches!(
            IncomingMessage::from_json(r#"["COUNT","sub",{"count":1}]"#),
            Err(MessageError::UnknownType(t)) if t == "COUNT"
        ));
        assert!(matches!(
            IncomingMessage::from_json("not json"),
            Err(MessageError::Json(_))
        ));
    }

    #[test]
    fn test_outgoing_serialization() {
        let filter = Filter::new().kind(Kind::from(3u16)).limit(1);
        let req = OutgoingMessage::Req {
            subscription_id: "s".to_string(),
            filter,
        }
        .to_json();
        let parsed: Value = serde_json::from_str(&req).unwrap();
        assert_eq!(parsed[0], "REQ");
        assert_eq!(parsed[1], "s");
        assert_eq!(parsed[2]["kinds"], json!([3]));
        assert_eq!(parsed[2]["limit"], json!(1));

        let close = OutgoingMessage::Close {
            subscription_id: "s".to_string(),
        }
        .to_json();
        assert_eq!(close, r#"["CLOSE","s"]"#);
    }
}
