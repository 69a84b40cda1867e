//! Protocol Messages
//!
//! Wire format for the session lifecycle. All frames are JSON text with a
//! `type` discriminator. Lifecycle messages are recognized first; any other
//! `type` is handed to the application as a domain command.

use serde::de::DeserializeOwned;
use serde::{Serialize, Deserialize};

use crate::game::state::{Ordinal, Phase, PlayerId};

// =============================================================================
// CLIENT -> SERVER MESSAGES
// =============================================================================

/// Lifecycle messages handled by the runtime itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LifecycleMessage {
    /// Participant is ready to start.
    ParticipantReady,
    /// Participant is an automated player (auto-ready).
    BotIdentify,
    /// Participant wants another round.
    PlayAgainVote,
}

impl LifecycleMessage {
    /// Wire names of every lifecycle message.
    pub const TYPES: [&'static str; 3] = ["participant_ready", "bot_identify", "play_again_vote"];
}

/// A parsed inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound<C> {
    /// Handled by the runtime.
    Lifecycle(LifecycleMessage),
    /// Forwarded to the application.
    App(C),
}

impl<C: DeserializeOwned> Inbound<C> {
    /// Parse a text frame.
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let value: serde_json::Value = serde_json::from_str(text).map_err(ProtocolError::InvalidJson)?;

        let kind = value
            .get("type")
            .and_then(|t| t.as_str())
            .ok_or(ProtocolError::MissingType)?
            .to_string();

        if LifecycleMessage::TYPES.contains(&kind.as_str()) {
            let msg = serde_json::from_value(value).map_err(|e| ProtocolError::Malformed { kind: kind.clone(), source: e })?;
            return Ok(Inbound::Lifecycle(msg));
        }

        serde_json::from_value(value)
            .map(Inbound::App)
            .map_err(|e| ProtocolError::Malformed { kind, source: e })
    }
}

// =============================================================================
// SERVER -> CLIENT MESSAGES
// =============================================================================

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// A participant lost all regular blocks.
    GameOver,
    /// Both participants lost their last regular block together.
    Draw,
    /// A participant disconnected during play.
    ParticipantLeft,
}

/// Lifecycle messages sent by the runtime.
///
/// `P` is the application payload attached to some messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage<P> {
    /// Sent to a newly admitted participant.
    Welcome {
        participant_id: PlayerId,
        ordinal: Ordinal,
        phase: Phase,
        app_data: Option<P>,
    },

    /// The other slot was filled.
    OpponentJoined {
        #[serde(skip_serializing_if = "Option::is_none")]
        app_data: Option<P>,
    },

    /// The other participant disconnected.
    OpponentLeft,

    /// Both participants are ready; play begins.
    SessionStarted,

    /// The round is over.
    SessionEnded {
        reason: EndReason,
        #[serde(skip_serializing_if = "Option::is_none")]
        winner_id: Option<PlayerId>,
        #[serde(skip_serializing_if = "Option::is_none")]
        winner_ordinal: Option<Ordinal>,
        #[serde(skip_serializing_if = "Option::is_none")]
        app_data: Option<P>,
    },

    /// Replay vote progress.
    PlayAgainStatus {
        voted_ids: Vec<PlayerId>,
        total_participants: usize,
    },

    /// The session returned to waiting with a fresh round.
    SessionReset {
        #[serde(skip_serializing_if = "Option::is_none")]
        app_data: Option<P>,
    },

    /// Something went wrong with the participant's request.
    Error { message: String },
}

impl<P: Serialize> ServerMessage<P> {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl<P: DeserializeOwned> ServerMessage<P> {
    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

// =============================================================================
// ERRORS
// =============================================================================

/// Inbound parse failures.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Frame is not JSON.
    #[error("Invalid JSON: {0}")]
    InvalidJson(serde_json::Error),

    /// Frame has no string `type` field.
    #[error("Message has no type")]
    MissingType,

    /// `type` is unknown or the fields do not match it.
    #[error("Unrecognized or malformed message '{kind}': {source}")]
    Malformed {
        /// The frame's `type`.
        kind: String,
        /// Decoder error.
        source: serde_json::Error,
    },

    /// Binary frames are not part of the protocol.
    #[error("Binary frames are not supported")]
    BinaryFrame,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, Deserialize)]
    #[serde(tag = "type", rename_all = "snake_case")]
    enum Cmd {
        Poke { strength: u32 },
    }

    #[test]
    fn test_parse_lifecycle() {
        let msg = Inbound::<Cmd>::parse(r#"{"type":"participant_ready"}"#).unwrap();
        assert_eq!(msg, Inbound::Lifecycle(LifecycleMessage::ParticipantReady));

        let msg = Inbound::<Cmd>::parse(r#"{"type":"bot_identify"}"#).unwrap();
        assert_eq!(msg, Inbound::Lifecycle(LifecycleMessage::BotIdentify));

        let msg = Inbound::<Cmd>::parse(r#"{"type":"play_again_vote"}"#).unwrap();
        assert_eq!(msg, Inbound::Lifecycle(LifecycleMessage::PlayAgainVote));
    }

    #[test]
    fn test_parse_app_command() {
        let msg = Inbound::<Cmd>::parse(r#"{"type":"poke","strength":3}"#).unwrap();
        assert_eq!(msg, Inbound::App(Cmd::Poke { strength: 3 }));
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(Inbound::<Cmd>::parse("not json"), Err(ProtocolError::InvalidJson(_))));
        assert!(matches!(Inbound::<Cmd>::parse(r#"{"strength":3}"#), Err(ProtocolError::MissingType)));
        assert!(matches!(Inbound::<Cmd>::parse(r#"{"type":7}"#), Err(ProtocolError::MissingType)));

        match Inbound::<Cmd>::parse(r#"{"type":"dance"}"#) {
            Err(ProtocolError::Malformed { kind, .. }) => assert_eq!(kind, "dance"),
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(
            Inbound::<Cmd>::parse(r#"{"type":"poke"}"#),
            Err(ProtocolError::Malformed { .. })
        ));
    }

    #[test]
    fn test_welcome_wire_format() {
        let id = PlayerId::from_bytes([1; 16]);
        let msg: ServerMessage<u32> = ServerMessage::Welcome {
            participant_id: id,
            ordinal: Ordinal::Second,
            phase: Phase::Waiting,
            app_data: Some(5),
        };

        let json: serde_json::Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        assert_eq!(json["type"], "welcome");
        assert_eq!(json["ordinal"], 2);
        assert_eq!(json["phase"], "waiting");
        assert_eq!(json["app_data"], 5);
        assert_eq!(json["participant_id"], id.to_string());
    }

    #[test]
    fn test_session_ended_wire_format() {
        let msg: ServerMessage<()> = ServerMessage::SessionEnded {
            reason: EndReason::ParticipantLeft,
            winner_id: None,
            winner_ordinal: Some(Ordinal::Second),
            app_data: None,
        };

        let json: serde_json::Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        assert_eq!(json["type"], "session_ended");
        assert_eq!(json["reason"], "participant_left");
        assert_eq!(json["winner_ordinal"], 2);
        assert!(json.get("winner_id").is_none());

        let parsed = ServerMessage::<()>::from_json(&msg.to_json().unwrap()).unwrap();
        assert_eq!(parsed, msg);
    }
}
