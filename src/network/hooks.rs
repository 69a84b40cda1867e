//! Application Hooks
//!
//! The session runtime knows nothing about the game it hosts. The embedding
//! application plugs in through [`SessionHooks`]; the runtime calls these at
//! each lifecycle edge and routes whatever they return.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::game::state::{Ordinal, Phase, PlayerId};
use crate::network::protocol::EndReason;
use crate::network::session::Participant;

/// Who receives a routed message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// Only the participant whose message caused it.
    Sender,
    /// Only the other participant.
    Opponent,
    /// Every live participant.
    All,
}

/// A message with its destination.
#[derive(Debug, Clone, PartialEq)]
pub struct Routed<M> {
    /// Destination
    pub target: Target,
    /// Message
    pub message: M,
}

impl<M> Routed<M> {
    /// Address a message to the sender.
    pub fn sender(message: M) -> Self {
        Self { target: Target::Sender, message }
    }

    /// Address a message to the opponent.
    pub fn opponent(message: M) -> Self {
        Self { target: Target::Opponent, message }
    }

    /// Address a message to everyone.
    pub fn all(message: M) -> Self {
        Self { target: Target::All, message }
    }
}

/// Terminal condition reported by [`SessionHooks::check_session_end`].
#[derive(Debug, Clone, PartialEq)]
pub struct SessionOutcome<P> {
    /// Winner, if the round was not drawn.
    pub winner_id: Option<PlayerId>,
    /// Winner's slot.
    pub winner_ordinal: Option<Ordinal>,
    /// Why it ended.
    pub reason: EndReason,
    /// Extra data for `session_ended`.
    pub payload: Option<P>,
}

/// Behavior supplied by the hosted application.
pub trait SessionHooks: Send + 'static {
    /// Domain commands participants send.
    type Command: DeserializeOwned;
    /// Domain messages sent to participants.
    type Message: Serialize;
    /// Data attached to lifecycle messages (`app_data`).
    type Payload: Serialize;

    /// Generate an identity for a newly admitted participant.
    fn participant_id(&mut self, _ordinal: Ordinal) -> PlayerId {
        PlayerId::random()
    }

    /// A participant was admitted. Returns the welcome payload.
    fn on_join(&mut self, participant: &Participant) -> Option<Self::Payload>;

    /// A participant is leaving.
    fn on_leave(&mut self, participant_id: &PlayerId);

    /// A domain command arrived.
    fn on_message(
        &mut self,
        command: Self::Command,
        sender: &PlayerId,
        phase: Phase,
    ) -> Vec<Routed<Self::Message>>;

    /// The session entered `playing`.
    fn on_session_start(&mut self);

    /// The session is returning to `waiting`. Rebuild the round for the
    /// given participants and return the reset payload.
    fn on_reset(&mut self, participants: &[Participant]) -> Option<Self::Payload>;

    /// Another participant joined. Returns the payload for the one already there.
    fn on_opponent_joined(&mut self, _joining: &Participant) -> Option<Self::Payload> {
        None
    }

    /// The session entered `finished`.
    fn on_session_end(
        &mut self,
        winner_id: Option<&PlayerId>,
        winner_ordinal: Option<Ordinal>,
        reason: EndReason,
    ) -> Option<Self::Payload>;

    /// Advance by `dt` seconds. Returned messages go to everyone.
    fn on_tick(&mut self, dt: f64) -> Vec<Self::Message>;

    /// Polled after every tick while playing.
    fn check_session_end(&mut self) -> Option<SessionOutcome<Self::Payload>>;
}
