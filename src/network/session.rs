//! Session Lifecycle Runtime
//!
//! Admits exactly two participants, gates the session through
//! waiting → playing → finished → waiting, routes messages, and handles
//! disconnects. Every entry point is synchronous and runs to completion;
//! the transport serializes calls (see `server.rs`).

use std::collections::BTreeMap;
use std::sync::Arc;
use serde::{Serialize, Deserialize};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::game::state::{Ordinal, Phase, PlayerId};
use crate::network::connection::Connection;
use crate::network::hooks::{Routed, SessionHooks, SessionOutcome, Target};
use crate::network::protocol::{EndReason, Inbound, LifecycleMessage, ServerMessage};

/// Maximum live participants.
pub const MAX_PARTICIPANTS: usize = 2;

/// A live participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    /// Identity, fresh on every admission.
    pub id: PlayerId,
    /// Slot (1 or 2).
    pub ordinal: Ordinal,
    /// Ready to start.
    pub ready: bool,
    /// Automated player.
    pub is_bot: bool,
    /// Voted to play again.
    pub wants_replay: bool,
}

impl Participant {
    /// Create a participant that is not ready.
    pub fn new(id: PlayerId, ordinal: Ordinal) -> Self {
        Self {
            id,
            ordinal,
            ready: false,
            is_bot: false,
            wants_replay: false,
        }
    }
}

/// Session errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SessionError {
    /// Both slots are taken.
    #[error("Session is full")]
    SessionFull,

    /// No live participant with that identity.
    #[error("Participant not found: {0}")]
    ParticipantNotFound(PlayerId),

    /// Operation needs a different phase.
    #[error("Session is {actual}, expected {expected}")]
    WrongPhase {
        /// Phase the operation needs.
        expected: Phase,
        /// Current phase.
        actual: Phase,
    },
}

/// Two-participant session runtime.
pub struct SessionRuntime<H: SessionHooks> {
    hooks: H,
    phase: Phase,
    phase_tx: watch::Sender<Phase>,
    participants: BTreeMap<PlayerId, Participant>,
    connections: BTreeMap<PlayerId, Arc<dyn Connection>>,
}

impl<H: SessionHooks> SessionRuntime<H> {
    /// Create a runtime in the `waiting` phase.
    pub fn new(hooks: H) -> Self {
        let (phase_tx, _) = watch::channel(Phase::Waiting);
        Self {
            hooks,
            phase: Phase::Waiting,
            phase_tx,
            participants: BTreeMap::new(),
            connections: BTreeMap::new(),
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Watch phase transitions (drives the tick scheduler).
    pub fn subscribe_phase(&self) -> watch::Receiver<Phase> {
        self.phase_tx.subscribe()
    }

    /// Live participants.
    pub fn participants(&self) -> impl Iterator<Item = &Participant> {
        self.participants.values()
    }

    /// Look up a participant.
    pub fn participant(&self, id: &PlayerId) -> Option<&Participant> {
        self.participants.get(id)
    }

    /// Number of live participants.
    pub fn participant_count(&self) -> usize {
        self.participants.len()
    }

    /// The hosted application.
    pub fn hooks(&self) -> &H {
        &self.hooks
    }

    fn opponent_of(&self, id: &PlayerId) -> Option<&Participant> {
        self.participants.values().find(|p| p.id != *id)
    }

    fn set_phase(&mut self, phase: Phase) {
        if self.phase != phase {
            debug!(from = %self.phase, to = %phase, "phase change");
        }
        self.phase = phase;
        self.phase_tx.send_replace(phase);
    }

    // =========================================================================
    // Sending
    // =========================================================================

    fn encode<T: Serialize>(message: &T) -> Option<String> {
        match serde_json::to_string(message) {
            Ok(text) => Some(text),
            Err(e) => {
                error!("Failed to serialize message: {}", e);
                None
            }
        }
    }

    fn send_to<T: Serialize>(&self, id: &PlayerId, message: &T) {
        let Some(conn) = self.connections.get(id) else {
            return;
        };
        if !conn.is_open() {
            return;
        }
        if let Some(text) = Self::encode(message) {
            conn.send(text);
        }
    }

    fn broadcast<T: Serialize>(&self, message: &T) {
        let Some(text) = Self::encode(message) else {
            return;
        };
        for conn in self.connections.values().filter(|c| c.is_open()) {
            conn.send(text.clone());
        }
    }

    fn route(&self, sender: &PlayerId, routed: Routed<H::Message>) {
        match routed.target {
            Target::Sender => self.send_to(sender, &routed.message),
            Target::Opponent => {
                if let Some(other) = self.opponent_of(sender) {
                    self.send_to(&other.id, &routed.message);
                }
            }
            Target::All => self.broadcast(&routed.message),
        }
    }

    // =========================================================================
    // Admission
    // =========================================================================

    /// Admit a connection, assigning the lowest free slot.
    ///
    /// A full session sends an error frame and closes the connection.
    pub fn admit(&mut self, connection: Arc<dyn Connection>) -> Result<Participant, SessionError> {
        let free = Ordinal::ALL
            .into_iter()
            .find(|o| !self.participants.values().any(|p| p.ordinal == *o));

        let Some(ordinal) = free else {
            warn!("Rejecting connection: session is full");
            let reject: ServerMessage<H::Payload> = ServerMessage::Error {
                message: SessionError::SessionFull.to_string(),
            };
            if let Some(text) = Self::encode(&reject) {
                connection.send(text);
            }
            connection.close();
            return Err(SessionError::SessionFull);
        };

        let mut id = self.hooks.participant_id(ordinal);
        while self.participants.contains_key(&id) {
            id = PlayerId::random();
        }

        let participant = Participant::new(id, ordinal);
        self.participants.insert(id, participant.clone());
        self.connections.insert(id, connection);

        let app_data = self.hooks.on_join(&participant);
        self.send_to(&id, &ServerMessage::Welcome {
            participant_id: id,
            ordinal,
            phase: self.phase,
            app_data,
        });

        if let Some(other) = self.opponent_of(&id).map(|p| p.id) {
            let app_data = self.hooks.on_opponent_joined(&participant);
            self.send_to(&other, &ServerMessage::OpponentJoined { app_data });
        }

        // A newcomer in `finished` changes the vote tally
        if self.phase == Phase::Finished {
            self.broadcast_vote_status();
        }

        info!(participant = %id, %ordinal, phase = %self.phase, "Participant admitted");
        Ok(participant)
    }

    // =========================================================================
    // Disconnect
    // =========================================================================

    /// Remove a participant. Returns the removed record.
    ///
    /// Leaving during play ends the round with the remaining participant
    /// as winner.
    pub fn disconnect(&mut self, id: &PlayerId) -> Option<Participant> {
        if !self.participants.contains_key(id) {
            return None;
        }
        let left_finished = self.phase == Phase::Finished;

        self.hooks.on_leave(id);
        let removed = self.participants.remove(id);
        if let Some(conn) = self.connections.remove(id) {
            conn.close();
        }
        info!(participant = %id, phase = %self.phase, "Participant left");

        if self.phase == Phase::Playing {
            let winner = self.participants.values().next().map(|p| (p.id, p.ordinal));
            self.finish(SessionOutcome {
                winner_id: winner.map(|(id, _)| id),
                winner_ordinal: winner.map(|(_, ordinal)| ordinal),
                reason: EndReason::ParticipantLeft,
                payload: None,
            });
        }

        self.broadcast(&ServerMessage::<H::Payload>::OpponentLeft);

        if self.participants.is_empty() && self.phase != Phase::Waiting {
            info!("Session empty, returning to waiting");
            self.reset_round();
        } else if self.phase == Phase::Finished {
            // A departed voter may have been the only holdout.
            self.try_replay();
            if left_finished && self.phase == Phase::Finished {
                self.broadcast_vote_status();
            }
        }

        removed
    }

    // =========================================================================
    // Inbound messages
    // =========================================================================

    /// Handle a raw text frame from a participant.
    ///
    /// Malformed frames are answered with an error frame.
    pub fn handle_message(&mut self, sender: &PlayerId, raw: &str) -> Result<(), SessionError> {
        if !self.participants.contains_key(sender) {
            return Err(SessionError::ParticipantNotFound(*sender));
        }

        match Inbound::<H::Command>::parse(raw) {
            Ok(Inbound::Lifecycle(message)) => self.handle_lifecycle(sender, message),
            Ok(Inbound::App(command)) => {
                let routed = self.hooks.on_message(command, sender, self.phase);
                for r in routed {
                    self.route(sender, r);
                }
            }
            Err(e) => {
                debug!(participant = %sender, error = %e, "Invalid message");
                self.send_error(sender, e.to_string());
            }
        }
        Ok(())
    }

    /// Send an error frame to a participant.
    pub fn send_error(&self, id: &PlayerId, message: impl Into<String>) {
        self.send_to(id, &ServerMessage::<H::Payload>::Error { message: message.into() });
    }

    fn handle_lifecycle(&mut self, sender: &PlayerId, message: LifecycleMessage) {
        match message {
            LifecycleMessage::ParticipantReady => {
                if self.phase != Phase::Waiting {
                    debug!(participant = %sender, phase = %self.phase, "Ignoring ready outside waiting");
                    return;
                }
                if let Some(p) = self.participants.get_mut(sender) {
                    p.ready = true;
                }
                debug!(participant = %sender, "Participant ready");
                self.try_start();
            }
            LifecycleMessage::BotIdentify => {
                if let Some(p) = self.participants.get_mut(sender) {
                    p.is_bot = true;
                    p.ready = true;
                }
                info!(participant = %sender, "Participant identified as bot");
                if self.phase == Phase::Waiting {
                    self.try_start();
                }
            }
            LifecycleMessage::PlayAgainVote => {
                if self.phase != Phase::Finished {
                    debug!(participant = %sender, phase = %self.phase, "Ignoring vote outside finished");
                    return;
                }
                if let Some(p) = self.participants.get_mut(sender) {
                    p.wants_replay = true;
                }
                self.broadcast_vote_status();
                self.try_replay();
            }
        }
    }

    // =========================================================================
    // Phase transitions
    // =========================================================================

    /// Check if the ready gate is open.
    pub fn can_start(&self) -> bool {
        self.phase == Phase::Waiting
            && self.participants.len() == MAX_PARTICIPANTS
            && self.participants.values().all(|p| p.ready)
            && self.participants.values().any(|p| !p.is_bot)
    }

    fn try_start(&mut self) {
        if !self.can_start() {
            return;
        }
        self.set_phase(Phase::Playing);
        self.hooks.on_session_start();
        self.broadcast(&ServerMessage::<H::Payload>::SessionStarted);
        info!("Session started");
    }

    /// Identities that voted to play again.
    pub fn voted_ids(&self) -> Vec<PlayerId> {
        self.participants
            .values()
            .filter(|p| p.wants_replay)
            .map(|p| p.id)
            .collect()
    }

    /// Check if the replay gate is open. Bots count as willing.
    pub fn can_replay(&self) -> bool {
        self.phase == Phase::Finished
            && self.participants.values().any(|p| p.wants_replay)
            && self.participants.values().all(|p| p.is_bot || p.wants_replay)
    }

    fn broadcast_vote_status(&self) {
        self.broadcast(&ServerMessage::<H::Payload>::PlayAgainStatus {
            voted_ids: self.voted_ids(),
            total_participants: self.participants.len(),
        });
    }

    fn try_replay(&mut self) {
        if self.can_replay() {
            self.reset_round();
        }
    }

    /// Advance the running session by `dt` seconds.
    ///
    /// Does nothing unless the phase is `playing`.
    pub fn tick(&mut self, dt: f64) {
        if self.phase != Phase::Playing {
            return;
        }

        for message in self.hooks.on_tick(dt) {
            self.broadcast(&message);
        }

        if let Some(outcome) = self.hooks.check_session_end() {
            self.finish(outcome);
        }
    }

    /// End the running session with the given winner.
    pub fn end_session(&mut self, winner_id: Option<PlayerId>, reason: EndReason) -> Result<(), SessionError> {
        if self.phase != Phase::Playing {
            return Err(SessionError::WrongPhase { expected: Phase::Playing, actual: self.phase });
        }
        if let Some(id) = winner_id {
            if !self.participants.contains_key(&id) {
                return Err(SessionError::ParticipantNotFound(id));
            }
        }
        let winner_ordinal = winner_id.and_then(|id| self.participants.get(&id)).map(|p| p.ordinal);
        self.finish(SessionOutcome { winner_id, winner_ordinal, reason, payload: None });
        Ok(())
    }

    fn finish(&mut self, outcome: SessionOutcome<H::Payload>) {
        self.set_phase(Phase::Finished);
        for p in self.participants.values_mut() {
            p.wants_replay = false;
        }

        let hook_payload = self.hooks.on_session_end(
            outcome.winner_id.as_ref(),
            outcome.winner_ordinal,
            outcome.reason,
        );

        info!(
            winner = ?outcome.winner_id,
            ordinal = ?outcome.winner_ordinal,
            reason = ?outcome.reason,
            "Session ended"
        );

        self.broadcast(&ServerMessage::SessionEnded {
            reason: outcome.reason,
            winner_id: outcome.winner_id,
            winner_ordinal: outcome.winner_ordinal,
            app_data: outcome.payload.or(hook_payload),
        });
    }

    fn reset_round(&mut self) {
        for p in self.participants.values_mut() {
            p.ready = p.is_bot;
            p.wants_replay = false;
        }

        let participants: Vec<Participant> = self.participants.values().cloned().collect();
        let app_data = self.hooks.on_reset(&participants);
        self.set_phase(Phase::Waiting);

        self.broadcast(&ServerMessage::SessionReset { app_data });
        info!(participants = participants.len(), "Session reset");
    }
}
