//! Cannon Duel Application
//!
//! Hosts the simulation inside the session runtime. Each participant owns a
//! cannon and a handful of regular blocks on its half of the room; they
//! rearrange blocks and shoot at the other side until someone has no
//! regular blocks left.

use serde::{Serialize, Deserialize};
use tracing::{debug, info};

use crate::core::rng::DeterministicRng;
use crate::core::room::Room;
use crate::core::vec3::Vec3;
use crate::game::cannon::{CannonConfig, CannonSystem};
use crate::game::collision::{CollisionConfig, CollisionSystem};
use crate::game::messages::{BlockPosition, GameCommand, GameMessage, Snapshot};
use crate::game::projectile::{ProjectileConfig, ProjectileSystem};
use crate::game::spawn::{SpawnConfig, SpawnSystem};
use crate::game::state::{BlockId, Ordinal, Phase, PlayerId, PlayerSlot, RoundOutcome, SimulationState};
use crate::network::hooks::{Routed, SessionHooks, SessionOutcome};
use crate::network::protocol::EndReason;
use crate::network::session::Participant;

/// Game configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct GameConfig {
    /// Room bounds.
    pub room: Room,
    /// Starting layout.
    pub spawn: SpawnConfig,
    /// Cannon behavior.
    pub cannon: CannonConfig,
    /// Projectile behavior.
    pub projectile: ProjectileConfig,
    /// Block collision.
    pub collision: CollisionConfig,
    /// Fire every ready cannon on each tick.
    pub auto_fire: bool,
}

impl GameConfig {
    /// Keep the block size consistent across systems.
    fn normalized(mut self) -> Self {
        let h = self.collision.half_extent;
        self.spawn.half_extent = h;
        self.projectile.block_half_extent = h;
        self.projectile.travel_axis = self.cannon.travel_axis;
        self
    }
}

/// Summary of a finished round, attached to `session_ended`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundSummary {
    /// Round number (0 for the first round).
    pub round: u32,
    /// Regular blocks left per slot.
    pub remaining: Vec<(Ordinal, usize)>,
    /// Final state.
    pub snapshot: Snapshot,
}

/// Data attached to lifecycle messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DuelPayload {
    /// End-of-round summary.
    Summary(RoundSummary),
    /// Current state.
    Snapshot(Snapshot),
}

/// The duel game.
pub struct DuelGame {
    config: GameConfig,
    state: SimulationState,
    session_seed: u64,
    round: u32,
    rng: DeterministicRng,
    collision: CollisionSystem,
    cannons: CannonSystem,
    projectiles: ProjectileSystem,
    spawner: SpawnSystem,
}

impl DuelGame {
    /// Create a game. `session_seed` fixes every round's layout.
    pub fn new(config: GameConfig, session_seed: u64) -> Self {
        let config = config.normalized();
        Self {
            state: SimulationState::new(config.room),
            session_seed,
            round: 0,
            rng: DeterministicRng::for_round(session_seed, 0),
            collision: CollisionSystem::new(config.room, config.collision),
            cannons: CannonSystem::new(config.cannon),
            projectiles: ProjectileSystem::new(config.projectile),
            spawner: SpawnSystem::new(config.spawn),
            config,
        }
    }

    /// Current simulation state.
    pub fn state(&self) -> &SimulationState {
        &self.state
    }

    /// Current round number.
    pub fn round(&self) -> u32 {
        self.round
    }

    /// Configuration in use.
    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    /// Seed the session was created with.
    pub fn session_seed(&self) -> u64 {
        self.session_seed
    }

    fn snapshot(&self) -> DuelPayload {
        DuelPayload::Snapshot(Snapshot::of(&self.state))
    }

    fn add_participant(&mut self, id: PlayerId, ordinal: Ordinal) {
        let slot = PlayerSlot::new(id, ordinal);
        let state = self.state.with_player(slot);
        let (state, _) = self.spawner.spawn_for(&state, &slot, &mut self.rng);
        self.state = state;
    }

    // =========================================================================
    // Commands
    // =========================================================================

    fn grab(&mut self, sender: &PlayerId, block_id: BlockId) -> Vec<Routed<GameMessage>> {
        let owned = self.state.block(block_id).is_some_and(|b| b.owner == *sender);
        if !owned || self.state.grabbed_by(sender).is_some() {
            debug!(participant = %sender, ?block_id, "grab rejected");
            return Vec::new();
        }
        self.state = self.state.with_grab(*sender, block_id);
        vec![Routed::all(GameMessage::BlockGrabbed { player_id: *sender, block_id })]
    }

    fn move_block(&mut self, sender: &PlayerId, block_id: BlockId, position: Vec3) -> Vec<Routed<GameMessage>> {
        if self.state.grabbed_by(sender) != Some(block_id) {
            debug!(participant = %sender, ?block_id, "move rejected: not holding block");
            return Vec::new();
        }

        let resolution = self.collision.resolve(&self.state, block_id, position);
        if resolution.moved.is_empty() {
            return Vec::new();
        }

        let blocks = resolution
            .moved
            .iter()
            .map(|(id, position)| BlockPosition { block_id: *id, position: *position })
            .collect();
        self.state = resolution.state;
        vec![Routed::all(GameMessage::BlocksMoved { blocks })]
    }

    fn release(&mut self, sender: &PlayerId, block_id: BlockId) -> Vec<Routed<GameMessage>> {
        if self.state.grabbed_by(sender) != Some(block_id) {
            return Vec::new();
        }
        self.state = self.state.without_grab(sender);
        vec![Routed::all(GameMessage::BlockReleased { player_id: *sender, block_id })]
    }

    fn fire(&mut self, sender: &PlayerId, cannon_id: BlockId) -> Vec<Routed<GameMessage>> {
        let result = self.cannons.fire(&self.state, sender, cannon_id, self.state.clock());
        let event = result.event(cannon_id);
        self.state = result.state;
        event
            .map(|e| vec![Routed::all(GameMessage::from(e))])
            .unwrap_or_default()
    }

    fn summary(&self) -> RoundSummary {
        let mut remaining: Vec<(Ordinal, usize)> = self
            .state
            .players()
            .values()
            .map(|slot| (slot.ordinal, self.state.regular_block_count(&slot.id)))
            .collect();
        remaining.sort();
        RoundSummary {
            round: self.round,
            remaining,
            snapshot: Snapshot::of(&self.state),
        }
    }
}

impl SessionHooks for DuelGame {
    type Command = GameCommand;
    type Message = GameMessage;
    type Payload = DuelPayload;

    fn on_join(&mut self, participant: &Participant) -> Option<DuelPayload> {
        self.add_participant(participant.id, participant.ordinal);
        Some(self.snapshot())
    }

    fn on_leave(&mut self, participant_id: &PlayerId) {
        self.state = self.state.without_player(participant_id);
    }

    fn on_message(&mut self, command: GameCommand, sender: &PlayerId, phase: Phase) -> Vec<Routed<GameMessage>> {
        match command {
            GameCommand::RequestSnapshot => {
                vec![Routed::sender(GameMessage::Snapshot(Snapshot::of(&self.state)))]
            }
            _ if phase == Phase::Finished => Vec::new(),
            GameCommand::GrabBlock { block_id } => self.grab(sender, block_id),
            GameCommand::MoveBlock { block_id, position } => self.move_block(sender, block_id, position),
            GameCommand::ReleaseBlock { block_id } => self.release(sender, block_id),
            GameCommand::FireCannon { cannon_id } if phase == Phase::Playing => self.fire(sender, cannon_id),
            GameCommand::FireCannon { .. } => Vec::new(),
        }
    }

    fn on_session_start(&mut self) {
        self.state = self.state.with_phase(Phase::Playing);
        info!(round = self.round, blocks = self.state.blocks().len(), "Round started");
    }

    fn on_reset(&mut self, participants: &[Participant]) -> Option<DuelPayload> {
        self.round += 1;
        self.rng = DeterministicRng::for_round(self.session_seed, self.round);
        self.state = SimulationState::new(self.config.room);

        let mut ordered: Vec<&Participant> = participants.iter().collect();
        ordered.sort_by_key(|p| p.ordinal);
        for p in ordered {
            self.add_participant(p.id, p.ordinal);
        }

        info!(round = self.round, blocks = self.state.blocks().len(), "Round reset");
        Some(self.snapshot())
    }

    fn on_opponent_joined(&mut self, _joining: &Participant) -> Option<DuelPayload> {
        Some(self.snapshot())
    }

    fn on_session_end(
        &mut self,
        winner_id: Option<&PlayerId>,
        _winner_ordinal: Option<Ordinal>,
        reason: EndReason,
    ) -> Option<DuelPayload> {
        self.state = self.state.with_phase(Phase::Finished);
        info!(round = self.round, winner = ?winner_id, ?reason, "Round over");
        Some(DuelPayload::Summary(self.summary()))
    }

    fn on_tick(&mut self, dt: f64) -> Vec<GameMessage> {
        let mut messages = Vec::new();
        let mut state = self.state.advance_clock(dt);

        if self.config.auto_fire {
            let (fired, events) = self.cannons.fire_ready_cannons(&state, state.clock());
            state = fired;
            messages.extend(events.into_iter().map(GameMessage::from));
        }

        let step = self.projectiles.step(&state, dt as f32);
        state = step.state;

        if !state.projectiles().is_empty() {
            messages.push(GameMessage::ProjectilesUpdated {
                projectiles: state.projectiles().values().cloned().collect(),
            });
        }
        messages.extend(step.events.into_iter().map(GameMessage::from));

        self.state = state;
        messages
    }

    fn check_session_end(&mut self) -> Option<SessionOutcome<DuelPayload>> {
        match self.state.round_outcome()? {
            RoundOutcome::Winner(id) => Some(SessionOutcome {
                winner_id: Some(id),
                winner_ordinal: self.state.player(&id).map(|s| s.ordinal),
                reason: EndReason::GameOver,
                payload: None,
            }),
            RoundOutcome::Draw => Some(SessionOutcome {
                winner_id: None,
                winner_ordinal: None,
                reason: EndReason::Draw,
                payload: None,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::room::Wall;
    use crate::game::state::BlockKind;

    fn pid(n: u8) -> PlayerId {
        PlayerId::from_bytes([n; 16])
    }

    fn game_with_two() -> DuelGame {
        let mut game = DuelGame::new(GameConfig::default(), 42);
        game.on_join(&Participant::new(pid(1), Ordinal::First));
        game.on_join(&Participant::new(pid(2), Ordinal::Second));
        game
    }

    fn first_regular(game: &DuelGame, owner: PlayerId) -> BlockId {
        game.state()
            .blocks_of(&owner)
            .find(|b| b.kind == BlockKind::Regular)
            .map(|b| b.id)
            .unwrap()
    }

    fn cannon_of(game: &DuelGame, owner: PlayerId) -> BlockId {
        game.state().blocks_of(&owner).find(|b| b.is_cannon()).map(|b| b.id).unwrap()
    }

    #[test]
    fn test_join_spawns_layout() {
        let game = game_with_two();
        assert_eq!(game.state().blocks().len(), 12);
        assert_eq!(game.state().players().len(), 2);
    }

    #[test]
    fn test_grab_move_release() {
        let mut game = game_with_two();
        let block = first_regular(&game, pid(1));

        let out = game.on_message(GameCommand::GrabBlock { block_id: block }, &pid(1), Phase::Waiting);
        assert_eq!(out.len(), 1);
        assert_eq!(game.state().grabbed_by(&pid(1)), Some(block));

        // The strip around the midline is empty after spawning.
        let target = Vec3::new(3.0, -1.5, 2.0);
        let out = game.on_message(GameCommand::MoveBlock { block_id: block, position: target }, &pid(1), Phase::Waiting);
        assert_eq!(out.len(), 1);
        match &out[0].message {
            GameMessage::BlocksMoved { blocks } => assert!(blocks.iter().any(|b| b.block_id == block)),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(game.state().block(block).unwrap().position, target);

        let out = game.on_message(GameCommand::ReleaseBlock { block_id: block }, &pid(1), Phase::Waiting);
        assert_eq!(out.len(), 1);
        assert!(game.state().grabbed_by(&pid(1)).is_none());
    }

    #[test]
    fn test_move_is_clamped_into_room() {
        let mut game = game_with_two();
        let block = first_regular(&game, pid(1));
        game.on_message(GameCommand::GrabBlock { block_id: block }, &pid(1), Phase::Waiting);

        game.on_message(
            GameCommand::MoveBlock { block_id: block, position: Vec3::new(50.0, -1.5, 0.0) },
            &pid(1),
            Phase::Waiting,
        );
        assert_eq!(game.state().block(block).unwrap().position.x, 9.5);
    }

    #[test]
    fn test_invalid_commands_are_no_ops() {
        let mut game = game_with_two();
        let theirs = first_regular(&game, pid(2));
        let mine = first_regular(&game, pid(1));
        let before = game.state().clone();

        // Foreign block
        assert!(game.on_message(GameCommand::GrabBlock { block_id: theirs }, &pid(1), Phase::Waiting).is_empty());
        // Move without holding
        assert!(game
            .on_message(GameCommand::MoveBlock { block_id: mine, position: Vec3::ZERO }, &pid(1), Phase::Waiting)
            .is_empty());
        // Release without holding
        assert!(game.on_message(GameCommand::ReleaseBlock { block_id: mine }, &pid(1), Phase::Waiting).is_empty());
        // Fire outside play
        let cannon = cannon_of(&game, pid(1));
        assert!(game.on_message(GameCommand::FireCannon { cannon_id: cannon }, &pid(1), Phase::Waiting).is_empty());

        assert_eq!(game.state(), &before);
    }

    #[test]
    fn test_single_grab_per_participant() {
        let mut game = game_with_two();
        let ids: Vec<BlockId> = game.state().blocks_of(&pid(1)).map(|b| b.id).collect();

        game.on_message(GameCommand::GrabBlock { block_id: ids[0] }, &pid(1), Phase::Waiting);
        let second = game.on_message(GameCommand::GrabBlock { block_id: ids[1] }, &pid(1), Phase::Waiting);

        assert!(second.is_empty());
        assert_eq!(game.state().grabbed_by(&pid(1)), Some(ids[0]));
    }

    #[test]
    fn test_fire_and_tick_until_wall() {
        let mut game = game_with_two();
        game.on_session_start();
        let cannon = cannon_of(&game, pid(1));

        let out = game.on_message(GameCommand::FireCannon { cannon_id: cannon }, &pid(1), Phase::Playing);
        assert!(matches!(out[0].message, GameMessage::ProjectileSpawned { .. }));

        // Cooling down
        assert!(game.on_message(GameCommand::FireCannon { cannon_id: cannon }, &pid(1), Phase::Playing).is_empty());

        let mut walls = Vec::new();
        for _ in 0..10 {
            for msg in game.on_tick(0.5) {
                if let GameMessage::WallHit { wall, .. } = msg {
                    walls.push(wall);
                }
            }
        }
        // Slot 1 fires toward -Z; cannons are shielded by default so the
        // shot reaches the far wall unless it hits a regular block first.
        assert!(game.state().projectiles().is_empty());
        assert!(walls.is_empty() || walls == vec![Wall::MinZ]);
        assert!((game.state().clock() - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_auto_fire() {
        let config = GameConfig { auto_fire: true, ..GameConfig::default() };
        let mut game = DuelGame::new(config, 1);
        game.on_join(&Participant::new(pid(1), Ordinal::First));
        game.on_join(&Participant::new(pid(2), Ordinal::Second));
        game.on_session_start();

        let out = game.on_tick(0.016);
        let spawned = out.iter().filter(|m| matches!(m, GameMessage::ProjectileSpawned { .. })).count();
        assert_eq!(spawned, 2);
    }

    #[test]
    fn test_session_end_detection() {
        let mut game = game_with_two();
        assert!(game.check_session_end().is_none());

        let doomed: Vec<BlockId> = game
            .state()
            .blocks_of(&pid(1))
            .filter(|b| !b.is_cannon())
            .map(|b| b.id)
            .collect();
        let mut state = game.state().clone();
        for id in doomed {
            state = state.without_block(id);
        }
        game.state = state;

        let outcome = game.check_session_end().unwrap();
        assert_eq!(outcome.winner_id, Some(pid(2)));
        assert_eq!(outcome.winner_ordinal, Some(Ordinal::Second));
        assert_eq!(outcome.reason, EndReason::GameOver);
    }

    #[test]
    fn test_reset_restores_layout() {
        let mut game = game_with_two();
        game.on_session_start();
        let baseline = game.state().blocks().len();

        let victim = first_regular(&game, pid(2));
        game.state = game.state.without_block(victim);
        game.on_session_end(Some(&pid(1)), Some(Ordinal::First), EndReason::GameOver);

        let participants = vec![
            Participant::new(pid(2), Ordinal::Second),
            Participant::new(pid(1), Ordinal::First),
        ];
        game.on_reset(&participants);

        assert_eq!(game.round(), 1);
        assert_eq!(game.state().blocks().len(), baseline);
        assert_eq!(game.state().phase(), Phase::Waiting);
        assert!(game.state().projectiles().is_empty());
    }

    #[test]
    fn test_leave_removes_blocks() {
        let mut game = game_with_two();
        game.on_leave(&pid(1));
        assert_eq!(game.state().blocks().len(), 6);
        assert!(game.state().blocks_of(&pid(1)).next().is_none());
    }

    #[test]
    fn test_snapshot_request_goes_to_sender() {
        let mut game = game_with_two();
        let out = game.on_message(GameCommand::RequestSnapshot, &pid(2), Phase::Finished);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].target, crate::network::hooks::Target::Sender);
    }
}
