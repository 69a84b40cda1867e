//! Duel Messages
//!
//! Application-level wire types. Commands arrive from participants; game
//! messages are sent back through the session runtime. Both carry a `type`
//! discriminator like the lifecycle messages they travel next to.

use serde::{Serialize, Deserialize};

use crate::core::room::{Room, Wall};
use crate::core::vec3::Vec3;
use crate::game::events::GameEvent;
use crate::game::state::{
    Block, BlockId, Color, Phase, PlayerId, PlayerSlot, Projectile, ProjectileId, SimulationState,
};

// =============================================================================
// PARTICIPANT -> SERVER
// =============================================================================

/// Commands a participant can send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GameCommand {
    /// Take hold of an owned block.
    GrabBlock { block_id: BlockId },

    /// Move the held block.
    MoveBlock { block_id: BlockId, position: Vec3 },

    /// Let go of the held block.
    ReleaseBlock { block_id: BlockId },

    /// Fire an owned cannon.
    FireCannon { cannon_id: BlockId },

    /// Ask for a full snapshot.
    RequestSnapshot,
}

// =============================================================================
// SERVER -> PARTICIPANT
// =============================================================================

/// Full view of the simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Room bounds.
    pub room: Room,
    /// Simulation phase.
    pub phase: Phase,
    /// Simulated seconds elapsed in the round.
    pub clock: f64,
    /// Registered participants.
    pub players: Vec<PlayerSlot>,
    /// All blocks in ID order.
    pub blocks: Vec<Block>,
    /// All projectiles in ID order.
    pub projectiles: Vec<Projectile>,
}

impl Snapshot {
    /// Capture a state.
    pub fn of(state: &SimulationState) -> Self {
        Self {
            room: *state.room(),
            phase: state.phase(),
            clock: state.clock(),
            players: state.players().values().copied().collect(),
            blocks: state.blocks().values().cloned().collect(),
            projectiles: state.projectiles().values().cloned().collect(),
        }
    }
}

/// New position of a block.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BlockPosition {
    pub block_id: BlockId,
    pub position: Vec3,
}

/// Messages the duel sends to participants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GameMessage {
    /// Full state.
    Snapshot(Snapshot),

    /// A participant took hold of a block.
    BlockGrabbed { player_id: PlayerId, block_id: BlockId },

    /// A participant let go of a block.
    BlockReleased { player_id: PlayerId, block_id: BlockId },

    /// Blocks that changed position after a move, pushes included.
    BlocksMoved { blocks: Vec<BlockPosition> },

    /// A cannon fired.
    ProjectileSpawned { projectile: Projectile, cannon_id: BlockId },

    /// Positions of every projectile still in flight.
    ProjectilesUpdated { projectiles: Vec<Projectile> },

    /// A projectile left the room.
    WallHit { projectile_id: ProjectileId, position: Vec3, wall: Wall },

    /// A block was destroyed.
    BlockDestroyed {
        block_id: BlockId,
        position: Vec3,
        color: Color,
        owner: PlayerId,
        projectile_id: ProjectileId,
    },
}

impl From<GameEvent> for GameMessage {
    fn from(event: GameEvent) -> Self {
        match event {
            GameEvent::ProjectileSpawned { projectile, cannon_id } => {
                GameMessage::ProjectileSpawned { projectile, cannon_id }
            }
            GameEvent::WallHit { projectile_id, position, wall } => {
                GameMessage::WallHit { projectile_id, position, wall }
            }
            GameEvent::BlockDestroyed { block_id, position, color, owner, projectile_id } => {
                GameMessage::BlockDestroyed { block_id, position, color, owner, projectile_id }
            }
        }
    }
}

impl GameMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl GameCommand {
    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_wire_format() {
        let cmd = GameCommand::from_json(
            r#"{"type":"move_block","block_id":3,"position":{"x":1.0,"y":-1.5,"z":4.0}}"#,
        )
        .unwrap();
        assert_eq!(
            cmd,
            GameCommand::MoveBlock { block_id: BlockId(3), position: Vec3::new(1.0, -1.5, 4.0) }
        );

        let cmd = GameCommand::from_json(r#"{"type":"request_snapshot"}"#).unwrap();
        assert_eq!(cmd, GameCommand::RequestSnapshot);

        assert!(GameCommand::from_json(r#"{"type":"teleport"}"#).is_err());
        assert!(GameCommand::from_json(r#"{"type":"fire_cannon"}"#).is_err());
    }

    #[test]
    fn test_wall_hit_message() {
        let msg = GameMessage::from(GameEvent::WallHit {
            projectile_id: ProjectileId(7),
            position: Vec3::new(0.0, 0.0, -25.5),
            wall: Wall::MinZ,
        });

        let json: serde_json::Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        assert_eq!(json["type"], "wall_hit");
        assert_eq!(json["wall"], "minZ");
        assert_eq!(json["projectile_id"], 7);
    }

    #[test]
    fn test_snapshot_message() {
        let state = SimulationState::new(Room::default());
        let msg = GameMessage::Snapshot(Snapshot::of(&state));

        let json: serde_json::Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        assert_eq!(json["type"], "snapshot");
        assert_eq!(json["phase"], "waiting");
        assert!(json["blocks"].as_array().unwrap().is_empty());
    }
}
