//! Game Events
//!
//! Events produced by the simulation systems. The duel application turns
//! them into outbound messages.

use serde::{Serialize, Deserialize};

use crate::core::room::Wall;
use crate::core::vec3::Vec3;
use crate::game::state::{BlockId, Color, PlayerId, Projectile, ProjectileId};

/// Simulation event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum GameEvent {
    /// A cannon fired.
    ProjectileSpawned {
        /// The new projectile
        projectile: Projectile,
        /// Cannon that fired it
        cannon_id: BlockId,
    },

    /// A projectile left the room along its travel axis.
    WallHit {
        projectile_id: ProjectileId,
        /// Position after the step that crossed the wall
        position: Vec3,
        wall: Wall,
    },

    /// A projectile destroyed a block.
    BlockDestroyed {
        block_id: BlockId,
        /// Last position of the block
        position: Vec3,
        color: Color,
        owner: PlayerId,
        projectile_id: ProjectileId,
    },
}

impl GameEvent {
    /// Projectile involved in the event.
    pub fn projectile_id(&self) -> ProjectileId {
        match self {
            GameEvent::ProjectileSpawned { projectile, .. } => projectile.id,
            GameEvent::WallHit { projectile_id, .. } => *projectile_id,
            GameEvent::BlockDestroyed { projectile_id, .. } => *projectile_id,
        }
    }
}
