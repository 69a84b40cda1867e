//! Projectile Lifecycle
//!
//! Per-tick integration of projectiles. A projectile dies when it leaves
//! the room along its travel axis or when it strikes an opposing block.

use std::collections::BTreeMap;

use tracing::debug;

use crate::core::vec3::Axis;
use crate::game::collision::sphere_intersects_box;
use crate::game::events::GameEvent;
use crate::game::state::{Block, BlockId, ProjectileId, Projectile, SimulationState};

/// Projectile configuration.
#[derive(Debug, Clone, Copy)]
pub struct ProjectileConfig {
    /// Collision sphere radius.
    pub radius: f32,
    /// Half-extent of the blocks it can hit.
    pub block_half_extent: f32,
    /// Axis whose bounds destroy the projectile.
    pub travel_axis: Axis,
    /// Cannons cannot be destroyed.
    pub indestructible_cannons: bool,
}

impl Default for ProjectileConfig {
    fn default() -> Self {
        Self {
            radius: 0.2,
            block_half_extent: 0.5,
            travel_axis: Axis::Z,
            indestructible_cannons: true,
        }
    }
}

/// Outcome of one integration step.
#[derive(Debug, Clone)]
pub struct StepResult {
    /// State after the step.
    pub state: SimulationState,
    /// Wall hits and destroyed blocks, in projectile ID order.
    pub events: Vec<GameEvent>,
}

/// Stateless projectile system.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProjectileSystem {
    config: ProjectileConfig,
}

impl ProjectileSystem {
    /// Create a projectile system.
    pub fn new(config: ProjectileConfig) -> Self {
        Self { config }
    }

    /// Access configuration.
    pub fn config(&self) -> &ProjectileConfig {
        &self.config
    }

    fn can_hit(&self, projectile: &Projectile, block: &Block) -> bool {
        block.owner != projectile.owner && !(self.config.indestructible_cannons && block.is_cannon())
    }

    /// Advance every projectile by `dt` seconds.
    pub fn step(&self, state: &SimulationState, dt: f32) -> StepResult {
        if state.projectiles().is_empty() {
            return StepResult { state: state.clone(), events: Vec::new() };
        }

        let room = *state.room();
        // Blocks still standing; a block hit earlier in this step is gone
        // for later projectiles.
        let mut standing: BTreeMap<BlockId, &Block> = state.blocks().iter().map(|(id, b)| (*id, b)).collect();
        let mut survivors: BTreeMap<ProjectileId, Projectile> = BTreeMap::new();
        let mut destroyed: Vec<BlockId> = Vec::new();
        let mut events = Vec::new();

        for projectile in state.projectiles().values() {
            let mut moved = projectile.clone();
            moved.position += projectile.velocity * dt;

            if let Some(wall) = room.crossed_wall(moved.position, self.config.travel_axis) {
                debug!(projectile_id = ?moved.id, ?wall, "projectile hit wall");
                events.push(GameEvent::WallHit {
                    projectile_id: moved.id,
                    position: moved.position,
                    wall,
                });
                continue;
            }

            let hit = standing
                .values()
                .find(|block| {
                    self.can_hit(&moved, block)
                        && sphere_intersects_box(moved.position, self.config.radius, block.position, self.config.block_half_extent)
                })
                .map(|block| (*block).clone());

            match hit {
                Some(block) => {
                    debug!(projectile_id = ?moved.id, block_id = ?block.id, "block destroyed");
                    standing.remove(&block.id);
                    destroyed.push(block.id);
                    events.push(GameEvent::BlockDestroyed {
                        block_id: block.id,
                        position: block.position,
                        color: block.color,
                        owner: block.owner,
                        projectile_id: moved.id,
                    });
                }
                None => {
                    survivors.insert(moved.id, moved);
                }
            }
        }

        StepResult {
            state: state.with_projectile_step(survivors, &destroyed),
            events,
        }
    }
}
