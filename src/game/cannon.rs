//! Cannon Firing
//!
//! Validates fire requests and spawns projectiles. Rejections never raise:
//! they hand back the input state untouched and no projectile.

use tracing::debug;

use crate::core::vec3::{Axis, Vec3};
use crate::game::events::GameEvent;
use crate::game::state::{BlockId, PlayerId, Projectile, SimulationState};

/// Cannon configuration.
#[derive(Debug, Clone, Copy)]
pub struct CannonConfig {
    /// Seconds between shots of the same cannon.
    pub cooldown: f64,
    /// Spawn distance from the cannon center along the fire direction.
    pub fire_offset: f32,
    /// Projectile speed in units per second.
    pub projectile_speed: f32,
    /// Axis projectiles travel along.
    pub travel_axis: Axis,
}

impl Default for CannonConfig {
    fn default() -> Self {
        Self {
            cooldown: 1.0,
            fire_offset: 0.8,
            projectile_speed: 15.0,
            travel_axis: Axis::Z,
        }
    }
}

/// Result of a fire attempt.
#[derive(Debug, Clone)]
pub struct FireResult {
    /// State after the attempt (the input state on rejection).
    pub state: SimulationState,
    /// The spawned projectile, if the cannon fired.
    pub projectile: Option<Projectile>,
}

impl FireResult {
    fn rejected(state: &SimulationState) -> Self {
        Self { state: state.clone(), projectile: None }
    }

    /// Event describing the shot, if any.
    pub fn event(&self, cannon_id: BlockId) -> Option<GameEvent> {
        self.projectile.clone().map(|projectile| GameEvent::ProjectileSpawned { projectile, cannon_id })
    }
}

/// Stateless cannon system.
#[derive(Debug, Clone, Copy, Default)]
pub struct CannonSystem {
    config: CannonConfig,
}

impl CannonSystem {
    /// Create a cannon system.
    pub fn new(config: CannonConfig) -> Self {
        Self { config }
    }

    /// Check if a cannon's cooldown has elapsed at `now`.
    pub fn is_ready(state: &SimulationState, cannon: BlockId, now: f64) -> bool {
        state.ready_at(cannon).map_or(true, |ready_at| now >= ready_at)
    }

    /// Fire on behalf of a participant.
    ///
    /// Requires that `shooter` owns `cannon_id`, that the block is a cannon,
    /// and that its cooldown has elapsed.
    pub fn fire(&self, state: &SimulationState, shooter: &PlayerId, cannon_id: BlockId, now: f64) -> FireResult {
        match state.block(cannon_id) {
            Some(block) if block.owner == *shooter => self.auto_fire(state, cannon_id, now),
            Some(_) => {
                debug!(?cannon_id, %shooter, "fire rejected: not owner");
                FireResult::rejected(state)
            }
            None => FireResult::rejected(state),
        }
    }

    /// Fire without participant validation, for trusted server-side callers.
    ///
    /// Direction still comes from the cannon's recorded owner.
    pub fn auto_fire(&self, state: &SimulationState, cannon_id: BlockId, now: f64) -> FireResult {
        let Some(cannon) = state.block(cannon_id) else {
            return FireResult::rejected(state);
        };
        if !cannon.is_cannon() {
            debug!(?cannon_id, "fire rejected: not a cannon");
            return FireResult::rejected(state);
        }
        if !Self::is_ready(state, cannon_id, now) {
            debug!(?cannon_id, now, "fire rejected: cooling down");
            return FireResult::rejected(state);
        }
        let Some(owner) = state.player(&cannon.owner) else {
            debug!(?cannon_id, "fire rejected: owner not registered");
            return FireResult::rejected(state);
        };

        let direction = Vec3::along(self.config.travel_axis, owner.ordinal.fire_sign());
        let position = cannon.position + direction * self.config.fire_offset;
        let velocity = direction * self.config.projectile_speed;

        let (next, projectile) = state.with_projectile(cannon.owner, position, velocity, cannon.color);
        let next = next.with_cooldown(cannon_id, now + self.config.cooldown);

        debug!(?cannon_id, projectile_id = ?projectile.id, at = %position, "cannon fired");

        FireResult { state: next, projectile: Some(projectile) }
    }

    /// Fire every ready cannon (auto-fire mode).
    pub fn fire_ready_cannons(&self, state: &SimulationState, now: f64) -> (SimulationState, Vec<GameEvent>) {
        let ready: Vec<BlockId> = state
            .cannons()
            .filter(|c| Self::is_ready(state, c.id, now))
            .map(|c| c.id)
            .collect();

        let mut current = state.clone();
        let mut events = Vec::new();
        for cannon_id in ready {
            let result = self.auto_fire(&current, cannon_id, now);
            if let Some(event) = result.event(cannon_id) {
                events.push(event);
            }
            current = result.state;
        }
        (current, events)
    }
}
