//! Starting Layout
//!
//! Places a participant's cannon and regular blocks on its half of the
//! room. Slot 1 owns the +Z half, slot 2 the -Z half. Candidate positions
//! come from the round's deterministic RNG and are rejected if they crowd
//! an existing block.

use tracing::{debug, warn};

use crate::core::rng::DeterministicRng;
use crate::core::room::Room;
use crate::core::vec3::Vec3;
use crate::game::state::{BlockId, BlockKind, Ordinal, PlayerSlot, SimulationState};

/// Spawn configuration.
#[derive(Debug, Clone, Copy)]
pub struct SpawnConfig {
    /// Regular blocks per participant.
    pub regular_blocks: usize,
    /// Minimum center distance between spawned blocks.
    pub min_separation: f32,
    /// Candidates tried per block before falling back.
    pub max_attempts: usize,
    /// Distance of the cannon from its own back wall.
    pub cannon_wall_distance: f32,
    /// Empty strip on each side of the room's midline.
    pub midline_margin: f32,
    /// Block half-extent.
    pub half_extent: f32,
}

impl Default for SpawnConfig {
    fn default() -> Self {
        Self {
            regular_blocks: 5,
            min_separation: 1.2,
            max_attempts: 50,
            cannon_wall_distance: 5.0,
            midline_margin: 5.0,
            half_extent: 0.5,
        }
    }
}

/// Where a slot's blocks go.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpawnZone {
    /// Cannon position.
    pub cannon: Vec3,
    /// Lower corner of the regular block area.
    pub min: Vec3,
    /// Upper corner of the regular block area.
    pub max: Vec3,
}

impl SpawnZone {
    /// Zone for a slot inside `room`.
    pub fn for_ordinal(room: &Room, ordinal: Ordinal, config: &SpawnConfig) -> Self {
        let h = config.half_extent;
        let center = room.center();
        let floor = room.min.y + h;

        // Work on the +Z half, then mirror for slot 2.
        let back = room.max.z - config.cannon_wall_distance;
        let near = (center.z + config.midline_margin).min(back);
        let far = (back - config.min_separation).max(near);

        let (cannon_z, lo_z, hi_z) = match ordinal {
            Ordinal::First => (back, near, far),
            Ordinal::Second => {
                let mirror = |z: f32| 2.0 * center.z - z;
                (mirror(back), mirror(far), mirror(near))
            }
        };

        Self {
            cannon: room.clamp(Vec3::new(center.x, floor, cannon_z), h),
            min: Vec3::new(room.min.x + h, floor, lo_z),
            max: Vec3::new(room.max.x - h, floor, hi_z),
        }
    }
}

/// Places starting blocks.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpawnSystem {
    config: SpawnConfig,
}

impl SpawnSystem {
    /// Create a spawn system.
    pub fn new(config: SpawnConfig) -> Self {
        Self { config }
    }

    /// Access configuration.
    pub fn config(&self) -> &SpawnConfig {
        &self.config
    }

    fn is_clear(&self, state: &SimulationState, candidate: Vec3) -> bool {
        let min_sq = self.config.min_separation * self.config.min_separation;
        state
            .blocks()
            .values()
            .all(|b| b.position.distance_squared(candidate) >= min_sq)
    }

    fn pick_position(&self, state: &SimulationState, zone: &SpawnZone, rng: &mut DeterministicRng) -> Vec3 {
        let mut candidate = rng.next_point(zone.min, zone.max);
        for attempt in 1..=self.config.max_attempts.max(1) {
            if self.is_clear(state, candidate) {
                return candidate;
            }
            if attempt < self.config.max_attempts {
                candidate = rng.next_point(zone.min, zone.max);
            }
        }
        warn!(
            attempts = self.config.max_attempts,
            at = %candidate,
            "no clear spawn position found, placing anyway"
        );
        candidate
    }

    /// Add a participant's cannon and regular blocks.
    pub fn spawn_for(
        &self,
        state: &SimulationState,
        slot: &PlayerSlot,
        rng: &mut DeterministicRng,
    ) -> (SimulationState, Vec<BlockId>) {
        let zone = SpawnZone::for_ordinal(state.room(), slot.ordinal, &self.config);

        let (mut next, cannon) = state.with_block(slot.id, BlockKind::Cannon, zone.cannon, slot.color);
        let mut spawned = vec![cannon];

        for _ in 0..self.config.regular_blocks {
            let position = self.pick_position(&next, &zone, rng);
            let (with_block, id) = next.with_block(slot.id, BlockKind::Regular, position, slot.color);
            next = with_block;
            spawned.push(id);
        }

        debug!(player = %slot.id, ordinal = %slot.ordinal, blocks = spawned.len(), "spawned starting blocks");

        (next, spawned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::state::PlayerId;

    fn pid(n: u8) -> PlayerId {
        PlayerId::from_bytes([n; 16])
    }

    fn spawn_both(seed: u64) -> SimulationState {
        let system = SpawnSystem::default();
        let mut rng = DeterministicRng::new(seed);
        let p1 = PlayerSlot::new(pid(1), Ordinal::First);
        let p2 = PlayerSlot::new(pid(2), Ordinal::Second);

        let state = SimulationState::new(Room::default()).with_player(p1).with_player(p2);
        let (state, _) = system.spawn_for(&state, &p1, &mut rng);
        let (state, _) = system.spawn_for(&state, &p2, &mut rng);
        state
    }

    #[test]
    fn test_spawn_counts() {
        let state = spawn_both(1);
        assert_eq!(state.blocks().len(), 12);
        assert_eq!(state.regular_block_count(&pid(1)), 5);
        assert_eq!(state.regular_block_count(&pid(2)), 5);
        assert_eq!(state.cannons().count(), 2);
    }

    #[test]
    fn test_spawn_sides() {
        let state = spawn_both(2);
        for block in state.blocks().values() {
            if block.owner == pid(1) {
                assert!(block.position.z > 0.0, "slot 1 block on wrong side: {}", block.position);
            } else {
                assert!(block.position.z < 0.0, "slot 2 block on wrong side: {}", block.position);
            }
            assert_eq!(block.position.y, -1.5);
        }
    }

    #[test]
    fn test_cannon_sits_near_own_wall() {
        let zone = SpawnZone::for_ordinal(&Room::default(), Ordinal::First, &SpawnConfig::default());
        assert_eq!(zone.cannon.z, 20.0);

        let zone = SpawnZone::for_ordinal(&Room::default(), Ordinal::Second, &SpawnConfig::default());
        assert_eq!(zone.cannon.z, -20.0);
        assert!(zone.min.z < zone.max.z);
    }

    #[test]
    fn test_spawn_respects_separation() {
        let state = spawn_both(3);
        let blocks: Vec<_> = state.blocks().values().collect();
        for (i, a) in blocks.iter().enumerate() {
            for b in &blocks[i + 1..] {
                assert!(a.position.distance_squared(b.position) >= 1.2 * 1.2);
            }
        }
    }

    #[test]
    fn test_spawn_is_deterministic() {
        assert_eq!(spawn_both(99), spawn_both(99));
    }

    #[test]
    fn test_spawn_falls_back_when_crowded() {
        // Zone collapses onto the cannon, so no candidate is ever clear.
        let room = Room::new(Vec3::new(-0.5, -0.5, -6.0), Vec3::new(0.5, 0.5, 6.0));
        let system = SpawnSystem::new(SpawnConfig {
            regular_blocks: 3,
            max_attempts: 4,
            cannon_wall_distance: 1.0,
            midline_margin: 10.0,
            ..SpawnConfig::default()
        });
        let zone = SpawnZone::for_ordinal(&room, Ordinal::First, system.config());
        assert_eq!(zone.min, zone.max);
        let slot = PlayerSlot::new(pid(1), Ordinal::First);
        let state = SimulationState::new(room).with_player(slot);

        let (state, spawned) = system.spawn_for(&state, &slot, &mut DeterministicRng::new(4));
        assert_eq!(spawned.len(), 4);
        assert_eq!(state.regular_block_count(&pid(1)), 3);
    }
}
