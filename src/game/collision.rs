//! Collision Detection and Resolution
//!
//! Block-vs-block overlap uses axis-aligned boxes with a fixed half-extent.
//! Projectile-vs-block uses a sphere against the block's box.
//!
//! Separation is push based: the moving block shoves every block it
//! overlaps along the axis of least overlap, and each shoved block then
//! becomes a mover itself. A block pinned against a wall therefore pushes
//! back on whoever shoved it. Work is kept on an explicit stack bounded by
//! `max_depth`; hitting the bound leaves residual overlap.

use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::core::room::Room;
use crate::core::vec3::{Axis, Vec3};
use crate::game::state::{BlockId, SimulationState};

/// Extra gap added to every push so separated boxes are not left touching.
const SEPARATION_EPSILON: f32 = 1e-3;

/// Overlap smaller than this is treated as touching.
const OVERLAP_TOLERANCE: f32 = 1e-5;

/// Collision configuration.
#[derive(Debug, Clone, Copy)]
pub struct CollisionConfig {
    /// Half the edge length of every block.
    pub half_extent: f32,
    /// Maximum push chain length before giving up.
    pub max_depth: usize,
}

impl Default for CollisionConfig {
    fn default() -> Self {
        Self {
            half_extent: 0.5,
            max_depth: 10,
        }
    }
}

/// Check if two equally sized boxes overlap.
#[inline]
pub fn boxes_overlap(a: Vec3, b: Vec3, half_extent: f32) -> bool {
    let size = 2.0 * half_extent - OVERLAP_TOLERANCE;
    (a.x - b.x).abs() < size && (a.y - b.y).abs() < size && (a.z - b.z).abs() < size
}

/// Minimal displacement that moves `other` out of `mover`.
///
/// Picks the axis with the smallest overlap; ties prefer X, then Y, then Z.
/// Coincident centers push toward the positive side.
pub fn push_vector(mover: Vec3, other: Vec3, half_extent: f32) -> Vec3 {
    let size = 2.0 * half_extent;
    let delta = other - mover;

    let mut best_axis = Axis::X;
    let mut best_overlap = f32::INFINITY;
    for axis in Axis::ALL {
        let overlap = size - delta.get(axis).abs();
        if overlap < best_overlap {
            best_axis = axis;
            best_overlap = overlap;
        }
    }

    let sign = if delta.get(best_axis) >= 0.0 { 1.0 } else { -1.0 };
    Vec3::along(best_axis, sign * (best_overlap.max(0.0) + SEPARATION_EPSILON))
}

/// Check if a sphere touches a box.
#[inline]
pub fn sphere_intersects_box(center: Vec3, radius: f32, box_center: Vec3, half_extent: f32) -> bool {
    let h = Vec3::new(half_extent, half_extent, half_extent);
    let closest = center.clamp(box_center - h, box_center + h);
    center.distance_squared(closest) <= radius * radius
}

/// Result of moving a block.
#[derive(Debug, Clone)]
pub struct Resolution {
    /// State after the move and all pushes.
    pub state: SimulationState,
    /// Every block whose position changed, with its new position.
    pub moved: BTreeMap<BlockId, Vec3>,
    /// False when the push chain hit the depth bound.
    pub converged: bool,
}

/// Stateless collision system bound to a room.
#[derive(Debug, Clone, Copy)]
pub struct CollisionSystem {
    room: Room,
    config: CollisionConfig,
}

impl CollisionSystem {
    /// Create a collision system.
    pub fn new(room: Room, config: CollisionConfig) -> Self {
        Self { room, config }
    }

    /// Clamp a block position into the room.
    pub fn clamp(&self, position: Vec3) -> Vec3 {
        self.room.clamp(position, self.config.half_extent)
    }

    /// Check if two block positions overlap.
    pub fn overlaps(&self, a: Vec3, b: Vec3) -> bool {
        boxes_overlap(a, b, self.config.half_extent)
    }

    /// Blocks (other than `exclude`) overlapping a position.
    pub fn overlapping(&self, state: &SimulationState, position: Vec3, exclude: BlockId) -> Vec<BlockId> {
        state
            .blocks()
            .values()
            .filter(|b| b.id != exclude && self.overlaps(position, b.position))
            .map(|b| b.id)
            .collect()
    }

    /// Move `mover` to `proposed` and push overlapping blocks out of the way.
    ///
    /// Unknown movers and non-finite positions return the input unchanged.
    pub fn resolve(&self, state: &SimulationState, mover: BlockId, proposed: Vec3) -> Resolution {
        let unchanged = || Resolution {
            state: state.clone(),
            moved: BTreeMap::new(),
            converged: true,
        };

        if state.block(mover).is_none() || !proposed.is_finite() {
            return unchanged();
        }

        let original: BTreeMap<BlockId, Vec3> = state
            .blocks()
            .iter()
            .map(|(id, b)| (*id, b.position))
            .collect();
        let mut positions = original.clone();
        positions.insert(mover, self.clamp(proposed));

        let converged = self.separate(&mut positions, mover);

        let moved: BTreeMap<BlockId, Vec3> = positions
            .into_iter()
            .filter(|(id, pos)| original.get(id) != Some(pos))
            .collect();

        if moved.is_empty() {
            return unchanged();
        }

        Resolution {
            state: state.with_block_positions(&moved),
            moved,
            converged,
        }
    }

    /// Push chain starting at `mover`. Returns false if the depth bound was hit.
    fn separate(&self, positions: &mut BTreeMap<BlockId, Vec3>, mover: BlockId) -> bool {
        let h = self.config.half_extent;
        let max_depth = self.config.max_depth;
        // Guards against fan-out in dense piles: each level may push several blocks.
        let budget = max_depth.max(1) * positions.len().max(1) * 4;

        let mut stack: Vec<(BlockId, usize)> = vec![(mover, 0)];
        let mut pushes = 0usize;
        let mut converged = true;

        while let Some((current, depth)) = stack.pop() {
            let Some(&current_pos) = positions.get(&current) else {
                continue;
            };

            let overlapping: Vec<BlockId> = positions
                .iter()
                .filter(|(id, pos)| **id != current && boxes_overlap(current_pos, **pos, h))
                .map(|(id, _)| *id)
                .collect();

            if overlapping.is_empty() {
                continue;
            }

            if depth >= max_depth || pushes >= budget {
                converged = false;
                continue;
            }

            for other in overlapping {
                let other_pos = positions[&other];
                // An earlier push in this loop may already have cleared it.
                if !boxes_overlap(current_pos, other_pos, h) {
                    continue;
                }

                let pushed = self.clamp(other_pos + push_vector(current_pos, other_pos, h));
                debug!(?current, ?other, from = %other_pos, to = %pushed, depth, "push");
                positions.insert(other, pushed);
                pushes += 1;
                stack.push((other, depth + 1));
            }
        }

        if !converged {
            warn!(
                ?mover,
                max_depth,
                pushes,
                "collision resolution hit its bound, leaving residual overlap"
            );
        }

        converged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::state::{BlockKind, Color, Ordinal, PlayerId, PlayerSlot};
    use proptest::prelude::*;

    fn pid(n: u8) -> PlayerId {
        PlayerId::from_bytes([n; 16])
    }

    fn system() -> CollisionSystem {
        CollisionSystem::new(Room::default(), CollisionConfig::default())
    }

    fn state_with(positions: &[Vec3]) -> (SimulationState, Vec<BlockId>) {
        let mut state = SimulationState::new(Room::default())
            .with_player(PlayerSlot::new(pid(1), Ordinal::First));
        let mut ids = Vec::new();
        for pos in positions {
            let (next, id) = state.with_block(pid(1), BlockKind::Regular, *pos, Color(0));
            state = next;
            ids.push(id);
        }
        (state, ids)
    }

    fn overlapping_pairs(sys: &CollisionSystem, state: &SimulationState) -> Vec<(BlockId, BlockId)> {
        let blocks: Vec<_> = state.blocks().values().collect();
        let mut pairs = Vec::new();
        for i in 0..blocks.len() {
            for j in (i + 1)..blocks.len() {
                if sys.overlaps(blocks[i].position, blocks[j].position) {
                    pairs.push((blocks[i].id, blocks[j].id));
                }
            }
        }
        pairs
    }

    #[test]
    fn test_boxes_overlap() {
        assert!(boxes_overlap(Vec3::ZERO, Vec3::new(0.9, 0.0, 0.0), 0.5));
        // Exactly touching is not overlapping
        assert!(!boxes_overlap(Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0), 0.5));
        assert!(!boxes_overlap(Vec3::ZERO, Vec3::new(0.5, 0.0, 1.5), 0.5));
    }

    #[test]
    fn test_push_vector_least_overlap_axis() {
        // Overlap x = 0.2, y = 1.0, z = 0.6 → push along +X
        let push = push_vector(Vec3::ZERO, Vec3::new(0.8, 0.0, 0.4), 0.5);
        assert!(push.x > 0.19 && push.y == 0.0 && push.z == 0.0);

        // Other side → negative direction
        let push = push_vector(Vec3::ZERO, Vec3::new(0.0, 0.0, -0.7), 0.5);
        assert!(push.z < -0.29 && push.x == 0.0);
    }

    #[test]
    fn test_push_vector_tie_prefers_x_then_y() {
        let push = push_vector(Vec3::ZERO, Vec3::new(0.5, 0.5, 0.5), 0.5);
        assert!(push.x > 0.0 && push.y == 0.0 && push.z == 0.0);

        let push = push_vector(Vec3::ZERO, Vec3::new(0.0, 0.5, 0.5), 0.5);
        assert!(push.y > 0.0 && push.x == 0.0 && push.z == 0.0);

        // Coincident centers: X, positive side
        let push = push_vector(Vec3::ZERO, Vec3::ZERO, 0.5);
        assert!(push.x > 0.99);
    }

    #[test]
    fn test_sphere_intersects_box() {
        let center = Vec3::new(0.0, 0.0, 0.0);
        assert!(sphere_intersects_box(Vec3::new(0.0, 0.0, 0.65), 0.2, center, 0.5));
        assert!(!sphere_intersects_box(Vec3::new(0.0, 0.0, 0.75), 0.2, center, 0.5));
        // Corner distance
        assert!(!sphere_intersects_box(Vec3::new(0.65, 0.65, 0.65), 0.2, center, 0.5));
    }

    #[test]
    fn test_move_without_contact() {
        let sys = system();
        let (state, ids) = state_with(&[Vec3::new(0.0, 0.0, 0.0), Vec3::new(5.0, 0.0, 0.0)]);

        let res = sys.resolve(&state, ids[0], Vec3::new(-2.0, 0.0, 0.0));

        assert!(res.converged);
        assert_eq!(res.moved.len(), 1);
        assert_eq!(res.state.block(ids[0]).unwrap().position, Vec3::new(-2.0, 0.0, 0.0));
        assert_eq!(res.state.block(ids[1]).unwrap().position, Vec3::new(5.0, 0.0, 0.0));
    }

    #[test]
    fn test_push_single_block() {
        let sys = system();
        let (state, ids) = state_with(&[Vec3::new(0.0, 0.0, 0.0), Vec3::new(2.0, 0.0, 0.0)]);

        let res = sys.resolve(&state, ids[0], Vec3::new(1.5, 0.0, 0.0));

        assert!(res.converged);
        let pushed = res.state.block(ids[1]).unwrap().position;
        assert!(pushed.x >= 2.5);
        assert!(overlapping_pairs(&sys, &res.state).is_empty());
        // Original state untouched
        assert_eq!(state.block(ids[0]).unwrap().position, Vec3::ZERO);
    }

    #[test]
    fn test_push_chain() {
        let sys = system();
        let (state, ids) = state_with(&[
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(2.0, 0.0, 0.0),
            Vec3::new(3.0, 0.0, 0.0),
        ]);

        let res = sys.resolve(&state, ids[0], Vec3::new(0.6, 0.0, 0.0));

        assert!(res.converged);
        assert!(overlapping_pairs(&sys, &res.state).is_empty());
        assert_eq!(res.moved.len(), 4);
    }

    #[test]
    fn test_pinned_block_pushes_mover_back() {
        let sys = system();
        // Block B pressed against the +X wall (max.x 10, half-extent 0.5)
        let (state, ids) = state_with(&[Vec3::new(7.0, 0.0, 0.0), Vec3::new(9.5, 0.0, 0.0)]);

        let res = sys.resolve(&state, ids[0], Vec3::new(9.2, 0.0, 0.0));

        assert!(res.converged);
        assert_eq!(res.state.block(ids[1]).unwrap().position.x, 9.5);
        let mover = res.state.block(ids[0]).unwrap().position;
        assert!(mover.x <= 8.5);
        assert!(overlapping_pairs(&sys, &res.state).is_empty());
    }

    #[test]
    fn test_proposed_position_is_clamped() {
        let sys = system();
        let (state, ids) = state_with(&[Vec3::ZERO]);

        let res = sys.resolve(&state, ids[0], Vec3::new(0.0, 0.0, 100.0));
        assert_eq!(res.state.block(ids[0]).unwrap().position.z, 24.5);
    }

    #[test]
    fn test_unknown_mover_or_bad_position_is_noop() {
        let sys = system();
        let (state, ids) = state_with(&[Vec3::ZERO]);

        let res = sys.resolve(&state, BlockId(999), Vec3::new(1.0, 0.0, 0.0));
        assert!(res.moved.is_empty());
        assert!(res.state.shares_storage_with(&state));

        let res = sys.resolve(&state, ids[0], Vec3::new(f32::NAN, 0.0, 0.0));
        assert!(res.state.shares_storage_with(&state));
    }

    #[test]
    fn test_depth_bound_leaves_residual_overlap() {
        let sys = CollisionSystem::new(
            Room::default(),
            CollisionConfig { half_extent: 0.5, max_depth: 1 },
        );
        let (state, ids) = state_with(&[
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(2.0, 0.0, 0.0),
        ]);

        let res = sys.resolve(&state, ids[0], Vec3::new(0.6, 0.0, 0.0));

        assert!(!res.converged);
        assert!(!overlapping_pairs(&sys, &res.state).is_empty());
    }

    fn arb_position() -> impl Strategy<Value = Vec3> {
        (-9.5f32..9.5, -1.5f32..9.5, -24.5f32..24.5).prop_map(|(x, y, z)| Vec3::new(x, y, z))
    }

    proptest! {
        #[test]
        fn prop_resolution_terminates_inside_room(
            positions in prop::collection::vec(arb_position(), 1..10),
            mover in 0usize..10,
            proposed in arb_position(),
        ) {
            let sys = system();
            let (state, ids) = state_with(&positions);
            prop_assume!(overlapping_pairs(&sys, &state).is_empty());
            let mover = ids[mover % ids.len()];

            let res = sys.resolve(&state, mover, proposed);

            for block in res.state.blocks().values() {
                prop_assert!(Room::default().contains(block.position));
            }
            prop_assert_eq!(res.state.blocks().len(), positions.len());

            // Without hitting the bound every pair ends apart
            let residual = overlapping_pairs(&sys, &res.state);
            prop_assert!(!res.converged || residual.is_empty(), "{:?}", residual);
            for (a, b) in residual {
                prop_assert!(res.moved.contains_key(&a) || res.moved.contains_key(&b));
            }
        }

        #[test]
        fn prop_two_blocks_always_separate(
            a in arb_position(),
            b in arb_position(),
            proposed in arb_position(),
        ) {
            let sys = system();
            prop_assume!(!sys.overlaps(a, b));
            let (state, ids) = state_with(&[a, b]);

            let res = sys.resolve(&state, ids[0], proposed);

            let pa = res.state.block(ids[0]).unwrap().position;
            let pb = res.state.block(ids[1]).unwrap().position;
            let room = Room::default();
            let pinned = room.walls_touching(pa, 0.5) >= 2 && room.walls_touching(pb, 0.5) >= 2;
            prop_assert!(pinned || !sys.overlaps(pa, pb), "{:?} {:?}", pa, pb);
        }
    }
}
