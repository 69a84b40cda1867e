//! Game State Definitions
//!
//! All state types for the duel simulation.
//! Uses BTreeMap for deterministic iteration order.
//!
//! [`SimulationState`] is immutable: every operation takes `&self` and
//! returns a new aggregate. Maps are held behind `Arc` and copied on write,
//! so untouched maps are shared between generations and a previous state
//! is never observably modified.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use serde::{Serialize, Deserialize};

use crate::core::room::Room;
use crate::core::vec3::Vec3;

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Unique participant identifier.
///
/// Freshly generated on every admission, never reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub uuid::Uuid);

impl PlayerId {
    /// Generate a random identifier.
    pub fn random() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(uuid::Uuid::from_bytes(bytes))
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Slot number of one of the two participants.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Ordinal {
    /// Slot 1. Sits on the +Z side and fires toward -Z.
    First,
    /// Slot 2. Sits on the -Z side and fires toward +Z.
    Second,
}

impl Ordinal {
    /// Both ordinals, lowest first.
    pub const ALL: [Ordinal; 2] = [Ordinal::First, Ordinal::Second];

    /// Numeric slot (1 or 2).
    pub fn number(self) -> u8 {
        match self {
            Ordinal::First => 1,
            Ordinal::Second => 2,
        }
    }

    /// The other slot.
    pub fn opponent(self) -> Self {
        match self {
            Ordinal::First => Ordinal::Second,
            Ordinal::Second => Ordinal::First,
        }
    }

    /// Sign of this slot's fire direction along the travel axis.
    pub fn fire_sign(self) -> f32 {
        match self {
            Ordinal::First => -1.0,
            Ordinal::Second => 1.0,
        }
    }

    /// Team color for this slot.
    pub fn color(self) -> Color {
        match self {
            Ordinal::First => Color(0x3B82F6),
            Ordinal::Second => Color(0xEF4444),
        }
    }
}

impl From<Ordinal> for u8 {
    fn from(ordinal: Ordinal) -> u8 {
        ordinal.number()
    }
}

impl TryFrom<u8> for Ordinal {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Ordinal::First),
            2 => Ok(Ordinal::Second),
            other => Err(format!("invalid ordinal {other}")),
        }
    }
}

impl fmt::Display for Ordinal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

/// Block identifier (monotonic counter per simulation instance).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockId(pub u32);

/// Projectile identifier (monotonic counter per simulation instance).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectileId(pub u32);

/// RGB color packed as 0xRRGGBB.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Color(pub u32);

// =============================================================================
// PHASE
// =============================================================================

/// Session lifecycle phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Waiting for both participants to ready up.
    #[default]
    Waiting,
    /// Round in progress.
    Playing,
    /// Round over, waiting for replay votes.
    Finished,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Waiting => "waiting",
            Phase::Playing => "playing",
            Phase::Finished => "finished",
        };
        f.write_str(name)
    }
}

// =============================================================================
// ENTITIES
// =============================================================================

/// Kind of block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    /// Fires projectiles.
    Cannon,
    /// Plain target block.
    Regular,
}

/// A positioned, owned block.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// Unique block ID
    pub id: BlockId,
    /// Center position
    pub position: Vec3,
    /// Display color
    pub color: Color,
    /// Owning participant (immutable for the block's lifetime)
    pub owner: PlayerId,
    /// Cannon or regular
    pub kind: BlockKind,
}

impl Block {
    /// Check if this block is a cannon.
    #[inline]
    pub fn is_cannon(&self) -> bool {
        self.kind == BlockKind::Cannon
    }
}

/// A projectile in flight.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Projectile {
    /// Unique projectile ID
    pub id: ProjectileId,
    /// Current position
    pub position: Vec3,
    /// Velocity in units per second
    pub velocity: Vec3,
    /// Participant whose cannon fired it
    pub owner: PlayerId,
    /// Display color
    pub color: Color,
}

/// A participant registered with the simulation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerSlot {
    /// Participant ID
    pub id: PlayerId,
    /// Slot number
    pub ordinal: Ordinal,
    /// Team color
    pub color: Color,
}

impl PlayerSlot {
    /// Create a slot using the ordinal's team color.
    pub fn new(id: PlayerId, ordinal: Ordinal) -> Self {
        Self { id, ordinal, color: ordinal.color() }
    }
}

/// How a round ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RoundOutcome {
    /// One participant still owns regular blocks, the other does not.
    Winner(PlayerId),
    /// Both participants lost their last regular block on the same tick.
    Draw,
}

// =============================================================================
// SIMULATION STATE
// =============================================================================

/// Immutable simulation aggregate.
#[derive(Clone, Debug, PartialEq)]
pub struct SimulationState {
    room: Room,
    phase: Phase,
    /// Simulated seconds since the round was created.
    clock: f64,
    players: Arc<BTreeMap<PlayerId, PlayerSlot>>,
    blocks: Arc<BTreeMap<BlockId, Block>>,
    projectiles: Arc<BTreeMap<ProjectileId, Projectile>>,
    /// Cannon → simulated time at which it may fire again.
    cooldowns: Arc<BTreeMap<BlockId, f64>>,
    /// Participant → block currently held.
    grabs: Arc<BTreeMap<PlayerId, BlockId>>,
    next_block_id: u32,
    next_projectile_id: u32,
}

impl SimulationState {
    /// Create an empty state in the `waiting` phase.
    pub fn new(room: Room) -> Self {
        Self {
            room,
            phase: Phase::Waiting,
            clock: 0.0,
            players: Arc::default(),
            blocks: Arc::default(),
            projectiles: Arc::default(),
            cooldowns: Arc::default(),
            grabs: Arc::default(),
            next_block_id: 1,
            next_projectile_id: 1,
        }
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    /// Room bounds.
    pub fn room(&self) -> &Room {
        &self.room
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Simulated seconds elapsed.
    pub fn clock(&self) -> f64 {
        self.clock
    }

    /// Registered participants.
    pub fn players(&self) -> &BTreeMap<PlayerId, PlayerSlot> {
        &self.players
    }

    /// Look up a participant.
    pub fn player(&self, id: &PlayerId) -> Option<&PlayerSlot> {
        self.players.get(id)
    }

    /// All blocks.
    pub fn blocks(&self) -> &BTreeMap<BlockId, Block> {
        &self.blocks
    }

    /// Look up a block.
    pub fn block(&self, id: BlockId) -> Option<&Block> {
        self.blocks.get(&id)
    }

    /// All projectiles.
    pub fn projectiles(&self) -> &BTreeMap<ProjectileId, Projectile> {
        &self.projectiles
    }

    /// Look up a projectile.
    pub fn projectile(&self, id: ProjectileId) -> Option<&Projectile> {
        self.projectiles.get(&id)
    }

    /// Cooldown table.
    pub fn cooldowns(&self) -> &BTreeMap<BlockId, f64> {
        &self.cooldowns
    }

    /// When the cannon may fire again. `None` means ready.
    pub fn ready_at(&self, cannon: BlockId) -> Option<f64> {
        self.cooldowns.get(&cannon).copied()
    }

    /// Block currently held by a participant.
    pub fn grabbed_by(&self, player: &PlayerId) -> Option<BlockId> {
        self.grabs.get(player).copied()
    }

    /// Grab table.
    pub fn grabs(&self) -> &BTreeMap<PlayerId, BlockId> {
        &self.grabs
    }

    /// ID the next projectile will receive.
    pub fn next_projectile_id(&self) -> ProjectileId {
        ProjectileId(self.next_projectile_id)
    }

    /// Blocks owned by a participant.
    pub fn blocks_of<'a>(&'a self, owner: &'a PlayerId) -> impl Iterator<Item = &'a Block> + 'a {
        self.blocks.values().filter(move |b| b.owner == *owner)
    }

    /// Number of regular (non-cannon) blocks owned by a participant.
    pub fn regular_block_count(&self, owner: &PlayerId) -> usize {
        self.blocks_of(owner).filter(|b| !b.is_cannon()).count()
    }

    /// Cannons in ID order.
    pub fn cannons(&self) -> impl Iterator<Item = &Block> {
        self.blocks.values().filter(|b| b.is_cannon())
    }

    /// True if `other` holds the very same map allocations as `self`.
    ///
    /// A state returned unchanged from a rejected operation shares all of
    /// its storage with the input.
    pub fn shares_storage_with(&self, other: &SimulationState) -> bool {
        Arc::ptr_eq(&self.players, &other.players)
            && Arc::ptr_eq(&self.blocks, &other.blocks)
            && Arc::ptr_eq(&self.projectiles, &other.projectiles)
            && Arc::ptr_eq(&self.cooldowns, &other.cooldowns)
            && Arc::ptr_eq(&self.grabs, &other.grabs)
    }

    // -------------------------------------------------------------------------
    // Win detection
    // -------------------------------------------------------------------------

    /// Evaluate the round. Only meaningful with exactly two participants.
    pub fn round_outcome(&self) -> Option<RoundOutcome> {
        if self.players.len() != 2 {
            return None;
        }

        let mut slots: Vec<&PlayerSlot> = self.players.values().collect();
        slots.sort_by_key(|s| s.ordinal);
        let empty: Vec<bool> = slots
            .iter()
            .map(|s| self.regular_block_count(&s.id) == 0)
            .collect();

        match (empty[0], empty[1]) {
            (true, true) => Some(RoundOutcome::Draw),
            (true, false) => Some(RoundOutcome::Winner(slots[1].id)),
            (false, true) => Some(RoundOutcome::Winner(slots[0].id)),
            (false, false) => None,
        }
    }

    /// The winner, if one participant has no regular blocks left.
    pub fn check_winner(&self) -> Option<PlayerId> {
        match self.round_outcome() {
            Some(RoundOutcome::Winner(id)) => Some(id),
            _ => None,
        }
    }

    // -------------------------------------------------------------------------
    // Transitions (each returns a new state)
    // -------------------------------------------------------------------------

    fn derive(&self, f: impl FnOnce(&mut Self)) -> Self {
        let mut next = self.clone();
        f(&mut next);
        next
    }

    /// Set the phase.
    pub fn with_phase(&self, phase: Phase) -> Self {
        self.derive(|s| s.phase = phase)
    }

    /// Advance the simulation clock.
    pub fn advance_clock(&self, dt: f64) -> Self {
        self.derive(|s| s.clock += dt.max(0.0))
    }

    /// Register a participant.
    pub fn with_player(&self, slot: PlayerSlot) -> Self {
        self.derive(|s| {
            Arc::make_mut(&mut s.players).insert(slot.id, slot);
        })
    }

    /// Remove a participant together with everything it owns.
    pub fn without_player(&self, id: &PlayerId) -> Self {
        self.derive(|s| {
            Arc::make_mut(&mut s.players).remove(id);

            let owned: Vec<BlockId> = s.blocks_of(id).map(|b| b.id).collect();
            if !owned.is_empty() {
                let blocks = Arc::make_mut(&mut s.blocks);
                let cooldowns = Arc::make_mut(&mut s.cooldowns);
                for block_id in &owned {
                    blocks.remove(block_id);
                    cooldowns.remove(block_id);
                }
                Arc::make_mut(&mut s.grabs).retain(|_, held| !owned.contains(held));
            }

            if s.projectiles.values().any(|p| p.owner == *id) {
                Arc::make_mut(&mut s.projectiles).retain(|_, p| p.owner != *id);
            }
            if s.grabs.contains_key(id) {
                Arc::make_mut(&mut s.grabs).remove(id);
            }
        })
    }

    /// Add a block, returning the new state and the block's ID.
    pub fn with_block(&self, owner: PlayerId, kind: BlockKind, position: Vec3, color: Color) -> (Self, BlockId) {
        let id = BlockId(self.next_block_id);
        let next = self.derive(|s| {
            s.next_block_id += 1;
            Arc::make_mut(&mut s.blocks).insert(id, Block { id, position, color, owner, kind });
        });
        (next, id)
    }

    /// Move several blocks at once. Unknown IDs are ignored.
    pub fn with_block_positions(&self, positions: &BTreeMap<BlockId, Vec3>) -> Self {
        if positions.is_empty() {
            return self.clone();
        }
        self.derive(|s| {
            let blocks = Arc::make_mut(&mut s.blocks);
            for (id, position) in positions {
                if let Some(block) = blocks.get_mut(id) {
                    block.position = *position;
                }
            }
        })
    }

    /// Remove a block (and any cooldown or grab pointing at it).
    pub fn without_block(&self, id: BlockId) -> Self {
        self.derive(|s| {
            Arc::make_mut(&mut s.blocks).remove(&id);
            if s.cooldowns.contains_key(&id) {
                Arc::make_mut(&mut s.cooldowns).remove(&id);
            }
            if s.grabs.values().any(|held| *held == id) {
                Arc::make_mut(&mut s.grabs).retain(|_, held| *held != id);
            }
        })
    }

    /// Spawn a projectile, returning the new state and the projectile.
    pub fn with_projectile(&self, owner: PlayerId, position: Vec3, velocity: Vec3, color: Color) -> (Self, Projectile) {
        let projectile = Projectile {
            id: ProjectileId(self.next_projectile_id),
            position,
            velocity,
            owner,
            color,
        };
        let next = self.derive(|s| {
            s.next_projectile_id += 1;
            Arc::make_mut(&mut s.projectiles).insert(projectile.id, projectile.clone());
        });
        (next, projectile)
    }

    /// Replace the projectile table and drop the listed blocks in one step.
    pub fn with_projectile_step(
        &self,
        projectiles: BTreeMap<ProjectileId, Projectile>,
        destroyed_blocks: &[BlockId],
    ) -> Self {
        self.derive(|s| {
            s.projectiles = Arc::new(projectiles);
            if !destroyed_blocks.is_empty() {
                let blocks = Arc::make_mut(&mut s.blocks);
                for id in destroyed_blocks {
                    blocks.remove(id);
                }
                if destroyed_blocks.iter().any(|id| s.cooldowns.contains_key(id)) {
                    Arc::make_mut(&mut s.cooldowns).retain(|id, _| !destroyed_blocks.contains(id));
                }
                if s.grabs.values().any(|held| destroyed_blocks.contains(held)) {
                    Arc::make_mut(&mut s.grabs).retain(|_, held| !destroyed_blocks.contains(held));
                }
            }
        })
    }

    /// Record when a cannon may fire next.
    pub fn with_cooldown(&self, cannon: BlockId, ready_at: f64) -> Self {
        self.derive(|s| {
            Arc::make_mut(&mut s.cooldowns).insert(cannon, ready_at);
        })
    }

    /// Record that a participant holds a block.
    pub fn with_grab(&self, player: PlayerId, block: BlockId) -> Self {
        self.derive(|s| {
            Arc::make_mut(&mut s.grabs).insert(player, block);
        })
    }

    /// Clear a participant's grab.
    pub fn without_grab(&self, player: &PlayerId) -> Self {
        if !self.grabs.contains_key(player) {
            return self.clone();
        }
        self.derive(|s| {
            Arc::make_mut(&mut s.grabs).remove(player);
        })
    }
}
