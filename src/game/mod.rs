//! Game Logic Module
//!
//! The simulation core and the duel application built on it.
//!
//! ## Module Structure
//!
//! - `state`: Immutable simulation state, entities, identifiers
//! - `collision`: Box overlap, push resolution, projectile hit tests
//! - `cannon`: Fire validation and cooldowns
//! - `projectile`: Per-tick projectile integration
//! - `spawn`: Starting layout per participant
//! - `events`: Events produced by the systems
//! - `messages`: Duel commands and outbound messages
//! - `app`: The duel, hosted by the session runtime

pub mod state;
pub mod collision;
pub mod cannon;
pub mod projectile;
pub mod spawn;
pub mod events;
pub mod messages;
pub mod app;

// Re-export key types
pub use state::{Block, BlockId, BlockKind, Ordinal, Phase, PlayerId, Projectile, ProjectileId, SimulationState};
pub use collision::{CollisionConfig, CollisionSystem};
pub use cannon::{CannonConfig, CannonSystem};
pub use projectile::{ProjectileConfig, ProjectileSystem};
pub use spawn::{SpawnConfig, SpawnSystem};
pub use events::GameEvent;
pub use messages::{GameCommand, GameMessage, Snapshot};
pub use app::{DuelGame, DuelPayload, GameConfig};
