//! # Cannon Duel Server
//!
//! Authoritative back end for a two-participant cannon duel.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   CANNON DUEL SERVER                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/            - Value types                             │
//! │  ├── vec3.rs      - 3D vector and axes                      │
//! │  ├── room.rs      - Bounded volume and walls                │
//! │  └── rng.rs       - Deterministic Xorshift128+ PRNG         │
//! │                                                             │
//! │  game/            - Simulation core + duel application      │
//! │  ├── state.rs     - Immutable simulation state              │
//! │  ├── collision.rs - Box overlap and push resolution         │
//! │  ├── cannon.rs    - Firing and cooldowns                    │
//! │  ├── projectile.rs - Projectile integration and hits        │
//! │  ├── spawn.rs     - Starting layout                         │
//! │  ├── events.rs    - Events the systems emit                 │
//! │  ├── messages.rs  - Duel commands and messages              │
//! │  └── app.rs       - The duel, as session hooks              │
//! │                                                             │
//! │  network/         - Session lifecycle and transport         │
//! │  ├── session.rs   - Admission, phases, routing              │
//! │  ├── hooks.rs     - Application extension point             │
//! │  ├── connection.rs - Transport-agnostic connection          │
//! │  ├── protocol.rs  - Lifecycle message types                 │
//! │  ├── tick_loop.rs - Fixed-rate tick scheduler               │
//! │  └── server.rs    - WebSocket server                        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## State Model
//!
//! [`game::state::SimulationState`] never changes in place. Commands and
//! ticks produce a new state from the current one, so any state handed out
//! earlier stays valid and unmodified.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod game;
pub mod network;

// Re-export commonly used types
pub use crate::core::rng::DeterministicRng;
pub use crate::core::room::{Room, Wall};
pub use crate::core::vec3::{Axis, Vec3};
pub use crate::game::app::{DuelGame, GameConfig};
pub use crate::game::state::{Phase, PlayerId, SimulationState};
pub use crate::network::server::{GameServer, ServerConfig};
pub use crate::network::session::SessionRuntime;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default simulation tick rate (Hz)
pub const TICK_RATE: u32 = 60;
