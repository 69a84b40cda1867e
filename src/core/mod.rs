//! Core primitives.
//!
//! Plain value types shared by the simulation and the network layer.

pub mod vec3;
pub mod room;
pub mod rng;

// Re-export core types
pub use vec3::{Axis, Vec3};
pub use room::{Room, Wall};
pub use rng::DeterministicRng;
