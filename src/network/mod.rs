//! Network Layer
//!
//! Session lifecycle runtime and its WebSocket transport.
//! The runtime is game-agnostic; the hosted game plugs in through `hooks`.

pub mod connection;
pub mod hooks;
pub mod protocol;
pub mod session;
pub mod tick_loop;
pub mod server;

pub use connection::{ChannelConnection, Connection, Outgoing};
pub use hooks::{Routed, SessionHooks, SessionOutcome, Target};
pub use protocol::{EndReason, Inbound, LifecycleMessage, ProtocolError, ServerMessage};
pub use session::{Participant, SessionError, SessionRuntime};
pub use server::{GameServer, GameServerError, ServerConfig};
