//! # Lightblocks Match Server
//!
//! Authoritative coordinator for a real-time two-player falling-blocks match.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   LIGHTBLOCKS MATCH                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  game/           - Simulation side of the boundary           │
//! │  ├── command.rs  - Player command vocabulary                 │
//! │  ├── queue.rs    - Per-slot FIFO command buffer              │
//! │  ├── model.rs    - Board simulation and stand-in traits      │
//! │  └── events.rs   - Simulation observer contract              │
//! │                                                              │
//! │  network/        - Session and transport                     │
//! │  ├── protocol.rs - Wire lines, snapshots, control messages   │
//! │  ├── bridge.rs   - Observer that emits protocol lines        │
//! │  ├── snapshot.rs - Full-state resync                         │
//! │  ├── session.rs  - Slots, queues and the match lifecycle     │
//! │  └── server.rs   - WebSocket server and tick driver          │
//! │                                                              │
//! │  config.rs       - Environment configuration                 │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Threading Model
//!
//! Connection tasks only ever touch the slot table and the command queues
//! through a cloneable [`MatchHandle`]. The [`Match`] itself, including the
//! simulation pair, is owned by the tick driver. Protocol lines leave through
//! non-blocking [`PlayerHandle::send`] calls.
//!
//! The board simulation and the stand-in strategy are supplied by the
//! embedding application through [`ModelFactory`].

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod config;
pub mod game;
pub mod network;

#[cfg(test)]
mod testing;

// Re-export commonly used types
pub use config::{ConfigError, ServerConfig};
pub use game::command::{Command, DropSpeed};
pub use game::model::{GameParameters, ModeType, ModelFactory, RuleVariant, Side};
pub use network::session::{Match, MatchHandle, PlayerHandle, SessionError, GAME_OVER_WAIT_SECS};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default tick rate (Hz)
pub const TICK_RATE: u32 = 60;
