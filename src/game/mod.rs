//! Game Module
//!
//! Everything on the simulation side of the match boundary.
//!
//! ## Module Structure
//!
//! - `command`: Player command vocabulary
//! - `queue`: Per-slot FIFO command buffer
//! - `model`: Traits for the external board simulation and stand-in
//! - `events`: Simulation observer contract

pub mod command;
pub mod queue;
pub mod model;
pub mod events;

// Re-export key types
pub use command::{Command, DropSpeed};
pub use queue::CommandQueue;
pub use model::{
    apply_command, Block, GameModel, GameParameters, GameScore, ModeType, ModelFactory, Piece,
    RuleVariant, Side, SimulationPair, StandIn,
};
pub use events::{Motivation, SimulationObserver};
