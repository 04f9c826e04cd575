//! Game Model Seam
//!
//! The board simulation, scoring rules and stand-in strategy live outside
//! this crate. The match drives them only through the traits below.
//!
//! ## Ownership
//!
//! - A [`ModelFactory`] builds one [`SimulationPair`] per live game and
//!   injects one [`SimulationObserver`] per side at creation.
//! - The pair is owned by the match and touched only from the tick driver.
//! - A [`StandIn`] is created per side with the pair and dropped with it.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::game::command::{Command, DropSpeed};
use crate::game::events::SimulationObserver;

// =============================================================================
// SIDES
// =============================================================================

/// One of the two positions in a match.
///
/// Slot `n` of the session always drives side `n` of the simulation pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    /// Player 1 / the pair's primary model.
    First,
    /// Player 2 / the pair's second model.
    Second,
}

impl Side {
    /// Both sides, in slot order.
    pub const BOTH: [Side; 2] = [Side::First, Side::Second];

    /// Array index of this side.
    #[inline]
    pub const fn index(self) -> usize {
        match self {
            Side::First => 0,
            Side::Second => 1,
        }
    }

    /// The opposing side.
    #[inline]
    pub const fn other(self) -> Side {
        match self {
            Side::First => Side::Second,
            Side::Second => Side::First,
        }
    }

    /// Side for an array index, if valid.
    pub const fn from_index(index: usize) -> Option<Side> {
        match index {
            0 => Some(Side::First),
            1 => Some(Side::Second),
            _ => None,
        }
    }
}

// =============================================================================
// PARAMETERS
// =============================================================================

/// Concrete rule set for one session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleVariant {
    /// Classic rotation, no hold, no ghost.
    Classic,
    /// Modern rotation system with hold piece.
    Modern,
}

/// Configured mode, which may defer the variant choice.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModeType {
    /// Always classic.
    Classic,
    /// Always modern.
    Modern,
    /// Pick classic or modern once per session.
    Mix,
}

impl ModeType {
    /// Resolve to a concrete variant. `Mix` flips a fair coin.
    pub fn resolve<R: Rng + ?Sized>(self, rng: &mut R) -> RuleVariant {
        match self {
            ModeType::Classic => RuleVariant::Classic,
            ModeType::Modern => RuleVariant::Modern,
            ModeType::Mix => {
                if rng.gen_bool(0.5) {
                    RuleVariant::Classic
                } else {
                    RuleVariant::Modern
                }
            }
        }
    }
}

/// Immutable game configuration fixed at match construction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameParameters {
    /// Level both boards start at.
    pub beginning_level: u32,
    /// Resolved rule variant.
    pub variant: RuleVariant,
}

impl GameParameters {
    /// Resolve configured values into session parameters.
    pub fn resolve<R: Rng + ?Sized>(beginning_level: u32, mode: ModeType, rng: &mut R) -> Self {
        Self {
            beginning_level,
            variant: mode.resolve(rng),
        }
    }
}

// =============================================================================
// OBSERVABLE VALUES
// =============================================================================

/// One block coordinate pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Block {
    /// Column.
    pub x: i32,
    /// Row.
    pub y: i32,
}

impl Block {
    /// Create a block coordinate.
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// A piece as seen from outside the model.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Piece {
    /// Piece type number.
    pub kind: u8,
    /// Block positions relative to the piece origin.
    pub relative_blocks: Vec<Block>,
    /// Block positions on the board.
    pub board_blocks: Vec<Block>,
}

/// Score counters of one board.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameScore {
    /// Points.
    pub score: u32,
    /// Lines cleared so far.
    pub cleared_lines: u32,
    /// Current level.
    pub level: u32,
    /// Pieces dropped so far.
    pub drawn_pieces: u32,
}

// =============================================================================
// TRAITS
// =============================================================================

/// One side's board simulation.
///
/// Input methods mirror the command vocabulary. Illegal moves are rejected
/// inside the model.
pub trait GameModel: Send {
    /// Begin auto-shifting left (`true`) or right (`false`).
    fn start_move_horizontal(&mut self, left: bool);
    /// Stop auto-shifting in one direction.
    fn end_move_horizontal(&mut self, left: bool);
    /// Rotate clockwise (`true`) or counterclockwise (`false`).
    fn rotate(&mut self, clockwise: bool);
    /// Swap active and hold piece.
    fn hold_active_piece(&mut self);
    /// Set drop speed.
    fn set_drop_speed(&mut self, speed: DropSpeed);

    /// Current score counters.
    fn score(&self) -> GameScore;
    /// Board contents in the model's own serialization.
    fn serialized_board(&self) -> String;
    /// Piece in the hold slot.
    fn hold_piece(&self) -> Option<Piece>;
    /// Falling piece.
    fn active_piece(&self) -> Option<Piece>;
    /// Preview piece.
    fn next_piece(&self) -> Option<Piece>;
}

/// Two coupled boards stepped in lock-step.
pub trait SimulationPair: Send {
    /// Read access to one side.
    fn model(&self, side: Side) -> &dyn GameModel;
    /// Write access to one side.
    fn model_mut(&mut self, side: Side) -> &mut dyn GameModel;
    /// Advance both sides by `delta` seconds.
    fn update(&mut self, delta: f32);
    /// Check if the game has concluded.
    fn is_game_over(&self) -> bool;
    /// Check if the pair runs the modern rotation system.
    fn is_modern_rotation(&self) -> bool;
}

/// Automated strategy for an unoccupied side.
pub trait StandIn: Send {
    /// Choose the commands for this tick. They are applied exactly like a
    /// human's queued commands.
    fn decide(&mut self, own: &dyn GameModel, opponent: &dyn GameModel, delta: f32) -> Vec<Command>;
}

/// Builds pairs and stand-ins for a match.
pub trait ModelFactory: Send + 'static {
    /// Create a fresh pair. `observers[n]` must be attached to side `n`.
    fn create_pair(
        &self,
        parameters: &GameParameters,
        observers: [Box<dyn SimulationObserver>; 2],
    ) -> Box<dyn SimulationPair>;

    /// Create the stand-in strategy for one side.
    fn create_stand_in(&self, side: Side) -> Box<dyn StandIn>;
}

/// Apply one command to a model.
///
/// Returns `false` for unrecognized commands, which leave the model untouched.
pub fn apply_command(model: &mut dyn GameModel, command: &Command) -> bool {
    match command {
        Command::StartMoveLeft => model.start_move_horizontal(true),
        Command::StartMoveRight => model.start_move_horizontal(false),
        Command::StopMoveHorizontal => {
            model.end_move_horizontal(true);
            model.end_move_horizontal(false);
        }
        Command::HoldActivePiece => model.hold_active_piece(),
        Command::RotateRight => model.rotate(true),
        Command::RotateLeft => model.rotate(false),
        Command::SetDropSpeed(speed) => model.set_drop_speed(*speed),
        Command::Unrecognized(_) => return false,
    }
    true
}
