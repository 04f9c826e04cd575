//! Player Commands
//!
//! The closed vocabulary of intents a player (human or stand-in) can send.
//! Tokens arrive as three-letter strings from the network layer and are
//! parsed exactly once into [`Command`].

use std::fmt;

// =============================================================================
// DROP SPEED
// =============================================================================

/// Soft drop factor requested by the player.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DropSpeed {
    /// Regular gravity.
    None,
    /// Accelerated fall while the key is held.
    Soft,
    /// Drop to the ghost position immediately.
    Hard,
}

// =============================================================================
// COMMAND
// =============================================================================

/// A single player intent.
///
/// `Unrecognized` keeps the original token so it can be logged at dispatch.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Command {
    /// `SML` - start moving left.
    StartMoveLeft,
    /// `SMR` - start moving right.
    StartMoveRight,
    /// `SMH` - stop horizontal movement in both directions.
    StopMoveHorizontal,
    /// `HAT` - swap the active piece with the hold slot.
    HoldActivePiece,
    /// `ROR` - rotate clockwise.
    RotateRight,
    /// `ROL` - rotate counterclockwise.
    RotateLeft,
    /// `DRN` / `DRS` / `DRH` - set drop speed.
    SetDropSpeed(DropSpeed),
    /// Any token outside the vocabulary.
    Unrecognized(String),
}

impl Command {
    /// Every recognized command, in token order.
    pub const ALL: [Command; 9] = [
        Command::StartMoveLeft,
        Command::StartMoveRight,
        Command::StopMoveHorizontal,
        Command::HoldActivePiece,
        Command::RotateRight,
        Command::RotateLeft,
        Command::SetDropSpeed(DropSpeed::None),
        Command::SetDropSpeed(DropSpeed::Soft),
        Command::SetDropSpeed(DropSpeed::Hard),
    ];

    /// Parse a wire token. Matching is exact and case-sensitive.
    pub fn parse(token: &str) -> Self {
        match token {
            "SML" => Command::StartMoveLeft,
            "SMR" => Command::StartMoveRight,
            "SMH" => Command::StopMoveHorizontal,
            "HAT" => Command::HoldActivePiece,
            "ROR" => Command::RotateRight,
            "ROL" => Command::RotateLeft,
            "DRN" => Command::SetDropSpeed(DropSpeed::None),
            "DRS" => Command::SetDropSpeed(DropSpeed::Soft),
            "DRH" => Command::SetDropSpeed(DropSpeed::Hard),
            other => Command::Unrecognized(other.to_string()),
        }
    }

    /// Wire token for this command.
    pub fn token(&self) -> &str {
        match self {
            Command::StartMoveLeft => "SML",
            Command::StartMoveRight => "SMR",
            Command::StopMoveHorizontal => "SMH",
            Command::HoldActivePiece => "HAT",
            Command::RotateRight => "ROR",
            Command::RotateLeft => "ROL",
            Command::SetDropSpeed(DropSpeed::None) => "DRN",
            Command::SetDropSpeed(DropSpeed::Soft) => "DRS",
            Command::SetDropSpeed(DropSpeed::Hard) => "DRH",
            Command::Unrecognized(token) => token,
        }
    }

    /// Check if this command is part of the vocabulary.
    #[inline]
    pub fn is_recognized(&self) -> bool {
        !matches!(self, Command::Unrecognized(_))
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl From<&str> for Command {
    fn from(token: &str) -> Self {
        Command::parse(token)
    }
}
