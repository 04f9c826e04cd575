//! Protocol Messages
//!
//! Wire format for client-server communication over WebSocket.
//!
//! In-game traffic is compact text: every delta line starts with an owner
//! indicator (`Y` for the recipient's own board, `O` for the opponent's)
//! followed by a three-letter event code and its fields. Score updates and
//! full snapshots are JSON. Session control messages are tagged JSON.

use std::fmt::{self, Write as _};

use serde::{Deserialize, Serialize};

use crate::game::model::{Block, GameScore, Piece, Side};

// =============================================================================
// OWNER INDICATOR
// =============================================================================

/// Whose board a line describes, relative to the recipient.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Owner {
    /// The recipient's own board.
    Own,
    /// The opponent's board.
    Opponent,
}

impl Owner {
    /// Owner of `subject` as seen by the player in slot `recipient`.
    #[inline]
    pub fn relative(recipient: Side, subject: Side) -> Self {
        if recipient == subject {
            Owner::Own
        } else {
            Owner::Opponent
        }
    }

    /// Single-character prefix.
    #[inline]
    pub const fn indicator(self) -> char {
        match self {
            Owner::Own => 'Y',
            Owner::Opponent => 'O',
        }
    }

    /// Prefix a rendered event with this indicator.
    pub fn prefix(self, line: &str) -> String {
        let mut out = String::with_capacity(line.len() + 1);
        out.push(self.indicator());
        out.push_str(line);
        out
    }
}

// =============================================================================
// DELTA EVENTS (SERVER -> CLIENT)
// =============================================================================

/// Render blocks as `x-y-` per block.
pub fn write_blocks(out: &mut String, blocks: &[Block]) {
    for block in blocks {
        // Writing to a String cannot fail.
        let _ = write!(out, "{}-{}-", block.x, block.y);
    }
}

/// Serialize a piece as its blocks followed by its type number.
///
/// `relative` selects piece-relative coordinates, otherwise board coordinates.
pub fn serialize_piece(piece: Option<&Piece>, relative: bool) -> Option<String> {
    let piece = piece?;
    let blocks = if relative {
        &piece.relative_blocks
    } else {
        &piece.board_blocks
    };
    let mut out = String::with_capacity(blocks.len() * 6 + 2);
    write_blocks(&mut out, blocks);
    let _ = write!(out, "{}", piece.kind);
    Some(out)
}

/// One observable change on a board, before the owner indicator is applied.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProtocolEvent {
    /// `MOV|dx|dy|ghost`
    Move {
        /// Horizontal shift.
        dx: i32,
        /// Vertical shift.
        dy: i32,
        /// Rows between the piece and its landing spot.
        ghost_distance: i32,
    },
    /// `ROT-blocks ghost`
    Rotate {
        /// Piece blocks.
        blocks: Vec<Block>,
        /// Rows between the piece and its landing spot.
        ghost_distance: i32,
    },
    /// `CLR-l1|l2-S|gap|gap`
    Clear {
        /// Rows removed.
        removed_lines: Vec<i32>,
        /// Special clear (four lines or T-Spin).
        special: bool,
        /// Gap column per inserted garbage row.
        garbage_gaps: Vec<i32>,
    },
    /// `PIN`
    Pin,
    /// `NXT-blocks kind`
    Next {
        /// Piece blocks.
        blocks: Vec<Block>,
        /// Piece type number.
        kind: u8,
    },
    /// `ANT-blocks kind-ghost`
    Activate {
        /// Piece blocks.
        blocks: Vec<Block>,
        /// Piece type number.
        kind: u8,
        /// Rows between the piece and its landing spot.
        ghost_distance: i32,
    },
    /// `HLD-hold ghost-active`
    Hold {
        /// New hold piece, piece-relative.
        hold_blocks: Vec<Block>,
        /// Rows between the piece and its landing spot.
        ghost_distance: i32,
        /// New active piece, if one spawned.
        active_blocks: Option<Vec<Block>>,
    },
    /// `GOV`
    GameOver,
    /// `CNF-x-y`
    Conflict {
        /// Column.
        x: i32,
        /// Row.
        y: i32,
    },
    /// `MTV-banner`
    Motivation(&'static str),
    /// `GBG-lines`
    Garbage(u32),
    /// Serialized [`ScoreInfo`] JSON.
    Score(String),
}

impl fmt::Display for ProtocolEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolEvent::Move { dx, dy, ghost_distance } => {
                write!(f, "MOV|{}|{}|{}", dx, dy, ghost_distance)
            }
            ProtocolEvent::Rotate { blocks, ghost_distance } => {
                let mut out = String::from("ROT-");
                write_blocks(&mut out, blocks);
                write!(f, "{}{}", out, ghost_distance)
            }
            ProtocolEvent::Clear { removed_lines, special, garbage_gaps } => {
                f.write_str("CLR-")?;
                for (i, line) in removed_lines.iter().enumerate() {
                    if i > 0 {
                        f.write_char('|')?;
                    }
                    write!(f, "{}", line)?;
                }
                f.write_char('-')?;
                f.write_char(if *special { 'S' } else { 'N' })?;
                for gap in garbage_gaps {
                    write!(f, "|{}", gap)?;
                }
                Ok(())
            }
            ProtocolEvent::Pin => f.write_str("PIN"),
            ProtocolEvent::Next { blocks, kind } => {
                let mut out = String::from("NXT-");
                write_blocks(&mut out, blocks);
                write!(f, "{}{}", out, kind)
            }
            ProtocolEvent::Activate { blocks, kind, ghost_distance } => {
                let mut out = String::from("ANT-");
                write_blocks(&mut out, blocks);
                write!(f, "{}{}-{}", out, kind, ghost_distance)
            }
            ProtocolEvent::Hold { hold_blocks, ghost_distance, active_blocks } => {
                let mut out = String::from("HLD-");
                write_blocks(&mut out, hold_blocks);
                let _ = write!(out, "{}-", ghost_distance);
                if let Some(active) = active_blocks {
                    write_blocks(&mut out, active);
                }
                f.write_str(&out)
            }
            ProtocolEvent::GameOver => f.write_str("GOV"),
            ProtocolEvent::Conflict { x, y } => write!(f, "CNF-{}-{}", x, y),
            ProtocolEvent::Motivation(banner) => write!(f, "MTV-{}", banner),
            ProtocolEvent::Garbage(lines) => write!(f, "GBG-{}", lines),
            ProtocolEvent::Score(json) => f.write_str(json),
        }
    }
}

// =============================================================================
// SCORE AND SNAPSHOT (SERVER -> CLIENT)
// =============================================================================

/// Score counters as sent to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreInfo {
    /// Points.
    pub score: u32,
    /// Lines cleared.
    pub cleared_lines: u32,
    /// Current level.
    pub level: u32,
    /// Pieces dropped.
    pub drawn_pieces: u32,
}

impl From<&GameScore> for ScoreInfo {
    fn from(score: &GameScore) -> Self {
        Self {
            score: score.score,
            cleared_lines: score.cleared_lines,
            level: score.level,
            drawn_pieces: score.drawn_pieces,
        }
    }
}

/// One board in a full snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerInfo {
    /// Player nickname, or the stand-in label.
    pub nickname: String,
    /// Score counters.
    pub score: ScoreInfo,
    /// Serialized board contents.
    pub gameboard: String,
    /// Hold piece, piece-relative coordinates.
    pub hold_piece: Option<String>,
    /// Active piece, board coordinates.
    pub active_piece: Option<String>,
    /// Next piece, piece-relative coordinates.
    pub next_piece: Option<String>,
}

/// Full-state resync. `player1` is always the recipient's own board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchInfo {
    /// Recipient's board.
    pub player1: PlayerInfo,
    /// Opponent's board.
    pub player2: PlayerInfo,
    /// Modern rotation system in use.
    pub is_modern: bool,
}

// =============================================================================
// SESSION CONTROL
// =============================================================================

/// Messages sent from client to server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Join the match. Must be the first message.
    Hello { nickname: String },

    /// In-game command token (`SML`, `ROR`, ...).
    InGame { message: String },

    /// Ping for latency measurement.
    Ping { timestamp: u64 },
}

/// Session control messages sent from server to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerNotice {
    /// Joined the match in the given slot.
    Welcome { slot: Side, server_version: String },

    /// Join refused.
    Rejected { reason: String },

    /// Pong response.
    Pong { timestamp: u64, server_time: u64 },

    /// Server is shutting down.
    Shutdown { reason: String },
}

// =============================================================================
// SERIALIZATION HELPERS
// =============================================================================

impl ClientMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

impl ServerNotice {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

impl ScoreInfo {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl MatchInfo {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}
