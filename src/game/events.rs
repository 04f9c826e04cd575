//! Simulation Events
//!
//! Callbacks a game model raises while it is stepped. The match injects one
//! observer per side when it creates a simulation pair.

use serde::{Deserialize, Serialize};

use crate::game::model::{Block, GameScore};

/// Achievement kinds a model may announce.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Motivation {
    /// T-piece spun into place.
    TSpin,
    /// Board emptied completely.
    BoardCleared,
    /// This board lost.
    GameOver,
    /// This board won.
    GameWon,
    /// Round is about to begin.
    Prepare,
    /// Level increased.
    NewLevel,
    /// Another ten lines cleared.
    TenLinesCleared,
    /// Two special clears in a row.
    DoubleSpecial,
    /// Combo counter increased.
    ComboCount,
    /// Bonus for dropping fast.
    TurboBonus,
    /// Bonus score awarded.
    BonusScore,
    /// Personal best beaten.
    NewHighscore,
    /// Another hundred pieces dropped.
    HundredBlocksDropped,
    /// Opponent board topped out.
    PlayerOver,
}

impl Motivation {
    /// Banner text shown to players, if this kind has one.
    pub const fn banner(self) -> Option<&'static str> {
        match self {
            Motivation::TSpin => Some("T-Spin"),
            Motivation::BoardCleared => Some("Clean Complete"),
            Motivation::GameOver => Some("Game over"),
            Motivation::GameWon => Some("Won!"),
            Motivation::Prepare => Some("Prepare to play!"),
            Motivation::NewLevel
            | Motivation::TenLinesCleared
            | Motivation::DoubleSpecial
            | Motivation::ComboCount
            | Motivation::TurboBonus
            | Motivation::BonusScore
            | Motivation::NewHighscore
            | Motivation::HundredBlocksDropped
            | Motivation::PlayerOver => None,
        }
    }
}

/// Observer contract for one side of a simulation pair.
///
/// Callbacks with no protocol meaning have empty default bodies.
pub trait SimulationObserver: Send {
    /// A block was placed during board setup.
    fn insert_new_block(&mut self, _x: i32, _y: i32, _block_type: u8) {}

    /// Active piece moved by (`dx`, `dy`).
    fn move_piece(&mut self, blocks: &[Block], dx: i32, dy: i32, ghost_distance: i32);

    /// Active piece rotated into `new_blocks`.
    fn rotate_piece(&mut self, old_blocks: &[Block], new_blocks: &[Block], ghost_distance: i32);

    /// Lines removed and/or garbage lines inserted with the given gap columns.
    fn clear_and_insert_lines(&mut self, removed_lines: &[i32], special: bool, garbage_gaps: &[i32]);

    /// Frozen lines marked and shifted.
    fn mark_and_move_frozen_lines(&mut self, _play_sound: bool, _removed: &[i32], _full: &[i32]) {}

    /// This board finished.
    fn game_over(&mut self);

    /// Preview piece changed.
    fn show_next_piece(&mut self, relative_blocks: &[Block], kind: u8);

    /// Preview piece became the active piece.
    fn activate_next_piece(&mut self, board_blocks: &[Block], kind: u8, ghost_distance: i32);

    /// Active and hold piece swapped. `new_active` is `None` when the hold
    /// slot was empty and the next piece has not spawned yet.
    fn swap_hold_and_active(
        &mut self,
        new_hold: &[Block],
        old_active: &[Block],
        new_active: Option<&[Block]>,
        ghost_distance: i32,
        hold_kind: u8,
    );

    /// Active piece locked into the board.
    fn pin_piece(&mut self, blocks: &[Block]);

    /// Score counters changed.
    fn update_score(&mut self, score: &GameScore, gained: u32);

    /// Placement collided at (`x`, `y`).
    fn mark_conflict(&mut self, x: i32, y: i32);

    /// Achievement announcement.
    fn show_motivation(&mut self, kind: Motivation, extra: Option<&str>);

    /// Pending garbage lines for this board.
    fn show_garbage_amount(&mut self, lines: u32);

    /// Combo counter height.
    fn show_combo_height(&mut self, _height: u32) {}

    /// Time label highlight.
    fn emphasize_time_label(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_banner_table() {
        assert_eq!(Motivation::TSpin.banner(), Some("T-Spin"));
        assert_eq!(Motivation::BoardCleared.banner(), Some("Clean Complete"));
        assert_eq!(Motivation::GameOver.banner(), Some("Game over"));
        assert_eq!(Motivation::GameWon.banner(), Some("Won!"));
        assert_eq!(Motivation::Prepare.banner(), Some("Prepare to play!"));
    }

    #[test]
    fn test_unmapped_kinds_have_no_banner() {
        let unmapped = [
            Motivation::NewLevel,
            Motivation::TenLinesCleared,
            Motivation::DoubleSpecial,
            Motivation::ComboCount,
            Motivation::TurboBonus,
            Motivation::BonusScore,
            Motivation::NewHighscore,
            Motivation::HundredBlocksDropped,
            Motivation::PlayerOver,
        ];
        for kind in unmapped {
            assert_eq!(kind.banner(), None, "{:?} should not show a banner", kind);
        }
    }
}
