//! Event-to-Protocol Bridge
//!
//! Turns one side's simulation callbacks into protocol lines and pushes them
//! to both connected players, each with its own owner indicator.
//!
//! A bridge lives exactly as long as the simulation pair it was injected
//! into. Its dedup state (garbage amount, last score text, game-over flag)
//! therefore starts fresh with every new pair.

use std::sync::Arc;

use crate::game::events::{Motivation, SimulationObserver};
use crate::game::model::{Block, GameScore, Side};
use crate::network::protocol::{Owner, ProtocolEvent, ScoreInfo};
use crate::network::session::SessionSlots;

/// Observer for one side of the pair.
pub struct ProtocolBridge {
    /// Side whose events this bridge reports.
    side: Side,
    /// Slot table shared with the match.
    slots: Arc<SessionSlots>,
    /// Last `GBG` amount sent.
    last_garbage_reported: u32,
    /// Slot generation `last_garbage_reported` was sent under.
    garbage_generation: u64,
    /// Last score JSON sent.
    last_sent_score: Option<String>,
    /// `GOV` already sent for this pair.
    game_over_sent: bool,
}

impl ProtocolBridge {
    /// Create a bridge for `side`.
    pub fn new(side: Side, slots: Arc<SessionSlots>) -> Self {
        Self {
            side,
            garbage_generation: slots.generation(),
            slots,
            last_garbage_reported: 0,
            last_sent_score: None,
            game_over_sent: false,
        }
    }

    /// Side this bridge reports.
    pub fn side(&self) -> Side {
        self.side
    }

    fn has_player(&self) -> bool {
        self.slots.connected_count() > 0
    }

    /// Send one event to every connected player.
    ///
    /// Recipients are collected under the slot lock; sending happens after
    /// it is released.
    fn send_event(&self, event: &ProtocolEvent) {
        let recipients = self.slots.occupants();
        if recipients.iter().all(Option::is_none) {
            return;
        }

        let line = event.to_string();
        for recipient in Side::BOTH {
            if let Some(handle) = &recipients[recipient.index()] {
                let owned = Owner::relative(recipient, self.side).prefix(&line);
                #[cfg(feature = "debug-tracing")]
                tracing::trace!(slot = ?recipient, line = %owned, "Outbound");
                handle.send(&owned);
            }
        }
    }
}

impl SimulationObserver for ProtocolBridge {
    fn move_piece(&mut self, _blocks: &[Block], dx: i32, dy: i32, ghost_distance: i32) {
        self.send_event(&ProtocolEvent::Move { dx, dy, ghost_distance });
    }

    fn rotate_piece(&mut self, _old_blocks: &[Block], new_blocks: &[Block], ghost_distance: i32) {
        self.send_event(&ProtocolEvent::Rotate {
            blocks: new_blocks.to_vec(),
            ghost_distance,
        });
    }

    fn clear_and_insert_lines(&mut self, removed_lines: &[i32], special: bool, garbage_gaps: &[i32]) {
        if removed_lines.is_empty() && garbage_gaps.is_empty() {
            return;
        }
        self.send_event(&ProtocolEvent::Clear {
            removed_lines: removed_lines.to_vec(),
            special,
            garbage_gaps: garbage_gaps.to_vec(),
        });
    }

    fn game_over(&mut self) {
        if self.game_over_sent {
            return;
        }
        self.game_over_sent = true;
        self.send_event(&ProtocolEvent::GameOver);
    }

    fn show_next_piece(&mut self, relative_blocks: &[Block], kind: u8) {
        self.send_event(&ProtocolEvent::Next {
            blocks: relative_blocks.to_vec(),
            kind,
        });
    }

    fn activate_next_piece(&mut self, board_blocks: &[Block], kind: u8, ghost_distance: i32) {
        self.send_event(&ProtocolEvent::Activate {
            blocks: board_blocks.to_vec(),
            kind,
            ghost_distance,
        });
    }

    fn swap_hold_and_active(
        &mut self,
        new_hold: &[Block],
        _old_active: &[Block],
        new_active: Option<&[Block]>,
        ghost_distance: i32,
        _hold_kind: u8,
    ) {
        self.send_event(&ProtocolEvent::Hold {
            hold_blocks: new_hold.to_vec(),
            ghost_distance,
            active_blocks: new_active.map(<[Block]>::to_vec),
        });
    }

    fn pin_piece(&mut self, _blocks: &[Block]) {
        self.send_event(&ProtocolEvent::Pin);
    }

    fn update_score(&mut self, score: &GameScore, _gained: u32) {
        if !self.has_player() {
            return;
        }
        let serialized = match ScoreInfo::from(score).to_json() {
            Ok(json) => json,
            Err(e) => {
                tracing::error!(side = ?self.side, "Failed to serialize score: {}", e);
                return;
            }
        };
        if self.last_sent_score.as_deref() == Some(serialized.as_str()) {
            return;
        }
        self.send_event(&ProtocolEvent::Score(serialized.clone()));
        self.last_sent_score = Some(serialized);
    }

    fn mark_conflict(&mut self, x: i32, y: i32) {
        self.send_event(&ProtocolEvent::Conflict { x, y });
    }

    fn show_motivation(&mut self, kind: Motivation, _extra: Option<&str>) {
        if let Some(banner) = kind.banner() {
            self.send_event(&ProtocolEvent::Motivation(banner));
        }
    }

    fn show_garbage_amount(&mut self, lines: u32) {
        // Snapshots carry no garbage amount, so a seat change re-arms it.
        let generation = self.slots.generation();
        if generation != self.garbage_generation {
            self.garbage_generation = generation;
            self.last_garbage_reported = 0;
        }
        if !self.has_player() {
            self.last_garbage_reported = 0;
            return;
        }
        if lines != self.last_garbage_reported {
            self.send_event(&ProtocolEvent::Garbage(lines));
            self.last_garbage_reported = lines;
        }
    }
}
