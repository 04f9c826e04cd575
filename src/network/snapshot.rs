//! Snapshot Builder
//!
//! Full-state resync sent after every slot change. Each connected player
//! receives the match oriented with its own board as `player1`.

use std::sync::Arc;

use tracing::error;

use crate::game::model::{GameModel, Side, SimulationPair};
use crate::network::protocol::{serialize_piece, MatchInfo, PlayerInfo, ScoreInfo};
use crate::network::session::PlayerHandle;

/// Nickname shown for a side without a human.
pub const STAND_IN_NICKNAME: &str = "AI";

/// Builds [`MatchInfo`] snapshots from a live pair.
pub struct SnapshotBuilder;

impl SnapshotBuilder {
    /// Describe one board.
    pub fn player_info(model: &dyn GameModel, nickname: Option<&str>) -> PlayerInfo {
        PlayerInfo {
            nickname: nickname.unwrap_or(STAND_IN_NICKNAME).to_string(),
            score: ScoreInfo::from(&model.score()),
            gameboard: model.serialized_board(),
            hold_piece: serialize_piece(model.hold_piece().as_ref(), true),
            active_piece: serialize_piece(model.active_piece().as_ref(), false),
            next_piece: serialize_piece(model.next_piece().as_ref(), true),
        }
    }

    /// Build the snapshot as seen from `own_side`.
    pub fn build(
        pair: &dyn SimulationPair,
        nicknames: [Option<&str>; 2],
        own_side: Side,
    ) -> MatchInfo {
        let other = own_side.other();
        MatchInfo {
            player1: Self::player_info(pair.model(own_side), nicknames[own_side.index()]),
            player2: Self::player_info(pair.model(other), nicknames[other.index()]),
            is_modern: pair.is_modern_rotation(),
        }
    }

    /// Send an oriented snapshot to every occupant. Returns how many were sent.
    pub fn send_to(pair: &dyn SimulationPair, occupants: &[Option<Arc<dyn PlayerHandle>>; 2]) -> usize {
        let nicknames = [
            occupants[0].as_ref().map(|h| h.nickname()),
            occupants[1].as_ref().map(|h| h.nickname()),
        ];

        let mut sent = 0;
        for side in Side::BOTH {
            let Some(handle) = &occupants[side.index()] else {
                continue;
            };
            match Self::build(pair, nicknames, side).to_json() {
                Ok(json) => {
                    handle.send(&json);
                    sent += 1;
                }
                Err(e) => error!(slot = ?side, "Failed to serialize snapshot: {}", e),
            }
        }
        sent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::model::{GameParameters, GameScore, ModelFactory, RuleVariant};
    use crate::network::session::SessionSlots;
    use crate::network::bridge::ProtocolBridge;
    use crate::testing::{test_piece, MockFactory, RecordingHandle};
    use std::sync::atomic::Ordering;

    fn params() -> GameParameters {
        GameParameters { beginning_level: 0, variant: RuleVariant::Modern }
    }

    fn build_pair(factory: &MockFactory) -> Box<dyn SimulationPair> {
        let slots = Arc::new(SessionSlots::new());
        factory.create_pair(
            &params(),
            [
                Box::new(ProtocolBridge::new(Side::First, slots.clone())),
                Box::new(ProtocolBridge::new(Side::Second, slots)),
            ],
        )
    }

    #[test]
    fn test_player_info_pieces() {
        let (factory, tracker) = MockFactory::new();
        {
            let mut templates = tracker.templates.lock();
            templates[0].score = GameScore { score: 500, cleared_lines: 4, level: 1, drawn_pieces: 20 };
            templates[0].board = "0000000001".into();
            templates[0].active = Some(test_piece(1));
            templates[0].next = Some(test_piece(5));
        }
        let pair = build_pair(&factory);

        let info = SnapshotBuilder::player_info(pair.model(Side::First), Some("ada"));
        assert_eq!(info.nickname, "ada");
        assert_eq!(info.score.score, 500);
        assert_eq!(info.gameboard, "0000000001");
        assert_eq!(info.hold_piece, None);
        assert_eq!(info.active_piece.as_deref(), Some("4-18-5-18-5-19-1"));
        assert_eq!(info.next_piece.as_deref(), Some("0-0-1-0-1-1-5"));
    }

    #[test]
    fn test_build_orients_recipient_first() {
        let (factory, tracker) = MockFactory::new();
        tracker.modern.store(true, Ordering::SeqCst);
        tracker.templates.lock()[1].board = "second".into();
        let pair = build_pair(&factory);

        let info = SnapshotBuilder::build(pair.as_ref(), [None, Some("bob")], Side::Second);
        assert_eq!(info.player1.nickname, "bob");
        assert_eq!(info.player1.gameboard, "second");
        assert_eq!(info.player2.nickname, STAND_IN_NICKNAME);
        assert!(info.is_modern);
    }

    #[test]
    fn test_send_to_occupants_only() {
        let (factory, _tracker) = MockFactory::new();
        let pair = build_pair(&factory);
        let (ada, ada_dyn) = RecordingHandle::pair("ada");

        let sent = SnapshotBuilder::send_to(pair.as_ref(), &[None, Some(ada_dyn)]);
        assert_eq!(sent, 1);

        let lines = ada.take();
        assert_eq!(lines.len(), 1);
        let info = MatchInfo::from_json(&lines[0]).unwrap();
        assert_eq!(info.player1.nickname, "ada");
        assert_eq!(info.player2.nickname, "AI");
    }
}
