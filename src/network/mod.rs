//! Network Layer
//!
//! Session management and the WebSocket front-end.
//! Everything here talks to the simulation only through `game/` traits.

pub mod protocol;
pub mod bridge;
pub mod snapshot;
pub mod session;
pub mod server;

pub use protocol::{ClientMessage, MatchInfo, Owner, PlayerInfo, ProtocolEvent, ScoreInfo, ServerNotice};
pub use bridge::ProtocolBridge;
pub use snapshot::{SnapshotBuilder, STAND_IN_NICKNAME};
pub use session::{
    LiveGame, Match, MatchHandle, MatchPhase, MatchState, PlayerHandle, SessionError, SessionSlots,
    Slot, GAME_OVER_WAIT_SECS,
};
pub use server::{init_tracing, GameServer, GameServerError, WsPlayerHandle};
