//! Match Session Management
//!
//! The authoritative two-player match: slot assignment, per-slot command
//! queues, and the simulation lifecycle driven by `update(delta)`.
//!
//! ## Threading
//!
//! ```text
//! connection tasks                     tick driver
//! ────────────────                     ───────────
//! MatchHandle::connect ──┐
//! MatchHandle::got_message ─► SessionSlots ◄── Match::update
//! MatchHandle::disconnect ─┘   (RwLock slots,      │
//!                               Mutex per queue)   ▼
//!                                            SimulationPair ─► ProtocolBridge ─► PlayerHandle::send
//! ```
//!
//! The simulation pair is owned by [`Match`] and only touched from `update`.
//! Slot changes raise a resync flag that the next tick services before it
//! dispatches commands.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::game::command::Command;
use crate::game::events::SimulationObserver;
use crate::game::model::{
    apply_command, GameParameters, ModeType, ModelFactory, Side, SimulationPair, StandIn,
};
use crate::game::queue::CommandQueue;
use crate::network::bridge::ProtocolBridge;
use crate::network::snapshot::SnapshotBuilder;

/// Seconds between the game concluding and the pair being discarded.
pub const GAME_OVER_WAIT_SECS: f32 = 5.0;

/// Slack for float drift when accumulating tick deltas against the wait.
const COUNTDOWN_EPSILON: f64 = 1e-6;

/// Session position a player handle occupies.
pub type Slot = Side;

// =============================================================================
// PLAYER HANDLE
// =============================================================================

/// Outbound side of one connected player.
///
/// `send` must not block; delivery failures are the implementation's concern.
pub trait PlayerHandle: Send + Sync {
    /// Display name shown to the opponent.
    fn nickname(&self) -> &str;

    /// Queue one protocol line for delivery.
    fn send(&self, line: &str);
}

fn same_handle(a: &Arc<dyn PlayerHandle>, b: &Arc<dyn PlayerHandle>) -> bool {
    Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
}

// =============================================================================
// ERRORS
// =============================================================================

/// Session errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// Both slots are occupied.
    #[error("Session is full")]
    SessionFull,

    /// Handle already occupies a slot.
    #[error("Already in session")]
    AlreadyInSession,
}

// =============================================================================
// SLOT TABLE
// =============================================================================

type SlotArray = [Option<Weak<dyn PlayerHandle>>; 2];

/// Slot assignment and command queues shared between the network tasks and
/// the tick driver.
///
/// Slots hold weak references; a handle that has been dropped counts as an
/// empty slot until the next tick prunes it.
pub struct SessionSlots {
    slots: RwLock<SlotArray>,
    queues: [CommandQueue; 2],
    resync_pending: AtomicBool,
    /// Bumped on every slot transition.
    generation: AtomicU64,
}

impl SessionSlots {
    /// Create an empty slot table.
    pub fn new() -> Self {
        Self {
            slots: RwLock::new([None, None]),
            queues: [CommandQueue::new(), CommandQueue::new()],
            resync_pending: AtomicBool::new(false),
            generation: AtomicU64::new(0),
        }
    }

    fn live(slot: &Option<Weak<dyn PlayerHandle>>) -> Option<Arc<dyn PlayerHandle>> {
        slot.as_ref().and_then(Weak::upgrade)
    }

    fn find(slots: &SlotArray, handle: &Arc<dyn PlayerHandle>) -> Option<Side> {
        Side::BOTH.into_iter().find(|side| {
            Self::live(&slots[side.index()]).is_some_and(|occupant| same_handle(&occupant, handle))
        })
    }

    /// Record a slot transition. Callers hold the write lock.
    fn transition(&self, side: Side) {
        self.queues[side.index()].clear();
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.resync_pending.store(true, Ordering::Release);
    }

    /// Claim the first empty slot for `handle`.
    pub fn claim(&self, handle: &Arc<dyn PlayerHandle>) -> Result<Side, SessionError> {
        let mut slots = self.slots.write();

        if Self::find(&slots, handle).is_some() {
            return Err(SessionError::AlreadyInSession);
        }

        let side = Side::BOTH
            .into_iter()
            .find(|side| Self::live(&slots[side.index()]).is_none())
            .ok_or(SessionError::SessionFull)?;

        slots[side.index()] = Some(Arc::downgrade(handle));
        self.transition(side);
        Ok(side)
    }

    /// Vacate the slot held by `handle`, if any.
    pub fn release(&self, handle: &Arc<dyn PlayerHandle>) -> Option<Side> {
        let mut slots = self.slots.write();

        let side = Self::find(&slots, handle)?;
        slots[side.index()] = None;
        self.transition(side);
        Some(side)
    }

    /// Vacate slots whose handle was dropped without a disconnect.
    pub fn prune_dead(&self) -> usize {
        let mut slots = self.slots.write();

        let mut pruned = 0;
        for side in Side::BOTH {
            let slot = &mut slots[side.index()];
            if slot.is_some() && Self::live(slot).is_none() {
                *slot = None;
                self.transition(side);
                info!(slot = ?side, "Dropped handle vacated its slot");
                pruned += 1;
            }
        }
        pruned
    }

    /// Counter bumped by every claim, release and prune.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Slot held by `handle`.
    pub fn slot_of(&self, handle: &Arc<dyn PlayerHandle>) -> Option<Side> {
        Self::find(&self.slots.read(), handle)
    }

    /// Live occupants, indexed by side.
    pub fn occupants(&self) -> [Option<Arc<dyn PlayerHandle>>; 2] {
        let slots = self.slots.read();
        [Self::live(&slots[0]), Self::live(&slots[1])]
    }

    /// Number of live occupants.
    pub fn connected_count(&self) -> usize {
        let slots = self.slots.read();
        slots.iter().filter(|slot| Self::live(slot).is_some()).count()
    }

    /// Append a command to the queue of the slot `handle` holds.
    ///
    /// The read lock is held across the enqueue so a slot being vacated
    /// never receives it.
    pub fn enqueue(&self, handle: &Arc<dyn PlayerHandle>, command: Command) -> Option<Side> {
        let slots = self.slots.read();
        let side = Self::find(&slots, handle)?;
        self.queues[side.index()].enqueue(command);
        Some(side)
    }

    /// Queue for one slot.
    pub fn queue(&self, side: Side) -> &CommandQueue {
        &self.queues[side.index()]
    }

    /// Per slot: drained commands if occupied, `None` (queue cleared) if not.
    fn collect_inputs(&self) -> [Option<Vec<Command>>; 2] {
        let slots = self.slots.read();
        Side::BOTH.map(|side| {
            let queue = &self.queues[side.index()];
            if Self::live(&slots[side.index()]).is_some() {
                Some(queue.drain_all())
            } else {
                let dropped = queue.clear();
                if dropped > 0 {
                    debug!(slot = ?side, dropped, "Cleared stale commands");
                }
                None
            }
        })
    }

    /// Drain both queues and drop their contents.
    fn discard_inputs(&self) {
        for queue in &self.queues {
            queue.clear();
        }
    }

    fn take_resync(&self) -> bool {
        self.resync_pending.swap(false, Ordering::AcqRel)
    }
}

impl Default for SessionSlots {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SessionSlots {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionSlots")
            .field("connected", &self.connected_count())
            .field("queued", &[self.queues[0].len(), self.queues[1].len()])
            .field("resync_pending", &self.resync_pending.load(Ordering::Acquire))
            .finish()
    }
}

// =============================================================================
// MATCH HANDLE
// =============================================================================

/// Cloneable entry point for the network layer.
#[derive(Clone, Debug)]
pub struct MatchHandle {
    slots: Arc<SessionSlots>,
}

impl MatchHandle {
    /// Seat a player in the first empty slot.
    pub fn connect(&self, handle: &Arc<dyn PlayerHandle>) -> Result<Slot, SessionError> {
        let slot = self.slots.claim(handle)?;
        info!(slot = ?slot, nickname = %handle.nickname(), "Player connected");
        Ok(slot)
    }

    /// Vacate the slot held by `handle`. No-op if it holds none.
    pub fn disconnect(&self, handle: &Arc<dyn PlayerHandle>) {
        if let Some(slot) = self.slots.release(handle) {
            info!(slot = ?slot, nickname = %handle.nickname(), "Player disconnected");
        }
    }

    /// Queue an in-game token from `handle`.
    pub fn got_message(&self, handle: &Arc<dyn PlayerHandle>, token: &str) {
        if self.slots.enqueue(handle, Command::parse(token)).is_none() {
            debug!(nickname = %handle.nickname(), token, "Message from unseated player dropped");
        }
    }

    /// Number of seated players.
    pub fn connected_count(&self) -> usize {
        self.slots.connected_count()
    }
}

// =============================================================================
// MATCH
// =============================================================================

/// Simulation pair plus the stand-ins that drive unoccupied sides.
pub struct LiveGame {
    pair: Box<dyn SimulationPair>,
    stand_ins: [Box<dyn StandIn>; 2],
}

/// Lifecycle phase. A pair exists exactly in the non-idle phases.
pub enum MatchPhase {
    /// No simulation.
    Idle,
    /// Simulation running.
    Active(LiveGame),
    /// Simulation concluded, waiting before it is discarded.
    GameOverWait {
        /// Concluded simulation, still readable for resyncs.
        game: LiveGame,
        /// Seconds accumulated since game over.
        elapsed: f64,
    },
}

/// Phase without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchState {
    /// No simulation.
    Idle,
    /// Simulation running.
    Active,
    /// Waiting after game over.
    GameOverWait,
}

impl MatchPhase {
    fn state(&self) -> MatchState {
        match self {
            MatchPhase::Idle => MatchState::Idle,
            MatchPhase::Active(_) => MatchState::Active,
            MatchPhase::GameOverWait { .. } => MatchState::GameOverWait,
        }
    }
}

impl fmt::Debug for MatchPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchPhase::GameOverWait { elapsed, .. } => f
                .debug_struct("GameOverWait")
                .field("elapsed", elapsed)
                .finish(),
            other => write!(f, "{:?}", other.state()),
        }
    }
}

/// The authoritative match, owned by the tick driver.
pub struct Match<F: ModelFactory> {
    parameters: GameParameters,
    factory: F,
    slots: Arc<SessionSlots>,
    phase: MatchPhase,
}

impl<F: ModelFactory> Match<F> {
    /// Create a match with resolved parameters.
    pub fn new(parameters: GameParameters, factory: F) -> Self {
        Self {
            parameters,
            factory,
            slots: Arc::new(SessionSlots::new()),
            phase: MatchPhase::Idle,
        }
    }

    /// Create a match, resolving `mode` once for the whole session.
    pub fn with_mode(beginning_level: u32, mode: ModeType, factory: F) -> Self {
        let parameters = GameParameters::resolve(beginning_level, mode, &mut rand::thread_rng());
        info!(beginning_level, variant = ?parameters.variant, "Match created");
        Self::new(parameters, factory)
    }

    /// Handle for the network layer.
    pub fn handle(&self) -> MatchHandle {
        MatchHandle { slots: self.slots.clone() }
    }

    /// Session parameters.
    pub fn parameters(&self) -> &GameParameters {
        &self.parameters
    }

    /// Current lifecycle state.
    pub fn state(&self) -> MatchState {
        self.phase.state()
    }

    /// Remaining game-over wait, while waiting.
    pub fn countdown(&self) -> Option<f32> {
        match &self.phase {
            MatchPhase::GameOverWait { elapsed, .. } => {
                Some((f64::from(GAME_OVER_WAIT_SECS) - elapsed).max(0.0) as f32)
            }
            _ => None,
        }
    }

    /// Number of seated players.
    pub fn connected_count(&self) -> usize {
        self.slots.connected_count()
    }

    /// Advance the match by `delta` seconds.
    pub fn update(&mut self, delta: f32) {
        let delta = sanitize_delta(delta);
        self.slots.prune_dead();

        let phase = std::mem::replace(&mut self.phase, MatchPhase::Idle);
        self.phase = match phase {
            MatchPhase::Idle => {
                if self.slots.connected_count() == 0 {
                    self.slots.take_resync();
                    self.slots.discard_inputs();
                    MatchPhase::Idle
                } else {
                    let game = self.start_game();
                    self.slots.take_resync();
                    SnapshotBuilder::send_to(game.pair.as_ref(), &self.slots.occupants());
                    self.step(game, delta)
                }
            }
            MatchPhase::Active(game) => {
                self.resync_if_pending(&game);
                self.step(game, delta)
            }
            MatchPhase::GameOverWait { game, elapsed } => {
                self.resync_if_pending(&game);
                self.slots.discard_inputs();

                let elapsed = elapsed + f64::from(delta);
                if elapsed + COUNTDOWN_EPSILON >= f64::from(GAME_OVER_WAIT_SECS) {
                    info!(elapsed, "Simulation pair discarded");
                    MatchPhase::Idle
                } else {
                    MatchPhase::GameOverWait { game, elapsed }
                }
            }
        };
    }

    fn start_game(&self) -> LiveGame {
        let observers: [Box<dyn SimulationObserver>; 2] = [
            Box::new(ProtocolBridge::new(Side::First, self.slots.clone())),
            Box::new(ProtocolBridge::new(Side::Second, self.slots.clone())),
        ];
        let pair = self.factory.create_pair(&self.parameters, observers);
        let stand_ins = Side::BOTH.map(|side| self.factory.create_stand_in(side));

        info!(
            beginning_level = self.parameters.beginning_level,
            variant = ?self.parameters.variant,
            "Simulation pair created"
        );
        LiveGame { pair, stand_ins }
    }

    fn resync_if_pending(&self, game: &LiveGame) {
        if self.slots.take_resync() {
            let sent = SnapshotBuilder::send_to(game.pair.as_ref(), &self.slots.occupants());
            debug!(sent, "Snapshot resync");
        }
    }

    /// Dispatch this tick's commands to both sides, then step once.
    fn step(&self, mut game: LiveGame, delta: f32) -> MatchPhase {
        debug_assert!(delta.is_finite() && delta >= 0.0, "unsanitized delta {}", delta);
        let inputs = self.slots.collect_inputs();
        let LiveGame { pair, stand_ins } = &mut game;

        for (side, input) in Side::BOTH.into_iter().zip(inputs) {
            let commands = match input {
                Some(commands) => commands,
                None => stand_ins[side.index()].decide(
                    pair.model(side),
                    pair.model(side.other()),
                    delta,
                ),
            };

            for command in &commands {
                if !apply_command(pair.model_mut(side), command) {
                    warn!(slot = ?side, token = %command, "Unrecognized game message");
                }
            }
        }

        pair.update(delta);

        if pair.is_game_over() {
            info!(wait_secs = GAME_OVER_WAIT_SECS, "Game over");
            MatchPhase::GameOverWait { game, elapsed: 0.0 }
        } else {
            MatchPhase::Active(game)
        }
    }
}

impl<F: ModelFactory> fmt::Debug for Match<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Match")
            .field("parameters", &self.parameters)
            .field("slots", &self.slots)
            .field("phase", &self.phase)
            .finish()
    }
}

fn sanitize_delta(delta: f32) -> f32 {
    if delta.is_finite() && delta >= 0.0 {
        delta
    } else {
        warn!(delta, "Invalid tick delta, using 0");
        0.0
    }
}
