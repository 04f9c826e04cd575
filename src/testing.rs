//! Test doubles for the game model seam and player handles.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::game::command::{Command, DropSpeed};
use crate::game::events::SimulationObserver;
use crate::game::model::{
    apply_command, Block, GameModel, GameParameters, GameScore, ModelFactory, Piece, Side,
    SimulationPair, StandIn,
};
use crate::network::session::PlayerHandle;

// =============================================================================
// MODEL
// =============================================================================

/// One input call received by a [`RecordingModel`].
#[derive(Clone, Debug, PartialEq)]
pub enum ModelCall {
    StartMove { left: bool },
    EndMove { left: bool },
    Rotate { clockwise: bool },
    Hold,
    DropSpeed(DropSpeed),
}

/// Model that records inputs and reports fixed observable state.
#[derive(Clone, Debug, Default)]
pub struct RecordingModel {
    pub calls: Vec<ModelCall>,
    pub score: GameScore,
    pub board: String,
    pub hold: Option<Piece>,
    pub active: Option<Piece>,
    pub next: Option<Piece>,
}

impl GameModel for RecordingModel {
    fn start_move_horizontal(&mut self, left: bool) {
        self.calls.push(ModelCall::StartMove { left });
    }

    fn end_move_horizontal(&mut self, left: bool) {
        self.calls.push(ModelCall::EndMove { left });
    }

    fn rotate(&mut self, clockwise: bool) {
        self.calls.push(ModelCall::Rotate { clockwise });
    }

    fn hold_active_piece(&mut self) {
        self.calls.push(ModelCall::Hold);
    }

    fn set_drop_speed(&mut self, speed: DropSpeed) {
        self.calls.push(ModelCall::DropSpeed(speed));
    }

    fn score(&self) -> GameScore {
        self.score
    }

    fn serialized_board(&self) -> String {
        self.board.clone()
    }

    fn hold_piece(&self) -> Option<Piece> {
        self.hold.clone()
    }

    fn active_piece(&self) -> Option<Piece> {
        self.active.clone()
    }

    fn next_piece(&self) -> Option<Piece> {
        self.next.clone()
    }
}

/// A piece with the same shape in both coordinate systems, offset on the board.
pub fn test_piece(kind: u8) -> Piece {
    let relative: Vec<Block> = [(0, 0), (1, 0), (1, 1)]
        .iter()
        .map(|&(x, y)| Block::new(x, y))
        .collect();
    let board = relative.iter().map(|b| Block::new(b.x + 4, b.y + 18)).collect();
    Piece { kind, relative_blocks: relative, board_blocks: board }
}

// =============================================================================
// PAIR
// =============================================================================

/// Something that happened inside a [`MockPair`], in order.
#[derive(Clone, Debug, PartialEq)]
pub enum PairEvent {
    Call(Side, ModelCall),
    StandIn(Side),
    Update(f32),
}

/// Observer callback a test asks the pair to raise during its next update.
#[derive(Clone, Debug)]
pub enum ScriptedEvent {
    Move { dx: i32, dy: i32, ghost: i32 },
    Pin,
    GameOver,
    Score(GameScore),
    Garbage(u32),
}

/// Shared view into the pairs a [`MockFactory`] builds.
#[derive(Default)]
pub struct PairTracker {
    pub log: Mutex<Vec<PairEvent>>,
    pub script: Mutex<Vec<(Side, ScriptedEvent)>>,
    pub stand_in_moves: Mutex<[Vec<Command>; 2]>,
    pub templates: Mutex<[RecordingModel; 2]>,
    pub game_over: AtomicBool,
    pub pairs_created: AtomicUsize,
    pub pairs_dropped: AtomicUsize,
    pub modern: AtomicBool,
}

impl PairTracker {
    pub fn events(&self) -> Vec<PairEvent> {
        self.log.lock().clone()
    }

    pub fn take_events(&self) -> Vec<PairEvent> {
        std::mem::take(&mut *self.log.lock())
    }

    pub fn updates(&self) -> Vec<f32> {
        self.log
            .lock()
            .iter()
            .filter_map(|e| match e {
                PairEvent::Update(delta) => Some(*delta),
                _ => None,
            })
            .collect()
    }

    pub fn emit(&self, side: Side, event: ScriptedEvent) {
        self.script.lock().push((side, event));
    }

    pub fn set_game_over(&self, over: bool) {
        self.game_over.store(over, Ordering::SeqCst);
    }

    pub fn created(&self) -> usize {
        self.pairs_created.load(Ordering::SeqCst)
    }

    pub fn dropped(&self) -> usize {
        self.pairs_dropped.load(Ordering::SeqCst)
    }
}

pub struct MockPair {
    models: [RecordingModel; 2],
    observers: [Box<dyn SimulationObserver>; 2],
    tracker: Arc<PairTracker>,
}

impl MockPair {
    fn flush_calls(&mut self) {
        let mut log = self.tracker.log.lock();
        for side in Side::BOTH {
            for call in self.models[side.index()].calls.drain(..) {
                log.push(PairEvent::Call(side, call));
            }
        }
    }
}

fn fire(observer: &mut dyn SimulationObserver, event: ScriptedEvent) {
    match event {
        ScriptedEvent::Move { dx, dy, ghost } => observer.move_piece(&[], dx, dy, ghost),
        ScriptedEvent::Pin => observer.pin_piece(&[]),
        ScriptedEvent::GameOver => observer.game_over(),
        ScriptedEvent::Score(score) => observer.update_score(&score, 0),
        ScriptedEvent::Garbage(lines) => observer.show_garbage_amount(lines),
    }
}

impl SimulationPair for MockPair {
    fn model(&self, side: Side) -> &dyn GameModel {
        &self.models[side.index()]
    }

    fn model_mut(&mut self, side: Side) -> &mut dyn GameModel {
        &mut self.models[side.index()]
    }

    fn update(&mut self, delta: f32) {
        self.flush_calls();
        self.tracker.log.lock().push(PairEvent::Update(delta));

        let script = std::mem::take(&mut *self.tracker.script.lock());
        for (side, event) in script {
            fire(self.observers[side.index()].as_mut(), event);
        }
    }

    fn is_game_over(&self) -> bool {
        self.tracker.game_over.load(Ordering::SeqCst)
    }

    fn is_modern_rotation(&self) -> bool {
        self.tracker.modern.load(Ordering::SeqCst)
    }
}

impl Drop for MockPair {
    fn drop(&mut self) {
        self.tracker.pairs_dropped.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct MockStandIn {
    side: Side,
    tracker: Arc<PairTracker>,
}

impl StandIn for MockStandIn {
    fn decide(&mut self, _own: &dyn GameModel, _opponent: &dyn GameModel, _delta: f32) -> Vec<Command> {
        self.tracker.log.lock().push(PairEvent::StandIn(self.side));
        self.tracker.stand_in_moves.lock()[self.side.index()].clone()
    }
}

/// Factory handing out [`MockPair`]s that report into one [`PairTracker`].
#[derive(Clone, Default)]
pub struct MockFactory {
    pub tracker: Arc<PairTracker>,
}

impl MockFactory {
    pub fn new() -> (Self, Arc<PairTracker>) {
        let factory = Self::default();
        let tracker = factory.tracker.clone();
        (factory, tracker)
    }
}

impl ModelFactory for MockFactory {
    fn create_pair(
        &self,
        _parameters: &GameParameters,
        observers: [Box<dyn SimulationObserver>; 2],
    ) -> Box<dyn SimulationPair> {
        self.tracker.pairs_created.fetch_add(1, Ordering::SeqCst);
        Box::new(MockPair {
            models: self.tracker.templates.lock().clone(),
            observers,
            tracker: self.tracker.clone(),
        })
    }

    fn create_stand_in(&self, side: Side) -> Box<dyn StandIn> {
        Box::new(MockStandIn { side, tracker: self.tracker.clone() })
    }
}

/// Apply a command list to a fresh model and return the calls it produced.
pub fn calls_for(commands: &[Command]) -> Vec<ModelCall> {
    let mut model = RecordingModel::default();
    for command in commands {
        apply_command(&mut model, command);
    }
    model.calls
}

// =============================================================================
// PLAYER HANDLE
// =============================================================================

/// Player handle that keeps every line it is sent.
pub struct RecordingHandle {
    nickname: String,
    lines: Mutex<Vec<String>>,
}

impl RecordingHandle {
    /// Returns the concrete handle and the same handle as a trait object.
    pub fn pair(nickname: &str) -> (Arc<RecordingHandle>, Arc<dyn PlayerHandle>) {
        let handle = Arc::new(RecordingHandle {
            nickname: nickname.to_string(),
            lines: Mutex::new(Vec::new()),
        });
        let dyn_handle: Arc<dyn PlayerHandle> = handle.clone();
        (handle, dyn_handle)
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.lines.lock())
    }
}

impl PlayerHandle for RecordingHandle {
    fn nickname(&self) -> &str {
        &self.nickname
    }

    fn send(&self, line: &str) {
        self.lines.lock().push(line.to_string());
    }
}
