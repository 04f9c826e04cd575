//! Command Queue
//!
//! Per-slot FIFO buffer between the network tasks (producers) and the tick
//! driver (consumer). Each queue is its own unit of mutual exclusion.

use std::collections::VecDeque;

use parking_lot::Mutex;

use crate::game::command::Command;

/// Thread-safe, ordered buffer of inbound commands for one slot.
#[derive(Debug, Default)]
pub struct CommandQueue {
    commands: Mutex<VecDeque<Command>>,
}

impl CommandQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self {
            commands: Mutex::new(VecDeque::with_capacity(32)),
        }
    }

    /// Append a command, preserving arrival order.
    pub fn enqueue(&self, command: Command) {
        self.commands.lock().push_back(command);
    }

    /// Remove and return everything queued at call time, oldest first.
    ///
    /// Anything enqueued after the lock is taken waits for the next drain.
    pub fn drain_all(&self) -> Vec<Command> {
        let mut commands = self.commands.lock();
        commands.drain(..).collect()
    }

    /// Discard everything queued.
    pub fn clear(&self) -> usize {
        let mut commands = self.commands.lock();
        let dropped = commands.len();
        commands.clear();
        dropped
    }

    /// Number of queued commands.
    pub fn len(&self) -> usize {
        self.commands.lock().len()
    }

    /// Check if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.commands.lock().is_empty()
    }
}
