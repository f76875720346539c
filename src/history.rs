//! History log — linear undo/redo over scene snapshots.
//!
//! DESIGN
//! ======
//! The log is a bounded deque of snapshots with a cursor pointing at the entry
//! that matches the live scene. Committing while the cursor is behind the top
//! discards the redo branch; there is no branching history. When the log grows
//! past capacity the oldest entries are evicted so the most recent ones
//! survive.
//!
//! ERROR HANDLING
//! ==============
//! Entries are stored serialized, so a stale or damaged entry can fail to
//! parse on replay. Such an entry is dropped, the cursor is clamped, and the
//! step is retried once against the next-nearest entry in the same direction.
//! If that fails too, or nothing is left, the step reports "nothing to
//! undo/redo" rather than an error.

#[cfg(test)]
#[path = "history_test.rs"]
mod history_test;

use std::collections::VecDeque;

use tracing::{debug, warn};

use crate::consts::DEFAULT_HISTORY_CAPACITY;
use crate::scene::{Scene, Snapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Back,
    Forward,
}

/// Undo/redo stack of snapshots with a movable cursor.
#[derive(Debug, Clone)]
pub struct HistoryLog {
    entries: VecDeque<Snapshot>,
    cursor: usize,
    capacity: usize,
}

impl HistoryLog {
    /// An empty log with the default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_HISTORY_CAPACITY)
    }

    /// An empty log retaining at most `capacity` entries (minimum one).
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self { entries: VecDeque::with_capacity(capacity), cursor: 0, capacity }
    }

    /// Reset to a single entry with the cursor on it.
    pub fn initialize(&mut self, snapshot: Snapshot) {
        self.entries.clear();
        self.entries.push_back(snapshot);
        self.cursor = 0;
    }

    /// Record a new state. Returns `false` if `snapshot` equals the current
    /// entry and nothing changed.
    pub fn commit(&mut self, snapshot: Snapshot) -> bool {
        if self.current() == Some(&snapshot) {
            return false;
        }

        if !self.entries.is_empty() {
            // Redo branch is discarded by a new commit.
            self.entries.truncate(self.cursor + 1);
        }
        self.entries.push_back(snapshot);
        self.cursor = self.entries.len() - 1;

        while self.entries.len() > self.capacity {
            self.entries.pop_front();
            self.cursor = self.cursor.saturating_sub(1);
        }
        true
    }

    /// Step back one entry and return the scene to restore.
    pub fn undo(&mut self) -> Option<Scene> {
        self.step(Direction::Back)
    }

    /// Step forward one entry and return the scene to restore.
    pub fn redo(&mut self) -> Option<Scene> {
        self.step(Direction::Forward)
    }

    fn step(&mut self, direction: Direction) -> Option<Scene> {
        // One retry after dropping a corrupt entry.
        for attempt in 0..2 {
            let target = self.neighbour(direction)?;
            match self.entries[target].parse() {
                Ok(scene) => {
                    self.cursor = target;
                    return Some(scene);
                }
                Err(e) => {
                    warn!(error = %e, index = target, attempt, ?direction, "dropping corrupt history entry");
                    self.drop_entry(target);
                }
            }
        }
        debug!(?direction, "history step abandoned after retry");
        None
    }

    fn neighbour(&self, direction: Direction) -> Option<usize> {
        if self.entries.is_empty() {
            return None;
        }
        match direction {
            Direction::Back => self.cursor.checked_sub(1),
            Direction::Forward => {
                let next = self.cursor + 1;
                (next < self.entries.len()).then_some(next)
            }
        }
    }

    fn drop_entry(&mut self, index: usize) {
        self.entries.remove(index);
        if index < self.cursor {
            self.cursor -= 1;
        }
        self.cursor = self.cursor.min(self.entries.len().saturating_sub(1));
    }

    /// The entry matching the live scene.
    #[must_use]
    pub fn current(&self) -> Option<&Snapshot> {
        self.entries.get(self.cursor)
    }

    #[must_use]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn can_undo(&self) -> bool {
        self.neighbour(Direction::Back).is_some()
    }

    #[must_use]
    pub fn can_redo(&self) -> bool {
        self.neighbour(Direction::Forward).is_some()
    }
}

#[cfg(test)]
impl HistoryLog {
    pub(crate) fn from_entries_for_tests(entries: Vec<Snapshot>, cursor: usize) -> Self {
        let capacity = entries.len().max(DEFAULT_HISTORY_CAPACITY);
        Self { entries: entries.into(), cursor, capacity }
    }
}

impl Default for HistoryLog {
    fn default() -> Self {
        Self::new()
    }
}
