//! Cursor-addressed store of received lines.
//!
//! Lines before the cursor are consumed. Stepping back moves the cursor
//! without deleting anything, so the last consumed line can be read again.

use tracing::trace;

pub const DEFAULT_CAPACITY: usize = 199;

#[derive(Debug)]
pub struct CursorBuffer {
    lines: Vec<String>,
    index: usize,
    capacity: usize,
}

impl CursorBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            lines: Vec::new(),
            index: 0,
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, line: String) {
        self.lines.push(line);
    }

    /// Take the next unread line, or `None` if the caller must fill first.
    pub fn next_unread(&mut self) -> Option<String> {
        let line = self.lines.get(self.index)?.clone();
        self.index += 1;
        Some(line)
    }

    pub fn peek(&self) -> Option<&str> {
        self.lines.get(self.index).map(String::as_str)
    }

    pub fn has_unread(&self) -> bool {
        self.index < self.lines.len()
    }

    pub fn unread(&self) -> usize {
        self.lines.len() - self.index
    }

    /// Undo the last consume. Returns `false` if nothing was consumed.
    pub fn stepback(&mut self) -> bool {
        if self.index == 0 {
            return false;
        }
        self.index -= 1;
        true
    }

    /// Re-queue the last consumed line at the end of the buffer, behind
    /// everything still unread. The cursor does not move.
    pub fn stepback_append(&mut self) -> bool {
        let Some(line) = self.index.checked_sub(1).map(|i| self.lines[i].clone()) else {
            return false;
        };
        self.lines.push(line);
        true
    }

    /// Put lines back at the cursor, ahead of everything still unread, in
    /// the given order.
    pub fn insert_unread(&mut self, lines: Vec<String>) {
        self.lines.splice(self.index..self.index, lines);
    }

    /// True once the cursor has passed the capacity bound.
    pub fn needs_compaction(&self) -> bool {
        self.index >= self.capacity
    }

    /// Drop consumed lines and move the cursor back to zero. Unread lines
    /// survive, so a burst larger than the capacity is never lost.
    pub fn compact(&mut self) {
        trace!(dropped = self.index, kept = self.unread(), "Compacting line buffer");
        self.lines.drain(..self.index);
        self.index = 0;
    }

    /// Discard everything, read or not.
    pub fn reset(&mut self) {
        self.lines.clear();
        self.index = 0;
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

impl Default for CursorBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
