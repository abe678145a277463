use std::collections::VecDeque;

use image::RgbaImage;
use log::debug;

// ============================================================================
// CANVAS SNAPSHOT: full-buffer undo state
// ============================================================================

/// A complete copy of the drawing surface taken before a guarded mutation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CanvasSnapshot {
    pub description: &'static str,
    pub pixels: RgbaImage,
}

impl CanvasSnapshot {
    pub fn capture(description: &'static str, pixels: &RgbaImage) -> Self {
        Self {
            description,
            pixels: pixels.clone(),
        }
    }
}

// ============================================================================
// HISTORY MANAGER: bounded undo stack
// ============================================================================

/// Undo history bounded by entry count. Pushing past the bound silently
/// drops the oldest snapshot.
pub struct HistoryManager {
    undo_stack: VecDeque<CanvasSnapshot>,
    max_history_size: usize,
}

impl Default for HistoryManager {
    fn default() -> Self {
        Self::new(10)
    }
}

impl HistoryManager {
    pub fn new(max_history_size: usize) -> Self {
        Self {
            undo_stack: VecDeque::with_capacity(max_history_size.min(64)),
            max_history_size,
        }
    }

    pub fn push(&mut self, snapshot: CanvasSnapshot) {
        self.undo_stack.push_back(snapshot);
        self.prune();
    }

    /// Remove and return the most recent snapshot.
    pub fn pop(&mut self) -> Option<CanvasSnapshot> {
        self.undo_stack.pop_back()
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    fn prune(&mut self) {
        while self.undo_stack.len() > self.max_history_size {
            if let Some(removed) = self.undo_stack.pop_front() {
                debug!("history full; dropped oldest '{}' snapshot", removed.description);
            }
        }
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
    }

    pub fn undo_count(&self) -> usize {
        self.undo_stack.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn snap(tag: u8) -> CanvasSnapshot {
        CanvasSnapshot::capture("Stroke", &RgbaImage::from_pixel(2, 2, Rgba([tag, 0, 0, tag])))
    }

    #[test]
    fn pop_returns_most_recent_first() {
        let mut history = HistoryManager::new(10);
        history.push(snap(1));
        history.push(snap(2));
        assert_eq!(history.pop().unwrap().pixels.get_pixel(0, 0)[0], 2);
        assert_eq!(history.pop().unwrap().pixels.get_pixel(0, 0)[0], 1);
        assert!(history.pop().is_none());
    }

    #[test]
    fn oldest_entries_are_evicted_past_the_bound() {
        let mut history = HistoryManager::new(10);
        for tag in 0..15 {
            history.push(snap(tag));
        }
        assert_eq!(history.undo_count(), 10);

        let mut seen = Vec::new();
        while let Some(s) = history.pop() {
            seen.push(s.pixels.get_pixel(0, 0)[0]);
        }
        assert_eq!(seen, (5..15).rev().collect::<Vec<u8>>());
    }

    #[test]
    fn zero_depth_keeps_nothing() {
        let mut history = HistoryManager::new(0);
        history.push(snap(1));
        assert!(!history.can_undo());
        assert_eq!(history.undo_count(), 0);
    }

    #[test]
    fn clear_empties_the_stack() {
        let mut history = HistoryManager::default();
        history.push(snap(1));
        history.push(CanvasSnapshot::capture("Clear", &RgbaImage::new(1, 1)));
        assert_eq!(history.undo_count(), 2);
        history.clear();
        assert!(!history.can_undo());
        assert!(history.pop().is_none());
    }
}
