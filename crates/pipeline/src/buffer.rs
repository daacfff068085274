use image::RgbImage;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Fixed-capacity frame queue with drop-oldest overflow.
///
/// A full buffer evicts its oldest frame to admit the newest, so a slow
/// consumer costs completeness rather than memory or producer latency.
/// One lock guards both ends; no operation blocks beyond the critical
/// section.
pub struct FrameBuffer {
    capacity: usize,
    frames: Mutex<VecDeque<RgbImage>>,
}

impl FrameBuffer {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "frame buffer capacity must be non-zero");
        Self {
            capacity,
            frames: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    fn frames(&self) -> MutexGuard<'_, VecDeque<RgbImage>> {
        // A poisoned lock only means a panic elsewhere; the deque itself
        // is always in a consistent state.
        self.frames.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a frame, evicting the oldest first when full.
    pub fn push(&self, frame: RgbImage) {
        let mut frames = self.frames();
        if frames.len() == self.capacity {
            frames.pop_front();
        }
        frames.push_back(frame);
    }

    /// Remove and return the oldest frame. Never blocks.
    pub fn pop(&self) -> Option<RgbImage> {
        self.frames().pop_front()
    }

    /// Clone of the most recently appended frame. Never blocks.
    pub fn latest(&self) -> Option<RgbImage> {
        self.frames().back().cloned()
    }

    pub fn len(&self) -> usize {
        self.frames().len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
