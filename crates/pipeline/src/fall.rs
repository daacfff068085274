use crate::posture::Posture;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Position of a detection within one frame's result list.
///
/// This is the only identity the estimator provides. It is not stable
/// across frames: subjects that appear, vanish, or reorder silently
/// remap tracker state. Callers wanting stronger identity must supply
/// their own keys.
pub type SubjectKey = usize;

/// Per-subject lying timer.
///
/// A subject held continuously in lying posture for at least
/// `fall_duration` is reported as a confirmed fall on every subsequent
/// observation (level-triggered, not edge-triggered). Any other posture
/// clears the timer unconditionally. Entries are created lazily and
/// live for the tracker's lifetime.
pub struct FallTracker {
    fall_duration: Duration,
    lying_since: HashMap<SubjectKey, Instant>,
}

impl FallTracker {
    pub fn new(fall_duration: Duration) -> Self {
        Self {
            fall_duration,
            lying_since: HashMap::new(),
        }
    }

    /// Record one posture observation for a subject at time `now`.
    /// Returns true when the fall is confirmed.
    ///
    /// `now` must not move backward between calls for the same subject.
    pub fn observe(&mut self, key: SubjectKey, posture: Posture, now: Instant) -> bool {
        if posture != Posture::Lying {
            self.lying_since.remove(&key);
            return false;
        }

        let since = *self.lying_since.entry(key).or_insert(now);
        now.duration_since(since) >= self.fall_duration
    }

    /// Whether a subject currently has a running lying timer.
    pub fn is_lying(&self, key: SubjectKey) -> bool {
        self.lying_since.contains_key(&key)
    }
}
