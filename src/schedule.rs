//! Cooperative scheduling on a virtual clock.
//!
//! The host owns real time. It calls `tick(now_ms)` and `animation_frame()`
//! on the reader, and each concern (selection capture, progress save, snap,
//! rebuild) keeps exactly one pending task here. Scheduling again replaces
//! the pending task, so only the latest request in a burst runs.

/// Milliseconds on the host clock.
pub type Millis = u64;

/// A single pending task that fires `delay` ms after it was last scheduled.
#[derive(Debug, Clone)]
pub struct Debounced<T> {
    delay: Millis,
    pending: Option<(T, Millis)>,
}

impl<T> Debounced<T> {
    pub fn new(delay: Millis) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    /// Schedule `value`, superseding whatever was pending.
    pub fn schedule(&mut self, value: T, now: Millis) {
        self.pending = Some((value, now));
    }

    /// Drop the pending task.
    pub fn cancel(&mut self) -> Option<T> {
        self.pending.take().map(|(value, _)| value)
    }

    /// Take the pending task if its delay has elapsed.
    pub fn take_ready(&mut self, now: Millis) -> Option<T> {
        let (_, queued_at) = self.pending.as_ref()?;
        if now.saturating_sub(*queued_at) >= self.delay {
            self.cancel()
        } else {
            None
        }
    }
}

/// At most one request per animation frame; later requests in the same
/// frame overwrite earlier ones.
#[derive(Debug, Clone)]
pub struct FrameSlot<T> {
    pending: Option<T>,
}

impl<T> Default for FrameSlot<T> {
    fn default() -> Self {
        Self { pending: None }
    }
}

impl<T> FrameSlot<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request work for the next frame, replacing any earlier request.
    pub fn request(&mut self, value: T) {
        self.pending = Some(value);
    }

    /// Take the request for this frame.
    pub fn take(&mut self) -> Option<T> {
        self.pending.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debounce_waits_for_quiet_period() {
        let mut d = Debounced::new(150);
        d.schedule("a", 1000);
        assert_eq!(d.take_ready(1100), None);
        d.schedule("b", 1100);
        assert_eq!(d.take_ready(1249), None);
        assert_eq!(d.take_ready(1250), Some("b"));
        assert_eq!(d.take_ready(5000), None);
    }

    #[test]
    fn test_cancel_drops_pending() {
        let mut d = Debounced::new(10);
        d.schedule(1, 0);
        assert_eq!(d.cancel(), Some(1));
        assert_eq!(d.take_ready(100), None);
    }

    #[test]
    fn test_frame_slot_keeps_latest() {
        let mut slot = FrameSlot::new();
        slot.request(1);
        slot.request(2);
        assert_eq!(slot.take(), Some(2));
        assert_eq!(slot.take(), None);
    }
}
