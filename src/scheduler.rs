//! Time source and the single delayed-task primitive used by the letter spawners.
//!
//! The game runs on one thread. Expiry timers are not callbacks: a
//! [`DelayedTask`] only records when it is due, and its owner polls it between
//! keystrokes. Every spawner stores its task inside the letter it expires, so
//! dropping the letter drops the timer with it.

use std::cell::Cell;
use std::rc::Rc;
use std::time::Instant;

/// Monotonic milliseconds since an arbitrary origin
pub trait Clock {
    fn now_ms(&self) -> u64;
}

/// Wall clock anchored at construction time
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}

/// Hand-driven clock for headless runs and tests.
///
/// Clones share the same underlying time, so a test can keep one handle and
/// give another to the game.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<u64>>,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self {
            now: Rc::new(Cell::new(start_ms)),
        }
    }

    pub fn advance(&self, ms: u64) {
        self.now.set(self.now.get() + ms);
    }

    pub fn set(&self, ms: u64) {
        self.now.set(ms);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.get()
    }
}

/// A cancellable one-shot deadline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DelayedTask {
    due_at: Option<u64>,
}

impl DelayedTask {
    /// A task that never fires
    pub fn idle() -> Self {
        Self { due_at: None }
    }

    pub fn after(now_ms: u64, delay_ms: u64) -> Self {
        Self {
            due_at: Some(now_ms.saturating_add(delay_ms)),
        }
    }

    /// Replaces any pending deadline.
    pub fn reschedule(&mut self, now_ms: u64, delay_ms: u64) {
        self.due_at = Some(now_ms.saturating_add(delay_ms));
    }

    pub fn cancel(&mut self) {
        self.due_at = None;
    }

    pub fn is_pending(&self) -> bool {
        self.due_at.is_some()
    }

    pub fn due_at(&self) -> Option<u64> {
        self.due_at
    }

    /// Fires at most once: returns true the first time it is polled at or
    /// after its deadline, and disarms itself.
    pub fn poll(&mut self, now_ms: u64) -> bool {
        match self.due_at {
            Some(due) if now_ms >= due => {
                self.due_at = None;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_clones_share_time() {
        let clock = ManualClock::new(100);
        let other = clock.clone();
        clock.advance(50);
        assert_eq!(other.now_ms(), 150);
        other.set(10);
        assert_eq!(clock.now_ms(), 10);
    }

    #[test]
    fn task_fires_once_at_deadline() {
        let mut task = DelayedTask::after(1000, 250);
        assert!(!task.poll(1249));
        assert!(task.poll(1250));
        assert!(!task.poll(5000));
        assert!(!task.is_pending());
    }

    #[test]
    fn cancelled_task_never_fires() {
        let mut task = DelayedTask::after(0, 10);
        task.cancel();
        assert!(!task.poll(u64::MAX));
    }

    #[test]
    fn reschedule_moves_deadline() {
        let mut task = DelayedTask::after(0, 1000);
        task.reschedule(200, 100);
        assert_eq!(task.due_at(), Some(300));
        assert!(task.poll(300));
    }

    #[test]
    fn idle_task_is_not_pending() {
        let mut task = DelayedTask::idle();
        assert!(!task.is_pending());
        assert!(!task.poll(42));
    }
}
