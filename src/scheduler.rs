//! Timer scheduling
//!
//! The watcher never touches a real clock. It schedules plain task values on a
//! [`Scheduler`]; [`TimerQueue`] is a virtual millisecond clock that the
//! session (or a test) advances explicitly.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle(u64);

/// What a fired timer asks the watcher to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerTask {
    /// Trailing edge of the mutation debounce window
    Debounce,
    /// Index into the bootstrap delay schedule
    Bootstrap(usize),
    LocationPoll,
}

pub trait Scheduler {
    /// Current time in milliseconds
    fn now(&self) -> u64;

    fn schedule(&mut self, delay_ms: u64, task: TimerTask) -> TimerHandle;

    /// Returns false if the timer already fired or was cancelled
    fn cancel(&mut self, handle: TimerHandle) -> bool;
}

/// Virtual clock with a min-heap of pending timers
///
/// Timers with the same deadline fire in scheduling order.
#[derive(Debug, Default)]
pub struct TimerQueue {
    now: u64,
    next_id: u64,
    heap: BinaryHeap<Reverse<(u64, TimerHandle)>>,
    pending: HashMap<TimerHandle, TimerTask>,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pending (not cancelled, not fired) timers
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn next_deadline(&mut self) -> Option<u64> {
        self.drop_cancelled();
        self.heap.peek().map(|Reverse((deadline, _))| *deadline)
    }

    /// Pop the earliest timer due at or before `until`, moving the clock to
    /// its deadline
    pub fn pop_due(&mut self, until: u64) -> Option<(TimerHandle, TimerTask)> {
        self.drop_cancelled();
        let Reverse((deadline, handle)) = *self.heap.peek()?;
        if deadline > until {
            return None;
        }
        self.heap.pop();
        let task = self.pending.remove(&handle)?;
        self.now = self.now.max(deadline);
        trace!(deadline, ?task, "Timer fired");
        Some((handle, task))
    }

    /// Move the clock forward without firing anything
    pub fn set_now(&mut self, now: u64) {
        self.now = self.now.max(now);
    }

    fn drop_cancelled(&mut self) {
        while let Some(Reverse((_, handle))) = self.heap.peek() {
            if self.pending.contains_key(handle) {
                break;
            }
            self.heap.pop();
        }
    }
}

impl Scheduler for TimerQueue {
    fn now(&self) -> u64 {
        self.now
    }

    fn schedule(&mut self, delay_ms: u64, task: TimerTask) -> TimerHandle {
        let handle = TimerHandle(self.next_id);
        self.next_id += 1;
        let deadline = self.now.saturating_add(delay_ms);
        self.heap.push(Reverse((deadline, handle)));
        self.pending.insert(handle, task);
        trace!(deadline, ?task, "Timer scheduled");
        handle
    }

    fn cancel(&mut self, handle: TimerHandle) -> bool {
        self.pending.remove(&handle).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fires_in_deadline_then_insertion_order() {
        let mut queue = TimerQueue::new();
        queue.schedule(500, TimerTask::Bootstrap(0));
        queue.schedule(300, TimerTask::Debounce);
        queue.schedule(500, TimerTask::LocationPoll);

        assert_eq!(queue.pop_due(1000).map(|(_, t)| t), Some(TimerTask::Debounce));
        assert_eq!(queue.now(), 300);
        assert_eq!(queue.pop_due(1000).map(|(_, t)| t), Some(TimerTask::Bootstrap(0)));
        assert_eq!(queue.pop_due(1000).map(|(_, t)| t), Some(TimerTask::LocationPoll));
        assert_eq!(queue.pop_due(1000), None);
    }

    #[test]
    fn test_not_due_yet() {
        let mut queue = TimerQueue::new();
        queue.schedule(300, TimerTask::Debounce);
        assert_eq!(queue.pop_due(299), None);
        assert_eq!(queue.next_deadline(), Some(300));
    }

    #[test]
    fn test_cancelled_timer_never_fires() {
        let mut queue = TimerQueue::new();
        let handle = queue.schedule(300, TimerTask::Debounce);
        assert!(queue.cancel(handle));
        assert!(!queue.cancel(handle));
        assert!(queue.is_empty());
        assert_eq!(queue.pop_due(u64::MAX), None);
        assert_eq!(queue.next_deadline(), None);
    }

    #[test]
    fn test_schedule_is_relative_to_now() {
        let mut queue = TimerQueue::new();
        queue.set_now(1000);
        queue.schedule(300, TimerTask::Debounce);
        assert_eq!(queue.next_deadline(), Some(1300));
    }
}
