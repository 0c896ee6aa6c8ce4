//! Change watcher
//!
//! Decides when the pipeline should run again. Significant mutation batches
//! and location changes go through a trailing debounce; the bootstrap schedule
//! fires unconditionally. The watcher only returns [`Trigger`]s, the session
//! runs the passes.

use tracing::{debug, info, trace};

use crate::constants::timing::{BOOTSTRAP_DELAYS_MS, DEBOUNCE_MS, LOCATION_POLL_MS};
use crate::constants::tree::SIGNIFICANT_TOKENS;
use crate::scheduler::{Scheduler, TimerHandle, TimerTask};
use crate::tree::{self, LiveTree, MutationRecord, NodeId, TreeResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub enum WatchState {
    /// Not started, or stopped
    Idle,
    Observing,
    /// A re-application is scheduled
    Debouncing,
}

/// Why a pass runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Trigger {
    Initial,
    Mutation,
    Bootstrap(usize),
    Navigation,
    SettingsChanged,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timing {
    pub debounce_ms: u64,
    pub bootstrap_delays_ms: Vec<u64>,
    pub location_poll_ms: u64,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            debounce_ms: DEBOUNCE_MS,
            bootstrap_delays_ms: BOOTSTRAP_DELAYS_MS.to_vec(),
            location_poll_ms: LOCATION_POLL_MS,
        }
    }
}

#[derive(Debug)]
pub struct ChangeWatcher {
    state: WatchState,
    timing: Timing,
    debounce: Option<TimerHandle>,
    pending: Option<Trigger>,
    poll: Option<TimerHandle>,
    bootstrap: Vec<TimerHandle>,
    last_location: String,
}

impl ChangeWatcher {
    pub fn new() -> Self {
        Self::with_timing(Timing::default())
    }

    pub fn with_timing(timing: Timing) -> Self {
        Self {
            state: WatchState::Idle,
            timing,
            debounce: None,
            pending: None,
            poll: None,
            bootstrap: Vec::new(),
            last_location: String::new(),
        }
    }

    pub fn state(&self) -> WatchState {
        self.state
    }

    pub fn timing(&self) -> &Timing {
        &self.timing
    }

    /// Begin observing; schedules the bootstrap passes and the location poll
    pub fn start<S: Scheduler + ?Sized>(&mut self, scheduler: &mut S, location: &str) {
        if self.state != WatchState::Idle {
            debug!("Watcher already started");
            return;
        }
        self.last_location = location.to_string();
        self.bootstrap = self
            .timing
            .bootstrap_delays_ms
            .iter()
            .enumerate()
            .map(|(idx, delay)| scheduler.schedule(*delay, TimerTask::Bootstrap(idx)))
            .collect();
        self.poll = Some(scheduler.schedule(self.timing.location_poll_ms, TimerTask::LocationPoll));
        self.state = WatchState::Observing;
        info!(
            bootstrap = self.bootstrap.len(),
            debounce_ms = self.timing.debounce_ms,
            "Change watcher started"
        );
    }

    /// Cancel every pending timer and go idle
    pub fn stop<S: Scheduler + ?Sized>(&mut self, scheduler: &mut S) {
        let handles = self
            .debounce
            .take()
            .into_iter()
            .chain(self.poll.take())
            .chain(self.bootstrap.drain(..));
        for handle in handles {
            scheduler.cancel(handle);
        }
        self.pending = None;
        self.state = WatchState::Idle;
        info!("Change watcher stopped");
    }

    /// Feed one mutation batch; returns true when it (re)armed the debounce
    pub fn observe<T, S>(&mut self, tree: &T, scheduler: &mut S, batch: &[MutationRecord]) -> bool
    where
        T: LiveTree + ?Sized,
        S: Scheduler + ?Sized,
    {
        if self.state == WatchState::Idle {
            return false;
        }
        if !is_significant(tree, batch) {
            trace!(records = batch.len(), "Dropping insignificant mutation batch");
            return false;
        }
        self.arm(scheduler, Trigger::Mutation);
        true
    }

    /// Handle a fired timer; returns the trigger for a pass, if one is due
    pub fn on_timer<S: Scheduler + ?Sized>(
        &mut self,
        scheduler: &mut S,
        handle: TimerHandle,
        task: TimerTask,
        location: &str,
    ) -> Option<Trigger> {
        if self.state == WatchState::Idle {
            return None;
        }
        match task {
            TimerTask::Debounce => {
                if self.debounce != Some(handle) {
                    return None;
                }
                self.debounce = None;
                self.state = WatchState::Observing;
                Some(self.pending.take().unwrap_or(Trigger::Mutation))
            }
            TimerTask::Bootstrap(idx) => {
                self.bootstrap.retain(|h| *h != handle);
                debug!(idx, "Bootstrap re-application due");
                Some(Trigger::Bootstrap(idx))
            }
            TimerTask::LocationPoll => {
                self.poll = Some(scheduler.schedule(self.timing.location_poll_ms, TimerTask::LocationPoll));
                if location != self.last_location {
                    info!(from = %self.last_location, to = %location, "Location changed");
                    self.last_location = location.to_string();
                    self.arm(scheduler, Trigger::Navigation);
                }
                None
            }
        }
    }

    /// Trailing debounce: a later trigger supersedes the pending one
    fn arm<S: Scheduler + ?Sized>(&mut self, scheduler: &mut S, reason: Trigger) {
        if let Some(previous) = self.debounce.take() {
            scheduler.cancel(previous);
        }
        // navigation outranks plain mutations within one window
        if self.pending != Some(Trigger::Navigation) {
            self.pending = Some(reason);
        }
        self.debounce = Some(scheduler.schedule(self.timing.debounce_ms, TimerTask::Debounce));
        self.state = WatchState::Debouncing;
        trace!(?reason, "Debounce armed");
    }
}

impl Default for ChangeWatcher {
    fn default() -> Self {
        Self::new()
    }
}

/// Does any added element, or any element with a changed attribute, carry a
/// high-value token in its tag, class or id?
pub fn is_significant<T: LiveTree + ?Sized>(tree: &T, batch: &[MutationRecord]) -> bool {
    batch.iter().any(|record| match record {
        MutationRecord::ChildList { added, .. } => added.iter().any(|node| has_token(tree, *node)),
        MutationRecord::Attributes { target, .. } => has_token(tree, *target),
        MutationRecord::CharacterData { .. } => false,
    })
}

fn has_token<T: LiveTree + ?Sized>(tree: &T, node: NodeId) -> bool {
    // nodes removed again before the batch was delivered are not significant
    token_text(tree, node)
        .map(|text| SIGNIFICANT_TOKENS.iter().any(|token| text.contains(token)))
        .unwrap_or(false)
}

fn token_text<T: LiveTree + ?Sized>(tree: &T, node: NodeId) -> TreeResult<String> {
    if !tree::is_element(tree, node)? {
        return Ok(String::new());
    }
    let mut text = tree.tag(node)?;
    text.push(' ');
    text.push_str(&tree::class_string(tree, node)?);
    text.push(' ');
    text.push_str(&tree.attribute(node, "id")?.unwrap_or_default());
    Ok(text.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::TimerQueue;
    use crate::tree::Document;

    const HOME: &str = "https://www.douyin.com/";

    fn fire_until(watcher: &mut ChangeWatcher, queue: &mut TimerQueue, until: u64, location: &str) -> Vec<Trigger> {
        let mut fired = Vec::new();
        while let Some((handle, task)) = queue.pop_due(until) {
            fired.extend(watcher.on_timer(queue, handle, task, location));
        }
        queue.set_now(until);
        fired
    }

    fn quiet_timing() -> Timing {
        Timing {
            bootstrap_delays_ms: Vec::new(),
            location_poll_ms: 10_000,
            ..Timing::default()
        }
    }

    #[test]
    fn test_significance_filter() {
        let mut doc = Document::new(HOME, "body");
        let root = doc.root();
        doc.append_element(root, "div", &[("class", "sidebar")]).unwrap();
        let plain = doc.take_mutations();
        doc.append_element(root, "div", &[("class", "xgplayer-container")]).unwrap();
        let player = doc.take_mutations();
        doc.append_element(root, "VIDEO", &[]).unwrap();
        let video = doc.take_mutations();
        doc.append_text(root, "video").unwrap();
        let text = doc.take_mutations();

        assert!(!is_significant(&doc, &plain));
        assert!(is_significant(&doc, &player));
        assert!(is_significant(&doc, &video));
        assert!(!is_significant(&doc, &text));
    }

    #[test]
    fn test_attribute_change_is_significant_by_id() {
        let mut doc = Document::new(HOME, "body");
        let root = doc.root();
        let node = doc.append_element(root, "div", &[("id", "MainContent")]).unwrap();
        doc.take_mutations();
        doc.set_attribute(node, "data-state", "ready").unwrap();
        let batch = doc.take_mutations();
        assert!(is_significant(&doc, &batch));
    }

    #[test]
    fn test_detached_nodes_are_not_significant() {
        let mut doc = Document::new(HOME, "body");
        let root = doc.root();
        let node = doc.append_element(root, "div", &[("class", "feed")]).unwrap();
        let batch = doc.take_mutations();
        doc.detach(node).unwrap();
        assert!(!is_significant(&doc, &batch));
    }

    #[test]
    fn test_debounce_collapses_batches() {
        let mut doc = Document::new(HOME, "body");
        let mut queue = TimerQueue::new();
        let mut watcher = ChangeWatcher::with_timing(quiet_timing());
        watcher.start(&mut queue, HOME);
        assert_eq!(watcher.state(), WatchState::Observing);

        let root = doc.root();
        for i in 0..5 {
            doc.append_element(root, "div", &[("class", "feed-item")]).unwrap();
            let batch = doc.take_mutations();
            assert!(watcher.observe(&doc, &mut queue, &batch));
            assert_eq!(watcher.state(), WatchState::Debouncing);
            let now = (i + 1) * 100;
            assert!(fire_until(&mut watcher, &mut queue, now, HOME).is_empty());
        }

        assert_eq!(fire_until(&mut watcher, &mut queue, 10_000, HOME), vec![Trigger::Mutation]);
        assert_eq!(watcher.state(), WatchState::Observing);
    }

    #[test]
    fn test_bootstrap_schedule_fires_unconditionally() {
        let mut queue = TimerQueue::new();
        let mut watcher = ChangeWatcher::new();
        watcher.start(&mut queue, HOME);

        assert!(fire_until(&mut watcher, &mut queue, 499, HOME).is_empty());
        assert_eq!(fire_until(&mut watcher, &mut queue, 500, HOME), vec![Trigger::Bootstrap(0)]);
        assert_eq!(
            fire_until(&mut watcher, &mut queue, 5000, HOME),
            vec![Trigger::Bootstrap(1), Trigger::Bootstrap(2)]
        );
        assert!(fire_until(&mut watcher, &mut queue, 60_000, HOME).is_empty());
    }

    #[test]
    fn test_location_change_triggers_navigation() {
        let mut queue = TimerQueue::new();
        let mut watcher = ChangeWatcher::with_timing(Timing {
            bootstrap_delays_ms: Vec::new(),
            ..Timing::default()
        });
        watcher.start(&mut queue, HOME);

        assert!(fire_until(&mut watcher, &mut queue, 3000, HOME).is_empty());
        let live = "https://live.douyin.com/42";
        // poll at 4000 notices the change, debounce fires 300 later
        assert!(fire_until(&mut watcher, &mut queue, 4000, live).is_empty());
        assert_eq!(fire_until(&mut watcher, &mut queue, 4300, live), vec![Trigger::Navigation]);
        assert!(fire_until(&mut watcher, &mut queue, 9000, live).is_empty());
    }

    #[test]
    fn test_stop_cancels_everything() {
        let mut doc = Document::new(HOME, "body");
        let mut queue = TimerQueue::new();
        let mut watcher = ChangeWatcher::new();
        watcher.start(&mut queue, HOME);
        let root = doc.root();
        doc.append_element(root, "main", &[]).unwrap();
        let batch = doc.take_mutations();
        assert!(watcher.observe(&doc, &mut queue, &batch));

        watcher.stop(&mut queue);
        assert_eq!(watcher.state(), WatchState::Idle);
        assert!(queue.is_empty());
        assert!(!watcher.observe(&doc, &mut queue, &[]));
    }
}
