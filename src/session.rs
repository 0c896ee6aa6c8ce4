//! Session runtime
//!
//! Single-threaded event loop that owns the live tree, the orchestrator, the
//! watcher and a virtual timer queue. Each pass runs to completion before the
//! next trigger is looked at.

use anyhow::Result;
use serde_json::Value;
use tracing::{debug, info};

use crate::config::{ConfigError, Storage};
use crate::orchestrator::{Orchestrator, PassReport};
use crate::scheduler::{Scheduler, TimerQueue};
use crate::tree::{Document, LiveTree, MutationRecord};
use crate::watcher::{ChangeWatcher, Timing, Trigger, WatchState};

/// Drives passes over one live tree
///
/// The tree's mutation log is the caller's: whatever delivers batches to
/// [`observe`](Self::observe) must also drain them, our own writes included.
/// Over a [`Document`] that is [`pump`](Session::pump).
pub struct Session<T: LiveTree, S: Storage> {
    tree: T,
    orchestrator: Orchestrator<S>,
    watcher: ChangeWatcher,
    timers: TimerQueue,
    passes: usize,
    last_report: Option<PassReport>,
}

impl<T: LiveTree, S: Storage> Session<T, S> {
    pub fn new(tree: T, orchestrator: Orchestrator<S>) -> Self {
        Self::with_timing(tree, orchestrator, Timing::default())
    }

    pub fn with_timing(tree: T, orchestrator: Orchestrator<S>, timing: Timing) -> Self {
        Self {
            tree,
            orchestrator,
            watcher: ChangeWatcher::with_timing(timing),
            timers: TimerQueue::new(),
            passes: 0,
            last_report: None,
        }
    }

    /// Initial pass, then start watching
    pub fn start(&mut self) -> &PassReport {
        let location = self.tree.location();
        info!(location = %location, "Session starting");
        self.watcher.start(&mut self.timers, &location);
        self.run(Trigger::Initial)
    }

    pub fn stop(&mut self) {
        self.watcher.stop(&mut self.timers);
    }

    /// Hand one mutation batch to the watcher
    pub fn observe(&mut self, batch: &[MutationRecord]) -> bool {
        self.watcher.observe(&self.tree, &mut self.timers, batch)
    }

    /// Advance the clock by `ms`, running a pass for every trigger that fires
    ///
    /// Returns the number of passes run.
    pub fn advance(&mut self, ms: u64) -> usize {
        let until = self.timers.now().saturating_add(ms);
        let mut ran = 0;
        while let Some((handle, task)) = self.timers.pop_due(until) {
            let location = self.tree.location();
            if let Some(trigger) = self.watcher.on_timer(&mut self.timers, handle, task, &location) {
                self.run(trigger);
                ran += 1;
            }
        }
        self.timers.set_now(until);
        debug!(now = until, ran, "Clock advanced");
        ran
    }

    // === Setters: commit, then re-apply immediately ===

    pub fn set_leaf(&mut self, path: &str, value: Value) -> Result<(), ConfigError> {
        self.orchestrator.set_leaf(path, value)?;
        self.run(Trigger::SettingsChanged);
        Ok(())
    }

    pub fn reset_to_defaults(&mut self) {
        self.orchestrator.reset_to_defaults();
        self.run(Trigger::SettingsChanged);
    }

    pub fn import_from_text(&mut self, text: &str) -> Result<(), ConfigError> {
        self.orchestrator.import_from_text(text)?;
        self.run(Trigger::SettingsChanged);
        Ok(())
    }

    fn run(&mut self, trigger: Trigger) -> &PassReport {
        let report = self.orchestrator.run_pass(&mut self.tree, trigger);
        self.passes += 1;
        self.last_report.insert(report)
    }

    pub fn passes(&self) -> usize {
        self.passes
    }

    pub fn last_report(&self) -> Option<&PassReport> {
        self.last_report.as_ref()
    }

    pub fn state(&self) -> WatchState {
        self.watcher.state()
    }

    pub fn now(&self) -> u64 {
        self.timers.now()
    }

    pub fn tree(&self) -> &T {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut T {
        &mut self.tree
    }

    pub fn orchestrator(&self) -> &Orchestrator<S> {
        &self.orchestrator
    }

    pub fn orchestrator_mut(&mut self) -> &mut Orchestrator<S> {
        &mut self.orchestrator
    }

    pub fn into_tree(self) -> T {
        self.tree
    }
}

impl<S: Storage> Session<Document, S> {
    /// Drain the document's mutation log into the watcher
    pub fn pump(&mut self) -> bool {
        let batch = self.tree.take_mutations();
        if batch.is_empty() {
            return false;
        }
        self.observe(&batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MemoryStorage;
    use crate::constants::markers::HIDDEN_CLASS;
    use crate::tree::Document;
    use serde_json::json;

    fn live_session(timing: Timing) -> Session<Document, MemoryStorage> {
        let doc = Document::new("https://live.douyin.com/42", "body");
        let orchestrator = Orchestrator::new(MemoryStorage::new()).unwrap();
        Session::with_timing(doc, orchestrator, timing)
    }

    fn quiet() -> Timing {
        Timing {
            bootstrap_delays_ms: Vec::new(),
            location_poll_ms: 60_000,
            ..Timing::default()
        }
    }

    #[test]
    fn test_debounce_collapses_into_one_pass() {
        let mut session = live_session(quiet());
        session.start();
        assert_eq!(session.passes(), 1);

        let root = session.tree().root();
        for _ in 0..4 {
            session
                .tree_mut()
                .append_element(root, "div", &[("class", "live-room-item")])
                .unwrap();
            let batch = session.tree_mut().take_mutations();
            assert!(session.observe(&batch));
            assert_eq!(session.advance(100), 0);
        }
        assert_eq!(session.state(), WatchState::Debouncing);
        assert_eq!(session.advance(300), 1);
        assert_eq!(session.passes(), 2);
        assert_eq!(session.last_report().unwrap().trigger, Trigger::Mutation);
    }

    #[test]
    fn test_insignificant_batch_runs_nothing() {
        let mut session = live_session(quiet());
        session.start();
        let root = session.tree().root();
        session.tree_mut().append_element(root, "span", &[]).unwrap();
        let batch = session.tree_mut().take_mutations();
        assert!(!session.observe(&batch));
        assert_eq!(session.advance(1000), 0);
    }

    #[test]
    fn test_bootstrap_schedule_runs_three_passes() {
        let mut session = live_session(Timing {
            location_poll_ms: 60_000,
            ..Timing::default()
        });
        session.start();
        assert_eq!(session.advance(5000), 3);
        assert_eq!(session.passes(), 4);
        assert_eq!(session.last_report().unwrap().trigger, Trigger::Bootstrap(2));
    }

    #[test]
    fn test_late_content_caught_by_bootstrap() {
        let mut session = live_session(Timing {
            location_poll_ms: 60_000,
            ..Timing::default()
        });
        session.set_leaf("liveUI.showGifts", json!(false)).unwrap();
        session.start();

        // content inserted without a significant mutation signature
        let root = session.tree().root();
        let gift = session
            .tree_mut()
            .append_element(root, "div", &[("class", "gift-tray")])
            .unwrap();
        session.tree_mut().take_mutations();
        assert!(!session.tree().has_class(gift, HIDDEN_CLASS).unwrap());

        session.advance(500);
        assert!(session.tree().has_class(gift, HIDDEN_CLASS).unwrap());
    }

    #[test]
    fn test_setter_reapplies_immediately() {
        let mut session = live_session(quiet());
        let root = session.tree().root();
        let gift = session
            .tree_mut()
            .append_element(root, "div", &[("class", "gift-tray")])
            .unwrap();
        session.start();

        session.set_leaf("liveUI.showGifts", json!(false)).unwrap();
        assert_eq!(session.last_report().unwrap().trigger, Trigger::SettingsChanged);
        assert!(session.tree().has_class(gift, HIDDEN_CLASS).unwrap());

        session.reset_to_defaults();
        assert!(!session.tree().has_class(gift, HIDDEN_CLASS).unwrap());
    }

    #[test]
    fn test_pump_drains_own_writes_and_settles() {
        let mut session = live_session(quiet());
        let root = session.tree().root();
        let tray = session
            .tree_mut()
            .append_element(root, "div", &[("class", "live-gift-tray")])
            .unwrap();
        session.start();
        assert!(session.pump());
        assert_eq!(session.advance(300), 1);

        session.set_leaf("liveUI.showGifts", json!(false)).unwrap();
        assert!(session.tree().has_class(tray, HIDDEN_CLASS).unwrap());
        assert!(session.pump());
        assert!(session.tree_mut().take_mutations().is_empty());

        // the follow-up pass is a no-op, so nothing is left to observe
        assert_eq!(session.advance(300), 1);
        assert!(!session.pump());
        assert_eq!(session.advance(1000), 0);
        assert_eq!(session.state(), WatchState::Observing);
    }

    #[test]
    fn test_navigation_reapplies() {
        let mut session = live_session(Timing {
            bootstrap_delays_ms: Vec::new(),
            ..Timing::default()
        });
        session.start();
        session.tree_mut().set_location("https://www.douyin.com/video/1");
        assert_eq!(session.advance(1000), 0);
        assert_eq!(session.advance(300), 1);
        assert_eq!(session.last_report().unwrap().trigger, Trigger::Navigation);
    }
}
