//! Cooperative scheduling port.
//!
//! Effects that originate off the sample-processing thread (calibration
//! notices, relayed haptics and actions) are posted here instead of being
//! run inline. `ManualScheduler` runs due tasks in (due time, post order)
//! whenever its owner calls `run_due`, so ordering is preserved and tests
//! stay deterministic.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::clock::Clock;
use crate::effects::{Action, ActionDispatcher, HapticCue, HapticPort};

/// Unit of deferred work.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Injectable scheduling port.
pub trait Scheduler: Send + Sync {
    /// Run `task` after `delay_ms` milliseconds.
    fn post_delayed(&self, delay_ms: u64, task: Task);

    /// Run `task` as soon as possible, after anything already due.
    fn post(&self, task: Task) {
        self.post_delayed(0, task);
    }
}

struct Pending {
    due_ms: u64,
    seq: u64,
    task: Task,
}

/// Queue-backed scheduler driven by an injected clock.
pub struct ManualScheduler {
    clock: Arc<dyn Clock>,
    queue: Mutex<Vec<Pending>>,
    seq: AtomicU64,
}

impl ManualScheduler {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            queue: Mutex::new(Vec::new()),
            seq: AtomicU64::new(0),
        }
    }

    /// Number of tasks not yet run.
    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }

    /// Run every task due at the current clock time. Tasks posted while
    /// running are picked up in the same call if already due. Returns the
    /// number of tasks run.
    pub fn run_due(&self) -> usize {
        let mut ran = 0;
        while let Some(task) = self.pop_due(self.clock.now_ms()) {
            task();
            ran += 1;
        }
        ran
    }

    fn pop_due(&self, now_ms: u64) -> Option<Task> {
        let mut queue = self.queue.lock();
        let idx = queue
            .iter()
            .enumerate()
            .filter(|(_, p)| p.due_ms <= now_ms)
            .min_by_key(|(_, p)| (p.due_ms, p.seq))
            .map(|(i, _)| i)?;
        Some(queue.swap_remove(idx).task)
    }
}

impl Scheduler for ManualScheduler {
    fn post_delayed(&self, delay_ms: u64, task: Task) {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let due_ms = self.clock.now_ms().saturating_add(delay_ms);
        self.queue.lock().push(Pending { due_ms, seq, task });
    }
}

// ── Effect relay ───────────────────────────────────────────

/// Posts a frame's haptic cues and action to the scheduler, cues first,
/// so delivery happens on the scheduler's thread in frame order.
#[derive(Clone)]
pub struct EffectRelay {
    scheduler: Arc<dyn Scheduler>,
    haptics: Arc<dyn HapticPort>,
    dispatcher: Arc<dyn ActionDispatcher>,
}

impl EffectRelay {
    pub fn new(
        scheduler: Arc<dyn Scheduler>,
        haptics: Arc<dyn HapticPort>,
        dispatcher: Arc<dyn ActionDispatcher>,
    ) -> Self {
        Self {
            scheduler,
            haptics,
            dispatcher,
        }
    }

    pub fn relay(&self, cues: &[HapticCue], action: Option<&Action>) {
        for cue in cues {
            let haptics = Arc::clone(&self.haptics);
            let cue = cue.clone();
            self.scheduler.post(Box::new(move || haptics.play(&cue)));
        }
        if let Some(action) = action {
            let dispatcher = Arc::clone(&self.dispatcher);
            let action = action.clone();
            self.scheduler
                .post(Box::new(move || dispatcher.dispatch(&action)));
        }
    }
}
