//! Manually advanced scheduler
//!
//! A deterministic, cycle-counting scheduler for tests and for hosts
//! without their own event queue. Clones share one queue, so a test
//! can keep a handle while the device owns another:
//!
//! ```
//! use exi_modem::adapters::ManualScheduler;
//! use exi_modem::ports::Scheduler;
//!
//! let sched = ManualScheduler::new();
//! let mut handle = sched.clone(); // goes into the device
//! let ev = handle.register_event("ModemConnect");
//! handle.schedule(500_000, ev);
//! assert_eq!(sched.advance(500_000), vec![ev]);
//! ```

use std::cell::RefCell;
use std::rc::Rc;

use crate::ports::{EventId, Scheduler};

#[derive(Default)]
struct Inner {
    now: u64,
    names: Vec<String>,
    /// (due cycle, event) — kept unsorted, drained in due order
    queue: Vec<(u64, EventId)>,
}

/// Shared-queue manual scheduler. Not thread-safe; the device is
/// single-threaded by contract.
#[derive(Clone, Default)]
pub struct ManualScheduler {
    inner: Rc<RefCell<Inner>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current cycle count.
    pub fn now(&self) -> u64 {
        self.inner.borrow().now
    }

    /// Number of pending occurrences of `id`.
    pub fn pending(&self, id: EventId) -> usize {
        self.inner
            .borrow()
            .queue
            .iter()
            .filter(|(_, e)| *e == id)
            .count()
    }

    /// Registered name of `id`, for assertions.
    pub fn event_name(&self, id: EventId) -> Option<String> {
        self.inner.borrow().names.get(id.0 as usize).cloned()
    }

    /// Advance the clock by `cycles` and return every event that came
    /// due, in due order.
    pub fn advance(&self, cycles: u64) -> Vec<EventId> {
        let mut inner = self.inner.borrow_mut();
        inner.now += cycles;
        let now = inner.now;

        let mut due: Vec<(u64, EventId)> =
            inner.queue.iter().copied().filter(|(t, _)| *t <= now).collect();
        inner.queue.retain(|(t, _)| *t > now);
        due.sort_by_key(|(t, _)| *t);
        due.into_iter().map(|(_, e)| e).collect()
    }
}

impl Scheduler for ManualScheduler {
    fn register_event(&mut self, name: &str) -> EventId {
        let mut inner = self.inner.borrow_mut();
        let id = EventId(inner.names.len() as u32);
        inner.names.push(name.to_string());
        id
    }

    fn schedule(&mut self, cycles_from_now: u64, id: EventId) {
        let mut inner = self.inner.borrow_mut();
        let due = inner.now + cycles_from_now;
        inner.queue.push((due, id));
    }

    fn remove_all(&mut self, id: EventId) {
        self.inner.borrow_mut().queue.retain(|(_, e)| *e != id);
    }
}
