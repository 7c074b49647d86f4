//! Host scheduler port
//!
//! Thin seam over the host emulator's cycle-based timer. The device
//! registers its named events once at construction and later schedules
//! them relative to "now". When an event comes due, the host calls
//! `ModemAdapter::dispatch_event` with the id it handed out here — the
//! id is the opaque token that lets a plain-function host timer find
//! its way back to the device without any process-wide state.

/// Opaque handle for a registered scheduler event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventId(pub u32);

/// Trait for the host's coarse-time scheduler.
pub trait Scheduler {
    /// Register a named event. Called once per event at device setup.
    fn register_event(&mut self, name: &str) -> EventId;

    /// Arrange for the event to fire `cycles_from_now` host cycles out.
    fn schedule(&mut self, cycles_from_now: u64, id: EventId);

    /// Drop every pending occurrence of the event.
    fn remove_all(&mut self, id: EventId);
}
