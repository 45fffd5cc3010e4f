use crate::common::ids::JobId;
use crate::engine::events::EngineEvent;

/// Side-effect sink of the reactor. The reactor never talks to the outside
/// world directly; it records suspend-flag writes and events here and the
/// engine process forwards them (suspend writes go through the bridge with
/// at-least-once delivery).
pub trait Comm {
    fn set_suspended(&mut self, job: JobId, suspended: bool);
    fn emit(&mut self, event: EngineEvent);
}

/// Buffering `Comm` used by the engine process; drained after every batch
/// of reactor calls.
#[derive(Default)]
pub struct CommBuffer {
    suspend_writes: Vec<(JobId, bool)>,
    events: Vec<EngineEvent>,
}

impl CommBuffer {
    pub fn take_suspend_writes(&mut self) -> Vec<(JobId, bool)> {
        std::mem::take(&mut self.suspend_writes)
    }

    pub fn take_events(&mut self) -> Vec<EngineEvent> {
        std::mem::take(&mut self.events)
    }
}

impl Comm for CommBuffer {
    fn set_suspended(&mut self, job: JobId, suspended: bool) {
        self.suspend_writes.push((job, suspended));
    }

    fn emit(&mut self, event: EngineEvent) {
        self.events.push(event);
    }
}
