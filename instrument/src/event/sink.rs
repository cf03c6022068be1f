use super::{CallEvent, ReturnEvent};
use std::sync::Arc;

pub type SharedEventSink = Arc<dyn EventSink>;

/// Interface the wrapper uses to send out call instrumentation.
///
/// Emission is fire-and-forget and synchronous; the engine's contract is
/// the event data, not any textual layout a sink chooses.
pub trait EventSink: Send + Sync {
    fn on_call(&self, event: &CallEvent);
    fn on_return(&self, event: &ReturnEvent);
    /// Auxiliary message attributed to an instrumented call. `indented`
    /// is false when calls are muted.
    fn on_message(&self, origin: &str, text: &str, indented: bool);
}

/// For callables whose output can be dropped.
pub struct NullEventSink {}

impl EventSink for NullEventSink {
    fn on_call(&self, _: &CallEvent) {}
    fn on_return(&self, _: &ReturnEvent) {}
    fn on_message(&self, _: &str, _: &str, _: bool) {}
}
