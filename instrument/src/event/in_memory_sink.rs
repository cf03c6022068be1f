use super::{CallEvent, EventSink, ReturnEvent};
use std::sync::Mutex;

#[derive(Default)]
pub struct MemSinkState {
    pub calls: Vec<CallEvent>,
    pub returns: Vec<ReturnEvent>,
    pub messages: Vec<(String, String, bool)>,
}

/// for tests where we want to inspect the emitted events
#[derive(Default)]
pub struct InMemorySink {
    pub state: Mutex<MemSinkState>,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn call_count(&self) -> usize {
        self.state.lock().unwrap().calls.len()
    }

    pub fn return_count(&self) -> usize {
        self.state.lock().unwrap().returns.len()
    }

    pub fn message_count(&self) -> usize {
        self.state.lock().unwrap().messages.len()
    }

    pub fn last_chain(&self) -> Option<(Vec<String>, bool)> {
        self.state
            .lock()
            .unwrap()
            .calls
            .last()
            .map(|e| (e.caller_chain.clone(), e.chain_found))
    }
}

impl EventSink for InMemorySink {
    fn on_call(&self, event: &CallEvent) {
        self.state.lock().unwrap().calls.push(event.clone());
    }

    fn on_return(&self, event: &ReturnEvent) {
        self.state.lock().unwrap().returns.push(event.clone());
    }

    fn on_message(&self, origin: &str, text: &str, indented: bool) {
        self.state
            .lock()
            .unwrap()
            .messages
            .push((origin.to_string(), text.to_string(), indented));
    }
}
