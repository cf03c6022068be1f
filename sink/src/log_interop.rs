//! Forwards call events to the `log` facade, so applications that already
//! route `log` records somewhere get call instrumentation in the same
//! stream.

use callscope_instrument::event::{CallEvent, EventSink, ReturnEvent};

pub struct LogSink {
    target: &'static str,
    level: log::Level,
}

impl LogSink {
    pub fn new() -> Self {
        Self {
            target: "callscope",
            level: log::Level::Info,
        }
    }

    pub fn with_target(mut self, target: &'static str) -> Self {
        self.target = target;
        self
    }

    pub fn with_level(mut self, level: log::Level) -> Self {
        self.level = level;
        self
    }
}

impl Default for LogSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for LogSink {
    fn on_call(&self, event: &CallEvent) {
        let args = event
            .args
            .iter()
            .chain(event.leftover_args.iter())
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<String>>()
            .join(&event.args_sep);
        log::log!(target: self.target, self.level,
            "{} called (call {}), args: [{}], callers: {:?}",
            event.display_name, event.call_num, args, event.caller_chain);
    }

    fn on_return(&self, event: &ReturnEvent) {
        match (&event.retval, event.elapsed_secs) {
            (Some(retval), Some(elapsed)) => {
                log::log!(target: self.target, self.level,
                    "{} returned {retval} after {elapsed:.6}s", event.display_name);
            }
            (Some(retval), None) => {
                log::log!(target: self.target, self.level,
                    "{} returned {retval}", event.display_name);
            }
            (None, Some(elapsed)) => {
                log::log!(target: self.target, self.level,
                    "{} returned after {elapsed:.6}s", event.display_name);
            }
            (None, None) => {
                log::log!(target: self.target, self.level,
                    "{} returned", event.display_name);
            }
        }
    }

    fn on_message(&self, origin: &str, text: &str, _indented: bool) {
        log::log!(target: self.target, self.level, "{origin}: {text}");
    }
}
