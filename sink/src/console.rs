use callscope_instrument::event::{CallEvent, EventSink, ReturnEvent};
use callscope_instrument::value::Value;

// Based on simple logger
pub struct ConsoleSink {
    /// Control how timestamps are displayed.
    ///
    /// This field is only available if the `timestamps` feature is enabled.
    #[cfg(feature = "timestamps")]
    timestamps: bool,
}

impl ConsoleSink {
    pub fn new() -> Self {
        Self {
            #[cfg(feature = "timestamps")]
            timestamps: false,
        }
    }

    #[cfg(feature = "timestamps")]
    pub fn with_timestamps(mut self) -> Self {
        self.timestamps = true;
        self
    }

    fn stamp(&self, event_time: chrono::DateTime<chrono::Utc>) -> String {
        #[cfg(feature = "timestamps")]
        if self.timestamps {
            return format!("{} ", event_time.to_rfc3339());
        }
        let _ = event_time;
        String::new()
    }

    fn emit(&self, message: &str) {
        #[cfg(not(feature = "stderr"))]
        println!("{message}");

        #[cfg(feature = "stderr")]
        eprintln!("{message}");
    }
}

impl Default for ConsoleSink {
    fn default() -> Self {
        Self::new()
    }
}

fn render_pairs(pairs: &[(String, Value)], sep: &str) -> String {
    pairs
        .iter()
        .map(|(name, value)| format!("{name}={value}"))
        .collect::<Vec<String>>()
        .join(sep)
}

fn render_chain(chain: &[String]) -> String {
    chain.join(" <== ")
}

impl EventSink for ConsoleSink {
    fn on_call(&self, event: &CallEvent) {
        let number = if event.show_call_num {
            format!(" [{}]", event.call_num)
        } else {
            String::new()
        };
        let caller = if event.caller_chain.is_empty() {
            String::new()
        } else {
            format!(" <== called by {}", render_chain(&event.caller_chain))
        };
        self.emit(&format!(
            "{}{}{number}{caller}",
            self.stamp(event.timestamp),
            event.display_name,
        ));
        if event.show_args {
            let mut parts = Vec::new();
            let positional = render_pairs(&event.args, &event.args_sep);
            if !positional.is_empty() {
                parts.push(positional);
            }
            if !event.leftover_args.is_empty() {
                parts.push(format!(
                    "[kwargs] {}",
                    render_pairs(&event.leftover_args, &event.args_sep)
                ));
            }
            if !parts.is_empty() {
                self.emit(&format!("    arguments: {}", parts.join(&event.args_sep)));
            }
        }
    }

    fn on_return(&self, event: &ReturnEvent) {
        if let Some(retval) = &event.retval {
            self.emit(&format!("    {} return value: {retval}", event.display_name));
        }
        if let Some(elapsed) = event.elapsed_secs {
            let process = event.process_secs.unwrap_or(0.0);
            self.emit(&format!(
                "    elapsed time: {elapsed:.6} [secs], process time: {process:.6} [secs]"
            ));
        }
        let number = if event.show_call_num {
            format!(" [{}]", event.call_num)
        } else {
            String::new()
        };
        let caller = if event.caller_chain.is_empty() {
            String::new()
        } else {
            format!(" ==> returning to {}", render_chain(&event.caller_chain))
        };
        self.emit(&format!(
            "{}{}{number}{caller}",
            self.stamp(event.timestamp),
            event.display_name,
        ));
    }

    fn on_message(&self, origin: &str, text: &str, indented: bool) {
        if indented {
            self.emit(&format!("    {origin}: {text}"));
        } else {
            self.emit(&format!("{origin}: {text}"));
        }
    }
}
