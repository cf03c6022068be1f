//! Structured call/return events and the sink interface

mod sink;
pub use sink::*;

pub mod in_memory_sink;
pub use in_memory_sink::InMemorySink;

use crate::value::Value;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

/// Longest rendering of a return value carried in an event.
pub const MAX_RETVAL_DISPLAY: usize = 77;

/// Emitted before the wrapped callable is invoked.
#[derive(Debug, Clone, Serialize)]
pub struct CallEvent {
    pub display_name: Arc<str>,
    pub call_num: u64,
    pub show_call_num: bool,
    /// Explicit positional arguments under their declared names.
    pub args: Vec<(String, Value)>,
    /// Explicit keyword arguments matching declared parameters.
    pub keyword_args: Vec<(String, Value)>,
    /// Variadic keyword arguments matching no declared parameter.
    pub leftover_args: Vec<(String, Value)>,
    pub args_sep: String,
    pub show_args: bool,
    pub caller_chain: Vec<String>,
    pub chain_found: bool,
    pub timestamp: DateTime<Utc>,
}

/// Emitted after the wrapped callable returns. Never emitted when the
/// callable fails; the error propagates instead.
#[derive(Debug, Clone, Serialize)]
pub struct ReturnEvent {
    pub display_name: Arc<str>,
    pub call_num: u64,
    pub show_call_num: bool,
    /// Truncated rendering of the return value, when `log_retval` is on.
    pub retval: Option<String>,
    pub elapsed_secs: Option<f64>,
    pub process_secs: Option<f64>,
    pub caller_chain: Vec<String>,
    pub chain_found: bool,
    pub timestamp: DateTime<Utc>,
}

/// Renders a return value for display, truncated to
/// [`MAX_RETVAL_DISPLAY`] characters.
pub fn render_retval(value: &Value) -> String {
    let mut text = value.to_string();
    if text.chars().count() > MAX_RETVAL_DISPLAY {
        text = text.chars().take(MAX_RETVAL_DISPLAY).collect::<String>() + "...";
    }
    text
}
