//! Per-callable call history and derived statistics

use crate::value::Value;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;

/// Immutable snapshot of one completed invocation.
#[derive(Debug, Clone, Serialize)]
pub struct CallRecord {
    /// Monotonically increasing, scoped to the wrapped callable, shared
    /// across recursive invocations, never reused.
    pub call_num: u64,
    /// Explicitly bound arguments in declaration order.
    pub args: Vec<(String, Value)>,
    /// Variadic keyword arguments.
    pub leftover: Vec<(String, Value)>,
    pub retval: Value,
    pub elapsed_secs: f64,
    pub process_secs: f64,
    pub timestamp: DateTime<Utc>,
    /// Nearest intervening caller first.
    pub caller_chain: Vec<String>,
    /// Display name of the callable, prefix included.
    pub display_name: String,
}

/// Aggregates over a callable's lifetime and its retained records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CallStats {
    /// Every call made, bypassed and muted calls included.
    pub num_calls_total: u64,
    /// Calls that produced a history record.
    pub num_calls_logged: u64,
    /// Cumulative wall seconds over retained records.
    pub elapsed_secs_logged: f64,
    /// Cumulative CPU seconds over retained records.
    pub process_secs_logged: f64,
}

/// Append-only sequence of call records, optionally capacity-bounded with
/// FIFO eviction. Owned exclusively by one wrapper and mutated only by it
/// on each completed call.
#[derive(Debug)]
pub struct HistoryStore {
    records: VecDeque<CallRecord>,
    capacity: Option<usize>,
    num_calls_total: u64,
    num_calls_logged: u64,
}

impl HistoryStore {
    pub fn new(capacity: Option<usize>) -> Self {
        Self {
            records: VecDeque::new(),
            capacity,
            num_calls_total: 0,
            num_calls_logged: 0,
        }
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Counts a call toward `num_calls_total` without recording it.
    pub fn note_call(&mut self) {
        self.num_calls_total += 1;
    }

    pub fn record(&mut self, record: CallRecord) {
        if let Some(cap) = self.capacity {
            if cap == 0 {
                return;
            }
            while self.records.len() >= cap {
                self.records.pop_front();
            }
        }
        self.records.push_back(record);
        self.num_calls_logged += 1;
    }

    /// Empties the store, optionally replacing the capacity.
    pub fn clear(&mut self, new_capacity: Option<Option<usize>>) {
        self.records.clear();
        if let Some(capacity) = new_capacity {
            self.capacity = capacity;
        }
    }

    pub fn records(&self) -> impl Iterator<Item = &CallRecord> {
        self.records.iter()
    }

    pub fn last(&self) -> Option<&CallRecord> {
        self.records.back()
    }

    pub fn stats(&self) -> CallStats {
        CallStats {
            num_calls_total: self.num_calls_total,
            num_calls_logged: self.num_calls_logged,
            elapsed_secs_logged: self.records.iter().map(|r| r.elapsed_secs).sum(),
            process_secs_logged: self.records.iter().map(|r| r.process_secs).sum(),
        }
    }

    /// Delimited view of the retained records: one header row of field
    /// names, one row per record. The caller chain renders as a list
    /// literal; argument columns follow the supplied parameter names, and
    /// the variadic-keyword column (when declared) renders the leftover
    /// mapping as a literal.
    pub fn as_delimited(&self, sep: &str, param_names: &[String], varkw: Option<&str>) -> String {
        let mut out = String::new();
        out.push_str("call_num");
        for name in param_names {
            out.push_str(sep);
            out.push_str(name);
        }
        if let Some(name) = varkw {
            out.push_str(sep);
            out.push_str(name);
        }
        for field in [
            "retval",
            "elapsed_secs",
            "process_secs",
            "timestamp",
            "function",
            "caller_chain",
        ] {
            out.push_str(sep);
            out.push_str(field);
        }
        out.push('\n');
        for record in &self.records {
            out.push_str(&record.call_num.to_string());
            for name in param_names {
                out.push_str(sep);
                let value = record
                    .args
                    .iter()
                    .find(|(n, _)| n == name)
                    .map(|(_, v)| v.to_string())
                    .unwrap_or_default();
                out.push_str(&value);
            }
            if varkw.is_some() {
                out.push_str(sep);
                out.push_str(&render_leftover(&record.leftover));
            }
            out.push_str(sep);
            out.push_str(&record.retval.to_string());
            out.push_str(sep);
            out.push_str(&record.elapsed_secs.to_string());
            out.push_str(sep);
            out.push_str(&record.process_secs.to_string());
            out.push_str(sep);
            out.push_str(&record.timestamp.to_rfc3339());
            out.push_str(sep);
            out.push_str(&record.display_name);
            out.push_str(sep);
            out.push_str(&render_chain(&record.caller_chain));
            out.push('\n');
        }
        out
    }
}

fn render_chain(chain: &[String]) -> String {
    let quoted: Vec<String> = chain.iter().map(|c| format!("'{c}'")).collect();
    format!("[{}]", quoted.join(", "))
}

fn render_leftover(leftover: &[(String, Value)]) -> String {
    if leftover.is_empty() {
        return String::from("{}");
    }
    let pairs: Vec<String> = leftover
        .iter()
        .map(|(n, v)| format!("'{n}': {v}"))
        .collect();
    format!("{{{}}}", pairs.join(", "))
}
