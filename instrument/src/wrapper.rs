//! The instrumentation wrapper
//!
//! `Instrumented` owns the wrapped callable together with its settings
//! mapping, history store and call counter, and runs the full per-call
//! cycle on every invocation: resolve settings, push a context frame,
//! capture the caller chain, emit the entry event, invoke, emit the exit
//! event and record history. Errors from the wrapped callable propagate
//! unchanged; the wrapper never catches, wraps or annotates them.

use crate::callstack::{self, FrameDesc};
use crate::errors::Result;
use crate::event::{
    render_retval, CallEvent, InMemorySink, NullEventSink, ReturnEvent, SharedEventSink,
};
use crate::history::{CallRecord, CallStats, HistoryStore};
use crate::levels::{effective_mute, MuteLevel};
use crate::params::{BoundArgs, CallArgs, ParamKind, ParamSpec};
use crate::settings::{
    ensure_builtin_schemas, schema, SettingsMapping, TaggedValue, CALL_LOGGER, CALL_RECORDER,
};
use crate::value::Value;
use chrono::Utc;
use cpu_time::ProcessTime;
use std::cell::{Cell, Ref, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};
use std::sync::Arc;
use std::time::Instant;

/// The wrapped callable: type-erased, invoked with its bound arguments.
pub type CallFn = Box<dyn Fn(&BoundArgs) -> anyhow::Result<Value>>;

/// An instrumented callable. Handles are `Rc`; the engine is
/// single-threaded and synchronous, recursion being the only source of
/// re-entrancy. Per-call state lives on the stack of each `call`
/// invocation; only the call counter and the history store are shared
/// between re-entrant calls.
pub struct Instrumented {
    name: String,
    display_name: Arc<str>,
    emits: bool,
    callable: CallFn,
    params: Vec<ParamSpec>,
    settings: RefCell<SettingsMapping>,
    history: RefCell<HistoryStore>,
    call_counter: Cell<u64>,
    sinks: HashMap<String, SharedEventSink>,
}

/// Builder for instrumented callables, full or history-only.
pub struct InstrumentBuilder {
    name: String,
    class_id: &'static str,
    emits: bool,
    params: Vec<ParamSpec>,
    settings: Vec<(String, Value)>,
    source: Option<HashMap<String, String>>,
    sinks: HashMap<String, SharedEventSink>,
}

impl InstrumentBuilder {
    /// Full instrumentation (`call_logger` decorator class).
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            class_id: CALL_LOGGER,
            emits: true,
            params: Vec::new(),
            settings: Vec::new(),
            source: None,
            sinks: HashMap::from([(
                String::from("null"),
                Arc::new(NullEventSink {}) as SharedEventSink,
            )]),
        }
    }

    /// History-only variant (`call_recorder` decorator class): records
    /// every call, emits nothing.
    pub fn recorder(name: impl Into<String>) -> Self {
        let mut builder = Self::new(name);
        builder.class_id = CALL_RECORDER;
        builder.emits = false;
        builder
    }

    pub fn param(mut self, param: ParamSpec) -> Self {
        self.params.push(param);
        self
    }

    pub fn params(mut self, params: Vec<ParamSpec>) -> Self {
        self.params.extend(params);
        self
    }

    pub fn setting(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.settings.push((name.into(), value.into()));
        self
    }

    /// Bulk configuration source applied before explicit settings.
    pub fn settings_source(mut self, source: HashMap<String, String>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn sink(mut self, name: impl Into<String>, sink: SharedEventSink) -> Self {
        self.sinks.insert(name.into(), sink);
        self
    }

    /// Convenience for tests and inspection: registers an in-memory sink
    /// under `"console"` and returns it alongside the builder.
    pub fn with_memory_sink(self) -> (Self, Arc<InMemorySink>) {
        let sink = Arc::new(InMemorySink::new());
        (self.sink("console", sink.clone()), sink)
    }

    pub fn build<F>(self, callable: F) -> Result<Rc<Instrumented>>
    where
        F: Fn(&BoundArgs) -> anyhow::Result<Value> + 'static,
    {
        self.build_recursive(|_| Box::new(callable))
    }

    /// Builds a wrapper whose callable may re-enter it, e.g. for recursive
    /// functions: the closure receives a weak handle to the wrapper under
    /// construction.
    pub fn build_recursive<F>(self, make: F) -> Result<Rc<Instrumented>>
    where
        F: FnOnce(Weak<Instrumented>) -> CallFn,
    {
        ensure_builtin_schemas();
        let mut mapping = SettingsMapping::new(schema(self.class_id));
        if let Some(source) = &self.source {
            mapping.apply_source(source);
        }
        for (name, value) in self.settings {
            mapping.set(&name, value)?;
        }
        let prefix = mapping
            .get("prefix")
            .and_then(|t| t.value.as_str().map(str::to_string))
            .unwrap_or_default();
        let display_name: Arc<str> = Arc::from(format!("{prefix}{}", self.name));
        let capacity = match mapping.get("max_history").and_then(|t| t.value.as_int()) {
            Some(n) if n > 0 => Some(n as usize),
            _ => None,
        };
        let name = self.name;
        let emits = self.emits;
        let params = self.params;
        let sinks = self.sinks;
        Ok(Rc::new_cyclic(|weak| Instrumented {
            name,
            display_name,
            emits,
            callable: make(weak.clone()),
            params,
            settings: RefCell::new(mapping),
            history: RefCell::new(HistoryStore::new(capacity)),
            call_counter: Cell::new(0),
            sinks,
        }))
    }
}

/// Per-call emission policy, resolved fresh on every invocation.
struct EmitPolicy {
    mute: MuteLevel,
    args_sep: String,
    log_args: bool,
    log_retval: bool,
    log_exit: bool,
    log_elapsed: bool,
    log_call_numbers: bool,
    sink_name: String,
}

impl EmitPolicy {
    fn resolve(settings: &SettingsMapping, bound: &BoundArgs, params: &[ParamSpec]) -> Self {
        let flag = |name: &str, default: bool| {
            settings.resolve(name, bound, params).as_bool().unwrap_or(default)
        };
        Self {
            mute: MuteLevel::from_int(
                settings.resolve("mute", bound, params).as_int().unwrap_or(0),
            ),
            args_sep: settings
                .resolve("args_sep", bound, params)
                .as_str()
                .unwrap_or(", ")
                .to_string(),
            log_args: flag("log_args", true),
            log_retval: flag("log_retval", false),
            log_exit: flag("log_exit", true),
            log_elapsed: flag("log_elapsed", false),
            log_call_numbers: flag("log_call_numbers", false),
            sink_name: settings
                .resolve("sink", bound, params)
                .as_str()
                .unwrap_or("null")
                .to_string(),
        }
    }

    fn silent() -> Self {
        Self {
            mute: MuteLevel::All,
            args_sep: String::from(", "),
            log_args: false,
            log_retval: false,
            log_exit: false,
            log_elapsed: false,
            log_call_numbers: false,
            sink_name: String::from("null"),
        }
    }
}

impl std::fmt::Debug for Instrumented {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instrumented")
            .field("name", &self.name)
            .field("display_name", &self.display_name)
            .field("emits", &self.emits)
            .field("calls", &self.call_counter.get())
            .finish_non_exhaustive()
    }
}

impl Instrumented {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Prefixed display name, as it appears in caller chains and history.
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn params(&self) -> &[ParamSpec] {
        &self.params
    }

    pub fn setting(&self, name: &str) -> Option<TaggedValue> {
        self.settings.borrow().get(name).cloned()
    }

    /// Updates one setting; non-mutable settings that are already set are
    /// silently left alone.
    pub fn set_setting(&self, name: &str, value: impl Into<Value>) -> Result<()> {
        self.settings.borrow_mut().set(name, value.into())
    }

    pub fn apply_settings_source(&self, source: &HashMap<String, String>) {
        self.settings.borrow_mut().apply_source(source);
    }

    pub fn stats(&self) -> CallStats {
        self.history.borrow().stats()
    }

    pub fn history(&self) -> Ref<'_, HistoryStore> {
        self.history.borrow()
    }

    pub fn clear_history(&self, new_capacity: Option<Option<usize>>) {
        self.history.borrow_mut().clear(new_capacity);
    }

    /// Delimited view of the retained history (header row plus one row per
    /// record).
    pub fn history_delimited(&self, sep: &str) -> String {
        let names: Vec<String> = self
            .params
            .iter()
            .filter(|p| p.kind != ParamKind::VarKeyword)
            .map(|p| p.name.clone())
            .collect();
        let varkw = self
            .params
            .iter()
            .find(|p| p.kind == ParamKind::VarKeyword)
            .map(|p| p.name.as_str());
        self.history.borrow().as_delimited(sep, &names, varkw)
    }

    /// True when the `enabled` setting is a direct falsy value, i.e. the
    /// wrapper bypasses every call unconditionally.
    pub fn is_bypassed(&self) -> bool {
        self.settings
            .borrow()
            .get("enabled")
            .is_some_and(|t| !t.indirect && t.value.is_falsy())
    }

    pub(crate) fn into_parts(self) -> (CallFn, Vec<ParamSpec>) {
        (self.callable, self.params)
    }

    fn sink_for(&self, name: &str) -> SharedEventSink {
        if let Some(sink) = self.sinks.get(name) {
            return sink.clone();
        }
        // unknown sink names degrade silently
        lazy_static::lazy_static! {
            static ref G_NULL_SINK: SharedEventSink = Arc::new(NullEventSink {});
        }
        G_NULL_SINK.clone()
    }

    /// Invokes the wrapped callable with full instrumentation.
    pub fn call(self: &Rc<Self>, args: CallArgs) -> anyhow::Result<Value> {
        let bound = BoundArgs::bind(&self.params, &args);
        self.history.borrow_mut().note_call();

        let settings = self.settings.borrow();
        let enabled = settings
            .resolve("enabled", &bound, &self.params)
            .as_bool()
            .unwrap_or(true);
        if !enabled {
            // true bypass: no frame, no number, no events, no history
            drop(settings);
            return (self.callable)(&bound);
        }

        let call_num = self.call_counter.get() + 1;
        self.call_counter.set(call_num);
        let policy = if self.emits {
            EmitPolicy::resolve(&settings, &bound, &self.params)
        } else {
            EmitPolicy::silent()
        };
        let record_history = if self.emits {
            settings
                .resolve("record_history", &bound, &self.params)
                .as_bool()
                .unwrap_or(true)
        } else {
            true
        };
        drop(settings);

        let desc = FrameDesc {
            display_name: self.display_name.clone(),
            wrapper: Rc::downgrade(self),
        };
        let _frame = callstack::push_instrumented_frame(&self.name, desc);
        let chain = callstack::capture_caller_chain();
        let sink = self.sink_for(&policy.sink_name);

        // entry emission completes before invocation so a failing callable
        // never hides its call context
        if self.emits && effective_mute(policy.mute) == MuteLevel::Unmuted {
            sink.on_call(&CallEvent {
                display_name: self.display_name.clone(),
                call_num,
                show_call_num: policy.log_call_numbers,
                args: self.declared_args(&bound),
                keyword_args: bound
                    .by_keyword
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
                leftover_args: bound
                    .leftover
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
                args_sep: policy.args_sep.clone(),
                show_args: policy.log_args,
                caller_chain: chain.callers.clone(),
                chain_found: chain.found,
                timestamp: Utc::now(),
            });
        }

        let started = Instant::now();
        let cpu_started = ProcessTime::try_now().ok();
        let retval = (self.callable)(&bound)?;
        let elapsed_secs = started.elapsed().as_secs_f64();
        let process_secs = cpu_started
            .and_then(|t| t.try_elapsed().ok())
            .map_or(0.0, |d| d.as_secs_f64());

        // global mute is re-read here, so a toggle during the call takes
        // effect for the exit event
        if self.emits && policy.log_exit && effective_mute(policy.mute) == MuteLevel::Unmuted {
            sink.on_return(&ReturnEvent {
                display_name: self.display_name.clone(),
                call_num,
                show_call_num: policy.log_call_numbers,
                retval: policy.log_retval.then(|| render_retval(&retval)),
                elapsed_secs: policy.log_elapsed.then_some(elapsed_secs),
                process_secs: policy.log_elapsed.then_some(process_secs),
                caller_chain: chain.callers.clone(),
                chain_found: chain.found,
                timestamp: Utc::now(),
            });
        }

        if record_history {
            self.history.borrow_mut().record(CallRecord {
                call_num,
                args: self.declared_args(&bound),
                leftover: bound
                    .leftover
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
                retval: retval.clone(),
                elapsed_secs,
                process_secs,
                timestamp: Utc::now(),
                caller_chain: chain.callers,
                display_name: self.display_name.to_string(),
            });
        }
        Ok(retval)
    }

    /// Explicitly supplied arguments in declaration order, surplus
    /// positionals last.
    fn declared_args(&self, bound: &BoundArgs) -> Vec<(String, Value)> {
        let mut out = Vec::new();
        for p in &self.params {
            if p.kind == ParamKind::VarKeyword {
                continue;
            }
            if let Some(v) = bound
                .by_position
                .get(&p.name)
                .or_else(|| bound.by_keyword.get(&p.name))
            {
                out.push((p.name.clone(), v.clone()));
            }
        }
        for (name, value) in &bound.by_position {
            if !self.params.iter().any(|p| p.name == *name) {
                out.push((name.clone(), value.clone()));
            }
        }
        out
    }

    pub(crate) fn emit_message(&self, text: &str) {
        if !self.emits {
            return;
        }
        let empty = BoundArgs::default();
        let settings = self.settings.borrow();
        let mute = MuteLevel::from_int(
            settings
                .resolve("mute", &empty, &self.params)
                .as_int()
                .unwrap_or(0),
        );
        let sink_name = settings
            .resolve("sink", &empty, &self.params)
            .as_str()
            .unwrap_or("null")
            .to_string();
        drop(settings);
        let sink = self.sink_for(&sink_name);
        match effective_mute(mute) {
            MuteLevel::All => {}
            MuteLevel::Calls => sink.on_message(&self.display_name, text, false),
            MuteLevel::Unmuted => sink.on_message(&self.display_name, text, true),
        }
    }
}

/// Emits an auxiliary message attributed to the innermost active
/// instrumented call on this thread, honoring the effective mute level at
/// this instant.
pub fn aux_message(text: &str) -> Result<()> {
    let wrapper = callstack::active_wrapper()?;
    wrapper.emit_message(text);
    Ok(())
}
