//! Call-instrumentation engine
//!
//! Wraps an arbitrary callable so that every invocation resolves a set of
//! configurable behaviors, reconstructs the chain of callers back to the
//! nearest instrumented ancestor, emits structured call/return events to a
//! pluggable sink, and retains a bounded or unbounded history of calls
//! with statistics.
//!
//! Setting values may be fixed at wrap time (*direct*) or name a parameter
//! of the wrapped callable (*indirect*), in which case they are resolved
//! fresh from the actual arguments on every call. Indirection lets a
//! caller high in a chain steer the instrumentation of callees it does not
//! know about, through ordinary keyword arguments.
//!
//! # Examples
//! ```
//! use callscope_instrument::prelude::*;
//! use callscope_instrument::event::InMemorySink;
//! use std::sync::Arc;
//!
//! let sink = Arc::new(InMemorySink::new());
//! let double = InstrumentBuilder::new("double")
//!     .param(ParamSpec::positional("x"))
//!     .sink("console", sink.clone())
//!     .build(|args| Ok(Value::Int(args.int("x")? * 2)))
//!     .unwrap();
//!
//! let result = double.call(CallArgs::new().pos(21i64)).unwrap();
//! assert_eq!(result, Value::Int(42));
//! assert_eq!(double.stats().num_calls_total, 1);
//! assert_eq!(sink.call_count(), 1);
//! ```

pub mod callstack;
pub mod class;
pub mod errors;
pub mod event;
pub mod history;
pub mod levels;
pub mod params;
pub mod settings;
pub mod test_utils;
pub mod value;
pub mod wrapper;

pub mod prelude {
    pub use crate::callstack::{frame_scope, frame_scope_with_locals, Binding, CallerChain};
    pub use crate::class::{ClassRegistry, InstrumentOptions, PropertyMember};
    pub use crate::errors::{Error, NotInstrumentedReason, Result};
    pub use crate::levels::{effective_mute, global_mute, set_global_mute, MuteLevel};
    pub use crate::params::{BoundArgs, CallArgs, ParamKind, ParamSpec};
    pub use crate::value::{Value, ValueType};
    pub use crate::wrapper::{aux_message, InstrumentBuilder, Instrumented};
}
