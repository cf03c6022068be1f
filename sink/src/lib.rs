//! Output sinks for the callscope instrumentation engine
//!
//! The engine's core only knows the [`EventSink`] trait plus a null and an
//! in-memory sink; this crate holds the emitters that actually produce
//! output: a console sink and a `log`-facade interop sink.
//!
//! # Examples
//! ```
//! use callscope_instrument::prelude::*;
//! use callscope_sink::console::ConsoleSink;
//! use std::sync::Arc;
//!
//! let greet = InstrumentBuilder::new("greet")
//!     .param(ParamSpec::with_default("name", "world"))
//!     .sink("console", Arc::new(ConsoleSink::new()))
//!     .build(|args| Ok(Value::str(format!("hello, {}", args.string("name")?))))
//!     .unwrap();
//! greet.call(CallArgs::new().kw("name", "callscope")).unwrap();
//! ```

pub mod console;
pub mod log_interop;

pub use callscope_instrument::event::EventSink;
pub use console::ConsoleSink;
pub use log_interop::LogSink;
