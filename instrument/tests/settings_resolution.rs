//! Direct/indirect classification and call-time resolution, observed
//! through the wrapper.

use callscope_instrument::event::InMemorySink;
use callscope_instrument::prelude::*;
use callscope_instrument::settings::{load_source, parse_source};
use std::sync::Arc;

fn noop_builder(name: &str) -> (InstrumentBuilder, Arc<InMemorySink>) {
    let sink = Arc::new(InMemorySink::new());
    let builder = InstrumentBuilder::new(name).sink("console", sink.clone());
    (builder, sink)
}

#[test]
fn indirect_string_setting_resolves_from_keyword_argument() {
    let (builder, sink) = noop_builder("f");
    let f = builder
        .param(ParamSpec::keyword_only("sep", " ~ "))
        .setting("args_sep", "sep=")
        .build(|_| Ok(Value::None))
        .unwrap();

    // explicit keyword wins
    f.call(CallArgs::new().kw("sep", "; ")).unwrap();
    assert_eq!(sink.state.lock().unwrap().calls[0].args_sep, "; ");

    // omitted: the keyword-capable parameter's declared default
    f.call(CallArgs::new()).unwrap();
    assert_eq!(sink.state.lock().unwrap().calls[1].args_sep, " ~ ");
}

#[test]
fn indirect_reference_to_undeclared_parameter_uses_schema_default() {
    let (builder, sink) = noop_builder("f");
    let f = builder
        .setting("args_sep", "no_such_param=")
        .build(|_| Ok(Value::None))
        .unwrap();
    f.call(CallArgs::new()).unwrap();
    assert_eq!(sink.state.lock().unwrap().calls[0].args_sep, ", ");
}

#[test]
fn indirect_enabled_steers_bypass_per_call() {
    let (builder, sink) = noop_builder("f");
    // non-string setting: any non-empty string is a parameter reference
    let f = builder
        .setting("enabled", "enable_it")
        .build(|_| Ok(Value::Int(7)))
        .unwrap();

    // bypassed: the callable still runs, nothing else happens
    let r = f.call(CallArgs::new().kw("enable_it", false)).unwrap();
    assert_eq!(r, Value::Int(7));
    assert_eq!(sink.call_count(), 0);
    assert_eq!(f.history().len(), 0);
    assert_eq!(f.stats().num_calls_total, 1);

    // reference not supplied and not a declared parameter: schema default
    // (enabled) applies
    f.call(CallArgs::new()).unwrap();
    assert_eq!(sink.call_count(), 1);
    assert_eq!(sink.state.lock().unwrap().calls[0].call_num, 1);
}

#[test]
fn leftover_keyword_arguments_reach_indirect_settings() {
    let (builder, sink) = noop_builder("f");
    // "mute_level" is not a declared parameter; the value arrives as a
    // leftover keyword argument and still steers the setting
    let f = builder
        .setting("mute", "mute_level")
        .build(|_| Ok(Value::None))
        .unwrap();
    f.call(CallArgs::new().kw("mute_level", 2i64)).unwrap();
    assert_eq!(sink.call_count(), 0);
    assert_eq!(f.history().len(), 1);
}

#[test]
fn resolved_type_mismatch_degrades_to_default() {
    let (builder, sink) = noop_builder("f");
    let f = builder
        .param(ParamSpec::positional("flags"))
        .setting("log_call_numbers", "flags")
        .build(|_| Ok(Value::None))
        .unwrap();
    // a string where a bool is required: schema default (false) applies
    f.call(CallArgs::new().pos("not a bool")).unwrap();
    assert!(!sink.state.lock().unwrap().calls[0].show_call_num);
}

#[test]
fn non_mutable_setting_keeps_first_value() {
    let (builder, _sink) = noop_builder("f");
    let f = builder
        .setting("prefix", "First.")
        .setting("prefix", "Second.")
        .build(|_| Ok(Value::None))
        .unwrap();
    assert_eq!(f.display_name(), "First.f");
    f.set_setting("prefix", "Third.").unwrap();
    assert_eq!(f.setting("prefix").unwrap().value, Value::str("First."));
}

#[test]
fn unknown_setting_name_is_rejected_at_build() {
    let err = InstrumentBuilder::new("f")
        .setting("not_a_setting", true)
        .build(|_| Ok(Value::None))
        .unwrap_err();
    assert!(matches!(err, Error::UnknownSetting { .. }));
}

#[test]
fn bulk_source_configures_a_wrapper() {
    let source = parse_source("enabled=true\nlog_retval=true\nmystery_key=9\nmute = 0\n");
    let sink = Arc::new(InMemorySink::new());
    let f = InstrumentBuilder::new("f")
        .sink("console", sink.clone())
        .settings_source(source)
        .build(|_| Ok(Value::Int(5)))
        .unwrap();
    f.call(CallArgs::new()).unwrap();
    let state = sink.state.lock().unwrap();
    assert_eq!(state.returns[0].retval.as_deref(), Some("5"));
}

#[test]
fn settings_file_round_trip() {
    let path = std::env::temp_dir().join(format!("callscope-settings-{}.txt", std::process::id()));
    std::fs::write(&path, "log_exit=false\nbroken line\nmax_history=2\n").unwrap();
    let source = load_source(&path).unwrap();
    std::fs::remove_file(&path).ok();

    let sink = Arc::new(InMemorySink::new());
    let f = InstrumentBuilder::new("f")
        .sink("console", sink.clone())
        .settings_source(source)
        .build(|_| Ok(Value::None))
        .unwrap();
    for _ in 0..3 {
        f.call(CallArgs::new()).unwrap();
    }
    assert_eq!(sink.return_count(), 0); // log_exit off
    assert_eq!(f.history().len(), 2); // bounded by the file's max_history
}
