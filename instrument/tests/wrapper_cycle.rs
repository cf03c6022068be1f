//! The full per-call cycle: numbering, emission, mute precedence,
//! exception transparency and history recording.

use callscope_instrument::event::{InMemorySink, MAX_RETVAL_DISPLAY};
use callscope_instrument::prelude::*;
use std::sync::Arc;

#[test]
fn call_numbers_are_dense_and_never_reused() {
    let sink = Arc::new(InMemorySink::new());
    let fib = InstrumentBuilder::new("fib")
        .param(ParamSpec::positional("n"))
        .sink("console", sink.clone())
        .build_recursive(|weak| {
            Box::new(move |args| {
                let n = args.int("n")?;
                if n < 2 {
                    return Ok(Value::Int(n));
                }
                let me = weak.upgrade().expect("wrapper alive during call");
                let a = me.call(CallArgs::new().pos(n - 1))?.as_int().unwrap_or(0);
                let b = me.call(CallArgs::new().pos(n - 2))?.as_int().unwrap_or(0);
                Ok(Value::Int(a + b))
            })
        })
        .unwrap();

    assert_eq!(fib.call(CallArgs::new().pos(6i64)).unwrap(), Value::Int(8));

    let total = fib.stats().num_calls_total;
    let mut nums: Vec<u64> = fib.history().records().map(|r| r.call_num).collect();
    nums.sort_unstable();
    let expected: Vec<u64> = (1..=total).collect();
    assert_eq!(nums, expected);
}

#[test]
fn errors_propagate_unchanged_with_entry_but_no_exit() {
    let sink = Arc::new(InMemorySink::new());
    let f = InstrumentBuilder::new("f")
        .param(ParamSpec::positional("x"))
        .sink("console", sink.clone())
        .build(|args| {
            let x = args.int("x")?;
            if x < 0 {
                anyhow::bail!("negative input: {x}");
            }
            Ok(Value::Int(x))
        })
        .unwrap();

    let err = f.call(CallArgs::new().pos(-3i64)).unwrap_err();
    assert_eq!(err.to_string(), "negative input: -3");
    assert_eq!(sink.call_count(), 1);
    assert_eq!(sink.return_count(), 0);
    assert_eq!(f.history().len(), 0);
    assert_eq!(f.stats().num_calls_total, 1);
}

#[test]
fn retval_rendering_is_truncated() {
    let sink = Arc::new(InMemorySink::new());
    let f = InstrumentBuilder::new("f")
        .setting("log_retval", true)
        .sink("console", sink.clone())
        .build(|_| Ok(Value::str("x".repeat(500))))
        .unwrap();
    f.call(CallArgs::new()).unwrap();
    let state = sink.state.lock().unwrap();
    let rendered = state.returns[0].retval.as_ref().unwrap();
    assert_eq!(rendered.chars().count(), MAX_RETVAL_DISPLAY + 3);
    assert!(rendered.ends_with("..."));
}

#[test]
fn bounded_history_retains_most_recent_records() {
    let f = InstrumentBuilder::new("f")
        .param(ParamSpec::positional("x"))
        .setting("max_history", 3i64)
        .build(|args| Ok(Value::Int(args.int("x")?)))
        .unwrap();
    for x in 1..=7i64 {
        f.call(CallArgs::new().pos(x)).unwrap();
    }
    let nums: Vec<u64> = f.history().records().map(|r| r.call_num).collect();
    assert_eq!(nums, vec![5, 6, 7]);
    let stats = f.stats();
    assert_eq!(stats.num_calls_total, 7);
    assert_eq!(stats.num_calls_logged, 7);

    f.clear_history(Some(None));
    assert!(f.history().is_empty());
    assert_eq!(f.history().capacity(), None);
}

#[test]
fn record_history_off_still_counts_calls() {
    let f = InstrumentBuilder::new("f")
        .setting("record_history", false)
        .build(|_| Ok(Value::None))
        .unwrap();
    f.call(CallArgs::new()).unwrap();
    f.call(CallArgs::new()).unwrap();
    assert_eq!(f.history().len(), 0);
    let stats = f.stats();
    assert_eq!(stats.num_calls_total, 2);
    assert_eq!(stats.num_calls_logged, 0);
}

#[test]
fn recorder_variant_records_without_emitting() {
    let sink = Arc::new(InMemorySink::new());
    let f = InstrumentBuilder::recorder("f")
        .param(ParamSpec::positional("x"))
        .sink("console", sink.clone())
        .build(|args| Ok(Value::Int(args.int("x")? + 1)))
        .unwrap();
    f.call(CallArgs::new().pos(1i64)).unwrap();
    assert_eq!(sink.call_count(), 0);
    assert_eq!(sink.return_count(), 0);
    let history = f.history();
    let record = history.last().unwrap();
    assert_eq!(record.retval, Value::Int(2));
    assert_eq!(record.display_name, "f");
}

#[test]
fn delimited_history_lists_arguments_and_chain() {
    let f = InstrumentBuilder::new("Adder.add")
        .param(ParamSpec::positional("x"))
        .param(ParamSpec::with_default("y", 0i64))
        .param(ParamSpec::var_keyword("extra"))
        .build(|args| Ok(Value::Int(args.int("x")? + args.int("y")?)))
        .unwrap();
    f.call(CallArgs::new().pos(2i64).kw("y", 3i64).kw("note", "hi"))
        .unwrap();

    let text = f.history_delimited("|");
    let mut lines = text.lines();
    assert_eq!(
        lines.next().unwrap(),
        "call_num|x|y|extra|retval|elapsed_secs|process_secs|timestamp|function|caller_chain"
    );
    let row = lines.next().unwrap();
    assert!(row.starts_with("1|2|3|{'note': 'hi'}|5|"));
    assert!(row.ends_with("|Adder.add|[]"));
}

#[test]
fn aux_message_outside_instrumented_call_is_an_error() {
    let err = aux_message("orphan").unwrap_err();
    assert!(matches!(
        err,
        Error::NotInstrumented {
            reason: NotInstrumentedReason::NoActiveCall,
            ..
        }
    ));
}

#[test]
fn timing_fields_are_populated() {
    let f = InstrumentBuilder::new("f")
        .build(|_| {
            std::thread::sleep(std::time::Duration::from_millis(5));
            Ok(Value::None)
        })
        .unwrap();
    f.call(CallArgs::new()).unwrap();
    let history = f.history();
    let record = history.last().unwrap();
    assert!(record.elapsed_secs >= 0.005);
    assert!(record.process_secs >= 0.0);
    assert!(f.stats().elapsed_secs_logged >= 0.005);
}
