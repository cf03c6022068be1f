//! Caller-chain reconstruction across plain, instrumented and
//! closure-nested callables.

use callscope_instrument::event::InMemorySink;
use callscope_instrument::prelude::*;
use callscope_instrument::wrapper::Instrumented;
use std::rc::Rc;
use std::sync::Arc;

fn instrumented(name: &str, sink: &Arc<InMemorySink>) -> Rc<Instrumented> {
    InstrumentBuilder::new(name)
        .sink("console", sink.clone())
        .build(|_| Ok(Value::None))
        .unwrap()
}

fn plain_c(target: &Rc<Instrumented>) -> anyhow::Result<Value> {
    let _frame = frame_scope("c");
    target.call(CallArgs::new())
}

fn plain_b(target: &Rc<Instrumented>) -> anyhow::Result<Value> {
    let _frame = frame_scope("b");
    plain_c(target)
}

#[test]
fn chain_spans_plain_frames_back_to_instrumented_ancestor() {
    let sink = Arc::new(InMemorySink::new());
    let d = instrumented("D", &sink);
    let d_for_a = d.clone();
    let a = InstrumentBuilder::new("A")
        .sink("console", sink.clone())
        .build(move |_| plain_b(&d_for_a))
        .unwrap();

    a.call(CallArgs::new()).unwrap();

    let state = sink.state.lock().unwrap();
    let event = state
        .calls
        .iter()
        .find(|e| &*e.display_name == "D")
        .unwrap();
    assert_eq!(event.caller_chain, vec!["c", "b", "A"]);
    assert!(event.chain_found);
}

#[test]
fn chain_without_instrumented_ancestor_keeps_immediate_caller_only() {
    let sink = Arc::new(InMemorySink::new());
    let f = instrumented("f", &sink);
    {
        let _outer = frame_scope("outer");
        let _inner = frame_scope("inner");
        f.call(CallArgs::new()).unwrap();
    }
    let (chain, found) = sink.last_chain().unwrap();
    assert_eq!(chain, vec!["inner"]);
    assert!(!found);
}

#[test]
fn chain_from_top_level_is_empty() {
    let sink = Arc::new(InMemorySink::new());
    let f = instrumented("f", &sink);
    f.call(CallArgs::new()).unwrap();
    let (chain, found) = sink.last_chain().unwrap();
    assert!(chain.is_empty());
    assert!(!found);
}

#[test]
fn closure_nested_instrumented_callable_is_detected_via_locals() {
    let sink = Arc::new(InMemorySink::new());
    let probe = instrumented("probe", &sink);

    // "helper" runs without its own wrapper frame, but its enclosing
    // frame publishes it as an instrumented local
    let _maker = frame_scope_with_locals(
        "make_adder",
        vec![(
            Arc::from("helper"),
            Binding::Instrumented(Arc::from("make_adder.helper")),
        )],
    );
    let _helper = frame_scope("helper");
    probe.call(CallArgs::new()).unwrap();

    let (chain, found) = sink.last_chain().unwrap();
    assert_eq!(chain, vec!["make_adder.helper"]);
    assert!(found);
}

#[test]
fn recursive_calls_see_their_own_wrapper_as_ancestor() {
    let sink = Arc::new(InMemorySink::new());
    let fact = InstrumentBuilder::new("fact")
        .param(ParamSpec::positional("n"))
        .sink("console", sink.clone())
        .build_recursive(|weak| {
            Box::new(move |args| {
                let n = args.int("n")?;
                if n <= 1 {
                    return Ok(Value::Int(1));
                }
                let me = weak.upgrade().expect("wrapper alive during call");
                let sub = me.call(CallArgs::new().pos(n - 1))?;
                Ok(Value::Int(n * sub.as_int().unwrap_or(1)))
            })
        })
        .unwrap();

    let result = fact.call(CallArgs::new().pos(4i64)).unwrap();
    assert_eq!(result, Value::Int(24));

    let state = sink.state.lock().unwrap();
    assert_eq!(state.calls.len(), 4);
    // every nested call's nearest instrumented ancestor is fact itself
    for event in &state.calls[1..] {
        assert_eq!(event.caller_chain, vec!["fact"]);
        assert!(event.chain_found);
    }
    assert!(!state.calls[0].chain_found);
}
