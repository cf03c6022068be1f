//! The process-wide mute override combines with per-callable mute as
//! max(local, global), recomputed at every emission point.
//!
//! These tests mutate process-global state and live in their own binary;
//! each is marked #[serial].

use callscope_instrument::event::InMemorySink;
use callscope_instrument::prelude::*;
use callscope_instrument::test_utils::GlobalMuteGuard;
use serial_test::serial;
use std::sync::Arc;

#[test]
#[serial]
fn mute_precedence_is_recomputed_per_emission() {
    let _guard = GlobalMuteGuard::new();
    let sink = Arc::new(InMemorySink::new());
    let f = InstrumentBuilder::new("f")
        .sink("console", sink.clone())
        .build(|_| {
            aux_message("working").unwrap();
            Ok(Value::None)
        })
        .unwrap();

    f.call(CallArgs::new()).unwrap();
    {
        let state = sink.state.lock().unwrap();
        assert_eq!(state.calls.len(), 1);
        assert_eq!(state.returns.len(), 1);
        // unmuted auxiliary messages are indented
        assert_eq!(state.messages.len(), 1);
        assert!(state.messages[0].2);
    }

    set_global_mute(MuteLevel::Calls);
    f.call(CallArgs::new()).unwrap();
    {
        let state = sink.state.lock().unwrap();
        // entry/exit suppressed, auxiliary message shown without indent
        assert_eq!(state.calls.len(), 1);
        assert_eq!(state.returns.len(), 1);
        assert_eq!(state.messages.len(), 2);
        assert!(!state.messages[1].2);
    }

    set_global_mute(MuteLevel::All);
    f.call(CallArgs::new()).unwrap();
    {
        let state = sink.state.lock().unwrap();
        assert_eq!(state.calls.len(), 1);
        assert_eq!(state.messages.len(), 2);
    }
    // history keeps recording at every mute level
    assert_eq!(f.history().len(), 3);
}

#[test]
#[serial]
fn global_toggle_mid_call_affects_the_exit_event() {
    let _guard = GlobalMuteGuard::new();
    let sink = Arc::new(InMemorySink::new());
    let f = InstrumentBuilder::new("f")
        .sink("console", sink.clone())
        .build(|_| {
            // silence everything after the entry event already went out
            set_global_mute(MuteLevel::All);
            Ok(Value::None)
        })
        .unwrap();

    f.call(CallArgs::new()).unwrap();
    assert_eq!(sink.call_count(), 1);
    assert_eq!(sink.return_count(), 0);
}

#[test]
#[serial]
fn sibling_calls_observe_independent_global_state() {
    let _guard = GlobalMuteGuard::new();
    let sink = Arc::new(InMemorySink::new());
    let child = InstrumentBuilder::new("child")
        .sink("console", sink.clone())
        .build(|_| Ok(Value::None))
        .unwrap();
    let c1 = child.clone();
    let c2 = child.clone();
    let parent = InstrumentBuilder::new("parent")
        .sink("console", sink.clone())
        .build(move |_| {
            c1.call(CallArgs::new())?;
            set_global_mute(MuteLevel::All);
            c2.call(CallArgs::new())?;
            set_global_mute(MuteLevel::Unmuted);
            Ok(Value::None)
        })
        .unwrap();

    parent.call(CallArgs::new()).unwrap();
    let state = sink.state.lock().unwrap();
    let child_calls = state
        .calls
        .iter()
        .filter(|e| &*e.display_name == "child")
        .count();
    assert_eq!(child_calls, 1);
    assert_eq!(child.history().len(), 2);
}
