//! Explicit execution-context stack
//!
//! Rust offers no implicit stack reflection, so the engine maintains its
//! own per-thread stack of frames. Wrappers push a frame around every
//! instrumented invocation; non-instrumented host code that wants to show
//! up in caller chains opts in with [`frame_scope`]. A frame may also
//! publish named local bindings so that closure-nested instrumented
//! callables are recognized even when they were not invoked through their
//! own wrapper frame.

use crate::errors::{Error, NotInstrumentedReason, Result};
use crate::wrapper::Instrumented;
use std::cell::RefCell;
use std::marker::PhantomData;
use std::rc::{Rc, Weak};
use std::sync::Arc;

/// Descriptor attached to frames pushed by a wrapper: the capability
/// marker the chain tracker tests for.
#[derive(Clone)]
pub struct FrameDesc {
    pub display_name: Arc<str>,
    pub wrapper: Weak<Instrumented>,
}

/// A named callable visible in a frame's local scope.
#[derive(Clone)]
pub enum Binding {
    Plain,
    /// An instrumented callable, carrying its prefixed display name.
    Instrumented(Arc<str>),
}

struct Frame {
    name: Arc<str>,
    desc: Option<FrameDesc>,
    locals: Vec<(Arc<str>, Binding)>,
}

thread_local! {
    static LOCAL_CALL_STACK: RefCell<Vec<Frame>> = const { RefCell::new(Vec::new()) };
}

/// Pops the frame on drop. Frames must unwind in push order, which the
/// borrow-free guard value enforces by construction.
pub struct FrameGuard {
    _not_send: PhantomData<*const ()>,
}

impl Drop for FrameGuard {
    fn drop(&mut self) {
        LOCAL_CALL_STACK.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

fn push(frame: Frame) -> FrameGuard {
    LOCAL_CALL_STACK.with(|stack| stack.borrow_mut().push(frame));
    FrameGuard {
        _not_send: PhantomData,
    }
}

/// Opt-in frame for non-instrumented host code.
pub fn frame_scope(name: &str) -> FrameGuard {
    push(Frame {
        name: Arc::from(name),
        desc: None,
        locals: Vec::new(),
    })
}

/// Opt-in frame that also publishes local bindings.
pub fn frame_scope_with_locals(name: &str, locals: Vec<(Arc<str>, Binding)>) -> FrameGuard {
    push(Frame {
        name: Arc::from(name),
        desc: None,
        locals,
    })
}

pub(crate) fn push_instrumented_frame(name: &str, desc: FrameDesc) -> FrameGuard {
    push(Frame {
        name: Arc::from(name),
        desc: Some(desc),
        locals: Vec::new(),
    })
}

/// Ordered caller names, nearest caller first, back to the nearest
/// instrumented ancestor (`found`) or the top-level caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallerChain {
    pub callers: Vec<String>,
    pub found: bool,
}

/// Walks the context stack outward from the frame below the current
/// wrapper's own frame. Each frame contributes its name until a frame
/// belonging to another wrapper is recognized, either directly or through
/// a local binding in its enclosing frame (the closure-nested case); that
/// entry is replaced by the wrapper's display name and the walk stops.
/// With no instrumented ancestor the chain is truncated to the immediate
/// caller. Anomalies degrade to "not found", never an error.
pub(crate) fn capture_caller_chain() -> CallerChain {
    LOCAL_CALL_STACK.with(|stack| {
        let stack = stack.borrow();
        let mut chain = CallerChain::default();
        if stack.len() < 2 {
            return chain;
        }
        for i in (0..stack.len() - 1).rev() {
            let frame = &stack[i];
            if let Some(desc) = &frame.desc {
                chain.callers.push(desc.display_name.to_string());
                chain.found = true;
                break;
            }
            let enclosing_binding = i.checked_sub(1).and_then(|j| {
                stack[j].locals.iter().find_map(|(name, binding)| {
                    match binding {
                        Binding::Instrumented(display) if *name == frame.name => {
                            Some(display.clone())
                        }
                        _ => None,
                    }
                })
            });
            if let Some(display) = enclosing_binding {
                chain.callers.push(display.to_string());
                chain.found = true;
                break;
            }
            chain.callers.push(frame.name.to_string());
        }
        if !chain.found {
            chain.callers.truncate(1);
        }
        chain
    })
}

/// Handle of the innermost active instrumented call on this thread.
///
/// Misuse of this introspection surface is the one place configuration
/// problems raise instead of degrading: calling it outside any
/// instrumented call is an error.
pub fn active_wrapper() -> Result<Rc<Instrumented>> {
    LOCAL_CALL_STACK.with(|stack| {
        let stack = stack.borrow();
        for frame in stack.iter().rev() {
            if let Some(desc) = &frame.desc {
                return desc.wrapper.upgrade().ok_or_else(|| Error::NotInstrumented {
                    name: desc.display_name.to_string(),
                    reason: NotInstrumentedReason::NotWrapped,
                });
            }
        }
        let name = stack
            .last()
            .map_or_else(|| String::from("<module>"), |f| f.name.to_string());
        Err(Error::NotInstrumented {
            name,
            reason: NotInstrumentedReason::NoActiveCall,
        })
    })
}
