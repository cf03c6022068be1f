//! Error types and handling for instrumentation operations

use std::fmt;
use thiserror::Error;

/// Why a wrapper handle could not be produced for a callable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotInstrumentedReason {
    /// The member is a plain callable, never wrapped.
    NotWrapped,
    /// The wrapper exists but instrumentation resolved to a full bypass.
    Bypassed,
    /// No instrumented frame is active on the calling thread's context stack.
    NoActiveCall,
}

impl fmt::Display for NotInstrumentedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotWrapped => write!(f, "not decorated"),
            Self::Bypassed => write!(f, "true-bypassed"),
            Self::NoActiveCall => write!(f, "no active instrumented call"),
        }
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("unknown setting '{name}' for decorator class '{class_id}'")]
    UnknownSetting { class_id: String, name: String },

    #[error("'{name}' is not instrumented: {reason}")]
    NotInstrumented {
        name: String,
        reason: NotInstrumentedReason,
    },

    #[error("no member named '{0}' in class registry")]
    UnknownMember(String),

    #[error("wrapper for '{0}' still has outstanding handles")]
    HandleInUse(String),
}

pub type Result<T> = std::result::Result<T, Error>;
