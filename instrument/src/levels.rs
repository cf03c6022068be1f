//! Mute levels and the process-wide mute override
//!
//! A callable's own `mute` setting combines with the global override as
//! `max(local, global)`, recomputed at every emission point so that a
//! global toggle takes effect in the middle of a call chain.

use serde::Serialize;
use std::sync::atomic::{AtomicU8, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[repr(u8)]
pub enum MuteLevel {
    /// Full entry/exit events plus auxiliary messages.
    Unmuted = 0,
    /// Entry/exit events suppressed; auxiliary messages still shown,
    /// without extra indentation.
    Calls = 1,
    /// No output at all. History recording still occurs.
    All = 2,
}

impl MuteLevel {
    /// Clamping conversion from a setting value.
    pub fn from_int(value: i64) -> Self {
        match value {
            i if i <= 0 => Self::Unmuted,
            1 => Self::Calls,
            _ => Self::All,
        }
    }
}

static G_MUTE_OVERRIDE: AtomicU8 = AtomicU8::new(MuteLevel::Unmuted as u8);

pub fn set_global_mute(level: MuteLevel) {
    G_MUTE_OVERRIDE.store(level as u8, Ordering::Relaxed);
}

pub fn global_mute() -> MuteLevel {
    MuteLevel::from_int(i64::from(G_MUTE_OVERRIDE.load(Ordering::Relaxed)))
}

/// The most-suppressed of the callable's own level and the global override.
#[inline]
pub fn effective_mute(local: MuteLevel) -> MuteLevel {
    local.max(global_mute())
}
