//! Fixtures shared by unit and integration tests

use crate::levels::{set_global_mute, MuteLevel};

/// RAII guard that restores the global mute override on drop.
///
/// # Important
/// Tests using this guard MUST be marked with #[serial] since they share
/// the process-wide mute override.
pub struct GlobalMuteGuard {}

impl Default for GlobalMuteGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl GlobalMuteGuard {
    pub fn new() -> Self {
        set_global_mute(MuteLevel::Unmuted);
        Self {}
    }
}

impl Drop for GlobalMuteGuard {
    fn drop(&mut self) {
        set_global_mute(MuteLevel::Unmuted);
    }
}
