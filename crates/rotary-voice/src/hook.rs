//! Shared hook state.
//!
//! There is exactly one [`HookSignal`] per handset. It is owned by whatever
//! watches the hookswitch and is the only thing allowed to change the state.
//! Everyone else (the audio orchestrator in particular) gets a cheap
//! [`HookReader`] that can only look.

use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Position of the handset on the cradle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HookState {
    /// Handset resting on the cradle.
    OnHook,
    /// Handset lifted.
    OffHook,
}

impl fmt::Display for HookState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HookState::OnHook => f.write_str("on-hook"),
            HookState::OffHook => f.write_str("off-hook"),
        }
    }
}

#[derive(Debug, Default)]
struct HookShared {
    off_hook: AtomicBool,
    /// Bumped on every off-hook -> on-hook transition.
    hangups: AtomicU64,
}

impl HookShared {
    fn get(&self) -> HookState {
        if self.off_hook.load(Ordering::SeqCst) {
            HookState::OffHook
        } else {
            HookState::OnHook
        }
    }
}

/// Writer side of the hook state. Not `Clone`: a single owner mutates it.
#[derive(Debug)]
pub struct HookSignal {
    shared: Arc<HookShared>,
}

impl HookSignal {
    /// New signal, starting on-hook.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(HookShared::default()),
        }
    }

    /// Store `state`. Returns `true` if this was an actual transition.
    pub fn set(&self, state: HookState) -> bool {
        let off = state == HookState::OffHook;
        let was_off = self.shared.off_hook.swap(off, Ordering::SeqCst);
        if was_off && !off {
            self.shared.hangups.fetch_add(1, Ordering::SeqCst);
        }
        was_off != off
    }

    pub fn get(&self) -> HookState {
        self.shared.get()
    }

    /// Hand out a read-only view.
    pub fn reader(&self) -> HookReader {
        HookReader {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl Default for HookSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-only, cloneable view of the hook state.
#[derive(Debug, Clone)]
pub struct HookReader {
    shared: Arc<HookShared>,
}

impl HookReader {
    pub fn get(&self) -> HookState {
        self.shared.get()
    }

    /// Number of hang-ups seen so far. A change between two reads means the
    /// handset went down in between, even if it has since been lifted again.
    pub fn hangups(&self) -> u64 {
        self.shared.hangups.load(Ordering::SeqCst)
    }

    pub fn is_off_hook(&self) -> bool {
        self.get() == HookState::OffHook
    }

    pub fn is_on_hook(&self) -> bool {
        !self.is_off_hook()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_on_hook() {
        let signal = HookSignal::new();
        assert_eq!(signal.get(), HookState::OnHook);
        assert!(signal.reader().is_on_hook());
    }

    #[test]
    fn set_reports_only_real_transitions() {
        let signal = HookSignal::new();
        assert!(!signal.set(HookState::OnHook));
        assert!(signal.set(HookState::OffHook));
        assert!(!signal.set(HookState::OffHook));
        assert!(signal.set(HookState::OnHook));
    }

    #[test]
    fn readers_observe_writer() {
        let signal = HookSignal::new();
        let reader = signal.reader();
        let other = reader.clone();
        signal.set(HookState::OffHook);
        assert!(reader.is_off_hook());
        assert_eq!(other.get(), HookState::OffHook);
    }

    #[test]
    fn hangup_counter_catches_quick_repickup() {
        let signal = HookSignal::new();
        let reader = signal.reader();
        signal.set(HookState::OffHook);
        let before = reader.hangups();

        signal.set(HookState::OnHook);
        signal.set(HookState::OffHook);

        assert!(reader.is_off_hook());
        assert_eq!(reader.hangups(), before + 1);
    }
}
