//! Inward (hardware to controller) and outward (controller to show control)
//! event interfaces.

use std::panic::{self, AssertUnwindSafe};
use tracing::{error, info};

/// Receives decoded line events. Called from the monitor threads, so
/// implementations must not block for long.
pub trait PhoneObserver: Send + Sync {
    fn on_off_hook(&self);
    fn on_on_hook(&self);
    /// First digit of a new number.
    fn on_digit(&self, digit: u8);
    fn on_number_complete(&self, number: &str);
}

/// Notifications for whatever runs the show around the phone.
pub trait PhoneEvents: Send + Sync {
    fn picked_up(&self);
    fn hung_up(&self);
    fn user_spoke(&self);
    fn user_silent(&self);
    fn number_dialed(&self, number: &str);
}

/// Writes every event to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogEvents;

impl PhoneEvents for LogEvents {
    fn picked_up(&self) {
        info!(event = "pickup", "📞 phone picked up");
    }

    fn hung_up(&self) {
        info!(event = "hangup", "📞 phone hung up");
    }

    fn user_spoke(&self) {
        info!(event = "user_spoke", "User spoke after the prompt");
    }

    fn user_silent(&self) {
        info!(event = "user_silent", "User was silent after the prompt");
    }

    fn number_dialed(&self, number: &str) {
        info!(event = "number_dialed", number, "Number dialed");
    }
}

/// Run an observer callback, keeping a panic inside it away from the
/// monitor thread that called it.
pub(crate) fn dispatch<F: FnOnce()>(event: &str, callback: F) {
    if panic::catch_unwind(AssertUnwindSafe(callback)).is_err() {
        error!(event, "Observer panicked while handling event");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn dispatch_contains_panics() {
        dispatch("on_digit", || panic!("boom"));

        let ran = AtomicBool::new(false);
        dispatch("on_digit", || ran.store(true, Ordering::SeqCst));
        assert!(ran.load(Ordering::SeqCst));
    }
}
