//! Lockout debouncing for mechanical contacts.

use crate::gpio::InputPin;
use std::time::{Duration, Instant};
use tracing::{error, info};

/// Accepts the first edge immediately, then ignores the contact for
/// `window` while it bounces.
#[derive(Debug, Clone)]
pub struct Debouncer {
    window: Duration,
    stable: bool,
    locked_until: Option<Instant>,
}

impl Debouncer {
    pub fn new(initial: bool, window: Duration) -> Self {
        Self {
            window,
            stable: initial,
            locked_until: None,
        }
    }

    pub fn state(&self) -> bool {
        self.stable
    }

    /// Feed one raw sample. Returns the new level when an edge is accepted.
    pub fn update(&mut self, raw: bool, now: Instant) -> Option<bool> {
        if let Some(until) = self.locked_until {
            if now < until {
                return None;
            }
            self.locked_until = None;
        }
        if raw == self.stable {
            return None;
        }
        self.stable = raw;
        self.locked_until = Some(now + self.window);
        Some(raw)
    }
}

/// A pin plus its debouncer. Read failures are logged once per streak and
/// the line keeps its last accepted level.
pub struct DebouncedInput {
    name: &'static str,
    pin: Box<dyn InputPin>,
    debouncer: Debouncer,
    failing: bool,
}

impl DebouncedInput {
    /// Starts out inactive; a contact already closed at startup produces an
    /// edge on the first sample.
    pub fn new(name: &'static str, pin: Box<dyn InputPin>, window: Duration) -> Self {
        Self {
            name,
            pin,
            debouncer: Debouncer::new(false, window),
            failing: false,
        }
    }

    pub fn state(&self) -> bool {
        self.debouncer.state()
    }

    pub fn sample(&mut self, now: Instant) -> Option<bool> {
        match self.pin.is_active() {
            Ok(raw) => {
                if self.failing {
                    info!(input = self.name, "GPIO read recovered");
                    self.failing = false;
                }
                self.debouncer.update(raw, now)
            }
            Err(e) => {
                if !self.failing {
                    error!(
                        input = self.name,
                        "GPIO read failed, holding last state ({}): {}",
                        self.debouncer.state(),
                        e
                    );
                    self.failing = true;
                }
                None
            }
        }
    }
}
