//! HookSwitch Monitor - turns the cradle contact into off-hook / on-hook events

use crate::debounce::DebouncedInput;
use crate::error::LineResult;
use crate::gpio::InputPin;
use crate::observer::{dispatch, PhoneObserver};
use rotary_voice::{HookSignal, HookState};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct HookSwitchConfig {
    /// Lockout after an accepted edge (default: 50ms).
    pub debounce: Duration,
    /// Pin sampling period (default: 2ms).
    pub sample_interval: Duration,
}

impl Default for HookSwitchConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(50),
            sample_interval: Duration::from_millis(2),
        }
    }
}

/// Owns the only [`HookSignal`]. The shared state is updated before the
/// observer hears about a transition.
pub struct HookSwitchMonitor {
    running: Arc<AtomicBool>,
    worker: Option<thread::JoinHandle<()>>,
}

impl HookSwitchMonitor {
    pub fn spawn(
        pin: Box<dyn InputPin>,
        signal: HookSignal,
        observer: Arc<dyn PhoneObserver>,
        config: HookSwitchConfig,
    ) -> LineResult<Self> {
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);
        let mut input = DebouncedInput::new("hookswitch", pin, config.debounce);

        let worker = thread::Builder::new()
            .name("rotary-hookswitch".to_string())
            .spawn(move || {
                info!("🔌 Hookswitch monitor started");
                while flag.load(Ordering::SeqCst) {
                    if let Some(closed) = input.sample(Instant::now()) {
                        let state = if closed {
                            HookState::OffHook
                        } else {
                            HookState::OnHook
                        };
                        if signal.set(state) {
                            announce(state, observer.as_ref());
                        }
                    }
                    thread::sleep(config.sample_interval);
                }
                debug!("Hookswitch monitor stopped");
            })?;

        Ok(Self {
            running,
            worker: Some(worker),
        })
    }

    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl Drop for HookSwitchMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

fn announce(state: HookState, observer: &dyn PhoneObserver) {
    match state {
        HookState::OffHook => {
            debug!("Phone off hook");
            dispatch("on_off_hook", || observer.on_off_hook());
        }
        HookState::OnHook => {
            debug!("Phone on hook");
            dispatch("on_on_hook", || observer.on_on_hook());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpio::SimulatedPin;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Log {
        seen: Mutex<Vec<(&'static str, bool)>>,
        reader: Mutex<Option<rotary_voice::HookReader>>,
    }

    impl Log {
        fn push(&self, name: &'static str) {
            let off_hook = self
                .reader
                .lock()
                .unwrap()
                .as_ref()
                .map_or(false, |r| r.is_off_hook());
            self.seen.lock().unwrap().push((name, off_hook));
        }
    }

    impl PhoneObserver for Log {
        fn on_off_hook(&self) {
            self.push("off");
        }
        fn on_on_hook(&self) {
            self.push("on");
        }
        fn on_digit(&self, _digit: u8) {}
        fn on_number_complete(&self, _number: &str) {}
    }

    fn settle() {
        thread::sleep(Duration::from_millis(40));
    }

    #[test]
    fn transitions_reach_the_observer_once_with_state_already_set() {
        let pin = SimulatedPin::new();
        let signal = HookSignal::new();
        let log = Arc::new(Log::default());
        *log.reader.lock().unwrap() = Some(signal.reader());

        let config = HookSwitchConfig {
            debounce: Duration::from_millis(10),
            sample_interval: Duration::from_millis(1),
        };
        let mut monitor =
            HookSwitchMonitor::spawn(Box::new(pin.clone()), signal, log.clone(), config).unwrap();

        pin.set(true);
        settle();
        pin.set(true);
        settle();
        pin.set(false);
        settle();
        monitor.stop();

        let seen = log.seen.lock().unwrap().clone();
        assert_eq!(seen, vec![("off", true), ("on", false)]);
    }
}
