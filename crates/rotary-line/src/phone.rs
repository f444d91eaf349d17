//! Wiring: pins, monitors, ringer, audio and controller assembled into one
//! running phone.

use crate::config::{PhoneConfig, PinConfig};
use crate::controller::PhoneController;
use crate::dial::{DialHandle, DialMonitor};
use crate::error::LineResult;
use crate::gpio::{InputPin, OutputPin, SimulatedPin, SysfsPin};
use crate::hookswitch::HookSwitchMonitor;
use crate::observer::{PhoneEvents, PhoneObserver};
use crate::ringer::Ringer;
use rotary_voice::{AssetLibrary, AudioBackends, AudioOrchestrator, HookReader, HookSignal};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

/// The four lines the phone is wired to.
pub struct PhonePins {
    pub hookswitch: Box<dyn InputPin>,
    pub dial: Box<dyn InputPin>,
    pub ringer_left: Arc<dyn OutputPin>,
    pub ringer_right: Arc<dyn OutputPin>,
}

impl PhonePins {
    /// Export the configured pins through sysfs.
    pub fn sysfs(pins: &PinConfig) -> LineResult<Self> {
        Ok(Self {
            hookswitch: Box::new(SysfsPin::input(pins.hookswitch, pins.active_low)?),
            dial: Box::new(SysfsPin::input(pins.dial, pins.active_low)?),
            ringer_left: Arc::new(SysfsPin::output(pins.ringer_left)?),
            ringer_right: Arc::new(SysfsPin::output(pins.ringer_right)?),
        })
    }
}

/// A phone with nothing behind it but memory. Drive it by hand.
#[derive(Debug, Clone, Default)]
pub struct SimulatedPhone {
    pub hookswitch: SimulatedPin,
    pub dial: SimulatedPin,
    pub ringer_left: SimulatedPin,
    pub ringer_right: SimulatedPin,
}

impl SimulatedPhone {
    /// Dial pulse timing at the standard ten pulses per second.
    pub const MAKE: Duration = Duration::from_millis(40);
    pub const BREAK: Duration = Duration::from_millis(60);

    pub fn new() -> Self {
        Self::default()
    }

    pub fn pins(&self) -> PhonePins {
        PhonePins {
            hookswitch: Box::new(self.hookswitch.clone()),
            dial: Box::new(self.dial.clone()),
            ringer_left: Arc::new(self.ringer_left.clone()),
            ringer_right: Arc::new(self.ringer_right.clone()),
        }
    }

    pub fn lift(&self) {
        self.hookswitch.set(true);
    }

    pub fn hang_up(&self) {
        self.hookswitch.set(false);
    }

    /// Dial one digit and wait out `settle` afterwards. Blocks.
    ///
    /// Returns `false` without touching the line when `digit` is not 0-9.
    pub fn dial_digit(&self, digit: u8, settle: Duration) -> bool {
        let pulses = match digit {
            0 => 10,
            1..=9 => u32::from(digit),
            _ => {
                warn!(digit, "Not a dial digit, ignoring");
                return false;
            }
        };
        self.dial.pulse(pulses, Self::MAKE, Self::BREAK);
        thread::sleep(settle);
        true
    }

    /// Dial every decimal digit in `number`, skipping anything else.
    pub fn dial_number(&self, number: &str, settle: Duration) {
        for digit in number.chars().filter_map(|c| c.to_digit(10)) {
            self.dial_digit(digit as u8, settle);
        }
    }
}

/// A running phone. Dropping it without [`Phone::shutdown`] still stops the
/// monitor threads.
pub struct Phone {
    controller: Arc<PhoneController>,
    ringer: Arc<Ringer>,
    hook: HookReader,
    dial: DialHandle,
    hookswitch_monitor: HookSwitchMonitor,
    dial_monitor: DialMonitor,
}

impl Phone {
    pub fn start(
        config: &PhoneConfig,
        pins: PhonePins,
        backends: AudioBackends,
        events: Arc<dyn PhoneEvents>,
    ) -> LineResult<Self> {
        config.validate()?;
        info!("Initializing phone");

        let signal = HookSignal::new();
        let hook = signal.reader();

        let audio = AudioOrchestrator::new(
            config.orchestrator(),
            AssetLibrary::new(&config.audio.assets_dir),
            backends,
            hook.clone(),
        );
        let ringer = Arc::new(Ringer::new(
            pins.ringer_left,
            pins.ringer_right,
            config.ring_pattern(),
        ));
        let dial = DialHandle::new(config.dial_timing());
        let controller = Arc::new(PhoneController::new(
            audio,
            Arc::clone(&ringer),
            dial.clone(),
            events,
            config.audio.clone(),
        ));

        if config.self_test.ring_at_boot {
            debug!("Testing ringer...");
            ringer.ring();
            ringer.wait();
        }

        let observer: Arc<dyn PhoneObserver> = controller.clone();
        let hookswitch_monitor =
            HookSwitchMonitor::spawn(pins.hookswitch, signal, Arc::clone(&observer), config.hookswitch())?;
        let dial_monitor =
            DialMonitor::spawn(pins.dial, dial.clone(), observer, config.dial_monitor())?;

        info!("Initialization complete");
        Ok(Self {
            controller,
            ringer,
            hook,
            dial,
            hookswitch_monitor,
            dial_monitor,
        })
    }

    pub fn controller(&self) -> &PhoneController {
        &self.controller
    }

    pub fn hook(&self) -> &HookReader {
        &self.hook
    }

    pub fn dial(&self) -> &DialHandle {
        &self.dial
    }

    pub fn is_ringing(&self) -> bool {
        self.ringer.is_ringing()
    }

    /// Ring the bell, as for a "start" command.
    pub fn ring(&self) {
        self.controller.ring();
    }

    /// Stop the monitors first so no new events arrive, then release the
    /// ringer, the dial and the audio channel.
    pub fn shutdown(mut self) {
        self.hookswitch_monitor.stop();
        self.dial_monitor.stop();
        self.controller.shutdown();
        info!("Phone resources released.");
    }
}
