//! # Rotary Line - the phone side of the prop
//!
//! Hookswitch and dial contacts come in through [`gpio`], are debounced and
//! decoded by the monitors, and reach the [`PhoneController`] as
//! [`PhoneObserver`] calls. The controller drives the bell and the handset
//! audio and reports to the outside world through [`PhoneEvents`].
//!
//! ```text
//!  hookswitch pin ─▶ HookSwitchMonitor ─┬─▶ HookSignal ─▶ AudioOrchestrator
//!                                       │                       ▲
//!       dial pin ─▶ DialMonitor ────────┴─▶ PhoneController ────┤
//!                    (DialDecoder)               │              │
//!                                                ├─▶ Ringer     │
//!                                                └─▶ PhoneEvents
//! ```

pub mod config;
pub mod controller;
pub mod debounce;
pub mod dial;
pub mod error;
pub mod gpio;
pub mod hookswitch;
pub mod observer;
pub mod phone;
pub mod ringer;

pub use config::{AudioSettings, PhoneConfig, PinConfig, SelfTestConfig, TimingConfig};
pub use controller::PhoneController;
pub use debounce::{DebouncedInput, Debouncer};
pub use dial::{
    pulses_to_digit, DialDecoder, DialEvent, DialHandle, DialMonitor, DialMonitorConfig,
    DialPhase, DialTiming,
};
pub use error::{LineError, LineResult};
pub use gpio::{InputPin, OutputPin, SimulatedPin, SysfsPin};
pub use hookswitch::{HookSwitchConfig, HookSwitchMonitor};
pub use observer::{LogEvents, PhoneEvents, PhoneObserver};
pub use phone::{Phone, PhonePins, SimulatedPhone};
pub use ringer::{RingPattern, Ringer};
