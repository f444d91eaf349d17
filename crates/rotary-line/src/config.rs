//! Phone configuration.
//!
//! Precedence, lowest first: built-in defaults, the TOML file
//! (`PHONE_CONFIG` or `config/phone.toml`), then `PHONE__<SECTION>__<KEY>`
//! environment variables, e.g. `PHONE__PINS__DIAL=17`.

use crate::dial::{DialMonitorConfig, DialTiming};
use crate::error::{LineError, LineResult};
use crate::hookswitch::HookSwitchConfig;
use crate::ringer::RingPattern;
use rotary_voice::{ListenRequest, OrchestratorConfig, MAX_LISTEN};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "config/phone.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PhoneConfig {
    pub pins: PinConfig,
    pub timing: TimingConfig,
    pub audio: AudioSettings,
    pub self_test: SelfTestConfig,
}

/// BCM pin numbers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PinConfig {
    pub hookswitch: u32,
    pub dial: u32,
    pub ringer_left: u32,
    pub ringer_right: u32,
    /// Contacts switch to ground against a pull-up.
    pub active_low: bool,
}

impl Default for PinConfig {
    fn default() -> Self {
        Self {
            hookswitch: 8,
            dial: 25,
            ringer_left: 23,
            ringer_right: 24,
            active_low: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub hook_debounce_ms: u64,
    pub dial_debounce_ms: u64,
    pub sample_interval_ms: u64,
    pub pulse_gap_ms: u64,
    pub digit_timeout_ms: u64,
    pub max_digits: usize,
    pub ring_cycles: u32,
    pub ring_half_cycle_ms: u64,
    pub audio_poll_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            hook_debounce_ms: 50,
            dial_debounce_ms: 10,
            sample_interval_ms: 2,
            pulse_gap_ms: 300,
            digit_timeout_ms: 5000,
            max_digits: 3,
            ring_cycles: 10,
            ring_half_cycle_ms: 50,
            audio_poll_ms: 20,
        }
    }
}

/// What the phone plays and how it listens.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioSettings {
    pub assets_dir: PathBuf,
    pub volume: f32,
    /// Prompt played on pickup before listening.
    pub greeting: String,
    pub listen_secs: f64,
    pub silence_threshold: f64,
    pub speech_response: String,
    pub silence_response: String,
    /// Looped on the handset while the bell rings, if set.
    pub ringtone: Option<String>,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            assets_dir: PathBuf::from("assets"),
            volume: 0.75,
            greeting: "dialogue/1_child_have-to-whisper.wav".to_string(),
            listen_secs: 4.0,
            silence_threshold: 1000.0,
            speech_response: "dialogue/2-you-remember-dont-you.wav".to_string(),
            silence_response: "dialogue/2-you-remember-dont-you.wav".to_string(),
            ringtone: None,
        }
    }
}

impl AudioSettings {
    pub fn greeting_request(&self) -> ListenRequest {
        ListenRequest::new(self.greeting.clone())
            .listen_for(Duration::from_secs_f64(self.listen_secs))
            .silence_threshold(self.silence_threshold)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelfTestConfig {
    /// Ring once at startup.
    pub ring_at_boot: bool,
}

impl Default for SelfTestConfig {
    fn default() -> Self {
        Self { ring_at_boot: true }
    }
}

impl PhoneConfig {
    /// Load from `PHONE_CONFIG` (or the default path) and the environment.
    pub fn load() -> LineResult<Self> {
        let path = std::env::var("PHONE_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from(Path::new(&path))
    }

    /// Load with `path` as the config file. A missing file is not an error.
    pub fn load_from(path: &Path) -> LineResult<Self> {
        let builder = config::Config::builder().add_source(config::Config::try_from(&PhoneConfig::default())?);

        let builder = if path.exists() {
            builder.add_source(config::File::from(path))
        } else {
            builder
        };

        let built = builder
            .add_source(
                config::Environment::with_prefix("PHONE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: PhoneConfig = built.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> LineResult<()> {
        let t = &self.timing;
        if t.max_digits == 0 {
            return Err(LineError::InvalidConfig("timing.max_digits must be at least 1".into()));
        }
        if t.pulse_gap_ms == 0 || t.digit_timeout_ms == 0 {
            return Err(LineError::InvalidConfig(
                "timing.pulse_gap_ms and timing.digit_timeout_ms must be positive".into(),
            ));
        }
        if t.sample_interval_ms == 0 {
            return Err(LineError::InvalidConfig("timing.sample_interval_ms must be positive".into()));
        }
        let a = &self.audio;
        if !(a.listen_secs.is_finite() && a.listen_secs > 0.0) {
            return Err(LineError::InvalidConfig("audio.listen_secs must be positive".into()));
        }
        if a.listen_secs > MAX_LISTEN.as_secs_f64() {
            return Err(LineError::InvalidConfig(format!(
                "audio.listen_secs must be at most {}",
                MAX_LISTEN.as_secs()
            )));
        }
        if !(a.silence_threshold.is_finite() && a.silence_threshold >= 0.0) {
            return Err(LineError::InvalidConfig(
                "audio.silence_threshold must be zero or positive".into(),
            ));
        }
        if !(0.0..=1.0).contains(&a.volume) {
            return Err(LineError::InvalidConfig("audio.volume must be between 0.0 and 1.0".into()));
        }
        let p = &self.pins;
        let mut pins = [p.hookswitch, p.dial, p.ringer_left, p.ringer_right];
        pins.sort_unstable();
        if pins.windows(2).any(|w| w[0] == w[1]) {
            return Err(LineError::InvalidConfig("pins must all be different".into()));
        }
        Ok(())
    }

    pub fn hookswitch(&self) -> HookSwitchConfig {
        HookSwitchConfig {
            debounce: Duration::from_millis(self.timing.hook_debounce_ms),
            sample_interval: Duration::from_millis(self.timing.sample_interval_ms),
        }
    }

    pub fn dial_monitor(&self) -> DialMonitorConfig {
        DialMonitorConfig {
            debounce: Duration::from_millis(self.timing.dial_debounce_ms),
            sample_interval: Duration::from_millis(self.timing.sample_interval_ms),
        }
    }

    pub fn dial_timing(&self) -> DialTiming {
        DialTiming {
            pulse_gap: Duration::from_millis(self.timing.pulse_gap_ms),
            digit_timeout: Duration::from_millis(self.timing.digit_timeout_ms),
            max_digits: self.timing.max_digits,
        }
    }

    pub fn ring_pattern(&self) -> RingPattern {
        RingPattern {
            cycles: self.timing.ring_cycles,
            half_cycle: Duration::from_millis(self.timing.ring_half_cycle_ms),
        }
    }

    pub fn orchestrator(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            poll_interval: Duration::from_millis(self.timing.audio_poll_ms.max(1)),
            volume: self.audio.volume,
            ..OrchestratorConfig::default()
        }
    }
}
