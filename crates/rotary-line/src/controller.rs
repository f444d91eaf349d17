//! Phone Controller - the call script
//!
//! Picking up rings off the greeting and listens for an answer, hanging up
//! aborts whatever the handset is doing, and the first dialed digit silences
//! the bell and the earpiece.

use crate::config::AudioSettings;
use crate::dial::DialHandle;
use crate::observer::{PhoneEvents, PhoneObserver};
use crate::ringer::Ringer;
use rotary_voice::{AudioOrchestrator, SessionHandle, VoiceError};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct PhoneController {
    audio: AudioOrchestrator,
    ringer: Arc<Ringer>,
    dial: DialHandle,
    events: Arc<dyn PhoneEvents>,
    script: AudioSettings,
}

impl PhoneController {
    pub fn new(
        audio: AudioOrchestrator,
        ringer: Arc<Ringer>,
        dial: DialHandle,
        events: Arc<dyn PhoneEvents>,
        script: AudioSettings,
    ) -> Self {
        Self {
            audio,
            ringer,
            dial,
            events,
            script,
        }
    }

    pub fn audio(&self) -> &AudioOrchestrator {
        &self.audio
    }

    /// Incoming "start" command: ring the bell, plus the ringtone loop if one
    /// is configured.
    pub fn ring(&self) {
        info!("received message to start");
        if let Some(ringtone) = &self.script.ringtone {
            self.audio.play_loop(ringtone);
        }
        self.ringer.ring();
    }

    /// Play the greeting and listen for an answer. Also used for pickup.
    pub fn greet(&self) -> Option<SessionHandle> {
        let request = self.script.greeting_request();

        let (events, audio, response) = (
            Arc::clone(&self.events),
            self.audio.clone(),
            self.script.speech_response.clone(),
        );
        let on_speech = move || {
            info!("User spoke after the prompt!");
            events.user_spoke();
            audio.play_once(&response);
        };

        let (events, audio, response) = (
            Arc::clone(&self.events),
            self.audio.clone(),
            self.script.silence_response.clone(),
        );
        let on_silence = move || {
            info!("User was silent after the prompt.");
            events.user_silent();
            audio.play_once(&response);
        };

        match self.audio.play_and_listen(request, on_speech, on_silence) {
            Ok(handle) => Some(handle),
            Err(VoiceError::SessionBusy) => None,
            Err(e) => {
                warn!("Greeting not started: {}", e);
                None
            }
        }
    }

    pub fn shutdown(&self) {
        info!("Safely shutting down phone...");
        self.ringer.silence();
        self.dial.cancel();
        self.audio.shutdown();
    }
}

impl PhoneObserver for PhoneController {
    fn on_off_hook(&self) {
        info!("phone picked up");
        self.ringer.silence();
        self.audio.stop_loop();
        self.events.picked_up();
        self.greet();
    }

    fn on_on_hook(&self) {
        self.audio.hang_up();
        self.dial.cancel();
        self.events.hung_up();
    }

    fn on_digit(&self, digit: u8) {
        debug!(digit, "Dial has notified phone about first digit. Stopping ringtone");
        self.ringer.silence();
        self.audio.stop();
    }

    fn on_number_complete(&self, number: &str) {
        info!("calling {}", number);
        self.dial.cancel();
        self.events.number_dialed(number);
    }
}
