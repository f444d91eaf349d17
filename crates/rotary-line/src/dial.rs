//! Dial Decoder - pulse counting and number accumulation
//!
//! A rotary dial reports a digit as a train of make/break pulses on one
//! contact: one pulse for "1" up to ten for "0". The decoder counts pulses
//! until the contact has been quiet for the pulse gap, then appends the digit.
//! A number is complete when it reaches the digit limit or when the caller
//! stops dialing for the inter-digit timeout.
//!
//! [`DialDecoder`] is a plain state machine fed explicit instants.
//! [`DialMonitor`] drives it from a pin on its own thread.

use crate::debounce::DebouncedInput;
use crate::error::LineResult;
use crate::gpio::InputPin;
use crate::observer::{dispatch, PhoneObserver};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Pulses in the longest rotary digit ("0").
const MAX_PULSES: u32 = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialEvent {
    /// First digit of a new number.
    DigitReceived(u8),
    NumberComplete(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialPhase {
    Idle,
    CountingPulses,
    InterDigitWait,
}

#[derive(Debug, Clone)]
pub struct DialTiming {
    /// Quiet time that ends a digit (default: 300ms).
    pub pulse_gap: Duration,
    /// Quiet time between digits that ends a number (default: 5s).
    pub digit_timeout: Duration,
    /// Digits that complete a number immediately (default: 3).
    pub max_digits: usize,
}

impl Default for DialTiming {
    fn default() -> Self {
        Self {
            pulse_gap: Duration::from_millis(300),
            digit_timeout: Duration::from_secs(5),
            max_digits: 3,
        }
    }
}

/// Pulse count to digit. Ten pulses is "0"; anything past ten is not a digit.
pub fn pulses_to_digit(pulses: u32) -> Option<u8> {
    match pulses {
        MAX_PULSES => Some(0),
        1..=9 => Some(pulses as u8),
        _ => None,
    }
}

#[derive(Debug)]
pub struct DialDecoder {
    timing: DialTiming,
    digits: String,
    pulses: u32,
    last_pulse: Option<Instant>,
    deadline: Option<Instant>,
}

impl DialDecoder {
    pub fn new(timing: DialTiming) -> Self {
        Self {
            timing,
            digits: String::new(),
            pulses: 0,
            last_pulse: None,
            deadline: None,
        }
    }

    pub fn phase(&self) -> DialPhase {
        if self.last_pulse.is_some() {
            DialPhase::CountingPulses
        } else if !self.digits.is_empty() {
            DialPhase::InterDigitWait
        } else {
            DialPhase::Idle
        }
    }

    /// Digits accumulated for the number in progress.
    pub fn digits(&self) -> &str {
        &self.digits
    }

    /// When the inter-digit timeout will fire, if one is pending.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// One break edge from the dial contact.
    pub fn on_pulse(&mut self, at: Instant) -> Vec<DialEvent> {
        // A digit whose gap has already passed is finished before this pulse
        // starts the next one.
        let events = self.poll(at);
        if self.last_pulse.is_none() {
            // Dialing resumed: the number is not finished yet.
            self.deadline = None;
        }
        self.pulses += 1;
        self.last_pulse = Some(at);
        events
    }

    /// Advance the clock: finish a quiet digit, fire an expired timeout.
    pub fn poll(&mut self, now: Instant) -> Vec<DialEvent> {
        let mut events = Vec::new();

        if let Some(last) = self.last_pulse {
            let digit_end = last + self.timing.pulse_gap;
            if now >= digit_end {
                let pulses = std::mem::take(&mut self.pulses);
                self.last_pulse = None;
                self.finish_digit(pulses, digit_end, &mut events);
            }
        }

        if let Some(deadline) = self.deadline {
            if now >= deadline {
                self.deadline = None;
                let number = std::mem::take(&mut self.digits);
                info!(number = %number, "Dial timer elapsed");
                events.push(DialEvent::NumberComplete(number));
            }
        }

        events
    }

    /// Drop the number in progress without reporting it.
    pub fn cancel(&mut self) {
        if self.phase() != DialPhase::Idle {
            debug!(digits = %self.digits, pulses = self.pulses, "Cancelling dial");
        }
        self.digits.clear();
        self.pulses = 0;
        self.last_pulse = None;
        self.deadline = None;
    }

    fn finish_digit(&mut self, pulses: u32, at: Instant, events: &mut Vec<DialEvent>) {
        let Some(digit) = pulses_to_digit(pulses) else {
            warn!(pulses, "Discarding pulse train that is not a rotary digit");
            if !self.digits.is_empty() {
                self.deadline = Some(at + self.timing.digit_timeout);
            }
            return;
        };

        self.digits.push(char::from(b'0' + digit));
        debug!(digit, number = %self.digits, "Got digit");
        if self.digits.len() == 1 {
            events.push(DialEvent::DigitReceived(digit));
        }

        if self.digits.len() >= self.timing.max_digits {
            self.deadline = None;
            let number = std::mem::take(&mut self.digits);
            info!(number = %number, "Dialed max number of digits");
            events.push(DialEvent::NumberComplete(number));
        } else {
            self.deadline = Some(at + self.timing.digit_timeout);
        }
    }
}

/// Shared access to the decoder. The monitor thread and explicit cancels go
/// through the same lock, so a cancel and a firing timeout never interleave.
#[derive(Debug, Clone)]
pub struct DialHandle {
    decoder: Arc<Mutex<DialDecoder>>,
}

impl DialHandle {
    pub fn new(timing: DialTiming) -> Self {
        Self {
            decoder: Arc::new(Mutex::new(DialDecoder::new(timing))),
        }
    }

    pub fn cancel(&self) {
        self.lock().cancel();
    }

    pub fn phase(&self) -> DialPhase {
        self.lock().phase()
    }

    pub fn digits(&self) -> String {
        self.lock().digits().to_string()
    }

    pub fn on_pulse(&self, at: Instant) -> Vec<DialEvent> {
        self.lock().on_pulse(at)
    }

    pub fn poll(&self, now: Instant) -> Vec<DialEvent> {
        self.lock().poll(now)
    }

    fn lock(&self) -> MutexGuard<'_, DialDecoder> {
        match self.decoder.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DialMonitorConfig {
    /// Lockout after an accepted edge (default: 10ms).
    pub debounce: Duration,
    /// Pin sampling period (default: 2ms).
    pub sample_interval: Duration,
}

impl Default for DialMonitorConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(10),
            sample_interval: Duration::from_millis(2),
        }
    }
}

/// Samples the dial contact and forwards decoded events to the observer.
pub struct DialMonitor {
    running: Arc<AtomicBool>,
    worker: Option<thread::JoinHandle<()>>,
}

impl DialMonitor {
    pub fn spawn(
        pin: Box<dyn InputPin>,
        dial: DialHandle,
        observer: Arc<dyn PhoneObserver>,
        config: DialMonitorConfig,
    ) -> LineResult<Self> {
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);
        let mut input = DebouncedInput::new("dial", pin, config.debounce);

        let worker = thread::Builder::new()
            .name("rotary-dial".to_string())
            .spawn(move || {
                info!("☎️ Dial monitor started");
                while flag.load(Ordering::SeqCst) {
                    let now = Instant::now();
                    // Pulses are counted on the break (closed to open).
                    let events = match input.sample(now) {
                        Some(false) => dial.on_pulse(now),
                        _ => dial.poll(now),
                    };
                    // The lock is released here; observers may cancel.
                    for event in events {
                        deliver(event, observer.as_ref());
                    }
                    thread::sleep(config.sample_interval);
                }
                debug!("Dial monitor stopped");
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

impl Drop for DialMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

fn deliver(event: DialEvent, observer: &dyn PhoneObserver) {
    match event {
        DialEvent::DigitReceived(digit) => dispatch("on_digit", || observer.on_digit(digit)),
        DialEvent::NumberComplete(number) => {
            dispatch("on_number_complete", || observer.on_number_complete(&number))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MS: Duration = Duration::from_millis(1);

    /// Feed `pulses` 100ms apart starting at `start`; returns the last pulse time.
    fn dial(decoder: &mut DialDecoder, start: Instant, pulses: u32) -> (Instant, Vec<DialEvent>) {
        let mut events = Vec::new();
        let mut at = start;
        for i in 0..pulses {
            at = start + 100 * MS * i;
            events.extend(decoder.on_pulse(at));
        }
        (at, events)
    }

    #[test]
    fn pulse_mapping() {
        for n in 1..=9 {
            assert_eq!(pulses_to_digit(n), Some(n as u8));
        }
        assert_eq!(pulses_to_digit(10), Some(0));
        assert_eq!(pulses_to_digit(0), None);
        assert_eq!(pulses_to_digit(11), None);
    }

    #[test]
    fn digit_needs_the_full_gap() {
        let t0 = Instant::now();
        let mut d = DialDecoder::new(DialTiming::default());
        let (last, events) = dial(&mut d, t0, 4);
        assert!(events.is_empty());
        assert_eq!(d.phase(), DialPhase::CountingPulses);

        assert!(d.poll(last + 299 * MS).is_empty());
        assert_eq!(d.poll(last + 300 * MS), vec![DialEvent::DigitReceived(4)]);
        assert_eq!(d.phase(), DialPhase::InterDigitWait);
        assert_eq!(d.digits(), "4");
    }

    #[test]
    fn only_the_first_digit_is_announced() {
        let t0 = Instant::now();
        let mut d = DialDecoder::new(DialTiming {
            max_digits: 4,
            ..DialTiming::default()
        });
        let (last, _) = dial(&mut d, t0, 2);
        assert_eq!(d.poll(last + 300 * MS), vec![DialEvent::DigitReceived(2)]);

        let (last, _) = dial(&mut d, last + 1000 * MS, 10);
        assert!(d.poll(last + 300 * MS).is_empty());
        assert_eq!(d.digits(), "20");
    }

    #[test]
    fn max_digits_completes_immediately() {
        let t0 = Instant::now();
        let mut d = DialDecoder::new(DialTiming::default());
        let mut events = Vec::new();
        let mut at = t0;
        for pulses in [1, 2, 3] {
            let (last, e) = dial(&mut d, at, pulses);
            events.extend(e);
            events.extend(d.poll(last + 300 * MS));
            at = last + 1000 * MS;
        }
        assert_eq!(
            events,
            vec![
                DialEvent::DigitReceived(1),
                DialEvent::NumberComplete("123".to_string())
            ]
        );
        assert_eq!(d.phase(), DialPhase::Idle);
        assert_eq!(d.deadline(), None);
        // Nothing left to time out.
        assert!(d.poll(at + Duration::from_secs(60)).is_empty());
    }

    #[test]
    fn timeout_completes_short_number() {
        let t0 = Instant::now();
        let mut d = DialDecoder::new(DialTiming::default());
        let (last, _) = dial(&mut d, t0, 7);
        let digit_end = last + 300 * MS;
        d.poll(digit_end);
        let (last, _) = dial(&mut d, digit_end + 500 * MS, 1);
        let digit_end = last + 300 * MS;
        assert!(d.poll(digit_end).is_empty());

        assert!(d.poll(digit_end + 4999 * MS).is_empty());
        assert_eq!(
            d.poll(digit_end + 5000 * MS),
            vec![DialEvent::NumberComplete("71".to_string())]
        );
        assert_eq!(d.phase(), DialPhase::Idle);
    }

    #[test]
    fn dialing_again_suspends_the_timeout() {
        let t0 = Instant::now();
        let mut d = DialDecoder::new(DialTiming {
            digit_timeout: Duration::from_millis(500),
            ..DialTiming::default()
        });
        let (last, _) = dial(&mut d, t0, 1);
        d.poll(last + 300 * MS);
        // Next digit starts just before the timeout and its pulses run past it.
        let (last, _) = dial(&mut d, last + 700 * MS, 9);
        assert!(d.poll(last).is_empty());
        assert!(d.poll(last + 300 * MS).is_empty());
        assert_eq!(d.digits(), "19");
        assert!(d.deadline().is_some());
    }

    #[test]
    fn cancel_mid_wait_reports_nothing() {
        let t0 = Instant::now();
        let mut d = DialDecoder::new(DialTiming::default());
        let (last, _) = dial(&mut d, t0, 5);
        d.poll(last + 300 * MS);
        d.cancel();
        assert_eq!(d.phase(), DialPhase::Idle);
        assert!(d.poll(last + Duration::from_secs(30)).is_empty());
    }

    #[test]
    fn cancel_mid_pulses_discards_the_count() {
        let t0 = Instant::now();
        let mut d = DialDecoder::new(DialTiming::default());
        let (last, _) = dial(&mut d, t0, 3);
        d.cancel();
        let (last, _) = dial(&mut d, last + 50 * MS, 2);
        assert_eq!(d.poll(last + 300 * MS), vec![DialEvent::DigitReceived(2)]);
    }

    #[test]
    fn single_spurious_pulse_is_a_one() {
        let t0 = Instant::now();
        let mut d = DialDecoder::new(DialTiming::default());
        d.on_pulse(t0);
        assert_eq!(d.poll(t0 + 300 * MS), vec![DialEvent::DigitReceived(1)]);
    }

    #[test]
    fn overlong_pulse_train_is_discarded() {
        let t0 = Instant::now();
        let mut d = DialDecoder::new(DialTiming::default());
        let (last, _) = dial(&mut d, t0, 12);
        assert!(d.poll(last + 300 * MS).is_empty());
        assert_eq!(d.phase(), DialPhase::Idle);
    }

    #[test]
    fn late_poll_finishes_digit_on_next_pulse() {
        let t0 = Instant::now();
        let mut d = DialDecoder::new(DialTiming::default());
        let (last, _) = dial(&mut d, t0, 6);
        // No poll in between: the next pulse closes the previous digit.
        let events = d.on_pulse(last + 800 * MS);
        assert_eq!(events, vec![DialEvent::DigitReceived(6)]);
        assert_eq!(d.phase(), DialPhase::CountingPulses);
    }

    #[test]
    fn handle_shares_one_decoder() {
        let handle = DialHandle::new(DialTiming::default());
        let other = handle.clone();
        let t0 = Instant::now();
        handle.on_pulse(t0);
        other.poll(t0 + 300 * MS);
        assert_eq!(handle.digits(), "1");
        other.cancel();
        assert_eq!(handle.phase(), DialPhase::Idle);
    }
}
