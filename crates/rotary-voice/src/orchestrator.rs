//! Audio Orchestrator - owns the handset's single audio channel
//!
//! Clips are fire-and-forget. The compound play-and-listen sequence runs on a
//! dedicated worker thread and there is exactly one worker slot: a request
//! that finds the slot taken is rejected on the spot, never queued.
//!
//! A hang-up cancels whatever the worker is doing. Every wait point in the
//! sequence re-reads the hook state, and [`AudioOrchestrator::hang_up`] rings a
//! doorbell so a sleeping worker notices immediately instead of at the next
//! poll tick.

use crate::assets::AssetLibrary;
use crate::audio::{CaptureDevice, CpalCapture, FinishNotify, Playback, PlayMode, RodioPlayback};
use crate::energy::{EnergyDetector, RecordingBuffer};
use crate::error::{VoiceError, VoiceResult};
use crate::hook::HookReader;
use crate::session::{Disposition, ListenRequest, SessionHandle, SessionReport, MAX_LISTEN};
use chrono::Utc;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use tokio::sync::{oneshot, Semaphore};
use tracing::{debug, error, info, warn};

/// Configuration for the audio orchestrator
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Fallback re-check interval while waiting on playback (default: 20ms).
    pub poll_interval: Duration,
    /// Longest a capture read blocks before the hook is re-checked (default: 100ms).
    pub chunk_timeout: Duration,
    /// Extra time granted to a stalled capture device past the listen window (default: 2s).
    pub capture_grace: Duration,
    /// Channel volume, 0.0 to 1.0 (default: 0.75).
    pub volume: f32,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(20),
            chunk_timeout: Duration::from_millis(100),
            capture_grace: Duration::from_secs(2),
            volume: 0.75,
        }
    }
}

/// Hardware the orchestrator drives. `None` means unavailable.
#[derive(Clone, Default)]
pub struct AudioBackends {
    pub playback: Option<Arc<dyn Playback>>,
    pub capture: Option<Arc<dyn CaptureDevice>>,
}

impl AudioBackends {
    /// Open the default output device and pick the default input device.
    /// Failures are logged here, once, and leave the backend empty.
    pub fn detect() -> Self {
        let playback: Option<Arc<dyn Playback>> = match RodioPlayback::open() {
            Ok(playback) => Some(Arc::new(playback)),
            Err(e) => {
                error!("Audio output unavailable, playback disabled: {}", e);
                None
            }
        };
        let capture: Option<Arc<dyn CaptureDevice>> = if CpalCapture::is_available() {
            Some(Arc::new(CpalCapture::default()))
        } else {
            error!("No audio input device found, listening disabled");
            None
        };
        Self { playback, capture }
    }
}

/// Wakes the session worker early. Generation counter + condvar so a ring
/// between two waits is never lost.
#[derive(Default)]
struct Doorbell {
    generation: Mutex<u64>,
    rung: Condvar,
}

impl Doorbell {
    fn ring(&self) {
        let mut generation = match self.generation.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        *generation = generation.wrapping_add(1);
        self.rung.notify_all();
    }

    fn current(&self) -> u64 {
        match self.generation.lock() {
            Ok(g) => *g,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// Sleep until rung past `seen` or `timeout` elapses. Returns the latest generation.
    fn wait(&self, seen: u64, timeout: Duration) -> u64 {
        let guard = match self.generation.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        let result = self
            .rung
            .wait_timeout_while(guard, timeout, |generation| *generation == seen);
        match result {
            Ok((g, _)) => *g,
            Err(poisoned) => *poisoned.into_inner().0,
        }
    }
}

struct Inner {
    config: OrchestratorConfig,
    assets: AssetLibrary,
    backends: AudioBackends,
    hook: HookReader,
    session_slot: Arc<Semaphore>,
    doorbell: Arc<Doorbell>,
    looping: AtomicBool,
    shutting_down: AtomicBool,
    /// f32 bits.
    volume: AtomicU32,
    next_session_id: AtomicU64,
    worker: Mutex<Option<thread::JoinHandle<()>>>,
}

/// The handset's audio channel. Cheap to clone; all clones share one channel
/// and one session slot.
#[derive(Clone)]
pub struct AudioOrchestrator {
    inner: Arc<Inner>,
}

impl AudioOrchestrator {
    pub fn new(
        config: OrchestratorConfig,
        assets: AssetLibrary,
        backends: AudioBackends,
        hook: HookReader,
    ) -> Self {
        let volume = config.volume.clamp(0.0, 1.0);
        if let Some(playback) = &backends.playback {
            playback.set_volume(volume);
        } else {
            warn!("🎭 Audio orchestrator running without output; all playback is a no-op");
        }
        info!(assets = %assets.root().display(), "🎭 Audio orchestrator ready");

        Self {
            inner: Arc::new(Inner {
                config,
                assets,
                backends,
                hook,
                session_slot: Arc::new(Semaphore::new(1)),
                doorbell: Arc::new(Doorbell::default()),
                looping: AtomicBool::new(false),
                shutting_down: AtomicBool::new(false),
                volume: AtomicU32::new(volume.to_bits()),
                next_session_id: AtomicU64::new(1),
                worker: Mutex::new(None),
            }),
        }
    }

    /// Whether an output channel exists at all.
    pub fn is_available(&self) -> bool {
        self.inner.backends.playback.is_some()
    }

    pub fn is_session_active(&self) -> bool {
        self.inner.session_slot.available_permits() == 0
    }

    pub fn volume(&self) -> f32 {
        f32::from_bits(self.inner.volume.load(Ordering::SeqCst))
    }

    pub fn set_volume(&self, volume: f32) {
        let volume = volume.clamp(0.0, 1.0);
        debug!("Setting volume to {}", volume);
        self.inner.volume.store(volume.to_bits(), Ordering::SeqCst);
        if let Some(playback) = &self.inner.backends.playback {
            playback.set_volume(volume);
        }
    }

    /// Stop whatever is on the channel and play `asset` once.
    pub fn play_once(&self, asset: &str) -> bool {
        self.start_clip(asset, PlayMode::Once)
    }

    /// Play `asset` on repeat until [`stop_loop`](Self::stop_loop) or another clip replaces it.
    pub fn play_loop(&self, asset: &str) -> bool {
        self.start_clip(asset, PlayMode::Loop)
    }

    /// Stop the channel if it is looping; leaves one-shot clips alone.
    pub fn stop_loop(&self) {
        if self.inner.looping.swap(false, Ordering::SeqCst) {
            if let Some(playback) = &self.inner.backends.playback {
                playback.stop();
            }
            debug!("loop stopped");
        }
    }

    /// Silence the channel.
    pub fn stop(&self) {
        self.inner.looping.store(false, Ordering::SeqCst);
        if let Some(playback) = &self.inner.backends.playback {
            playback.stop();
        }
    }

    /// The handset went down: silence the channel and wake the session
    /// worker so it sees the new hook state now.
    pub fn hang_up(&self) {
        info!("Phone HUNG UP, silencing audio");
        self.stop();
        self.inner.doorbell.ring();
    }

    /// Play `request.asset`, then record for `request.listen_for` and call
    /// exactly one of `on_speech` / `on_silence`.
    ///
    /// Returns immediately. Rejected (not queued) when the channel is missing,
    /// the phone is on hook, or another session holds the slot.
    pub fn play_and_listen<S, Q>(
        &self,
        request: ListenRequest,
        on_speech: S,
        on_silence: Q,
    ) -> VoiceResult<SessionHandle>
    where
        S: FnOnce() + Send + 'static,
        Q: FnOnce() + Send + 'static,
    {
        let inner = &self.inner;
        if inner.shutting_down.load(Ordering::SeqCst) {
            return Err(VoiceError::ShuttingDown);
        }
        // Missing devices were reported once by `AudioBackends::detect`.
        if inner.backends.playback.is_none() {
            debug!("Audio channel not available. Cannot play and listen.");
            return Err(VoiceError::HardwareUnavailable(
                "no output channel".to_string(),
            ));
        }
        if inner.backends.capture.is_none() {
            debug!("No input device. Cannot play and listen.");
            return Err(VoiceError::HardwareUnavailable(
                "no input device".to_string(),
            ));
        }
        if inner.hook.is_on_hook() {
            warn!(asset = %request.asset, "Phone is on hook. Cannot play and listen.");
            return Err(VoiceError::OnHook);
        }
        if request.listen_for > MAX_LISTEN {
            return Err(VoiceError::Config(format!(
                "listen window of {:?} exceeds the {:?} limit",
                request.listen_for, MAX_LISTEN
            )));
        }
        let detector = EnergyDetector::new(request.silence_threshold)?;
        let permit = match Arc::clone(&inner.session_slot).try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                warn!(
                    asset = %request.asset,
                    "Another play_and_listen session is already running. Ignoring new request."
                );
                return Err(VoiceError::SessionBusy);
            }
        };

        let id = inner.next_session_id.fetch_add(1, Ordering::SeqCst);
        let session = Session {
            id,
            request,
            detector,
            hangups_at_start: inner.hook.hangups(),
        };
        info!(
            session = id,
            asset = %session.request.asset,
            listen_secs = session.request.listen_for.as_secs_f32(),
            threshold = session.request.silence_threshold,
            "Initiating play_and_listen"
        );

        let (report_tx, report_rx) = oneshot::channel();
        let worker_inner = Arc::clone(inner);
        let handle = thread::Builder::new()
            .name(format!("rotary-session-{}", id))
            .spawn(move || {
                let asset = session.request.asset.clone();
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                    worker_inner.run_session(&session, on_speech, on_silence)
                }));
                let (disposition, rms) = outcome.unwrap_or_else(|_| {
                    error!(session = id, asset = %asset, "play_and_listen worker panicked");
                    (Disposition::Error, None)
                });
                // Free the slot before reporting so a waiter can start the next session.
                drop(permit);
                debug!(session = id, %disposition, "Play and listen task finished");
                let _ = report_tx.send(SessionReport {
                    id,
                    asset,
                    disposition,
                    rms,
                    finished_at: Utc::now(),
                });
            })?;

        let mut worker = match inner.worker.lock() {
            Ok(w) => w,
            Err(poisoned) => poisoned.into_inner(),
        };
        // The previous worker, if any, has already released the slot.
        *worker = Some(handle);

        Ok(SessionHandle::new(id, report_rx))
    }

    /// Cancel any active session, wait for its worker and silence the channel.
    pub fn shutdown(&self) {
        if self.inner.shutting_down.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("🛑 Stopping audio orchestrator");
        self.stop();
        self.inner.doorbell.ring();

        let handle = match self.inner.worker.lock() {
            Ok(mut w) => w.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(handle) = handle {
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }
        info!("✅ Audio orchestrator stopped");
    }

    fn start_clip(&self, asset: &str, mode: PlayMode) -> bool {
        let inner = &self.inner;
        if inner.shutting_down.load(Ordering::SeqCst) {
            return false;
        }
        let Some(playback) = &inner.backends.playback else {
            error!(asset, "Audio channel not initialized. Cannot play file.");
            return false;
        };
        let path = match inner.assets.resolve(asset) {
            Ok(path) => path,
            Err(e) => {
                error!(asset, "Cannot play: {}", e);
                return false;
            }
        };
        info!(asset, ?mode, "Playing file");
        match playback.play(&path, mode, None) {
            Ok(()) => {
                inner.looping.store(mode == PlayMode::Loop, Ordering::SeqCst);
                true
            }
            Err(e) => {
                error!(asset, "Error playing sound file: {}", e);
                false
            }
        }
    }
}

struct Session {
    id: u64,
    request: ListenRequest,
    detector: EnergyDetector,
    hangups_at_start: u64,
}

enum PlaybackWait {
    Finished,
    HungUp,
}

impl Inner {
    /// True once the phone has gone on hook since the session began, or the
    /// orchestrator is shutting down.
    fn cancelled(&self, session: &Session) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
            || self.hook.is_on_hook()
            || self.hook.hangups() != session.hangups_at_start
    }

    fn run_session<S, Q>(&self, session: &Session, on_speech: S, on_silence: Q) -> (Disposition, Option<f64>)
    where
        S: FnOnce(),
        Q: FnOnce(),
    {
        let id = session.id;
        let asset = session.request.asset.as_str();

        let Some(playback) = self.backends.playback.as_ref() else {
            return (Disposition::Error, None);
        };

        // 1. Prompt.
        let path = match self.assets.resolve(asset) {
            Ok(path) => path,
            Err(e) => {
                error!(session = id, asset, stage = "playback", "Playback failed to start: {}", e);
                return (Disposition::Error, None);
            }
        };
        let doorbell = Arc::clone(&self.doorbell);
        let notify: FinishNotify = Box::new(move || doorbell.ring());
        if let Err(e) = playback.play(&path, PlayMode::Once, Some(notify)) {
            error!(session = id, asset, stage = "playback", "Playback failed to start: {}", e);
            return (Disposition::Error, None);
        }
        self.looping.store(false, Ordering::SeqCst);

        // 2. Wait for the prompt to end or the handset to go down.
        match self.wait_for_playback(session, playback.as_ref()) {
            PlaybackWait::HungUp => {
                info!(session = id, asset, "Hung up during playback wait. Cancelling listen.");
                playback.stop();
                return (Disposition::Cancelled, None);
            }
            PlaybackWait::Finished => {}
        }

        // 3-4. Record.
        let recording = match self.record(session) {
            Ok(Some(recording)) => recording,
            Ok(None) => {
                info!(session = id, asset, "Hung up during recording. Discarding capture.");
                return (Disposition::Cancelled, None);
            }
            Err(e) => {
                error!(session = id, asset, stage = "capture", "Recording failed: {}", e);
                return (Disposition::Error, None);
            }
        };

        // 5. Analyze, then drop the samples.
        let analysis = session.detector.classify(&recording);
        drop(recording);

        // 6. Report, unless the handset went down meanwhile.
        if self.cancelled(session) {
            info!(session = id, asset, "Hung up before final callback could be made.");
            return (Disposition::Cancelled, analysis.rms);
        }
        match analysis.disposition {
            Disposition::Speech => {
                info!(session = id, rms = ?analysis.rms, "Speech detected.");
                invoke(id, "on_speech", on_speech);
            }
            _ => {
                info!(session = id, rms = ?analysis.rms, "Silence detected.");
                invoke(id, "on_silence", on_silence);
            }
        }
        (analysis.disposition, analysis.rms)
    }

    fn wait_for_playback(&self, session: &Session, playback: &dyn Playback) -> PlaybackWait {
        debug!(session = session.id, "Waiting for playback to finish or hang-up...");
        let started = Instant::now();
        let mut seen = self.doorbell.current();
        loop {
            if self.cancelled(session) {
                return PlaybackWait::HungUp;
            }
            if !playback.is_playing() {
                if started.elapsed() < self.config.poll_interval {
                    warn!(
                        session = session.id,
                        "Playback didn't start or was instant. Continuing to record."
                    );
                } else {
                    debug!(session = session.id, "Playback finished.");
                }
                return PlaybackWait::Finished;
            }
            seen = self.doorbell.wait(seen, self.config.poll_interval);
        }
    }

    /// `Ok(None)` when the handset went down mid-capture; the partial
    /// recording is dropped with the stream.
    fn record(&self, session: &Session) -> VoiceResult<Option<RecordingBuffer>> {
        if self.cancelled(session) {
            return Ok(None);
        }
        let capture = self
            .backends
            .capture
            .as_ref()
            .ok_or_else(|| VoiceError::Capture("no input device".to_string()))?;

        let listen_for = session.request.listen_for;
        let mut stream = capture.open()?;
        let sample_rate = stream.sample_rate();
        let target = (sample_rate as f64 * listen_for.as_secs_f64()).round() as usize;
        let deadline = Instant::now() + listen_for + self.config.capture_grace;
        // Reserve at most a second up front; longer windows grow per chunk.
        let mut recording =
            RecordingBuffer::with_capacity(sample_rate, target.min(sample_rate as usize));

        info!(
            session = session.id,
            sample_rate,
            "Recording audio for {:.1}s...",
            listen_for.as_secs_f32()
        );

        while recording.len() < target {
            if self.cancelled(session) {
                return Ok(None);
            }
            match stream.next_chunk(self.config.chunk_timeout)? {
                Some(chunk) => {
                    let room = target - recording.len();
                    recording.extend(&chunk[..chunk.len().min(room)]);
                }
                None if Instant::now() >= deadline => {
                    warn!(
                        session = session.id,
                        captured = recording.len(),
                        expected = target,
                        "Capture device stalled, ending recording early"
                    );
                    break;
                }
                None => {}
            }
        }

        debug!(session = session.id, samples = recording.len(), "Recording loop finished.");
        Ok(Some(recording))
    }
}

fn invoke<F: FnOnce()>(session: u64, name: &str, callback: F) {
    if panic::catch_unwind(AssertUnwindSafe(callback)).is_err() {
        error!(session, "Error in {} callback", name);
    }
}
