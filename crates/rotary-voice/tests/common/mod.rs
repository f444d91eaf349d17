//! In-memory stand-ins for the earpiece and microphone.

#![allow(dead_code)]

use rotary_voice::{
    CaptureDevice, CaptureStream, FinishNotify, PlayMode, Playback, VoiceError, VoiceResult,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::thread;
use std::time::{Duration, Instant};

pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::new("rotary_voice=debug"))
            .with_test_writer()
            .try_init();
    });
}

/// Plays every clip for a fixed length of wall-clock time.
pub struct FakePlayback {
    clip_len: Duration,
    state: Mutex<PlayState>,
    generation: Arc<AtomicU64>,
    pub plays: Mutex<Vec<(PathBuf, PlayMode)>>,
    pub stops: AtomicUsize,
    pub fail: AtomicBool,
}

#[derive(Default)]
struct PlayState {
    until: Option<Instant>,
    looping: bool,
}

impl FakePlayback {
    pub fn new(clip_len: Duration) -> Arc<Self> {
        Arc::new(Self {
            clip_len,
            state: Mutex::new(PlayState::default()),
            generation: Arc::new(AtomicU64::new(0)),
            plays: Mutex::new(Vec::new()),
            stops: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
        })
    }

    pub fn play_count(&self) -> usize {
        self.plays.lock().unwrap().len()
    }

    pub fn last_played(&self) -> Option<(PathBuf, PlayMode)> {
        self.plays.lock().unwrap().last().cloned()
    }

    pub fn is_playing_now(&self) -> bool {
        Playback::is_playing(self)
    }
}

impl Playback for FakePlayback {
    fn play(&self, path: &Path, mode: PlayMode, on_finish: Option<FinishNotify>) -> VoiceResult<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(VoiceError::playback(path.display().to_string(), "corrupt clip"));
        }
        self.plays.lock().unwrap().push((path.to_path_buf(), mode));
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        {
            let mut state = self.state.lock().unwrap();
            state.until = Some(Instant::now() + self.clip_len);
            state.looping = mode == PlayMode::Loop;
        }
        if let Some(notify) = on_finish {
            let current = Arc::clone(&self.generation);
            let clip_len = self.clip_len;
            thread::spawn(move || {
                thread::sleep(clip_len);
                if current.load(Ordering::SeqCst) == generation {
                    notify();
                }
            });
        }
        Ok(())
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.generation.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();
        state.until = None;
        state.looping = false;
    }

    fn is_playing(&self) -> bool {
        let state = self.state.lock().unwrap();
        state.looping || state.until.map_or(false, |until| Instant::now() < until)
    }

    fn set_volume(&self, _volume: f32) {}
}

/// Microphone producing a constant-amplitude square wave.
pub struct FakeCapture {
    pub level: i16,
    pub sample_rate: u32,
    pub chunk: usize,
    /// Wall-clock delay per delivered chunk.
    pub pace: Duration,
    pub fail_open: bool,
    pub opened: Arc<AtomicUsize>,
    pub released: Arc<AtomicUsize>,
}

impl FakeCapture {
    pub fn new(level: i16) -> Arc<Self> {
        Arc::new(Self::with(level, Duration::from_millis(5), false))
    }

    pub fn with(level: i16, pace: Duration, fail_open: bool) -> Self {
        Self {
            level,
            sample_rate: 8000,
            chunk: 400,
            pace,
            fail_open,
            opened: Arc::new(AtomicUsize::new(0)),
            released: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl CaptureDevice for FakeCapture {
    fn open(&self) -> VoiceResult<Box<dyn CaptureStream>> {
        if self.fail_open {
            return Err(VoiceError::Capture("device busy".to_string()));
        }
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeStream {
            level: self.level,
            sample_rate: self.sample_rate,
            chunk: self.chunk,
            pace: self.pace,
            flip: false,
            released: Arc::clone(&self.released),
        }))
    }
}

struct FakeStream {
    level: i16,
    sample_rate: u32,
    chunk: usize,
    pace: Duration,
    flip: bool,
    released: Arc<AtomicUsize>,
}

impl CaptureStream for FakeStream {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn next_chunk(&mut self, _timeout: Duration) -> VoiceResult<Option<Vec<i16>>> {
        thread::sleep(self.pace);
        let chunk = (0..self.chunk)
            .map(|_| {
                self.flip = !self.flip;
                if self.flip {
                    self.level
                } else {
                    -self.level
                }
            })
            .collect();
        Ok(Some(chunk))
    }
}

impl Drop for FakeStream {
    fn drop(&mut self) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

/// Poll `condition` until it holds or `timeout` passes.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    condition()
}

/// Temp asset directory holding `prompt.wav` and `ring.wav`.
pub fn asset_dir() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("prompt.wav"), b"RIFF").unwrap();
    std::fs::write(dir.path().join("ring.wav"), b"RIFF").unwrap();
    dir
}
