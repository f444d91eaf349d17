#![allow(dead_code)]

use rotary_line::PhoneEvents;
use rotary_voice::{
    AudioBackends, CaptureDevice, CaptureStream, FinishNotify, PlayMode, Playback, VoiceResult,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::thread;
use std::time::{Duration, Instant};

pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::new("debug"))
            .with_test_writer()
            .try_init();
    });
}

/// Earpiece whose clips last `clip_len` and never actually sound.
pub struct Earpiece {
    clip_len: Duration,
    /// Bumped by every play and stop; a stale end-of-clip notice is dropped.
    generation: Arc<AtomicU64>,
    state: Mutex<(Option<Instant>, bool)>,
    pub played: Mutex<Vec<PathBuf>>,
}

impl Earpiece {
    pub fn new(clip_len: Duration) -> Arc<Self> {
        Arc::new(Self {
            clip_len,
            generation: Arc::new(AtomicU64::new(0)),
            state: Mutex::new((None, false)),
            played: Mutex::new(Vec::new()),
        })
    }

    pub fn played_names(&self) -> Vec<String> {
        self.played
            .lock()
            .unwrap()
            .iter()
            .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
            .collect()
    }

    pub fn is_playing_now(&self) -> bool {
        Playback::is_playing(self)
    }
}

impl Playback for Earpiece {
    fn play(&self, path: &Path, mode: PlayMode, on_finish: Option<FinishNotify>) -> VoiceResult<()> {
        self.played.lock().unwrap().push(path.to_path_buf());
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        *self.state.lock().unwrap() = (Some(Instant::now() + self.clip_len), mode == PlayMode::Loop);
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
        self.generation.fetch_add(1, Ordering::SeqCst);
        *self.state.lock().unwrap() = (None, false);
    }

    fn is_playing(&self) -> bool {
        let state = self.state.lock().unwrap();
        state.1 || state.0.map_or(false, |until| Instant::now() < until)
    }

    fn set_volume(&self, _volume: f32) {}
}

/// Microphone hearing a constant level.
pub struct Mic {
    pub level: i16,
}

impl CaptureDevice for Mic {
    fn open(&self) -> VoiceResult<Box<dyn CaptureStream>> {
        Ok(Box::new(MicStream { level: self.level }))
    }
}

struct MicStream {
    level: i16,
}

impl CaptureStream for MicStream {
    fn sample_rate(&self) -> u32 {
        8000
    }

    fn next_chunk(&mut self, _timeout: Duration) -> VoiceResult<Option<Vec<i16>>> {
        thread::sleep(Duration::from_millis(5));
        Ok(Some(
            (0..400)
                .map(|i| if i % 2 == 0 { self.level } else { -self.level })
                .collect(),
        ))
    }
}

pub fn backends(earpiece: &Arc<Earpiece>, level: i16) -> AudioBackends {
    AudioBackends {
        playback: Some(earpiece.clone()),
        capture: Some(Arc::new(Mic { level })),
    }
}

/// Records every outward event by name.
#[derive(Default)]
pub struct EventLog {
    seen: Mutex<Vec<String>>,
}

impl EventLog {
    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }

    fn push(&self, event: impl Into<String>) {
        self.seen.lock().unwrap().push(event.into());
    }
}

impl PhoneEvents for EventLog {
    fn picked_up(&self) {
        self.push("pickup");
    }
    fn hung_up(&self) {
        self.push("hangup");
    }
    fn user_spoke(&self) {
        self.push("user_spoke");
    }
    fn user_silent(&self) {
        self.push("user_silent");
    }
    fn number_dialed(&self, number: &str) {
        self.push(format!("dialed:{}", number));
    }
}

pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}
