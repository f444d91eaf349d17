//! Bell ringer: two coils pulled alternately so the clapper swings.

use crate::gpio::OutputPin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct RingPattern {
    /// Left-right swings per burst (default: 10).
    pub cycles: u32,
    /// Time each coil is held (default: 50ms).
    pub half_cycle: Duration,
}

impl Default for RingPattern {
    fn default() -> Self {
        Self {
            cycles: 10,
            half_cycle: Duration::from_millis(50),
        }
    }
}

#[derive(Default)]
struct Burst {
    /// Dropping this wakes and ends the burst.
    cancel: Option<mpsc::Sender<()>>,
    worker: Option<thread::JoinHandle<()>>,
}

pub struct Ringer {
    left: Arc<dyn OutputPin>,
    right: Arc<dyn OutputPin>,
    pattern: RingPattern,
    ringing: Arc<AtomicBool>,
    burst: Mutex<Burst>,
}

impl Ringer {
    pub fn new(left: Arc<dyn OutputPin>, right: Arc<dyn OutputPin>, pattern: RingPattern) -> Self {
        Self {
            left,
            right,
            pattern,
            ringing: Arc::new(AtomicBool::new(false)),
            burst: Mutex::new(Burst::default()),
        }
    }

    pub fn is_ringing(&self) -> bool {
        self.ringing.load(Ordering::SeqCst)
    }

    /// Start one burst in the background. Returns false if one is already running.
    pub fn ring(&self) -> bool {
        let mut burst = self.lock();
        if self.ringing.swap(true, Ordering::SeqCst) {
            debug!("Ringer already ringing");
            return false;
        }
        if let Some(old) = burst.worker.take() {
            let _ = old.join();
        }

        let (cancel, cancelled) = mpsc::channel::<()>();
        let coils = Coils {
            left: Arc::clone(&self.left),
            right: Arc::clone(&self.right),
        };
        let pattern = self.pattern.clone();
        let ringing = Arc::clone(&self.ringing);

        let spawned = thread::Builder::new()
            .name("rotary-ringer".to_string())
            .spawn(move || {
                info!("🔔 Ringing...");
                coils.burst(&pattern, &cancelled);
                coils.release();
                ringing.store(false, Ordering::SeqCst);
            });
        match spawned {
            Ok(worker) => {
                burst.cancel = Some(cancel);
                burst.worker = Some(worker);
                true
            }
            Err(e) => {
                warn!("Could not start ringer thread: {}", e);
                self.ringing.store(false, Ordering::SeqCst);
                false
            }
        }
    }

    /// Stop a burst in progress and release both coils.
    pub fn silence(&self) {
        let mut burst = self.lock();
        burst.cancel.take();
        if let Some(worker) = burst.worker.take() {
            let _ = worker.join();
        }
        Coils {
            left: Arc::clone(&self.left),
            right: Arc::clone(&self.right),
        }
        .release();
    }

    /// Block until the current burst, if any, is over.
    pub fn wait(&self) {
        let worker = self.lock().worker.take();
        if let Some(worker) = worker {
            let _ = worker.join();
        }
    }

    fn lock(&self) -> MutexGuard<'_, Burst> {
        match self.burst.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Drop for Ringer {
    fn drop(&mut self) {
        self.silence();
    }
}

struct Coils {
    left: Arc<dyn OutputPin>,
    right: Arc<dyn OutputPin>,
}

impl Coils {
    fn burst(&self, pattern: &RingPattern, cancelled: &mpsc::Receiver<()>) {
        for _ in 0..pattern.cycles {
            let swings = [(&self.right, &self.left), (&self.left, &self.right)];
            for (off, on) in swings {
                if let Err(e) = off.set_active(false).and_then(|_| on.set_active(true)) {
                    warn!("Ringer coil write failed, stopping burst: {}", e);
                    return;
                }
                match cancelled.recv_timeout(pattern.half_cycle) {
                    Err(RecvTimeoutError::Timeout) => {}
                    _ => {
                        debug!("Ringer silenced mid-burst");
                        return;
                    }
                }
            }
            self.release();
        }
    }

    fn release(&self) {
        for coil in [&self.left, &self.right] {
            if let Err(e) = coil.set_active(false) {
                warn!("Could not release ringer coil: {}", e);
            }
        }
    }
}
