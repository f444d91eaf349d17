//! Audio capture and playback using CPAL and Rodio
//!
//! Both sides sit behind small traits ([`Playback`], [`CaptureDevice`]) so the
//! orchestrator can be exercised without a sound card.

use crate::error::{VoiceError, VoiceResult};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, SizedSample, Stream, StreamConfig};
use rodio::source::EmptyCallback;
use rodio::{Decoder, OutputStream, Sink, Source};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Invoked once when a one-shot clip has drained from the channel.
pub type FinishNotify = Box<dyn Fn() + Send + 'static>;

/// How a clip is put on the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayMode {
    Once,
    Loop,
}

/// The single output channel of the handset earpiece.
pub trait Playback: Send + Sync {
    /// Replace whatever is on the channel with `path`.
    fn play(&self, path: &Path, mode: PlayMode, on_finish: Option<FinishNotify>) -> VoiceResult<()>;

    /// Stop playback immediately and clear the queue.
    fn stop(&self);

    /// Whether anything is queued or playing.
    fn is_playing(&self) -> bool;

    fn set_volume(&self, volume: f32);
}

/// Something that can be opened for a recording.
pub trait CaptureDevice: Send + Sync {
    fn open(&self) -> VoiceResult<Box<dyn CaptureStream>>;
}

/// An open recording. Dropping it releases the device.
pub trait CaptureStream {
    fn sample_rate(&self) -> u32;

    /// Next chunk of mono samples, or `Ok(None)` if nothing arrived within `timeout`.
    fn next_chunk(&mut self, timeout: Duration) -> VoiceResult<Option<Vec<i16>>>;
}

/// Earpiece playback through a `rodio::Sink`.
///
/// `rodio::OutputStream` is not `Send`, so it lives on a keeper thread for
/// as long as this value exists; only the sink is shared.
pub struct RodioPlayback {
    sink: Arc<Sink>,
    shutdown_tx: Option<Sender<()>>,
    keeper: Option<thread::JoinHandle<()>>,
}

impl RodioPlayback {
    /// Open the default output device.
    pub fn open() -> VoiceResult<Self> {
        info!("🔊 Initializing audio playback");

        let (ready_tx, ready_rx) = mpsc::channel::<VoiceResult<Arc<Sink>>>();
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        let keeper = thread::Builder::new()
            .name("rotary-output".to_string())
            .spawn(move || {
                let (stream, handle) = match OutputStream::try_default() {
                    Ok(pair) => pair,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e.into()));
                        return;
                    }
                };
                let sink = match Sink::try_new(&handle) {
                    Ok(sink) => sink,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e.into()));
                        return;
                    }
                };
                if ready_tx.send(Ok(Arc::new(sink))).is_err() {
                    return;
                }
                // Hold the stream open until the owner goes away.
                let _ = shutdown_rx.recv();
                drop(handle);
                drop(stream);
            })?;

        let sink = match ready_rx.recv() {
            Ok(result) => result,
            Err(_) => Err(VoiceError::HardwareUnavailable(
                "output thread exited before opening a stream".to_string(),
            )),
        };
        let sink = match sink {
            Ok(sink) => sink,
            Err(e) => {
                let _ = keeper.join();
                return Err(e);
            }
        };

        info!("✅ Audio playback initialized");

        Ok(Self {
            sink,
            shutdown_tx: Some(shutdown_tx),
            keeper: Some(keeper),
        })
    }
}

impl Playback for RodioPlayback {
    fn play(&self, path: &Path, mode: PlayMode, on_finish: Option<FinishNotify>) -> VoiceResult<()> {
        let asset = path.display().to_string();
        let file = File::open(path).map_err(|e| VoiceError::playback(&asset, e))?;
        let reader = BufReader::new(file);

        // Decode before touching the channel so a corrupt clip leaves it alone.
        match mode {
            PlayMode::Once => {
                let source = Decoder::new(reader).map_err(|e| VoiceError::playback(&asset, e))?;
                self.sink.stop();
                self.sink.append(source.convert_samples::<f32>());
                if let Some(notify) = on_finish {
                    self.sink.append(EmptyCallback::<f32>::new(notify));
                }
            }
            PlayMode::Loop => {
                let source =
                    Decoder::new_looped(reader).map_err(|e| VoiceError::playback(&asset, e))?;
                self.sink.stop();
                self.sink.append(source.convert_samples::<f32>());
            }
        }
        self.sink.play();
        debug!(asset = %asset, ?mode, "clip queued");
        Ok(())
    }

    fn stop(&self) {
        self.sink.stop();
        debug!("⏹️ Audio playback stopped");
    }

    fn is_playing(&self) -> bool {
        !self.sink.empty()
    }

    fn set_volume(&self, volume: f32) {
        self.sink.set_volume(volume);
    }
}

impl Drop for RodioPlayback {
    fn drop(&mut self) {
        self.sink.stop();
        self.shutdown_tx = None;
        if let Some(keeper) = self.keeper.take() {
            let _ = keeper.join();
        }
    }
}

/// Microphone capture from the default CPAL input device.
#[derive(Debug, Clone)]
pub struct CpalCapture {
    /// Samples per delivered chunk (per channel, after down-mixing).
    chunk_size: usize,
}

impl CpalCapture {
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
        }
    }

    /// Whether a default input device exists right now.
    pub fn is_available() -> bool {
        cpal::default_host().default_input_device().is_some()
    }
}

impl Default for CpalCapture {
    fn default() -> Self {
        // 1024 frames, the same chunking the handset has always recorded with.
        Self::new(1024)
    }
}

impl CaptureDevice for CpalCapture {
    fn open(&self) -> VoiceResult<Box<dyn CaptureStream>> {
        let device = cpal::default_host()
            .default_input_device()
            .ok_or_else(|| VoiceError::Capture("No input device available".to_string()))?;

        debug!(
            "🎤 Opening input device: {}",
            device.name().unwrap_or_else(|_| "Unknown".to_string())
        );

        let default_config = device.default_input_config()?;
        let sample_rate = default_config.sample_rate().0;
        let channels = default_config.channels() as usize;
        let stream_config: StreamConfig = default_config.clone().into();
        let (tx, rx) = mpsc::channel();

        let stream = match default_config.sample_format() {
            SampleFormat::F32 => build_mono_stream::<f32>(
                &device,
                &stream_config,
                channels,
                self.chunk_size,
                tx,
                |s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16,
            )?,
            SampleFormat::I16 => build_mono_stream::<i16>(
                &device,
                &stream_config,
                channels,
                self.chunk_size,
                tx,
                |s| s,
            )?,
            SampleFormat::U16 => build_mono_stream::<u16>(
                &device,
                &stream_config,
                channels,
                self.chunk_size,
                tx,
                |s| (s as i32 - 32768) as i16,
            )?,
            other => {
                return Err(VoiceError::Capture(format!(
                    "Unsupported sample format {:?} (need F32, I16 or U16)",
                    other
                )))
            }
        };

        stream.play()?;
        debug!(sample_rate, channels, "capture stream started");

        Ok(Box::new(CpalStream {
            _stream: stream,
            rx,
            sample_rate,
        }))
    }
}

type ChunkResult = Result<Vec<i16>, String>;

fn build_mono_stream<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    channels: usize,
    chunk_size: usize,
    tx: Sender<ChunkResult>,
    convert: fn(T) -> i16,
) -> VoiceResult<Stream>
where
    T: SizedSample + Send + 'static,
{
    let channels = channels.max(1);
    let mut pending: Vec<i16> = Vec::with_capacity(chunk_size);
    let data_tx = tx.clone();

    let stream = device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            for frame in data.chunks(channels) {
                let sum: i32 = frame.iter().map(|&s| convert(s) as i32).sum();
                pending.push((sum / frame.len() as i32) as i16);

                if pending.len() >= chunk_size {
                    let chunk = std::mem::replace(&mut pending, Vec::with_capacity(chunk_size));
                    // Receiver gone means the recording already ended.
                    let _ = data_tx.send(Ok(chunk));
                }
            }
        },
        move |err| {
            warn!("Audio stream error: {}", err);
            let _ = tx.send(Err(err.to_string()));
        },
        None,
    )?;

    Ok(stream)
}

struct CpalStream {
    _stream: Stream,
    rx: Receiver<ChunkResult>,
    sample_rate: u32,
}

impl CaptureStream for CpalStream {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn next_chunk(&mut self, timeout: Duration) -> VoiceResult<Option<Vec<i16>>> {
        match self.rx.recv_timeout(timeout) {
            Ok(Ok(chunk)) => Ok(Some(chunk)),
            Ok(Err(e)) => Err(VoiceError::Capture(e)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => {
                Err(VoiceError::Capture("capture stream closed".to_string()))
            }
        }
    }
}
