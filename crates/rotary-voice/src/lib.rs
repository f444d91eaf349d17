//! # Rotary Voice - handset audio orchestration
//!
//! Everything the telephone prop does with sound: play prompts into the
//! earpiece, record the caller, and decide whether they said anything.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     Audio Orchestrator                        │
//! │  ┌──────────────┐   ┌──────────────┐   ┌──────────────┐      │
//! │  │  Playback    │ → │   Capture    │ → │ Energy (RMS) │      │
//! │  │   (rodio)    │   │    (cpal)    │   │  threshold   │      │
//! │  └──────────────┘   └──────────────┘   └──────────────┘      │
//! │         ↑                  ↑                   ↓              │
//! │  ┌──────────────────────────────────┐  on_speech/on_silence  │
//! │  │   HookReader (hang-up cancels)   │                        │
//! │  └──────────────────────────────────┘                        │
//! └──────────────────────────────────────────────────────────────┘
//! ```

pub mod assets;
pub mod audio;
pub mod energy;
pub mod error;
pub mod hook;
pub mod orchestrator;
pub mod session;

pub use assets::AssetLibrary;
pub use audio::{
    CaptureDevice, CaptureStream, CpalCapture, FinishNotify, PlayMode, Playback, RodioPlayback,
};
pub use energy::{EnergyDetector, RecordingBuffer};
pub use error::{VoiceError, VoiceResult};
pub use hook::{HookReader, HookSignal, HookState};
pub use orchestrator::{AudioBackends, AudioOrchestrator, OrchestratorConfig};
pub use session::{Disposition, ListenRequest, SessionHandle, SessionReport, MAX_LISTEN};
