//! Error types for the handset audio path

use thiserror::Error;

/// Result type alias for audio operations
pub type VoiceResult<T> = Result<T, VoiceError>;

/// Errors that can occur while driving the handset audio channel
#[derive(Error, Debug)]
pub enum VoiceError {
    /// No output device or channel could be opened at startup.
    #[error("Audio hardware unavailable: {0}")]
    HardwareUnavailable(String),

    #[error("Playback failed for '{asset}': {reason}")]
    Playback { asset: String, reason: String },

    #[error("Capture failed: {0}")]
    Capture(String),

    #[error("Asset not found: {0}")]
    AssetNotFound(String),

    /// The handset is on the hook, so nothing may be started.
    #[error("Phone is on hook")]
    OnHook,

    /// A play-and-listen session is already running on the single channel.
    #[error("Another play-and-listen session is already active")]
    SessionBusy,

    #[error("Audio orchestrator is shutting down")]
    ShuttingDown,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl VoiceError {
    pub fn playback(asset: impl Into<String>, reason: impl ToString) -> Self {
        VoiceError::Playback {
            asset: asset.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<cpal::DefaultStreamConfigError> for VoiceError {
    fn from(err: cpal::DefaultStreamConfigError) -> Self {
        VoiceError::Capture(err.to_string())
    }
}

impl From<cpal::BuildStreamError> for VoiceError {
    fn from(err: cpal::BuildStreamError) -> Self {
        VoiceError::Capture(err.to_string())
    }
}

impl From<cpal::PlayStreamError> for VoiceError {
    fn from(err: cpal::PlayStreamError) -> Self {
        VoiceError::Capture(err.to_string())
    }
}

impl From<rodio::StreamError> for VoiceError {
    fn from(err: rodio::StreamError) -> Self {
        VoiceError::HardwareUnavailable(err.to_string())
    }
}

impl From<rodio::PlayError> for VoiceError {
    fn from(err: rodio::PlayError) -> Self {
        VoiceError::HardwareUnavailable(err.to_string())
    }
}
