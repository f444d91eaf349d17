use rotary_voice::VoiceError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LineError {
    #[error("GPIO {pin}: {source}")]
    Gpio {
        pin: u32,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Audio error: {0}")]
    Voice(#[from] VoiceError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl LineError {
    pub fn gpio(pin: u32, source: std::io::Error) -> Self {
        Self::Gpio { pin, source }
    }
}

pub type LineResult<T> = Result<T, LineError>;
