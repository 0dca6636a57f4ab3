//! Error types for roomscribe.
//!
//! Every error here is session-scoped: a failure in one relay session must
//! never take down another session or the process.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RoomscribeError {
    // Configuration errors
    #[error("Failed to parse configuration: {message}")]
    ConfigParse { message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Container encoder errors
    #[error("Encoder initialization failed: {message}")]
    EncoderInit { message: String },

    #[error("Write on a closed encoder")]
    EncoderClosed,

    // Container stream errors
    #[error("Container stream closed by the consumer")]
    StreamClosed,

    #[error("Container stream error: {message}")]
    Stream { message: String },

    // Recognition connection errors
    #[error("Failed to open recognition connection: {message}")]
    Connect { message: String },

    #[error("Recognition connection error: {message}")]
    Connection { message: String },

    // Media transport errors
    #[error("Track read failed: {message}")]
    Transport { message: String },

    // Transcript decoding errors (recoverable — the listener keeps going)
    #[error("Failed to decode transcript message: {message}")]
    TranscriptDecode { message: String },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Generic error for cases not covered above
    #[error("{0}")]
    Other(String),
}

impl RoomscribeError {
    /// True for errors the transcript listener may skip past without
    /// terminating the session.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, RoomscribeError::TranscriptDecode { .. })
    }
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, RoomscribeError>;
