//! roomscribe - per-participant audio relay for streaming speech recognition
//!
//! Subscribed microphone tracks are packaged into an Ogg/Opus container
//! stream and relayed over a persistent duplex connection to a recognition
//! backend; transcript events come back through a pluggable sink.

// Enforce error handling discipline
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod cli;
pub mod config;
pub mod error;
pub mod media;
pub mod ogg;
pub mod recognition;
pub mod room;
pub mod session;
pub mod sink;
pub mod stream;

// Collaborator seams (source → container → backend → sink)
pub use media::{AudioFrame, CodecParameters, MediaTrack, TrackPublication, TrackSource};
pub use recognition::{RecognitionBackend, RecognitionOptions, TcpRecognitionBackend};
pub use sink::{ChannelSink, CollectorSink, StdoutSink, TranscriptEvent, TranscriptSink};

// Session pipeline
pub use room::TrackDispatcher;
pub use session::{Session, SessionConfig, SessionHandle, SessionState};

// Error handling
pub use error::{Result, RoomscribeError};

// Config
pub use config::Config;

/// Build version string with optional git commit hash.
///
/// Returns `"0.1.0+abc1234"` when git hash is available, `"0.1.0"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}
