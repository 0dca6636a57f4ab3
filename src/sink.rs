//! Transcript output handling.
//!
//! Pairs with `MediaTrack` on the input side: sessions push decoded
//! transcript events (and recoverable decode errors) into an injected
//! `TranscriptSink`.

use crate::error::RoomscribeError;
use log::warn;
use std::sync::Mutex;
use tokio::sync::mpsc;

/// Decoded transcript text with its arrival order within the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptEvent {
    pub text: String,
    /// 0-based arrival index within the session.
    pub index: u64,
}

/// Pluggable transcript consumer. Implementations must tolerate being
/// called from a session task.
pub trait TranscriptSink: Send + Sync {
    /// Handles one decoded transcript.
    fn on_transcript(&self, event: &TranscriptEvent);

    /// Handles a recoverable error (malformed message). The session keeps
    /// running after this is called.
    fn on_error(&self, error: &RoomscribeError) {
        warn!("[{}] {}", self.name(), error);
    }

    /// Name for logging/debugging.
    fn name(&self) -> &'static str {
        "sink"
    }
}

/// Writes transcript text to stdout, one line per event.
pub struct StdoutSink;

impl TranscriptSink for StdoutSink {
    fn on_transcript(&self, event: &TranscriptEvent) {
        println!("{}", event.text);
    }

    fn name(&self) -> &'static str {
        "stdout"
    }
}

/// Collects events and errors for tests and library use.
#[derive(Default)]
pub struct CollectorSink {
    events: Mutex<Vec<TranscriptEvent>>,
    errors: Mutex<Vec<String>>,
}

impl CollectorSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<TranscriptEvent> {
        self.events.lock().expect("collector lock poisoned").clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().expect("collector lock poisoned").clone()
    }
}

impl TranscriptSink for CollectorSink {
    fn on_transcript(&self, event: &TranscriptEvent) {
        self.events
            .lock()
            .expect("collector lock poisoned")
            .push(event.clone());
    }

    fn on_error(&self, error: &RoomscribeError) {
        self.errors
            .lock()
            .expect("collector lock poisoned")
            .push(error.to_string());
    }

    fn name(&self) -> &'static str {
        "collector"
    }
}

/// Forwards events into a tokio channel, for async consumers.
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<TranscriptEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TranscriptEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl TranscriptSink for ChannelSink {
    fn on_transcript(&self, event: &TranscriptEvent) {
        // Receiver gone means nobody cares anymore; drop silently.
        let _ = self.tx.send(event.clone());
    }

    fn name(&self) -> &'static str {
        "channel"
    }
}
