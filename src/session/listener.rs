//! Transcript listener: consumes inbound messages from the recognition
//! connection.
//!
//! Runs concurrently with the stream bridge on the other half of the same
//! connection. A malformed message is reported through the sink's error
//! channel and skipped — it must never end the session. A connection-level
//! read failure does end the session.

use crate::error::Result;
use crate::recognition::{RecognitionReader, schema};
use crate::sink::{TranscriptEvent, TranscriptSink};
use log::{debug, trace};
use std::sync::Arc;
use tokio::sync::watch;

pub struct TranscriptListener;

impl TranscriptListener {
    pub fn new() -> Self {
        Self
    }

    /// Inbound loop. Returns `Ok` on clean connection close or
    /// cancellation, `Err` on a connection failure.
    pub async fn run(
        &self,
        mut reader: Box<dyn RecognitionReader>,
        sink: Arc<dyn TranscriptSink>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<()> {
        let mut index = 0u64;
        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        debug!("transcript listener cancelled after {} events", index);
                        return Ok(());
                    }
                }
                message = reader.receive() => match message {
                    Ok(Some(raw)) => match schema::extract_transcript(&raw) {
                        Ok(text) if text.is_empty() => {
                            // Interim messages with no text yet are routine.
                            trace!("skipping empty transcript");
                        }
                        Ok(text) => {
                            sink.on_transcript(&TranscriptEvent { text, index });
                            index += 1;
                        }
                        Err(error) => sink.on_error(&error),
                    },
                    Ok(None) => {
                        debug!("recognition connection closed after {} events", index);
                        return Ok(());
                    }
                    Err(e) => return Err(e),
                }
            }
        }
    }
}

impl Default for TranscriptListener {
    fn default() -> Self {
        Self::new()
    }
}
