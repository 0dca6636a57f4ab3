//! Room-level track dispatch.
//!
//! Bridges platform track callbacks to relay sessions: microphone
//! publications get subscribed, subscribed tracks get a session each, and
//! shutdown unwinds every session that is still running.

use crate::error::Result;
use crate::media::{MediaTrack, TrackPublication, TrackSource};
use crate::recognition::RecognitionBackend;
use crate::session::{Session, SessionConfig, SessionHandle, SessionState};
use crate::sink::TranscriptSink;
use log::{debug, error, info};
use std::sync::Arc;
use tokio::sync::Mutex;

pub struct TrackDispatcher {
    backend: Arc<dyn RecognitionBackend>,
    sink: Arc<dyn TranscriptSink>,
    config: SessionConfig,
    sessions: Mutex<Vec<SessionHandle>>,
}

impl TrackDispatcher {
    pub fn new(
        backend: Arc<dyn RecognitionBackend>,
        sink: Arc<dyn TranscriptSink>,
        config: SessionConfig,
    ) -> Self {
        Self {
            backend,
            sink,
            config,
            sessions: Mutex::new(Vec::new()),
        }
    }

    /// Handles a track publication announcement. Only microphone tracks are
    /// subscribed; a subscription failure is logged and the track skipped so
    /// the room keeps running.
    pub fn on_track_published(&self, publication: &mut dyn TrackPublication) {
        if publication.source() != TrackSource::Microphone {
            debug!(
                "ignoring non-microphone publication {} ({:?})",
                publication.sid(),
                publication.source()
            );
            return;
        }
        info!("subscribing to microphone track {}", publication.sid());
        if let Err(e) = publication.set_subscribed(true) {
            error!("failed to subscribe to track {}: {}", publication.sid(), e);
        }
    }

    /// Handles a delivered subscription by starting a relay session for it.
    pub async fn on_track_subscribed(&self, track: Box<dyn MediaTrack>) -> Result<()> {
        let sid = track.sid().to_string();
        match Session::start(
            track,
            self.backend.clone(),
            self.sink.clone(),
            self.config.clone(),
        )
        .await
        {
            Ok(handle) => {
                self.sessions.lock().await.push(handle);
                Ok(())
            }
            Err(e) => {
                error!("failed to start session for track {}: {}", sid, e);
                Err(e)
            }
        }
    }

    /// Number of sessions that have not yet closed. Closed handles are
    /// pruned as a side effect.
    pub async fn active_sessions(&self) -> usize {
        let mut sessions = self.sessions.lock().await;
        sessions.retain(|handle| handle.state() != SessionState::Closed);
        sessions.len()
    }

    /// Closes every running session and waits for each to finish.
    pub async fn shutdown(&self) {
        let sessions = std::mem::take(&mut *self.sessions.lock().await);
        info!("shutting down {} session(s)", sessions.len());
        for handle in &sessions {
            handle.close();
        }
        for mut handle in sessions {
            handle.closed().await;
        }
    }
}
