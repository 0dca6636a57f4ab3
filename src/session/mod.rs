//! Per-track relay sessions.
//!
//! A session owns three tasks wired around one recognition connection: the
//! frame relay (track packets into the container encoder), the stream bridge
//! (container bytes out to the backend), and the transcript listener
//! (backend messages into the sink). The tasks share a single cancellation
//! signal; whichever finishes first, for any reason, trips it so the other
//! two wind down, and the session reports `Closed` once all three have
//! returned.

mod bridge;
mod listener;
mod relay;

pub use bridge::{StreamBridge, StreamBridgeConfig};
pub use listener::TranscriptListener;
pub use relay::FrameRelay;

use crate::error::{Result, RoomscribeError};
use crate::media::MediaTrack;
use crate::recognition::{RecognitionBackend, RecognitionOptions};
use crate::sink::TranscriptSink;
use crate::stream::container_stream;
use log::{debug, error, info};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Lifecycle of a relay session.
///
/// Transitions are monotonic: `Created` → `Connecting` → `Active` →
/// `Closing` → `Closed`, with a direct jump to `Closed` when the backend
/// connection cannot be opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Created,
    Connecting,
    Active,
    Closing,
    Closed,
}

/// Knobs for a single session.
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    pub options: RecognitionOptions,
    pub bridge: StreamBridgeConfig,
}

impl SessionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(mut self, options: RecognitionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_bridge(mut self, bridge: StreamBridgeConfig) -> Self {
        self.bridge = bridge;
        self
    }
}

pub struct Session;

impl Session {
    /// Opens a recognition connection for `track` and spawns the relay
    /// tasks. Returns once the session is active (or the connection failed).
    pub async fn start(
        track: Box<dyn MediaTrack>,
        backend: Arc<dyn RecognitionBackend>,
        sink: Arc<dyn TranscriptSink>,
        config: SessionConfig,
    ) -> Result<SessionHandle> {
        let sid = track.sid().to_string();
        let state = Arc::new(watch::channel(SessionState::Created).0);
        let state_rx = state.subscribe();

        state.send_replace(SessionState::Connecting);
        info!("session {}: connecting", sid);

        let connection = match backend.open(&config.options).await {
            Ok(connection) => connection,
            Err(e) => {
                error!("session {}: connect failed: {}", sid, e);
                state.send_replace(SessionState::Closed);
                return Err(e);
            }
        };
        let (recognition_writer, recognition_reader) = connection.split();
        let (stream_writer, stream_reader) = container_stream();

        let shutdown = Arc::new(watch::channel(false).0);

        // The relay and bridge ending cleanly (end of track, end of stream)
        // must not cancel the others: the bridge still has to drain the
        // container stream, and the listener still has to drain transcripts
        // until the backend closes. The listener ending means no transcript
        // can ever arrive again, so it always begins teardown.
        let intake = supervise(
            "frame relay",
            &sid,
            TeardownOn::Error,
            FrameRelay::new(stream_writer).run(track, shutdown.subscribe()),
            state.clone(),
            shutdown.clone(),
        );
        let bridge_config = config.bridge.clone();
        let shutdown_rx = shutdown.subscribe();
        let bridging = supervise(
            "stream bridge",
            &sid,
            TeardownOn::Error,
            async move {
                StreamBridge::with_config(bridge_config)
                    .run(stream_reader, recognition_writer, shutdown_rx)
                    .await
            },
            state.clone(),
            shutdown.clone(),
        );
        let listener_sink = sink.clone();
        let shutdown_rx = shutdown.subscribe();
        let listening = supervise(
            "transcript listener",
            &sid,
            TeardownOn::Exit,
            async move {
                TranscriptListener::new()
                    .run(recognition_reader, listener_sink, shutdown_rx)
                    .await
            },
            state.clone(),
            shutdown.clone(),
        );

        state.send_replace(SessionState::Active);
        info!("session {}: active", sid);

        let supervisor_state = state.clone();
        let supervisor_sid = sid.clone();
        tokio::spawn(async move {
            let _ = tokio::join!(intake, bridging, listening);
            supervisor_state.send_replace(SessionState::Closed);
            info!("session {}: closed", supervisor_sid);
        });

        Ok(SessionHandle {
            sid,
            state,
            state_rx,
            shutdown,
        })
    }
}

/// When a finished task should begin session teardown.
#[derive(Clone, Copy, PartialEq, Eq)]
enum TeardownOn {
    /// Only a failure trips the cancellation signal.
    Error,
    /// Any exit, clean or failed, trips it.
    Exit,
}

/// Runs one session task to completion, then triggers the shared teardown
/// per its policy.
fn supervise<F>(
    task: &'static str,
    sid: &str,
    teardown: TeardownOn,
    future: F,
    state: Arc<watch::Sender<SessionState>>,
    shutdown: Arc<watch::Sender<bool>>,
) -> JoinHandle<()>
where
    F: Future<Output = Result<()>> + Send + 'static,
{
    let sid = sid.to_string();
    tokio::spawn(async move {
        let trip = match future.await {
            Ok(()) => {
                debug!("session {}: {} finished", sid, task);
                teardown == TeardownOn::Exit
            }
            Err(RoomscribeError::StreamClosed) => {
                debug!("session {}: {} observed closed stream", sid, task);
                true
            }
            Err(e) => {
                error!("session {}: {} failed: {}", sid, task, e);
                true
            }
        };
        if trip {
            begin_teardown(&state, &shutdown);
        }
    })
}

fn begin_teardown(state: &watch::Sender<SessionState>, shutdown: &watch::Sender<bool>) {
    state.send_if_modified(|s| {
        if *s == SessionState::Active {
            *s = SessionState::Closing;
            true
        } else {
            false
        }
    });
    let _ = shutdown.send(true);
}

/// Control surface for a running session.
#[derive(Debug)]
pub struct SessionHandle {
    sid: String,
    state: Arc<watch::Sender<SessionState>>,
    state_rx: watch::Receiver<SessionState>,
    shutdown: Arc<watch::Sender<bool>>,
}

impl SessionHandle {
    pub fn sid(&self) -> &str {
        &self.sid
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        *self.state_rx.borrow()
    }

    /// Requests teardown. Idempotent; the session reaches `Closed` once all
    /// tasks have unwound.
    pub fn close(&self) {
        begin_teardown(&self.state, &self.shutdown);
    }

    /// Waits until the session has fully closed.
    pub async fn closed(&mut self) {
        let _ = self
            .state_rx
            .wait_for(|s| *s == SessionState::Closed)
            .await;
    }
}
