//! Streaming speech-recognition backend seam.
//!
//! The backend is an external collaborator reached over one persistent
//! duplex connection per session: binary audio out, JSON transcript
//! messages in. The traits here are the whole contract; `tcp` ships a
//! socket implementation and `MockRecognitionBackend` a scriptable one for
//! tests.

pub mod schema;
mod tcp;

pub use tcp::TcpRecognitionBackend;

use crate::error::{Result, RoomscribeError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// Options sent when opening a streaming recognition session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecognitionOptions {
    pub language: String,
    pub punctuate: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl Default for RecognitionOptions {
    fn default() -> Self {
        Self {
            language: "en-US".to_string(),
            punctuate: true,
            model: None,
        }
    }
}

/// Opens streaming connections to the recognition service.
#[async_trait]
pub trait RecognitionBackend: Send + Sync {
    async fn open(&self, options: &RecognitionOptions) -> Result<RecognitionConnection>;
}

/// Outbound half of a connection. Exactly one task holds it.
#[async_trait]
pub trait RecognitionWriter: Send {
    /// Sends one binary audio message.
    async fn send_binary(&mut self, message: &[u8]) -> Result<()>;
}

/// Inbound half of a connection. Exactly one task holds it.
#[async_trait]
pub trait RecognitionReader: Send {
    /// Receives the next raw transcript message; `Ok(None)` means the
    /// backend closed the connection cleanly.
    async fn receive(&mut self) -> Result<Option<String>>;
}

/// A connected duplex session, split into its two halves so the sending and
/// receiving tasks never share state.
pub struct RecognitionConnection {
    writer: Box<dyn RecognitionWriter>,
    reader: Box<dyn RecognitionReader>,
}

impl std::fmt::Debug for RecognitionConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecognitionConnection").finish_non_exhaustive()
    }
}

impl RecognitionConnection {
    pub fn new(writer: Box<dyn RecognitionWriter>, reader: Box<dyn RecognitionReader>) -> Self {
        Self { writer, reader }
    }

    pub fn split(self) -> (Box<dyn RecognitionWriter>, Box<dyn RecognitionReader>) {
        (self.writer, self.reader)
    }
}

// ============================================================================
// Mock backend
// ============================================================================

#[derive(Debug, Clone, Default)]
struct MockScript {
    responses: Vec<String>,
    echo_after_bytes: Option<(usize, String)>,
    fail_connect: Option<String>,
    fail_send: Option<String>,
    fail_receive: Option<String>,
    hold_open: bool,
}

/// Scriptable in-memory backend for tests and library consumers.
///
/// Sent audio is recorded and can be inspected after the session; inbound
/// messages are scripted, optionally echoed only after a byte threshold has
/// been received (to model a backend that answers once the stream is
/// complete).
#[derive(Clone, Default)]
pub struct MockRecognitionBackend {
    script: MockScript,
    sent: Arc<Mutex<Vec<Vec<u8>>>>,
    opened_with: Arc<Mutex<Vec<RecognitionOptions>>>,
}

impl MockRecognitionBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues messages delivered to the reader as soon as it polls.
    pub fn with_responses(mut self, responses: Vec<&str>) -> Self {
        self.script.responses = responses.into_iter().map(String::from).collect();
        self
    }

    /// Delivers `response` once at least `bytes` audio bytes have been
    /// received, then closes the inbound side.
    pub fn echo_after_bytes(mut self, bytes: usize, response: &str) -> Self {
        self.script.echo_after_bytes = Some((bytes, response.to_string()));
        self
    }

    /// Makes `open` fail.
    pub fn with_connect_failure(mut self, message: &str) -> Self {
        self.script.fail_connect = Some(message.to_string());
        self
    }

    /// Makes every `send_binary` fail.
    pub fn with_send_failure(mut self, message: &str) -> Self {
        self.script.fail_send = Some(message.to_string());
        self
    }

    /// Makes the first `receive` fail with a connection error.
    pub fn with_receive_failure(mut self, message: &str) -> Self {
        self.script.fail_receive = Some(message.to_string());
        self
    }

    /// Keeps the inbound side open after scripted responses are drained, so
    /// the reader blocks instead of observing a clean close.
    pub fn hold_open(mut self) -> Self {
        self.script.hold_open = true;
        self
    }

    /// All binary messages received so far, in send order.
    pub fn sent_messages(&self) -> Vec<Vec<u8>> {
        self.sent.lock().expect("mock lock poisoned").clone()
    }

    /// Total audio bytes received so far.
    pub fn sent_bytes(&self) -> usize {
        self.sent_messages().iter().map(Vec::len).sum()
    }

    /// Options each opened connection was created with.
    pub fn opened_options(&self) -> Vec<RecognitionOptions> {
        self.opened_with.lock().expect("mock lock poisoned").clone()
    }
}

#[async_trait]
impl RecognitionBackend for MockRecognitionBackend {
    async fn open(&self, options: &RecognitionOptions) -> Result<RecognitionConnection> {
        if let Some(message) = &self.script.fail_connect {
            return Err(RoomscribeError::Connect {
                message: message.clone(),
            });
        }
        self.opened_with
            .lock()
            .expect("mock lock poisoned")
            .push(options.clone());

        let (tx, rx) = mpsc::unbounded_channel();
        for response in &self.script.responses {
            let _ = tx.send(response.clone());
        }

        let writer = MockWriter {
            sent: self.sent.clone(),
            received_bytes: 0,
            echo: self.script.echo_after_bytes.clone(),
            fail_send: self.script.fail_send.clone(),
            tx: Some(tx.clone()),
        };
        let reader = MockReader {
            rx,
            fail_receive: self.script.fail_receive.clone(),
            _held: self.script.hold_open.then_some(tx),
        };
        Ok(RecognitionConnection::new(
            Box::new(writer),
            Box::new(reader),
        ))
    }
}

struct MockWriter {
    sent: Arc<Mutex<Vec<Vec<u8>>>>,
    received_bytes: usize,
    echo: Option<(usize, String)>,
    fail_send: Option<String>,
    tx: Option<mpsc::UnboundedSender<String>>,
}

#[async_trait]
impl RecognitionWriter for MockWriter {
    async fn send_binary(&mut self, message: &[u8]) -> Result<()> {
        if let Some(message) = &self.fail_send {
            return Err(RoomscribeError::Connection {
                message: message.clone(),
            });
        }
        self.sent
            .lock()
            .expect("mock lock poisoned")
            .push(message.to_vec());
        self.received_bytes += message.len();

        if let Some((threshold, response)) = self.echo.clone()
            && self.received_bytes >= threshold
        {
            if let Some(tx) = self.tx.take() {
                let _ = tx.send(response);
                // Dropping the sender closes the inbound side after the echo.
            }
            self.echo = None;
        }
        Ok(())
    }
}

struct MockReader {
    rx: mpsc::UnboundedReceiver<String>,
    fail_receive: Option<String>,
    _held: Option<mpsc::UnboundedSender<String>>,
}

#[async_trait]
impl RecognitionReader for MockReader {
    async fn receive(&mut self) -> Result<Option<String>> {
        if let Some(message) = self.fail_receive.take() {
            return Err(RoomscribeError::Connection { message });
        }
        Ok(self.rx.recv().await)
    }
}
