//! Stream bridge: forwards container bytes to the recognition connection.
//!
//! Reads bounded chunks from the container stream and sends each one as a
//! binary message, with a fixed minimum interval between sends so the
//! backend is not flooded. The loop runs once per session under a single
//! long-lived cancellation signal; it exits on cancellation, end of stream,
//! or a send failure.
//!
//! The fixed interval is a deliberate simple rate limit, not backpressure.
//! A future refinement would block reads on the connection's send-buffer
//! capacity instead of sleeping.

use crate::error::Result;
use crate::recognition::RecognitionWriter;
use crate::stream::StreamReader;
use log::debug;
use std::time::Duration;
use tokio::sync::watch;

#[derive(Debug, Clone)]
pub struct StreamBridgeConfig {
    /// Maximum bytes per read, and therefore per binary message.
    pub chunk_size: usize,
    /// Minimum interval between consecutive sends.
    pub send_interval: Duration,
}

impl Default for StreamBridgeConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1024,
            send_interval: Duration::from_millis(10),
        }
    }
}

pub struct StreamBridge {
    config: StreamBridgeConfig,
}

impl StreamBridge {
    pub fn new() -> Self {
        Self::with_config(StreamBridgeConfig::default())
    }

    pub fn with_config(config: StreamBridgeConfig) -> Self {
        Self { config }
    }

    /// Forwarding loop. Returns `Ok` on end-of-stream or cancellation,
    /// `Err` only on a send failure.
    pub async fn run(
        &self,
        mut reader: StreamReader,
        mut writer: Box<dyn RecognitionWriter>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<()> {
        let mut buf = vec![0u8; self.config.chunk_size.max(1)];
        let mut forwarded = 0usize;

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        debug!("stream bridge cancelled after {} bytes", forwarded);
                        return Ok(());
                    }
                }
                n = reader.read(&mut buf) => {
                    if n == 0 {
                        debug!("container stream ended after {} bytes", forwarded);
                        return Ok(());
                    }
                    writer.send_binary(&buf[..n]).await?;
                    forwarded += n;
                    tokio::time::sleep(self.config.send_interval).await;
                }
            }
        }
    }
}

impl Default for StreamBridge {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RoomscribeError;
    use crate::recognition::{MockRecognitionBackend, RecognitionBackend, RecognitionOptions};
    use crate::stream::container_stream;
    use std::io::Write;

    fn test_config() -> StreamBridgeConfig {
        StreamBridgeConfig {
            chunk_size: 1024,
            send_interval: Duration::ZERO,
        }
    }

    async fn open_writer(
        backend: &MockRecognitionBackend,
    ) -> Box<dyn RecognitionWriter> {
        let connection = backend.open(&RecognitionOptions::default()).await.unwrap();
        let (writer, _reader) = connection.split();
        writer
    }

    #[tokio::test]
    async fn test_forwarded_messages_reproduce_input_bytes() {
        let (mut stream_writer, stream_reader) = container_stream();
        let input: Vec<u8> = (0..=255u8).cycle().take(10_000).collect();
        stream_writer.write_all(&input).unwrap();
        drop(stream_writer);

        let backend = MockRecognitionBackend::new();
        let writer = open_writer(&backend).await;
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        StreamBridge::with_config(test_config())
            .run(stream_reader, writer, shutdown_rx)
            .await
            .unwrap();

        let messages = backend.sent_messages();
        assert!(messages.iter().all(|m| !m.is_empty() && m.len() <= 1024));
        let concatenated: Vec<u8> = messages.concat();
        assert_eq!(concatenated, input);
    }

    #[tokio::test]
    async fn test_exits_cleanly_on_end_of_stream() {
        let (stream_writer, stream_reader) = container_stream();
        drop(stream_writer);

        let backend = MockRecognitionBackend::new();
        let writer = open_writer(&backend).await;
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        let result = StreamBridge::with_config(test_config())
            .run(stream_reader, writer, shutdown_rx)
            .await;
        assert!(result.is_ok());
        assert!(backend.sent_messages().is_empty());
    }

    #[tokio::test]
    async fn test_send_failure_ends_bridge_with_error() {
        let (mut stream_writer, stream_reader) = container_stream();
        stream_writer.write_all(&[1, 2, 3]).unwrap();

        let backend = MockRecognitionBackend::new().with_send_failure("socket reset");
        let writer = open_writer(&backend).await;
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        let err = StreamBridge::with_config(test_config())
            .run(stream_reader, writer, shutdown_rx)
            .await
            .unwrap_err();
        assert!(matches!(err, RoomscribeError::Connection { .. }));
    }

    #[tokio::test]
    async fn test_cancellation_interrupts_idle_read() {
        let (_stream_writer, stream_reader) = container_stream();
        let backend = MockRecognitionBackend::new();
        let writer = open_writer(&backend).await;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let run = tokio::spawn(async move {
            StreamBridge::with_config(test_config())
                .run(stream_reader, writer, shutdown_rx)
                .await
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        shutdown_tx.send(true).unwrap();

        let result = tokio::time::timeout(Duration::from_millis(200), run)
            .await
            .expect("bridge did not stop after cancellation");
        result.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_pacing_does_not_reorder_chunks() {
        let (mut stream_writer, stream_reader) = container_stream();
        for i in 0..20u8 {
            stream_writer.write_all(&[i; 100]).unwrap();
        }
        drop(stream_writer);

        let backend = MockRecognitionBackend::new();
        let writer = open_writer(&backend).await;
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        StreamBridge::with_config(StreamBridgeConfig {
            chunk_size: 64,
            send_interval: Duration::from_millis(1),
        })
        .run(stream_reader, writer, shutdown_rx)
        .await
        .unwrap();

        let expected: Vec<u8> = (0..20u8).flat_map(|i| vec![i; 100]).collect();
        assert_eq!(backend.sent_messages().concat(), expected);
    }
}
