//! TCP transport for the recognition backend.
//!
//! Wire format: one JSON line of `RecognitionOptions` as the opening
//! handshake, then length-prefixed (u32 big-endian) binary audio messages
//! outbound and newline-delimited JSON transcript messages inbound. The
//! socket is split so the sending and receiving tasks own their halves
//! independently.

use crate::error::{Result, RoomscribeError};
use crate::recognition::{
    RecognitionBackend, RecognitionConnection, RecognitionOptions, RecognitionReader,
    RecognitionWriter,
};
use async_trait::async_trait;
use log::{debug, info};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};

/// Backend reachable at a `host:port` address.
pub struct TcpRecognitionBackend {
    addr: String,
}

impl TcpRecognitionBackend {
    pub fn new(addr: &str) -> Self {
        Self {
            addr: addr.to_string(),
        }
    }
}

#[async_trait]
impl RecognitionBackend for TcpRecognitionBackend {
    async fn open(&self, options: &RecognitionOptions) -> Result<RecognitionConnection> {
        info!("connecting to recognition backend at {}", self.addr);

        let stream = TcpStream::connect(&self.addr)
            .await
            .map_err(|e| RoomscribeError::Connect {
                message: format!("{}: {}", self.addr, e),
            })?;
        // Real-time audio; don't batch small frames.
        stream.set_nodelay(true).map_err(|e| RoomscribeError::Connect {
            message: e.to_string(),
        })?;

        let (read_half, mut write_half) = stream.into_split();

        let mut handshake =
            serde_json::to_string(options).map_err(|e| RoomscribeError::Connect {
                message: format!("handshake encoding: {}", e),
            })?;
        handshake.push('\n');
        write_half
            .write_all(handshake.as_bytes())
            .await
            .map_err(|e| RoomscribeError::Connect {
                message: format!("handshake send: {}", e),
            })?;

        info!("recognition connection open ({})", self.addr);
        Ok(RecognitionConnection::new(
            Box::new(TcpWriter { write_half }),
            Box::new(TcpReader {
                reader: BufReader::new(read_half),
                line: String::new(),
            }),
        ))
    }
}

struct TcpWriter {
    write_half: OwnedWriteHalf,
}

#[async_trait]
impl RecognitionWriter for TcpWriter {
    async fn send_binary(&mut self, message: &[u8]) -> Result<()> {
        let frame_len = (message.len() as u32).to_be_bytes();
        let result = async {
            self.write_half.write_all(&frame_len).await?;
            self.write_half.write_all(message).await?;
            self.write_half.flush().await
        }
        .await;
        result.map_err(|e| RoomscribeError::Connection {
            message: format!("send: {}", e),
        })?;
        debug!("sent {} audio bytes", message.len());
        Ok(())
    }
}

struct TcpReader {
    reader: BufReader<OwnedReadHalf>,
    line: String,
}

#[async_trait]
impl RecognitionReader for TcpReader {
    async fn receive(&mut self) -> Result<Option<String>> {
        loop {
            self.line.clear();
            let n = self
                .reader
                .read_line(&mut self.line)
                .await
                .map_err(|e| RoomscribeError::Connection {
                    message: format!("receive: {}", e),
                })?;
            if n == 0 {
                debug!("recognition connection closed by backend");
                return Ok(None);
            }
            let message = self.line.trim();
            if !message.is_empty() {
                return Ok(Some(message.to_string()));
            }
            // Keep-alive blank line; read on.
        }
    }
}
