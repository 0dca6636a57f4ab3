//! Container byte stream between the encoder and the stream bridge.
//!
//! Single producer, single consumer. The writer side is a synchronous
//! `io::Write` so the container encoder can emit pages inline with frame
//! arrival; the reader side is async with bounded reads. Bytes arrive in
//! write order with no loss or duplication. Dropping the writer yields EOF
//! on the reader; dropping the reader makes further writes fail with
//! `BrokenPipe`.

use std::io;
use tokio::sync::mpsc;

/// Creates a connected writer/reader pair.
pub fn container_stream() -> (StreamWriter, StreamReader) {
    // Unbounded so the encoder's synchronous writes never block inside an
    // async task; the bridge's paced reads keep the queue shallow.
    let (tx, rx) = mpsc::unbounded_channel();
    (
        StreamWriter { tx },
        StreamReader {
            rx,
            pending: Vec::new(),
            offset: 0,
        },
    )
}

/// Producer half; owned by the container encoder.
pub struct StreamWriter {
    tx: mpsc::UnboundedSender<Vec<u8>>,
}

impl io::Write for StreamWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        self.tx
            .send(buf.to_vec())
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "stream reader dropped"))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Consumer half; owned by the stream bridge.
pub struct StreamReader {
    rx: mpsc::UnboundedReceiver<Vec<u8>>,
    pending: Vec<u8>,
    offset: usize,
}

impl StreamReader {
    /// Reads up to `buf.len()` bytes, waiting for data if none is queued.
    ///
    /// Returns 0 only at end of stream (writer dropped and all bytes
    /// drained); a non-EOF read always yields at least one byte.
    pub async fn read(&mut self, buf: &mut [u8]) -> usize {
        if buf.is_empty() {
            return 0;
        }
        while self.offset >= self.pending.len() {
            match self.rx.recv().await {
                Some(chunk) => {
                    self.pending = chunk;
                    self.offset = 0;
                }
                None => return 0,
            }
        }
        let n = buf.len().min(self.pending.len() - self.offset);
        buf[..n].copy_from_slice(&self.pending[self.offset..self.offset + n]);
        self.offset += n;
        n
    }
}
