//! Media transport data model and collaborator seams.
//!
//! The conferencing platform itself is an external collaborator: roomscribe
//! only consumes audio packets from subscribed microphone tracks. The traits
//! here are the whole surface we require from it, so the platform SDK (or a
//! mock) can be injected at session construction.

use crate::error::{Result, RoomscribeError};
use async_trait::async_trait;
use std::collections::VecDeque;

/// Codec timing parameters, bound once per session from the first frame.
///
/// Later frames are assumed to share these parameters; there is no
/// re-negotiation mid-session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodecParameters {
    /// Codec clock rate in Hz (48000 for Opus).
    pub clock_rate: u32,
    /// Channel count (1 or 2 for Opus).
    pub channels: u8,
}

impl CodecParameters {
    /// Validates that the parameters describe a usable stream.
    pub fn validate(&self) -> Result<()> {
        if self.clock_rate == 0 {
            return Err(RoomscribeError::EncoderInit {
                message: "clock rate must be non-zero".to_string(),
            });
        }
        if self.channels == 0 {
            return Err(RoomscribeError::EncoderInit {
                message: "channel count must be non-zero".to_string(),
            });
        }
        Ok(())
    }
}

/// One compressed audio packet as delivered by the transport layer.
///
/// Immutable once received; sequence and timestamp carry the transport's
/// RTP-style metadata.
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Compressed payload bytes (one Opus packet).
    pub payload: Vec<u8>,
    /// Transport sequence number.
    pub sequence: u16,
    /// Transport timestamp in clock-rate units.
    pub timestamp: u32,
    /// Codec clock rate in Hz.
    pub clock_rate: u32,
    /// Channel count.
    pub channels: u8,
}

impl AudioFrame {
    /// Creates a frame with the given metadata.
    pub fn new(payload: Vec<u8>, sequence: u16, timestamp: u32, params: CodecParameters) -> Self {
        Self {
            payload,
            sequence,
            timestamp,
            clock_rate: params.clock_rate,
            channels: params.channels,
        }
    }

    /// The codec parameters this frame was produced with.
    pub fn codec_parameters(&self) -> CodecParameters {
        CodecParameters {
            clock_rate: self.clock_rate,
            channels: self.channels,
        }
    }
}

/// Origin of a published track. Only microphone tracks are relayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackSource {
    Microphone,
    Camera,
    ScreenShare,
    Unknown,
}

/// A subscribed media track yielding audio packets.
///
/// `read_next_packet` returns `Ok(None)` on normal end of track; any other
/// failure is a transport error.
#[async_trait]
pub trait MediaTrack: Send {
    async fn read_next_packet(&mut self) -> Result<Option<AudioFrame>>;

    /// Track identifier for logging.
    fn sid(&self) -> &str;
}

/// A track publication the platform announced but we may not be subscribed
/// to yet.
pub trait TrackPublication: Send {
    fn sid(&self) -> &str;

    fn source(&self) -> TrackSource;

    fn set_subscribed(&mut self, subscribed: bool) -> Result<()>;
}

/// Track fed by a byte stream of length-prefixed Opus packets.
///
/// Wire format: u16 big-endian payload length, then the payload. Sequence
/// numbers and timestamps are synthesized, advancing by `timestamp_step`
/// clock-rate units per packet. This is how pipe mode turns stdin into a
/// `MediaTrack`.
pub struct PacketStreamTrack<R> {
    sid: String,
    input: R,
    params: CodecParameters,
    timestamp_step: u32,
    sequence: u16,
    timestamp: u32,
}

impl<R> PacketStreamTrack<R> {
    pub fn new(sid: &str, input: R, params: CodecParameters, timestamp_step: u32) -> Self {
        Self {
            sid: sid.to_string(),
            input,
            params,
            timestamp_step,
            sequence: 0,
            timestamp: 0,
        }
    }
}

#[async_trait]
impl<R: tokio::io::AsyncRead + Unpin + Send> MediaTrack for PacketStreamTrack<R> {
    async fn read_next_packet(&mut self) -> Result<Option<AudioFrame>> {
        use tokio::io::AsyncReadExt;

        loop {
            let mut len_buf = [0u8; 2];
            match self.input.read_exact(&mut len_buf).await {
                Ok(_) => {}
                // EOF at a packet boundary is the normal end of input.
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
                Err(e) => {
                    return Err(RoomscribeError::Transport {
                        message: format!("packet length read: {}", e),
                    });
                }
            }
            let len = u16::from_be_bytes(len_buf) as usize;
            if len == 0 {
                continue;
            }

            let mut payload = vec![0u8; len];
            self.input
                .read_exact(&mut payload)
                .await
                .map_err(|e| RoomscribeError::Transport {
                    message: format!("packet payload read: {}", e),
                })?;

            let frame = AudioFrame::new(payload, self.sequence, self.timestamp, self.params);
            self.sequence = self.sequence.wrapping_add(1);
            self.timestamp = self.timestamp.wrapping_add(self.timestamp_step);
            return Ok(Some(frame));
        }
    }

    fn sid(&self) -> &str {
        &self.sid
    }
}

/// What a mock track does once its scripted frames run out.
#[derive(Debug, Clone)]
enum EndBehavior {
    /// Normal end of track.
    Eof,
    /// Block forever (until the session cancellation interrupts the read).
    Hang,
    /// Fail with a transport error.
    Error(String),
}

/// Scripted media track for tests and library consumers.
#[derive(Debug)]
pub struct MockMediaTrack {
    sid: String,
    frames: VecDeque<AudioFrame>,
    end: EndBehavior,
}

impl MockMediaTrack {
    /// Creates an empty mock track that ends immediately.
    pub fn new(sid: &str) -> Self {
        Self {
            sid: sid.to_string(),
            frames: VecDeque::new(),
            end: EndBehavior::Eof,
        }
    }

    /// Queues frames to be yielded in order.
    pub fn with_frames(mut self, frames: Vec<AudioFrame>) -> Self {
        self.frames.extend(frames);
        self
    }

    /// Configures the track to hang after its frames instead of ending.
    pub fn hang_at_end(mut self) -> Self {
        self.end = EndBehavior::Hang;
        self
    }

    /// Configures the track to fail with a transport error after its frames.
    pub fn with_error_at_end(mut self, message: &str) -> Self {
        self.end = EndBehavior::Error(message.to_string());
        self
    }
}

#[async_trait]
impl MediaTrack for MockMediaTrack {
    async fn read_next_packet(&mut self) -> Result<Option<AudioFrame>> {
        if let Some(frame) = self.frames.pop_front() {
            return Ok(Some(frame));
        }
        match &self.end {
            EndBehavior::Eof => Ok(None),
            EndBehavior::Hang => {
                std::future::pending::<()>().await;
                unreachable!()
            }
            EndBehavior::Error(message) => Err(RoomscribeError::Transport {
                message: message.clone(),
            }),
        }
    }

    fn sid(&self) -> &str {
        &self.sid
    }
}

/// Scripted track publication for dispatcher tests.
#[derive(Debug)]
pub struct MockPublication {
    sid: String,
    source: TrackSource,
    subscribed: bool,
    fail_subscribe: bool,
}

impl MockPublication {
    pub fn new(sid: &str, source: TrackSource) -> Self {
        Self {
            sid: sid.to_string(),
            source,
            subscribed: false,
            fail_subscribe: false,
        }
    }

    /// Configures `set_subscribed` to fail.
    pub fn with_subscribe_failure(mut self) -> Self {
        self.fail_subscribe = true;
        self
    }

    /// Whether `set_subscribed(true)` has been called.
    pub fn is_subscribed(&self) -> bool {
        self.subscribed
    }
}

impl TrackPublication for MockPublication {
    fn sid(&self) -> &str {
        &self.sid
    }

    fn source(&self) -> TrackSource {
        self.source
    }

    fn set_subscribed(&mut self, subscribed: bool) -> Result<()> {
        if self.fail_subscribe {
            return Err(RoomscribeError::Transport {
                message: "subscription rejected".to_string(),
            });
        }
        self.subscribed = subscribed;
        Ok(())
    }
}
