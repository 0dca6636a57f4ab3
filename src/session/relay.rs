//! Frame relay: feeds track packets into the container encoder.
//!
//! The encoder is bound lazily from the first frame, so a session can be
//! created before the codec parameters are known. Each frame is encoded
//! inline with its arrival; nothing is buffered beyond the current call.

use crate::error::{Result, RoomscribeError};
use crate::media::{AudioFrame, CodecParameters, MediaTrack};
use crate::ogg::{EncoderState, OggWriter};
use crate::stream::StreamWriter;
use log::{debug, info, warn};
use tokio::sync::watch;

pub struct FrameRelay {
    encoder: OggWriter<StreamWriter>,
}

impl FrameRelay {
    pub fn new(stream_writer: StreamWriter) -> Self {
        Self {
            encoder: OggWriter::new(stream_writer),
        }
    }

    /// Forwards one frame to the encoder, binding it on first use.
    pub fn consume(&mut self, frame: &AudioFrame) -> Result<()> {
        self.encoder.write_frame(frame)
    }

    pub fn encoder_state(&self) -> EncoderState {
        self.encoder.state()
    }

    /// The parameters bound from the first consumed frame, if any.
    pub fn codec_parameters(&self) -> Option<CodecParameters> {
        self.encoder.codec_parameters()
    }

    /// Intake task: reads packets until end of track, a fatal error, or the
    /// session cancellation signal, then closes the encoder so the stream
    /// bridge observes end-of-stream.
    pub async fn run(
        mut self,
        mut track: Box<dyn MediaTrack>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<()> {
        let result = self.intake(track.as_mut(), &mut shutdown).await;
        match self.encoder.close() {
            Ok(()) | Err(RoomscribeError::StreamClosed) => {}
            Err(e) => warn!("track {}: encoder close failed: {}", track.sid(), e),
        }
        result
    }

    async fn intake(
        &mut self,
        track: &mut dyn MediaTrack,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<()> {
        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        debug!("track {}: intake cancelled", track.sid());
                        return Ok(());
                    }
                }
                packet = track.read_next_packet() => match packet {
                    Ok(Some(frame)) => match self.consume(&frame) {
                        Ok(()) => {}
                        Err(RoomscribeError::StreamClosed) => {
                            // Consumer side is gone; this session is winding
                            // down, not failing.
                            debug!("track {}: container stream closed", track.sid());
                            return Ok(());
                        }
                        Err(e) => return Err(e),
                    },
                    Ok(None) => {
                        info!("track {} ended", track.sid());
                        return Ok(());
                    }
                    Err(e) => return Err(e),
                }
            }
        }
    }
}
