//! Incremental Ogg/Opus writer.
//!
//! Wraps compressed audio frames into a self-describing Ogg stream: an
//! OpusHead identification page, an OpusTags comment page, then one data
//! page per frame. The writer is created unbound and binds its codec
//! parameters from the first frame it sees; parameters carried by later
//! frames are ignored (a known limitation — the already-emitted header
//! cannot change).

use crate::error::{Result, RoomscribeError};
use crate::media::{AudioFrame, CodecParameters};
use crate::ogg::page;
use std::io::Write;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

const VENDOR: &str = "roomscribe";

/// Encoder lifecycle. Writes are only legal before `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncoderState {
    /// No frame seen yet; codec parameters unknown.
    Unbound,
    /// Parameters bound, header pages written, no data page yet.
    Bound,
    /// At least one data page written.
    Streaming,
    /// Closed; all further writes fail.
    Closed,
}

/// Incremental Ogg/Opus container writer over any byte sink.
pub struct OggWriter<W: Write> {
    sink: Option<W>,
    state: EncoderState,
    params: Option<CodecParameters>,
    serial: u32,
    page_sequence: u32,
    granule_position: u64,
    last_timestamp: Option<u32>,
}

impl<W: Write> OggWriter<W> {
    /// Creates an unbound writer. Nothing is written until the first frame.
    pub fn new(sink: W) -> Self {
        Self::with_serial(sink, generate_serial())
    }

    /// Creates an unbound writer with an explicit stream serial (tests).
    pub fn with_serial(sink: W, serial: u32) -> Self {
        Self {
            sink: Some(sink),
            state: EncoderState::Unbound,
            params: None,
            serial,
            page_sequence: 0,
            granule_position: 0,
            last_timestamp: None,
        }
    }

    pub fn state(&self) -> EncoderState {
        self.state
    }

    /// The parameters bound from the first frame, if any.
    pub fn codec_parameters(&self) -> Option<CodecParameters> {
        self.params
    }

    /// Borrows the underlying sink, if the writer is not yet closed.
    pub fn get_ref(&self) -> Option<&W> {
        self.sink.as_ref()
    }

    /// Writes one frame as a data page, binding the stream on first use.
    pub fn write_frame(&mut self, frame: &AudioFrame) -> Result<()> {
        match self.state {
            EncoderState::Closed => return Err(RoomscribeError::EncoderClosed),
            EncoderState::Unbound => self.bind(frame.codec_parameters())?,
            EncoderState::Bound | EncoderState::Streaming => {}
        }

        if let Some(previous) = self.last_timestamp {
            self.granule_position += frame.timestamp.wrapping_sub(previous) as u64;
        }
        self.last_timestamp = Some(frame.timestamp);

        // A payload too large for one segment table spans a run of
        // continuation pages.
        let pages = page::build_packet_pages(
            &frame.payload,
            page::FLAG_NONE,
            self.granule_position,
            self.serial,
            self.page_sequence,
        );
        self.page_sequence = self.page_sequence.wrapping_add(pages.len() as u32);
        for data_page in &pages {
            self.write_page(data_page)?;
        }
        self.state = EncoderState::Streaming;
        Ok(())
    }

    /// Finishes the stream with an end-of-stream page and drops the sink so
    /// the consumer observes EOF. Idempotent.
    pub fn close(&mut self) -> Result<()> {
        if self.state == EncoderState::Closed {
            return Ok(());
        }
        let result = if self.state == EncoderState::Unbound {
            // Never bound, nothing on the wire; no marker to write.
            Ok(())
        } else {
            let eos = page::build_page(
                &[],
                page::FLAG_END_OF_STREAM,
                self.granule_position,
                self.serial,
                self.page_sequence,
            );
            self.page_sequence += 1;
            self.write_page(&eos)
        };
        self.state = EncoderState::Closed;
        self.sink = None;
        result
    }

    /// Validates and binds codec parameters, writing the two header pages.
    fn bind(&mut self, params: CodecParameters) -> Result<()> {
        params.validate()?;

        if let Err(error) = self.write_header_pages(&params) {
            // Part of a header may already be on the wire; close the
            // writer so a retry cannot emit a second begin-of-stream page.
            self.state = EncoderState::Closed;
            self.sink = None;
            return Err(error);
        }

        self.params = Some(params);
        self.state = EncoderState::Bound;
        Ok(())
    }

    fn write_header_pages(&mut self, params: &CodecParameters) -> Result<()> {
        let head = page::build_page(
            &opus_head(params),
            page::FLAG_BEGIN_OF_STREAM,
            0,
            self.serial,
            self.page_sequence,
        );
        self.page_sequence += 1;
        self.write_page(&head)?;

        let tags = page::build_page(
            &opus_tags(),
            page::FLAG_NONE,
            0,
            self.serial,
            self.page_sequence,
        );
        self.page_sequence += 1;
        self.write_page(&tags)
    }

    fn write_page(&mut self, bytes: &[u8]) -> Result<()> {
        let sink = self.sink.as_mut().ok_or(RoomscribeError::EncoderClosed)?;
        sink.write_all(bytes).map_err(map_sink_error)
    }
}

/// Maps a sink failure: a gone consumer is a clean end, anything else is a
/// stream error.
fn map_sink_error(error: std::io::Error) -> RoomscribeError {
    if error.kind() == std::io::ErrorKind::BrokenPipe {
        RoomscribeError::StreamClosed
    } else {
        RoomscribeError::Stream {
            message: error.to_string(),
        }
    }
}

/// OpusHead identification header (RFC 7845 §5.1), 19 bytes for mapping
/// family 0.
fn opus_head(params: &CodecParameters) -> Vec<u8> {
    let mut head = Vec::with_capacity(19);
    head.extend_from_slice(b"OpusHead");
    head.push(1); // version
    head.push(params.channels);
    head.extend_from_slice(&0u16.to_le_bytes()); // pre-skip
    head.extend_from_slice(&params.clock_rate.to_le_bytes());
    head.extend_from_slice(&0i16.to_le_bytes()); // output gain
    head.push(0); // mapping family
    head
}

/// OpusTags comment header (RFC 7845 §5.2) with no user comments.
fn opus_tags() -> Vec<u8> {
    let mut tags = Vec::with_capacity(16 + VENDOR.len());
    tags.extend_from_slice(b"OpusTags");
    tags.extend_from_slice(&(VENDOR.len() as u32).to_le_bytes());
    tags.extend_from_slice(VENDOR.as_bytes());
    tags.extend_from_slice(&0u32.to_le_bytes()); // comment count
    tags
}

/// Container size for a bound stream of the given frame payload lengths,
/// including both header pages and the end-of-stream page.
pub fn expected_stream_size(frame_payload_lens: &[usize]) -> usize {
    let headers = page::page_size(19) + page::page_size(16 + VENDOR.len());
    let data: usize = frame_payload_lens
        .iter()
        .map(|&len| page::packet_size(len))
        .sum();
    headers + data + page::page_size(0)
}

fn generate_serial() -> u32 {
    static COUNTER: AtomicU32 = AtomicU32::new(0);
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    nanos ^ COUNTER.fetch_add(0x9E37_79B9, Ordering::Relaxed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(payload: Vec<u8>, sequence: u16, timestamp: u32) -> AudioFrame {
        AudioFrame::new(
            payload,
            sequence,
            timestamp,
            CodecParameters {
                clock_rate: 48000,
                channels: 1,
            },
        )
    }

    #[test]
    fn test_writer_starts_unbound_and_silent() {
        let writer = OggWriter::with_serial(Vec::new(), 1);
        assert_eq!(writer.state(), EncoderState::Unbound);
        assert!(writer.codec_parameters().is_none());
    }

    #[test]
    fn test_first_frame_binds_and_writes_headers() {
        let mut writer = OggWriter::with_serial(Vec::new(), 1);
        writer.write_frame(&frame(vec![0xFF; 40], 0, 0)).unwrap();

        assert_eq!(writer.state(), EncoderState::Streaming);
        assert_eq!(
            writer.codec_parameters(),
            Some(CodecParameters {
                clock_rate: 48000,
                channels: 1
            })
        );

        let bytes = writer.sink.as_ref().unwrap();
        // OpusHead page, OpusTags page, one data page.
        assert_eq!(&bytes[0..4], b"OggS");
        assert_eq!(bytes[5], page::FLAG_BEGIN_OF_STREAM);
        assert_eq!(&bytes[28..36], b"OpusHead");
        let tags_page = page::page_size(19);
        assert_eq!(&bytes[tags_page..tags_page + 4], b"OggS");
        assert_eq!(
            bytes.len(),
            page::page_size(19) + page::page_size(16 + VENDOR.len()) + page::page_size(40)
        );
    }

    #[test]
    fn test_opus_head_encodes_parameters() {
        let head = opus_head(&CodecParameters {
            clock_rate: 48000,
            channels: 2,
        });
        assert_eq!(head.len(), 19);
        assert_eq!(&head[0..8], b"OpusHead");
        assert_eq!(head[8], 1);
        assert_eq!(head[9], 2);
        assert_eq!(u32::from_le_bytes(head[12..16].try_into().unwrap()), 48000);
    }

    #[test]
    fn test_binding_happens_exactly_once() {
        let mut writer = OggWriter::with_serial(Vec::new(), 1);
        writer.write_frame(&frame(vec![1], 0, 0)).unwrap();
        let header_len = page::page_size(19) + page::page_size(16 + VENDOR.len());
        let header_before = writer.sink.as_ref().unwrap()[..header_len].to_vec();

        // A frame claiming different parameters must not re-emit or alter
        // the header.
        let mut stereo = frame(vec![2], 1, 960);
        stereo.clock_rate = 16000;
        stereo.channels = 2;
        writer.write_frame(&stereo).unwrap();

        assert_eq!(
            writer.codec_parameters(),
            Some(CodecParameters {
                clock_rate: 48000,
                channels: 1
            })
        );
        assert_eq!(&writer.sink.as_ref().unwrap()[..header_len], &header_before[..]);
    }

    #[test]
    fn test_invalid_parameters_fail_binding() {
        let mut writer = OggWriter::with_serial(Vec::new(), 1);
        let mut bad = frame(vec![1], 0, 0);
        bad.clock_rate = 0;

        let err = writer.write_frame(&bad).unwrap_err();
        assert!(matches!(err, RoomscribeError::EncoderInit { .. }));
        assert_eq!(writer.state(), EncoderState::Unbound);
        assert!(writer.sink.as_ref().unwrap().is_empty());
    }

    #[test]
    fn test_granule_advances_by_timestamp_delta() {
        let mut writer = OggWriter::with_serial(Vec::new(), 1);
        writer.write_frame(&frame(vec![1], 0, 1000)).unwrap();
        assert_eq!(writer.granule_position, 0);
        writer.write_frame(&frame(vec![2], 1, 1960)).unwrap();
        assert_eq!(writer.granule_position, 960);
        writer.write_frame(&frame(vec![3], 2, 2920)).unwrap();
        assert_eq!(writer.granule_position, 1920);
    }

    #[test]
    fn test_write_after_close_fails() {
        let mut writer = OggWriter::with_serial(Vec::new(), 1);
        writer.write_frame(&frame(vec![1], 0, 0)).unwrap();
        writer.close().unwrap();
        assert_eq!(writer.state(), EncoderState::Closed);

        let err = writer.write_frame(&frame(vec![2], 1, 960)).unwrap_err();
        assert!(matches!(err, RoomscribeError::EncoderClosed));
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut writer = OggWriter::with_serial(Vec::new(), 1);
        writer.write_frame(&frame(vec![1], 0, 0)).unwrap();
        writer.close().unwrap();
        writer.close().unwrap();
        assert_eq!(writer.state(), EncoderState::Closed);
    }

    #[test]
    fn test_close_unbound_writes_nothing() {
        let mut writer = OggWriter::with_serial(Vec::new(), 1);
        writer.close().unwrap();
        assert_eq!(writer.state(), EncoderState::Closed);
    }

    #[test]
    fn test_expected_stream_size_matches_output() {
        let payloads = vec![vec![10u8; 80], vec![11u8; 120], vec![12u8; 300]];
        let mut writer = OggWriter::with_serial(Vec::new(), 1);
        let mut timestamp = 0u32;
        for (i, payload) in payloads.iter().enumerate() {
            writer
                .write_frame(&frame(payload.clone(), i as u16, timestamp))
                .unwrap();
            timestamp = timestamp.wrapping_add(960);
        }
        let written = writer.sink.as_ref().unwrap().len();
        // The EOS page is accounted for by close(); add the pre-close bytes.
        let lens: Vec<usize> = payloads.iter().map(|p| p.len()).collect();
        assert_eq!(written + page::page_size(0), expected_stream_size(&lens));
    }

    #[test]
    fn test_oversized_frame_spans_pages_without_corrupting_the_stream() {
        // A pipe-fed packet can be as large as a u16 length prefix allows,
        // which is more than one segment table can lace.
        let payload: Vec<u8> = (0..65535u32).map(|i| (i % 251) as u8).collect();
        let mut writer = OggWriter::with_serial(Vec::new(), 1);
        writer.write_frame(&frame(payload.clone(), 0, 0)).unwrap();
        writer.write_frame(&frame(vec![9u8; 40], 1, 960)).unwrap();

        let mut bytes = &writer.sink.as_ref().unwrap()[..];
        let mut flags = Vec::new();
        let mut data_payload = Vec::new();
        while !bytes.is_empty() {
            assert_eq!(&bytes[0..4], b"OggS", "lost page sync");
            let segments = bytes[26] as usize;
            let lacing = &bytes[27..27 + segments];
            let payload_len: usize = lacing.iter().map(|&v| v as usize).sum();
            let start = 27 + segments;
            assert!(
                bytes.len() >= start + payload_len,
                "segment table overruns the written stream"
            );
            if flags.len() >= 2 && flags.len() < 4 {
                data_payload.extend_from_slice(&bytes[start..start + payload_len]);
            }
            flags.push(bytes[5]);
            bytes = &bytes[start + payload_len..];
        }

        // Headers, two pages for the large packet, one for the small one.
        assert_eq!(flags.len(), 5);
        assert_eq!(flags[3], page::FLAG_CONTINUATION);
        assert_eq!(data_payload, payload);
        assert_eq!(
            writer.sink.as_ref().unwrap().len() + page::page_size(0),
            expected_stream_size(&[payload.len(), 40])
        );
    }

    struct FailingSink;

    impl Write for FailingSink {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone"))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_broken_pipe_maps_to_stream_closed() {
        let mut writer = OggWriter::with_serial(FailingSink, 1);
        let err = writer.write_frame(&frame(vec![1], 0, 0)).unwrap_err();
        assert!(matches!(err, RoomscribeError::StreamClosed));
    }

    /// Accepts a fixed number of writes, then fails with a non-pipe error.
    struct FlakySink {
        remaining: usize,
    }

    impl FlakySink {
        fn failing_after(writes: usize) -> Self {
            Self { remaining: writes }
        }
    }

    impl Write for FlakySink {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if self.remaining == 0 {
                return Err(std::io::Error::other("device error"));
            }
            self.remaining -= 1;
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_failed_header_write_closes_the_writer() {
        // The OpusHead page lands but the OpusTags write fails: the stream
        // holds half a header and must not accept a retry.
        let mut writer = OggWriter::with_serial(FlakySink::failing_after(1), 1);
        let err = writer.write_frame(&frame(vec![1], 0, 0)).unwrap_err();
        assert!(matches!(err, RoomscribeError::Stream { .. }));
        assert_eq!(writer.state(), EncoderState::Closed);

        // A second begin-of-stream page would corrupt the stream; the
        // retry is rejected instead.
        let err = writer.write_frame(&frame(vec![2], 1, 960)).unwrap_err();
        assert!(matches!(err, RoomscribeError::EncoderClosed));
        writer.close().unwrap();
        assert_eq!(writer.state(), EncoderState::Closed);
    }
}
