//! Ogg/Opus container encoding.
//!
//! The relay does not transcode: compressed Opus packets from the transport
//! are wrapped as-is into an Ogg stream the recognition backend (or any
//! standard decoder) can read incrementally.

mod crc;
mod page;
mod writer;

pub use writer::{EncoderState, OggWriter, expected_stream_size};
