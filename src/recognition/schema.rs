//! Inbound transcript message schema.
//!
//! The backend streams JSON documents; the relay only cares about the first
//! channel's first alternative. Unknown fields are ignored so schema growth
//! on the backend side stays non-breaking.

use crate::error::{Result, RoomscribeError};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct StreamingResponse {
    pub channel: Channel,
    #[serde(default)]
    pub is_final: bool,
    #[serde(default)]
    pub duration: f32,
    #[serde(default)]
    pub start: f32,
}

#[derive(Debug, Deserialize)]
pub struct Channel {
    pub alternatives: Vec<Alternative>,
}

#[derive(Debug, Deserialize)]
pub struct Alternative {
    pub transcript: String,
    #[serde(default)]
    pub confidence: f32,
}

/// Extracts `channel.alternatives[0].transcript` from a raw message.
///
/// Any shape mismatch is a `TranscriptDecode` error — recoverable by
/// design, the listener skips the message and keeps reading.
pub fn extract_transcript(raw: &str) -> Result<String> {
    let response: StreamingResponse =
        serde_json::from_str(raw).map_err(|e| RoomscribeError::TranscriptDecode {
            message: e.to_string(),
        })?;
    response
        .channel
        .alternatives
        .into_iter()
        .next()
        .map(|alternative| alternative.transcript)
        .ok_or_else(|| RoomscribeError::TranscriptDecode {
            message: "transcript message carries no alternatives".to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_transcript_text() {
        let raw = r#"{"channel":{"alternatives":[{"transcript":"hello world"}]}}"#;
        assert_eq!(extract_transcript(raw).unwrap(), "hello world");
    }

    #[test]
    fn test_first_alternative_wins() {
        let raw = r#"{"channel":{"alternatives":[
            {"transcript":"first","confidence":0.9},
            {"transcript":"second","confidence":0.4}
        ]}}"#;
        assert_eq!(extract_transcript(raw).unwrap(), "first");
    }

    #[test]
    fn test_extra_fields_are_ignored() {
        let raw = r#"{
            "channel_index":[0,1],
            "duration":1.5,
            "start":0.0,
            "is_final":true,
            "channel":{"alternatives":[{"transcript":"done","confidence":0.99,"words":[]}]}
        }"#;
        assert_eq!(extract_transcript(raw).unwrap(), "done");
    }

    #[test]
    fn test_missing_channel_is_decode_error() {
        let err = extract_transcript(r#"{"metadata":{}}"#).unwrap_err();
        assert!(matches!(err, RoomscribeError::TranscriptDecode { .. }));
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_empty_alternatives_is_decode_error() {
        let err = extract_transcript(r#"{"channel":{"alternatives":[]}}"#).unwrap_err();
        assert!(matches!(err, RoomscribeError::TranscriptDecode { .. }));
    }

    #[test]
    fn test_malformed_json_is_decode_error() {
        let err = extract_transcript("not json at all").unwrap_err();
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_empty_transcript_is_valid() {
        let raw = r#"{"channel":{"alternatives":[{"transcript":""}]}}"#;
        assert_eq!(extract_transcript(raw).unwrap(), "");
    }
}
