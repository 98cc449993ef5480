//! Media stream wire messages.
//!
//! The call transport speaks JSON frames over the WebSocket, tagged by an
//! `event` field. Audio payloads are base64-encoded companded bytes, one
//! message per telephony frame, in both directions. Control commands
//! (redirect play, spoken text) ride the same channel out-of-band.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

fn default_channel_count() -> u16 {
    1
}

/// Messages from the telephony side.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum IncomingMessage {
    /// Call answered; fixes the session's identity and audio format.
    Start {
        call_id: String,
        sample_rate: u32,
        #[serde(default = "default_channel_count")]
        channel_count: u16,
    },
    /// One companded audio frame, base64-encoded.
    Media { payload: String },
    Stop,
}

/// Messages to the telephony side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum OutgoingMessage {
    /// One outbound companded audio frame, base64-encoded.
    Media { payload: String },
    /// Redirect playback to an externally hosted audio resource.
    Play { url: String },
    /// Speak text with the provider's built-in voice.
    Say { text: String, language: String },
}

impl OutgoingMessage {
    pub fn media(frame: &[u8]) -> Self {
        OutgoingMessage::Media {
            payload: BASE64.encode(frame),
        }
    }
}

/// Decode a media payload. Invalid base64 drops the frame upstream.
pub fn decode_payload(payload: &str) -> Option<Bytes> {
    BASE64.decode(payload).ok().map(Bytes::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_message_parses_with_default_channel_count() {
        let msg: IncomingMessage = serde_json::from_str(
            r#"{"event":"start","call_id":"CA42","sample_rate":8000}"#,
        )
        .unwrap();
        match msg {
            IncomingMessage::Start {
                call_id,
                sample_rate,
                channel_count,
            } => {
                assert_eq!(call_id, "CA42");
                assert_eq!(sample_rate, 8_000);
                assert_eq!(channel_count, 1);
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn media_payload_round_trips_through_base64() {
        let frame = vec![0x7Fu8, 0xFF, 0x00, 0x80];
        let msg = OutgoingMessage::media(&frame);
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains(r#""event":"media""#));

        let parsed: OutgoingMessage = serde_json::from_str(&json).unwrap();
        match parsed {
            OutgoingMessage::Media { payload } => {
                assert_eq!(decode_payload(&payload).unwrap(), Bytes::from(frame));
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn invalid_base64_is_rejected() {
        assert!(decode_payload("not base64!!!").is_none());
    }

    #[test]
    fn say_message_serializes_language_code() {
        let json = serde_json::to_string(&OutgoingMessage::Say {
            text: "hello".into(),
            language: "en-IN".into(),
        })
        .unwrap();
        assert!(json.contains(r#""event":"say""#));
        assert!(json.contains("en-IN"));
    }
}
