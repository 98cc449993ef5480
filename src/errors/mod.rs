//! Error types for the bridge, one enum per failure domain.
//!
//! The taxonomy mirrors the recovery policy: transport errors end the
//! session, recognizer errors downgrade the transcription route, and
//! generation/synthesis errors degrade to canned fallbacks. No error in the
//! reply path ever tears down a call.

use thiserror::Error;

/// Failures on the call-side transport. Fatal for the session.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("outbound channel closed")]
    ChannelClosed,

    #[error("media send failed: {0}")]
    SendFailed(String),

    #[error("call control command failed: {0}")]
    ControlFailed(String),
}

/// Failures talking to a speech recognizer. Never fatal; the session falls
/// back to batch transcription for the remainder of the call.
#[derive(Debug, Error)]
pub enum RecognizerError {
    #[error("streaming connect failed: {0}")]
    ConnectFailed(String),

    #[error("streaming recognizer error: {0}")]
    Stream(String),

    #[error("transcription request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("transcription returned status {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("malformed transcription response: {0}")]
    InvalidResponse(String),

    #[error("failed to encode audio for upload: {0}")]
    AudioEncoding(String),
}

/// Failures from the text-generation collaborator. Substituted with a
/// per-locale apology; the turn still completes.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("generation request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("generation returned status {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("generator returned empty output")]
    EmptyOutput,

    #[error("malformed generation response: {0}")]
    InvalidResponse(String),
}

/// Failures from the speech-synthesis collaborator. Playback is skipped in
/// favor of the transport's spoken-text fallback.
#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error("synthesis request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("synthesis returned status {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("synthesizer returned no audio")]
    EmptyAudio,

    #[error("failed to decode synthesized audio: {0}")]
    Decode(String),
}

/// Playback pacing failures. The caller falls back to a call-control
/// redirect to a hosted audio resource.
#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("outbound channel not open")]
    ChannelNotOpen,

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("unsupported source sample rate {source_rate} for call rate {call_rate}")]
    UnsupportedRate { source_rate: u32, call_rate: u32 },

    #[error("failed to encode clip audio: {0}")]
    ClipEncoding(String),
}

/// Configuration loading and validation failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}
