//! Call transport contract.
//!
//! The telephony side of the bridge is a collaborator with a narrow
//! interface: it delivers start/media/stop events in real time (wired up by
//! the media handler) and accepts outbound media frames or out-of-band
//! call-control commands. Implementations must not block; the pacer relies
//! on `send_media` returning promptly.

use async_trait::async_trait;
use bytes::Bytes;

use crate::core::language::Locale;
use crate::errors::TransportError;

#[async_trait]
pub trait CallTransport: Send + Sync {
    /// Transmit one outbound media frame in the call's native framing
    /// (companded bytes, typically 20 ms worth).
    async fn send_media(&self, frame: Bytes) -> Result<(), TransportError>;

    /// Ask the call-control plane to play an externally hosted audio
    /// resource. Fallback when frame pacing fails.
    async fn redirect_play(&self, url: &str) -> Result<(), TransportError>;

    /// Speak text with the telephony provider's built-in voice. Fallback
    /// when synthesis produced no usable audio.
    async fn say(&self, text: &str, language: Locale) -> Result<(), TransportError>;

    /// Whether the outbound channel is currently open.
    fn is_open(&self) -> bool;
}
