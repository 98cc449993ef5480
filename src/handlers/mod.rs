//! HTTP and WebSocket request handlers.

pub mod http;
pub mod media;
pub mod messages;

pub use http::{get_clip, health_check};
pub use media::media_handler;
