//! Core bridge components: codec, segmentation, language resolution, the
//! per-call session state machine, and the reply and playback paths.

pub mod chunker;
pub mod codec;
pub mod language;
pub mod llm;
pub mod playback;
pub mod reply;
pub mod segmenter;
pub mod session;
pub mod stt;
pub mod transport;
pub mod tts;

pub use language::{LanguageResolver, Locale, LockStrictness};
pub use session::{Session, SessionConfig, SessionEvent, SessionPhase};
