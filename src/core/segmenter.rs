//! Utterance segmentation over voice-activity and transcript signals.
//!
//! Streaming recognizers deliver speech-start/speech-end markers and
//! partial/final transcripts out of order with the audio itself. The
//! segmenter folds those signals into discrete utterances: one bounded unit
//! of caller speech, consumed exactly once by the session state machine.

use tracing::debug;

/// One bounded unit of caller speech.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utterance {
    pub transcript: String,
    /// Best-effort language tag as reported by the recognizer, unnormalized.
    pub raw_language_tag: String,
    /// True when the recognizer marked the transcript final; false when the
    /// utterance was closed by a speech-end signal with only partial text.
    pub is_final: bool,
}

/// Signals the segmenter consumes, from either the recognizer event stream
/// or the batch transcription path.
#[derive(Debug, Clone)]
pub enum SpeechSignal {
    SpeechStart,
    SpeechEnd,
    Partial { text: String, language_tag: String },
    Final { text: String, language_tag: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SegmentState {
    Idle,
    Speaking,
}

/// `Idle -> Speaking -> Idle` state machine. An utterance is emitted on the
/// transition back to `Idle`, triggered by whichever arrives first: an
/// explicit speech-end signal or a final transcript.
#[derive(Debug)]
pub struct UtteranceSegmenter {
    state: SegmentState,
    pending_text: String,
    pending_tag: String,
}

impl UtteranceSegmenter {
    pub fn new() -> Self {
        Self {
            state: SegmentState::Idle,
            pending_text: String::new(),
            pending_tag: String::new(),
        }
    }

    /// Feed one signal; returns an utterance when a segment closes with
    /// non-empty text.
    pub fn on_signal(&mut self, signal: SpeechSignal) -> Option<Utterance> {
        match signal {
            SpeechSignal::SpeechStart => {
                self.state = SegmentState::Speaking;
                None
            }
            SpeechSignal::Partial { text, language_tag } => {
                // A partial implies speech even if the start marker was lost.
                self.state = SegmentState::Speaking;
                self.pending_text = text;
                self.pending_tag = language_tag;
                None
            }
            SpeechSignal::Final { text, language_tag } => {
                self.close_segment(text, language_tag, true)
            }
            SpeechSignal::SpeechEnd => {
                let text = std::mem::take(&mut self.pending_text);
                let tag = std::mem::take(&mut self.pending_tag);
                self.close_segment(text, tag, false)
            }
        }
    }

    pub fn is_speaking(&self) -> bool {
        self.state == SegmentState::Speaking
    }

    /// Discard any partial segment (session teardown).
    pub fn reset(&mut self) {
        self.state = SegmentState::Idle;
        self.pending_text.clear();
        self.pending_tag.clear();
    }

    fn close_segment(
        &mut self,
        text: String,
        language_tag: String,
        is_final: bool,
    ) -> Option<Utterance> {
        self.state = SegmentState::Idle;
        self.pending_text.clear();
        self.pending_tag.clear();

        let transcript = text.trim().to_owned();
        if transcript.is_empty() {
            return None;
        }
        debug!(is_final, tag = %language_tag, "utterance closed");
        Some(Utterance {
            transcript,
            raw_language_tag: language_tag,
            is_final,
        })
    }
}

impl Default for UtteranceSegmenter {
    fn default() -> Self {
        Self::new()
    }
}
