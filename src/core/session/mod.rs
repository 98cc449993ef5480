//! Per-call session state machine.
//!
//! The session is the one place turn-taking is enforced. It is written as
//! a pure transition function: events in, effects out, no I/O. The runner
//! owns the channels and performs the effects, which keeps the mutual
//! exclusion and echo-suppression rules unit-testable without a live call.
//!
//! States: `Active` (streaming caller audio), `Replying` (one reply in
//! flight, further utterances dropped), `Ended` (terminal). At most one
//! reply is ever in flight per session; nothing outside this module may
//! start one.

mod runner;

pub use runner::{SessionDeps, SessionHandle, spawn_session};

use std::time::Duration;

use bytes::Bytes;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::core::chunker::FrameChunker;
use crate::core::codec::{decode_frame, samples_to_le_bytes, upsample_x2};
use crate::core::language::{LanguageResolver, Locale, LockStrictness};
use crate::core::segmenter::{SpeechSignal, Utterance, UtteranceSegmenter};
use crate::core::stt::RecognizerEvent;

/// Per-session parameters fixed at call start.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub call_id: String,
    /// The call's native sample rate from the transport start event.
    pub sample_rate: u32,
    pub channel_count: u16,
    pub default_language: Locale,
    pub lock_strictness: LockStrictness,
    /// Batch-path chunk boundary.
    pub chunk_threshold: Duration,
    /// Safety margin added to the echo-suppression window after playback.
    pub ignore_margin: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Active,
    Replying,
    Ended,
}

/// Everything that can happen to a session, funneled through one channel.
#[derive(Debug)]
pub enum SessionEvent {
    /// Inbound companded frame from the call.
    Media { payload: Bytes, at: Instant },
    Recognizer(RecognizerEvent),
    /// Result of a batch transcription round.
    BatchTranscript { text: String, language_tag: String },
    /// The reply pipeline finished, successfully or not. `played` is the
    /// duration of audio actually delivered to the caller.
    ReplyFinished { played: Duration, at: Instant },
    Stop,
}

/// Side effects the runner performs on the session's behalf.
#[derive(Debug, PartialEq, Eq)]
pub enum Effect {
    /// Forward linear PCM to the streaming recognizer.
    ForwardAudio(Bytes),
    /// Transcribe one assembled chunk through the batch interface.
    Transcribe(Bytes),
    /// Start the reply pipeline for one resolved utterance.
    BeginReply { transcript: String, language: Locale },
    CloseRecognizer,
    Teardown,
}

/// One call's state. Owned by its runner task; no shared mutation.
pub struct Session {
    config: SessionConfig,
    phase: SessionPhase,
    /// Whether audio is forwarded to a live streaming recognizer. Flips to
    /// false permanently on a mid-stream error.
    streaming: bool,
    chunker: FrameChunker,
    segmenter: UtteranceSegmenter,
    resolver: LanguageResolver,
    confirmed_language: Locale,
    ignore_until: Option<Instant>,
    /// Rate of the PCM handed to recognizers, after upsampling.
    processing_rate: u32,
}

impl Session {
    pub fn new(config: SessionConfig, streaming: bool) -> Self {
        let processing_rate = config.sample_rate * 2;
        let chunker = FrameChunker::new(processing_rate, config.chunk_threshold);
        let resolver = LanguageResolver::new(config.default_language, config.lock_strictness);
        info!(
            call_id = %config.call_id,
            sample_rate = config.sample_rate,
            streaming,
            "session started"
        );
        Self {
            confirmed_language: config.default_language,
            config,
            phase: SessionPhase::Active,
            streaming,
            chunker,
            segmenter: UtteranceSegmenter::new(),
            resolver,
            ignore_until: None,
            processing_rate,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn confirmed_language(&self) -> Locale {
        self.confirmed_language
    }

    pub fn processing_rate(&self) -> u32 {
        self.processing_rate
    }

    pub fn ignore_until(&self) -> Option<Instant> {
        self.ignore_until
    }

    /// Pure transition: apply one event, return the effects to perform.
    pub fn on_event(&mut self, event: SessionEvent) -> Vec<Effect> {
        if self.phase == SessionPhase::Ended {
            return Vec::new();
        }
        match event {
            SessionEvent::Media { payload, at } => self.on_media(payload, at),
            SessionEvent::Recognizer(event) => self.on_recognizer(event),
            SessionEvent::BatchTranscript { text, language_tag } => {
                self.on_signal(SpeechSignal::Final { text, language_tag })
            }
            SessionEvent::ReplyFinished { played, at } => self.on_reply_finished(played, at),
            SessionEvent::Stop => self.on_stop(),
        }
    }

    fn on_media(&mut self, payload: Bytes, at: Instant) -> Vec<Effect> {
        // Echo suppression: discard without buffering while the window is
        // open, so the bridge never transcribes its own voice.
        if let Some(until) = self.ignore_until
            && at < until
        {
            return Vec::new();
        }

        let samples = decode_frame(&payload);
        let pcm = samples_to_le_bytes(&upsample_x2(&samples));

        if self.streaming {
            return vec![Effect::ForwardAudio(Bytes::from(pcm))];
        }

        self.chunker.push(&pcm);
        let reply_in_flight = self.phase == SessionPhase::Replying;
        if self.chunker.ready(reply_in_flight) {
            return vec![Effect::Transcribe(self.chunker.take())];
        }
        Vec::new()
    }

    fn on_recognizer(&mut self, event: RecognizerEvent) -> Vec<Effect> {
        match event {
            RecognizerEvent::SpeechStarted => self.on_signal(SpeechSignal::SpeechStart),
            RecognizerEvent::SpeechEnded => self.on_signal(SpeechSignal::SpeechEnd),
            RecognizerEvent::PartialTranscript { text, language_tag } => {
                self.on_signal(SpeechSignal::Partial { text, language_tag })
            }
            RecognizerEvent::FinalTranscript { text, language_tag } => {
                self.on_signal(SpeechSignal::Final { text, language_tag })
            }
            RecognizerEvent::StreamError { message } => {
                warn!(
                    call_id = %self.config.call_id,
                    %message,
                    "recognizer stream broke, downgrading to batch"
                );
                self.streaming = false;
                self.segmenter.reset();
                vec![Effect::CloseRecognizer]
            }
        }
    }

    fn on_signal(&mut self, signal: SpeechSignal) -> Vec<Effect> {
        match self.segmenter.on_signal(signal) {
            Some(utterance) => self.on_utterance(utterance),
            None => Vec::new(),
        }
    }

    fn on_utterance(&mut self, utterance: Utterance) -> Vec<Effect> {
        if self.phase != SessionPhase::Active {
            // One reply at a time; overlapping speech is dropped, not queued.
            debug!(
                call_id = %self.config.call_id,
                transcript = %utterance.transcript,
                "utterance dropped while reply in flight"
            );
            return Vec::new();
        }

        let language = self.resolver.resolve_turn(
            &utterance.transcript,
            &utterance.raw_language_tag,
            self.confirmed_language,
        );
        self.confirmed_language = language;
        self.phase = SessionPhase::Replying;
        info!(
            call_id = %self.config.call_id,
            %language,
            is_final = utterance.is_final,
            "utterance accepted for reply"
        );
        vec![Effect::BeginReply {
            transcript: utterance.transcript,
            language,
        }]
    }

    fn on_reply_finished(&mut self, played: Duration, at: Instant) -> Vec<Effect> {
        self.phase = SessionPhase::Active;
        self.ignore_until = Some(at + played + self.config.ignore_margin);
        debug!(call_id = %self.config.call_id, ?played, "reply finished");
        Vec::new()
    }

    fn on_stop(&mut self) -> Vec<Effect> {
        info!(call_id = %self.config.call_id, "session ended");
        self.phase = SessionPhase::Ended;
        self.chunker.clear();
        self.segmenter.reset();
        let mut effects = Vec::new();
        if self.streaming {
            effects.push(Effect::CloseRecognizer);
        }
        effects.push(Effect::Teardown);
        effects
    }
}
