//! Reply orchestration with fallback policies.
//!
//! One caller turn flows through here: generate reply text in the resolved
//! language, sanitize it for speech output, then synthesize audio. A phone
//! call has no channel for raw error text, so generation failures degrade
//! to a fixed per-language apology and synthesis failures simply yield no
//! audio, letting the session fall back to the transport's built-in voice.

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

use crate::core::language::Locale;
use crate::core::llm::TextGenerator;
use crate::core::tts::{AudioData, SpeechSynthesizer};

/// One turn's reply; ephemeral, never queued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub language: Locale,
}

/// Pictographic symbols (emoji blocks, dingbats, variation selectors and
/// the zero-width joiner) that a synthesizer would read out or choke on.
static PICTOGRAPHS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        "[\u{1F300}-\u{1FAFF}\u{2600}-\u{27BF}\u{2B00}-\u{2BFF}\u{FE0F}\u{200D}]+",
    )
    .unwrap_or_else(|e| unreachable!("pictograph pattern is static: {e}"))
});

fn apology(language: Locale) -> &'static str {
    match language {
        Locale::EnIn => "Sorry, I ran into a problem. Could you please say that again?",
        Locale::HiIn => "माफ़ कीजिए, कुछ गड़बड़ हो गई। कृपया दोबारा बोलिए।",
        Locale::TaIn => "மன்னிக்கவும், ஏதோ தவறு நடந்தது. தயவுசெய்து மீண்டும் சொல்லுங்கள்.",
        Locale::TeIn => "క్షమించండి, ఏదో పొరపాటు జరిగింది. దయచేసి మళ్లీ చెప్పండి.",
        Locale::BnIn => "দুঃখিত, কিছু সমস্যা হয়েছে। অনুগ্রহ করে আবার বলুন।",
    }
}

/// Clean generated text for speech output: drop pictographs, collapse
/// decorative punctuation runs, and cap the length at a character boundary.
pub fn sanitize(text: &str, max_chars: usize) -> String {
    let stripped = PICTOGRAPHS.replace_all(text, "");

    let mut out = String::with_capacity(stripped.len());
    let mut prev: Option<char> = None;
    for ch in stripped.chars() {
        let decorative = matches!(ch, '!' | '?' | '.' | ',' | ';' | ':' | '-' | '~' | '*' | '_');
        if decorative && prev == Some(ch) {
            continue;
        }
        out.push(ch);
        prev = Some(ch);
    }

    let capped: String = out.trim().chars().take(max_chars).collect();
    capped.trim_end().to_owned()
}

/// Drives one turn's generation and synthesis with the degradation policy
/// baked in. Owned by the session runner; collaborators are shared.
pub struct ReplyPipeline {
    generator: Arc<dyn TextGenerator>,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    max_chars: usize,
}

impl ReplyPipeline {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        synthesizer: Arc<dyn SpeechSynthesizer>,
        max_chars: usize,
    ) -> Self {
        Self {
            generator,
            synthesizer,
            max_chars,
        }
    }

    /// Produce reply text for one transcript. Infallible: generator errors
    /// and empty output degrade to a per-language apology.
    pub async fn generate(&self, transcript: &str, language: Locale) -> Reply {
        let text = match self.generator.generate(transcript, language).await {
            Ok(text) => {
                let cleaned = sanitize(&text, self.max_chars);
                if cleaned.is_empty() {
                    warn!(%language, "generator output sanitized to nothing, using apology");
                    apology(language).to_owned()
                } else {
                    cleaned
                }
            }
            Err(e) => {
                warn!(%language, error = %e, "generation failed, using apology");
                apology(language).to_owned()
            }
        };
        Reply { text, language }
    }

    /// Synthesize audio for a reply. `None` means the caller should use the
    /// transport's spoken-text fallback instead of paced playback.
    pub async fn synthesize(&self, reply: &Reply) -> Option<AudioData> {
        match self.synthesizer.synthesize(&reply.text, reply.language).await {
            Ok(audio) if !audio.is_empty() => Some(audio),
            Ok(_) => {
                warn!(language = %reply.language, "synthesizer returned empty audio");
                None
            }
            Err(e) => {
                warn!(language = %reply.language, error = %e, "synthesis failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::errors::{GenerationError, SynthesisError};

    struct FixedGenerator(&'static str);

    #[async_trait]
    impl TextGenerator for FixedGenerator {
        async fn generate(&self, _t: &str, _l: Locale) -> Result<String, GenerationError> {
            Ok(self.0.to_owned())
        }
    }

    struct FailingGenerator;

    #[async_trait]
    impl TextGenerator for FailingGenerator {
        async fn generate(&self, _t: &str, _l: Locale) -> Result<String, GenerationError> {
            Err(GenerationError::EmptyOutput)
        }
    }

    struct CountingSynth(AtomicUsize);

    #[async_trait]
    impl SpeechSynthesizer for CountingSynth {
        async fn synthesize(&self, _t: &str, _l: Locale) -> Result<AudioData, SynthesisError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(AudioData {
                samples: vec![0; 160],
                sample_rate: 16_000,
            })
        }
    }

    struct FailingSynth;

    #[async_trait]
    impl SpeechSynthesizer for FailingSynth {
        async fn synthesize(&self, _t: &str, _l: Locale) -> Result<AudioData, SynthesisError> {
            Err(SynthesisError::EmptyAudio)
        }
    }

    fn pipeline(g: Arc<dyn TextGenerator>, s: Arc<dyn SpeechSynthesizer>) -> ReplyPipeline {
        ReplyPipeline::new(g, s, 240)
    }

    #[test]
    fn sanitize_collapses_punctuation_runs() {
        assert_eq!(sanitize("Great!!! Really...", 240), "Great! Really.");
        assert_eq!(sanitize("wait -- what??", 240), "wait - what?");
    }

    #[test]
    fn sanitize_strips_pictographs() {
        assert_eq!(sanitize("Hello \u{1F600}\u{1F44D} there \u{2764}\u{FE0F}", 240), "Hello  there");
    }

    #[test]
    fn sanitize_truncates_on_character_boundary() {
        // Devanagari text; byte truncation would split a codepoint.
        let long = "नमस्ते दुनिया".repeat(30);
        let cut = sanitize(&long, 20);
        assert_eq!(cut.chars().count(), 20);
    }

    #[tokio::test]
    async fn generation_failure_yields_apology_in_language() {
        let p = pipeline(Arc::new(FailingGenerator), Arc::new(FailingSynth));
        let reply = p.generate("kya haal hai", Locale::HiIn).await;
        assert_eq!(reply.language, Locale::HiIn);
        assert!(reply.text.contains("माफ़"));
    }

    #[tokio::test]
    async fn sanitized_empty_output_also_yields_apology() {
        let p = pipeline(Arc::new(FixedGenerator("\u{1F600}\u{1F600}")), Arc::new(FailingSynth));
        let reply = p.generate("hello", Locale::EnIn).await;
        assert!(reply.text.starts_with("Sorry"));
    }

    #[tokio::test]
    async fn successful_generation_is_sanitized() {
        let p = pipeline(
            Arc::new(FixedGenerator("I am fine!!! \u{1F600}")),
            Arc::new(FailingSynth),
        );
        let reply = p.generate("how are you", Locale::EnIn).await;
        assert_eq!(reply.text, "I am fine!");
    }

    #[tokio::test]
    async fn synthesis_failure_returns_none() {
        let p = pipeline(Arc::new(FixedGenerator("hi")), Arc::new(FailingSynth));
        let reply = p.generate("hello", Locale::EnIn).await;
        assert!(p.synthesize(&reply).await.is_none());
    }

    #[tokio::test]
    async fn synthesis_success_returns_audio() {
        let synth = Arc::new(CountingSynth(AtomicUsize::new(0)));
        let p = pipeline(Arc::new(FixedGenerator("hi")), synth.clone());
        let reply = p.generate("hello", Locale::EnIn).await;
        let audio = p.synthesize(&reply).await.expect("audio");
        assert_eq!(audio.sample_rate, 16_000);
        assert_eq!(synth.0.load(Ordering::SeqCst), 1);
    }
}
