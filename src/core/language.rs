//! Per-turn language resolution.
//!
//! Recognizer language tags on telephony audio are unreliable, especially
//! for code-switched Hindi/English speech written in Latin script. This
//! module reconciles the recognizer's tag with script detection and lexical
//! heuristics into one stable locale per turn. The whole policy is a pure
//! function so every branch can be example-tested.
//!
//! Precedence, highest first:
//! 1. script detection (a language-specific script block wins outright),
//! 2. Romanized-Hindi lexical markers when the tag claims the default
//!    language,
//! 3. the normalized recognizer tag itself,
//! 4. stopword-frequency classification for unresolved tags, with short
//!    texts defaulting to the primary configured language.
//!
//! A configurable lock strictness then decides whether the fresh resolution
//! may replace the session's confirmed language.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The fixed locale set the bridge can resolve to. Output is never empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Locale {
    #[serde(rename = "en-IN")]
    EnIn,
    #[serde(rename = "hi-IN")]
    HiIn,
    #[serde(rename = "ta-IN")]
    TaIn,
    #[serde(rename = "te-IN")]
    TeIn,
    #[serde(rename = "bn-IN")]
    BnIn,
}

impl Locale {
    pub fn code(self) -> &'static str {
        match self {
            Locale::EnIn => "en-IN",
            Locale::HiIn => "hi-IN",
            Locale::TaIn => "ta-IN",
            Locale::TeIn => "te-IN",
            Locale::BnIn => "bn-IN",
        }
    }

    /// Human-readable language name, used in generation prompts.
    pub fn language_name(self) -> &'static str {
        match self {
            Locale::EnIn => "English",
            Locale::HiIn => "Hindi",
            Locale::TaIn => "Tamil",
            Locale::TeIn => "Telugu",
            Locale::BnIn => "Bengali",
        }
    }

    /// Normalize a recognizer-reported tag to a locale. Accepts bare
    /// prefixes (`hi`), regioned forms (`hi-IN`, `en_US`) and is case
    /// insensitive. Returns `None` for unknown or empty tags.
    pub fn from_tag(tag: &str) -> Option<Self> {
        let tag = tag.trim().to_ascii_lowercase();
        let prefix = tag.split(['-', '_']).next().unwrap_or("");
        match prefix {
            "en" => Some(Locale::EnIn),
            "hi" => Some(Locale::HiIn),
            "ta" => Some(Locale::TaIn),
            "te" => Some(Locale::TeIn),
            "bn" => Some(Locale::BnIn),
            _ => None,
        }
    }
}

impl std::fmt::Display for Locale {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Locale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Locale::from_tag(s).ok_or_else(|| format!("unsupported locale: {s}"))
    }
}

/// How readily the resolved conversation language may change turn-to-turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockStrictness {
    /// Every turn's resolution replaces the confirmed language.
    #[default]
    Loose,
    /// The confirmed language is replaced only when the fresh resolution
    /// agrees with the recognizer's own raw tag. Reduces flapping caused by
    /// short ambiguous turns.
    Strict,
}

/// Romanized-Hindi words strongly associated with Hindi speech transcribed
/// in Latin script. Any hit overrides a default-language recognizer tag.
const HINDI_LATIN_MARKERS: &[&str] = &[
    "hai", "hain", "nahi", "nahin", "kya", "kyun", "kaise", "kaun", "kitna", "kitne", "aap",
    "tum", "mera", "meri", "mujhe", "hum", "haan", "acha", "accha", "theek", "thik", "chahiye",
    "karo", "karna", "batao", "bataiye", "bolo", "boliye", "namaste", "shukriya", "dhanyavad",
    "paisa", "rupay", "rupaye",
];

/// Common English function words for the statistical fallback.
const ENGLISH_STOPWORDS: &[&str] = &[
    "the", "is", "are", "was", "were", "a", "an", "and", "or", "to", "of", "in", "on", "for",
    "with", "you", "i", "my", "your", "what", "how", "when", "can", "please", "yes", "no",
    "want", "need", "have", "this", "that", "it",
];

#[derive(Debug, Clone)]
pub struct LanguageResolver {
    /// Primary configured language; wins ties and short texts.
    default_locale: Locale,
    strictness: LockStrictness,
    /// Texts shorter than this are too ambiguous to classify statistically.
    min_classify_chars: usize,
}

impl LanguageResolver {
    pub fn new(default_locale: Locale, strictness: LockStrictness) -> Self {
        Self {
            default_locale,
            strictness,
            min_classify_chars: 12,
        }
    }

    pub fn default_locale(&self) -> Locale {
        self.default_locale
    }

    /// Resolve one turn's language and apply the lock policy against the
    /// previously confirmed locale. Returns the new confirmed locale.
    /// Deterministic for identical inputs.
    pub fn resolve_turn(&self, transcript: &str, raw_tag: &str, confirmed: Locale) -> Locale {
        let fresh = self.resolve_fresh(transcript, raw_tag);
        match self.strictness {
            LockStrictness::Loose => fresh,
            LockStrictness::Strict => {
                if Locale::from_tag(raw_tag) == Some(fresh) {
                    fresh
                } else {
                    confirmed
                }
            }
        }
    }

    /// The turn's resolution before the lock policy is applied.
    fn resolve_fresh(&self, transcript: &str, raw_tag: &str) -> Locale {
        if let Some(by_script) = detect_script_locale(transcript) {
            return by_script;
        }

        match Locale::from_tag(raw_tag) {
            Some(tagged) if tagged == self.default_locale => {
                if has_hindi_markers(transcript) {
                    Locale::HiIn
                } else {
                    tagged
                }
            }
            Some(tagged) => tagged,
            None => self.classify(transcript),
        }
    }

    /// Stopword-frequency classification between English and Romanized
    /// Hindi. Only reached for Latin-script text with an unresolved tag;
    /// the non-Latin locales are always caught by script detection first.
    fn classify(&self, transcript: &str) -> Locale {
        if transcript.chars().count() < self.min_classify_chars {
            return self.default_locale;
        }

        let mut english = 0usize;
        let mut hindi = 0usize;
        for word in transcript
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let word = word.to_lowercase();
            if ENGLISH_STOPWORDS.contains(&word.as_str()) {
                english += 1;
            }
            if HINDI_LATIN_MARKERS.contains(&word.as_str()) {
                hindi += 1;
            }
        }

        if hindi > english {
            Locale::HiIn
        } else if english > hindi {
            Locale::EnIn
        } else {
            self.default_locale
        }
    }
}

/// Script-block detection. Any codepoint from a language-specific script
/// resolves that language outright, overriding the recognizer tag.
pub fn detect_script_locale(text: &str) -> Option<Locale> {
    for c in text.chars() {
        let locale = match c as u32 {
            0x0900..=0x097F => Some(Locale::HiIn), // Devanagari
            0x0980..=0x09FF => Some(Locale::BnIn), // Bengali
            0x0B80..=0x0BFF => Some(Locale::TaIn), // Tamil
            0x0C00..=0x0C7F => Some(Locale::TeIn), // Telugu
            _ => None,
        };
        if locale.is_some() {
            return locale;
        }
    }
    None
}

fn has_hindi_markers(transcript: &str) -> bool {
    transcript
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .any(|w| HINDI_LATIN_MARKERS.contains(&w.to_lowercase().as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loose() -> LanguageResolver {
        LanguageResolver::new(Locale::EnIn, LockStrictness::Loose)
    }

    fn strict() -> LanguageResolver {
        LanguageResolver::new(Locale::EnIn, LockStrictness::Strict)
    }

    #[test]
    fn tag_normalization_accepts_prefixes_and_regions() {
        assert_eq!(Locale::from_tag("hi"), Some(Locale::HiIn));
        assert_eq!(Locale::from_tag("hi-IN"), Some(Locale::HiIn));
        assert_eq!(Locale::from_tag("en_US"), Some(Locale::EnIn));
        assert_eq!(Locale::from_tag("TA-in"), Some(Locale::TaIn));
        assert_eq!(Locale::from_tag("unknown"), None);
        assert_eq!(Locale::from_tag(""), None);
    }

    #[test]
    fn devanagari_script_wins_over_recognizer_tag() {
        // Recognizer claims unknown; Devanagari codepoints decide.
        let resolved = loose().resolve_turn("आप कैसे हैं", "unknown", Locale::EnIn);
        assert_eq!(resolved, Locale::HiIn);

        // Even a confident English tag loses to the script.
        let resolved = loose().resolve_turn("नमस्ते", "en-US", Locale::EnIn);
        assert_eq!(resolved, Locale::HiIn);
    }

    #[test]
    fn each_script_block_maps_to_its_locale() {
        assert_eq!(detect_script_locale("வணக்கம்"), Some(Locale::TaIn));
        assert_eq!(detect_script_locale("నమస్కారం"), Some(Locale::TeIn));
        assert_eq!(detect_script_locale("নমস্কার"), Some(Locale::BnIn));
        assert_eq!(detect_script_locale("hello"), None);
    }

    #[test]
    fn latin_hindi_markers_override_default_tag() {
        let resolved = loose().resolve_turn("aap kaise hain", "en-IN", Locale::EnIn);
        assert_eq!(resolved, Locale::HiIn);

        // Plain English under the same tag stays English.
        let resolved = loose().resolve_turn("how are you doing", "en-IN", Locale::EnIn);
        assert_eq!(resolved, Locale::EnIn);
    }

    #[test]
    fn non_default_tag_is_trusted_without_marker_check() {
        let resolved = loose().resolve_turn("vanakkam nalla irukken", "ta", Locale::EnIn);
        assert_eq!(resolved, Locale::TaIn);
    }

    #[test]
    fn unresolved_tag_falls_back_to_classification() {
        let resolved = loose().resolve_turn("mujhe paisa chahiye abhi", "unknown", Locale::EnIn);
        assert_eq!(resolved, Locale::HiIn);

        let resolved = loose().resolve_turn("i want to know the balance", "", Locale::HiIn);
        assert_eq!(resolved, Locale::EnIn);
    }

    #[test]
    fn short_ambiguous_text_defaults_to_primary_language() {
        let resolved = loose().resolve_turn("ok", "unknown", Locale::HiIn);
        assert_eq!(resolved, Locale::EnIn);
    }

    #[test]
    fn resolution_is_deterministic() {
        let resolver = loose();
        let a = resolver.resolve_turn("kya haal hai", "en", Locale::EnIn);
        let b = resolver.resolve_turn("kya haal hai", "en", Locale::EnIn);
        assert_eq!(a, b);
    }

    #[test]
    fn loose_lock_lets_consecutive_turns_flip() {
        let resolver = loose();
        let first = resolver.resolve_turn("haan theek hai", "en", Locale::EnIn);
        assert_eq!(first, Locale::HiIn);
        let second = resolver.resolve_turn("yes that is fine okay", "en", first);
        assert_eq!(second, Locale::EnIn);
    }

    #[test]
    fn strict_lock_keeps_confirmed_on_tag_disagreement() {
        let resolver = strict();
        // Fresh resolution says Hindi (markers), raw tag says English:
        // disagreement, so the confirmed language is retained.
        let resolved = resolver.resolve_turn("haan theek hai", "en", Locale::EnIn);
        assert_eq!(resolved, Locale::EnIn);

        // When tag and resolution agree, replacement goes through.
        let resolved = resolver.resolve_turn("sab theek hai", "hi", Locale::EnIn);
        assert_eq!(resolved, Locale::HiIn);
    }

    #[test]
    fn strict_lock_respects_script_agreement() {
        let resolver = strict();
        let resolved = resolver.resolve_turn("आप कैसे हैं", "hi-IN", Locale::EnIn);
        assert_eq!(resolved, Locale::HiIn);
    }
}
