use serde::{Deserialize, Serialize};

/// Separator between a word and its part-of-speech suffix (`кот_NOUN`)
pub const POS_SEPARATOR: char = '_';

/// Universal POS tag set (17 UPOS tags) plus `Unknown` for untagged tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartOfSpeech {
    Adjective,
    Adposition,
    Adverb,
    Auxiliary,
    CoordinatingConjunction,
    Determiner,
    Interjection,
    Noun,
    Numeral,
    Particle,
    Pronoun,
    ProperNoun,
    Punctuation,
    SubordinatingConjunction,
    Symbol,
    Verb,
    Other,
    Unknown,
}

impl PartOfSpeech {
    /// Every real tag, in suffix order. `Unknown` is not a tag.
    pub const TAGGED: [PartOfSpeech; 17] = [
        PartOfSpeech::Adjective,
        PartOfSpeech::Adposition,
        PartOfSpeech::Adverb,
        PartOfSpeech::Auxiliary,
        PartOfSpeech::CoordinatingConjunction,
        PartOfSpeech::Determiner,
        PartOfSpeech::Interjection,
        PartOfSpeech::Noun,
        PartOfSpeech::Numeral,
        PartOfSpeech::Particle,
        PartOfSpeech::Pronoun,
        PartOfSpeech::ProperNoun,
        PartOfSpeech::Punctuation,
        PartOfSpeech::SubordinatingConjunction,
        PartOfSpeech::Symbol,
        PartOfSpeech::Verb,
        PartOfSpeech::Other,
    ];

    /// Parse a UPOS suffix (`NOUN`, `VERB`, ...). Anything else is `Unknown`.
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "ADJ" => PartOfSpeech::Adjective,
            "ADP" => PartOfSpeech::Adposition,
            "ADV" => PartOfSpeech::Adverb,
            "AUX" => PartOfSpeech::Auxiliary,
            "CCONJ" => PartOfSpeech::CoordinatingConjunction,
            "DET" => PartOfSpeech::Determiner,
            "INTJ" => PartOfSpeech::Interjection,
            "NOUN" => PartOfSpeech::Noun,
            "NUM" => PartOfSpeech::Numeral,
            "PART" => PartOfSpeech::Particle,
            "PRON" => PartOfSpeech::Pronoun,
            "PROPN" => PartOfSpeech::ProperNoun,
            "PUNCT" => PartOfSpeech::Punctuation,
            "SCONJ" => PartOfSpeech::SubordinatingConjunction,
            "SYM" => PartOfSpeech::Symbol,
            "VERB" => PartOfSpeech::Verb,
            "X" => PartOfSpeech::Other,
            _ => PartOfSpeech::Unknown,
        }
    }

    /// The UPOS suffix, `None` for `Unknown`
    pub fn tag(&self) -> Option<&'static str> {
        let tag = match self {
            PartOfSpeech::Adjective => "ADJ",
            PartOfSpeech::Adposition => "ADP",
            PartOfSpeech::Adverb => "ADV",
            PartOfSpeech::Auxiliary => "AUX",
            PartOfSpeech::CoordinatingConjunction => "CCONJ",
            PartOfSpeech::Determiner => "DET",
            PartOfSpeech::Interjection => "INTJ",
            PartOfSpeech::Noun => "NOUN",
            PartOfSpeech::Numeral => "NUM",
            PartOfSpeech::Particle => "PART",
            PartOfSpeech::Pronoun => "PRON",
            PartOfSpeech::ProperNoun => "PROPN",
            PartOfSpeech::Punctuation => "PUNCT",
            PartOfSpeech::SubordinatingConjunction => "SCONJ",
            PartOfSpeech::Symbol => "SYM",
            PartOfSpeech::Verb => "VERB",
            PartOfSpeech::Other => "X",
            PartOfSpeech::Unknown => return None,
        };
        Some(tag)
    }

    /// Parse a configuration name (`noun`, `proper_noun`, ...).
    ///
    /// Returns `None` for unrecognised names and for `any`, which is handled by
    /// [`crate::filter::PosFilter`].
    pub fn from_name(name: &str) -> Option<Self> {
        let pos = match name.trim().to_lowercase().as_str() {
            "adjective" => PartOfSpeech::Adjective,
            "adposition" => PartOfSpeech::Adposition,
            "adverb" => PartOfSpeech::Adverb,
            "auxiliary" => PartOfSpeech::Auxiliary,
            "coordinating_conjunction" => PartOfSpeech::CoordinatingConjunction,
            "determiner" => PartOfSpeech::Determiner,
            "interjection" => PartOfSpeech::Interjection,
            "noun" => PartOfSpeech::Noun,
            "numeral" => PartOfSpeech::Numeral,
            "particle" => PartOfSpeech::Particle,
            "pronoun" => PartOfSpeech::Pronoun,
            "proper_noun" => PartOfSpeech::ProperNoun,
            "punctuation" => PartOfSpeech::Punctuation,
            "subordinating_conjunction" => PartOfSpeech::SubordinatingConjunction,
            "symbol" => PartOfSpeech::Symbol,
            "verb" => PartOfSpeech::Verb,
            "other" => PartOfSpeech::Other,
            _ => return None,
        };
        Some(pos)
    }

    pub fn is_tagged(&self) -> bool {
        !matches!(self, PartOfSpeech::Unknown)
    }
}

impl std::fmt::Display for PartOfSpeech {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.tag().unwrap_or("UNKNOWN"))
    }
}

/// Split a token into its bare word and POS tag.
///
/// The suffix after the last underscore must be a recognised tag and the word
/// before it must be non-empty, otherwise the whole token is the word and the
/// tag is `Unknown`.
pub fn split_token(token: &str) -> (&str, PartOfSpeech) {
    if let Some((word, tag)) = token.rsplit_once(POS_SEPARATOR) {
        let pos = PartOfSpeech::from_tag(tag);
        if pos.is_tagged() && !word.is_empty() {
            return (word, pos);
        }
    }
    (token, PartOfSpeech::Unknown)
}

/// Whether the token carries a recognised POS suffix
pub fn has_pos(token: &str) -> bool {
    split_token(token).1.is_tagged()
}

/// Bare word of a token (the token itself when untagged)
pub fn bare_word(token: &str) -> &str {
    split_token(token).0
}

/// Build `word_TAG`, or just `word` for `Unknown`
pub fn token_with_pos(word: &str, pos: PartOfSpeech) -> String {
    match pos.tag() {
        Some(tag) => format!("{}{}{}", word, POS_SEPARATOR, tag),
        None => word.to_string(),
    }
}

/// One vocabulary item with its unit-length embedding
#[derive(Debug, Clone, PartialEq)]
pub struct WordEntry {
    token: String,
    word_len: usize,
    pos: PartOfSpeech,
    embedding: Vec<f32>,
}

impl WordEntry {
    /// Build an entry from a raw token. The embedding is stored as given;
    /// the loader normalizes before calling this.
    pub fn new(token: &str, embedding: Vec<f32>) -> Self {
        let (word, pos) = split_token(token);
        Self {
            token: token.to_string(),
            word_len: word.len(),
            pos,
            embedding,
        }
    }

    /// Surface form plus optional POS suffix, exactly as loaded
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Surface form without the POS suffix
    pub fn word(&self) -> &str {
        &self.token[..self.word_len]
    }

    pub fn pos(&self) -> PartOfSpeech {
        self.pos
    }

    pub fn has_pos(&self) -> bool {
        self.pos.is_tagged()
    }

    pub fn embedding(&self) -> &[f32] {
        &self.embedding
    }
}

impl std::fmt::Display for WordEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.token)
    }
}
