//! Dictionary Filter Policy
//!
//! Decides which tokens are dropped from the embedding vocabulary and from the
//! dedicated dictionary. A token is dropped when its bare word is shorter than
//! the minimum length (in characters), when it is blacklisted, or when it fails
//! the POS allow-list for the vocabulary being built.

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader, ErrorKind};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::LoadError;
use crate::text;
use crate::types::{split_token, PartOfSpeech, POS_SEPARATOR};

/// POS allow-list. `Any` disables type filtering.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PosFilter {
    #[default]
    Any,
    Only(Vec<PartOfSpeech>),
}

impl PosFilter {
    /// Build from configuration names. `any` wins over everything else,
    /// unknown names are ignored, and an empty result means `Any`.
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Self {
        let mut types = Vec::new();
        for name in names {
            let name = name.as_ref();
            if name.trim().eq_ignore_ascii_case("any") {
                return PosFilter::Any;
            }
            match PartOfSpeech::from_name(name) {
                Some(pos) if !types.contains(&pos) => types.push(pos),
                Some(_) => {}
                None => warn!("Unknown word type '{}', ignoring", name),
            }
        }
        if types.is_empty() {
            PosFilter::Any
        } else {
            PosFilter::Only(types)
        }
    }

    pub fn is_any(&self) -> bool {
        matches!(self, PosFilter::Any)
    }

    /// Whether a token of this type passes the allow-list
    pub fn allows(&self, pos: PartOfSpeech) -> bool {
        match self {
            PosFilter::Any => true,
            PosFilter::Only(types) => pos.is_tagged() && types.contains(&pos),
        }
    }
}

/// Filter settings as they appear in the configuration file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub blacklist_path: Option<String>,
    pub min_word_length: usize,
    pub embedding_preferred_types: Vec<String>,
    pub dictionary_preferred_types: Vec<String>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            blacklist_path: None,
            min_word_length: 2,
            embedding_preferred_types: vec!["any".to_string()],
            dictionary_preferred_types: vec!["any".to_string()],
        }
    }
}

/// Pure keep/drop policy for tokens
#[derive(Debug, Clone)]
pub struct FilterPolicy {
    min_word_length: usize,
    blacklist: HashSet<String>,
    embedding_types: PosFilter,
    dictionary_types: PosFilter,
}

impl Default for FilterPolicy {
    fn default() -> Self {
        Self::new(2)
    }
}

impl FilterPolicy {
    /// Policy with only a minimum length; no blacklist, any POS accepted
    pub fn new(min_word_length: usize) -> Self {
        Self {
            min_word_length,
            blacklist: HashSet::new(),
            embedding_types: PosFilter::Any,
            dictionary_types: PosFilter::Any,
        }
    }

    /// Build from configuration, reading the blacklist file if one is set
    pub fn from_config(config: &FilterConfig) -> Result<Self, LoadError> {
        let mut policy = Self::new(config.min_word_length)
            .with_embedding_types(PosFilter::from_names(&config.embedding_preferred_types))
            .with_dictionary_types(PosFilter::from_names(&config.dictionary_preferred_types));

        if let Some(ref path) = config.blacklist_path {
            info!("Loading blacklisted words from: {}", path);
            policy.blacklist = load_blacklist(path)?;
        }

        info!(
            "Dictionary filter initialized: min_length={}, blacklist_size={}, embedding_types={:?}, dictionary_types={:?}",
            policy.min_word_length,
            policy.blacklist.len(),
            policy.embedding_types,
            policy.dictionary_types
        );
        Ok(policy)
    }

    pub fn with_blacklist<I, S>(mut self, words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.blacklist = words.into_iter().map(|w| normalize_blacklist_entry(w.as_ref())).collect();
        self
    }

    pub fn with_embedding_types(mut self, types: PosFilter) -> Self {
        self.embedding_types = types;
        self
    }

    pub fn with_dictionary_types(mut self, types: PosFilter) -> Self {
        self.dictionary_types = types;
        self
    }

    pub fn min_word_length(&self) -> usize {
        self.min_word_length
    }

    pub fn blacklist_len(&self) -> usize {
        self.blacklist.len()
    }

    pub fn embedding_types(&self) -> &PosFilter {
        &self.embedding_types
    }

    pub fn dictionary_types(&self) -> &PosFilter {
        &self.dictionary_types
    }

    /// Blacklist lookup on the case-folded bare word
    pub fn is_blacklisted(&self, word: &str) -> bool {
        !self.blacklist.is_empty() && self.blacklist.contains(&text::to_lower(word))
    }

    /// Whether a token should be dropped from the embedding vocabulary
    pub fn should_filter_embedding(&self, token: &str) -> bool {
        self.should_filter(token, &self.embedding_types)
    }

    /// Whether a token should be dropped from the dedicated dictionary
    pub fn should_filter_dictionary(&self, token: &str) -> bool {
        self.should_filter(token, &self.dictionary_types)
    }

    fn should_filter(&self, token: &str, types: &PosFilter) -> bool {
        let (word, pos) = split_token(token);
        if text::char_count(word) < self.min_word_length {
            return true;
        }
        if self.is_blacklisted(word) {
            return true;
        }
        !types.allows(pos)
    }
}

fn normalize_blacklist_entry(line: &str) -> String {
    text::to_lower(line.trim_end().trim_end_matches(POS_SEPARATOR))
}

/// Read a blacklist file: one word per line, `#` comments and blank lines
/// skipped, trailing underscores stripped, case-folded.
pub fn load_blacklist<P: AsRef<Path>>(path: P) -> Result<HashSet<String>, LoadError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| LoadError::open(path, e))?;
    let reader = BufReader::new(file);

    let mut words = HashSet::new();
    let mut line_count = 0usize;

    for line in reader.lines() {
        line_count += 1;
        let line = match line {
            Ok(line) => line,
            Err(e) if e.kind() == ErrorKind::InvalidData => {
                warn!("Skipping blacklist line {} with invalid UTF-8", line_count);
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        let trimmed = line.trim_end();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let word = normalize_blacklist_entry(trimmed);
        if !word.is_empty() {
            words.insert(word);
        }
    }

    info!(
        "Processed {} lines from blacklist file, loaded {} unique blacklisted words",
        line_count,
        words.len()
    );
    Ok(words)
}
