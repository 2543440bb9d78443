//! Dictionary Store
//!
//! One append-only arena of [`WordEntry`] values plus index maps holding
//! integer offsets into it:
//!
//! - `by_token`: exact token (`кот_NOUN`) → entry, 1:1
//! - `by_word`: lower-cased bare word (`кот`) → every POS variant, 1:N
//! - `by_type`: POS tag → entries, 1:N
//! - `dedicated`: optional curated subset used for target selection
//!
//! The store is built once and never mutated afterwards, so it can be shared
//! behind an `Arc` without locking. The only interior mutability is the RNG
//! used for random selection, which sits behind its own mutex.

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader, ErrorKind};
use std::path::Path;
use std::sync::{Mutex, PoisonError};

use rand::seq::index;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::LoadError;
use crate::filter::FilterPolicy;
use crate::similarity::entry_similarity;
use crate::simd_ops::top_k;
use crate::text;
use crate::types::{bare_word, has_pos, PartOfSpeech, WordEntry};
use crate::vectors::{load_vector_file, LoadStats};

/// Dictionary settings as they appear in the configuration file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DictionaryConfig {
    pub embeddings_path: String,
    pub dictionary_path: Option<String>,
    /// Maximum words read from the dedicated dictionary (0 = unlimited)
    pub max_dictionary_words: usize,
    /// Fixed RNG seed; `None` seeds from OS entropy
    pub seed: Option<u64>,
}

impl Default for DictionaryConfig {
    fn default() -> Self {
        Self {
            embeddings_path: "assets/embeddings.vec".to_string(),
            dictionary_path: None,
            max_dictionary_words: 0,
            seed: None,
        }
    }
}

/// Curated subset of the vocabulary used to bias target selection
#[derive(Debug, Default)]
struct DedicatedSubset {
    members: Vec<usize>,
    lookup: HashSet<usize>,
    by_type: HashMap<PartOfSpeech, Vec<usize>>,
    tagged: Vec<usize>,
}

impl DedicatedSubset {
    fn insert(&mut self, idx: usize, pos: PartOfSpeech) -> bool {
        if !self.lookup.insert(idx) {
            return false;
        }
        self.members.push(idx);
        self.by_type.entry(pos).or_default().push(idx);
        if pos.is_tagged() {
            self.tagged.push(idx);
        }
        true
    }
}

/// Counters reported after reading a dedicated dictionary
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DedicatedStats {
    pub loaded: usize,
    /// Filtered, unknown to the embeddings, or duplicate
    pub skipped: usize,
}

/// Immutable word store with lookup indices
pub struct DictionaryStore {
    entries: Vec<WordEntry>,
    dimension: usize,
    by_token: HashMap<String, usize>,
    by_word: HashMap<String, Vec<usize>>,
    by_type: HashMap<PartOfSpeech, Vec<usize>>,
    tagged: Vec<usize>,
    dedicated: Option<DedicatedSubset>,
    rng: Mutex<Pcg64>,
}

impl std::fmt::Debug for DictionaryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DictionaryStore")
            .field("entries", &self.entries.len())
            .field("dimension", &self.dimension)
            .field("dedicated", &self.dedicated_len())
            .finish()
    }
}

impl DictionaryStore {
    /// Build a store from already-normalized entries.
    ///
    /// Later entries with a token that is already indexed are dropped.
    pub fn from_entries(entries: Vec<WordEntry>, seed: Option<u64>) -> Self {
        let dimension = entries.first().map(|e| e.embedding().len()).unwrap_or(0);

        let mut store = Self {
            entries: Vec::with_capacity(entries.len()),
            dimension,
            by_token: HashMap::with_capacity(entries.len()),
            by_word: HashMap::with_capacity(entries.len()),
            by_type: HashMap::new(),
            tagged: Vec::new(),
            dedicated: None,
            rng: Mutex::new(make_rng(seed)),
        };

        let mut seen = HashSet::with_capacity(entries.len());
        for entry in entries {
            if seen.insert(entry.token().to_string()) {
                store.entries.push(entry);
            }
        }
        store.build_indices();
        store
    }

    /// Load embeddings (and the dedicated dictionary, when configured)
    pub fn load(config: &DictionaryConfig, filter: &FilterPolicy) -> Result<(Self, LoadStats), LoadError> {
        let file = load_vector_file(&config.embeddings_path, filter)?;
        let mut store = Self::from_entries(file.entries, config.seed);

        if let Some(ref path) = config.dictionary_path {
            let stats = store.load_dedicated(path, filter, config.max_dictionary_words)?;
            if stats.loaded == 0 {
                warn!(
                    "Dedicated dictionary {} has no usable words, falling back to embeddings for target selection",
                    path
                );
            }
        } else {
            info!("Using {} words from embeddings as dictionary", store.by_word.len());
        }

        Ok((store, file.stats))
    }

    fn build_indices(&mut self) {
        self.by_token.clear();
        self.by_word.clear();
        self.by_type.clear();
        self.tagged.clear();

        for (i, entry) in self.entries.iter().enumerate() {
            self.by_token.insert(entry.token().to_string(), i);
            self.by_word.entry(text::to_lower(entry.word())).or_default().push(i);
            self.by_type.entry(entry.pos()).or_default().push(i);
            if entry.has_pos() {
                self.tagged.push(i);
            }
        }
    }

    /// Read a dedicated dictionary file.
    ///
    /// The first line may be a word count; if it does not parse as an integer
    /// it is treated as a word. Every word must already exist in the
    /// embeddings. A bare word adds each of its POS variants that passes the
    /// dictionary filter.
    pub fn load_dedicated<P: AsRef<Path>>(
        &mut self,
        path: P,
        filter: &FilterPolicy,
        max_words: usize,
    ) -> Result<DedicatedStats, LoadError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| LoadError::open(path, e))?;
        let stats = self.read_dedicated(BufReader::new(file), filter, max_words)?;

        info!(
            "Loaded {} unique words from dedicated dictionary (skipped {} duplicates or filtered words)",
            stats.loaded, stats.skipped
        );
        Ok(stats)
    }

    fn read_dedicated<R: BufRead>(
        &mut self,
        reader: R,
        filter: &FilterPolicy,
        max_words: usize,
    ) -> Result<DedicatedStats, LoadError> {
        let mut subset = DedicatedSubset::default();
        let mut stats = DedicatedStats::default();

        for (i, line) in reader.lines().enumerate() {
            let line = match line {
                Ok(line) => line,
                Err(e) if e.kind() == ErrorKind::InvalidData => {
                    debug!("Skipping dedicated dictionary line {} with invalid UTF-8", i + 1);
                    stats.skipped += 1;
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            let word = line.trim();

            if i == 0 {
                if let Ok(count) = word.parse::<u64>() {
                    info!("Dedicated dictionary declares {} words", count);
                    continue;
                }
            }
            if word.is_empty() {
                continue;
            }
            if max_words > 0 && stats.loaded >= max_words {
                break;
            }

            let candidates: Vec<usize> = if has_pos(word) {
                self.by_token.get(word).copied().into_iter().collect()
            } else {
                self.by_word
                    .get(&text::to_lower(word))
                    .cloned()
                    .unwrap_or_default()
            };

            let mut added = false;
            for idx in candidates {
                let entry = &self.entries[idx];
                if filter.should_filter_dictionary(entry.token()) {
                    continue;
                }
                added |= subset.insert(idx, entry.pos());
            }

            if added {
                stats.loaded += 1;
            } else {
                stats.skipped += 1;
            }
        }

        self.dedicated = Some(subset);
        Ok(stats)
    }

    /// Exact token lookup, falling back to the first variant of the bare word
    pub fn find(&self, token: &str) -> Option<&WordEntry> {
        self.find_index(token).map(|i| &self.entries[i])
    }

    pub(crate) fn find_index(&self, token: &str) -> Option<usize> {
        if let Some(&idx) = self.by_token.get(token) {
            return Some(idx);
        }
        self.by_word
            .get(&text::to_lower(bare_word(token)))
            .and_then(|v| v.first().copied())
    }

    pub fn contains(&self, token: &str) -> bool {
        self.find_index(token).is_some()
    }

    /// All entries sharing the bare word, across POS tags
    pub fn variants_of(&self, word: &str) -> Vec<&WordEntry> {
        self.variant_indices(word).iter().map(|&i| &self.entries[i]).collect()
    }

    pub(crate) fn variant_indices(&self, word: &str) -> &[usize] {
        self.by_word
            .get(&text::to_lower(bare_word(word)))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Whether the word is in the dedicated dictionary (or, without one, in the vocabulary)
    pub fn dictionary_contains(&self, token: &str) -> bool {
        match self.active_dedicated() {
            Some(subset) => {
                let exact = self.by_token.get(token).is_some_and(|i| subset.lookup.contains(i));
                exact || self.variant_indices(token).iter().any(|i| subset.lookup.contains(i))
            }
            None => self.contains(token),
        }
    }

    fn active_dedicated(&self) -> Option<&DedicatedSubset> {
        self.dedicated.as_ref().filter(|d| !d.members.is_empty())
    }

    fn pick(&self, candidates: &[usize]) -> Option<&WordEntry> {
        if candidates.is_empty() {
            return None;
        }
        let n = self.rng.lock().unwrap_or_else(PoisonError::into_inner).gen_range(0..candidates.len());
        Some(&self.entries[candidates[n]])
    }

    fn pick_many(&self, candidates: &[usize], count: usize) -> Vec<&WordEntry> {
        let amount = count.min(candidates.len());
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        index::sample(&mut *rng, candidates.len(), amount)
            .into_iter()
            .map(|n| &self.entries[candidates[n]])
            .collect()
    }

    fn all_indices(&self) -> Vec<usize> {
        (0..self.entries.len()).collect()
    }

    /// Uniform pick, preferring the dedicated dictionary when it is non-empty
    pub fn random_word(&self) -> Option<&WordEntry> {
        match self.active_dedicated() {
            Some(subset) => self.pick(&subset.members),
            None => {
                if self.entries.is_empty() {
                    return None;
                }
                let n = self.rng.lock().unwrap_or_else(PoisonError::into_inner).gen_range(0..self.entries.len());
                Some(&self.entries[n])
            }
        }
    }

    /// Uniform pick among entries of one POS tag.
    ///
    /// Uses the dedicated dictionary when it has entries of that tag, the full
    /// vocabulary otherwise. `None` when no entry has the tag at all.
    pub fn random_word_of_type(&self, pos: PartOfSpeech) -> Option<&WordEntry> {
        self.pick(self.type_candidates(pos))
    }

    /// Uniform pick among POS-tagged entries
    pub fn random_tagged_word(&self) -> Option<&WordEntry> {
        let candidates = match self.active_dedicated() {
            Some(subset) if !subset.tagged.is_empty() => &subset.tagged,
            _ => &self.tagged,
        };
        self.pick(candidates)
    }

    /// Whether `random_word_of_type(pos)` can return anything. Does not touch the RNG.
    pub fn has_type(&self, pos: PartOfSpeech) -> bool {
        !self.type_candidates(pos).is_empty()
    }

    fn type_candidates(&self, pos: PartOfSpeech) -> &[usize] {
        if let Some(indices) = self
            .active_dedicated()
            .and_then(|d| d.by_type.get(&pos))
            .filter(|v| !v.is_empty())
        {
            return indices;
        }
        self.by_type.get(&pos).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Up to `count` distinct random entries from the vocabulary
    pub fn random_words(&self, count: usize) -> Vec<&WordEntry> {
        match self.active_dedicated() {
            Some(subset) => self.pick_many(&subset.members, count),
            None => self.pick_many(&self.all_indices(), count),
        }
    }

    /// Up to `count` distinct random POS-tagged entries
    pub fn random_tagged_words(&self, count: usize) -> Vec<&WordEntry> {
        let candidates = match self.active_dedicated() {
            Some(subset) if !subset.tagged.is_empty() => &subset.tagged,
            _ => &self.tagged,
        };
        self.pick_many(candidates, count)
    }

    /// Up to `count` distinct random entries of one POS tag
    pub fn random_words_of_type(&self, pos: PartOfSpeech, count: usize) -> Vec<&WordEntry> {
        self.pick_many(self.type_candidates(pos), count)
    }

    /// Brute-force nearest neighbours of `token`.
    ///
    /// Scores every entry with the same function as [`crate::similarity`],
    /// skipping entries with the same bare word. Results are sorted by
    /// descending score. Empty if `token` does not resolve.
    pub fn most_similar(&self, token: &str, k: usize) -> Vec<(&WordEntry, f32)> {
        let Some(idx) = self.find_index(token) else {
            return Vec::new();
        };
        let query = &self.entries[idx];

        let scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, other)| other.word() != query.word())
            .map(|(i, other)| (i, entry_similarity(query, other)))
            .collect();

        top_k(scored, k)
            .into_iter()
            .map(|(i, score)| (&self.entries[i], score))
            .collect()
    }

    pub fn entries(&self) -> &[WordEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn has_dedicated_dictionary(&self) -> bool {
        self.active_dedicated().is_some()
    }

    pub fn dedicated_len(&self) -> usize {
        self.dedicated.as_ref().map(|d| d.members.len()).unwrap_or(0)
    }

    /// Number of distinct bare words
    pub fn word_count(&self) -> usize {
        self.by_word.len()
    }

    /// Entry counts per POS tag
    pub fn type_counts(&self) -> HashMap<PartOfSpeech, usize> {
        self.by_type.iter().map(|(pos, v)| (*pos, v.len())).collect()
    }
}

fn make_rng(seed: Option<u64>) -> Pcg64 {
    match seed {
        Some(seed) => Pcg64::seed_from_u64(seed),
        None => Pcg64::from_entropy(),
    }
}
