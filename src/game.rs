//! Word Game
//!
//! The surface request handlers talk to: word validation, target selection,
//! rank calculation, nearest neighbours and hints. Wraps a shared, immutable
//! [`DictionaryStore`].

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::dictionary::DictionaryStore;
use crate::error::{NoWordsAvailable, RankError, WordNotFound};
use crate::filter::FilterPolicy;
use crate::rank::{RankMapper, RankOutcome, RankStrategy, MAX_RANK};
use crate::text;
use crate::types::{split_token, PartOfSpeech, WordEntry};

/// Game settings as they appear in the configuration file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Type name of target words, or `any` for every tagged word
    pub target_word_type: String,
    pub rank_strategy: RankStrategy,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            target_word_type: "noun".to_string(),
            rank_strategy: RankStrategy::default(),
        }
    }
}

/// A word suggested to a stuck player
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Hint {
    pub word: String,
    pub rank: i32,
}

/// Vocabulary summary
#[derive(Debug, Clone, Serialize)]
pub struct GameStats {
    pub entries: usize,
    pub words: usize,
    pub dimension: usize,
    pub dedicated_words: usize,
    pub target_word_type: String,
    pub rank_strategy: RankStrategy,
    pub types: BTreeMap<String, usize>,
}

pub struct WordGame {
    store: Arc<DictionaryStore>,
    ranker: RankMapper,
    target_type: Option<PartOfSpeech>,
}

impl WordGame {
    pub fn new(store: Arc<DictionaryStore>, config: &GameConfig) -> Self {
        let name = config.target_word_type.trim();
        let target_type = if name.eq_ignore_ascii_case("any") {
            None
        } else {
            let pos = PartOfSpeech::from_name(name);
            if pos.is_none() {
                warn!("Unknown target word type '{}', picking from every tagged word", name);
            }
            pos
        };

        Self {
            store,
            ranker: RankMapper::new(config.rank_strategy),
            target_type,
        }
    }

    /// Load the filter, embeddings and dedicated dictionary named in `config`.
    ///
    /// Fails when loading fails or when no target word could ever be picked.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let filter = FilterPolicy::from_config(&config.filter).context("failed to set up the dictionary filter")?;
        let (store, stats) = DictionaryStore::load(&config.dictionary, &filter)
            .with_context(|| format!("failed to load embeddings from {}", config.dictionary.embeddings_path))?;
        info!("Dictionary ready: {}", stats);

        let game = Self::new(Arc::new(store), &config.game);
        game.check_target_pool()
            .context("target word type has no words, check game.target_word_type")?;
        Ok(game)
    }

    pub fn store(&self) -> &Arc<DictionaryStore> {
        &self.store
    }

    pub fn target_type(&self) -> Option<PartOfSpeech> {
        self.target_type
    }

    pub fn rank_strategy(&self) -> RankStrategy {
        self.ranker.strategy()
    }

    /// Whether the word (tagged or bare) is in the vocabulary
    pub fn validate_word(&self, token: &str) -> bool {
        !token.is_empty() && self.store.contains(token)
    }

    /// Pick a target. Never returns an entry without a POS tag.
    pub fn generate_new_target_word(&self) -> Result<WordEntry, NoWordsAvailable> {
        let picked = match self.target_type {
            Some(pos) => self.store.random_word_of_type(pos),
            None => self.store.random_tagged_word(),
        };

        match picked {
            Some(entry) => {
                debug!("New target word: {}", entry.token());
                Ok(entry.clone())
            }
            None => Err(NoWordsAvailable { pos: self.target_type }),
        }
    }

    /// Up to `count` distinct candidate targets, all POS-tagged
    pub fn sample_targets(&self, count: usize) -> Vec<WordEntry> {
        let picked = match self.target_type {
            Some(pos) => self.store.random_words_of_type(pos, count),
            None => self.store.random_tagged_words(count),
        };
        picked.into_iter().cloned().collect()
    }

    /// Fails when no target could ever be picked with the current settings
    pub fn check_target_pool(&self) -> Result<(), NoWordsAvailable> {
        let available = match self.target_type {
            Some(pos) => self.store.has_type(pos),
            None => self.store.entries().iter().any(WordEntry::has_pos),
        };
        if available {
            Ok(())
        } else {
            Err(NoWordsAvailable { pos: self.target_type })
        }
    }

    pub fn calculate_rank(&self, guess: &str, target: &str) -> Result<i32, RankError> {
        self.ranker.rank(&self.store, guess, target)
    }

    /// Rank plus the scores behind it
    pub fn evaluate(&self, guess: &str, target: &str) -> Result<RankOutcome, RankError> {
        self.ranker.evaluate(&self.store, guess, target)
    }

    pub fn most_similar(&self, word: &str, k: usize) -> Vec<(&WordEntry, f32)> {
        self.store.most_similar(word, k)
    }

    /// Suggest an unguessed neighbour of the target.
    ///
    /// Aims for the neighbour halfway between the best rank so far and the
    /// target. `None` when every neighbour has already been guessed.
    pub fn hint(&self, target: &str, guessed: &[String], best_rank: Option<i32>) -> Result<Option<Hint>, RankError> {
        if !split_token(target).1.is_tagged() {
            return Err(RankError::InvalidTarget(target.to_string()));
        }
        if !self.store.contains(target) {
            return Err(WordNotFound(target.to_string()).into());
        }

        let mut excluded: HashSet<String> = guessed.iter().map(|w| text::to_lower(split_token(w).0)).collect();
        let mut candidates: Vec<&str> = Vec::new();
        for (entry, _) in self.store.most_similar(target, MAX_RANK as usize) {
            if excluded.insert(text::to_lower(entry.word())) {
                candidates.push(entry.word());
            }
        }
        if candidates.is_empty() {
            return Ok(None);
        }

        let best = best_rank.unwrap_or(MAX_RANK).clamp(2, MAX_RANK);
        let position = ((best / 2 - 2).max(0) as usize).min(candidates.len() - 1);
        let word = candidates[position].to_string();
        let rank = self.calculate_rank(&word, target)?;

        debug!("Hint for {} (best rank {}): {} at {}", target, best, word, rank);
        Ok(Some(Hint { word, rank }))
    }

    pub fn stats(&self) -> GameStats {
        let types = self
            .store
            .type_counts()
            .into_iter()
            .map(|(pos, count)| (pos.to_string(), count))
            .collect();

        GameStats {
            entries: self.store.len(),
            words: self.store.word_count(),
            dimension: self.store.dimension(),
            dedicated_words: self.store.dedicated_len(),
            target_word_type: self
                .target_type
                .map(|p| p.to_string())
                .unwrap_or_else(|| "any".to_string()),
            rank_strategy: self.ranker.strategy(),
            types,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simd_ops::normalize;

    fn game_with(target_word_type: &str) -> WordGame {
        let raw: [(&str, [f32; 3]); 7] = [
            ("кот_NOUN", [1.0, 0.0, 0.0]),
            ("кошка_NOUN", [0.9, 0.1, 0.0]),
            ("пёс_NOUN", [0.6, 0.4, 0.0]),
            ("мурлыкать_VERB", [0.6, 0.0, 0.4]),
            ("небо_NOUN", [-1.0, 0.0, 0.0]),
            ("быстро_ADV", [0.0, 0.0, 1.0]),
            ("мяу", [0.5, 0.5, 0.0]),
        ];
        let entries = raw
            .iter()
            .map(|(token, v)| {
                let mut v = v.to_vec();
                normalize(&mut v);
                WordEntry::new(token, v)
            })
            .collect();
        let store = Arc::new(DictionaryStore::from_entries(entries, Some(5)));
        let config = GameConfig {
            target_word_type: target_word_type.to_string(),
            ..GameConfig::default()
        };
        WordGame::new(store, &config)
    }

    #[test]
    fn test_validate_word() {
        let game = game_with("noun");
        assert!(game.validate_word("кот"));
        assert!(game.validate_word("кот_NOUN"));
        assert!(game.validate_word("мяу"));
        assert!(!game.validate_word("мышь"));
        assert!(!game.validate_word(""));
    }

    #[test]
    fn test_generate_target_respects_type() {
        let game = game_with("verb");
        for _ in 0..20 {
            assert_eq!(game.generate_new_target_word().unwrap().token(), "мурлыкать_VERB");
        }
    }

    #[test]
    fn test_generate_target_any_is_tagged() {
        let game = game_with("any");
        assert_eq!(game.target_type(), None);
        for _ in 0..100 {
            let target = game.generate_new_target_word().unwrap();
            assert!(target.has_pos());
            assert!(game.validate_word(target.token()));
        }
    }

    #[test]
    fn test_no_words_of_type() {
        let game = game_with("numeral");
        let err = game.generate_new_target_word().unwrap_err();
        assert_eq!(err, NoWordsAvailable { pos: Some(PartOfSpeech::Numeral) });
        assert!(game.check_target_pool().is_err());
        assert!(game_with("noun").check_target_pool().is_ok());
    }

    #[test]
    fn test_target_pool_check_keeps_target_sequence() {
        let checked = game_with("noun");
        let unchecked = game_with("noun");
        assert!(checked.check_target_pool().is_ok());

        let a: Vec<String> = (0..10)
            .map(|_| checked.generate_new_target_word().unwrap().token().to_string())
            .collect();
        let b: Vec<String> = (0..10)
            .map(|_| unchecked.generate_new_target_word().unwrap().token().to_string())
            .collect();
        assert_eq!(a, b);
    }

    #[test]
    fn test_sample_targets() {
        let nouns = game_with("noun").sample_targets(10);
        assert_eq!(nouns.len(), 4);
        assert!(nouns.iter().all(|e| e.pos() == PartOfSpeech::Noun));

        let any = game_with("any").sample_targets(10);
        assert_eq!(any.len(), 6);
        assert!(any.iter().all(WordEntry::has_pos));
    }

    #[test]
    fn test_unknown_target_type_falls_back_to_any() {
        let game = game_with("gerund");
        assert_eq!(game.target_type(), None);
        assert!(game.generate_new_target_word().unwrap().has_pos());
    }

    #[test]
    fn test_calculate_rank() {
        let game = game_with("noun");
        assert_eq!(game.calculate_rank("кот", "кот_NOUN"), Ok(1));
        let close = game.calculate_rank("кошка", "кот_NOUN").unwrap();
        let far = game.calculate_rank("небо", "кот_NOUN").unwrap();
        assert!(close < far);
        assert!(game.calculate_rank("мышь", "кот_NOUN").is_err());
    }

    #[test]
    fn test_hint_skips_guessed_words() {
        let game = game_with("noun");
        let hint = game.hint("кот_NOUN", &[], Some(2)).unwrap().unwrap();
        assert_eq!(hint.word, "кошка");

        let guessed = vec!["кошка".to_string()];
        let hint = game.hint("кот_NOUN", &guessed, Some(2)).unwrap().unwrap();
        assert_ne!(hint.word, "кошка");
        assert_ne!(hint.word, "кот");
        assert_eq!(hint.rank, game.calculate_rank(&hint.word, "кот_NOUN").unwrap());
    }

    #[test]
    fn test_hint_halfway() {
        let game = game_with("noun");
        // best rank 8 aims at position 2 of the neighbour list
        let hint = game.hint("кот_NOUN", &[], Some(8)).unwrap().unwrap();
        let neighbours: Vec<&str> = game.most_similar("кот_NOUN", 10).iter().map(|(e, _)| e.word()).collect();
        assert_eq!(hint.word, neighbours[2]);
    }

    #[test]
    fn test_hint_exhausted() {
        let game = game_with("noun");
        let guessed: Vec<String> = ["кошка", "пёс", "мурлыкать", "небо", "быстро", "мяу"]
            .iter()
            .map(|w| w.to_string())
            .collect();
        assert_eq!(game.hint("кот_NOUN", &guessed, None), Ok(None));
    }

    #[test]
    fn test_hint_errors() {
        let game = game_with("noun");
        assert!(matches!(game.hint("кот", &[], None), Err(RankError::InvalidTarget(_))));
        assert!(matches!(game.hint("мышь_NOUN", &[], None), Err(RankError::WordNotFound(_))));
    }

    #[test]
    fn test_stats() {
        let game = game_with("noun");
        let stats = game.stats();
        assert_eq!(stats.entries, 7);
        assert_eq!(stats.dimension, 3);
        assert_eq!(stats.types["NOUN"], 4);
        assert_eq!(stats.types["UNKNOWN"], 1);
        assert_eq!(stats.target_word_type, "NOUN");
    }
}
