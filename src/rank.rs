//! Rank Mapper
//!
//! Turns the closeness of a guess to the target into a user-facing rank:
//! `1` is the target itself, larger numbers are further away, `MAX_RANK` is
//! the floor.
//!
//! The default [`RankStrategy::Combined`] mixes cosine similarity with a
//! common-prefix signal so forms of the same root never land far apart:
//!
//! ```text
//! combined = max(cos, 0.8 * cos + 0.2 * prefix_score + root_bonus)
//! ```
//!
//! and maps `combined` through a piecewise-linear bucket table.

use serde::{Deserialize, Serialize};

use crate::dictionary::DictionaryStore;
use crate::error::{RankError, WordNotFound};
use crate::similarity::similarity;
use crate::text;
use crate::types::{split_token, token_with_pos};

/// Worst possible rank
pub const MAX_RANK: i32 = 1000;

/// Rank of an exact hit
pub const WIN_RANK: i32 = 1;

/// Prefix length (in characters) at which the prefix signal saturates
const PREFIX_SATURATION: usize = 5;

/// Ranks for same-root pairs never exceed this
const SHARED_ROOT_RANK_CAP: i32 = 150;

const COSINE_WEIGHT: f32 = 0.8;
const PREFIX_WEIGHT: f32 = 0.2;
const ROOT_BONUS_WEIGHT: f32 = 0.15;

/// `(low, high, rank at high, rank at low)`; the last bucket starts at 0
const BUCKETS: [(f32, f32, f32, f32); 8] = [
    (0.95, 1.00, 2.0, 15.0),
    (0.85, 0.95, 15.0, 50.0),
    (0.75, 0.85, 50.0, 100.0),
    (0.65, 0.75, 100.0, 200.0),
    (0.55, 0.65, 200.0, 400.0),
    (0.45, 0.55, 400.0, 600.0),
    (0.35, 0.45, 600.0, 800.0),
    (0.00, 0.35, 800.0, 999.0),
];

/// How a guess is turned into a rank
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankStrategy {
    /// Cosine plus common-prefix signal through the bucket table
    #[default]
    Combined,
    /// Cosine alone through the older seven-bucket table
    Similarity,
    /// Position among the target's nearest neighbours
    Neighborhood,
}

impl std::str::FromStr for RankStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "combined" => Ok(RankStrategy::Combined),
            "similarity" => Ok(RankStrategy::Similarity),
            "neighborhood" | "neighbourhood" => Ok(RankStrategy::Neighborhood),
            other => Err(format!("unknown rank strategy '{}'", other)),
        }
    }
}

/// Common-prefix signal between two bare words
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Morphology {
    pub prefix_len: usize,
    pub min_len: usize,
    /// `min(prefix_len, 5) / min(5, min_len)`, clamped to `[0, 1]`
    pub prefix_score: f32,
    /// Long enough shared prefix to assume a shared root
    pub shares_root: bool,
}

impl Morphology {
    pub fn of(guess: &str, target: &str) -> Self {
        let prefix_len = text::common_prefix_len(guess, target);
        let min_len = text::char_count(guess).min(text::char_count(target));

        let denominator = PREFIX_SATURATION.min(min_len);
        let prefix_score = if denominator == 0 {
            0.0
        } else {
            (prefix_len.min(PREFIX_SATURATION) as f32 / denominator as f32).clamp(0.0, 1.0)
        };

        let shares_root =
            prefix_len > 0 && (prefix_len >= 4 || prefix_len as f32 >= 0.5 * min_len as f32);

        Self {
            prefix_len,
            min_len,
            prefix_score,
            shares_root,
        }
    }

    fn root_bonus(&self) -> f32 {
        if self.shares_root {
            ROOT_BONUS_WEIGHT * self.prefix_score
        } else {
            0.0
        }
    }

    /// Whether the same-root cap applies
    pub fn caps_rank(&self) -> bool {
        self.shares_root && self.prefix_len >= PREFIX_SATURATION
    }
}

/// Blend cosine similarity with the morphology signal.
///
/// The prefix signal can only pull a guess closer, never push a strong
/// semantic match away.
pub fn combined_score(cos: f32, morphology: &Morphology) -> f32 {
    let blended = COSINE_WEIGHT * cos + PREFIX_WEIGHT * morphology.prefix_score + morphology.root_bonus();
    blended.max(cos)
}

/// Map a combined score to a rank in `[2, 999]`, decreasing in the score
pub fn bucket_rank(score: f32) -> i32 {
    if score.is_nan() {
        return MAX_RANK;
    }
    let score = score.max(0.0);
    if score >= BUCKETS[0].1 {
        return BUCKETS[0].2 as i32;
    }
    for &(low, high, rank_high, rank_low) in BUCKETS.iter() {
        if score >= low {
            let t = (high - score) / (high - low);
            return (rank_high + t * (rank_low - rank_high)).round() as i32;
        }
    }
    BUCKETS[BUCKETS.len() - 1].3 as i32
}

/// Older pure-similarity mapping
pub fn similarity_bucket_rank(similarity: f32) -> i32 {
    let s = similarity;
    let rank = if s >= 0.9 {
        2.0 + (1.0 - s) * 8.0 / 0.1
    } else if s >= 0.8 {
        11.0 + (0.9 - s) * 39.0 / 0.1
    } else if s >= 0.7 {
        51.0 + (0.8 - s) * 99.0 / 0.1
    } else if s >= 0.6 {
        151.0 + (0.7 - s) * 149.0 / 0.1
    } else if s >= 0.5 {
        301.0 + (0.6 - s) * 199.0 / 0.1
    } else if s >= 0.4 {
        501.0 + (0.5 - s) * 199.0 / 0.1
    } else if s > 0.0 {
        701.0 + (0.4 - s.min(0.4)) * 298.0 / 0.4
    } else {
        MAX_RANK as f32
    };
    (rank as i32).clamp(2, MAX_RANK)
}

/// Rank plus the numbers it was derived from
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RankOutcome {
    pub rank: i32,
    /// Best cosine similarity over the guess's POS variants
    pub similarity: f32,
    /// Combined score (only for the combined strategy)
    pub combined: Option<f32>,
}

impl RankOutcome {
    fn win() -> Self {
        Self {
            rank: WIN_RANK,
            similarity: 1.0,
            combined: Some(1.0),
        }
    }

    pub fn is_win(&self) -> bool {
        self.rank == WIN_RANK
    }
}

/// Rank calculator for one strategy
#[derive(Debug, Clone, Copy, Default)]
pub struct RankMapper {
    strategy: RankStrategy,
}

impl RankMapper {
    pub fn new(strategy: RankStrategy) -> Self {
        Self { strategy }
    }

    pub fn strategy(&self) -> RankStrategy {
        self.strategy
    }

    /// Rank of `guess` against a POS-tagged `target`
    pub fn rank(&self, store: &DictionaryStore, guess: &str, target: &str) -> Result<i32, RankError> {
        self.evaluate(store, guess, target).map(|o| o.rank)
    }

    /// Like [`RankMapper::rank`], also reporting the scores behind the rank
    pub fn evaluate(&self, store: &DictionaryStore, guess: &str, target: &str) -> Result<RankOutcome, RankError> {
        let (target_word, target_pos) = split_token(target);
        if !target_pos.is_tagged() {
            return Err(RankError::InvalidTarget(target.to_string()));
        }
        if guess == target_word {
            return Ok(RankOutcome::win());
        }

        let cos = best_similarity(store, guess, target)?;

        let outcome = match self.strategy {
            RankStrategy::Combined => {
                let morphology = Morphology::of(split_token(guess).0, target_word);
                let combined = combined_score(cos, &morphology);
                let mut rank = bucket_rank(combined);
                if morphology.caps_rank() {
                    rank = rank.min(SHARED_ROOT_RANK_CAP);
                }
                RankOutcome {
                    rank,
                    similarity: cos,
                    combined: Some(combined),
                }
            }
            RankStrategy::Similarity => RankOutcome {
                rank: similarity_bucket_rank(cos),
                similarity: cos,
                combined: None,
            },
            RankStrategy::Neighborhood => RankOutcome {
                rank: neighborhood_rank(store, guess, target, cos),
                similarity: cos,
                combined: None,
            },
        };

        Ok(RankOutcome {
            rank: outcome.rank.clamp(2, MAX_RANK),
            ..outcome
        })
    }
}

/// Similarity of the guess to the target; a bare guess takes its best POS variant
fn best_similarity(store: &DictionaryStore, guess: &str, target: &str) -> Result<f32, RankError> {
    let (_, guess_pos) = split_token(guess);
    if guess_pos.is_tagged() {
        return Ok(similarity(store, guess, target)?);
    }

    let mut best: Option<f32> = None;
    for variant in store.variants_of(guess) {
        let sim = similarity(store, variant.token(), target)?;
        best = Some(best.map_or(sim, |b: f32| b.max(sim)));
    }
    best.ok_or_else(|| WordNotFound(guess.to_string()).into())
}

fn neighborhood_rank(store: &DictionaryStore, guess: &str, target: &str, cos: f32) -> i32 {
    let (guess_word, guess_pos) = split_token(guess);
    let guess_token = token_with_pos(guess_word, guess_pos);

    let neighbours = store.most_similar(target, MAX_RANK as usize);
    let position = neighbours.iter().position(|(entry, _)| {
        if guess_pos.is_tagged() {
            entry.token() == guess_token
        } else {
            text::to_lower(entry.word()) == text::to_lower(guess_word)
        }
    });

    match position {
        Some(p) => p as i32 + 2,
        None if cos < 0.01 => MAX_RANK,
        None => (MAX_RANK as f32 - cos * (MAX_RANK - 2) as f32).round().max(2.0) as i32,
    }
}
