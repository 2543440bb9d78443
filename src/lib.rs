//! # Contexto
//!
//! Word-embedding dictionary and rank engine for a "guess the secret word"
//! game. A player guesses words; each guess gets a rank telling how close it
//! is to the hidden target, `1` being the target itself.
//!
//! ## Architecture
//! - **Vector loader**: word2vec text files, filtered while parsing
//! - **Filter policy**: minimum length, blacklist, part-of-speech allow-lists
//! - **Dictionary store**: immutable arena of entries plus lookup indices
//! - **Similarity**: cosine with a same-POS boost, clamped to `[0, 1]`
//! - **Rank mapper**: similarity plus a shared-prefix signal mapped to a rank
//! - **Game / sessions / server**: the playable surface on top
//!
//! ## Example
//! ```
//! use contexto::{DictionaryStore, RankMapper, WordEntry};
//!
//! let store = DictionaryStore::from_entries(
//!     vec![
//!         WordEntry::new("кот_NOUN", vec![1.0, 0.0]),
//!         WordEntry::new("небо_NOUN", vec![-1.0, 0.0]),
//!     ],
//!     Some(42),
//! );
//! let ranker = RankMapper::default();
//! assert_eq!(ranker.rank(&store, "кот", "кот_NOUN"), Ok(1));
//! assert!(ranker.rank(&store, "небо", "кот_NOUN").unwrap() >= 700);
//! ```

pub mod config;
pub mod dictionary;
pub mod error;
pub mod filter;
pub mod game;
pub mod rank;
pub mod server;
pub mod session;
pub mod similarity;
pub mod simd_ops;
pub mod text;
pub mod types;
pub mod vectors;

pub use config::{Config, ServerConfig};
pub use dictionary::{DedicatedStats, DictionaryConfig, DictionaryStore};
pub use error::{LoadError, NoWordsAvailable, RankError, WordNotFound};
pub use filter::{load_blacklist, FilterConfig, FilterPolicy, PosFilter};
pub use game::{GameConfig, GameStats, Hint, WordGame};
pub use rank::{combined_score, Morphology, RankMapper, RankOutcome, RankStrategy, MAX_RANK, WIN_RANK};
pub use session::{GameSession, Guess, SessionManager};
pub use similarity::{entry_similarity, similarity, SAME_POS_BOOST};
pub use types::{bare_word, has_pos, split_token, token_with_pos, PartOfSpeech, WordEntry};
pub use vectors::{load_vector_file, read_vectors, LoadStats, VectorFile};
