//! Error types
//!
//! Loading errors are fatal at startup. Query errors are recoverable and are
//! mapped to user-facing responses by the HTTP layer.

use std::path::PathBuf;

use crate::types::PartOfSpeech;

/// Failure while building the dictionary from files
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// Vector, dictionary or blacklist file could not be opened
    #[error("failed to open {}: {source}", path.display())]
    FileOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Read error after the file was opened
    #[error("I/O error while reading: {0}")]
    Io(#[from] std::io::Error),

    /// Missing header line or non-positive dimension
    #[error("malformed vector file header: {0}")]
    MalformedHeader(String),

    /// Nothing survived filtering
    #[error("no entries left after filtering ({filtered} lines filtered out)")]
    EmptyDictionary { filtered: usize },
}

impl LoadError {
    pub(crate) fn open(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        LoadError::FileOpen {
            path: path.into(),
            source,
        }
    }
}

/// A queried token resolves to nothing in the dictionary
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("word not found: '{0}'")]
pub struct WordNotFound(pub String);

/// Failure while ranking a guess against a target
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RankError {
    #[error(transparent)]
    WordNotFound(#[from] WordNotFound),

    /// Target word carries no POS tag, which means target selection is broken
    #[error("target word '{0}' must carry a POS tag")]
    InvalidTarget(String),
}

impl RankError {
    /// Whether the caller (rather than the server) is at fault
    pub fn is_user_error(&self) -> bool {
        matches!(self, RankError::WordNotFound(_))
    }
}

/// Random selection found no candidates
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("no words available{}", .pos.map(|p| format!(" for type {}", p)).unwrap_or_default())]
pub struct NoWordsAvailable {
    pub pos: Option<PartOfSpeech>,
}
