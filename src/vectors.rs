//! Word Vector File Loader
//!
//! Reads pretrained embeddings in the word2vec text format:
//!
//! ```text
//! <vocabulary_size> <dimension>
//! кот_NOUN 0.12 -0.03 ...
//! ```
//!
//! Tokens are run through the [`FilterPolicy`] before their vectors are parsed,
//! so rejected records never allocate. Every kept vector is scaled to unit
//! length (zero vectors stay zero).

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader, ErrorKind};
use std::path::Path;

use tracing::{debug, info, warn};

use crate::error::LoadError;
use crate::filter::FilterPolicy;
use crate::simd_ops::normalize;
use crate::types::WordEntry;

const PROGRESS_EVERY: usize = 10_000;

/// Counters reported after a load
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadStats {
    /// Vocabulary size claimed by the header (may be wrong)
    pub declared_vocabulary: i64,
    pub dimension: usize,
    pub loaded: usize,
    /// Lines skipped: unparsable, filtered out, or duplicate tokens
    pub filtered: usize,
    /// Kept lines that had fewer values than `dimension` (zero-padded)
    pub short_vectors: usize,
}

impl std::fmt::Display for LoadStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} embeddings ({}d), {} filtered, {} short vectors",
            self.loaded, self.dimension, self.filtered, self.short_vectors
        )
    }
}

/// Parsed vector file
#[derive(Debug)]
pub struct VectorFile {
    pub entries: Vec<WordEntry>,
    pub stats: LoadStats,
}

/// Load and filter a vector file.
///
/// Fails on an unreadable file, a bad header, or when nothing survives
/// filtering. Malformed data lines are skipped and counted.
pub fn load_vector_file<P: AsRef<Path>>(path: P, filter: &FilterPolicy) -> Result<VectorFile, LoadError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| LoadError::open(path, e))?;
    info!("Loading word embeddings from {}", path.display());
    read_vectors(BufReader::new(file), filter)
}

/// Parse vectors from any buffered reader (see [`load_vector_file`])
pub fn read_vectors<R: BufRead>(reader: R, filter: &FilterPolicy) -> Result<VectorFile, LoadError> {
    let mut lines = reader.lines();

    let header = match lines.next() {
        Some(line) => line?,
        None => return Err(LoadError::MalformedHeader("missing header line".to_string())),
    };
    let (declared_vocabulary, dimension) = parse_header(&header)?;

    info!("Loading word embeddings with dimension {}", dimension);

    // Only a fraction of the vocabulary usually survives filtering
    let capacity = usize::try_from(declared_vocabulary).unwrap_or(0) / 4;
    let mut entries: Vec<WordEntry> = Vec::with_capacity(capacity);
    let mut seen: HashSet<String> = HashSet::with_capacity(capacity);

    let mut stats = LoadStats {
        declared_vocabulary,
        dimension,
        ..LoadStats::default()
    };

    for line in lines {
        let line = match line {
            Ok(line) => line,
            Err(e) if e.kind() == ErrorKind::InvalidData => {
                debug!("Skipping line with invalid UTF-8");
                stats.filtered += 1;
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        let mut parts = line.split_whitespace();
        let token = match parts.next() {
            Some(token) => token,
            None => {
                stats.filtered += 1;
                continue;
            }
        };

        if filter.should_filter_embedding(token) {
            stats.filtered += 1;
            continue;
        }

        if seen.contains(token) {
            debug!("Duplicate token '{}', keeping the first occurrence", token);
            stats.filtered += 1;
            continue;
        }

        let mut embedding = vec![0.0f32; dimension];
        let mut read = 0;
        for slot in embedding.iter_mut() {
            match parts
                .next()
                .and_then(|v| v.parse::<f32>().ok())
                .filter(|v| v.is_finite())
            {
                Some(value) => {
                    *slot = value;
                    read += 1;
                }
                None => break,
            }
        }
        if read < dimension {
            debug!("'{}' has {} of {} values, padding with zeros", token, read, dimension);
            stats.short_vectors += 1;
        }

        normalize(&mut embedding);

        seen.insert(token.to_string());
        entries.push(WordEntry::new(token, embedding));
        stats.loaded += 1;

        if stats.loaded % PROGRESS_EVERY == 0 {
            info!(
                "Loaded {} word embeddings (filtered out {} words)",
                stats.loaded, stats.filtered
            );
        }
    }

    if entries.is_empty() {
        return Err(LoadError::EmptyDictionary {
            filtered: stats.filtered,
        });
    }

    entries.shrink_to_fit();
    info!("Successfully loaded {}", stats);

    Ok(VectorFile { entries, stats })
}

fn parse_header(header: &str) -> Result<(i64, usize), LoadError> {
    let mut fields = header.split_whitespace();
    let vocabulary = fields.next();
    let dimension = fields.next();

    let dimension = match dimension.and_then(|d| d.parse::<i64>().ok()) {
        Some(d) if d > 0 => d as usize,
        _ => {
            return Err(LoadError::MalformedHeader(format!(
                "expected '<vocabulary_size> <dimension>' with a positive dimension, got '{}'",
                header.trim()
            )))
        }
    };

    let vocabulary = match vocabulary.and_then(|v| v.parse::<i64>().ok()) {
        Some(v) if v >= 0 => v,
        _ => {
            warn!("Vocabulary size in header is invalid, it will be detected while reading");
            -1
        }
    };

    Ok((vocabulary, dimension))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::PosFilter;
    use crate::simd_ops::l2_norm;
    use crate::types::PartOfSpeech;

    fn read(data: &str, filter: &FilterPolicy) -> Result<VectorFile, LoadError> {
        read_vectors(data.as_bytes(), filter)
    }

    #[test]
    fn test_load_basic_file() {
        let data = "3 2\nкот_NOUN 1.0 0.0\nпёс_NOUN 0.9 0.1\nнебо_NOUN -1.0 0.0\n";
        let file = read(data, &FilterPolicy::default()).unwrap();

        assert_eq!(file.entries.len(), 3);
        assert_eq!(file.stats.loaded, 3);
        assert_eq!(file.stats.dimension, 2);
        assert_eq!(file.entries[1].word(), "пёс");
        assert_eq!(file.entries[1].pos(), PartOfSpeech::Noun);
    }

    #[test]
    fn test_vectors_are_unit_length() {
        let data = "2 3\nдом_NOUN 3.0 4.0 0.0\nнуль_NOUN 0.0 0.0 0.0\n";
        let file = read(data, &FilterPolicy::default()).unwrap();

        assert!((l2_norm(file.entries[0].embedding()) - 1.0).abs() < 1e-5);
        assert_eq!(file.entries[1].embedding(), &[0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_short_line_is_zero_padded() {
        let data = "1 4\nдом_NOUN 1.0 1.0\n";
        let file = read(data, &FilterPolicy::default()).unwrap();

        let emb = file.entries[0].embedding();
        assert_eq!(emb.len(), 4);
        assert_eq!(emb[2], 0.0);
        assert_eq!(emb[3], 0.0);
        assert_eq!(file.stats.short_vectors, 1);
    }

    #[test]
    fn test_bad_value_stops_reading() {
        let data = "1 3\nдом_NOUN 1.0 abc 1.0\n";
        let file = read(data, &FilterPolicy::default()).unwrap();
        assert_eq!(file.entries[0].embedding(), &[1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_non_finite_values_stop_reading() {
        let data = "3 2\nкот_NOUN nan 1.0\nпёс_NOUN 1.0 0.0\nнебо_NOUN 0.0 inf\nдом_NOUN infinity 2.0\n";
        let file = read(data, &FilterPolicy::default()).unwrap();

        assert_eq!(file.entries.len(), 4);
        assert_eq!(file.entries[0].embedding(), &[0.0, 0.0]);
        assert_eq!(file.entries[2].embedding(), &[0.0, 0.0]);
        assert_eq!(file.entries[3].embedding(), &[0.0, 0.0]);
        assert_eq!(file.stats.short_vectors, 3);

        for entry in &file.entries {
            assert!(entry.embedding().iter().all(|v| v.is_finite()), "{}", entry.token());
            let norm = l2_norm(entry.embedding());
            assert!(norm == 0.0 || (norm - 1.0).abs() < 1e-5, "{}", entry.token());
        }
    }

    #[test]
    fn test_overflowing_vector_is_zeroed() {
        let data = "1 2\nдом_NOUN 3e38 3e38\n";
        let file = read(data, &FilterPolicy::default()).unwrap();
        assert_eq!(file.entries[0].embedding(), &[0.0, 0.0]);
    }

    #[test]
    fn test_inaccurate_vocabulary_size_tolerated() {
        let data = "-5 2\nкот_NOUN 1.0 0.0\nпёс_NOUN 0.0 1.0\n";
        let file = read(data, &FilterPolicy::default()).unwrap();
        assert_eq!(file.entries.len(), 2);
        assert_eq!(file.stats.declared_vocabulary, -1);

        let data = "100 2\nкот_NOUN 1.0 0.0\n";
        assert_eq!(read(data, &FilterPolicy::default()).unwrap().entries.len(), 1);
    }

    #[test]
    fn test_malformed_header() {
        for data in ["", "3\n", "3 0\nкот_NOUN\n", "3 -2\n", "3 abc\n"] {
            let err = read(data, &FilterPolicy::default()).unwrap_err();
            assert!(matches!(err, LoadError::MalformedHeader(_)), "{:?}", data);
        }
    }

    #[test]
    fn test_filtering_during_parse() {
        let data = "5 2\nкот_NOUN 1.0 0.0\nя_PRON 1.0 0.0\nбежать_VERB 0.0 1.0\nплохо_ADV 0.5 0.5\n\n";
        let filter = FilterPolicy::new(2)
            .with_blacklist(["плохо"])
            .with_embedding_types(PosFilter::Only(vec![PartOfSpeech::Noun, PartOfSpeech::Adverb]));
        let file = read(data, &filter).unwrap();

        let tokens: Vec<&str> = file.entries.iter().map(|e| e.token()).collect();
        assert_eq!(tokens, vec!["кот_NOUN"]);
        // short word, wrong type, blacklisted, blank line
        assert_eq!(file.stats.filtered, 4);
    }

    #[test]
    fn test_duplicate_tokens_keep_first() {
        let data = "2 2\nкот_NOUN 1.0 0.0\nкот_NOUN 0.0 1.0\n";
        let file = read(data, &FilterPolicy::default()).unwrap();
        assert_eq!(file.entries.len(), 1);
        assert_eq!(file.entries[0].embedding(), &[1.0, 0.0]);
    }

    #[test]
    fn test_everything_filtered_is_error() {
        let data = "1 2\nя_PRON 1.0 0.0\n";
        let err = read(data, &FilterPolicy::new(2)).unwrap_err();
        assert!(matches!(err, LoadError::EmptyDictionary { filtered: 1 }));
    }

    #[test]
    fn test_missing_file() {
        let err = load_vector_file("/no/such/vectors.vec", &FilterPolicy::default()).unwrap_err();
        assert!(matches!(err, LoadError::FileOpen { .. }));
    }
}
