//! Configuration
//!
//! JSON file with four sections (`dictionary`, `filter`, `game`, `server`),
//! every field defaulted. The file is looked up at `--config`, then
//! `$CONTEXTO_CONFIG`, then `<config dir>/contexto/config.json`. A few
//! `CONTEXTO_*` environment variables override individual fields.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::dictionary::DictionaryConfig;
use crate::filter::FilterConfig;
use crate::game::GameConfig;

pub const CONFIG_ENV: &str = "CONTEXTO_CONFIG";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Oldest sessions are dropped past this count (0 = unlimited)
    pub max_sessions: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            max_sessions: 10_000,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub dictionary: DictionaryConfig,
    pub filter: FilterConfig,
    pub game: GameConfig,
    pub server: ServerConfig,
}

impl Config {
    /// `<config dir>/contexto/config.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("contexto").join("config.json"))
    }

    /// Resolve, read and override. A missing file gives the defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = explicit
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from))
            .or_else(Self::default_path);

        let mut config = match path {
            Some(ref path) if path.exists() => Self::from_file(path)?,
            Some(ref path) => {
                if explicit.is_some() {
                    warn!("Config file {} not found, using defaults", path.display());
                }
                Self::default()
            }
            None => Self::default(),
        };

        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: Config = serde_json::from_str(&raw)
            .with_context(|| format!("invalid config file {}", path.display()))?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Apply `CONTEXTO_*` overrides through `lookup`
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup("CONTEXTO_EMBEDDINGS") {
            self.dictionary.embeddings_path = path;
        }
        if let Some(path) = lookup("CONTEXTO_DICTIONARY") {
            self.dictionary.dictionary_path = if path.is_empty() { None } else { Some(path) };
        }
        if let Some(host) = lookup("CONTEXTO_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("CONTEXTO_PORT") {
            self.server.port = port
                .trim()
                .parse()
                .with_context(|| format!("CONTEXTO_PORT is not a valid port: '{}'", port))?;
        }
        if let Some(seed) = lookup("CONTEXTO_SEED") {
            self.dictionary.seed = Some(
                seed.trim()
                    .parse()
                    .with_context(|| format!("CONTEXTO_SEED is not an integer: '{}'", seed))?,
            );
        }
        Ok(())
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rank::RankStrategy;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.max_sessions, 10_000);
        assert_eq!(config.filter.min_word_length, 2);
        assert_eq!(config.game.target_word_type, "noun");
        assert_eq!(config.game.rank_strategy, RankStrategy::Combined);
        assert!(config.dictionary.dictionary_path.is_none());
    }

    #[test]
    fn test_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "dictionary": {{ "embeddings_path": "/data/ru.vec", "seed": 42 }},
                "filter": {{ "min_word_length": 3, "dictionary_preferred_types": ["noun", "verb"] }},
                "game": {{ "rank_strategy": "neighborhood" }}
            }}"#
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.dictionary.embeddings_path, "/data/ru.vec");
        assert_eq!(config.dictionary.seed, Some(42));
        assert_eq!(config.filter.min_word_length, 3);
        assert_eq!(config.filter.dictionary_preferred_types, vec!["noun", "verb"]);
        assert_eq!(config.filter.embedding_preferred_types, vec!["any"]);
        assert_eq!(config.game.rank_strategy, RankStrategy::Neighborhood);
        assert_eq!(config.game.target_word_type, "noun");
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn test_invalid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        assert!(Config::from_file(file.path()).is_err());
    }

    #[test]
    fn test_missing_explicit_file_gives_defaults() {
        let config = Config::load(Some(Path::new("/no/such/contexto.json"))).unwrap();
        assert_eq!(config.filter.min_word_length, 2);
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("CONTEXTO_EMBEDDINGS", "/tmp/vectors.vec"),
            ("CONTEXTO_DICTIONARY", "/tmp/words.txt"),
            ("CONTEXTO_HOST", "0.0.0.0"),
            ("CONTEXTO_PORT", "9000"),
            ("CONTEXTO_SEED", "7"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config
            .apply_overrides(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.dictionary.embeddings_path, "/tmp/vectors.vec");
        assert_eq!(config.dictionary.dictionary_path.as_deref(), Some("/tmp/words.txt"));
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.dictionary.seed, Some(7));
    }

    #[test]
    fn test_bad_env_override() {
        let mut config = Config::default();
        let result = config.apply_overrides(|key| (key == "CONTEXTO_PORT").then(|| "eighty".to_string()));
        assert!(result.is_err());
    }

    #[test]
    fn test_round_trip_through_json() {
        let json = Config::default().to_json_pretty().unwrap();
        assert!(json.contains("\"rank_strategy\": \"combined\""));
    }
}
