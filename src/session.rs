//! Game Sessions
//!
//! In-memory per-player state: target word, guess history and the game-over
//! flag. The map lock only guards membership; each session has its own mutex
//! so at most one mutation is in flight per session id, and a guess evaluated
//! while holding it always sees the latest target.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};
use uuid::Uuid;

use crate::rank::WIN_RANK;
use crate::text;

/// One recorded guess
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Guess {
    pub word: String,
    pub rank: i32,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct GameSession {
    id: String,
    target: String,
    guesses: Vec<Guess>,
    game_over: bool,
    created_at: DateTime<Utc>,
}

impl GameSession {
    pub fn new(id: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            target: target.into(),
            guesses: Vec::new(),
            game_over: false,
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Target token, including its POS tag
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Start over with a new target
    pub fn set_target(&mut self, target: impl Into<String>) {
        self.target = target.into();
        self.guesses.clear();
        self.game_over = false;
    }

    pub fn is_game_over(&self) -> bool {
        self.game_over
    }

    pub fn mark_game_over(&mut self) {
        self.game_over = true;
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn has_guessed(&self, word: &str) -> bool {
        let word = text::to_lower(word);
        self.guesses.iter().any(|g| g.word == word)
    }

    /// Record a guess. Returns `false` for a repeated word, which is not
    /// recorded again. A winning rank ends the game.
    pub fn add_guess(&mut self, word: &str, rank: i32) -> bool {
        if rank == WIN_RANK {
            self.game_over = true;
        }
        if self.has_guessed(word) {
            return false;
        }
        self.guesses.push(Guess {
            word: text::to_lower(word),
            rank,
            timestamp: Utc::now(),
        });
        true
    }

    /// Guesses in the order they were made
    pub fn guesses(&self) -> &[Guess] {
        &self.guesses
    }

    /// Guesses from closest to furthest
    pub fn history(&self) -> Vec<Guess> {
        let mut history = self.guesses.clone();
        history.sort_by_key(|g| g.rank);
        history
    }

    pub fn guessed_words(&self) -> Vec<String> {
        self.guesses.iter().map(|g| g.word.clone()).collect()
    }

    pub fn best_rank(&self) -> Option<i32> {
        self.guesses.iter().map(|g| g.rank).min()
    }
}

struct SessionSlot {
    seq: u64,
    session: Arc<Mutex<GameSession>>,
}

/// All live sessions, capped at `max_sessions` (0 = unlimited)
pub struct SessionManager {
    sessions: RwLock<HashMap<String, SessionSlot>>,
    max_sessions: usize,
    next_seq: AtomicU64,
}

impl SessionManager {
    pub fn new(max_sessions: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            max_sessions,
            next_seq: AtomicU64::new(0),
        }
    }

    /// Open a session with a fresh id, evicting the oldest one when full
    pub async fn create_session(&self, target: impl Into<String>) -> String {
        let id = Uuid::new_v4().to_string();
        let session = GameSession::new(id.clone(), target);
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);

        let mut sessions = self.sessions.write().await;
        if self.max_sessions > 0 {
            while sessions.len() >= self.max_sessions {
                let oldest = sessions.iter().min_by_key(|(_, slot)| slot.seq).map(|(id, _)| id.clone());
                match oldest {
                    Some(oldest) => {
                        debug!("Session limit reached, evicting {}", oldest);
                        sessions.remove(&oldest);
                    }
                    None => break,
                }
            }
        }
        sessions.insert(
            id.clone(),
            SessionSlot {
                seq,
                session: Arc::new(Mutex::new(session)),
            },
        );
        info!("New game session {} ({} active)", id, sessions.len());
        id
    }

    /// Shared handle to one session; lock it to read or mutate
    pub async fn session(&self, id: &str) -> Option<Arc<Mutex<GameSession>>> {
        self.sessions.read().await.get(id).map(|slot| Arc::clone(&slot.session))
    }

    pub async fn has_session(&self, id: &str) -> bool {
        self.sessions.read().await.contains_key(id)
    }

    pub async fn get_target_word(&self, id: &str) -> Option<String> {
        let session = self.session(id).await?;
        let guard = session.lock().await;
        Some(guard.target().to_string())
    }

    /// Returns `false` when the session does not exist
    pub async fn set_target_word(&self, id: &str, target: impl Into<String>) -> bool {
        match self.session(id).await {
            Some(session) => {
                session.lock().await.set_target(target);
                true
            }
            None => false,
        }
    }

    pub async fn is_game_over(&self, id: &str) -> bool {
        match self.session(id).await {
            Some(session) => session.lock().await.is_game_over(),
            None => false,
        }
    }

    pub async fn mark_game_over(&self, id: &str) -> bool {
        match self.session(id).await {
            Some(session) => {
                session.lock().await.mark_game_over();
                true
            }
            None => false,
        }
    }

    /// Returns `false` when the session does not exist or the word repeats
    pub async fn add_guess(&self, id: &str, word: &str, rank: i32) -> bool {
        match self.session(id).await {
            Some(session) => session.lock().await.add_guess(word, rank),
            None => false,
        }
    }

    pub async fn remove_session(&self, id: &str) -> bool {
        self.sessions.write().await.remove(id).is_some()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    pub fn max_sessions(&self) -> usize {
        self.max_sessions
    }
}
