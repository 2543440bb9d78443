//! Contexto HTTP Server
//!
//! JSON API for playing the game in a browser.
//!
//! ## Endpoints
//! - POST /api/new-game - Start a game, sets the `session_id` cookie
//! - POST /api/guess - Rank a guess against the session's target
//! - POST /api/give-up - Reveal the target and end the game
//! - POST /api/hint - Suggest a word closer than the best guess
//! - GET /api/history - Guesses of the session, closest first
//! - GET /api/similar/:word - Nearest neighbours (diagnostics)
//! - GET /api/health - Liveness probe

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::task::block_in_place;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::RankError;
use crate::game::WordGame;
use crate::rank::{MAX_RANK, WIN_RANK};
use crate::session::{Guess, SessionManager};
use crate::text;
use crate::types::bare_word;

pub const SESSION_COOKIE: &str = "session_id";

const DEFAULT_SIMILAR: usize = 10;

/// Server state
pub struct AppState {
    pub game: WordGame,
    pub sessions: SessionManager,
}

impl AppState {
    pub fn new(game: WordGame, max_sessions: usize) -> Self {
        Self {
            game,
            sessions: SessionManager::new(max_sessions),
        }
    }
}

/// Error body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);
type ApiResult<T> = Result<Json<T>, ApiError>;

fn bad_request(message: &str) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
}

fn internal_error(message: &str) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
}

/// Body accepted by every POST endpoint; all fields optional
#[derive(Debug, Default, Deserialize)]
struct SessionRequest {
    #[serde(default)]
    session_id: Option<String>,
}

/// Guess request
#[derive(Debug, Deserialize)]
pub struct GuessRequest {
    word: String,
    #[serde(default)]
    session_id: Option<String>,
}

/// New game response
#[derive(Debug, Serialize)]
pub struct NewGameResponse {
    success: bool,
    session_id: String,
}

/// Guess response
#[derive(Debug, Serialize)]
pub struct GuessResponse {
    word: String,
    rank: i32,
    correct: &'static str,
}

/// Give up response
#[derive(Debug, Serialize)]
pub struct GiveUpResponse {
    success: bool,
    target_word: String,
}

/// Hint response
#[derive(Debug, Serialize)]
pub struct HintResponse {
    word: String,
    rank: i32,
}

/// History response
#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    guesses: Vec<Guess>,
    game_over: bool,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SimilarQuery {
    k: Option<usize>,
}

/// One neighbour in the diagnostics listing
#[derive(Debug, Serialize)]
pub struct SimilarWord {
    word: String,
    similarity: f32,
}

/// Create the router
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    let api = Router::new()
        .route("/new-game", post(new_game_handler))
        .route("/guess", post(guess_handler))
        .route("/give-up", post(give_up_handler))
        .route("/hint", post(hint_handler))
        .route("/history", get(history_handler))
        .route("/similar/:word", get(similar_handler))
        .route("/health", get(health_handler));

    Router::new().nest("/api", api).layer(cors).with_state(state)
}

fn session_from_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Cookie first, then the `session_id` field of the body
fn resolve_session_id(headers: &HeaderMap, from_body: Option<String>) -> Result<String, ApiError> {
    session_from_cookie(headers)
        .or(from_body.filter(|id| !id.is_empty()))
        .ok_or_else(|| bad_request("No active game session"))
}

fn parse_session_body(body: &Bytes) -> Option<String> {
    if body.is_empty() {
        return None;
    }
    match serde_json::from_slice::<SessionRequest>(body) {
        Ok(req) => req.session_id,
        Err(e) => {
            warn!("Failed to parse request body: {}", e);
            None
        }
    }
}

/// Start a new game
async fn new_game_handler(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let target = state.game.generate_new_target_word().map_err(|e| {
        error!("Failed to pick a target word: {}", e);
        internal_error("No words available, try again later")
    })?;

    let session_id = state.sessions.create_session(target.token()).await;
    info!("New game started. Session: {}, target: {}", session_id, target.token());

    let cookie = format!("{}={}; Path=/; HttpOnly; SameSite=Lax", SESSION_COOKIE, session_id);
    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(NewGameResponse {
            success: true,
            session_id,
        }),
    ))
}

/// Rank a guess
async fn guess_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<GuessResponse> {
    if body.is_empty() {
        return Err(bad_request("Empty request body"));
    }
    let req: GuessRequest = serde_json::from_slice(&body).map_err(|e| {
        warn!("Invalid JSON: {}", e);
        bad_request("Invalid JSON format")
    })?;

    let word = text::to_lower(req.word.trim());
    if word.is_empty() {
        return Err(bad_request("Word cannot be empty"));
    }

    let session_id = resolve_session_id(&headers, req.session_id)?;
    let session = state
        .sessions
        .session(&session_id)
        .await
        .ok_or_else(|| bad_request("Invalid game session"))?;

    // held until the guess is recorded
    let mut session = session.lock().await;
    if session.is_game_over() {
        return Err(bad_request("Game is already over. Start a new game to continue."));
    }

    if !state.game.validate_word(&word) {
        warn!("Unknown word submitted: '{}'", word);
        return Err(bad_request("Invalid word"));
    }

    // neighbourhood ranking scans the whole vocabulary
    let rank = block_in_place(|| state.game.calculate_rank(&word, session.target())).map_err(|e| match &e {
        RankError::WordNotFound(_) => bad_request("Invalid word"),
        RankError::InvalidTarget(_) => {
            error!("Error processing guess: {}", e);
            internal_error("Failed to calculate rank")
        }
    })?;

    let correct = rank == WIN_RANK;
    info!("Guess: {}, Rank: {}, Correct: {}", word, rank, if correct { "yes" } else { "no" });
    session.add_guess(&word, rank);

    Ok(Json(GuessResponse {
        word,
        rank,
        correct: if correct { "yes" } else { "no" },
    }))
}

/// Reveal the target
async fn give_up_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<GiveUpResponse> {
    let session_id = resolve_session_id(&headers, parse_session_body(&body))?;
    let session = state
        .sessions
        .session(&session_id)
        .await
        .ok_or_else(|| bad_request("Invalid game session"))?;

    let mut session = session.lock().await;
    if session.is_game_over() {
        return Err(bad_request("Game is already over. Start a new game to continue."));
    }

    session.mark_game_over();
    let target_word = bare_word(session.target()).to_string();
    info!("Player gave up. Session: {}, Target word: {}", session_id, session.target());

    Ok(Json(GiveUpResponse {
        success: true,
        target_word,
    }))
}

/// Suggest a word; the hint counts as a guess
async fn hint_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<HintResponse> {
    let session_id = resolve_session_id(&headers, parse_session_body(&body))?;
    let session = state
        .sessions
        .session(&session_id)
        .await
        .ok_or_else(|| bad_request("Invalid game session"))?;

    let mut session = session.lock().await;
    if session.is_game_over() {
        return Err(bad_request("Game is already over. Start a new game to continue."));
    }

    let hint = block_in_place(|| state.game.hint(session.target(), &session.guessed_words(), session.best_rank()))
        .map_err(|e| {
            error!("Failed to build a hint: {}", e);
            internal_error("Failed to build a hint")
        })?
        .ok_or_else(|| bad_request("No hints left"))?;

    session.add_guess(&hint.word, hint.rank);
    Ok(Json(HintResponse {
        word: hint.word,
        rank: hint.rank,
    }))
}

/// Guesses so far, closest first
async fn history_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<HistoryResponse> {
    let session_id = resolve_session_id(&headers, query.session_id)?;
    let session = state
        .sessions
        .session(&session_id)
        .await
        .ok_or_else(|| bad_request("Invalid game session"))?;

    let session = session.lock().await;
    Ok(Json(HistoryResponse {
        guesses: session.history(),
        game_over: session.is_game_over(),
    }))
}

/// Nearest neighbours of a word
async fn similar_handler(
    State(state): State<Arc<AppState>>,
    Path(word): Path<String>,
    Query(query): Query<SimilarQuery>,
) -> ApiResult<Vec<SimilarWord>> {
    let word = word.trim();
    if !state.game.validate_word(word) {
        return Err(bad_request("Invalid word"));
    }

    let k = query.k.unwrap_or(DEFAULT_SIMILAR).min(MAX_RANK as usize);
    let neighbours: Vec<SimilarWord> = block_in_place(|| {
        state
            .game
            .most_similar(word, k)
            .into_iter()
            .map(|(entry, similarity)| SimilarWord {
                word: entry.token().to_string(),
                similarity,
            })
            .collect()
    });

    Ok(Json(neighbours))
}

/// Health check
async fn health_handler() -> &'static str {
    "OK"
}

/// Load the dictionary and serve until the process is stopped.
///
/// Vocabulary scans run through `block_in_place`, so this needs the
/// multi-threaded runtime.
pub async fn start_server(config: &Config) -> anyhow::Result<()> {
    let game = WordGame::from_config(config)?;
    let state = Arc::new(AppState::new(game, config.server.max_sessions));

    let app = create_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    info!("Contexto server starting on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary::DictionaryStore;
    use crate::game::GameConfig;
    use crate::rank::RankStrategy;
    use crate::simd_ops::normalize;
    use crate::types::WordEntry;
    use axum::body::Body;
    use axum::http::Request;
    use axum::response::Response;
    use tower::ServiceExt;

    fn test_state() -> Arc<AppState> {
        test_state_with(GameConfig::default())
    }

    fn test_state_with(config: GameConfig) -> Arc<AppState> {
        let raw: [(&str, [f32; 2]); 5] = [
            ("кот_NOUN", [1.0, 0.0]),
            ("кошка_NOUN", [0.9, 0.2]),
            ("пёс_NOUN", [0.7, 0.7]),
            ("небо_NOUN", [-1.0, 0.0]),
            ("бежать_VERB", [0.0, 1.0]),
        ];
        let entries = raw
            .iter()
            .map(|(token, v)| {
                let mut v = v.to_vec();
                normalize(&mut v);
                WordEntry::new(token, v)
            })
            .collect();
        let store = Arc::new(DictionaryStore::from_entries(entries, Some(1)));
        let game = WordGame::new(store, &config);
        Arc::new(AppState::new(game, 100))
    }

    fn encode_path(segment: &str) -> String {
        segment
            .bytes()
            .map(|b| {
                if b.is_ascii_alphanumeric() || b == b'_' {
                    (b as char).to_string()
                } else {
                    format!("%{:02X}", b)
                }
            })
            .collect()
    }

    async fn send(app: &Router, request: Request<Body>) -> Response {
        app.clone().oneshot(request).await.unwrap()
    }

    async fn json_body(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post(uri: &str, session_id: Option<&str>, body: &str) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(id) = session_id {
            builder = builder.header(header::COOKIE, format!("theme=dark; session_id={}", id));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    /// Start a game and pin its target
    async fn start_game(app: &Router, state: &AppState, target: &str) -> String {
        let response = send(app, post("/api/new-game", None, "")).await;
        assert_eq!(response.status(), StatusCode::OK);
        let cookie = response.headers().get(header::SET_COOKIE).unwrap().to_str().unwrap().to_string();
        assert!(cookie.starts_with("session_id="));

        let body = json_body(response).await;
        assert_eq!(body["success"], true);
        let id = body["session_id"].as_str().unwrap().to_string();
        assert!(cookie.contains(&id));

        assert!(state.sessions.set_target_word(&id, target).await);
        id
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_health() {
        let app = create_router(test_state());
        let response = send(&app, Request::builder().uri("/api/health").body(Body::empty()).unwrap()).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_new_game_target_is_noun() {
        let state = test_state();
        let app = create_router(state.clone());
        let response = send(&app, post("/api/new-game", None, "")).await;
        let body = json_body(response).await;
        let id = body["session_id"].as_str().unwrap();

        let target = state.sessions.get_target_word(id).await.unwrap();
        assert!(target.ends_with("_NOUN"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_guess_flow() {
        let state = test_state();
        let app = create_router(state.clone());
        let id = start_game(&app, &state, "кот_NOUN").await;

        let response = send(&app, post("/api/guess", Some(&id), r#"{"word": "  Небо "}"#)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["word"], "небо");
        assert_eq!(body["correct"], "no");
        assert!(body["rank"].as_i64().unwrap() >= 700);

        let response = send(&app, post("/api/guess", Some(&id), r#"{"word": "кот"}"#)).await;
        let body = json_body(response).await;
        assert_eq!(body["rank"], 1);
        assert_eq!(body["correct"], "yes");

        // game over after the win
        let response = send(&app, post("/api/guess", Some(&id), r#"{"word": "пёс"}"#)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["error"], "Game is already over. Start a new game to continue.");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_guess_errors() {
        let state = test_state();
        let app = create_router(state.clone());
        let id = start_game(&app, &state, "кот_NOUN").await;

        let cases = [
            (post("/api/guess", Some(&id), ""), "Empty request body"),
            (post("/api/guess", Some(&id), "{oops"), "Invalid JSON format"),
            (post("/api/guess", Some(&id), r#"{"word": "   "}"#), "Word cannot be empty"),
            (post("/api/guess", None, r#"{"word": "пёс"}"#), "No active game session"),
            (post("/api/guess", Some("nope"), r#"{"word": "пёс"}"#), "Invalid game session"),
            (post("/api/guess", Some(&id), r#"{"word": "мышь"}"#), "Invalid word"),
        ];
        for (request, message) in cases {
            let response = send(&app, request).await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", message);
            assert_eq!(json_body(response).await["error"], message);
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_session_id_in_body() {
        let state = test_state();
        let app = create_router(state.clone());
        let id = start_game(&app, &state, "кот_NOUN").await;

        let body = format!(r#"{{"word": "пёс", "session_id": "{}"}}"#, id);
        let response = send(&app, post("/api/guess", None, &body)).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_give_up() {
        let state = test_state();
        let app = create_router(state.clone());
        let id = start_game(&app, &state, "кот_NOUN").await;

        let response = send(&app, post("/api/give-up", Some(&id), "")).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["target_word"], "кот");
        assert!(state.sessions.is_game_over(&id).await);

        let response = send(&app, post("/api/give-up", Some(&id), "")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_hint_and_history() {
        let state = test_state();
        let app = create_router(state.clone());
        let id = start_game(&app, &state, "кот_NOUN").await;

        send(&app, post("/api/guess", Some(&id), r#"{"word": "небо"}"#)).await;
        let response = send(&app, post("/api/hint", Some(&id), "{}")).await;
        assert_eq!(response.status(), StatusCode::OK);
        let hint = json_body(response).await;
        assert_ne!(hint["word"], "небо");
        assert_ne!(hint["word"], "кот");

        let request = Request::builder()
            .uri(format!("/api/history?session_id={}", id))
            .body(Body::empty())
            .unwrap();
        let response = send(&app, request).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        let guesses = body["guesses"].as_array().unwrap();
        assert_eq!(guesses.len(), 2);
        let words: Vec<&str> = guesses.iter().map(|g| g["word"].as_str().unwrap()).collect();
        assert!(words.contains(&"небо"));
        assert!(words.contains(&hint["word"].as_str().unwrap()));
        assert!(guesses.windows(2).all(|w| w[0]["rank"].as_i64() <= w[1]["rank"].as_i64()));
        assert_eq!(body["game_over"], false);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_similar() {
        let app = create_router(test_state());
        let request = Request::builder()
            .uri(format!("/api/similar/{}?k=2", encode_path("кот_NOUN")))
            .body(Body::empty())
            .unwrap();
        let response = send(&app, request).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        let words = body.as_array().unwrap();
        assert_eq!(words.len(), 2);
        assert_eq!(words[0]["word"], "кошка_NOUN");

        let request = Request::builder()
            .uri(format!("/api/similar/{}", encode_path("мышь")))
            .body(Body::empty())
            .unwrap();
        let response = send(&app, request).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn test_vocabulary_scans_leave_worker_free() {
        let state = test_state_with(GameConfig {
            rank_strategy: RankStrategy::Neighborhood,
            ..GameConfig::default()
        });
        let app = create_router(state.clone());
        let id = start_game(&app, &state, "кот_NOUN").await;

        let guess = send(&app, post("/api/guess", Some(&id), r#"{"word": "кошка"}"#));
        let hint = send(&app, post("/api/hint", Some(&id), "{}"));
        let similar = send(
            &app,
            Request::builder()
                .uri(format!("/api/similar/{}", encode_path("кот_NOUN")))
                .body(Body::empty())
                .unwrap(),
        );
        let health = send(&app, Request::builder().uri("/api/health").body(Body::empty()).unwrap());
        let (guess, hint, similar, health) = tokio::join!(guess, hint, similar, health);

        assert_eq!(health.status(), StatusCode::OK);
        assert_eq!(similar.status(), StatusCode::OK);
        assert_eq!(hint.status(), StatusCode::OK);
        assert_eq!(guess.status(), StatusCode::OK);
        // кошка is the nearest neighbour of кот
        assert_eq!(json_body(guess).await["rank"], 2);
    }
}
