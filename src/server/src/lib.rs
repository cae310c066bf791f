//! Moderation Server - HTTP surface for Click-or-Cap
//!
//! Routes:
//! - `/decision/*`: moderation pipeline and remediation helpers
//! - `/users/*`: points game, leaderboard and moderation tally
//! - `/game/deck`: Click-or-Cap trivia deck
//! - `/hate-weather/*`: mock platform toxicity reports
//! - `/health`, `/health/ai`, `/api`: liveness and service info

mod config;
mod decision;
mod error;
mod extractors;
mod game;
mod users;
mod weather;

pub use config::{ServerConfig, DEFAULT_HOST, DEFAULT_PORT};
pub use error::{ApiError, ServerError};

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use moderation_contract::ModerationRunner;
use points_ledger::Ledger;
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use trivia_deck::DeckBuilder;

/// Shared by every handler; clones are cheap handles onto the same state
#[derive(Clone)]
pub struct AppState {
    pub runner: ModerationRunner,
    pub ledger: Ledger,
    pub deck: DeckBuilder,

    /// Whether a hosted model key was supplied
    pub oracle_configured: bool,
}

impl AppState {
    pub fn new(runner: ModerationRunner, deck: DeckBuilder, oracle_configured: bool) -> Self {
        Self {
            runner,
            ledger: Ledger::new(),
            deck,
            oracle_configured,
        }
    }
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

const MISSING_KEY_HINT: &str = "Add MISTRAL_API_KEY to .env (get key from console.mistral.ai)";

async fn health_ai(State(state): State<AppState>) -> Json<Value> {
    let hint = if state.oracle_configured {
        "OK"
    } else {
        MISSING_KEY_HINT
    };
    Json(json!({
        "mistral_configured": state.oracle_configured,
        "oracle": state.runner.oracle_name(),
        "hint": hint,
    }))
}

async fn api_info() -> Json<Value> {
    Json(json!({
        "message": "Click-or-Cap API",
        "status": "running",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "decision": "/decision",
            "users": "/users",
            "game": "/game",
            "hate_weather": "/hate-weather",
        }
    }))
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/health/ai", get(health_ai))
        .route("/api", get(api_info))
        .merge(decision::router())
        .merge(users::router())
        .merge(game::router())
        .merge(weather::router())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Bind and serve until the process is stopped
pub async fn serve(config: &ServerConfig, state: AppState) -> Result<(), ServerError> {
    let addr = config.bind_addr()?;
    let app = build_router(state);

    tracing::info!(%addr, "listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, Response};
    use std::sync::Arc;
    use std::time::Duration;
    use toxicity_oracle::LexiconOracle;
    use tower::ServiceExt;
    use trivia_deck::DeckConfig;

    /// Offline state: lexicon oracle and a deck with no reachable feeds
    pub fn test_state() -> AppState {
        let runner = ModerationRunner::new(Arc::new(LexiconOracle::new()));
        let deck = DeckBuilder::new(DeckConfig {
            real_feeds: Vec::new(),
            satire_feeds: Vec::new(),
            fetch_timeout: Duration::from_millis(200),
            ..DeckConfig::default()
        })
        .unwrap();
        AppState::new(runner, deck, false)
    }

    pub async fn send(app: Router, request: Request<Body>) -> Response<Body> {
        app.oneshot(request).await.unwrap()
    }

    pub async fn get(app: Router, uri: &str) -> Response<Body> {
        send(app, Request::get(uri).body(Body::empty()).unwrap()).await
    }

    pub async fn post_json(app: Router, uri: &str, body: Value) -> Response<Body> {
        let request = Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        send(app, request).await
    }

    pub async fn read_body(resp: Response<Body>) -> Value {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }
}
