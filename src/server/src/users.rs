//! `/users/*`: points game and the global moderation tally.

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use moderation_contract::Action;
use points_ledger::{
    ActionOutcome, Leaderboard, ToxicityWeather, UserRecord, DEFAULT_LEADERBOARD_LIMIT,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::extractors::{AppJson, AppQuery};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users/action", post(log_action))
        .route("/users/leaderboard", get(leaderboard))
        .route("/users/score/:user_id", get(user_score))
        .route("/users/weather", get(weather))
        .route("/users/weather/update", post(update_weather))
}

#[derive(Debug, Deserialize)]
pub struct UserActionRequest {
    pub user_id: String,
    pub action_type: String,
}

#[derive(Debug, Deserialize)]
pub struct LeaderboardQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct WeatherUpdateQuery {
    pub action: String,
}

async fn log_action(
    State(state): State<AppState>,
    AppJson(body): AppJson<UserActionRequest>,
) -> Result<Json<ActionOutcome>, ApiError> {
    let outcome = state.ledger.record_action(&body.user_id, &body.action_type)?;
    Ok(Json(outcome))
}

async fn leaderboard(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<LeaderboardQuery>,
) -> Json<Leaderboard> {
    let limit = query.limit.unwrap_or(DEFAULT_LEADERBOARD_LIMIT);
    Json(state.ledger.leaderboard(limit))
}

async fn user_score(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<UserRecord>, ApiError> {
    Ok(Json(state.ledger.score(&user_id)?))
}

async fn weather(State(state): State<AppState>) -> Json<ToxicityWeather> {
    Json(state.ledger.weather())
}

async fn update_weather(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<WeatherUpdateQuery>,
) -> Result<Json<Value>, ApiError> {
    let action: Action = query.action.parse()?;
    state.ledger.record_decision(action);
    Ok(Json(json!({ "success": true })))
}
