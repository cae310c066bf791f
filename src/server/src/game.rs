//! `/game/deck`: Click-or-Cap trivia deck.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use trivia_deck::GameCard;

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/game/deck", get(game_deck))
}

async fn game_deck(State(state): State<AppState>) -> Json<Vec<GameCard>> {
    Json(state.deck.build().await)
}

#[cfg(test)]
mod tests {
    use crate::build_router;
    use crate::test_support::*;
    use axum::http::StatusCode;

    #[tokio::test]
    async fn test_deck_without_feeds_deals_hate_samples() {
        let resp = get(build_router(test_state()), "/game/deck").await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body = read_body(resp).await;
        let cards = body.as_array().unwrap();
        assert_eq!(cards.len(), 2);
        for card in cards {
            assert_eq!(card["type"], "CAP");
            assert!(card["id"].as_str().unwrap().starts_with("hate_"));
        }
    }
}
