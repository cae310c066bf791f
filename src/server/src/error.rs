use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use moderation_contract::ContractError;
use points_ledger::LedgerError;
use thiserror::Error;
use trivia_deck::DeckError;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Contract(#[from] ContractError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Deck(#[from] DeckError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::Validation(_)
            | ServerError::Contract(ContractError::InvalidRequest(_))
            | ServerError::Contract(ContractError::InvalidThresholds { .. })
            | ServerError::Ledger(LedgerError::EmptyUserId) => StatusCode::BAD_REQUEST,
            ServerError::NotFound(_) | ServerError::Ledger(LedgerError::UnknownUser(_)) => {
                StatusCode::NOT_FOUND
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Renders any server error as `{"error": message}`
pub struct ApiError(pub ServerError);

impl From<ServerError> for ApiError {
    fn from(err: ServerError) -> Self {
        Self(err)
    }
}

impl From<ContractError> for ApiError {
    fn from(err: ContractError) -> Self {
        Self(err.into())
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.0.status();
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        }
        let body = serde_json::json!({ "error": self.0.to_string() });
        (status, Json(body)).into_response()
    }
}
