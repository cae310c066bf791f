//! `/decision/*`: moderation and remediation endpoints.

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use moderation_contract::{
    Action, Alternative, AlternativeTone, DeEscalation, EmpathyReport, ModerationRequest,
};
use serde::{Deserialize, Serialize};
use toxicity_oracle::ImageInput;

use crate::error::ApiError;
use crate::extractors::AppJson;
use crate::{AppState, ServerError};

const EMPATHY_NOTE: &str = "A kinder version of this message is available.";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/decision/engine", post(decision_engine))
        .route("/decision/analyze-image", post(analyze_image))
        .route("/decision/generate-alternative", post(generate_alternative))
        .route("/decision/empathy-check", post(empathy_check))
        .route("/decision/de-escalate", post(de_escalate))
}

// ============ Requests ============

#[derive(Debug, Default, Deserialize)]
pub struct DecisionRequest {
    pub text: Option<String>,
    pub image_url: Option<String>,
    pub image_data: Option<String>,
    pub context: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ImageRequest {
    pub image_url: Option<String>,
    pub image_data: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AlternativeRequest {
    pub original_text: String,
    #[serde(default)]
    pub mood: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EmpathyCheckRequest {
    pub draft_text: String,
}

#[derive(Debug, Deserialize)]
pub struct DeEscalateRequest {
    pub context: String,
}

// ============ Responses ============

#[derive(Debug, Serialize)]
pub struct DecisionResponse {
    pub action: Action,
    pub score: u8,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replacement_content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rewritten_content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub empathy_note: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ImageDecisionResponse {
    pub action: Action,
    pub score: u8,
    pub reason: String,
    pub analysis: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replacement_content: Option<String>,
}

// ============ Handlers ============

async fn decision_engine(
    State(state): State<AppState>,
    AppJson(body): AppJson<DecisionRequest>,
) -> Result<Json<DecisionResponse>, ApiError> {
    let request =
        ModerationRequest::from_parts(body.text, body.image_url, body.image_data, body.context)?;

    let result = state.runner.moderate(&request).await;
    state.ledger.record_decision(result.action);

    let empathy_note = result
        .rewritten_content
        .as_ref()
        .map(|_| EMPATHY_NOTE.to_string());
    Ok(Json(DecisionResponse {
        action: result.action,
        score: result.score,
        reason: result.reason,
        replacement_content: result.replacement_content,
        rewritten_content: result.rewritten_content,
        empathy_note,
    }))
}

async fn analyze_image(
    State(state): State<AppState>,
    AppJson(body): AppJson<ImageRequest>,
) -> Result<Json<ImageDecisionResponse>, ApiError> {
    let image = match (non_blank(body.image_url), non_blank(body.image_data)) {
        (Some(url), _) => ImageInput::Url(url),
        (None, Some(data)) => ImageInput::Data(data),
        (None, None) => {
            return Err(ServerError::Validation(
                "Either image_url or image_data must be provided".to_string(),
            )
            .into())
        }
    };
    let request = ModerationRequest::image(image)?.with_context(non_blank(body.description));

    let result = state.runner.moderate(&request).await;
    state.ledger.record_decision(result.action);

    Ok(Json(ImageDecisionResponse {
        action: result.action,
        score: result.score,
        reason: result.reason,
        analysis: result.analysis,
        replacement_content: result.replacement_content,
    }))
}

async fn generate_alternative(
    State(state): State<AppState>,
    AppJson(body): AppJson<AlternativeRequest>,
) -> Result<Json<Alternative>, ApiError> {
    let tone = body
        .mood
        .as_deref()
        .map(AlternativeTone::from_mood)
        .unwrap_or_default();
    let alternative = state.runner.alternative(&body.original_text, tone).await?;
    Ok(Json(alternative))
}

async fn empathy_check(
    State(state): State<AppState>,
    AppJson(body): AppJson<EmpathyCheckRequest>,
) -> Result<Json<EmpathyReport>, ApiError> {
    Ok(Json(state.runner.empathy_check(&body.draft_text).await?))
}

async fn de_escalate(
    State(state): State<AppState>,
    AppJson(body): AppJson<DeEscalateRequest>,
) -> Result<Json<DeEscalation>, ApiError> {
    Ok(Json(state.runner.de_escalate(&body.context).await?))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
