// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Jonathan D.A. Jewell

//! Moderation Contract - Typed, testable moderation decisions
//!
//! This module defines the complete contract for content moderation:
//! - **Inputs**: What the moderation pipeline receives (`ModerationRequest`)
//! - **Outputs**: What it returns (`ModerationResult`, `Action`)
//! - **Remediation**: Civil rewrites, empathy checks, de-escalation replies
//! - **Audit Log Format**: Structured records that never store the content
//!
//! Scoring is delegated to a [`ScoringOracle`]; this crate only maps the
//! oracle's rating onto an action through fixed thresholds.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub use toxicity_oracle::{
    parse_assessment, Assessment, ImageInput, OracleError, ReplyOptions, ScoringOracle,
};

// ============================================================================
// CONTRACT VERSION
// ============================================================================

/// Contract version for compatibility checking
pub const CONTRACT_VERSION: &str = "0.1.0";

/// Audit schema identifier
pub const CONTRACT_SCHEMA: &str = "click-or-cap-moderation-v1";

// ============================================================================
// INPUTS - What the pipeline receives
// ============================================================================

/// Content under review
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Content {
    Text(String),
    Image(ImageInput),
}

impl Content {
    pub fn kind(&self) -> &'static str {
        match self {
            Content::Text(_) => "text",
            Content::Image(image) => image.kind(),
        }
    }
}

/// A validated moderation request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModerationRequest {
    /// Unique request identifier for tracing
    pub request_id: Uuid,

    /// Timestamp when request was created
    pub timestamp: DateTime<Utc>,

    /// The content to judge
    pub content: Content,

    /// Optional description of where the content came from
    pub context: Option<String>,
}

impl ModerationRequest {
    fn with_content(content: Content) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            content,
            context: None,
        }
    }

    /// Text request; blank text is rejected
    pub fn text(text: impl Into<String>) -> Result<Self, ContractError> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(ContractError::InvalidRequest(
                "text must not be empty".to_string(),
            ));
        }
        Ok(Self::with_content(Content::Text(text)))
    }

    /// Image request; URLs must be http(s) or data URLs, inline data must be base64
    pub fn image(image: ImageInput) -> Result<Self, ContractError> {
        validate_image(&image)?;
        Ok(Self::with_content(Content::Image(image)))
    }

    /// Build a request from the loose optional fields of a JSON body.
    ///
    /// An image reference wins over text; in that case the text (when no
    /// explicit context is given) becomes the image's context.
    pub fn from_parts(
        text: Option<String>,
        image_url: Option<String>,
        image_data: Option<String>,
        context: Option<String>,
    ) -> Result<Self, ContractError> {
        let text = non_blank(text);
        let context = non_blank(context);
        let image = match (non_blank(image_url), non_blank(image_data)) {
            (Some(url), _) => Some(ImageInput::Url(url)),
            (None, Some(data)) => Some(ImageInput::Data(data)),
            (None, None) => None,
        };

        match (image, text) {
            (Some(image), text) => Ok(Self::image(image)?.with_context(context.or(text))),
            (None, Some(text)) => Ok(Self::text(text)?.with_context(context)),
            (None, None) => Err(ContractError::InvalidRequest(
                "either text or an image (image_url / image_data) is required".to_string(),
            )),
        }
    }

    /// Builder: set request context
    pub fn with_context(mut self, context: Option<String>) -> Self {
        self.context = context;
        self
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn validate_image(image: &ImageInput) -> Result<(), ContractError> {
    match image {
        ImageInput::Url(url) => {
            let url = url.trim();
            if url.starts_with("http://")
                || url.starts_with("https://")
                || url.starts_with("data:image")
            {
                Ok(())
            } else {
                Err(ContractError::InvalidRequest(format!(
                    "image_url must be an http(s) or data URL: {url}"
                )))
            }
        }
        ImageInput::Data(data) => {
            let payload = match data.split_once(";base64,") {
                Some((_, payload)) => payload,
                None => data.as_str(),
            };
            STANDARD.decode(payload.trim()).map(|_| ()).map_err(|e| {
                ContractError::InvalidRequest(format!("image_data is not valid base64: {e}"))
            })
        }
    }
}

// ============================================================================
// OUTPUTS - What the pipeline returns
// ============================================================================

/// Final moderation action
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    /// Content is shown as-is
    Allow,

    /// Content is shown behind a warning
    Warn,

    /// Content is hidden
    Hide,
}

impl Action {
    /// Convert to exit code for CLI usage
    pub fn exit_code(&self) -> i32 {
        match self {
            Action::Allow => 0,
            Action::Warn => 2,
            Action::Hide => 1,
        }
    }

    pub fn is_flagged(&self) -> bool {
        !matches!(self, Action::Allow)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Allow => "ALLOW",
            Action::Warn => "WARN",
            Action::Hide => "HIDE",
        }
    }

    /// Placeholder shown in place of flagged content
    pub fn replacement_text(&self) -> Option<&'static str> {
        match self {
            Action::Hide => Some("🌸 This content has been hidden to maintain a positive space."),
            Action::Warn => Some("⚠️ Content flagged for review"),
            Action::Allow => None,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = ContractError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ALLOW" => Ok(Action::Allow),
            "WARN" => Ok(Action::Warn),
            "HIDE" => Ok(Action::Hide),
            other => Err(ContractError::InvalidRequest(format!(
                "unknown action: {other}"
            ))),
        }
    }
}

/// Score cut-offs. A score at or above `hide` hides, at or above `warn` warns.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Thresholds {
    pub hide: u8,
    pub warn: u8,
}

impl Thresholds {
    /// Text endpoints
    pub const TEXT: Thresholds = Thresholds { hide: 70, warn: 40 };

    /// The image endpoint warns earlier
    pub const IMAGE: Thresholds = Thresholds { hide: 70, warn: 30 };

    pub fn new(hide: u8, warn: u8) -> Result<Self, ContractError> {
        if hide > 100 || warn > hide {
            return Err(ContractError::InvalidThresholds { hide, warn });
        }
        Ok(Self { hide, warn })
    }

    pub fn decide(&self, score: u8) -> Action {
        if score >= self.hide {
            Action::Hide
        } else if score >= self.warn {
            Action::Warn
        } else {
            Action::Allow
        }
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Self::TEXT
    }
}

/// Complete moderation decision
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModerationResult {
    /// Original request ID for correlation
    pub request_id: Uuid,

    /// Unique decision identifier
    pub decision_id: Uuid,

    /// Timestamp when decision was made
    pub timestamp: DateTime<Utc>,

    pub action: Action,

    /// Toxicity in `0..=100`
    pub score: u8,

    pub reason: String,

    /// The oracle's reply verbatim
    pub analysis: String,

    /// Placeholder to show instead of flagged content
    pub replacement_content: Option<String>,

    /// Civil rewrite of flagged text
    pub rewritten_content: Option<String>,

    /// Oracle that produced the rating
    pub oracle: String,

    /// Set when the oracle call failed and the default score was used
    pub oracle_error: Option<String>,

    /// Processing duration in microseconds
    pub duration_us: u64,
}

/// Empathy mirror result for a draft message
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmpathyReport {
    /// Toxicity in `0.0..=1.0`
    pub toxicity: f64,
    pub predicted_reaction_emoji: String,
    pub civilized_version: String,
    pub warning_message: String,
}

/// Tone requested for an alternative phrasing
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AlternativeTone {
    #[default]
    Polite,
    Educational,
    Firm,
}

impl AlternativeTone {
    /// Unknown moods fall back to polite
    pub fn from_mood(mood: &str) -> Self {
        match mood.trim().to_lowercase().as_str() {
            "educational" => AlternativeTone::Educational,
            "firm" => AlternativeTone::Firm,
            _ => AlternativeTone::Polite,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AlternativeTone::Polite => "polite",
            AlternativeTone::Educational => "educational",
            AlternativeTone::Firm => "firm",
        }
    }

    fn pick(&self, options: ReplyOptions) -> String {
        match self {
            AlternativeTone::Polite => options.polite,
            AlternativeTone::Educational => options.educational,
            AlternativeTone::Firm => options.firm,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Alternative {
    pub original: String,
    pub alternative: String,
    pub improvement_note: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeEscalation {
    pub options: Vec<String>,
    pub recommended: String,
}

// ============================================================================
// AUDIT LOG FORMAT - Structured logging without content
// ============================================================================

/// Audit log entry for every moderation decision
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Entry schema version
    pub schema: String,

    pub audit_id: Uuid,
    pub request_id: Uuid,
    pub decision_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub action: Action,
    pub score: u8,
    pub oracle: String,
    pub oracle_failed: bool,

    /// `text`, `image_url` or `image_data`
    pub content_kind: String,

    pub rewritten: bool,
    pub duration_us: u64,
    pub contract_version: String,

    /// Hash of the content (for verification without storing content)
    pub content_hash: String,
}

impl AuditEntry {
    pub fn from_result(request: &ModerationRequest, result: &ModerationResult) -> Self {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        match &request.content {
            Content::Text(text) => text.hash(&mut hasher),
            Content::Image(image) => image.to_image_url().hash(&mut hasher),
        }
        let content_hash = format!("{:016x}", hasher.finish());

        Self {
            schema: CONTRACT_SCHEMA.to_string(),
            audit_id: Uuid::new_v4(),
            request_id: request.request_id,
            decision_id: result.decision_id,
            timestamp: Utc::now(),
            action: result.action,
            score: result.score,
            oracle: result.oracle.clone(),
            oracle_failed: result.oracle_error.is_some(),
            content_kind: request.content.kind().to_string(),
            rewritten: result.rewritten_content.is_some(),
            duration_us: result.duration_us,
            contract_version: CONTRACT_VERSION.to_string(),
            content_hash,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Serialize to pretty JSON for debugging
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

// ============================================================================
// CONTRACT ERRORS
// ============================================================================

#[derive(Error, Debug)]
pub enum ContractError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid thresholds: warn {warn} must not exceed hide {hide} (max 100)")]
    InvalidThresholds { hide: u8, warn: u8 },

    #[error("Oracle error: {0}")]
    Oracle(#[from] OracleError),
}

// ============================================================================
// MODERATION RUNNER - The decision pipeline
// ============================================================================

/// Runs requests through the oracle and maps the rating onto an action
#[derive(Clone)]
pub struct ModerationRunner {
    oracle: Arc<dyn ScoringOracle>,
    text_thresholds: Thresholds,
    image_thresholds: Thresholds,
    rewrite_flagged: bool,
}

impl ModerationRunner {
    pub fn new(oracle: Arc<dyn ScoringOracle>) -> Self {
        Self {
            oracle,
            text_thresholds: Thresholds::TEXT,
            image_thresholds: Thresholds::IMAGE,
            rewrite_flagged: true,
        }
    }

    /// Builder: override the thresholds
    pub fn with_thresholds(mut self, text: Thresholds, image: Thresholds) -> Self {
        self.text_thresholds = text;
        self.image_thresholds = image;
        self
    }

    /// Builder: toggle civil rewrites for flagged text
    pub fn with_rewrites(mut self, enabled: bool) -> Self {
        self.rewrite_flagged = enabled;
        self
    }

    pub fn oracle_name(&self) -> &str {
        self.oracle.name()
    }

    pub fn thresholds_for(&self, content: &Content) -> Thresholds {
        match content {
            Content::Text(_) => self.text_thresholds,
            Content::Image(_) => self.image_thresholds,
        }
    }

    /// Moderate a request.
    ///
    /// Oracle failures do not fail the request: the error text stands in for
    /// the reply, which parses to score 0 with the error as reason.
    pub async fn moderate(&self, request: &ModerationRequest) -> ModerationResult {
        let start = Instant::now();

        let reply = match &request.content {
            Content::Text(text) => self.oracle.rate_text(text).await,
            Content::Image(image) => {
                self.oracle
                    .rate_image(image, request.context.as_deref())
                    .await
            }
        };

        let (assessment, oracle_error) = match reply {
            Ok(reply) => (parse_assessment(&reply), None),
            Err(e) => {
                warn!(
                    request_id = %request.request_id,
                    oracle = self.oracle.name(),
                    error = %e,
                    "oracle call failed, using default score"
                );
                let text = match &request.content {
                    Content::Text(_) => format!("Error analyzing text: {e}"),
                    Content::Image(_) => format!("Error analyzing image: {e}"),
                };
                let assessment = Assessment {
                    score: 0,
                    reason: text.clone(),
                    raw: text,
                    rated: false,
                };
                (assessment, Some(e.to_string()))
            }
        };

        if !assessment.rated && oracle_error.is_none() {
            debug!(request_id = %request.request_id, "oracle reply carried no rating");
        }
        let action = self.thresholds_for(&request.content).decide(assessment.score);

        let rewritten_content = match &request.content {
            Content::Text(text) if action.is_flagged() && self.rewrite_flagged => {
                Some(self.civilize(text).await)
            }
            _ => None,
        };

        let result = ModerationResult {
            request_id: request.request_id,
            decision_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            action,
            score: assessment.score,
            reason: assessment.reason,
            analysis: assessment.raw,
            replacement_content: action.replacement_text().map(str::to_string),
            rewritten_content,
            oracle: self.oracle.name().to_string(),
            oracle_error,
            duration_us: start.elapsed().as_micros() as u64,
        };

        let audit = self.audit(request, &result);
        info!(
            target: "audit",
            request_id = %audit.request_id,
            decision_id = %audit.decision_id,
            action = %audit.action,
            score = audit.score,
            oracle = %audit.oracle,
            content_kind = %audit.content_kind,
            content_hash = %audit.content_hash,
            duration_us = audit.duration_us,
            "moderation decision"
        );

        result
    }

    /// Civil rewrite; falls back to the trimmed original
    pub async fn civilize(&self, text: &str) -> String {
        match self.oracle.rewrite_civil(text).await {
            Ok(rewrite) if !rewrite.trim().is_empty() => rewrite,
            Ok(_) => text.trim().to_string(),
            Err(e) => {
                warn!(error = %e, "civil rewrite failed, returning original");
                text.trim().to_string()
            }
        }
    }

    /// Empathy mirror: how might a draft land with its reader
    pub async fn empathy_check(&self, draft: &str) -> Result<EmpathyReport, ContractError> {
        if draft.trim().is_empty() {
            return Err(ContractError::InvalidRequest(
                "draft_text must not be empty".to_string(),
            ));
        }

        let reply = match self.oracle.rate_text(draft).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(error = %e, "oracle call failed during empathy check");
                format!("Error analyzing text: {e}")
            }
        };
        let toxicity = f64::from(parse_assessment(&reply).score) / 100.0;

        let report = if toxicity > 0.5 {
            EmpathyReport {
                toxicity,
                predicted_reaction_emoji: "😢".to_string(),
                civilized_version: self.civilize(draft).await,
                warning_message:
                    "This message might hurt someone's feelings. Consider being kinder."
                        .to_string(),
            }
        } else if toxicity > 0.2 {
            EmpathyReport {
                toxicity,
                predicted_reaction_emoji: "😕".to_string(),
                civilized_version: self.civilize(draft).await,
                warning_message: "This message could be misunderstood. Maybe soften the tone?"
                    .to_string(),
            }
        } else {
            EmpathyReport {
                toxicity,
                predicted_reaction_emoji: "😊".to_string(),
                civilized_version: draft.to_string(),
                warning_message: "This message looks respectful!".to_string(),
            }
        };
        Ok(report)
    }

    async fn reply_options(&self, text: &str) -> ReplyOptions {
        match self.oracle.reply_options(text).await {
            Ok(options) => options,
            Err(e) => {
                warn!(error = %e, "reply generation failed, using stock replies");
                ReplyOptions::default()
            }
        }
    }

    /// Rephrase text in the requested tone
    pub async fn alternative(
        &self,
        text: &str,
        tone: AlternativeTone,
    ) -> Result<Alternative, ContractError> {
        if text.trim().is_empty() {
            return Err(ContractError::InvalidRequest(
                "original_text must not be empty".to_string(),
            ));
        }
        let options = self.reply_options(text).await;
        Ok(Alternative {
            original: text.to_string(),
            alternative: tone.pick(options),
            improvement_note: format!(
                "Rewritten in a {} tone to promote healthy discussion",
                tone.as_str()
            ),
        })
    }

    /// Constructive replies to a hostile message; the polite one is recommended
    pub async fn de_escalate(&self, context: &str) -> Result<DeEscalation, ContractError> {
        if context.trim().is_empty() {
            return Err(ContractError::InvalidRequest(
                "context must not be empty".to_string(),
            ));
        }
        let options = self.reply_options(context).await.into_vec();
        let recommended = options[0].clone();
        Ok(DeEscalation {
            options,
            recommended,
        })
    }

    /// Create an audit entry for a decision
    pub fn audit(&self, request: &ModerationRequest, result: &ModerationResult) -> AuditEntry {
        AuditEntry::from_result(request, result)
    }

    /// Run calibration cases against the configured oracle
    pub async fn calibrate(&self, cases: &[CalibrationCase]) -> CalibrationSummary {
        let mut results = Vec::with_capacity(cases.len());
        for case in cases {
            results.push(self.run_case(case).await);
        }
        CalibrationSummary::from_results(results)
    }

    async fn run_case(&self, case: &CalibrationCase) -> CalibrationResult {
        let result = self.moderate(&case.request).await;

        let action_matches = result.action == case.expected_action;
        let score_matches = case
            .expected_score
            .map(|expected| result.score.abs_diff(expected) <= case.tolerance)
            .unwrap_or(true);
        let passed = action_matches && score_matches && result.oracle_error.is_none();

        let error = if let Some(e) = &result.oracle_error {
            Some(e.clone())
        } else if !passed {
            Some(format!(
                "Expected {} (score {:?} ±{}), got {} (score {})",
                case.expected_action,
                case.expected_score,
                case.tolerance,
                result.action,
                result.score
            ))
        } else {
            None
        };

        CalibrationResult {
            name: case.name.clone(),
            passed,
            expected_action: case.expected_action,
            actual_action: result.action,
            expected_score: case.expected_score,
            actual_score: result.score,
            error,
            duration_us: result.duration_us,
        }
    }
}

// ============================================================================
// CALIBRATION HARNESS
// ============================================================================

/// A known input with the decision the oracle should reach
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationCase {
    pub name: String,
    pub request: ModerationRequest,
    pub expected_action: Action,
    pub expected_score: Option<u8>,

    /// Allowed absolute score deviation
    pub tolerance: u8,
}

impl CalibrationCase {
    /// Stock cases: one toxic, one clean, one mildly offensive description
    /// attached to a placeholder image.
    pub fn defaults() -> Vec<CalibrationCase> {
        let image = ImageInput::Url("https://example.com/test.png".to_string());
        let case = |name: &str, description: &str, action: Action, score: u8| CalibrationCase {
            name: name.to_string(),
            request: ModerationRequest::with_content(Content::Image(image.clone()))
                .with_context(Some(description.to_string())),
            expected_action: action,
            expected_score: Some(score),
            tolerance: 15,
        };

        vec![
            case("toxic_content", "I hate you all idiots", Action::Hide, 85),
            case(
                "clean_content",
                "Hello friend, how are you today?",
                Action::Allow,
                20,
            ),
            case(
                "mildly_offensive",
                "That's inappropriate and offensive behavior",
                Action::Warn,
                55,
            ),
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationResult {
    pub name: String,
    pub passed: bool,
    pub expected_action: Action,
    pub actual_action: Action,
    pub expected_score: Option<u8>,
    pub actual_score: u8,
    pub error: Option<String>,
    pub duration_us: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub results: Vec<CalibrationResult>,
}

impl CalibrationSummary {
    fn from_results(results: Vec<CalibrationResult>) -> Self {
        let passed = results.iter().filter(|r| r.passed).count();
        Self {
            total: results.len(),
            passed,
            failed: results.len() - passed,
            results,
        }
    }

    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }

    pub fn failed_cases(&self) -> Vec<&str> {
        self.results
            .iter()
            .filter(|r| !r.passed)
            .map(|r| r.name.as_str())
            .collect()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Oracle that replays fixed answers
    struct ScriptedOracle {
        rating: Result<String, String>,
        rewrite: Result<String, String>,
        options: Option<ReplyOptions>,
        rewrites: AtomicUsize,
    }

    impl ScriptedOracle {
        fn rating(reply: &str) -> Self {
            Self {
                rating: Ok(reply.to_string()),
                rewrite: Ok("Let's talk about this calmly.".to_string()),
                options: None,
                rewrites: AtomicUsize::new(0),
            }
        }

        fn failing() -> Self {
            Self {
                rating: Err("connection refused".to_string()),
                rewrite: Err("connection refused".to_string()),
                options: None,
                rewrites: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ScoringOracle for ScriptedOracle {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn rate_text(&self, _text: &str) -> Result<String, OracleError> {
            self.rating.clone().map_err(OracleError::InvalidReply)
        }

        async fn rate_image(
            &self,
            _image: &ImageInput,
            _description: Option<&str>,
        ) -> Result<String, OracleError> {
            self.rating.clone().map_err(OracleError::InvalidReply)
        }

        async fn rewrite_civil(&self, _text: &str) -> Result<String, OracleError> {
            self.rewrites.fetch_add(1, Ordering::SeqCst);
            self.rewrite.clone().map_err(OracleError::InvalidReply)
        }

        async fn reply_options(&self, _text: &str) -> Result<ReplyOptions, OracleError> {
            self.options
                .clone()
                .ok_or_else(|| OracleError::InvalidReply("no options".to_string()))
        }
    }

    fn runner_with(oracle: ScriptedOracle) -> (ModerationRunner, Arc<ScriptedOracle>) {
        let oracle = Arc::new(oracle);
        (ModerationRunner::new(oracle.clone()), oracle)
    }

    #[test]
    fn test_text_thresholds() {
        let t = Thresholds::TEXT;
        assert_eq!(t.decide(0), Action::Allow);
        assert_eq!(t.decide(39), Action::Allow);
        assert_eq!(t.decide(40), Action::Warn);
        assert_eq!(t.decide(69), Action::Warn);
        assert_eq!(t.decide(70), Action::Hide);
        assert_eq!(t.decide(100), Action::Hide);
    }

    #[test]
    fn test_image_thresholds_warn_earlier() {
        assert_eq!(Thresholds::IMAGE.decide(30), Action::Warn);
        assert_eq!(Thresholds::TEXT.decide(30), Action::Allow);
    }

    #[test]
    fn test_rejects_inverted_thresholds() {
        assert!(Thresholds::new(40, 70).is_err());
        assert!(Thresholds::new(101, 40).is_err());
        assert_eq!(Thresholds::new(80, 50).unwrap().decide(60), Action::Warn);
    }

    #[test]
    fn test_action_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&Action::Hide).unwrap(), "\"HIDE\"");
        assert_eq!("warn".parse::<Action>().unwrap(), Action::Warn);
        assert!("block".parse::<Action>().is_err());
    }

    #[test]
    fn test_request_requires_content() {
        let err = ModerationRequest::from_parts(Some("  ".into()), None, None, None).unwrap_err();
        assert!(matches!(err, ContractError::InvalidRequest(_)));
    }

    #[test]
    fn test_image_wins_and_text_becomes_context() {
        let request = ModerationRequest::from_parts(
            Some("caption".into()),
            Some("https://example.com/a.png".into()),
            None,
            None,
        )
        .unwrap();
        assert_eq!(request.content.kind(), "image_url");
        assert_eq!(request.context.as_deref(), Some("caption"));
    }

    #[test]
    fn test_image_data_must_be_base64() {
        assert!(ModerationRequest::image(ImageInput::Data("data:image/png;base64,QUJD".into())).is_ok());
        assert!(ModerationRequest::image(ImageInput::Data("not base64!".into())).is_err());
        assert!(ModerationRequest::image(ImageInput::Url("ftp://x/y.png".into())).is_err());
    }

    #[tokio::test]
    async fn test_hide_with_rewrite() {
        let (runner, oracle) = runner_with(ScriptedOracle::rating("Rating: 85\nReason: Targeted insult."));
        let request = ModerationRequest::text("I hate you all idiots").unwrap();
        let result = runner.moderate(&request).await;

        assert_eq!(result.action, Action::Hide);
        assert_eq!(result.score, 85);
        assert_eq!(result.reason, "Targeted insult.");
        assert_eq!(
            result.replacement_content.as_deref(),
            Action::Hide.replacement_text()
        );
        assert_eq!(
            result.rewritten_content.as_deref(),
            Some("Let's talk about this calmly.")
        );
        assert_eq!(oracle.rewrites.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_allow_skips_rewrite() {
        let (runner, oracle) = runner_with(ScriptedOracle::rating("Rating: 10\nReason: Friendly."));
        let result = runner
            .moderate(&ModerationRequest::text("hello there").unwrap())
            .await;

        assert_eq!(result.action, Action::Allow);
        assert!(result.replacement_content.is_none());
        assert!(result.rewritten_content.is_none());
        assert_eq!(oracle.rewrites.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_rewrites_can_be_disabled() {
        let (runner, oracle) = runner_with(ScriptedOracle::rating("Rating: 50\nReason: Rude."));
        let runner = runner.with_rewrites(false);
        let result = runner
            .moderate(&ModerationRequest::text("shut up").unwrap())
            .await;

        assert_eq!(result.action, Action::Warn);
        assert!(result.rewritten_content.is_none());
        assert_eq!(oracle.rewrites.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_images_use_image_thresholds_without_rewrite() {
        let (runner, oracle) = runner_with(ScriptedOracle::rating("Rating: 35\nReason: Crude gesture."));
        let request =
            ModerationRequest::image(ImageInput::Url("https://example.com/a.png".into())).unwrap();
        let result = runner.moderate(&request).await;

        assert_eq!(result.action, Action::Warn);
        assert!(result.rewritten_content.is_none());
        assert_eq!(oracle.rewrites.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_oracle_failure_defaults_to_allow() {
        let (runner, _) = runner_with(ScriptedOracle::failing());
        let result = runner
            .moderate(&ModerationRequest::text("anything").unwrap())
            .await;

        assert_eq!(result.action, Action::Allow);
        assert_eq!(result.score, 0);
        assert!(result.reason.starts_with("Error analyzing text:"));
        assert!(result.oracle_error.is_some());
    }

    #[tokio::test]
    async fn test_oracle_error_text_is_never_scored() {
        let oracle = ScriptedOracle {
            rating: Err("upstream said: rating 95 exceeded".to_string()),
            ..ScriptedOracle::failing()
        };
        let (runner, _) = runner_with(oracle);
        let result = runner
            .moderate(&ModerationRequest::text("anything").unwrap())
            .await;

        assert_eq!(result.score, 0);
        assert_eq!(result.action, Action::Allow);
        assert!(result.analysis.contains("rating 95"));
        assert!(result.oracle_error.is_some());
    }

    #[tokio::test]
    async fn test_empathy_levels() {
        let (runner, _) = runner_with(ScriptedOracle::rating("Rating: 80\nReason: Insulting."));
        let report = runner.empathy_check("You are an idiot").await.unwrap();
        assert_eq!(report.predicted_reaction_emoji, "😢");
        assert!((report.toxicity - 0.8).abs() < f64::EPSILON);
        assert_eq!(report.civilized_version, "Let's talk about this calmly.");

        let (runner, _) = runner_with(ScriptedOracle::rating("Rating: 30\nReason: Terse."));
        let report = runner.empathy_check("whatever").await.unwrap();
        assert_eq!(report.predicted_reaction_emoji, "😕");

        let (runner, oracle) = runner_with(ScriptedOracle::rating("Rating: 5\nReason: Kind."));
        let report = runner.empathy_check("thanks so much!").await.unwrap();
        assert_eq!(report.predicted_reaction_emoji, "😊");
        assert_eq!(report.civilized_version, "thanks so much!");
        assert_eq!(oracle.rewrites.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_empathy_rewrite_failure_keeps_draft() {
        let oracle = ScriptedOracle {
            rewrite: Err("timeout".to_string()),
            ..ScriptedOracle::rating("Rating: 90\nReason: Threat.")
        };
        let (runner, _) = runner_with(oracle);
        let report = runner.empathy_check("  get lost  ").await.unwrap();
        assert_eq!(report.civilized_version, "get lost");
    }

    #[tokio::test]
    async fn test_alternative_picks_tone() {
        let oracle = ScriptedOracle {
            options: Some(ReplyOptions {
                polite: "p".into(),
                educational: "e".into(),
                firm: "f".into(),
            }),
            ..ScriptedOracle::rating("Rating: 0")
        };
        let (runner, _) = runner_with(oracle);
        let alt = runner
            .alternative("you're wrong", AlternativeTone::from_mood("FIRM"))
            .await
            .unwrap();
        assert_eq!(alt.alternative, "f");
        assert_eq!(
            alt.improvement_note,
            "Rewritten in a firm tone to promote healthy discussion"
        );
        assert_eq!(AlternativeTone::from_mood("sarcastic"), AlternativeTone::Polite);
    }

    #[tokio::test]
    async fn test_de_escalate_falls_back_to_stock_replies() {
        let (runner, _) = runner_with(ScriptedOracle::failing());
        let d = runner.de_escalate("Someone called me names").await.unwrap();
        assert_eq!(d.options, ReplyOptions::default().into_vec());
        assert_eq!(d.recommended, "I respectfully disagree.");
        assert!(runner.de_escalate("   ").await.is_err());
    }

    #[tokio::test]
    async fn test_audit_entry_hides_content() {
        let (runner, _) = runner_with(ScriptedOracle::rating("Rating: 75\nReason: Slur."));
        let request = ModerationRequest::text("secret hateful words").unwrap();
        let result = runner.moderate(&request).await;
        let audit = runner.audit(&request, &result);

        let json = audit.to_json().unwrap();
        assert!(!json.contains("secret hateful words"));
        assert_eq!(audit.content_hash.len(), 16);
        assert_eq!(audit.action, Action::Hide);
        assert!(audit.rewritten);
        assert_eq!(audit.schema, CONTRACT_SCHEMA);
    }

    #[tokio::test]
    async fn test_calibration_reports_failures() {
        let (runner, _) = runner_with(ScriptedOracle::rating("Rating: 60\nReason: Mixed."));
        let summary = runner.calibrate(&CalibrationCase::defaults()).await;

        assert_eq!(summary.total, 3);
        assert_eq!(summary.passed, 1);
        assert_eq!(summary.failed_cases(), vec!["toxic_content", "clean_content"]);
        assert!(!summary.all_passed());
    }
}
