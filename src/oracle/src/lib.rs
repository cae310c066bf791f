//! Toxicity Oracle - Hosted model scoring for Click-or-Cap
//!
//! The oracle is whatever model actually judges content. This crate never
//! scores content itself: it builds the instruction prompts, talks to the
//! hosted chat-completions API, and extracts a `Rating:` / `Reason:` pair
//! from the free-text reply. The offline lexicon oracle exists so the
//! service still answers when no API key is configured.

mod hosted;
mod lexicon;

pub use hosted::{
    normalize_api_key, HostedConfig, HostedOracle, DEFAULT_BASE_URL, DEFAULT_TEXT_MODEL,
    DEFAULT_VISION_MODEL,
};
pub use lexicon::LexiconOracle;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use thiserror::Error;

// ============ Core Types ============

/// Image reference handed to the vision model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ImageInput {
    /// Publicly reachable image URL
    Url(String),
    /// Inline base64 payload, with or without a `data:` prefix
    Data(String),
}

impl ImageInput {
    /// The value placed in the `image_url` slot of a vision message.
    ///
    /// Bare base64 is assumed to be JPEG.
    pub fn to_image_url(&self) -> String {
        match self {
            ImageInput::Url(url) => url.clone(),
            ImageInput::Data(data) if data.contains("data:image") => data.clone(),
            ImageInput::Data(data) => format!("data:image/jpeg;base64,{}", data),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ImageInput::Url(_) => "image_url",
            ImageInput::Data(_) => "image_data",
        }
    }
}

/// Three constructive replies to a hostile message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReplyOptions {
    pub polite: String,
    pub educational: String,
    pub firm: String,
}

impl ReplyOptions {
    /// Parse the JSON object the model was asked for.
    ///
    /// Models sometimes wrap JSON in a markdown fence; that is stripped first.
    pub fn from_json(reply: &str) -> Result<Self, OracleError> {
        let body = strip_code_fence(reply);
        let options: ReplyOptions = serde_json::from_str(body)?;
        if options.polite.trim().is_empty()
            || options.educational.trim().is_empty()
            || options.firm.trim().is_empty()
        {
            return Err(OracleError::InvalidReply(
                "reply options contain an empty entry".to_string(),
            ));
        }
        Ok(options)
    }

    /// In order: polite, educational, firm.
    pub fn into_vec(self) -> Vec<String> {
        vec![self.polite, self.educational, self.firm]
    }
}

impl Default for ReplyOptions {
    fn default() -> Self {
        Self {
            polite: "I respectfully disagree.".to_string(),
            educational: "That is not accurate.".to_string(),
            firm: "Please be respectful.".to_string(),
        }
    }
}

/// A parsed oracle reply.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Assessment {
    /// Toxicity in `0..=100`
    pub score: u8,
    pub reason: String,
    /// The reply exactly as the oracle produced it
    pub raw: String,
    /// Whether a rating was actually found in the reply
    pub rated: bool,
}

// ============ Errors ============

#[derive(Error, Debug)]
pub enum OracleError {
    #[error("MISTRAL_API_KEY is not configured")]
    MissingApiKey,
    #[error(
        "401 Unauthorized. Check your MISTRAL_API_KEY - get a valid key from console.mistral.ai"
    )]
    Unauthorized,
    #[error("HTTP {status}: {body}")]
    Http {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("oracle returned an empty reply")]
    EmptyReply,
    #[error("invalid reply: {0}")]
    InvalidReply(String),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// ============ Oracle Trait ============

/// The opaque scoring oracle.
///
/// Rating calls return free text; callers run it through [`parse_assessment`].
#[async_trait]
pub trait ScoringOracle: Send + Sync {
    /// Short identifier used in logs and audit entries
    fn name(&self) -> &str;

    async fn rate_text(&self, text: &str) -> Result<String, OracleError>;

    async fn rate_image(
        &self,
        image: &ImageInput,
        description: Option<&str>,
    ) -> Result<String, OracleError>;

    async fn rewrite_civil(&self, text: &str) -> Result<String, OracleError>;

    async fn reply_options(&self, text: &str) -> Result<ReplyOptions, OracleError>;
}

// ============ Prompts ============

pub const JSON_SYSTEM_PROMPT: &str = "You are a helpful JSON generator. Output only valid JSON.";

pub fn text_prompt(text: &str) -> String {
    format!(
        r#"You are a hate speech detection engine. Analyze the following text for toxicity, hate speech, and offensive content.

Text: "{text}"

Provide a response in this EXACT format:
Rating: [0-100]
Reason: [1 sentence explanation]

0 = Completely safe/positive
100 = Extreme hate speech/violence"#
    )
}

pub fn image_prompt(description: Option<&str>) -> String {
    let mut prompt = String::from(
        "Analyze this image for hate speech, offensive symbols, or toxic content.\n\
         \n\
         Provide a response in this EXACT format:\n\
         Rating: [0-100]\n\
         Reason: [1 sentence explanation]\n\
         \n\
         0 = Completely safe/positive\n\
         100 = Extreme hate speech/violence",
    );
    if let Some(context) = description.map(str::trim).filter(|d| !d.is_empty()) {
        prompt.push_str("\nContext: ");
        prompt.push_str(context);
    }
    prompt
}

pub fn rewrite_prompt(text: &str) -> String {
    format!(
        "Rewrite this text to be polite and constructive, removing toxicity. \
         Reply with the rewritten text only:\n\"{text}\""
    )
}

pub fn reply_options_prompt(text: &str) -> String {
    format!(
        r#"Help me reply to this potentially toxic comment: "{text}"

Generate 3 constructive responses:
1. Polite (kill them with kindness)
2. Educational (correcting facts/bias)
3. Firm (setting boundaries)

Return ONLY a JSON object: {{ "polite": "...", "educational": "...", "firm": "..." }}"#
    )
}

// ============ Reply Parsing ============

static RATING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\brating\W*(\d{1,3})").expect("rating regex is valid")
});

static REASON_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\breason\b\**\s*:\**\s*(.+)").expect("reason regex is valid")
});

/// Extract score and reason from a free-text oracle reply.
///
/// Never fails: a reply without a rating scores 0, a reply without a reason
/// uses the whole reply as the reason.
pub fn parse_assessment(reply: &str) -> Assessment {
    let rating = RATING_RE
        .captures(reply)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<u16>().ok())
        .map(|n| n.min(100) as u8);

    let reason = REASON_RE
        .captures(reply)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().trim_matches(['[', ']']).trim().to_string())
        .filter(|r| !r.is_empty())
        .unwrap_or_else(|| reply.trim().to_string());

    Assessment {
        score: rating.unwrap_or(0),
        reason,
        raw: reply.to_string(),
        rated: rating.is_some(),
    }
}

fn strip_code_fence(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}

// ============ Tests ============
