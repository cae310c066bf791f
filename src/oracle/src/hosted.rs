//! Client for a Mistral-compatible chat-completions endpoint.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    image_prompt, reply_options_prompt, rewrite_prompt, text_prompt, ImageInput, OracleError,
    ReplyOptions, ScoringOracle, JSON_SYSTEM_PROMPT,
};

pub const DEFAULT_BASE_URL: &str = "https://api.mistral.ai/v1";
pub const DEFAULT_TEXT_MODEL: &str = "mistral-small-latest";
pub const DEFAULT_VISION_MODEL: &str = "pixtral-12b-2409";

#[derive(Debug, Clone)]
pub struct HostedConfig {
    pub base_url: String,
    pub api_key: String,
    pub text_model: String,
    pub vision_model: String,
    pub timeout_secs: u64,
}

impl HostedConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            text_model: DEFAULT_TEXT_MODEL.to_string(),
            vision_model: DEFAULT_VISION_MODEL.to_string(),
            timeout_secs: 30,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

/// Clean up an API key as it tends to arrive from `.env` files.
///
/// Returns `None` for blank keys and the `missing_key` placeholder.
pub fn normalize_api_key(raw: &str) -> Option<String> {
    let key = raw.trim().trim_matches(['"', '\'']).trim();
    if key.is_empty() || key == "missing_key" {
        None
    } else {
        Some(key.to_string())
    }
}

// ============ Wire Types ============

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: MessageContent,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: String },
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Debug, Deserialize)]
struct ReplyMessage {
    content: Option<String>,
}

impl ChatMessage {
    fn user(text: String) -> Self {
        Self {
            role: "user",
            content: MessageContent::Text(text),
        }
    }

    fn system(text: &str) -> Self {
        Self {
            role: "system",
            content: MessageContent::Text(text.to_string()),
        }
    }
}

// ============ Client ============

#[derive(Clone)]
pub struct HostedOracle {
    client: Client,
    config: HostedConfig,
}

impl HostedOracle {
    pub fn new(mut config: HostedConfig) -> Result<Self, OracleError> {
        config.api_key = normalize_api_key(&config.api_key).ok_or(OracleError::MissingApiKey)?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &HostedConfig {
        &self.config
    }

    async fn complete(
        &self,
        model: &str,
        messages: Vec<ChatMessage>,
        json_mode: bool,
    ) -> Result<String, OracleError> {
        let request = ChatRequest {
            model,
            messages,
            response_format: json_mode.then_some(ResponseFormat {
                kind: "json_object",
            }),
        };

        debug!(model, json_mode, "calling oracle");
        let response = self
            .client
            .post(self.config.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(OracleError::Unauthorized);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OracleError::Http { status, body });
        }

        let body: ChatResponse = response.json().await?;
        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(OracleError::EmptyReply)
    }
}

#[async_trait]
impl ScoringOracle for HostedOracle {
    fn name(&self) -> &str {
        "mistral"
    }

    async fn rate_text(&self, text: &str) -> Result<String, OracleError> {
        let messages = vec![ChatMessage::user(text_prompt(text))];
        self.complete(&self.config.text_model, messages, false).await
    }

    async fn rate_image(
        &self,
        image: &ImageInput,
        description: Option<&str>,
    ) -> Result<String, OracleError> {
        let messages = vec![ChatMessage {
            role: "user",
            content: MessageContent::Parts(vec![
                ContentPart::Text {
                    text: image_prompt(description),
                },
                ContentPart::ImageUrl {
                    image_url: image.to_image_url(),
                },
            ]),
        }];
        self.complete(&self.config.vision_model, messages, false)
            .await
    }

    async fn rewrite_civil(&self, text: &str) -> Result<String, OracleError> {
        let messages = vec![ChatMessage::user(rewrite_prompt(text))];
        let reply = self
            .complete(&self.config.text_model, messages, false)
            .await?;
        Ok(reply.trim().trim_matches('"').trim().to_string())
    }

    async fn reply_options(&self, text: &str) -> Result<ReplyOptions, OracleError> {
        let messages = vec![
            ChatMessage::system(JSON_SYSTEM_PROMPT),
            ChatMessage::user(reply_options_prompt(text)),
        ];
        let reply = self.complete(&self.config.text_model, messages, true).await?;
        ReplyOptions::from_json(&reply)
    }
}
