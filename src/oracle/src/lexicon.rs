//! Offline keyword oracle.
//!
//! Used when no hosted model is configured. Scores by marker lookup with the
//! weighted toxicity / hate-speech / offensive-language formula, and answers
//! in the same `Rating:` / `Reason:` shape as the hosted model.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{ImageInput, OracleError, ReplyOptions, ScoringOracle};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LexiconOracle {
    pub toxic_markers: Vec<String>,
    pub profanity_markers: Vec<String>,
}

impl Default for LexiconOracle {
    fn default() -> Self {
        Self {
            toxic_markers: ["hate", "stupid", "idiot"]
                .into_iter()
                .map(String::from)
                .collect(),
            profanity_markers: vec!["fuck".to_string()],
        }
    }
}

impl LexiconOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Weighted score in `0..=100` plus the markers that fired.
    pub fn score(&self, text: &str) -> (u8, Vec<&str>) {
        let lower = text.to_lowercase();
        let hits: Vec<&str> = self
            .toxic_markers
            .iter()
            .chain(&self.profanity_markers)
            .filter(|m| lower.contains(&m.to_lowercase()))
            .map(String::as_str)
            .collect();

        let toxic = self
            .toxic_markers
            .iter()
            .any(|m| lower.contains(&m.to_lowercase()));
        let profane = self
            .profanity_markers
            .iter()
            .any(|m| lower.contains(&m.to_lowercase()));

        let toxicity = if toxic { 0.8 } else { 0.2 };
        let hate_speech = toxicity * 0.9;
        let offensive = if profane { 0.5 } else { 0.0 };

        let score = (toxicity * 0.4 + hate_speech * 0.4 + offensive * 0.2) * 100.0_f64;
        (score.clamp(0.0, 100.0).round() as u8, hits)
    }

    fn reply_for(&self, text: &str) -> String {
        let (score, hits) = self.score(text);
        let reason = if hits.is_empty() {
            "No toxic markers found.".to_string()
        } else {
            format!("Matched toxic markers: {}.", hits.join(", "))
        };
        format!("Rating: {}\nReason: {}", score, reason)
    }
}

#[async_trait]
impl ScoringOracle for LexiconOracle {
    fn name(&self) -> &str {
        "lexicon"
    }

    async fn rate_text(&self, text: &str) -> Result<String, OracleError> {
        Ok(self.reply_for(text))
    }

    // Pixels are opaque here; only the caller's description is scored.
    async fn rate_image(
        &self,
        _image: &ImageInput,
        description: Option<&str>,
    ) -> Result<String, OracleError> {
        Ok(self.reply_for(description.unwrap_or_default()))
    }

    async fn rewrite_civil(&self, text: &str) -> Result<String, OracleError> {
        Ok(text.trim().to_string())
    }

    async fn reply_options(&self, _text: &str) -> Result<ReplyOptions, OracleError> {
        Ok(ReplyOptions::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse_assessment;

    #[test]
    fn test_clean_text_scores_low() {
        let oracle = LexiconOracle::new();
        let (score, hits) = oracle.score("Hello friend, how are you today?");
        assert_eq!(score, 15);
        assert!(hits.is_empty());
    }

    #[test]
    fn test_toxic_markers_are_case_insensitive() {
        let oracle = LexiconOracle::new();
        let (score, hits) = oracle.score("I HATE you, IDIOT");
        assert_eq!(score, 61);
        assert_eq!(hits, vec!["hate", "idiot"]);
    }

    #[test]
    fn test_profanity_adds_offensive_weight() {
        let (score, _) = LexiconOracle::new().score("I hate this fucking thing");
        assert_eq!(score, 71);
    }

    #[tokio::test]
    async fn test_reply_round_trips_through_parser() {
        let oracle = LexiconOracle::new();
        let reply = oracle.rate_text("you are stupid").await.unwrap();
        let a = parse_assessment(&reply);
        assert_eq!(a.score, 61);
        assert_eq!(a.reason, "Matched toxic markers: stupid.");
    }

    #[tokio::test]
    async fn test_image_scores_description_only() {
        let oracle = LexiconOracle::new();
        let image = ImageInput::Url("https://example.com/a.png".to_string());
        let reply = oracle.rate_image(&image, None).await.unwrap();
        assert_eq!(parse_assessment(&reply).score, 15);
    }
}
