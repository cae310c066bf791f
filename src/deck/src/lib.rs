//! Trivia Deck - "Click or Cap" cards
//!
//! Builds a shuffled deck of real headlines (CLICK), satirical headlines (CAP)
//! and a few curated hate speech samples (CAP). Headlines come from public RSS
//! feeds; a feed that fails is skipped, so the deck never comes back empty.

mod feeds;

pub use feeds::{parse_feed, unescape_html, FeedFetcher, FALLBACK_SOURCE};

use std::time::Duration;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

// ============ Sources ============

pub const REAL_NEWS_FEEDS: &[&str] = &[
    "http://feeds.bbci.co.uk/news/world/rss.xml",
    "https://www.reutersagency.com/feed/?best-topics=political-general&post_type=best",
    "https://rss.nytimes.com/services/xml/rss/nyt/HomePage.xml",
    "http://feeds.npr.org/1001/rss.xml",
];

/// Satire stands in for fake news
pub const SATIRE_FEEDS: &[&str] = &["https://www.theonion.com/rss", "https://babylonbee.com/feed"];

/// Controlled hate speech samples: (text, explanation)
pub const HATE_SPEECH_EXAMPLES: &[(&str, &str)] = &[
    (
        "They are all the same, get them out of our country!",
        "Generalization and exclusion based on group identity.",
    ),
    (
        "Women shouldn't be in the workplace, they belong in the kitchen.",
        "Gender-based discrimination and stereotyping.",
    ),
    (
        "People like that are a disease to society.",
        "Dehumanization, comparing a group to a disease.",
    ),
    (
        "The world would be better off without [Group X].",
        "Call for elimination or violence against a group.",
    ),
    (
        "Stop lying, you [slur] are always trying to cheat us.",
        "Use of slurs and negative stereotyping.",
    ),
];

pub const HATE_SOURCE: &str = "Anonymous / Social Media";
pub const REAL_EXPLANATION: &str = "This is a real headline from a reputable news source.";
pub const SATIRE_EXPLANATION: &str = "This is a satirical or fake headline.";

// ============ Types ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CardKind {
    /// Real headline
    Click,
    /// Fake headline or hate speech
    Cap,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameCard {
    pub id: String,
    pub text: String,
    #[serde(rename = "type")]
    pub kind: CardKind,
    pub source: String,
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedItem {
    pub text: String,
    pub source: String,
}

#[derive(Debug, Clone)]
pub struct DeckConfig {
    pub real_feeds: Vec<String>,
    pub satire_feeds: Vec<String>,
    pub per_feed_limit: usize,
    pub hate_samples: usize,
    pub fetch_timeout: Duration,
}

impl Default for DeckConfig {
    fn default() -> Self {
        Self {
            real_feeds: REAL_NEWS_FEEDS.iter().map(|s| s.to_string()).collect(),
            satire_feeds: SATIRE_FEEDS.iter().map(|s| s.to_string()).collect(),
            per_feed_limit: 4,
            hate_samples: 2,
            fetch_timeout: Duration::from_secs(2),
        }
    }
}

#[derive(Error, Debug)]
pub enum DeckError {
    #[error("Feed request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Feed {url} returned {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("Invalid feed: {0}")]
    Parse(String),
}

// ============ Assembly ============

fn card_id<R: Rng + ?Sized>(prefix: &str, rng: &mut R) -> String {
    format!("{}_{}", prefix, rng.gen_range(1000..=9999))
}

/// Turn fetched headlines into a shuffled deck with `samples` hate examples.
pub fn assemble_deck<R: Rng + ?Sized>(
    real: Vec<FeedItem>,
    satire: Vec<FeedItem>,
    rng: &mut R,
    samples: usize,
) -> Vec<GameCard> {
    let mut deck = Vec::with_capacity(real.len() + satire.len() + samples);

    for item in real {
        deck.push(GameCard {
            id: card_id("real", rng),
            text: item.text,
            kind: CardKind::Click,
            source: item.source,
            explanation: REAL_EXPLANATION.to_string(),
        });
    }

    for item in satire {
        deck.push(GameCard {
            id: card_id("fake", rng),
            text: item.text,
            kind: CardKind::Cap,
            source: item.source,
            explanation: SATIRE_EXPLANATION.to_string(),
        });
    }

    let picked: Vec<&(&str, &str)> = HATE_SPEECH_EXAMPLES
        .choose_multiple(rng, samples)
        .collect();
    for (text, explanation) in picked {
        deck.push(GameCard {
            id: card_id("hate", rng),
            text: text.to_string(),
            kind: CardKind::Cap,
            source: HATE_SOURCE.to_string(),
            explanation: format!("Hate Speech Detected: {}", explanation),
        });
    }

    deck.shuffle(rng);
    deck
}

// ============ Builder ============

#[derive(Clone)]
pub struct DeckBuilder {
    config: DeckConfig,
    fetcher: FeedFetcher,
}

impl DeckBuilder {
    pub fn new(config: DeckConfig) -> Result<Self, DeckError> {
        let fetcher = FeedFetcher::new(config.fetch_timeout)?;
        Ok(Self { config, fetcher })
    }

    pub fn config(&self) -> &DeckConfig {
        &self.config
    }

    /// Fetch every feed and deal a fresh deck.
    pub async fn build(&self) -> Vec<GameCard> {
        let limit = self.config.per_feed_limit;
        let (real, satire) = futures::join!(
            self.fetcher.fetch_all(&self.config.real_feeds, limit),
            self.fetcher.fetch_all(&self.config.satire_feeds, limit),
        );

        info!(
            real = real.len(),
            satire = satire.len(),
            samples = self.config.hate_samples,
            "dealing deck"
        );
        let mut rng = StdRng::from_entropy();
        assemble_deck(real, satire, &mut rng, self.config.hate_samples)
    }
}
