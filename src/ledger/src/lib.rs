//! Points Ledger - Process-local gamification state
//!
//! Users earn points for civil behaviour (sending a rewritten message,
//! reporting hate, de-escalating a thread). Everything lives in memory
//! behind one lock and disappears on restart.

use chrono::{DateTime, Utc};
use moderation_contract::Action;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

pub const DEFAULT_LEADERBOARD_LIMIT: usize = 10;

// ============ Core Types ============

/// Kinds of user action that earn points
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserAction {
    CivilizedMessage,
    ReportedHate,
    DeEscalatedThread,
    AcceptedAlternative,
    Other(String),
}

impl UserAction {
    pub fn parse(action_type: &str) -> Self {
        match action_type.trim() {
            "civilized_message" => UserAction::CivilizedMessage,
            "reported_hate" => UserAction::ReportedHate,
            "de_escalated_thread" => UserAction::DeEscalatedThread,
            "accepted_alternative" => UserAction::AcceptedAlternative,
            other => UserAction::Other(other.to_string()),
        }
    }

    pub fn points(&self) -> u32 {
        match self {
            // Self-regulation earns the most
            UserAction::CivilizedMessage => 50,
            UserAction::DeEscalatedThread => 30,
            UserAction::AcceptedAlternative => 25,
            UserAction::ReportedHate => 20,
            UserAction::Other(_) => 10,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            UserAction::CivilizedMessage => "civilized_message",
            UserAction::ReportedHate => "reported_hate",
            UserAction::DeEscalatedThread => "de_escalated_thread",
            UserAction::AcceptedAlternative => "accepted_alternative",
            UserAction::Other(other) => other,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserRecord {
    pub user_id: String,
    pub username: String,
    pub score: u32,
    pub actions_count: u32,
}

impl UserRecord {
    fn new(user_id: &str) -> Self {
        let short: String = user_id.chars().take(8).collect();
        Self {
            user_id: user_id.to_string(),
            username: format!("User_{}", short),
            score: 0,
            actions_count: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionLogEntry {
    pub user_id: String,
    pub action_type: String,
    pub points: u32,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Badge {
    KindnessNovice,
    PeaceMaker,
}

impl Badge {
    pub fn threshold(&self) -> u32 {
        match self {
            Badge::KindnessNovice => 100,
            Badge::PeaceMaker => 500,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Badge::KindnessNovice => "🌟 Kindness Novice",
            Badge::PeaceMaker => "🏆 Peace Maker",
        }
    }

    /// Badge whose threshold the latest award crossed, if any
    pub fn unlocked(new_total: u32, points: u32) -> Option<Badge> {
        [Badge::KindnessNovice, Badge::PeaceMaker]
            .into_iter()
            .find(|b| new_total >= b.threshold() && new_total < b.threshold() + points)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActionOutcome {
    pub success: bool,
    pub points_earned: u32,
    pub new_total_score: u32,
    pub badge_unlocked: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub user_id: String,
    pub username: String,
    pub score: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Leaderboard {
    pub entries: Vec<LeaderboardEntry>,
    pub total_users: usize,
}

/// Global counts of moderation actions
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ModerationTally {
    pub total_analyzed: u64,
    pub hide_count: u64,
    pub warn_count: u64,
    pub allow_count: u64,
}

impl ModerationTally {
    pub fn record(&mut self, action: Action) {
        self.total_analyzed += 1;
        match action {
            Action::Hide => self.hide_count += 1,
            Action::Warn => self.warn_count += 1,
            Action::Allow => self.allow_count += 1,
        }
    }

    /// Hidden content counts fully, warnings half; rounded half-to-even to two places
    pub fn overall_toxicity(&self) -> f64 {
        if self.total_analyzed == 0 {
            return 0.0;
        }
        let weighted = self.hide_count as f64 + self.warn_count as f64 * 0.5;
        (weighted / self.total_analyzed as f64 * 100.0).round_ties_even() / 100.0
    }
}

/// The "hate weather report" built from the tally
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToxicityWeather {
    pub overall_toxicity: f64,
    pub total_analyzed: u64,
    pub hide_count: u64,
    pub warn_count: u64,
    pub allow_count: u64,
}

impl From<ModerationTally> for ToxicityWeather {
    fn from(tally: ModerationTally) -> Self {
        Self {
            overall_toxicity: tally.overall_toxicity(),
            total_analyzed: tally.total_analyzed,
            hide_count: tally.hide_count,
            warn_count: tally.warn_count,
            allow_count: tally.allow_count,
        }
    }
}

// ============ Errors ============

#[derive(Error, Debug, PartialEq, Eq)]
pub enum LedgerError {
    #[error("User not found")]
    UnknownUser(String),
    #[error("user_id must not be empty")]
    EmptyUserId,
}

// ============ Ledger ============

#[derive(Debug, Default)]
struct LedgerState {
    users: HashMap<String, UserRecord>,
    actions: Vec<ActionLogEntry>,
    tally: ModerationTally,
}

/// Shared handle; clones see the same state
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    inner: Arc<RwLock<LedgerState>>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Award points for an action, creating the user on first sight
    pub fn record_action(
        &self,
        user_id: &str,
        action_type: &str,
    ) -> Result<ActionOutcome, LedgerError> {
        let user_id = user_id.trim();
        if user_id.is_empty() {
            return Err(LedgerError::EmptyUserId);
        }

        let action = UserAction::parse(action_type);
        let points = action.points();

        let mut state = self.inner.write();
        let user = state
            .users
            .entry(user_id.to_string())
            .or_insert_with(|| UserRecord::new(user_id));
        user.score += points;
        user.actions_count += 1;
        let new_total = user.score;

        state.actions.push(ActionLogEntry {
            user_id: user_id.to_string(),
            action_type: action.as_str().to_string(),
            points,
            timestamp: Utc::now(),
        });
        drop(state);

        let badge = Badge::unlocked(new_total, points);
        if let Some(badge) = badge {
            info!(user_id, badge = badge.label(), "badge unlocked");
        }
        debug!(user_id, action = action.as_str(), points, new_total, "points awarded");

        Ok(ActionOutcome {
            success: true,
            points_earned: points,
            new_total_score: new_total,
            badge_unlocked: badge.map(|b| b.label().to_string()),
        })
    }

    /// Top users by score; ties are ordered by user id
    pub fn leaderboard(&self, limit: usize) -> Leaderboard {
        let state = self.inner.read();
        let mut users: Vec<&UserRecord> = state.users.values().collect();
        users.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.user_id.cmp(&b.user_id)));

        let entries = users
            .into_iter()
            .take(limit)
            .enumerate()
            .map(|(idx, user)| LeaderboardEntry {
                rank: idx + 1,
                user_id: user.user_id.clone(),
                username: user.username.clone(),
                score: user.score,
            })
            .collect();

        Leaderboard {
            entries,
            total_users: state.users.len(),
        }
    }

    pub fn score(&self, user_id: &str) -> Result<UserRecord, LedgerError> {
        let user_id = user_id.trim();
        self.inner
            .read()
            .users
            .get(user_id)
            .cloned()
            .ok_or_else(|| LedgerError::UnknownUser(user_id.to_string()))
    }

    /// Most recent first
    pub fn recent_actions(&self, limit: usize) -> Vec<ActionLogEntry> {
        self.inner
            .read()
            .actions
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn record_decision(&self, action: Action) {
        self.inner.write().tally.record(action);
    }

    pub fn tally(&self) -> ModerationTally {
        self.inner.read().tally
    }

    pub fn weather(&self) -> ToxicityWeather {
        self.tally().into()
    }
}

// ============ Tests ============
