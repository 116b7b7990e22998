use crate::numerical::confidence;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

pub type Updates = smallvec::SmallVec<[RatingUpdate; 4]>;

/// One item's current skill estimate. The caller owns these; the engine only
/// reads them and hands back updated copies.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "StoredRating")]
pub struct Rating {
    pub id: String,
    pub score: f64,
    games: u32,
    confidence: f64,
}

impl Rating {
    pub fn new(id: impl Into<String>, score: f64) -> Self {
        Self::with_games(id, score, 0)
    }

    pub fn with_games(id: impl Into<String>, score: f64, games: u32) -> Self {
        Self {
            id: id.into(),
            score,
            games,
            confidence: confidence(games),
        }
    }

    pub fn games(&self) -> u32 {
        self.games
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    // Copy of this rating with a new score, after playing extra_games more games
    pub(crate) fn advanced(&self, score: f64, extra_games: u32) -> Self {
        Self::with_games(self.id.clone(), score, self.games + extra_games)
    }
}

// Confidence is always recomputed from the games count, so a stored value is ignored
#[derive(Deserialize)]
struct StoredRating {
    id: String,
    score: f64,
    #[serde(default)]
    games: u32,
}

impl From<StoredRating> for Rating {
    fn from(stored: StoredRating) -> Self {
        Self::with_games(stored.id, stored.score, stored.games)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub initial_rating: f64,
    pub k_factor: i32,
    pub min_rating: f64,
    pub max_rating: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            initial_rating: 1500.,
            k_factor: 32,
            min_rating: 0.,
            max_rating: 3000.,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RatingUpdate {
    pub item_id: String,
    pub old_rating: f64,
    pub new_rating: f64,
    pub delta: f64,
    pub k_factor_used: i32,
}

impl RatingUpdate {
    pub fn new(old: &Rating, new: &Rating, k_factor_used: i32) -> Self {
        Self {
            item_id: old.id.clone(),
            old_rating: old.score,
            new_rating: new.score,
            delta: new.score - old.score,
            k_factor_used,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComparisonMethod {
    Pairwise,
    Trio,
    Quartet,
}

impl ComparisonMethod {
    pub fn from_item_count(num_items: usize) -> Option<Self> {
        match num_items {
            2 => Some(Self::Pairwise),
            3 => Some(Self::Trio),
            4 => Some(Self::Quartet),
            _ => None,
        }
    }

    pub fn item_count(self) -> usize {
        match self {
            Self::Pairwise => 2,
            Self::Trio => 3,
            Self::Quartet => 4,
        }
    }
}

/// Audit record of a single judgment: one update per affected item.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub updates: Updates,
    pub method: ComparisonMethod,
    pub timestamp: DateTime<Utc>,
    pub duration: Duration,
}

impl ComparisonResult {
    pub fn new(updates: Updates, method: ComparisonMethod, duration: Duration) -> Self {
        Self {
            updates,
            method,
            timestamp: Utc::now(),
            duration,
        }
    }

    pub fn item_ids(&self) -> impl Iterator<Item = &str> + Clone {
        self.updates.iter().map(|update| update.item_id.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Error)]
pub enum RatingError {
    #[error("K-factor must be positive, got {0}")]
    InvalidKFactor(i32),
    #[error("rating bounds must satisfy min < max, got [{min}, {max}]")]
    InvalidBounds { min: f64, max: f64 },
    #[error("initial rating must be finite, got {0}")]
    InvalidInitialRating(f64),
    #[error("item {id} has invalid rating {value}")]
    InvalidRating { id: String, value: f64 },
    #[error("a comparison needs between 2 and 4 items, got {0}")]
    InvalidItemCount(usize),
    #[error("item {0} appears more than once in the same comparison")]
    DuplicateItem(String),
    #[error("rating changes sum to {sum:e} instead of zero")]
    ConservationViolated { sum: f64 },
}

pub trait RatingSystem: std::fmt::Debug {
    // ranked is ordered from best to worst; the result keeps that order
    fn rate_ranking(
        &self,
        ranked: &[Rating],
    ) -> Result<(Vec<Rating>, ComparisonResult), RatingError>;
}
