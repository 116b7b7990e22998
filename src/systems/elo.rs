//! Elo system details: https://en.wikipedia.org/wiki/Elo_rating_system

use super::common::{
    ComparisonMethod, ComparisonResult, EngineConfig, Rating, RatingError, RatingSystem,
    RatingUpdate,
};
use super::multi_way::MultiWayComparison;
use crate::numerical::{expected_score, is_valid_score, linear_map};
use smallvec::smallvec;
use std::time::Instant;

/// Rating engine with a fixed, validated configuration.
#[derive(Clone, Debug, Default)]
pub struct Engine {
    config: EngineConfig,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Result<Self, RatingError> {
        if config.k_factor <= 0 {
            return Err(RatingError::InvalidKFactor(config.k_factor));
        }
        // Written so that NaN bounds are rejected too
        if !(config.min_rating < config.max_rating)
            || !config.min_rating.is_finite()
            || !config.max_rating.is_finite()
        {
            return Err(RatingError::InvalidBounds {
                min: config.min_rating,
                max: config.max_rating,
            });
        }
        if !is_valid_score(config.initial_rating) {
            return Err(RatingError::InvalidInitialRating(config.initial_rating));
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn k_factor(&self) -> f64 {
        self.config.k_factor as f64
    }

    /// A newcomer at the configured initial rating.
    pub fn new_rating(&self, id: impl Into<String>) -> Rating {
        Rating::new(id, self.config.initial_rating)
    }

    pub fn expected_score(&self, player: f64, foe: f64) -> f64 {
        expected_score(player, foe)
    }

    pub fn clamp(&self, score: f64) -> f64 {
        score.clamp(self.config.min_rating, self.config.max_rating)
    }

    /// Maps a score from the engine's bounds onto `out_lo..=out_hi`, e.g. for display.
    pub fn rescale(&self, score: f64, out_lo: f64, out_hi: f64) -> f64 {
        if !is_valid_score(score) {
            return out_lo;
        }
        let bounds = (self.config.min_rating, self.config.max_rating);
        linear_map(self.clamp(score), bounds, (out_lo, out_hi))
    }

    pub fn validate(&self, rating: &Rating) -> Result<(), RatingError> {
        if is_valid_score(rating.score) {
            Ok(())
        } else {
            Err(RatingError::InvalidRating {
                id: rating.id.clone(),
                value: rating.score,
            })
        }
    }

    /// Applies one win of `winner` over `loser`.
    pub fn calculate_pairwise(
        &self,
        winner: &Rating,
        loser: &Rating,
    ) -> Result<(Rating, Rating), RatingError> {
        self.validate(winner)?;
        self.validate(loser)?;

        let winner_expected = expected_score(winner.score, loser.score);
        let loser_expected = 1. - winner_expected;
        let winner_delta = self.k_factor() * (1. - winner_expected);
        let loser_delta = self.k_factor() * (0. - loser_expected);

        let new_winner = winner.advanced(self.clamp(winner.score + winner_delta), 1);
        let new_loser = loser.advanced(self.clamp(loser.score + loser_delta), 1);
        Ok((new_winner, new_loser))
    }

    /// Same as `calculate_pairwise`, but also returns an audit record of the update.
    pub fn calculate_pairwise_with_result(
        &self,
        winner: &Rating,
        loser: &Rating,
    ) -> Result<(Rating, Rating, ComparisonResult), RatingError> {
        let now = Instant::now();
        let (new_winner, new_loser) = self.calculate_pairwise(winner, loser)?;
        let updates = smallvec![
            RatingUpdate::new(winner, &new_winner, self.config.k_factor),
            RatingUpdate::new(loser, &new_loser, self.config.k_factor),
        ];
        let result = ComparisonResult::new(updates, ComparisonMethod::Pairwise, now.elapsed());
        Ok((new_winner, new_loser, result))
    }

    /// Prepares a comparison of 2 to 4 items, ordered from best to worst.
    pub fn new_multi_way_comparison(
        &self,
        ranked: Vec<Rating>,
    ) -> Result<MultiWayComparison<'_>, RatingError> {
        MultiWayComparison::new(self, ranked)
    }
}

impl RatingSystem for Engine {
    fn rate_ranking(
        &self,
        ranked: &[Rating],
    ) -> Result<(Vec<Rating>, ComparisonResult), RatingError> {
        match ranked {
            [winner, loser] => {
                let (winner, loser, result) = self.calculate_pairwise_with_result(winner, loser)?;
                Ok((vec![winner, loser], result))
            }
            _ => self.new_multi_way_comparison(ranked.to_vec())?.execute(),
        }
    }
}
