//! Ranked comparisons of up to four items, decomposed into weighted pairwise games.
//! Every game moves the same number of points from its loser to its winner, so a
//! whole comparison neither creates nor destroys rating.

use super::common::{ComparisonMethod, ComparisonResult, Rating, RatingError, RatingUpdate};
use super::elo::Engine;
use crate::numerical::{CONSERVATION_TOLERANCE, expected_score, position_weight};
use itertools::Itertools;
use std::collections::HashSet;
use std::time::Instant;

pub const MIN_ITEMS: usize = 2;
pub const MAX_ITEMS: usize = 4;

/// One sub-game between two positions of a ranking; the better position always wins.
#[derive(Clone, Debug, PartialEq)]
pub struct PairwiseGame {
    pub winner: Rating,
    pub loser: Rating,
    pub winner_pos: usize,
    pub loser_pos: usize,
    pub weight: f64,
    pub expected_win: f64,
    // Applied to the winner; the loser receives exactly the negation
    pub rating_change: f64,
}

impl PairwiseGame {
    pub fn loser_change(&self) -> f64 {
        -self.rating_change
    }
}

#[derive(Debug)]
pub struct MultiWayComparison<'a> {
    engine: &'a Engine,
    ranked: Vec<Rating>,
    games: Vec<PairwiseGame>,
}

impl<'a> MultiWayComparison<'a> {
    pub fn new(engine: &'a Engine, ranked: Vec<Rating>) -> Result<Self, RatingError> {
        if !(MIN_ITEMS..=MAX_ITEMS).contains(&ranked.len()) {
            return Err(RatingError::InvalidItemCount(ranked.len()));
        }
        let mut seen = HashSet::with_capacity(ranked.len());
        for rating in &ranked {
            if !seen.insert(rating.id.as_str()) {
                return Err(RatingError::DuplicateItem(rating.id.clone()));
            }
            engine.validate(rating)?;
        }

        let games = ranked
            .iter()
            .enumerate()
            .tuple_combinations()
            .map(|((i, winner), (j, loser))| {
                let weight = position_weight(i);
                let expected_win = expected_score(winner.score, loser.score);
                let unweighted = engine.k_factor() * (1. - expected_win);
                PairwiseGame {
                    winner: winner.clone(),
                    loser: loser.clone(),
                    winner_pos: i,
                    loser_pos: j,
                    weight,
                    expected_win,
                    rating_change: weight * unweighted,
                }
            })
            .collect();

        Ok(Self {
            engine,
            ranked,
            games,
        })
    }

    pub fn games(&self) -> &[PairwiseGame] {
        &self.games
    }

    pub fn method(&self) -> ComparisonMethod {
        // The constructor guarantees 2..=4 items
        ComparisonMethod::from_item_count(self.ranked.len()).unwrap_or(ComparisonMethod::Quartet)
    }

    /// Net change of each ranked position summed over all its games, before clamping.
    pub fn total_deltas(&self) -> Vec<f64> {
        let mut deltas = vec![0.; self.ranked.len()];
        for game in &self.games {
            deltas[game.winner_pos] += game.rating_change;
            deltas[game.loser_pos] += game.loser_change();
        }
        deltas
    }

    pub fn validate_rating_conservation(&self) -> Result<(), RatingError> {
        check_conservation(&self.total_deltas())
    }

    /// Returns the updated ratings in ranking order, along with the audit record.
    pub fn execute(&self) -> Result<(Vec<Rating>, ComparisonResult), RatingError> {
        let now = Instant::now();
        self.validate_rating_conservation()?;

        let games_each = self.ranked.len() as u32 - 1;
        let k_factor = self.engine.config().k_factor;
        let updated: Vec<Rating> = self
            .ranked
            .iter()
            .zip(self.total_deltas())
            .map(|(rating, delta)| {
                rating.advanced(self.engine.clamp(rating.score + delta), games_each)
            })
            .collect();
        let updates = self
            .ranked
            .iter()
            .zip(&updated)
            .map(|(old, new)| RatingUpdate::new(old, new, k_factor))
            .collect();

        let result = ComparisonResult::new(updates, self.method(), now.elapsed());
        Ok((updated, result))
    }
}

pub fn check_conservation(deltas: &[f64]) -> Result<(), RatingError> {
    let sum: f64 = deltas.iter().sum();
    if sum.abs() > CONSERVATION_TOLERANCE {
        Err(RatingError::ConservationViolated { sum })
    } else {
        Ok(())
    }
}
