use super::OptimizationConfig;
use crate::history::ComparisonHistory;
use crate::numerical::expected_score;
use crate::systems::{EngineConfig, MAX_ITEMS, MIN_ITEMS, Rating};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// Rating gap at or below which a matchup is expected to be close
pub const CLOSE_MATCH_GAP: f64 = 50.;
pub const MAX_PRIORITY: u8 = 5;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Matchup {
    pub item_a: String,
    pub item_b: String,
    pub expected_close: bool,
    // 1 (lowest) to 5 (highest)
    pub priority: u8,
    pub information: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Tier {
    WithinBin,
    AdjacentBin,
    CrossBin,
}

impl Tier {
    fn priority_penalty(self) -> u8 {
        match self {
            Tier::WithinBin => 0,
            Tier::AdjacentBin | Tier::CrossBin => 1,
        }
    }
}

/// Picks the next pair to compare: close ratings first, with occasional
/// calibration across distant parts of the scale.
#[derive(Clone, Debug)]
pub struct MatchupOptimizer {
    min_rating: f64,
    max_rating: f64,
    config: OptimizationConfig,
}

impl MatchupOptimizer {
    pub fn new(engine_config: &EngineConfig, config: &OptimizationConfig) -> Self {
        Self {
            min_rating: engine_config.min_rating,
            max_rating: engine_config.max_rating,
            config: *config,
        }
    }

    pub fn bin_of(&self, score: f64) -> i64 {
        // A degenerate bin size puts everything into one bin
        if !(self.config.bin_size > 0.) {
            return 0;
        }
        // Out-of-range scores share the edge bins
        let score = score.clamp(self.min_rating, self.max_rating);
        ((score - self.min_rating) / self.config.bin_size).floor() as i64
    }

    // Deterministic stand-in for sampling at cross_bin_rate: fires on a fixed
    // subset of every ten consecutive history lengths
    pub fn samples_cross_bin(&self, history_len: usize) -> bool {
        ((history_len % 10) as f64) < self.config.cross_bin_rate * 10.
    }

    /// Information gained by comparing two items: largest for an even matchup,
    /// shrinking as the gap grows and as the same pair gets compared again.
    pub fn information(&self, score_a: f64, score_b: f64, times_compared: usize) -> f64 {
        let p = expected_score(score_a, score_b);
        4. * p * (1. - p) / (1 + times_compared) as f64
    }

    fn priority(information: f64, tier: Tier) -> u8 {
        let base = (information * MAX_PRIORITY as f64).ceil().clamp(1., MAX_PRIORITY as f64) as u8;
        base.saturating_sub(tier.priority_penalty()).max(1)
    }

    fn bins<'a>(&self, items: &'a [Rating]) -> BTreeMap<i64, Vec<&'a Rating>> {
        let mut bins: BTreeMap<i64, Vec<&Rating>> = BTreeMap::new();
        for item in items {
            bins.entry(self.bin_of(item.score)).or_default().push(item);
        }
        bins
    }

    fn candidates<'a>(
        &self,
        items: &'a [Rating],
        history_len: usize,
    ) -> Vec<(&'a Rating, &'a Rating, Tier)> {
        let bins = self.bins(items);
        let mut candidates = vec![];

        for members in bins.values() {
            for (a, b) in members.iter().tuple_combinations() {
                candidates.push((*a, *b, Tier::WithinBin));
            }
        }
        for (bin, members) in &bins {
            if let Some(next) = bin.checked_add(1).and_then(|next| bins.get(&next)) {
                for (a, b) in members.iter().cartesian_product(next) {
                    candidates.push((*a, *b, Tier::AdjacentBin));
                }
            }
        }

        let distant_bins = bins
            .iter()
            .tuple_combinations()
            .filter(|((lo, _), (hi, _))| {
                // A gap too large for i64 is certainly distant
                hi.checked_sub(**lo).is_none_or(|gap| gap >= 2)
            });
        if self.samples_cross_bin(history_len) {
            // One representative per bin, rotating with the history length
            for ((_, lo), (_, hi)) in distant_bins {
                let a = lo[history_len % lo.len()];
                let b = hi[history_len % hi.len()];
                candidates.push((a, b, Tier::CrossBin));
            }
        } else if candidates.is_empty() {
            // Nothing close enough to compare, so calibrate across the whole scale
            for ((_, lo), (_, hi)) in distant_bins {
                for (a, b) in lo.iter().cartesian_product(hi) {
                    candidates.push((*a, *b, Tier::CrossBin));
                }
            }
        }
        candidates
    }

    pub fn optimal_matchup(
        &self,
        items: &[Rating],
        history: &ComparisonHistory,
    ) -> Option<Matchup> {
        if items.len() < 2 {
            return None;
        }

        let mut best: Option<Matchup> = None;
        for (a, b, tier) in self.candidates(items, history.len()) {
            let times_compared = history.pair_comparison_count(&a.id, &b.id);
            let information = self.information(a.score, b.score, times_compared);
            if best.as_ref().is_none_or(|m| information > m.information) {
                best = Some(Matchup {
                    item_a: a.id.clone(),
                    item_b: b.id.clone(),
                    expected_close: (a.score - b.score).abs() <= CLOSE_MATCH_GAP,
                    priority: Self::priority(information, tier),
                    information,
                });
            }
        }

        match &best {
            Some(m) => tracing::debug!(
                "Selected {} vs {} with information {:.4} and priority {}",
                m.item_a,
                m.item_b,
                m.information,
                m.priority
            ),
            None => tracing::debug!("No matchup available among {} items", items.len()),
        }
        best
    }

    /// Grows a chosen pair into a comparison of `size` items by adding the items
    /// rated closest to the pair's midpoint. The pair always comes first.
    pub fn extend_matchup<'a>(
        &self,
        matchup: &Matchup,
        items: &'a [Rating],
        size: usize,
    ) -> Vec<&'a Rating> {
        let size = size.clamp(MIN_ITEMS, MAX_ITEMS);
        let find = |id: &str| items.iter().find(|item| item.id == id);
        let (Some(a), Some(b)) = (find(&matchup.item_a), find(&matchup.item_b)) else {
            return vec![];
        };

        let midpoint = 0.5 * (a.score + b.score);
        let mut others: Vec<&Rating> = items
            .iter()
            .filter(|item| item.id != a.id && item.id != b.id)
            .collect();
        others.sort_by(|x, y| {
            let dx = (x.score - midpoint).abs();
            let dy = (y.score - midpoint).abs();
            dx.total_cmp(&dy)
        });

        let mut chosen = vec![a, b];
        chosen.extend(others.into_iter().take(size - 2));
        chosen
    }
}
