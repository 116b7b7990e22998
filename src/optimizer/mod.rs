//! Choosing what to compare next, and deciding when to stop comparing.

mod convergence;
mod matchup;

pub use convergence::{
    ConvergenceDetector, ConvergenceMetrics, ConvergenceStatus, Criterion, ProgressMetrics,
};
pub use matchup::{Matchup, MatchupOptimizer};

use crate::history::ComparisonHistory;
use crate::systems::{Engine, Rating};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizationConfig {
    // width of a rating bin, in rating points
    pub bin_size: f64,
    // mean absolute rating change below which ratings count as stable
    pub stability_threshold: f64,
    // number of past history points the current top ranking must agree with
    pub stability_window: usize,
    pub min_coverage: usize,
    pub max_coverage: usize,
    pub top_n_for_stability: usize,
    // fraction of turns on which distant bins get a calibration matchup
    pub cross_bin_rate: f64,
    // number of recent comparisons the convergence signals are computed over
    pub convergence_window: usize,
}

impl Default for OptimizationConfig {
    fn default() -> Self {
        Self {
            bin_size: 50.,
            stability_threshold: 5.,
            stability_window: 5,
            min_coverage: 5,
            max_coverage: 15,
            top_n_for_stability: 5,
            cross_bin_rate: 0.15,
            convergence_window: 20,
        }
    }
}

// Fraction of top positions that must agree for two rankings to count as the same
pub const RANKING_OVERLAP_THRESHOLD: f64 = 0.8;

/// IDs of the `n` best items, highest score first; equal scores keep their input order.
pub fn top_n<'a>(ratings: impl IntoIterator<Item = (&'a str, f64)>, n: usize) -> Vec<&'a str> {
    let mut sorted: Vec<(&str, f64)> = ratings.into_iter().collect();
    sorted.sort_by(|a, b| b.1.total_cmp(&a.1));
    sorted.into_iter().take(n).map(|(id, _)| id).collect()
}

/// Fraction of positions in `current` held by the same item in `past`.
pub fn ranking_overlap(current: &[&str], past: &[&str]) -> f64 {
    if current.is_empty() {
        return 1.;
    }
    let same = current.iter().zip(past).filter(|(a, b)| a == b).count();
    same as f64 / current.len() as f64
}

impl Engine {
    pub fn get_optimal_matchup(
        &self,
        items: &[Rating],
        history: &ComparisonHistory,
        config: &OptimizationConfig,
    ) -> Option<Matchup> {
        MatchupOptimizer::new(self.config(), config).optimal_matchup(items, history)
    }

    pub fn check_convergence(
        &self,
        items: &[Rating],
        history: &ComparisonHistory,
        config: &OptimizationConfig,
    ) -> ConvergenceStatus {
        ConvergenceDetector::new(config).check(items, history)
    }

    pub fn get_progress_metrics(
        &self,
        items: &[Rating],
        history: &ComparisonHistory,
        config: &OptimizationConfig,
    ) -> ProgressMetrics {
        ConvergenceDetector::new(config).progress(items, history)
    }
}
