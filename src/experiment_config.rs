//! Simulated ranking sessions: items with hidden true strengths are compared by a
//! noisy judge until the convergence detector says to stop.

use crate::data_processing::write_json;
use crate::history::ComparisonHistory;
use crate::metrics::{PerformanceReport, compute_metrics_custom};
use crate::optimizer::{ConvergenceStatus, MatchupOptimizer, OptimizationConfig};
use crate::systems::{
    Engine, EngineConfig, MAX_ITEMS, MIN_ITEMS, Rating, RatingError, RatingSystem,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    pub engine: EngineConfig,
    pub optimization: OptimizationConfig,
    pub num_items: usize,
    // items per comparison, 2 to 4
    pub comparison_size: usize,
    // true strengths are drawn uniformly from [-spread, spread]
    pub strength_spread: f64,
    // scale of the logistic noise the judge adds to each true strength
    pub judge_noise: f64,
    pub max_comparisons: usize,
    pub seed: u64,
    pub save_history: Option<String>,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            optimization: OptimizationConfig::default(),
            num_items: 30,
            comparison_size: 2,
            strength_spread: 400.,
            judge_noise: 100.,
            max_comparisons: 500,
            seed: 0,
            save_history: None,
        }
    }
}

impl ExperimentConfig {
    pub fn from_json5(params_json: &str) -> Result<Self, String> {
        json5::from_str(params_json).map_err(|e| format!("Failed to parse params as JSON5: {}", e))
    }

    pub fn from_file(source: impl AsRef<Path>) -> Result<Self, String> {
        // json5 accepts the comments and trailing commas of hand-written configs
        let source = source.as_ref();
        let params_json = std::fs::read_to_string(source)
            .map_err(|e| format!("Failed to read {:?}: {}", source, e))?;
        Self::from_json5(&params_json)
    }
}

#[derive(Debug)]
pub struct Experiment {
    pub engine: Engine,
    pub optimization: OptimizationConfig,
    pub num_items: usize,
    pub comparison_size: usize,
    pub strength_spread: f64,
    pub judge_noise: f64,
    pub max_comparisons: usize,
    pub seed: u64,
    pub save_history: Option<String>,
}

fn item_name(index: usize) -> String {
    format!("proposal{:03}", index)
}

/// Rates one judged comparison and writes the new ratings back into `ratings`.
/// `ranked` lists the compared items best first.
pub fn simulate_comparison(
    ratings: &mut [Rating],
    ranked: &[Rating],
    system: &dyn RatingSystem,
    history: &mut ComparisonHistory,
) -> Result<(), RatingError> {
    let (new_ratings, result) = system.rate_ranking(ranked)?;
    for new_rating in new_ratings {
        if let Some(slot) = ratings.iter_mut().find(|r| r.id == new_rating.id) {
            *slot = new_rating;
        }
    }
    history.add_comparison(result);
    Ok(())
}

impl Experiment {
    pub fn from_config(config: ExperimentConfig) -> Result<Self, RatingError> {
        tracing::debug!("Loading experiment:\n{:?}", config);
        if !(MIN_ITEMS..=MAX_ITEMS).contains(&config.comparison_size) {
            return Err(RatingError::InvalidItemCount(config.comparison_size));
        }

        Ok(Self {
            engine: Engine::new(config.engine)?,
            optimization: config.optimization,
            num_items: config.num_items,
            comparison_size: config.comparison_size,
            strength_spread: config.strength_spread,
            judge_noise: config.judge_noise,
            max_comparisons: config.max_comparisons,
            seed: config.seed,
            save_history: config.save_history,
        })
    }

    pub fn true_strengths(&self, rng: &mut impl Rng) -> HashMap<String, f64> {
        (0..self.num_items)
            .map(|i| {
                let strength = self.strength_spread * (2. * rng.random::<f64>() - 1.);
                (item_name(i), strength)
            })
            .collect()
    }

    /// Orders `items` best first, as judged from their true strengths plus logistic noise.
    pub fn judge(
        &self,
        items: &mut [Rating],
        true_strengths: &HashMap<String, f64>,
        rng: &mut impl Rng,
    ) {
        let mut perceived: Vec<(f64, Rating)> = items
            .iter()
            .map(|item| {
                let u = rng.random::<f64>().clamp(f64::EPSILON, 1. - f64::EPSILON);
                let noise = self.judge_noise * (u / (1. - u)).ln();
                let strength = true_strengths.get(&item.id).copied().unwrap_or(0.);
                (strength + noise, item.clone())
            })
            .collect();
        perceived.sort_by(|a, b| b.0.total_cmp(&a.0));
        for (slot, (_, item)) in items.iter_mut().zip(perceived) {
            *slot = item;
        }
    }

    pub fn eval(&self) -> Result<ExperimentResults, RatingError> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let true_strengths = self.true_strengths(&mut rng);
        let mut ratings: Vec<Rating> = (0..self.num_items)
            .map(|i| self.engine.new_rating(item_name(i)))
            .collect();
        let mut history = ComparisonHistory::new();
        let optimizer = MatchupOptimizer::new(self.engine.config(), &self.optimization);

        let now = std::time::Instant::now();
        let mut status = self
            .engine
            .check_convergence(&ratings, &history, &self.optimization);
        while !status.should_stop && history.len() < self.max_comparisons {
            let Some(matchup) = optimizer.optimal_matchup(&ratings, &history) else {
                break;
            };
            let mut chosen: Vec<Rating> = optimizer
                .extend_matchup(&matchup, &ratings, self.comparison_size)
                .into_iter()
                .cloned()
                .collect();
            self.judge(&mut chosen, &true_strengths, &mut rng);
            simulate_comparison(&mut ratings, &chosen, &self.engine, &mut history)?;

            status = self
                .engine
                .check_convergence(&ratings, &history, &self.optimization);
        }
        let secs_elapsed = now.elapsed().as_nanos() as f64 * 1e-9;
        tracing::debug!(
            "Session ended after {} comparisons with {}/4 criteria met",
            history.len(),
            status.criteria_met_count()
        );

        if let Some(filename) = &self.save_history {
            if let Err(msg) = write_json(&history, filename) {
                tracing::error!("WARNING: failed to save history to {} because {}", filename, msg);
            }
        }

        let report = compute_metrics_custom(&true_strengths, &ratings);
        Ok(ExperimentResults {
            ratings,
            history,
            status,
            report,
            true_strengths,
            secs_elapsed,
        })
    }
}

pub struct ExperimentResults {
    pub ratings: Vec<Rating>,
    pub history: ComparisonHistory,
    pub status: ConvergenceStatus,
    pub report: PerformanceReport,
    pub true_strengths: HashMap<String, f64>,
    pub secs_elapsed: f64,
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::systems::ComparisonMethod;
    use claims::{assert_matches, assert_ok};

    fn small_experiment(comparison_size: usize, seed: u64) -> Experiment {
        Experiment::from_config(ExperimentConfig {
            num_items: 8,
            comparison_size,
            max_comparisons: 300,
            seed,
            ..ExperimentConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_config_from_json5() {
        let config = assert_ok!(ExperimentConfig::from_json5(
            r#"{
                // a small session
                num_items: 12,
                comparison_size: 3,
                engine: { k_factor: 24 },
                optimization: { bin_size: 100, },
            }"#
        ));
        assert_eq!(config.num_items, 12);
        assert_eq!(config.comparison_size, 3);
        assert_eq!(config.engine.k_factor, 24);
        assert_eq!(config.engine.initial_rating, 1500.);
        assert_eq!(config.optimization.bin_size, 100.);
        assert_eq!(config.optimization.min_coverage, 5);
        assert_eq!(config.max_comparisons, 500);

        assert!(ExperimentConfig::from_json5("{ num_items: }").is_err());
    }

    #[test]
    fn test_invalid_configs() {
        for comparison_size in [0, 1, 5] {
            let config = ExperimentConfig {
                comparison_size,
                ..ExperimentConfig::default()
            };
            assert_matches!(
                Experiment::from_config(config),
                Err(RatingError::InvalidItemCount(n)) if n == comparison_size
            );
        }
        let mut config = ExperimentConfig::default();
        config.engine.k_factor = 0;
        assert_matches!(
            Experiment::from_config(config),
            Err(RatingError::InvalidKFactor(0))
        );
    }

    #[test]
    fn test_noiseless_judge_follows_true_strength() {
        let experiment = Experiment {
            judge_noise: 0.,
            ..small_experiment(4, 1)
        };
        let truth: HashMap<String, f64> = [("a", 10.), ("b", 30.), ("c", -5.), ("d", 20.)]
            .map(|(id, s)| (id.to_owned(), s))
            .into();
        let mut items: Vec<Rating> = ["a", "b", "c", "d"]
            .iter()
            .map(|&id| Rating::new(id, 1500.))
            .collect();
        experiment.judge(&mut items, &truth, &mut StdRng::seed_from_u64(3));
        let order: Vec<&str> = items.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(order, vec!["b", "d", "a", "c"]);
    }

    #[test]
    fn test_session_is_reproducible_and_conserves_rating() {
        let first = small_experiment(2, 42).eval().unwrap();
        let second = small_experiment(2, 42).eval().unwrap();

        assert!(first.history.len() <= 300);
        assert_eq!(first.history.len(), second.history.len());
        let scores = |results: &ExperimentResults| -> Vec<f64> {
            results.ratings.iter().map(|r| r.score).collect()
        };
        assert_eq!(scores(&first), scores(&second));

        // Ratings stay far from the bounds, so no clamping breaks the zero sum
        let total: f64 = scores(&first).iter().sum();
        assert!((total - 8. * 1500.).abs() < 1e-6);

        let accuracy = first.report.averages()[0];
        assert!(accuracy > 60., "pairwise accuracy {}", accuracy);
    }

    #[test]
    fn test_trio_sessions_record_trios() {
        let results = small_experiment(3, 5).eval().unwrap();
        assert!(!results.history.is_empty());
        assert!(
            results
                .history
                .comparisons()
                .iter()
                .all(|c| c.method == ComparisonMethod::Trio)
        );
        let games: u32 = results.ratings.iter().map(|r| r.games()).sum();
        assert_eq!(games as usize, 6 * results.history.len());
    }
}
