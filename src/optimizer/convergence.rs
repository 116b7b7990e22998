//! Stopping rule: ranking is considered settled once at least three of four
//! independent signals agree.

use super::{OptimizationConfig, RANKING_OVERLAP_THRESHOLD, ranking_overlap, top_n};
use crate::history::ComparisonHistory;
use crate::systems::Rating;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::collections::{BTreeMap, HashMap};

pub const CRITERIA_TO_STOP: usize = 3;
// Inflation applied to the remaining-work estimate
pub const SAFETY_MARGIN: f64 = 1.25;
// Standard deviation of a rating trajectory at which it counts as half settled
pub const TRAJECTORY_SPREAD: f64 = 100.;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Criterion {
    RatingStability,
    RankingStability,
    VarianceThreshold,
    MinimumCoverage,
}

impl Criterion {
    pub const ALL: [Criterion; 4] = [
        Criterion::RatingStability,
        Criterion::RankingStability,
        Criterion::VarianceThreshold,
        Criterion::MinimumCoverage,
    ];
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ConvergenceMetrics {
    // mean absolute rating change over the recent window
    pub average_change: f64,
    // population variance of the absolute rating changes over the recent window
    pub change_variance: f64,
    // worst agreement between the current top ranking and a recent past one
    pub ranking_overlap: f64,
    pub items_below_coverage: usize,
    pub recent_comparisons: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConvergenceStatus {
    pub should_stop: bool,
    pub confidence: f64,
    pub remaining_estimate: usize,
    pub criteria_met: BTreeMap<Criterion, bool>,
    pub metrics: ConvergenceMetrics,
}

impl ConvergenceStatus {
    pub fn criteria_met_count(&self) -> usize {
        self.criteria_met.values().filter(|&&met| met).count()
    }
}

/// Display-oriented progress signals; nothing here feeds a decision.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressMetrics {
    pub total_comparisons: usize,
    pub coverage_percent: f64,
    pub average_comparisons_per_item: f64,
    // relative drop in average change magnitude, recent window vs the one before;
    // positive while ratings are settling
    pub convergence_rate: f64,
    pub consecutive_stable_top_n: usize,
    pub item_confidence: BTreeMap<String, f64>,
}

#[derive(Clone, Debug)]
pub struct ConvergenceDetector {
    config: OptimizationConfig,
}

impl ConvergenceDetector {
    pub fn new(config: &OptimizationConfig) -> Self {
        Self { config: *config }
    }

    pub fn check(&self, items: &[Rating], history: &ComparisonHistory) -> ConvergenceStatus {
        if history.is_empty() {
            return ConvergenceStatus {
                should_stop: false,
                confidence: 0.,
                remaining_estimate: self.config.min_coverage * items.len(),
                criteria_met: Criterion::ALL.iter().map(|&c| (c, false)).collect(),
                metrics: ConvergenceMetrics::default(),
            };
        }

        let recent = history.recent_comparisons(self.config.convergence_window);
        let changes: Vec<f64> = recent
            .iter()
            .flat_map(|result| result.updates.iter().map(|update| update.delta.abs()))
            .collect();
        let (average_change, change_variance) = if changes.is_empty() {
            (f64::INFINITY, f64::INFINITY)
        } else {
            (changes.iter().mean(), changes.iter().population_variance())
        };
        let ranking_overlap = self.worst_recent_overlap(items, history);
        let shortfall = self.coverage_shortfall(items, history);
        let items_below_coverage = shortfall.iter().filter(|&&s| s > 0).count();

        let threshold = self.config.stability_threshold;
        let criteria_met: BTreeMap<Criterion, bool> = [
            (Criterion::RatingStability, average_change < threshold),
            (
                Criterion::RankingStability,
                ranking_overlap >= RANKING_OVERLAP_THRESHOLD,
            ),
            (Criterion::VarianceThreshold, change_variance < 0.5 * threshold),
            (Criterion::MinimumCoverage, items_below_coverage == 0),
        ]
        .into_iter()
        .collect();

        let met = criteria_met.values().filter(|&&met| met).count();
        let should_stop = met >= CRITERIA_TO_STOP;
        let remaining_estimate = if should_stop {
            0
        } else {
            // A pairwise comparison adds coverage to two items at once
            let total: usize = shortfall.iter().sum();
            ((total as f64 / 2. * SAFETY_MARGIN).ceil() as usize).max(1)
        };

        tracing::debug!(
            "Convergence: {}/{} criteria met after {} comparisons, avg change {:.3}",
            met,
            Criterion::ALL.len(),
            history.len(),
            average_change
        );

        ConvergenceStatus {
            should_stop,
            confidence: met as f64 / Criterion::ALL.len() as f64,
            remaining_estimate,
            criteria_met,
            metrics: ConvergenceMetrics {
                average_change,
                change_variance,
                ranking_overlap,
                items_below_coverage,
                recent_comparisons: recent.len(),
            },
        }
    }

    pub fn progress(&self, items: &[Rating], history: &ComparisonHistory) -> ProgressMetrics {
        let counts: Vec<usize> = items
            .iter()
            .map(|item| history.item_comparison_count(&item.id))
            .collect();
        let covered = counts
            .iter()
            .filter(|&&count| count >= self.config.min_coverage)
            .count();
        let (coverage_percent, average_comparisons_per_item) = if items.is_empty() {
            (0., 0.)
        } else {
            let n = items.len() as f64;
            (
                100. * covered as f64 / n,
                counts.iter().sum::<usize>() as f64 / n,
            )
        };

        let item_confidence = items
            .iter()
            .zip(&counts)
            .map(|(item, &count)| {
                let confidence = self.item_confidence(count, history.rating_progression(&item.id));
                (item.id.clone(), confidence)
            })
            .collect();

        ProgressMetrics {
            total_comparisons: history.len(),
            coverage_percent,
            average_comparisons_per_item,
            convergence_rate: self.convergence_rate(history),
            consecutive_stable_top_n: self.consecutive_stable_top_n(items, history),
            item_confidence,
        }
    }

    // Blend of how often an item was compared and how little its rating has moved
    fn item_confidence(&self, count: usize, progression: &[f64]) -> f64 {
        let count_part = if self.config.max_coverage == 0 {
            1.
        } else {
            (count as f64 / self.config.max_coverage as f64).min(1.)
        };
        let stability_part = if progression.len() < 2 {
            0.
        } else {
            let spread = progression.iter().population_std_dev();
            (1. + spread / TRAJECTORY_SPREAD).recip()
        };
        0.5 * (count_part + stability_part)
    }

    fn convergence_rate(&self, history: &ComparisonHistory) -> f64 {
        let window = (self.config.convergence_window / 2).max(1);
        if history.len() < 2 * window {
            return 0.;
        }
        let magnitudes: Vec<f64> = history
            .recent_comparisons(2 * window)
            .iter()
            .map(|result| {
                result
                    .updates
                    .iter()
                    .map(|update| update.delta.abs())
                    .sum::<f64>()
                    / result.updates.len().max(1) as f64
            })
            .collect();
        let (earlier, recent) = magnitudes.split_at(window);
        let earlier = earlier.iter().mean();
        let recent = recent.iter().mean();
        if earlier > 0. {
            ((earlier - recent) / earlier).clamp(-1., 1.)
        } else {
            0.
        }
    }

    fn coverage_shortfall(&self, items: &[Rating], history: &ComparisonHistory) -> Vec<usize> {
        items
            .iter()
            .map(|item| {
                self.config
                    .min_coverage
                    .saturating_sub(history.item_comparison_count(&item.id))
            })
            .collect()
    }

    fn current_top(&self, items: &[Rating]) -> Vec<String> {
        top_n(
            items.iter().map(|item| (item.id.as_str(), item.score)),
            self.config.top_n_for_stability,
        )
        .into_iter()
        .map(str::to_owned)
        .collect()
    }

    // Top ranking as it stood just before each of the last `points` history entries,
    // newest first. Each is rebuilt by replaying the log from the scores items had
    // before their first recorded comparison.
    fn past_tops(
        &self,
        items: &[Rating],
        history: &ComparisonHistory,
        points: usize,
    ) -> Vec<Vec<String>> {
        let comparisons = history.comparisons();
        let points = points.min(comparisons.len());
        let first_point = comparisons.len() - points;

        let mut scores: HashMap<&str, f64> = items
            .iter()
            .map(|item| (item.id.as_str(), item.score))
            .collect();
        // Walking backwards leaves each item at its earliest recorded old rating;
        // items never compared keep their current score
        for result in comparisons.iter().rev() {
            for update in &result.updates {
                if let Some(score) = scores.get_mut(update.item_id.as_str()) {
                    *score = update.old_rating;
                }
            }
        }

        let mut tops = Vec::with_capacity(points);
        let mut replayed = 0;
        for upto in first_point..comparisons.len() {
            for result in &comparisons[replayed..upto] {
                for update in &result.updates {
                    if let Some(score) = scores.get_mut(update.item_id.as_str()) {
                        *score = update.new_rating;
                    }
                }
            }
            replayed = upto;
            let ratings = items
                .iter()
                .map(|item| (item.id.as_str(), scores[item.id.as_str()]));
            let top = top_n(ratings, self.config.top_n_for_stability);
            tops.push(top.into_iter().map(str::to_owned).collect());
        }
        tops.reverse();
        tops
    }

    fn worst_recent_overlap(&self, items: &[Rating], history: &ComparisonHistory) -> f64 {
        let window = self.config.stability_window;
        if window == 0 || history.len() < window {
            return 0.;
        }
        let current = self.current_top(items);
        let current: Vec<&str> = current.iter().map(String::as_str).collect();
        self.past_tops(items, history, window)
            .iter()
            .map(|past| {
                let past: Vec<&str> = past.iter().map(String::as_str).collect();
                ranking_overlap(&current, &past)
            })
            .fold(1., f64::min)
    }

    fn consecutive_stable_top_n(&self, items: &[Rating], history: &ComparisonHistory) -> usize {
        let current = self.current_top(items);
        let current: Vec<&str> = current.iter().map(String::as_str).collect();
        self.past_tops(items, history, history.len())
            .iter()
            .take_while(|past| {
                let past: Vec<&str> = past.iter().map(String::as_str).collect();
                ranking_overlap(&current, &past) >= RANKING_OVERLAP_THRESHOLD
            })
            .count()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::history::test::result_from;

    fn detector() -> ConvergenceDetector {
        ConvergenceDetector::new(&OptimizationConfig::default())
    }

    // Round-robin over disjoint pairs, the lower index always winning, with rating
    // changes that shrink geometrically
    fn decaying_session(
        num_items: usize,
        num_comparisons: usize,
        decay: f64,
    ) -> (Vec<Rating>, ComparisonHistory) {
        let ids: Vec<String> = (0..num_items).map(|i| format!("item{}", i)).collect();
        let mut scores = vec![1500.; num_items];
        let mut history = ComparisonHistory::new();
        for k in 0..num_comparisons {
            let (a, b) = ((2 * k) % num_items, (2 * k + 1) % num_items);
            let change = 16. * decay.powi(k as i32);
            history.add_comparison(result_from(&[
                (ids[a].as_str(), scores[a], scores[a] + change),
                (ids[b].as_str(), scores[b], scores[b] - change),
            ]));
            scores[a] += change;
            scores[b] -= change;
        }
        let items = ids
            .iter()
            .zip(scores)
            .map(|(id, score)| Rating::new(id.as_str(), score))
            .collect();
        (items, history)
    }

    #[test]
    fn test_no_history() {
        let (items, _) = decaying_session(10, 0, 0.7);
        let status = detector().check(&items, &ComparisonHistory::new());
        assert!(!status.should_stop);
        assert_eq!(status.confidence, 0.);
        assert_eq!(status.remaining_estimate, 50);
        assert_eq!(status.criteria_met.len(), 4);
        assert_eq!(status.criteria_met_count(), 0);
    }

    #[test]
    fn test_settled_session_stops() {
        let (items, history) = decaying_session(10, 25, 0.7);
        let status = detector().check(&items, &history);

        assert!(status.confidence > 0.5);
        assert!(status.should_stop);
        assert_eq!(status.remaining_estimate, 0);
        assert!(status.criteria_met[&Criterion::RatingStability]);
        assert!(status.criteria_met[&Criterion::RankingStability]);
        assert!(status.criteria_met[&Criterion::VarianceThreshold]);
        assert!(status.criteria_met[&Criterion::MinimumCoverage]);
        assert_eq!(status.metrics.recent_comparisons, 20);
        assert!(status.metrics.average_change < 5.);
        assert_eq!(status.metrics.ranking_overlap, 1.);
    }

    #[test]
    fn test_early_session_estimates_remaining_work() {
        let (items, history) = decaying_session(10, 3, 0.7);
        let status = detector().check(&items, &history);

        assert!(!status.should_stop);
        assert_eq!(status.criteria_met_count(), 0);
        assert_eq!(status.confidence, 0.);
        assert_eq!(status.metrics.items_below_coverage, 10);
        // 6 items short by 4, 4 items short by 5, two items per comparison, plus 25%
        assert_eq!(status.remaining_estimate, 28);
    }

    #[test]
    fn test_top_ranking_upset_breaks_ranking_stability() {
        let (mut items, mut history) = decaying_session(10, 25, 0.7);
        // item9 jumps to the top and item8 drops out, shifting every top position
        let (upset, beaten) = (items[9].score, items[8].score);
        let swing = 2000. - upset;
        history.add_comparison(result_from(&[
            ("item9", upset, 2000.),
            ("item8", beaten, beaten - swing),
        ]));
        items[9].score = 2000.;
        items[8].score = beaten - swing;

        let status = detector().check(&items, &history);
        assert!(!status.criteria_met[&Criterion::RankingStability]);
        assert!(status.metrics.ranking_overlap < RANKING_OVERLAP_THRESHOLD);
    }

    #[test]
    fn test_replay_starts_from_recorded_scores() {
        // Imported scores away from the default, with one item never compared
        let items = [
            Rating::new("a", 1800.),
            Rating::new("b", 1200.),
            Rating::new("c", 1100.),
        ];
        let history = ComparisonHistory::from_results(
            (0..10).map(|_| result_from(&[("a", 1800., 1800.), ("b", 1200., 1200.)])),
        );
        let detector = ConvergenceDetector::new(&OptimizationConfig {
            top_n_for_stability: 3,
            ..OptimizationConfig::default()
        });

        let status = detector.check(&items, &history);
        assert_eq!(status.metrics.ranking_overlap, 1.);
        assert!(status.criteria_met[&Criterion::RankingStability]);
        let progress = detector.progress(&items, &history);
        assert_eq!(progress.consecutive_stable_top_n, 10);
    }

    #[test]
    fn test_progress_metrics() {
        let (items, history) = decaying_session(10, 25, 0.7);
        let progress = detector().progress(&items, &history);

        assert_eq!(progress.total_comparisons, 25);
        assert_eq!(progress.coverage_percent, 100.);
        assert_eq!(progress.average_comparisons_per_item, 5.);
        assert!(progress.convergence_rate > 0.9);
        assert!(progress.consecutive_stable_top_n >= 5);
        assert_eq!(progress.item_confidence.len(), 10);
        assert!(progress.item_confidence.values().all(|&c| c > 0. && c <= 1.));
    }

    #[test]
    fn test_progress_metrics_without_history() {
        let (items, _) = decaying_session(4, 0, 0.7);
        let progress = detector().progress(&items, &ComparisonHistory::new());
        assert_eq!(progress.total_comparisons, 0);
        assert_eq!(progress.coverage_percent, 0.);
        assert_eq!(progress.convergence_rate, 0.);
        assert_eq!(progress.consecutive_stable_top_n, 0);
        assert!(progress.item_confidence.values().all(|&c| c == 0.));
    }
}
