//! Ranking quality measured against known true strengths, for simulated sessions.

use crate::systems::Rating;
use overload::overload;
use std::collections::HashMap;
use std::fmt;
use std::ops;

// (true strength, estimated score) for each item
pub type TruthAndEstimate = [(f64, f64)];
pub type WeightAndSum = (f64, f64);

// Per-metric (weight, weighted sum) pairs, so reports from many sessions can be added
#[derive(Clone, Debug)]
pub struct PerformanceReport {
    pub metrics_wt_sum: Vec<WeightAndSum>,
}

impl fmt::Display for PerformanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let averages: Vec<String> = self
            .averages()
            .iter()
            .map(|avg| format!("{:.2}", avg))
            .collect();
        write!(f, "[{}]", averages.join(", "))
    }
}

impl PerformanceReport {
    pub fn new(num_metrics: usize) -> Self {
        Self {
            metrics_wt_sum: vec![(0., 0.); num_metrics],
        }
    }

    pub fn averages(&self) -> Vec<f64> {
        self.metrics_wt_sum
            .iter()
            .map(|&(wt, sum)| if wt > 0. { sum / wt } else { 0. })
            .collect()
    }
}

// Reports over disjoint sessions combine by adding weights and sums per metric
overload!((a: ?PerformanceReport) + (b: ?PerformanceReport) -> PerformanceReport {
    assert_eq!(a.metrics_wt_sum.len(), b.metrics_wt_sum.len());
    PerformanceReport {
        metrics_wt_sum: a
            .metrics_wt_sum
            .iter()
            .zip(&b.metrics_wt_sum)
            .map(|(&(wt1, sum1), &(wt2, sum2))| (wt1 + wt2, sum1 + sum2))
            .collect(),
    }
});

// Counts pairs whose estimates are out of order, on a slice sorted by true strength
fn inversions_by_mergesort(items: &mut TruthAndEstimate) -> usize {
    let len = items.len();
    if len < 2 {
        return 0;
    }

    let (left, right) = items.split_at_mut(len / 2);
    let (mut l_idx, mut r_idx) = (0, 0);
    let mut merged = Vec::with_capacity(len);
    let mut invs = inversions_by_mergesort(left) + inversions_by_mergesort(right);
    while l_idx < left.len() && r_idx < right.len() {
        if left[l_idx].1 >= right[r_idx].1 {
            merged.push(left[l_idx]);
            l_idx += 1;
        } else {
            merged.push(right[r_idx]);
            r_idx += 1;
            invs += left.len() - l_idx;
        }
    }
    merged.extend(&left[l_idx..]);
    merged.extend(&right[r_idx..]);
    items.copy_from_slice(&merged);
    invs
}

fn sorted_by_truth(items: &TruthAndEstimate) -> Vec<(f64, f64)> {
    let mut sorted = items.to_vec();
    sorted.sort_by(|a, b| b.0.total_cmp(&a.0));
    sorted
}

/// Percentage of item pairs that the estimates put in the true order.
pub fn pairwise_metric(items: &TruthAndEstimate) -> WeightAndSum {
    if items.len() < 2 {
        return (0., 0.);
    }
    let invs = inversions_by_mergesort(&mut sorted_by_truth(items)) as f64;
    let n = items.len() as f64;
    let num_pairs = n * (n - 1.) / 2.;
    (n, n * 100. * (1. - invs / num_pairs))
}

/// Average distance, as a percentage of the field, between true and estimated places.
pub fn percentile_distance_metric(items: &TruthAndEstimate) -> WeightAndSum {
    if items.len() < 2 {
        return (0., 0.);
    }
    let by_truth = sorted_by_truth(items);
    let mut by_estimate: Vec<usize> = (0..by_truth.len()).collect();
    by_estimate.sort_by(|&i, &j| by_truth[j].1.total_cmp(&by_truth[i].1));

    let sum_error: f64 = by_estimate
        .iter()
        .enumerate()
        .map(|(place, &true_place)| (place as f64 - true_place as f64).abs())
        .sum();
    let n = items.len() as f64;
    (n, 100. * sum_error / (n - 1.))
}

/// Percentage of the truly best `k` items that the estimates also place in the top `k`.
pub fn top_k_metric(items: &TruthAndEstimate, k: usize) -> WeightAndSum {
    let k = k.min(items.len());
    if k == 0 {
        return (0., 0.);
    }
    let by_truth = sorted_by_truth(items);
    let mut by_estimate: Vec<usize> = (0..by_truth.len()).collect();
    by_estimate.sort_by(|&i, &j| by_truth[j].1.total_cmp(&by_truth[i].1));
    let hits = by_estimate[..k].iter().filter(|&&true_place| true_place < k).count();
    (1., 100. * hits as f64 / k as f64)
}

// Meant to be modified manually to contain the desired metrics
pub fn compute_metrics_custom(
    true_strengths: &HashMap<String, f64>,
    ratings: &[Rating],
) -> PerformanceReport {
    let items: Vec<(f64, f64)> = ratings
        .iter()
        .filter_map(|rating| Some((*true_strengths.get(&rating.id)?, rating.score)))
        .collect();

    let metrics_wt_sum = vec![
        pairwise_metric(&items),
        percentile_distance_metric(&items),
        top_k_metric(&items, 5),
        top_k_metric(&items, 10),
    ];

    PerformanceReport { metrics_wt_sum }
}
