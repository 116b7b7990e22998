use crate::data_processing::write_slice_to_file;
use crate::history::ComparisonHistory;
use crate::systems::{Engine, Rating};
use serde::{Deserialize, Serialize};

// Display scores are reported on this scale
pub const DISPLAY_RANGE: (f64, f64) = (0., 100.);

const NUM_TIERS: usize = 4;
const TIER_BOUND: [f64; NUM_TIERS] = [0., 40., 60., 75.];
const TIER: [&str; NUM_TIERS] = ["Reject", "Weak", "Borderline", "Accept"];

pub struct GlobalSummary {
    pub mean_rating: f64,
    pub tier_count: Vec<usize>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ItemSummary {
    pub rank: usize,
    pub display_score: f64,
    pub score: f64,
    pub games: u32,
    pub confidence: f64,
    pub comparisons: usize,
    pub last_change: f64,
    pub tier: String,
    pub id: String,
}

fn tier_of(display_score: f64) -> usize {
    (0..NUM_TIERS)
        .rev()
        .find(|&i| display_score >= TIER_BOUND[i])
        .unwrap_or(0)
}

/// Items ordered by score, best first; equal scores keep their input order.
pub fn make_leaderboard(
    engine: &Engine,
    ratings: &[Rating],
    history: &ComparisonHistory,
) -> (GlobalSummary, Vec<ItemSummary>) {
    let mut sorted: Vec<&Rating> = ratings.iter().collect();
    sorted.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut tier_count = vec![0; NUM_TIERS];
    let rating_data: Vec<ItemSummary> = sorted
        .into_iter()
        .enumerate()
        .map(|(i, rating)| {
            let (lo, hi) = DISPLAY_RANGE;
            let display_score = engine.rescale(rating.score, lo, hi);
            let tier = tier_of(display_score);
            tier_count[tier] += 1;

            let last_change = history.last_update(&rating.id).map_or(0., |u| u.delta);
            ItemSummary {
                rank: i + 1,
                display_score,
                score: rating.score,
                games: rating.games(),
                confidence: rating.confidence(),
                comparisons: history.item_comparison_count(&rating.id),
                last_change,
                tier: TIER[tier].to_owned(),
                id: rating.id.clone(),
            }
        })
        .collect();

    let mean_rating = if ratings.is_empty() {
        0.
    } else {
        ratings.iter().map(|r| r.score).sum::<f64>() / ratings.len() as f64
    };
    let global_summary = GlobalSummary {
        mean_rating,
        tier_count,
    };

    (global_summary, rating_data)
}

pub fn print_leaderboard(
    engine: &Engine,
    ratings: &[Rating],
    history: &ComparisonHistory,
    dir: impl AsRef<std::path::Path>,
) {
    let (summary, rating_data) = make_leaderboard(engine, ratings, history);

    tracing::info!("Mean rating = {:.1}", summary.mean_rating);
    for i in (0..NUM_TIERS).rev() {
        tracing::info!(
            "{:>4} {:<10} x{:4}",
            TIER_BOUND[i],
            TIER[i],
            summary.tier_count[i]
        );
    }

    let filename = dir.as_ref().join("leaderboard.csv");
    write_slice_to_file(&rating_data, &filename);
}
