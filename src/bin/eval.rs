use proposal_rank::experiment_config::{Experiment, ExperimentConfig};
use proposal_rank::metrics::PerformanceReport;
use rayon::prelude::*;

/// Averages session accuracy and length over many seeds
fn main() {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() != 2 && args.len() != 3 {
        tracing::error!("Usage: {} config_file [num_seeds]", args[0]);
        return;
    }
    let config = ExperimentConfig::from_file(&args[1]).expect("Failed to load config");
    let num_seeds: u64 = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(32);

    // Sessions are independent, so each seed runs on its own thread
    let (report, total_comparisons, total_stopped) = (0..num_seeds)
        .into_par_iter()
        .map(|offset| {
            let ex = Experiment::from_config(ExperimentConfig {
                seed: config.seed + offset,
                save_history: None,
                ..config.clone()
            })
            .expect("Invalid experiment config");
            let results = ex.eval().expect("Rating update failed");
            tracing::debug!("Seed {}: {}", ex.seed, results.report);
            (
                results.report,
                results.history.len(),
                results.status.should_stop as usize,
            )
        })
        .reduce(
            || (PerformanceReport::new(4), 0, 0),
            |a, b| (a.0 + b.0, a.1 + b.1, a.2 + b.2),
        );

    let horizontal = "============================================================";
    tracing::info!(
        "{}: {} over {} seeds\n{:.1} comparisons per session, {} of {} converged\n{}",
        args[1],
        report,
        num_seeds,
        total_comparisons as f64 / num_seeds as f64,
        total_stopped,
        num_seeds,
        horizontal
    );
}
