use proposal_rank::experiment_config::{Experiment, ExperimentConfig};
use proposal_rank::summary::print_leaderboard;

/// Runs one simulated ranking session and writes its leaderboard
fn main() {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() != 2 && args.len() != 3 {
        tracing::error!("Usage: {} config_file [output_dir]", args[0]);
        return;
    }

    let config = ExperimentConfig::from_file(&args[1]).expect("Failed to load config");
    let ex = Experiment::from_config(config).expect("Invalid experiment config");
    let results = ex.eval().expect("Rating update failed");

    let status = &results.status;
    tracing::info!(
        "{} comparisons in {} seconds; stop = {}, confidence = {:.2}, {} more estimated",
        results.history.len(),
        results.secs_elapsed,
        status.should_stop,
        status.confidence,
        status.remaining_estimate,
    );
    for (criterion, met) in &status.criteria_met {
        tracing::info!("{:?}: {}", criterion, met);
    }
    tracing::info!("Accuracy against true strengths: {}", results.report);

    let dir = std::path::PathBuf::from(args.get(2).map_or("data/output", String::as_str));
    std::fs::create_dir_all(&dir).expect("Could not create directory");
    print_leaderboard(&ex.engine, &results.ratings, &results.history, &dir);
}
