//! Elo ratings for ranking proposals from pairwise and multi-way comparisons,
//! with matchup selection and a convergence test for knowing when to stop.

pub mod data_processing;
pub mod experiment_config;
pub mod history;
pub mod metrics;
pub mod numerical;
pub mod optimizer;
pub mod summary;
pub mod systems;

pub use history::ComparisonHistory;
pub use optimizer::OptimizationConfig;
pub use systems::{Engine, EngineConfig, Rating, RatingError};
