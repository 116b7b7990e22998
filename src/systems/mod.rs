mod common;
mod elo;
mod multi_way;

pub use common::{
    ComparisonMethod, ComparisonResult, EngineConfig, Rating, RatingError, RatingSystem,
    RatingUpdate, Updates,
};
pub use elo::Engine;
pub use multi_way::{MAX_ITEMS, MIN_ITEMS, MultiWayComparison, PairwiseGame, check_conservation};
