use crate::systems::{ComparisonResult, RatingUpdate};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Unordered pair of item IDs, stored in sorted order so that (a, b) and (b, a) coincide.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PairKey(String, String);

impl PairKey {
    pub fn new(a: &str, b: &str) -> Self {
        if a <= b {
            Self(a.to_owned(), b.to_owned())
        } else {
            Self(b.to_owned(), a.to_owned())
        }
    }

    pub fn ids(&self) -> (&str, &str) {
        (&self.0, &self.1)
    }
}

/// Append-only log of comparison results, together with the indexes derived from it.
/// Only the log is serialized; the indexes are rebuilt when loading.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(from = "Vec<ComparisonResult>", into = "Vec<ComparisonResult>")]
pub struct ComparisonHistory {
    comparisons: Vec<ComparisonResult>,
    pair_counts: HashMap<PairKey, usize>,
    rating_progressions: HashMap<String, Vec<f64>>,
}

impl ComparisonHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_results(results: impl IntoIterator<Item = ComparisonResult>) -> Self {
        let mut history = Self::new();
        for result in results {
            history.add_comparison(result);
        }
        history
    }

    pub fn add_comparison(&mut self, result: ComparisonResult) {
        for update in &result.updates {
            self.rating_progressions
                .entry(update.item_id.clone())
                .or_default()
                .push(update.new_rating);
        }
        for (a, b) in result.item_ids().tuple_combinations() {
            if a != b {
                *self.pair_counts.entry(PairKey::new(a, b)).or_default() += 1;
            }
        }
        self.comparisons.push(result);
    }

    pub fn pair_comparison_count(&self, a: &str, b: &str) -> usize {
        self.pair_counts
            .get(&PairKey::new(a, b))
            .copied()
            .unwrap_or(0)
    }

    /// The last `n` results in chronological order, or all of them if there are fewer.
    pub fn recent_comparisons(&self, n: usize) -> &[ComparisonResult] {
        &self.comparisons[self.comparisons.len().saturating_sub(n)..]
    }

    /// Every rating this item has been assigned, oldest first.
    pub fn rating_progression(&self, item_id: &str) -> &[f64] {
        self.rating_progressions
            .get(item_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// The most recent update recorded for an item, if it was ever compared.
    pub fn last_update(&self, item_id: &str) -> Option<&RatingUpdate> {
        self.comparisons
            .iter()
            .rev()
            .find_map(|result| result.updates.iter().find(|u| u.item_id == item_id))
    }

    // Number of recorded comparisons that involved this item
    pub fn item_comparison_count(&self, item_id: &str) -> usize {
        self.rating_progression(item_id).len()
    }

    pub fn comparisons(&self) -> &[ComparisonResult] {
        &self.comparisons
    }

    pub fn len(&self) -> usize {
        self.comparisons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.comparisons.is_empty()
    }
}

impl From<Vec<ComparisonResult>> for ComparisonHistory {
    fn from(results: Vec<ComparisonResult>) -> Self {
        Self::from_results(results)
    }
}

impl From<ComparisonHistory> for Vec<ComparisonResult> {
    fn from(history: ComparisonHistory) -> Self {
        history.comparisons
    }
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use crate::systems::ComparisonMethod;
    use std::time::Duration;

    // Builds a result from (id, old, new) triples
    pub(crate) fn result_from(changes: &[(&str, f64, f64)]) -> ComparisonResult {
        let updates = changes
            .iter()
            .map(|&(id, old_rating, new_rating)| RatingUpdate {
                item_id: id.to_owned(),
                old_rating,
                new_rating,
                delta: new_rating - old_rating,
                k_factor_used: 32,
            })
            .collect();
        let method = ComparisonMethod::from_item_count(changes.len()).unwrap();
        ComparisonResult::new(updates, method, Duration::ZERO)
    }

    #[test]
    fn test_pair_key_is_unordered() {
        assert_eq!(PairKey::new("b", "a"), PairKey::new("a", "b"));
        assert_eq!(PairKey::new("b", "a").ids(), ("a", "b"));
        // IDs containing separators must not collide
        assert_ne!(PairKey::new("a:b", "c"), PairKey::new("a", "b:c"));
    }

    #[test]
    fn test_pair_counts() {
        let mut history = ComparisonHistory::new();
        history.add_comparison(result_from(&[("x", 1500., 1516.), ("y", 1500., 1484.)]));
        history.add_comparison(result_from(&[("y", 1484., 1500.), ("x", 1516., 1500.)]));
        history.add_comparison(result_from(&[
            ("x", 1500., 1520.),
            ("y", 1500., 1500.),
            ("z", 1500., 1490.),
            ("w", 1500., 1490.),
        ]));

        assert_eq!(history.len(), 3);
        assert_eq!(history.pair_comparison_count("x", "y"), 3);
        assert_eq!(history.pair_comparison_count("y", "x"), 3);
        assert_eq!(history.pair_comparison_count("z", "w"), 1);
        assert_eq!(history.pair_comparison_count("x", "w"), 1);
        assert_eq!(history.pair_comparison_count("x", "nobody"), 0);
    }

    #[test]
    fn test_progressions_and_recent() {
        let mut history = ComparisonHistory::new();
        assert!(history.is_empty());
        assert!(history.recent_comparisons(5).is_empty());
        assert!(history.rating_progression("x").is_empty());

        for i in 0..4 {
            let gain = i as f64;
            history.add_comparison(result_from(&[
                ("x", 1500. + gain, 1501. + gain),
                ("y", 1500. - gain, 1499. - gain),
            ]));
        }
        assert_eq!(history.rating_progression("x"), &[1501., 1502., 1503., 1504.]);
        assert_eq!(history.item_comparison_count("y"), 4);
        assert_eq!(history.last_update("y").unwrap().old_rating, 1497.);
        assert_eq!(history.last_update("y").unwrap().delta, -1.);
        assert_eq!(history.last_update("nobody"), None);

        let recent = history.recent_comparisons(2);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].updates[0].new_rating, 1503.);
        assert_eq!(recent[1].updates[0].new_rating, 1504.);
        assert_eq!(history.recent_comparisons(10).len(), 4);
        assert!(history.recent_comparisons(0).is_empty());
    }

    #[test]
    fn test_indexes_survive_serialization() {
        let history = ComparisonHistory::from_results(vec![
            result_from(&[("x", 1500., 1516.), ("y", 1500., 1484.)]),
            result_from(&[("x", 1516., 1530.), ("z", 1500., 1486.)]),
        ]);
        let json = serde_json::to_string(&history).unwrap();
        let loaded: ComparisonHistory = serde_json::from_str(&json).unwrap();

        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.pair_comparison_count("y", "x"), 1);
        assert_eq!(loaded.rating_progression("x"), &[1516., 1530.]);
        assert_eq!(loaded.comparisons(), history.comparisons());
    }
}
