//! Elo rating math: https://en.wikipedia.org/wiki/Elo_rating_system

// Rating points per factor-of-ten change in the odds of winning
pub const ELO_SCALE: f64 = 400.;
// Number of games after which a rating is considered fully established
pub const GAMES_FOR_FULL_CONFIDENCE: u32 = 20;
pub const CONSERVATION_TOLERANCE: f64 = 1e-10;

/// Probability that a player rated `player` beats one rated `foe`.
pub fn expected_score(player: f64, foe: f64) -> f64 {
    (1. + 10f64.powf((foe - player) / ELO_SCALE)).recip()
}

pub fn confidence(games: u32) -> f64 {
    (games as f64 / GAMES_FOR_FULL_CONFIDENCE as f64).min(1.)
}

pub fn is_valid_score(score: f64) -> bool {
    score.is_finite()
}

// Weight of a sub-game depends only on the better-ranked position, not on the gap:
// 1st vs anyone gets 1.0, 2nd vs anyone worse gets 0.8, 3rd vs 4th gets 0.6.
pub fn position_weight(better_pos: usize) -> f64 {
    (1. - 0.2 * better_pos as f64).max(0.6)
}

/// Number of pairwise games obtained by decomposing an n-way ranking.
pub fn expected_game_count(n: usize) -> usize {
    n * n.saturating_sub(1) / 2
}

// Linearly maps lo..=hi onto out_lo..=out_hi; the input must already lie within lo..=hi
pub fn linear_map(x: f64, (lo, hi): (f64, f64), (out_lo, out_hi): (f64, f64)) -> f64 {
    out_lo + (x - lo) / (hi - lo) * (out_hi - out_lo)
}

#[cfg(test)]
mod test {
    use super::*;
    use quickcheck_macros::quickcheck;

    #[test]
    fn test_expected_score_values() {
        assert_eq!(expected_score(1500., 1500.), 0.5);
        assert!((expected_score(1600., 1400.) - 0.7597).abs() < 1e-4);
        assert!((expected_score(1900., 1500.) - 10. / 11.).abs() < 1e-12);
    }

    #[quickcheck]
    fn expected_score_is_symmetric(a: i32, b: i32) -> bool {
        // Keep the difference in a range where 10^x stays finite
        let (a, b) = ((a % 10_000) as f64, (b % 10_000) as f64);
        (expected_score(a, b) + expected_score(b, a) - 1.).abs() < 1e-6
    }

    #[test]
    fn test_confidence_saturates() {
        assert_eq!(confidence(0), 0.);
        assert_eq!(confidence(10), 0.5);
        assert_eq!(confidence(20), 1.);
        assert_eq!(confidence(100), 1.);
    }

    #[quickcheck]
    fn confidence_is_monotone(g1: u32, g2: u32) -> bool {
        let (lo, hi) = if g1 <= g2 { (g1, g2) } else { (g2, g1) };
        confidence(lo) <= confidence(hi)
    }

    #[test]
    fn test_game_counts() {
        let counts: Vec<usize> = (0..=5).map(expected_game_count).collect();
        assert_eq!(counts, vec![0, 0, 1, 3, 6, 10]);
    }

    #[test]
    fn test_position_weights() {
        assert_eq!(position_weight(0), 1.);
        assert!((position_weight(1) - 0.8).abs() < 1e-12);
        assert!((position_weight(2) - 0.6).abs() < 1e-12);
        assert!((position_weight(5) - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_validity() {
        assert!(is_valid_score(-3.5));
        assert!(!is_valid_score(f64::NAN));
        assert!(!is_valid_score(f64::INFINITY));
        assert!(!is_valid_score(f64::NEG_INFINITY));
    }
}
