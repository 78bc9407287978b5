//! Elo rating update
//!
//! Zero-sum update with an adaptive K-factor: close ratings move fast,
//! well-separated ratings move slowly.

/// K-factor while the two ratings are within [`CLOSE_GAP`]
pub const K_CLOSE: f64 = 32.0;

/// K-factor once the ratings are [`CLOSE_GAP`] or more apart
pub const K_SETTLED: f64 = 16.0;

/// Rating gap at which the K-factor drops to [`K_SETTLED`]
pub const CLOSE_GAP: f64 = 100.0;

/// Probability that `rating` beats `opponent`
pub fn expected_score(rating: f64, opponent: f64) -> f64 {
    1.0 / (1.0 + 10f64.powf((opponent - rating) / 400.0))
}

/// K-factor for a comparison between `a` and `b`
pub fn k_factor(a: f64, b: f64) -> f64 {
    if (a - b).abs() < CLOSE_GAP {
        K_CLOSE
    } else {
        K_SETTLED
    }
}

/// New `(winner, loser)` ratings after `winner` beat `loser`
pub fn apply(winner_rating: f64, loser_rating: f64) -> (f64, f64) {
    let expected_winner = expected_score(winner_rating, loser_rating);
    let delta = k_factor(winner_rating, loser_rating) * (1.0 - expected_winner);
    (winner_rating + delta, loser_rating - delta)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn test_equal_ratings_split_k() {
        let (w, l) = apply(1200.0, 1200.0);
        assert!((w - 1216.0).abs() < EPS);
        assert!((l - 1184.0).abs() < EPS);
    }

    #[test]
    fn test_k_factor_boundary() {
        assert_eq!(k_factor(1299.0, 1200.0), K_CLOSE);
        assert_eq!(k_factor(1300.0, 1200.0), K_SETTLED);
        assert_eq!(k_factor(1301.0, 1200.0), K_SETTLED);
        // Symmetric in argument order
        assert_eq!(k_factor(1200.0, 1299.0), K_CLOSE);
        assert_eq!(k_factor(1200.0, 1300.0), K_SETTLED);
    }

    #[test]
    fn test_winner_never_loses_and_update_is_zero_sum() {
        let ratings = [0.0, 850.0, 1199.5, 1200.0, 1299.0, 1300.0, 1750.0, 2400.0];
        for &rw in &ratings {
            for &rl in &ratings {
                let (nw, nl) = apply(rw, rl);
                assert!(nw >= rw, "winner lost rating: {} -> {}", rw, nw);
                assert!(nl <= rl, "loser gained rating: {} -> {}", rl, nl);
                assert!(((nw - rw) - (rl - nl)).abs() < EPS, "not zero-sum for {} vs {}", rw, rl);
            }
        }
    }

    #[test]
    fn test_upset_moves_more_than_expected_win() {
        let (favourite_win, _) = apply(1400.0, 1200.0);
        let (underdog_win, _) = apply(1200.0, 1400.0);
        assert!(underdog_win - 1200.0 > favourite_win - 1400.0);
    }

    #[test]
    fn test_settled_gap_uses_smaller_step() {
        // Gap of 150: K=16, expected_winner ~0.703
        let (w, l) = apply(1350.0, 1200.0);
        let expected = 16.0 * (1.0 - expected_score(1350.0, 1200.0));
        assert!((w - 1350.0 - expected).abs() < EPS);
        assert!((1200.0 - l - expected).abs() < EPS);
        assert!(w - 1350.0 < 16.0);
    }
}
