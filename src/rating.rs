//! The rating engine (spec §4.3, component C3).
//!
//! Pure functions only: no I/O, no access to the hot store. `mmr_delta` is
//! the single source of truth every completion and admin-override path
//! drives (spec §4.5, §4.6) — always against a match's *initial* MMRs,
//! never its current ones, which is what makes admin re-resolution
//! idempotent (Testable Property 4).

use thiserror::Error;

/// `result` as carried on the wire (spec §6): `0` draw, `1` P1 won, `2` P2 won.
pub type RawResult = i32;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid result code: {0}")]
pub struct InvalidResult(pub RawResult);

/// Elo-style delta for player 1; player 2's delta is its negation.
///
/// `result` must be one of `0` (draw), `1` (P1 win), `2` (P2 win) — anything
/// else is a programmer error and is propagated as `InvalidResult` rather
/// than silently clamped (spec §4.3).
pub fn mmr_delta(a_before: i32, b_before: i32, result: RawResult, k_factor: f64) -> Result<i32, InvalidResult> {
    let score_a = match result {
        0 => 0.5,
        1 => 1.0,
        2 => 0.0,
        other => return Err(InvalidResult(other)),
    };

    let expected_a = expected_score(a_before, b_before);
    let delta = k_factor * (score_a - expected_a);

    // Round half away from zero so a nonzero expected delta never rounds to 0,
    // which would otherwise make two distinct MMRs produce a no-op draw.
    Ok(delta.round() as i32)
}

/// Standard logistic expectation for player A against player B.
fn expected_score(a: i32, b: i32) -> f64 {
    1.0 / (1.0 + 10f64.powf((b - a) as f64 / 400.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    const K: f64 = 32.0;

    #[test]
    fn draw_between_equal_mmrs_is_a_symmetric_no_op() {
        assert_eq!(mmr_delta(1500, 1500, 0, K).unwrap(), 0);
        assert_eq!(mmr_delta(1500, 1500, 0, K).unwrap(), -mmr_delta(1500, 1500, 0, K).unwrap());
    }

    #[test]
    fn higher_rated_winner_gains_less_than_lower_rated_winner() {
        let favourite_wins = mmr_delta(1600, 1400, 1, K).unwrap();
        let underdog_wins = mmr_delta(1400, 1600, 1, K).unwrap();
        assert!(favourite_wins > 0);
        assert!(underdog_wins > 0);
        assert!(underdog_wins > favourite_wins);
    }

    #[test]
    fn p2_win_yields_negative_delta_for_p1() {
        let delta = mmr_delta(1492, 1505, 2, K).unwrap();
        assert!(delta < 0);
    }

    #[test]
    fn p1_win_yields_positive_delta_for_p1() {
        let delta = mmr_delta(1492, 1505, 1, K).unwrap();
        assert!(delta > 0);
    }

    #[test]
    fn draw_between_close_mmrs_is_near_zero() {
        let delta = mmr_delta(1492, 1505, 0, K).unwrap();
        assert!(delta.abs() <= 1);
    }

    #[test]
    fn out_of_range_result_is_rejected() {
        assert_eq!(mmr_delta(1500, 1500, 3, K), Err(InvalidResult(3)));
        assert_eq!(mmr_delta(1500, 1500, -1, K), Err(InvalidResult(-1)));
    }

    #[test]
    fn scenario_s3_fresh_admin_override() {
        let delta = mmr_delta(1492, 1505, 2, K).unwrap();
        assert!(delta < 0);
        let p1_final = 1492 + delta;
        let p2_final = 1505 - delta;
        assert_eq!(p1_final - 1492, -(p2_final - 1505));
    }
}
