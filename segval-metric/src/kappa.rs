//! Cohen's kappa: chance-corrected agreement between prediction and
//! ground truth, derived from the marginal area counts.

use crate::accuracy::accuracy;
use crate::area::ClassAreas;

/// Derives Cohen's kappa from an accumulated area triple.
///
/// `kappa = (acc - expected) / (1 - expected)` where the expected
/// agreement is `Σ pred[c]·label[c] / total²` and `total` is the
/// non-ignored pixel count. Products run in f64 so large datasets
/// cannot overflow the integer counts.
///
/// Policy: 0.0 when the denominator vanishes (expected agreement of 1,
/// i.e. both marginals concentrated on a single class) or when the
/// accumulator is empty.
pub fn kappa(areas: &ClassAreas) -> f64 {
    let total = areas.total_pixels() as f64;
    if total == 0.0 {
        return 0.0;
    }

    let acc = accuracy(areas).overall_acc;
    let expected = areas
        .pred
        .iter()
        .zip(areas.label.iter())
        .map(|(&p, &l)| p as f64 * l as f64)
        .sum::<f64>()
        / (total * total);

    let denom = 1.0 - expected;
    if denom == 0.0 {
        0.0
    } else {
        (acc - expected) / denom
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::area::calculate_area;

    #[test]
    fn perfect_prediction_scores_one() {
        let map = [0i64, 0, 1, 1];
        let areas = calculate_area(&map, &map, 2, None).unwrap();
        // expected = (2*2 + 2*2) / 16 = 0.5; kappa = (1 - 0.5) / 0.5
        assert_eq!(kappa(&areas), 1.0);
    }

    #[test]
    fn chance_level_agreement_scores_zero() {
        // Labels split evenly between two classes, everything predicted
        // as class 0: observed accuracy 0.5 equals the expected-by-chance
        // agreement, so kappa is exactly 0.
        let pred = [0i64, 0, 0, 0];
        let label = [0i64, 0, 1, 1];
        let areas = calculate_area(&pred, &label, 2, None).unwrap();
        assert_eq!(kappa(&areas), 0.0);
    }

    #[test]
    fn single_class_marginals_score_zero() {
        // expected agreement is 1, denominator collapses.
        let map = [0i64, 0, 0];
        let areas = calculate_area(&map, &map, 2, None).unwrap();
        assert_eq!(kappa(&areas), 0.0);
    }

    #[test]
    fn empty_accumulator_scores_zero() {
        assert_eq!(kappa(&ClassAreas::zeros(4)), 0.0);
    }

    #[test]
    fn worse_than_chance_is_negative() {
        let pred = [1i64, 1, 0, 0];
        let label = [0i64, 0, 1, 1];
        let areas = calculate_area(&pred, &label, 2, None).unwrap();
        assert!(kappa(&areas) < 0.0);
    }
}
