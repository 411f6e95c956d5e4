//! Per-class and mean intersection-over-union.

use crate::area::ClassAreas;

/// Per-class IoU values and their mean.
#[derive(Debug, Clone, PartialEq)]
pub struct IouReport {
    /// IoU per class, in class order.
    pub class_iou: Vec<f64>,
    /// Mean over all classes.
    pub mean_iou: f64,
}

/// Derives IoU from an accumulated area triple.
///
/// `class_iou[c] = intersect[c] / (pred[c] + label[c] - intersect[c])`.
///
/// Policy for an empty union (class absent from both prediction and
/// label): the class scores 0.0 and still contributes to the mean,
/// matching the reference implementation this evaluator reproduces.
pub fn mean_iou(areas: &ClassAreas) -> IouReport {
    let class_iou: Vec<f64> = (0..areas.num_classes())
        .map(|c| {
            let union = areas.pred[c] + areas.label[c] - areas.intersect[c];
            if union == 0 {
                0.0
            } else {
                areas.intersect[c] as f64 / union as f64
            }
        })
        .collect();

    let mean_iou = if class_iou.is_empty() {
        0.0
    } else {
        class_iou.iter().sum::<f64>() / class_iou.len() as f64
    };

    IouReport {
        class_iou,
        mean_iou,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::area::calculate_area;

    #[test]
    fn perfect_prediction_scores_one() {
        // 2-class, 4-pixel case with prediction == label everywhere.
        let map = [0i64, 0, 1, 1];
        let areas = calculate_area(&map, &map, 2, None).unwrap();
        let report = mean_iou(&areas);
        assert_eq!(report.class_iou, vec![1.0, 1.0]);
        assert_eq!(report.mean_iou, 1.0);
    }

    #[test]
    fn disjoint_prediction_scores_zero() {
        // Equal nonzero areas, zero intersection.
        let pred = [1i64, 1, 0, 0];
        let label = [0i64, 0, 1, 1];
        let areas = calculate_area(&pred, &label, 2, None).unwrap();
        let report = mean_iou(&areas);
        assert_eq!(report.class_iou, vec![0.0, 0.0]);
        assert_eq!(report.mean_iou, 0.0);
    }

    #[test]
    fn empty_union_counts_as_zero_in_the_mean() {
        // Class 2 never appears in prediction or label.
        let pred = [0i64, 1];
        let label = [0i64, 1];
        let areas = calculate_area(&pred, &label, 3, None).unwrap();
        let report = mean_iou(&areas);
        assert_eq!(report.class_iou, vec![1.0, 1.0, 0.0]);
        assert!((report.mean_iou - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn partial_overlap() {
        let pred = [0i64, 0, 0, 1];
        let label = [0i64, 0, 1, 1];
        let areas = calculate_area(&pred, &label, 2, None).unwrap();
        let report = mean_iou(&areas);
        // class 0: 2 / (3 + 2 - 2) = 2/3; class 1: 1 / (1 + 2 - 1) = 1/2
        assert!((report.class_iou[0] - 2.0 / 3.0).abs() < 1e-12);
        assert!((report.class_iou[1] - 0.5).abs() < 1e-12);
    }
}
