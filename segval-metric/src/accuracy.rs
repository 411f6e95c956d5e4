//! Per-class and overall pixel accuracy.

use crate::area::ClassAreas;

/// Per-class accuracy values and the overall pixel accuracy.
#[derive(Debug, Clone, PartialEq)]
pub struct AccuracyReport {
    /// `intersect[c] / pred[c]` per class; 0.0 where nothing was
    /// predicted as class c.
    pub class_acc: Vec<f64>,
    /// `Σ intersect / Σ pred` over all classes.
    pub overall_acc: f64,
}

/// Derives accuracy from an accumulated area triple.
pub fn accuracy(areas: &ClassAreas) -> AccuracyReport {
    let class_acc: Vec<f64> = (0..areas.num_classes())
        .map(|c| {
            if areas.pred[c] == 0 {
                0.0
            } else {
                areas.intersect[c] as f64 / areas.pred[c] as f64
            }
        })
        .collect();

    let total_pred: u64 = areas.pred.iter().sum();
    let total_intersect: u64 = areas.intersect.iter().sum();
    let overall_acc = if total_pred == 0 {
        0.0
    } else {
        total_intersect as f64 / total_pred as f64
    };

    AccuracyReport {
        class_acc,
        overall_acc,
    }
}
