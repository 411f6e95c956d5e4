//! Per-class confusion-area computation and accumulation.
//!
//! [`calculate_area`] reduces one batch of prediction/label maps to a
//! [`ClassAreas`] triple; [`ClassAreas::accumulate`] sums triples into a
//! running total. Accumulation is element-wise addition, so it is
//! commutative and associative: batch order and rank partitioning do
//! not affect the final aggregate.

use crate::error::{MetricError, MetricResult};

/// Per-class pixel areas for one batch, or a running sum of batches.
///
/// `label[c]` accumulated over a whole run equals the total non-ignored
/// ground-truth pixel count of class `c`, however the run was split
/// into batches or ranks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassAreas {
    /// Pixels where prediction == label == c.
    pub intersect: Vec<u64>,
    /// Pixels predicted as class c (ignored label pixels excluded).
    pub pred: Vec<u64>,
    /// Pixels labeled as class c.
    pub label: Vec<u64>,
}

impl ClassAreas {
    /// Creates a zeroed triple for `num_classes` classes.
    pub fn zeros(num_classes: usize) -> Self {
        Self {
            intersect: vec![0; num_classes],
            pred: vec![0; num_classes],
            label: vec![0; num_classes],
        }
    }

    /// Number of classes covered by this triple.
    pub fn num_classes(&self) -> usize {
        self.label.len()
    }

    /// Adds `other` element-wise into `self`.
    ///
    /// Commutative and associative; safe for partial reduction across
    /// ranks. Panics if the class counts differ, which is a wiring bug
    /// rather than a data error.
    pub fn accumulate(&mut self, other: &Self) {
        assert_eq!(
            self.num_classes(),
            other.num_classes(),
            "accumulating triples with different class counts"
        );
        for c in 0..self.num_classes() {
            self.intersect[c] += other.intersect[c];
            self.pred[c] += other.pred[c];
            self.label[c] += other.label[c];
        }
    }

    /// Total non-ignored pixels, from the label marginal.
    pub fn total_pixels(&self) -> u64 {
        self.label.iter().sum()
    }
}

/// Computes the per-class area triple for one batch.
///
/// Pixels whose label equals `ignore_index` are masked out entirely:
/// they contribute to none of the three counts, whatever the
/// corresponding prediction says.
///
/// # Errors
///
/// [`MetricError::ShapeMismatch`] when the maps cover different pixel
/// counts, [`MetricError::ClassOutOfRange`] when a non-ignored label or
/// a prediction falls outside `[0, num_classes)`, and
/// [`MetricError::NoClasses`] when `num_classes` is zero.
pub fn calculate_area(
    pred: &[i64],
    label: &[i64],
    num_classes: usize,
    ignore_index: Option<i64>,
) -> MetricResult<ClassAreas> {
    if num_classes == 0 {
        return Err(MetricError::NoClasses);
    }
    if pred.len() != label.len() {
        return Err(MetricError::ShapeMismatch {
            pred: pred.len(),
            label: label.len(),
        });
    }

    let mut areas = ClassAreas::zeros(num_classes);
    for (&p, &l) in pred.iter().zip(label.iter()) {
        if ignore_index == Some(l) {
            continue;
        }
        let l = class_index(l, num_classes)?;
        let p = class_index(p, num_classes)?;
        areas.label[l] += 1;
        areas.pred[p] += 1;
        if p == l {
            areas.intersect[p] += 1;
        }
    }
    Ok(areas)
}

fn class_index(value: i64, num_classes: usize) -> MetricResult<usize> {
    usize::try_from(value)
        .ok()
        .filter(|&c| c < num_classes)
        .ok_or(MetricError::ClassOutOfRange { value, num_classes })
}
