//! Error types for area and metric computation.

use thiserror::Error;

/// Error type for confusion-area computation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MetricError {
    /// Prediction and label maps cover different pixel counts.
    #[error("prediction/label shape mismatch: {pred} vs {label} pixels")]
    ShapeMismatch {
        /// Pixel count of the prediction map.
        pred: usize,
        /// Pixel count of the label map.
        label: usize,
    },

    /// A class value fell outside `[0, num_classes)` and was not the
    /// ignore sentinel.
    #[error("class value {value} outside [0, {num_classes})")]
    ClassOutOfRange {
        /// The offending class value.
        value: i64,
        /// The configured number of classes.
        num_classes: usize,
    },

    /// `num_classes` was zero.
    #[error("num_classes must be greater than zero")]
    NoClasses,
}

/// A specialized `Result` type for metric operations.
pub type MetricResult<T> = Result<T, MetricError>;
